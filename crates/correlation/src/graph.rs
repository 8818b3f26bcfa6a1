//! 이웃 그래프 — 워크로드 간 방향 인접 관계와 참여자 속성
//!
//! 서버의 프로세스 수명 인메모리 상태입니다:
//!
//! - `neighbourhood`: 출발지 → 목적지 목록의 방향 인접 맵
//! - `participants`: 워크로드가 출발지/목적지로 관찰됐을 때의 마지막
//!   모듈 결과
//! - `sbom_urls`: 다이제스트 또는 호스트명 → 레지스트리 URL 인덱스
//!   (SBOM 스트림만이 채우며, 조회는 best-effort)
//!
//! 불변식:
//! - 인접 맵에 나타나는 모든 ID는 `participants`에 항목이 있다
//!   (간선보다 늦지 않게 생성됨)
//! - 한 이웃 목록에 같은 ID는 한 번만 나타난다 (재관찰은 타임스탬프 갱신)
//! - world 센티널은 저장된 간선의 양 끝에 나타나지 않는다 (엔진이
//!   사전에 걸러냄)

use std::collections::BTreeMap;
use std::time::SystemTime;

use cisin_core::safemap::SafeMap;
use cisin_core::types::{Analyse, Sbom};

/// 방향 간선의 목적지 항목
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Neighbour {
    /// 목적지 워크로드 ID
    pub id: String,
    /// 마지막 관찰 시각
    pub last_seen: SystemTime,
}

/// 워크로드의 마지막 관찰 모듈 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    /// 워크로드 ID
    pub id: String,
    /// 출발지로 관찰됐을 때의 모듈 결과
    pub src_results: BTreeMap<String, Analyse>,
    /// 목적지로 관찰됐을 때의 모듈 결과
    pub dest_results: BTreeMap<String, Analyse>,
    /// 마지막 갱신 시각
    pub timestamp: SystemTime,
}

impl Default for Participant {
    fn default() -> Self {
        Participant {
            id: String::default(),
            src_results: BTreeMap::default(),
            dest_results: BTreeMap::default(),
            timestamp: SystemTime::UNIX_EPOCH,
        }
    }
}

/// 연결 관찰의 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeOutcome {
    /// 새 간선이 추가됨
    Added,
    /// 기존 간선의 타임스탬프가 갱신됨
    Refreshed,
    /// 역방향 간선이 이미 존재하여 간선을 만들지 않음
    ReverseSuppressed,
}

/// 이웃 그래프
///
/// `Clone`은 같은 그래프에 대한 핸들을 공유합니다. 개별 연산은
/// [`SafeMap`]으로 직렬화되며, 읽기-수정-쓰기 구간의 짧은 비원자
/// 구간은 반복 관찰로 수렴합니다.
#[derive(Debug, Clone, Default)]
pub struct NeighbourhoodGraph {
    neighbourhood: SafeMap<String, Vec<Neighbour>>,
    participants: SafeMap<String, Participant>,
    sbom_urls: SafeMap<String, String>,
}

impl NeighbourhoodGraph {
    /// 빈 그래프를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// SBOM 메시지를 인덱스에 반영합니다.
    ///
    /// 이미지 SBOM은 다이제스트로, 호스트 SBOM은 호스트명으로
    /// 키를 잡습니다.
    pub fn record_sbom(&self, sbom: &Sbom) {
        if let Some(image) = &sbom.image {
            self.sbom_urls.set(image.digest.clone(), sbom.url.clone());

            tracing::trace!(key = %image.digest, url = %sbom.url, "sbom message received");
        }

        if let Some(host) = &sbom.host {
            self.sbom_urls.set(host.hostname.clone(), sbom.url.clone());

            tracing::trace!(key = %host.hostname, url = %sbom.url, "host sbom message received");
        }
    }

    /// 키에 대한 SBOM URL을 조회합니다.
    pub fn sbom_url(&self, key: &str) -> Option<String> {
        self.sbom_urls.get(&key.to_owned())
    }

    /// 번역과 드롭 판정이 끝난 연결을 그래프에 반영합니다.
    ///
    /// 참여자 갱신은 간선 판정과 무관하게 항상 수행됩니다. 간선은
    /// 역방향이 이미 존재하면 만들지 않고, 존재하면 타임스탬프만
    /// 갱신합니다.
    pub fn observe_connection(
        &self,
        src_id: &str,
        src_results: &BTreeMap<String, Analyse>,
        dest_id: &str,
        dest_results: &BTreeMap<String, Analyse>,
    ) -> EdgeOutcome {
        let now = SystemTime::now();

        // 출발지 참여자: srcResults 갱신, destResults 보존
        let existing_src = self.participants.get(&src_id.to_owned()).unwrap_or_default();
        self.participants.set(
            src_id.to_owned(),
            Participant {
                id: src_id.to_owned(),
                src_results: src_results.clone(),
                dest_results: existing_src.dest_results,
                timestamp: now,
            },
        );

        // 목적지 참여자: destResults 갱신, srcResults 보존
        let existing_dest = self
            .participants
            .get(&dest_id.to_owned())
            .unwrap_or_default();
        self.participants.set(
            dest_id.to_owned(),
            Participant {
                id: dest_id.to_owned(),
                src_results: existing_dest.src_results,
                dest_results: dest_results.clone(),
                timestamp: now,
            },
        );

        // 역방향 간선이 이미 이 쌍을 고정하고 있으면 양방향을 만들지 않음
        let dest_neighbourhood = self
            .neighbourhood
            .get(&dest_id.to_owned())
            .unwrap_or_default();
        if dest_neighbourhood.iter().any(|n| n.id == src_id) {
            return EdgeOutcome::ReverseSuppressed;
        }

        let mut neighbourhood = self
            .neighbourhood
            .get(&src_id.to_owned())
            .unwrap_or_default();

        let outcome = match neighbourhood.iter_mut().find(|n| n.id == dest_id) {
            Some(neighbour) => {
                neighbour.last_seen = now;
                EdgeOutcome::Refreshed
            }
            None => {
                neighbourhood.push(Neighbour {
                    id: dest_id.to_owned(),
                    last_seen: now,
                });
                EdgeOutcome::Added
            }
        };

        self.neighbourhood.set(src_id.to_owned(), neighbourhood);

        outcome
    }

    /// 인접 맵 키들의 스냅샷을 반환합니다.
    pub fn keys(&self) -> Vec<String> {
        self.neighbourhood.keys()
    }

    /// 워크로드의 이웃 목록을 반환합니다.
    pub fn neighbours(&self, id: &str) -> Vec<Neighbour> {
        self.neighbourhood.get(&id.to_owned()).unwrap_or_default()
    }

    /// 워크로드의 참여자 항목을 반환합니다.
    pub fn participant(&self, id: &str) -> Option<Participant> {
        self.participants.get(&id.to_owned())
    }

    /// 그래프에 알려진 워크로드 수를 반환합니다.
    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    /// 트레이스 루트를 찾습니다.
    ///
    /// 키 `k`는 다른 어떤 키의 이웃 목록에도 나타나지 않을 때
    /// 루트입니다. 순수 싱크와 사이클 구성원은 제외됩니다.
    pub fn find_roots(&self) -> Vec<String> {
        let keys = self.keys();
        let mut roots = Vec::new();

        for key in &keys {
            let mut root = true;

            for potential_caller in &keys {
                if key == potential_caller {
                    continue;
                }

                let neighbours = self
                    .neighbourhood
                    .get(potential_caller)
                    .unwrap_or_default();

                if neighbours.iter().any(|n| &n.id == key) {
                    root = false;
                    break;
                }
            }

            if root {
                roots.push(key.clone());
            }
        }

        roots
    }
}
