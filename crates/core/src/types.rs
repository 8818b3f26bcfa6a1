//! 도메인 타입 — 시스템 전역에서 사용되는 공통 타입
//!
//! 수집 계층의 플로우 레코드([`Flow`])와 버스를 통해 교환되는
//! 분석 결과 타입([`Workload`], [`Connection`], [`Sbom`])을 정의합니다.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// 트레이스 span에서 SBOM URL 목록을 담는 태그 키
pub const SBOMS_TRACE_TAG: &str = "sboms";

/// 워크로드 분류
///
/// 와이어 판별값은 고정되어 있습니다 (`KUBERNETES=0`, `HOST=1`, `WORLD=2`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkloadType {
    /// 클러스터 내 Kubernetes 워크로드
    #[default]
    Kubernetes,
    /// 외부 메시 멤버로 등록된 노드
    Host,
    /// 메시 바깥의 모든 것
    World,
}

impl WorkloadType {
    /// 와이어 판별값으로 변환합니다.
    pub fn to_wire(self) -> u64 {
        match self {
            Self::Kubernetes => 0,
            Self::Host => 1,
            Self::World => 2,
        }
    }

    /// 와이어 판별값에서 변환합니다. 알 수 없는 값은 `None`입니다.
    pub fn from_wire(value: u64) -> Option<Self> {
        match value {
            0 => Some(Self::Kubernetes),
            1 => Some(Self::Host),
            2 => Some(Self::World),
            _ => None,
        }
    }
}

impl fmt::Display for WorkloadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kubernetes => write!(f, "kubernetes"),
            Self::Host => write!(f, "host"),
            Self::World => write!(f, "world"),
        }
    }
}

/// 에이전트 모듈 하나의 분석 결과
///
/// 문자열 리스트의 순서는 모듈의 삽입 순서이며, 서버는 내용을
/// 불투명하게 취급합니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analyse {
    /// 모듈이 산출한 결과 목록
    pub results: Vec<String>,
}

impl Analyse {
    /// 결과 목록으로 새 분석 결과를 생성합니다.
    pub fn new(results: Vec<String>) -> Self {
        Self { results }
    }
}

/// 분석이 끝난 워크로드 레코드
///
/// `results`는 모듈명 → 분석 결과 매핑입니다. 결과를 내지 않은
/// 모듈은 항목 자체가 없습니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workload {
    /// 정규화된 워크로드 ID (`namespace/kind/name`)
    pub id: String,
    /// 워크로드 분류
    pub workload_type: WorkloadType,
    /// 모듈명 → 분석 결과
    pub results: BTreeMap<String, Analyse>,
}

impl fmt::Display for Workload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}, {} module results)",
            self.id,
            self.workload_type,
            self.results.len(),
        )
    }
}

/// 워크로드 간에 관찰된 연결
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    /// 연결을 시작한 워크로드
    pub source: Workload,
    /// 연결 대상 워크로드
    pub destination: Workload,
    /// 플로우를 관찰한 노드명
    pub host: String,
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} (host: {})",
            self.source.id, self.destination.id, self.host,
        )
    }
}

/// 컨테이너 이미지 참조 (SBOM 메시지용)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    /// 정규화된 이미지 이름
    pub image: String,
    /// 이미지 다이제스트 (`algo:hex`)
    pub digest: String,
}

/// 호스트 참조 (SBOM 메시지용)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    /// 호스트명
    pub hostname: String,
}

/// 생성된 SBOM에 대한 버스 메시지
///
/// `image`와 `host`는 존재 여부로 구분되는 태그드 유니온입니다.
/// 둘 중 정확히 하나만 설정됩니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sbom {
    /// 이미지에서 생성된 경우
    pub image: Option<Image>,
    /// 호스트 파일시스템에서 생성된 경우
    pub host: Option<Host>,
    /// 레지스트리 내 아티팩트 위치
    pub url: String,
}

impl Sbom {
    /// 이미지 기반 SBOM 메시지를 생성합니다.
    pub fn for_image(image: impl Into<String>, digest: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            image: Some(Image {
                image: image.into(),
                digest: digest.into(),
            }),
            host: None,
            url: url.into(),
        }
    }

    /// 호스트 기반 SBOM 메시지를 생성합니다.
    pub fn for_host(hostname: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            image: None,
            host: Some(Host {
                hostname: hostname.into(),
            }),
            url: url.into(),
        }
    }
}

impl fmt::Display for Sbom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.image, &self.host) {
            (Some(image), _) => write!(f, "sbom image={} url={}", image.digest, self.url),
            (None, Some(host)) => write!(f, "sbom host={} url={}", host.hostname, self.url),
            (None, None) => write!(f, "sbom url={}", self.url),
        }
    }
}

/// 플로우 엔드포인트에 붙은 워크로드 참조
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadRef {
    /// 워크로드 종류 (Deployment, StatefulSet 등)
    pub kind: String,
    /// 워크로드 이름
    pub name: String,
}

/// 플로우의 한쪽 끝
///
/// 플로우 소스가 엔드포인트마다 부여하는 안정적인 숫자 identity와
/// 레이블 집합, 선택적 pod/워크로드 메타데이터를 담습니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowEndpoint {
    /// 플로우 소스가 부여한 안정적인 숫자 identity
    pub identity: u64,
    /// 네임스페이스 (없으면 빈 문자열)
    pub namespace: String,
    /// pod 이름 (없으면 빈 문자열)
    pub pod_name: String,
    /// 엔드포인트 레이블 (`reserved:world`, `k8s:...` 등)
    pub labels: Vec<String>,
    /// 연결된 워크로드 참조
    pub workloads: Vec<WorkloadRef>,
}

impl FlowEndpoint {
    /// 레이블 보유 여부를 확인합니다.
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}

/// L3 주소 쌍
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpPair {
    /// 출발지 IP
    pub source: String,
    /// 목적지 IP
    pub destination: String,
}

/// L4 TCP 포트 쌍
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcpPair {
    /// 출발지 포트
    pub source_port: u16,
    /// 목적지 포트
    pub destination_port: u16,
}

/// 수집 계층의 네트워크 플로우 레코드
///
/// 플로우 소스(메시 관측 플레인)에서 수신한 그대로의 레코드입니다.
/// 선택 필드가 비어 있을 수 있으며, 파이프라인의 필터 단계가
/// 불완전한 레코드를 걸러냅니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flow {
    /// 플로우 고유 ID
    pub uuid: String,
    /// 플로우를 관찰한 노드 (`cluster/node` 형식)
    pub node_name: String,
    /// 응답 방향 여부
    pub is_reply: bool,
    /// L3 정보
    pub ip: Option<IpPair>,
    /// L4 TCP 정보
    pub tcp: Option<TcpPair>,
    /// 출발지 엔드포인트
    pub source: Option<FlowEndpoint>,
    /// 목적지 엔드포인트
    pub destination: Option<FlowEndpoint>,
}
