//! SBOM 생성 서비스 — 내용 주소 기반 "한 번 빌드, 재사용" 프로토콜
//!
//! [`SbomGenerator::generate`]는 식별자에 대한 레지스트리 내 SBOM
//! 아티팩트 URL을 반환합니다. 공통 프로토콜:
//!
//! 1. 식별자(이미지는 다이제스트 포함)에서 안정적인 아티팩트 이름 계산
//! 2. 레지스트리 `exists` 조회 — 있으면 그 이름 반환 (작업 없음)
//! 3. 이미지는 원격 SBOM 탐색 사이드 채널 시도
//! 4. 없으면 합성 → 단일 레이어 아티팩트로 래핑 → 푸시 → 이름 반환
//!
//! 같은 지문에 대한 동시 빌드는 키별 single-flight 가드로 한 번만
//! 수행됩니다.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use cisin_core::imageref;
use cisin_core::pipeline::BoxFuture;

use crate::artifact::SbomArtifact;
use crate::container::ContainerDaemon;
use crate::error::SbomServiceError;
use crate::registry::Registry;
use crate::synth::SbomSynth;

/// 다이제스트는 `algo:hex` 두 조각이어야 함
const DIGEST_SPLIT_LENGTH: usize = 2;

/// SBOM 생성 서비스 인터페이스
pub trait SbomGenerator: Send + Sync {
    /// 식별자에 대한 SBOM 아티팩트 URL을 반환합니다.
    fn generate<'a>(&'a self, identifier: &'a str)
        -> BoxFuture<'a, Result<String, SbomServiceError>>;
}

/// 키별 single-flight 가드
///
/// 같은 아티팩트 이름에 대한 generate 호출을 직렬화합니다.
#[derive(Default)]
struct SingleFlight {
    keys: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl SingleFlight {
    fn key_lock(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut keys = self.keys.lock().expect("single flight lock poisoned");
        Arc::clone(keys.entry(key.to_owned()).or_default())
    }
}

/// 컨테이너 이미지 기반 SBOM 생성 서비스
pub struct ImageSbomGenerator {
    container_daemon: Arc<dyn ContainerDaemon>,
    registry: Arc<dyn Registry>,
    synth: Arc<dyn SbomSynth>,
    media_type: String,
    single_flight: SingleFlight,
}

impl ImageSbomGenerator {
    /// 새 생성 서비스를 만듭니다.
    pub fn new(
        container_daemon: Arc<dyn ContainerDaemon>,
        registry: Arc<dyn Registry>,
        synth: Arc<dyn SbomSynth>,
        media_type: impl Into<String>,
    ) -> Self {
        Self {
            container_daemon,
            registry,
            synth,
            media_type: media_type.into(),
            single_flight: SingleFlight::default(),
        }
    }

    /// 이미지 참조와 다이제스트에서 아티팩트 이름을 계산합니다.
    ///
    /// `<registry-root>/<repository(콜론을 대시로)>:<digestHex>`
    fn artifact_name(&self, reference: &str, digest: &str) -> Result<String, SbomServiceError> {
        let repository = imageref::repository(reference).replace(':', "-");

        let split: Vec<&str> = digest.split(':').collect();
        if split.len() != DIGEST_SPLIT_LENGTH {
            return Err(SbomServiceError::InvalidReference(format!(
                "digest '{digest}' is not algo:hex"
            )));
        }

        Ok(format!("{}/{}:{}", self.registry.url(), repository, split[1]))
    }
}

impl SbomGenerator for ImageSbomGenerator {
    fn generate<'a>(
        &'a self,
        identifier: &'a str,
    ) -> BoxFuture<'a, Result<String, SbomServiceError>> {
        Box::pin(async move {
            let digest = self.container_daemon.get_digest(identifier).await?;
            let name = self.artifact_name(identifier, &digest)?;

            let key_lock = self.single_flight.key_lock(&name);
            let _guard = key_lock.lock().await;

            // 이미 빌드된 아티팩트는 재사용
            if self.registry.exists(&name).await? {
                return Ok(name);
            }

            // 이미지 제공자가 SBOM을 첨부해 두었는지 확인
            if let Ok(remote) = self.synth.remote_sbom_url(identifier).await {
                return Ok(remote);
            }

            tracing::info!(image = %identifier, "need to generate SBOM");

            let data = self.synth.synthesize(identifier).await?;
            let artifact = SbomArtifact::single_layer(data, self.media_type.clone());

            tracing::info!(target = %name, "SBOM location");

            self.registry.push(&name, &artifact).await?;

            Ok(name)
        })
    }
}

/// 호스트 파일시스템 기반 SBOM 생성 서비스
///
/// 아티팩트 이름은 노드 이름으로 고정됩니다
/// (`<registry-root>/<node-name>`).
pub struct HostSbomGenerator {
    registry: Arc<dyn Registry>,
    synth: Arc<dyn SbomSynth>,
    media_type: String,
    node_name: String,
    single_flight: SingleFlight,
}

impl HostSbomGenerator {
    /// 새 생성 서비스를 만듭니다.
    pub fn new(
        node_name: impl Into<String>,
        registry: Arc<dyn Registry>,
        synth: Arc<dyn SbomSynth>,
        media_type: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            synth,
            media_type: media_type.into(),
            node_name: node_name.into(),
            single_flight: SingleFlight::default(),
        }
    }
}

impl SbomGenerator for HostSbomGenerator {
    fn generate<'a>(
        &'a self,
        identifier: &'a str,
    ) -> BoxFuture<'a, Result<String, SbomServiceError>> {
        Box::pin(async move {
            tracing::info!(host = %self.node_name, "generate host sbom");

            let name = format!("{}/{}", self.registry.url(), self.node_name);

            let key_lock = self.single_flight.key_lock(&name);
            let _guard = key_lock.lock().await;

            if self.registry.exists(&name).await? {
                return Ok(name);
            }

            let data = self.synth.synthesize(identifier).await?;
            let artifact = SbomArtifact::single_layer(data, self.media_type.clone());

            tracing::info!(target = %name, "SBOM location");

            self.registry.push(&name, &artifact).await?;

            Ok(name)
        })
    }
}
