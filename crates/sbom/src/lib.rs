//! # cisin-sbom
//!
//! SBOM 아티팩트 저장과 생성 파이프라인입니다. 내용 주소 기반
//! "한 번 빌드, 재사용" 프로토콜로 컨테이너 이미지와 호스트
//! 파일시스템의 SBOM을 OCI 레지스트리에 저장하고, 생성 결과를
//! 버스에 발행합니다.
//!
//! - [`artifact`] — 단일 레이어 OCI 아티팩트 모델
//! - [`registry`] — 레지스트리 추상화
//! - [`container`] — 컨테이너 데몬 추상화
//! - [`synth`] — SBOM 합성 추상화 (외부 도구 구동)
//! - [`generator`] — 생성 서비스 (이미지/호스트 변형)
//! - [`scheduler`] — 주기 구동 스케줄러

pub mod artifact;
pub mod container;
pub mod error;
pub mod generator;
pub mod registry;
pub mod scheduler;
pub mod synth;

pub use artifact::{
    CONFIG_MEDIA_TYPE, CYCLONEDX_JSON_MEDIA_TYPE, MANIFEST_MEDIA_TYPE, SPDX_JSON_MEDIA_TYPE,
    SbomArtifact, SbomLayer,
};
pub use container::{ContainerDaemon, ContainerImage, StaticContainerDaemon};
pub use error::SbomServiceError;
pub use generator::{HostSbomGenerator, ImageSbomGenerator, SbomGenerator};
pub use registry::{MemoryRegistry, Registry};
pub use scheduler::{HostSbomScheduler, K8sSbomScheduler, SbomSchedulerConfig};
pub use synth::{CommandSbomSynth, SbomSynth, StaticSbomSynth};
