//! # cisin-core
//!
//! CISIN 워크스페이스의 공유 기반 크레이트입니다.
//!
//! - 도메인 타입과 와이어 코덱 ([`types`], [`wire`])
//! - 워크로드 ID 코덱 ([`id`])
//! - 스레드 안전 맵 ([`safemap`])
//! - 메시지 버스 추상화 ([`bus`])
//! - 클러스터 조회 추상화 ([`cluster`])
//! - 모듈 생명주기 trait ([`pipeline`])
//! - 설정과 에러 ([`config`], [`error`])

pub mod bus;
pub mod cluster;
pub mod config;
pub mod error;
pub mod id;
pub mod imageref;
pub mod metrics;
pub mod pipeline;
pub mod safemap;
pub mod types;
pub mod wire;

// --- 주요 타입 re-export ---
// 각 모듈의 핵심 타입을 크레이트 루트에서 바로 사용할 수 있도록 합니다.

// 에러
pub use error::{
    AgentError, BusError, CisinError, ConfigError, IdError, LookupError, MetricsError,
    PipelineError, SbomError, WireError,
};

// 설정
pub use config::CisinConfig;

// 도메인 타입
pub use types::{
    Analyse, Connection, Flow, FlowEndpoint, Host, Image, Sbom, Workload, WorkloadType,
};

// 와이어 코덱
pub use wire::WireMessage;

// 버스
pub use bus::{MemoryBus, MessageBus, NoopBus};

// 동시성 프리미티브
pub use safemap::{SafeMap, SafeMapTtl};

// 생명주기 trait
pub use pipeline::{BoxFuture, DynPipeline, HealthStatus, Pipeline};
