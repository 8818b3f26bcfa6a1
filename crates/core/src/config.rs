//! 설정 관리 — cisin.toml 파싱, 환경 변수 오버라이드, 검증
//!
//! 모든 역할(agent, server, metrics)이 하나의 설정 파일을 공유하며,
//! 각 역할은 자신의 섹션만 사용합니다. 파일의 모든 필드는 선택이고
//! 기본값이 내장되어 있으므로 부분 설정 파일도 유효합니다.
//!
//! 로드 순서: 파일 → `CISIN_` 접두어 환경 변수 → `validate()`.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// 기본 설정 파일 경로
pub const DEFAULT_CONFIG_PATH: &str = "/etc/cisin/cisin.toml";

/// CISIN 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CisinConfig {
    /// 일반 설정
    pub general: GeneralConfig,
    /// 메시지 버스 설정
    pub bus: BusConfig,
    /// 플로우 에이전트 설정
    pub agent: AgentConfig,
    /// SBOM 생성 설정
    pub sbom: SbomConfig,
    /// 상관관계 서버 설정
    pub server: ServerConfig,
    /// 취약점 메트릭 설정
    pub metrics: MetricsConfig,
    /// Prometheus 리코더 설정
    pub telemetry: TelemetryConfig,
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// 메시지 버스 설정
///
/// 브로커 기반 어댑터(NATS 등)는 `MessageBus` trait 뒤의 외부
/// 협력자이며, `address`는 그런 어댑터를 위해 예약되어 있습니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// 버스 종류 (memory, noop)
    pub kind: String,
    /// 브로커 주소 (브로커 기반 어댑터용)
    pub address: String,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            kind: "memory".to_owned(),
            address: "localhost:4222".to_owned(),
        }
    }
}

/// 플로우 에이전트 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Kubernetes 클러스터 이름 (agent 역할에서 필수)
    pub cluster_name: String,
    /// 노드 이름 (비어 있으면 호스트명 사용)
    pub node_name: String,
    /// 노드 유형 (k8s, host)
    pub node_type: String,
    /// 연결 메시지를 발행할 subject
    pub connection_subject: String,
    /// 플로우 재전송 억제 시간 (초)
    pub cache_ttl_secs: u64,
    /// 중복 제거 캐시 스위퍼 주기 (초)
    pub cache_sweep_interval_secs: u64,
    /// 플로우 출발지에 적용할 모듈
    pub src_modules: Vec<String>,
    /// 플로우 목적지에 적용할 모듈
    pub dest_modules: Vec<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            cluster_name: String::new(),
            node_name: String::new(),
            node_type: "k8s".to_owned(),
            connection_subject: "hubble".to_owned(),
            cache_ttl_secs: 30,
            cache_sweep_interval_secs: 60,
            src_modules: vec!["k8s_image".to_owned(), "k8s_digest".to_owned()],
            dest_modules: vec!["k8s_image".to_owned(), "k8s_digest".to_owned()],
        }
    }
}

impl AgentConfig {
    /// 캐시 TTL을 반환합니다.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// 캐시 스위퍼 주기를 반환합니다.
    pub fn cache_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.cache_sweep_interval_secs)
    }
}

/// SBOM 생성 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SbomConfig {
    /// SBOM 생성 활성화 여부
    pub generate: bool,
    /// 생성 주기 (초)
    pub generation_interval_secs: u64,
    /// SBOM 메시지를 발행할 subject
    pub subject: String,
    /// 호스트 SBOM 생성 시 파일시스템 루트
    pub fs_root: String,
    /// SBOM 레이어 미디어 타입
    pub media_type: String,
    /// OCI 레지스트리 루트 URL
    pub registry_url: String,
    /// 레지스트리 사용자명
    pub registry_username: String,
    /// 레지스트리 시크릿
    pub registry_secret: String,
    /// 레지스트리 TLS 검증 생략 여부
    pub registry_insecure: bool,
    /// SBOM 합성 도구 명령어
    pub synth_command: String,
    /// 원격 SBOM 탐색 명령어 (비어 있으면 비활성)
    pub discovery_command: String,
}

impl Default for SbomConfig {
    fn default() -> Self {
        Self {
            generate: true,
            generation_interval_secs: 30,
            subject: "sbom".to_owned(),
            fs_root: "/host".to_owned(),
            media_type: "application/vnd.spdx+json".to_owned(),
            registry_url: "harbor.cisin.svc.cluster.local:80/cisin".to_owned(),
            registry_username: "cisin".to_owned(),
            registry_secret: String::new(),
            registry_insecure: true,
            synth_command: "syft".to_owned(),
            discovery_command: String::new(),
        }
    }
}

impl SbomConfig {
    /// 생성 주기를 반환합니다.
    pub fn generation_interval(&self) -> Duration {
        Duration::from_secs(self.generation_interval_secs)
    }
}

/// 상관관계 서버 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 메시지 처리 워커 수
    pub wp_size: usize,
    /// 처리 대기열 최대 크기
    pub wp_max_queue_size: usize,
    /// 연결 메시지 subject
    pub connection_subject: String,
    /// SBOM 메시지 subject
    pub sbom_subject: String,
    /// 연결 메시지 큐 그룹
    pub connection_queue: String,
    /// SBOM 메시지 큐 그룹
    pub sbom_queue: String,
    /// 처리에서 제외할 워크로드 ID
    pub exclude_workloads: Vec<String>,
    /// 트레이스 생성 주기 (초)
    pub trace_interval_secs: u64,
    /// 합성된 world 부모 span으로 루트를 감쌀지 여부
    pub world_root: bool,
    /// 트레이스 서비스 이름
    pub service_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            wp_size: 50,
            wp_max_queue_size: 1000,
            connection_subject: "hubble".to_owned(),
            sbom_subject: "sbom".to_owned(),
            connection_queue: "hubble".to_owned(),
            sbom_queue: "sbom".to_owned(),
            exclude_workloads: vec![
                "cisin/DaemonSet/cisin-agent".to_owned(),
                "cisin/StatefulSet/cisin-nats".to_owned(),
                "cisin/Deployment/cisin-server".to_owned(),
            ],
            trace_interval_secs: 60,
            world_root: false,
            service_name: "cisin".to_owned(),
        }
    }
}

impl ServerConfig {
    /// 트레이스 생성 주기를 반환합니다.
    pub fn trace_interval(&self) -> Duration {
        Duration::from_secs(self.trace_interval_secs)
    }
}

/// 취약점 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// CVE 게이지를 노출할 주소
    pub address: String,
    /// 갱신 주기 (초)
    pub update_interval_secs: u64,
    /// 트레이스 API 주소 (Jaeger)
    pub trace_api_url: String,
    /// 조회할 트레이스 서비스 이름
    pub service_name: String,
    /// 트레이스 조회 시간 창 (초)
    pub history_limit_secs: u64,
    /// 취약점 스캐너 명령어
    pub scanner_command: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0:2112".to_owned(),
            update_interval_secs: 3600,
            trace_api_url: "http://localhost:14268".to_owned(),
            service_name: "cisin".to_owned(),
            history_limit_secs: 3600,
            scanner_command: "grype".to_owned(),
        }
    }
}

impl MetricsConfig {
    /// 갱신 주기를 반환합니다.
    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_secs)
    }

    /// 트레이스 조회 시간 창을 반환합니다.
    pub fn history_limit(&self) -> Duration {
        Duration::from_secs(self.history_limit_secs)
    }
}

/// Prometheus 리코더 설정 (agent/server 역할의 운영 메트릭)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// 리코더 활성화 여부
    pub enabled: bool,
    /// 수신 주소
    pub listen_addr: String,
    /// 수신 포트
    pub port: u16,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9184,
        }
    }
}

impl CisinConfig {
    /// 설정 파일을 로드하고 환경 변수 오버라이드를 적용합니다.
    ///
    /// 파일이 존재하지 않으면 `ConfigError::FileNotFound`입니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|_| ConfigError::FileNotFound {
                path: path.display().to_string(),
            })?;

        let mut config: Self = toml::from_str(&raw).map_err(|e| ConfigError::ParseFailed {
            reason: e.to_string(),
        })?;

        config.apply_env_overrides();

        Ok(config)
    }

    /// 기본값에 환경 변수 오버라이드만 적용한 설정을 반환합니다.
    ///
    /// 설정 파일 없이 실행할 때 사용합니다.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// `CISIN_` 접두어 환경 변수를 적용합니다.
    pub fn apply_env_overrides(&mut self) {
        override_string("CISIN_LOG_LEVEL", &mut self.general.log_level);
        override_string("CISIN_LOG_FORMAT", &mut self.general.log_format);
        override_string("CISIN_BUS_KIND", &mut self.bus.kind);
        override_string("CISIN_BUS_ADDRESS", &mut self.bus.address);

        override_string("CISIN_CLUSTER_NAME", &mut self.agent.cluster_name);
        override_string("CISIN_NODE_NAME", &mut self.agent.node_name);
        override_string("CISIN_NODE_TYPE", &mut self.agent.node_type);
        override_string(
            "CISIN_CONNECTION_SUBJECT",
            &mut self.agent.connection_subject,
        );
        override_u64("CISIN_CACHE_TTL", &mut self.agent.cache_ttl_secs);
        override_list("CISIN_SRC_MODULES", &mut self.agent.src_modules);
        override_list("CISIN_DEST_MODULES", &mut self.agent.dest_modules);

        override_u64(
            "CISIN_SBOM_GENERATION_INTERVAL",
            &mut self.sbom.generation_interval_secs,
        );
        override_string("CISIN_SBOM_SUBJECT", &mut self.sbom.subject);
        override_string("CISIN_SBOM_FS_ROOT", &mut self.sbom.fs_root);
        override_string("CISIN_REGISTRY_URL", &mut self.sbom.registry_url);
        override_string("CISIN_REGISTRY_USERNAME", &mut self.sbom.registry_username);
        override_string("CISIN_REGISTRY_SECRET", &mut self.sbom.registry_secret);

        override_usize("CISIN_WORKER_POOL_SIZE", &mut self.server.wp_size);
        override_usize(
            "CISIN_WORKER_POOL_MAX_QUEUE_SIZE",
            &mut self.server.wp_max_queue_size,
        );
        override_list("CISIN_EXCLUDE_WORKLOADS", &mut self.server.exclude_workloads);

        override_string("CISIN_METRICS_ADDRESS", &mut self.metrics.address);
        override_string("CISIN_TRACE_API_URL", &mut self.metrics.trace_api_url);
        override_u64(
            "CISIN_METRICS_UPDATE_INTERVAL",
            &mut self.metrics.update_interval_secs,
        );
    }

    /// 설정 값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.general.log_format.as_str(), "json" | "pretty") {
            return Err(invalid("general.log_format", "expected 'json' or 'pretty'"));
        }

        if !matches!(self.bus.kind.as_str(), "memory" | "noop") {
            return Err(invalid("bus.kind", "expected 'memory' or 'noop'"));
        }

        if !matches!(self.agent.node_type.as_str(), "k8s" | "host") {
            return Err(invalid("agent.node_type", "expected 'k8s' or 'host'"));
        }

        if self.agent.cache_ttl_secs == 0 {
            return Err(invalid("agent.cache_ttl_secs", "must be greater than 0"));
        }

        if self.agent.connection_subject.is_empty() {
            return Err(invalid("agent.connection_subject", "must not be empty"));
        }

        if self.sbom.subject.is_empty() {
            return Err(invalid("sbom.subject", "must not be empty"));
        }

        if self.sbom.generation_interval_secs == 0 {
            return Err(invalid(
                "sbom.generation_interval_secs",
                "must be greater than 0",
            ));
        }

        if self.server.wp_size == 0 {
            return Err(invalid("server.wp_size", "must be greater than 0"));
        }

        if self.server.wp_max_queue_size == 0 {
            return Err(invalid("server.wp_max_queue_size", "must be greater than 0"));
        }

        if self.server.trace_interval_secs == 0 {
            return Err(invalid(
                "server.trace_interval_secs",
                "must be greater than 0",
            ));
        }

        if self.metrics.update_interval_secs == 0 {
            return Err(invalid(
                "metrics.update_interval_secs",
                "must be greater than 0",
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.to_owned(),
    }
}

fn override_string(key: &str, target: &mut String) {
    if let Ok(value) = std::env::var(key) {
        *target = value;
    }
}

fn override_u64(key: &str, target: &mut u64) {
    if let Ok(value) = std::env::var(key) {
        if let Ok(parsed) = value.parse() {
            *target = parsed;
        }
    }
}

fn override_usize(key: &str, target: &mut usize) {
    if let Ok(value) = std::env::var(key) {
        if let Ok(parsed) = value.parse() {
            *target = parsed;
        }
    }
}

fn override_list(key: &str, target: &mut Vec<String>) {
    if let Ok(value) = std::env::var(key) {
        *target = value
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::to_owned)
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        CisinConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let config: CisinConfig = toml::from_str(
            r#"
            [agent]
            cluster_name = "prod"
            cache_ttl_secs = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.agent.cluster_name, "prod");
        assert_eq!(config.agent.cache_ttl_secs, 10);
        assert_eq!(config.agent.connection_subject, "hubble");
        assert_eq!(config.server.wp_size, 50);
    }

    #[test]
    fn validate_rejects_unknown_log_format() {
        let mut config = CisinConfig::default();
        config.general.log_format = "xml".to_owned();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_cache_ttl() {
        let mut config = CisinConfig::default();
        config.agent.cache_ttl_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_worker_pool() {
        let mut config = CisinConfig::default();
        config.server.wp_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_unknown_bus_kind() {
        let mut config = CisinConfig::default();
        config.bus.kind = "nats".to_owned();
        assert!(config.validate().is_err());
    }

    #[test]
    fn duration_accessors() {
        let config = CisinConfig::default();
        assert_eq!(config.agent.cache_ttl(), Duration::from_secs(30));
        assert_eq!(config.server.trace_interval(), Duration::from_secs(60));
        assert_eq!(config.metrics.update_interval(), Duration::from_secs(3600));
    }

    #[tokio::test]
    async fn load_missing_file_is_not_found() {
        let err = CisinConfig::load("/nonexistent/cisin.toml")
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }
}
