//! 취약점 메트릭 서비스 설정

use std::time::Duration;

use cisin_core::config::MetricsConfig;
use cisin_sbom::SPDX_JSON_MEDIA_TYPE;

use crate::error::CveMetricsError;

/// 취약점 메트릭 서비스 설정
#[derive(Debug, Clone)]
pub struct CveMetricsConfig {
    /// CVE 게이지를 노출할 주소
    pub address: String,
    /// 갱신 주기
    pub update_interval: Duration,
    /// 트레이스 API 기본 URL
    pub trace_api_url: String,
    /// 조회할 트레이스 서비스 이름
    pub service_name: String,
    /// 트레이스 조회 시간 창
    pub history_limit: Duration,
    /// 취약점 스캐너 명령어
    pub scanner_command: String,
    /// SBOM 레이어 미디어 타입
    pub media_type: String,
}

impl Default for CveMetricsConfig {
    fn default() -> Self {
        let mut config = Self::from_core(&MetricsConfig::default());
        config.media_type = SPDX_JSON_MEDIA_TYPE.to_owned();
        config
    }
}

impl CveMetricsConfig {
    /// core의 `MetricsConfig`에서 설정을 생성합니다.
    ///
    /// `media_type`은 SBOM 설정과 일치해야 하므로 호출자가 따로
    /// 채웁니다 (기본값은 SPDX JSON).
    pub fn from_core(core: &MetricsConfig) -> Self {
        Self {
            address: core.address.clone(),
            update_interval: core.update_interval(),
            trace_api_url: core.trace_api_url.clone(),
            service_name: core.service_name.clone(),
            history_limit: core.history_limit(),
            scanner_command: core.scanner_command.clone(),
            media_type: SPDX_JSON_MEDIA_TYPE.to_owned(),
        }
    }

    /// 설정 값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), CveMetricsError> {
        if self.address.is_empty() {
            return Err(CveMetricsError::Config {
                field: "address".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        if self.update_interval.is_zero() {
            return Err(CveMetricsError::Config {
                field: "update_interval".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.service_name.is_empty() {
            return Err(CveMetricsError::Config {
                field: "service_name".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        Ok(())
    }
}
