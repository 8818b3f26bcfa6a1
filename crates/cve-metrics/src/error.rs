//! 취약점 메트릭 서비스 에러 타입

use cisin_core::error::{CisinError, ConfigError, MetricsError, PipelineError};
use cisin_sbom::SbomServiceError;

/// 취약점 메트릭 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum CveMetricsError {
    /// 트레이스 API 요청 실패
    #[error("trace api error: {0}")]
    TraceApi(String),

    /// 트레이스 문서 파싱 실패
    #[error("trace parse error: {0}")]
    TraceParse(String),

    /// 취약점 스캐너 실행 실패
    #[error("scan failed: {0}")]
    Scan(String),

    /// 스캔 결과 파싱 실패
    #[error("scan report parse error: {0}")]
    ScanParse(String),

    /// SBOM 아티팩트 접근 실패
    #[error("sbom error: {0}")]
    Sbom(#[from] SbomServiceError),

    /// 게이지 갱신 실패
    #[error("gauge error: {0}")]
    Gauge(String),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 생명주기 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// 파일 I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<CveMetricsError> for CisinError {
    fn from(err: CveMetricsError) -> Self {
        match err {
            CveMetricsError::TraceApi(msg) | CveMetricsError::TraceParse(msg) => {
                CisinError::Metrics(MetricsError::TraceApi(msg))
            }
            CveMetricsError::Scan(msg) | CveMetricsError::ScanParse(msg) => {
                CisinError::Metrics(MetricsError::Scan(msg))
            }
            CveMetricsError::Sbom(err) => err.into(),
            CveMetricsError::Gauge(msg) => CisinError::Metrics(MetricsError::Gauge(msg)),
            CveMetricsError::Config { field, reason } => {
                CisinError::Config(ConfigError::InvalidValue { field, reason })
            }
            CveMetricsError::Pipeline(err) => CisinError::Pipeline(err),
            CveMetricsError::Io(err) => CisinError::Io(err),
        }
    }
}
