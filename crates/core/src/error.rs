//! 에러 타입 — 도메인별 에러 정의

/// CISIN 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum CisinError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 워크로드 ID 관련 에러
    #[error("id error: {0}")]
    Id(#[from] IdError),

    /// 와이어 인코딩/디코딩 에러
    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    /// 메시지 버스 에러
    #[error("bus error: {0}")]
    Bus(#[from] BusError),

    /// 클러스터 조회 에러
    #[error("cluster lookup error: {0}")]
    Lookup(#[from] LookupError),

    /// 모듈 생명주기 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// 플로우 에이전트 에러
    #[error("agent error: {0}")]
    Agent(#[from] AgentError),

    /// SBOM 생성/저장 에러
    #[error("sbom error: {0}")]
    Sbom(#[from] SbomError),

    /// 메트릭 파이프라인 에러
    #[error("metrics error: {0}")]
    Metrics(#[from] MetricsError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 워크로드 ID 관련 에러
///
/// `Invalid`와 `NotFound`는 호출자가 정책적으로 구분합니다.
/// 예를 들어 ID 번역은 `NotFound`에서 외부 워크로드 조회로 폴백합니다.
#[derive(Debug, thiserror::Error)]
pub enum IdError {
    /// `namespace/kind/name` 형식이 아님
    #[error("id {id} is invalid")]
    Invalid { id: String },

    /// 엔드포인트에서 ID를 유도할 수 없음
    #[error("could not evaluate k8s id: not found")]
    NotFound,
}

/// 와이어 인코딩/디코딩 에러
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// 입력이 중간에 끊김
    #[error("truncated message at offset {offset}")]
    Truncated { offset: usize },

    /// varint가 10바이트를 초과
    #[error("varint overflow at offset {offset}")]
    VarintOverflow { offset: usize },

    /// 필드에 예상하지 못한 와이어 타입
    #[error("unexpected wire type {wire_type} for field {field}")]
    UnexpectedWireType { field: u32, wire_type: u8 },

    /// 문자열 필드가 UTF-8이 아님
    #[error("field {field} is not valid utf-8")]
    InvalidUtf8 { field: u32 },
}

/// 메시지 버스 에러
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// 브로커 연결 실패
    #[error("bus connect failed: {0}")]
    Connect(String),

    /// 발행 실패
    #[error("publish failed: {0}")]
    Publish(String),

    /// 구독 생성 실패
    #[error("subscribe failed: {0}")]
    Subscribe(String),
}

/// 클러스터 조회 에러
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    /// 리소스가 존재하지 않음 — 호출자가 폴백 정책에 사용
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: String,
        namespace: String,
        name: String,
    },

    /// API 접근 실패 (NotFound 이외)
    #[error("cluster api error: {0}")]
    Api(String),
}

impl LookupError {
    /// `NotFound` 여부를 확인합니다.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// 모듈 생명주기 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 이미 실행 중
    #[error("pipeline already running")]
    AlreadyRunning,

    /// 실행 중이 아님
    #[error("pipeline not running")]
    NotRunning,

    /// 초기화 실패
    #[error("pipeline init failed: {0}")]
    InitFailed(String),

    /// 채널 전송 실패
    #[error("channel send failed: {0}")]
    ChannelSend(String),
}

/// 플로우 에이전트 에러
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// 플로우 스트림 에러
    #[error("flow source error: {0}")]
    Source(String),

    /// 에이전트 모듈 실행 실패
    #[error("module '{module}' failed: {reason}")]
    Module { module: String, reason: String },

    /// 설정에 알 수 없는 모듈 이름
    #[error("unknown agent module: {0}")]
    UnknownModule(String),
}

/// SBOM 생성/저장 에러
#[derive(Debug, thiserror::Error)]
pub enum SbomError {
    /// 레지스트리 요청 실패
    #[error("registry error: {0}")]
    Registry(String),

    /// SBOM 합성 실패
    #[error("synthesis failed: {0}")]
    Synthesis(String),

    /// 아티팩트 이름 유도 실패
    #[error("invalid artifact reference: {0}")]
    InvalidReference(String),

    /// 컨테이너 데몬 요청 실패
    #[error("container daemon error: {0}")]
    ContainerDaemon(String),
}

/// 메트릭 파이프라인 에러
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// 트레이스 API 요청 실패
    #[error("trace api error: {0}")]
    TraceApi(String),

    /// 취약점 스캔 실패
    #[error("scan failed: {0}")]
    Scan(String),

    /// 게이지 갱신 실패
    #[error("gauge update failed: {0}")]
    Gauge(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_error_display() {
        let err = IdError::Invalid {
            id: "only/two".to_owned(),
        };
        assert!(err.to_string().contains("only/two"));
    }

    #[test]
    fn lookup_error_not_found_predicate() {
        let err = LookupError::NotFound {
            kind: "Pod".to_owned(),
            namespace: "app".to_owned(),
            name: "web-0".to_owned(),
        };
        assert!(err.is_not_found());
        assert!(!LookupError::Api("boom".to_owned()).is_not_found());
    }

    #[test]
    fn errors_convert_to_cisin_error() {
        let err: CisinError = IdError::NotFound.into();
        assert!(matches!(err, CisinError::Id(IdError::NotFound)));

        let err: CisinError = BusError::Publish("closed".to_owned()).into();
        assert!(matches!(err, CisinError::Bus(_)));

        let err: CisinError = PipelineError::AlreadyRunning.into();
        assert!(matches!(
            err,
            CisinError::Pipeline(PipelineError::AlreadyRunning)
        ));
    }

    #[test]
    fn wire_error_display_carries_field() {
        let err = WireError::UnexpectedWireType {
            field: 3,
            wire_type: 5,
        };
        let msg = err.to_string();
        assert!(msg.contains('3'));
        assert!(msg.contains('5'));
    }
}
