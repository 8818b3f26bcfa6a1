//! 트레이스 API 클라이언트 — 트레이싱 백엔드에서 트레이스 읽기
//!
//! [`TraceApi`]는 Jaeger 형태의 트레이스 문서를 반환합니다.
//! [`HttpTraceApi`]는 `GET /api/traces?service=<name>&start_time_max=<ts>`
//! 와 `GET /api/traces/<id>`를 사용합니다.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use cisin_core::pipeline::BoxFuture;
use cisin_core::types::SBOMS_TRACE_TAG;

use crate::error::CveMetricsError;

/// 트레이스 API 응답 문서
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceDocument {
    /// 트레이스 목록
    #[serde(default)]
    pub data: Vec<TraceData>,
}

/// 트레이스 하나
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceData {
    /// 트레이스 ID
    #[serde(rename = "traceID")]
    pub trace_id: String,
    /// span 목록
    #[serde(default)]
    pub spans: Vec<TraceSpan>,
    /// 프로세스 정보
    #[serde(default)]
    pub processes: BTreeMap<String, TraceProcess>,
}

/// 트레이스 내 span
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceSpan {
    /// 트레이스 ID
    #[serde(rename = "traceID", default)]
    pub trace_id: String,
    /// span ID
    #[serde(rename = "spanID", default)]
    pub span_id: String,
    /// 연산 이름 — 워크로드 ID
    #[serde(rename = "operationName")]
    pub operation_name: String,
    /// 부모 참조
    #[serde(default)]
    pub references: Vec<TraceSpanReference>,
    /// 시작 시각 (마이크로초)
    #[serde(rename = "startTime", default)]
    pub start_time: i64,
    /// 지속 시간 (마이크로초)
    #[serde(default)]
    pub duration: i64,
    /// span 태그
    #[serde(default)]
    pub tags: Vec<TraceTag>,
    /// 프로세스 ID
    #[serde(rename = "processID", default)]
    pub process_id: String,
}

/// span 태그
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceTag {
    /// 태그 키
    pub key: String,
    /// 태그 값 타입
    #[serde(rename = "type", default)]
    pub tag_type: String,
    /// 태그 값 — 문자열 리스트 속성은 JSON 인코딩된 문자열
    #[serde(default)]
    pub value: serde_json::Value,
}

impl TraceTag {
    /// 문자열 값을 반환합니다.
    pub fn value_str(&self) -> Option<&str> {
        self.value.as_str()
    }
}

/// span 부모 참조
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceSpanReference {
    /// 참조 유형 (CHILD_OF 등)
    #[serde(rename = "refType", default)]
    pub ref_type: String,
    /// 트레이스 ID
    #[serde(rename = "traceID", default)]
    pub trace_id: String,
    /// span ID
    #[serde(rename = "spanID", default)]
    pub span_id: String,
}

/// 프로세스 정보
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceProcess {
    /// 서비스 이름
    #[serde(rename = "serviceName", default)]
    pub service_name: String,
    /// 프로세스 태그
    #[serde(default)]
    pub tags: Vec<TraceTag>,
}

impl TraceSpan {
    /// `sboms` 태그의 URL 목록을 반환합니다.
    ///
    /// 태그가 없으면 빈 목록입니다. 태그 값은 JSON 인코딩된 문자열
    /// 리스트여야 합니다.
    pub fn sbom_urls(&self) -> Result<Vec<String>, CveMetricsError> {
        for tag in &self.tags {
            if tag.key != SBOMS_TRACE_TAG {
                continue;
            }

            let raw = tag.value_str().ok_or_else(|| {
                CveMetricsError::TraceParse(format!(
                    "span {}: sboms tag is not a string",
                    self.span_id
                ))
            })?;

            return serde_json::from_str(raw).map_err(|e| {
                CveMetricsError::TraceParse(format!("span {}: {e}", self.span_id))
            });
        }

        Ok(Vec::new())
    }
}

/// 트레이스 API 인터페이스
pub trait TraceApi: Send + Sync {
    /// 설정된 서비스의 최근 트레이스를 나열합니다.
    fn list(&self) -> BoxFuture<'_, Result<TraceDocument, CveMetricsError>>;

    /// 트레이스 하나를 조회합니다.
    fn get<'a>(
        &'a self,
        trace_id: &'a str,
    ) -> BoxFuture<'a, Result<TraceDocument, CveMetricsError>>;
}

/// HTTP 기반 트레이스 API 클라이언트
pub struct HttpTraceApi {
    client: reqwest::Client,
    base_url: String,
    service_name: String,
    history_limit: Duration,
}

impl HttpTraceApi {
    /// 새 클라이언트를 생성합니다.
    pub fn new(
        base_url: impl Into<String>,
        service_name: impl Into<String>,
        history_limit: Duration,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            service_name: service_name.into(),
            history_limit,
        }
    }

    async fn get_document(&self, path: &str) -> Result<TraceDocument, CveMetricsError> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| CveMetricsError::TraceApi(format!("GET {path}: {e}")))?;

        if !response.status().is_success() {
            return Err(CveMetricsError::TraceApi(format!(
                "GET {path}: http status code {}",
                response.status().as_u16()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| CveMetricsError::TraceParse(e.to_string()))
    }

    fn start_time_max(&self) -> Result<String, CveMetricsError> {
        let start = time::OffsetDateTime::now_utc() - self.history_limit;

        start
            .format(&time::format_description::well_known::Rfc3339)
            .map_err(|e| CveMetricsError::TraceApi(format!("format start_time_max: {e}")))
    }
}

impl TraceApi for HttpTraceApi {
    fn list(&self) -> BoxFuture<'_, Result<TraceDocument, CveMetricsError>> {
        Box::pin(async move {
            let start_time_max = self.start_time_max()?;
            self.get_document(&format!(
                "/api/traces?service={}&start_time_max={}",
                self.service_name, start_time_max,
            ))
            .await
        })
    }

    fn get<'a>(
        &'a self,
        trace_id: &'a str,
    ) -> BoxFuture<'a, Result<TraceDocument, CveMetricsError>> {
        Box::pin(async move { self.get_document(&format!("/api/traces/{trace_id}")).await })
    }
}

/// 고정 문서를 반환하는 트레이스 API (테스트용)
#[derive(Debug, Clone, Default)]
pub struct StaticTraceApi {
    document: Arc<Mutex<TraceDocument>>,
}

impl StaticTraceApi {
    /// 문서로 API를 생성합니다.
    pub fn new(document: TraceDocument) -> Self {
        Self {
            document: Arc::new(Mutex::new(document)),
        }
    }

    /// 문서를 교체합니다.
    pub fn set_document(&self, document: TraceDocument) {
        *self.document.lock().expect("trace api lock poisoned") = document;
    }
}

impl TraceApi for StaticTraceApi {
    fn list(&self) -> BoxFuture<'_, Result<TraceDocument, CveMetricsError>> {
        Box::pin(async move {
            Ok(self
                .document
                .lock()
                .expect("trace api lock poisoned")
                .clone())
        })
    }

    fn get<'a>(
        &'a self,
        trace_id: &'a str,
    ) -> BoxFuture<'a, Result<TraceDocument, CveMetricsError>> {
        Box::pin(async move {
            let document = self.document.lock().expect("trace api lock poisoned");

            let data = document
                .data
                .iter()
                .filter(|trace| trace.trace_id == trace_id)
                .cloned()
                .collect();

            Ok(TraceDocument { data })
        })
    }
}
