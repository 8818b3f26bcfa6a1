//! 트레이스 싱크 — span 방출의 경계
//!
//! [`TraceSink`]는 상관관계 엔진이 span을 내보내는 유일한 통로입니다.
//! 구체 익스포터(OTLP 등)는 이 trait 뒤의 외부 협력자입니다.
//! 방출 실패는 싱크가 삼킵니다 (best-effort).
//!
//! - [`LogSink`] — span을 구조화 로그로 보고 (데몬 기본값)
//! - [`CollectingSink`] — span을 메모리에 수집 (테스트용)

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// span 속성 — 모듈명 → 문자열 리스트
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanAttribute {
    /// 속성 키
    pub key: String,
    /// 속성 값 목록
    pub values: Vec<String>,
}

impl SpanAttribute {
    /// 새 속성을 생성합니다.
    pub fn new(key: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            key: key.into(),
            values,
        }
    }
}

/// 시작된 span의 식별자
///
/// 자식 span은 부모의 컨텍스트를 받아 같은 트레이스에 연결됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpanContext {
    /// 트레이스 ID — 루트에서 새로 발급되고 자식에게 상속됨
    pub trace_id: u64,
    /// span ID
    pub span_id: u64,
}

/// span 방출 인터페이스
pub trait TraceSink: Send + Sync {
    /// span을 시작합니다.
    ///
    /// `parent`가 `None`이면 새 트레이스의 루트가 됩니다.
    fn start_span(
        &self,
        operation: &str,
        parent: Option<SpanContext>,
        attributes: Vec<SpanAttribute>,
    ) -> SpanContext;

    /// span을 종료합니다.
    fn end_span(&self, span: SpanContext);
}

fn next_id(counter: &AtomicU64) -> u64 {
    counter.fetch_add(1, Ordering::Relaxed) + 1
}

/// span을 구조화 로그로 보고하는 싱크
///
/// 백엔드 없이 서버를 실행할 때의 기본값입니다.
#[derive(Debug)]
pub struct LogSink {
    service_name: String,
    ids: AtomicU64,
}

impl LogSink {
    /// 서비스 이름으로 로그 싱크를 생성합니다.
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ids: AtomicU64::new(0),
        }
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new("cisin")
    }
}

impl TraceSink for LogSink {
    fn start_span(
        &self,
        operation: &str,
        parent: Option<SpanContext>,
        attributes: Vec<SpanAttribute>,
    ) -> SpanContext {
        let span_id = next_id(&self.ids);
        let trace_id = parent.map_or(span_id, |p| p.trace_id);

        tracing::info!(
            service = %self.service_name,
            operation = %operation,
            trace_id,
            span_id,
            parent_span = parent.map(|p| p.span_id),
            attributes = attributes.len(),
            "span start"
        );

        SpanContext { trace_id, span_id }
    }

    fn end_span(&self, span: SpanContext) {
        tracing::debug!(trace_id = span.trace_id, span_id = span.span_id, "span end");
    }
}

/// 종료된 span의 기록
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanRecord {
    /// span 컨텍스트
    pub context: SpanContext,
    /// 부모 span (루트는 `None`)
    pub parent: Option<SpanContext>,
    /// 연산 이름 — 워크로드 ID
    pub operation: String,
    /// span 속성
    pub attributes: Vec<SpanAttribute>,
}

impl SpanRecord {
    /// 키에 해당하는 속성 값을 반환합니다.
    pub fn attribute(&self, key: &str) -> Option<&[String]> {
        self.attributes
            .iter()
            .find(|attribute| attribute.key == key)
            .map(|attribute| attribute.values.as_slice())
    }
}

/// span을 메모리에 수집하는 싱크 (테스트용)
#[derive(Debug, Clone, Default)]
pub struct CollectingSink {
    ids: Arc<AtomicU64>,
    open: Arc<Mutex<Vec<SpanRecord>>>,
    finished: Arc<Mutex<Vec<SpanRecord>>>,
}

impl CollectingSink {
    /// 새 수집 싱크를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 종료된 span들을 반환합니다.
    pub fn finished_spans(&self) -> Vec<SpanRecord> {
        self.finished
            .lock()
            .expect("collecting sink lock poisoned")
            .clone()
    }

    /// 연산 이름으로 종료된 span을 찾습니다.
    pub fn span_by_operation(&self, operation: &str) -> Option<SpanRecord> {
        self.finished_spans()
            .into_iter()
            .find(|span| span.operation == operation)
    }

    /// 루트 span들(부모 없음)을 반환합니다.
    pub fn root_spans(&self) -> Vec<SpanRecord> {
        self.finished_spans()
            .into_iter()
            .filter(|span| span.parent.is_none())
            .collect()
    }

    /// 수집된 모든 span을 비웁니다.
    pub fn clear(&self) {
        self.open.lock().expect("collecting sink lock poisoned").clear();
        self.finished
            .lock()
            .expect("collecting sink lock poisoned")
            .clear();
    }
}

impl TraceSink for CollectingSink {
    fn start_span(
        &self,
        operation: &str,
        parent: Option<SpanContext>,
        attributes: Vec<SpanAttribute>,
    ) -> SpanContext {
        let span_id = next_id(&self.ids);
        let trace_id = parent.map_or(span_id, |p| p.trace_id);
        let context = SpanContext { trace_id, span_id };

        self.open
            .lock()
            .expect("collecting sink lock poisoned")
            .push(SpanRecord {
                context,
                parent,
                operation: operation.to_owned(),
                attributes,
            });

        context
    }

    fn end_span(&self, span: SpanContext) {
        let mut open = self.open.lock().expect("collecting sink lock poisoned");

        if let Some(index) = open.iter().position(|record| record.context == span) {
            let record = open.remove(index);
            self.finished
                .lock()
                .expect("collecting sink lock poisoned")
                .push(record);
        }
    }
}
