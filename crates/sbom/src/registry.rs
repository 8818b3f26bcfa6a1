//! OCI 레지스트리 추상화
//!
//! [`Registry`]는 내용 주소 기반 아티팩트 저장소의 최소 연산을
//! 노출합니다. 구체 클라이언트는 외부 협력자이며, 구현은 404를
//! `exists → Ok(false)`로 변환하고 그 외 에러는 전파해야 합니다.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use cisin_core::pipeline::BoxFuture;

use crate::artifact::SbomArtifact;
use crate::error::SbomServiceError;

/// OCI 레지스트리 인터페이스
pub trait Registry: Send + Sync {
    /// 아티팩트 존재 여부를 확인합니다. 404는 `Ok(false)`입니다.
    fn exists<'a>(&'a self, reference: &'a str) -> BoxFuture<'a, Result<bool, SbomServiceError>>;

    /// 아티팩트를 푸시합니다.
    fn push<'a>(
        &'a self,
        reference: &'a str,
        artifact: &'a SbomArtifact,
    ) -> BoxFuture<'a, Result<(), SbomServiceError>>;

    /// 아티팩트를 풀합니다.
    fn pull<'a>(
        &'a self,
        reference: &'a str,
    ) -> BoxFuture<'a, Result<SbomArtifact, SbomServiceError>>;

    /// 레지스트리 루트 URL을 반환합니다.
    fn url(&self) -> &str;
}

/// 인메모리 레지스트리
///
/// 테스트와 오프라인 실행에 사용합니다.
#[derive(Debug, Clone)]
pub struct MemoryRegistry {
    url: String,
    store: Arc<Mutex<HashMap<String, SbomArtifact>>>,
}

impl MemoryRegistry {
    /// 주어진 루트 URL로 레지스트리를 생성합니다.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            store: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// 저장된 아티팩트 수를 반환합니다.
    pub fn len(&self) -> usize {
        self.store.lock().expect("registry lock poisoned").len()
    }

    /// 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Registry for MemoryRegistry {
    fn exists<'a>(&'a self, reference: &'a str) -> BoxFuture<'a, Result<bool, SbomServiceError>> {
        Box::pin(async move {
            Ok(self
                .store
                .lock()
                .expect("registry lock poisoned")
                .contains_key(reference))
        })
    }

    fn push<'a>(
        &'a self,
        reference: &'a str,
        artifact: &'a SbomArtifact,
    ) -> BoxFuture<'a, Result<(), SbomServiceError>> {
        Box::pin(async move {
            self.store
                .lock()
                .expect("registry lock poisoned")
                .insert(reference.to_owned(), artifact.clone());

            tracing::info!(image = %reference, "image pushed");
            Ok(())
        })
    }

    fn pull<'a>(
        &'a self,
        reference: &'a str,
    ) -> BoxFuture<'a, Result<SbomArtifact, SbomServiceError>> {
        Box::pin(async move {
            self.store
                .lock()
                .expect("registry lock poisoned")
                .get(reference)
                .cloned()
                .ok_or_else(|| SbomServiceError::Registry(format!("{reference} not found")))
        })
    }

    fn url(&self) -> &str {
        &self.url
    }
}
