//! 에이전트 모듈 — 플로우 엔드포인트별 분석기
//!
//! [`AgentModule`]은 엔드포인트 하나를 분석해 이름 붙은 문자열
//! 리스트([`Analyse`])를 산출합니다. `None` 반환은 "이 엔드포인트에
//! 적용 불가"를 의미하며 결과 맵에 항목을 만들지 않습니다.
//!
//! 설정은 모듈을 이름으로 지정하고 [`build_modules`]가 이름을
//! 구현으로 변환합니다. 알 수 없는 이름은 시작 시점에 실패합니다.

mod k8s_digest;
mod k8s_image;

pub use k8s_digest::K8sDigestModule;
pub use k8s_image::K8sImageModule;

use std::sync::Arc;

use cisin_core::cluster::ClusterLookup;
use cisin_core::pipeline::BoxFuture;
use cisin_core::types::{Analyse, FlowEndpoint, WorkloadType};

use crate::error::FlowAgentError;

/// K8s 이미지 모듈 이름
pub const K8S_IMAGE_MODULE_NAME: &str = "k8s_image";

/// K8s 다이제스트 모듈 이름
pub const K8S_DIGEST_MODULE_NAME: &str = "k8s_digest";

/// 플로우 엔드포인트 분석기
///
/// 구현은 동시 호출에 안전해야 합니다.
pub trait AgentModule: Send + Sync {
    /// 엔드포인트를 분석합니다.
    ///
    /// 적용 불가능한 엔드포인트에는 `Ok(None)`을 반환합니다.
    fn analyze<'a>(
        &'a self,
        ip: &'a str,
        port: u16,
        endpoint: &'a FlowEndpoint,
    ) -> BoxFuture<'a, Result<Option<Analyse>, FlowAgentError>>;

    /// 모듈이 지원하는 워크로드 유형을 반환합니다.
    fn compatibility(&self) -> &[WorkloadType];

    /// 모듈 이름 — 결과 맵의 키로 사용됩니다.
    fn name(&self) -> &str;
}

/// 설정된 모듈 이름 목록을 구현으로 변환합니다.
pub fn build_modules(
    names: &[String],
    lookup: Arc<dyn ClusterLookup>,
) -> Result<Vec<Arc<dyn AgentModule>>, FlowAgentError> {
    let mut modules: Vec<Arc<dyn AgentModule>> = Vec::with_capacity(names.len());

    for name in names {
        match name.as_str() {
            K8S_IMAGE_MODULE_NAME => {
                modules.push(Arc::new(K8sImageModule::new(Arc::clone(&lookup))));
            }
            K8S_DIGEST_MODULE_NAME => {
                modules.push(Arc::new(K8sDigestModule::new(Arc::clone(&lookup))));
            }
            unknown => return Err(FlowAgentError::UnknownModule(unknown.to_owned())),
        }
    }

    Ok(modules)
}
