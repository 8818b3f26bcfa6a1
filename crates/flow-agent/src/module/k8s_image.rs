//! k8s_image 모듈 — pod의 컨테이너 이미지 참조 수집

use std::sync::Arc;

use cisin_core::cluster::ClusterLookup;
use cisin_core::imageref;
use cisin_core::pipeline::BoxFuture;
use cisin_core::types::{Analyse, FlowEndpoint, WorkloadType};

use super::{AgentModule, K8S_IMAGE_MODULE_NAME};
use crate::error::FlowAgentError;

const COMPATIBILITY: &[WorkloadType] = &[WorkloadType::Kubernetes];

/// pod spec에 선언된 모든 컨테이너 이미지의 정규화된 참조를
/// 수집하는 모듈
pub struct K8sImageModule {
    lookup: Arc<dyn ClusterLookup>,
}

impl K8sImageModule {
    /// 새 모듈을 생성합니다.
    pub fn new(lookup: Arc<dyn ClusterLookup>) -> Self {
        Self { lookup }
    }
}

impl AgentModule for K8sImageModule {
    fn analyze<'a>(
        &'a self,
        _ip: &'a str,
        _port: u16,
        endpoint: &'a FlowEndpoint,
    ) -> BoxFuture<'a, Result<Option<Analyse>, FlowAgentError>> {
        Box::pin(async move {
            // pod 메타데이터가 없는 엔드포인트에는 적용 불가
            if endpoint.pod_name.is_empty() {
                return Ok(None);
            }

            let pod = self
                .lookup
                .get_pod(&endpoint.namespace, &endpoint.pod_name)
                .await
                .map_err(|e| FlowAgentError::Module {
                    module: K8S_IMAGE_MODULE_NAME.to_owned(),
                    reason: e.to_string(),
                })?;

            let images: Vec<String> = pod
                .container_images
                .iter()
                .map(|image| imageref::canonical(image))
                .collect();

            Ok(Some(Analyse::new(images)))
        })
    }

    fn compatibility(&self) -> &[WorkloadType] {
        COMPATIBILITY
    }

    fn name(&self) -> &str {
        K8S_IMAGE_MODULE_NAME
    }
}
