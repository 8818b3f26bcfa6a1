//! k8s_digest 모듈 — pod 컨테이너 상태의 이미지 ID에서 identifier 추출

use std::sync::Arc;

use cisin_core::cluster::ClusterLookup;
use cisin_core::imageref;
use cisin_core::pipeline::BoxFuture;
use cisin_core::types::{Analyse, FlowEndpoint, WorkloadType};

use super::{AgentModule, K8S_DIGEST_MODULE_NAME};
use crate::error::FlowAgentError;

const COMPATIBILITY: &[WorkloadType] = &[WorkloadType::Kubernetes];

/// pod status의 각 컨테이너 이미지 ID(`repo@sha256:...`)에서
/// identifier 부분(다이제스트)을 수집하는 모듈
///
/// 서버는 이 모듈의 결과를 SBOM URL 인덱스의 키로 사용합니다.
pub struct K8sDigestModule {
    lookup: Arc<dyn ClusterLookup>,
}

impl K8sDigestModule {
    /// 새 모듈을 생성합니다.
    pub fn new(lookup: Arc<dyn ClusterLookup>) -> Self {
        Self { lookup }
    }
}

impl AgentModule for K8sDigestModule {
    fn analyze<'a>(
        &'a self,
        _ip: &'a str,
        _port: u16,
        endpoint: &'a FlowEndpoint,
    ) -> BoxFuture<'a, Result<Option<Analyse>, FlowAgentError>> {
        Box::pin(async move {
            if endpoint.pod_name.is_empty() {
                return Ok(None);
            }

            let pod = self
                .lookup
                .get_pod(&endpoint.namespace, &endpoint.pod_name)
                .await
                .map_err(|e| FlowAgentError::Module {
                    module: K8S_DIGEST_MODULE_NAME.to_owned(),
                    reason: e.to_string(),
                })?;

            let mut digests = Vec::with_capacity(pod.container_image_ids.len());

            for image_id in &pod.container_image_ids {
                let identifier =
                    imageref::identifier(image_id).ok_or_else(|| FlowAgentError::Module {
                        module: K8S_DIGEST_MODULE_NAME.to_owned(),
                        reason: format!("image id '{image_id}' has no identifier"),
                    })?;

                digests.push(identifier);
            }

            Ok(Some(Analyse::new(digests)))
        })
    }

    fn compatibility(&self) -> &[WorkloadType] {
        COMPATIBILITY
    }

    fn name(&self) -> &str {
        K8S_DIGEST_MODULE_NAME
    }
}
