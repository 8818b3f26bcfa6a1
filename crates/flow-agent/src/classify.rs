//! 엔드포인트 분류 — 레이블 기반 워크로드 유형/ID 결정
//!
//! 관측 플레인이 부여한 예약 레이블을 순서대로 검사하여 첫 번째로
//! 일치하는 규칙이 엔드포인트의 유형과 ID를 결정합니다. 일치 규칙이
//! 유형을 설정하지 않는 경우("미분류") ID는 world 센티널로 남습니다.

use cisin_core::id;
use cisin_core::types::{FlowEndpoint, Workload, WorkloadType};

use crate::error::FlowAgentError;

/// 메시 바깥 트래픽
pub const LABEL_RESERVED_WORLD: &str = "reserved:world";
/// 로컬 호스트 네트워크 네임스페이스
pub const LABEL_RESERVED_HOST: &str = "reserved:host";
/// 다른 클러스터 노드
pub const LABEL_RESERVED_REMOTE_NODE: &str = "reserved:remote-node";
/// 헬스 체크 엔드포인트
pub const LABEL_RESERVED_HEALTH: &str = "reserved:health";
/// 인그레스 프록시
pub const LABEL_RESERVED_INGRESS: &str = "reserved:ingress";
/// 초기화 중인 엔드포인트
pub const LABEL_RESERVED_INIT: &str = "reserved:init";
/// kube-apiserver
pub const LABEL_RESERVED_KUBE_APISERVER: &str = "reserved:kube-apiserver";
/// 식별되지 않은 엔드포인트
pub const LABEL_RESERVED_UNKNOWN: &str = "reserved:unknown";
/// 메시가 관리하지 않는 엔드포인트
pub const LABEL_RESERVED_UNMANAGED: &str = "reserved:unmanaged";
/// 클러스터 이름 레이블 키
pub const LABEL_CLUSTER: &str = "k8s:io.cilium.k8s.policy.cluster";
/// pod 이름 레이블 키
pub const LABEL_POD: &str = "k8s:io.kubernetes.pod.name";

/// 엔드포인트를 분류하여 워크로드 골격을 반환합니다.
///
/// 반환된 [`Workload`]의 `results`는 비어 있으며 호출자가 모듈
/// 결과로 채웁니다. 기본 분기는 Kubernetes 엔드포인트로 취급하고,
/// ID 유도에 실패하면 에러를 반환합니다.
pub fn classify_endpoint(
    endpoint: &FlowEndpoint,
    cluster_name: &str,
    node_name: &str,
) -> Result<Workload, FlowAgentError> {
    let mut workload = Workload {
        id: id::WORLD_ID.to_owned(),
        ..Default::default()
    };

    let cluster_label = format!("{LABEL_CLUSTER}={cluster_name}");
    let pod_label = format!("{LABEL_POD}={node_name}");

    if endpoint.has_label(LABEL_RESERVED_WORLD) {
        workload.workload_type = WorkloadType::World;
    } else if endpoint.has_label(LABEL_RESERVED_HOST) {
        // 미분류 — ID는 world로 유지
    } else if endpoint.has_label(LABEL_RESERVED_REMOTE_NODE) {
        // 미분류
    } else if endpoint.has_label(&cluster_label) && endpoint.has_label(&pod_label) {
        // 이 노드 자신이 외부 워크로드로 메시에 등록된 경우
        workload.workload_type = WorkloadType::Host;
        workload.id = id::external_workload_id(node_name);
    } else if endpoint.has_label(LABEL_RESERVED_HEALTH)
        || endpoint.has_label(LABEL_RESERVED_INGRESS)
        || endpoint.has_label(LABEL_RESERVED_INIT)
        || endpoint.has_label(LABEL_RESERVED_KUBE_APISERVER)
        || endpoint.has_label(LABEL_RESERVED_UNKNOWN)
        || endpoint.has_label(LABEL_RESERVED_UNMANAGED)
    {
        // 미분류
    } else {
        workload.workload_type = WorkloadType::Kubernetes;
        workload.id = id::k8s_id(endpoint)?;
    }

    Ok(workload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cisin_core::types::WorkloadRef;

    fn endpoint_with_labels(labels: &[&str]) -> FlowEndpoint {
        FlowEndpoint {
            labels: labels.iter().map(|l| (*l).to_owned()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn world_label_classifies_as_world() {
        let endpoint = endpoint_with_labels(&["reserved:world"]);
        let workload = classify_endpoint(&endpoint, "prod", "node-a").unwrap();

        assert_eq!(workload.workload_type, WorkloadType::World);
        assert_eq!(workload.id, "world/world/world");
    }

    #[test]
    fn host_label_stays_unclassified() {
        let endpoint = endpoint_with_labels(&["reserved:host"]);
        let workload = classify_endpoint(&endpoint, "prod", "node-a").unwrap();

        // 유형은 기본값으로, ID는 world 센티널로 남음
        assert_eq!(workload.workload_type, WorkloadType::Kubernetes);
        assert_eq!(workload.id, "world/world/world");
    }

    #[test]
    fn remote_node_label_stays_unclassified() {
        let endpoint = endpoint_with_labels(&["reserved:remote-node"]);
        let workload = classify_endpoint(&endpoint, "prod", "node-a").unwrap();
        assert_eq!(workload.id, "world/world/world");
    }

    #[test]
    fn cluster_and_pod_labels_classify_as_host() {
        let endpoint = endpoint_with_labels(&[
            "k8s:io.cilium.k8s.policy.cluster=prod",
            "k8s:io.kubernetes.pod.name=node-a",
        ]);
        let workload = classify_endpoint(&endpoint, "prod", "node-a").unwrap();

        assert_eq!(workload.workload_type, WorkloadType::Host);
        assert_eq!(workload.id, "external/Workload/node-a");
    }

    #[test]
    fn cluster_label_alone_is_not_host() {
        let endpoint = endpoint_with_labels(&["k8s:io.cilium.k8s.policy.cluster=prod"]);
        // pod 레이블이 없으므로 기본 분기 → k8s id 유도 실패
        let result = classify_endpoint(&endpoint, "prod", "node-a");
        assert!(result.is_err());
    }

    #[test]
    fn reserved_labels_stay_unclassified() {
        for label in [
            "reserved:health",
            "reserved:ingress",
            "reserved:init",
            "reserved:kube-apiserver",
            "reserved:unknown",
            "reserved:unmanaged",
        ] {
            let endpoint = endpoint_with_labels(&[label]);
            let workload = classify_endpoint(&endpoint, "prod", "node-a").unwrap();
            assert_eq!(workload.id, "world/world/world", "label {label}");
        }
    }

    #[test]
    fn world_takes_precedence_over_later_rules() {
        // world와 host 레이블이 동시에 있으면 첫 규칙이 이김
        let endpoint = endpoint_with_labels(&["reserved:world", "reserved:host"]);
        let workload = classify_endpoint(&endpoint, "prod", "node-a").unwrap();
        assert_eq!(workload.workload_type, WorkloadType::World);
    }

    #[test]
    fn default_classifies_as_kubernetes() {
        let endpoint = FlowEndpoint {
            namespace: "app".to_owned(),
            workloads: vec![WorkloadRef {
                kind: "Deployment".to_owned(),
                name: "web".to_owned(),
            }],
            ..Default::default()
        };
        let workload = classify_endpoint(&endpoint, "prod", "node-a").unwrap();

        assert_eq!(workload.workload_type, WorkloadType::Kubernetes);
        assert_eq!(workload.id, "app/Deployment/web");
    }
}
