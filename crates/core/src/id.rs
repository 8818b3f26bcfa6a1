//! 워크로드 ID 코덱 — `namespace/kind/name` 형식의 정규 ID
//!
//! 모든 워크로드는 `/`로 구분된 세 개의 비어 있지 않은 조각으로
//! 식별됩니다. 두 개의 예약 ID가 있습니다:
//!
//! - [`WORLD_ID`] — 메시 바깥의 모든 것
//! - `external/Workload/<node>` — 외부 메시 멤버로 등록된 노드

use crate::error::IdError;
use crate::types::FlowEndpoint;

/// ID를 구성하는 조각 수
const ID_ELEMENTS: usize = 3;

/// 메시 바깥의 모든 것을 나타내는 예약 ID
pub const WORLD_ID: &str = "world/world/world";

/// 외부 워크로드의 가짜 네임스페이스
pub const EXTERNAL_WORKLOAD_NAMESPACE: &str = "external";

/// 외부 워크로드의 가짜 kind
pub const EXTERNAL_WORKLOAD_KIND: &str = "Workload";

/// ID를 `(namespace, kind, name)`으로 분해합니다.
///
/// `/` 구분자가 정확히 두 개이고 모든 조각이 비어 있지 않아야 합니다.
/// 그 외의 형태는 [`IdError::Invalid`]로 실패합니다.
pub fn parse(id: &str) -> Result<(&str, &str, &str), IdError> {
    let split: Vec<&str> = id.split('/').collect();

    if split.len() != ID_ELEMENTS || split.iter().any(|part| part.is_empty()) {
        return Err(IdError::Invalid { id: id.to_owned() });
    }

    Ok((split[0], split[1], split[2]))
}

/// `(namespace, kind, name)`을 정규 ID로 결합합니다.
pub fn format(namespace: &str, kind: &str, name: &str) -> String {
    format!("{namespace}/{kind}/{name}")
}

/// 외부 워크로드의 ID를 생성합니다.
pub fn external_workload_id(node_name: &str) -> String {
    format(EXTERNAL_WORKLOAD_NAMESPACE, EXTERNAL_WORKLOAD_KIND, node_name)
}

/// Kubernetes 엔드포인트에서 워크로드 ID를 유도합니다.
///
/// 워크로드 참조가 있으면 첫 번째 참조를 사용하고, 없으면
/// pod 이름으로 폴백합니다. 둘 다 없으면 [`IdError::NotFound`]입니다.
pub fn k8s_id(endpoint: &FlowEndpoint) -> Result<String, IdError> {
    if let Some(workload) = endpoint.workloads.first() {
        return Ok(format(&endpoint.namespace, &workload.kind, &workload.name));
    }

    tracing::debug!(pod = %endpoint.pod_name, namespace = %endpoint.namespace, "no workload reference");

    if !endpoint.pod_name.is_empty() {
        return Ok(format(&endpoint.namespace, "Pod", &endpoint.pod_name));
    }

    Err(IdError::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WorkloadRef;

    #[test]
    fn parse_splits_valid_id() {
        let (namespace, kind, name) = parse("app/Deployment/web").unwrap();
        assert_eq!(namespace, "app");
        assert_eq!(kind, "Deployment");
        assert_eq!(name, "web");
    }

    #[test]
    fn parse_rejects_wrong_segment_count() {
        assert!(matches!(parse("app/web"), Err(IdError::Invalid { .. })));
        assert!(matches!(
            parse("a/b/c/d"),
            Err(IdError::Invalid { .. })
        ));
        assert!(matches!(parse(""), Err(IdError::Invalid { .. })));
    }

    #[test]
    fn parse_rejects_empty_segments() {
        assert!(matches!(parse("app//web"), Err(IdError::Invalid { .. })));
        assert!(matches!(parse("/Pod/web"), Err(IdError::Invalid { .. })));
        assert!(matches!(parse("app/Pod/"), Err(IdError::Invalid { .. })));
    }

    #[test]
    fn world_id_is_parseable() {
        let (namespace, kind, name) = parse(WORLD_ID).unwrap();
        assert_eq!((namespace, kind, name), ("world", "world", "world"));
    }

    #[test]
    fn external_workload_id_format() {
        assert_eq!(external_workload_id("node-a"), "external/Workload/node-a");
    }

    #[test]
    fn k8s_id_prefers_workload_reference() {
        let endpoint = FlowEndpoint {
            namespace: "app".to_owned(),
            pod_name: "web-7b9d4-x2j".to_owned(),
            workloads: vec![WorkloadRef {
                kind: "Deployment".to_owned(),
                name: "web".to_owned(),
            }],
            ..Default::default()
        };
        assert_eq!(k8s_id(&endpoint).unwrap(), "app/Deployment/web");
    }

    #[test]
    fn k8s_id_falls_back_to_pod_name() {
        let endpoint = FlowEndpoint {
            namespace: "app".to_owned(),
            pod_name: "web-7b9d4-x2j".to_owned(),
            ..Default::default()
        };
        assert_eq!(k8s_id(&endpoint).unwrap(), "app/Pod/web-7b9d4-x2j");
    }

    #[test]
    fn k8s_id_fails_without_workload_or_pod() {
        let endpoint = FlowEndpoint {
            namespace: "app".to_owned(),
            ..Default::default()
        };
        assert!(matches!(k8s_id(&endpoint), Err(IdError::NotFound)));
    }
}
