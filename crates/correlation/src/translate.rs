//! 워크로드 ID 번역 — pod ID를 소유 워크로드의 ID로 변환
//!
//! 에이전트는 워크로드 참조가 없는 엔드포인트를 `ns/Pod/<name>`으로
//! 보고합니다. 서버는 pod의 소유자 체인을 따라가 안정적인 워크로드
//! ID(`ns/Deployment/<name>` 등)로 정규화합니다.
//!
//! 관측 플레인의 태깅 특성상 외부 워크로드가 pod로 잘못 표시될 수
//! 있습니다. pod 조회가 `NotFound`이면 외부 워크로드 등록을 확인하고,
//! 있으면 외부 워크로드 ID로 번역합니다.

use cisin_core::cluster::ClusterLookup;
use cisin_core::id;

use crate::error::CorrelationError;

/// 워크로드 ID를 번역합니다.
///
/// - kind가 `Pod`가 아니면 그대로 반환
/// - pod가 없으면 외부 워크로드 폴백
/// - 소유자가 없으면 그대로 반환
/// - 첫 소유자가 ReplicaSet이 아니면 `ns/<owner.kind>/<owner.name>`
/// - ReplicaSet이면 그 소유자를 따라가고, 없으면
///   `ns/ReplicaSet/<rs.name>`
pub async fn translate_workload_id(
    lookup: &dyn ClusterLookup,
    workload_id: &str,
) -> Result<String, CorrelationError> {
    let (namespace, kind, name) = id::parse(workload_id)?;

    if kind != "Pod" {
        return Ok(workload_id.to_owned());
    }

    let pod = match lookup.get_pod(namespace, name).await {
        Ok(pod) => pod,
        Err(err) if err.is_not_found() => {
            tracing::debug!(id = %workload_id, "pod not found - try to load external workload");

            return match lookup.get_external_workload(namespace, name).await {
                Ok(external) => Ok(id::external_workload_id(&external.name)),
                Err(ext_err) => Err(CorrelationError::Translate {
                    id: workload_id.to_owned(),
                    reason: format!("get external workload: {ext_err}: {err}"),
                }),
            };
        }
        Err(err) => {
            return Err(CorrelationError::Translate {
                id: workload_id.to_owned(),
                reason: format!("get pod: {err}"),
            });
        }
    };

    let Some(owner) = pod.owner_references.first() else {
        return Ok(workload_id.to_owned());
    };

    if owner.kind != "ReplicaSet" {
        return Ok(id::format(namespace, &owner.kind, &owner.name));
    }

    let replica_set = lookup
        .get_replica_set(namespace, &owner.name)
        .await
        .map_err(|err| CorrelationError::Translate {
            id: workload_id.to_owned(),
            reason: format!("get replicaset: {err}"),
        })?;

    match replica_set.owner_references.first() {
        Some(rs_owner) => Ok(id::format(namespace, &rs_owner.kind, &rs_owner.name)),
        None => Ok(id::format(namespace, "ReplicaSet", &replica_set.name)),
    }
}
