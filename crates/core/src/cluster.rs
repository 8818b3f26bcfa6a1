//! 클러스터 조회 — Kubernetes 리소스 접근 추상화
//!
//! [`ClusterLookup`]은 파이프라인이 필요로 하는 최소한의 조회만
//! 노출합니다: pod, replicaset, 외부 워크로드. 구체 클라이언트는
//! 이 trait 뒤의 외부 협력자이며, 테스트는 [`StaticClusterLookup`]을
//! 사용합니다.
//!
//! `NotFound`는 다른 API 에러와 구분됩니다 — ID 번역은 pod가 없을 때
//! 외부 워크로드 조회로 폴백합니다.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::error::LookupError;
use crate::pipeline::BoxFuture;

/// 리소스 소유자 참조
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerRef {
    /// 소유자 kind (ReplicaSet, Deployment, StatefulSet 등)
    pub kind: String,
    /// 소유자 이름
    pub name: String,
}

/// pod 요약 — 파이프라인이 사용하는 필드만 담습니다
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PodSummary {
    /// pod 이름
    pub name: String,
    /// 네임스페이스
    pub namespace: String,
    /// 소유자 참조 (첫 번째 항목이 결정적)
    pub owner_references: Vec<OwnerRef>,
    /// spec에 선언된 컨테이너 이미지 참조
    pub container_images: Vec<String>,
    /// status에 기록된 컨테이너 이미지 ID (`repo@sha256:...`)
    pub container_image_ids: Vec<String>,
}

/// replicaset 요약
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplicaSetSummary {
    /// replicaset 이름
    pub name: String,
    /// 네임스페이스
    pub namespace: String,
    /// 소유자 참조
    pub owner_references: Vec<OwnerRef>,
}

/// 외부 워크로드 요약 — 존재 확인에만 사용됩니다
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalWorkloadSummary {
    /// 등록된 노드 이름
    pub name: String,
}

impl OwnerRef {
    /// 새 소유자 참조를 생성합니다.
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
        }
    }
}

/// Kubernetes 리소스 조회 인터페이스
pub trait ClusterLookup: Send + Sync {
    /// pod를 조회합니다.
    fn get_pod<'a>(
        &'a self,
        namespace: &'a str,
        name: &'a str,
    ) -> BoxFuture<'a, Result<PodSummary, LookupError>>;

    /// replicaset을 조회합니다.
    fn get_replica_set<'a>(
        &'a self,
        namespace: &'a str,
        name: &'a str,
    ) -> BoxFuture<'a, Result<ReplicaSetSummary, LookupError>>;

    /// 외부 워크로드 등록을 조회합니다.
    fn get_external_workload<'a>(
        &'a self,
        namespace: &'a str,
        name: &'a str,
    ) -> BoxFuture<'a, Result<ExternalWorkloadSummary, LookupError>>;
}

fn not_found(kind: &str, namespace: &str, name: &str) -> LookupError {
    LookupError::NotFound {
        kind: kind.to_owned(),
        namespace: namespace.to_owned(),
        name: name.to_owned(),
    }
}

/// 고정된 리소스 집합을 제공하는 조회 구현
///
/// 테스트와 오프라인 실행에 사용합니다. 등록되지 않은 리소스는
/// `NotFound`로 응답합니다.
#[derive(Debug, Clone, Default)]
pub struct StaticClusterLookup {
    inner: Arc<Mutex<StaticInner>>,
}

#[derive(Debug, Default)]
struct StaticInner {
    pods: HashMap<(String, String), PodSummary>,
    replica_sets: HashMap<(String, String), ReplicaSetSummary>,
    external_workloads: HashSet<String>,
}

impl StaticClusterLookup {
    /// 빈 조회 테이블을 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// pod를 등록합니다.
    pub fn add_pod(&self, pod: PodSummary) {
        let key = (pod.namespace.clone(), pod.name.clone());
        self.inner
            .lock()
            .expect("cluster lookup lock poisoned")
            .pods
            .insert(key, pod);
    }

    /// replicaset을 등록합니다.
    pub fn add_replica_set(&self, replica_set: ReplicaSetSummary) {
        let key = (replica_set.namespace.clone(), replica_set.name.clone());
        self.inner
            .lock()
            .expect("cluster lookup lock poisoned")
            .replica_sets
            .insert(key, replica_set);
    }

    /// 외부 워크로드를 등록합니다.
    pub fn add_external_workload(&self, name: impl Into<String>) {
        self.inner
            .lock()
            .expect("cluster lookup lock poisoned")
            .external_workloads
            .insert(name.into());
    }
}

impl ClusterLookup for StaticClusterLookup {
    fn get_pod<'a>(
        &'a self,
        namespace: &'a str,
        name: &'a str,
    ) -> BoxFuture<'a, Result<PodSummary, LookupError>> {
        Box::pin(async move {
            self.inner
                .lock()
                .expect("cluster lookup lock poisoned")
                .pods
                .get(&(namespace.to_owned(), name.to_owned()))
                .cloned()
                .ok_or_else(|| not_found("Pod", namespace, name))
        })
    }

    fn get_replica_set<'a>(
        &'a self,
        namespace: &'a str,
        name: &'a str,
    ) -> BoxFuture<'a, Result<ReplicaSetSummary, LookupError>> {
        Box::pin(async move {
            self.inner
                .lock()
                .expect("cluster lookup lock poisoned")
                .replica_sets
                .get(&(namespace.to_owned(), name.to_owned()))
                .cloned()
                .ok_or_else(|| not_found("ReplicaSet", namespace, name))
        })
    }

    fn get_external_workload<'a>(
        &'a self,
        namespace: &'a str,
        name: &'a str,
    ) -> BoxFuture<'a, Result<ExternalWorkloadSummary, LookupError>> {
        Box::pin(async move {
            let inner = self.inner.lock().expect("cluster lookup lock poisoned");

            if inner.external_workloads.contains(name) {
                Ok(ExternalWorkloadSummary {
                    name: name.to_owned(),
                })
            } else {
                Err(not_found("CiliumExternalWorkload", namespace, name))
            }
        })
    }
}
