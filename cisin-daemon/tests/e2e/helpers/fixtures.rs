//! Flow and cluster fixtures shared by e2e scenarios.

use cisin_core::types::{Flow, FlowEndpoint, IpPair, TcpPair, WorkloadRef};

use super::{CLUSTER_NAME, NODE_NAME};

/// A source endpoint labeled as this node's own external-workload
/// identity (cluster + pod label match).
pub fn host_endpoint(identity: u64) -> FlowEndpoint {
    FlowEndpoint {
        identity,
        labels: vec![
            format!("k8s:io.cilium.k8s.policy.cluster={CLUSTER_NAME}"),
            format!("k8s:io.kubernetes.pod.name={NODE_NAME}"),
        ],
        ..Default::default()
    }
}

/// A Kubernetes endpoint with an attached workload reference.
pub fn k8s_endpoint(identity: u64, namespace: &str, kind: &str, name: &str) -> FlowEndpoint {
    FlowEndpoint {
        identity,
        namespace: namespace.to_owned(),
        workloads: vec![WorkloadRef {
            kind: kind.to_owned(),
            name: name.to_owned(),
        }],
        ..Default::default()
    }
}

/// A Kubernetes endpoint identified only by its pod name.
pub fn pod_endpoint(identity: u64, namespace: &str, pod_name: &str) -> FlowEndpoint {
    FlowEndpoint {
        identity,
        namespace: namespace.to_owned(),
        pod_name: pod_name.to_owned(),
        ..Default::default()
    }
}

/// An endpoint labeled as mesh-external traffic.
pub fn world_endpoint(identity: u64) -> FlowEndpoint {
    FlowEndpoint {
        identity,
        labels: vec!["reserved:world".to_owned()],
        ..Default::default()
    }
}

/// A valid flow between two endpoints observed on this node.
pub fn flow(uuid: &str, source: FlowEndpoint, destination: FlowEndpoint) -> Flow {
    Flow {
        uuid: uuid.to_owned(),
        node_name: format!("{CLUSTER_NAME}/{NODE_NAME}"),
        is_reply: false,
        ip: Some(IpPair {
            source: "10.0.0.1".to_owned(),
            destination: "10.0.0.2".to_owned(),
        }),
        tcp: Some(TcpPair {
            source_port: 40000,
            destination_port: 80,
        }),
        source: Some(source),
        destination: Some(destination),
    }
}
