//! E2E: single edge ingestion and dedup.
//!
//! A flow from this node's external-workload identity to a Kubernetes
//! service must surface as one connection, one graph edge, and a
//! two-span trace rooted at the external workload.

use crate::helpers::fixtures::{flow, host_endpoint, k8s_endpoint};
use crate::helpers::TestCluster;

#[tokio::test]
async fn single_edge_produces_root_and_child_trace() {
    let mut cluster = TestCluster::new();
    cluster.start().await;

    cluster
        .injector
        .send(flow(
            "e1-flow",
            host_endpoint(11),
            k8s_endpoint(22, "app", "Deployment", "svc"),
        ))
        .await
        .expect("inject flow");

    cluster.settle().await;

    // graph: external/Workload/nA -> app/Deployment/svc
    let graph = cluster.engine.graph();
    let neighbours = graph.neighbours("external/Workload/nA");
    assert_eq!(neighbours.len(), 1);
    assert_eq!(neighbours[0].id, "app/Deployment/svc");

    // trace: exactly one root, child chained under it
    let roots = cluster.emit_traces();
    assert_eq!(roots, 1);

    let root = cluster
        .sink
        .span_by_operation("external/Workload/nA")
        .expect("root span");
    assert!(root.parent.is_none());

    let child = cluster
        .sink
        .span_by_operation("app/Deployment/svc")
        .expect("child span");
    assert_eq!(child.parent, Some(root.context));

    cluster.stop().await;
}

#[tokio::test]
async fn repeated_flow_within_ttl_publishes_once() {
    let mut cluster = TestCluster::new();
    cluster.start().await;

    for uuid in ["e2-first", "e2-second"] {
        cluster
            .injector
            .send(flow(
                uuid,
                host_endpoint(11),
                k8s_endpoint(22, "app", "Deployment", "svc"),
            ))
            .await
            .expect("inject flow");
    }

    cluster.settle().await;

    assert_eq!(cluster.pipeline.received_count(), 2);
    assert_eq!(cluster.pipeline.published_count(), 1);

    cluster.stop().await;
}

#[tokio::test]
async fn flows_for_other_nodes_are_ignored() {
    let mut cluster = TestCluster::new();
    cluster.start().await;

    let mut foreign = flow(
        "foreign",
        host_endpoint(11),
        k8s_endpoint(22, "app", "Deployment", "svc"),
    );
    foreign.node_name = "cA/other-node".to_owned();

    cluster.injector.send(foreign).await.expect("inject flow");
    cluster.settle().await;

    assert_eq!(cluster.pipeline.published_count(), 0);
    assert!(cluster.engine.graph().keys().is_empty());

    cluster.stop().await;
}
