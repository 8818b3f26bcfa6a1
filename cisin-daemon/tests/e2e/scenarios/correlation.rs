//! E2E: server-side correlation semantics.
//!
//! Reverse-edge suppression, world filtering, and pod-to-owner
//! translation, each driven through the full agent -> bus -> engine
//! path.

use cisin_core::cluster::{OwnerRef, PodSummary, ReplicaSetSummary};

use crate::helpers::TestCluster;
use crate::helpers::fixtures::{flow, k8s_endpoint, pod_endpoint, world_endpoint};

#[tokio::test]
async fn reverse_edge_is_not_duplicated() {
    let mut cluster = TestCluster::new();
    cluster.start().await;

    // a -> b
    cluster
        .injector
        .send(flow(
            "fwd",
            k8s_endpoint(11, "app", "Deployment", "a"),
            k8s_endpoint(22, "app", "Deployment", "b"),
        ))
        .await
        .expect("inject flow");
    cluster.settle().await;

    // b -> a afterwards: the existing a->b edge anchors the pair
    cluster
        .injector
        .send(flow(
            "rev",
            k8s_endpoint(22, "app", "Deployment", "b"),
            k8s_endpoint(11, "app", "Deployment", "a"),
        ))
        .await
        .expect("inject flow");
    cluster.settle().await;

    let graph = cluster.engine.graph();
    assert_eq!(graph.neighbours("app/Deployment/a").len(), 1);
    assert!(graph.neighbours("app/Deployment/b").is_empty());

    cluster.stop().await;
}

#[tokio::test]
async fn world_source_never_enters_the_graph() {
    let mut cluster = TestCluster::new();
    cluster.start().await;

    cluster
        .injector
        .send(flow(
            "from-world",
            world_endpoint(11),
            k8s_endpoint(22, "app", "Deployment", "svc"),
        ))
        .await
        .expect("inject flow");
    cluster.settle().await;

    // the agent publishes (world source is a valid classification),
    // but the server drops the message before any graph update
    assert_eq!(cluster.pipeline.published_count(), 1);
    assert!(cluster.engine.graph().keys().is_empty());

    cluster.stop().await;
}

#[tokio::test]
async fn pod_source_is_translated_to_owning_deployment() {
    let mut cluster = TestCluster::new();

    // pod -> replicaset -> deployment chain known to the server
    cluster.lookup.add_pod(PodSummary {
        name: "web-7b9d4-x2j".to_owned(),
        namespace: "app".to_owned(),
        owner_references: vec![OwnerRef::new("ReplicaSet", "web-7b9d4")],
        ..Default::default()
    });
    cluster.lookup.add_replica_set(ReplicaSetSummary {
        name: "web-7b9d4".to_owned(),
        namespace: "app".to_owned(),
        owner_references: vec![OwnerRef::new("Deployment", "web")],
    });

    cluster.start().await;

    cluster
        .injector
        .send(flow(
            "pod-flow",
            pod_endpoint(11, "app", "web-7b9d4-x2j"),
            k8s_endpoint(22, "app", "Deployment", "db"),
        ))
        .await
        .expect("inject flow");
    cluster.settle().await;

    let graph = cluster.engine.graph();
    let neighbours = graph.neighbours("app/Deployment/web");
    assert_eq!(neighbours.len(), 1);
    assert_eq!(neighbours[0].id, "app/Deployment/db");

    cluster.stop().await;
}

#[tokio::test]
async fn chain_of_edges_yields_single_deep_trace() {
    let mut cluster = TestCluster::new();
    cluster.start().await;

    // lb -> web -> db
    cluster
        .injector
        .send(flow(
            "hop1",
            k8s_endpoint(1, "app", "Deployment", "lb"),
            k8s_endpoint(2, "app", "Deployment", "web"),
        ))
        .await
        .expect("inject flow");
    cluster
        .injector
        .send(flow(
            "hop2",
            k8s_endpoint(2, "app", "Deployment", "web"),
            k8s_endpoint(3, "app", "Deployment", "db"),
        ))
        .await
        .expect("inject flow");
    cluster.settle().await;

    let roots = cluster.emit_traces();
    assert_eq!(roots, 1);

    let lb = cluster.sink.span_by_operation("app/Deployment/lb").unwrap();
    let web = cluster.sink.span_by_operation("app/Deployment/web").unwrap();
    let db = cluster.sink.span_by_operation("app/Deployment/db").unwrap();

    assert!(lb.parent.is_none());
    assert_eq!(web.parent, Some(lb.context));
    assert_eq!(db.parent, Some(web.context));
    assert_eq!(db.context.trace_id, lb.context.trace_id);

    cluster.stop().await;
}
