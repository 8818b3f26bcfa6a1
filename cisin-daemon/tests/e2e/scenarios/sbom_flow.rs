//! E2E: the SBOM loop.
//!
//! A scheduler generates an SBOM artifact, publishes its location on
//! the bus, the server indexes it by digest, and the next emitted
//! trace resolves the workload's digest to the artifact URL.

use std::sync::Arc;
use std::time::Duration;

use cisin_core::cluster::PodSummary;
use cisin_core::pipeline::Pipeline;
use cisin_core::types::{FlowEndpoint, WorkloadRef};
use cisin_sbom::{
    ContainerDaemon, ImageSbomGenerator, K8sSbomScheduler, MemoryRegistry, SPDX_JSON_MEDIA_TYPE,
    SbomSchedulerConfig, StaticContainerDaemon, StaticSbomSynth,
};

use crate::helpers::TestCluster;
use crate::helpers::fixtures::{flow, k8s_endpoint};

const IMAGE: &str = "docker.io/library/web:latest";
const DIGEST: &str = "sha256:feedface";

fn web_endpoint(identity: u64) -> FlowEndpoint {
    FlowEndpoint {
        identity,
        namespace: "app".to_owned(),
        pod_name: "web-0".to_owned(),
        workloads: vec![WorkloadRef {
            kind: "StatefulSet".to_owned(),
            name: "web".to_owned(),
        }],
        ..Default::default()
    }
}

#[tokio::test]
async fn scheduler_to_trace_sbom_resolution() {
    let mut cluster = TestCluster::with_modules(vec!["k8s_digest".to_owned()]);

    // the pod backing the endpoint, with the image digest the module reports
    cluster.lookup.add_pod(PodSummary {
        name: "web-0".to_owned(),
        namespace: "app".to_owned(),
        container_image_ids: vec![format!("docker.io/library/web@{DIGEST}")],
        ..Default::default()
    });

    cluster.start().await;

    // SBOM scheduler on the same bus
    let daemon = StaticContainerDaemon::new();
    daemon.add_image(IMAGE, DIGEST);
    let daemon = Arc::new(daemon);

    let registry = MemoryRegistry::new("registry.local/cisin");
    let generator = Arc::new(ImageSbomGenerator::new(
        Arc::clone(&daemon) as Arc<dyn ContainerDaemon>,
        Arc::new(registry.clone()),
        Arc::new(StaticSbomSynth::new(b"{}".as_slice())),
        SPDX_JSON_MEDIA_TYPE,
    ));

    let mut scheduler = K8sSbomScheduler::new(
        SbomSchedulerConfig {
            generation_interval: Duration::from_millis(20),
            node_name: "nA".to_owned(),
            ..Default::default()
        },
        cluster.bus.clone(),
        daemon,
        generator,
    );

    scheduler.start().await.expect("start scheduler");

    // wait for at least one generation cycle to publish and be indexed
    tokio::time::sleep(Duration::from_millis(200)).await;

    let expected_url = "registry.local/cisin/docker.io/library/web:feedface";
    assert_eq!(
        cluster.engine.graph().sbom_url(DIGEST),
        Some(expected_url.to_owned()),
        "sbom message indexed by digest"
    );

    // a flow whose source is enriched by the k8s_digest module
    cluster
        .injector
        .send(flow(
            "sbom-flow",
            web_endpoint(11),
            k8s_endpoint(22, "app", "Deployment", "db"),
        ))
        .await
        .expect("inject flow");
    cluster.settle().await;

    cluster.emit_traces();

    let span = cluster
        .sink
        .span_by_operation("app/StatefulSet/web")
        .expect("web span");

    assert_eq!(span.attribute("k8s_digest"), Some(&[DIGEST.to_owned()][..]));
    assert_eq!(
        span.attribute("sboms"),
        Some(&[expected_url.to_owned()][..]),
        "digest resolved to the generated artifact URL"
    );

    scheduler.stop().await.expect("stop scheduler");
    cluster.stop().await;
}

#[tokio::test]
async fn sbom_artifact_is_built_once_per_digest() {
    let daemon = StaticContainerDaemon::new();
    daemon.add_image(IMAGE, DIGEST);

    let registry = MemoryRegistry::new("registry.local/cisin");
    let generator = ImageSbomGenerator::new(
        Arc::new(daemon),
        Arc::new(registry.clone()),
        Arc::new(StaticSbomSynth::new(b"{}".as_slice())),
        SPDX_JSON_MEDIA_TYPE,
    );

    use cisin_sbom::SbomGenerator;

    let first = generator.generate(IMAGE).await.expect("first");
    let second = generator.generate(IMAGE).await.expect("second");

    assert_eq!(first, second);
    assert_eq!(registry.len(), 1);
}
