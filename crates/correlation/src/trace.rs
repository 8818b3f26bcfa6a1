//! 트레이스 방출 — 그래프 루트별 깊이 우선 span 트리 생성
//!
//! 주기마다 인접 맵 스냅샷에서 루트(들어오는 간선이 없는 키)를
//! 찾아 루트마다 트레이스 하나를 방출합니다. span의 연산 이름은
//! 워크로드 ID이고, 속성은 모듈 결과와 SBOM URL 목록입니다.
//!
//! 출발지 측 분석이 더 정확하므로 `srcResults`가 `destResults`를
//! 덮어씁니다. 방문 집합은 재귀 단계마다 값으로 전달되어 조상
//! 경로 안에서만 중복을 막습니다 — 같은 워크로드가 형제 서브트리에
//! 여러 번 나타나는 것은 허용됩니다.

use std::collections::BTreeMap;
use std::sync::Arc;

use cisin_core::id;
use cisin_core::types::{Analyse, SBOMS_TRACE_TAG};
use cisin_flow_agent::module::K8S_DIGEST_MODULE_NAME;

use crate::graph::NeighbourhoodGraph;
use crate::sink::{SpanAttribute, SpanContext, TraceSink};

/// 트레이스 방출기
pub struct TraceEmitter {
    sink: Arc<dyn TraceSink>,
    world_root: bool,
}

impl TraceEmitter {
    /// 새 방출기를 생성합니다.
    ///
    /// `world_root`가 참이면 각 주기의 루트들을 합성된
    /// `world/world/world` 부모 span 아래에 감쌉니다.
    pub fn new(sink: Arc<dyn TraceSink>, world_root: bool) -> Self {
        Self { sink, world_root }
    }

    /// 현재 그래프에서 트레이스를 방출하고 루트 수를 반환합니다.
    pub fn build_traces(&self, graph: &NeighbourhoodGraph) -> usize {
        if tracing::enabled!(tracing::Level::DEBUG) {
            let debug_map: BTreeMap<String, Vec<String>> = graph
                .keys()
                .into_iter()
                .map(|key| {
                    let neighbours = graph
                        .neighbours(&key)
                        .into_iter()
                        .map(|n| n.id)
                        .collect();
                    (key, neighbours)
                })
                .collect();

            match serde_json::to_string(&debug_map) {
                Ok(data) => tracing::debug!(data = %data, "generate tracing"),
                Err(e) => tracing::error!(error = %e, "failed to serialize graph"),
            }
        }

        let roots = graph.find_roots();

        tracing::trace!(roots = ?roots, "found roots");

        let world_parent = self
            .world_root
            .then(|| self.sink.start_span(id::WORLD_ID, None, Vec::new()));

        for root in &roots {
            self.build_trace(graph, root, Vec::new(), world_parent);
        }

        if let Some(world_span) = world_parent {
            self.sink.end_span(world_span);
        }

        roots.len()
    }

    /// 워크로드 하나의 span을 방출하고 이웃으로 재귀합니다.
    fn build_trace(
        &self,
        graph: &NeighbourhoodGraph,
        workload_id: &str,
        mut ids_in_trace: Vec<String>,
        parent: Option<SpanContext>,
    ) {
        ids_in_trace.push(workload_id.to_owned());

        let Some(participant) = graph.participant(workload_id) else {
            return;
        };

        let mut attributes: Vec<SpanAttribute> = Vec::new();
        let mut sbom_ids: Vec<String> = Vec::new();

        // 목적지로 관찰된 모듈 결과
        for (module_name, analyse) in &participant.dest_results {
            attributes.push(SpanAttribute::new(module_name, analyse.results.clone()));

            if module_name == K8S_DIGEST_MODULE_NAME {
                sbom_ids = analyse.results.clone();
            }
        }

        // 출발지로 관찰된 모듈 결과 — 목적지 결과를 덮어씀
        for (module_name, analyse) in &participant.src_results {
            upsert_attribute(&mut attributes, module_name, analyse);

            if module_name == K8S_DIGEST_MODULE_NAME {
                sbom_ids = analyse.results.clone();
            }
        }

        // 외부 워크로드의 SBOM은 다이제스트가 아니라 노드 이름으로 키가 잡힘
        if let Ok((_, kind, name)) = id::parse(workload_id) {
            if kind == id::EXTERNAL_WORKLOAD_KIND {
                sbom_ids = vec![name.to_owned()];
            }
        }

        attributes.push(SpanAttribute::new(
            SBOMS_TRACE_TAG,
            self.resolve_sbom_urls(graph, &sbom_ids),
        ));

        let span = self.sink.start_span(workload_id, parent, attributes);

        for neighbour in graph.neighbours(workload_id) {
            if ids_in_trace.contains(&neighbour.id) {
                continue;
            }

            self.build_trace(graph, &neighbour.id, ids_in_trace.clone(), Some(span));
        }

        self.sink.end_span(span);
    }

    /// 다이제스트/호스트명 목록을 SBOM URL 목록으로 변환합니다.
    ///
    /// 해석되지 않는 키는 위치를 보존하기 위해 빈 문자열로
    /// 방출됩니다.
    fn resolve_sbom_urls(&self, graph: &NeighbourhoodGraph, sbom_ids: &[String]) -> Vec<String> {
        let mut urls = vec![String::new(); sbom_ids.len()];

        for (index, key) in sbom_ids.iter().enumerate() {
            match graph.sbom_url(key) {
                Some(url) => {
                    tracing::trace!(key = %key, url = %url, "sbom found");
                    urls[index] = url;
                }
                None => {
                    tracing::warn!(key = %key, "no sbom found");
                }
            }
        }

        urls
    }
}

fn upsert_attribute(attributes: &mut Vec<SpanAttribute>, key: &str, analyse: &Analyse) {
    match attributes.iter_mut().find(|attribute| attribute.key == key) {
        Some(attribute) => attribute.values = analyse.results.clone(),
        None => attributes.push(SpanAttribute::new(key, analyse.results.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::CollectingSink;
    use cisin_core::types::Sbom;

    fn results(module: &str, values: &[&str]) -> BTreeMap<String, Analyse> {
        let mut map = BTreeMap::new();
        map.insert(
            module.to_owned(),
            Analyse::new(values.iter().map(|v| (*v).to_owned()).collect()),
        );
        map
    }

    fn emitter() -> (TraceEmitter, CollectingSink) {
        let sink = CollectingSink::new();
        (TraceEmitter::new(Arc::new(sink.clone()), false), sink)
    }

    #[test]
    fn single_edge_emits_root_and_child() {
        let graph = NeighbourhoodGraph::new();
        graph.observe_connection(
            "external/Workload/node-a",
            &BTreeMap::new(),
            "app/Deployment/svc",
            &BTreeMap::new(),
        );

        let (emitter, sink) = emitter();
        let roots = emitter.build_traces(&graph);

        assert_eq!(roots, 1);

        let root = sink.span_by_operation("external/Workload/node-a").unwrap();
        assert!(root.parent.is_none());

        let child = sink.span_by_operation("app/Deployment/svc").unwrap();
        assert_eq!(child.parent, Some(root.context));
        assert_eq!(child.context.trace_id, root.context.trace_id);
    }

    #[test]
    fn src_results_override_dest_results() {
        let graph = NeighbourhoodGraph::new();

        // web을 목적지로 관찰: k8s_image = [dest-img]
        graph.observe_connection(
            "app/Deployment/lb",
            &BTreeMap::new(),
            "app/Deployment/web",
            &results("k8s_image", &["dest-img"]),
        );
        // web을 출발지로 관찰: k8s_image = [src-img]
        graph.observe_connection(
            "app/Deployment/web",
            &results("k8s_image", &["src-img"]),
            "app/Deployment/db",
            &BTreeMap::new(),
        );

        let (emitter, sink) = emitter();
        emitter.build_traces(&graph);

        let web = sink.span_by_operation("app/Deployment/web").unwrap();
        assert_eq!(web.attribute("k8s_image"), Some(&["src-img".to_owned()][..]));
    }

    #[test]
    fn digests_resolve_to_sbom_urls_with_gaps() {
        let graph = NeighbourhoodGraph::new();
        graph.record_sbom(&Sbom::for_image("nginx", "sha256:known", "registry/nginx"));

        graph.observe_connection(
            "app/Deployment/web",
            &results("k8s_digest", &["sha256:known", "sha256:unknown"]),
            "app/Deployment/db",
            &BTreeMap::new(),
        );

        let (emitter, sink) = emitter();
        emitter.build_traces(&graph);

        let web = sink.span_by_operation("app/Deployment/web").unwrap();
        // 미해석 다이제스트는 위치를 보존한 빈 문자열
        assert_eq!(
            web.attribute("sboms"),
            Some(&["registry/nginx".to_owned(), String::new()][..]),
        );
    }

    #[test]
    fn external_workload_sbom_keyed_by_node_name() {
        let graph = NeighbourhoodGraph::new();
        graph.record_sbom(&Sbom::for_host("node-a", "registry/node-a"));

        graph.observe_connection(
            "external/Workload/node-a",
            &results("k8s_digest", &["sha256:ignored"]),
            "app/Deployment/svc",
            &BTreeMap::new(),
        );

        let (emitter, sink) = emitter();
        emitter.build_traces(&graph);

        let root = sink.span_by_operation("external/Workload/node-a").unwrap();
        assert_eq!(
            root.attribute("sboms"),
            Some(&["registry/node-a".to_owned()][..]),
        );
    }

    #[test]
    fn cycles_do_not_recurse_forever() {
        let graph = NeighbourhoodGraph::new();
        let empty = BTreeMap::new();

        // lb → web → db, db → lb는 역방향 억제를 피해 사이클 구성
        graph.observe_connection("app/Deployment/lb", &empty, "app/Deployment/web", &empty);
        graph.observe_connection("app/Deployment/web", &empty, "app/Deployment/db", &empty);
        graph.observe_connection("app/Deployment/db", &empty, "app/Deployment/extra", &empty);
        graph.observe_connection("app/Deployment/extra", &empty, "app/Deployment/lb", &empty);

        let (emitter, sink) = emitter();
        // 사이클 구성원은 모두 들어오는 간선이 있어 루트가 없음
        let roots = emitter.build_traces(&graph);
        assert_eq!(roots, 0);
        assert!(sink.finished_spans().is_empty());
    }

    #[test]
    fn sibling_subtrees_may_repeat_workloads() {
        let graph = NeighbourhoodGraph::new();
        let empty = BTreeMap::new();

        // root → a → shared, root → b → shared
        graph.observe_connection("ns/Deployment/root", &empty, "ns/Deployment/a", &empty);
        graph.observe_connection("ns/Deployment/root", &empty, "ns/Deployment/b", &empty);
        graph.observe_connection("ns/Deployment/a", &empty, "ns/Deployment/shared", &empty);
        graph.observe_connection("ns/Deployment/b", &empty, "ns/Deployment/shared", &empty);

        let (emitter, sink) = emitter();
        emitter.build_traces(&graph);

        let shared_spans: Vec<_> = sink
            .finished_spans()
            .into_iter()
            .filter(|span| span.operation == "ns/Deployment/shared")
            .collect();

        // 형제 서브트리마다 한 번씩 — 조상 경로 안에서만 중복 금지
        assert_eq!(shared_spans.len(), 2);
    }

    #[test]
    fn world_root_variant_wraps_roots() {
        let graph = NeighbourhoodGraph::new();
        let empty = BTreeMap::new();
        graph.observe_connection("a/b/c", &empty, "a/b/d", &empty);

        let sink = CollectingSink::new();
        let emitter = TraceEmitter::new(Arc::new(sink.clone()), true);
        emitter.build_traces(&graph);

        let world = sink.span_by_operation("world/world/world").unwrap();
        assert!(world.parent.is_none());

        let root = sink.span_by_operation("a/b/c").unwrap();
        assert_eq!(root.parent, Some(world.context));
    }
}
