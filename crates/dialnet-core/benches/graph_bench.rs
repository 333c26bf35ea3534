//! # Graph Benchmarks
//!
//! Performance benchmarks for dialnet-core editing operations.
//!
//! Run with: `cargo bench -p dialnet-core`

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use dialnet_core::{Arc, ArcId, ArcKind, Graph, Node, NodeId, Position, System};
use std::hint::black_box;

/// Create a system with one network holding a chain of N nodes.
fn create_linear_system(size: usize) -> System {
    let mut system = System::new();
    let _ = system.add_network("main");
    let mut prev: Option<String> = None;

    for _ in 0..size {
        let node = system
            .add_node("main", None, Position::default())
            .expect("node");
        if let Some(prev) = prev {
            system.add_arc("main", None, &prev, &node).expect("arc");
        }
        prev = Some(node);
    }

    system
}

/// Create a raw graph with N spokes around hub 0.
fn create_star_graph(size: u64) -> Graph<Node, Arc> {
    let mut graph = Graph::new();
    let hub = Node::new(NodeId(0), "hub", "main", Position::default());
    graph.add_vertex(hub).expect("hub");

    for i in 1..size {
        let spoke = Node::new(NodeId(i), format!("s{i}"), "main", Position::default());
        graph.add_vertex(spoke).expect("spoke");
        let arc = Arc::new(ArcId(i), format!("a{i}"), "main", 0, ArcKind::Empty);
        graph.add_edge(arc, NodeId(0), NodeId(i)).expect("edge");
    }

    graph
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_node_insertion(c: &mut Criterion) {
    let mut group = c.benchmark_group("node_insertion");

    for size in [100, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let mut system = System::new();
                let _ = system.add_network("main");
                for _ in 0..size {
                    let _ = system.add_node("main", None, Position::default());
                }
                black_box(system)
            });
        });
    }

    group.finish();
}

fn bench_arc_insertion(c: &mut Criterion) {
    let mut group = c.benchmark_group("arc_insertion");

    for size in [100, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| black_box(create_linear_system(size)));
        });
    }

    group.finish();
}

fn bench_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract_hub");

    for size in [100u64, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let graph = create_star_graph(size);
            b.iter(|| {
                let mut graph = graph.clone();
                let result = graph.extract_vertex(
                    NodeId(0),
                    |_, neighbor| neighbor.clone(),
                    |_, _| Ok(()),
                    |_, _| Ok::<(), dialnet_core::GraphError>(()),
                );
                black_box(result.map(|extraction| extraction.edges.len()))
            });
        });
    }

    group.finish();
}

fn bench_remove_node(c: &mut Criterion) {
    let system = create_linear_system(500);

    c.bench_function("remove_middle_node", |b| {
        b.iter(|| {
            let mut system = create_linear_system(50);
            let name = system.nodes_of("main").ok().and_then(|nodes| nodes.get(25).map(|n| n.name.clone()));
            if let Some(name) = name {
                let _ = system.remove_node(&name);
            }
            black_box(system)
        });
    });

    c.bench_function("check_consistency_500", |b| {
        b.iter(|| black_box(system.check_consistency().is_ok()));
    });
}

criterion_group!(
    benches,
    bench_node_insertion,
    bench_arc_insertion,
    bench_extraction,
    bench_remove_node,
);
criterion_main!(benches);
