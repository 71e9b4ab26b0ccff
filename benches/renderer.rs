use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use mermaid_rs_canvas::config::Config;
use mermaid_rs_canvas::document::Document;
use mermaid_rs_canvas::geometry::{CurveMode, resolve_edges};
use mermaid_rs_canvas::immediate::{ImmediateSink, RecordingSurface};
use mermaid_rs_canvas::interaction::trace_flow;
use mermaid_rs_canvas::model::{Diagram, DiagramKind, Edge, Node, NodeShape};
use mermaid_rs_canvas::scene::build_scene;
use std::hint::black_box;
use std::rc::Rc;

/// A grid of ranked nodes with a chain through every node plus skip edges,
/// some of them pointing back up to exercise stacking and detours.
fn dense_diagram(nodes: usize, extra_edges: usize) -> Diagram {
    let columns = 6usize;
    let rows = nodes.div_ceil(columns).max(1);
    let mut diagram = Diagram::new(
        DiagramKind::Flowchart,
        columns as f32 * 140.0,
        rows as f32 * 100.0,
    );
    let center = |i: usize| {
        (
            70.0 + (i % columns) as f32 * 140.0,
            50.0 + (i / columns) as f32 * 100.0,
        )
    };
    for i in 0..nodes {
        diagram.add_node(
            Node::new(&format!("N{i}"), NodeShape::Rectangle, center(i), (100.0, 44.0))
                .with_label(&format!("Node {i}"))
                .with_rank(i / columns),
        );
    }
    let connect = |diagram: &mut Diagram, a: usize, b: usize| {
        let (from, to) = (center(a), center(b));
        let points = vec![
            (from.0, from.1 + 22.0),
            ((from.0 + to.0) / 2.0, (from.1 + to.1) / 2.0),
            (to.0, to.1 - 22.0),
        ];
        diagram.add_edge(Edge::new(&format!("N{a}"), &format!("N{b}"), points));
    };
    for i in 0..nodes.saturating_sub(1) {
        connect(&mut diagram, i, i + 1);
    }
    let mut count = 0usize;
    'outer: for i in 0..nodes {
        for j in (i + 2)..nodes {
            if count >= extra_edges {
                break 'outer;
            }
            if count % 5 == 0 {
                connect(&mut diagram, j, i);
            } else {
                connect(&mut diagram, i, j);
            }
            count += 1;
        }
    }
    diagram
}

const SIZES: [(usize, usize); 3] = [(40, 80), (60, 180), (80, 320)];

fn bench_edge_geometry(c: &mut Criterion) {
    let mut group = c.benchmark_group("edge_geometry");
    let config = Config::default();
    for (nodes, extra_edges) in SIZES {
        let diagram = dense_diagram(nodes, extra_edges);
        for curve in [CurveMode::Basis, CurveMode::Linear] {
            let name = format!("dense_{nodes}_{extra_edges}");
            group.bench_with_input(
                BenchmarkId::new(format!("{curve:?}").to_lowercase(), &name),
                &diagram,
                |b, diagram| {
                    b.iter(|| {
                        let edges = resolve_edges(black_box(diagram), &config.geometry, curve);
                        black_box(edges.len());
                    });
                },
            );
        }
    }
    group.finish();
}

fn bench_svg_document(c: &mut Criterion) {
    let mut group = c.benchmark_group("svg_document");
    let config = Config::default();
    for (nodes, extra_edges) in SIZES {
        let diagram = dense_diagram(nodes, extra_edges);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("dense_{nodes}_{extra_edges}")),
            &diagram,
            |b, diagram| {
                b.iter(|| {
                    let scene = build_scene(black_box(diagram), &config.theme, None, &config);
                    let svg = Document::from_scene(&scene).to_svg();
                    black_box(svg.len());
                });
            },
        );
    }
    group.finish();
}

fn bench_immediate_redraw(c: &mut Criterion) {
    let mut group = c.benchmark_group("immediate_redraw");
    let config = Config::default();
    for (nodes, extra_edges) in SIZES {
        let diagram = Rc::new(dense_diagram(nodes, extra_edges));
        let scene = build_scene(&diagram, &config.theme, None, &config);
        let mut sink = ImmediateSink::new();
        sink.bind_model(&diagram);
        group.bench_function(
            BenchmarkId::from_parameter(format!("dense_{nodes}_{extra_edges}")),
            |b| {
                b.iter(|| {
                    let mut surface = RecordingSurface::new();
                    sink.draw_scene(black_box(&scene), &mut surface, None);
                    black_box(surface.ops.len());
                });
            },
        );
    }
    group.finish();
}

fn bench_flow_trace(c: &mut Criterion) {
    let diagram = dense_diagram(80, 320);
    c.bench_function("flow_trace_dense_80_320", |b| {
        b.iter(|| {
            let set = trace_flow(black_box(&diagram), "N40", None);
            black_box(set.edges.len());
        });
    });
}

criterion_group!(
    benches,
    bench_edge_geometry,
    bench_svg_document,
    bench_immediate_redraw,
    bench_flow_trace
);
criterion_main!(benches);
