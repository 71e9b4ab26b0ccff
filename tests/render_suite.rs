use std::path::Path;
use std::rc::Rc;

use mermaid_rs_canvas::config::{Config, parse_config};
use mermaid_rs_canvas::document::Document;
use mermaid_rs_canvas::geometry::{CurveMode, RouteKind, StackSide, resolve_edges};
use mermaid_rs_canvas::immediate::{ImmediateSink, RecordingSurface};
use mermaid_rs_canvas::model::Diagram;
use mermaid_rs_canvas::render::{render_model_json, render_svg};
use mermaid_rs_canvas::scene::build_scene;

fn fixture_text(name: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    std::fs::read_to_string(path).expect("fixture read failed")
}

fn fixture(name: &str) -> Diagram {
    Diagram::from_json(&fixture_text(name)).expect("fixture parse failed")
}

fn assert_valid_svg(svg: &str, fixture: &str) {
    assert!(svg.starts_with("<svg"), "{fixture}: missing <svg tag");
    assert!(svg.ends_with("</svg>"), "{fixture}: missing </svg tag");
    assert_eq!(
        svg.matches("<g").count(),
        svg.matches("</g>").count(),
        "{fixture}: unbalanced groups"
    );
}

#[test]
fn render_all_fixtures() {
    let config = Config::default();
    for name in [
        "flowchart.json",
        "back_edges.json",
        "obstacle.json",
        "hostile.json",
    ] {
        let first = render_model_json(&fixture_text(name), &config, None).expect("render failed");
        let second = render_model_json(&fixture_text(name), &config, None).expect("render failed");
        assert_valid_svg(&first, name);
        assert_eq!(first, second, "{name}: output is not deterministic");
    }
}

#[test]
fn flowchart_fixture_content() {
    let svg = render_svg(&fixture("flowchart.json"), &Config::default(), None);
    for label in ["Start", "Check", "Store", ">go<"] {
        assert!(svg.contains(label), "missing {label}");
    }
    assert!(svg.contains("<a href=\"https://example.com/a\"><title>Open A</title>"));
    assert!(svg.contains("#ff9966"), "class fill applied");
    assert!(!svg.contains("important"));
    assert!(svg.contains("class=\"edge dotted\""));
}

#[test]
fn hostile_input_is_neutralized() {
    let svg = render_svg(&fixture("hostile.json"), &Config::default(), None);
    assert_valid_svg(&svg, "hostile.json");
    for needle in ["javascript", "expression", "evil.example", "<script", "<b>"] {
        assert!(!svg.contains(needle), "leaked {needle}");
    }
    assert!(svg.contains("&lt;b&gt;bold&lt;/b&gt; &amp;"));
    assert!(svg.contains("url(#warm)"), "known gradient reference survives");
    assert!(svg.contains("cursor:pointer"));
}

#[test]
fn back_edges_stack_on_opposite_sides() {
    let diagram = fixture("back_edges.json");
    let edges = resolve_edges(&diagram, &Config::default().geometry, CurveMode::Basis);
    let sides: Vec<StackSide> = edges
        .iter()
        .map(|edge| match edge.as_ref().map(|e| e.route) {
            Some(RouteKind::Stacked(slot)) => slot.side,
            other => panic!("expected a stacked route, got {other:?}"),
        })
        .collect();
    assert_eq!(sides, [StackSide::Left, StackSide::Right]);
    let back = edges[1].as_ref().unwrap();
    assert!(back.label_anchor.unwrap().0 > 150.0, "label rides the right riser");
}

#[test]
fn skip_edge_detours_around_middle_node() {
    let diagram = fixture("obstacle.json");
    let edges = resolve_edges(&diagram, &Config::default().geometry, CurveMode::Basis);
    let routes: Vec<RouteKind> = edges.iter().map(|e| e.as_ref().unwrap().route).collect();
    assert_eq!(routes[0], RouteKind::Straight);
    assert_eq!(routes[1], RouteKind::Straight);
    assert_eq!(routes[2], RouteKind::Detour);

    let detour = edges[2].as_ref().unwrap();
    let middle = diagram.node("M").unwrap().bounds();
    for point in detour.geometry_points() {
        assert!(!middle.contains(point), "detour crosses the obstacle at {point:?}");
    }
    assert!(detour.label_anchor.unwrap().0 < middle.x);
}

#[test]
fn two_point_edges_agree_across_curve_modes() {
    let diagram = fixture("flowchart.json");
    let config = Config::default();
    let basis = resolve_edges(&diagram, &config.geometry, CurveMode::Basis);
    let linear = resolve_edges(&diagram, &config.geometry, CurveMode::Linear);
    for (a, b) in basis.iter().zip(&linear) {
        let (a, b) = (a.as_ref().unwrap(), b.as_ref().unwrap());
        assert_eq!(a.start(), b.start());
        assert_eq!(a.end(), b.end());
    }
}

#[test]
fn immediate_sink_draws_what_the_document_holds() {
    let config = Config::default();
    for name in ["flowchart.json", "back_edges.json", "obstacle.json"] {
        let diagram = Rc::new(fixture(name));
        let scene = build_scene(&diagram, &config.theme, None, &config);
        let document = Document::from_scene(&scene);

        let mut sink = ImmediateSink::new();
        sink.bind_model(&diagram);
        let mut from_scene = RecordingSurface::new();
        sink.draw_scene(&scene, &mut from_scene, None);
        let mut from_document = RecordingSurface::new();
        sink.draw_document(&document, &mut from_document, None);

        assert_eq!(from_scene.ops, from_document.ops, "{name}: sinks disagree");
        assert_eq!(sink.skipped(), 0, "{name}: nothing should be skipped");
    }
}

#[test]
fn dark_config_renders_dark_background() {
    let config = parse_config(r#"{ "theme": "dark", "padding": 20 }"#).unwrap();
    let diagram = fixture("flowchart.json");
    let svg = render_svg(&diagram, &config, None);
    assert!(svg.contains(&format!("fill=\"{}\"", config.theme.background)));
    assert!(svg.contains("width=\"240\""));
}

#[test]
fn empty_model_renders_empty_canvas() {
    let json = r#"{ "width": 0, "height": 0 }"#;
    let svg = render_model_json(json, &Config::default(), None).unwrap();
    assert_valid_svg(&svg, "empty");
    assert!(!svg.contains("<text"));
}

#[cfg(feature = "png")]
#[test]
fn png_outputs_are_written() {
    use mermaid_rs_canvas::render::{render_png_direct, write_output_png};

    let diagram = fixture("flowchart.json");
    let config = Config::default();
    let dir = std::env::temp_dir();
    let via_svg = dir.join(format!("mmdc-canvas-suite-{}.png", std::process::id()));
    write_output_png(&render_svg(&diagram, &config, None), &via_svg, &config.render).unwrap();
    let bytes = std::fs::read(&via_svg).unwrap();
    assert!(bytes.starts_with(&[0x89, b'P', b'N', b'G']));
    let _ = std::fs::remove_file(&via_svg);

    let direct = render_png_direct(&diagram, &config, None).unwrap();
    assert_eq!(direct.pixmap().width(), 216);
}
