use std::collections::BTreeSet;
use std::path::Path;
use std::rc::Rc;

use mermaid_rs_canvas::config::Config;
use mermaid_rs_canvas::immediate::{RecordingSurface, SurfaceOp};
use mermaid_rs_canvas::interaction::{
    Cursor, DiagramView, HitTarget, HoverState, ManualScheduler, ViewEvent,
};
use mermaid_rs_canvas::model::{Diagram, DiagramKind, Edge, EdgeKey, Node, NodeShape};
use mermaid_rs_canvas::theme::Theme;

fn fixture(name: &str) -> Rc<Diagram> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    let text = std::fs::read_to_string(path).expect("fixture read failed");
    Rc::new(Diagram::from_json(&text).expect("fixture parse failed"))
}

fn key(from: &str, to: &str) -> EdgeKey {
    (from.to_string(), to.to_string())
}

fn names(set: &BTreeSet<String>) -> Vec<&str> {
    set.iter().map(String::as_str).collect()
}

/// View-space point for a model-space point under the default padding.
fn at(x: f32, y: f32) -> (f32, f32) {
    let padding = Config::default().render.padding;
    (x + padding, y + padding)
}

fn view_with(config: Config, model: &str) -> DiagramView<ManualScheduler> {
    let mut view = DiagramView::new(config, ManualScheduler::default());
    view.set_model(fixture(model));
    view
}

#[test]
fn single_hop_hover_on_chain() {
    let mut config = Config::default();
    config.interaction.trace_hops = Some(1);
    let mut view = view_with(config, "chain.json");
    let events = view.pointer_moved(at(100.0, 270.0));
    assert!(events.contains(&ViewEvent::HighlightChanged));
    assert_eq!(
        view.highlight().edges,
        BTreeSet::from([key("B", "C"), key("C", "D")])
    );
    assert_eq!(names(&view.highlight().nodes), ["B", "C", "D"]);
}

#[test]
fn unlimited_hover_follows_the_chain() {
    let mut view = view_with(Config::default(), "chain.json");
    view.pointer_moved(at(100.0, 270.0));
    assert_eq!(view.highlight().edges.len(), 4);
    assert_eq!(names(&view.highlight().nodes), ["A", "B", "C", "D", "E"]);
}

#[test]
fn branch_hover_then_child_hover() {
    let mut view = view_with(Config::default(), "branch.json");
    view.pointer_moved(at(150.0, 30.0));
    assert_eq!(
        view.highlight().edges,
        BTreeSet::from([key("F", "G"), key("F", "H")])
    );
    assert_eq!(names(&view.highlight().nodes), ["F", "G", "H"]);

    view.pointer_moved(at(60.0, 150.0));
    assert!(view.highlight().contains_edge(&key("F", "G")));
    assert!(!view.highlight().contains_edge(&key("F", "H")));
    assert!(!view.highlight().contains_node("H"));
}

#[test]
fn edge_hover_highlights_edge_and_endpoints() {
    let mut view = view_with(Config::default(), "chain.json");
    view.pointer_moved(at(108.0, 210.0));
    assert_eq!(
        view.state(),
        &HoverState::Hovering(HitTarget::Edge(key("B", "C")))
    );
    assert_eq!(view.highlight().edges, BTreeSet::from([key("B", "C")]));
    assert_eq!(names(&view.highlight().nodes), ["B", "C"]);
}

#[test]
fn exit_clears_highlight_and_stops_animation() {
    let mut view = view_with(Config::default(), "chain.json");
    assert!(!view.scheduler().is_running());
    view.pointer_moved(at(100.0, 150.0));
    assert!(view.scheduler().is_running());
    assert!(view.tick());
    assert_eq!(view.animation().phase(), 2.0);

    let events = view.pointer_exited();
    assert!(events.contains(&ViewEvent::HighlightChanged));
    assert_eq!(view.state(), &HoverState::Idle);
    assert!(view.highlight().is_empty());
    assert!(!view.scheduler().is_running());
    assert!(!view.tick(), "no ticks with nothing highlighted");
    assert_eq!(view.scheduler().starts, 1);
}

#[test]
fn moving_within_the_same_target_is_quiet() {
    let mut view = view_with(Config::default(), "chain.json");
    view.pointer_moved(at(100.0, 150.0));
    assert!(view.pointer_moved(at(110.0, 155.0)).is_empty());
    assert!(view.pointer_moved(at(5.0, 90.0)).contains(&ViewEvent::HighlightChanged));
    assert_eq!(view.state(), &HoverState::Idle);
}

#[test]
fn node_to_edge_move_notifies_even_with_equal_highlight() {
    let mut diagram = Diagram::new(DiagramKind::Flowchart, 120.0, 200.0);
    diagram.add_node(Node::new("A", NodeShape::Rectangle, (60.0, 20.0), (80.0, 40.0)));
    diagram.add_node(Node::new("B", NodeShape::Rectangle, (60.0, 180.0), (80.0, 40.0)));
    diagram.add_edge(Edge::new("A", "B", vec![(60.0, 40.0), (60.0, 160.0)]));
    let mut view = DiagramView::new(Config::default(), ManualScheduler::default());
    view.set_model(Rc::new(diagram));

    view.pointer_moved(at(60.0, 20.0));
    let on_node = view.highlight().clone();
    let events = view.pointer_moved(at(60.0, 100.0));
    assert_eq!(
        view.state(),
        &HoverState::Hovering(HitTarget::Edge(key("A", "B")))
    );
    assert_eq!(view.highlight(), &on_node);
    assert!(events.contains(&ViewEvent::HighlightChanged));
}

#[test]
fn linked_nodes_show_hand_and_activate() {
    let mut view = view_with(Config::default(), "chain.json");
    let events = view.pointer_moved(at(100.0, 270.0));
    assert!(events.contains(&ViewEvent::CursorChanged(Cursor::Hand)));
    assert_eq!(
        view.pointer_pressed(),
        vec![ViewEvent::LinkActivated("app://node/C".into())]
    );
    assert_eq!(view.state(), &HoverState::Hovering(HitTarget::Node("C".into())));

    view.pointer_moved(at(100.0, 390.0));
    assert_eq!(view.cursor(), Cursor::Default);
    assert!(view.pointer_pressed().is_empty());
}

#[test]
fn measure_only_scales_down() {
    let mut view = view_with(Config::default(), "chain.json");
    assert_eq!(view.measure(Some(1000.0)), (216.0, 636.0));
    assert_eq!(view.scale(), 1.0);
    let (w, h) = view.measure(Some(108.0));
    assert_eq!(view.scale(), 0.5);
    assert_eq!((w, h), (108.0, 318.0));

    // Hit testing follows the scale.
    view.pointer_moved((54.0, 139.0));
    assert_eq!(view.state(), &HoverState::Hovering(HitTarget::Node("C".into())));
}

#[test]
fn draw_uses_animated_dash_for_highlighted_edges() {
    let mut view = view_with(Config::default(), "chain.json");
    view.pointer_moved(at(108.0, 210.0));
    view.tick();
    view.tick();
    let mut surface = RecordingSurface::new();
    view.draw(&mut surface);
    let dashed: Vec<f32> = surface
        .ops
        .iter()
        .filter_map(|op| match op {
            SurfaceOp::Stroke(_, pen) if pen.dash.as_deref() == Some(&[8.0, 4.0][..]) => {
                Some(pen.dash_offset)
            }
            _ => None,
        })
        .collect();
    assert_eq!(dashed, [-4.0]);
}

#[test]
fn scene_is_reused_across_ticks_and_rebuilt_on_theme_change() {
    let mut view = view_with(Config::default(), "chain.json");
    assert!(view.scene().is_none());
    view.pointer_moved(at(108.0, 210.0));
    view.draw(&mut RecordingSurface::new());
    let first = Rc::clone(view.scene().expect("draw builds the scene"));

    assert!(view.tick());
    view.draw(&mut RecordingSurface::new());
    assert!(Rc::ptr_eq(&first, view.scene().unwrap()));

    let same = Rc::clone(view.model().unwrap());
    view.set_model(same);
    assert!(Rc::ptr_eq(&first, view.scene().unwrap()));

    view.set_theme(Theme::named("dark"));
    assert!(view.scene().is_none());
    view.draw(&mut RecordingSurface::new());
    let rebuilt = view.scene().unwrap();
    assert!(!Rc::ptr_eq(&first, rebuilt));
    assert_eq!(rebuilt.background, Theme::named("dark").background);
}

#[test]
fn rebinding_resets_hover_and_caches() {
    let mut view = view_with(Config::default(), "chain.json");
    view.pointer_moved(at(100.0, 150.0));
    let mut surface = RecordingSurface::new();
    view.draw(&mut surface);
    assert!(view.sink().caches().total_len() > 0);

    let events = view.set_model(fixture("branch.json"));
    assert!(events.contains(&ViewEvent::HighlightChanged));
    assert!(view.highlight().is_empty());
    assert_eq!(view.sink().caches().total_len(), 0);
    assert!(!view.scheduler().is_running());

    view.detach();
    assert!(!view.animation().is_running());
}

#[test]
fn named_skin_draws_through_the_skin_cache() {
    use mermaid_rs_canvas::skin::{SkinPack, SkinRegistry};

    let pack = SkinPack::from_json(
        r##"{
            "name": "sketch",
            "shapes": {
                "flowchart.rectangle": {
                    "layers": [{ "path": "M0 0 L10 0 L10 10 L0 10 Z", "fill": "#fafafa" }],
                    "viewBox": { "x": 0, "y": 0, "width": 10, "height": 10 }
                }
            }
        }"##,
    )
    .unwrap();
    let mut registry = SkinRegistry::default();
    registry.insert(pack);

    let mut view = view_with(Config::default(), "chain.json");
    view.set_skin_named(&registry, "sketch");
    let mut surface = RecordingSurface::new();
    view.draw(&mut surface);
    assert_eq!(view.sink().caches().skins.len(), 1, "one layer shared by every node");

    view.set_skin_named(&registry, "unknown");
    let mut surface = RecordingSurface::new();
    view.draw(&mut surface);
    assert_eq!(view.sink().skipped(), 0);
}

#[test]
fn theme_override_changes_the_clear_color() {
    use mermaid_rs_canvas::theme::parse_color;

    let mut view = view_with(Config::default(), "chain.json");
    let dark = Theme::named("dark");
    let expected = parse_color(&dark.background).unwrap();
    view.set_theme(dark);
    let mut surface = RecordingSurface::new();
    view.draw(&mut surface);
    assert_eq!(surface.ops.first(), Some(&SurfaceOp::Clear(expected)));
}
