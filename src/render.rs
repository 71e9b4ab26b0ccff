use crate::config::Config;
#[cfg(feature = "png")]
use crate::config::RenderConfig;
use crate::document::Document;
use crate::model::Diagram;
use crate::scene::{Scene, build_scene};
use crate::skin::SkinPack;
use anyhow::Result;
use std::path::Path;

/// Scene for `diagram` with the configured theme.
pub fn render_scene(diagram: &Diagram, config: &Config, skin: Option<&SkinPack>) -> Scene {
    build_scene(diagram, &config.theme, skin, config)
}

pub fn render_document(diagram: &Diagram, config: &Config, skin: Option<&SkinPack>) -> Document {
    Document::from_scene(&render_scene(diagram, config, skin))
}

pub fn render_svg(diagram: &Diagram, config: &Config, skin: Option<&SkinPack>) -> String {
    render_document(diagram, config, skin).to_svg()
}

/// Parses a positioned model from JSON, drops invalid edges and renders it.
pub fn render_model_json(input: &str, config: &Config, skin: Option<&SkinPack>) -> Result<String> {
    let diagram = Diagram::from_json(input)?;
    Ok(render_svg(&diagram, config, skin))
}

pub fn write_output_svg(svg: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, svg)?;
        }
        None => {
            print!("{}", svg);
        }
    }
    Ok(())
}

#[cfg(feature = "png")]
fn raster_scale(width: f32, height: f32, render_cfg: &RenderConfig) -> f32 {
    let sx = render_cfg.png_width.map(|w| w as f32 / width.max(1.0));
    let sy = render_cfg.png_height.map(|h| h as f32 / height.max(1.0));
    match (sx, sy) {
        (Some(sx), Some(sy)) => sx.min(sy),
        (Some(s), None) | (None, Some(s)) => s,
        (None, None) => 1.0,
    }
}

/// Rasterizes the serialized document through usvg/resvg.
#[cfg(feature = "png")]
pub fn write_output_png(svg: &str, output: &Path, render_cfg: &RenderConfig) -> Result<()> {
    let mut opt = usvg::Options::default();
    opt.fontdb_mut().load_system_fonts();
    let tree = usvg::Tree::from_str(svg, &opt)?;
    let size = tree.size();
    let scale = raster_scale(size.width(), size.height(), render_cfg);
    let mut pixmap = resvg::tiny_skia::Pixmap::new(
        (size.width() * scale).ceil().max(1.0) as u32,
        (size.height() * scale).ceil().max(1.0) as u32,
    )
    .ok_or_else(|| anyhow::anyhow!("Failed to allocate pixmap"))?;

    let mut pixmap_mut = pixmap.as_mut();
    resvg::render(
        &tree,
        resvg::tiny_skia::Transform::from_scale(scale, scale),
        &mut pixmap_mut,
    );
    pixmap.save_png(output)?;
    Ok(())
}

/// Rasterizes the primitive stream directly with the immediate sink,
/// skipping the SVG round trip.
#[cfg(feature = "png")]
pub fn render_png_direct(
    diagram: &Diagram,
    config: &Config,
    skin: Option<&SkinPack>,
) -> Result<crate::immediate::PixmapSurface> {
    use crate::immediate::{ImmediateSink, PixmapSurface};

    let scene = render_scene(diagram, config, skin);
    let scale = raster_scale(scene.width, scene.height, &config.render);
    let mut surface = PixmapSurface::new(
        (scene.width * scale).ceil() as u32,
        (scene.height * scale).ceil() as u32,
        scale,
    )?;
    let mut sink = ImmediateSink::new();
    sink.draw_scene(&scene, &mut surface, None);
    if sink.skipped() > 0 {
        tracing::debug!(skipped = sink.skipped(), "primitives skipped while rasterizing");
    }
    Ok(surface)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DiagramKind, Edge, Node, NodeShape};

    fn diagram() -> Diagram {
        let mut diagram = Diagram::new(DiagramKind::Flowchart, 120.0, 160.0);
        diagram.add_node(
            Node::new("A", NodeShape::Rectangle, (60.0, 20.0), (80.0, 40.0)).with_label("Alpha"),
        );
        diagram.add_node(
            Node::new("B", NodeShape::RoundRect, (60.0, 140.0), (80.0, 40.0)).with_label("Beta"),
        );
        diagram.add_edge(Edge::new("A", "B", vec![(60.0, 40.0), (60.0, 120.0)]).with_label("go"));
        diagram
    }

    #[test]
    fn render_svg_basic() {
        let svg = render_svg(&diagram(), &Config::default(), None);
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("Alpha"));
        assert!(svg.contains(">go<"));
        assert!(svg.ends_with("</svg>"));
    }

    #[test]
    fn render_background_overrides_the_theme() {
        let config = crate::config::parse_config(r##"{"render":{"background":"#123456"}}"##).unwrap();
        let svg = render_svg(&diagram(), &config, None);
        assert!(svg.contains("#123456"));

        let mut fallback = Config::default();
        fallback.render.background.clear();
        let scene = render_scene(&diagram(), &fallback, None);
        assert_eq!(scene.background, fallback.theme.background);
    }

    #[test]
    fn render_model_json_drops_bad_edges() {
        let json = r#"{
            "kind": "flowchart",
            "width": 100, "height": 60,
            "nodes": [{"id": "A", "shape": "rectangle", "x": 50, "y": 30, "width": 40, "height": 20, "label": "A"}],
            "edges": [{"from": "A", "to": "missing", "points": [[0, 0], [10, 10]]}]
        }"#;
        let svg = render_model_json(json, &Config::default(), None).unwrap();
        assert!(!svg.contains("class=\"edge"));
    }

    #[cfg(feature = "png")]
    #[test]
    fn direct_raster_matches_natural_size() {
        let surface = render_png_direct(&diagram(), &Config::default(), None).unwrap();
        assert_eq!(surface.pixmap().width(), 136);
        assert_eq!(surface.pixmap().height(), 176);
    }
}
