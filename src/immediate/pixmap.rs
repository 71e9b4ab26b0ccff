use std::path::Path;

use resvg::tiny_skia::{
    self, Color, FillRule, LinearGradient, Pixmap, Point, Shader, SpreadMode, Stroke, StrokeDash,
    Transform,
};

use kurbo::{Affine, BezPath, PathEl};

use super::path_data::parse_path_data;
use super::surface::{Brush, Pen, Surface};
use crate::scene::{TextAnchor, TextRun};
use crate::text_metrics::{text_outline_path, text_width};
use crate::theme::Rgba;

/// Raster surface backed by a tiny-skia pixmap.
pub struct PixmapSurface {
    pixmap: Pixmap,
    base: Transform,
    stack: Vec<Transform>,
}

impl PixmapSurface {
    /// A `width`×`height` pixmap; `scale` maps model units to pixels.
    pub fn new(width: u32, height: u32, scale: f32) -> anyhow::Result<Self> {
        let pixmap = Pixmap::new(width.max(1), height.max(1))
            .ok_or_else(|| anyhow::anyhow!("Failed to allocate pixmap"))?;
        Ok(Self {
            pixmap,
            base: Transform::from_scale(scale, scale),
            stack: Vec::new(),
        })
    }

    fn current(&self) -> Transform {
        self.stack.last().copied().unwrap_or(self.base)
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    pub fn encode_png(&self) -> anyhow::Result<Vec<u8>> {
        Ok(self.pixmap.encode_png()?)
    }

    pub fn save_png(&self, path: &Path) -> anyhow::Result<()> {
        self.pixmap.save_png(path)?;
        Ok(())
    }
}

fn color(rgba: Rgba) -> Color {
    let alpha = (rgba.a.clamp(0.0, 1.0) * 255.0).round() as u8;
    Color::from_rgba8(rgba.r, rgba.g, rgba.b, alpha)
}

fn to_skia(affine: &Affine) -> Transform {
    let [a, b, c, d, e, f] = affine.as_coeffs().map(|v| v as f32);
    Transform::from_row(a, b, c, d, e, f)
}

fn build_path(geometry: &BezPath) -> Option<tiny_skia::Path> {
    let xy = |p: kurbo::Point| (p.x as f32, p.y as f32);
    let mut builder = tiny_skia::PathBuilder::new();
    for el in geometry.elements() {
        match *el {
            PathEl::MoveTo(p) => {
                let (x, y) = xy(p);
                builder.move_to(x, y);
            }
            PathEl::LineTo(p) => {
                let (x, y) = xy(p);
                builder.line_to(x, y);
            }
            PathEl::QuadTo(c, p) => {
                let ((cx, cy), (x, y)) = (xy(c), xy(p));
                builder.quad_to(cx, cy, x, y);
            }
            PathEl::CurveTo(c1, c2, p) => {
                let ((x1, y1), (x2, y2), (x, y)) = (xy(c1), xy(c2), xy(p));
                builder.cubic_to(x1, y1, x2, y2, x, y);
            }
            PathEl::ClosePath => builder.close(),
        }
    }
    builder.finish()
}

fn shader(brush: &Brush, path: &tiny_skia::Path) -> Option<Shader<'static>> {
    match brush {
        Brush::Solid(rgba) => Some(Shader::SolidColor(color(*rgba))),
        Brush::Linear { start, end, stops } => {
            let bounds = path.bounds();
            let at = |p: &(f32, f32)| {
                Point::from_xy(
                    bounds.left() + p.0 * bounds.width(),
                    bounds.top() + p.1 * bounds.height(),
                )
            };
            LinearGradient::new(
                at(start),
                at(end),
                stops
                    .iter()
                    .map(|stop| tiny_skia::GradientStop::new(stop.offset, color(stop.color)))
                    .collect(),
                SpreadMode::Pad,
                Transform::identity(),
            )
        }
    }
}

impl Surface for PixmapSurface {
    fn clear(&mut self, rgba: Rgba) {
        self.pixmap.fill(color(rgba));
    }

    fn push_transform(&mut self, transform: &Affine) {
        let combined = self.current().pre_concat(to_skia(transform));
        self.stack.push(combined);
    }

    fn pop_transform(&mut self) {
        self.stack.pop();
    }

    fn fill_path(&mut self, geometry: &BezPath, brush: &Brush) {
        let Some(path) = build_path(geometry) else {
            return;
        };
        let Some(shader) = shader(brush, &path) else {
            return;
        };
        let paint = tiny_skia::Paint {
            shader,
            anti_alias: true,
            ..Default::default()
        };
        let transform = self.current();
        self.pixmap
            .fill_path(&path, &paint, FillRule::Winding, transform, None);
    }

    fn stroke_path(&mut self, geometry: &BezPath, pen: &Pen) {
        let Some(path) = build_path(geometry) else {
            return;
        };
        let mut paint = tiny_skia::Paint::default();
        paint.set_color(color(pen.color));
        paint.anti_alias = true;
        let mut stroke = Stroke {
            width: pen.width,
            ..Default::default()
        };
        if let Some(dash) = &pen.dash {
            let mut intervals = dash.clone();
            if intervals.len() % 2 == 1 {
                intervals.extend_from_within(..);
            }
            stroke.dash = StrokeDash::new(intervals, pen.dash_offset);
        }
        let transform = self.current();
        self.pixmap
            .stroke_path(&path, &paint, &stroke, transform, None);
    }

    fn draw_text(&mut self, run: &TextRun, brush: &Brush) {
        let width = text_width(&run.content, run.font_size, &run.font_family);
        let x = match run.anchor {
            TextAnchor::Start => run.origin.0,
            TextAnchor::Middle => run.origin.0 - width / 2.0,
            TextAnchor::End => run.origin.0 - width,
        };
        let Some(d) = text_outline_path(&run.content, run.font_size, &run.font_family, (x, run.origin.1))
        else {
            tracing::trace!(text = %run.content, "no glyph outlines available");
            return;
        };
        match parse_path_data(&d) {
            Ok(geometry) => self.fill_path(&geometry, brush),
            Err(err) => tracing::debug!(%err, "skipping text outline"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::immediate::path_data::{polyline, rect_path};

    #[test]
    fn fills_land_in_pixels() {
        let mut surface = PixmapSurface::new(20, 20, 1.0).unwrap();
        surface.clear(Rgba::WHITE);
        surface.push_transform(&Affine::translate((5.0, 5.0)));
        let square = rect_path(0.0, 0.0, 10.0, 10.0, 0.0);
        surface.fill_path(&square, &Brush::Solid(Rgba::BLACK));
        surface.pop_transform();
        let pixmap = surface.pixmap();
        let inside = pixmap.pixel(10, 10).unwrap();
        let outside = pixmap.pixel(2, 2).unwrap();
        assert_eq!((inside.red(), inside.alpha()), (0, 255));
        assert_eq!(outside.red(), 255);
    }

    #[test]
    fn dashed_strokes_do_not_panic() {
        let mut surface = PixmapSurface::new(40, 10, 2.0).unwrap();
        let line = polyline(&[(0.0, 2.0), (20.0, 2.0)], false);
        surface.stroke_path(
            &line,
            &Pen {
                color: Rgba::BLACK,
                width: 1.0,
                dash: Some(vec![3.0]),
                dash_offset: -4.0,
            },
        );
        assert!(surface.encode_png().unwrap().starts_with(&[0x89, b'P', b'N', b'G']));
    }
}
