//! Immediate sink: draws the primitive stream (or a retained document)
//! straight onto a [`Surface`], caching everything derived from strings.

mod cache;
mod path_data;
#[cfg(feature = "png")]
mod pixmap;
mod surface;
mod transform;

pub use cache::{CacheMap, PenKey, SinkCaches};
pub use kurbo::{Affine, BezPath};
pub use path_data::{PathDataError, parse_path_data};
#[cfg(feature = "png")]
pub use pixmap::PixmapSurface;
pub use surface::{Brush, GradientStop, Pen, RecordingSurface, Surface, SurfaceOp};
pub use transform::{TransformError, parse_transform};

use std::collections::HashMap;
use std::rc::Rc;

use crate::document::Document;
use crate::interaction::HighlightSet;
use crate::model::{Diagram, LinearGradient};
use crate::scene::{Group, Paint, Primitive, PrimitiveSink, Role, Scene, Shape, paint_reference};
use crate::theme::{Rgba, parse_color};

/// How highlighted primitives are drawn this frame.
#[derive(Debug, Clone, Copy)]
pub struct HighlightStyle<'a> {
    pub set: &'a HighlightSet,
    pub dash_phase: f32,
    pub dash_pattern: [f32; 2],
    pub stroke_scale: f32,
}

#[derive(Debug, Default)]
pub struct ImmediateSink {
    caches: SinkCaches,
    bound: Option<Rc<Diagram>>,
    skipped: usize,
}

impl ImmediateSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds the model the next frames belong to. All caches are dropped
    /// when the model identity changes; returns whether that happened.
    pub fn bind_model(&mut self, model: &Rc<Diagram>) -> bool {
        if self.bound.as_ref().is_some_and(|bound| Rc::ptr_eq(bound, model)) {
            return false;
        }
        self.caches.clear_all();
        self.bound = Some(Rc::clone(model));
        tracing::debug!("model identity changed, sink caches cleared");
        true
    }

    pub fn unbind(&mut self) {
        self.caches.clear_all();
        self.bound = None;
    }

    pub fn caches(&self) -> &SinkCaches {
        &self.caches
    }

    /// Primitives skipped during the last frame because their geometry,
    /// transform or paint could not be interpreted.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn draw_scene<S: Surface>(
        &mut self,
        scene: &Scene,
        surface: &mut S,
        highlight: Option<&HighlightStyle<'_>>,
    ) {
        let gradients = scene
            .defs
            .gradients
            .iter()
            .map(|(id, g)| (id.as_str(), g))
            .collect();
        let mut frame = self.frame(surface, gradients, highlight, &scene.background);
        scene.replay(&mut frame);
        self.skipped = frame.finish();
    }

    pub fn draw_document<S: Surface>(
        &mut self,
        document: &Document,
        surface: &mut S,
        highlight: Option<&HighlightStyle<'_>>,
    ) {
        let gradients = document
            .gradients
            .iter()
            .map(|(id, g)| (id.as_str(), g))
            .collect();
        let mut frame = self.frame(surface, gradients, highlight, &document.background);
        document.replay(&mut frame);
        self.skipped = frame.finish();
    }

    fn frame<'a, S: Surface>(
        &'a mut self,
        surface: &'a mut S,
        gradients: HashMap<&'a str, &'a LinearGradient>,
        highlight: Option<&'a HighlightStyle<'a>>,
        background: &str,
    ) -> Frame<'a, S> {
        surface.clear(parse_color(background).unwrap_or(Rgba::new(0, 0, 0, 0.0)));
        Frame {
            caches: &mut self.caches,
            surface,
            gradients,
            highlight,
            pushed: Vec::new(),
            skipped: 0,
        }
    }
}

struct Frame<'a, S: Surface> {
    caches: &'a mut SinkCaches,
    surface: &'a mut S,
    gradients: HashMap<&'a str, &'a LinearGradient>,
    highlight: Option<&'a HighlightStyle<'a>>,
    pushed: Vec<bool>,
    skipped: usize,
}

impl<S: Surface> Frame<'_, S> {
    fn finish(mut self) -> usize {
        while !self.pushed.is_empty() {
            self.pop_group();
        }
        self.skipped
    }

    fn transform(&mut self, source: &str) -> Option<Affine> {
        self.caches.transforms.get_or_compute(source.to_string(), || {
            parse_transform(source)
                .map_err(|err| tracing::debug!(transform = source, %err, "skipping transform"))
                .ok()
        })
    }

    fn brush(&mut self, paint: &str) -> Option<Brush> {
        if paint.trim().eq_ignore_ascii_case("none") {
            return None;
        }
        let gradients = &self.gradients;
        self.caches.brushes.get_or_compute(paint.to_string(), || {
            let brush = match paint_reference(paint) {
                Some(reference) => reference
                    .strip_prefix('#')
                    .and_then(|id| gradients.get(id))
                    .and_then(|gradient| gradient_brush(gradient)),
                None => parse_color(paint).map(Brush::Solid),
            };
            if brush.is_none() {
                tracing::debug!(paint, "paint not drawable, leaving unpainted");
            }
            brush
        })
    }

    fn pen(&mut self, paint: &Paint) -> Option<Rc<Pen>> {
        let stroke = paint.stroke.as_deref().filter(|_| paint.has_stroke())?;
        let color = match self.brush(stroke)? {
            Brush::Solid(color) => color,
            Brush::Linear { stops, .. } => stops.first()?.color,
        };
        let dash = paint.dash.as_deref().unwrap_or_default();
        let key = (format!("{stroke}|{dash}"), paint.stroke_width.to_bits());
        let width = paint.stroke_width;
        self.caches.pens.get_or_compute(key, || {
            Some(Rc::new(Pen {
                color,
                width,
                dash: parse_dash(dash),
                dash_offset: 0.0,
            }))
        })
    }

    fn geometry(&mut self, primitive: &Primitive) -> Option<Rc<BezPath>> {
        let geometry = match &primitive.shape {
            Shape::Rect { rect, radius } => {
                path_data::rect_path(rect.x, rect.y, rect.width, rect.height, *radius)
            }
            Shape::Ellipse { center, rx, ry } => path_data::ellipse_path(*center, *rx, *ry),
            Shape::Line { from, to } => path_data::polyline(&[*from, *to], false),
            Shape::Polygon { points } => path_data::polyline(points, true),
            Shape::Path { d } => {
                let parse = || {
                    parse_path_data(d)
                        .map(Rc::new)
                        .map_err(|err| tracing::debug!(%err, "skipping malformed path data"))
                        .ok()
                };
                return match &primitive.cache_key {
                    Some(key) => self.caches.skins.get_or_compute(key.clone(), parse),
                    None => self.caches.paths.get_or_compute(d.clone(), parse),
                };
            }
            Shape::Text(_) => return None,
        };
        Some(Rc::new(geometry))
    }

    fn highlighted(&self, primitive: &Primitive) -> Option<&HighlightStyle<'_>> {
        let highlight = self.highlight?;
        let owner = primitive.owner.as_ref()?;
        highlight.set.contains_owner(owner).then_some(highlight)
    }
}

impl<S: Surface> PrimitiveSink for Frame<'_, S> {
    fn push_group(&mut self, group: &Group) {
        let transform = group.transform.as_deref().and_then(|t| self.transform(t));
        match transform {
            Some(affine) if affine != Affine::IDENTITY => {
                self.surface.push_transform(&affine);
                self.pushed.push(true);
            }
            _ => self.pushed.push(false),
        }
    }

    fn pop_group(&mut self) {
        if self.pushed.pop() == Some(true) {
            self.surface.pop_transform();
        }
    }

    fn draw(&mut self, primitive: &Primitive) {
        let transform = match primitive.transform.as_deref() {
            Some(source) => match self.transform(source) {
                Some(affine) => Some(affine),
                None => {
                    self.skipped += 1;
                    return;
                }
            },
            None => None,
        };

        if let Shape::Text(run) = &primitive.shape {
            if let Some(brush) = primitive.paint.fill.as_deref().and_then(|f| self.brush(f)) {
                if let Some(affine) = &transform {
                    self.surface.push_transform(affine);
                }
                self.surface.draw_text(run, &brush);
                if transform.is_some() {
                    self.surface.pop_transform();
                }
            }
            return;
        }

        let Some(geometry) = self.geometry(primitive) else {
            self.skipped += 1;
            return;
        };
        let brush = match primitive.paint.fill.as_deref() {
            Some(fill) if primitive.paint.has_fill() => self.brush(fill),
            _ => None,
        };
        let mut pen = self.pen(&primitive.paint);
        if let Some(highlight) = self.highlighted(primitive).copied()
            && let Some(base) = &pen
        {
            let mut lit = Pen::clone(base);
            lit.width *= highlight.stroke_scale;
            if primitive.role == Role::EdgeLine {
                lit.dash = Some(highlight.dash_pattern.to_vec());
                lit.dash_offset = -highlight.dash_phase;
            }
            pen = Some(Rc::new(lit));
        }

        if let Some(affine) = &transform {
            self.surface.push_transform(affine);
        }
        if let Some(brush) = &brush {
            self.surface.fill_path(&geometry, brush);
        }
        if let Some(pen) = &pen {
            self.surface.stroke_path(&geometry, pen);
        }
        if transform.is_some() {
            self.surface.pop_transform();
        }
    }
}

fn gradient_brush(gradient: &LinearGradient) -> Option<Brush> {
    let stops: Vec<GradientStop> = gradient
        .stops
        .iter()
        .filter_map(|stop| {
            parse_color(&stop.color).map(|color| GradientStop {
                offset: stop.offset.clamp(0.0, 1.0),
                color,
            })
        })
        .collect();
    match stops.len() {
        0 => None,
        1 => Some(Brush::Solid(stops[0].color)),
        _ => Some(Brush::Linear {
            start: (gradient.x1, gradient.y1),
            end: (gradient.x2, gradient.y2),
            stops,
        }),
    }
}

fn parse_dash(dash: &str) -> Option<Vec<f32>> {
    let values: Vec<f32> = dash
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| s.trim_end_matches("px").parse::<f32>())
        .collect::<Result<_, _>>()
        .ok()?;
    (!values.is_empty() && values.iter().all(|v| *v >= 0.0) && values.iter().any(|v| *v > 0.0))
        .then_some(values)
}
