use std::rc::Rc;

use kurbo::{Affine, BezPath, Point};

use crate::scene::TextRun;
use crate::theme::Rgba;

#[derive(Debug, Clone, PartialEq)]
pub struct GradientStop {
    pub offset: f32,
    pub color: Rgba,
}

/// Fill source.
#[derive(Debug, Clone, PartialEq)]
pub enum Brush {
    Solid(Rgba),
    /// Linear gradient in the filled shape's bounding-box units.
    Linear {
        start: (f32, f32),
        end: (f32, f32),
        stops: Vec<GradientStop>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pen {
    pub color: Rgba,
    pub width: f32,
    pub dash: Option<Vec<f32>>,
    pub dash_offset: f32,
}

/// A live drawing target.
pub trait Surface {
    fn clear(&mut self, color: Rgba);
    fn push_transform(&mut self, transform: &Affine);
    fn pop_transform(&mut self);
    fn fill_path(&mut self, path: &BezPath, brush: &Brush);
    fn stroke_path(&mut self, path: &BezPath, pen: &Pen);
    fn draw_text(&mut self, run: &TextRun, brush: &Brush);
}

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceOp {
    Clear(Rgba),
    PushTransform(Affine),
    PopTransform,
    Fill(Rc<BezPath>, Brush),
    Stroke(Rc<BezPath>, Pen),
    Text(String, (f32, f32), Brush),
}

/// Surface that records every call, with the transform stack flattened so
/// tests can inspect where things land.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    pub ops: Vec<SurfaceOp>,
    stack: Vec<Affine>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// The transform currently in effect.
    pub fn current_transform(&self) -> Affine {
        self.stack.last().copied().unwrap_or(Affine::IDENTITY)
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn strokes(&self) -> impl Iterator<Item = (&BezPath, &Pen)> {
        self.ops.iter().filter_map(|op| match op {
            SurfaceOp::Stroke(path, pen) => Some((path.as_ref(), pen)),
            _ => None,
        })
    }

    pub fn fills(&self) -> impl Iterator<Item = (&BezPath, &Brush)> {
        self.ops.iter().filter_map(|op| match op {
            SurfaceOp::Fill(path, brush) => Some((path.as_ref(), brush)),
            _ => None,
        })
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.ops.iter().filter_map(|op| match op {
            SurfaceOp::Text(content, _, _) => Some(content.as_str()),
            _ => None,
        })
    }
}

impl Surface for RecordingSurface {
    fn clear(&mut self, color: Rgba) {
        self.ops.push(SurfaceOp::Clear(color));
    }

    fn push_transform(&mut self, transform: &Affine) {
        let combined = self.current_transform() * *transform;
        self.stack.push(combined);
        self.ops.push(SurfaceOp::PushTransform(*transform));
    }

    fn pop_transform(&mut self) {
        self.stack.pop();
        self.ops.push(SurfaceOp::PopTransform);
    }

    fn fill_path(&mut self, path: &BezPath, brush: &Brush) {
        self.ops.push(SurfaceOp::Fill(Rc::new(path.clone()), brush.clone()));
    }

    fn stroke_path(&mut self, path: &BezPath, pen: &Pen) {
        self.ops.push(SurfaceOp::Stroke(Rc::new(path.clone()), pen.clone()));
    }

    fn draw_text(&mut self, run: &TextRun, brush: &Brush) {
        let origin = self.current_transform()
            * Point::new(f64::from(run.origin.0), f64::from(run.origin.1));
        self.ops.push(SurfaceOp::Text(
            run.content.clone(),
            (origin.x as f32, origin.y as f32),
            brush.clone(),
        ));
    }
}
