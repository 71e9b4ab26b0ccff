//! Interaction layer: hover hit-testing, flow-trace highlighting and the
//! dash animation that runs while something is highlighted.

mod animation;
mod hit;
mod trace;
mod view;

pub use animation::{DashAnimation, FrameScheduler, ManualScheduler};
pub use hit::{HitTarget, hit_test};
pub use trace::{HighlightSet, edge_highlight, trace_flow};
pub use view::{Cursor, DiagramView, HoverState, ViewEvent};
