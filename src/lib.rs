#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod document;
pub mod geometry;
pub mod immediate;
pub mod interaction;
pub mod model;
pub mod render;
pub mod scene;
pub mod skin;
pub mod style;
pub mod text_metrics;
pub mod theme;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{Config, load_config};
pub use document::Document;
pub use interaction::DiagramView;
pub use model::Diagram;
pub use render::{render_model_json, render_svg};
pub use scene::{Scene, build_scene};
pub use theme::Theme;
