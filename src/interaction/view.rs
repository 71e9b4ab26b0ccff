use std::rc::Rc;
use std::time::Duration;

use super::animation::{DashAnimation, FrameScheduler};
use super::hit::{HitTarget, hit_test};
use super::trace::{HighlightSet, edge_highlight, trace_flow};
use kurbo::Affine;

use crate::config::Config;
use crate::immediate::{HighlightStyle, ImmediateSink, Surface};
use crate::model::{Diagram, Point};
use crate::scene::{Scene, SceneBuilder};
use crate::skin::{ResolutionCache, SkinPack, SkinRegistry};
use crate::theme::Theme;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cursor {
    #[default]
    Default,
    Hand,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HoverState {
    #[default]
    Idle,
    Hovering(HitTarget),
}

/// Notifications for the host, returned from the pointer hooks.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    HighlightChanged,
    CursorChanged(Cursor),
    /// Opaque link payload of the pressed node.
    LinkActivated(String),
}

/// Live view of one diagram model: owns the immediate sink, the hover
/// state machine and the highlight animation. The primitive stream is
/// built once per model, theme and skin; animation frames only redraw it.
pub struct DiagramView<T: FrameScheduler> {
    config: Config,
    theme: Theme,
    skin: Option<Rc<SkinPack>>,
    model: Option<Rc<Diagram>>,
    scene: Option<Rc<Scene>>,
    resolutions: ResolutionCache,
    sink: ImmediateSink,
    state: HoverState,
    highlight: HighlightSet,
    cursor: Cursor,
    animation: DashAnimation,
    scheduler: T,
    scale: f32,
}

impl<T: FrameScheduler> DiagramView<T> {
    pub fn new(config: Config, scheduler: T) -> Self {
        let interaction = &config.interaction;
        let animation = DashAnimation::new(
            interaction.dash_step,
            interaction.dash_wrap,
            Duration::from_millis(interaction.animation_interval_ms),
        );
        Self {
            theme: config.theme.clone(),
            config,
            skin: None,
            model: None,
            scene: None,
            resolutions: ResolutionCache::new(),
            sink: ImmediateSink::new(),
            state: HoverState::Idle,
            highlight: HighlightSet::default(),
            cursor: Cursor::Default,
            animation,
            scheduler,
            scale: 1.0,
        }
    }

    pub fn model(&self) -> Option<&Rc<Diagram>> {
        self.model.as_ref()
    }

    pub fn state(&self) -> &HoverState {
        &self.state
    }

    pub fn highlight(&self) -> &HighlightSet {
        &self.highlight
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn scheduler(&self) -> &T {
        &self.scheduler
    }

    pub fn animation(&self) -> &DashAnimation {
        &self.animation
    }

    pub fn sink(&self) -> &ImmediateSink {
        &self.sink
    }

    /// The stream the last draw replayed, if it is still current.
    pub fn scene(&self) -> Option<&Rc<Scene>> {
        self.scene.as_ref()
    }

    /// Binds a new model. Hover state and highlight reset; sink caches are
    /// dropped if the model identity changed.
    pub fn set_model(&mut self, model: Rc<Diagram>) -> Vec<ViewEvent> {
        let events = self.reset_hover();
        if self.sink.bind_model(&model) {
            self.scene = None;
        }
        self.model = Some(model);
        events
    }

    /// Switches palettes; the canvas background follows the new theme.
    pub fn set_theme(&mut self, theme: Theme) {
        self.config.render.background = theme.background.clone();
        self.theme = theme;
        self.scene = None;
    }

    pub fn set_skin(&mut self, skin: Option<Rc<SkinPack>>) {
        self.skin = skin;
        self.scene = None;
    }

    /// Selects a registered skin pack; unknown names draw built-in shapes.
    pub fn set_skin_named(&mut self, registry: &SkinRegistry, name: &str) {
        self.set_skin(registry.get(name));
    }

    /// Natural size is the model extent plus padding; the view only ever
    /// scales down to fit `available_width`.
    pub fn measure(&mut self, available_width: Option<f32>) -> (f32, f32) {
        let Some(model) = &self.model else {
            return (0.0, 0.0);
        };
        let render = &self.config.render;
        let padding = render.padding.max(0.0);
        let natural = (
            (model.width + padding * 2.0).max(render.min_width),
            (model.height + padding * 2.0).max(render.min_height),
        );
        self.scale = match available_width {
            Some(width) if width > 0.0 => (width / natural.0).min(1.0),
            _ => 1.0,
        };
        (natural.0 * self.scale, natural.1 * self.scale)
    }

    fn to_model_space(&self, point: Point) -> Point {
        let padding = self.config.render.padding.max(0.0);
        let scale = if self.scale > 0.0 { self.scale } else { 1.0 };
        (point.0 / scale - padding, point.1 / scale - padding)
    }

    pub fn pointer_moved(&mut self, point: Point) -> Vec<ViewEvent> {
        let Some(model) = self.model.clone() else {
            return Vec::new();
        };
        let target = hit_test(
            &model,
            self.to_model_space(point),
            self.config.interaction.edge_hit_threshold,
        );
        let Some(target) = target else {
            return self.reset_hover();
        };
        if self.state == HoverState::Hovering(target.clone()) {
            return Vec::new();
        }
        let highlight = match &target {
            HitTarget::Node(id) => trace_flow(&model, id, self.config.interaction.trace_hops),
            HitTarget::Edge(key) => edge_highlight(key),
        };
        let linked = model
            .node(target.node_id())
            .is_some_and(|node| node.link.is_some());
        tracing::trace!(hover = ?target, "hover target changed");
        self.state = HoverState::Hovering(target);

        self.highlight = highlight;
        let mut events = vec![ViewEvent::HighlightChanged];
        self.animation
            .sync(!self.highlight.is_empty(), &mut self.scheduler);
        self.set_cursor(if linked { Cursor::Hand } else { Cursor::Default }, &mut events);
        events
    }

    pub fn pointer_exited(&mut self) -> Vec<ViewEvent> {
        self.reset_hover()
    }

    /// Emits the hovered node's link payload; hover state is unchanged.
    pub fn pointer_pressed(&mut self) -> Vec<ViewEvent> {
        let HoverState::Hovering(target) = &self.state else {
            return Vec::new();
        };
        self.model
            .as_ref()
            .and_then(|model| model.node(target.node_id()))
            .and_then(|node| node.link.as_ref())
            .map(|link| vec![ViewEvent::LinkActivated(link.url.clone())])
            .unwrap_or_default()
    }

    /// Timer callback; returns whether the host should redraw.
    pub fn tick(&mut self) -> bool {
        self.animation.advance()
    }

    /// The surface went away: stop the timer and release cached resources.
    pub fn detach(&mut self) {
        self.animation.stop(&mut self.scheduler);
        self.sink.unbind();
        self.scene = None;
    }

    pub fn draw<S: Surface>(&mut self, surface: &mut S) {
        let Some(model) = self.model.clone() else {
            return;
        };
        if self.sink.bind_model(&model) {
            self.scene = None;
        }
        if self.scene.is_none() {
            let built = SceneBuilder::new(&self.theme, self.skin.as_deref(), &self.config)
                .build(&model, &mut self.resolutions);
            tracing::debug!(commands = built.commands.len(), "scene rebuilt");
            self.scene = Some(Rc::new(built));
        }
        let Some(scene) = self.scene.clone() else {
            return;
        };
        let style = HighlightStyle {
            set: &self.highlight,
            dash_phase: self.animation.phase(),
            dash_pattern: self.config.interaction.dash_pattern,
            stroke_scale: self.config.interaction.highlight_stroke_scale,
        };
        let highlight = (!self.highlight.is_empty()).then_some(&style);
        let scaled = (self.scale - 1.0).abs() > f32::EPSILON;
        if scaled {
            surface.push_transform(&Affine::scale(f64::from(self.scale)));
        }
        self.sink.draw_scene(&scene, surface, highlight);
        if scaled {
            surface.pop_transform();
        }
    }

    fn reset_hover(&mut self) -> Vec<ViewEvent> {
        let mut events = Vec::new();
        self.state = HoverState::Idle;
        if !self.highlight.is_empty() {
            self.highlight.clear();
            events.push(ViewEvent::HighlightChanged);
        }
        self.animation.sync(false, &mut self.scheduler);
        self.set_cursor(Cursor::Default, &mut events);
        events
    }

    fn set_cursor(&mut self, cursor: Cursor, events: &mut Vec<ViewEvent>) {
        if self.cursor != cursor {
            self.cursor = cursor;
            events.push(ViewEvent::CursorChanged(cursor));
        }
    }
}
