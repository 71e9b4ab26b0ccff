use std::time::Duration;

/// Host hook for the periodic animation callback. The host calls
/// [`super::DiagramView::tick`] every `interval` between `start` and `stop`.
pub trait FrameScheduler {
    fn start(&mut self, interval: Duration);
    fn stop(&mut self);
}

/// Scheduler for hosts that drive ticks themselves.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    pub interval: Option<Duration>,
    pub starts: usize,
    pub stops: usize,
}

impl ManualScheduler {
    pub fn is_running(&self) -> bool {
        self.interval.is_some()
    }
}

impl FrameScheduler for ManualScheduler {
    fn start(&mut self, interval: Duration) {
        self.interval = Some(interval);
        self.starts += 1;
    }

    fn stop(&mut self) {
        self.interval = None;
        self.stops += 1;
    }
}

/// Marching-ants phase for highlighted strokes.
#[derive(Debug, Clone)]
pub struct DashAnimation {
    phase: f32,
    step: f32,
    wrap: f32,
    interval: Duration,
    running: bool,
}

impl DashAnimation {
    pub fn new(step: f32, wrap: f32, interval: Duration) -> Self {
        Self {
            phase: 0.0,
            step,
            wrap: wrap.max(f32::EPSILON),
            interval,
            running: false,
        }
    }

    pub fn phase(&self) -> f32 {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Starts or stops the timer so it runs exactly while `active`.
    pub fn sync<T: FrameScheduler>(&mut self, active: bool, scheduler: &mut T) {
        match (active, self.running) {
            (true, false) => {
                scheduler.start(self.interval);
                self.running = true;
                tracing::trace!(interval_ms = self.interval.as_millis() as u64, "dash animation started");
            }
            (false, true) => self.stop(scheduler),
            _ => {}
        }
    }

    pub fn stop<T: FrameScheduler>(&mut self, scheduler: &mut T) {
        if self.running {
            scheduler.stop();
            self.running = false;
            self.phase = 0.0;
            tracing::trace!("dash animation stopped");
        }
    }

    /// Advances one interval; returns whether a redraw is due.
    pub fn advance(&mut self) -> bool {
        if !self.running {
            return false;
        }
        self.phase = (self.phase + self.step) % self.wrap;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_wraps() {
        let mut scheduler = ManualScheduler::default();
        let mut animation = DashAnimation::new(2.0, 24.0, Duration::from_millis(50));
        assert!(!animation.advance());
        animation.sync(true, &mut scheduler);
        for _ in 0..13 {
            animation.advance();
        }
        assert_eq!(animation.phase(), 2.0);
        assert_eq!(scheduler.interval, Some(Duration::from_millis(50)));
    }

    #[test]
    fn sync_starts_and_stops_once() {
        let mut scheduler = ManualScheduler::default();
        let mut animation = DashAnimation::new(2.0, 24.0, Duration::from_millis(50));
        animation.sync(true, &mut scheduler);
        animation.sync(true, &mut scheduler);
        animation.sync(false, &mut scheduler);
        animation.sync(false, &mut scheduler);
        assert_eq!((scheduler.starts, scheduler.stops), (1, 1));
        assert!(!scheduler.is_running());
        assert_eq!(animation.phase(), 0.0);
    }
}
