use folio_core::layout::Viewport;
use tracing::debug;

/// Holds back viewport changes until the window has been still for
/// `delay_ms`, so a drag-resize repaginates once.
#[derive(Debug)]
pub struct ResizeDebouncer {
    delay_ms: u64,
    pending: Option<(Viewport, u64)>,
}

impl ResizeDebouncer {
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            pending: None,
        }
    }

    /// Records a resize seen at `now_ms`; a later one replaces it and
    /// restarts the wait.
    pub fn note(&mut self, viewport: Viewport, now_ms: u64) {
        self.pending = Some((viewport, now_ms));
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Releases the latest viewport once the quiet period has passed.
    pub fn poll(&mut self, now_ms: u64) -> Option<Viewport> {
        let (viewport, seen_at) = self.pending?;
        if now_ms.saturating_sub(seen_at) < self.delay_ms {
            return None;
        }
        self.pending = None;
        debug!(width = viewport.width, height = viewport.height, "resize settled");
        Some(viewport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::{Clock, ManualClock};

    #[test]
    fn releases_only_the_last_viewport_after_quiet_period() {
        let clock = ManualClock::new(1_000);
        let mut debouncer = ResizeDebouncer::new(300);

        debouncer.note(Viewport::new(600.0, 400.0), clock.now_ms());
        clock.advance(200);
        assert_eq!(debouncer.poll(clock.now_ms()), None);

        debouncer.note(Viewport::new(800.0, 500.0), clock.now_ms());
        clock.advance(299);
        assert_eq!(debouncer.poll(clock.now_ms()), None);
        assert!(debouncer.is_pending());

        clock.advance(1);
        assert_eq!(
            debouncer.poll(clock.now_ms()),
            Some(Viewport::new(800.0, 500.0))
        );
        assert!(!debouncer.is_pending());
        assert_eq!(debouncer.poll(clock.now_ms() + 10_000), None);
    }

    #[test]
    fn zero_delay_releases_immediately() {
        let mut debouncer = ResizeDebouncer::new(0);
        debouncer.note(Viewport::new(100.0, 100.0), 5);
        assert_eq!(debouncer.poll(5), Some(Viewport::new(100.0, 100.0)));
    }
}
