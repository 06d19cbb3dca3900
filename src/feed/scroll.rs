use super::state::FeedState;
use std::time::Duration;
use tokio::time::Instant;

/// Rows from the bottom at which the next page is requested.
pub const DEFAULT_THRESHOLD: usize = 3;

/// Minimum spacing between two near-bottom intents.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(200);

/// Where the viewport sits within the rendered content, in rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScrollPosition {
    /// Index of the first visible row.
    pub offset: usize,
    pub viewport: usize,
    pub content: usize,
}

impl ScrollPosition {
    pub fn new(offset: usize, viewport: usize, content: usize) -> Self {
        Self {
            offset,
            viewport,
            content,
        }
    }

    /// Rows of content below the bottom edge of the viewport.
    pub fn distance_to_bottom(&self) -> usize {
        self.content
            .saturating_sub(self.offset.saturating_add(self.viewport))
    }
}

/// Turns a stream of scroll positions into occasional "load more" intents.
///
/// Emits on the leading edge, then stays quiet for `interval` after each
/// emission. Holds no feed state of its own; the caller still routes the
/// intent through [`super::FeedController::request_next_page`].
#[derive(Debug, Clone)]
pub struct ScrollTrigger {
    threshold: usize,
    interval: Duration,
    last_emitted: Option<Instant>,
}

impl Default for ScrollTrigger {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD, DEFAULT_INTERVAL)
    }
}

impl ScrollTrigger {
    pub fn new(threshold: usize, interval: Duration) -> Self {
        Self {
            threshold,
            interval,
            last_emitted: None,
        }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Observe `position` against the current snapshot, using the runtime clock.
    pub fn observe(&mut self, position: ScrollPosition, state: &FeedState) -> bool {
        self.observe_at(position, state.loading, state.has_more, Instant::now())
    }

    /// Returns `true` when a near-bottom intent should be issued.
    pub fn observe_at(
        &mut self,
        position: ScrollPosition,
        loading: bool,
        has_more: bool,
        now: Instant,
    ) -> bool {
        if loading || !has_more {
            return false;
        }
        if position.distance_to_bottom() > self.threshold {
            return false;
        }
        if let Some(last) = self.last_emitted {
            if now.saturating_duration_since(last) < self.interval {
                return false;
            }
        }
        self.last_emitted = Some(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn near_bottom() -> ScrollPosition {
        ScrollPosition::new(18, 2, 20)
    }

    #[test]
    fn test_distance_to_bottom() {
        assert_eq!(ScrollPosition::new(0, 10, 30).distance_to_bottom(), 20);
        assert_eq!(ScrollPosition::new(25, 10, 30).distance_to_bottom(), 0);
        assert_eq!(ScrollPosition::new(0, 10, 0).distance_to_bottom(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_emits_once_per_window() {
        let mut trigger = ScrollTrigger::default();
        let start = Instant::now();

        assert!(trigger.observe_at(near_bottom(), false, true, start));
        assert!(!trigger.observe_at(near_bottom(), false, true, start));
        assert!(!trigger.observe_at(
            near_bottom(),
            false,
            true,
            start + Duration::from_millis(199)
        ));
        assert!(trigger.observe_at(
            near_bottom(),
            false,
            true,
            start + Duration::from_millis(200)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_suppressed_while_loading_or_exhausted() {
        let mut trigger = ScrollTrigger::default();
        let now = Instant::now();

        assert!(!trigger.observe_at(near_bottom(), true, true, now));
        assert!(!trigger.observe_at(near_bottom(), false, false, now));
        // Suppressed observations do not consume the window
        assert!(trigger.observe_at(near_bottom(), false, true, now));
    }

    #[tokio::test(start_paused = true)]
    async fn test_far_from_bottom_is_ignored() {
        let mut trigger = ScrollTrigger::default();
        let far = ScrollPosition::new(0, 5, 40);
        assert!(!trigger.observe_at(far, false, true, Instant::now()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_observe_uses_runtime_clock() {
        let mut trigger = ScrollTrigger::default();
        let mut state = FeedState::new("NAM".into(), 10);
        state.loading = false;

        assert!(trigger.observe(near_bottom(), &state));
        assert!(!trigger.observe(near_bottom(), &state));

        tokio::time::advance(DEFAULT_INTERVAL).await;
        assert!(trigger.observe(near_bottom(), &state));
    }

    proptest! {
        #[test]
        fn prop_at_most_one_emission_per_window(
            gaps in prop::collection::vec(0u64..150, 1..60)
        ) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .start_paused(true)
                .build()
                .unwrap();
            rt.block_on(async {
                let mut trigger = ScrollTrigger::default();
                let mut now = Instant::now();
                let mut emissions: Vec<Instant> = Vec::new();
                for gap in gaps {
                    now += Duration::from_millis(gap);
                    if trigger.observe_at(near_bottom(), false, true, now) {
                        emissions.push(now);
                    }
                }
                for pair in emissions.windows(2) {
                    prop_assert!(pair[1] - pair[0] >= DEFAULT_INTERVAL);
                }
                Ok(())
            })?;
        }
    }
}
