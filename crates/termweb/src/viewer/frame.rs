//! Frame-rendering decision (§4.10): FPS floor, generation dedup, skipped-
//! frame accounting, and the 300 ms loading-indicator grace window.

use std::time::{Duration, Instant};

/// Whether enough time has passed since `last_render` for the FPS cap to
/// allow another frame.
pub fn fps_gate_allows(last_render: Option<Instant>, now: Instant, fps_cap: u32) -> bool {
    let Some(last) = last_render else { return true };
    let min_interval = Duration::from_millis(1000 / fps_cap.max(1) as u64);
    now.duration_since(last) >= min_interval
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadingState {
    loading: bool,
    load_started_tick: Option<u64>,
}

impl Default for LoadingState {
    fn default() -> Self {
        Self { loading: false, load_started_tick: None }
    }
}

const LOAD_GRACE_MS: u64 = 300;

impl LoadingState {
    pub fn start(&mut self, now_ms: u64) {
        self.loading = true;
        self.load_started_tick = Some(now_ms);
    }

    /// Clears the loading flag only once a new frame has arrived *and* the
    /// 300 ms grace period has elapsed, so a fast response never flashes
    /// past the "stop" affordance straight back to "reload".
    pub fn clear_on_new_frame(&mut self, now_ms: u64) {
        if !self.loading {
            return;
        }
        let Some(started) = self.load_started_tick else {
            self.loading = false;
            return;
        };
        if now_ms.saturating_sub(started) >= LOAD_GRACE_MS {
            self.loading = false;
            self.load_started_tick = None;
        }
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fps_gate_allows_first_frame_unconditionally() {
        assert!(fps_gate_allows(None, Instant::now(), 30));
    }

    #[test]
    fn fps_gate_blocks_frames_faster_than_the_cap() {
        let t0 = Instant::now();
        assert!(!fps_gate_allows(Some(t0), t0 + Duration::from_millis(10), 30));
    }

    #[test]
    fn fps_gate_allows_after_min_interval_elapses() {
        let t0 = Instant::now();
        assert!(fps_gate_allows(Some(t0), t0 + Duration::from_millis(34), 30));
    }

    #[test]
    fn loading_indicator_stays_on_under_grace_period() {
        let mut state = LoadingState::default();
        state.start(0);
        state.clear_on_new_frame(100);
        assert!(state.is_loading());
    }

    #[test]
    fn loading_indicator_clears_once_grace_period_elapses() {
        let mut state = LoadingState::default();
        state.start(0);
        state.clear_on_new_frame(300);
        assert!(!state.is_loading());
    }
}
