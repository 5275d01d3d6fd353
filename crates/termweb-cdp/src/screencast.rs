//! C5 — screencast frame ring buffer, generation counter, and the
//! FPS/quality-tier pacing tables.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub struct ScreencastFrame {
    pub data: Vec<u8>,
    pub device_width: u32,
    pub device_height: u32,
    pub session_id: i64,
    pub generation: u64,
}

/// Single-producer (CDP reader), single-consumer (viewer) depth-1 ring.
/// Acking happens in the reader thread as soon as a frame is parsed (see
/// `client::reader`), so the ring itself only needs to track the newest
/// frame and a skipped-frame counter for metrics.
#[derive(Default)]
pub struct ScreencastRing {
    slot: Mutex<Option<std::sync::Arc<ScreencastFrame>>>,
    generation_counter: AtomicU64,
    last_rendered: AtomicU64,
    skipped: AtomicU64,
    consecutive_parse_failures: AtomicU64,
}

impl ScreencastRing {
    pub fn next_generation(&self) -> u64 {
        self.generation_counter.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn publish(&self, frame: ScreencastFrame) {
        let mut slot = self
            .slot
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *slot = Some(std::sync::Arc::new(frame));
        self.consecutive_parse_failures.store(0, Ordering::SeqCst);
    }

    /// Returns the newest frame if it is strictly newer than what the
    /// viewer has already rendered. Counts the gap as skipped frames when
    /// more than one generation was produced since the last render.
    pub fn peek_latest(&self) -> Option<std::sync::Arc<ScreencastFrame>> {
        let slot = self
            .slot
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let frame = slot.clone()?;
        let last = self.last_rendered.load(Ordering::SeqCst);
        if frame.generation <= last {
            return None;
        }
        if frame.generation > last + 1 {
            self.skipped
                .fetch_add(frame.generation - last - 1, Ordering::SeqCst);
        }
        self.last_rendered.store(frame.generation, Ordering::SeqCst);
        Some(frame)
    }

    pub fn skipped_frames(&self) -> u64 {
        self.skipped.load(Ordering::SeqCst)
    }

    /// Returns true once three consecutive frame-parse failures have been
    /// recorded, signalling the caller to restart the screencast session.
    pub fn record_parse_failure(&self) -> bool {
        self.consecutive_parse_failures.fetch_add(1, Ordering::SeqCst) + 1 >= 3
    }
}

/// Minimum render interval (§4.5) derived from total device pixel count.
pub fn fps_for_pixels(pixels: u64) -> u32 {
    match pixels {
        p if p <= 480_000 => 60,
        p if p <= 921_600 => 45,
        p if p <= 2_073_600 => 30,
        p if p <= 3_686_400 => 24,
        _ => 15,
    }
}

/// Derives a quality tier (consumed by `quality_tier`) from the same pixel
/// buckets as `fps_for_pixels`, collapsing its five buckets onto the four
/// quality tiers by merging the two largest.
pub fn quality_tier_for_pixels(pixels: u64) -> u8 {
    match pixels {
        p if p <= 480_000 => 3,
        p if p <= 921_600 => 2,
        p if p <= 2_073_600 => 1,
        _ => 0,
    }
}

/// Quality tier 0..=3 -> (jpeg_quality, every_nth_frame).
pub fn quality_tier(tier: u8) -> (u8, u32) {
    match tier {
        0 => (25, 3),
        1 => (35, 2),
        2 => (50, 2),
        _ => (70, 1),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreencastFormat {
    Jpeg,
    Png,
}

impl ScreencastFormat {
    pub fn as_cdp_str(self) -> &'static str {
        match self {
            ScreencastFormat::Jpeg => "jpeg",
            ScreencastFormat::Png => "png",
        }
    }

    /// PNG is preferred whenever the SHM fast path is unavailable: it
    /// skips a JPEG decode stage on the client before the RGBA blit.
    pub fn select(shm_available: bool) -> Self {
        if shm_available {
            ScreencastFormat::Jpeg
        } else {
            ScreencastFormat::Png
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fps_table_matches_boundaries() {
        assert_eq!(fps_for_pixels(480_000), 60);
        assert_eq!(fps_for_pixels(480_001), 45);
        assert_eq!(fps_for_pixels(921_600), 45);
        assert_eq!(fps_for_pixels(2_073_600), 30);
        assert_eq!(fps_for_pixels(3_686_400), 24);
        assert_eq!(fps_for_pixels(3_686_401), 15);
    }

    #[test]
    fn quality_tier_for_pixels_matches_fps_buckets() {
        assert_eq!(quality_tier_for_pixels(480_000), 3);
        assert_eq!(quality_tier_for_pixels(480_001), 2);
        assert_eq!(quality_tier_for_pixels(921_600), 2);
        assert_eq!(quality_tier_for_pixels(2_073_600), 1);
        assert_eq!(quality_tier_for_pixels(2_073_601), 0);
    }

    #[test]
    fn quality_tiers_match_table() {
        assert_eq!(quality_tier(0), (25, 3));
        assert_eq!(quality_tier(1), (35, 2));
        assert_eq!(quality_tier(2), (50, 2));
        assert_eq!(quality_tier(3), (70, 1));
        assert_eq!(quality_tier(99), (70, 1));
    }

    #[test]
    fn ring_skips_newer_but_not_latest() {
        let ring = ScreencastRing::default();
        let f1 = ScreencastFrame {
            data: vec![],
            device_width: 10,
            device_height: 10,
            session_id: 1,
            generation: ring.next_generation(),
        };
        ring.publish(f1);
        assert!(ring.peek_latest().is_some());
        assert!(ring.peek_latest().is_none(), "same generation is not new");
    }

    #[test]
    fn ring_counts_skipped_generations() {
        let ring = ScreencastRing::default();
        let g1 = ring.next_generation();
        ring.publish(ScreencastFrame {
            data: vec![],
            device_width: 1,
            device_height: 1,
            session_id: 1,
            generation: g1,
        });
        ring.peek_latest();
        let _g2 = ring.next_generation();
        let g3 = ring.next_generation();
        ring.publish(ScreencastFrame {
            data: vec![],
            device_width: 1,
            device_height: 1,
            session_id: 3,
            generation: g3,
        });
        ring.peek_latest();
        assert_eq!(ring.skipped_frames(), 1);
    }

    #[test]
    fn three_consecutive_failures_trigger_restart() {
        let ring = ScreencastRing::default();
        assert!(!ring.record_parse_failure());
        assert!(!ring.record_parse_failure());
        assert!(ring.record_parse_failure());
    }
}
