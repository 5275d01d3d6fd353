//! C6 — pure terminal-pixel ↔ browser-viewport-pixel mapping.
//!
//! Only the pixel-based mapping described below is implemented. An
//! alternate, surface-based heuristic (scaling directly by `cols`/`rows`)
//! exists in the material this crate is drawn from but is treated as dead
//! code left over from an earlier encoder — see `DESIGN.md`.

/// Terminal geometry: raw cell/pixel counts reported by `TIOCGWINSZ`, plus
/// the derived cell size and toolbar reservation.
#[derive(Debug, Clone, Copy)]
pub struct TerminalGeometry {
    pub cols: u32,
    pub rows: u32,
    pub width_px: u32,
    pub height_px: u32,
    pub cell_width: f64,
    pub cell_height: f64,
    pub toolbar_height: u32,
    pub dpr: f64,
}

const FALLBACK_CELL_WIDTH: f64 = 14.0;
const FALLBACK_CELL_HEIGHT: f64 = 20.0;

impl TerminalGeometry {
    /// Builds geometry from raw `TIOCGWINSZ` fields. `toolbar_rows` is the
    /// whole-row height the toolbar renderer (C9) reports it occupies.
    pub fn new(cols: u32, rows: u32, width_px: u32, height_px: u32, toolbar_rows: u32) -> Self {
        let (cell_width, cell_height) = if width_px > 0 && height_px > 0 && cols > 0 && rows > 0 {
            (width_px as f64 / cols as f64, height_px as f64 / rows as f64)
        } else {
            (FALLBACK_CELL_WIDTH, FALLBACK_CELL_HEIGHT)
        };
        // Heuristic: terminals reporting wide cells (e.g. >= 16px) are
        // commonly running at a 2x device pixel ratio.
        let dpr = if cell_width >= 16.0 { 2.0 } else { 1.0 };
        Self {
            cols,
            rows,
            width_px: if width_px > 0 { width_px } else { (cell_width * cols as f64) as u32 },
            height_px: if height_px > 0 { height_px } else { (cell_height * rows as f64) as u32 },
            cell_width,
            cell_height,
            toolbar_height: toolbar_rows * cell_height as u32,
            dpr,
        }
    }
}

/// Whether the active mouse-reporting mode encodes coordinates in pixels
/// (SGR 1016) or 1-indexed terminal cells (SGR 1006).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseCoordMode {
    Pixel,
    Cell,
}

/// Snapshot used to map terminal input coordinates onto Chrome's viewport.
#[derive(Debug, Clone, Copy)]
pub struct CoordinateMapper {
    pub term_width_px: f64,
    pub term_height_px: f64,
    pub cell_width: f64,
    pub cell_height: f64,
    pub chrome_width: f64,
    pub chrome_height: f64,
    pub toolbar_height: f64,
}

impl CoordinateMapper {
    pub fn new(geometry: TerminalGeometry, chrome_width: u32, chrome_height: u32) -> Self {
        Self {
            term_width_px: geometry.width_px as f64,
            term_height_px: geometry.height_px as f64,
            cell_width: geometry.cell_width,
            cell_height: geometry.cell_height,
            chrome_width: chrome_width as f64,
            chrome_height: chrome_height as f64,
            toolbar_height: geometry.toolbar_height as f64,
        }
    }

    /// Normalises raw input coordinates to 0-indexed terminal pixels
    /// according to the active mouse mode.
    pub fn normalize(&self, x: f64, y: f64, mode: MouseCoordMode) -> (f64, f64) {
        match mode {
            MouseCoordMode::Pixel => (x, y),
            MouseCoordMode::Cell => (
                (x - 1.0) * self.cell_width,
                (y - 1.0) * self.cell_height,
            ),
        }
    }

    /// `terminal_to_browser` from §4.6: returns `None` for points in the
    /// reserved toolbar band.
    pub fn terminal_to_browser(&self, x_px: f64, y_px: f64) -> Option<(f64, f64)> {
        if y_px < self.toolbar_height {
            return None;
        }
        let content_y = y_px - self.toolbar_height;
        let content_height = (self.term_height_px - self.toolbar_height).max(1.0);

        let bx = round_half_to_even(x_px * self.chrome_width / self.term_width_px.max(1.0));
        let by = round_half_to_even(content_y * self.chrome_height / content_height);

        let bx = bx.clamp(0.0, (self.chrome_width - 1.0).max(0.0));
        let by = by.clamp(0.0, (self.chrome_height - 1.0).max(0.0));
        Some((bx, by))
    }
}

fn round_half_to_even(v: f64) -> f64 {
    let floor = v.floor();
    let diff = v - floor;
    if diff < 0.5 {
        floor
    } else if diff > 0.5 {
        floor + 1.0
    } else if (floor as i64) % 2 == 0 {
        floor
    } else {
        floor + 1.0
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn mapper(term_w: f64, term_h: f64, chrome_w: f64, chrome_h: f64, toolbar: f64) -> CoordinateMapper {
        CoordinateMapper {
            term_width_px: term_w,
            term_height_px: term_h,
            cell_width: 10.0,
            cell_height: 20.0,
            chrome_width: chrome_w,
            chrome_height: chrome_h,
            toolbar_height: toolbar,
        }
    }

    #[test]
    fn toolbar_band_returns_none() {
        let m = mapper(800.0, 600.0, 800.0, 560.0, 40.0);
        assert_eq!(m.terminal_to_browser(10.0, 5.0), None);
        assert!(m.terminal_to_browser(10.0, 41.0).is_some());
    }

    #[test]
    fn identity_scale_is_stable() {
        let m = mapper(800.0, 600.0, 800.0, 560.0, 40.0);
        let (bx, by) = m.terminal_to_browser(400.0, 340.0).unwrap();
        assert!((bx - 400.0).abs() < 1.0);
        assert!((by - 300.0).abs() < 1.0);
    }

    #[test]
    fn adjacent_pixels_stay_distinct_when_chrome_at_least_as_wide() {
        let m = mapper(800.0, 600.0, 1600.0, 1120.0, 40.0);
        let (bx1, _) = m.terminal_to_browser(100.0, 100.0).unwrap();
        let (bx2, _) = m.terminal_to_browser(101.0, 100.0).unwrap();
        assert_ne!(bx1, bx2);
    }

    #[test]
    fn round_trip_within_one_pixel() {
        let m = mapper(1000.0, 700.0, 1000.0, 660.0, 40.0);
        for x in [0.0, 123.0, 500.0, 999.0] {
            for y in [40.0, 200.0, 699.0] {
                if let Some((bx, by)) = m.terminal_to_browser(x, y) {
                    let back_x = bx * m.term_width_px / m.chrome_width;
                    let content_h = m.term_height_px - m.toolbar_height;
                    let back_y = by * content_h / m.chrome_height + m.toolbar_height;
                    assert!((back_x - x).abs() <= 1.0, "x round-trip drifted: {x} -> {bx} -> {back_x}");
                    assert!((back_y - y).abs() <= 1.0, "y round-trip drifted: {y} -> {by} -> {back_y}");
                }
            }
        }
    }

    #[test]
    fn clamps_to_viewport_bounds() {
        let m = mapper(800.0, 600.0, 800.0, 560.0, 40.0);
        let (bx, by) = m.terminal_to_browser(10_000.0, 10_000.0).unwrap();
        assert_eq!(bx, 799.0);
        assert_eq!(by, 559.0);
    }

    proptest::proptest! {
        /// Any point below the toolbar band, for any plausible geometry,
        /// maps into `[0, chrome_width) x [0, chrome_height)` — never out
        /// of bounds, regardless of how far off-screen the input was.
        #[test]
        fn mapped_points_always_stay_in_viewport_bounds(
            term_w in 100.0f64..4000.0,
            term_h in 100.0f64..4000.0,
            chrome_w in 100.0f64..4000.0,
            chrome_h in 100.0f64..4000.0,
            toolbar in 0.0f64..50.0,
            x in -1000.0f64..10_000.0,
            y in -1000.0f64..10_000.0,
        ) {
            let m = mapper(term_w, term_h, chrome_w, chrome_h, toolbar);
            if let Some((bx, by)) = m.terminal_to_browser(x, y) {
                prop_assert!(bx >= 0.0 && bx < chrome_w);
                prop_assert!(by >= 0.0 && by < chrome_h);
            }
        }

        /// Points strictly inside the toolbar band are always excluded,
        /// never silently mapped.
        #[test]
        fn toolbar_band_is_never_mapped(
            term_w in 100.0f64..4000.0,
            term_h in 100.0f64..4000.0,
            chrome_w in 100.0f64..4000.0,
            chrome_h in 100.0f64..4000.0,
            toolbar in 1.0f64..50.0,
            y in 0.0f64..49.0,
        ) {
            let m = mapper(term_w, term_h, chrome_w, chrome_h, toolbar);
            if y < toolbar {
                prop_assert_eq!(m.terminal_to_browser(0.0, y), None);
            }
        }
    }
}
