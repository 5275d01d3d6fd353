//! C7 — decouples terminal input ingest from CDP dispatch: records bursts
//! of mouse activity and flushes them at a fixed 30 Hz tick so a flood of
//! move events never saturates the CDP writer.

use std::time::{Duration, Instant};

use termweb_cdp::CdpClient;
use termweb_cdp::input_dispatch::{self, Modifiers as CdpModifiers, MouseButton as CdpButton};

use crate::terminal::{MouseButton, MouseEvent, MouseKind};

pub const TICK_INTERVAL: Duration = Duration::from_millis(33);

#[derive(Debug, Clone, Copy)]
enum Pending {
    PressRelease(MouseEvent),
}

#[derive(Default)]
pub struct MouseBus {
    queue: Vec<Pending>,
    latest_move: Option<MouseEvent>,
    wheel_delta: f64,
    wheel_origin: Option<MouseEvent>,
    last_tick: Option<Instant>,
    natural_scroll: bool,
    last_position: Option<(i64, i64)>,
}

impl MouseBus {
    pub fn new(natural_scroll: bool) -> Self {
        Self {
            natural_scroll,
            ..Default::default()
        }
    }

    pub fn record(&mut self, event: MouseEvent) {
        self.last_position = Some((event.x, event.y));
        match event.kind {
            MouseKind::Move | MouseKind::Drag => {
                self.latest_move = Some(event);
            }
            MouseKind::WheelUp | MouseKind::WheelDown => {
                let delta = if event.kind == MouseKind::WheelUp { -1.0 } else { 1.0 };
                self.wheel_delta += delta;
                self.wheel_origin = Some(event);
            }
            MouseKind::Press | MouseKind::Release => {
                self.queue.push(Pending::PressRelease(event));
            }
        }
    }

    /// Last observed terminal-pixel mouse position, independent of the
    /// press/release/move queues `flush` drains — used to place the
    /// cursor overlay image.
    pub fn last_position(&self) -> Option<(i64, i64)> {
        self.last_position
    }

    pub fn reset(&mut self) {
        self.queue.clear();
        self.latest_move = None;
        self.wheel_delta = 0.0;
        self.wheel_origin = None;
    }

    /// Returns true once at least `TICK_INTERVAL` has elapsed since the
    /// last flush; callers are expected to call `flush` right after.
    pub fn should_tick(&mut self, now: Instant) -> bool {
        match self.last_tick {
            Some(last) if now.duration_since(last) < TICK_INTERVAL => false,
            _ => {
                self.last_tick = Some(now);
                true
            }
        }
    }

    /// Dispatches queued press/release events in order, then one
    /// accumulated wheel event, then the single latest move — absorbing
    /// everything that arrived since the previous tick. If the writer is
    /// backed up, callers should skip a tick entirely and let the
    /// latest-only semantics here naturally drop the backlog.
    pub fn flush(&mut self, client: &CdpClient, map: impl Fn(f64, f64) -> Option<(f64, f64)>) {
        for pending in std::mem::take(&mut self.queue) {
            let Pending::PressRelease(event) = pending;
            self.dispatch_press_release(client, &map, event);
        }

        if self.wheel_delta != 0.0
            && let Some(origin) = self.wheel_origin.take()
        {
            self.dispatch_wheel(client, &map, origin, self.wheel_delta);
        }
        self.wheel_delta = 0.0;

        if let Some(event) = self.latest_move.take() {
            self.dispatch_move(client, &map, event);
        }
    }

    fn dispatch_press_release(
        &self,
        client: &CdpClient,
        map: &impl Fn(f64, f64) -> Option<(f64, f64)>,
        event: MouseEvent,
    ) {
        let Some((bx, by)) = map(event.x as f64, event.y as f64) else {
            return;
        };
        let kind = match event.kind {
            MouseKind::Press => "mousePressed",
            MouseKind::Release => "mouseReleased",
            _ => return,
        };
        let _ = input_dispatch::dispatch_mouse_event(
            client,
            kind,
            bx,
            by,
            to_cdp_button(event.button),
            Some(1),
            None,
            None,
            to_cdp_modifiers(event.modifiers),
        );
    }

    fn dispatch_move(
        &self,
        client: &CdpClient,
        map: &impl Fn(f64, f64) -> Option<(f64, f64)>,
        event: MouseEvent,
    ) {
        let Some((bx, by)) = map(event.x as f64, event.y as f64) else {
            return;
        };
        let _ = input_dispatch::dispatch_mouse_event(
            client,
            "mouseMoved",
            bx,
            by,
            CdpButton::None,
            None,
            None,
            None,
            to_cdp_modifiers(event.modifiers),
        );
    }

    fn dispatch_wheel(
        &self,
        client: &CdpClient,
        map: &impl Fn(f64, f64) -> Option<(f64, f64)>,
        origin: MouseEvent,
        accumulated_delta: f64,
    ) {
        let Some((bx, by)) = map(origin.x as f64, origin.y as f64) else {
            return;
        };
        let delta_y = if self.natural_scroll { -accumulated_delta } else { accumulated_delta };
        let _ = input_dispatch::dispatch_mouse_event(
            client,
            "mouseWheel",
            bx,
            by,
            CdpButton::None,
            None,
            Some(0.0),
            Some(delta_y * 50.0),
            to_cdp_modifiers(origin.modifiers),
        );
    }
}

fn to_cdp_button(button: MouseButton) -> CdpButton {
    match button {
        MouseButton::Left => CdpButton::Left,
        MouseButton::Middle => CdpButton::Middle,
        MouseButton::Right => CdpButton::Right,
        MouseButton::None => CdpButton::None,
    }
}

fn to_cdp_modifiers(modifiers: crate::terminal::Modifiers) -> CdpModifiers {
    CdpModifiers {
        alt: modifiers.alt,
        ctrl: modifiers.ctrl,
        meta: modifiers.meta,
        shift: modifiers.shift,
    }
}

/// Resolves the natural-scroll policy: explicit `Options` override wins,
/// otherwise `TERMWEB_NATURAL_SCROLL` is consulted, otherwise a
/// platform-appropriate default (macOS defaults to natural scroll).
pub fn resolve_natural_scroll(override_value: Option<bool>) -> bool {
    if let Some(v) = override_value {
        return v;
    }
    cfg!(target_os = "macos")
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::terminal::Modifiers;

    fn mouse_event(kind: MouseKind, x: i64, y: i64) -> MouseEvent {
        MouseEvent {
            kind,
            button: MouseButton::Left,
            x,
            y,
            pixel_mode: false,
            modifiers: Modifiers::default(),
        }
    }

    #[test]
    fn move_coalesces_to_latest_only() {
        let mut bus = MouseBus::new(false);
        bus.record(mouse_event(MouseKind::Move, 1, 1));
        bus.record(mouse_event(MouseKind::Move, 2, 2));
        bus.record(mouse_event(MouseKind::Move, 3, 3));
        assert_eq!(bus.latest_move.map(|e| (e.x, e.y)), Some((3, 3)));
    }

    #[test]
    fn press_release_preserved_in_order() {
        let mut bus = MouseBus::new(false);
        bus.record(mouse_event(MouseKind::Press, 1, 1));
        bus.record(mouse_event(MouseKind::Release, 1, 1));
        assert_eq!(bus.queue.len(), 2);
    }

    #[test]
    fn wheel_accumulates_within_tick() {
        let mut bus = MouseBus::new(false);
        bus.record(mouse_event(MouseKind::WheelDown, 5, 5));
        bus.record(mouse_event(MouseKind::WheelDown, 5, 5));
        assert_eq!(bus.wheel_delta, 2.0);
    }

    #[test]
    fn reset_clears_everything_without_dispatch() {
        let mut bus = MouseBus::new(false);
        bus.record(mouse_event(MouseKind::Press, 1, 1));
        bus.record(mouse_event(MouseKind::Move, 2, 2));
        bus.reset();
        assert!(bus.queue.is_empty());
        assert!(bus.latest_move.is_none());
        assert_eq!(bus.wheel_delta, 0.0);
    }

    #[test]
    fn should_tick_respects_interval() {
        let mut bus = MouseBus::new(false);
        let t0 = Instant::now();
        assert!(bus.should_tick(t0));
        assert!(!bus.should_tick(t0 + Duration::from_millis(5)));
        assert!(bus.should_tick(t0 + TICK_INTERVAL + Duration::from_millis(1)));
    }

    proptest::proptest! {
        /// Regardless of how moves, wheels, and press/release events are
        /// interleaved within a tick, the queue holds exactly the
        /// press/release events (in the order recorded) and `latest_move`
        /// holds exactly the last move recorded — move coalescing never
        /// drops or reorders a press/release.
        #[test]
        fn coalescing_preserves_press_release_order_regardless_of_interleaving(
            kinds in proptest::collection::vec(0u8..4, 0..50),
        ) {
            let mut bus = MouseBus::new(false);
            let mut expected_press_release = Vec::new();
            let mut expected_last_move = None;
            for (i, k) in kinds.iter().enumerate() {
                let kind = match k {
                    0 => MouseKind::Move,
                    1 => MouseKind::Press,
                    2 => MouseKind::Release,
                    _ => MouseKind::WheelDown,
                };
                let event = mouse_event(kind, i as i64, i as i64);
                bus.record(event);
                match kind {
                    MouseKind::Move => expected_last_move = Some((event.x, event.y)),
                    MouseKind::Press | MouseKind::Release => expected_press_release.push((event.x, event.y)),
                    _ => {}
                }
            }
            let actual_press_release: Vec<(i64, i64)> = bus
                .queue
                .iter()
                .map(|Pending::PressRelease(e)| (e.x, e.y))
                .collect();
            prop_assert_eq!(actual_press_release, expected_press_release);
            prop_assert_eq!(bus.latest_move.map(|e| (e.x, e.y)), expected_last_move);
        }
    }
}
