//! C10 — the viewer state machine: owns the terminal, the CDP client, and
//! every per-frame piece (mouse bus, toolbar, kitty emitter, coordinate
//! mapper, virtual-fs bridge), and drives the single cooperative tick loop
//! described in §4.10.

pub mod frame;
pub mod mode;

use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::ImageEncoder;
use termweb_cdp::coordinate::{CoordinateMapper, TerminalGeometry};
use termweb_cdp::screencast::{self, ScreencastFormat};
use termweb_cdp::{protocol, CdpClient};
use tracing::{info, warn};

use crate::config::Options;
use crate::error::TermwebError;
use crate::form_mode::{self, FormElement};
use crate::kitty::{DisplayOptions, Emitter, Layer, shm_supported};
use crate::mouse_bus::{self, MouseBus};
use crate::picker::{self, PickerKind};
use crate::terminal::{Input, Key, KeyEvent, Terminal, Size};
use crate::toolbar::Toolbar;
use crate::vfs_bridge::{self, AllowList, VfsBridge};
use mode::{Trigger, ViewerMode};

const TICK_SLEEP: Duration = Duration::from_millis(5);

/// A pending `Page.javascriptDialogOpening`, held until the user accepts or
/// dismisses it through `ViewerMode::Dialog`.
#[derive(Debug, Clone)]
pub struct DialogInfo {
    pub kind: String,
    pub message: String,
    pub default_prompt: Option<String>,
}

pub struct ViewerState {
    pub current_url: String,
    pub is_loading: frame::LoadingState,
    pub can_go_back: bool,
    pub can_go_forward: bool,
    pub running: bool,
    pub ui_dirty: bool,
    pub dialog: Option<DialogInfo>,
}

impl ViewerState {
    fn new(initial_url: String) -> Self {
        Self {
            current_url: initial_url,
            is_loading: frame::LoadingState::default(),
            can_go_back: false,
            can_go_forward: false,
            running: true,
            ui_dirty: true,
            dialog: None,
        }
    }
}

/// Computes adaptive screencast parameters (§4.5) from the actual
/// viewport pixel count rather than the fixed defaults Chrome would use.
pub fn screencast_options_for(width_px: u32, height_px: u32, shm_enabled: bool) -> protocol::ScreencastOptions {
    let pixels = width_px as u64 * height_px as u64;
    let tier = screencast::quality_tier_for_pixels(pixels);
    let (quality, every_nth_frame) = screencast::quality_tier(tier);
    protocol::ScreencastOptions {
        format: ScreencastFormat::select(shm_enabled),
        quality,
        every_nth_frame,
        max_width: width_px,
        max_height: height_px,
    }
}

/// Render-gate FPS cap: an explicit `TERMWEB_FPS_CAP` override wins, else
/// it's derived from the viewport's pixel count (§4.5).
pub fn effective_fps_cap(fps_cap_override: Option<u32>, width_px: u32, height_px: u32) -> u32 {
    fps_cap_override.unwrap_or_else(|| screencast::fps_for_pixels(width_px as u64 * height_px as u64))
}

pub struct Viewer {
    client: Arc<CdpClient>,
    terminal: Terminal,
    emitter: Emitter<std::io::Stdout>,
    mouse_bus: MouseBus,
    toolbar: Toolbar,
    mapper: CoordinateMapper,
    geometry: TerminalGeometry,
    vfs: VfsBridge,
    mode: ViewerMode,
    state: ViewerState,
    last_render: Option<Instant>,
    fps_cap: u32,
    tick_ms: u64,
    options: Options,
    form_elements: Vec<FormElement>,
    form_cursor: usize,
}

impl Viewer {
    pub fn new(client: Arc<CdpClient>, options: Options, allow_roots: Vec<std::path::PathBuf>) -> Result<Self, TermwebError> {
        let terminal = Terminal::enable(true)?;
        let size = Terminal::size()?;
        let geometry = geometry_for(&size, options.show_toolbar);
        let toolbar = Toolbar::new(geometry.cell_height);
        let mapper = CoordinateMapper::new(geometry, size.width_px.max(1), size.height_px.max(1));
        let natural_scroll = mouse_bus::resolve_natural_scroll(options.natural_scroll);
        let fps_cap = effective_fps_cap(options.fps_cap, size.width_px.max(1), size.height_px.max(1));

        Ok(Self {
            client,
            terminal,
            emitter: Emitter::new(std::io::stdout()),
            mouse_bus: MouseBus::new(natural_scroll),
            toolbar,
            mapper,
            geometry,
            vfs: VfsBridge::new(AllowList::new(allow_roots)),
            mode: ViewerMode::Normal,
            state: ViewerState::new(options.initial_url.clone()),
            last_render: None,
            fps_cap,
            tick_ms: 0,
            options,
            form_elements: Vec::new(),
            form_cursor: 0,
        })
    }

    pub fn run(&mut self) -> Result<(), TermwebError> {
        while self.state.running {
            if let Err(err) = self.tick() {
                if handle_error(&err) == ErrorAction::Shutdown {
                    self.state.running = false;
                    return Err(err);
                }
            }
            std::thread::sleep(TICK_SLEEP);
            self.tick_ms += TICK_SLEEP.as_millis() as u64;
        }
        Ok(())
    }

    fn tick(&mut self) -> Result<(), TermwebError> {
        // 1. SIGWINCH.
        if self.terminal.take_resized() {
            self.handle_resize()?;
        }

        // 2. Drain input events.
        let events = self.terminal.drain_events();
        for event in events {
            self.handle_input(event)?;
        }

        // 3. Tick the mouse bus.
        let now = Instant::now();
        if self.mouse_bus.should_tick(now) {
            let mapper = self.mapper;
            self.mouse_bus.flush(&self.client, move |x, y| mapper.terminal_to_browser(x, y));
        }

        // 4. Try to render a new frame (Normal mode only).
        if mode::renders_content(self.mode) {
            self.try_render_frame()?;
        }

        // 5. Poll CDP events.
        let events = self.client.poll_events(64);
        for event in events {
            self.handle_cdp_event(&event.method, &event.payload);
        }

        // 6. Re-render overlays if dirty.
        if self.state.ui_dirty {
            self.render_overlays()?;
            self.state.ui_dirty = false;
        }

        Ok(())
    }

    fn handle_resize(&mut self) -> Result<(), TermwebError> {
        let _ = protocol::stop_screencast(&self.client);

        let size = Terminal::size()?;
        let geometry = geometry_for(&size, self.options.show_toolbar);
        self.mapper = CoordinateMapper::new(geometry, size.width_px.max(1), size.height_px.max(1));
        self.toolbar = Toolbar::new(geometry.cell_height);
        self.geometry = geometry;
        self.fps_cap = effective_fps_cap(self.options.fps_cap, size.width_px.max(1), size.height_px.max(1));
        self.emitter.clear_all()?;

        let content_width = size.width_px.max(1);
        let content_height = size.height_px.saturating_sub(self.toolbar.height_px()).max(1);
        protocol::set_device_metrics_override(&self.client, content_width, content_height, geometry.dpr, false)?;

        let shm_enabled = self.options.force_shm.unwrap_or_else(shm_supported);
        let opts = screencast_options_for(content_width, content_height, shm_enabled);
        protocol::start_screencast(&self.client, opts)?;

        // Give Chrome a bounded window to stabilize and emit the first
        // post-resize frame before the tick loop resumes rendering.
        std::thread::sleep(Duration::from_millis(60));

        self.state.ui_dirty = true;
        Ok(())
    }

    fn handle_input(&mut self, input: Input) -> Result<(), TermwebError> {
        match input {
            Input::Key(key_event) => {
                if let Some(action) = crate::input_router::global_hotkey(&key_event) {
                    self.handle_global_action(action)?;
                    return Ok(());
                }

                match self.mode {
                    ViewerMode::Normal => {
                        if let Some(next) = mode::next_mode(self.mode, Trigger::Key(key_event.key)) {
                            self.mode = next;
                            self.state.ui_dirty = true;
                            if self.mode == ViewerMode::FormMode {
                                self.enter_form_mode();
                            }
                        } else {
                            crate::input_router::dispatch_normal_key(&self.client, &key_event);
                        }
                    }
                    ViewerMode::UrlPrompt => {
                        let outcome = crate::input_router::handle_url_prompt_key(
                            &mut self.toolbar.url_bar,
                            &key_event,
                            cfg!(target_os = "macos"),
                        );
                        match outcome {
                            crate::input_router::UrlPromptOutcome::Commit(url) => {
                                self.navigate(&url)?;
                                self.toolbar.blur_url();
                                self.mode = ViewerMode::Normal;
                            }
                            crate::input_router::UrlPromptOutcome::Cancel => {
                                self.toolbar.blur_url();
                                self.mode = ViewerMode::Normal;
                            }
                            crate::input_router::UrlPromptOutcome::Continue => {}
                        }
                        self.state.ui_dirty = true;
                    }
                    ViewerMode::FormMode => self.handle_form_mode_key(&key_event)?,
                    ViewerMode::TextInput => self.handle_text_input_key(&key_event)?,
                    ViewerMode::Dialog => self.handle_dialog_key(&key_event)?,
                    ViewerMode::Help => {
                        if let Some(next) = mode::next_mode(self.mode, Trigger::Key(key_event.key)) {
                            self.mode = next;
                            self.state.ui_dirty = true;
                        }
                    }
                }
            }
            Input::Mouse(mouse_event) => {
                if mouse_event.y < self.toolbar.height_px() as i64 {
                    if let Some(button) = self.toolbar.hit_test(mouse_event.x.max(0) as u32, mouse_event.y.max(0) as u32) {
                        self.handle_toolbar_click(button)?;
                    }
                } else {
                    self.mouse_bus.record(mouse_event);
                }
            }
            Input::Paste(text) => {
                if self.mode == ViewerMode::UrlPrompt {
                    for c in text.chars() {
                        self.toolbar.url_bar.insert_char(c);
                    }
                    self.state.ui_dirty = true;
                }
            }
            Input::Resize | Input::None => {}
        }
        Ok(())
    }

    /// Runs the Tab-cycling DOM discovery query and focuses the first
    /// element found, per §4.8's FormMode entry behavior.
    fn enter_form_mode(&mut self) {
        match form_mode::discover(&self.client) {
            Ok(elements) => {
                self.form_cursor = 0;
                if let Some(first) = elements.first() {
                    let _ = form_mode::focus_element(&self.client, first.index);
                }
                self.form_elements = elements;
            }
            Err(err) => {
                warn!(%err, "form element discovery failed");
                self.form_elements.clear();
            }
        }
        self.state.ui_dirty = true;
    }

    fn handle_form_mode_key(&mut self, key_event: &KeyEvent) -> Result<(), TermwebError> {
        match key_event.key {
            Key::Tab if !self.form_elements.is_empty() => {
                let len = self.form_elements.len();
                self.form_cursor = if key_event.modifiers.shift {
                    (self.form_cursor + len - 1) % len
                } else {
                    (self.form_cursor + 1) % len
                };
                let index = self.form_elements[self.form_cursor].index;
                let _ = form_mode::focus_element(&self.client, index);
                self.state.ui_dirty = true;
            }
            Key::Enter => {
                if let Some(element) = self.form_elements.get(self.form_cursor).cloned() {
                    form_mode::activate_element(&self.client, &element)?;
                    if element.is_text_entry() {
                        self.mode = ViewerMode::TextInput;
                    }
                }
                self.state.ui_dirty = true;
            }
            _ => {
                if let Some(next) = mode::next_mode(self.mode, Trigger::Key(key_event.key)) {
                    self.mode = next;
                    self.state.ui_dirty = true;
                }
            }
        }
        Ok(())
    }

    /// Keystrokes in `TextInput` go straight to the focused DOM field via
    /// the same deterministic key mapping Normal mode uses; Enter/Escape
    /// are intercepted by the transition table instead of being forwarded.
    fn handle_text_input_key(&mut self, key_event: &KeyEvent) -> Result<(), TermwebError> {
        if let Some(next) = mode::next_mode(self.mode, Trigger::Key(key_event.key)) {
            self.mode = next;
            self.state.ui_dirty = true;
            return Ok(());
        }
        crate::input_router::dispatch_normal_key(&self.client, key_event);
        Ok(())
    }

    fn handle_dialog_key(&mut self, key_event: &KeyEvent) -> Result<(), TermwebError> {
        match key_event.key {
            Key::Enter => {
                let prompt_text = self.state.dialog.as_ref().and_then(|d| d.default_prompt.clone());
                protocol::handle_javascript_dialog(&self.client, true, prompt_text.as_deref())?;
                self.state.dialog = None;
                self.mode = ViewerMode::Normal;
                self.state.ui_dirty = true;
            }
            Key::Escape => {
                protocol::handle_javascript_dialog(&self.client, false, None)?;
                self.state.dialog = None;
                self.mode = ViewerMode::Normal;
                self.state.ui_dirty = true;
            }
            _ => {}
        }
        Ok(())
    }

    /// Pulls the current back/forward availability from Chrome and feeds it
    /// into the toolbar's button states, per §4.9's `set_nav_state`.
    fn refresh_nav_state(&mut self) {
        match protocol::get_navigation_history(&self.client) {
            Ok(history) => {
                self.state.can_go_back = history.can_go_back;
                self.state.can_go_forward = history.can_go_forward;
                self.toolbar.set_nav_state(history.can_go_back, history.can_go_forward, self.state.is_loading.is_loading());
            }
            Err(err) => warn!(%err, "failed to refresh navigation history"),
        }
        self.state.ui_dirty = true;
    }

    fn handle_global_action(&mut self, action: crate::input_router::GlobalAction) -> Result<(), TermwebError> {
        use crate::input_router::GlobalAction;
        match action {
            GlobalAction::Quit => self.state.running = false,
            GlobalAction::OpenUrlPrompt => {
                self.mode = ViewerMode::UrlPrompt;
                self.toolbar.focus_url();
                self.state.ui_dirty = true;
            }
            GlobalAction::Reload => {
                let _ = protocol::reload(&self.client, false);
            }
            GlobalAction::HistoryBack => {
                let _ = protocol::go_back(&self.client);
                self.refresh_nav_state();
            }
            GlobalAction::HistoryForward => {
                let _ = protocol::go_forward(&self.client);
                self.refresh_nav_state();
            }
            GlobalAction::Stop => {
                let _ = self.client.send_command("Page.stopLoading", serde_json::json!({}));
            }
            GlobalAction::TabPicker => {
                info!("tab picker requested (no-op: single-tab viewer)");
            }
        }
        Ok(())
    }

    fn handle_toolbar_click(&mut self, button: crate::toolbar::Button) -> Result<(), TermwebError> {
        use crate::toolbar::Button;
        match button {
            Button::Back => {
                let _ = protocol::go_back(&self.client);
                self.refresh_nav_state();
            }
            Button::Forward => {
                let _ = protocol::go_forward(&self.client);
                self.refresh_nav_state();
            }
            Button::Reload => {
                let _ = protocol::reload(&self.client, false);
            }
            Button::Close => self.state.running = false,
        }
        self.state.ui_dirty = true;
        Ok(())
    }

    fn navigate(&mut self, url: &str) -> Result<(), TermwebError> {
        self.client
            .send_command_timeout("Page.navigate", serde_json::json!({ "url": url }), Duration::from_secs(10))?;
        self.state.current_url = url.to_string();
        self.state.is_loading.start(self.tick_ms);
        self.toolbar.set_url(url);
        self.refresh_nav_state();
        Ok(())
    }

    fn try_render_frame(&mut self) -> Result<(), TermwebError> {
        let now = Instant::now();
        if !frame::fps_gate_allows(self.last_render, now, self.fps_cap) {
            return Ok(());
        }
        let Some(frame) = self.client.screencast.peek_latest() else { return Ok(()) };

        let toolbar_rows = if self.options.show_toolbar { 1 } else { 0 };
        let opts = DisplayOptions {
            rows: self.geometry.rows.saturating_sub(toolbar_rows),
            columns: self.geometry.cols,
            layer: Layer::Content,
            x_offset: 0,
            y_offset: self.toolbar.height_px(),
        };

        // Screencast frames arrive JPEG- or PNG-encoded depending on
        // `ScreencastFormat::select`; the SHM fast path needs raw RGBA, so
        // decode once here rather than pushing that decision into the
        // emitter.
        let shm_enabled = self.options.force_shm.unwrap_or_else(shm_supported);
        if shm_enabled
            && let Ok(decoded) = image::load_from_memory(&frame.data)
        {
            let rgba = decoded.to_rgba8();
            let (width, height) = rgba.dimensions();
            self.emitter.display_via_shm(rgba.as_raw(), width, height, opts)?;
        } else {
            self.emitter.display_base64_png(&frame.data, opts)?;
        }
        self.last_render = Some(now);
        self.state.is_loading.clear_on_new_frame(self.tick_ms);
        self.state.ui_dirty = true;
        Ok(())
    }

    fn render_overlays(&mut self) -> Result<(), TermwebError> {
        if self.options.show_toolbar {
            let url_bar_cols = self.geometry.cols.saturating_sub(8).max(1) as usize;
            self.toolbar.url_bar.clamp_scroll(url_bar_cols);
            let png = render_toolbar_png(&self.toolbar, self.state.is_loading.is_loading());
            let opts = DisplayOptions {
                rows: 1,
                columns: self.geometry.cols,
                layer: Layer::Toolbar,
                x_offset: 0,
                y_offset: 0,
            };
            self.emitter.display_base64_png(&png, opts)?;
        }

        if mode::renders_content(self.mode)
            && let Some((x, y)) = self.mouse_bus.last_position()
        {
            let half = (CURSOR_SIZE_PX / 2) as i64;
            let png = render_cursor_png();
            let opts = DisplayOptions {
                rows: 1,
                columns: 1,
                layer: Layer::Cursor,
                x_offset: (x - half).max(0) as u32,
                y_offset: (y - half).max(0) as u32,
            };
            self.emitter.display_base64_png(&png, opts)?;
        }

        std::io::stdout().flush().ok();
        Ok(())
    }

    fn handle_cdp_event(&mut self, method: &str, payload: &serde_json::Value) {
        match method {
            "Page.javascriptDialogOpening" => {
                let dialog = DialogInfo {
                    kind: payload.get("type").and_then(|v| v.as_str()).unwrap_or("alert").to_string(),
                    message: payload.get("message").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                    default_prompt: payload.get("defaultPrompt").and_then(|v| v.as_str()).map(str::to_string),
                };
                info!(kind = %dialog.kind, message = %dialog.message, "javascript dialog opened");
                self.state.dialog = Some(dialog);
                self.mode = ViewerMode::Dialog;
                self.state.ui_dirty = true;
            }
            "Page.fileChooserOpened" => {
                self.handle_file_chooser(payload);
            }
            "Page.downloadWillBegin" | "Page.downloadProgress" => {
                self.state.ui_dirty = true;
            }
            "Page.frameNavigated" => {
                if let Some(url) = payload.pointer("/frame/url").and_then(|v| v.as_str()) {
                    self.state.current_url = url.to_string();
                    self.toolbar.set_url(url);
                }
                self.refresh_nav_state();
            }
            "Runtime.consoleAPICalled" => {
                self.handle_console_message(payload);
            }
            _ => {}
        }
    }

    /// The page's own file `<input>` triggers this independently of the
    /// `__TERMWEB_PICKER__` console marker; it resolves through the same
    /// native picker but must reply over `Page.handleFileChooser` instead
    /// of a JS-side promise.
    fn handle_file_chooser(&mut self, payload: &serde_json::Value) {
        let multiple = payload.get("mode").and_then(|v| v.as_str()) == Some("selectMultiple");
        let kind = PickerKind::File;
        let title = if multiple { "Select files" } else { "Select file" };
        match picker::pick_path(kind, title) {
            Ok(Some(path)) => {
                self.vfs.allow_list_mut().add(path.clone());
                let files = vec![path.to_string_lossy().into_owned()];
                if let Err(err) = protocol::handle_file_chooser(&self.client, "selectAccepted", &files) {
                    warn!(%err, "failed to resolve file chooser");
                }
            }
            Ok(None) => {
                let _ = protocol::handle_file_chooser(&self.client, "cancel", &[]);
            }
            Err(err) => {
                warn!(%err, "native file picker failed");
                let _ = protocol::handle_file_chooser(&self.client, "cancel", &[]);
            }
        }
    }

    fn handle_console_message(&mut self, payload: &serde_json::Value) {
        let Some(args) = payload.get("args").and_then(|v| v.as_array()) else { return };
        for arg in args {
            let Some(text) = arg.get("value").and_then(|v| v.as_str()) else { continue };
            match vfs_bridge::parse_marker(text) {
                Ok(Some(vfs_bridge::Marker::Fs(request))) => {
                    let (success, payload) = self.vfs.handle(&request);
                    vfs_bridge::dispatch_response(&self.client, &request.id, success, &payload);
                }
                Ok(Some(vfs_bridge::Marker::Picker(request))) => {
                    vfs_bridge::handle_picker(self.vfs.allow_list_mut(), &request.kind_raw);
                }
                Ok(None) => {}
                Err(err) => warn!(%err, "malformed virtual-fs marker"),
            }
        }
    }
}

fn geometry_for(size: &Size, show_toolbar: bool) -> TerminalGeometry {
    let toolbar_rows = if show_toolbar { 1 } else { 0 };
    TerminalGeometry::new(size.cols, size.rows, size.width_px, size.height_px, toolbar_rows)
}

const CURSOR_SIZE_PX: u32 = 12;

/// A small transparent crosshair, centered on the pointer, drawn on
/// `Layer::Cursor` so the mouse position stays visible over the streamed
/// content frame.
fn render_cursor_png() -> Vec<u8> {
    let size = CURSOR_SIZE_PX;
    let mid = size / 2;
    let mut rgba = vec![0u8; (size * size * 4) as usize];
    for y in 0..size {
        for x in 0..size {
            if x == mid || y == mid {
                let idx = ((y * size + x) * 4) as usize;
                rgba[idx] = 255;
                rgba[idx + 1] = 255;
                rgba[idx + 2] = 255;
                rgba[idx + 3] = 255;
            }
        }
    }
    let mut out = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut out);
    let _ = encoder.write_image(&rgba, size, size, image::ExtendedColorType::Rgba8);
    out
}

fn render_toolbar_png(toolbar: &Toolbar, loading: bool) -> Vec<u8> {
    let height = toolbar.height_px().max(1);
    let width = 1u32;
    let mut rgba = vec![0u8; (width * height * 4) as usize];
    let shade = if loading { 120 } else { 200 };
    for px in rgba.chunks_exact_mut(4) {
        px[0] = shade;
        px[1] = shade;
        px[2] = shade;
        px[3] = 255;
    }
    let mut out = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut out);
    let _ = encoder.write_image(&rgba, width, height, image::ExtendedColorType::Rgba8);
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ErrorAction {
    Continue,
    Shutdown,
}

/// Centralized failure classification (§4.10's "added" note): broken
/// transport always shuts down in an orderly way; everything else is
/// logged and the loop continues.
fn handle_error(err: &TermwebError) -> ErrorAction {
    match err {
        TermwebError::Cdp(cdp_err) if cdp_err.is_fatal() => {
            warn!(%err, "fatal transport error, shutting down");
            ErrorAction::Shutdown
        }
        TermwebError::Terminal(crate::error::TerminalError::Closed) => ErrorAction::Shutdown,
        other => {
            warn!(%other, "non-critical error, continuing");
            ErrorAction::Continue
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_cdp_errors_trigger_shutdown() {
        let err = TermwebError::Cdp(termweb_cdp::CdpError::TransportClosed);
        assert_eq!(handle_error(&err), ErrorAction::Shutdown);
    }

    #[test]
    fn timeout_errors_are_non_fatal() {
        let err = TermwebError::Cdp(termweb_cdp::CdpError::Timeout {
            method: "Page.navigate".to_string(),
            timeout: Duration::from_secs(1),
        });
        assert_eq!(handle_error(&err), ErrorAction::Continue);
    }
}
