//! C2 — Kitty graphics protocol emitter: base64/SHM image transmission,
//! placement/Z-index layering, and image-id lifecycle.

pub mod shm;

use std::io::Write;
use std::sync::atomic::{AtomicU32, Ordering};

use base64::Engine as _;
use tracing::debug;

use crate::error::KittyError;
use shm::ShmBuffer;

const CHUNK_SIZE: usize = 4096;

/// Terminals known to reject the SHM fast path; checked against
/// `TERM_PROGRAM`. Adding a new exclusion is a one-line change here.
const EXCLUDED_TERM_PROGRAMS: &[&str] = &["ghostty"];

pub fn shm_supported() -> bool {
    match std::env::var("TERM_PROGRAM") {
        Ok(program) => !EXCLUDED_TERM_PROGRAMS
            .iter()
            .any(|excluded| program.eq_ignore_ascii_case(excluded)),
        Err(_) => true,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Content,
    Cursor,
    Toolbar,
}

impl Layer {
    pub const fn placement(self) -> u32 {
        match self {
            Layer::Content => 1,
            Layer::Cursor => 2,
            Layer::Toolbar => 3,
        }
    }

    pub const fn z(self) -> i32 {
        match self {
            Layer::Content => 0,
            Layer::Cursor => 10,
            Layer::Toolbar => 20,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DisplayOptions {
    pub rows: u32,
    pub columns: u32,
    pub layer: Layer,
    pub x_offset: u32,
    pub y_offset: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    JpegRgba,
}

impl ImageFormat {
    fn format_code(self) -> u8 {
        match self {
            // Kitty `f=` control: 100 = PNG (auto-decoded), 32 = raw RGBA.
            ImageFormat::Png => 100,
            ImageFormat::JpegRgba => 32,
        }
    }
}

static NEXT_IMAGE_ID: AtomicU32 = AtomicU32::new(1);

fn next_image_id() -> u32 {
    NEXT_IMAGE_ID.fetch_add(1, Ordering::SeqCst)
}

/// Tracks the live image id per layer so a new display can delete the
/// previous one in the same flush, keeping terminal-side memory bounded.
#[derive(Debug, Default)]
pub struct ImageLifecycle {
    content: Option<u32>,
    cursor: Option<u32>,
    toolbar: Option<u32>,
}

impl ImageLifecycle {
    fn slot(&mut self, layer: Layer) -> &mut Option<u32> {
        match layer {
            Layer::Content => &mut self.content,
            Layer::Cursor => &mut self.cursor,
            Layer::Toolbar => &mut self.toolbar,
        }
    }

    pub fn live_content_id(&self) -> Option<u32> {
        self.content
    }

    pub fn live_cursor_id(&self) -> Option<u32> {
        self.cursor
    }
}

pub struct Emitter<W: Write> {
    out: W,
    lifecycle: ImageLifecycle,
}

impl<W: Write> Emitter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            lifecycle: ImageLifecycle::default(),
        }
    }

    pub fn lifecycle(&self) -> &ImageLifecycle {
        &self.lifecycle
    }

    /// Displays a PNG image via base64 transmission, chunked at 4 KiB, then
    /// deletes the previously displayed image in the same layer.
    pub fn display_base64_png(&mut self, data: &[u8], opts: DisplayOptions) -> Result<u32, KittyError> {
        self.display_base64(data, ImageFormat::Png, opts)
    }

    pub fn display_base64_image(&mut self, rgba: &[u8], opts: DisplayOptions) -> Result<u32, KittyError> {
        self.display_base64(rgba, ImageFormat::JpegRgba, opts)
    }

    fn display_base64(
        &mut self,
        data: &[u8],
        format: ImageFormat,
        opts: DisplayOptions,
    ) -> Result<u32, KittyError> {
        let id = next_image_id();
        let encoded = base64::engine::general_purpose::STANDARD.encode(data);
        self.transmit_base64_chunked(id, format, &encoded, opts)?;
        self.flush_and_recycle(id, opts.layer)
    }

    fn transmit_base64_chunked(
        &mut self,
        id: u32,
        format: ImageFormat,
        encoded: &str,
        opts: DisplayOptions,
    ) -> Result<(), KittyError> {
        let bytes = encoded.as_bytes();
        let mut offset = 0;
        while offset < bytes.len() {
            let end = (offset + CHUNK_SIZE).min(bytes.len());
            let more = if end < bytes.len() { 1 } else { 0 };
            let chunk = &bytes[offset..end];
            if offset == 0 {
                write!(
                    self.out,
                    "\x1b_Ga=T,f={},i={},q=2,m={};{}\x1b\\",
                    format.format_code(),
                    id,
                    more,
                    std::str::from_utf8(chunk).unwrap_or_default()
                )?;
            } else {
                write!(
                    self.out,
                    "\x1b_Gm={};{}\x1b\\",
                    more,
                    std::str::from_utf8(chunk).unwrap_or_default()
                )?;
            }
            offset = end;
        }
        self.put_placement(id, opts)
    }

    /// SHM fast path: writes the decoded RGBA directly into a named shared
    /// memory segment and references it by name (`t=s`) instead of
    /// transmitting bytes over the tty.
    pub fn display_via_shm(
        &mut self,
        rgba: &[u8],
        width: u32,
        height: u32,
        opts: DisplayOptions,
    ) -> Result<u32, KittyError> {
        let id = next_image_id();
        let mut shm = ShmBuffer::create(width, height).map_err(|e| {
            KittyError::Write(std::io::Error::other(e.to_string()))
        })?;
        shm.write(rgba);

        write!(
            self.out,
            "\x1b_Ga=T,t=s,f=32,s={width},v={height},i={id},q=2;{}\x1b\\",
            base64::engine::general_purpose::STANDARD.encode(shm.name().as_bytes())
        )?;
        self.put_placement(id, opts)?;
        self.flush_and_recycle(id, opts.layer)
    }

    fn put_placement(&mut self, id: u32, opts: DisplayOptions) -> Result<(), KittyError> {
        write!(
            self.out,
            "\x1b_Ga=p,i={id},p={},z={},c={},r={},X={},Y={},q=2\x1b\\",
            opts.layer.placement(),
            opts.layer.z(),
            opts.columns,
            opts.rows,
            opts.x_offset,
            opts.y_offset,
        )?;
        Ok(())
    }

    fn flush_and_recycle(&mut self, new_id: u32, layer: Layer) -> Result<u32, KittyError> {
        self.out.flush()?;
        let slot = self.lifecycle.slot(layer);
        let previous = slot.replace(new_id);
        if let Some(previous_id) = previous
            && previous_id != new_id
        {
            self.delete_image(previous_id)?;
        }
        Ok(new_id)
    }

    pub fn delete_image(&mut self, id: u32) -> Result<(), KittyError> {
        write!(self.out, "\x1b_Ga=d,d=i,i={id},q=2\x1b\\")?;
        self.out.flush()?;
        debug!(id, "deleted kitty image");
        Ok(())
    }

    pub fn clear_all(&mut self) -> Result<(), KittyError> {
        write!(self.out, "\x1b_Ga=d,d=A,q=2\x1b\\")?;
        self.out.flush()?;
        self.lifecycle = ImageLifecycle::default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_placement_and_z_match_the_fixed_table() {
        assert_eq!((Layer::Content.placement(), Layer::Content.z()), (1, 0));
        assert_eq!((Layer::Cursor.placement(), Layer::Cursor.z()), (2, 10));
        assert_eq!((Layer::Toolbar.placement(), Layer::Toolbar.z()), (3, 20));
    }

    #[test]
    fn display_replaces_previous_content_image() {
        let mut buf = Vec::new();
        let mut emitter = Emitter::new(&mut buf);
        let opts = DisplayOptions {
            rows: 10,
            columns: 20,
            layer: Layer::Content,
            x_offset: 0,
            y_offset: 0,
        };
        let first = emitter.display_base64_png(&[1, 2, 3], opts).unwrap();
        let second = emitter.display_base64_png(&[4, 5, 6], opts).unwrap();
        assert_ne!(first, second);
        assert_eq!(emitter.lifecycle().live_content_id(), Some(second));

        let text = String::from_utf8_lossy(&buf);
        // The delete command for the first id must appear after the second
        // transmit — proving the old content image was recycled.
        let second_transmit = format!("i={second}");
        let delete_first = format!("a=d,d=i,i={first}");
        assert!(text.find(&second_transmit) < text.find(&delete_first));
    }

    #[test]
    fn chunking_splits_large_payloads_at_4kib() {
        let mut buf = Vec::new();
        let mut emitter = Emitter::new(&mut buf);
        let opts = DisplayOptions {
            rows: 1,
            columns: 1,
            layer: Layer::Toolbar,
            x_offset: 0,
            y_offset: 0,
        };
        let large = vec![0xffu8; 10_000];
        emitter.display_base64_png(&large, opts).unwrap();
        let text = String::from_utf8_lossy(&buf);
        assert!(text.matches("m=1;").count() >= 1, "expected at least one continuation chunk");
        assert!(text.contains("m=0;"), "expected a terminating chunk");
    }

    #[test]
    fn apc_sequences_do_not_corrupt_surrounding_text() {
        // Feeds a kitty transmit+placement sequence sandwiched between plain
        // text through a real terminal-state parser, confirming the APC
        // bytes are consumed as a control sequence rather than printed as
        // literal characters onto the grid.
        let mut buf = Vec::new();
        write!(buf, "before").unwrap();
        let mut emitter = Emitter::new(&mut buf);
        let opts = DisplayOptions {
            rows: 2,
            columns: 4,
            layer: Layer::Content,
            x_offset: 0,
            y_offset: 0,
        };
        emitter.display_base64_png(&[1, 2, 3, 4, 5], opts).unwrap();
        write!(emitter.out, "after").unwrap();

        let mut parser = vt100::Parser::new(24, 80, 0);
        parser.process(&buf);
        let screen = parser.screen();
        let mut row0 = String::new();
        for col in 0..11 {
            row0.push_str(screen.cell(0, col).map(|c| c.contents()).unwrap_or_default().as_str());
        }
        assert_eq!(row0, "beforeafter");
    }

    #[test]
    #[serial_test::serial]
    fn excluded_term_programs_disable_shm() {
        unsafe { std::env::set_var("TERM_PROGRAM", "ghostty") };
        assert!(!shm_supported());
        unsafe { std::env::set_var("TERM_PROGRAM", "kitty") };
        assert!(shm_supported());
        unsafe { std::env::remove_var("TERM_PROGRAM") };
    }
}
