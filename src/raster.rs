//! Rasterization of standalone documents, isolated on a worker thread
//!
//! Browser engines drive their own event loop on whichever thread invokes
//! them, so they must never run on a thread that is already driving one.
//! [`rasterize_isolated`] runs a [`Rasterizer`] on a fresh thread per
//! capture and hands its result back through the join.

use crate::{Error, Result, Viewport};
use log::debug;
use std::io::Write;
use std::path::Path;
use std::thread;

/// The eight-byte PNG file signature
pub const PNG_SIGNATURE: &[u8; 8] = b"\x89PNG\r\n\x1a\n";

/// Options passed to a rasterizer for one capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterOptions {
    /// Viewport the document is laid out in
    pub viewport: Viewport,
    /// Extra wait after the network went idle, in milliseconds
    pub settle_delay_ms: u64,
    /// Quiet window that counts as network idle, in milliseconds
    pub network_idle_ms: u64,
    /// Upper bound for navigation and the idle wait, in milliseconds
    pub timeout_ms: u64,
}

impl Default for RasterOptions {
    fn default() -> Self {
        crate::CaptureConfig::default().raster_options()
    }
}

/// Something that turns a local HTML document into a full-page PNG file
///
/// Implementations either write a complete PNG to `output_path` or leave it
/// untouched; [`write_png_atomically`] gives that guarantee for engines that
/// hand back the encoded bytes.
pub trait Rasterizer: Send + Sync {
    /// Load `html_path`, wait for it to settle and write a full-page PNG to `output_path`.
    fn rasterize(&self, html_path: &Path, output_path: &Path, opts: &RasterOptions) -> Result<()>;
}

impl<R: Rasterizer + ?Sized> Rasterizer for &R {
    fn rasterize(&self, html_path: &Path, output_path: &Path, opts: &RasterOptions) -> Result<()> {
        (**self).rasterize(html_path, output_path, opts)
    }
}

impl<R: Rasterizer + ?Sized> Rasterizer for Box<R> {
    fn rasterize(&self, html_path: &Path, output_path: &Path, opts: &RasterOptions) -> Result<()> {
        (**self).rasterize(html_path, output_path, opts)
    }
}

impl<R: Rasterizer + ?Sized> Rasterizer for std::sync::Arc<R> {
    fn rasterize(&self, html_path: &Path, output_path: &Path, opts: &RasterOptions) -> Result<()> {
        (**self).rasterize(html_path, output_path, opts)
    }
}

/// Run `rasterizer` on a dedicated thread and block until it finishes.
///
/// The worker's result is returned unchanged. A panic on the worker becomes
/// [`Error::WorkerPanicked`].
pub fn rasterize_isolated<R: Rasterizer + ?Sized>(
    rasterizer: &R,
    html_path: &Path,
    output_path: &Path,
    opts: &RasterOptions,
) -> Result<()> {
    thread::scope(|s| {
        let worker = thread::Builder::new()
            .name("dashshot-raster".to_string())
            .spawn_scoped(s, || rasterizer.rasterize(html_path, output_path, opts))?;

        debug!("Rasterizing {} on worker thread", html_path.display());

        // The join is the only synchronization: the slot is read after the worker is gone.
        match worker.join() {
            Ok(result) => result,
            Err(payload) => Err(Error::WorkerPanicked(panic_message(payload.as_ref()))),
        }
    })
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Whether `bytes` start with the PNG signature
pub fn is_png(bytes: &[u8]) -> bool {
    bytes.len() > PNG_SIGNATURE.len() && bytes.starts_with(PNG_SIGNATURE)
}

/// Write `bytes` to `output_path` so that either the whole image or nothing lands there.
///
/// The bytes go to a sibling temporary file first, which is renamed over
/// the target once fully written. On error the temporary file is removed.
pub fn write_png_atomically(output_path: &Path, bytes: &[u8]) -> Result<()> {
    if !is_png(bytes) {
        return Err(Error::RenderError("engine returned data that is not a PNG image".into()));
    }
    let dir = match output_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::Builder::new().prefix(".dashshot-").suffix(".png.part").tempfile_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(output_path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}
