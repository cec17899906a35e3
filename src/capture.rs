//! The capture operation: UI snapshot in, absolute PNG path out

use crate::assets::rewrite_file;
use crate::raster::{rasterize_isolated, Rasterizer};
use crate::ui::{Component, StandaloneHtml};
use crate::{CaptureConfig, Error, Result};
use chrono::{DateTime, Local};
use log::{info, warn};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;

/// Give up disambiguating default filenames after this many attempts
const MAX_NAME_SUFFIX: u32 = 1000;

/// The UI tree to capture, either already built or built on demand
///
/// The builder form lets a layout capture itself: a button inside the tree
/// can trigger a capture of the tree that contains it, because the tree is
/// only materialized when the capture starts.
pub enum SnapshotSource<T = Component> {
    /// A tree that already exists
    Built(T),
    /// A zero-argument producer, invoked once at the start of the capture
    Builder(Box<dyn FnOnce() -> T + Send>),
}

impl<T> SnapshotSource<T> {
    pub fn built(tree: T) -> Self {
        SnapshotSource::Built(tree)
    }

    pub fn builder(f: impl FnOnce() -> T + Send + 'static) -> Self {
        SnapshotSource::Builder(Box::new(f))
    }

    /// Materialize the tree.
    pub fn resolve(self) -> T {
        match self {
            SnapshotSource::Built(tree) => tree,
            SnapshotSource::Builder(f) => f(),
        }
    }
}

impl From<Component> for SnapshotSource<Component> {
    fn from(tree: Component) -> Self {
        SnapshotSource::Built(tree)
    }
}

impl<T: fmt::Debug> fmt::Debug for SnapshotSource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotSource::Built(tree) => f.debug_tuple("Built").field(tree).finish(),
            SnapshotSource::Builder(_) => f.write_str("Builder(..)"),
        }
    }
}

/// `screenshot_YYYYMMDD_HHMMSS.png` for the given instant
pub fn default_filename(now: DateTime<Local>) -> String {
    format!("screenshot_{}.png", now.format("%Y%m%d_%H%M%S"))
}

/// Absolute output path inside `dir`, which must already exist.
///
/// An explicit filename is used as given (an existing file is overwritten).
/// A default name that is already taken gets a `_1`, `_2`, ... suffix.
fn resolve_output_path(dir: &Path, filename: Option<&str>) -> Result<PathBuf> {
    let dir = std::fs::canonicalize(dir)?;

    if let Some(name) = filename {
        if name.trim().is_empty() {
            return Err(Error::ConfigError("output filename must not be empty".into()));
        }
        return Ok(dir.join(name));
    }

    let name = default_filename(Local::now());
    let candidate = dir.join(&name);
    if !candidate.exists() {
        return Ok(candidate);
    }

    let stem = name.trim_end_matches(".png");
    for n in 1..=MAX_NAME_SUFFIX {
        let candidate = dir.join(format!("{}_{}.png", stem, n));
        if !candidate.exists() {
            return Ok(candidate);
        }
    }
    Err(Error::Other(format!("no free screenshot name left for {} in {}", name, dir.display())))
}

/// Capture `source` as a PNG in `config.save_dir` and return its absolute path.
///
/// The tree is serialized to a temporary HTML document in the output
/// directory, its relative asset links are rewritten to CDN URLs and the
/// document is rasterized on a dedicated worker thread. The temporary
/// document is removed on every exit path. This call blocks for the whole
/// capture; from async code use [`save_screenshot_async`].
pub fn save_screenshot<T, R>(
    source: impl Into<SnapshotSource<T>>,
    config: &CaptureConfig,
    filename: Option<&str>,
    rasterizer: &R,
) -> Result<PathBuf>
where
    T: StandaloneHtml,
    R: Rasterizer + ?Sized,
{
    config.validate()?;
    let target = source.into().resolve();

    std::fs::create_dir_all(&config.save_dir)?;
    let output_path = resolve_output_path(&config.save_dir, filename)?;

    let mut tmp_html = tempfile::Builder::new()
        .prefix("dashshot-")
        .suffix(".html")
        .tempfile_in(&config.save_dir)?;

    let result = render_document(&target, &mut tmp_html, config)
        .and_then(|()| rasterize_isolated(rasterizer, tmp_html.path(), &output_path, &config.raster_options()));

    let tmp_path = tmp_html.path().to_path_buf();
    if let Err(e) = tmp_html.close() {
        warn!("Failed to remove temporary document {}: {}", tmp_path.display(), e);
    }

    result?;
    info!("Screenshot saved to {}", output_path.display());
    Ok(output_path)
}

fn render_document<T: StandaloneHtml>(target: &T, tmp_html: &mut NamedTempFile, config: &CaptureConfig) -> Result<()> {
    {
        let mut out = std::io::BufWriter::new(tmp_html.as_file_mut());
        target.write_standalone(&mut out, &config.assets)?;
        out.flush()?;
    }
    rewrite_file(tmp_html.path(), &config.assets)?;

    let size = std::fs::metadata(tmp_html.path())?.len();
    info!("Saved HTML ({} bytes)", size);
    Ok(())
}

/// Run [`save_screenshot`] off the async executor.
///
/// The whole capture moves to tokio's blocking pool, so only the calling
/// task waits; the event loop keeps serving other work.
pub async fn save_screenshot_async<T, R>(
    source: SnapshotSource<T>,
    config: CaptureConfig,
    filename: Option<String>,
    rasterizer: Arc<R>,
) -> Result<PathBuf>
where
    T: StandaloneHtml + Send + 'static,
    R: Rasterizer + ?Sized + 'static,
{
    tokio::task::spawn_blocking(move || save_screenshot(source, &config, filename.as_deref(), &*rasterizer))
        .await
        .map_err(|e| {
            if e.is_panic() {
                Error::WorkerPanicked(crate::raster::panic_message(e.into_panic().as_ref()))
            } else {
                Error::Other(format!("Capture task canceled: {}", e))
            }
        })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn default_filename_format() {
        let t = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(default_filename(t), "screenshot_20240309_140507.png");
    }

    #[test]
    fn builder_is_resolved_once() {
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let c = calls.clone();
        let source = SnapshotSource::builder(move || {
            c.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Component::Divider
        });
        assert_eq!(source.resolve(), Component::Divider);
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn explicit_name_is_used_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let p = resolve_output_path(dir.path(), Some("out.png")).unwrap();
        assert!(p.is_absolute());
        assert_eq!(p.file_name().unwrap(), "out.png");
    }

    #[test]
    fn empty_name_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(resolve_output_path(dir.path(), Some("  ")), Err(Error::ConfigError(_))));
    }

    #[test]
    fn taken_default_name_gets_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let first = resolve_output_path(dir.path(), None).unwrap();
        std::fs::write(&first, b"x").unwrap();

        let second = resolve_output_path(dir.path(), None).unwrap();
        assert_ne!(first, second);
        let name = second.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("screenshot_") && name.ends_with(".png"));
    }
}
