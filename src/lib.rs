//! Dashboard screenshot capture
//!
//! Captures the current state of a dashboard (widget values and styling
//! included) as a PNG file. The dashboard's UI tree is serialized to a
//! self-contained HTML document, relative asset links are rewritten to CDN
//! URLs, and the document is rasterized by a headless browser on a dedicated
//! worker thread.
//!
//! # Features
//!
//! - **CDP Backend** (default): rasterizes with headless Chrome via the
//!   Chrome DevTools Protocol
//! - **Pluggable rasterizers**: anything implementing [`Rasterizer`] can
//!   stand in for the browser
//! - **Event-loop friendly**: [`save_screenshot_async`] offloads the whole
//!   capture so async hosts stay responsive
//!
//! # Example
//!
//! ```no_run
//! use dashshot::{CaptureConfig, Component};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let app = Component::column(vec!["# My App".into(), Component::slider("Value", 0.0, 10.0, 5.0)]);
//!
//! let rasterizer = dashshot::default_rasterizer();
//! let path = dashshot::save_screenshot(app, &CaptureConfig::default(), None, &rasterizer)?;
//! println!("Saved: {}", path.display());
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod error;
pub use error::{Error, Result};

pub mod assets;
pub mod capture;
pub mod demo;
pub mod raster;
pub mod trigger;
pub mod ui;

// Chrome DevTools Protocol rasterizer
#[cfg(feature = "cdp")]
pub mod cdp;

pub use assets::{rewrite_static_paths, AssetConfig};
pub use capture::{default_filename, save_screenshot, save_screenshot_async, SnapshotSource};
pub use raster::{rasterize_isolated, RasterOptions, Rasterizer};
pub use trigger::{CaptureStatus, CaptureTrigger};
pub use ui::{ButtonKind, Component, StandaloneHtml};

#[cfg(feature = "cdp")]
pub use cdp::CdpRasterizer;

/// Configuration for a capture
///
/// The defaults reproduce the standard capture: a `screenshots` directory,
/// a 1280x720 viewport and a two second settle delay after the network goes
/// idle. Every field can be overridden from a JSON file; missing fields keep
/// their defaults.
///
/// # Examples
///
/// ```
/// let cfg = dashshot::CaptureConfig::default();
/// assert_eq!(cfg.settle_delay_ms, 2000);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Directory screenshots (and the transient HTML document) are written to
    pub save_dir: PathBuf,
    /// Viewport dimensions used by the rasterizer
    pub viewport: Viewport,
    /// Extra wait after the network went idle, in milliseconds
    pub settle_delay_ms: u64,
    /// How long the network must stay quiet to count as idle, in milliseconds
    pub network_idle_ms: u64,
    /// Upper bound for navigation and the idle wait, in milliseconds
    pub timeout_ms: u64,
    /// Where relative framework assets are resolved from
    pub assets: AssetConfig,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            save_dir: PathBuf::from("screenshots"),
            viewport: Viewport::default(),
            settle_delay_ms: 2000,
            network_idle_ms: 500,
            timeout_ms: 30000,
            assets: AssetConfig::default(),
        }
    }
}

impl CaptureConfig {
    /// Load a config from a JSON file, keeping defaults for absent fields.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let cfg: CaptureConfig = serde_json::from_str(&raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values no capture could succeed with.
    pub fn validate(&self) -> Result<()> {
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(Error::ConfigError(format!(
                "viewport must be non-empty, got {}x{}",
                self.viewport.width, self.viewport.height
            )));
        }
        if self.assets.cdn_base.trim().is_empty() {
            return Err(Error::ConfigError("assets.cdn_base must not be empty".into()));
        }
        if self.assets.version.trim().is_empty() {
            return Err(Error::ConfigError("assets.version must not be empty".into()));
        }
        Ok(())
    }

    /// Rasterizer options derived from this config
    pub fn raster_options(&self) -> RasterOptions {
        RasterOptions {
            viewport: self.viewport,
            settle_delay_ms: self.settle_delay_ms,
            network_idle_ms: self.network_idle_ms,
            timeout_ms: self.timeout_ms,
        }
    }
}

/// Viewport dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// Create the default rasterizer for this build
///
/// This is the headless Chrome rasterizer when the `cdp` feature is enabled
/// (default).
#[cfg(feature = "cdp")]
pub fn default_rasterizer() -> CdpRasterizer {
    CdpRasterizer::new()
}
