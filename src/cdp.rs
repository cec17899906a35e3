//! Chrome DevTools Protocol rasterizer
//!
//! Launches a headless Chrome per capture, loads the document from a
//! `file://` URL, waits for the network to go quiet plus a settle delay and
//! captures the full page as PNG.

use crate::raster::{write_png_atomically, RasterOptions, Rasterizer};
use crate::{Error, Result};
use headless_chrome::browser::tab::{ResponseHandler, Tab};
use headless_chrome::protocol::cdp::types::Event;
use headless_chrome::protocol::cdp::Page;
use headless_chrome::{Browser, LaunchOptions};
use log::{debug, warn};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use url::Url;

const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(100);

const DOCUMENT_COMPLETE_JS: &str = "document.readyState === 'complete'";

const PAGE_SIZE_JS: &str = r#"JSON.stringify({
    width: Math.max(document.documentElement.scrollWidth, document.body ? document.body.scrollWidth : 0),
    height: Math.max(document.documentElement.scrollHeight, document.body ? document.body.scrollHeight : 0)
})"#;

/// Requests the page has started but not yet finished or failed
#[derive(Debug)]
struct InFlight {
    pending: HashSet<String>,
    last_activity: Instant,
}

impl InFlight {
    fn new(now: Instant) -> Self {
        Self {
            pending: HashSet::new(),
            last_activity: now,
        }
    }

    // Redirects reuse the request id, so a repeated start is still one request.
    fn started(&mut self, request_id: &str, now: Instant) {
        self.pending.insert(request_id.to_string());
        self.last_activity = now;
    }

    fn settled(&mut self, request_id: &str, now: Instant) {
        if self.pending.remove(request_id) {
            self.last_activity = now;
        }
    }

    fn outstanding(&self) -> usize {
        self.pending.len()
    }

    /// How long nothing has been outstanding, if nothing is
    fn idle_for(&self, now: Instant) -> Option<Duration> {
        if self.pending.is_empty() {
            Some(now.saturating_duration_since(self.last_activity))
        } else {
            None
        }
    }
}

#[derive(Debug, Deserialize)]
struct PageSize {
    width: f64,
    height: f64,
}

/// Headless Chrome rasterizer (uses the `headless_chrome` crate)
///
/// Each call to [`Rasterizer::rasterize`] launches its own browser process
/// and tears it down before returning.
#[derive(Debug, Clone)]
pub struct CdpRasterizer {
    chrome_path: Option<PathBuf>,
    sandbox: bool,
}

impl Default for CdpRasterizer {
    fn default() -> Self {
        Self::new()
    }
}

impl CdpRasterizer {
    pub fn new() -> Self {
        Self {
            chrome_path: None,
            sandbox: true,
        }
    }

    /// Use a specific Chrome/Chromium binary instead of auto-detection
    pub fn with_chrome_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.chrome_path = Some(path.into());
        self
    }

    /// Disable the Chrome sandbox (needed when running as root in containers)
    pub fn with_sandbox(mut self, sandbox: bool) -> Self {
        self.sandbox = sandbox;
        self
    }

    fn launch(&self, opts: &RasterOptions) -> Result<Browser> {
        let launch_options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(self.sandbox)
            .path(self.chrome_path.clone())
            .window_size(Some((opts.viewport.width, opts.viewport.height)))
            .build()
            .map_err(|e| Error::InitializationError(format!("Failed to build launch options: {}", e)))?;

        Browser::new(launch_options).map_err(|e| Error::InitializationError(format!("Failed to launch browser: {}", e)))
    }
}

impl Rasterizer for CdpRasterizer {
    fn rasterize(&self, html_path: &Path, output_path: &Path, opts: &RasterOptions) -> Result<()> {
        let url = file_url(html_path)?;
        let browser = self.launch(opts)?;

        let tab = browser
            .new_tab()
            .map_err(|e| Error::InitializationError(format!("Failed to create tab: {}", e)))?;
        tab.set_default_timeout(Duration::from_millis(opts.timeout_ms));

        let in_flight = track_requests(&tab)?;

        debug!("Loading {}", url);
        tab.navigate_to(url.as_str())
            .map_err(|e| Error::LoadError(format!("Navigation failed: {}", e)))?;
        tab.wait_until_navigated()
            .map_err(|e| Error::LoadError(format!("Wait for navigation failed: {}", e)))?;

        wait_for_network_idle(&tab, &in_flight, opts)?;
        std::thread::sleep(Duration::from_millis(opts.settle_delay_ms));

        let png = capture_full_page(&tab, opts)?;
        write_png_atomically(output_path, &png)?;

        drop(tab);
        drop(browser);
        Ok(())
    }
}

fn file_url(html_path: &Path) -> Result<Url> {
    let absolute = std::fs::canonicalize(html_path)?;
    Url::from_file_path(&absolute)
        .map_err(|()| Error::LoadError(format!("Cannot express {} as a file URL", absolute.display())))
}

fn evaluate_json<T: serde::de::DeserializeOwned>(tab: &Tab, script: &str) -> Result<T> {
    let remote = tab
        .evaluate(script, false)
        .map_err(|e| Error::RenderError(format!("Evaluation failed: {}", e)))?;
    let raw = match remote.value {
        Some(serde_json::Value::String(s)) => s,
        Some(other) => other.to_string(),
        None => return Err(Error::RenderError("No value returned from evaluation".into())),
    };
    serde_json::from_str(&raw).map_err(|e| Error::RenderError(format!("Unexpected evaluation result '{}': {}", raw, e)))
}

/// Follow the page's requests through CDP Network events.
///
/// Must be called before navigating so the document's own requests count.
fn track_requests(tab: &Tab) -> Result<Arc<Mutex<InFlight>>> {
    // Registering a response handler is what enables the Network domain.
    let noop: ResponseHandler = Box::new(|_params, _fetch_body| {});
    tab.register_response_handling("dashshot-network-idle", noop)
        .map_err(|e| Error::InitializationError(format!("Failed to enable network events: {}", e)))?;

    let in_flight = Arc::new(Mutex::new(InFlight::new(Instant::now())));
    let tracker = in_flight.clone();
    tab.add_event_listener(Arc::new(move |event: &Event| {
        let mut state = tracker.lock().unwrap_or_else(|e| e.into_inner());
        match event {
            Event::NetworkRequestWillBeSent(e) => state.started(&e.params.request_id, Instant::now()),
            Event::NetworkLoadingFinished(e) => state.settled(&e.params.request_id, Instant::now()),
            Event::NetworkLoadingFailed(e) => state.settled(&e.params.request_id, Instant::now()),
            _ => {}
        }
    }))
    .map_err(|e| Error::InitializationError(format!("Failed to listen for network events: {}", e)))?;

    Ok(in_flight)
}

/// Block until the document is complete and no request has been outstanding
/// for `network_idle_ms`. Gives up (with a warning) after `timeout_ms`.
fn wait_for_network_idle(tab: &Tab, in_flight: &Mutex<InFlight>, opts: &RasterOptions) -> Result<()> {
    let started = Instant::now();
    let deadline = started + Duration::from_millis(opts.timeout_ms);
    let quiet_window = Duration::from_millis(opts.network_idle_ms);

    loop {
        let complete: bool = evaluate_json(tab, DOCUMENT_COMPLETE_JS)?;
        let now = Instant::now();

        let (idle, outstanding) = {
            let state = in_flight.lock().unwrap_or_else(|e| e.into_inner());
            (state.idle_for(now), state.outstanding())
        };
        if complete && idle.map_or(false, |quiet| quiet >= quiet_window) {
            debug!("Network idle after {:?}", now.duration_since(started));
            return Ok(());
        }

        if now >= deadline {
            warn!(
                "Network did not go idle within {}ms ({} request(s) outstanding); capturing anyway",
                opts.timeout_ms, outstanding
            );
            return Ok(());
        }
        std::thread::sleep(IDLE_POLL_INTERVAL);
    }
}

fn capture_full_page(tab: &Tab, opts: &RasterOptions) -> Result<Vec<u8>> {
    let size: PageSize = evaluate_json(tab, PAGE_SIZE_JS)?;
    let clip = Page::Viewport {
        x: 0.0,
        y: 0.0,
        width: size.width.max(opts.viewport.width as f64),
        height: size.height.max(opts.viewport.height as f64),
        scale: 1.0,
    };
    debug!("Capturing {}x{} page", clip.width, clip.height);

    tab.capture_screenshot(Page::CaptureScreenshotFormatOption::Png, None, Some(clip), true)
        .map_err(|e| Error::RenderError(format!("Screenshot failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_url_is_absolute() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.html");
        std::fs::write(&path, "<html></html>").unwrap();

        let url = file_url(&path).unwrap();
        assert_eq!(url.scheme(), "file");
        assert!(url.path().ends_with("/page.html"));
    }

    #[test]
    fn file_url_of_missing_file_fails() {
        assert!(matches!(file_url(Path::new("/definitely/not/here.html")), Err(Error::Io(_))));
    }

    #[test]
    fn pending_request_blocks_idle() {
        let t0 = Instant::now();
        let mut state = InFlight::new(t0);
        state.started("font-1", t0);

        // However long it stays pending, the network is not idle.
        assert_eq!(state.idle_for(t0 + Duration::from_secs(3)), None);
        assert_eq!(state.outstanding(), 1);

        state.settled("font-1", t0 + Duration::from_secs(3));
        assert_eq!(state.idle_for(t0 + Duration::from_secs(3)), Some(Duration::ZERO));
        assert_eq!(
            state.idle_for(t0 + Duration::from_millis(3500)),
            Some(Duration::from_millis(500))
        );
    }

    #[test]
    fn failed_request_counts_as_settled() {
        let t0 = Instant::now();
        let mut state = InFlight::new(t0);
        state.started("xhr", t0);
        state.settled("xhr", t0 + Duration::from_millis(10));
        assert_eq!(state.outstanding(), 0);
    }

    #[test]
    fn redirect_reusing_id_is_one_request() {
        let t0 = Instant::now();
        let mut state = InFlight::new(t0);
        state.started("doc", t0);
        state.started("doc", t0 + Duration::from_millis(5));
        assert_eq!(state.outstanding(), 1);
        state.settled("doc", t0 + Duration::from_millis(20));
        assert!(state.idle_for(t0 + Duration::from_millis(20)).is_some());
    }

    #[test]
    fn unknown_completion_does_not_reset_quiet_window() {
        let t0 = Instant::now();
        let mut state = InFlight::new(t0);
        state.settled("never-started", t0 + Duration::from_secs(1));
        assert_eq!(state.idle_for(t0 + Duration::from_secs(1)), Some(Duration::from_secs(1)));
    }

    #[test]
    fn launch_failure_is_initialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let html = dir.path().join("page.html");
        std::fs::write(&html, "<html></html>").unwrap();

        let r = CdpRasterizer::new().with_chrome_path(dir.path().join("no-such-chrome"));
        let err = r.rasterize(&html, &dir.path().join("out.png"), &RasterOptions::default()).unwrap_err();
        assert!(matches!(err, Error::InitializationError(_)), "unexpected error: {:?}", err);
        assert!(!dir.path().join("out.png").exists());
    }

    #[test]
    fn page_size_parses() {
        let size: PageSize = serde_json::from_str(r#"{"width":1280,"height":2400}"#).unwrap();
        assert_eq!(size.height, 2400.0);
    }

    #[test]
    fn test_cdp_rasterize_blank_page() {
        // This test requires Chrome to be installed, so we skip it in CI
        if std::env::var("CI").is_ok() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let html = dir.path().join("blank.html");
        let out = dir.path().join("blank.png");
        std::fs::write(&html, "<!DOCTYPE html><html><body><p>blank</p></body></html>").unwrap();

        let opts = RasterOptions {
            settle_delay_ms: 0,
            ..Default::default()
        };
        if let Err(e) = CdpRasterizer::new().rasterize(&html, &out, &opts) {
            eprintln!("Skipping CDP rasterize test because Chrome is not available or failed to launch: {}", e);
            return;
        }
        let bytes = std::fs::read(&out).unwrap();
        assert!(crate::raster::is_png(&bytes));
    }
}
