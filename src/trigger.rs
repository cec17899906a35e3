//! A capture button with a status line, ready to embed in a layout

use crate::capture::{save_screenshot, save_screenshot_async, SnapshotSource};
use crate::raster::Rasterizer;
use crate::ui::{ButtonKind, Component};
use crate::CaptureConfig;
use log::{error, info};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

/// Outcome of the most recent capture started from a trigger
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum CaptureStatus {
    /// Nothing captured yet
    Idle,
    /// A capture is running
    InProgress,
    /// The last capture wrote this file
    Success(PathBuf),
    /// The last capture failed with this message
    Failure(String),
}

impl CaptureStatus {
    /// Text shown in the status indicator
    pub fn message(&self) -> String {
        match self {
            CaptureStatus::Idle => String::new(),
            CaptureStatus::InProgress => "Capturing screenshot...".to_string(),
            CaptureStatus::Success(path) => format!("Saved: {}", path.display()),
            CaptureStatus::Failure(err) => format!("Screenshot failed: {}", err),
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, CaptureStatus::Success(_) | CaptureStatus::Failure(_))
    }
}

/// Button plus status indicator that captures a layout when activated
///
/// Activation never propagates an error: failures end up in the status
/// indicator instead. The status is shared, so the host can render the
/// fragment while a capture is still running.
pub struct CaptureTrigger {
    label: String,
    kind: ButtonKind,
    width: Option<u32>,
    config: CaptureConfig,
    rasterizer: Arc<dyn Rasterizer>,
    status: Arc<Mutex<CaptureStatus>>,
}

impl CaptureTrigger {
    pub fn new(label: impl Into<String>, config: CaptureConfig, rasterizer: Arc<dyn Rasterizer>) -> Self {
        Self {
            label: label.into(),
            kind: ButtonKind::Primary,
            width: None,
            config,
            rasterizer,
            status: Arc::new(Mutex::new(CaptureStatus::Idle)),
        }
    }

    pub fn with_style(mut self, kind: ButtonKind, width: Option<u32>) -> Self {
        self.kind = kind;
        self.width = width;
        self
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn status(&self) -> CaptureStatus {
        self.lock_status().clone()
    }

    /// The trigger as a layout fragment: the button followed by the status line
    pub fn fragment(&self) -> Component {
        Component::row(vec![
            Component::button(self.label.clone(), self.kind, self.width),
            Component::Status(self.status().message()),
        ])
    }

    /// Capture `source`, blocking the caller until the capture finishes.
    pub fn activate(&self, source: impl Into<SnapshotSource<Component>>) -> CaptureStatus {
        self.set_status(CaptureStatus::InProgress);
        let outcome = save_screenshot(source, &self.config, None, &*self.rasterizer);
        self.finish(outcome)
    }

    /// Capture `source` on the blocking pool; only the calling task waits.
    pub async fn activate_async(&self, source: SnapshotSource<Component>) -> CaptureStatus {
        self.set_status(CaptureStatus::InProgress);
        let outcome = save_screenshot_async(source, self.config.clone(), None, self.rasterizer.clone()).await;
        self.finish(outcome)
    }

    fn finish(&self, outcome: crate::Result<PathBuf>) -> CaptureStatus {
        let status = match outcome {
            Ok(path) => {
                info!("Screenshot saved to {}", path.display());
                CaptureStatus::Success(path)
            }
            Err(e) => {
                error!("Screenshot failed: {}", e);
                CaptureStatus::Failure(e.to_string())
            }
        };
        self.set_status(status.clone());
        status
    }

    fn set_status(&self, status: CaptureStatus) {
        *self.lock_status() = status;
    }

    fn lock_status(&self) -> MutexGuard<'_, CaptureStatus> {
        // A poisoned status is still a valid status
        self.status.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::{write_png_atomically, RasterOptions, PNG_SIGNATURE};
    use crate::Error;
    use std::path::Path;

    struct FakePng;

    impl Rasterizer for FakePng {
        fn rasterize(&self, _html: &Path, out: &Path, _opts: &RasterOptions) -> crate::Result<()> {
            let mut png = PNG_SIGNATURE.to_vec();
            png.extend_from_slice(&[0; 16]);
            write_png_atomically(out, &png)
        }
    }

    struct Broken;

    impl Rasterizer for Broken {
        fn rasterize(&self, _html: &Path, _out: &Path, _opts: &RasterOptions) -> crate::Result<()> {
            Err(Error::InitializationError("no browser".into()))
        }
    }

    fn config_in(dir: &Path) -> CaptureConfig {
        CaptureConfig {
            save_dir: dir.to_path_buf(),
            ..Default::default()
        }
    }

    #[test]
    fn starts_idle_with_empty_status_line() {
        let dir = tempfile::tempdir().unwrap();
        let t = CaptureTrigger::new("Capture", config_in(dir.path()), Arc::new(FakePng));
        assert_eq!(t.status(), CaptureStatus::Idle);
        match t.fragment() {
            Component::Row(children) => {
                assert_eq!(children[0], Component::button("Capture", ButtonKind::Primary, None));
                assert_eq!(children[1], Component::Status(String::new()));
            }
            other => panic!("unexpected fragment {:?}", other),
        }
    }

    #[test]
    fn success_records_path() {
        let dir = tempfile::tempdir().unwrap();
        let t = CaptureTrigger::new("Capture", config_in(dir.path()), Arc::new(FakePng));
        let status = t.activate(Component::markdown("Hello"));
        match &status {
            CaptureStatus::Success(path) => assert!(path.exists()),
            other => panic!("expected success, got {:?}", other),
        }
        assert!(t.status().is_finished());
        assert!(t.status().message().starts_with("Saved: "));
    }

    #[test]
    fn failure_is_caught_into_status() {
        let dir = tempfile::tempdir().unwrap();
        let t = CaptureTrigger::new("Capture", config_in(dir.path()), Arc::new(Broken));
        let status = t.activate(Component::markdown("Hello"));
        assert_eq!(
            status,
            CaptureStatus::Failure("Engine initialization failed: no browser".into())
        );
        assert_eq!(t.status().message(), "Screenshot failed: Engine initialization failed: no browser");
    }

    #[test]
    fn builder_sees_in_progress_status() {
        let dir = tempfile::tempdir().unwrap();
        let t = Arc::new(CaptureTrigger::new("Capture", config_in(dir.path()), Arc::new(FakePng)));
        let seen = Arc::new(Mutex::new(None));

        let (t2, seen2) = (t.clone(), seen.clone());
        t.activate(SnapshotSource::builder(move || {
            *seen2.lock().unwrap() = Some(t2.status());
            t2.fragment()
        }));

        assert_eq!(*seen.lock().unwrap(), Some(CaptureStatus::InProgress));
    }

    #[tokio::test]
    async fn async_activation_reaches_success() {
        let dir = tempfile::tempdir().unwrap();
        let t = CaptureTrigger::new("Capture", config_in(dir.path()), Arc::new(FakePng));
        let status = t.activate_async(SnapshotSource::built(Component::Divider)).await;
        assert!(matches!(status, CaptureStatus::Success(_)));
    }

    #[test]
    fn status_serializes_tagged() {
        let json = serde_json::to_string(&CaptureStatus::Failure("boom".into())).unwrap();
        assert_eq!(json, r#"{"state":"failure","detail":"boom"}"#);
        let json = serde_json::to_string(&CaptureStatus::Idle).unwrap();
        assert_eq!(json, r#"{"state":"idle"}"#);
    }
}
