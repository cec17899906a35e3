//! The demo dashboard: two widgets, a live-bound display and a capture trigger

use crate::capture::SnapshotSource;
use crate::raster::Rasterizer;
use crate::trigger::{CaptureStatus, CaptureTrigger};
use crate::ui::{format_value, ButtonKind, Component};
use crate::{CaptureConfig, Error, Result};
use std::sync::{Arc, Mutex, MutexGuard};

pub const SLIDER_START: f64 = 0.0;
pub const SLIDER_END: f64 = 10.0;

/// Current widget values
#[derive(Debug, Clone, PartialEq)]
pub struct DemoState {
    pub value: f64,
    pub name: String,
}

impl Default for DemoState {
    fn default() -> Self {
        Self {
            value: 5.0,
            name: String::new(),
        }
    }
}

impl DemoState {
    /// Markdown for the display pane, recomputed from the widget values
    pub fn display(&self) -> String {
        format!("**{}**: {}", self.name, format_value(self.value))
    }
}

/// The demo application: shared widget state plus the "Run Report" trigger
#[derive(Clone)]
pub struct DemoApp {
    state: Arc<Mutex<DemoState>>,
    trigger: Arc<CaptureTrigger>,
}

impl DemoApp {
    pub fn new(config: CaptureConfig, rasterizer: Arc<dyn Rasterizer>) -> Self {
        let trigger = CaptureTrigger::new("Run Report", config, rasterizer).with_style(ButtonKind::Success, Some(200));
        Self {
            state: Arc::new(Mutex::new(DemoState::default())),
            trigger: Arc::new(trigger),
        }
    }

    pub fn config(&self) -> &CaptureConfig {
        self.trigger.config()
    }

    pub fn state(&self) -> DemoState {
        self.lock_state().clone()
    }

    pub fn status(&self) -> CaptureStatus {
        self.trigger.status()
    }

    pub fn set_value(&self, value: f64) -> Result<()> {
        if !value.is_finite() || !(SLIDER_START..=SLIDER_END).contains(&value) {
            return Err(Error::InvalidInput(format!(
                "value {} outside [{}, {}]",
                value, SLIDER_START, SLIDER_END
            )));
        }
        self.lock_state().value = value;
        Ok(())
    }

    pub fn set_name(&self, name: impl Into<String>) {
        self.lock_state().name = name.into();
    }

    /// The full layout with current values
    pub fn layout(&self) -> Component {
        build_layout(&self.state(), self.trigger.fragment())
    }

    /// A producer of the layout, so the capture sees the values (and the
    /// trigger status) at the moment it starts.
    pub fn snapshot_source(&self) -> SnapshotSource<Component> {
        let app = self.clone();
        SnapshotSource::builder(move || app.layout())
    }

    /// Handle a "Run Report" click from a blocking context.
    pub fn run_report(&self) -> CaptureStatus {
        self.trigger.activate(self.snapshot_source())
    }

    /// Handle a "Run Report" click from async code without stalling the executor.
    pub async fn run_report_async(&self) -> CaptureStatus {
        self.trigger.activate_async(self.snapshot_source()).await
    }

    fn lock_state(&self) -> MutexGuard<'_, DemoState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn build_layout(state: &DemoState, trigger: Component) -> Component {
    let params = Component::column(vec![
        "## Parameters".into(),
        Component::slider("Value", SLIDER_START, SLIDER_END, state.value),
        Component::text_input("Name", state.name.clone(), "Enter something..."),
        Component::markdown(state.display()),
    ]);

    Component::column(vec!["# Demo App".into(), params, Component::Divider, trigger])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::RasterOptions;
    use crate::ui::StandaloneHtml;
    use crate::AssetConfig;
    use std::path::Path;

    struct Unused;

    impl Rasterizer for Unused {
        fn rasterize(&self, _html: &Path, _out: &Path, _opts: &RasterOptions) -> Result<()> {
            Err(Error::Other("not rendering in this test".into()))
        }
    }

    fn app() -> DemoApp {
        DemoApp::new(CaptureConfig::default(), Arc::new(Unused))
    }

    #[test]
    fn display_is_bound_to_widgets() {
        let app = app();
        app.set_name("Ada");
        app.set_value(7.5).unwrap();
        assert_eq!(app.state().display(), "**Ada**: 7.5");

        let html = app.layout().to_standalone_html(&AssetConfig::default()).unwrap();
        assert!(html.contains("<strong>Ada</strong>: 7.5"));
        assert!(html.contains(r#"value="Ada""#));
        assert!(html.contains("Run Report"));
    }

    #[test]
    fn out_of_range_value_is_rejected() {
        let app = app();
        assert!(matches!(app.set_value(10.5), Err(Error::InvalidInput(_))));
        assert!(matches!(app.set_value(f64::NAN), Err(Error::InvalidInput(_))));
        assert_eq!(app.state().value, 5.0);
    }

    #[test]
    fn snapshot_source_reads_values_at_capture_time() {
        let app = app();
        let source = app.snapshot_source();
        app.set_value(2.0).unwrap();

        let html = source.resolve().to_standalone_html(&AssetConfig::default()).unwrap();
        assert!(html.contains("<b>2.0</b>"));
    }
}
