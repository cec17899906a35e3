//! Capture the demo dashboard with headless Chrome, the way the "Run Report"
//! button does, and watch the status indicator until it settles.

use dashshot::demo::DemoApp;
use dashshot::{CaptureConfig, CdpRasterizer, Component};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("dashshot - capture demo\n");

    let config = CaptureConfig {
        save_dir: "screenshots".into(),
        settle_delay_ms: 500,
        ..Default::default()
    };
    println!("Capture config:");
    println!("  Output dir: {}", config.save_dir.display());
    println!("  Viewport: {}x{}", config.viewport.width, config.viewport.height);
    println!("  Settle delay: {}ms\n", config.settle_delay_ms);

    let sandbox = std::env::var("DASHSHOT_NO_SANDBOX").is_err();
    let rasterizer = Arc::new(CdpRasterizer::new().with_sandbox(sandbox));

    // One-off capture of a hand-built layout
    println!("Capturing a static layout...");
    let layout = Component::column(vec!["# Hello".into(), Component::markdown("Rendered by **dashshot**.")]);
    let path = dashshot::save_screenshot(layout, &config, Some("hello.png"), &*rasterizer)?;
    println!("Saved: {}\n", path.display());

    // The demo app, captured from a background task
    let app = DemoApp::new(config, rasterizer);
    app.set_value(7.0)?;
    app.set_name("Ada");

    println!("Running report in the background...");
    let worker = app.clone();
    let capture = tokio::spawn(async move { worker.run_report_async().await });

    while !app.status().is_finished() {
        println!("  status: {}", app.status().message());
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
    capture.await?;

    println!("Final status: {}", app.status().message());
    println!("Done!");
    Ok(())
}
