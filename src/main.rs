//! dashshot demo
//!
//! ```bash
//! # Serve the demo dashboard; "Run Report" captures it into ./screenshots
//! dashshot serve --addr 127.0.0.1:5006
//!
//! # Capture the dashboard once with given widget values
//! dashshot capture --value 7 --name Ada --filename run.png
//!
//! # Override capture settings from a JSON file
//! dashshot --config capture.json capture
//! ```

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use dashshot::demo::DemoApp;
use dashshot::{rewrite_static_paths, save_screenshot_async, CaptureConfig, CdpRasterizer, Rasterizer, StandaloneHtml};
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use tiny_http::{Header, Request, Response, Server};

// Wires the static widgets back to the server; only added to served pages.
const CONTROL_SCRIPT: &str = r#"<script>
document.querySelectorAll('.ds-slider input').forEach(function (i) {
    i.addEventListener('change', function () { location = '/update?value=' + encodeURIComponent(i.value); });
});
document.querySelectorAll('.ds-text-input input').forEach(function (i) {
    i.addEventListener('change', function () { location = '/update?name=' + encodeURIComponent(i.value); });
});
document.querySelectorAll('.ds-button').forEach(function (b) {
    b.addEventListener('click', function () {
        fetch('/run').then(function () { setTimeout(function () { location.reload(); }, 500); });
    });
});
</script>"#;

#[derive(Parser)]
#[command(name = "dashshot", about = "Demo dashboard with PNG screenshot capture")]
struct Cli {
    /// JSON file with capture settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory screenshots are written to
    #[arg(long, global = true)]
    out_dir: Option<PathBuf>,

    /// Settle delay after network idle, in milliseconds
    #[arg(long, global = true)]
    settle_ms: Option<u64>,

    /// Chrome/Chromium binary to use
    #[arg(long, global = true)]
    chrome: Option<PathBuf>,

    /// Launch Chrome without its sandbox
    #[arg(long, global = true)]
    no_sandbox: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the dashboard over HTTP
    Serve {
        #[arg(long, default_value = "127.0.0.1:5006")]
        addr: String,
    },
    /// Capture the dashboard once and print the PNG path
    Capture {
        #[arg(long, default_value_t = 5.0)]
        value: f64,
        #[arg(long, default_value = "")]
        name: String,
        #[arg(long)]
        filename: Option<String>,
    },
}

impl Cli {
    fn capture_config(&self) -> Result<CaptureConfig> {
        let mut cfg = match &self.config {
            Some(path) => CaptureConfig::from_json_file(path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => CaptureConfig::default(),
        };
        if let Some(dir) = &self.out_dir {
            cfg.save_dir = dir.clone();
        }
        if let Some(ms) = self.settle_ms {
            cfg.settle_delay_ms = ms;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    fn rasterizer(&self) -> Arc<dyn Rasterizer> {
        let mut r = CdpRasterizer::new().with_sandbox(!self.no_sandbox);
        if let Some(path) = &self.chrome {
            r = r.with_chrome_path(path.clone());
        }
        Arc::new(r)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = cli.capture_config()?;
    let rasterizer = cli.rasterizer();

    match cli.command {
        Command::Serve { ref addr } => serve(addr, DemoApp::new(config, rasterizer)).await,
        Command::Capture { value, ref name, ref filename } => {
            let app = DemoApp::new(config.clone(), rasterizer.clone());
            app.set_value(value)?;
            app.set_name(name.clone());

            let path = save_screenshot_async(app.snapshot_source(), config, filename.clone(), rasterizer).await?;
            println!("Screenshot saved to {}", path.display());
            Ok(())
        }
    }
}

async fn serve(addr: &str, app: DemoApp) -> Result<()> {
    let server = Arc::new(Server::http(addr).map_err(|e| anyhow!("failed to bind {}: {}", addr, e))?);
    info!("Serving demo dashboard on http://{}", addr);

    loop {
        let server = server.clone();
        let request = tokio::task::spawn_blocking(move || server.recv()).await??;
        handle(&app, request).await;
    }
}

async fn handle(app: &DemoApp, request: Request) {
    let target = request.url().to_string();
    let (path, query) = target.split_once('?').unwrap_or((target.as_str(), ""));

    let response = match path {
        "/" => match render_page(app) {
            Ok(html) => Response::from_string(html).with_header(header("Content-Type: text/html; charset=utf-8")),
            Err(e) => Response::from_string(format!("render failed: {}", e)).with_status_code(500),
        },
        "/update" => {
            let mut failure = None;
            for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
                match key.as_ref() {
                    "value" => match value.parse::<f64>() {
                        Ok(v) => {
                            if let Err(e) = app.set_value(v) {
                                failure = Some(e.to_string());
                            }
                        }
                        Err(e) => failure = Some(format!("bad value '{}': {}", value, e)),
                    },
                    "name" => app.set_name(value.into_owned()),
                    _ => {}
                }
            }
            match failure {
                Some(msg) => Response::from_string(msg).with_status_code(400),
                None => Response::from_string("").with_status_code(303).with_header(header("Location: /")),
            }
        }
        "/run" => {
            // Capture in the background so the server keeps answering.
            let app = app.clone();
            tokio::spawn(async move {
                app.run_report_async().await;
            });
            Response::from_string("capture started").with_status_code(202)
        }
        "/status" => match serde_json::to_string(&app.status()) {
            Ok(json) => Response::from_string(json).with_header(header("Content-Type: application/json")),
            Err(e) => Response::from_string(e.to_string()).with_status_code(500),
        },
        _ => Response::from_string("Not Found").with_status_code(404),
    };

    if let Err(e) = request.respond(response) {
        warn!("Failed to respond to {}: {}", target, e);
    }
}

fn render_page(app: &DemoApp) -> dashshot::Result<String> {
    let assets = &app.config().assets;
    let html = app.layout().to_standalone_html(assets)?;
    let (html, _) = rewrite_static_paths(&html, assets)?;
    Ok(html.replace("</body>", &format!("{}\n</body>", CONTROL_SCRIPT)))
}

fn header(raw: &str) -> Header {
    raw.parse::<Header>().unwrap_or_else(|()| unreachable!("static header '{}' is valid", raw))
}
