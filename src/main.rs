mod app;
mod config;
mod error;
mod logging;
mod upload;
mod utils;

use anyhow::{anyhow, Context, Result};
use app::UploaderApp;
use config::AppConfig;
use eframe::CreationContext;
use std::sync::Arc;
use tracing::info;
use upload::HttpTransport;

fn main() -> Result<()> {
    let config = AppConfig::load()?;
    logging::init_logging(&config.log);
    info!("Starting OSS Uploader, API base: {}", config.server.api_base);

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let transport = Arc::new(
        HttpTransport::new(&config.server, &config.upload)
            .context("Failed to set up HTTP client")?,
    );

    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default()
            .with_inner_size([820.0, 620.0])
            .with_min_inner_size([600.0, 480.0]),
        ..Default::default()
    };

    let handle = runtime.handle().clone();
    eframe::run_native(
        "OSS Uploader",
        options,
        Box::new(move |cc: &CreationContext| {
            Box::new(UploaderApp::new(cc, transport, handle, &config))
        }),
    )
    .map_err(|e| anyhow!("Failed to run application: {}", e))?;

    info!("OSS Uploader closed");
    Ok(())
}
