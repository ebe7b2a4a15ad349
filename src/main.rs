mod audio;
mod cli;
mod config;
mod display;
mod geometry;
mod ingest;
mod ring_buffer;
mod scheduler;
mod settings;
mod ui;
mod waveform;

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::{Result, anyhow, bail};
use clap::Parser;

use audio::{InputDevice, list_input_device_names};
use cli::Cli;
use config::ScopeConfig;
use geometry::DisplayGeometry;
use ingest::{AudioIngest, IngestStatus, OverflowReporter, channel_rings};
use settings::{ScopeSettings, default_settings_path};
use ui::{ScopeApp, ScopeParts, window_title};
use waveform::WaveformExtractor;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if cli.list_devices {
        for name in list_input_device_names() {
            println!("{name}");
        }
        return Ok(());
    }

    let settings_path = cli.config.clone().unwrap_or_else(default_settings_path);
    let settings = ScopeSettings::load(&settings_path);
    let mut config = ScopeConfig::resolve(&settings, &cli)?;

    let device = InputDevice::open(config.input_device.as_deref(), config.channel_count())?;
    if device.channels() < config.channel_count() {
        log::warn!(
            "Showing {} of {} requested channels",
            device.channels(),
            config.channel_count()
        );
        config = config.with_channel_count(device.channels());
    }

    let geometry = DisplayGeometry::new(
        &config,
        config.width,
        config.initial_height(),
        device.sample_rate(),
    );
    if geometry.height == 0 {
        bail!("window height must be greater than zero");
    }

    let running = Arc::new(AtomicBool::new(true));
    let status = Arc::new(IngestStatus::default());
    let (producers, consumers) =
        channel_rings(geometry.channel_count(), geometry.ring_capacity_bytes());
    let (ingest, exchange) = AudioIngest::new(producers, Arc::clone(&running), Arc::clone(&status));
    let extractor = WaveformExtractor::new(consumers, &geometry, &config.channels);
    let capture = device.start(ingest)?;

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([geometry.width as f32, geometry.height as f32])
            .with_title(window_title(&config, &capture.device_name)),
        vsync: config.frame_interval_ms == 0,
        ..Default::default()
    };
    let parts = ScopeParts {
        config,
        geometry,
        extractor,
        exchange,
        overflow: OverflowReporter::new(status),
        running,
        capture,
    };

    eframe::run_native(
        "scrollscope",
        options,
        Box::new(move |cc| match ScopeApp::new(cc, parts) {
            Ok(app) => Box::new(app) as Box<dyn eframe::App>,
            Err(err) => {
                log::error!("{err:#}");
                std::process::exit(1);
            }
        }),
    )
    .map_err(|err| anyhow!("Window error: {err}"))
}
