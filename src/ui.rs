use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use egui::ViewportCommand;

use crate::audio::AudioCapture;
use crate::config::ScopeConfig;
use crate::display::{BACKGROUND, ScrollingDisplay};
use crate::geometry::DisplayGeometry;
use crate::ingest::{OverflowReporter, RingExchange, channel_rings};
use crate::scheduler::FrameScheduler;
use crate::waveform::WaveformExtractor;

pub struct ScopeParts {
    pub config: ScopeConfig,
    pub geometry: DisplayGeometry,
    pub extractor: WaveformExtractor,
    pub exchange: RingExchange,
    pub overflow: OverflowReporter,
    pub running: Arc<AtomicBool>,
    pub capture: AudioCapture,
}

pub struct ScopeApp {
    config: ScopeConfig,
    sample_rate: u32,
    requested_size: (usize, usize),
    pending_geometry: Option<DisplayGeometry>,
    extractor: WaveformExtractor,
    display: ScrollingDisplay,
    scheduler: FrameScheduler,
    exchange: RingExchange,
    overflow: OverflowReporter,
    running: Arc<AtomicBool>,
    capture: AudioCapture,
}

impl ScopeApp {
    pub fn new(cc: &eframe::CreationContext<'_>, parts: ScopeParts) -> Result<Self> {
        let ScopeParts {
            config,
            geometry,
            extractor,
            exchange,
            overflow,
            running,
            capture,
        } = parts;

        let mut display = ScrollingDisplay::new(&config);
        log::info!("Using the {} display backend", config.backend.label());
        let max_side = cc.egui_ctx.input(|i| i.max_texture_side);
        let applied = display.resize(&cc.egui_ctx, &geometry, max_side)?;

        let mut app = Self {
            scheduler: FrameScheduler::new(config.frame_interval_ms),
            sample_rate: geometry.sample_rate,
            requested_size: (geometry.width, geometry.height),
            pending_geometry: None,
            config,
            extractor,
            display,
            exchange,
            overflow,
            running,
            capture,
        };
        if applied != geometry {
            // The renderer shrank the surface; the startup rings were sized
            // for the larger one.
            app.replace_rings(applied);
        }
        running_title(&cc.egui_ctx, &app.config, &app.capture);
        Ok(app)
    }

    /// Recomputes every size-dependent piece from scratch. Buffered audio is
    /// dropped and drawing restarts at the left edge.
    fn rebuild(&mut self, ctx: &egui::Context, size: (usize, usize)) {
        self.requested_size = size;
        let requested = DisplayGeometry::new(&self.config, size.0, size.1, self.sample_rate);
        let max_side = ctx.input(|i| i.max_texture_side);
        match self.display.resize(ctx, &requested, max_side) {
            Ok(applied) => {
                log::info!(
                    "Display {}x{}, {} s, {} frames per column",
                    applied.width,
                    applied.height,
                    applied.duration_secs,
                    applied.frames_per_line
                );
                self.replace_rings(applied);
            }
            Err(err) => log::warn!("Keeping previous display: {err:#}"),
        }
    }

    fn replace_rings(&mut self, geometry: DisplayGeometry) {
        let (producers, consumers) =
            channel_rings(geometry.channel_count(), geometry.ring_capacity_bytes());
        self.exchange.offer(producers, consumers);
        self.pending_geometry = Some(geometry);
        if !self.deliver_rings() {
            log::warn!("Audio callback is not taking new rings; display paused until it does");
        }
    }

    fn deliver_rings(&mut self) -> bool {
        let Some(consumers) = self.exchange.deliver() else {
            return !self.exchange.is_pending();
        };
        if let Some(geometry) = self.pending_geometry.take() {
            self.extractor = WaveformExtractor::new(consumers, &geometry, &self.config.channels);
        }
        true
    }

    fn change_duration(&mut self, ctx: &egui::Context, duration_secs: u32) {
        let next = self.config.with_duration(duration_secs);
        if next == self.config {
            return;
        }
        self.config = next;
        running_title(ctx, &self.config, &self.capture);
        self.rebuild(ctx, self.requested_size);
    }

    fn handle_keys(&mut self, ctx: &egui::Context) {
        let (longer, shorter, quit) = ctx.input(|i| {
            (
                i.key_pressed(egui::Key::ArrowUp),
                i.key_pressed(egui::Key::ArrowDown),
                i.key_pressed(egui::Key::Escape) || i.key_pressed(egui::Key::Q),
            )
        });
        if quit {
            self.running.store(false, Ordering::Relaxed);
        }
        if longer {
            self.change_duration(ctx, self.config.duration_secs + 1);
        }
        if shorter {
            self.change_duration(ctx, self.config.duration_secs.saturating_sub(1));
        }
    }
}

impl eframe::App for ScopeApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_keys(ctx);
        if !self.running.load(Ordering::Relaxed) {
            ctx.send_viewport_cmd(ViewportCommand::Close);
            return;
        }
        self.overflow.poll();
        self.deliver_rings();

        egui::CentralPanel::default()
            .frame(egui::Frame::none().fill(BACKGROUND))
            .show(ctx, |ui| {
                let rect = ui.max_rect();
                let size = (
                    rect.width().round() as usize,
                    rect.height().round() as usize,
                );
                if size != self.requested_size && size.0 > 0 && size.1 > 0 {
                    self.rebuild(ctx, size);
                }

                if !self.exchange.is_pending() {
                    self.extractor.pull(&mut self.display);
                }
                self.scheduler.wait_for_frame();
                let shapes = self.display.present(rect);
                ui.painter().extend(shapes);
            });

        ctx.request_repaint();
    }
}

impl Drop for ScopeApp {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
    }
}

fn running_title(ctx: &egui::Context, config: &ScopeConfig, capture: &AudioCapture) {
    ctx.send_viewport_cmd(ViewportCommand::Title(window_title(config, &capture.device_name)));
}

pub fn window_title(config: &ScopeConfig, device_name: &str) -> String {
    format!(
        "scrollscope - {device_name} - {} ch, {} s",
        config.channel_count(),
        config.duration_secs
    )
}
