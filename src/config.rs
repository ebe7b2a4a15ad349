use anyhow::{Result, bail};
use egui::Color32;

use crate::cli::Cli;
use crate::settings::ScopeSettings;

pub const DEFAULT_DURATION_SECS: u32 = 5;
pub const DEFAULT_WIDTH: usize = 480;
pub const DEFAULT_HEIGHT_PER_TRACK: usize = 120;
pub const DEFAULT_HEIGHT_MAX: usize = 480;
pub const DEFAULT_FPS: u32 = 50;
pub const DEFAULT_TRACK_COLOR: Color32 = Color32::from_rgb(0, 255, 0);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    Raster,
    Strips,
}

impl BackendKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "raster" | "sdl" => Some(BackendKind::Raster),
            "strips" | "gl" | "texture" => Some(BackendKind::Strips),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            BackendKind::Raster => "raster",
            BackendKind::Strips => "strips",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScrollMode {
    Scrolling,
    Fixed,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChannelStyle {
    pub color: Color32,
    pub scale: f32,
    pub height: Option<usize>,
}

impl Default for ChannelStyle {
    fn default() -> Self {
        Self {
            color: DEFAULT_TRACK_COLOR,
            scale: 1.0,
            height: None,
        }
    }
}

/// Startup configuration. Never mutated after construction; runtime changes
/// such as a new duration go through [`ScopeConfig::with_duration`].
#[derive(Clone, Debug, PartialEq)]
pub struct ScopeConfig {
    pub channels: Vec<ChannelStyle>,
    pub width: usize,
    pub height: Option<usize>,
    pub duration_secs: u32,
    pub frame_interval_ms: u64,
    pub show_clipping: bool,
    pub mode: ScrollMode,
    pub backend: BackendKind,
    pub input_device: Option<String>,
}

impl ScopeConfig {
    pub fn resolve(settings: &ScopeSettings, cli: &Cli) -> Result<Self> {
        let requested_channels = cli.channels.or(settings.channels).unwrap_or(1);
        if requested_channels == 0 {
            bail!("at least one input channel is required");
        }

        let duration_secs = cli
            .duration
            .or(settings.duration)
            .unwrap_or(DEFAULT_DURATION_SECS);
        if duration_secs == 0 {
            bail!("display duration must be at least one second");
        }

        let width = cli.width.or(settings.width).unwrap_or(DEFAULT_WIDTH);
        if width == 0 {
            bail!("window width must be greater than zero");
        }

        let fps = cli.fps.or(settings.fps).unwrap_or(DEFAULT_FPS);
        let frame_interval_ms = if fps == 0 { 0 } else { (1000 / fps as u64).max(1) };

        let scrolling = if cli.no_scroll {
            false
        } else {
            settings.scrolling.unwrap_or(true)
        };
        let backend = if cli.strips {
            BackendKind::Strips
        } else {
            settings.backend.unwrap_or(BackendKind::Raster)
        };

        let channels = (0..requested_channels)
            .map(|index| {
                settings
                    .channel_styles
                    .get(&index)
                    .copied()
                    .unwrap_or_default()
            })
            .collect();

        Ok(Self {
            channels,
            width,
            height: cli.height.or(settings.height),
            duration_secs,
            frame_interval_ms,
            show_clipping: cli.clipping || settings.clipping.unwrap_or(false),
            mode: if scrolling {
                ScrollMode::Scrolling
            } else {
                ScrollMode::Fixed
            },
            backend,
            input_device: cli.device.clone().or_else(|| settings.input_device.clone()),
        })
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn initial_height(&self) -> usize {
        if let Some(height) = self.height {
            return height;
        }
        let explicit: Option<Vec<usize>> = self.channels.iter().map(|c| c.height).collect();
        match explicit {
            Some(heights) => heights.iter().sum(),
            None => (DEFAULT_HEIGHT_PER_TRACK * self.channel_count()).min(DEFAULT_HEIGHT_MAX),
        }
    }

    pub fn with_duration(&self, duration_secs: u32) -> Self {
        Self {
            duration_secs: duration_secs.max(1),
            ..self.clone()
        }
    }

    pub fn with_channel_count(&self, count: usize) -> Self {
        let mut next = self.clone();
        next.channels.truncate(count.max(1));
        next
    }
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            channels: vec![ChannelStyle::default()],
            width: DEFAULT_WIDTH,
            height: None,
            duration_secs: DEFAULT_DURATION_SECS,
            frame_interval_ms: 1000 / DEFAULT_FPS as u64,
            show_clipping: false,
            mode: ScrollMode::Scrolling,
            backend: BackendKind::Raster,
            input_device: None,
        }
    }
}
