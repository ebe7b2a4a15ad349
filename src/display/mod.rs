//! Scrolling composite of waveform columns.
//!
//! Columns are always written at the true scroll position of a ring that is
//! `width` columns wide. Backends differ only in how that ring reaches the
//! screen: the raster backend copies it into a second image split around the
//! scroll position, the strip backend draws transposed texture strips as
//! quads placed so the ring wraps.

mod raster;
mod strips;

use anyhow::{Result, bail};
use egui::{Color32, Rect};

use crate::config::{BackendKind, ScopeConfig};
use crate::geometry::{DisplayGeometry, Track};
use crate::waveform::{ColumnSink, WaveformColumn};

use raster::RasterBackend;
use strips::StripBackend;

pub const BACKGROUND: Color32 = Color32::BLACK;
pub const CLIPPING_COLOR: Color32 = Color32::from_rgb(255, 0, 0);
pub const PLAY_HEAD_COLOR: Color32 = Color32::WHITE;
pub const PLAY_HEAD_WIDTH: usize = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColumnSpan {
    pub x: usize,
    pub width: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameState {
    pub scroll_pos: usize,
    pub prev_pos: usize,
    /// Columns drawn since the previous present; may exceed the width.
    pub columns_drawn: usize,
}

pub trait DisplayBackend {
    fn resize(&mut self, ctx: &egui::Context, width: usize, height: usize);
    fn clear_column(&mut self, x: usize);
    fn draw_column(&mut self, x: usize, track: &Track, column: &WaveformColumn, color: Color32);
    /// Called once every track of column `x` has been drawn.
    fn finish_column(&mut self, x: usize);
    fn present(&mut self, frame: FrameState, target: Rect) -> Vec<egui::Shape>;
}

#[derive(Clone, Debug, PartialEq)]
pub struct Palette {
    colors: Vec<Color32>,
    clipping: Option<Color32>,
}

impl Palette {
    pub fn from_config(config: &ScopeConfig) -> Self {
        Self {
            colors: config.channels.iter().map(|c| c.color).collect(),
            clipping: config.show_clipping.then_some(CLIPPING_COLOR),
        }
    }

    pub fn color_for(&self, channel: usize, column: &WaveformColumn) -> Color32 {
        match self.clipping {
            Some(color) if column.clipping => color,
            _ => self
                .colors
                .get(channel)
                .copied()
                .unwrap_or(crate::config::DEFAULT_TRACK_COLOR),
        }
    }
}

pub struct ScrollingDisplay {
    backend: Box<dyn DisplayBackend>,
    palette: Palette,
    tracks: Vec<Track>,
    width: usize,
    scroll_pos: usize,
    prev_pos: usize,
    columns_drawn: usize,
}

impl ScrollingDisplay {
    pub fn new(config: &ScopeConfig) -> Self {
        let backend: Box<dyn DisplayBackend> = match config.backend {
            BackendKind::Raster => Box::new(RasterBackend::new(config.mode)),
            BackendKind::Strips => Box::new(StripBackend::new(config.mode)),
        };
        Self::with_backend(backend, Palette::from_config(config))
    }

    pub fn with_backend(backend: Box<dyn DisplayBackend>, palette: Palette) -> Self {
        Self {
            backend,
            palette,
            tracks: Vec::new(),
            width: 0,
            scroll_pos: 0,
            prev_pos: 0,
            columns_drawn: 0,
        }
    }

    /// Rebuilds every surface for `requested`, shrunk to `max_side` when the
    /// renderer cannot hold it. Returns the geometry actually in use.
    pub fn resize(
        &mut self,
        ctx: &egui::Context,
        requested: &DisplayGeometry,
        max_side: usize,
    ) -> Result<DisplayGeometry> {
        let geometry = match requested.clamped(max_side) {
            Some(clamped) => {
                log::warn!(
                    "Display size {}x{} exceeds the renderer limit of {max_side}px, using {}x{}",
                    requested.width,
                    requested.height,
                    clamped.width,
                    clamped.height
                );
                clamped
            }
            None => requested.clone(),
        };
        if geometry.width == 0 || geometry.height == 0 {
            bail!(
                "cannot create a {}x{} display surface",
                geometry.width,
                geometry.height
            );
        }

        self.backend.resize(ctx, geometry.width, geometry.height);
        self.tracks = geometry.tracks.clone();
        self.width = geometry.width;
        self.scroll_pos = 0;
        self.prev_pos = 0;
        self.columns_drawn = 0;
        log::debug!(
            "Display surfaces rebuilt at {}x{}, {} frames per column",
            geometry.width,
            geometry.height,
            geometry.frames_per_line
        );
        Ok(geometry)
    }

    pub fn scroll_pos(&self) -> usize {
        self.scroll_pos
    }

    pub fn present(&mut self, target: Rect) -> Vec<egui::Shape> {
        let frame = FrameState {
            scroll_pos: self.scroll_pos,
            prev_pos: self.prev_pos,
            columns_drawn: self.columns_drawn,
        };
        self.prev_pos = self.scroll_pos;
        self.columns_drawn = 0;
        if self.width == 0 {
            return Vec::new();
        }
        self.backend.present(frame, target)
    }
}

impl ColumnSink for ScrollingDisplay {
    fn draw_columns(&mut self, columns: &[WaveformColumn]) {
        if self.width == 0 {
            return;
        }
        let x = self.scroll_pos;
        self.backend.clear_column(x);
        for (channel, (track, column)) in self.tracks.iter().zip(columns).enumerate() {
            let color = self.palette.color_for(channel, column);
            self.backend.draw_column(x, track, column, color);
        }
        self.backend.finish_column(x);

        self.scroll_pos = (self.scroll_pos + 1) % self.width;
        self.columns_drawn += 1;
    }
}

/// Smallest set of spans (one, or two when wrapping) covering the columns
/// written since `prev_pos` plus `trail` columns after the newest one.
pub fn dirty_spans(frame: FrameState, width: usize, trail: usize) -> Vec<ColumnSpan> {
    let len = frame.columns_drawn + trail;
    if len >= width {
        return vec![ColumnSpan { x: 0, width }];
    }
    let start = frame.prev_pos;
    if start + len <= width {
        vec![ColumnSpan { x: start, width: len }]
    } else {
        vec![
            ColumnSpan {
                x: start,
                width: width - start,
            },
            ColumnSpan {
                x: 0,
                width: start + len - width,
            },
        ]
    }
}

fn pixel_scale(target: Rect, width: usize, height: usize) -> egui::Vec2 {
    egui::vec2(
        target.width() / width.max(1) as f32,
        target.height() / height.max(1) as f32,
    )
}
