use egui::epaint::Vertex;
use egui::{Color32, ColorImage, Mesh, Pos2, Rect, Rounding, Shape, TextureHandle, TextureOptions};

use super::{
    BACKGROUND, DisplayBackend, FrameState, PLAY_HEAD_COLOR, PLAY_HEAD_WIDTH, pixel_scale,
};
use crate::config::ScrollMode;
use crate::geometry::Track;
use crate::waveform::WaveformColumn;

const STRIP_WIDTH: usize = 64;

/// Columns after the play-head that fade back into the image.
const TRAIL_COLUMNS: usize = 18;
const TRAIL_START_ALPHA: f32 = 0.8;
const TRAIL_ALPHA_STEP: f32 = 0.04;

/// Texture strips tiling the width.
///
/// Each strip is stored transposed: a display column is one texture row, so
/// writing a column is a one-row partial upload. Presenting draws the strips
/// as quads with swapped texture coordinates.
pub struct StripBackend {
    mode: ScrollMode,
    width: usize,
    height: usize,
    strips: Vec<TextureHandle>,
    column: ColorImage,
}

impl StripBackend {
    pub fn new(mode: ScrollMode) -> Self {
        Self {
            mode,
            width: 0,
            height: 0,
            strips: Vec::new(),
            column: ColorImage::new([0, 0], BACKGROUND),
        }
    }

    fn valid_rows(&self, n: usize) -> usize {
        STRIP_WIDTH.min(self.width - n * STRIP_WIDTH)
    }

    /// Pieces of the ring to draw: `(strip, first row, end row, screen x)`.
    fn placements(&self, scroll_pos: usize) -> Vec<(usize, usize, usize, usize)> {
        let mut placements = Vec::with_capacity(self.strips.len() + 1);
        for n in 0..self.strips.len() {
            let base = n * STRIP_WIDTH;
            let valid = self.valid_rows(n);
            match self.mode {
                ScrollMode::Fixed => placements.push((n, 0, valid, base)),
                ScrollMode::Scrolling => {
                    if scroll_pos > base && scroll_pos < base + valid {
                        // This strip holds the seam: its head wraps to the
                        // right edge, its tail starts the screen.
                        let seam = scroll_pos - base;
                        placements.push((n, 0, seam, self.width - seam));
                        placements.push((n, seam, valid, 0));
                    } else {
                        let x = (base + self.width - scroll_pos) % self.width;
                        placements.push((n, 0, valid, x));
                    }
                }
            }
        }
        placements
    }

    fn strip_mesh(&self, n: usize, rows: (usize, usize), screen_x: usize, target: Rect) -> Mesh {
        let scale = pixel_scale(target, self.width, self.height);
        let (first, end) = rows;
        let left = target.min.x + screen_x as f32 * scale.x;
        let right = left + (end - first) as f32 * scale.x;
        let v0 = first as f32 / STRIP_WIDTH as f32;
        let v1 = end as f32 / STRIP_WIDTH as f32;

        // Texture u runs down the screen, v runs across it.
        let mut mesh = Mesh::with_texture(self.strips[n].id());
        let corners = [
            (Pos2::new(left, target.min.y), Pos2::new(0.0, v0)),
            (Pos2::new(right, target.min.y), Pos2::new(0.0, v1)),
            (Pos2::new(right, target.max.y), Pos2::new(1.0, v1)),
            (Pos2::new(left, target.max.y), Pos2::new(1.0, v0)),
        ];
        for (pos, uv) in corners {
            mesh.vertices.push(Vertex {
                pos,
                uv,
                color: Color32::WHITE,
            });
        }
        mesh.add_triangle(0, 1, 2);
        mesh.add_triangle(0, 2, 3);
        mesh
    }

    fn play_head(&self, pos: usize, target: Rect) -> Vec<Shape> {
        let scale = pixel_scale(target, self.width, self.height);
        let column_rect = |x: usize, columns: usize| {
            let left = target.min.x + x as f32 * scale.x;
            Rect::from_min_max(
                Pos2::new(left, target.min.y),
                Pos2::new(left + columns as f32 * scale.x, target.max.y),
            )
        };

        let mut shapes = vec![Shape::rect_filled(
            column_rect(pos, PLAY_HEAD_WIDTH),
            Rounding::ZERO,
            PLAY_HEAD_COLOR,
        )];
        for i in PLAY_HEAD_WIDTH..PLAY_HEAD_WIDTH + TRAIL_COLUMNS {
            let alpha = (TRAIL_START_ALPHA - TRAIL_ALPHA_STEP * i as f32).max(0.0);
            shapes.push(Shape::rect_filled(
                column_rect((pos + i) % self.width, 1),
                Rounding::ZERO,
                Color32::from_black_alpha((alpha * 255.0).round() as u8),
            ));
        }
        shapes
    }
}

impl DisplayBackend for StripBackend {
    fn resize(&mut self, ctx: &egui::Context, width: usize, height: usize) {
        self.width = width;
        self.height = height;
        self.column = ColorImage::new([height, 1], BACKGROUND);
        let count = width.div_ceil(STRIP_WIDTH);
        self.strips = (0..count)
            .map(|n| {
                ctx.load_texture(
                    format!("scope-strip-{n}"),
                    ColorImage::new([height, STRIP_WIDTH], BACKGROUND),
                    TextureOptions::NEAREST,
                )
            })
            .collect();
    }

    fn clear_column(&mut self, _x: usize) {
        self.column.pixels.fill(BACKGROUND);
    }

    fn draw_column(&mut self, _x: usize, track: &Track, column: &WaveformColumn, color: Color32) {
        let bottom = (track.offset + column.lower).min(self.height);
        let top = (track.offset + column.upper).min(bottom);
        self.column.pixels[top..bottom].fill(color);
    }

    fn finish_column(&mut self, x: usize) {
        if let Some(strip) = self.strips.get_mut(x / STRIP_WIDTH) {
            strip.set_partial(
                [0, x % STRIP_WIDTH],
                self.column.clone(),
                TextureOptions::NEAREST,
            );
        }
    }

    fn present(&mut self, frame: FrameState, target: Rect) -> Vec<Shape> {
        let mut shapes: Vec<Shape> = self
            .placements(frame.scroll_pos)
            .into_iter()
            .map(|(n, first, end, x)| Shape::mesh(self.strip_mesh(n, (first, end), x, target)))
            .collect();
        if self.mode == ScrollMode::Fixed {
            shapes.extend(self.play_head(frame.scroll_pos, target));
        }
        shapes
    }
}
