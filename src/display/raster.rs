use egui::{Color32, ColorImage, Rect, Shape, TextureHandle, TextureOptions};

use super::{
    BACKGROUND, ColumnSpan, DisplayBackend, FrameState, PLAY_HEAD_COLOR, PLAY_HEAD_WIDTH,
    dirty_spans,
};
use crate::config::ScrollMode;
use crate::geometry::Track;
use crate::waveform::WaveformColumn;

/// CPU-side compositing.
///
/// Columns land in `canvas` at their true position. When scrolling, every
/// present copies the canvas into `screen` in two pieces so the newest
/// column ends up at the right edge, and uploads the whole image. In fixed
/// mode the canvas is the screen and only the touched columns are uploaded.
pub struct RasterBackend {
    mode: ScrollMode,
    width: usize,
    height: usize,
    canvas: ColorImage,
    screen: ColorImage,
    texture: Option<TextureHandle>,
}

impl RasterBackend {
    pub fn new(mode: ScrollMode) -> Self {
        Self {
            mode,
            width: 0,
            height: 0,
            canvas: ColorImage::new([0, 0], BACKGROUND),
            screen: ColorImage::new([0, 0], BACKGROUND),
            texture: None,
        }
    }

    fn fill_column(&mut self, x: usize, top: usize, bottom: usize, color: Color32) {
        let bottom = bottom.min(self.height);
        for y in top.min(bottom)..bottom {
            self.canvas.pixels[y * self.width + x] = color;
        }
    }

    /// Builds the scrolled view:
    ///
    /// ```text
    ///            pos
    ///   +--------+------------------+
    ///   |   A    |        B         |   canvas
    ///   +--------+------------------+
    ///   +------------------+--------+
    ///   |        B         |   A    |   screen
    ///   +------------------+--------+
    /// ```
    fn compose_scrolled(&mut self, pos: usize) {
        let w = self.width;
        for y in 0..self.height {
            let row = y * w;
            let (head, tail) = self.canvas.pixels[row..row + w].split_at(pos);
            self.screen.pixels[row + w - pos..row + w].copy_from_slice(head);
            self.screen.pixels[row..row + w - pos].copy_from_slice(tail);
        }
    }

    fn draw_play_head(&mut self, pos: usize) {
        for i in 0..PLAY_HEAD_WIDTH * 2 {
            let x = (pos + i) % self.width;
            let color = if i < PLAY_HEAD_WIDTH {
                PLAY_HEAD_COLOR
            } else {
                BACKGROUND
            };
            self.fill_column(x, 0, self.height, color);
        }
    }

    fn canvas_span(&self, span: ColumnSpan) -> ColorImage {
        let mut pixels = Vec::with_capacity(span.width * self.height);
        for y in 0..self.height {
            let row = y * self.width + span.x;
            pixels.extend_from_slice(&self.canvas.pixels[row..row + span.width]);
        }
        ColorImage {
            size: [span.width, self.height],
            pixels,
        }
    }

    fn upload(&mut self, frame: FrameState) -> Vec<ColumnSpan> {
        match self.mode {
            ScrollMode::Scrolling => {
                self.compose_scrolled(frame.scroll_pos);
                if let Some(texture) = self.texture.as_mut() {
                    texture.set(self.screen.clone(), TextureOptions::NEAREST);
                }
                vec![ColumnSpan {
                    x: 0,
                    width: self.width,
                }]
            }
            ScrollMode::Fixed => {
                let spans = dirty_spans(frame, self.width, PLAY_HEAD_WIDTH * 2);
                self.draw_play_head(frame.scroll_pos);
                for span in &spans {
                    let image = self.canvas_span(*span);
                    if let Some(texture) = self.texture.as_mut() {
                        texture.set_partial([span.x, 0], image, TextureOptions::NEAREST);
                    }
                }
                spans
            }
        }
    }
}

impl DisplayBackend for RasterBackend {
    fn resize(&mut self, ctx: &egui::Context, width: usize, height: usize) {
        self.width = width;
        self.height = height;
        self.canvas = ColorImage::new([width, height], BACKGROUND);
        self.screen = match self.mode {
            ScrollMode::Scrolling => ColorImage::new([width, height], BACKGROUND),
            ScrollMode::Fixed => ColorImage::new([0, 0], BACKGROUND),
        };
        self.texture = Some(ctx.load_texture(
            "scope-raster",
            ColorImage::new([width, height], BACKGROUND),
            TextureOptions::NEAREST,
        ));
    }

    fn clear_column(&mut self, x: usize) {
        self.fill_column(x, 0, self.height, BACKGROUND);
    }

    fn draw_column(&mut self, x: usize, track: &Track, column: &WaveformColumn, color: Color32) {
        self.fill_column(
            x,
            track.offset + column.upper,
            track.offset + column.lower,
            color,
        );
    }

    fn finish_column(&mut self, _x: usize) {}

    fn present(&mut self, frame: FrameState, target: Rect) -> Vec<Shape> {
        self.upload(frame);
        self.texture
            .as_ref()
            .map(|texture| {
                vec![Shape::image(
                    texture.id(),
                    target,
                    Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                    Color32::WHITE,
                )]
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GREEN: Color32 = Color32::from_rgb(0, 255, 0);

    fn backend(mode: ScrollMode, width: usize, height: usize) -> RasterBackend {
        let mut backend = RasterBackend::new(mode);
        backend.resize(&egui::Context::default(), width, height);
        backend
    }

    fn target() -> Rect {
        Rect::from_min_size(egui::Pos2::ZERO, egui::vec2(8.0, 5.0))
    }

    fn full_track() -> Track {
        Track {
            offset: 0,
            height: 5,
            draw_height: 5,
        }
    }

    fn column_marker(backend: &mut RasterBackend, x: usize) {
        backend.clear_column(x);
        backend.draw_column(
            x,
            &full_track(),
            &WaveformColumn {
                upper: 0,
                lower: 5,
                clipping: false,
            },
            GREEN,
        );
        backend.finish_column(x);
    }

    #[test]
    fn draw_fills_only_the_bar_rows() {
        let mut backend = backend(ScrollMode::Scrolling, 4, 7);
        let track = Track {
            offset: 2,
            height: 5,
            draw_height: 5,
        };
        backend.draw_column(
            1,
            &track,
            &WaveformColumn {
                upper: 1,
                lower: 3,
                clipping: false,
            },
            GREEN,
        );

        let column: Vec<Color32> = (0..7).map(|y| backend.canvas.pixels[y * 4 + 1]).collect();
        assert_eq!(
            column,
            vec![
                BACKGROUND, BACKGROUND, BACKGROUND, GREEN, GREEN, BACKGROUND, BACKGROUND
            ]
        );
    }

    #[test]
    fn bars_past_the_bottom_are_clipped() {
        let mut backend = backend(ScrollMode::Scrolling, 2, 4);
        backend.draw_column(
            0,
            &Track {
                offset: 3,
                height: 3,
                draw_height: 3,
            },
            &WaveformColumn {
                upper: 0,
                lower: 3,
                clipping: false,
            },
            GREEN,
        );
        assert_eq!(backend.canvas.pixels[3 * 2], GREEN);
    }

    #[test]
    fn scrolling_puts_newest_column_at_right_edge() {
        let mut backend = backend(ScrollMode::Scrolling, 8, 5);
        column_marker(&mut backend, 2);
        let frame = FrameState {
            scroll_pos: 3,
            prev_pos: 0,
            columns_drawn: 3,
        };
        assert_eq!(backend.upload(frame), vec![ColumnSpan { x: 0, width: 8 }]);
        assert_eq!(backend.present(frame, target()).len(), 1);
        for y in 0..5 {
            let row = &backend.screen.pixels[y * 8..y * 8 + 8];
            assert_eq!(row[7], GREEN);
            assert!(row[..7].iter().all(|p| *p == BACKGROUND));
        }
    }

    #[test]
    fn scrolling_keeps_column_order_across_the_seam() {
        let mut backend = backend(ScrollMode::Scrolling, 4, 1);
        let shades = [
            Color32::from_gray(10),
            Color32::from_gray(20),
            Color32::from_gray(30),
            Color32::from_gray(40),
        ];
        for (x, shade) in shades.iter().enumerate() {
            backend.canvas.pixels[x] = *shade;
        }
        let frame = FrameState {
            scroll_pos: 1,
            prev_pos: 0,
            columns_drawn: 1,
        };
        backend.present(frame, target());
        // Oldest column (1) on the left, newest (0) on the right.
        assert_eq!(
            backend.screen.pixels,
            vec![shades[1], shades[2], shades[3], shades[0]]
        );
    }

    #[test]
    fn fixed_mode_uploads_only_touched_columns_and_draws_play_head() {
        let mut backend = backend(ScrollMode::Fixed, 8, 5);
        column_marker(&mut backend, 0);
        column_marker(&mut backend, 1);
        let frame = FrameState {
            scroll_pos: 2,
            prev_pos: 0,
            columns_drawn: 2,
        };
        assert_eq!(backend.upload(frame), vec![ColumnSpan { x: 0, width: 6 }]);
        let row: Vec<Color32> = backend.canvas.pixels[..8].to_vec();
        assert_eq!(
            row,
            vec![
                GREEN,
                GREEN,
                PLAY_HEAD_COLOR,
                PLAY_HEAD_COLOR,
                BACKGROUND,
                BACKGROUND,
                BACKGROUND,
                BACKGROUND
            ]
        );
    }

    #[test]
    fn fixed_mode_play_head_wraps() {
        let mut backend = backend(ScrollMode::Fixed, 8, 1);
        let frame = FrameState {
            scroll_pos: 7,
            prev_pos: 5,
            columns_drawn: 2,
        };
        assert_eq!(
            backend.upload(frame),
            vec![ColumnSpan { x: 5, width: 3 }, ColumnSpan { x: 0, width: 3 }]
        );
        assert_eq!(backend.canvas.pixels[7], PLAY_HEAD_COLOR);
        assert_eq!(backend.canvas.pixels[0], PLAY_HEAD_COLOR);
        assert_eq!(backend.canvas.pixels[1], BACKGROUND);
    }

    #[test]
    fn span_extraction_copies_rows() {
        let mut backend = backend(ScrollMode::Fixed, 4, 2);
        backend.canvas.pixels[1] = GREEN;
        backend.canvas.pixels[4 + 2] = GREEN;
        let image = backend.canvas_span(ColumnSpan { x: 1, width: 2 });
        assert_eq!(image.size, [2, 2]);
        assert_eq!(image.pixels, vec![GREEN, BACKGROUND, BACKGROUND, GREEN]);
    }
}
