use std::mem::size_of;

use crate::config::ChannelStyle;
use crate::geometry::DisplayGeometry;
use crate::ring_buffer::Consumer;

/// Most columns drawn per frame. A reader that fell far behind catches up
/// over several frames instead of stalling the window.
pub const MAX_COLUMNS_PER_FRAME: usize = 4096;

/// Vertical extent of one window of samples, in track-local pixels.
///
/// `upper..lower` is the covered row range; row 0 is full-scale positive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WaveformColumn {
    pub upper: usize,
    pub lower: usize,
    pub clipping: bool,
}

pub trait ColumnSink {
    fn draw_columns(&mut self, columns: &[WaveformColumn]);
}

/// Reduces `window` to its peak excursion after applying `scale`.
///
/// Clipping is judged on the raw samples, before scaling.
pub fn analyze_window(window: &[f32], scale: f32, draw_height: usize) -> WaveformColumn {
    let Some(&first) = window.first() else {
        return analyze_window(&[0.0], scale, draw_height);
    };

    let mut maxi = first;
    let mut mini = first;
    let mut clipping = false;
    for &sample in window {
        if sample > maxi {
            maxi = sample;
        }
        if sample < mini {
            mini = sample;
        }
        if sample >= 1.0 || sample <= -1.0 {
            clipping = true;
        }
    }

    let (a, b) = (maxi * scale, mini * scale);
    let (maxi, mini) = if a >= b { (a, b) } else { (b, a) };

    let height = draw_height as f32;
    let upper = (height * (1.0 - maxi) / 2.0).floor().clamp(0.0, height);
    let lower = (height * (1.0 - mini) / 2.0).ceil().clamp(0.0, height);
    WaveformColumn {
        upper: upper as usize,
        lower: lower as usize,
        clipping,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PullReport {
    pub columns: usize,
    /// Full windows still waiting after the per-frame cap was hit.
    pub backlog: usize,
}

pub struct WaveformExtractor {
    consumers: Vec<Consumer>,
    scales: Vec<f32>,
    draw_heights: Vec<usize>,
    frames_per_line: usize,
    frames: Vec<f32>,
    columns: Vec<WaveformColumn>,
    behind: bool,
}

impl WaveformExtractor {
    pub fn new(
        consumers: Vec<Consumer>,
        geometry: &DisplayGeometry,
        styles: &[ChannelStyle],
    ) -> Self {
        debug_assert_eq!(consumers.len(), geometry.channel_count());
        let channels = consumers.len();
        Self {
            scales: (0..channels)
                .map(|n| styles.get(n).map_or(1.0, |style| style.scale))
                .collect(),
            draw_heights: geometry.tracks.iter().map(|t| t.draw_height).collect(),
            frames_per_line: geometry.frames_per_line,
            frames: vec![0.0; geometry.frames_per_line],
            columns: vec![WaveformColumn::default(); channels],
            consumers,
            behind: false,
        }
    }

    pub fn available_frames(&self) -> usize {
        self.consumers
            .iter()
            .map(|c| c.available_bytes() / size_of::<f32>())
            .min()
            .unwrap_or(0)
    }

    pub fn pull(&mut self, sink: &mut impl ColumnSink) -> PullReport {
        let mut columns = 0;
        while columns < MAX_COLUMNS_PER_FRAME && self.available_frames() >= self.frames_per_line
        {
            for (n, consumer) in self.consumers.iter_mut().enumerate() {
                consumer.read(bytemuck::cast_slice_mut(&mut self.frames));
                self.columns[n] = analyze_window(&self.frames, self.scales[n], self.draw_heights[n]);
            }
            sink.draw_columns(&self.columns);
            columns += 1;
        }

        let backlog = self.available_frames() / self.frames_per_line;
        if backlog > 0 && !self.behind {
            log::warn!("Waveform is {backlog} columns behind the audio input, catching up");
        } else if backlog == 0 && self.behind {
            log::debug!("Waveform caught up with the audio input");
        }
        self.behind = backlog > 0;

        PullReport { columns, backlog }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScopeConfig;
    use crate::ingest::channel_rings;
    use crate::ring_buffer::Producer;

    #[derive(Default)]
    struct Recorder {
        batches: Vec<Vec<WaveformColumn>>,
    }

    impl ColumnSink for Recorder {
        fn draw_columns(&mut self, columns: &[WaveformColumn]) {
            self.batches.push(columns.to_vec());
        }
    }

    fn feed(producer: &mut Producer, samples: &[f32]) {
        producer.try_write(bytemuck::cast_slice(samples)).unwrap();
    }

    #[test]
    fn silence_sits_on_the_center_row() {
        let column = analyze_window(&[0.0; 64], 1.0, 100);
        assert_eq!(
            column,
            WaveformColumn {
                upper: 50,
                lower: 50,
                clipping: false
            }
        );

        // Odd tracks get a one-pixel line through the middle row.
        let column = analyze_window(&[0.0; 64], 1.0, 119);
        assert_eq!((column.upper, column.lower), (59, 60));
    }

    #[test]
    fn full_scale_spans_whole_track_and_clips() {
        let column = analyze_window(&[0.0, 1.0, 0.3, -1.0], 1.0, 119);
        assert_eq!(
            column,
            WaveformColumn {
                upper: 0,
                lower: 119,
                clipping: true
            }
        );
    }

    #[test]
    fn clipping_only_at_or_beyond_full_scale() {
        assert!(analyze_window(&[0.2, 1.5], 1.0, 99).clipping);
        assert!(analyze_window(&[-1.01, 0.0], 1.0, 99).clipping);
        assert!(analyze_window(&[-1.0], 1.0, 99).clipping);
        assert!(!analyze_window(&[0.999, -0.999, 0.0], 1.0, 99).clipping);
    }

    #[test]
    fn first_sample_counts_for_clipping() {
        assert!(analyze_window(&[1.0, 0.0, 0.0], 1.0, 99).clipping);
    }

    #[test]
    fn out_of_range_values_are_clamped_to_track() {
        let column = analyze_window(&[3.0, -3.0], 1.0, 99);
        assert_eq!((column.upper, column.lower), (0, 99));
    }

    #[test]
    fn scale_shrinks_excursion() {
        let window = [0.8, -0.4, 0.1];
        let full = analyze_window(&window, 1.0, 101);
        let half = analyze_window(&window, 0.5, 101);

        // 101 * (1 - 0.8) / 2 = 10.1, 101 * (1 + 0.4) / 2 = 70.7
        assert_eq!((full.upper, full.lower), (10, 71));
        // 101 * (1 - 0.4) / 2 = 30.3, 101 * (1 + 0.2) / 2 = 60.6
        assert_eq!((half.upper, half.lower), (30, 61));
        assert!(half.upper > full.upper);
        assert!(half.lower < full.lower);
    }

    #[test]
    fn one_column_per_window_at_48k_over_five_seconds() {
        let config = ScopeConfig::default();
        let geometry = DisplayGeometry::new(&config, 480, 120, 48_000);
        assert_eq!(geometry.frames_per_line, 500);

        let (mut producers, consumers) = channel_rings(1, geometry.ring_capacity_bytes());
        let mut extractor = WaveformExtractor::new(consumers, &geometry, &config.channels);
        let mut sink = Recorder::default();

        for pull in 1..=3 {
            feed(&mut producers[0], &[0.25; 500]);
            let report = extractor.pull(&mut sink);
            assert_eq!(report, PullReport { columns: 1, backlog: 0 });
            assert_eq!(sink.batches.len(), pull);
        }

        feed(&mut producers[0], &[0.25; 499]);
        assert_eq!(extractor.pull(&mut sink).columns, 0);
        feed(&mut producers[0], &[0.25; 1]);
        assert_eq!(extractor.pull(&mut sink).columns, 1);
    }

    #[test]
    fn waits_for_slowest_channel() {
        let config = ScopeConfig {
            channels: vec![Default::default(); 2],
            ..ScopeConfig::default()
        };
        let geometry = DisplayGeometry::new(&config, 480, 240, 960);
        assert_eq!(geometry.frames_per_line, 10);

        let (mut producers, consumers) = channel_rings(2, geometry.ring_capacity_bytes());
        let mut extractor = WaveformExtractor::new(consumers, &geometry, &config.channels);
        let mut sink = Recorder::default();

        feed(&mut producers[0], &[0.5; 30]);
        feed(&mut producers[1], &[-0.5; 15]);
        assert_eq!(extractor.pull(&mut sink).columns, 1);

        let batch = &sink.batches[0];
        assert_eq!(batch.len(), 2);
        assert!(batch[0].lower <= batch[1].upper);
        assert_eq!(extractor.available_frames(), 5);
    }

    #[test]
    fn pull_is_capped_per_frame() {
        let config = ScopeConfig {
            duration_secs: 1,
            ..ScopeConfig::default()
        };
        // One sample per column.
        let geometry = DisplayGeometry::new(&config, 480, 120, 480);
        assert_eq!(geometry.frames_per_line, 1);

        let (mut producers, consumers) = channel_rings(1, 8192 * 4);
        let mut extractor = WaveformExtractor::new(consumers, &geometry, &config.channels);
        let mut sink = Recorder::default();

        feed(&mut producers[0], &vec![0.0; 5000]);
        let report = extractor.pull(&mut sink);
        assert_eq!(report.columns, MAX_COLUMNS_PER_FRAME);
        assert_eq!(report.backlog, 5000 - MAX_COLUMNS_PER_FRAME);

        let report = extractor.pull(&mut sink);
        assert_eq!(report, PullReport { columns: 5000 - MAX_COLUMNS_PER_FRAME, backlog: 0 });
    }
}
