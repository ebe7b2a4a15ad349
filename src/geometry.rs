use std::mem::size_of;

use crate::config::ScopeConfig;

const MIN_RING_SECONDS: u64 = 2;
const MIN_RING_WINDOWS: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Track {
    pub offset: usize,
    pub height: usize,
    /// Always odd (or zero) so a flat signal sits on a single center row.
    pub draw_height: usize,
}

impl Track {
    fn new(offset: usize, height: usize) -> Self {
        let draw_height = if height % 2 == 0 {
            height.saturating_sub(1)
        } else {
            height
        };
        Self {
            offset,
            height,
            draw_height,
        }
    }
}

/// Every size-dependent number of the pipeline, derived in one go.
///
/// A new value is built whenever width, height, duration, sample rate or
/// channel count change; nothing here is patched in place.
#[derive(Clone, Debug, PartialEq)]
pub struct DisplayGeometry {
    pub width: usize,
    pub height: usize,
    pub sample_rate: u32,
    pub duration_secs: u32,
    pub frames_per_line: usize,
    pub tracks: Vec<Track>,
    requested_heights: Vec<Option<usize>>,
}

impl DisplayGeometry {
    pub fn new(config: &ScopeConfig, width: usize, height: usize, sample_rate: u32) -> Self {
        let requested_heights = config.channels.iter().map(|c| c.height).collect();
        Self::build(
            width,
            height,
            sample_rate,
            config.duration_secs,
            requested_heights,
        )
    }

    fn build(
        width: usize,
        height: usize,
        sample_rate: u32,
        duration_secs: u32,
        requested_heights: Vec<Option<usize>>,
    ) -> Self {
        let width = width.max(1);
        Self {
            width,
            height,
            sample_rate,
            duration_secs,
            frames_per_line: frames_per_line(sample_rate, duration_secs, width),
            tracks: layout_tracks(&requested_heights, height),
            requested_heights,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn clamped(&self, max_side: usize) -> Option<Self> {
        if self.width <= max_side && self.height <= max_side {
            return None;
        }
        Some(Self::build(
            self.width.min(max_side),
            self.height.min(max_side),
            self.sample_rate,
            self.duration_secs,
            self.requested_heights.clone(),
        ))
    }

    pub fn ring_capacity_bytes(&self) -> usize {
        let seconds = (self.duration_secs as u64).max(MIN_RING_SECONDS);
        let frames = (self.sample_rate as u64 * seconds) as usize;
        frames.max(self.frames_per_line * MIN_RING_WINDOWS) * size_of::<f32>()
    }
}

/// Samples reduced into one pixel column; at least one so the reader always
/// makes progress.
pub fn frames_per_line(sample_rate: u32, duration_secs: u32, width: usize) -> usize {
    let total = sample_rate as u64 * duration_secs as u64;
    ((total / width.max(1) as u64) as usize).max(1)
}

/// Explicit heights are honored when they fit; channels without one share
/// whatever is left. Oversized requests are scaled down into `height`.
fn layout_tracks(requested: &[Option<usize>], height: usize) -> Vec<Track> {
    let explicit_sum: usize = requested.iter().flatten().sum();
    let auto_count = requested.iter().filter(|h| h.is_none()).count();

    let auto_height = if auto_count == 0 {
        0
    } else {
        height.saturating_sub(explicit_sum) / auto_count
    };
    let squeeze = explicit_sum > height;

    let mut offset = 0;
    requested
        .iter()
        .map(|request| {
            let track_height = match request {
                Some(h) if squeeze => h * height / explicit_sum,
                Some(h) => *h,
                None => auto_height,
            };
            let track = Track::new(offset, track_height);
            offset += track_height;
            track
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChannelStyle;

    fn config_with_heights(heights: &[Option<usize>]) -> ScopeConfig {
        ScopeConfig {
            channels: heights
                .iter()
                .map(|h| ChannelStyle {
                    height: *h,
                    ..ChannelStyle::default()
                })
                .collect(),
            ..ScopeConfig::default()
        }
    }

    #[test]
    fn five_seconds_across_480_pixels_at_48k() {
        let geometry = DisplayGeometry::new(&ScopeConfig::default(), 480, 120, 48_000);
        assert_eq!(geometry.frames_per_line, 500);
    }

    #[test]
    fn frames_per_line_never_zero() {
        assert_eq!(frames_per_line(10, 1, 480), 1);
        assert_eq!(frames_per_line(0, 5, 480), 1);
        assert_eq!(frames_per_line(48_000, 5, 0), 240_000);
    }

    #[test]
    fn equal_tracks_have_odd_draw_height() {
        let geometry = DisplayGeometry::new(&config_with_heights(&[None, None]), 480, 240, 44_100);
        assert_eq!(
            geometry.tracks,
            vec![
                Track {
                    offset: 0,
                    height: 120,
                    draw_height: 119
                },
                Track {
                    offset: 120,
                    height: 120,
                    draw_height: 119
                },
            ]
        );
    }

    #[test]
    fn mixed_explicit_and_shared_heights() {
        let geometry =
            DisplayGeometry::new(&config_with_heights(&[Some(51), None, None]), 100, 251, 48_000);
        let heights: Vec<usize> = geometry.tracks.iter().map(|t| t.height).collect();
        let offsets: Vec<usize> = geometry.tracks.iter().map(|t| t.offset).collect();
        assert_eq!(heights, vec![51, 100, 100]);
        assert_eq!(offsets, vec![0, 51, 151]);
        assert_eq!(geometry.tracks[0].draw_height, 51);
    }

    #[test]
    fn oversized_explicit_heights_are_squeezed() {
        let geometry =
            DisplayGeometry::new(&config_with_heights(&[Some(300), Some(100)]), 100, 200, 48_000);
        let heights: Vec<usize> = geometry.tracks.iter().map(|t| t.height).collect();
        assert_eq!(heights, vec![150, 50]);
    }

    #[test]
    fn clamping_rebuilds_tracks_and_window() {
        let geometry = DisplayGeometry::new(&config_with_heights(&[None, None]), 4000, 3000, 48_000);
        let clamped = geometry.clamped(2048).unwrap();
        assert_eq!(clamped.width, 2048);
        assert_eq!(clamped.height, 2048);
        assert_eq!(clamped.tracks[1].offset, 1024);
        assert_eq!(clamped.frames_per_line, 48_000 * 5 / 2048);
        assert!(clamped.clamped(2048).is_none());
    }

    #[test]
    fn ring_holds_several_windows() {
        let geometry = DisplayGeometry::new(&ScopeConfig::default(), 480, 120, 48_000);
        assert_eq!(geometry.ring_capacity_bytes(), 48_000 * 5 * 4);

        let tiny = DisplayGeometry::new(&ScopeConfig::default(), 1, 120, 48_000);
        assert_eq!(tiny.ring_capacity_bytes(), 240_000 * 4 * 4);
    }
}
