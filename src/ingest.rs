use std::mem::size_of;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, SyncSender, TrySendError, sync_channel};

use cpal::{FromSample, Sample};

use crate::ring_buffer::{Consumer, Producer, ring_buffer};

const SCRATCH_FRAMES: usize = 256;

const PENDING_RING_SETS: usize = 16;

#[derive(Default)]
pub struct IngestStatus {
    overflowing: AtomicBool,
    episodes: AtomicU64,
    dropped_ticks: AtomicU64,
}

impl IngestStatus {
    pub fn is_overflowing(&self) -> bool {
        self.overflowing.load(Ordering::Relaxed)
    }

    pub fn episodes(&self) -> u64 {
        self.episodes.load(Ordering::Relaxed)
    }

    pub fn dropped_ticks(&self) -> u64 {
        self.dropped_ticks.load(Ordering::Relaxed)
    }

    fn mark_dropped(&self) {
        self.dropped_ticks.fetch_add(1, Ordering::Relaxed);
        if !self.overflowing.swap(true, Ordering::Relaxed) {
            self.episodes.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn mark_ok(&self) {
        self.overflowing.store(false, Ordering::Relaxed);
    }
}

pub struct OverflowReporter {
    status: Arc<IngestStatus>,
    reported_episodes: u64,
    was_overflowing: bool,
}

impl OverflowReporter {
    pub fn new(status: Arc<IngestStatus>) -> Self {
        Self {
            status,
            reported_episodes: 0,
            was_overflowing: false,
        }
    }

    pub fn poll(&mut self) -> bool {
        let episodes = self.status.episodes();
        let overflowing = self.status.is_overflowing();
        let fresh = episodes != self.reported_episodes;
        if fresh {
            log::warn!(
                "Display cannot keep up with audio; dropping input ({} ticks dropped so far)",
                self.status.dropped_ticks()
            );
            self.reported_episodes = episodes;
        } else if self.was_overflowing && !overflowing {
            log::info!("Audio input caught up");
        }
        self.was_overflowing = overflowing;
        fresh
    }
}

pub fn channel_rings(channels: usize, capacity_bytes: usize) -> (Vec<Producer>, Vec<Consumer>) {
    (0..channels).map(|_| ring_buffer(capacity_bytes)).unzip()
}

/// Hands fresh producer sets to the callback and takes retired ones back so
/// they are freed off the real-time thread.
///
/// A set's consumers are released only once its producers are queued, so the
/// reader never waits on rings nobody writes to.
pub struct RingExchange {
    fresh_tx: SyncSender<Vec<Producer>>,
    retired_rx: Receiver<Vec<Producer>>,
    pending: Option<(Vec<Producer>, Vec<Consumer>)>,
}

impl RingExchange {
    pub fn offer(&mut self, producers: Vec<Producer>, consumers: Vec<Consumer>) {
        self.pending = Some((producers, consumers));
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Queues the pending producers for the callback and returns their
    /// consumers, or keeps the set for a later retry when the queue is full.
    pub fn deliver(&mut self) -> Option<Vec<Consumer>> {
        self.collect_retired();
        let (producers, consumers) = self.pending.take()?;
        match self.fresh_tx.try_send(producers) {
            Ok(()) => Some(consumers),
            Err(TrySendError::Full(producers) | TrySendError::Disconnected(producers)) => {
                self.pending = Some((producers, consumers));
                None
            }
        }
    }

    pub fn collect_retired(&self) -> usize {
        let mut count = 0;
        while self.retired_rx.try_recv().is_ok() {
            count += 1;
        }
        count
    }
}

/// Runs inside the audio callback: copies each tick into the channel rings.
///
/// Never blocks, never allocates, never logs.
pub struct AudioIngest {
    producers: Vec<Producer>,
    running: Arc<AtomicBool>,
    status: Arc<IngestStatus>,
    fresh_rx: Receiver<Vec<Producer>>,
    retired_tx: SyncSender<Vec<Producer>>,
}

impl AudioIngest {
    pub fn new(
        producers: Vec<Producer>,
        running: Arc<AtomicBool>,
        status: Arc<IngestStatus>,
    ) -> (Self, RingExchange) {
        let (fresh_tx, fresh_rx) = sync_channel(PENDING_RING_SETS);
        let (retired_tx, retired_rx) = sync_channel(PENDING_RING_SETS);
        (
            Self {
                producers,
                running,
                status,
                fresh_rx,
                retired_tx,
            },
            RingExchange {
                fresh_tx,
                retired_rx,
                pending: None,
            },
        )
    }

    pub fn process<T>(&mut self, interleaved: &[T], stride: usize)
    where
        T: Sample,
        f32: FromSample<T>,
    {
        if !self.running.load(Ordering::Relaxed) {
            return;
        }
        self.swap_in_fresh_rings();

        let channels = self.producers.len().min(stride);
        if channels == 0 {
            return;
        }
        let frames = interleaved.len() / stride;
        let needed = frames * size_of::<f32>();

        // All channels or none: a partial tick would shift one track
        // against the others for good.
        if self.producers[..channels]
            .iter()
            .any(|producer| producer.free_bytes() < needed)
        {
            self.status.mark_dropped();
            return;
        }

        let mut scratch = [0f32; SCRATCH_FRAMES];
        for (channel, producer) in self.producers[..channels].iter_mut().enumerate() {
            let mut frame = 0;
            while frame < frames {
                let count = (frames - frame).min(SCRATCH_FRAMES);
                for (i, slot) in scratch[..count].iter_mut().enumerate() {
                    *slot = interleaved[(frame + i) * stride + channel].to_sample::<f32>();
                }
                if producer
                    .try_write(bytemuck::cast_slice(&scratch[..count]))
                    .is_err()
                {
                    self.status.mark_dropped();
                    return;
                }
                frame += count;
            }
        }
        self.status.mark_ok();
    }

    fn swap_in_fresh_rings(&mut self) {
        while let Ok(fresh) = self.fresh_rx.try_recv() {
            let retired = std::mem::replace(&mut self.producers, fresh);
            let _ = self.retired_tx.try_send(retired);
        }
    }
}
