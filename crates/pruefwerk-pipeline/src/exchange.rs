// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Frame exchange — a single-slot, latest-wins mailbox between the capture
// thread and the recognition thread.
//
// The producer never blocks: `publish` overwrites whatever frame is still
// waiting. The consumer takes the slot with `claim` and may see gaps in the
// sequence numbers under load.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use image::DynamicImage;
use tracing::trace;

/// One captured image.
///
/// Owned by the capture thread until published, then by whichever consumer
/// claims it.
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: DynamicImage,
    /// Assigned by the producer, strictly increasing per session.
    pub sequence: u64,
    pub captured_at: DateTime<Utc>,
}

impl Frame {
    /// Wrap `image`, stamped with the current time.
    pub fn new(image: DynamicImage, sequence: u64) -> Self {
        Self {
            image,
            sequence,
            captured_at: Utc::now(),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Channels per pixel (1 for mono sensors, 3 for colour).
    pub fn channels(&self) -> u8 {
        self.image.color().channel_count()
    }
}

/// Latest-wins mailbox holding at most one unclaimed frame.
#[derive(Debug, Default)]
pub struct FrameExchange {
    slot: Mutex<Option<Frame>>,
    published: AtomicU64,
    dropped: AtomicU64,
}

impl FrameExchange {
    pub fn new() -> Self {
        Self::default()
    }

    /// A poisoned lock only means a thread panicked mid-swap; the slot itself
    /// is still a valid `Option<Frame>`.
    fn slot(&self) -> MutexGuard<'_, Option<Frame>> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Store `frame`, replacing any frame nobody claimed yet.
    pub fn publish(&self, frame: Frame) {
        let sequence = frame.sequence;
        let replaced = self.slot().replace(frame);
        self.published.fetch_add(1, Ordering::Relaxed);
        if let Some(stale) = replaced {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            trace!(stale = stale.sequence, sequence, "Unclaimed frame replaced");
        }
    }

    /// Take the waiting frame, leaving the slot empty.
    pub fn claim(&self) -> Option<Frame> {
        self.slot().take()
    }

    /// Whether a frame is waiting.
    pub fn is_pending(&self) -> bool {
        self.slot().is_some()
    }

    /// Frames published so far.
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Frames overwritten before anyone claimed them.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};
    use std::sync::Arc;

    fn frame(sequence: u64) -> Frame {
        Frame::new(
            DynamicImage::ImageLuma8(GrayImage::from_pixel(2, 2, Luma([sequence as u8]))),
            sequence,
        )
    }

    #[test]
    fn empty_exchange_claims_nothing() {
        let exchange = FrameExchange::new();
        assert!(exchange.claim().is_none());
        assert!(!exchange.is_pending());
    }

    #[test]
    fn latest_publish_wins() {
        let exchange = FrameExchange::new();
        for sequence in 1..=5 {
            exchange.publish(frame(sequence));
        }

        let claimed = exchange.claim().expect("one frame waiting");
        assert_eq!(claimed.sequence, 5);
        assert!(exchange.claim().is_none());
        assert_eq!(exchange.published(), 5);
        assert_eq!(exchange.dropped(), 4);
    }

    #[test]
    fn claim_between_publishes_drops_nothing() {
        let exchange = FrameExchange::new();
        exchange.publish(frame(1));
        assert_eq!(exchange.claim().map(|f| f.sequence), Some(1));
        exchange.publish(frame(2));
        assert_eq!(exchange.claim().map(|f| f.sequence), Some(2));
        assert_eq!(exchange.dropped(), 0);
    }

    #[test]
    fn frame_reports_layout() {
        let f = frame(3);
        assert_eq!((f.width(), f.height(), f.channels()), (2, 2, 1));
    }

    #[test]
    fn concurrent_claims_see_increasing_sequences() {
        let exchange = Arc::new(FrameExchange::new());
        let producer = {
            let exchange = Arc::clone(&exchange);
            std::thread::spawn(move || {
                for sequence in 1..=500 {
                    exchange.publish(frame(sequence));
                }
            })
        };

        let mut last = 0;
        let mut seen = 0u64;
        while seen < 500 && !(producer.is_finished() && !exchange.is_pending()) {
            if let Some(f) = exchange.claim() {
                assert!(f.sequence > last, "sequence went backwards");
                last = f.sequence;
                seen += 1;
            }
        }
        producer.join().expect("producer panicked");
        if let Some(f) = exchange.claim() {
            assert!(f.sequence > last);
            seen += 1;
        }
        assert_eq!(seen + exchange.dropped(), 500);
    }
}
