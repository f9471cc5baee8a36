// Copyright (c) 2024 Mike Tsao

//! Data types shared among services.

use crossbeam::{
    channel::{Receiver, Sender},
    queue::ArrayQueue,
};
use delegate::delegate;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

/// The fundamental type of an audio sample.
pub type AudioSampleType = f32;
/// (left channel, right channel)
pub type AudioStereoSampleType = (AudioSampleType, AudioSampleType);

/// A convenience struct to bundle both halves of a crossbeam channel together.
#[derive(Debug)]
pub struct CrossbeamChannel<T> {
    #[allow(missing_docs)]
    pub sender: Sender<T>,
    #[allow(missing_docs)]
    pub receiver: Receiver<T>,
}
impl<T> Default for CrossbeamChannel<T> {
    fn default() -> Self {
        let (sender, receiver) = crossbeam::channel::unbounded();
        Self { sender, receiver }
    }
}

/// A ring buffer of stereo frames shared between a producer (the render loop)
/// and a consumer (an audio device or a file writer). Cloning it produces
/// another handle to the same buffer.
///
/// Neither [AudioQueue::push_frames()] nor [AudioQueue::force_push_frames()]
/// allocates or blocks, so both are safe to call from a real-time thread.
///
/// Frames that [AudioQueue::push_frames()] turns away are tallied, so the
/// consumer can find out that it missed something.
#[derive(Debug)]
pub struct AudioQueue(Arc<AudioQueueInner>);
#[derive(Debug)]
struct AudioQueueInner {
    frames: ArrayQueue<AudioStereoSampleType>,
    dropped: AtomicUsize,
}
impl AudioQueue {
    /// Creates a queue that holds up to `capacity` frames.
    pub fn new(capacity: usize) -> Self {
        Self(Arc::new(AudioQueueInner {
            frames: ArrayQueue::new(capacity.max(1)),
            dropped: AtomicUsize::default(),
        }))
    }

    delegate! {
        to self.0.frames {
            /// The number of frames waiting to be consumed.
            pub fn len(&self) -> usize;
            /// The maximum number of frames the queue can hold.
            pub fn capacity(&self) -> usize;
            /// Whether there is nothing to consume.
            pub fn is_empty(&self) -> bool;
            /// Removes the oldest frame.
            pub fn pop(&self) -> Option<AudioStereoSampleType>;
        }
    }

    /// Appends frames, dropping the oldest queued frames if there isn't room.
    /// Returns the number of frames that were dropped. Suited to live playback,
    /// where stale audio is worth less than fresh audio.
    pub fn force_push_frames(&self, frames: &[AudioStereoSampleType]) -> usize {
        frames
            .iter()
            .filter(|frame| self.0.frames.force_push(**frame).is_some())
            .count()
    }

    /// Appends frames until the queue is full. Returns the number of frames
    /// that didn't fit. Suited to recording, where the consumer must see the
    /// frames in order and gaps are preferable to reordering.
    pub fn push_frames(&self, frames: &[AudioStereoSampleType]) -> usize {
        let dropped = frames
            .iter()
            .filter(|frame| self.0.frames.push(**frame).is_err())
            .count();
        if dropped > 0 {
            self.0.dropped.fetch_add(dropped, Ordering::Relaxed);
        }
        dropped
    }

    /// Returns how many frames [AudioQueue::push_frames()] has turned away
    /// since the last call, and resets the count.
    pub fn take_dropped(&self) -> usize {
        self.0.dropped.swap(0, Ordering::Relaxed)
    }

    /// The number of frames that can be pushed right now without loss.
    pub fn room(&self) -> usize {
        self.0.frames.capacity().saturating_sub(self.0.frames.len())
    }
}
impl Clone for AudioQueue {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_queue() {
        let queue = AudioQueue::new(8);
        assert_eq!(queue.pop(), None);

        queue.force_push_frames(&[(0.5, -0.5)]);
        assert_eq!(queue.pop(), Some((0.5, -0.5)));
    }

    #[test]
    fn audio_queue_overflow_policies() {
        let queue = AudioQueue::new(2);
        assert_eq!(queue.push_frames(&[(0.1, 0.1), (0.2, 0.2), (0.3, 0.3)]), 1);
        assert_eq!(queue.pop(), Some((0.1, 0.1)), "push keeps the oldest frames");
        assert_eq!(queue.take_dropped(), 1);
        assert_eq!(queue.take_dropped(), 0, "taking resets the tally");
        assert_eq!(queue.room(), 1);

        let queue = AudioQueue::new(2);
        assert_eq!(
            queue.force_push_frames(&[(0.1, 0.1), (0.2, 0.2), (0.3, 0.3)]),
            1
        );
        assert_eq!(
            queue.pop(),
            Some((0.2, 0.2)),
            "force_push keeps the newest frames"
        );
        assert_eq!(queue.take_dropped(), 0, "only push tallies drops");
    }

    #[test]
    fn clones_share_storage() {
        let queue = AudioQueue::new(4);
        let other = queue.clone();
        queue.push_frames(&[(1.0, 1.0)]);
        assert_eq!(other.len(), 1);
    }

    #[test]
    fn crossbeam_channel() {
        let channel = CrossbeamChannel::default();

        let _ = channel.sender.send(42);

        assert_eq!(channel.receiver.recv().unwrap(), 42);
    }
}
