// Copyright (c) 2024 Mike Tsao

//! Combines the voices into one signal and hands it to the outputs.

use crate::{
    state::MusicalState,
    traits::prelude::*,
    types::{Sample, StereoSample},
    voices::VoiceKind,
};
use cuetrack_services::{AudioQueue, AudioStereoSampleType};
use std::time::{Duration, Instant};

/// Keeps the mix inside [-1.0, 1.0] with a gentle `tanh` curve instead of a
/// hard clip.
#[derive(Debug, Default)]
pub struct SoftLimiter {}
impl TransformsAudio for SoftLimiter {
    fn transform_sample(&mut self, input_sample: Sample) -> Sample {
        Sample((input_sample.0 * Self::DRIVE).tanh() * Self::CEILING)
    }
}
impl SoftLimiter {
    const DRIVE: f64 = 0.8;
    const CEILING: f64 = 0.9;
}

/// Sums the voices with fixed gains.
#[derive(Debug)]
pub struct Mixer {
    limiter: SoftLimiter,
    intensity: f64,
}
impl Default for Mixer {
    fn default() -> Self {
        Self {
            limiter: Default::default(),
            intensity: MusicalState::default().intensity.0,
        }
    }
}
impl Mixer {
    /// The fixed level of each voice before intensity scaling.
    pub fn base_gain(kind: VoiceKind) -> f64 {
        match kind {
            VoiceKind::Lead => 0.5,
            VoiceKind::Rhythm => 0.4,
            VoiceKind::Bass => 0.7,
            VoiceKind::Percussion => 1.0,
        }
    }

    /// The gain applied to a voice at the given intensity. Percussion already
    /// carries intensity in its accents, so it isn't scaled again here.
    pub fn gain(kind: VoiceKind, intensity: f64) -> f64 {
        match kind {
            VoiceKind::Percussion => Self::base_gain(kind),
            _ => Self::base_gain(kind) * intensity,
        }
    }

    /// Mixes `out.len()` frames of the voice buffers into `out`. Every buffer
    /// must hold at least that many frames.
    pub fn mix(
        &mut self,
        voices: &[Vec<Sample>; VoiceKind::COUNT],
        state: &MusicalState,
        out: &mut [StereoSample],
    ) {
        if state.intensity.is_valid() {
            self.intensity = state.intensity.0;
        }
        let gains = [
            Self::gain(VoiceKind::Lead, self.intensity),
            Self::gain(VoiceKind::Rhythm, self.intensity),
            Self::gain(VoiceKind::Bass, self.intensity),
            Self::gain(VoiceKind::Percussion, self.intensity),
        ];
        for (i, frame) in out.iter_mut().enumerate() {
            let sum = voices
                .iter()
                .zip(gains)
                .map(|(buffer, gain)| buffer[i].0 * gain)
                .sum::<f64>();
            *frame = self.limiter.transform_sample(Sample(sum)).into();
        }
    }
}

/// Where mixed audio goes: live playback, a recording, or both.
///
/// Playback drops its oldest frames when the device falls behind, since late
/// audio is useless there. Recording keeps its oldest frames and counts the
/// overflow, which is reported once per run of dropped blocks. A lossless
/// [Sinks] instead waits for the recording to make room.
#[derive(Debug)]
pub struct Sinks {
    playback: Option<AudioQueue>,
    recording: Option<AudioQueue>,
    scratch: Vec<AudioStereoSampleType>,
    lossless: bool,
    recording_overrun: bool,
    recording_dropped: usize,
    frames_delivered: usize,
}
impl Sinks {
    /// How long a lossless delivery sleeps while the recording drains.
    const ROOM_POLL_INTERVAL: Duration = Duration::from_millis(2);

    /// A recording that makes no room for this long has stalled, and
    /// delivery falls back to dropping.
    const ROOM_TIMEOUT: Duration = Duration::from_secs(5);

    /// `block_size` sizes the conversion buffer. Larger deliveries are
    /// handled in pieces.
    pub fn new_with(
        playback: Option<AudioQueue>,
        recording: Option<AudioQueue>,
        block_size: usize,
    ) -> Self {
        let chunk_size = recording
            .as_ref()
            .map_or(block_size, |queue| block_size.min(queue.capacity()))
            .max(1);
        Self {
            playback,
            recording,
            scratch: vec![Default::default(); chunk_size],
            lossless: false,
            recording_overrun: false,
            recording_dropped: 0,
            frames_delivered: 0,
        }
    }

    /// When set, [Sinks::deliver()] blocks until the recording has room
    /// instead of dropping frames. Only for renders that aren't real-time.
    pub fn set_lossless(&mut self, lossless: bool) {
        self.lossless = lossless;
    }

    #[allow(missing_docs)]
    pub fn has_playback(&self) -> bool {
        self.playback.is_some()
    }

    #[allow(missing_docs)]
    pub fn has_recording(&self) -> bool {
        self.recording.is_some()
    }

    /// Writes the same frames to every sink. Never blocks unless lossless.
    pub fn deliver(&mut self, frames: &[StereoSample]) {
        for chunk in frames.chunks(self.scratch.len()) {
            let scratch = &mut self.scratch[..chunk.len()];
            for (dst, src) in scratch.iter_mut().zip(chunk) {
                *dst = src.to_f32_pair();
            }
            if let Some(playback) = &self.playback {
                playback.force_push_frames(scratch);
            }
            if let Some(recording) = &self.recording {
                if self.lossless {
                    let deadline = Instant::now() + Self::ROOM_TIMEOUT;
                    while recording.room() < scratch.len() && Instant::now() < deadline {
                        std::thread::sleep(Self::ROOM_POLL_INTERVAL);
                    }
                }
                let dropped = recording.push_frames(scratch);
                if dropped > 0 && !self.recording_overrun {
                    log::warn!("Recording can't keep up; dropping frames");
                }
                self.recording_overrun = dropped > 0;
                self.recording_dropped += dropped;
            }
            self.frames_delivered += chunk.len();
        }
    }

    /// Frames the recording sink had to drop.
    pub fn recording_dropped(&self) -> usize {
        self.recording_dropped
    }

    #[allow(missing_docs)]
    pub fn frames_delivered(&self) -> usize {
        self.frames_delivered
    }
}
