// Copyright (c) 2024 Mike Tsao

use crate::types::{SampleRate, Seconds, Tempo, TimeSignature};

/// Where a render span begins, in bars and frames. Voices get one of these
/// with every span, and because spans never cross a bar line, everything
/// here holds for the whole span.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClockPosition {
    #[allow(missing_docs)]
    pub sample_rate: SampleRate,
    /// Zero-based index of the bar being played.
    pub bar: usize,
    /// Frames since the bar started.
    pub frame_in_bar: usize,
    /// Frames in one beat of this bar. Fixed for the bar's duration.
    pub frames_per_beat: usize,
    #[allow(missing_docs)]
    pub beats_per_bar: usize,
}
impl ClockPosition {
    #[allow(missing_docs)]
    pub fn frames_per_bar(&self) -> usize {
        self.frames_per_beat * self.beats_per_bar
    }

    /// Frames left before the next bar line.
    pub fn frames_until_bar_end(&self) -> usize {
        self.frames_per_bar().saturating_sub(self.frame_in_bar)
    }

    /// The frame offset, from the start of the bar, of a fractional beat
    /// position such as 2.75.
    pub fn beat_to_frame(&self, beat: f64) -> usize {
        (beat.max(0.0) * self.frames_per_beat as f64).round() as usize
    }

    /// How long a beat lasts in this bar.
    pub fn beat_duration(&self) -> Seconds {
        self.sample_rate.seconds_for(self.frames_per_beat)
    }

    /// The current position within the bar, in beats.
    pub fn beat_in_bar(&self) -> f64 {
        self.frame_in_bar as f64 / self.frames_per_beat.max(1) as f64
    }
}

/// A sample-driven musical clock. It only moves when frames are rendered,
/// and its tempo changes only when a new bar starts.
#[derive(Debug)]
pub struct Clock {
    base_tempo: Tempo,
    tempo_multiplier: f64,
    time_signature: TimeSignature,
    position: ClockPosition,
    total_frames: usize,
}
impl Clock {
    /// Starts a clock at bar zero, frame zero.
    pub fn new_with(
        sample_rate: SampleRate,
        base_tempo: Tempo,
        time_signature: TimeSignature,
        tempo_multiplier: f64,
    ) -> Self {
        let beats_per_bar = time_signature.top().max(1);
        Self {
            base_tempo,
            tempo_multiplier,
            time_signature,
            position: ClockPosition {
                sample_rate,
                bar: 0,
                frame_in_bar: 0,
                frames_per_beat: Self::frames_per_beat_for(
                    sample_rate,
                    base_tempo,
                    tempo_multiplier,
                ),
                beats_per_bar,
            },
            total_frames: 0,
        }
    }

    /// Frames per beat at the given tempo, rounded to the nearest frame and
    /// never less than one. A whole number of frames per beat keeps every bar
    /// exactly `beats_per_bar` beats long.
    pub fn frames_per_beat_for(
        sample_rate: SampleRate,
        base_tempo: Tempo,
        tempo_multiplier: f64,
    ) -> usize {
        let bpm = base_tempo.0 * tempo_multiplier;
        ((sample_rate.0 as f64 * 60.0 / bpm).round() as usize).max(1)
    }

    #[allow(missing_docs)]
    pub fn position(&self) -> ClockPosition {
        self.position
    }

    /// The multiplier latched at the start of the current bar.
    pub fn tempo_multiplier(&self) -> f64 {
        self.tempo_multiplier
    }

    #[allow(missing_docs)]
    pub fn time_signature(&self) -> TimeSignature {
        self.time_signature
    }

    #[allow(missing_docs)]
    pub fn frames_until_bar_end(&self) -> usize {
        self.position.frames_until_bar_end()
    }

    /// Moves forward by `frames`, which must not pass the end of the current
    /// bar. Returns true if the bar is now complete.
    pub fn advance(&mut self, frames: usize) -> bool {
        let frames = frames.min(self.frames_until_bar_end());
        self.position.frame_in_bar += frames;
        self.total_frames += frames;
        self.frames_until_bar_end() == 0
    }

    /// Starts the next bar, latching the tempo that it will play at.
    pub fn start_next_bar(&mut self, tempo_multiplier: f64) {
        self.position.bar += 1;
        self.position.frame_in_bar = 0;
        self.tempo_multiplier = tempo_multiplier;
        self.position.frames_per_beat =
            Self::frames_per_beat_for(self.position.sample_rate, self.base_tempo, tempo_multiplier);
    }

    /// Every frame rendered so far.
    pub fn total_frames(&self) -> usize {
        self.total_frames
    }

    /// Rendered time since the clock started.
    pub fn elapsed(&self) -> Seconds {
        self.position.sample_rate.seconds_for(self.total_frames)
    }
}
