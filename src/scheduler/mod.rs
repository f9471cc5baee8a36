// Copyright (c) 2024 Mike Tsao

//! The bar-quantized heart of the engine.
//!
//! [StateScheduler] owns the applied [MusicalState], the clock, the voices,
//! and the mixer. Every render call is cut into spans that never cross a bar
//! line. At each bar line the pending state is promoted, the tempo latches,
//! and a [ScoreEvent::Bar] goes out.

use crate::{
    mixer::Mixer,
    score::{ScoreEvent, ScoreSender},
    state::{MusicalState, PendingState},
    traits::RendersVoice,
    types::{Sample, SampleRate, Seconds, StereoSample, Tempo, TimeSignature},
    voices::{Voice, VoiceKind},
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use strum_macros::Display;

pub use clock::{Clock, ClockPosition};

mod clock;

/// Where the performance is in its life.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum Lifecycle {
    /// The first bar, which always plays the startup defaults.
    WarmUp,
    /// Bars are being played and promoted normally.
    Running,
    /// Shutdown was requested. The current bar plays out, then we stop.
    Draining,
    /// Terminal. Renders silence.
    Stopped,
}

/// Turns pending state and elapsed frames into audio, one bar at a time.
#[derive(Debug)]
pub struct StateScheduler {
    lifecycle: Lifecycle,
    applied: MusicalState,
    pending: PendingState,
    clock: Clock,
    voices: [Voice; VoiceKind::COUNT],
    buffers: [Vec<Sample>; VoiceKind::COUNT],
    mixer: Mixer,
    cancellation: Arc<AtomicBool>,
    score: ScoreSender,
    max_bars: Option<usize>,
}
impl StateScheduler {
    /// `block_capacity` is the most frames any single span will cover; the
    /// voice buffers are allocated once at this size.
    #[allow(clippy::too_many_arguments)]
    pub fn new_with(
        sample_rate: SampleRate,
        base_tempo: Tempo,
        block_capacity: usize,
        seed: u128,
        pending: PendingState,
        cancellation: Arc<AtomicBool>,
        score: ScoreSender,
        max_bars: Option<usize>,
    ) -> Self {
        let applied = MusicalState::default();
        let block_capacity = block_capacity.max(1);
        Self {
            lifecycle: Lifecycle::WarmUp,
            applied,
            pending,
            clock: Clock::new_with(
                sample_rate,
                base_tempo,
                TimeSignature::COMMON_TIME,
                applied.tempo_multiplier,
            ),
            voices: Voice::ensemble(sample_rate, seed),
            buffers: core::array::from_fn(|_| vec![Sample::SILENCE; block_capacity]),
            mixer: Mixer::default(),
            cancellation,
            score,
            max_bars,
        }
    }

    /// Fills `out` with the next frames of the performance. Returns how many
    /// frames were actually performed; anything after that is silence, which
    /// only happens once the scheduler has stopped.
    pub fn render(&mut self, out: &mut [StereoSample]) -> usize {
        let mut rendered = 0;
        while rendered < out.len() {
            self.check_cancellation();
            if self.lifecycle == Lifecycle::Stopped {
                break;
            }
            let span = (out.len() - rendered)
                .min(self.clock.frames_until_bar_end())
                .min(self.buffers[0].len());
            let position = self.clock.position();
            for (voice, buffer) in self.voices.iter_mut().zip(self.buffers.iter_mut()) {
                voice.render(&mut buffer[..span], &self.applied, &position);
            }
            self.mixer
                .mix(&self.buffers, &self.applied, &mut out[rendered..rendered + span]);
            rendered += span;
            if self.clock.advance(span) {
                self.on_bar_line();
            }
        }
        out[rendered..].fill(StereoSample::SILENCE);
        rendered
    }

    fn check_cancellation(&mut self) {
        if matches!(self.lifecycle, Lifecycle::WarmUp | Lifecycle::Running)
            && self.cancellation.load(Ordering::Relaxed)
        {
            log::info!("Finishing bar {} before stopping", self.clock.position().bar + 1);
            self.lifecycle = Lifecycle::Draining;
        }
    }

    fn on_bar_line(&mut self) {
        self.applied = self.pending.snapshot();
        let tempo_multiplier = if MusicalState::is_tempo_multiplier_valid(
            self.applied.tempo_multiplier,
        ) {
            self.applied.tempo_multiplier
        } else {
            log::warn!(
                "Ignoring tempo multiplier {}; keeping the previous tempo",
                self.applied.tempo_multiplier
            );
            self.clock.tempo_multiplier()
        };
        self.clock.start_next_bar(tempo_multiplier);

        let bar = self.clock.position().bar;
        self.score.emit(ScoreEvent::Bar {
            bar,
            elapsed: self.clock.elapsed(),
            state: self.applied,
        });

        self.lifecycle = match self.lifecycle {
            Lifecycle::WarmUp | Lifecycle::Running
                if self.max_bars.is_some_and(|max| bar >= max) =>
            {
                log::info!("Played {bar} bars; stopping");
                Lifecycle::Stopped
            }
            Lifecycle::WarmUp => Lifecycle::Running,
            Lifecycle::Draining => {
                log::info!("Drained; stopping after {bar} bars");
                Lifecycle::Stopped
            }
            other => other,
        };
    }

    /// Asks the scheduler to finish the current bar and stop.
    pub fn request_stop(&self) {
        self.cancellation.store(true, Ordering::Relaxed);
    }

    #[allow(missing_docs)]
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// The state the voices are currently playing.
    pub fn applied(&self) -> &MusicalState {
        &self.applied
    }

    #[allow(missing_docs)]
    pub fn position(&self) -> ClockPosition {
        self.clock.position()
    }

    /// Frames performed since the start.
    pub fn total_frames(&self) -> usize {
        self.clock.total_frames()
    }

    /// Rendered time since the start.
    pub fn elapsed(&self) -> Seconds {
        self.clock.elapsed()
    }

    /// Bars completed so far.
    pub fn bars_completed(&self) -> usize {
        self.clock.position().bar
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        score::{ScoreBuffer, ScoreLogger},
        state::{ChordType, StateDelta},
        types::MidiNote,
    };
    use more_asserts::assert_lt;

    const SAMPLE_RATE: SampleRate = SampleRate::new(8000);

    // 120 BPM at 8 kHz: 4000 frames per beat, 16000 per bar.
    fn scheduler_with(
        score: ScoreSender,
        max_bars: Option<usize>,
    ) -> (StateScheduler, PendingState) {
        let pending = PendingState::default();
        let scheduler = StateScheduler::new_with(
            SAMPLE_RATE,
            Tempo(120.0),
            512,
            1234,
            pending.clone(),
            Arc::new(AtomicBool::new(false)),
            score,
            max_bars,
        );
        (scheduler, pending)
    }

    fn render_frames(scheduler: &mut StateScheduler, frames: usize) -> usize {
        let mut block = [StereoSample::SILENCE; 700];
        let mut rendered = 0;
        while rendered < frames {
            let want = (frames - rendered).min(block.len());
            let got = scheduler.render(&mut block[..want]);
            rendered += got;
            if got < want {
                break;
            }
        }
        rendered
    }

    #[test]
    fn bars_are_four_beats_long() {
        let (mut scheduler, _) = scheduler_with(ScoreSender::disabled(), None);
        assert_eq!(scheduler.lifecycle(), Lifecycle::WarmUp);
        assert_eq!(scheduler.position().frames_per_bar(), 16000);

        render_frames(&mut scheduler, 15999);
        assert_eq!(scheduler.bars_completed(), 0);
        render_frames(&mut scheduler, 1);
        assert_eq!(scheduler.bars_completed(), 1);
        assert_eq!(scheduler.lifecycle(), Lifecycle::Running);
        render_frames(&mut scheduler, 16000 * 3);
        assert_eq!(scheduler.bars_completed(), 4);
        assert_eq!(scheduler.elapsed(), Seconds(8.0));
    }

    #[test]
    fn state_changes_wait_for_the_bar_line() {
        let (mut scheduler, pending) = scheduler_with(ScoreSender::disabled(), None);
        render_frames(&mut scheduler, 5000);
        pending.apply(&StateDelta {
            root: Some(MidiNote(58)),
            tempo_multiplier: Some(0.85),
            ..Default::default()
        });
        render_frames(&mut scheduler, 5000);
        assert_eq!(scheduler.applied().root, MidiNote(60));
        assert_eq!(scheduler.position().frames_per_beat, 4000);

        render_frames(&mut scheduler, 6000);
        assert_eq!(scheduler.applied().root, MidiNote(58));
        assert_eq!(
            scheduler.position().frames_per_beat,
            Clock::frames_per_beat_for(SAMPLE_RATE, Tempo(120.0), 0.85)
        );
    }

    #[test]
    fn last_write_in_a_bar_wins() {
        let (mut scheduler, pending) = scheduler_with(ScoreSender::disabled(), None);
        pending.apply(&StateDelta {
            chord: Some(ChordType::Maj9),
            ..Default::default()
        });
        render_frames(&mut scheduler, 100);
        pending.apply(&StateDelta {
            chord: Some(ChordType::Maj7),
            ..Default::default()
        });
        render_frames(&mut scheduler, 15900);
        assert_eq!(scheduler.applied().chord, ChordType::Maj7);
    }

    #[test]
    fn draining_finishes_the_bar() {
        let (mut scheduler, _) = scheduler_with(ScoreSender::disabled(), None);
        render_frames(&mut scheduler, 16000 + 3000);
        scheduler.request_stop();

        let mut block = [StereoSample::MAX; 20000];
        let rendered = scheduler.render(&mut block);
        assert_eq!(rendered, 13000, "the rest of bar 2, then nothing");
        assert_eq!(scheduler.lifecycle(), Lifecycle::Stopped);
        assert_eq!(scheduler.bars_completed(), 2);
        assert!(block[rendered..]
            .iter()
            .all(|frame| *frame == StereoSample::SILENCE));

        let mut block = [StereoSample::MAX; 64];
        assert_eq!(scheduler.render(&mut block), 0);
        assert!(block.iter().all(|frame| *frame == StereoSample::SILENCE));
    }

    #[test]
    fn stops_after_max_bars() {
        let buffer = ScoreBuffer::default();
        let logger = ScoreLogger::new_with(Box::new(buffer.clone())).unwrap();
        let (mut scheduler, _) = scheduler_with(logger.sender(), Some(3));
        let rendered = render_frames(&mut scheduler, 16000 * 10);
        assert_eq!(rendered, 16000 * 3);
        assert_eq!(scheduler.lifecycle(), Lifecycle::Stopped);
        assert_eq!(logger.finish(), 3);

        let lines = buffer.lines();
        assert!(lines[0].starts_with("[   2.00s] Bar    1 | root=60 chord=maj7"));
        assert!(lines[2].starts_with("[   6.00s] Bar    3 |"));
    }

    #[test]
    fn output_stays_in_range() {
        let (mut scheduler, pending) = scheduler_with(ScoreSender::disabled(), None);
        pending.apply(&StateDelta {
            density: Some(crate::types::Normal::new_const(1.0)),
            intensity: Some(crate::types::Normal::new_const(1.0)),
            ..Default::default()
        });
        let mut block = [StereoSample::SILENCE; 4000];
        for _ in 0..10 {
            scheduler.render(&mut block);
            for frame in block {
                assert_lt!(frame.0 .0.abs(), 0.9 + f64::EPSILON);
            }
        }
    }
}
