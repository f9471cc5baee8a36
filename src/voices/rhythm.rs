// Copyright (c) 2024 Mike Tsao

use super::{BarPlan, Gate, StateGuard, VoiceKind};
use crate::{
    elements::{Envelope, Oscillator, Waveform},
    scheduler::ClockPosition,
    state::{ChordType, MusicalState},
    traits::prelude::*,
    types::{FrequencyHz, MidiNote, Normal, Sample, SampleRate, Seconds},
    util::Rng,
};

const COMP_BEATS: [f64; 6] = [0.0, 0.5, 1.5, 2.0, 3.0, 3.5];
const FUNDAMENTAL_LEVEL: f64 = 0.15;
const HARMONIC_LEVEL: f64 = 0.05;
const TREMOLO_HZ: f64 = 4.0;
const TREMOLO_DEPTH: f64 = 0.1;

#[derive(Clone, Copy, Debug, Default)]
struct Hit {
    duration: usize,
}

/// Rhodes-style comping on the current chord.
#[derive(Debug)]
pub struct RhythmVoice {
    rng: Rng,
    guard: StateGuard,
    plan: BarPlan<Hit, { COMP_BEATS.len() }>,
    voicing: Option<(MidiNote, ChordType)>,
    note_count: usize,

    fundamentals: [Oscillator; ChordType::MAX_NOTES],
    harmonics: [Oscillator; ChordType::MAX_NOTES],
    tremolo: Oscillator,
    envelope: Envelope,
    gate: Gate,
}
impl RendersVoice for RhythmVoice {
    fn render(&mut self, out: &mut [Sample], state: &MusicalState, clock: &ClockPosition) {
        if self.plan.is_stale(clock) {
            let state = self.guard.check(state);
            self.plan_bar(&state, clock);
        }
        for (i, sample) in out.iter_mut().enumerate() {
            while let Some(hit) = self.plan.next_due(clock.frame_in_bar + i) {
                self.envelope.trigger_attack();
                self.gate.open_for(hit.duration);
            }
            if self.gate.tick() {
                self.envelope.trigger_release();
            }
            *sample = self.next_chord();
        }
    }
}
impl RhythmVoice {
    #[allow(missing_docs)]
    pub fn new_with(sample_rate: SampleRate, rng: Rng) -> Self {
        let mut tremolo = Oscillator::new_with(Waveform::Sine, sample_rate);
        tremolo.set_frequency(FrequencyHz(TREMOLO_HZ));
        Self {
            rng,
            guard: StateGuard::new_with(VoiceKind::Rhythm),
            plan: Default::default(),
            voicing: None,
            note_count: 0,
            fundamentals: core::array::from_fn(|_| {
                Oscillator::new_with(Waveform::Sine, sample_rate)
            }),
            harmonics: core::array::from_fn(|_| Oscillator::new_with(Waveform::Sine, sample_rate)),
            tremolo,
            envelope: Envelope::new_with(
                sample_rate,
                Seconds(0.01),
                Seconds(0.2),
                Normal::new_const(0.5),
                Seconds(0.3),
            ),
            gate: Default::default(),
        }
    }

    /// Root an octave down, chord tones above it, and the extensions past the
    /// seventh spread up another octave.
    fn voice_chord(root: MidiNote, chord: ChordType) -> ([MidiNote; ChordType::MAX_NOTES], usize) {
        let mut notes = [MidiNote::default(); ChordType::MAX_NOTES];
        let intervals = chord.intervals();
        notes[0] = root.transposed(-12);
        for (i, interval) in intervals.iter().enumerate().skip(1) {
            let spread = if i > 2 { 12 } else { 0 };
            notes[i] = root.transposed(interval + spread);
        }
        (notes, intervals.len())
    }

    fn revoice(&mut self, root: MidiNote, chord: ChordType) {
        if self.voicing == Some((root, chord)) {
            return;
        }
        self.voicing = Some((root, chord));
        let (notes, len) = Self::voice_chord(root, chord);
        for (i, note) in notes[..len].iter().enumerate() {
            let frequency: FrequencyHz = (*note).into();
            self.fundamentals[i].set_frequency(frequency);
            self.harmonics[i].set_frequency(frequency * 2.0);
        }
        self.note_count = len;
    }

    fn plan_bar(&mut self, state: &MusicalState, clock: &ClockPosition) {
        self.plan.start(clock);
        self.revoice(state.root, state.chord);
        let beat = clock.frames_per_beat as f64;
        for position in COMP_BEATS {
            if self.rng.rand_float() > state.density.0 {
                continue;
            }
            let duration = beat * (0.3 + 0.3 * self.rng.rand_float());
            self.plan.insert(
                clock.beat_to_frame(position),
                Hit {
                    duration: duration as usize,
                },
            );
        }
    }

    fn next_chord(&mut self) -> Sample {
        let tremolo = 1.0 + TREMOLO_DEPTH * self.tremolo.generate_next().0;
        let mut sum = 0.0;
        for i in 0..self.note_count {
            sum += FUNDAMENTAL_LEVEL * self.fundamentals[i].generate_next().0
                + HARMONIC_LEVEL * self.harmonics[i].generate_next().0;
        }
        Sample(sum * tremolo * self.envelope.generate_next().0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voices::tests::{busy_state, energy, position, render_bars, TEST_SAMPLE_RATE};

    #[test]
    fn jazz_voicing() {
        let (notes, len) = RhythmVoice::voice_chord(MidiNote(60), ChordType::Maj7);
        assert_eq!(len, 4);
        assert_eq!(
            &notes[..len],
            &[MidiNote(48), MidiNote(64), MidiNote(67), MidiNote(83)]
        );

        let (notes, len) = RhythmVoice::voice_chord(MidiNote(58), ChordType::Dom13);
        assert_eq!(len, 6);
        assert_eq!(notes[0], MidiNote(46));
        assert_eq!(notes[5], MidiNote(58 + 21 + 12));
    }

    #[test]
    fn revoices_only_on_change() {
        let mut voice = RhythmVoice::new_with(TEST_SAMPLE_RATE, Rng::new_with_seed(1));
        voice.revoice(MidiNote(60), ChordType::Maj7);
        assert_eq!(voice.note_count, 4);
        let before = voice.fundamentals[1].frequency();

        voice.revoice(MidiNote(60), ChordType::Min9);
        assert_eq!(voice.note_count, 5);
        assert_ne!(voice.fundamentals[1].frequency(), before);
        assert_eq!(voice.voicing, Some((MidiNote(60), ChordType::Min9)));
    }

    #[test]
    fn comps_on_pattern_beats() {
        let mut voice = RhythmVoice::new_with(TEST_SAMPLE_RATE, Rng::new_with_seed(1));
        let clock = position(0, 0);
        voice.plan_bar(&busy_state(), &clock);
        assert_eq!(
            voice.plan.starts().collect::<Vec<_>>(),
            vec![0, 1000, 3000, 4000, 6000, 7000]
        );
    }

    #[test]
    fn density_thins_the_pattern() {
        let sparse = MusicalState::default();
        let mut sparse_voice = RhythmVoice::new_with(TEST_SAMPLE_RATE, Rng::new_with_seed(5));
        let mut busy_voice = RhythmVoice::new_with(TEST_SAMPLE_RATE, Rng::new_with_seed(5));
        let mut sparse_hits = 0;
        let mut busy_hits = 0;
        for bar in 0..16 {
            sparse_voice.plan_bar(&sparse, &position(bar, 0));
            busy_voice.plan_bar(&busy_state(), &position(bar, 0));
            sparse_hits += sparse_voice.plan.len();
            busy_hits += busy_voice.plan.len();
        }
        assert_eq!(busy_hits, 16 * COMP_BEATS.len());
        assert!(sparse_hits < busy_hits);
        assert!(energy(&render_bars(&mut busy_voice, &busy_state(), 1)) > 0.0);
    }
}
