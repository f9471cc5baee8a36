// Copyright (c) 2024 Mike Tsao

use super::{BarPlan, Gate, StateGuard, VoiceKind};
use crate::{
    elements::{Envelope, OnePoleFilter, OnePoleMode, Oscillator, Waveform},
    scheduler::ClockPosition,
    state::MusicalState,
    traits::prelude::*,
    types::{FrequencyHz, MidiNote, Normal, Sample, SampleRate, Seconds},
    util::Rng,
};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
enum Degree {
    #[default]
    Root,
    Fifth,
}

// (beat, degree, seconds)
const PATTERN: [(f64, Degree, f64); 4] = [
    (0.0, Degree::Root, 0.2),
    (1.5, Degree::Fifth, 0.15),
    (2.5, Degree::Root, 0.2),
    (3.0, Degree::Fifth, 0.1),
];
const BUSY_PATTERN: [(f64, Degree, f64); 3] = [
    (0.75, Degree::Root, 0.1),
    (2.25, Degree::Fifth, 0.1),
    (3.75, Degree::Root, 0.1),
];
const BUSY_DENSITY: f64 = 0.6;

const SUB_LEVEL: f64 = 0.6;
const GRIT_LEVEL: f64 = 0.15;

#[derive(Clone, Copy, Debug, Default)]
struct BassNote {
    degree: Degree,
    duration: usize,
}

/// A drum-and-bass sub line on the root and fifth.
#[derive(Debug)]
pub struct BassVoice {
    rng: Rng,
    guard: StateGuard,
    plan: BarPlan<BassNote, { PATTERN.len() + BUSY_PATTERN.len() }>,
    root: MidiNote,

    sub: Oscillator,
    grit: Oscillator,
    envelope: Envelope,
    gate: Gate,
    filter: OnePoleFilter,
}
impl RendersVoice for BassVoice {
    fn render(&mut self, out: &mut [Sample], state: &MusicalState, clock: &ClockPosition) {
        if self.plan.is_stale(clock) {
            let state = self.guard.check(state);
            self.plan_bar(&state, clock);
        }
        for (i, sample) in out.iter_mut().enumerate() {
            while let Some(note) = self.plan.next_due(clock.frame_in_bar + i) {
                let midi_note = match note.degree {
                    Degree::Root => self.root,
                    Degree::Fifth => self.root.transposed(7),
                };
                let frequency: FrequencyHz = midi_note.transposed(-12).into();
                self.sub.set_frequency(frequency);
                self.grit.set_frequency(frequency * 2.0);
                self.envelope.trigger_attack();
                self.gate.open_for(note.duration);
            }
            if self.gate.tick() {
                self.envelope.trigger_release();
            }
            let tone = SUB_LEVEL * self.sub.generate_next().0
                + GRIT_LEVEL * self.grit.generate_next().0;
            *sample = self
                .filter
                .transform_sample(Sample(tone * self.envelope.generate_next().0));
        }
    }
}
impl BassVoice {
    #[allow(missing_docs)]
    pub fn new_with(sample_rate: SampleRate, rng: Rng) -> Self {
        Self {
            rng,
            guard: StateGuard::new_with(VoiceKind::Bass),
            plan: Default::default(),
            root: MidiNote::C4,
            sub: Oscillator::new_with(Waveform::Sine, sample_rate),
            grit: Oscillator::new_with(Waveform::Sawtooth, sample_rate),
            envelope: Envelope::new_with(
                sample_rate,
                Seconds(0.005),
                Seconds(0.1),
                Normal::new_const(0.4),
                Seconds(0.1),
            ),
            gate: Default::default(),
            filter: OnePoleFilter::new_with(
                OnePoleMode::LowPass,
                FrequencyHz(200.0),
                sample_rate,
            ),
        }
    }

    fn plan_bar(&mut self, state: &MusicalState, clock: &ClockPosition) {
        self.plan.start(clock);
        self.root = state.root;
        self.filter
            .set_cutoff(FrequencyHz(200.0 + 100.0 * state.intensity.0));

        let threshold = state.density.0 + 0.3;
        let busy = state.density.0 > BUSY_DENSITY;
        let extra: &[(f64, Degree, f64)] = if busy { &BUSY_PATTERN } else { &[] };
        for &(beat, degree, seconds) in PATTERN.iter().chain(extra) {
            if self.rng.rand_float() > threshold {
                continue;
            }
            self.plan.insert(
                clock.beat_to_frame(beat),
                BassNote {
                    degree,
                    duration: clock.sample_rate.frames_in(Seconds(seconds)),
                },
            );
        }
    }
}
