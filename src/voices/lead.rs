// Copyright (c) 2024 Mike Tsao

use super::{BarPlan, Gate, StateGuard, VoiceKind};
use crate::{
    elements::{Envelope, OnePoleFilter, OnePoleMode, Oscillator, Waveform},
    scheduler::ClockPosition,
    state::{Articulation, MusicalState, Scale},
    traits::prelude::*,
    types::{FrequencyHz, MidiNote, Normal, Sample, SampleRate, Seconds},
    util::Rng,
};

// Scale notes span one octave below the root through one octave above.
const OCTAVES: [i16; 3] = [-1, 0, 1];
const MAX_SCALE_NOTES: usize = OCTAVES.len() * Scale::MAX_DEGREES;
const MAX_NOTES_PER_BAR: usize = 8;
const STEPS: [isize; 4] = [-1, 0, 1, 2];

const VIBRATO_HZ: f64 = 5.0;
const VIBRATO_DEPTH: f64 = 0.003;
const TRIANGLE_LEVEL: f64 = 0.4;
const SINE_LEVEL: f64 = 0.3;

#[derive(Clone, Copy, Debug, Default)]
struct LeadNote {
    note: MidiNote,
    duration: usize,
}

/// A melody that random-walks through the current scale.
#[derive(Debug)]
pub struct LeadVoice {
    rng: Rng,
    guard: StateGuard,
    plan: BarPlan<LeadNote, MAX_NOTES_PER_BAR>,
    last_note: MidiNote,
    articulation: Option<Articulation>,

    triangle: Oscillator,
    sine: Oscillator,
    vibrato: Oscillator,
    envelope: Envelope,
    gate: Gate,
    filter: OnePoleFilter,
}
impl RendersVoice for LeadVoice {
    fn render(&mut self, out: &mut [Sample], state: &MusicalState, clock: &ClockPosition) {
        if self.plan.is_stale(clock) {
            let state = self.guard.check(state);
            self.plan_bar(&state, clock);
        }
        for (i, sample) in out.iter_mut().enumerate() {
            while let Some(event) = self.plan.next_due(clock.frame_in_bar + i) {
                let frequency: FrequencyHz = event.note.into();
                self.triangle.set_frequency(frequency);
                self.sine.set_frequency(frequency);
                self.envelope.trigger_attack();
                self.gate.open_for(event.duration);
            }
            if self.gate.tick() {
                self.envelope.trigger_release();
            }
            let tone = self.next_tone();
            *sample = self.filter.transform_sample(tone);
        }
    }
}
impl LeadVoice {
    #[allow(missing_docs)]
    pub fn new_with(sample_rate: SampleRate, rng: Rng) -> Self {
        let mut vibrato = Oscillator::new_with(Waveform::Sine, sample_rate);
        vibrato.set_frequency(FrequencyHz(VIBRATO_HZ));
        Self {
            rng,
            guard: StateGuard::new_with(VoiceKind::Lead),
            plan: Default::default(),
            last_note: MidiNote::C4,
            articulation: None,
            triangle: Oscillator::new_with(Waveform::Triangle, sample_rate),
            sine: Oscillator::new_with(Waveform::Sine, sample_rate),
            vibrato,
            envelope: Envelope::new_with(
                sample_rate,
                Seconds(0.02),
                Seconds(0.1),
                Normal::new_const(0.6),
                Seconds(0.1),
            ),
            gate: Default::default(),
            filter: OnePoleFilter::new_with(
                OnePoleMode::LowPass,
                FrequencyHz(3000.0),
                sample_rate,
            ),
        }
    }

    fn next_tone(&mut self) -> Sample {
        let vibrato = 1.0 + VIBRATO_DEPTH * self.vibrato.generate_next().0;
        self.triangle.set_frequency_modulation(vibrato);
        self.sine.set_frequency_modulation(vibrato);
        let tone = TRIANGLE_LEVEL * self.triangle.generate_next().0
            + SINE_LEVEL * self.sine.generate_next().0;
        Sample(tone * self.envelope.generate_next().0)
    }

    fn plan_bar(&mut self, state: &MusicalState, clock: &ClockPosition) {
        self.plan.start(clock);
        self.update_articulation(state.articulation);
        self.filter
            .set_cutoff(FrequencyHz(3000.0 + 2000.0 * state.intensity.0));

        let (scale_notes, scale_len) = Self::scale_notes(state);
        let note_count = Self::notes_per_bar(state);
        let slot = clock.frames_per_bar() / note_count;
        let gate_fraction = match state.articulation {
            Articulation::Staccato => 0.5,
            Articulation::Legato => 1.0,
            Articulation::Neutral | Articulation::Glitchy => 0.9,
        };

        for i in 0..note_count {
            let note = if self.rng.chance(0.7) {
                let current = Self::nearest_index(&scale_notes[..scale_len], self.last_note);
                let step = STEPS[self.rng.index(STEPS.len())];
                let index = (current as isize + step).clamp(0, scale_len as isize - 1);
                scale_notes[index as usize]
            } else {
                scale_notes[self.rng.index(scale_len)]
            };
            if self.rng.rand_float() > state.density.0 {
                continue;
            }
            let mut start = i * slot;
            if state.articulation == Articulation::Glitchy {
                start += (self.rng.rand_float() * 0.25 * slot as f64) as usize;
            }
            self.plan.insert(
                start,
                LeadNote {
                    note,
                    duration: (slot as f64 * gate_fraction) as usize,
                },
            );
            self.last_note = note;
        }
    }

    fn notes_per_bar(state: &MusicalState) -> usize {
        ((4.0 * state.density.0 * state.tempo_multiplier) as usize).clamp(1, MAX_NOTES_PER_BAR)
    }

    fn scale_notes(state: &MusicalState) -> ([MidiNote; MAX_SCALE_NOTES], usize) {
        let mut notes = [MidiNote::default(); MAX_SCALE_NOTES];
        let mut len = 0;
        for octave in OCTAVES {
            for interval in state.scale.intervals() {
                notes[len] = state.root.transposed(interval + octave * 12);
                len += 1;
            }
        }
        (notes, len)
    }

    fn nearest_index(notes: &[MidiNote], target: MidiNote) -> usize {
        notes
            .iter()
            .enumerate()
            .min_by_key(|(_, note)| (note.0 as i16 - target.0 as i16).abs())
            .map(|(i, _)| i)
            .unwrap_or_default()
    }

    fn update_articulation(&mut self, articulation: Articulation) {
        if self.articulation == Some(articulation) {
            return;
        }
        self.articulation = Some(articulation);
        let (attack, decay, sustain, release) = match articulation {
            Articulation::Staccato => (0.005, 0.05, 0.3, 0.05),
            Articulation::Legato => (0.1, 0.2, 0.8, 0.2),
            Articulation::Neutral | Articulation::Glitchy => (0.02, 0.1, 0.6, 0.1),
        };
        self.envelope.set_parameters(
            Seconds(attack),
            Seconds(decay),
            Normal::new(sustain),
            Seconds(release),
        );
    }
}
