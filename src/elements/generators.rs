// Copyright (c) 2024 Mike Tsao

use crate::prelude::*;
use core::f64::consts::PI;
use derivative::Derivative;
use kahan::KahanSum;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, IntoStaticStr};

/// Classic oscillator waveforms
#[derive(
    Clone, Copy, Debug, Default, Display, EnumIter, IntoStaticStr, PartialEq, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Waveform {
    /// Sine wave
    #[default]
    Sine,
    /// Triangle wave
    Triangle,
    /// Sawtooth wave
    Sawtooth,
    /// White noise
    Noise,
}

/// A signal generator that produces traditional waveforms (sine, square,
/// triangle, etc.)
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Oscillator {
    /// The fundamental waveform for this oscillator.
    pub waveform: Waveform,

    /// Hertz. Any positive number. 440 = A4
    #[serde(skip)]
    pub frequency: FrequencyHz,

    #[serde(skip)]
    e: OscillatorEphemerals,
}
#[derive(Clone, Debug, Derivative)]
#[derivative(Default)]
pub struct OscillatorEphemerals {
    /// working variables to generate semi-deterministic noise.
    #[derivative(Default(value = "0x70f4f854"))]
    noise_x1: u32,
    #[derivative(Default(value = "0xe1e9f0a7"))]
    noise_x2: u32,

    // The "cursor" in the current waveform. Frequency can change over time, so
    // recalculating the position as if the current frequency had always been
    // the frequency would cause clicks.
    //
    // Needs Kahan summation algorithm to avoid accumulation of FP errors.
    cycle_position: KahanSum<f64>,

    delta: f64,
    delta_updated: bool,

    /// A ratio applied to `frequency`, typically driven by a vibrato LFO.
    #[derivative(Default(value = "1.0"))]
    frequency_modulation: f64,

    // reset() is requested.
    #[derivative(Default(value = "true"))]
    reset_pending: bool,

    sample_rate: SampleRate,
}
impl Generates<BipolarNormal> for Oscillator {
    fn generate_next(&mut self) -> BipolarNormal {
        let cycle_position = self.calculate_cycle_position();
        BipolarNormal::new_const(self.amplitude_for_position(self.waveform, cycle_position))
    }
}
impl Configurable for Oscillator {
    fn sample_rate(&self) -> SampleRate {
        self.e.sample_rate
    }

    fn update_sample_rate(&mut self, sample_rate: SampleRate) {
        self.e.sample_rate = sample_rate;
        self.e.delta_updated = false;
    }

    fn reset(&mut self) {
        self.e.reset_pending = true;
    }
}
impl Oscillator {
    #[allow(missing_docs)]
    pub fn new_with(waveform: Waveform, sample_rate: SampleRate) -> Self {
        let mut r = Self {
            waveform,
            ..Default::default()
        };
        r.update_sample_rate(sample_rate);
        r
    }

    #[allow(missing_docs)]
    pub fn set_frequency(&mut self, frequency: FrequencyHz) {
        if self.frequency != frequency {
            self.frequency = frequency;
            self.e.delta_updated = false;
        }
    }

    #[allow(missing_docs)]
    pub fn frequency(&self) -> FrequencyHz {
        self.frequency
    }

    /// Sets a ratio applied to the frequency, where 1.0 means unchanged.
    pub fn set_frequency_modulation(&mut self, ratio: f64) {
        if self.e.frequency_modulation != ratio {
            self.e.frequency_modulation = ratio;
            self.e.delta_updated = false;
        }
    }

    fn update_delta(&mut self) {
        if !self.e.delta_updated {
            self.e.delta = self.frequency.0 * self.e.frequency_modulation
                / self.e.sample_rate.0 as f64;

            // This resets the accumulated error.
            self.e.cycle_position = KahanSum::new_with_value(self.e.cycle_position.sum());

            self.e.delta_updated = true;
        }
    }

    fn calculate_cycle_position(&mut self) -> f64 {
        self.update_delta();

        // The first tick after a reset starts the cycle at zero.
        if self.e.reset_pending {
            self.e.reset_pending = false;
            self.e.cycle_position = Default::default();
            return 0.0;
        }

        self.e.cycle_position += self.e.delta;
        let next_cycle_position_unrounded = self.e.cycle_position.sum();

        // The 0.999999999999 deals with an FP precision issue that made square
        // waves flip one sample late.
        if next_cycle_position_unrounded > 0.999999999999 {
            self.e.cycle_position += -next_cycle_position_unrounded.floor().max(1.0);
        }

        self.e.cycle_position.sum()
    }

    // https://en.wikipedia.org/wiki/Sine_wave
    // https://en.wikipedia.org/wiki/Triangle_wave
    // https://en.wikipedia.org/wiki/Sawtooth_wave
    // https://www.musicdsp.org/en/latest/Synthesis/216-fast-whitenoise-generator.html
    //
    // Some of these have seemingly arbitrary phase-shift constants in their
    // formulas. The reason for them is to ensure that every waveform starts at
    // amplitude zero, which makes it a lot easier to avoid transients when a
    // waveform starts up. See Pirkle DSSPC++ p.133 for visualization.
    fn amplitude_for_position(&mut self, waveform: Waveform, cycle_position: f64) -> f64 {
        match waveform {
            Waveform::Sine => (cycle_position * 2.0 * PI).sin(),
            Waveform::Triangle => {
                4.0 * (cycle_position - (0.5 + cycle_position).floor()).abs() - 1.0
            }
            Waveform::Sawtooth => 2.0 * (cycle_position - (0.5 + cycle_position).floor()),
            Waveform::Noise => {
                // Stateful, so the stream depends on how many samples have been
                // generated, not on cycle position.
                self.e.noise_x1 ^= self.e.noise_x2;
                let tmp =
                    2.0 * (self.e.noise_x2 as f64 - (u32::MAX as f64 / 2.0)) / u32::MAX as f64;
                (self.e.noise_x2, _) = self.e.noise_x2.overflowing_add(self.e.noise_x1);
                tmp
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
enum State {
    #[default]
    Idle,
    Attack,
    Decay,
    Sustain,
    Release,
}

/// A signal generator that behaves like a typical ADSR envelope. Segments are
/// linear, and each new segment starts from wherever the amplitude currently
/// is, so retriggering a sounding note doesn't click.
#[derive(Clone, Debug, Derivative)]
#[derivative(Default)]
pub struct Envelope {
    #[derivative(Default(value = "Seconds(0.01)"))]
    attack: Seconds,
    #[derivative(Default(value = "Seconds(0.1)"))]
    decay: Seconds,
    #[derivative(Default(value = "Normal::new_const(0.7)"))]
    sustain: Normal,
    #[derivative(Default(value = "Seconds(0.1)"))]
    release: Seconds,

    e: EnvelopeEphemerals,
}
#[derive(Clone, Debug, Default)]
pub struct EnvelopeEphemerals {
    sample_rate: SampleRate,
    state: State,
    amplitude: f64,
    delta: f64,
}
impl Generates<Normal> for Envelope {
    fn generate_next(&mut self) -> Normal {
        match self.e.state {
            State::Idle => self.e.amplitude = 0.0,
            State::Attack => {
                self.e.amplitude += self.e.delta;
                if self.e.amplitude >= 1.0 - Self::EPSILON {
                    self.e.amplitude = 1.0;
                    self.set_state(State::Decay);
                }
            }
            State::Decay => {
                self.e.amplitude -= self.e.delta;
                if self.e.amplitude <= self.sustain.0 + Self::EPSILON {
                    self.e.amplitude = self.sustain.0;
                    self.set_state(State::Sustain);
                }
            }
            State::Sustain => self.e.amplitude = self.sustain.0,
            State::Release => {
                self.e.amplitude -= self.e.delta;
                if self.e.amplitude <= Self::EPSILON {
                    self.set_state(State::Idle);
                }
            }
        }
        Normal::new(self.e.amplitude)
    }
}
impl Configurable for Envelope {
    fn sample_rate(&self) -> SampleRate {
        self.e.sample_rate
    }

    fn update_sample_rate(&mut self, sample_rate: SampleRate) {
        self.e.sample_rate = sample_rate;
    }

    fn reset(&mut self) {
        self.set_state(State::Idle);
    }
}
impl Envelope {
    // Segment ends are detected within this tolerance, so accumulated
    // rounding can't add a stray frame to a segment.
    const EPSILON: f64 = 1.0e-9;

    #[allow(missing_docs)]
    pub fn new_with(
        sample_rate: SampleRate,
        attack: Seconds,
        decay: Seconds,
        sustain: Normal,
        release: Seconds,
    ) -> Self {
        let mut r = Self::default();
        r.update_sample_rate(sample_rate);
        r.set_parameters(attack, decay, sustain, release);
        r
    }

    /// Changes the shape. Takes effect at the start of the next segment.
    pub fn set_parameters(
        &mut self,
        attack: Seconds,
        decay: Seconds,
        sustain: Normal,
        release: Seconds,
    ) {
        self.attack = attack;
        self.decay = decay;
        self.sustain = Normal::new(sustain.0);
        self.release = release;
    }

    /// Starts (or restarts) the attack segment.
    pub fn trigger_attack(&mut self) {
        self.set_state(State::Attack);
    }

    /// Starts the release segment, unless the envelope is already idle.
    pub fn trigger_release(&mut self) {
        if !self.is_idle() {
            self.set_state(State::Release);
        }
    }

    /// Whether the envelope has finished and is producing silence.
    pub fn is_idle(&self) -> bool {
        matches!(self.e.state, State::Idle)
    }

    #[allow(missing_docs)]
    pub fn amplitude(&self) -> Normal {
        Normal::new(self.e.amplitude)
    }

    fn frames_for(&self, duration: Seconds) -> f64 {
        duration.0.max(0.0) * self.e.sample_rate.0 as f64
    }

    fn set_state(&mut self, new_state: State) {
        match new_state {
            State::Idle => {
                self.e.state = State::Idle;
                self.e.amplitude = 0.0;
                self.e.delta = 0.0;
            }
            State::Attack => {
                let frames = self.frames_for(self.attack);
                if frames < 1.0 {
                    self.e.amplitude = 1.0;
                    self.set_state(State::Decay);
                } else {
                    self.e.state = State::Attack;
                    self.e.delta = (1.0 - self.e.amplitude) / frames;
                }
            }
            State::Decay => {
                let frames = self.frames_for(self.decay);
                if frames < 1.0 || self.e.amplitude <= self.sustain.0 {
                    self.e.amplitude = self.sustain.0;
                    self.set_state(State::Sustain);
                } else {
                    self.e.state = State::Decay;
                    self.e.delta = (self.e.amplitude - self.sustain.0) / frames;
                }
            }
            State::Sustain => {
                self.e.state = State::Sustain;
                self.e.delta = 0.0;
            }
            State::Release => {
                let frames = self.frames_for(self.release);
                if frames < 1.0 || self.e.amplitude <= 0.0 {
                    self.set_state(State::Idle);
                } else {
                    self.e.state = State::Release;
                    self.e.delta = self.e.amplitude / frames;
                }
            }
        }
    }
}

/// A one-shot exponential decay, `level * e^(-rate * t)`. Percussion uses it
/// for both amplitude and pitch sweeps.
#[derive(Clone, Debug, Default)]
pub struct DecayEnvelope {
    rate: f64,
    level: f64,
    factor: f64,
    sample_rate: SampleRate,
}
impl Generates<f64> for DecayEnvelope {
    fn generate_next(&mut self) -> f64 {
        let value = self.level;
        self.level *= self.factor;
        if self.level < Self::SILENT_LEVEL {
            self.level = 0.0;
        }
        value
    }
}
impl Configurable for DecayEnvelope {
    fn sample_rate(&self) -> SampleRate {
        self.sample_rate
    }

    fn update_sample_rate(&mut self, sample_rate: SampleRate) {
        self.sample_rate = sample_rate;
        self.factor = (-self.rate / sample_rate.0 as f64).exp();
    }

    fn reset(&mut self) {
        self.level = 0.0;
    }
}
impl DecayEnvelope {
    /// Below this, the decay snaps to silence so idle voices cost nothing.
    pub const SILENT_LEVEL: f64 = 1.0e-5;

    /// `rate` is in units of 1/second.
    pub fn new_with(sample_rate: SampleRate, rate: f64) -> Self {
        let mut r = Self {
            rate,
            ..Default::default()
        };
        r.update_sample_rate(sample_rate);
        r
    }

    /// Restarts the decay from `level`.
    pub fn trigger(&mut self, level: f64) {
        self.level = level;
    }

    /// Changes the decay rate without retriggering.
    pub fn set_rate(&mut self, rate: f64) {
        self.rate = rate;
        self.update_sample_rate(self.sample_rate);
    }

    #[allow(missing_docs)]
    pub fn is_silent(&self) -> bool {
        self.level == 0.0
    }
}
