// Copyright (c) 2024 Mike Tsao

//! One-pole filters. They're gentle (6 dB/octave), but they're cheap enough
//! to retune every bar without allocating or recomputing much.

use crate::prelude::*;
use core::f64::consts::PI;

/// The shape of a one-pole filter's response.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum OnePoleMode {
    /// Passes frequencies below the cutoff.
    #[default]
    LowPass,
    /// Passes frequencies above the cutoff.
    HighPass,
}

/// An RC-style one-pole filter.
#[derive(Clone, Debug, Default)]
pub struct OnePoleFilter {
    mode: OnePoleMode,
    cutoff: FrequencyHz,
    sample_rate: SampleRate,
    alpha: f64,

    last_input: f64,
    last_output: f64,
}
impl TransformsAudio for OnePoleFilter {
    fn transform_sample(&mut self, input_sample: Sample) -> Sample {
        let input = input_sample.0;
        let output = match self.mode {
            OnePoleMode::LowPass => self.last_output + self.alpha * (input - self.last_output),
            OnePoleMode::HighPass => self.alpha * (self.last_output + input - self.last_input),
        };
        self.last_input = input;
        self.last_output = output;
        Sample(output)
    }
}
impl Configurable for OnePoleFilter {
    fn sample_rate(&self) -> SampleRate {
        self.sample_rate
    }

    fn update_sample_rate(&mut self, sample_rate: SampleRate) {
        self.sample_rate = sample_rate;
        self.update_coefficients();
    }

    fn reset(&mut self) {
        self.last_input = 0.0;
        self.last_output = 0.0;
    }
}
impl OnePoleFilter {
    #[allow(missing_docs)]
    pub fn new_with(mode: OnePoleMode, cutoff: FrequencyHz, sample_rate: SampleRate) -> Self {
        let mut r = Self {
            mode,
            cutoff,
            sample_rate,
            ..Default::default()
        };
        r.update_coefficients();
        r
    }

    #[allow(missing_docs)]
    pub fn cutoff(&self) -> FrequencyHz {
        self.cutoff
    }

    #[allow(missing_docs)]
    pub fn set_cutoff(&mut self, cutoff: FrequencyHz) {
        if self.cutoff != cutoff {
            self.cutoff = cutoff;
            self.update_coefficients();
        }
    }

    fn update_coefficients(&mut self) {
        let cutoff = self
            .cutoff
            .0
            .clamp(FrequencyHz::FREQUENCY_MIN, FrequencyHz::FREQUENCY_MAX);
        let rc = 1.0 / (2.0 * PI * cutoff);
        let dt = 1.0 / self.sample_rate.0 as f64;
        self.alpha = match self.mode {
            OnePoleMode::LowPass => dt / (rc + dt),
            OnePoleMode::HighPass => rc / (rc + dt),
        };
    }
}
