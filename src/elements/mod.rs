// Copyright (c) 2024 Mike Tsao

//! Building blocks for the voices: oscillators, envelopes, and filters.

/// The most commonly used imports.
pub mod prelude {
    pub use super::{
        DecayEnvelope, Envelope, OnePoleFilter, OnePoleMode, Oscillator, Waveform,
    };
}

pub use filters::{OnePoleFilter, OnePoleMode};
pub use generators::{DecayEnvelope, Envelope, Oscillator, Waveform};

mod filters;
mod generators;
