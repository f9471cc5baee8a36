// Copyright (c) 2024 Mike Tsao

//! Common data types used throughout the system.

/// The most commonly used imports.
pub mod prelude {
    pub use super::{
        BipolarNormal, FrequencyHz, MidiNote, Normal, ParameterType, Sample, SampleRate, Seconds,
        StereoSample, Tempo, TimeSignature,
    };
}

pub use {
    note::MidiNote,
    numbers::{FrequencyHz, ParameterType, Sample, SampleType, StereoSample},
    ranges::{BipolarNormal, Normal, RangedF64},
    time::{SampleRate, Seconds, Tempo, TimeSignature},
};

mod note;
mod numbers;
mod ranges;
mod time;
