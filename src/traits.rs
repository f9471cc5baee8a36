// Copyright (c) 2024 Mike Tsao

//! Traits that define the seams between the signal-path building blocks.

use crate::{
    scheduler::ClockPosition,
    state::MusicalState,
    types::{Sample, SampleRate},
};

/// The most commonly used imports.
pub mod prelude {
    pub use super::{Configurable, Generates, RendersVoice, TransformsAudio};
}

/// Something that is [Configurable] is interested in staying in sync with
/// global configuration.
pub trait Configurable {
    /// Returns this item's sample rate.
    fn sample_rate(&self) -> SampleRate;

    /// The sample rate changed.
    fn update_sample_rate(&mut self, sample_rate: SampleRate);

    /// Sent to indicate that it's time to reset internal state. Oscillators
    /// should reset phase, etc.
    fn reset(&mut self) {}
}

/// Something that [Generates] creates the given type `<V>` as its work product
/// over time. Examples are envelopes, which produce a
/// [Normal](crate::types::Normal) signal, and oscillators, which produce a
/// [BipolarNormal](crate::types::BipolarNormal) signal.
pub trait Generates<V: Default + Clone>: Send + core::fmt::Debug + Configurable {
    /// Produces the next value of the signal.
    fn generate_next(&mut self) -> V;

    /// Fills a batch of values with new signal.
    fn generate(&mut self, values: &mut [V]) {
        for value in values {
            *value = self.generate_next();
        }
    }
}

/// A [TransformsAudio] takes input audio, which is typically produced by
/// [Generates], does something to it, and then outputs it. It's what filters
/// and limiters do.
pub trait TransformsAudio: core::fmt::Debug {
    /// Transforms a single sample.
    fn transform_sample(&mut self, input_sample: Sample) -> Sample;

    /// Transforms a buffer of audio in place.
    fn transform(&mut self, samples: &mut [Sample]) {
        for sample in samples {
            *sample = self.transform_sample(*sample);
        }
    }
}

/// The capability shared by every voice of the ensemble.
///
/// `render()` receives a span that never crosses a bar line, the applied
/// [MusicalState] for that bar, and the clock position of the span's first
/// frame. Implementations must not block or allocate.
pub trait RendersVoice: core::fmt::Debug + Send {
    /// Fills `out` with this voice's mono signal.
    fn render(&mut self, out: &mut [Sample], state: &MusicalState, clock: &ClockPosition);
}
