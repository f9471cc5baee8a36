// Copyright (c) 2024 Mike Tsao

//! Handles digital-audio, wall-clock, and musical time.

use crate::types::ParameterType;
use core::{
    fmt::{self, Display},
    ops::Mul,
};
use derivative::Derivative;
use serde::{Deserialize, Serialize};

/// Beats per minute.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Derivative, PartialEq, PartialOrd)]
#[derivative(Default)]
#[serde(rename_all = "kebab-case")]
pub struct Tempo(#[derivative(Default(value = "174.0"))] pub ParameterType);
impl fmt::Display for Tempo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!("{:0.2} BPM", self.0))
    }
}
impl From<f64> for Tempo {
    fn from(value: f64) -> Self {
        Self(value)
    }
}
impl Tempo {
    /// The largest value we'll allow.
    pub const MAX_VALUE: ParameterType = 1024.0;

    /// The smallest value we'll allow. Zero itself is degenerate and is
    /// rejected wherever a [Tempo] is validated.
    pub const MIN_VALUE: ParameterType = 0.0;

    /// Whether this tempo can drive a clock.
    pub fn is_valid(&self) -> bool {
        self.0.is_finite() && self.0 > Self::MIN_VALUE && self.0 <= Self::MAX_VALUE
    }
}

/// [TimeSignature] represents a music [time
/// signature](https://en.wikipedia.org/wiki/Time_signature).
///
/// The top number of a time signature tells how many beats are in a measure.
/// The bottom number tells the value of a beat. For example, if the bottom
/// number is 4, then a beat is a quarter-note. And if the top number is 4, then
/// you should expect to see four beats in a measure, or four quarter-notes in a
/// measure.
#[derive(Clone, Copy, Debug, Derivative, Eq, PartialEq, Serialize, Deserialize)]
#[derivative(Default)]
#[serde(rename_all = "kebab-case")]
pub struct TimeSignature {
    /// The number of beats in a measure.
    #[derivative(Default(value = "4"))]
    pub top: usize,

    /// The value of a beat. Expressed as a reciprocal; for example, if it's 4,
    /// then the beat value is 1/4 or a quarter note.
    #[derivative(Default(value = "4"))]
    pub bottom: usize,
}
impl Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!("{}/{}", self.top, self.bottom))
    }
}
#[allow(missing_docs)]
impl TimeSignature {
    /// C time = common time = 4/4
    /// <https://en.wikipedia.org/wiki/Time_signature>
    pub const COMMON_TIME: Self = TimeSignature { top: 4, bottom: 4 };

    pub fn top(&self) -> usize {
        self.top
    }
}

/// Represents the [seconds](https://en.wikipedia.org/wiki/Second) unit of time.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Seconds(pub f64);
impl From<f64> for Seconds {
    fn from(value: f64) -> Self {
        Self(value)
    }
}
impl Display for Seconds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!("{:.2}s", self.0))
    }
}

/// Samples per second. Always a positive integer; cannot be zero.
#[derive(Clone, Copy, Debug, Derivative, Eq, PartialEq, Serialize, Deserialize)]
#[derivative(Default)]
#[serde(rename_all = "kebab-case")]
pub struct SampleRate(#[derivative(Default(value = "44100"))] pub usize);
#[allow(missing_docs)]
impl SampleRate {
    pub const DEFAULT_SAMPLE_RATE: usize = 44100;
    pub const DEFAULT: SampleRate = SampleRate::new(Self::DEFAULT_SAMPLE_RATE);

    pub const fn new(value: usize) -> Self {
        if value != 0 {
            Self(value)
        } else {
            Self(Self::DEFAULT_SAMPLE_RATE)
        }
    }

    /// The number of frames spanning the given duration, rounded down.
    pub fn frames_in(&self, seconds: Seconds) -> usize {
        (self.0 as f64 * seconds.0.max(0.0)) as usize
    }

    /// How long the given number of frames lasts.
    pub fn seconds_for(&self, frames: usize) -> Seconds {
        Seconds(frames as f64 / self.0 as f64)
    }
}
impl From<usize> for SampleRate {
    fn from(value: usize) -> Self {
        Self::new(value)
    }
}
impl From<SampleRate> for f64 {
    fn from(value: SampleRate) -> Self {
        value.0 as f64
    }
}
impl From<SampleRate> for u32 {
    fn from(value: SampleRate) -> Self {
        value.0 as u32
    }
}
impl Mul<Seconds> for SampleRate {
    type Output = usize;

    fn mul(self, rhs: Seconds) -> Self::Output {
        self.frames_in(rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tempo() {
        let t = Tempo::default();
        assert_eq!(t.0, 174.0);
        assert!(!Tempo(0.0).is_valid());
        assert!(!Tempo(f64::NAN).is_valid());
    }

    #[test]
    fn sample_rate_default_is_not_zero() {
        assert_eq!(SampleRate::default().0, 44100);
        assert_eq!(SampleRate::new(0), SampleRate::DEFAULT);
    }

    #[test]
    fn frames_and_seconds() {
        let sr = SampleRate::new(48000);
        assert_eq!(sr * Seconds(0.5), 24000);
        assert_eq!(sr.seconds_for(96000), Seconds(2.0));
        assert_eq!(sr.frames_in(Seconds(-1.0)), 0);
    }

    #[test]
    fn time_signature() {
        assert_eq!(TimeSignature::default(), TimeSignature::COMMON_TIME);
        assert_eq!(format!("{}", TimeSignature::COMMON_TIME), "4/4");
    }
}
