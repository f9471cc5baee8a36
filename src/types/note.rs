// Copyright (c) 2024 Mike Tsao

use crate::types::FrequencyHz;
use core::fmt::Display;
use serde::{Deserialize, Serialize};

/// A MIDI note number. MIDI note 0 is a C, and 60 is middle C (C4). Only
/// 0..=127 are real notes; [MidiNote::is_valid()] tells the difference.
///
/// These also correspond to
/// <https://en.wikipedia.org/wiki/Piano_key_frequencies>
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct MidiNote(pub u8);
#[allow(missing_docs)]
impl MidiNote {
    pub const MIN: MidiNote = MidiNote(0);
    pub const MAX: MidiNote = MidiNote(127);
    pub const A4: MidiNote = MidiNote(69);
    pub const C4: MidiNote = MidiNote(60);

    const NAMES: [&'static str; 12] = [
        "C", "C#", "D", "Eb", "E", "F", "F#", "G", "Ab", "A", "Bb", "B",
    ];

    pub fn is_valid(&self) -> bool {
        *self <= Self::MAX
    }

    /// Returns the note `semitones` away, clamped to the valid range.
    pub fn transposed(&self, semitones: i16) -> Self {
        Self((self.0 as i16 + semitones).clamp(0, Self::MAX.0 as i16) as u8)
    }

    /// The note name with its octave, such as "Bb3".
    pub fn note_name(&self) -> String {
        format!(
            "{}{}",
            Self::NAMES[self.0 as usize % 12],
            (self.0 as i16 / 12) - 1
        )
    }
}
impl Display for MidiNote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.note_name())
    }
}
impl From<u8> for MidiNote {
    fn from(value: u8) -> Self {
        Self(value)
    }
}
impl From<MidiNote> for FrequencyHz {
    // Equal temperament, A4 = 440 Hz.
    fn from(value: MidiNote) -> Self {
        FrequencyHz(440.0 * 2.0f64.powf((value.0 as f64 - 69.0) / 12.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    #[test]
    fn frequencies() {
        assert_eq!(FrequencyHz::from(MidiNote::A4), FrequencyHz(440.0));
        assert!(approx_eq!(
            f64,
            FrequencyHz::from(MidiNote::C4).0,
            261.6255653005986,
            epsilon = 0.0001
        ));
        assert!(approx_eq!(
            f64,
            FrequencyHz::from(MidiNote(57)).0,
            220.0,
            epsilon = 0.0001
        ));
    }

    #[test]
    fn names_and_ranges() {
        assert_eq!(MidiNote(58).note_name(), "Bb3");
        assert_eq!(MidiNote::C4.to_string(), "C4");
        assert!(MidiNote::MAX.is_valid());
        assert!(!MidiNote(128).is_valid());
        assert_eq!(MidiNote(5).transposed(-12), MidiNote::MIN);
        assert_eq!(MidiNote(60).transposed(7), MidiNote(67));
    }
}
