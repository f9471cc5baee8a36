// Copyright (c) 2024 Mike Tsao

//! The musical state that cues steer and voices play from.
//!
//! There are always two copies. The *pending* copy ([PendingState]) is shared
//! with the cue reader, which writes deltas into it whenever a cue arrives. The
//! *applied* copy belongs to the scheduler, which replaces it with a snapshot
//! of the pending copy at each bar line. Voices only ever see the applied
//! copy, so they never observe a half-updated state.

use crate::types::{MidiNote, Normal};
use derivative::Derivative;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

/// Jazz chord qualities.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Display,
    EnumIter,
    EnumString,
    Eq,
    IntoStaticStr,
    PartialEq,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ChordType {
    #[allow(missing_docs)]
    #[default]
    Maj7,
    #[allow(missing_docs)]
    Min7,
    #[allow(missing_docs)]
    Dom7,
    #[allow(missing_docs)]
    Dim7,
    #[allow(missing_docs)]
    Maj9,
    #[allow(missing_docs)]
    Min9,
    #[allow(missing_docs)]
    Dom9,
    #[allow(missing_docs)]
    Min11,
    #[allow(missing_docs)]
    Dom13,
}
impl ChordType {
    /// The longest interval list of any chord.
    pub const MAX_NOTES: usize = 6;

    /// Semitones above the root, starting with the root itself.
    pub fn intervals(&self) -> &'static [i16] {
        match self {
            ChordType::Maj7 => &[0, 4, 7, 11],
            ChordType::Min7 => &[0, 3, 7, 10],
            ChordType::Dom7 => &[0, 4, 7, 10],
            ChordType::Dim7 => &[0, 3, 6, 9],
            ChordType::Maj9 => &[0, 4, 7, 11, 14],
            ChordType::Min9 => &[0, 3, 7, 10, 14],
            ChordType::Dom9 => &[0, 4, 7, 10, 14],
            ChordType::Min11 => &[0, 3, 7, 10, 14, 17],
            ChordType::Dom13 => &[0, 4, 7, 10, 14, 21],
        }
    }
}

/// Scales that the lead melody walks through.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Display,
    EnumIter,
    EnumString,
    Eq,
    IntoStaticStr,
    PartialEq,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Scale {
    #[allow(missing_docs)]
    #[default]
    Major,
    #[allow(missing_docs)]
    Minor,
    #[allow(missing_docs)]
    Dorian,
    #[allow(missing_docs)]
    Mixolydian,
    #[allow(missing_docs)]
    Blues,
    #[allow(missing_docs)]
    PentatonicMinor,
}
impl Scale {
    /// The most degrees any scale has.
    pub const MAX_DEGREES: usize = 7;

    /// Semitones above the root of each scale degree.
    pub fn intervals(&self) -> &'static [i16] {
        match self {
            Scale::Major => &[0, 2, 4, 5, 7, 9, 11],
            Scale::Minor => &[0, 2, 3, 5, 7, 8, 10],
            Scale::Dorian => &[0, 2, 3, 5, 7, 9, 10],
            Scale::Mixolydian => &[0, 2, 4, 5, 7, 9, 10],
            Scale::Blues => &[0, 3, 5, 6, 7, 10],
            Scale::PentatonicMinor => &[0, 3, 5, 7, 10],
        }
    }
}

/// How the lead phrases its notes.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Display,
    EnumIter,
    EnumString,
    Eq,
    IntoStaticStr,
    PartialEq,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Articulation {
    /// Medium gate, moderate envelope.
    #[default]
    Neutral,
    /// Short gate, fast envelope.
    Staccato,
    /// Long gate, slow swells.
    Legato,
    /// Medium gate with random onset jitter.
    Glitchy,
}

/// Everything the voices need to know to play a bar.
#[derive(Clone, Copy, Debug, Derivative, PartialEq, Serialize, Deserialize)]
#[derivative(Default)]
#[serde(rename_all = "kebab-case")]
pub struct MusicalState {
    /// The tonal center.
    #[derivative(Default(value = "MidiNote(60)"))]
    pub root: MidiNote,
    #[allow(missing_docs)]
    pub chord: ChordType,
    #[allow(missing_docs)]
    pub scale: Scale,
    /// How busy the voices are.
    #[derivative(Default(value = "Normal::new_const(0.3)"))]
    pub density: Normal,
    /// How loud and bright the voices are.
    #[derivative(Default(value = "Normal::new_const(0.3)"))]
    pub intensity: Normal,
    /// Scales the base tempo. Always inside [MusicalState::TEMPO_MULTIPLIER_MIN]
    /// ..= [MusicalState::TEMPO_MULTIPLIER_MAX] unless something has gone wrong.
    #[derivative(Default(value = "1.0"))]
    pub tempo_multiplier: f64,
    #[allow(missing_docs)]
    pub articulation: Articulation,
}
impl MusicalState {
    #[allow(missing_docs)]
    pub const TEMPO_MULTIPLIER_MIN: f64 = 0.85;
    #[allow(missing_docs)]
    pub const TEMPO_MULTIPLIER_MAX: f64 = 1.1;

    /// Whether `tempo_multiplier` is usable.
    pub fn is_tempo_multiplier_valid(value: f64) -> bool {
        value.is_finite()
            && (Self::TEMPO_MULTIPLIER_MIN..=Self::TEMPO_MULTIPLIER_MAX).contains(&value)
    }

    /// Returns a copy in which every out-of-range field has been replaced by
    /// the corresponding field of `fallback`, along with whether any
    /// replacement happened.
    pub fn sanitized(&self, fallback: &MusicalState) -> (MusicalState, bool) {
        let mut r = *self;
        let mut faulted = false;
        if !r.root.is_valid() {
            r.root = fallback.root;
            faulted = true;
        }
        if !r.density.is_valid() {
            r.density = fallback.density;
            faulted = true;
        }
        if !r.intensity.is_valid() {
            r.intensity = fallback.intensity;
            faulted = true;
        }
        if !Self::is_tempo_multiplier_valid(r.tempo_multiplier) {
            r.tempo_multiplier = fallback.tempo_multiplier;
            faulted = true;
        }
        (r, faulted)
    }
}

/// A partial update to [MusicalState]. Each cue fills in only the fields it
/// controls.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[allow(missing_docs)]
pub struct StateDelta {
    pub root: Option<MidiNote>,
    pub chord: Option<ChordType>,
    pub scale: Option<Scale>,
    pub density: Option<Normal>,
    pub intensity: Option<Normal>,
    pub tempo_multiplier: Option<f64>,
    pub articulation: Option<Articulation>,
}
impl StateDelta {
    /// Whether applying this delta would change nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Copies the fields this delta carries into `state`.
    pub fn apply_to(&self, state: &mut MusicalState) {
        if let Some(root) = self.root {
            state.root = root;
        }
        if let Some(chord) = self.chord {
            state.chord = chord;
        }
        if let Some(scale) = self.scale {
            state.scale = scale;
        }
        if let Some(density) = self.density {
            state.density = density;
        }
        if let Some(intensity) = self.intensity {
            state.intensity = intensity;
        }
        if let Some(tempo_multiplier) = self.tempo_multiplier {
            state.tempo_multiplier = tempo_multiplier;
        }
        if let Some(articulation) = self.articulation {
            state.articulation = articulation;
        }
    }
}

/// The pending copy of [MusicalState], shared between the cue reader and the
/// scheduler. The lock is held only long enough to copy a state in or out.
#[derive(Clone, Debug, Default)]
pub struct PendingState(Arc<Mutex<MusicalState>>);
impl PendingState {
    #[allow(missing_docs)]
    pub fn new_with(state: MusicalState) -> Self {
        Self(Arc::new(Mutex::new(state)))
    }

    /// Merges a delta. Later deltas win over earlier ones field by field.
    pub fn apply(&self, delta: &StateDelta) {
        if !delta.is_empty() {
            delta.apply_to(&mut self.lock());
        }
    }

    /// A copy of the current pending state.
    pub fn snapshot(&self) -> MusicalState {
        *self.lock()
    }

    // A writer that panicked mid-update can only have left a complete
    // MusicalState behind, because updates are plain field copies.
    fn lock(&self) -> MutexGuard<'_, MusicalState> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let state = MusicalState::default();
        assert_eq!(state.root, MidiNote(60));
        assert_eq!(state.chord, ChordType::Maj7);
        assert_eq!(state.scale, Scale::Major);
        assert_eq!(state.density.0, 0.3);
        assert_eq!(state.intensity.0, 0.3);
        assert_eq!(state.tempo_multiplier, 1.0);
        assert_eq!(state.articulation, Articulation::Neutral);
    }

    #[test]
    fn names_match_score_vocabulary() {
        let chord: &'static str = ChordType::Dom13.into();
        assert_eq!(chord, "dom13");
        let scale: &'static str = Scale::PentatonicMinor.into();
        assert_eq!(scale, "pentatonic_minor");
        assert_eq!(Articulation::Staccato.to_string(), "staccato");
        assert_eq!("min9".parse::<ChordType>().unwrap(), ChordType::Min9);
    }

    #[test]
    fn interval_tables_fit_their_capacities() {
        use strum::IntoEnumIterator;
        assert!(ChordType::iter().all(|c| c.intervals().len() <= ChordType::MAX_NOTES));
        assert!(Scale::iter().all(|s| s.intervals().len() <= Scale::MAX_DEGREES));
        assert!(ChordType::iter().all(|c| c.intervals()[0] == 0));
    }

    #[test]
    fn delta_writes_only_its_fields() {
        let mut state = MusicalState::default();
        let delta = StateDelta {
            chord: Some(ChordType::Min9),
            scale: Some(Scale::Minor),
            ..Default::default()
        };
        delta.apply_to(&mut state);
        assert_eq!(
            state,
            MusicalState {
                chord: ChordType::Min9,
                scale: Scale::Minor,
                ..Default::default()
            }
        );
        assert!(StateDelta::default().is_empty());
        assert!(!delta.is_empty());
    }

    #[test]
    fn pending_state_last_write_wins() {
        let pending = PendingState::default();
        let other_handle = pending.clone();
        pending.apply(&StateDelta {
            chord: Some(ChordType::Maj9),
            ..Default::default()
        });
        other_handle.apply(&StateDelta {
            chord: Some(ChordType::Maj7),
            root: Some(MidiNote(58)),
            ..Default::default()
        });
        let snapshot = pending.snapshot();
        assert_eq!(snapshot.chord, ChordType::Maj7);
        assert_eq!(snapshot.root, MidiNote(58));
    }

    #[test]
    fn sanitize_replaces_only_bad_fields() {
        let fallback = MusicalState::default();
        let bad = MusicalState {
            root: MidiNote(200),
            density: Normal::new_const(f64::NAN),
            intensity: Normal::new_const(0.9),
            tempo_multiplier: 3.0,
            chord: ChordType::Dom9,
            ..Default::default()
        };
        let (fixed, faulted) = bad.sanitized(&fallback);
        assert!(faulted);
        assert_eq!(fixed.root, fallback.root);
        assert_eq!(fixed.density, fallback.density);
        assert_eq!(fixed.intensity.0, 0.9);
        assert_eq!(fixed.tempo_multiplier, 1.0);
        assert_eq!(fixed.chord, ChordType::Dom9);

        let (same, faulted) = fallback.sanitized(&fallback);
        assert!(!faulted);
        assert_eq!(same, fallback);
    }
}
