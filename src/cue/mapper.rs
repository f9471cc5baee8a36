// Copyright (c) 2024 Mike Tsao

use super::{Cue, CueField};
use crate::{
    state::{Articulation, ChordType, MusicalState, Scale, StateDelta},
    types::{MidiNote, Normal},
};

// (energy, tempo multiplier, intensity)
const ENERGY_ANCHORS: [(f64, f64, f64); 3] = [(0.0, 0.85, 0.4), (0.5, 1.0, 0.7), (1.0, 1.1, 1.0)];

/// Translates a cue into the state changes it asks for. Every field writes
/// only the components it owns, and a value outside the field's vocabulary
/// produces an empty delta.
pub fn map(cue: &Cue) -> StateDelta {
    let word = first_word(&cue.value);
    match cue.field {
        CueField::Color => map_color(word),
        CueField::Mood => map_mood(word),
        CueField::Person => map_person(word),
        CueField::Object => map_object(word),
        CueField::Energy => map_energy(word),
        CueField::Other(_) => StateDelta::default(),
    }
}

// The director sometimes says more than one word ("blue shirt") or adds
// punctuation ("calm."). The first word carries the meaning.
fn first_word(value: &str) -> &str {
    value
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .trim_end_matches(|c: char| !c.is_alphanumeric())
}

fn map_color(word: &str) -> StateDelta {
    let root = match word {
        "red" => 57,
        "orange" => 59,
        "yellow" => 60,
        "green" => 62,
        "blue" => 58,
        "purple" => 56,
        "brown" => 55,
        "gray" | "grey" => 53,
        "black" => 51,
        "white" => 60,
        _ => return StateDelta::default(),
    };
    StateDelta {
        root: Some(MidiNote(root)),
        ..Default::default()
    }
}

fn map_mood(word: &str) -> StateDelta {
    let (chord, scale) = match word {
        "happy" => (ChordType::Maj9, Scale::Major),
        "sad" => (ChordType::Min9, Scale::Minor),
        "calm" => (ChordType::Maj7, Scale::Dorian),
        "serious" => (ChordType::Min7, Scale::Dorian),
        "excited" => (ChordType::Dom9, Scale::Mixolydian),
        "neutral" => (ChordType::Dom7, Scale::Mixolydian),
        _ => return StateDelta::default(),
    };
    StateDelta {
        chord: Some(chord),
        scale: Some(scale),
        ..Default::default()
    }
}

fn map_person(word: &str) -> StateDelta {
    let density = match word {
        "sitting" => 0.2,
        "walking" => 0.5,
        "waving" => 0.8,
        "standing" => 0.5,
        "talking" => 0.6,
        "none" => 0.4,
        "" => return StateDelta::default(),
        _ => 0.5,
    };
    StateDelta {
        density: Some(Normal::new_const(density)),
        ..Default::default()
    }
}

fn map_object(word: &str) -> StateDelta {
    let articulation = match word {
        "computer" => Articulation::Staccato,
        "book" => Articulation::Legato,
        "phone" => Articulation::Glitchy,
        "cup" | "chair" | "plant" | "window" | "none" => Articulation::Neutral,
        _ => return StateDelta::default(),
    };
    StateDelta {
        articulation: Some(articulation),
        ..Default::default()
    }
}

fn map_energy(word: &str) -> StateDelta {
    let level = match word {
        "low" => 0.0,
        "medium" => 0.5,
        "high" => 1.0,
        _ => match word.parse::<f64>() {
            Ok(level) if (0.0..=1.0).contains(&level) => level,
            _ => return StateDelta::default(),
        },
    };
    let (tempo_multiplier, intensity) = interpolate_energy(level);
    StateDelta {
        tempo_multiplier: Some(tempo_multiplier.clamp(
            MusicalState::TEMPO_MULTIPLIER_MIN,
            MusicalState::TEMPO_MULTIPLIER_MAX,
        )),
        intensity: Some(Normal::new(intensity)),
        ..Default::default()
    }
}

fn interpolate_energy(level: f64) -> (f64, f64) {
    for pair in ENERGY_ANCHORS.windows(2) {
        let (lo, hi) = (pair[0], pair[1]);
        if level <= hi.0 {
            let t = (level - lo.0) / (hi.0 - lo.0);
            return (lo.1 + t * (hi.1 - lo.1), lo.2 + t * (hi.2 - lo.2));
        }
    }
    let last = ENERGY_ANCHORS[ENERGY_ANCHORS.len() - 1];
    (last.1, last.2)
}
