// Copyright (c) 2024 Mike Tsao

use std::{fmt::Display, time::Instant};
use thiserror::Error;

/// The fields a director cue can name.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CueField {
    #[allow(missing_docs)]
    Color,
    #[allow(missing_docs)]
    Mood,
    #[allow(missing_docs)]
    Person,
    #[allow(missing_docs)]
    Object,
    #[allow(missing_docs)]
    Energy,
    /// A well-formed cue for a field we don't act on.
    Other(String),
}
impl CueField {
    fn from_lowercase(name: &str) -> Self {
        match name {
            "color" => Self::Color,
            "mood" => Self::Mood,
            "person" => Self::Person,
            "object" => Self::Object,
            "energy" => Self::Energy,
            _ => Self::Other(name.to_string()),
        }
    }

    #[allow(missing_docs)]
    pub fn name(&self) -> &str {
        match self {
            CueField::Color => "color",
            CueField::Mood => "mood",
            CueField::Person => "person",
            CueField::Object => "object",
            CueField::Energy => "energy",
            CueField::Other(name) => name,
        }
    }
}
impl Display for CueField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One `field: value` observation from the director.
#[derive(Clone, Debug)]
pub struct Cue {
    #[allow(missing_docs)]
    pub field: CueField,
    /// Trimmed and lowercased.
    pub value: String,
    /// When the line was read.
    pub arrival: Instant,
}

/// Why a line isn't a cue. None of these are errors in the usual sense; the
/// director prints plenty of lines that aren't meant for us.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ParseSkip {
    #[allow(missing_docs)]
    #[error("empty line")]
    Empty,
    /// Director startup chatter, separators, and the like.
    #[error("banner line")]
    Banner,
    #[allow(missing_docs)]
    #[error("no colon")]
    MissingColon,
    #[allow(missing_docs)]
    #[error("empty field name")]
    EmptyField,
    /// The part before the colon isn't a single word.
    #[error("field name {0:?} is not a single word")]
    MalformedField(String),
    #[allow(missing_docs)]
    #[error("empty value")]
    EmptyValue,
}

/// The tag the director prepends when it echoes a cue.
pub const DIRECTOR_TAG: &str = "[DIR]";

// Lines the director prints to the same stream while it starts up.
const BANNER_PREFIXES: &[&str] = &[
    "=", "-", "Pete", "Model", "Loading", "Press", "Resolution", "Max", "Target", "Prompt",
    "Camera", "Starting", "Fetching",
];

/// Parses one line of director output, stamping it with the current time.
pub fn parse(line: &str) -> Result<Cue, ParseSkip> {
    parse_at(line, Instant::now())
}

/// Parses one line of director output that arrived at `arrival`.
pub fn parse_at(line: &str, arrival: Instant) -> Result<Cue, ParseSkip> {
    let line = line.trim();
    let line = line.strip_prefix(DIRECTOR_TAG).map_or(line, str::trim_start);
    if line.is_empty() {
        return Err(ParseSkip::Empty);
    }
    if BANNER_PREFIXES
        .iter()
        .any(|prefix| line.starts_with(prefix))
    {
        return Err(ParseSkip::Banner);
    }

    let (field, value) = line.split_once(':').ok_or(ParseSkip::MissingColon)?;
    let field = field.trim();
    if field.is_empty() {
        return Err(ParseSkip::EmptyField);
    }
    if !field.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(ParseSkip::MalformedField(field.to_string()));
    }
    let value = value.trim();
    if value.is_empty() {
        return Err(ParseSkip::EmptyValue);
    }

    Ok(Cue {
        field: CueField::from_lowercase(&field.to_lowercase()),
        value: value.to_lowercase(),
        arrival,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognized_fields() {
        let cue = parse("color: blue").unwrap();
        assert_eq!(cue.field, CueField::Color);
        assert_eq!(cue.value, "blue");

        let cue = parse("  MOOD:   Calm  ").unwrap();
        assert_eq!(cue.field, CueField::Mood);
        assert_eq!(cue.value, "calm");

        for (line, field) in [
            ("person: waving", CueField::Person),
            ("object: book", CueField::Object),
            ("energy: 0.25", CueField::Energy),
        ] {
            assert_eq!(parse(line).unwrap().field, field);
        }
    }

    #[test]
    fn director_tag_is_stripped() {
        let cue = parse("[DIR] energy: high").unwrap();
        assert_eq!(cue.field, CueField::Energy);
        assert_eq!(cue.value, "high");
    }

    #[test]
    fn unknown_fields_are_well_formed() {
        let cue = parse("Weather: Sunny").unwrap();
        assert_eq!(cue.field, CueField::Other("weather".to_string()));
        assert_eq!(cue.field.to_string(), "weather");
    }

    #[test]
    fn values_keep_inner_text() {
        let cue = parse("mood: Very Happy: indeed").unwrap();
        assert_eq!(cue.value, "very happy: indeed");
    }

    #[test]
    fn skips() {
        assert_eq!(parse("").unwrap_err(), ParseSkip::Empty);
        assert_eq!(parse("   \t").unwrap_err(), ParseSkip::Empty);
        assert_eq!(parse("[DIR]").unwrap_err(), ParseSkip::Empty);
        assert_eq!(parse("garbage line").unwrap_err(), ParseSkip::MissingColon);
        assert_eq!(parse(": blue").unwrap_err(), ParseSkip::EmptyField);
        assert_eq!(parse("color:").unwrap_err(), ParseSkip::EmptyValue);
        assert_eq!(parse("color:    ").unwrap_err(), ParseSkip::EmptyValue);
        assert_eq!(
            parse("the color: blue").unwrap_err(),
            ParseSkip::MalformedField("the color".to_string())
        );
    }

    #[test]
    fn banners() {
        for line in [
            "============================================================",
            "------",
            "Loading model: moondream",
            "Press Ctrl-C to exit",
            "Camera: 0",
            "Resolution: 512",
            "Fetching weights...",
        ] {
            assert_eq!(parse(line).unwrap_err(), ParseSkip::Banner, "{line}");
        }
    }
}
