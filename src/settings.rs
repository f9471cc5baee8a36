// Copyright (c) 2024 Mike Tsao

//! Everything a caller can configure about a performance.

use crate::types::{SampleRate, Tempo};
use derivative::Derivative;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Reasons that [EngineSettings] can't be used.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[allow(missing_docs)]
    #[error("couldn't read settings from {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[allow(missing_docs)]
    #[error("couldn't parse settings in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[allow(missing_docs)]
    #[error("sample rate must be greater than zero")]
    ZeroSampleRate,
    #[allow(missing_docs)]
    #[error("block size must be greater than zero")]
    ZeroBlockSize,
    /// A bar limit of zero, which would otherwise still play the first bar.
    #[error("max bars must be greater than zero")]
    ZeroMaxBars,
    #[allow(missing_docs)]
    #[error("tempo of {0} BPM is out of range")]
    InvalidTempo(f64),
    /// Playback is required, but it has also been turned off.
    #[error("playback is required but disabled")]
    PlaybackRequiredButDisabled,
}

/// Configuration for [Engine](crate::Engine).
///
/// Every field has a default, so a settings file only needs to name what it
/// changes:
///
/// ```json
/// { "base-tempo": 160.0, "recording-path": "session.mp3" }
/// ```
#[derive(Builder, Clone, Debug, Derivative, PartialEq, Serialize, Deserialize)]
#[derivative(Default)]
#[builder(default)]
#[serde(default, rename_all = "kebab-case")]
pub struct EngineSettings {
    /// Beats per minute before the tempo multiplier.
    pub base_tempo: Tempo,

    /// Whether to play through the default output device.
    #[derivative(Default(value = "true"))]
    pub enable_audio_playback: bool,

    /// Where to record. `.wav` is written directly; other extensions are
    /// transcoded with ffmpeg when it's available.
    #[builder(setter(into, strip_option))]
    pub recording_path: Option<PathBuf>,

    /// Used when there's no playback device to dictate the rate.
    #[derivative(Default(value = "SampleRate::DEFAULT_SAMPLE_RATE"))]
    pub sample_rate: usize,

    /// Frames rendered per block.
    #[derivative(Default(value = "512"))]
    pub block_size: usize,

    /// Seeds every random choice. Random when absent.
    #[builder(setter(strip_option))]
    pub seed: Option<u64>,

    /// ffmpeg VBR quality (`-q:a`) for compressed recordings. Lower is better.
    pub encoder_quality: u8,

    /// Whether end of input ends the performance.
    #[derivative(Default(value = "true"))]
    pub exit_on_eof: bool,

    /// Stop gracefully after this many bars.
    #[builder(setter(strip_option))]
    pub max_bars: Option<usize>,

    /// Fail instead of carrying on silently when no output device works.
    pub require_playback: bool,

    /// Whether to write cue lines to the score.
    #[derivative(Default(value = "true"))]
    pub echo_cues: bool,

    /// Without playback, whether to render in real time (true) or as fast as
    /// possible (false).
    #[derivative(Default(value = "true"))]
    pub realtime_pacing: bool,
}
impl EngineSettings {
    /// Reads settings from a JSON file.
    pub fn load_from_file(path: &Path) -> Result<Self, SettingsError> {
        let json = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&json).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Checks for values that the engine can't run with.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.sample_rate == 0 {
            return Err(SettingsError::ZeroSampleRate);
        }
        if self.block_size == 0 {
            return Err(SettingsError::ZeroBlockSize);
        }
        if self.max_bars == Some(0) {
            return Err(SettingsError::ZeroMaxBars);
        }
        if !self.base_tempo.is_valid() {
            return Err(SettingsError::InvalidTempo(self.base_tempo.0));
        }
        if self.require_playback && !self.enable_audio_playback {
            return Err(SettingsError::PlaybackRequiredButDisabled);
        }
        Ok(())
    }

    /// The seed widened to the generator's width.
    pub fn seed_u128(&self) -> Option<u128> {
        self.seed.map(u128::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let settings = EngineSettings::default();
        assert_eq!(settings.base_tempo, Tempo(174.0));
        assert!(settings.enable_audio_playback);
        assert_eq!(settings.recording_path, None);
        assert_eq!(settings.sample_rate, 44100);
        assert_eq!(settings.block_size, 512);
        assert_eq!(settings.seed, None);
        assert_eq!(settings.encoder_quality, 0);
        assert!(settings.exit_on_eof);
        assert_eq!(settings.max_bars, None);
        assert!(!settings.require_playback);
        assert!(settings.echo_cues);
        assert!(settings.realtime_pacing);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn builder_starts_from_defaults() {
        let settings = EngineSettingsBuilder::default()
            .enable_audio_playback(false)
            .recording_path("take.wav")
            .seed(7)
            .build()
            .unwrap();
        assert_eq!(settings.recording_path, Some(PathBuf::from("take.wav")));
        assert_eq!(settings.seed_u128(), Some(7));
        assert_eq!(settings.block_size, 512);
        assert!(settings.echo_cues);
    }

    #[test]
    fn validation() {
        let mut settings = EngineSettings::default();
        settings.sample_rate = 0;
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::ZeroSampleRate)
        ));

        let mut settings = EngineSettings::default();
        settings.block_size = 0;
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::ZeroBlockSize)
        ));

        for bpm in [0.0, -10.0, f64::NAN, 5000.0] {
            let settings = EngineSettings {
                base_tempo: Tempo(bpm),
                ..Default::default()
            };
            assert!(matches!(
                settings.validate(),
                Err(SettingsError::InvalidTempo(_))
            ));
        }

        let settings = EngineSettings {
            enable_audio_playback: false,
            require_playback: true,
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::PlaybackRequiredButDisabled)
        ));

        let mut settings = EngineSettings::default();
        settings.max_bars = Some(0);
        assert!(matches!(settings.validate(), Err(SettingsError::ZeroMaxBars)));
        settings.max_bars = Some(1);
        assert!(settings.validate().is_ok());
        settings.max_bars = None;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn partial_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "base-tempo": 160.0, "recording-path": "out.mp3", "max-bars": 8 }}"#
        )
        .unwrap();
        let settings = EngineSettings::load_from_file(file.path()).unwrap();
        assert_eq!(settings.base_tempo, Tempo(160.0));
        assert_eq!(settings.recording_path, Some(PathBuf::from("out.mp3")));
        assert_eq!(settings.max_bars, Some(8));
        assert!(settings.enable_audio_playback);
    }

    #[test]
    fn bad_files() {
        let missing = EngineSettings::load_from_file(Path::new("/nonexistent/settings.json"));
        assert!(matches!(missing, Err(SettingsError::Io { .. })));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            EngineSettings::load_from_file(file.path()),
            Err(SettingsError::Parse { .. })
        ));
    }
}
