// Copyright (c) 2024 Mike Tsao

use cuetrack::{score::ScoreBuffer, Engine, EngineError, EngineSettingsBuilder};
use std::{
    io::Cursor,
    path::{Path, PathBuf},
    sync::atomic::Ordering,
};

fn offline_builder(recording_path: &Path) -> EngineSettingsBuilder {
    let mut builder = EngineSettingsBuilder::default();
    builder
        .enable_audio_playback(false)
        .realtime_pacing(false)
        .sample_rate(8000_usize)
        .block_size(300_usize)
        .seed(1)
        .recording_path(recording_path);
    builder
}

#[test]
fn recording_matches_rendered_frames() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("take.wav");
    let settings = offline_builder(&path)
        .exit_on_eof(false)
        .max_bars(3_usize)
        .build()
        .unwrap();
    let buffer = ScoreBuffer::default();
    let report = Engine::new_with(settings)
        .run(
            Cursor::new("color: blue\nmood: sad\nenergy: high\n"),
            Box::new(buffer.clone()),
        )
        .unwrap();
    assert_eq!(report.bars, 3);
    assert_eq!(report.recording, Some(path.clone()));

    let reader = hound::WavReader::open(&path).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.channels, 2);
    assert_eq!(spec.sample_rate, 8000);
    assert_eq!(spec.bits_per_sample, 16);
    assert_eq!(reader.duration() as usize, report.frames);

    let samples: Vec<i16> = reader.into_samples().map(Result::unwrap).collect();
    assert!(samples.iter().any(|s| *s != 0), "the recording isn't silent");

    let lines = buffer.lines();
    assert_eq!(
        lines.iter().filter(|line| line.contains("] Bar ")).count(),
        3
    );
    assert!(lines.iter().any(|line| line == "[DIR] color: blue"));
}

#[test]
fn interrupted_recording_is_finalized() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("interrupted.wav");
    let settings = offline_builder(&path).exit_on_eof(false).build().unwrap();
    let engine = Engine::new_with(settings);
    engine.cancellation().store(true, Ordering::Relaxed);
    let report = engine
        .run(Cursor::new(""), Box::new(ScoreBuffer::default()))
        .unwrap();

    assert_eq!(report.bars, 1, "the current bar finishes");
    let reader = hound::WavReader::open(&path).unwrap();
    assert_eq!(reader.duration() as usize, report.frames);
}

#[test]
fn end_of_input_drains() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("eof.wav");
    let settings = offline_builder(&path).max_bars(1000_usize).build().unwrap();
    let report = Engine::new_with(settings)
        .run(Cursor::new("color: red\n"), Box::new(ScoreBuffer::default()))
        .unwrap();
    assert!(report.bars < 1000);
    assert!(path.exists());
}

#[test]
fn unwritable_recording_fails_with_status_2() {
    let path = PathBuf::from("/nonexistent-directory/take.wav");
    let settings = offline_builder(&path).build().unwrap();
    let error = Engine::new_with(settings)
        .run(Cursor::new(""), Box::new(ScoreBuffer::default()))
        .unwrap_err();
    assert!(matches!(error, EngineError::Recording(_)));
    assert_eq!(error.exit_code(), 2);
}
