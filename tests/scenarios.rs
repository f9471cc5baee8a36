// Copyright (c) 2024 Mike Tsao

use cuetrack::{
    cue::{map, parse},
    score::{ScoreBuffer, ScoreLogger},
    state::PendingState,
    types::{SampleRate, StereoSample, Tempo},
    StateScheduler,
};
use std::sync::{atomic::AtomicBool, Arc};

const DEFAULT_LINE_TAIL: &str =
    "root=60 chord=maj7   scale=major        | density=0.30 intensity=0.30 tempo_mult=1.00";

fn apply_cues(pending: &PendingState, lines: &[&str]) {
    for line in lines {
        if let Ok(cue) = parse(line) {
            pending.apply(&map(&cue));
        }
    }
}

fn scheduler_for(pending: &PendingState, logger: &ScoreLogger, bars: usize) -> StateScheduler {
    StateScheduler::new_with(
        SampleRate::new(8000),
        Tempo(174.0),
        256,
        7,
        pending.clone(),
        Arc::new(AtomicBool::new(false)),
        logger.sender(),
        Some(bars),
    )
}

fn play_out(scheduler: &mut StateScheduler) {
    let mut block = vec![StereoSample::SILENCE; 256];
    while scheduler.render(&mut block) > 0 {}
}

// Cues arrive before the first bar line; renders `bars` bars and returns the
// score.
fn perform(cues: &[&str], bars: usize) -> Vec<String> {
    let buffer = ScoreBuffer::default();
    let logger = ScoreLogger::new_with(Box::new(buffer.clone())).unwrap();
    let pending = PendingState::default();
    apply_cues(&pending, cues);
    let mut scheduler = scheduler_for(&pending, &logger, bars);
    play_out(&mut scheduler);
    logger.finish();
    buffer.lines()
}

#[test]
fn color_sets_the_root() {
    let lines = perform(&["color: blue"], 1);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("Bar    1 | root=58 "), "{}", lines[0]);
}

#[test]
fn high_energy_speeds_up() {
    let lines = perform(&["energy: high"], 1);
    assert!(lines[0].ends_with("intensity=1.00 tempo_mult=1.10"), "{}", lines[0]);
}

#[test]
fn silence_keeps_the_defaults() {
    let lines = perform(&[], 10);
    assert_eq!(lines.len(), 10);
    for (i, line) in lines.iter().enumerate() {
        assert!(line.contains(&format!("Bar {:4} |", i + 1)), "{line}");
        assert!(line.ends_with(DEFAULT_LINE_TAIL), "{line}");
    }
    // 8000 Hz at 174 BPM rounds to 2759 frames per beat.
    assert!(lines[0].starts_with("[   1.38s]"), "{}", lines[0]);
    assert!(lines[9].starts_with("[  13.79s]"), "{}", lines[9]);
}

#[test]
fn garbage_changes_nothing() {
    let lines = perform(
        &[
            "garbage line",
            "[DIR] ======",
            ": blue",
            "color:",
            "colour: blue",
        ],
        1,
    );
    assert!(lines[0].ends_with(DEFAULT_LINE_TAIL), "{}", lines[0]);
}

#[test]
fn last_cue_in_a_bar_wins() {
    let lines = perform(&["mood: happy", "mood: calm"], 1);
    assert!(lines[0].contains("chord=maj7 "), "{}", lines[0]);
    assert!(lines[0].contains("scale=dorian "), "{}", lines[0]);
}

#[test]
fn director_tagged_lines_are_cues() {
    let lines = perform(&["[DIR] person: waving", "[DIR] object: book"], 1);
    assert!(lines[0].contains("density=0.80"), "{}", lines[0]);
}

#[test]
fn repeating_a_cue_changes_nothing() {
    let buffer = ScoreBuffer::default();
    let logger = ScoreLogger::new_with(Box::new(buffer.clone())).unwrap();
    let pending = PendingState::default();
    apply_cues(&pending, &["color: red", "energy: low"]);
    let mut scheduler = scheduler_for(&pending, &logger, 3);

    let mut block = vec![StereoSample::SILENCE; 256];
    while scheduler.bars_completed() < 1 {
        scheduler.render(&mut block);
    }
    let applied = *scheduler.applied();
    apply_cues(&pending, &["color: red", "energy: low"]);
    assert_eq!(pending.snapshot(), applied);

    play_out(&mut scheduler);
    assert_eq!(*scheduler.applied(), applied);
    logger.finish();
    let lines = buffer.lines();
    assert_eq!(lines.len(), 3);
    let tail = |line: &str| line.split_once('|').map(|(_, tail)| tail.to_string());
    assert_eq!(tail(&lines[1]), tail(&lines[2]));
}

#[test]
fn cues_after_a_bar_line_wait_for_the_next() {
    let buffer = ScoreBuffer::default();
    let logger = ScoreLogger::new_with(Box::new(buffer.clone())).unwrap();
    let pending = PendingState::default();
    let mut scheduler = scheduler_for(&pending, &logger, 2);

    let mut block = vec![StereoSample::SILENCE; 256];
    while scheduler.bars_completed() < 1 {
        scheduler.render(&mut block);
    }
    apply_cues(&pending, &["color: green"]);
    play_out(&mut scheduler);
    logger.finish();

    let lines = buffer.lines();
    assert!(lines[0].contains("root=60"), "{}", lines[0]);
    assert!(lines[1].contains("root=62"), "{}", lines[1]);
}
