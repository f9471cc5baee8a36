// Copyright (c) 2024 Mike Tsao

//! Runs a whole performance: cue reading, rendering, playback, recording, and
//! the score.

use crate::{
    cue::{map, parse, ParseSkip},
    mixer::Sinks,
    scheduler::{Lifecycle, StateScheduler},
    score::{ScoreEvent, ScoreLogger, ScoreSender},
    settings::{EngineSettings, SettingsError},
    state::PendingState,
    types::{SampleRate, StereoSample},
    util::Rng,
};
use crossbeam::channel::RecvTimeoutError;
use cuetrack_services::{
    CpalAudioService, CpalAudioServiceEvent, ProvidesService, RecorderError, RecorderService,
};
use std::{
    io::{BufRead, Write},
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::JoinHandle,
    time::{Duration, Instant},
};
use thiserror::Error;

/// Why a performance couldn't start or finish.
#[derive(Debug, Error)]
pub enum EngineError {
    #[allow(missing_docs)]
    #[error(transparent)]
    Settings(#[from] SettingsError),
    /// A recording was requested, but it couldn't be set up.
    #[error("couldn't start recording: {0}")]
    Recording(#[source] RecorderError),
    /// Playback was required, but no output device would open.
    #[error("playback is required, but no output device is available: {0}")]
    PlaybackRequired(String),
    #[allow(missing_docs)]
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
impl EngineError {
    /// The process exit status that reports this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            EngineError::Recording(_) => 2,
            EngineError::PlaybackRequired(_) => 3,
            EngineError::Settings(_) | EngineError::Other(_) => 1,
        }
    }
}

/// What a finished performance amounted to.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EngineReport {
    /// Bars completed.
    pub bars: usize,
    /// Frames rendered and delivered to the sinks.
    pub frames: usize,
    /// The sample rate the performance ran at.
    pub sample_rate: SampleRate,
    /// The seed that drove every random choice.
    pub seed: u128,
    /// Where the recording ended up, if there was one and it finished.
    pub recording: Option<PathBuf>,
    /// Frames that never made it into the recording.
    pub recording_dropped: usize,
    /// Lines written to the score.
    pub score_lines: usize,
}

/// Owns the configuration and the cancellation flag for one performance.
#[derive(Debug)]
pub struct Engine {
    settings: EngineSettings,
    cancellation: Arc<AtomicBool>,
}
impl Engine {
    /// How long the playback loop waits for the device before rendering
    /// anyway.
    const DEVICE_TIMEOUT: Duration = Duration::from_millis(100);

    /// How long to let queued audio play out after the last bar.
    const TAIL_TIMEOUT: Duration = Duration::from_secs(2);

    #[allow(missing_docs)]
    pub fn new_with(settings: EngineSettings) -> Self {
        Self {
            settings,
            cancellation: Default::default(),
        }
    }

    /// Setting this flag asks the performance to finish its current bar and
    /// stop. Safe to set from a signal handler.
    pub fn cancellation(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancellation)
    }

    #[allow(missing_docs)]
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Plays until the performance stops, reading cues from `input` and
    /// writing the score to `score_out`.
    pub fn run<R: BufRead + Send + 'static>(
        self,
        input: R,
        score_out: Box<dyn Write + Send>,
    ) -> Result<EngineReport, EngineError> {
        let settings = self.settings;
        settings.validate()?;

        let playback = Self::open_playback(&settings)?;
        let sample_rate = SampleRate::new(
            playback
                .as_ref()
                .map_or(settings.sample_rate, |audio| audio.sample_rate()),
        );

        let recorder = match &settings.recording_path {
            Some(path) => Some(
                RecorderService::new_with(path, sample_rate.into(), settings.encoder_quality)
                    .map_err(EngineError::Recording)?,
            ),
            None => None,
        };

        let seed = match settings.seed_u128() {
            Some(seed) => seed,
            None => Rng::generate_seed()?,
        };
        log::info!(
            "Starting at {} BPM, {} Hz, seed {seed}",
            settings.base_tempo,
            sample_rate.0
        );

        // Nothing waits on an offline render, so it may wait on its sinks.
        let offline = playback.is_none() && !settings.realtime_pacing;
        let score = ScoreLogger::new_with(score_out)?;
        let bar_score = if offline {
            score.sender().lossless()
        } else {
            score.sender()
        };
        let pending = PendingState::default();
        let reader = CueReader {
            pending: pending.clone(),
            score: if settings.echo_cues {
                score.sender()
            } else {
                ScoreSender::disabled()
            },
            cancellation: Arc::clone(&self.cancellation),
            exit_on_eof: settings.exit_on_eof,
        }
        .spawn(input)?;

        let mut scheduler = StateScheduler::new_with(
            sample_rate,
            settings.base_tempo,
            settings.block_size,
            seed,
            pending,
            Arc::clone(&self.cancellation),
            bar_score,
            settings.max_bars,
        );
        let mut sinks = Sinks::new_with(
            playback.as_ref().map(|audio| audio.queue()),
            recorder.as_ref().map(|recorder| recorder.queue()),
            settings.block_size,
        );
        sinks.set_lossless(offline);
        let mut block = vec![StereoSample::SILENCE; settings.block_size];

        let mut performance = Performance {
            scheduler: &mut scheduler,
            sinks: &mut sinks,
            block: &mut block,
        };
        match &playback {
            Some(audio) => performance.play_to_device(audio),
            None if settings.realtime_pacing => performance.play_paced(),
            None => performance.play_offline(),
        }
        log::info!(
            "Performed {} bars ({:.2}s)",
            scheduler.bars_completed(),
            scheduler.elapsed().0
        );

        if let Some(audio) = &playback {
            Self::wait_for_tail(audio);
        }
        let mut recording_dropped = sinks.recording_dropped();
        let recording = recorder.and_then(|recorder| match recorder.finish() {
            Ok(finished) => {
                log::info!(
                    "Recorded {} frames to {}",
                    finished.frames,
                    finished.path.display()
                );
                recording_dropped = recording_dropped.max(finished.dropped_frames);
                Some(finished.path)
            }
            Err(e) => {
                log::error!("Recording didn't finish cleanly: {e}");
                None
            }
        });
        if recording_dropped > 0 {
            log::warn!("The recording is missing {recording_dropped} frames");
        }

        // A reader still blocked on a live input can't be joined.
        if reader.is_finished() {
            let _ = reader.join();
        }

        Ok(EngineReport {
            bars: scheduler.bars_completed(),
            frames: sinks.frames_delivered(),
            sample_rate,
            seed,
            recording,
            recording_dropped,
            score_lines: score.finish(),
        })
    }

    fn open_playback(settings: &EngineSettings) -> Result<Option<CpalAudioService>, EngineError> {
        if !settings.enable_audio_playback {
            return Ok(None);
        }
        match CpalAudioService::new_with(Some(settings.block_size)) {
            Ok(audio) => Ok(Some(audio)),
            Err(e) if settings.require_playback => Err(EngineError::PlaybackRequired(e.to_string())),
            Err(e) => {
                log::warn!("No audio playback ({e}); continuing without it");
                Ok(None)
            }
        }
    }

    fn wait_for_tail(audio: &CpalAudioService) {
        let queue = audio.queue();
        let deadline = Instant::now() + Self::TAIL_TIMEOUT;
        while !queue.is_empty() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
    }
}

/// The cue-reading side of a performance. It only ever touches the pending
/// state and the score.
struct CueReader {
    pending: PendingState,
    score: ScoreSender,
    cancellation: Arc<AtomicBool>,
    exit_on_eof: bool,
}
impl CueReader {
    fn spawn<R: BufRead + Send + 'static>(self, input: R) -> anyhow::Result<JoinHandle<()>> {
        Ok(std::thread::Builder::new()
            .name("cue-reader".to_string())
            .spawn(move || self.run(input))?)
    }

    fn run(self, input: impl BufRead) {
        for line in input.lines() {
            match line {
                Ok(line) => self.handle_line(&line),
                Err(e) => {
                    log::warn!("Stopped reading cues: {e}");
                    break;
                }
            }
        }
        log::info!("End of cue input");
        if self.exit_on_eof {
            self.cancellation.store(true, Ordering::Relaxed);
        }
    }

    fn handle_line(&self, line: &str) {
        let cue = match parse(line) {
            Ok(cue) => cue,
            Err(ParseSkip::Empty) => return,
            Err(skip) => {
                log::debug!("Skipped {line:?}: {skip}");
                return;
            }
        };
        self.score.emit(ScoreEvent::Cue {
            field: cue.field.to_string(),
            value: cue.value.clone(),
        });
        let delta = map(&cue);
        if delta.is_empty() {
            log::debug!("{}: {} changes nothing", cue.field, cue.value);
        } else {
            self.pending.apply(&delta);
        }
    }
}

/// The render loop's working set.
struct Performance<'a> {
    scheduler: &'a mut StateScheduler,
    sinks: &'a mut Sinks,
    block: &'a mut [StereoSample],
}
impl Performance<'_> {
    fn render_block(&mut self) -> usize {
        let rendered = self.scheduler.render(self.block);
        self.sinks.deliver(&self.block[..rendered]);
        rendered
    }

    fn is_stopped(&self) -> bool {
        self.scheduler.lifecycle() == Lifecycle::Stopped
    }

    /// Renders whenever the device asks for frames.
    fn play_to_device(&mut self, audio: &CpalAudioService) {
        let queue = audio.queue();
        let block_size = self.block.len();
        self.render_block();
        let mut underrunning = false;
        while !self.is_stopped() {
            match audio.receiver().recv_timeout(Engine::DEVICE_TIMEOUT) {
                Ok(CpalAudioServiceEvent::FramesNeeded(count)) => {
                    underrunning = false;
                    for _ in 0..count.div_ceil(block_size) {
                        if self.render_block() == 0 {
                            break;
                        }
                    }
                }
                Ok(CpalAudioServiceEvent::Underrun(count)) => {
                    if !underrunning {
                        log::warn!("Playback underrun; {count} frames of silence");
                    }
                    underrunning = true;
                }
                Ok(CpalAudioServiceEvent::Reset(sample_rate, channels)) => {
                    log::info!("Output device: {sample_rate} Hz, {channels} channels");
                }
                Err(RecvTimeoutError::Timeout) => {
                    // The device has gone quiet. Keep the performance moving
                    // without overfilling its queue.
                    if queue.len() + block_size <= queue.capacity() {
                        self.render_block();
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    log::warn!("Lost the output device; rendering without it");
                    self.play_paced();
                    return;
                }
            }
        }
    }

    /// Renders in step with the wall clock.
    fn play_paced(&mut self) {
        let start = Instant::now();
        let start_frames = self.scheduler.total_frames();
        let sample_rate = self.scheduler.position().sample_rate;
        while !self.is_stopped() {
            self.render_block();
            let due = sample_rate.seconds_for(self.scheduler.total_frames() - start_frames);
            let due = start + Duration::from_secs_f64(due.0);
            let now = Instant::now();
            if due > now {
                std::thread::sleep(due - now);
            }
        }
    }

    /// Renders as fast as the sinks accept frames.
    fn play_offline(&mut self) {
        while !self.is_stopped() {
            self.render_block();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{score::ScoreBuffer, settings::EngineSettingsBuilder};
    use std::io::Cursor;

    fn offline() -> EngineSettingsBuilder {
        let mut builder = EngineSettingsBuilder::default();
        builder
            .enable_audio_playback(false)
            .realtime_pacing(false)
            .sample_rate(8000_usize)
            .seed(42);
        builder
    }

    #[test]
    fn exit_codes() {
        assert_eq!(
            EngineError::Recording(RecorderError::Disconnected).exit_code(),
            2
        );
        assert_eq!(EngineError::PlaybackRequired("none".into()).exit_code(), 3);
        assert_eq!(
            EngineError::Settings(SettingsError::ZeroBlockSize).exit_code(),
            1
        );
        assert_eq!(EngineError::Other(anyhow::anyhow!("boom")).exit_code(), 1);
    }

    #[test]
    fn bad_settings_fail_before_starting() {
        let settings = offline().block_size(0_usize).build().unwrap();
        let result = Engine::new_with(settings).run(Cursor::new(""), Box::new(ScoreBuffer::default()));
        assert!(matches!(
            result,
            Err(EngineError::Settings(SettingsError::ZeroBlockSize))
        ));
    }

    #[test]
    fn stops_at_max_bars() {
        let settings = offline()
            .exit_on_eof(false)
            .max_bars(4_usize)
            .build()
            .unwrap();
        let buffer = ScoreBuffer::default();
        let report = Engine::new_with(settings)
            .run(Cursor::new(""), Box::new(buffer.clone()))
            .unwrap();
        assert_eq!(report.bars, 4);
        assert_eq!(report.seed, 42);
        assert_eq!(report.sample_rate, SampleRate::new(8000));
        assert_eq!(report.score_lines, 4);
        assert_eq!(buffer.lines().len(), 4);
    }

    #[test]
    fn zero_max_bars_is_rejected() {
        let settings = offline().max_bars(0_usize).build().unwrap();
        let result = Engine::new_with(settings).run(Cursor::new(""), Box::new(ScoreBuffer::default()));
        assert!(matches!(
            result,
            Err(EngineError::Settings(SettingsError::ZeroMaxBars))
        ));
    }

    #[test]
    fn offline_recording_loses_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("long.wav");
        // 40 bars at 8000 Hz is far more than the recorder's queue holds.
        let settings = offline()
            .exit_on_eof(false)
            .block_size(4096_usize)
            .max_bars(40_usize)
            .recording_path(&path)
            .build()
            .unwrap();
        let report = Engine::new_with(settings)
            .run(Cursor::new(""), Box::new(ScoreBuffer::default()))
            .unwrap();
        assert_eq!(report.recording_dropped, 0);
        assert_eq!(report.score_lines, 40);
        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.duration() as usize, report.frames);
    }

    #[test]
    fn cancellation_drains_the_current_bar() {
        let settings = offline().exit_on_eof(false).build().unwrap();
        let engine = Engine::new_with(settings);
        engine.cancellation().store(true, Ordering::Relaxed);
        let report = engine
            .run(Cursor::new(""), Box::new(ScoreBuffer::default()))
            .unwrap();
        assert_eq!(report.bars, 1);
        assert_eq!(report.score_lines, 1);
    }
}
