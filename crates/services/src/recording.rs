// Copyright (c) 2024 Mike Tsao

//! [RecorderService] writes audio frames to disk on its own thread.
//!
//! Frames always go to a 16-bit PCM WAV file through
//! [hound](https://crates.io/crates/hound), which is valid as soon as it is
//! finalized. If the requested path names a compressed format, the finished
//! WAV is handed to `ffmpeg` and removed once transcoding succeeds.

use crate::{AudioQueue, AudioStereoSampleType, CrossbeamChannel, ProvidesService};
use crossbeam::channel::{Receiver, RecvTimeoutError, Sender};
use std::{
    fs::File,
    io::BufWriter,
    path::{Path, PathBuf},
    process::Command,
    thread::JoinHandle,
    time::Duration,
};
use thiserror::Error;

/// Things that can go wrong while recording.
#[derive(Debug, Error)]
pub enum RecorderError {
    /// The WAV file couldn't be created.
    #[error("couldn't create recording {path}: {source}")]
    Create {
        #[allow(missing_docs)]
        path: PathBuf,
        #[allow(missing_docs)]
        source: hound::Error,
    },
    /// Writing or finalizing the WAV file failed.
    #[error("while writing recording: {0}")]
    Write(#[from] hound::Error),
    /// The recorder thread went away before reporting a result.
    #[error("recorder thread exited unexpectedly")]
    Disconnected,
}

/// What a finished recording holds.
#[derive(Clone, Debug, PartialEq)]
pub struct FinishedRecording {
    /// Where the recording ended up. This is the WAV file if transcoding
    /// wasn't possible.
    pub path: PathBuf,
    /// Frames written.
    pub frames: usize,
    /// Frames lost because the queue was full when they were pushed.
    pub dropped_frames: usize,
}

// Where the frames end up.
#[derive(Clone, Debug, PartialEq)]
struct RecordingTarget {
    // The WAV file that receives frames.
    wav_path: PathBuf,
    // If set, the compressed file that the WAV is transcoded into, along with
    // the `ffmpeg` executable that does it.
    transcode: Option<(PathBuf, PathBuf)>,
}
impl RecordingTarget {
    // WAV paths are written directly. For anything else, frames go to a
    // sibling `.wav` that is transcoded at the end, if `ffmpeg` can be found.
    fn for_path(requested: &Path) -> Self {
        if Self::is_wav(requested) {
            return Self {
                wav_path: requested.to_path_buf(),
                transcode: None,
            };
        }
        let wav_path = requested.with_extension("wav");
        let transcode = match which::which("ffmpeg") {
            Ok(ffmpeg) => Some((requested.to_path_buf(), ffmpeg)),
            Err(e) => {
                log::warn!(
                    "ffmpeg not found ({e}); recording will be kept as {}",
                    wav_path.display()
                );
                None
            }
        };
        Self {
            wav_path,
            transcode,
        }
    }

    fn is_wav(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("wav"))
    }
}

/// A [RecorderServiceInput] tells [RecorderService] what to do.
#[derive(Debug)]
pub enum RecorderServiceInput {
    /// Write everything still in the queue, finalize the file, and exit.
    Quit,
}

/// A [RecorderServiceEvent] informs clients what's going on.
#[derive(Debug)]
pub enum RecorderServiceEvent {
    /// The queue was full, so this many frames were lost.
    Overrun(usize),
    /// The recording is complete and lives at the given path, holding the
    /// given number of frames.
    Finished(PathBuf, usize),
    /// Something went wrong. Whatever was written before the failure has been
    /// finalized if possible.
    Failed(String),
}

type Writer = hound::WavWriter<BufWriter<File>>;

/// [RecorderService] drains an [AudioQueue] into a recording on a dedicated
/// thread, so that the render loop never touches the filesystem.
#[derive(Debug)]
pub struct RecorderService {
    inputs: CrossbeamChannel<RecorderServiceInput>,
    events: CrossbeamChannel<RecorderServiceEvent>,
    queue: AudioQueue,
    handle: Option<JoinHandle<()>>,
}
impl ProvidesService<RecorderServiceInput, RecorderServiceEvent> for RecorderService {
    fn sender(&self) -> &Sender<RecorderServiceInput> {
        &self.inputs.sender
    }

    fn receiver(&self) -> &Receiver<RecorderServiceEvent> {
        &self.events.receiver
    }
}
impl RecorderService {
    /// How often the writer thread wakes up to drain the queue.
    const DRAIN_INTERVAL: Duration = Duration::from_millis(20);

    /// How many seconds of audio the queue can hold before the writer falls
    /// behind.
    const QUEUE_SECONDS: usize = 8;

    /// Starts recording to `path` at `sample_rate`. `quality` is the ffmpeg
    /// VBR quality (`-q:a`) used if the path names a compressed format.
    ///
    /// The WAV file is created before this returns, so a bad path fails here
    /// rather than at shutdown.
    pub fn new_with(path: &Path, sample_rate: u32, quality: u8) -> Result<Self, RecorderError> {
        let target = RecordingTarget::for_path(path);
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let writer =
            hound::WavWriter::create(&target.wav_path, spec).map_err(|source| {
                RecorderError::Create {
                    path: target.wav_path.clone(),
                    source,
                }
            })?;

        log::info!("Recording to {}", target.wav_path.display());

        let inputs: CrossbeamChannel<RecorderServiceInput> = Default::default();
        let events: CrossbeamChannel<RecorderServiceEvent> = Default::default();
        let queue = AudioQueue::new(sample_rate as usize * Self::QUEUE_SECONDS);

        let receiver = inputs.receiver.clone();
        let sender = events.sender.clone();
        let queue_clone = queue.clone();
        let handle = std::thread::Builder::new()
            .name("recorder".to_string())
            .spawn(move || {
                Self::run(writer, receiver, sender, queue_clone, target, quality)
            })
            .map_err(|e| RecorderError::Write(hound::Error::IoError(e)))?;

        Ok(Self {
            inputs,
            events,
            queue,
            handle: Some(handle),
        })
    }

    /// The queue to push frames into. Pushing never blocks; frames that don't
    /// fit are counted and reported as [RecorderServiceEvent::Overrun].
    pub fn queue(&self) -> AudioQueue {
        self.queue.clone()
    }

    /// Flushes the queue, finalizes the file, transcodes it if needed, and
    /// describes the finished recording.
    pub fn finish(mut self) -> Result<FinishedRecording, RecorderError> {
        let _ = self.inputs.sender.send(RecorderServiceInput::Quit);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        let mut finished = None;
        let mut dropped_frames = 0;
        while let Ok(event) = self.events.receiver.try_recv() {
            match event {
                RecorderServiceEvent::Overrun(count) => dropped_frames += count,
                RecorderServiceEvent::Finished(path, frames) => finished = Some((path, frames)),
                RecorderServiceEvent::Failed(message) => {
                    log::error!("Recording failed: {message}");
                }
            }
        }
        if dropped_frames > 0 {
            log::warn!("The recording lost {dropped_frames} frames to queue overruns");
        }
        finished
            .map(|(path, frames)| FinishedRecording {
                path,
                frames,
                dropped_frames,
            })
            .ok_or(RecorderError::Disconnected)
    }

    fn run(
        mut writer: Writer,
        receiver: Receiver<RecorderServiceInput>,
        sender: Sender<RecorderServiceEvent>,
        queue: AudioQueue,
        target: RecordingTarget,
        quality: u8,
    ) {
        let mut frames_written = 0;
        loop {
            let should_quit = match receiver.recv_timeout(Self::DRAIN_INTERVAL) {
                Ok(RecorderServiceInput::Quit) | Err(RecvTimeoutError::Disconnected) => true,
                Err(RecvTimeoutError::Timeout) => false,
            };
            match Self::drain(&mut writer, &queue) {
                Ok(count) => frames_written += count,
                Err(e) => {
                    let _ = sender.send(RecorderServiceEvent::Failed(e.to_string()));
                    break;
                }
            }
            let dropped = queue.take_dropped();
            if dropped > 0 {
                let _ = sender.send(RecorderServiceEvent::Overrun(dropped));
            }
            if should_quit {
                break;
            }
        }
        if let Err(e) = writer.finalize() {
            let _ = sender.send(RecorderServiceEvent::Failed(e.to_string()));
            return;
        }

        let final_path = match &target.transcode {
            Some((compressed_path, ffmpeg)) => {
                match Self::transcode(ffmpeg, &target.wav_path, compressed_path, quality) {
                    Ok(()) => {
                        let _ = std::fs::remove_file(&target.wav_path);
                        compressed_path.clone()
                    }
                    Err(e) => {
                        log::warn!(
                            "Transcoding failed ({e}); keeping {}",
                            target.wav_path.display()
                        );
                        target.wav_path.clone()
                    }
                }
            }
            None => target.wav_path.clone(),
        };
        log::info!(
            "Recording saved: {} ({frames_written} frames)",
            final_path.display()
        );
        let _ = sender.send(RecorderServiceEvent::Finished(final_path, frames_written));
    }

    fn drain(writer: &mut Writer, queue: &AudioQueue) -> Result<usize, hound::Error> {
        let mut count = 0;
        while let Some(frame) = queue.pop() {
            let (left, right) = Self::frame_to_i16(frame);
            writer.write_sample(left)?;
            writer.write_sample(right)?;
            count += 1;
        }
        Ok(count)
    }

    fn frame_to_i16(frame: AudioStereoSampleType) -> (i16, i16) {
        let convert = |s: f32| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        (convert(frame.0), convert(frame.1))
    }

    fn transcode(
        ffmpeg: &Path,
        wav_path: &Path,
        compressed_path: &Path,
        quality: u8,
    ) -> anyhow::Result<()> {
        let output = Command::new(ffmpeg)
            .arg("-y")
            .arg("-loglevel")
            .arg("error")
            .arg("-i")
            .arg(wav_path)
            .arg("-q:a")
            .arg(quality.to_string())
            .arg(compressed_path)
            .output()?;
        if output.status.success() {
            Ok(())
        } else {
            Err(anyhow::anyhow!(
                "ffmpeg exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ))
        }
    }
}
impl Drop for RecorderService {
    fn drop(&mut self) {
        // A recorder dropped without finish() still finalizes its file.
        if let Some(handle) = self.handle.take() {
            let _ = self.inputs.sender.send(RecorderServiceInput::Quit);
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wav_paths_are_written_directly() {
        let target = RecordingTarget::for_path(Path::new("/tmp/session.WAV"));
        assert_eq!(target.wav_path, PathBuf::from("/tmp/session.WAV"));
        assert!(target.transcode.is_none());
    }

    #[test]
    fn compressed_paths_go_through_a_sibling_wav() {
        let target = RecordingTarget::for_path(Path::new("/tmp/session.mp3"));
        assert_eq!(target.wav_path, PathBuf::from("/tmp/session.wav"));
        if let Some((compressed, _)) = target.transcode {
            assert_eq!(compressed, PathBuf::from("/tmp/session.mp3"));
        }
    }

    #[test]
    fn frames_are_recorded_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("take.wav");
        let recorder = RecorderService::new_with(&path, 8000, 0).unwrap();
        let queue = recorder.queue();
        assert_eq!(queue.push_frames(&[(0.5, 0.5), (-0.5, -0.5), (1.5, -1.5)]), 0);

        let finished = recorder.finish().unwrap();
        assert_eq!(finished.path, path);
        assert_eq!(finished.frames, 3);
        assert_eq!(finished.dropped_frames, 0);

        let mut reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.spec().sample_rate, 8000);
        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(
            samples,
            vec![16383, 16383, -16383, -16383, i16::MAX, -i16::MAX],
            "out-of-range samples should be clamped"
        );
    }

    #[test]
    fn overruns_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overrun.wav");
        // One frame per second holds only eight frames of queue.
        let recorder = RecorderService::new_with(&path, 1, 0).unwrap();
        let queue = recorder.queue();
        let frames = vec![(0.25, 0.25); 1000];
        let dropped = queue.push_frames(&frames);
        assert!(dropped > 0);

        let finished = recorder.finish().unwrap();
        assert_eq!(finished.dropped_frames, dropped);
        assert_eq!(finished.frames + finished.dropped_frames, frames.len());
        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.duration() as usize, finished.frames);
    }

    #[test]
    fn bad_path_fails_at_startup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no-such-dir").join("take.wav");
        assert!(matches!(
            RecorderService::new_with(&path, 44100, 0),
            Err(RecorderError::Create { .. })
        ));
    }
}
