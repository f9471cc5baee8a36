// Copyright (c) 2024 Mike Tsao

//! The human-readable score: one line per cue and one per bar.
//!
//! Lines are formatted and written on a dedicated thread. The render loop and
//! the cue reader hand events over through a bounded channel with
//! non-blocking sends, so a slow or broken terminal can never stall the audio.
//! Offline renders use a [ScoreSender::lossless()] handle instead, which waits
//! for the logger rather than dropping lines.

use crate::{state::MusicalState, types::Seconds};
use crossbeam::channel::{Receiver, Sender, TrySendError};
use std::{
    fmt::Display,
    io::Write,
    sync::{Arc, Mutex},
    thread::JoinHandle,
};

/// Something worth writing down.
#[derive(Clone, Debug, PartialEq)]
pub enum ScoreEvent {
    /// A cue arrived from the director.
    Cue {
        #[allow(missing_docs)]
        field: String,
        #[allow(missing_docs)]
        value: String,
    },
    /// A bar line passed and `state` took effect.
    Bar {
        /// How many bars have completed.
        bar: usize,
        /// Rendered time at the bar line.
        elapsed: Seconds,
        #[allow(missing_docs)]
        state: MusicalState,
    },
}
impl Display for ScoreEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScoreEvent::Cue { field, value } => write!(f, "[DIR] {field}: {value}"),
            ScoreEvent::Bar {
                bar,
                elapsed,
                state,
            } => {
                let chord: &'static str = state.chord.into();
                let scale: &'static str = state.scale.into();
                write!(
                    f,
                    "[{:7.2}s] Bar {:4} | root={:2} chord={:6} scale={:12} | density={:.2} intensity={:.2} tempo_mult={:.2}",
                    elapsed.0,
                    bar,
                    state.root.0,
                    chord,
                    scale,
                    state.density.0,
                    state.intensity.0,
                    state.tempo_multiplier
                )
            }
        }
    }
}

/// A cheap, cloneable handle for sending [ScoreEvent]s. By default sending
/// never blocks, and if the logger is backed up, the event is dropped.
#[derive(Clone, Debug, Default)]
pub struct ScoreSender {
    sender: Option<Sender<ScoreEvent>>,
    lossless: bool,
}
impl ScoreSender {
    /// A sender that discards everything.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// The same sender, but one that waits for room instead of dropping.
    /// Never hand this to a real-time thread.
    pub fn lossless(self) -> Self {
        Self {
            lossless: true,
            ..self
        }
    }

    #[allow(missing_docs)]
    pub fn emit(&self, event: ScoreEvent) {
        let Some(sender) = &self.sender else {
            return;
        };
        if self.lossless {
            let _ = sender.send(event);
            return;
        }
        match sender.try_send(event) {
            Ok(()) | Err(TrySendError::Disconnected(_)) => {}
            Err(TrySendError::Full(_)) => log::warn!("Score logger is behind; dropped a line"),
        }
    }
}

/// Owns the thread that writes the score.
#[derive(Debug)]
pub struct ScoreLogger {
    sender: Sender<ScoreEvent>,
    quit: Sender<()>,
    handle: Option<JoinHandle<usize>>,
}
impl ScoreLogger {
    /// How many lines can be waiting before new ones are dropped.
    pub const CHANNEL_CAPACITY: usize = 256;

    /// Starts a logger that writes lines to `writer`.
    pub fn new_with(writer: Box<dyn Write + Send>) -> anyhow::Result<Self> {
        let (sender, receiver) = crossbeam::channel::bounded(Self::CHANNEL_CAPACITY);
        let (quit, quit_receiver) = crossbeam::channel::bounded(1);
        let handle = std::thread::Builder::new()
            .name("score".to_string())
            .spawn(move || Self::run(writer, receiver, quit_receiver))?;
        Ok(Self {
            sender,
            quit,
            handle: Some(handle),
        })
    }

    /// A handle for sending events to this logger.
    pub fn sender(&self) -> ScoreSender {
        ScoreSender {
            sender: Some(self.sender.clone()),
            lossless: false,
        }
    }

    /// Writes everything already sent, stops the thread, and returns the
    /// number of lines written.
    pub fn finish(mut self) -> usize {
        self.stop()
    }

    fn stop(&mut self) -> usize {
        let _ = self.quit.try_send(());
        self.handle
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default()
    }

    fn run(
        mut writer: Box<dyn Write + Send>,
        receiver: Receiver<ScoreEvent>,
        quit: Receiver<()>,
    ) -> usize {
        let mut lines_written = 0;
        let mut enabled = true;
        let mut write_line = |event: ScoreEvent| {
            if !enabled {
                return;
            }
            match writeln!(writer, "{event}").and_then(|_| writer.flush()) {
                Ok(()) => lines_written += 1,
                Err(e) => {
                    log::warn!("Score output failed ({e}); score logging is now off");
                    enabled = false;
                }
            }
        };
        loop {
            crossbeam::select! {
                recv(receiver) -> event => match event {
                    Ok(event) => write_line(event),
                    Err(_) => break,
                },
                recv(quit) -> _ => {
                    receiver.try_iter().for_each(&mut write_line);
                    break;
                },
            }
        }
        lines_written
    }
}
impl Drop for ScoreLogger {
    fn drop(&mut self) {
        self.stop();
    }
}

/// An in-memory score destination that can be read back while it's being
/// written. Handy for embedding the engine or checking its output.
#[derive(Clone, Debug, Default)]
pub struct ScoreBuffer(Arc<Mutex<Vec<u8>>>);
impl ScoreBuffer {
    /// Everything written so far, split into lines.
    pub fn lines(&self) -> Vec<String> {
        let bytes = self.0.lock().unwrap_or_else(|e| e.into_inner());
        String::from_utf8_lossy(&bytes)
            .lines()
            .map(str::to_string)
            .collect()
    }
}
impl Write for ScoreBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
