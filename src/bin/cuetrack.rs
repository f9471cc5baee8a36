// Copyright (c) 2024 Mike Tsao

//! Reads director cues on stdin, plays the soundtrack, and prints the score on
//! stdout.

use clap::Parser;
use cuetrack::{Engine, EngineError, EngineSettings};
use std::{
    io::BufReader,
    path::PathBuf,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

/// Exit status after a second interrupt.
const INTERRUPTED: i32 = 130;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON settings file. Flags override what it says.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Base tempo in beats per minute
    #[arg(long)]
    bpm: Option<f64>,

    /// Don't play through the output device
    #[arg(long)]
    no_audio: bool,

    /// Fail if no output device is available
    #[arg(long, conflicts_with = "no_audio")]
    require_playback: bool,

    /// Record to this file (.wav, or .mp3/.ogg/.flac/.opus with ffmpeg)
    #[arg(short, long)]
    record: Option<PathBuf>,

    /// ffmpeg VBR quality for compressed recordings (0 is best)
    #[arg(long)]
    quality: Option<u8>,

    /// Seed for every random choice
    #[arg(long)]
    seed: Option<u64>,

    /// Stop after this many bars
    #[arg(long)]
    max_bars: Option<usize>,

    /// Frames rendered per block
    #[arg(long)]
    block_size: Option<usize>,

    /// Sample rate when not playing through a device
    #[arg(long)]
    sample_rate: Option<usize>,

    /// Without playback, render as fast as possible instead of in real time
    #[arg(long)]
    offline: bool,

    /// Keep playing after the end of input
    #[arg(long)]
    keep_going: bool,

    /// Don't echo cues in the score
    #[arg(long)]
    no_echo: bool,
}
impl Args {
    fn to_settings(&self) -> Result<EngineSettings, EngineError> {
        let mut settings = match &self.settings {
            Some(path) => EngineSettings::load_from_file(path)?,
            None => EngineSettings::default(),
        };
        if let Some(bpm) = self.bpm {
            settings.base_tempo = bpm.into();
        }
        if self.no_audio {
            settings.enable_audio_playback = false;
        }
        if self.require_playback {
            settings.require_playback = true;
        }
        if let Some(path) = &self.record {
            settings.recording_path = Some(path.clone());
        }
        if let Some(quality) = self.quality {
            settings.encoder_quality = quality;
        }
        if self.seed.is_some() {
            settings.seed = self.seed;
        }
        if self.max_bars.is_some() {
            settings.max_bars = self.max_bars;
        }
        if let Some(block_size) = self.block_size {
            settings.block_size = block_size;
        }
        if let Some(sample_rate) = self.sample_rate {
            settings.sample_rate = sample_rate;
        }
        if self.offline {
            settings.realtime_pacing = false;
        }
        if self.keep_going {
            settings.exit_on_eof = false;
        }
        if self.no_echo {
            settings.echo_cues = false;
        }
        Ok(settings)
    }
}

fn run(args: Args) -> Result<(), EngineError> {
    let engine = Engine::new_with(args.to_settings()?);

    let cancellation = engine.cancellation();
    let interrupts = Arc::new(AtomicUsize::default());
    ctrlc::set_handler(move || {
        if interrupts.fetch_add(1, Ordering::Relaxed) == 0 {
            log::info!("Interrupted; finishing the current bar (interrupt again to quit now)");
            cancellation.store(true, Ordering::Relaxed);
        } else {
            std::process::exit(INTERRUPTED);
        }
    })
    .map_err(anyhow::Error::from)?;

    let report = engine.run(BufReader::new(std::io::stdin()), Box::new(std::io::stdout()))?;
    if let Some(path) = &report.recording {
        eprintln!("Recording saved to {}", path.display());
    }
    Ok(())
}

fn main() {
    env_logger::init();
    if let Err(e) = run(Args::parse()) {
        log::error!("{e}");
        eprintln!("cuetrack: {e}");
        std::process::exit(e.exit_code());
    }
}
