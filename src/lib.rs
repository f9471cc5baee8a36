// Copyright (c) 2024 Mike Tsao

#![deny(missing_docs, unused_imports, unused_variables)]
#![allow(rustdoc::private_intra_doc_links)]

//! cuetrack turns a stream of short textual director cues, such as
//! `color: blue` or `energy: high`, into a continuously evolving four-voice
//! soundtrack.
//!
//! Cues can arrive at any time, but the music only changes on bar lines. The
//! pieces fit together like this:
//!
//! * [cue] parses a line into a [Cue](cue::Cue) and maps it to a
//! [StateDelta](state::StateDelta), which is merged into the shared
//! [PendingState](state::PendingState).
//! * [StateScheduler] promotes the pending state at each bar line and drives
//! the [voices] through the [Mixer](mixer::Mixer).
//! * [Sinks](mixer::Sinks) hand the mix to playback and recording, and the
//! [score] records what happened in human-readable form.
//! * [Engine] wires all of that to real input, output devices, and files.
//!
//! ```no_run
//! use cuetrack::{Engine, EngineSettingsBuilder};
//!
//! let settings = EngineSettingsBuilder::default()
//!     .recording_path("session.wav")
//!     .max_bars(16_usize)
//!     .build()
//!     .unwrap();
//! let report = Engine::new_with(settings)
//!     .run(std::io::BufReader::new(std::io::stdin()), Box::new(std::io::stdout()))
//!     .unwrap();
//! println!("{} bars", report.bars);
//! ```

/// A collection of imports that are useful to users of this crate. `use
/// cuetrack::prelude::*;` for easier onboarding.
pub mod prelude {
    pub use super::{
        cue::prelude::*, elements::prelude::*, traits::prelude::*, types::prelude::*,
        util::prelude::*,
    };
    pub use super::{Engine, EngineSettings, MusicalState, StateScheduler};
}

// Fundamental structures that are important enough to re-export at top level.
pub use {
    engine::{Engine, EngineError, EngineReport},
    scheduler::StateScheduler,
    settings::{EngineSettings, EngineSettingsBuilder, SettingsError},
    state::MusicalState,
};

pub mod cue;
pub mod elements;
pub mod engine;
pub mod mixer;
pub mod scheduler;
pub mod score;
pub mod settings;
pub mod state;
pub mod traits;
pub mod types;
pub mod util;
pub mod voices;
