// Copyright (c) 2024 Mike Tsao

//! Wrappers around third-party audio crates that make them easier to use with
//! crossbeam channels.
//!
//! Both services read from an [AudioQueue], a lock-free ring buffer that a
//! real-time render loop can write to without blocking or allocating.

#![deny(missing_docs)]

/// The most commonly used imports.
pub mod prelude {
    #[cfg(feature = "audio")]
    pub use super::{CpalAudioService, CpalAudioServiceEvent, CpalAudioServiceInput};
    #[cfg(feature = "recording")]
    pub use super::{FinishedRecording, RecorderError, RecorderService, RecorderServiceEvent};
    pub use super::{AudioQueue, AudioStereoSampleType, ProvidesService};
}

#[cfg(feature = "audio")]
pub use audio::{CpalAudioService, CpalAudioServiceEvent, CpalAudioServiceInput};
#[cfg(feature = "recording")]
pub use recording::{
    FinishedRecording, RecorderError, RecorderService, RecorderServiceEvent, RecorderServiceInput,
};
pub use traits::ProvidesService;
pub use types::{AudioQueue, AudioSampleType, AudioStereoSampleType, CrossbeamChannel};

#[cfg(feature = "audio")]
mod audio;
#[cfg(feature = "recording")]
mod recording;
mod traits;
mod types;
