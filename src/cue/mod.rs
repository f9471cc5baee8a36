// Copyright (c) 2024 Mike Tsao

//! Turning director output into state changes.
//!
//! [parse()] recognizes a `field: value` line, and [map()] translates the
//! resulting [Cue] into a [StateDelta](crate::state::StateDelta). Neither has
//! side effects; the caller decides where the delta goes.

/// The most commonly used imports.
pub mod prelude {
    pub use super::{map, parse, Cue, CueField, ParseSkip};
}

pub use mapper::map;
pub use parser::{parse, parse_at, Cue, CueField, ParseSkip, DIRECTOR_TAG};

mod mapper;
mod parser;
