// Copyright (c) 2024 Mike Tsao

//! The four voices of the ensemble.
//!
//! Every voice works the same way. When it sees the first span of a new bar,
//! it plans that bar's events into a fixed-capacity [BarPlan] using the bar's
//! applied state and its own [Rng] stream. Then it renders frame by frame,
//! firing events as their start frames come up. Nothing allocates after
//! construction.

use crate::{
    scheduler::ClockPosition,
    state::MusicalState,
    traits::RendersVoice,
    types::{Sample, SampleRate},
    util::Rng,
};
use strum_macros::{Display, EnumIter, IntoStaticStr};

pub use {bass::BassVoice, lead::LeadVoice, percussion::PercussionVoice, rhythm::RhythmVoice};

mod bass;
mod lead;
mod percussion;
mod rhythm;

/// Names the members of the ensemble.
#[derive(Clone, Copy, Debug, Display, EnumIter, Eq, IntoStaticStr, PartialEq)]
#[strum(serialize_all = "lowercase")]
pub enum VoiceKind {
    /// Melody.
    Lead,
    /// Chord comping.
    Rhythm,
    /// Sub bass.
    Bass,
    /// Breakbeat.
    Percussion,
}
impl VoiceKind {
    /// How many voices there are.
    pub const COUNT: usize = 4;

    /// The position of this voice in mixer and scheduler arrays.
    pub fn index(&self) -> usize {
        match self {
            VoiceKind::Lead => 0,
            VoiceKind::Rhythm => 1,
            VoiceKind::Bass => 2,
            VoiceKind::Percussion => 3,
        }
    }

    // Distinct per-voice random streams, so one voice's choices don't shift
    // another's.
    fn stream(&self) -> u64 {
        self.index() as u64 + 1
    }
}

/// A closed set of voices behind one [RendersVoice] implementation.
#[derive(Debug)]
pub enum Voice {
    #[allow(missing_docs)]
    Lead(LeadVoice),
    #[allow(missing_docs)]
    Rhythm(RhythmVoice),
    #[allow(missing_docs)]
    Bass(BassVoice),
    #[allow(missing_docs)]
    Percussion(PercussionVoice),
}
impl Voice {
    /// Creates the given voice. `seed` is the engine seed; each voice derives
    /// its own stream from it.
    pub fn new_with(kind: VoiceKind, sample_rate: SampleRate, seed: u128) -> Self {
        let rng = Rng::new_for_stream(seed, kind.stream());
        match kind {
            VoiceKind::Lead => Voice::Lead(LeadVoice::new_with(sample_rate, rng)),
            VoiceKind::Rhythm => Voice::Rhythm(RhythmVoice::new_with(sample_rate, rng)),
            VoiceKind::Bass => Voice::Bass(BassVoice::new_with(sample_rate, rng)),
            VoiceKind::Percussion => {
                Voice::Percussion(PercussionVoice::new_with(sample_rate, rng))
            }
        }
    }

    /// The full ensemble, in [VoiceKind::index()] order.
    pub fn ensemble(sample_rate: SampleRate, seed: u128) -> [Voice; VoiceKind::COUNT] {
        [
            Self::new_with(VoiceKind::Lead, sample_rate, seed),
            Self::new_with(VoiceKind::Rhythm, sample_rate, seed),
            Self::new_with(VoiceKind::Bass, sample_rate, seed),
            Self::new_with(VoiceKind::Percussion, sample_rate, seed),
        ]
    }

    #[allow(missing_docs)]
    pub fn kind(&self) -> VoiceKind {
        match self {
            Voice::Lead(_) => VoiceKind::Lead,
            Voice::Rhythm(_) => VoiceKind::Rhythm,
            Voice::Bass(_) => VoiceKind::Bass,
            Voice::Percussion(_) => VoiceKind::Percussion,
        }
    }
}
impl RendersVoice for Voice {
    fn render(&mut self, out: &mut [Sample], state: &MusicalState, clock: &ClockPosition) {
        match self {
            Voice::Lead(v) => v.render(out, state, clock),
            Voice::Rhythm(v) => v.render(out, state, clock),
            Voice::Bass(v) => v.render(out, state, clock),
            Voice::Percussion(v) => v.render(out, state, clock),
        }
    }
}

/// Shields a voice from bad state. Out-of-range fields are replaced with the
/// last values that were good, and a warning goes out once per run of bad
/// bars.
#[derive(Debug)]
pub(crate) struct StateGuard {
    kind: VoiceKind,
    last_good: MusicalState,
    faulted: bool,
}
impl StateGuard {
    pub(crate) fn new_with(kind: VoiceKind) -> Self {
        Self {
            kind,
            last_good: MusicalState::default(),
            faulted: false,
        }
    }

    pub(crate) fn check(&mut self, state: &MusicalState) -> MusicalState {
        let (state, faulted) = state.sanitized(&self.last_good);
        if faulted && !self.faulted {
            log::warn!(
                "{} voice received out-of-range state; holding last good values",
                self.kind
            );
        } else if !faulted && self.faulted {
            log::info!("{} voice state is back in range", self.kind);
        }
        self.faulted = faulted;
        self.last_good = state;
        state
    }

    #[cfg(test)]
    pub(crate) fn is_faulted(&self) -> bool {
        self.faulted
    }
}

/// A bar's worth of events, kept sorted by start frame, with a cursor that
/// hands them out as rendering reaches them.
#[derive(Debug)]
pub(crate) struct BarPlan<T: Copy + Default, const N: usize> {
    events: [(usize, T); N],
    len: usize,
    cursor: usize,
    bar: Option<usize>,
}
impl<T: Copy + Default, const N: usize> Default for BarPlan<T, N> {
    fn default() -> Self {
        Self {
            events: [(0, T::default()); N],
            len: 0,
            cursor: 0,
            bar: None,
        }
    }
}
impl<T: Copy + Default, const N: usize> BarPlan<T, N> {
    /// Whether this plan needs to be rebuilt for the given position.
    pub(crate) fn is_stale(&self, clock: &ClockPosition) -> bool {
        self.bar != Some(clock.bar)
    }

    /// Empties the plan and marks it as belonging to the clock's bar.
    pub(crate) fn start(&mut self, clock: &ClockPosition) {
        self.len = 0;
        self.cursor = 0;
        self.bar = Some(clock.bar);
    }

    /// Inserts an event in start order. Events past capacity are dropped.
    pub(crate) fn insert(&mut self, start: usize, event: T) {
        if self.len == N {
            return;
        }
        let mut i = self.len;
        while i > 0 && self.events[i - 1].0 > start {
            self.events[i] = self.events[i - 1];
            i -= 1;
        }
        self.events[i] = (start, event);
        self.len += 1;
    }

    /// The next event due at or before `frame`, if any.
    pub(crate) fn next_due(&mut self, frame: usize) -> Option<T> {
        if self.cursor < self.len && self.events[self.cursor].0 <= frame {
            self.cursor += 1;
            Some(self.events[self.cursor - 1].1)
        } else {
            None
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[cfg(test)]
    pub(crate) fn starts(&self) -> impl Iterator<Item = usize> + '_ {
        self.events[..self.len].iter().map(|(start, _)| *start)
    }
}

/// Counts frames down to a note-off.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Gate(Option<usize>);
impl Gate {
    pub(crate) fn open_for(&mut self, frames: usize) {
        self.0 = Some(frames);
    }

    /// Advances one frame. Returns true on the frame the gate closes.
    pub(crate) fn tick(&mut self) -> bool {
        match self.0 {
            Some(0) => {
                self.0 = None;
                true
            }
            Some(n) => {
                self.0 = Some(n - 1);
                false
            }
            None => false,
        }
    }
}
