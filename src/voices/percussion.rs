// Copyright (c) 2024 Mike Tsao

use super::{BarPlan, StateGuard, VoiceKind};
use crate::{
    elements::{DecayEnvelope, OnePoleFilter, OnePoleMode, Oscillator, Waveform},
    scheduler::ClockPosition,
    state::MusicalState,
    traits::prelude::*,
    types::{FrequencyHz, Sample, SampleRate},
    util::Rng,
};

const KICK_BEATS: [f64; 3] = [0.0, 2.75, 3.5];
const SNARE_BEATS: [f64; 2] = [1.0, 3.0];
const GHOST_SNARE_BEATS: [f64; 2] = [1.75, 2.5];
const MAX_HITS: usize = 32;

const KICK_LEVEL: f64 = 0.8;
const KICK_BASE_HZ: f64 = 50.0;
const KICK_SWEEP_HZ: f64 = 150.0;
const SNARE_TONE_LEVEL: f64 = 0.3;
const SNARE_TONE_HZ: f64 = 200.0;
const SNARE_NOISE_LEVEL: f64 = 0.4;
const HAT_LEVEL: f64 = 0.3;
const HAT_SCALE: f64 = 0.7;
const GHOST_SCALE: f64 = 0.35;
const SIXTEENTH_SCALE: f64 = 0.6;
const OPEN_HAT_CHANCE: f64 = 0.1;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
enum Drum {
    #[default]
    Kick,
    Snare,
    ClosedHat,
    OpenHat,
}

#[derive(Clone, Copy, Debug, Default)]
struct DrumHit {
    drum: Drum,
    velocity: f64,
}

/// A one-bar breakbeat synthesized from sine sweeps and filtered noise.
#[derive(Debug)]
pub struct PercussionVoice {
    rng: Rng,
    guard: StateGuard,
    plan: BarPlan<DrumHit, MAX_HITS>,

    kick: Oscillator,
    kick_pitch: DecayEnvelope,
    kick_amplitude: DecayEnvelope,

    snare_tone: Oscillator,
    snare_tone_amplitude: DecayEnvelope,
    snare_noise: Oscillator,
    snare_noise_amplitude: DecayEnvelope,
    snare_filter: OnePoleFilter,

    hat_noise: Oscillator,
    hat_amplitude: DecayEnvelope,
    hat_filter: OnePoleFilter,
}
impl RendersVoice for PercussionVoice {
    fn render(&mut self, out: &mut [Sample], state: &MusicalState, clock: &ClockPosition) {
        if self.plan.is_stale(clock) {
            let state = self.guard.check(state);
            self.plan_bar(&state, clock);
        }
        for (i, sample) in out.iter_mut().enumerate() {
            while let Some(hit) = self.plan.next_due(clock.frame_in_bar + i) {
                self.strike(hit);
            }
            *sample = Sample(self.next_kick() + self.next_snare() + self.next_hat());
        }
    }
}
impl PercussionVoice {
    #[allow(missing_docs)]
    pub fn new_with(sample_rate: SampleRate, rng: Rng) -> Self {
        let mut snare_tone = Oscillator::new_with(Waveform::Sine, sample_rate);
        snare_tone.set_frequency(FrequencyHz(SNARE_TONE_HZ));
        Self {
            rng,
            guard: StateGuard::new_with(VoiceKind::Percussion),
            plan: Default::default(),
            kick: Oscillator::new_with(Waveform::Sine, sample_rate),
            kick_pitch: DecayEnvelope::new_with(sample_rate, 30.0),
            kick_amplitude: DecayEnvelope::new_with(sample_rate, 8.0),
            snare_tone,
            snare_tone_amplitude: DecayEnvelope::new_with(sample_rate, 20.0),
            snare_noise: Oscillator::new_with(Waveform::Noise, sample_rate),
            snare_noise_amplitude: DecayEnvelope::new_with(sample_rate, 15.0),
            snare_filter: OnePoleFilter::new_with(
                OnePoleMode::HighPass,
                FrequencyHz(2000.0),
                sample_rate,
            ),
            hat_noise: Oscillator::new_with(Waveform::Noise, sample_rate),
            hat_amplitude: DecayEnvelope::new_with(sample_rate, 30.0),
            hat_filter: OnePoleFilter::new_with(
                OnePoleMode::HighPass,
                FrequencyHz(7000.0),
                sample_rate,
            ),
        }
    }

    fn plan_bar(&mut self, state: &MusicalState, clock: &ClockPosition) {
        self.plan.start(clock);
        let density = state.density.0;
        let accent = state.intensity.0;

        for beat in KICK_BEATS {
            self.add(clock, beat, Drum::Kick, accent);
        }
        for beat in SNARE_BEATS {
            self.add(clock, beat, Drum::Snare, accent);
        }
        if density > 0.6 {
            for beat in GHOST_SNARE_BEATS {
                if self.rng.chance(density) {
                    self.add(clock, beat, Drum::Snare, accent * GHOST_SCALE);
                }
            }
        }
        for eighth in 0..clock.beats_per_bar * 2 {
            if self.rng.rand_float() > density + 0.2 {
                continue;
            }
            let drum = if self.rng.chance(OPEN_HAT_CHANCE) {
                Drum::OpenHat
            } else {
                Drum::ClosedHat
            };
            self.add(clock, eighth as f64 * 0.5, drum, accent * HAT_SCALE);
        }
        if density > 0.5 {
            let chance = (density - 0.5) * 2.0;
            for eighth in 0..clock.beats_per_bar * 2 {
                if self.rng.chance(chance) {
                    self.add(
                        clock,
                        eighth as f64 * 0.5 + 0.25,
                        Drum::ClosedHat,
                        accent * HAT_SCALE * SIXTEENTH_SCALE,
                    );
                }
            }
        }
    }

    fn add(&mut self, clock: &ClockPosition, beat: f64, drum: Drum, velocity: f64) {
        self.plan
            .insert(clock.beat_to_frame(beat), DrumHit { drum, velocity });
    }

    fn strike(&mut self, hit: DrumHit) {
        match hit.drum {
            Drum::Kick => {
                self.kick.reset();
                self.kick_pitch.trigger(KICK_SWEEP_HZ);
                self.kick_amplitude.trigger(hit.velocity * KICK_LEVEL);
            }
            Drum::Snare => {
                self.snare_tone.reset();
                self.snare_tone_amplitude
                    .trigger(hit.velocity * SNARE_TONE_LEVEL);
                self.snare_noise_amplitude
                    .trigger(hit.velocity * SNARE_NOISE_LEVEL);
            }
            Drum::ClosedHat | Drum::OpenHat => {
                self.hat_amplitude
                    .set_rate(if hit.drum == Drum::OpenHat { 5.0 } else { 30.0 });
                self.hat_amplitude.trigger(hit.velocity * HAT_LEVEL);
            }
        }
    }

    fn next_kick(&mut self) -> f64 {
        let pitch = self.kick_pitch.generate_next();
        let amplitude = self.kick_amplitude.generate_next();
        if amplitude == 0.0 {
            return 0.0;
        }
        self.kick.set_frequency(FrequencyHz(KICK_BASE_HZ + pitch));
        amplitude * self.kick.generate_next().0
    }

    fn next_snare(&mut self) -> f64 {
        let tone_amplitude = self.snare_tone_amplitude.generate_next();
        let noise_amplitude = self.snare_noise_amplitude.generate_next();
        let tone = if tone_amplitude == 0.0 {
            0.0
        } else {
            tone_amplitude * self.snare_tone.generate_next().0
        };
        let noise = if noise_amplitude == 0.0 {
            0.0
        } else {
            noise_amplitude * self.snare_noise.generate_next().0
        };
        tone + self.snare_filter.transform_sample(Sample(noise)).0
    }

    fn next_hat(&mut self) -> f64 {
        let amplitude = self.hat_amplitude.generate_next();
        let noise = if amplitude == 0.0 {
            0.0
        } else {
            self.hat_noise.generate_next().0
        };
        amplitude * self.hat_filter.transform_sample(Sample(noise)).0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        types::Normal,
        voices::tests::{busy_state, energy, position, render_bars, TEST_SAMPLE_RATE},
    };
    use more_asserts::assert_gt;

    fn hits(voice: &PercussionVoice, drum: Drum) -> Vec<usize> {
        voice.plan.events[..voice.plan.len()]
            .iter()
            .filter(|(_, hit)| hit.drum == drum)
            .map(|(start, _)| *start)
            .collect()
    }

    #[test]
    fn breakbeat_skeleton() {
        let mut voice = PercussionVoice::new_with(TEST_SAMPLE_RATE, Rng::new_with_seed(11));
        let state = MusicalState {
            density: Normal::new_const(0.0),
            ..Default::default()
        };
        voice.plan_bar(&state, &position(0, 0));
        assert_eq!(hits(&voice, Drum::Kick), vec![0, 5500, 7000]);
        assert_eq!(hits(&voice, Drum::Snare), vec![2000, 6000]);
    }

    #[test]
    fn density_adds_hats_and_ghosts() {
        let mut sparse = PercussionVoice::new_with(TEST_SAMPLE_RATE, Rng::new_with_seed(11));
        sparse.plan_bar(&MusicalState::default(), &position(0, 0));
        let mut busy = PercussionVoice::new_with(TEST_SAMPLE_RATE, Rng::new_with_seed(11));
        busy.plan_bar(&busy_state(), &position(0, 0));

        assert_eq!(
            hits(&busy, Drum::Snare).len(),
            SNARE_BEATS.len() + GHOST_SNARE_BEATS.len()
        );
        assert_eq!(hits(&busy, Drum::ClosedHat).len() + hits(&busy, Drum::OpenHat).len(), 16);
        assert_gt!(busy.plan.len(), sparse.plan.len());
    }

    #[test]
    fn accent_follows_intensity() {
        let quiet = MusicalState {
            intensity: Normal::new_const(0.2),
            ..busy_state()
        };
        let loud = busy_state();
        let quiet_energy = energy(&render_bars(
            &mut PercussionVoice::new_with(TEST_SAMPLE_RATE, Rng::new_with_seed(3)),
            &quiet,
            1,
        ));
        let loud_energy = energy(&render_bars(
            &mut PercussionVoice::new_with(TEST_SAMPLE_RATE, Rng::new_with_seed(3)),
            &loud,
            1,
        ));
        assert_gt!(loud_energy, quiet_energy * 10.0);
    }
}
