//! Random environmental events
//!
//! A countdown picked uniformly from the configured delay window fires the
//! next disaster, chosen by walking the probability table cumulatively.
//! Earthquakes and floods occupy `activeDisaster` for a while and hold off
//! the next trigger; lightning is a one-tick flash and never blocks.

use log::{debug, info};
use rand::Rng;
use shared::{DisasterKind, MatchState, WATER_BASELINE};

use crate::config::{DisasterConfig, DisasterProbabilities};
use crate::physics::PhysicsWorld;
use crate::timers::{DeferredEffects, Effect};

pub const EARTHQUAKE_DURATION: f32 = 2.0;
pub const FLOOD_DURATION: f32 = 30.0;
pub const DOOR_JAM_DURATION: f32 = 15.0;
pub const LIGHTNING_FLASH_DURATION: f32 = 0.15;
pub const FLOOD_START_LEVEL: f32 = -0.5;
pub const FLOOD_MAX_LEVEL: f32 = 3.0;
/// Metres per second.
pub const FLOOD_RISE_RATE: f32 = 0.1;

/// Picks a disaster for a uniform draw `r` in `[0, 1)`. Kinds are tried in
/// table order and the first whose cumulative probability reaches `r` wins;
/// `None` when the table sums to less than `r`.
pub fn sample(probabilities: &DisasterProbabilities, r: f32) -> Option<DisasterKind> {
    let mut cumulative = 0.0;
    for (kind, probability) in probabilities.table() {
        cumulative += probability;
        if probability > 0.0 && r <= cumulative {
            return Some(kind);
        }
    }
    None
}

#[derive(Debug, Clone)]
pub struct DisasterController {
    config: DisasterConfig,
    timer: f32,
    active: Option<DisasterKind>,
    remaining: f32,
}

impl DisasterController {
    pub fn new<R: Rng>(config: DisasterConfig, rng: &mut R) -> Self {
        let mut controller = Self {
            config,
            timer: 0.0,
            active: None,
            remaining: 0.0,
        };
        controller.timer = controller.next_delay(rng);
        controller
    }

    fn next_delay<R: Rng>(&self, rng: &mut R) -> f32 {
        let min = self.config.min_delay_sec;
        let max = self.config.max_delay_sec;
        if max > min {
            rng.gen_range(min..=max)
        } else {
            min
        }
    }

    /// Seconds until the next trigger attempt.
    pub fn timer(&self) -> f32 {
        self.timer
    }

    pub fn active(&self) -> Option<DisasterKind> {
        self.active
    }

    /// Runs one tick. Returns the disaster triggered this tick, if any.
    pub fn update<R: Rng>(
        &mut self,
        dt: f32,
        state: &mut MatchState,
        physics: &mut PhysicsWorld,
        effects: &mut DeferredEffects,
        rng: &mut R,
    ) -> Option<DisasterKind> {
        self.timer -= dt;

        if let Some(kind) = self.active {
            self.remaining -= dt;
            if self.remaining <= 0.0 {
                self.end(kind, state);
            }
        }

        if self.active == Some(DisasterKind::Flood) && state.water_level < FLOOD_MAX_LEVEL {
            state.water_level = (state.water_level + dt * FLOOD_RISE_RATE).min(FLOOD_MAX_LEVEL);
        }

        if self.timer <= 0.0 && self.active.is_none() {
            let triggered = sample(&self.config.probabilities, rng.gen::<f32>());
            if let Some(kind) = triggered {
                self.trigger(kind, state, physics, effects, rng);
            }
            self.timer = self.next_delay(rng);
            return triggered;
        }
        None
    }

    /// Starts `kind` immediately, regardless of the countdown.
    pub fn trigger<R: Rng>(
        &mut self,
        kind: DisasterKind,
        state: &mut MatchState,
        physics: &mut PhysicsWorld,
        effects: &mut DeferredEffects,
        rng: &mut R,
    ) {
        info!("Triggered {} disaster", kind.as_str());
        match kind {
            DisasterKind::Earthquake => {
                self.start(kind, EARTHQUAKE_DURATION, state);
                let shaken = physics.shake(rng);
                debug!("Earthquake shook {} bodies", shaken);
                jam_random_door(state, rng);
            }
            DisasterKind::Lightning => {
                state.lightning_flash = true;
                effects.schedule(LIGHTNING_FLASH_DURATION, Effect::ClearLightningFlash);
            }
            DisasterKind::Flood => {
                self.start(kind, FLOOD_DURATION, state);
                state.water_level = FLOOD_START_LEVEL;
            }
        }
    }

    fn start(&mut self, kind: DisasterKind, duration: f32, state: &mut MatchState) {
        self.active = Some(kind);
        self.remaining = duration;
        state.active_disaster = Some(kind);
    }

    fn end(&mut self, kind: DisasterKind, state: &mut MatchState) {
        info!("{} disaster ended", kind.as_str());
        self.active = None;
        self.remaining = 0.0;
        state.active_disaster = None;
        state.water_level = WATER_BASELINE;
        for survivor in state.survivors.values_mut() {
            survivor.is_slowed = false;
        }
    }
}

fn jam_random_door<R: Rng>(state: &mut MatchState, rng: &mut R) {
    if state.doors.is_empty() {
        return;
    }
    let index = rng.gen_range(0..state.doors.len());
    if let Some(door) = state.doors.values_mut().nth(index) {
        info!("Earthquake jammed door {}", door.id);
        door.jam(DOOR_JAM_DURATION);
    }
}
