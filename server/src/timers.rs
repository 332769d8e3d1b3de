//! Delayed state changes owned by a room
//!
//! Effects count down in simulated seconds and fire from the room's own
//! tick, so a room that is dropped simply drops whatever it still had queued.

use shared::MatchState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Phantom invisibility wears off.
    EndInvisibility,
    /// Lightning flash fades.
    ClearLightningFlash,
}

impl Effect {
    pub fn apply(self, state: &mut MatchState) {
        match self {
            Effect::EndInvisibility => state.killer.is_invisible = false,
            Effect::ClearLightningFlash => state.lightning_flash = false,
        }
    }
}

#[derive(Debug, Default)]
pub struct DeferredEffects {
    pending: Vec<(f32, Effect)>,
}

impl DeferredEffects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, delay: f32, effect: Effect) {
        self.pending.push((delay.max(0.0), effect));
    }

    /// Counts every effect down by `dt` and returns those now due, in the
    /// order they were scheduled.
    pub fn advance(&mut self, dt: f32) -> Vec<Effect> {
        let mut due = Vec::new();
        self.pending.retain_mut(|(remaining, effect)| {
            *remaining -= dt;
            if *remaining <= 0.0 {
                due.push(*effect);
                false
            } else {
                true
            }
        });
        due
    }

    /// Advances the queue and applies whatever fired.
    pub fn run(&mut self, dt: f32, state: &mut MatchState) -> usize {
        let due = self.advance(dt);
        for effect in &due {
            effect.apply(state);
        }
        due.len()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
