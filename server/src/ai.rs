//! Killer AI
//!
//! A small state machine driven once per tick while the hunt is on. The brain
//! reads the killer's position from the match state, decides where to go and
//! hands back a horizontal velocity for the killer's body; the room feeds
//! that into the physics step, where walls, closed doors and stairs shape
//! the actual motion. Noises from thrown objects and ghost whispers
//! arrive through [`KillerBrain::hear_noise`].

use log::{debug, info};
use rand::Rng;
use shared::{KillerType, MatchState, Vec3};

use crate::config::KillerConfig;
use crate::timers::{DeferredEffects, Effect};

/// Distance at which the killer stops steering toward a point.
pub const STOP_DISTANCE: f32 = 1.0;
/// Distance at which a patrol, bait or investigate point counts as reached.
pub const ARRIVE_DISTANCE: f32 = 2.0;
/// Radius around the search point in which hiding spots get checked.
pub const SEARCH_RADIUS: f32 = 8.0;
pub const SPOT_CHECK_DISTANCE: f32 = 1.5;
/// Pause after checking each hiding spot.
pub const SPOT_CHECK_PAUSE: f32 = 1.5;
pub const BAIT_CHANCE: f64 = 0.25;
pub const BAIT_WAIT: f32 = 8.0;
pub const INVESTIGATE_SPEED_FACTOR: f32 = 1.2;
pub const SEARCH_SPEED_FACTOR: f32 = 0.8;

pub const PHANTOM_INITIAL_COOLDOWN: f32 = 15.0;
pub const PHANTOM_COOLDOWN: f32 = 20.0;
pub const PHANTOM_INVISIBILITY: f32 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiState {
    Patrol,
    Search,
    Chase,
    Investigate,
    Bait,
}

impl AiState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AiState::Patrol => "PATROL",
            AiState::Search => "SEARCH",
            AiState::Chase => "CHASE",
            AiState::Investigate => "INVESTIGATE",
            AiState::Bait => "BAIT",
        }
    }
}

/// Chase alternates a sprint and a recovery walk.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Burst {
    Running(f32),
    Recovering(f32),
}

/// The shared patrol / search / chase / investigate / bait controller.
#[derive(Debug, Clone)]
pub struct BaseBrain {
    config: KillerConfig,
    nav_points: Vec<Vec3>,
    hiding_spots: Vec<Vec3>,
    state: AiState,
    state_timer: f32,
    target_point: Option<Vec3>,
    current_target: Option<u32>,
    last_known_target_position: Option<Vec3>,
    search_arrived: bool,
    spots_to_check: Vec<Vec3>,
    pause: f32,
    burst: Burst,
}

impl BaseBrain {
    pub fn new<R: Rng>(
        config: KillerConfig,
        nav_points: Vec<Vec3>,
        hiding_spots: Vec<Vec3>,
        rng: &mut R,
    ) -> Self {
        let mut brain = Self {
            burst: Burst::Running(config.burst_dur),
            config,
            nav_points,
            hiding_spots,
            state: AiState::Patrol,
            state_timer: 0.0,
            target_point: None,
            current_target: None,
            last_known_target_position: None,
            search_arrived: false,
            spots_to_check: Vec::new(),
            pause: 0.0,
        };
        brain.target_point = brain.random_nav_point(rng);
        brain
    }

    pub fn state(&self) -> AiState {
        self.state
    }

    pub fn target_point(&self) -> Option<Vec3> {
        self.target_point
    }

    pub fn current_target(&self) -> Option<u32> {
        self.current_target
    }

    pub fn last_known_target_position(&self) -> Option<Vec3> {
        self.last_known_target_position
    }

    fn random_nav_point<R: Rng>(&self, rng: &mut R) -> Option<Vec3> {
        if self.nav_points.is_empty() {
            return None;
        }
        Some(self.nav_points[rng.gen_range(0..self.nav_points.len())])
    }

    fn set_state(&mut self, state: AiState) {
        if self.state != state {
            debug!("Killer AI {} -> {}", self.state.as_str(), state.as_str());
        }
        self.state = state;
        self.state_timer = 0.0;
    }

    /// Noises pull the killer away from anything but a chase.
    pub fn hear_noise(&mut self, position: Vec3) {
        if self.state == AiState::Chase {
            return;
        }
        self.set_state(AiState::Investigate);
        self.target_point = Some(position);
    }

    /// Nearest alive, non-hiding survivor strictly inside the sense range.
    fn find_target(&self, state: &MatchState) -> Option<(u32, Vec3)> {
        let killer = state.killer.position;
        let mut best: Option<(u32, Vec3)> = None;
        let mut min_distance = self.config.sense_cone_range;

        for survivor in state.survivors.values().filter(|s| s.is_exposed()) {
            let distance = killer.distance_to(&survivor.position);
            if distance < min_distance {
                min_distance = distance;
                best = Some((survivor.id, survivor.position));
            }
        }
        best
    }

    fn enter_search(&mut self, at: Vec3) {
        self.set_state(AiState::Search);
        self.target_point = Some(at);
        self.search_arrived = false;
        self.spots_to_check.clear();
        self.pause = 0.0;
    }

    /// Runs one tick and returns the velocity for the killer's body.
    pub fn update<R: Rng>(&mut self, dt: f32, state: &mut MatchState, rng: &mut R) -> Vec3 {
        self.state_timer += dt;

        if let Some((id, position)) = self.find_target(state) {
            if self.state != AiState::Chase {
                self.set_state(AiState::Chase);
                self.burst = Burst::Running(self.config.burst_dur);
            }
            self.current_target = Some(id);
            self.last_known_target_position = Some(position);
        } else if self.state == AiState::Chase {
            self.current_target = None;
            match self.last_known_target_position {
                Some(last_known) => self.enter_search(last_known),
                None => self.set_state(AiState::Patrol),
            }
        }

        match self.state {
            AiState::Patrol => self.patrol(state, rng),
            AiState::Search => self.search(dt, state, rng),
            AiState::Chase => self.chase(dt, state),
            AiState::Investigate => self.investigate(state),
            AiState::Bait => self.bait(state),
        }
    }

    /// Steers across the floor plane only; height changes come from stairs.
    fn move_towards(&self, state: &mut MatchState, target: Vec3, speed: f32) -> Vec3 {
        let direction = target.sub(&state.killer.position).horizontal();
        if direction.magnitude() < STOP_DISTANCE {
            return Vec3::ZERO;
        }
        let direction = direction.normalize();
        state.killer.rotation = direction.x.atan2(direction.z);
        direction.scale(speed)
    }

    fn patrol<R: Rng>(&mut self, state: &mut MatchState, rng: &mut R) -> Vec3 {
        let reached = match self.target_point {
            Some(point) => reached(state.killer.position, point, ARRIVE_DISTANCE),
            None => true,
        };
        if reached {
            self.target_point = self.random_nav_point(rng);
        }
        match self.target_point {
            Some(point) => self.move_towards(state, point, self.config.walk),
            None => Vec3::ZERO,
        }
    }

    fn search<R: Rng>(&mut self, dt: f32, state: &mut MatchState, rng: &mut R) -> Vec3 {
        if self.pause > 0.0 {
            self.pause -= dt;
            return Vec3::ZERO;
        }

        let killer = state.killer.position;
        if !self.search_arrived {
            match self.target_point {
                Some(point) if !reached(killer, point, ARRIVE_DISTANCE) => {
                    return self.move_towards(state, point, self.config.walk);
                }
                _ => {
                    self.search_arrived = true;
                    self.spots_to_check = self
                        .hiding_spots
                        .iter()
                        .filter(|spot| spot.distance_to(&killer) < SEARCH_RADIUS)
                        .copied()
                        .collect();
                }
            }
        }

        if let Some(spot) = self.spots_to_check.first().copied() {
            let velocity =
                self.move_towards(state, spot, self.config.walk * SEARCH_SPEED_FACTOR);
            if reached(killer, spot, SPOT_CHECK_DISTANCE) {
                self.spots_to_check.remove(0);
                self.pause = SPOT_CHECK_PAUSE;
                return Vec3::ZERO;
            }
            return velocity;
        }

        if rng.gen_bool(BAIT_CHANCE) {
            self.set_state(AiState::Bait);
            self.target_point = self.random_nav_point(rng);
        } else {
            self.set_state(AiState::Patrol);
        }
        Vec3::ZERO
    }

    fn chase(&mut self, dt: f32, state: &mut MatchState) -> Vec3 {
        let Some(target) = self.last_known_target_position else {
            return Vec3::ZERO;
        };

        let speed = match self.burst {
            Burst::Running(left) => {
                let left = left - dt;
                self.burst = if left <= 0.0 {
                    Burst::Recovering(self.config.burst_cd)
                } else {
                    Burst::Running(left)
                };
                self.config.run_burst
            }
            Burst::Recovering(left) => {
                let left = left - dt;
                self.burst = if left <= 0.0 {
                    Burst::Running(self.config.burst_dur)
                } else {
                    Burst::Recovering(left)
                };
                self.config.walk
            }
        };
        self.move_towards(state, target, speed)
    }

    fn investigate(&mut self, state: &mut MatchState) -> Vec3 {
        let Some(point) = self.target_point else {
            self.set_state(AiState::Patrol);
            return Vec3::ZERO;
        };
        if reached(state.killer.position, point, ARRIVE_DISTANCE) {
            self.enter_search(point);
            return Vec3::ZERO;
        }
        self.move_towards(state, point, self.config.walk * INVESTIGATE_SPEED_FACTOR)
    }

    fn bait(&mut self, state: &mut MatchState) -> Vec3 {
        let arrived = match self.target_point {
            Some(point) => reached(state.killer.position, point, ARRIVE_DISTANCE),
            None => true,
        };

        let velocity = match self.target_point {
            Some(point) if !arrived => self.move_towards(state, point, self.config.walk),
            _ => Vec3::ZERO,
        };

        if arrived && self.state_timer > BAIT_WAIT {
            self.set_state(AiState::Patrol);
        }
        velocity
    }
}

/// Within `distance`, or standing right above or below a point the killer
/// cannot steer any closer to.
fn reached(killer: Vec3, point: Vec3, distance: f32) -> bool {
    killer.distance_to(&point) < distance
        || point.sub(&killer).horizontal().magnitude() < STOP_DISTANCE
}

/// Base controller plus a periodic invisibility ability.
#[derive(Debug, Clone)]
pub struct PhantomBrain {
    base: BaseBrain,
    ability_cooldown: f32,
}

impl PhantomBrain {
    pub fn new(base: BaseBrain) -> Self {
        Self {
            base,
            ability_cooldown: PHANTOM_INITIAL_COOLDOWN,
        }
    }

    pub fn ability_cooldown(&self) -> f32 {
        self.ability_cooldown
    }

    pub fn update<R: Rng>(
        &mut self,
        dt: f32,
        state: &mut MatchState,
        effects: &mut DeferredEffects,
        rng: &mut R,
    ) -> Vec3 {
        let velocity = self.base.update(dt, state, rng);
        self.ability_cooldown -= dt;

        let roaming = matches!(self.base.state(), AiState::Patrol | AiState::Search);
        if self.ability_cooldown <= 0.0 && roaming {
            info!("Phantom turns invisible");
            state.killer.is_invisible = true;
            effects.schedule(PHANTOM_INVISIBILITY, Effect::EndInvisibility);
            self.ability_cooldown = PHANTOM_COOLDOWN;
        }
        velocity
    }
}

#[derive(Debug, Clone)]
pub enum KillerBrain {
    Base(BaseBrain),
    Phantom(PhantomBrain),
}

impl KillerBrain {
    pub fn new<R: Rng>(
        killer_type: KillerType,
        config: KillerConfig,
        nav_points: Vec<Vec3>,
        hiding_spots: Vec<Vec3>,
        rng: &mut R,
    ) -> Self {
        let base = BaseBrain::new(config, nav_points, hiding_spots, rng);
        match killer_type {
            KillerType::Phantom => KillerBrain::Phantom(PhantomBrain::new(base)),
            KillerType::Stalker | KillerType::Brute => KillerBrain::Base(base),
        }
    }

    pub fn base(&self) -> &BaseBrain {
        match self {
            KillerBrain::Base(base) => base,
            KillerBrain::Phantom(phantom) => &phantom.base,
        }
    }

    fn base_mut(&mut self) -> &mut BaseBrain {
        match self {
            KillerBrain::Base(base) => base,
            KillerBrain::Phantom(phantom) => &mut phantom.base,
        }
    }

    pub fn state(&self) -> AiState {
        self.base().state()
    }

    pub fn hear_noise(&mut self, position: Vec3) {
        self.base_mut().hear_noise(position);
    }

    pub fn update<R: Rng>(
        &mut self,
        dt: f32,
        state: &mut MatchState,
        effects: &mut DeferredEffects,
        rng: &mut R,
    ) -> Vec3 {
        match self {
            KillerBrain::Base(base) => base.update(dt, state, rng),
            KillerBrain::Phantom(phantom) => phantom.update(dt, state, effects, rng),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use shared::{CharType, Survivor};

    const DT: f32 = 0.05;

    fn setup(killer_type: KillerType) -> (KillerBrain, MatchState, DeferredEffects, StdRng) {
        let mut rng = StdRng::seed_from_u64(42);
        let nav = vec![Vec3::new(5.0, 1.0, 5.0), Vec3::new(17.0, 1.0, 5.0)];
        let spots = vec![Vec3::new(1.0, 0.0, 1.0), Vec3::new(13.0, 0.0, 1.0)];
        let brain = KillerBrain::new(killer_type, KillerConfig::default(), nav, spots, &mut rng);
        let mut state = MatchState::new(killer_type);
        state.killer.position = Vec3::new(5.0, 1.0, 5.0);
        (brain, state, DeferredEffects::new(), rng)
    }

    fn add_survivor(state: &mut MatchState, id: u32, position: Vec3) {
        state.add_survivor(Survivor::new(id, CharType::Survivor, position, 100.0, 100.0));
    }

    #[test]
    fn test_chase_within_one_tick() {
        let (mut brain, mut state, mut effects, mut rng) = setup(KillerType::Stalker);
        add_survivor(&mut state, 1, Vec3::new(10.0, 1.0, 5.0));

        let velocity = brain.update(DT, &mut state, &mut effects, &mut rng);

        assert_eq!(brain.state(), AiState::Chase);
        assert_eq!(brain.base().current_target(), Some(1));
        // First chase tick is a burst straight at the survivor
        assert_approx_eq!(velocity.x, KillerConfig::default().run_burst, 1e-4);
        assert_approx_eq!(state.killer.rotation, std::f32::consts::FRAC_PI_2, 1e-4);
    }

    #[test]
    fn test_hiding_and_distant_survivors_ignored() {
        let (mut brain, mut state, mut effects, mut rng) = setup(KillerType::Stalker);
        add_survivor(&mut state, 1, Vec3::new(6.0, 1.0, 5.0));
        add_survivor(&mut state, 2, Vec3::new(40.0, 1.0, 5.0));
        state.survivors.get_mut(&1).unwrap().is_hiding = true;

        brain.update(DT, &mut state, &mut effects, &mut rng);
        assert_eq!(brain.state(), AiState::Patrol);
    }

    #[test]
    fn test_search_at_last_known_position() {
        let (mut brain, mut state, mut effects, mut rng) = setup(KillerType::Stalker);
        let seen_at = Vec3::new(12.0, 1.0, 5.0);
        add_survivor(&mut state, 1, seen_at);

        brain.update(DT, &mut state, &mut effects, &mut rng);
        assert_eq!(brain.state(), AiState::Chase);

        state.survivors.get_mut(&1).unwrap().is_hiding = true;
        brain.update(DT, &mut state, &mut effects, &mut rng);

        assert_eq!(brain.state(), AiState::Search);
        assert_eq!(brain.base().target_point(), Some(seen_at));
        assert_eq!(brain.base().current_target(), None);
    }

    #[test]
    fn test_search_walks_to_point_before_checking_spots() {
        let (mut brain, mut state, mut effects, mut rng) = setup(KillerType::Stalker);
        add_survivor(&mut state, 1, Vec3::new(12.0, 1.0, 5.0));
        brain.update(DT, &mut state, &mut effects, &mut rng);
        state.survivors.get_mut(&1).unwrap().is_hiding = true;

        let velocity = brain.update(DT, &mut state, &mut effects, &mut rng);
        assert_eq!(brain.state(), AiState::Search);
        // Heading for the last known position, not standing still
        assert!(velocity.x > 0.0);
    }

    #[test]
    fn test_noise_triggers_investigate_unless_chasing() {
        let (mut brain, mut state, mut effects, mut rng) = setup(KillerType::Brute);
        let noise = Vec3::new(17.0, 1.0, 5.0);
        brain.hear_noise(noise);
        assert_eq!(brain.state(), AiState::Investigate);

        let velocity = brain.update(DT, &mut state, &mut effects, &mut rng);
        assert_approx_eq!(
            velocity.x,
            KillerConfig::default().walk * INVESTIGATE_SPEED_FACTOR,
            1e-4
        );

        add_survivor(&mut state, 1, Vec3::new(8.0, 1.0, 5.0));
        brain.update(DT, &mut state, &mut effects, &mut rng);
        assert_eq!(brain.state(), AiState::Chase);
        brain.hear_noise(Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(brain.state(), AiState::Chase);
    }

    #[test]
    fn test_investigate_arrival_starts_search() {
        let (mut brain, mut state, mut effects, mut rng) = setup(KillerType::Stalker);
        brain.hear_noise(Vec3::new(5.5, 1.0, 5.0));
        brain.update(DT, &mut state, &mut effects, &mut rng);
        assert_eq!(brain.state(), AiState::Search);
    }

    #[test]
    fn test_chase_stays_on_the_floor_plane() {
        let (mut brain, mut state, mut effects, mut rng) = setup(KillerType::Stalker);
        // One storey up and three metres across
        add_survivor(&mut state, 1, Vec3::new(8.0, 6.0, 5.0));

        let velocity = brain.update(DT, &mut state, &mut effects, &mut rng);

        assert_eq!(brain.state(), AiState::Chase);
        assert_eq!(velocity.y, 0.0);
        assert_approx_eq!(velocity.x, KillerConfig::default().run_burst, 1e-4);
    }

    #[test]
    fn test_point_on_another_floor_is_reached_from_below() {
        let (mut brain, mut state, mut effects, mut rng) = setup(KillerType::Stalker);
        brain.hear_noise(Vec3::new(5.3, 6.0, 5.0));

        let velocity = brain.update(DT, &mut state, &mut effects, &mut rng);

        assert_eq!(velocity, Vec3::ZERO);
        assert_eq!(brain.state(), AiState::Search);
    }

    #[test]
    fn test_chase_burst_then_recover() {
        let (mut brain, mut state, mut effects, mut rng) = setup(KillerType::Stalker);
        let config = KillerConfig::default();
        add_survivor(&mut state, 1, Vec3::new(15.0, 1.0, 5.0));

        let ticks = (config.burst_dur / DT).round() as usize;
        for _ in 0..ticks - 1 {
            let v = brain.update(DT, &mut state, &mut effects, &mut rng);
            assert_approx_eq!(v.magnitude(), config.run_burst, 1e-3);
        }
        for _ in 0..2 {
            brain.update(DT, &mut state, &mut effects, &mut rng);
        }
        let v = brain.update(DT, &mut state, &mut effects, &mut rng);
        assert_approx_eq!(v.magnitude(), config.walk, 1e-3);
    }

    #[test]
    fn test_empty_nav_points_do_not_fault() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut brain = KillerBrain::new(
            KillerType::Stalker,
            KillerConfig::default(),
            Vec::new(),
            Vec::new(),
            &mut rng,
        );
        let mut state = MatchState::new(KillerType::Stalker);
        let mut effects = DeferredEffects::new();
        for _ in 0..400 {
            let v = brain.update(DT, &mut state, &mut effects, &mut rng);
            assert_eq!(v, Vec3::ZERO);
        }

        brain.hear_noise(Vec3::new(1.0, 0.0, 1.0));
        for _ in 0..400 {
            brain.update(DT, &mut state, &mut effects, &mut rng);
        }
    }

    #[test]
    fn test_phantom_invisibility_cycle() {
        let (mut brain, mut state, mut effects, mut rng) = setup(KillerType::Phantom);

        let ticks_to_ability = (PHANTOM_INITIAL_COOLDOWN / DT).ceil() as usize + 1;
        for _ in 0..ticks_to_ability {
            brain.update(DT, &mut state, &mut effects, &mut rng);
        }
        assert!(state.killer.is_invisible);
        assert_eq!(effects.len(), 1);

        let KillerBrain::Phantom(phantom) = &brain else {
            panic!("expected phantom brain");
        };
        assert!(phantom.ability_cooldown() > PHANTOM_COOLDOWN - 1.0);

        for _ in 0..((PHANTOM_INVISIBILITY / DT).ceil() as usize + 1) {
            effects.run(DT, &mut state);
        }
        assert!(!state.killer.is_invisible);
    }

    #[test]
    fn test_stalker_never_turns_invisible() {
        let (mut brain, mut state, mut effects, mut rng) = setup(KillerType::Stalker);
        for _ in 0..1000 {
            brain.update(DT, &mut state, &mut effects, &mut rng);
        }
        assert!(!state.killer.is_invisible);
        assert!(effects.is_empty());
    }
}
