use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::protocol::{JoinRoomAck, ScoutPing};
use shared::{
    CharType, ClientMessage, DisasterKind, KillerType, MatchPhase, MatchState, ServerMessage,
    Survivor, Vec3, Winner, FUSE_BOXES_TO_WIN, KILLER_PLACEHOLDER,
};
use std::collections::BTreeMap;

use crate::ai::KillerBrain;
use crate::config::GameConfig;
use crate::disasters::DisasterController;
use crate::physics::{Body, BodyHandle, PhysicsWorld};
use crate::timers::DeferredEffects;
use crate::world::{HouseGen, HouseLayout, HouseOptions};

/// Killer-to-survivor distance that counts as a catch.
pub const CATCH_DISTANCE: f32 = 1.5;
pub const FINISHER_RANGE: f32 = 10.0;
/// Minimum cosine between the aim and the direction to the killer.
pub const FINISHER_AIM: f32 = 0.8;
/// Repair progress per second, in percent.
pub const REPAIR_RATE: f32 = 5.0;
pub const MECHANIC_REPAIR_MULTIPLIER: f32 = 2.0;
pub const SPRINT_STAMINA_DRAIN: f32 = 20.0;
/// Multiplier on the configured stamina regen while not sprinting.
pub const SPRINT_STAMINA_REGEN: f32 = 10.0;
pub const HIDING_SANITY_FACTOR: f32 = 1.5;
pub const DREAD_RANGE: f32 = 10.0;
pub const DREAD_RATE: f32 = 0.2;
/// Survivors whose feet are less than this above the water are slowed.
pub const FLOOD_SLOW_MARGIN: f32 = 0.5;
/// Headroom over a survivor's top speed before a reported move is clamped.
pub const MOVE_TOLERANCE: f32 = 1.5;
/// Distance any single update may cover regardless of elapsed time.
pub const MOVE_SLACK: f32 = 1.0;

/// Anything a survivor can use by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interactable {
    Door(u32),
    FuseBox(u32),
    HidingSpot(u32),
}

/// What happened during one [`Room::tick`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub tick: u32,
    pub phase_changes: Vec<MatchPhase>,
    pub noises: Vec<Vec3>,
    pub deaths: Vec<u32>,
    pub repaired: Vec<u32>,
    pub disaster: Option<DisasterKind>,
}

/// One match: the replicated state plus everything that drives it.
pub struct Room {
    id: String,
    seed: u64,
    config: GameConfig,
    layout: HouseLayout,
    state: MatchState,
    physics: PhysicsWorld,
    ai: KillerBrain,
    disasters: DisasterController,
    effects: DeferredEffects,
    rng: StdRng,
    /// Simulated seconds since the room was created.
    clock: f32,
    /// When each survivor's position was last accepted, on [`Room::clock`].
    last_moves: BTreeMap<u32, f32>,
}

impl Room {
    /// Builds the house for `seed` and starts the setup countdown.
    pub fn new(id: impl Into<String>, seed: u64, killer_type: KillerType, config: GameConfig) -> Self {
        let id = id.into();
        let layout = HouseGen::new(seed, HouseOptions::default()).generate();
        let mut rng = StdRng::seed_from_u64(seed.wrapping_add(1));

        let mut state = MatchState::new(killer_type);
        let mut physics = PhysicsWorld::from_world(&layout.world);
        for door in &layout.doors {
            state.doors.insert(door.id, door.clone());
        }
        for (door_id, leaf) in &layout.door_leaves {
            physics.add_door(*door_id, *leaf);
        }
        for fuse_box in &layout.fuse_boxes {
            state.fuse_boxes.insert(fuse_box.id, fuse_box.clone());
        }
        for throwable in &layout.throwables {
            state.throwables.insert(throwable.id, throwable.clone());
            physics.add_body(
                BodyHandle::Throwable(throwable.id),
                Body::throwable(throwable.position),
            );
        }
        let ai = KillerBrain::new(
            killer_type,
            config.killer.clone(),
            layout.nav_points.clone(),
            layout.hiding_spot_positions(),
            &mut rng,
        );
        let disasters = DisasterController::new(config.disasters.clone(), &mut rng);

        state.set_phase(MatchPhase::Setup, config.match_timing.setup_sec);
        info!(
            "Room '{}' created: seed {}, {} killer, {} floors",
            id, seed, killer_type, layout.floors
        );

        Self {
            id,
            seed,
            config,
            layout,
            state,
            physics,
            ai,
            disasters,
            effects: DeferredEffects::new(),
            rng,
            clock: 0.0,
            last_moves: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn state(&self) -> &MatchState {
        &self.state
    }

    pub fn layout(&self) -> &HouseLayout {
        &self.layout
    }

    pub fn ai(&self) -> &KillerBrain {
        &self.ai
    }

    pub fn is_empty(&self) -> bool {
        self.state.survivors.is_empty()
    }

    pub fn members(&self) -> impl Iterator<Item = u32> + '_ {
        self.state.survivors.keys().copied()
    }

    pub fn snapshot(&self) -> ServerMessage {
        ServerMessage::GameState(Box::new(self.state.clone()))
    }

    /// Adds a survivor and returns the ack payload. Joining twice keeps the
    /// existing survivor.
    pub fn join(&mut self, survivor_id: u32, char_type: CharType) -> JoinRoomAck {
        if !self.state.survivors.contains_key(&survivor_id) {
            let spawn = self.layout.spawn_point(&mut self.rng);
            let survivor = Survivor::new(
                survivor_id,
                char_type,
                spawn,
                self.config.survivor.sanity_max,
                self.config.survivor.stamina_max,
            );
            self.state.add_survivor(survivor);
            info!(
                "Survivor {} ({:?}) joined room '{}'",
                survivor_id, char_type, self.id
            );
        }

        JoinRoomAck {
            room_id: self.id.clone(),
            survivor_id,
            world_seed: self.seed,
            killer_type: self.state.killer.killer_type,
            world_data: self.layout.world.clone(),
        }
    }

    /// Removes a survivor, dropping anything they held where they stood.
    pub fn leave(&mut self, survivor_id: u32) -> bool {
        let Some(survivor) = self.state.remove_survivor(survivor_id) else {
            return false;
        };
        self.release_held(survivor_id, survivor.position);
        self.last_moves.remove(&survivor_id);
        info!("Survivor {} left room '{}'", survivor_id, self.id);

        let mut report = TickReport::default();
        self.check_survivor_count(&mut report);
        true
    }

    /// Applies one client command. Returns a message for the sender only,
    /// if the command produces one.
    pub fn apply_command(&mut self, survivor_id: u32, message: &ClientMessage) -> Option<ServerMessage> {
        let applied = match message {
            ClientMessage::PlayerUpdate(update) => self.player_update(
                survivor_id,
                update.position,
                update.is_hiding,
                update.rotation,
                update.is_sprinting,
            ),
            ClientMessage::StartRepairing(start) => {
                self.start_repairing(survivor_id, start.fuse_box_id)
            }
            ClientMessage::StopRepairing {} => self.stop_repairing(survivor_id),
            ClientMessage::PickupObject(pickup) => self.pickup_object(survivor_id, pickup.object_id),
            ClientMessage::ThrowObject(throw) => self.throw_object(
                survivor_id,
                throw.object_id,
                Vec3::from_array(throw.direction),
            ),
            ClientMessage::ToggleDoor(toggle) => self.toggle_door(survivor_id, toggle.door_id),
            ClientMessage::GhostWhisper(whisper) => {
                self.ghost_whisper(survivor_id, whisper.position)
            }
            ClientMessage::UseScoutAbility {} => {
                return self
                    .use_scout_ability(survivor_id)
                    .map(|position| ServerMessage::ScoutPing(ScoutPing { position }));
            }
            ClientMessage::UseFinisherTool(finisher) => {
                self.use_finisher_tool(survivor_id, Vec3::from_array(finisher.direction))
                    .is_some()
            }
            // Session-level messages are handled by the server loop
            ClientMessage::JoinRoom(_) | ClientMessage::Ping {} | ClientMessage::Disconnect {} => {
                true
            }
        };

        if !applied {
            debug!(
                "Ignored {:?} from survivor {} in room '{}'",
                message, survivor_id, self.id
            );
        }
        None
    }

    /// Takes a survivor's reported position and flags. The position is
    /// trusted up to what the survivor could have covered since the last
    /// accepted update; anything further is clamped onto that reach. The
    /// first update after joining is taken as is.
    pub fn player_update(
        &mut self,
        survivor_id: u32,
        position: Vec3,
        is_hiding: Option<bool>,
        rotation: Option<f32>,
        is_sprinting: Option<bool>,
    ) -> bool {
        if !position.is_finite() {
            return false;
        }
        let Some(survivor) = self.state.survivors.get_mut(&survivor_id) else {
            return false;
        };
        if !survivor.is_alive() {
            return false;
        }

        if let Some(hiding) = is_hiding {
            survivor.is_hiding = hiding;
        }
        if let Some(rotation) = rotation.filter(|r| r.is_finite()) {
            survivor.rotation = rotation;
        }
        if let Some(sprinting) = is_sprinting {
            survivor.is_sprinting = sprinting && survivor.stamina > 0.0;
        }

        let position = match self.last_moves.get(&survivor_id) {
            Some(since) => {
                let speeds = &self.config.survivor;
                let mut speed = if survivor.is_sprinting {
                    speeds.run
                } else if survivor.is_hiding {
                    speeds.crouch
                } else {
                    speeds.walk
                };
                if survivor.is_slowed {
                    speed *= 0.5;
                }
                let reach = speed * (self.clock - since) * MOVE_TOLERANCE + MOVE_SLACK;
                clamp_move(survivor.position, position, reach)
            }
            None => position,
        };
        survivor.position = position;
        self.last_moves.insert(survivor_id, self.clock);
        true
    }

    pub fn interactable(&self, id: u32) -> Option<Interactable> {
        if self.state.doors.contains_key(&id) {
            Some(Interactable::Door(id))
        } else if self.state.fuse_boxes.contains_key(&id) {
            Some(Interactable::FuseBox(id))
        } else if self.layout.world.hiding_spots.iter().any(|s| s.id == id) {
            Some(Interactable::HidingSpot(id))
        } else {
            None
        }
    }

    pub fn prompt(&self, target: Interactable) -> Option<&'static str> {
        match target {
            Interactable::Door(id) => self.state.doors.get(&id).map(|d| d.prompt()),
            Interactable::FuseBox(id) => self.state.fuse_boxes.get(&id).map(|f| {
                if f.is_repaired {
                    "Fuse Box Repaired"
                } else {
                    "Repair Fuse Box"
                }
            }),
            Interactable::HidingSpot(id) => self
                .layout
                .world
                .hiding_spots
                .iter()
                .find(|s| s.id == id)
                .map(|s| s.prompt()),
        }
    }

    /// Uses `target` on behalf of a living survivor.
    pub fn interact(&mut self, survivor_id: u32, target: Interactable) -> bool {
        let alive = self
            .state
            .survivors
            .get(&survivor_id)
            .map_or(false, |s| s.is_alive());
        if !alive || self.state.phase == MatchPhase::Ended {
            return false;
        }

        match target {
            Interactable::Door(id) => {
                let Some(door) = self.state.doors.get_mut(&id) else {
                    return false;
                };
                let toggled = door.toggle();
                if toggled {
                    debug!("Door {} is now {}", id, if door.is_open { "open" } else { "closed" });
                }
                toggled
            }
            Interactable::FuseBox(id) => {
                let repairable = self
                    .state
                    .fuse_boxes
                    .get(&id)
                    .map_or(false, |f| !f.is_repaired);
                if !repairable {
                    return false;
                }
                if let Some(survivor) = self.state.survivors.get_mut(&survivor_id) {
                    survivor.is_repairing = Some(id);
                }
                true
            }
            Interactable::HidingSpot(id) => {
                let Some(position) = self
                    .layout
                    .world
                    .hiding_spots
                    .iter()
                    .find(|s| s.id == id)
                    .map(|s| s.position)
                else {
                    return false;
                };
                if let Some(survivor) = self.state.survivors.get_mut(&survivor_id) {
                    survivor.is_hiding = true;
                    survivor.is_repairing = None;
                    survivor.position = position;
                }
                true
            }
        }
    }

    pub fn toggle_door(&mut self, survivor_id: u32, door_id: u32) -> bool {
        match self.interactable(door_id) {
            Some(target @ Interactable::Door(_)) => self.interact(survivor_id, target),
            _ => false,
        }
    }

    pub fn start_repairing(&mut self, survivor_id: u32, fuse_box_id: u32) -> bool {
        match self.interactable(fuse_box_id) {
            Some(target @ Interactable::FuseBox(_)) => self.interact(survivor_id, target),
            _ => false,
        }
    }

    pub fn stop_repairing(&mut self, survivor_id: u32) -> bool {
        match self.state.survivors.get_mut(&survivor_id) {
            Some(survivor) => survivor.is_repairing.take().is_some(),
            None => false,
        }
    }

    /// Takes a throwable out of the simulation and into a survivor's hands.
    pub fn pickup_object(&mut self, survivor_id: u32, object_id: u32) -> bool {
        let Some(survivor) = self.state.survivors.get(&survivor_id) else {
            return false;
        };
        if !survivor.is_alive() {
            return false;
        }
        let at = survivor.position;

        let Some(throwable) = self.state.throwables.get_mut(&object_id) else {
            return false;
        };
        if !throwable.pick_up(survivor_id, at) {
            return false;
        }
        self.physics.remove_body(BodyHandle::Throwable(object_id));
        debug!("Survivor {} picked up object {}", survivor_id, object_id);
        true
    }

    /// Launches a held object from the holder's position. The first thing it
    /// hits makes a noise.
    pub fn throw_object(&mut self, survivor_id: u32, object_id: u32, direction: Vec3) -> bool {
        if !direction.is_finite() {
            return false;
        }
        let Some(survivor) = self.state.survivors.get(&survivor_id) else {
            return false;
        };
        if !survivor.is_alive() {
            return false;
        }
        let from = survivor.position;

        let Some(throwable) = self.state.throwables.get_mut(&object_id) else {
            return false;
        };
        if throwable.holder != Some(survivor_id) {
            return false;
        }
        throwable.release();
        throwable.position = from;
        self.physics.throw(object_id, from, direction);
        debug!("Survivor {} threw object {}", survivor_id, object_id);
        true
    }

    /// Dead survivors can lure the killer with a whisper.
    pub fn ghost_whisper(&mut self, survivor_id: u32, position: Vec3) -> bool {
        let is_dead = self
            .state
            .survivors
            .get(&survivor_id)
            .map_or(false, |s| !s.is_alive());
        if !is_dead || !position.is_finite() || self.state.phase == MatchPhase::Ended {
            return false;
        }
        self.ai.hear_noise(position);
        true
    }

    /// Reveals the killer's position to a scout, once per match.
    pub fn use_scout_ability(&mut self, survivor_id: u32) -> Option<Vec3> {
        let survivor = self.state.survivors.get_mut(&survivor_id)?;
        if survivor.char_type != CharType::Scout || survivor.ability_used || !survivor.is_alive() {
            return None;
        }
        survivor.ability_used = true;
        info!("Scout {} revealed the killer", survivor_id);
        Some(self.state.killer.position)
    }

    /// Consumes the finisher tool. Returns whether the blow landed, or
    /// `None` if the survivor could not use it at all.
    pub fn use_finisher_tool(&mut self, survivor_id: u32, direction: Vec3) -> Option<bool> {
        if self.state.phase == MatchPhase::Ended || !direction.is_finite() {
            return None;
        }
        let killer = self.state.killer.position;
        let survivor = self.state.survivors.get_mut(&survivor_id)?;
        if !survivor.is_alive() || !survivor.has_finisher_tool {
            return None;
        }
        survivor.has_finisher_tool = false;

        let to_killer = killer.sub(&survivor.position);
        let aim = direction.normalize().dot(&to_killer.normalize());
        let hit = to_killer.magnitude() < FINISHER_RANGE && aim >= FINISHER_AIM;

        if hit {
            info!("Survivor {} finished the killer", survivor_id);
            self.state.finish(Winner::Survivors);
        } else {
            info!(
                "Survivor {} missed with the finisher tool (distance {:.1}, aim {:.2})",
                survivor_id,
                to_killer.magnitude(),
                aim
            );
        }
        Some(hit)
    }

    /// Teleports the killer, e.g. onto its spawn point when the hunt starts.
    pub fn place_killer(&mut self, position: Vec3) {
        self.state.killer.position = position;
        self.physics.add_body(BodyHandle::Killer, Body::killer(position));
    }

    /// Takes the killer out of the house until the hunt.
    fn park_killer(&mut self) {
        self.physics.remove_body(BodyHandle::Killer);
        self.state.killer.position = KILLER_PLACEHOLDER;
    }

    fn release_held(&mut self, holder: u32, at: Vec3) {
        for object_id in self.state.held_by(holder) {
            if let Some(throwable) = self.state.throwables.get_mut(&object_id) {
                throwable.release();
                throwable.position = at;
                self.physics.drop_at(object_id, at);
            }
        }
    }

    fn change_phase(&mut self, phase: MatchPhase, duration: f32, report: &mut TickReport) -> bool {
        let from = self.state.phase;
        if !self.state.set_phase(phase, duration) {
            return false;
        }
        info!(
            "Room '{}': {} -> {}",
            self.id,
            from.as_str(),
            phase.as_str()
        );
        report.phase_changes.push(phase);
        true
    }

    fn finish(&mut self, winner: Winner, report: &mut TickReport) {
        if self.state.finish(winner) {
            info!("Room '{}': match over, {:?} win", self.id, winner);
            report.phase_changes.push(MatchPhase::Ended);
        }
    }

    fn start_hunt(&mut self, report: &mut TickReport) {
        let duration = self.config.match_timing.hunt_sec;
        if self.change_phase(MatchPhase::Hunt, duration, report) {
            let spawn = self.layout.spawn_point(&mut self.rng);
            self.place_killer(spawn);
        }
    }

    /// Hunt -> showdown. Only the last survivor standing gets the tool.
    pub fn enter_showdown(&mut self) -> bool {
        let mut report = TickReport::default();
        self.enter_showdown_with(&mut report)
    }

    fn enter_showdown_with(&mut self, report: &mut TickReport) -> bool {
        if self.state.phase != MatchPhase::Hunt {
            return false;
        }
        let duration = self.config.match_timing.showdown_sec;
        if !self.change_phase(MatchPhase::Showdown, duration, report) {
            return false;
        }

        if self.state.living_survivor_count == 1 {
            if let Some(last) = self.state.survivors.values_mut().find(|s| s.is_alive()) {
                last.has_finisher_tool = true;
                info!("Survivor {} gets the finisher tool", last.id);
            }
        }
        true
    }

    /// Killer wins once nobody is left; one survivor left means showdown.
    fn check_survivor_count(&mut self, report: &mut TickReport) {
        if !self.state.phase.is_hunting() {
            return;
        }
        match self.state.alive_survivors().count() {
            0 => self.finish(Winner::Killer, report),
            1 => {
                self.enter_showdown_with(report);
            }
            _ => {}
        }
    }

    fn advance_timer(&mut self, dt: f32, report: &mut TickReport) {
        self.state.match_timer -= dt;
        if self.state.match_timer > 0.0 {
            return;
        }
        match self.state.phase {
            MatchPhase::Waiting => {
                let duration = self.config.match_timing.setup_sec;
                self.change_phase(MatchPhase::Setup, duration, report);
            }
            MatchPhase::Setup => self.start_hunt(report),
            MatchPhase::Hunt => {
                self.enter_showdown_with(report);
            }
            MatchPhase::Showdown => self.finish(Winner::Survivors, report),
            MatchPhase::Ended => {}
        }
    }

    fn step_physics(&mut self, dt: f32, report: &mut TickReport) {
        if !self.state.phase.is_hunting() {
            self.park_killer();
        }
        for door in self.state.doors.values() {
            self.physics.set_door_closed(door.id, !door.is_open);
        }

        let contacts = self.physics.step(dt);

        for (handle, body) in self.physics.bodies() {
            match handle {
                BodyHandle::Throwable(id) => {
                    if let Some(throwable) = self.state.throwables.get_mut(id) {
                        throwable.position = body.position;
                    }
                }
                BodyHandle::Killer => self.state.killer.position = body.position,
            }
        }

        for contact in contacts {
            debug!("Noise at {:?} from {:?}", contact.point, contact.body);
            self.ai.hear_noise(contact.point);
            report.noises.push(contact.point);
        }
    }

    fn update_survivors(&mut self, dt: f32, report: &mut TickReport) {
        let killer = self.state.killer.position;
        let hunting = self.state.phase.is_hunting();
        let survivor_config = &self.config.survivor;

        for survivor in self.state.survivors.values_mut().filter(|s| s.is_alive()) {
            let mut drain = 0.0;
            if survivor.is_hiding {
                drain += survivor_config.sanity_drain * HIDING_SANITY_FACTOR;
            }
            let distance = survivor.position.distance_to(&killer);
            if distance < DREAD_RANGE {
                drain += (DREAD_RANGE - distance) * DREAD_RATE;
            }
            survivor.drain_sanity(drain * dt);

            if survivor.is_sprinting {
                survivor.stamina = (survivor.stamina - SPRINT_STAMINA_DRAIN * dt).max(0.0);
                if survivor.stamina == 0.0 {
                    survivor.is_sprinting = false;
                }
            } else {
                let regen = survivor_config.stamina_regen * SPRINT_STAMINA_REGEN * dt;
                survivor.stamina = (survivor.stamina + regen).min(survivor_config.stamina_max);
            }

            if !hunting {
                continue;
            }
            let Some(fuse_box_id) = survivor.is_repairing else {
                continue;
            };
            let Some(fuse_box) = self.state.fuse_boxes.get_mut(&fuse_box_id) else {
                survivor.is_repairing = None;
                continue;
            };
            let multiplier = match survivor.char_type {
                CharType::Mechanic => MECHANIC_REPAIR_MULTIPLIER,
                _ => 1.0,
            };
            if fuse_box.add_progress(REPAIR_RATE * multiplier * dt) {
                info!("Fuse box {} repaired by survivor {}", fuse_box_id, survivor.id);
                report.repaired.push(fuse_box_id);
            }
            if fuse_box.is_repaired {
                survivor.is_repairing = None;
            }
        }

        // Others working on a box that just finished stop too
        for survivor in self.state.survivors.values_mut() {
            if let Some(id) = survivor.is_repairing {
                if report.repaired.contains(&id) {
                    survivor.is_repairing = None;
                }
            }
        }

        if self.state.repaired_count() >= FUSE_BOXES_TO_WIN {
            self.finish(Winner::Survivors, report);
        }
    }

    fn update_flood_slow(&mut self) {
        if self.state.active_disaster != Some(DisasterKind::Flood) {
            return;
        }
        let threshold = self.state.water_level + FLOOD_SLOW_MARGIN;
        for survivor in self.state.survivors.values_mut().filter(|s| s.is_alive()) {
            survivor.is_slowed = survivor.position.y < threshold;
        }
    }

    fn check_catches(&mut self, report: &mut TickReport) {
        if !self.state.phase.is_hunting() {
            return;
        }
        let killer = self.state.killer.position;
        let caught: Vec<u32> = self
            .state
            .survivors
            .values()
            .filter(|s| s.is_exposed() && s.position.distance_to(&killer) < CATCH_DISTANCE)
            .map(|s| s.id)
            .collect();

        for id in caught {
            if !self.state.phase.is_hunting() {
                break;
            }
            let position = self.state.survivors.get(&id).map(|s| s.position);
            if self.state.kill_survivor(id) {
                info!("Survivor {} was caught in room '{}'", id, self.id);
                report.deaths.push(id);
                if let Some(position) = position {
                    self.release_held(id, position);
                }
                self.check_survivor_count(report);
            }
        }
    }

    fn update_doors(&mut self, dt: f32) {
        for door in self.state.doors.values_mut() {
            if door.tick_jam(dt) {
                debug!("Door {} is no longer jammed", door.id);
            }
        }
    }

    /// Advances the match by `dt` seconds.
    pub fn tick(&mut self, dt: f32) -> TickReport {
        self.state.tick = self.state.tick.wrapping_add(1);
        self.clock += dt;
        let mut report = TickReport {
            tick: self.state.tick,
            ..TickReport::default()
        };
        if self.state.phase == MatchPhase::Ended {
            return report;
        }

        self.advance_timer(dt, &mut report);
        self.step_physics(dt, &mut report);
        self.update_survivors(dt, &mut report);
        if self.state.phase == MatchPhase::Ended {
            return report;
        }
        self.update_flood_slow();
        self.check_catches(&mut report);
        if self.state.phase == MatchPhase::Ended {
            return report;
        }
        self.update_doors(dt);
        self.effects.run(dt, &mut self.state);
        report.disaster = self.disasters.update(
            dt,
            &mut self.state,
            &mut self.physics,
            &mut self.effects,
            &mut self.rng,
        );

        if self.state.phase.is_hunting() {
            let velocity = self
                .ai
                .update(dt, &mut self.state, &mut self.effects, &mut self.rng);
            if let Some(body) = self.physics.body_mut(BodyHandle::Killer) {
                body.velocity.x = velocity.x;
                body.velocity.z = velocity.z;
            }
        }

        report
    }
}

/// Moves from `from` toward `to`, covering at most `reach` across the
/// floor plane. Height is taken from `to` unchanged.
fn clamp_move(from: Vec3, to: Vec3, reach: f32) -> Vec3 {
    let step = to.sub(&from).horizontal();
    let distance = step.magnitude();
    if distance <= reach {
        return to;
    }
    debug!("Clamped a {:.1} m move to {:.1} m", distance, reach);
    let clamped = from.add(&step.scale(reach / distance));
    Vec3::new(clamped.x, to.y, clamped.z)
}
