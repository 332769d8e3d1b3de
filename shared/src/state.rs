//! Replicated match state
//!
//! These are the types the server mutates every tick and serializes into the
//! `gameState` broadcast. Clients deserialize the very same structs, so every
//! field needed to render a frame lives here. The helpers on each type keep
//! the field-level invariants (terminal death, monotonic repair progress,
//! jammed doors staying shut) in one place so command handlers and the tick
//! can't disagree about them.

use crate::math::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Where the killer waits until the hunt begins.
pub const KILLER_PLACEHOLDER: Vec3 = Vec3::new(1000.0, 1000.0, 1000.0);
/// Water level reported while no flood is running.
pub const WATER_BASELINE: f32 = -10.0;
/// Repaired fuse boxes needed for a survivor victory.
pub const FUSE_BOXES_TO_WIN: usize = 3;
pub const MAX_REPAIR_PROGRESS: f32 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MatchPhase {
    #[default]
    Waiting,
    Setup,
    Hunt,
    Showdown,
    Ended,
}

impl MatchPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchPhase::Waiting => "waiting",
            MatchPhase::Setup => "setup",
            MatchPhase::Hunt => "hunt",
            MatchPhase::Showdown => "showdown",
            MatchPhase::Ended => "ended",
        }
    }

    /// Phases in which the killer is loose in the house.
    pub fn is_hunting(&self) -> bool {
        matches!(self, MatchPhase::Hunt | MatchPhase::Showdown)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    Survivors,
    Killer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisasterKind {
    Earthquake,
    Lightning,
    Flood,
}

impl DisasterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisasterKind::Earthquake => "earthquake",
            DisasterKind::Lightning => "lightning",
            DisasterKind::Flood => "flood",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KillerType {
    Stalker,
    Phantom,
    Brute,
}

impl KillerType {
    pub const ALL: [KillerType; 3] = [KillerType::Stalker, KillerType::Phantom, KillerType::Brute];

    pub fn as_str(&self) -> &'static str {
        match self {
            KillerType::Stalker => "stalker",
            KillerType::Phantom => "phantom",
            KillerType::Brute => "brute",
        }
    }
}

impl fmt::Display for KillerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KillerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stalker" => Ok(KillerType::Stalker),
            "phantom" => Ok(KillerType::Phantom),
            "brute" => Ok(KillerType::Brute),
            other => Err(format!("unknown killer type '{}'", other)),
        }
    }
}

/// Survivor character archetype picked when joining.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CharType {
    #[default]
    Survivor,
    /// Repairs fuse boxes twice as fast.
    Mechanic,
    /// Can reveal the killer's position once per match.
    Scout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SurvivorStatus {
    Alive,
    Dead,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Survivor {
    pub id: u32,
    pub char_type: CharType,
    pub position: Vec3,
    pub rotation: f32,
    pub status: SurvivorStatus,
    pub is_hiding: bool,
    /// Fuse box currently being repaired, if any.
    pub is_repairing: Option<u32>,
    pub is_sprinting: bool,
    pub sanity: f32,
    pub stamina: f32,
    pub is_slowed: bool,
    pub has_finisher_tool: bool,
    pub ability_used: bool,
}

impl Survivor {
    pub fn new(id: u32, char_type: CharType, position: Vec3, sanity: f32, stamina: f32) -> Self {
        Self {
            id,
            char_type,
            position,
            rotation: 0.0,
            status: SurvivorStatus::Alive,
            is_hiding: false,
            is_repairing: None,
            is_sprinting: false,
            sanity,
            stamina,
            is_slowed: false,
            has_finisher_tool: false,
            ability_used: false,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.status == SurvivorStatus::Alive
    }

    /// Alive and out in the open.
    pub fn is_exposed(&self) -> bool {
        self.is_alive() && !self.is_hiding
    }

    pub fn drain_sanity(&mut self, amount: f32) {
        self.sanity = (self.sanity - amount).max(0.0);
    }
}

/// The killer as clients see it. The AI's internal state is never sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KillerView {
    #[serde(rename = "type")]
    pub killer_type: KillerType,
    pub position: Vec3,
    pub rotation: f32,
    pub is_invisible: bool,
}

impl KillerView {
    pub fn new(killer_type: KillerType) -> Self {
        Self {
            killer_type,
            position: KILLER_PLACEHOLDER,
            rotation: 0.0,
            is_invisible: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Door {
    pub id: u32,
    pub position: Vec3,
    pub is_open: bool,
    pub is_locked: bool,
    pub is_jammed: bool,
    pub jam_timer: f32,
}

impl Door {
    pub fn new(id: u32, position: Vec3) -> Self {
        Self {
            id,
            position,
            is_open: false,
            is_locked: false,
            is_jammed: false,
            jam_timer: 0.0,
        }
    }

    /// Flips the door. Locked or jammed doors refuse and report `false`.
    pub fn toggle(&mut self) -> bool {
        if self.is_locked || self.is_jammed {
            return false;
        }
        self.is_open = !self.is_open;
        true
    }

    pub fn jam(&mut self, seconds: f32) {
        self.is_jammed = true;
        self.jam_timer = seconds;
    }

    /// Counts the jam down; returns true on the tick the jam clears.
    pub fn tick_jam(&mut self, dt: f32) -> bool {
        if !self.is_jammed {
            return false;
        }
        self.jam_timer -= dt;
        if self.jam_timer <= 0.0 {
            self.is_jammed = false;
            self.jam_timer = 0.0;
            return true;
        }
        false
    }

    pub fn prompt(&self) -> &'static str {
        if self.is_open {
            "Close Door"
        } else {
            "Open Door"
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FuseBox {
    pub id: u32,
    pub position: Vec3,
    pub progress: f32,
    pub is_repaired: bool,
}

impl FuseBox {
    pub fn new(id: u32, position: Vec3) -> Self {
        Self {
            id,
            position,
            progress: 0.0,
            is_repaired: false,
        }
    }

    /// Advances repair progress. Progress never decreases and clamps at 100.
    /// Returns true on the call that completes the repair.
    pub fn add_progress(&mut self, amount: f32) -> bool {
        if self.is_repaired || amount <= 0.0 {
            return false;
        }
        self.progress = (self.progress + amount).min(MAX_REPAIR_PROGRESS);
        if self.progress >= MAX_REPAIR_PROGRESS {
            self.is_repaired = true;
            return true;
        }
        false
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Throwable {
    pub id: u32,
    pub position: Vec3,
    pub is_held: bool,
    pub holder: Option<u32>,
}

impl Throwable {
    pub fn new(id: u32, position: Vec3) -> Self {
        Self {
            id,
            position,
            is_held: false,
            holder: None,
        }
    }

    /// Freezes the object at the holder's position. Fails if already held.
    pub fn pick_up(&mut self, holder: u32, at: Vec3) -> bool {
        if self.is_held {
            return false;
        }
        self.is_held = true;
        self.holder = Some(holder);
        self.position = at;
        true
    }

    pub fn release(&mut self) {
        self.is_held = false;
        self.holder = None;
    }
}

/// The canonical snapshot of one room's match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchState {
    pub tick: u32,
    pub phase: MatchPhase,
    pub match_timer: f32,
    pub winner: Option<Winner>,
    pub survivors: BTreeMap<u32, Survivor>,
    pub living_survivor_count: u32,
    pub killer: KillerView,
    pub doors: BTreeMap<u32, Door>,
    pub fuse_boxes: BTreeMap<u32, FuseBox>,
    pub throwables: BTreeMap<u32, Throwable>,
    pub active_disaster: Option<DisasterKind>,
    pub water_level: f32,
    pub lightning_flash: bool,
}

impl MatchState {
    pub fn new(killer_type: KillerType) -> Self {
        Self {
            tick: 0,
            phase: MatchPhase::Waiting,
            match_timer: 0.0,
            winner: None,
            survivors: BTreeMap::new(),
            living_survivor_count: 0,
            killer: KillerView::new(killer_type),
            doors: BTreeMap::new(),
            fuse_boxes: BTreeMap::new(),
            throwables: BTreeMap::new(),
            active_disaster: None,
            water_level: WATER_BASELINE,
            lightning_flash: false,
        }
    }

    /// Moves to `phase` with a fresh timer. `Ended` is terminal and
    /// re-entering the current phase is ignored; returns whether it changed.
    pub fn set_phase(&mut self, phase: MatchPhase, duration: f32) -> bool {
        if self.phase == MatchPhase::Ended || self.phase == phase {
            return false;
        }
        self.phase = phase;
        self.match_timer = duration;
        true
    }

    /// Ends the match. Later calls cannot overwrite the first winner.
    pub fn finish(&mut self, winner: Winner) -> bool {
        if self.phase == MatchPhase::Ended {
            return false;
        }
        self.winner = Some(winner);
        self.phase = MatchPhase::Ended;
        self.match_timer = 0.0;
        true
    }

    pub fn add_survivor(&mut self, survivor: Survivor) -> bool {
        if self.survivors.contains_key(&survivor.id) {
            return false;
        }
        if survivor.is_alive() {
            self.living_survivor_count += 1;
        }
        self.survivors.insert(survivor.id, survivor);
        true
    }

    /// Drops a survivor entirely, keeping the living count in step.
    pub fn remove_survivor(&mut self, id: u32) -> Option<Survivor> {
        let survivor = self.survivors.remove(&id)?;
        if survivor.is_alive() {
            self.living_survivor_count = self.living_survivor_count.saturating_sub(1);
        }
        Some(survivor)
    }

    /// Alive -> dead. Death is terminal, so a second call is a no-op.
    pub fn kill_survivor(&mut self, id: u32) -> bool {
        let Some(survivor) = self.survivors.get_mut(&id) else {
            return false;
        };
        if !survivor.is_alive() {
            return false;
        }
        survivor.status = SurvivorStatus::Dead;
        survivor.is_hiding = false;
        survivor.is_repairing = None;
        survivor.is_sprinting = false;
        survivor.has_finisher_tool = false;
        self.living_survivor_count = self.living_survivor_count.saturating_sub(1);
        true
    }

    pub fn repaired_count(&self) -> usize {
        self.fuse_boxes.values().filter(|b| b.is_repaired).count()
    }

    pub fn alive_survivors(&self) -> impl Iterator<Item = &Survivor> {
        self.survivors.values().filter(|s| s.is_alive())
    }

    /// Throwables currently held by `holder`.
    pub fn held_by(&self, holder: u32) -> Vec<u32> {
        self.throwables
            .values()
            .filter(|t| t.holder == Some(holder))
            .map(|t| t.id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn survivor(id: u32) -> Survivor {
        Survivor::new(id, CharType::Survivor, Vec3::new(5.0, 1.0, 5.0), 100.0, 100.0)
    }

    #[test]
    fn test_door_toggle_rejected_when_jammed_or_locked() {
        let mut door = Door::new(1, Vec3::ZERO);
        assert!(door.toggle());
        assert!(door.is_open);

        door.jam(15.0);
        assert!(!door.toggle());
        assert!(door.is_open);

        door.is_jammed = false;
        door.is_locked = true;
        assert!(!door.toggle());
        assert!(door.is_open);
    }

    #[test]
    fn test_door_jam_clears_after_timer() {
        let mut door = Door::new(1, Vec3::ZERO);
        door.jam(1.0);
        assert!(!door.tick_jam(0.5));
        assert!(door.is_jammed);
        assert!(door.tick_jam(0.6));
        assert!(!door.is_jammed);
        assert_eq!(door.jam_timer, 0.0);
        assert!(!door.tick_jam(1.0));
    }

    #[test]
    fn test_fuse_box_progress_monotonic_and_clamped() {
        let mut fuse = FuseBox::new(1, Vec3::ZERO);
        assert!(!fuse.add_progress(40.0));
        assert!(!fuse.add_progress(-30.0));
        assert_approx_eq!(fuse.progress, 40.0, 1e-6);
        assert!(fuse.add_progress(80.0));
        assert_eq!(fuse.progress, MAX_REPAIR_PROGRESS);
        assert!(fuse.is_repaired);
        assert!(!fuse.add_progress(10.0));
        assert_eq!(fuse.progress, MAX_REPAIR_PROGRESS);
    }

    #[test]
    fn test_living_count_never_negative() {
        let mut state = MatchState::new(KillerType::Stalker);
        state.add_survivor(survivor(1));
        assert_eq!(state.living_survivor_count, 1);

        assert!(state.kill_survivor(1));
        assert!(!state.kill_survivor(1));
        assert_eq!(state.living_survivor_count, 0);

        // Removing a dead survivor does not touch the count again
        assert!(state.remove_survivor(1).is_some());
        assert_eq!(state.living_survivor_count, 0);
        assert!(state.remove_survivor(1).is_none());
        assert!(!state.kill_survivor(42));
    }

    #[test]
    fn test_duplicate_survivor_ignored() {
        let mut state = MatchState::new(KillerType::Stalker);
        assert!(state.add_survivor(survivor(7)));
        assert!(!state.add_survivor(survivor(7)));
        assert_eq!(state.living_survivor_count, 1);
    }

    #[test]
    fn test_ended_phase_is_terminal() {
        let mut state = MatchState::new(KillerType::Brute);
        assert!(state.set_phase(MatchPhase::Setup, 20.0));
        assert!(!state.set_phase(MatchPhase::Setup, 5.0));
        assert_eq!(state.match_timer, 20.0);

        assert!(state.finish(Winner::Killer));
        assert!(!state.finish(Winner::Survivors));
        assert!(!state.set_phase(MatchPhase::Hunt, 300.0));
        assert_eq!(state.winner, Some(Winner::Killer));
        assert_eq!(state.phase, MatchPhase::Ended);
    }

    #[test]
    fn test_throwable_pickup_once() {
        let mut item = Throwable::new(3, Vec3::new(1.0, 0.25, 1.0));
        let hand = Vec3::new(2.0, 1.0, 2.0);
        assert!(item.pick_up(9, hand));
        assert!(!item.pick_up(10, Vec3::ZERO));
        assert_eq!(item.holder, Some(9));
        assert_eq!(item.position, hand);
        item.release();
        assert!(!item.is_held);
        assert_eq!(item.holder, None);
    }

    #[test]
    fn test_match_state_json_roundtrip() {
        let mut state = MatchState::new(KillerType::Phantom);
        state.set_phase(MatchPhase::Hunt, 120.0);
        state.add_survivor(survivor(1));
        state.add_survivor(survivor(2));
        state.kill_survivor(2);
        state.doors.insert(4, Door::new(4, Vec3::new(5.0, 1.1, 0.0)));
        state.fuse_boxes.insert(8, FuseBox::new(8, Vec3::new(1.0, 1.5, 1.0)));
        state.throwables.insert(11, Throwable::new(11, Vec3::new(3.0, 0.35, 3.0)));
        state.active_disaster = Some(DisasterKind::Flood);
        state.survivors.get_mut(&1).unwrap().is_repairing = Some(8);

        let json = serde_json::to_string(&state).unwrap();
        let decoded: MatchState = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, state);

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["phase"], "hunt");
        assert_eq!(value["killer"]["type"], "phantom");
        assert_eq!(value["survivors"]["2"]["status"], "dead");
        assert_eq!(value["activeDisaster"], "flood");
        assert_eq!(value["livingSurvivorCount"], 1);
    }

    #[test]
    fn test_killer_type_parsing() {
        assert_eq!("Phantom".parse::<KillerType>(), Ok(KillerType::Phantom));
        assert!("ghost".parse::<KillerType>().is_err());
    }
}
