//! Named match rooms, created on first join and destroyed when the last
//! survivor leaves.

use log::info;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use shared::protocol::JoinRoomAck;
use shared::{CharType, KillerType};
use std::collections::HashMap;

use crate::config::GameConfig;
use crate::game::{Room, TickReport};

/// Overrides applied to every room the registry creates.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoomDefaults {
    /// House seed; random per room when unset
    pub seed: Option<u64>,
    /// Killer type; random per room when unset
    pub killer_type: Option<KillerType>,
}

pub struct RoomRegistry {
    rooms: HashMap<String, Room>,
    config: GameConfig,
    defaults: RoomDefaults,
    rng: StdRng,
}

impl RoomRegistry {
    pub fn new(config: GameConfig, defaults: RoomDefaults) -> Self {
        Self {
            rooms: HashMap::new(),
            config,
            defaults,
            rng: StdRng::from_entropy(),
        }
    }

    /// Returns the room named `room_id`, building its house first if needed.
    pub fn get_or_create(&mut self, room_id: &str) -> &mut Room {
        let Self {
            rooms,
            config,
            defaults,
            rng,
        } = self;

        rooms.entry(room_id.to_string()).or_insert_with(|| {
            let seed = defaults.seed.unwrap_or_else(|| rng.gen());
            let killer_type = match defaults.killer_type {
                Some(killer_type) => killer_type,
                None => *KillerType::ALL.choose(&mut *rng).unwrap_or(&KillerType::Stalker),
            };
            Room::new(room_id, seed, killer_type, config.clone())
        })
    }

    pub fn join(&mut self, room_id: &str, survivor_id: u32, char_type: CharType) -> JoinRoomAck {
        self.get_or_create(room_id).join(survivor_id, char_type)
    }

    /// Removes a survivor from a room and drops the room once it is empty.
    pub fn leave(&mut self, room_id: &str, survivor_id: u32) -> bool {
        let Some(room) = self.rooms.get_mut(room_id) else {
            return false;
        };
        let left = room.leave(survivor_id);

        if room.is_empty() {
            self.rooms.remove(room_id);
            info!("Room '{}' destroyed", room_id);
        }
        left
    }

    pub fn get(&self, room_id: &str) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    pub fn get_mut(&mut self, room_id: &str) -> Option<&mut Room> {
        self.rooms.get_mut(room_id)
    }

    /// Advances every room by `dt` seconds.
    pub fn tick_all(&mut self, dt: f32) -> Vec<(String, TickReport)> {
        self.rooms
            .iter_mut()
            .map(|(id, room)| (id.clone(), room.tick(dt)))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Room)> {
        self.rooms.iter().map(|(id, room)| (id.as_str(), room))
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}
