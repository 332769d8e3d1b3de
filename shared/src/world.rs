//! Static house geometry sent to clients once, on join.

use crate::math::Vec3;
use serde::{Deserialize, Serialize};

/// An axis-aligned box: `position` is the centre, `size` the full extents.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Slab {
    pub position: Vec3,
    pub size: Vec3,
}

impl Slab {
    pub fn new(position: Vec3, size: Vec3) -> Self {
        Self { position, size }
    }

    pub fn half_extents(&self) -> Vec3 {
        self.size.scale(0.5)
    }

    pub fn min(&self) -> Vec3 {
        self.position.sub(&self.half_extents())
    }

    pub fn max(&self) -> Vec3 {
        self.position.add(&self.half_extents())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FurnitureKind {
    Table,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Furniture {
    #[serde(rename = "type")]
    pub kind: FurnitureKind,
    pub slab: Slab,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HidingSpot {
    pub id: u32,
    pub position: Vec3,
}

impl HidingSpot {
    pub fn prompt(&self) -> &'static str {
        "Hide in Closet"
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldData {
    pub ground: Vec<Slab>,
    pub walls: Vec<Slab>,
    pub floors: Vec<Slab>,
    pub stairs: Vec<Slab>,
    pub furniture: Vec<Furniture>,
    pub hiding_spots: Vec<HidingSpot>,
}

impl WorldData {
    /// Every solid box thrown objects can bounce off.
    pub fn colliders(&self) -> impl Iterator<Item = &Slab> {
        self.ground
            .iter()
            .chain(self.floors.iter())
            .chain(self.walls.iter())
            .chain(self.stairs.iter())
            .chain(self.furniture.iter().map(|f| &f.slab))
    }
}
