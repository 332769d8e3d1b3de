//! Procedural house layout
//!
//! Produces data only: the slabs clients turn into meshes and the server
//! turns into colliders, plus the stateful entities (doors, fuse boxes,
//! throwables) that seed a room's match state and the nav points / hiding
//! spots the killer AI walks between. The same seed always yields the same
//! house.

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{Door, Furniture, FurnitureKind, FuseBox, HidingSpot, Slab, Throwable, Vec3, WorldData};

/// Edge length of the cube used for every throwable.
pub const THROWABLE_SIZE: f32 = 0.5;
/// Spawn point used when a layout has no nav points at all.
pub const FALLBACK_SPAWN: Vec3 = Vec3::new(5.0, 1.0, 5.0);

const SLAB_THICKNESS: f32 = 0.2;
pub const DOOR_WIDTH: f32 = 1.6;
pub const DOOR_HEIGHT: f32 = 2.2;
const DOOR_THICKNESS: f32 = 0.1;
const ROOM_GAP: f32 = 2.0;
const STAIR_STEPS: u32 = 10;
const STAIR_STEP_SIZE: Vec3 = Vec3::new(3.0, 0.5, 1.0);
const GROUND_SIZE: f32 = 100.0;
const TABLES_PER_ROOM: u32 = 2;
const TABLE_SIZE: Vec3 = Vec3::new(2.0, 0.8, 1.2);

#[derive(Debug, Clone, PartialEq)]
pub struct HouseOptions {
    /// Inclusive range of storeys.
    pub floors_range: (u32, u32),
    /// Rooms per storey, laid out two to a row.
    pub rooms_per_floor: u32,
    pub room_width: f32,
    pub room_depth: f32,
    /// Floor-to-floor height.
    pub storey_height: f32,
    pub wall_thickness: f32,
    /// Chance that any given side of a room is a door instead of a wall.
    pub door_chance: f64,
    pub throwable_chance: f64,
}

impl Default for HouseOptions {
    fn default() -> Self {
        Self {
            floors_range: (3, 4),
            rooms_per_floor: 4,
            room_width: 10.0,
            room_depth: 10.0,
            storey_height: 5.0,
            wall_thickness: 0.2,
            door_chance: 0.6,
            throwable_chance: 0.5,
        }
    }
}

/// Footprint of one generated room.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoomBounds {
    pub x: f32,
    pub z: f32,
    pub w: f32,
    pub d: f32,
    pub y: f32,
}

impl RoomBounds {
    pub fn center(&self) -> Vec3 {
        Vec3::new(self.x + self.w / 2.0, self.y + 1.0, self.z + self.d / 2.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    North,
    South,
    West,
    East,
}

impl Side {
    const ALL: [Side; 4] = [Side::North, Side::South, Side::West, Side::East];

    /// Size of a box lying along this side.
    fn oriented(self, length: f32, height: f32, depth: f32) -> Vec3 {
        match self {
            Side::North | Side::South => Vec3::new(length, height, depth),
            Side::West | Side::East => Vec3::new(depth, height, length),
        }
    }

    /// Moves `point` by `distance` along this side.
    fn along(self, point: Vec3, distance: f32) -> Vec3 {
        match self {
            Side::North | Side::South => Vec3::new(point.x + distance, point.y, point.z),
            Side::West | Side::East => Vec3::new(point.x, point.y, point.z + distance),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HouseLayout {
    pub seed: u64,
    pub floors: u32,
    pub rooms: Vec<RoomBounds>,
    pub world: WorldData,
    pub nav_points: Vec<Vec3>,
    pub doors: Vec<Door>,
    /// Collider of each door leaf, by door id.
    pub door_leaves: Vec<(u32, Slab)>,
    pub fuse_boxes: Vec<FuseBox>,
    pub throwables: Vec<Throwable>,
}

impl HouseLayout {
    /// A random nav point, or [`FALLBACK_SPAWN`] for a house without any.
    pub fn spawn_point<R: Rng>(&self, rng: &mut R) -> Vec3 {
        if self.nav_points.is_empty() {
            return FALLBACK_SPAWN;
        }
        self.nav_points[rng.gen_range(0..self.nav_points.len())]
    }

    pub fn hiding_spot_positions(&self) -> Vec<Vec3> {
        self.world.hiding_spots.iter().map(|s| s.position).collect()
    }
}

pub struct HouseGen {
    rng: StdRng,
    opts: HouseOptions,
    seed: u64,
    next_id: u32,
    layout: HouseLayout,
}

impl HouseGen {
    pub fn new(seed: u64, opts: HouseOptions) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            opts,
            seed,
            next_id: 1,
            layout: HouseLayout {
                seed,
                floors: 0,
                rooms: Vec::new(),
                world: WorldData::default(),
                nav_points: Vec::new(),
                doors: Vec::new(),
                door_leaves: Vec::new(),
                fuse_boxes: Vec::new(),
                throwables: Vec::new(),
            },
        }
    }

    pub fn generate(mut self) -> HouseLayout {
        self.create_ground();

        let (min_floors, max_floors) = self.opts.floors_range;
        let floors = if max_floors > min_floors {
            self.rng.gen_range(min_floors..=max_floors)
        } else {
            min_floors
        };
        self.layout.floors = floors;

        for level in 0..floors {
            let base_y = level as f32 * self.opts.storey_height;
            let mut floor_rooms = Vec::new();

            for i in 0..self.opts.rooms_per_floor {
                let col = (i % 2) as f32;
                let row = (i / 2) as f32;
                let room = RoomBounds {
                    x: col * (self.opts.room_width + ROOM_GAP),
                    z: row * (self.opts.room_depth + ROOM_GAP),
                    w: self.opts.room_width,
                    d: self.opts.room_depth,
                    y: base_y,
                };
                self.create_room(&room);
                floor_rooms.push(room);
            }

            if let Some(first) = floor_rooms.first() {
                let id = self.next_id();
                let position = Vec3::new(first.x + 1.0, base_y + 1.5, first.z + 1.0);
                self.layout.fuse_boxes.push(FuseBox::new(id, position));

                if level + 1 < floors {
                    let origin = Vec3::new(
                        first.x + self.opts.room_width * 0.5,
                        base_y,
                        first.z + self.opts.room_depth + 1.0,
                    );
                    self.create_stairs(origin);
                }
            }

            self.layout.rooms.extend(floor_rooms);
        }

        debug!(
            "Generated house (seed {}): {} floors, {} rooms, {} doors, {} throwables",
            self.seed,
            floors,
            self.layout.rooms.len(),
            self.layout.doors.len(),
            self.layout.throwables.len()
        );

        self.layout
    }

    fn next_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn create_ground(&mut self) {
        let half = GROUND_SIZE / 2.0;
        self.layout.world.ground.push(Slab::new(
            Vec3::new(half, -SLAB_THICKNESS / 2.0, half),
            Vec3::new(GROUND_SIZE, SLAB_THICKNESS, GROUND_SIZE),
        ));
    }

    fn create_room(&mut self, room: &RoomBounds) {
        let wall_height = self.opts.storey_height - 1.0;
        let slab_size = Vec3::new(room.w, SLAB_THICKNESS, room.d);
        let mid_x = room.x + room.w / 2.0;
        let mid_z = room.z + room.d / 2.0;

        // Floor & ceiling
        self.layout
            .world
            .floors
            .push(Slab::new(Vec3::new(mid_x, room.y, mid_z), slab_size));
        self.layout
            .world
            .floors
            .push(Slab::new(Vec3::new(mid_x, room.y + wall_height, mid_z), slab_size));

        self.layout.nav_points.push(room.center());

        for side in Side::ALL {
            self.create_wall_or_door(room, side, wall_height);
        }

        let spot_id = self.next_id();
        self.layout.world.hiding_spots.push(HidingSpot {
            id: spot_id,
            position: Vec3::new(room.x + 1.0, room.y, room.z + 1.0),
        });

        for _ in 0..TABLES_PER_ROOM {
            let x = room.x + self.rng.gen::<f32>() * 6.0 + 2.0;
            let z = room.z + self.rng.gen::<f32>() * 6.0 + 2.0;
            let y = room.y + SLAB_THICKNESS / 2.0 + TABLE_SIZE.y / 2.0;
            self.layout.world.furniture.push(Furniture {
                kind: FurnitureKind::Table,
                slab: Slab::new(Vec3::new(x, y, z), TABLE_SIZE),
            });
        }

        if self.rng.gen_bool(self.opts.throwable_chance) {
            let id = self.next_id();
            let x = room.x + self.rng.gen::<f32>() * (room.w - 2.0) + 1.0;
            let z = room.z + self.rng.gen::<f32>() * (room.d - 2.0) + 1.0;
            let y = room.y + SLAB_THICKNESS / 2.0 + THROWABLE_SIZE / 2.0;
            self.layout
                .throwables
                .push(Throwable::new(id, Vec3::new(x, y, z)));
        }
    }

    fn create_wall_or_door(&mut self, room: &RoomBounds, side: Side, wall_height: f32) {
        let use_door = self.rng.gen_bool(self.opts.door_chance);

        let (x, z, length) = match side {
            Side::North => (room.x + room.w / 2.0, room.z, room.w),
            Side::South => (room.x + room.w / 2.0, room.z + room.d, room.w),
            Side::West => (room.x, room.z + room.d / 2.0, room.d),
            Side::East => (room.x + room.w, room.z + room.d / 2.0, room.d),
        };
        let wall_center = Vec3::new(x, room.y + wall_height / 2.0, z);

        if !use_door {
            self.push_wall(side, wall_center, length, wall_height);
            return;
        }

        let id = self.next_id();
        let position = Vec3::new(x, room.y + DOOR_HEIGHT / 2.0, z);
        self.layout.doors.push(Door::new(id, position));
        let leaf = side.oriented(DOOR_WIDTH, DOOR_HEIGHT, DOOR_THICKNESS);
        self.layout.door_leaves.push((id, Slab::new(position, leaf)));

        // Wall on both sides of the doorway and a lintel above it
        let segment = (length - DOOR_WIDTH) / 2.0;
        if segment > 0.0 {
            let offset = (DOOR_WIDTH + segment) / 2.0;
            for distance in [-offset, offset] {
                self.push_wall(side, side.along(wall_center, distance), segment, wall_height);
            }
        }
        let lintel = wall_height - DOOR_HEIGHT;
        if lintel > 0.0 {
            let center = Vec3::new(x, room.y + DOOR_HEIGHT + lintel / 2.0, z);
            self.push_wall(side, center, DOOR_WIDTH, lintel);
        }
    }

    fn push_wall(&mut self, side: Side, center: Vec3, length: f32, height: f32) {
        let size = side.oriented(length, height, self.opts.wall_thickness);
        self.layout.world.walls.push(Slab::new(center, size));
    }

    fn create_stairs(&mut self, origin: Vec3) {
        for i in 0..STAIR_STEPS {
            let step = i as f32;
            let position = Vec3::new(
                origin.x,
                origin.y + step * STAIR_STEP_SIZE.y,
                origin.z + step * STAIR_STEP_SIZE.z,
            );
            self.layout
                .world
                .stairs
                .push(Slab::new(position, STAIR_STEP_SIZE));
        }

        let steps = STAIR_STEPS as f32;
        self.layout
            .nav_points
            .push(Vec3::new(origin.x, origin.y + 0.1, origin.z));
        self.layout.nav_points.push(Vec3::new(
            origin.x,
            origin.y + steps * STAIR_STEP_SIZE.y,
            origin.z + steps * STAIR_STEP_SIZE.z,
        ));
    }
}
