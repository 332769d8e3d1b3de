use rand::Rng;
use shared::{Slab, Vec3, WorldData};
use std::collections::BTreeMap;

use crate::world::THROWABLE_SIZE;

pub const GRAVITY: Vec3 = Vec3::new(0.0, -20.0, 0.0);
/// Fixed sub-steps per simulation step.
pub const SUBSTEPS: u32 = 3;
/// Impulse magnitude applied to a thrown object.
pub const THROW_FORCE: f32 = 15.0;
pub const THROWABLE_MASS: f32 = 2.0;
pub const KILLER_MASS: f32 = 100.0;
pub const KILLER_DAMPING: f32 = 0.8;
pub const KILLER_HALF_EXTENTS: Vec3 = Vec3::new(0.4, 1.0, 0.4);
/// Ledges up to this height are walked onto instead of blocking, e.g. stairs.
pub const KILLER_STEP_HEIGHT: f32 = 0.55;
/// Earthquake impulse scale per unit of mass.
pub const SHAKE_STRENGTH: f32 = 10.0;
/// Bodies at or above this mass ignore earthquakes.
pub const SHAKE_MASS_LIMIT: f32 = 50.0;
/// Fraction of horizontal speed a resting throwable loses per second.
const GROUND_FRICTION: f32 = 4.0;

/// Identifies a body in the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BodyHandle {
    Throwable(u32),
    Killer,
}

/// A collision worth reporting: the first static contact of a thrown object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    pub body: BodyHandle,
    pub point: Vec3,
}

/// Represents a box-shaped body in 3D space.
#[derive(Debug, Clone, Copy)]
pub struct Body {
    /// The positional center of the body.
    pub position: Vec3,
    pub velocity: Vec3,
    pub half_extents: Vec3,
    pub mass: f32,
    /// Fraction of velocity lost per second.
    pub linear_damping: f32,
    /// Fraction of horizontal speed lost per second while grounded.
    pub friction: f32,
    pub step_height: f32,
    pub grounded: bool,
    /// Armed after a throw; reports one contact and then disarms.
    pub listening: bool,
}

impl Body {
    pub fn throwable(position: Vec3) -> Self {
        let half = THROWABLE_SIZE / 2.0;
        Body {
            position,
            velocity: Vec3::ZERO,
            half_extents: Vec3::new(half, half, half),
            mass: THROWABLE_MASS,
            linear_damping: 0.0,
            friction: GROUND_FRICTION,
            step_height: 0.0,
            grounded: false,
            listening: false,
        }
    }

    /// Heavy, damped and able to climb stairs. The AI only ever drives its
    /// horizontal velocity; gravity and the colliders handle the rest.
    pub fn killer(position: Vec3) -> Self {
        Body {
            position,
            velocity: Vec3::ZERO,
            half_extents: KILLER_HALF_EXTENTS,
            mass: KILLER_MASS,
            linear_damping: KILLER_DAMPING,
            friction: 0.0,
            step_height: KILLER_STEP_HEIGHT,
            grounded: false,
            listening: false,
        }
    }

    /// Changes velocity by `impulse / mass`. Massless bodies are unaffected.
    pub fn apply_impulse(&mut self, impulse: Vec3) {
        if self.mass <= 0.0 {
            return;
        }
        self.velocity = self.velocity.add(&impulse.scale(1.0 / self.mass));
    }

    /// Simulates physics on the body.
    pub fn simulate(&mut self, dt: f32, gravity: Vec3) {
        self.velocity = self.velocity.add(&gravity.scale(dt));

        if self.linear_damping > 0.0 {
            self.velocity = self
                .velocity
                .scale((1.0 - self.linear_damping).max(0.0).powf(dt));
        }

        if self.grounded && self.friction > 0.0 {
            let keep = (1.0 - self.friction * dt).max(0.0);
            self.velocity.x *= keep;
            self.velocity.z *= keep;
        }

        self.position = self.position.add(&self.velocity.scale(dt));
    }

    /// Checks for and resolves collisions between the body and a collection of static boxes.
    /// Returns the body's position after the first resolved collision, if any.
    pub fn resolve_collisions<'a, I>(&mut self, colliders: I) -> Option<Vec3>
    where
        I: IntoIterator<Item = &'a Slab>,
    {
        let mut contact = None;
        self.grounded = false;

        for other in colliders {
            let self_min = self.position.sub(&self.half_extents);
            let self_max = self.position.add(&self.half_extents);
            let other_min = other.min();
            let other_max = other.max();

            // AABB intersection; touching faces do not count
            let collision = !(self_max.x <= other_min.x
                || self_min.x >= other_max.x
                || self_max.y <= other_min.y
                || self_min.y >= other_max.y
                || self_max.z <= other_min.z
                || self_min.z >= other_max.z);

            if !collision {
                continue;
            }

            let overlap_x = self_max.x.min(other_max.x) - self_min.x.max(other_min.x);
            let overlap_y = self_max.y.min(other_max.y) - self_min.y.max(other_min.y);
            let overlap_z = self_max.z.min(other_max.z) - self_min.z.max(other_min.z);

            let ledge = other_max.y - self_min.y;
            let step_up = self.step_height > 0.0
                && ledge <= self.step_height
                && self.position.y > other.position.y;

            // Resolve along the axis with the shallowest penetration
            if step_up || (overlap_y <= overlap_x && overlap_y <= overlap_z) {
                if self.position.y < other.position.y {
                    self.position.y = other_min.y - self.half_extents.y;
                } else {
                    self.position.y = other_max.y + self.half_extents.y;
                    self.grounded = true;
                }
                self.velocity.y = 0.0;
            } else if overlap_x <= overlap_z {
                if self.position.x < other.position.x {
                    self.position.x = other_min.x - self.half_extents.x;
                } else {
                    self.position.x = other_max.x + self.half_extents.x;
                }
                self.velocity.x = 0.0;
            } else {
                if self.position.z < other.position.z {
                    self.position.z = other_min.z - self.half_extents.z;
                } else {
                    self.position.z = other_max.z + self.half_extents.z;
                }
                self.velocity.z = 0.0;
            }

            if contact.is_none() {
                contact = Some(self.position);
            }
        }
        contact
    }
}

/// A door leaf. It only collides while closed.
#[derive(Debug, Clone, Copy, PartialEq)]
struct DoorCollider {
    slab: Slab,
    closed: bool,
}

/// Static house colliders, door leaves and every dynamic body in one room.
#[derive(Debug, Clone)]
pub struct PhysicsWorld {
    colliders: Vec<Slab>,
    doors: BTreeMap<u32, DoorCollider>,
    bodies: BTreeMap<BodyHandle, Body>,
    gravity: Vec3,
}

impl PhysicsWorld {
    pub fn new(colliders: Vec<Slab>) -> Self {
        Self {
            colliders,
            doors: BTreeMap::new(),
            bodies: BTreeMap::new(),
            gravity: GRAVITY,
        }
    }

    pub fn from_world(world: &WorldData) -> Self {
        Self::new(world.colliders().copied().collect())
    }

    pub fn add_body(&mut self, handle: BodyHandle, body: Body) {
        self.bodies.insert(handle, body);
    }

    pub fn remove_body(&mut self, handle: BodyHandle) -> Option<Body> {
        self.bodies.remove(&handle)
    }

    pub fn body(&self, handle: BodyHandle) -> Option<&Body> {
        self.bodies.get(&handle)
    }

    pub fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut Body> {
        self.bodies.get_mut(&handle)
    }

    pub fn bodies(&self) -> impl Iterator<Item = (&BodyHandle, &Body)> {
        self.bodies.iter()
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Registers a door leaf. New doors start closed.
    pub fn add_door(&mut self, id: u32, slab: Slab) {
        self.doors.insert(id, DoorCollider { slab, closed: true });
    }

    /// Opens or closes a door leaf. Returns `false` for an unknown door.
    pub fn set_door_closed(&mut self, id: u32, closed: bool) -> bool {
        match self.doors.get_mut(&id) {
            Some(door) => {
                door.closed = closed;
                true
            }
            None => false,
        }
    }

    pub fn is_door_closed(&self, id: u32) -> Option<bool> {
        self.doors.get(&id).map(|door| door.closed)
    }

    pub fn apply_impulse(&mut self, handle: BodyHandle, impulse: Vec3) -> bool {
        match self.bodies.get_mut(&handle) {
            Some(body) => {
                body.apply_impulse(impulse);
                true
            }
            None => false,
        }
    }

    /// Puts a throwable back into the simulation at `from` and launches it
    /// along `direction`. Its contact listener is armed for the first hit.
    pub fn throw(&mut self, id: u32, from: Vec3, direction: Vec3) {
        let direction = if direction.is_finite() {
            direction.normalize()
        } else {
            Vec3::ZERO
        };

        let mut body = Body::throwable(from);
        body.apply_impulse(direction.scale(THROW_FORCE));
        body.listening = true;
        self.bodies.insert(BodyHandle::Throwable(id), body);
    }

    /// Re-adds a throwable at rest, e.g. when its holder drops it.
    pub fn drop_at(&mut self, id: u32, at: Vec3) {
        self.bodies
            .insert(BodyHandle::Throwable(id), Body::throwable(at));
    }

    /// Earthquake shove: every light body gets a random horizontal impulse
    /// proportional to its mass. Returns how many bodies were shaken.
    pub fn shake<R: Rng>(&mut self, rng: &mut R) -> usize {
        let mut shaken = 0;
        for body in self.bodies.values_mut() {
            if body.mass <= 0.0 || body.mass >= SHAKE_MASS_LIMIT {
                continue;
            }
            let impulse = Vec3::new(
                rng.gen::<f32>() - 0.5,
                0.0,
                rng.gen::<f32>() - 0.5,
            )
            .scale(body.mass * SHAKE_STRENGTH);
            body.apply_impulse(impulse);
            body.grounded = false;
            shaken += 1;
        }
        shaken
    }

    /// Advances the simulation by `dt` in [`SUBSTEPS`] equal steps and
    /// returns contacts reported by armed listeners.
    pub fn step(&mut self, dt: f32) -> Vec<Contact> {
        let mut contacts = Vec::new();
        if dt <= 0.0 {
            return contacts;
        }

        let sub_dt = dt / SUBSTEPS as f32;
        for _ in 0..SUBSTEPS {
            for (handle, body) in self.bodies.iter_mut() {
                body.simulate(sub_dt, self.gravity);

                let closed_doors = self
                    .doors
                    .values()
                    .filter(|door| door.closed)
                    .map(|door| &door.slab);
                let statics = self.colliders.iter().chain(closed_doors);
                if let Some(point) = body.resolve_collisions(statics) {
                    if body.listening {
                        body.listening = false;
                        contacts.push(Contact {
                            body: *handle,
                            point,
                        });
                    }
                }
            }
        }
        contacts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn ground() -> Slab {
        Slab::new(
            Vec3::new(50.0, -0.1, 50.0),
            Vec3::new(100.0, 0.2, 100.0),
        )
    }

    #[test]
    fn test_body_falls_and_rests_on_ground() {
        let mut world = PhysicsWorld::new(vec![ground()]);
        world.add_body(
            BodyHandle::Throwable(1),
            Body::throwable(Vec3::new(5.0, 3.0, 5.0)),
        );

        for _ in 0..60 {
            world.step(0.05);
        }

        let body = world.body(BodyHandle::Throwable(1)).unwrap();
        assert_approx_eq!(body.position.y, THROWABLE_SIZE / 2.0, 1e-4);
        assert!(body.grounded);
        assert_approx_eq!(body.velocity.y, 0.0, 1e-4);
    }

    #[test]
    fn test_throw_reports_exactly_one_contact() {
        let mut world = PhysicsWorld::new(vec![ground()]);
        world.throw(7, Vec3::new(5.0, 1.5, 5.0), Vec3::new(0.0, 0.0, -1.0));

        let body = world.body(BodyHandle::Throwable(7)).unwrap();
        assert_approx_eq!(body.velocity.z, -THROW_FORCE / THROWABLE_MASS, 1e-5);

        let mut contacts = Vec::new();
        for _ in 0..40 {
            contacts.extend(world.step(0.05));
        }

        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].body, BodyHandle::Throwable(7));
        assert!(contacts[0].point.z < 5.0);
    }

    #[test]
    fn test_dropped_body_is_silent() {
        let mut world = PhysicsWorld::new(vec![ground()]);
        world.drop_at(2, Vec3::new(5.0, 1.0, 5.0));

        let mut contacts = 0;
        for _ in 0..20 {
            contacts += world.step(0.05).len();
        }
        assert_eq!(contacts, 0);
    }

    #[test]
    fn test_wall_stops_horizontal_motion() {
        let wall = Slab::new(Vec3::new(5.0, 2.0, 3.0), Vec3::new(10.0, 4.0, 0.2));
        let mut world = PhysicsWorld::new(vec![ground(), wall]);
        world.throw(1, Vec3::new(5.0, 1.0, 5.0), Vec3::new(0.0, 0.0, -1.0));

        for _ in 0..40 {
            world.step(0.05);
        }

        let body = world.body(BodyHandle::Throwable(1)).unwrap();
        assert!(body.position.z >= 3.1 + THROWABLE_SIZE / 2.0 - 1e-4);
    }

    /// Walks the killer along `velocity` the way the room does: the AI sets
    /// horizontal speed before every step and gravity keeps the vertical.
    fn walk_killer(world: &mut PhysicsWorld, velocity: Vec3, steps: u32) -> f32 {
        let mut highest = f32::MIN;
        for _ in 0..steps {
            let body = world.body_mut(BodyHandle::Killer).unwrap();
            body.velocity.x = velocity.x;
            body.velocity.z = velocity.z;
            world.step(0.05);
            highest = highest.max(world.body(BodyHandle::Killer).unwrap().position.y);
        }
        highest
    }

    #[test]
    fn test_killer_rests_on_ground_and_is_damped() {
        let mut world = PhysicsWorld::new(vec![ground()]);
        world.add_body(BodyHandle::Killer, Body::killer(Vec3::new(5.0, 1.0, 5.0)));
        world.apply_impulse(BodyHandle::Killer, Vec3::new(100.0, 0.0, 0.0));

        for _ in 0..20 {
            world.step(0.05);
        }

        let body = world.body(BodyHandle::Killer).unwrap();
        assert_approx_eq!(body.position.y, KILLER_HALF_EXTENTS.y, 1e-4);
        assert!(body.grounded);
        // One second of 0.8 damping leaves a fifth of the speed
        assert_approx_eq!(body.velocity.x, 0.2, 1e-3);
    }

    #[test]
    fn test_killer_blocked_by_wall() {
        let wall = Slab::new(Vec3::new(5.0, 2.0, 3.0), Vec3::new(10.0, 4.0, 0.2));
        let mut world = PhysicsWorld::new(vec![ground(), wall]);
        world.add_body(BodyHandle::Killer, Body::killer(Vec3::new(5.0, 1.0, 5.0)));

        walk_killer(&mut world, Vec3::new(0.0, 0.0, -3.0), 40);

        let body = world.body(BodyHandle::Killer).unwrap();
        assert!(body.position.z >= 3.1 + KILLER_HALF_EXTENTS.z - 1e-4, "z = {}", body.position.z);
        assert_approx_eq!(body.position.y, KILLER_HALF_EXTENTS.y, 1e-3);
    }

    #[test]
    fn test_closed_door_blocks_until_opened() {
        let mut world = PhysicsWorld::new(vec![ground()]);
        world.add_door(9, Slab::new(Vec3::new(5.0, 1.1, 3.0), Vec3::new(1.6, 2.2, 0.1)));
        world.add_body(BodyHandle::Killer, Body::killer(Vec3::new(5.0, 1.0, 5.0)));
        assert_eq!(world.is_door_closed(9), Some(true));

        walk_killer(&mut world, Vec3::new(0.0, 0.0, -3.0), 40);
        let z = world.body(BodyHandle::Killer).unwrap().position.z;
        assert!(z >= 3.05 + KILLER_HALF_EXTENTS.z - 1e-4, "z = {}", z);

        assert!(world.set_door_closed(9, false));
        walk_killer(&mut world, Vec3::new(0.0, 0.0, -3.0), 40);
        let z = world.body(BodyHandle::Killer).unwrap().position.z;
        assert!(z < 2.0, "z = {}", z);

        assert!(!world.set_door_closed(10, false));
        assert_eq!(world.is_door_closed(10), None);
    }

    #[test]
    fn test_killer_climbs_stairs_but_not_tables() {
        let mut colliders = vec![ground()];
        for i in 0..4 {
            let step = i as f32;
            colliders.push(Slab::new(
                Vec3::new(5.0, step * 0.5, 4.0 + step),
                Vec3::new(3.0, 0.5, 1.0),
            ));
        }
        let mut world = PhysicsWorld::new(colliders);
        world.add_body(BodyHandle::Killer, Body::killer(Vec3::new(5.0, 1.0, 1.0)));

        let highest = walk_killer(&mut world, Vec3::new(0.0, 0.0, 3.0), 60);
        // Top of the last step plus half the body
        assert!(highest >= 1.75 + KILLER_HALF_EXTENTS.y - 1e-3, "highest = {}", highest);

        let table = Slab::new(Vec3::new(5.0, 0.4, 3.0), Vec3::new(2.0, 0.8, 1.2));
        let mut world = PhysicsWorld::new(vec![ground(), table]);
        world.add_body(BodyHandle::Killer, Body::killer(Vec3::new(5.0, 1.0, 1.0)));
        walk_killer(&mut world, Vec3::new(0.0, 0.0, 3.0), 40);
        let body = world.body(BodyHandle::Killer).unwrap();
        assert!(body.position.z <= 2.4 - KILLER_HALF_EXTENTS.z + 1e-4);
    }

    #[test]
    fn test_shake_skips_heavy_bodies() {
        let mut world = PhysicsWorld::new(vec![ground()]);
        world.add_body(BodyHandle::Killer, Body::killer(Vec3::new(5.0, 1.0, 5.0)));
        world.drop_at(1, Vec3::new(2.0, 0.25, 2.0));
        world.drop_at(2, Vec3::new(4.0, 0.25, 4.0));

        let mut rng = StdRng::seed_from_u64(11);
        assert_eq!(world.shake(&mut rng), 2);

        let killer = world.body(BodyHandle::Killer).unwrap();
        assert_eq!(killer.velocity, Vec3::ZERO);

        let light = world.body(BodyHandle::Throwable(1)).unwrap();
        // |(r - 0.5) * m * 10 / m| stays within 5 m/s per axis
        assert!(light.velocity.x.abs() <= 5.0 && light.velocity.z.abs() <= 5.0);
        assert_eq!(light.velocity.y, 0.0);
    }

    #[test]
    fn test_non_finite_throw_direction() {
        let mut world = PhysicsWorld::new(vec![ground()]);
        world.throw(3, Vec3::new(1.0, 1.0, 1.0), Vec3::new(f32::NAN, 0.0, 0.0));
        let body = world.body(BodyHandle::Throwable(3)).unwrap();
        assert_eq!(body.velocity, Vec3::ZERO);
    }
}
