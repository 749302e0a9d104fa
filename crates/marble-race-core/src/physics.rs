//! Physics simulation using `Rapier3D`.
//!
//! `PhysicsWorld` owns every Rapier set and exposes the capabilities the
//! gameplay modules ask for: impulses, teleports, ray casts, gravity and
//! wake-up.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use glam::Vec3;
use rapier3d::prelude::*;

use crate::engine::{BodyCommand, BodySnapshot, GravitySink, RayCaster};
use crate::gravity::DEFAULT_GRAVITY_MAGNITUDE;

/// Fixed timestep for physics simulation (60Hz).
pub const PHYSICS_DT: f32 = 1.0 / 60.0;

/// Default gravity vector.
pub fn default_gravity() -> Vec3 {
    Vec3::new(0.0, -DEFAULT_GRAVITY_MAGNITUDE, 0.0)
}

pub(crate) fn to_vector(v: Vec3) -> Vector<Real> {
    vector![v.x, v.y, v.z]
}

pub(crate) fn from_vector(v: &Vector<Real>) -> Vec3 {
    Vec3::new(v.x, v.y, v.z)
}

/// Physics world containing all `Rapier3D` components.
pub struct PhysicsWorld {
    pub rigid_body_set: RigidBodySet,
    pub collider_set: ColliderSet,
    pub integration_parameters: IntegrationParameters,
    pub physics_pipeline: PhysicsPipeline,
    pub island_manager: IslandManager,
    pub broad_phase: DefaultBroadPhase,
    pub narrow_phase: NarrowPhase,
    pub impulse_joint_set: ImpulseJointSet,
    pub multibody_joint_set: MultibodyJointSet,
    pub ccd_solver: CCDSolver,
    pub query_pipeline: QueryPipeline,
    pub gravity: Vector<Real>,
    pub frame: u64,
    /// Bodies whose sleep state is logged, with their last known state.
    watched_sleep: HashMap<RigidBodyHandle, bool>,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PhysicsWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhysicsWorld")
            .field("frame", &self.frame)
            .field("rigid_body_count", &self.rigid_body_set.len())
            .field("collider_count", &self.collider_set.len())
            .field("gravity", &self.gravity)
            .finish_non_exhaustive()
    }
}

impl PhysicsWorld {
    /// Creates a new physics world with default settings.
    pub fn new() -> Self {
        Self::with_gravity(default_gravity())
    }

    /// Creates a new physics world with custom gravity.
    pub fn with_gravity(gravity: Vec3) -> Self {
        let integration_parameters = IntegrationParameters {
            dt: PHYSICS_DT,
            ..Default::default()
        };

        Self {
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            integration_parameters,
            physics_pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            gravity: to_vector(gravity),
            frame: 0,
            watched_sleep: HashMap::new(),
        }
    }

    /// Advances the physics simulation by `dt` seconds.
    pub fn step(&mut self, dt: f32) {
        self.integration_parameters.dt = dt;
        self.physics_pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &(),
            &(),
        );
        self.frame += 1;
        self.log_sleep_changes();
    }

    /// Advances the physics simulation by multiple fixed steps.
    pub fn step_n(&mut self, n: u32) {
        for _ in 0..n {
            self.step(PHYSICS_DT);
        }
    }

    /// Adds a rigid body to the world and returns its handle.
    pub fn add_rigid_body(&mut self, rigid_body: RigidBody) -> RigidBodyHandle {
        self.rigid_body_set.insert(rigid_body)
    }

    /// Adds a collider attached to a rigid body.
    pub fn add_collider(&mut self, collider: Collider, parent: RigidBodyHandle) -> ColliderHandle {
        self.collider_set
            .insert_with_parent(collider, parent, &mut self.rigid_body_set)
    }

    /// Removes a rigid body and its attached colliders.
    pub fn remove_rigid_body(&mut self, handle: RigidBodyHandle) {
        self.rigid_body_set.remove(
            handle,
            &mut self.island_manager,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            true,
        );
        self.watched_sleep.remove(&handle);
    }

    /// Gets an immutable reference to a rigid body.
    pub fn get_rigid_body(&self, handle: RigidBodyHandle) -> Option<&RigidBody> {
        self.rigid_body_set.get(handle)
    }

    /// Gets a mutable reference to a rigid body.
    pub fn get_rigid_body_mut(&mut self, handle: RigidBodyHandle) -> Option<&mut RigidBody> {
        self.rigid_body_set.get_mut(handle)
    }

    /// Rebuilds the query acceleration structure.
    ///
    /// Needed after inserting colliders when a ray is cast before the next step.
    pub fn refresh_queries(&mut self) {
        self.query_pipeline.update(&self.collider_set);
    }

    /// Reads position and velocities of a body.
    pub fn snapshot(&self, handle: RigidBodyHandle) -> Option<BodySnapshot> {
        self.get_rigid_body(handle).map(|body| BodySnapshot {
            translation: from_vector(body.translation()),
            linvel: from_vector(body.linvel()),
            angvel: from_vector(body.angvel()),
        })
    }

    /// Applies a controller command to a body.
    pub fn apply(&mut self, handle: RigidBodyHandle, command: &BodyCommand) {
        let Some(body) = self.rigid_body_set.get_mut(handle) else {
            tracing::warn!(?handle, ?command, "body command ignored, body not found");
            return;
        };

        match *command {
            BodyCommand::ApplyImpulse { impulse } => {
                body.apply_impulse(to_vector(impulse), true);
            }
            BodyCommand::ApplyTorqueImpulse { torque } => {
                body.apply_torque_impulse(to_vector(torque), true);
            }
            BodyCommand::Reset {
                translation,
                linvel,
                angvel,
            } => {
                body.set_translation(to_vector(translation), true);
                body.set_linvel(to_vector(linvel), true);
                body.set_angvel(to_vector(angvel), true);
            }
        }
    }

    /// Casts a ray, ignoring the colliders of `exclude`.
    pub fn cast_ray_excluding(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        exclude: Option<RigidBodyHandle>,
    ) -> Option<f32> {
        let ray = Ray::new(point![origin.x, origin.y, origin.z], to_vector(direction));

        let filter = match exclude {
            Some(handle) => QueryFilter::default().exclude_rigid_body(handle),
            None => QueryFilter::default(),
        };

        self.query_pipeline
            .cast_ray(
                &self.rigid_body_set,
                &self.collider_set,
                &ray,
                max_distance,
                true,
                filter,
            )
            .map(|(_, toi)| toi)
    }

    /// Ray caster that never reports hits on `body`.
    pub fn ray_caster(&self, body: RigidBodyHandle) -> BodyRayCaster<'_> {
        BodyRayCaster { world: self, body }
    }

    /// Starts logging sleep/wake transitions of `handle`.
    pub fn watch_sleep(&mut self, handle: RigidBodyHandle) {
        let sleeping = self
            .get_rigid_body(handle)
            .is_some_and(RigidBody::is_sleeping);
        self.watched_sleep.insert(handle, sleeping);
    }

    /// Returns true if the body exists and is asleep.
    pub fn is_sleeping(&self, handle: RigidBodyHandle) -> bool {
        self.get_rigid_body(handle).is_some_and(RigidBody::is_sleeping)
    }

    fn log_sleep_changes(&mut self) {
        for (handle, was_sleeping) in &mut self.watched_sleep {
            let Some(body) = self.rigid_body_set.get(*handle) else {
                continue;
            };
            let sleeping = body.is_sleeping();
            if sleeping != *was_sleeping {
                if sleeping {
                    tracing::debug!(?handle, frame = self.frame, "body fell asleep");
                } else {
                    tracing::debug!(?handle, frame = self.frame, "body woke up");
                }
                *was_sleeping = sleeping;
            }
        }
    }

    /// Computes a deterministic hash of the current physics state.
    pub fn compute_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.frame.hash(&mut hasher);

        for (handle, body) in self.rigid_body_set.iter() {
            let (index, generation) = handle.into_raw_parts();
            index.hash(&mut hasher);
            generation.hash(&mut hasher);

            for value in body
                .translation()
                .iter()
                .chain(body.rotation().coords.iter())
                .chain(body.linvel().iter())
                .chain(body.angvel().iter())
            {
                hash_f32(*value, &mut hasher);
            }
        }

        hasher.finish()
    }

    /// Returns the current simulation frame number.
    pub fn current_frame(&self) -> u64 {
        self.frame
    }

    /// Current gravity vector.
    pub fn gravity(&self) -> Vec3 {
        from_vector(&self.gravity)
    }

    /// Resets the physics world to its initial state, keeping gravity.
    pub fn reset(&mut self) {
        *self = Self::with_gravity(self.gravity());
    }
}

impl GravitySink for PhysicsWorld {
    type Body = RigidBodyHandle;

    fn set_gravity(&mut self, gravity: Vec3) {
        self.gravity = to_vector(gravity);
    }

    fn wake_up(&mut self, body: &RigidBodyHandle) {
        if let Some(body) = self.rigid_body_set.get_mut(*body) {
            body.wake_up(true);
        }
    }
}

impl RayCaster for PhysicsWorld {
    fn cast_ray(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<f32> {
        self.cast_ray_excluding(origin, direction, max_distance, None)
    }
}

/// Ray caster bound to one body, which it never hits.
#[derive(Debug, Clone, Copy)]
pub struct BodyRayCaster<'a> {
    world: &'a PhysicsWorld,
    body: RigidBodyHandle,
}

impl RayCaster for BodyRayCaster<'_> {
    fn cast_ray(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<f32> {
        self.world
            .cast_ray_excluding(origin, direction, max_distance, Some(self.body))
    }
}

/// Hashes a f32 value by converting to bits.
fn hash_f32(value: f32, hasher: &mut impl Hasher) {
    value.to_bits().hash(hasher);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world_with_floor() -> PhysicsWorld {
        let mut world = PhysicsWorld::new();
        let floor = world.add_rigid_body(RigidBodyBuilder::fixed().build());
        world.add_collider(
            ColliderBuilder::cuboid(5.0, 0.1, 5.0)
                .translation(vector![0.0, -0.1, 0.0])
                .build(),
            floor,
        );
        world.refresh_queries();
        world
    }

    fn spawn_ball(world: &mut PhysicsWorld, y: f32) -> RigidBodyHandle {
        let body = world.add_rigid_body(
            RigidBodyBuilder::dynamic()
                .translation(vector![0.0, y, 0.0])
                .build(),
        );
        world.add_collider(ColliderBuilder::ball(0.3).build(), body);
        body
    }

    #[test]
    fn test_physics_world_creation() {
        let world = PhysicsWorld::new();
        assert_eq!(world.frame, 0);
        assert_eq!(world.integration_parameters.dt, PHYSICS_DT);
        assert_eq!(world.gravity(), Vec3::new(0.0, -9.81, 0.0));
    }

    #[test]
    fn test_step_advances_frame() {
        let mut world = PhysicsWorld::new();
        world.step(PHYSICS_DT);
        assert_eq!(world.current_frame(), 1);
        world.step_n(10);
        assert_eq!(world.current_frame(), 11);
    }

    #[test]
    fn test_deterministic_simulation() {
        let mut world1 = world_with_floor();
        let mut world2 = world_with_floor();
        let ball1 = spawn_ball(&mut world1, 2.0);
        let ball2 = spawn_ball(&mut world2, 2.0);

        world1.apply(ball1, &BodyCommand::ApplyImpulse { impulse: Vec3::new(0.01, 0.0, -0.02) });
        world2.apply(ball2, &BodyCommand::ApplyImpulse { impulse: Vec3::new(0.01, 0.0, -0.02) });
        world1.step_n(120);
        world2.step_n(120);

        assert_eq!(world1.compute_hash(), world2.compute_hash());
        assert_eq!(world1.snapshot(ball1), world2.snapshot(ball2));
    }

    #[test]
    fn test_reset_command_zeroes_velocity() {
        let mut world = world_with_floor();
        let ball = spawn_ball(&mut world, 1.0);

        world.apply(ball, &BodyCommand::ApplyImpulse { impulse: Vec3::new(0.0, 0.0, -1.0) });
        world.apply(ball, &BodyCommand::ApplyTorqueImpulse { torque: Vec3::new(-1.0, 0.0, 0.0) });
        world.step_n(30);

        world.apply(
            ball,
            &BodyCommand::Reset {
                translation: Vec3::new(0.0, 1.0, 0.0),
                linvel: Vec3::ZERO,
                angvel: Vec3::ZERO,
            },
        );

        let snapshot = world.snapshot(ball).unwrap();
        assert_eq!(snapshot.translation, Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(snapshot.linvel, Vec3::ZERO);
        assert_eq!(snapshot.angvel, Vec3::ZERO);
    }

    #[test]
    fn test_cast_ray_hits_floor() {
        let world = world_with_floor();

        let toi = world.cast_ray(Vec3::new(0.0, 2.0, 0.0), Vec3::NEG_Y, 10.0).unwrap();
        assert!((toi - 2.0).abs() < 1e-4);

        assert!(world.cast_ray(Vec3::new(0.0, 2.0, 0.0), Vec3::Y, 10.0).is_none());
        assert!(world.cast_ray(Vec3::new(0.0, 20.0, 0.0), Vec3::NEG_Y, 10.0).is_none());
    }

    #[test]
    fn test_body_ray_caster_skips_own_body() {
        let mut world = world_with_floor();
        let ball = spawn_ball(&mut world, 1.0);
        world.refresh_queries();

        let own = world.ray_caster(ball).cast_ray(Vec3::new(0.0, 3.0, 0.0), Vec3::NEG_Y, 10.0);
        let any = world.cast_ray(Vec3::new(0.0, 3.0, 0.0), Vec3::NEG_Y, 10.0);

        assert!((own.unwrap() - 3.0).abs() < 1e-4);
        assert!((any.unwrap() - 1.7).abs() < 1e-4);
    }

    #[test]
    fn test_gravity_sink() {
        let mut world = PhysicsWorld::new();
        world.set_gravity(Vec3::new(0.0, 9.81, 0.0));
        assert_eq!(world.gravity(), Vec3::new(0.0, 9.81, 0.0));

        world.reset();
        assert_eq!(world.gravity(), Vec3::new(0.0, 9.81, 0.0));
    }

    #[test]
    fn test_wake_up_sleeping_body() {
        let mut world = world_with_floor();
        let ball = spawn_ball(&mut world, 0.3);
        world.watch_sleep(ball);

        world.get_rigid_body_mut(ball).unwrap().sleep();
        assert!(world.is_sleeping(ball));

        world.wake_up(&ball);
        assert!(!world.is_sleeping(ball));
    }

    #[test]
    fn test_add_and_remove_body() {
        let mut world = PhysicsWorld::new();
        let ball = spawn_ball(&mut world, 1.0);
        assert!(world.snapshot(ball).is_some());

        world.remove_rigid_body(ball);
        assert!(world.snapshot(ball).is_none());

        // Commands on missing bodies are ignored
        world.apply(ball, &BodyCommand::ApplyImpulse { impulse: Vec3::X });
    }
}
