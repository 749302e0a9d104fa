//! Capabilities the simulation needs from a physics engine.
//!
//! The gameplay modules never touch engine handles directly. They ask for the
//! narrow operations below; `PhysicsWorld` implements them over `rapier3d`
//! and tests implement them with fakes.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Kinematic state of a body, read once per tick.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BodySnapshot {
    pub translation: Vec3,
    pub linvel: Vec3,
    pub angvel: Vec3,
}

/// Mutation requested on the controlled body.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BodyCommand {
    ApplyImpulse { impulse: Vec3 },
    ApplyTorqueImpulse { torque: Vec3 },
    /// Teleport and overwrite both velocities.
    Reset { translation: Vec3, linvel: Vec3, angvel: Vec3 },
}

/// Casts rays against the world.
pub trait RayCaster {
    /// Returns the time of impact of the first hit within `max_distance`.
    ///
    /// `direction` is expected to be normalized, so the time of impact is a
    /// distance.
    fn cast_ray(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<f32>;
}

/// Global gravity and body wake-up.
pub trait GravitySink {
    type Body;

    fn set_gravity(&mut self, gravity: Vec3);

    /// Forces a sleeping body to re-evaluate its motion.
    fn wake_up(&mut self, body: &Self::Body);
}
