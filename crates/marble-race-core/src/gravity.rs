//! Gravity reversal.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::engine::GravitySink;

/// Standard gravity magnitude, in m/s².
pub const DEFAULT_GRAVITY_MAGNITUDE: f32 = 9.81;

/// Sign of the gravity multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GravityDirection {
    #[default]
    Normal,
    Reversed,
}

impl GravityDirection {
    /// `+1.0` for normal gravity, `-1.0` when reversed.
    pub fn sign(self) -> f32 {
        match self {
            Self::Normal => 1.0,
            Self::Reversed => -1.0,
        }
    }

    #[must_use]
    pub fn flipped(self) -> Self {
        match self {
            Self::Normal => Self::Reversed,
            Self::Reversed => Self::Normal,
        }
    }
}

/// Position and color of the in-world gravity switch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwitchState {
    /// Vertical offset of the switch cap.
    pub offset_y: f32,
    /// Linear RGB.
    pub color: [f32; 3],
}

/// Holds the gravity multiplier and flips it.
#[derive(Debug, Clone)]
pub struct GravityController {
    direction: GravityDirection,
    base_magnitude: f32,
}

impl Default for GravityController {
    fn default() -> Self {
        Self::new(DEFAULT_GRAVITY_MAGNITUDE)
    }
}

impl GravityController {
    pub fn new(base_magnitude: f32) -> Self {
        Self {
            direction: GravityDirection::Normal,
            base_magnitude,
        }
    }

    pub fn direction(&self) -> GravityDirection {
        self.direction
    }

    /// Signed multiplier `g`.
    pub fn multiplier(&self) -> f32 {
        self.direction.sign()
    }

    pub fn is_reversed(&self) -> bool {
        self.direction == GravityDirection::Reversed
    }

    /// World gravity for the current direction.
    pub fn gravity_vector(&self) -> Vec3 {
        Vec3::NEG_Y * self.base_magnitude * self.multiplier()
    }

    /// Flips gravity, pushes it to `world` and wakes every body in
    /// `sleep_capable`. Returns the new multiplier.
    pub fn toggle<W: GravitySink>(&mut self, world: &mut W, sleep_capable: &[W::Body]) -> f32 {
        self.direction = self.direction.flipped();
        world.set_gravity(self.gravity_vector());
        for body in sleep_capable {
            world.wake_up(body);
        }

        tracing::info!(
            direction = ?self.direction,
            woken = sleep_capable.len(),
            "gravity toggled"
        );
        self.multiplier()
    }

    pub fn switch_state(&self) -> SwitchState {
        match self.direction {
            GravityDirection::Normal => SwitchState {
                offset_y: 0.0,
                color: [1.0, 0.0, 0.0],
            },
            GravityDirection::Reversed => SwitchState {
                offset_y: -0.1,
                color: [0.0, 125.0 / 255.0, 25.0 / 255.0],
            },
        }
    }
}
