//! Smoothed chase camera.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Camera placement handed to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraPose {
    pub position: Vec3,
    pub look_at: Vec3,
}

/// Offsets and smoothing rate of the chase camera.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraTuning {
    /// Camera position relative to the followed body.
    pub position_offset: Vec3,
    /// Look target relative to the followed body.
    pub target_offset: Vec3,
    /// Exponential smoothing rate, per second.
    pub smoothing: f32,
    pub initial_position: Vec3,
    pub initial_target: Vec3,
}

impl Default for CameraTuning {
    fn default() -> Self {
        Self {
            position_offset: Vec3::new(0.0, 0.65, 2.25),
            target_offset: Vec3::new(0.0, 0.25, 0.0),
            smoothing: 5.0,
            initial_position: Vec3::new(10.0, 10.0, 10.0),
            initial_target: Vec3::ZERO,
        }
    }
}

/// Persistent camera state that eases towards the followed body.
#[derive(Debug, Clone)]
pub struct CameraRig {
    tuning: CameraTuning,
    pose: CameraPose,
}

impl CameraRig {
    pub fn new(tuning: CameraTuning) -> Self {
        Self {
            pose: CameraPose {
                position: tuning.initial_position,
                look_at: tuning.initial_target,
            },
            tuning,
        }
    }

    pub fn pose(&self) -> CameraPose {
        self.pose
    }

    /// Moves the camera towards `body` by a step-size independent fraction.
    pub fn follow(&mut self, body: Vec3, dt: f32) -> CameraPose {
        let alpha = 1.0 - (-self.tuning.smoothing * dt.max(0.0)).exp();

        let target_position = body + self.tuning.position_offset;
        let target_look_at = body + self.tuning.target_offset;

        self.pose.position = self.pose.position.lerp(target_position, alpha);
        self.pose.look_at = self.pose.look_at.lerp(target_look_at, alpha);
        self.pose
    }
}
