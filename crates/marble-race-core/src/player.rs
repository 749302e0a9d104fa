//! Player controller: input to forces, grounded jump, goal and fall checks.
//!
//! The controller is a pure step function. It reads one input snapshot and
//! one body snapshot per tick and returns the commands the host must apply,
//! so it can be driven without a physics engine.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::camera::{CameraPose, CameraRig, CameraTuning};
use crate::engine::{BodyCommand, BodySnapshot, RayCaster};
use crate::input::{Button, InputSnapshot};
use crate::phase::{PhaseChange, PhaseEvent, RunPhase};

/// Force and detection constants of the player marble.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerTuning {
    /// Linear impulse per second of held direction.
    pub impulse_strength: f32,
    /// Torque impulse per second of held direction.
    pub torque_strength: f32,
    /// One-shot impulse of a grounded jump.
    pub jump_impulse: f32,
    /// Upward impulse per second while jump and alt mode are held.
    pub fly_strength: f32,
    pub ball_radius: f32,
    /// Gap between the ball surface and the ground probe origin.
    pub ground_probe_epsilon: f32,
    pub ground_probe_max_distance: f32,
    /// Probe hits closer than this count as standing on the ground.
    pub grounded_toi: f32,
    /// Falling below this height restarts the run.
    pub fall_threshold_y: f32,
    pub start_position: Vec3,
    pub camera: CameraTuning,
}

impl Default for ControllerTuning {
    fn default() -> Self {
        Self {
            impulse_strength: 0.6,
            torque_strength: 0.2,
            jump_impulse: 0.5,
            fly_strength: 0.6,
            ball_radius: 0.3,
            ground_probe_epsilon: 0.01,
            ground_probe_max_distance: 10.0,
            grounded_toi: 0.15,
            fall_threshold_y: -4.0,
            start_position: Vec3::new(0.0, 1.0, 0.0),
            camera: CameraTuning::default(),
        }
    }
}

/// World state the controller needs for one step.
#[derive(Debug, Clone, Copy)]
pub struct StepContext {
    pub dt: f32,
    pub phase: RunPhase,
    /// Gravity multiplier, `+1` or `-1`.
    pub gravity: f32,
    /// Z the body must pass to finish the run.
    pub finish_threshold_z: f32,
}

/// Result of one controller step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutput {
    /// At most one impulse and one torque impulse.
    pub commands: Vec<BodyCommand>,
    pub phase_event: Option<PhaseEvent>,
    pub camera: CameraPose,
}

/// Drives the player marble.
#[derive(Debug, Clone)]
pub struct PlayerController {
    tuning: ControllerTuning,
    camera: CameraRig,
    previous_input: InputSnapshot,
}

impl PlayerController {
    pub fn new(tuning: ControllerTuning) -> Self {
        Self {
            camera: CameraRig::new(tuning.camera),
            tuning,
            previous_input: InputSnapshot::default(),
        }
    }

    pub fn tuning(&self) -> &ControllerTuning {
        &self.tuning
    }

    pub fn camera(&self) -> CameraPose {
        self.camera.pose()
    }

    /// Advances the controller by one tick.
    pub fn step(
        &mut self,
        ctx: &StepContext,
        input: &InputSnapshot,
        body: &BodySnapshot,
        rays: &impl RayCaster,
    ) -> StepOutput {
        let edges = input.pressed_since(&self.previous_input);
        self.previous_input = *input;

        let mut phase_event = None;
        let mut phase = ctx.phase;
        if phase == RunPhase::Ready && edges.any() {
            phase_event = Some(PhaseEvent::Start);
            phase = RunPhase::Playing;
        }

        let mut commands = Vec::with_capacity(2);
        if phase == RunPhase::Playing {
            let (mut impulse, torque) = self.movement(*input, ctx.dt, ctx.gravity);

            if edges.contains(Button::Jump) && self.is_grounded(body, ctx.gravity, rays) {
                impulse.y += self.tuning.jump_impulse * ctx.gravity;
            }

            if impulse != Vec3::ZERO {
                commands.push(BodyCommand::ApplyImpulse { impulse });
            }
            if torque != Vec3::ZERO {
                commands.push(BodyCommand::ApplyTorqueImpulse { torque });
            }

            if phase_event.is_none() {
                phase_event = self.check_goal_or_fall(body, ctx);
            }
        }

        let camera = self.camera.follow(body.translation, ctx.dt);

        StepOutput {
            commands,
            phase_event,
            camera,
        }
    }

    /// Reacts to a phase transition. Entering `Ready` resets the body.
    pub fn on_phase_change(&self, change: &PhaseChange) -> Option<BodyCommand> {
        (change.to == RunPhase::Ready).then(|| self.reset_command())
    }

    /// Teleport to the start pose with both velocities zeroed.
    pub fn reset_command(&self) -> BodyCommand {
        BodyCommand::Reset {
            translation: self.tuning.start_position,
            linvel: Vec3::ZERO,
            angvel: Vec3::ZERO,
        }
    }

    /// Combined impulse and torque for the held direction buttons.
    fn movement(&self, input: InputSnapshot, dt: f32, gravity: f32) -> (Vec3, Vec3) {
        let impulse_strength = self.tuning.impulse_strength * dt;
        let torque_strength = self.tuning.torque_strength * dt;

        let mut impulse = Vec3::ZERO;
        let mut torque = Vec3::ZERO;

        if input.forward {
            impulse.z -= impulse_strength;
            torque.x -= torque_strength;
        }
        if input.backward {
            impulse.z += impulse_strength;
            torque.x += torque_strength;
        }
        if input.rightward {
            impulse.x += impulse_strength;
            torque.z -= torque_strength;
        }
        if input.leftward {
            impulse.x -= impulse_strength;
            torque.z += torque_strength;
        }

        // Fly assist
        if input.jump && input.alt_mode {
            impulse.y += self.tuning.fly_strength * dt * gravity;
        }

        (impulse, torque)
    }

    /// Probes below the ball along the current gravity direction.
    fn is_grounded(&self, body: &BodySnapshot, gravity: f32, rays: &impl RayCaster) -> bool {
        let down = Vec3::NEG_Y * gravity;
        let probe_offset = self.tuning.ball_radius + self.tuning.ground_probe_epsilon;
        let origin = body.translation + down * probe_offset;

        rays.cast_ray(origin, down, self.tuning.ground_probe_max_distance)
            .is_some_and(|toi| toi < self.tuning.grounded_toi)
    }

    /// The fall threshold is mirrored with gravity, so a marble that leaves
    /// the course upwards while gravity is reversed also restarts.
    fn check_goal_or_fall(&self, body: &BodySnapshot, ctx: &StepContext) -> Option<PhaseEvent> {
        if body.translation.z < ctx.finish_threshold_z {
            Some(PhaseEvent::End)
        } else if body.translation.y * ctx.gravity < self.tuning.fall_threshold_y {
            Some(PhaseEvent::Restart)
        } else {
            None
        }
    }
}
