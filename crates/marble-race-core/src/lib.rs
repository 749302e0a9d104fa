//! Marble Race Core Library
//!
//! Gameplay simulation for a marble obstacle course on top of `Rapier3D`:
//! run lifecycle, seeded course generation, gravity reversal and the player
//! controller with its chase camera.
//!
//! The gameplay modules (`phase`, `level`, `gravity`, `player`) talk to the
//! physics engine only through the capability traits in `engine`, so they can
//! be tested without a world. `game::RaceGame` wires them to `PhysicsWorld`.

#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

pub mod camera;
pub mod config;
pub mod course;
pub mod engine;
pub mod game;
pub mod gravity;
pub mod input;
pub mod level;
pub mod phase;
pub mod physics;
pub mod player;

pub use camera::{CameraPose, CameraRig, CameraTuning};
pub use config::{ConfigError, PhysicsTuning, PropsConfig, RaceConfig};
pub use engine::{BodyCommand, BodySnapshot, GravitySink, RayCaster};
pub use game::RaceGame;
pub use gravity::{GravityController, GravityDirection, SwitchState};
pub use input::{Button, InputEdges, InputSnapshot};
pub use level::{
    BoxSpec, CourseBounds, LevelError, LevelLayout, MAX_SEGMENTS, ObstacleMotion, ObstaclePose,
    SEGMENT_SPACING, Segment, SegmentKind, check_params, generate,
};
pub use phase::{
    ListenerId, PhaseChange, PhaseEvent, RunClock, RunPhase, RunPhaseMachine, format_elapsed,
};
pub use physics::{PHYSICS_DT, PhysicsWorld, default_gravity};
pub use player::{ControllerTuning, PlayerController, StepContext, StepOutput};
