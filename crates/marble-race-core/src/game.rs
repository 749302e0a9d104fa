//! Race session: wires the phase machine, level, gravity and player
//! controller to a physics world and advances them one tick at a time.

use rapier3d::prelude::RigidBodyHandle;

use crate::camera::CameraPose;
use crate::config::{ConfigError, RaceConfig};
use crate::course::{CourseBodies, animate, despawn_course, spawn_course, spawn_marble, spawn_props};
use crate::engine::BodySnapshot;
use crate::gravity::{GravityController, SwitchState};
use crate::input::InputSnapshot;
use crate::level::{LevelLayout, generate};
use crate::phase::{ListenerId, PhaseChange, PhaseEvent, RunPhase, RunPhaseMachine};
use crate::physics::PhysicsWorld;
use crate::player::{PlayerController, StepContext};

/// One marble race with its physics world.
#[derive(Debug)]
pub struct RaceGame {
    config: RaceConfig,
    phase: RunPhaseMachine,
    layout: LevelLayout,
    gravity: GravityController,
    controller: PlayerController,
    world: PhysicsWorld,
    course: CourseBodies,
    marble: RigidBodyHandle,
    props: Vec<RigidBodyHandle>,
    sim_time: f64,
}

impl RaceGame {
    /// Generates the first level and builds the world.
    pub fn new(config: RaceConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let phase = RunPhaseMachine::new(config.seed);
        let layout = generate(config.segment_count, &config.catalog, phase.level_seed())?;
        let gravity = GravityController::new(config.physics.gravity_magnitude);
        let controller = PlayerController::new(config.player);

        let mut world = PhysicsWorld::with_gravity(gravity.gravity_vector());
        let course = spawn_course(&mut world, &layout);
        let marble = spawn_marble(&mut world, &config.player);
        world.watch_sleep(marble);
        let props = spawn_props(&mut world, config.props.count, layout.seed);

        Ok(Self {
            config,
            phase,
            layout,
            gravity,
            controller,
            world,
            course,
            marble,
            props,
            sim_time: 0.0,
        })
    }

    /// Advances the race by `dt` seconds.
    ///
    /// Returns the phase transition caused by this tick, if any.
    pub fn tick(&mut self, dt: f32, input: &InputSnapshot) -> Option<PhaseChange> {
        let Some(body) = self.world.snapshot(self.marble) else {
            tracing::warn!("marble body missing, tick skipped");
            return None;
        };

        let ctx = StepContext {
            dt,
            phase: self.phase.phase(),
            gravity: self.gravity.multiplier(),
            finish_threshold_z: self.layout.finish_threshold_z(),
        };
        let output = self
            .controller
            .step(&ctx, input, &body, &self.world.ray_caster(self.marble));

        for command in &output.commands {
            self.world.apply(self.marble, command);
        }
        let change = output
            .phase_event
            .and_then(|event| self.apply_phase_event(event));

        let next_time = self.sim_time + f64::from(dt);
        #[allow(clippy::cast_possible_truncation)]
        let obstacle_time = next_time as f32;
        animate(&mut self.world, &self.layout, &self.course, obstacle_time);
        self.world.step(dt);
        self.sim_time = next_time;

        change
    }

    /// Starts the run, as a UI control would.
    pub fn start(&mut self) -> Option<PhaseChange> {
        self.apply_phase_event(PhaseEvent::Start)
    }

    /// Abandons or leaves the current run and prepares a fresh level.
    pub fn restart(&mut self) -> Option<PhaseChange> {
        self.apply_phase_event(PhaseEvent::Restart)
    }

    /// Flips gravity and wakes the loose props. Returns the new multiplier.
    pub fn toggle_gravity(&mut self) -> f32 {
        self.gravity.toggle(&mut self.world, &self.props)
    }

    /// Registers a listener for phase transitions.
    pub fn subscribe(&mut self, listener: impl FnMut(&PhaseChange) + 'static) -> ListenerId {
        self.phase.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.phase.unsubscribe(id)
    }

    fn apply_phase_event(&mut self, event: PhaseEvent) -> Option<PhaseChange> {
        let change = self.phase.apply(event, self.sim_time)?;

        if change.reseeded() {
            self.rebuild_level(change.seed);
        }
        if let Some(command) = self.controller.on_phase_change(&change) {
            self.world.apply(self.marble, &command);
        }
        if change.to == RunPhase::Ended {
            tracing::info!(
                elapsed = self.phase.elapsed(self.sim_time),
                seed = self.layout.seed,
                "run finished"
            );
        }

        Some(change)
    }

    fn rebuild_level(&mut self, seed: u64) {
        let layout = match generate(self.config.segment_count, &self.config.catalog, seed) {
            Ok(layout) => layout,
            Err(err) => {
                tracing::warn!(%err, seed, "level regeneration failed, keeping current level");
                return;
            }
        };

        despawn_course(&mut self.world, std::mem::take(&mut self.course));
        for handle in self.props.drain(..) {
            self.world.remove_rigid_body(handle);
        }

        self.course = spawn_course(&mut self.world, &layout);
        self.props = spawn_props(&mut self.world, self.config.props.count, seed);
        self.layout = layout;
    }

    pub fn config(&self) -> &RaceConfig {
        &self.config
    }

    pub fn phase(&self) -> RunPhase {
        self.phase.phase()
    }

    /// Seconds of the current run, for the HUD timer.
    pub fn elapsed(&self) -> f64 {
        self.phase.elapsed(self.sim_time)
    }

    pub fn sim_time(&self) -> f64 {
        self.sim_time
    }

    pub fn layout(&self) -> &LevelLayout {
        &self.layout
    }

    pub fn camera(&self) -> CameraPose {
        self.controller.camera()
    }

    pub fn gravity_multiplier(&self) -> f32 {
        self.gravity.multiplier()
    }

    pub fn switch_state(&self) -> SwitchState {
        self.gravity.switch_state()
    }

    pub fn marble(&self) -> Option<BodySnapshot> {
        self.world.snapshot(self.marble)
    }

    pub fn props(&self) -> &[RigidBodyHandle] {
        &self.props
    }

    pub fn world(&self) -> &PhysicsWorld {
        &self.world
    }

    /// Computes a hash of the simulation state for replay checks.
    pub fn compute_hash(&self) -> u64 {
        self.world.compute_hash()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use glam::Vec3;

    use super::*;
    use crate::config::PropsConfig;
    use crate::engine::BodyCommand;
    use crate::input::Button;
    use crate::level::LevelError;
    use crate::physics::PHYSICS_DT;

    fn setup_game(segment_count: i64) -> RaceGame {
        RaceGame::new(RaceConfig {
            seed: 12345,
            segment_count,
            ..RaceConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_game_creation() {
        let game = setup_game(3);
        assert_eq!(game.phase(), RunPhase::Ready);
        assert_eq!(game.layout().len(), 5);
        assert_eq!(game.elapsed(), 0.0);
        assert_eq!(game.marble().unwrap().translation, Vec3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn test_invalid_config() {
        let result = RaceGame::new(RaceConfig {
            segment_count: -1,
            ..RaceConfig::default()
        });
        assert!(matches!(
            result,
            Err(ConfigError::Level(LevelError::InvalidConfiguration(_)))
        ));

        let result = RaceGame::new(RaceConfig {
            segment_count: 5000,
            ..RaceConfig::default()
        });
        assert!(matches!(result, Err(ConfigError::Level(_))));
    }

    #[test]
    fn test_first_input_starts_run() {
        let mut game = setup_game(3);

        game.tick(PHYSICS_DT, &InputSnapshot::default());
        assert_eq!(game.phase(), RunPhase::Ready);

        let change = game.tick(PHYSICS_DT, &InputSnapshot::with(&[Button::Forward])).unwrap();
        assert_eq!(change.event, PhaseEvent::Start);
        assert_eq!(game.phase(), RunPhase::Playing);
    }

    #[test]
    fn test_roll_to_finish() {
        let mut game = setup_game(0);
        let ends = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&ends);
        game.subscribe(move |change| {
            if change.event == PhaseEvent::End {
                *counter.borrow_mut() += 1;
            }
        });

        let forward = InputSnapshot::with(&[Button::Forward]);
        for _ in 0..600 {
            game.tick(PHYSICS_DT, &forward);
        }

        assert_eq!(game.phase(), RunPhase::Ended);
        assert_eq!(*ends.borrow(), 1);
        assert!(game.elapsed() > 0.0);

        // Timer stays frozen
        let frozen = game.elapsed();
        game.tick(PHYSICS_DT, &forward);
        assert_eq!(game.elapsed(), frozen);
    }

    #[test]
    fn test_restart_resets_marble_and_level() {
        let mut game = setup_game(4);
        let first_seed = game.layout().seed;

        let forward = InputSnapshot::with(&[Button::Forward, Button::Rightward]);
        for _ in 0..90 {
            game.tick(PHYSICS_DT, &forward);
        }
        let moved = game.marble().unwrap();
        assert_ne!(moved.linvel, Vec3::ZERO);

        let change = game.restart().unwrap();
        assert_eq!(change.to, RunPhase::Ready);
        assert_ne!(game.layout().seed, first_seed);
        assert_eq!(game.layout().len(), 6);
        assert_eq!(game.elapsed(), 0.0);

        let reset = game.marble().unwrap();
        assert_eq!(reset.translation, Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(reset.linvel, Vec3::ZERO);
        assert_eq!(reset.angvel, Vec3::ZERO);

        // Restart from Ready is a no-op
        assert!(game.restart().is_none());
    }

    #[test]
    fn test_restart_sequence_is_reproducible() {
        let mut game1 = setup_game(6);
        let mut game2 = setup_game(6);

        for _ in 0..3 {
            game1.start();
            game2.start();
            game1.restart();
            game2.restart();
            assert_eq!(game1.layout(), game2.layout());
        }
    }

    #[test]
    fn test_gravity_toggle_lifts_marble() {
        let mut game = RaceGame::new(RaceConfig {
            seed: 3,
            segment_count: 1,
            props: PropsConfig { count: 4 },
            ..RaceConfig::default()
        })
        .unwrap();

        let idle = InputSnapshot::default();
        for _ in 0..240 {
            game.tick(PHYSICS_DT, &idle);
        }

        let g = game.toggle_gravity();
        assert_eq!(g, -1.0);
        assert_eq!(game.world().gravity(), Vec3::new(0.0, 9.81, 0.0));
        for handle in game.props() {
            assert!(!game.world().is_sleeping(*handle));
        }
        assert_eq!(game.switch_state().offset_y, -0.1);

        for _ in 0..60 {
            game.tick(PHYSICS_DT, &idle);
        }
        assert!(game.marble().unwrap().translation.y > 1.0);

        assert_eq!(game.toggle_gravity(), 1.0);
    }

    #[test]
    fn test_leaving_course_upwards_restarts() {
        let mut game = setup_game(2);
        let restarts = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&restarts);
        game.subscribe(move |change| {
            if change.event == PhaseEvent::Restart {
                *counter.borrow_mut() += 1;
            }
        });

        game.start();
        game.toggle_gravity();

        let idle = InputSnapshot::default();
        for _ in 0..180 {
            game.tick(PHYSICS_DT, &idle);
        }

        assert_eq!(*restarts.borrow(), 1);
        assert_eq!(game.phase(), RunPhase::Ready);
    }

    #[test]
    fn test_grounded_probe_on_course() {
        let mut game = setup_game(2);
        let idle = InputSnapshot::default();
        for _ in 0..180 {
            game.tick(PHYSICS_DT, &idle);
        }

        game.start();
        let before = game.marble().unwrap().linvel.y;
        game.tick(PHYSICS_DT, &InputSnapshot::with(&[Button::Jump]));
        let after = game.marble().unwrap().linvel.y;
        assert!(after > before + 1.0);
    }

    #[test]
    fn test_no_jump_from_spawn_height() {
        let mut game = setup_game(2);
        game.start();

        game.tick(PHYSICS_DT, &InputSnapshot::with(&[Button::Jump]));
        // Still falling from the spawn height: no jump impulse was applied
        assert!(game.marble().unwrap().linvel.y <= 0.0);
    }

    #[test]
    fn test_deterministic_game() {
        let mut game1 = setup_game(3);
        let mut game2 = setup_game(3);

        let script = [
            InputSnapshot::with(&[Button::Forward]),
            InputSnapshot::with(&[Button::Forward, Button::Leftward]),
            InputSnapshot::with(&[Button::Jump]),
            InputSnapshot::default(),
        ];
        for tick in 0..300 {
            let input = script[(tick / 20) % script.len()];
            game1.tick(PHYSICS_DT, &input);
            game2.tick(PHYSICS_DT, &input);
        }

        assert_eq!(game1.compute_hash(), game2.compute_hash());
        assert_eq!(game1.phase(), game2.phase());
    }

    #[test]
    fn test_reset_command_applies_exactly() {
        let mut game = setup_game(1);
        game.world.apply(
            game.marble,
            &BodyCommand::ApplyImpulse {
                impulse: Vec3::new(0.3, 0.2, -0.4),
            },
        );
        game.tick(PHYSICS_DT, &InputSnapshot::default());

        game.start();
        game.restart();
        let marble = game.marble().unwrap();
        assert_eq!(marble.translation, Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(marble.linvel, Vec3::ZERO);
    }
}
