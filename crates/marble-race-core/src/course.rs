//! Builds a generated layout into a physics world.

use glam::Vec3;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rapier3d::prelude::*;

use crate::level::{BoxSpec, LevelLayout};
use crate::physics::{PhysicsWorld, to_vector};
use crate::player::ControllerTuning;

/// Handles of everything spawned for one course.
#[derive(Debug, Clone, Default)]
pub struct CourseBodies {
    /// Floor slab spanning every segment.
    pub floor: Option<RigidBodyHandle>,
    pub walls: Vec<RigidBodyHandle>,
    /// Obstacle bodies paired with the index of their segment.
    pub obstacles: Vec<(usize, RigidBodyHandle)>,
}

fn box_collider(spec: &BoxSpec) -> Collider {
    ColliderBuilder::cuboid(spec.half_extents.x, spec.half_extents.y, spec.half_extents.z)
        .friction(spec.friction)
        .restitution(spec.restitution)
        .build()
}

fn add_fixed_box(world: &mut PhysicsWorld, spec: &BoxSpec) -> RigidBodyHandle {
    let body = RigidBodyBuilder::fixed().translation(to_vector(spec.center)).build();
    let handle = world.add_rigid_body(body);
    world.add_collider(box_collider(spec), handle);
    handle
}

/// Spawns the course bounds and one kinematic body per obstacle, posed at
/// `t = 0`.
pub fn spawn_course(world: &mut PhysicsWorld, layout: &LevelLayout) -> CourseBodies {
    let mut bodies = CourseBodies::default();

    for segment in &layout.segments {
        let Some(spec) = segment.kind.obstacle() else {
            continue;
        };
        let Some(pose) = segment.obstacle_pose_at(0.0) else {
            continue;
        };
        let body = RigidBodyBuilder::kinematic_position_based()
            .position(Isometry::new(to_vector(pose.translation), vector![0.0, pose.yaw, 0.0]))
            .build();
        let handle = world.add_rigid_body(body);
        world.add_collider(box_collider(&spec), handle);
        bodies.obstacles.push((segment.index, handle));
    }

    let bounds = layout.bounds();
    bodies.floor = Some(add_fixed_box(world, &bounds.floor));
    for wall in &bounds.walls {
        bodies.walls.push(add_fixed_box(world, wall));
    }

    world.refresh_queries();

    tracing::debug!(
        seed = layout.seed,
        segments = layout.len(),
        obstacles = bodies.obstacles.len(),
        "course spawned"
    );
    bodies
}

/// Poses every obstacle for simulation time `t`.
pub fn animate(world: &mut PhysicsWorld, layout: &LevelLayout, bodies: &CourseBodies, t: f32) {
    for &(index, handle) in &bodies.obstacles {
        let pose = layout
            .segments
            .get(index)
            .and_then(|segment| segment.obstacle_pose_at(t));
        let Some(pose) = pose else {
            continue;
        };
        if let Some(body) = world.get_rigid_body_mut(handle) {
            body.set_next_kinematic_position(Isometry::new(
                to_vector(pose.translation),
                vector![0.0, pose.yaw, 0.0],
            ));
        }
    }
}

/// Removes every body of a course from the world.
pub fn despawn_course(world: &mut PhysicsWorld, bodies: CourseBodies) {
    let obstacles = bodies.obstacles.into_iter().map(|(_, handle)| handle);
    for handle in bodies.floor.into_iter().chain(bodies.walls).chain(obstacles) {
        world.remove_rigid_body(handle);
    }
}

/// Spawns the player marble at the start pose.
pub fn spawn_marble(world: &mut PhysicsWorld, tuning: &ControllerTuning) -> RigidBodyHandle {
    let body = RigidBodyBuilder::dynamic()
        .translation(to_vector(tuning.start_position))
        .linear_damping(0.5)
        .angular_damping(0.5)
        .ccd_enabled(true)
        .can_sleep(false)
        .build();
    let handle = world.add_rigid_body(body);

    let collider = ColliderBuilder::ball(tuning.ball_radius)
        .restitution(0.2)
        .friction(1.0)
        .density(1.0)
        .build();
    world.add_collider(collider, handle);
    handle
}

/// Scatters `count` loose cubes above the start pad.
///
/// Props may sleep; they are the bodies a gravity toggle has to wake.
pub fn spawn_props(world: &mut PhysicsWorld, count: usize, seed: u64) -> Vec<RigidBodyHandle> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut handles = Vec::with_capacity(count);

    for i in 0..count {
        #[allow(clippy::cast_precision_loss)]
        let position = Vec3::new(
            (rng.random::<f32>() - 0.5) * 3.0,
            2.0 + i as f32 * 0.2,
            (rng.random::<f32>() - 0.5) * 3.0,
        );
        let rotation = vector![rng.random::<f32>(), rng.random::<f32>(), rng.random::<f32>()];

        let body = RigidBodyBuilder::dynamic()
            .position(Isometry::new(to_vector(position), rotation))
            .build();
        let handle = world.add_rigid_body(body);
        let collider = ColliderBuilder::cuboid(0.1, 0.1, 0.1)
            .restitution(0.5)
            .friction(0.7)
            .build();
        world.add_collider(collider, handle);
        world.watch_sleep(handle);
        handles.push(handle);
    }

    handles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::{DEFAULT_CATALOG, generate};
    use crate::physics::PHYSICS_DT;

    #[test]
    fn test_spawn_course_counts() {
        let layout = generate(3, &DEFAULT_CATALOG, 11).unwrap();
        let mut world = PhysicsWorld::new();

        let bodies = spawn_course(&mut world, &layout);

        // A single floor collider spans every segment
        assert!(bodies.floor.is_some());
        assert_eq!(bodies.walls.len(), 3);
        assert_eq!(bodies.obstacles.len(), 3);
        assert_eq!(world.rigid_body_set.len(), 7);
        assert_eq!(world.collider_set.len(), 7);
    }

    #[test]
    fn test_animate_moves_obstacles() {
        let layout = generate(4, &DEFAULT_CATALOG, 5).unwrap();
        let mut world = PhysicsWorld::new();
        let bodies = spawn_course(&mut world, &layout);

        animate(&mut world, &layout, &bodies, PHYSICS_DT);
        world.step(PHYSICS_DT);

        for &(index, handle) in &bodies.obstacles {
            let expected = layout.segments[index].obstacle_pose_at(PHYSICS_DT).unwrap();
            let snapshot = world.snapshot(handle).unwrap();
            assert!(snapshot.translation.distance(expected.translation) < 1e-4);
        }
    }

    #[test]
    fn test_despawn_course() {
        let layout = generate(2, &DEFAULT_CATALOG, 5).unwrap();
        let mut world = PhysicsWorld::new();
        let marble = spawn_marble(&mut world, &ControllerTuning::default());

        let bodies = spawn_course(&mut world, &layout);
        despawn_course(&mut world, bodies);

        assert_eq!(world.rigid_body_set.len(), 1);
        assert!(world.snapshot(marble).is_some());
    }

    #[test]
    fn test_marble_rests_on_start_pad() {
        let layout = generate(0, &DEFAULT_CATALOG, 1).unwrap();
        let mut world = PhysicsWorld::new();
        spawn_course(&mut world, &layout);
        let marble = spawn_marble(&mut world, &ControllerTuning::default());

        world.step_n(180);

        let snapshot = world.snapshot(marble).unwrap();
        assert!((snapshot.translation.y - 0.3).abs() < 0.02);
    }

    #[test]
    fn test_props_are_seeded() {
        let mut world1 = PhysicsWorld::new();
        let mut world2 = PhysicsWorld::new();

        let props1 = spawn_props(&mut world1, 5, 3);
        let props2 = spawn_props(&mut world2, 5, 3);

        for (a, b) in props1.iter().zip(&props2) {
            assert_eq!(world1.snapshot(*a), world2.snapshot(*b));
        }
    }
}
