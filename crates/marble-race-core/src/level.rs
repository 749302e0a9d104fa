//! Seeded procedural course generation.
//!
//! A course is a straight line of fixed-size segments: a start pad, a number
//! of obstacle segments drawn from a catalog, and an end pad. Segment `i`
//! sits at `z = -i * SEGMENT_SPACING`. Obstacle motion is a closed-form
//! function of time, so the same seed always yields the same course.

use std::f32::consts::TAU;

use glam::Vec3;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Distance between consecutive segments along -Z.
pub const SEGMENT_SPACING: f32 = 4.0;

/// Upper bound on interior segments for a single layout.
pub const MAX_SEGMENTS: i64 = 1024;

/// Obstacle kinds drawn when no catalog is configured.
pub const DEFAULT_CATALOG: [SegmentKind; 3] =
    [SegmentKind::Spinner, SegmentKind::Limbo, SegmentKind::Axe];

/// Error type for course generation.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LevelError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Axis-aligned box collider description in segment-local or world space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxSpec {
    pub center: Vec3,
    pub half_extents: Vec3,
    pub friction: f32,
    pub restitution: f32,
}

/// Kind of course segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    Start,
    /// A bar spinning about the vertical axis.
    Spinner,
    /// A bar bobbing up and down.
    Limbo,
    /// A block swinging left and right.
    Axe,
    End,
}

impl SegmentKind {
    /// Floor slab of the segment, relative to the segment origin.
    ///
    /// Layout data only: the world gets a single spanning floor from
    /// [`LevelLayout::bounds`].
    pub fn floor(self) -> BoxSpec {
        BoxSpec {
            center: Vec3::new(0.0, -0.1, 0.0),
            half_extents: Vec3::new(2.0, 0.1, 2.0),
            friction: 1.0,
            restitution: 0.2,
        }
    }

    /// Collider of the moving obstacle, if this kind has one.
    pub fn obstacle(self) -> Option<BoxSpec> {
        let half_extents = match self {
            Self::Start | Self::End => return None,
            Self::Spinner | Self::Limbo => Vec3::new(1.75, 0.15, 0.15),
            Self::Axe => Vec3::new(0.75, 0.75, 0.15),
        };
        Some(BoxSpec {
            center: Vec3::ZERO,
            half_extents,
            friction: 0.0,
            restitution: 0.2,
        })
    }

    /// Draws the per-instance motion parameters for this kind.
    fn draw_motion(self, rng: &mut ChaCha8Rng) -> Option<ObstacleMotion> {
        match self {
            Self::Start | Self::End => None,
            Self::Spinner => {
                let magnitude = rng.random::<f32>() + 0.2;
                let sign = if rng.random::<f32>() < 0.5 { -1.0 } else { 1.0 };
                Some(ObstacleMotion::Spinner {
                    speed: magnitude * sign,
                })
            }
            Self::Limbo => Some(ObstacleMotion::Limbo {
                time_offset: rng.random::<f32>() * TAU,
            }),
            Self::Axe => Some(ObstacleMotion::Axe {
                time_offset: rng.random::<f32>() * TAU,
            }),
        }
    }
}

/// Pose of an obstacle relative to its segment origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObstaclePose {
    pub translation: Vec3,
    /// Rotation about +Y in radians.
    pub yaw: f32,
}

/// Closed-form obstacle motion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObstacleMotion {
    Spinner { speed: f32 },
    Limbo { time_offset: f32 },
    Axe { time_offset: f32 },
}

impl ObstacleMotion {
    /// Pose at `t` seconds of simulation time.
    pub fn pose_at(&self, t: f32) -> ObstaclePose {
        match *self {
            Self::Spinner { speed } => ObstaclePose {
                translation: Vec3::new(0.0, 0.3, 0.0),
                yaw: t * speed,
            },
            Self::Limbo { time_offset } => ObstaclePose {
                translation: Vec3::new(0.0, (t + time_offset).sin() + 1.15, 0.0),
                yaw: 0.0,
            },
            Self::Axe { time_offset } => ObstaclePose {
                translation: Vec3::new((t + time_offset).sin() * 1.25, 0.75, 0.0),
                yaw: 0.0,
            },
        }
    }
}

/// One placed segment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub kind: SegmentKind,
    pub index: usize,
    pub offset_z: f32,
    pub motion: Option<ObstacleMotion>,
}

impl Segment {
    /// World-space origin of the segment.
    pub fn origin(&self) -> Vec3 {
        Vec3::new(0.0, 0.0, self.offset_z)
    }

    /// World-space floor collider.
    pub fn floor(&self) -> BoxSpec {
        let mut floor = self.kind.floor();
        floor.center += self.origin();
        floor
    }

    /// World-space obstacle pose at `t`, if the segment has an obstacle.
    pub fn obstacle_pose_at(&self, t: f32) -> Option<ObstaclePose> {
        self.motion.map(|motion| {
            let mut pose = motion.pose_at(t);
            pose.translation += self.origin();
            pose
        })
    }
}

/// Fixed colliders enclosing the whole course.
#[derive(Debug, Clone, PartialEq)]
pub struct CourseBounds {
    pub floor: BoxSpec,
    pub walls: Vec<BoxSpec>,
}

/// Generated course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelLayout {
    pub seed: u64,
    pub spacing: f32,
    pub segments: Vec<Segment>,
}

impl LevelLayout {
    /// Total number of segments, start and end included.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of obstacle slots between start and end.
    pub fn segment_count(&self) -> usize {
        self.segments.len().saturating_sub(2)
    }

    /// Z of the end segment's origin.
    #[allow(clippy::cast_precision_loss)]
    pub fn finish_z(&self) -> f32 {
        -((self.segment_count() + 1) as f32) * self.spacing
    }

    /// Z the marble must pass (moving towards -Z) to finish.
    ///
    /// This is the leading edge of the end segment.
    pub fn finish_threshold_z(&self) -> f32 {
        self.finish_z() + self.spacing / 2.0
    }

    /// Iterates over the segments that carry an obstacle.
    pub fn obstacles(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter().filter(|segment| segment.motion.is_some())
    }

    /// Floor and walls spanning the whole course.
    #[allow(clippy::cast_precision_loss)]
    pub fn bounds(&self) -> CourseBounds {
        let length = self.segments.len() as f32;
        let half_length = length * self.spacing / 2.0;
        let center_z = -half_length + self.spacing / 2.0;

        let wall = |center: Vec3, half_extents: Vec3| BoxSpec {
            center,
            half_extents,
            friction: 0.0,
            restitution: 0.2,
        };

        CourseBounds {
            floor: BoxSpec {
                center: Vec3::new(0.0, -0.1, center_z),
                half_extents: Vec3::new(2.0, 0.1, half_length),
                friction: 1.0,
                restitution: 0.2,
            },
            walls: vec![
                wall(Vec3::new(2.15, 0.75, center_z), Vec3::new(0.15, 0.75, half_length)),
                wall(Vec3::new(-2.15, 0.75, center_z), Vec3::new(0.15, 0.75, half_length)),
                wall(
                    Vec3::new(0.0, 0.75, -length * self.spacing + self.spacing / 2.0),
                    Vec3::new(2.0, 0.75, 0.15),
                ),
            ],
        }
    }
}

/// Checks the generator arguments without generating anything.
pub fn check_params(segment_count: i64, catalog: &[SegmentKind]) -> Result<(), LevelError> {
    if segment_count < 0 {
        return Err(LevelError::InvalidConfiguration(format!(
            "segment count must not be negative, got {segment_count}"
        )));
    }
    if segment_count > MAX_SEGMENTS {
        return Err(LevelError::InvalidConfiguration(format!(
            "segment count must be at most {MAX_SEGMENTS}, got {segment_count}"
        )));
    }
    if catalog.is_empty() {
        return Err(LevelError::InvalidConfiguration(
            "segment catalog must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Generates a course with `segment_count` obstacle segments drawn uniformly
/// from `catalog`.
///
/// The same arguments always produce the same layout.
pub fn generate(
    segment_count: i64,
    catalog: &[SegmentKind],
    seed: u64,
) -> Result<LevelLayout, LevelError> {
    check_params(segment_count, catalog)?;

    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let count = segment_count as usize;
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let mut kinds = Vec::with_capacity(count + 2);
    kinds.push((SegmentKind::Start, None));
    for _ in 0..count {
        let kind = catalog[rng.random_range(0..catalog.len())];
        let motion = kind.draw_motion(&mut rng);
        kinds.push((kind, motion));
    }
    kinds.push((SegmentKind::End, None));

    #[allow(clippy::cast_precision_loss)]
    let segments = kinds
        .into_iter()
        .enumerate()
        .map(|(index, (kind, motion))| Segment {
            kind,
            index,
            offset_z: -(index as f32) * SEGMENT_SPACING,
            motion,
        })
        .collect();

    tracing::debug!(seed, segment_count, "generated course layout");

    Ok(LevelLayout {
        seed,
        spacing: SEGMENT_SPACING,
        segments,
    })
}
