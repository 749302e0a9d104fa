//! Race configuration loaded from JSON.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::gravity::DEFAULT_GRAVITY_MAGNITUDE;
use crate::level::{DEFAULT_CATALOG, LevelError, SegmentKind, check_params};
use crate::physics::PHYSICS_DT;
use crate::player::ControllerTuning;

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Level(#[from] LevelError),
    #[error("invalid physics settings: {0}")]
    Physics(String),
}

/// World-level physics settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsTuning {
    pub gravity_magnitude: f32,
    /// Fixed step used by hosts that run at a constant rate.
    pub dt: f32,
}

impl Default for PhysicsTuning {
    fn default() -> Self {
        Self {
            gravity_magnitude: DEFAULT_GRAVITY_MAGNITUDE,
            dt: PHYSICS_DT,
        }
    }
}

/// Loose dynamic props scattered on the start pad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PropsConfig {
    pub count: usize,
}

/// Complete race configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaceConfig {
    /// Seed of the first level; later levels derive from it.
    pub seed: u64,
    /// Obstacle segments between start and end.
    pub segment_count: i64,
    /// Obstacle kinds drawn for each segment.
    pub catalog: Vec<SegmentKind>,
    pub physics: PhysicsTuning,
    pub player: ControllerTuning,
    pub props: PropsConfig,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            segment_count: 3,
            catalog: DEFAULT_CATALOG.to_vec(),
            physics: PhysicsTuning::default(),
            player: ControllerTuning::default(),
            props: PropsConfig::default(),
        }
    }
}

impl RaceConfig {
    /// Parses a configuration; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reads and parses a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Checks every setting a race needs without building one.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_params(self.segment_count, &self.catalog)?;

        let PhysicsTuning { gravity_magnitude, dt } = self.physics;
        if dt.is_nan() || dt <= 0.0 {
            return Err(ConfigError::Physics(format!("step must be positive, got {dt}")));
        }
        if !gravity_magnitude.is_finite() {
            return Err(ConfigError::Physics(format!(
                "gravity magnitude must be finite, got {gravity_magnitude}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::level::MAX_SEGMENTS;

    const CLASSIC: &str = include_str!("../courses/classic.json");

    #[test]
    fn test_classic_course() {
        let config = RaceConfig::from_json(CLASSIC).unwrap();
        assert_eq!(config.segment_count, 5);
        assert_eq!(config.catalog, DEFAULT_CATALOG.to_vec());
        assert_eq!(config.player.start_position, Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(config.props.count, 12);
    }

    #[test]
    fn test_missing_fields_default() {
        let config = RaceConfig::from_json(r#"{"seed": 8}"#).unwrap();
        assert_eq!(config.seed, 8);
        assert_eq!(config.segment_count, 3);
        assert_eq!(config.player, ControllerTuning::default());
    }

    #[test]
    fn test_json_roundtrip() {
        let config = RaceConfig::default();
        let json = config.to_json().unwrap();
        assert_eq!(RaceConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            RaceConfig::from_json(r#"{"segment_count": -2}"#),
            Err(ConfigError::Level(LevelError::InvalidConfiguration(_)))
        ));
        assert!(matches!(
            RaceConfig::from_json(r#"{"catalog": []}"#),
            Err(ConfigError::Level(LevelError::InvalidConfiguration(_)))
        ));
        assert!(matches!(
            RaceConfig::from_json(r#"{"catalog": ["teapot"]}"#),
            Err(ConfigError::Json(_))
        ));
        assert!(matches!(
            RaceConfig::from_json(r#"{"physics": {"dt": 0.0}}"#),
            Err(ConfigError::Physics(_))
        ));
    }

    #[test]
    fn test_segment_count_above_limit() {
        let result = RaceConfig::from_json(r#"{"segment_count": 5000}"#);
        assert!(matches!(
            result,
            Err(ConfigError::Level(LevelError::InvalidConfiguration(_)))
        ));

        let at_limit = format!(r#"{{"segment_count": {MAX_SEGMENTS}}}"#);
        assert!(RaceConfig::from_json(&at_limit).is_ok());
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            RaceConfig::load("/nonexistent/marble-race.json"),
            Err(ConfigError::Io(_))
        ));
    }
}
