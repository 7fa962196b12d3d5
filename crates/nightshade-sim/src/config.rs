//! Simulation configuration.
//!
//! One TOML file describes the arena, the scripted target and the
//! antagonist's behavior tuning. Missing sections fall back to defaults.

use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

use glam::Vec3;
use nightshade_ai::BehaviorConfig;
use nightshade_common::LayerMask;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Configuration file name.
pub const CONFIG_FILE: &str = "nightshade.toml";

/// Box placed in the arena.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WallConfig {
    /// Box center
    pub center: Vec3,
    /// Half size on each axis
    pub extents: Vec3,
    /// Collision layer
    pub layer: LayerMask,
}

impl WallConfig {
    /// A cover box standing on the floor.
    #[must_use]
    pub fn cover(x: f32, z: f32, half_width: f32, half_depth: f32) -> Self {
        Self {
            center: Vec3::new(x, 1.0, z),
            extents: Vec3::new(half_width, 1.0, half_depth),
            layer: LayerMask::COVER,
        }
    }
}

/// The scripted target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Walking speed
    pub speed: f32,
    /// Eye height above the floor
    pub eye_height: f32,
    /// Restart the route after the last point
    pub looping: bool,
    /// Seconds after which the target disappears
    pub despawn_after: Option<f32>,
    /// Vertical field of view in degrees
    pub fov_degrees: f32,
    /// Viewport aspect ratio
    pub aspect: f32,
    /// Near clip distance
    pub near: f32,
    /// Far clip distance
    pub far: f32,
    /// Points walked in order, starting at the first
    pub route: Vec<Vec3>,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            speed: 1.8,
            eye_height: 1.7,
            looping: true,
            despawn_after: None,
            fov_degrees: 60.0,
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 40.0,
            route: vec![
                Vec3::new(-12.0, 0.0, -12.0),
                Vec3::new(12.0, 0.0, -12.0),
                Vec3::new(12.0, 0.0, 12.0),
                Vec3::new(-12.0, 0.0, 12.0),
            ],
        }
    }
}

/// Simulation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    // === Clock ===
    /// Simulated seconds
    pub duration: f32,
    /// Frame length in seconds
    pub frame_dt: f32,
    /// Physics step length in seconds
    pub fixed_dt: f32,

    // === Arena ===
    /// Half the side length of the square floor
    pub arena_half_size: f32,
    /// Antagonist spawn point
    pub spawn: Vec3,
    /// Antagonist eye height above the floor
    pub eye_height: f32,
    /// Farthest distance at which the antagonist can sight the target
    pub sight_range: f32,
    /// Level waypoints
    pub waypoints: Vec<Vec3>,
    /// Walls and cover boxes
    pub walls: Vec<WallConfig>,

    // === Actors ===
    /// Scripted target
    pub target: TargetConfig,
    /// Antagonist tuning
    pub behavior: BehaviorConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        let mut waypoints = Vec::new();
        for x in [-16.0, -8.0, 0.0, 8.0, 16.0] {
            for z in [-16.0, -8.0, 0.0, 8.0, 16.0] {
                waypoints.push(Vec3::new(x, 0.0, z));
            }
        }

        Self {
            // Clock
            duration: 120.0,
            frame_dt: 1.0 / 30.0,
            fixed_dt: 1.0 / 60.0,

            // Arena
            arena_half_size: 20.0,
            spawn: Vec3::new(16.0, 0.0, 16.0),
            eye_height: 1.6,
            sight_range: 18.0,
            waypoints,
            walls: vec![
                WallConfig::cover(-4.0, -4.0, 1.5, 0.5),
                WallConfig::cover(4.0, 4.0, 0.5, 1.5),
                WallConfig::cover(-10.0, 6.0, 2.0, 0.5),
                WallConfig::cover(10.0, -6.0, 0.5, 2.0),
                WallConfig {
                    center: Vec3::new(0.0, 1.5, 12.0),
                    extents: Vec3::new(3.0, 1.5, 0.25),
                    layer: LayerMask::OBSTACLE,
                },
            ],

            // Actors
            target: TargetConfig::default(),
            behavior: BehaviorConfig::default(),
        }
    }
}

impl SimConfig {
    /// Load configuration from a specific path.
    /// Returns default config if file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file not found, using defaults");
            return Self::default();
        }

        match fs::File::open(path) {
            Ok(mut file) => {
                let mut contents = String::new();
                if let Err(e) = file.read_to_string(&mut contents) {
                    warn!("Failed to read config file: {e}");
                    return Self::default();
                }

                match toml::from_str(&contents) {
                    Ok(config) => {
                        info!("Loaded config from {}", path.display());
                        config
                    },
                    Err(e) => {
                        warn!("Failed to parse config file: {e}");
                        Self::default()
                    },
                }
            },
            Err(e) => {
                warn!("Failed to open config file: {e}");
                Self::default()
            },
        }
    }

    /// Save configuration to a specific path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let mut file = fs::File::create(path)?;
        file.write_all(contents.as_bytes())?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Validate and clamp configuration values to sensible ranges.
    pub fn validate(&mut self) {
        // Clock
        self.duration = self.duration.max(0.0);
        self.frame_dt = self.frame_dt.clamp(0.001, 0.25);
        self.fixed_dt = self.fixed_dt.clamp(0.001, 0.1);

        // Arena
        self.arena_half_size = self.arena_half_size.clamp(1.0, 1000.0);
        let half = self.arena_half_size;
        self.spawn = Vec3::new(
            self.spawn.x.clamp(-half, half),
            0.0,
            self.spawn.z.clamp(-half, half),
        );
        self.eye_height = self.eye_height.max(0.0);
        self.sight_range = self.sight_range.max(0.0);
        self.walls.retain(|wall| wall.extents.min_element() > 0.0);

        // Target
        self.target.speed = self.target.speed.max(0.0);
        self.target.eye_height = self.target.eye_height.max(0.0);
        self.target.fov_degrees = self.target.fov_degrees.clamp(1.0, 179.0);
        self.target.aspect = self.target.aspect.max(0.1);
        self.target.near = self.target.near.max(0.01);
        self.target.far = self.target.far.max(self.target.near + 0.01);

        self.behavior.validate();
    }

    /// Number of frames covering `duration`.
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        (self.duration / self.frame_dt).round() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nightshade_ai::{BehaviorKind, ChaseStrategy};
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = SimConfig::default();
        assert_eq!(config.waypoints.len(), 25);
        assert_eq!(config.target.route.len(), 4);
        assert_eq!(config.frame_count(), 3600);
        assert!(config.behavior.check().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = SimConfig::default();
        config.frame_dt = 5.0;
        config.spawn = Vec3::new(100.0, 3.0, -100.0);
        config.target.fov_degrees = 0.0;
        config.walls.push(WallConfig {
            center: Vec3::ZERO,
            extents: Vec3::new(1.0, 0.0, 1.0),
            layer: LayerMask::COVER,
        });
        let wall_count = config.walls.len();

        config.validate();

        assert!((config.frame_dt - 0.25).abs() < f32::EPSILON);
        assert_eq!(config.spawn, Vec3::new(20.0, 0.0, -20.0));
        assert!((config.target.fov_degrees - 1.0).abs() < f32::EPSILON);
        assert_eq!(config.walls.len(), wall_count - 1);
    }

    #[test]
    fn test_config_save_load() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("sim.toml");

        let mut config = SimConfig::default();
        config.duration = 30.0;
        config.target.despawn_after = Some(12.0);
        config.behavior.chase.strategy = ChaseStrategy::Timed;
        config.behavior.antagonist.start_behavior = BehaviorKind::Stalk;
        config.behavior.antagonist.seed = Some(99);

        config.save_to(&config_path).expect("Failed to save config");

        let loaded = SimConfig::load_from(&config_path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_config_load_missing_file() {
        let config = SimConfig::load_from("/nonexistent/path/sim.toml");
        assert_eq!(config, SimConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: SimConfig = toml::from_str(
            r"
            duration = 10.0

            [target]
            route = [[0.0, 0.0, 5.0]]

            [behavior.antagonist]
            start_behavior = 'stalk'
            ",
        )
        .expect("valid toml");

        assert!((config.duration - 10.0).abs() < f32::EPSILON);
        assert_eq!(config.target.route, vec![Vec3::new(0.0, 0.0, 5.0)]);
        assert!((config.target.speed - 1.8).abs() < f32::EPSILON);
        assert_eq!(config.behavior.antagonist.start_behavior, BehaviorKind::Stalk);
        assert_eq!(config.waypoints.len(), 25);
    }

    #[test]
    fn test_sample_config_parses() {
        let config: SimConfig =
            toml::from_str(include_str!("../nightshade.toml")).expect("sample config");

        assert_eq!(config.waypoints.len(), 25);
        assert_eq!(config.walls.len(), 4);
        assert_eq!(config.walls[3].layer, LayerMask::OBSTACLE);
        assert_eq!(config.behavior.antagonist.seed, Some(1337));
        assert!((config.behavior.stalk.aggressive_after - 22.0).abs() < f32::EPSILON);
        assert!(config.behavior.check().is_ok());
    }
}
