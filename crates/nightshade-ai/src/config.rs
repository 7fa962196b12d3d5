//! Per-antagonist behavior configuration.
//!
//! Every threshold and weight used by the behaviors lives here, so each
//! antagonist can be tuned from a TOML file without touching code.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use glam::Vec3;
use nightshade_common::{ConfigError, LayerMask};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::state_machine::BehaviorKind;

/// Closed range of floats, used for randomized durations and score bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FloatRange {
    /// Lower bound
    pub min: f32,
    /// Upper bound
    pub max: f32,
}

impl FloatRange {
    /// Creates a new range.
    #[must_use]
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Draws a uniform sample from the range.
    pub fn sample(&self, rng: &mut fastrand::Rng) -> f32 {
        self.min + (self.max - self.min) * rng.f32()
    }

    /// Returns true when `min <= max` and both are finite.
    #[must_use]
    pub fn is_ordered(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min <= self.max
    }

    fn sorted(self) -> Self {
        if self.min <= self.max {
            self
        } else {
            Self::new(self.max, self.min)
        }
    }
}

/// How chase changes the agent's speed on entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value", rename_all = "snake_case")]
pub enum SpeedModifier {
    /// Replace movement speed with a fixed value; animation rate is untouched
    Static(f32),
    /// Scale both movement speed and animation rate
    Multiplier(f32),
}

impl SpeedModifier {
    fn value(self) -> f32 {
        match self {
            Self::Static(v) | Self::Multiplier(v) => v,
        }
    }
}

/// Which pursuit strategy the chase behavior runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChaseStrategy {
    /// Pursue while the target is remembered; give up after waiting at its last known position
    Memory,
    /// Same fallback, but give up once a fixed time budget is spent
    Timed,
}

/// Owner-level settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AntagonistConfig {
    /// Behavior entered at setup
    pub start_behavior: BehaviorKind,
    /// Fallback order used when a behavior gives up
    pub fallback_priority: Vec<BehaviorKind>,
    /// Switch to chase as soon as the target is sighted
    pub chase_on_sight: bool,
    /// Seconds after a give-up before sighting can re-engage chase
    pub reengage_cooldown: f32,
    /// Base movement speed
    pub base_speed: f32,
    /// Base animation playback rate
    pub base_animation_rate: f32,
    /// Half extents of the body used for visibility tests
    pub half_extents: Vec3,
    /// RNG seed (random when absent)
    pub seed: Option<u64>,
}

impl Default for AntagonistConfig {
    fn default() -> Self {
        Self {
            start_behavior: BehaviorKind::Search,
            fallback_priority: vec![BehaviorKind::Stalk, BehaviorKind::Search, BehaviorKind::Idle],
            chase_on_sight: true,
            reengage_cooldown: 3.0,
            base_speed: 3.5,
            base_animation_rate: 1.0,
            half_extents: Vec3::new(0.4, 1.0, 0.4),
            seed: None,
        }
    }
}

/// Target acquisition settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Seconds without a resolved target before `TargetNotFound` is raised
    pub target_timeout: f32,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            target_timeout: 5.0,
        }
    }
}

/// Waypoint navigation and sampling settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    /// Initial candidate count for sequential waypoint selection
    pub sequential_max_waypoints: usize,
    /// Largest candidate count the forward-progress widening may reach
    pub sequential_widen_cap: usize,
    /// Weight of the heading angle (degrees) in sequential selection
    pub heading_weight: f32,
    /// Weight of the waypoint-to-target distance in sequential selection
    pub goal_distance_weight: f32,
    /// Minimum heading dot product for a waypoint to count as ahead
    pub forward_dot_threshold: f32,
    /// Random waypoints tried when a move target has no valid path
    pub move_retry_attempts: usize,
    /// Attempts for sampling a random point within range
    pub range_sample_attempts: usize,
    /// Attempts for sampling a random point on the whole navmesh
    pub navmesh_sample_attempts: usize,
    /// Layers counted as cover
    pub cover_mask: LayerMask,
    /// Layers that block line of movement for occlusion checks
    pub obstacle_mask: LayerMask,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            sequential_max_waypoints: 4,
            sequential_widen_cap: 10,
            heading_weight: 0.4,
            goal_distance_weight: 2.75,
            forward_dot_threshold: 0.3,
            move_retry_attempts: 35,
            range_sample_attempts: 100,
            navmesh_sample_attempts: 64,
            cover_mask: LayerMask::COVER,
            obstacle_mask: LayerMask::COVER.union(LayerMask::OBSTACLE),
        }
    }
}

/// Chase settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChaseConfig {
    /// Pursuit strategy
    pub strategy: ChaseStrategy,
    /// Speed change applied on entry
    pub speed: SpeedModifier,
    /// Hard budget for the timed strategy
    pub max_chase_time: f32,
    /// Seconds spent at the last known position before giving up
    pub wait_threshold: f32,
    /// Distance at which the last known position counts as reached
    pub last_known_radius: f32,
}

impl Default for ChaseConfig {
    fn default() -> Self {
        Self {
            strategy: ChaseStrategy::Memory,
            speed: SpeedModifier::Multiplier(1.5),
            max_chase_time: 15.0,
            wait_threshold: 7.0,
            last_known_radius: 1.5,
        }
    }
}

/// Per-factor weights of the stalk score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StalkWeights {
    /// Hidden from the target's view
    pub visibility: f32,
    /// Behind cover from the target's viewpoint
    pub cover: f32,
    /// Reachable without crossing the target
    pub low_exposure: f32,
    /// Close to the target
    pub proximity: f32,
    /// Where the target is heading or looking
    pub ambush: f32,
}

impl Default for StalkWeights {
    fn default() -> Self {
        Self {
            visibility: 1.0,
            cover: 1.0,
            low_exposure: 0.8,
            proximity: 1.0,
            ambush: 0.7,
        }
    }
}

/// Stalk scoring and movement settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StalkConfig {
    /// Waypoints around the target scored per reposition
    pub candidate_count: usize,
    /// Only consider waypoints hidden from view and behind cover
    pub hidden_repositioning: bool,
    /// Seconds of stalking before switching to aggressive mode
    pub aggressive_after: f32,
    /// Factor weights
    pub weights: StalkWeights,
    /// Gain on visibility, cover and exposure while passive
    pub passive_multiplier: f32,
    /// Gain on proximity and ambush while aggressive
    pub aggressive_multiplier: f32,
    /// Visibility sub-score for a waypoint outside the target's view
    pub not_visible_score: f32,
    /// Output range of the remapped sub-scores
    pub score_range: FloatRange,
    /// Distance at which proximity drops to the bottom of the range
    pub max_distance: f32,
    /// Minimum intent alignment for an ambush score
    pub ambush_threshold: f32,
    /// Minimum side alignment for an exposure score
    pub exposure_threshold: f32,
    /// Flat bonus for the candidate with the shortest path to the target
    pub shortest_path_bonus: f32,
    /// Probability of taking the best candidate instead of the runner-up
    pub highest_selection_weight: f32,
    /// Vertical offset of cover rays
    pub cover_ray_height: f32,
    /// Distance under which the antagonist holds still
    pub stop_radius: f32,
    /// Distance under which strategic teleports are allowed
    pub strategic_radius: f32,
    /// Seconds held near an unmoving target before forcing a reposition
    pub max_stopped_time: f32,
    /// Pause between moves
    pub pause_range: FloatRange,
    /// Attempts before a reposition falls back to a random waypoint
    pub reposition_attempts: usize,
}

impl Default for StalkConfig {
    fn default() -> Self {
        Self {
            candidate_count: 6,
            hidden_repositioning: false,
            aggressive_after: 22.0,
            weights: StalkWeights::default(),
            passive_multiplier: 1.5,
            aggressive_multiplier: 1.5,
            not_visible_score: 1.0,
            score_range: FloatRange::new(0.0, 1.0),
            max_distance: 25.0,
            ambush_threshold: 0.1,
            exposure_threshold: 0.05,
            shortest_path_bonus: 0.5,
            highest_selection_weight: 0.8,
            cover_ray_height: 0.5,
            stop_radius: 3.0,
            strategic_radius: 15.0,
            max_stopped_time: 5.0,
            pause_range: FloatRange::new(0.5, 1.5),
            reposition_attempts: 50,
        }
    }
}

/// Search settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Pause after reaching each destination
    pub pause_range: FloatRange,
    /// Radius for random navmesh destinations around the antagonist
    pub search_radius: f32,
    /// Chance of picking a random point instead of a waypoint
    pub random_point_chance: f32,
    /// Reject random points with an obstacle between antagonist and point
    pub check_occlusion: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            pause_range: FloatRange::new(1.0, 3.0),
            search_radius: 12.0,
            random_point_chance: 0.3,
            check_occlusion: true,
        }
    }
}

/// Flee settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FleeConfig {
    /// How many of the farthest waypoints to choose from
    pub farthest_count: usize,
    /// Minimum distance for navmesh fallback destinations
    pub min_flee_distance: f32,
}

impl Default for FleeConfig {
    fn default() -> Self {
        Self {
            farthest_count: 3,
            min_flee_distance: 15.0,
        }
    }
}

/// Complete behavior configuration of one antagonist.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Owner settings
    pub antagonist: AntagonistConfig,
    /// Target acquisition
    pub acquisition: AcquisitionConfig,
    /// Waypoint navigation
    pub navigation: NavigationConfig,
    /// Chase
    pub chase: ChaseConfig,
    /// Stalk
    pub stalk: StalkConfig,
    /// Search
    pub search: SearchConfig,
    /// Flee
    pub flee: FleeConfig,
}

impl BehaviorConfig {
    /// Parses and checks a TOML document.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.check()?;
        Ok(config)
    }

    /// Loads configuration from a file.
    /// Returns defaults if the file is missing or invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Behavior config not found at {}, using defaults", path.display());
            return Self::default();
        }

        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to read behavior config: {e}");
                return Self::default();
            },
        };

        match Self::parse(&text) {
            Ok(config) => {
                info!("Loaded behavior config from {}", path.display());
                config
            },
            Err(e) => {
                warn!("Rejected behavior config: {e}");
                Self::default()
            },
        }
    }

    /// Saves configuration to a file.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let mut file = fs::File::create(path)?;
        file.write_all(contents.as_bytes())?;

        info!("Saved behavior config to {}", path.display());
        Ok(())
    }

    /// Rejects values that indicate a configuration mistake.
    pub fn check(&self) -> Result<(), ConfigError> {
        let stalk = &self.stalk;
        let nav = &self.navigation;

        if !(0.0..=1.0).contains(&stalk.highest_selection_weight) {
            return Err(ConfigError::invalid(
                "stalk.highest_selection_weight",
                "must be within [0, 1]",
            ));
        }
        if stalk.candidate_count == 0 {
            return Err(ConfigError::invalid("stalk.candidate_count", "must be at least 1"));
        }
        if !stalk.pause_range.is_ordered() || stalk.pause_range.min < 0.0 {
            return Err(ConfigError::invalid(
                "stalk.pause_range",
                "min must be non-negative and not above max",
            ));
        }
        if !stalk.score_range.is_ordered() {
            return Err(ConfigError::invalid("stalk.score_range", "min must not exceed max"));
        }
        if stalk.max_distance <= 0.0 {
            return Err(ConfigError::invalid("stalk.max_distance", "must be positive"));
        }
        if stalk.stop_radius > stalk.strategic_radius {
            return Err(ConfigError::invalid(
                "stalk.stop_radius",
                "must not exceed stalk.strategic_radius",
            ));
        }
        if !self.search.pause_range.is_ordered() || self.search.pause_range.min < 0.0 {
            return Err(ConfigError::invalid(
                "search.pause_range",
                "min must be non-negative and not above max",
            ));
        }
        if !(0.0..=1.0).contains(&self.search.random_point_chance) {
            return Err(ConfigError::invalid(
                "search.random_point_chance",
                "must be within [0, 1]",
            ));
        }
        if nav.sequential_max_waypoints == 0
            || nav.sequential_max_waypoints > nav.sequential_widen_cap
        {
            return Err(ConfigError::invalid(
                "navigation.sequential_max_waypoints",
                "must be within [1, navigation.sequential_widen_cap]",
            ));
        }
        if self.acquisition.target_timeout <= 0.0 {
            return Err(ConfigError::invalid("acquisition.target_timeout", "must be positive"));
        }
        if self.chase.speed.value() <= 0.0 {
            return Err(ConfigError::invalid("chase.speed", "must be positive"));
        }
        let weights = stalk.weights;
        if ![
            weights.visibility,
            weights.cover,
            weights.low_exposure,
            weights.proximity,
            weights.ambush,
            stalk.passive_multiplier,
            stalk.aggressive_multiplier,
        ]
        .iter()
        .all(|w| w.is_finite())
        {
            return Err(ConfigError::invalid("stalk.weights", "must be finite"));
        }
        Ok(())
    }

    /// Clamps values to sensible ranges.
    pub fn validate(&mut self) {
        // Probabilities
        self.stalk.highest_selection_weight = self.stalk.highest_selection_weight.clamp(0.0, 1.0);
        self.search.random_point_chance = self.search.random_point_chance.clamp(0.0, 1.0);

        // Counts
        self.stalk.candidate_count = self.stalk.candidate_count.max(1);
        self.stalk.reposition_attempts = self.stalk.reposition_attempts.max(1);
        self.navigation.sequential_widen_cap = self.navigation.sequential_widen_cap.max(1);
        self.navigation.sequential_max_waypoints = self
            .navigation
            .sequential_max_waypoints
            .clamp(1, self.navigation.sequential_widen_cap);

        // Ranges
        self.stalk.pause_range = self.stalk.pause_range.sorted();
        self.stalk.pause_range.min = self.stalk.pause_range.min.max(0.0);
        self.stalk.score_range = self.stalk.score_range.sorted();
        self.search.pause_range = self.search.pause_range.sorted();
        self.search.pause_range.min = self.search.pause_range.min.max(0.0);

        // Distances
        self.stalk.max_distance = self.stalk.max_distance.max(0.1);
        self.stalk.stop_radius = self.stalk.stop_radius.min(self.stalk.strategic_radius);
        self.acquisition.target_timeout = self.acquisition.target_timeout.max(0.1);
    }
}
