//! Engine configuration
//!
//! Every field has a default so a config file only needs to name what it
//! changes. Files are JSON:
//!
//! ```json
//! {
//!     "warmup_delay_ms": 15000,
//!     "interval": { "min_ms": 20000, "max_ms": 45000 },
//!     "weights": { "beneficial": 50, "detrimental": 35, "chaotic": 15 },
//!     "animation": { "freeze_on_full": false }
//! }
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use shared::Category;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Master switch for the whole roulette.
    pub enabled: bool,
    /// Whether the scheduler fires rolls on its own.
    pub auto_trigger: bool,
    /// No automatic roll fires before this much of the session has passed.
    pub warmup_delay_ms: u64,
    pub interval: IntervalConfig,
    /// Chance (0-100) that a roll targets every participant.
    pub all_participants_weight: f64,
    pub weights: CategoryWeights,
    /// How many recent single targets are skipped when picking a new one.
    pub recent_target_cooldown: usize,
    /// Lifetime of an applied effect, unless its power level means a duration.
    pub effect_duration_ms: u64,
    /// How far the next roll is pushed back while an effect is still active.
    pub active_effect_postpone_ms: u64,
    pub animation: AnimationConfig,
    /// Session seed. Random when absent.
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_trigger: true,
            warmup_delay_ms: 10_000,
            interval: IntervalConfig::default(),
            all_participants_weight: 15.0,
            weights: CategoryWeights::default(),
            recent_target_cooldown: 2,
            effect_duration_ms: 30_000,
            active_effect_postpone_ms: 5_000,
            animation: AnimationConfig::default(),
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntervalConfig {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl Default for IntervalConfig {
    fn default() -> Self {
        Self {
            min_ms: 30_000,
            max_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryWeights {
    pub beneficial: f64,
    pub detrimental: f64,
    pub chaotic: f64,
}

impl Default for CategoryWeights {
    fn default() -> Self {
        Self {
            beneficial: 40.0,
            detrimental: 45.0,
            chaotic: 15.0,
        }
    }
}

impl CategoryWeights {
    pub fn weight(&self, category: Category) -> f64 {
        match category {
            Category::Beneficial => self.beneficial,
            Category::Detrimental => self.detrimental,
            Category::Chaotic => self.chaotic,
        }
    }

    pub fn total(&self) -> f64 {
        self.beneficial + self.detrimental + self.chaotic
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    pub full_duration_ms: u64,
    pub quick_duration_ms: u64,
    /// Freeze every participant while a full reveal plays.
    pub freeze_on_full: bool,
    /// Play the full reveal for every roll, not just the first.
    pub always_full: bool,
    /// How late a reveal checkpoint may fire before it is skipped.
    pub checkpoint_window_ms: u64,
    /// Delay after a roll ends before lingering freezes are swept.
    pub safety_recheck_delay_ms: u64,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            full_duration_ms: 10_000,
            quick_duration_ms: 4_000,
            freeze_on_full: true,
            always_full: false,
            checkpoint_window_ms: 1_000,
            safety_recheck_delay_ms: 3_000,
        }
    }
}

impl EngineConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval.min_ms > self.interval.max_ms {
            return Err(ConfigError::Invalid(format!(
                "interval.min_ms ({}) is greater than interval.max_ms ({})",
                self.interval.min_ms, self.interval.max_ms
            )));
        }
        if !(0.0..=100.0).contains(&self.all_participants_weight) {
            return Err(ConfigError::Invalid(format!(
                "all_participants_weight must be within 0-100, got {}",
                self.all_participants_weight
            )));
        }
        let weights = [
            self.weights.beneficial,
            self.weights.detrimental,
            self.weights.chaotic,
        ];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(ConfigError::Invalid(
                "category weights must be finite and non-negative".to_string(),
            ));
        }
        if self.weights.total() <= 0.0 {
            return Err(ConfigError::Invalid(
                "at least one category weight must be positive".to_string(),
            ));
        }
        if self.animation.full_duration_ms == 0 || self.animation.quick_duration_ms == 0 {
            return Err(ConfigError::Invalid(
                "animation durations must be positive".to_string(),
            ));
        }
        if self.effect_duration_ms == 0 {
            return Err(ConfigError::Invalid(
                "effect_duration_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
