//! Power levels and how each effect interprets them

use crate::error::ValidationError;

/// One of the five fixed intensity steps, mild to extreme.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerLevel {
    pub index: u8,
    pub multiplier: f64,
    pub default_interval_ms: u64,
    pub label: &'static str,
}

impl PowerLevel {
    pub const ALL: [PowerLevel; 5] = [
        PowerLevel {
            index: 1,
            multiplier: 1.25,
            default_interval_ms: 10_000,
            label: "Mild",
        },
        PowerLevel {
            index: 2,
            multiplier: 1.5,
            default_interval_ms: 8_000,
            label: "Moderate",
        },
        PowerLevel {
            index: 3,
            multiplier: 2.0,
            default_interval_ms: 6_000,
            label: "Strong",
        },
        PowerLevel {
            index: 4,
            multiplier: 2.5,
            default_interval_ms: 4_000,
            label: "Intense",
        },
        PowerLevel {
            index: 5,
            multiplier: 3.0,
            default_interval_ms: 2_000,
            label: "Extreme",
        },
    ];

    pub fn from_index(index: u8) -> Result<PowerLevel, ValidationError> {
        if (1..=5).contains(&index) {
            Ok(Self::ALL[(index - 1) as usize])
        } else {
            Err(ValidationError::PowerOutOfRange(index))
        }
    }
}

/// Strategy turning a power level into the quantity a handler needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PowerMeaning {
    Multiplier,
    /// Milliseconds between recurring actions. Without an override table
    /// the level's default interval is used.
    Interval(Option<[u64; 5]>),
    Percentage,
    Inverse,
    /// Effect lifetime in milliseconds: multiplier times `base_ms`, capped.
    Duration { base_ms: u64, cap_ms: u64 },
    /// Power level is cosmetic.
    Fixed,
}

impl PowerMeaning {
    pub fn resolve(&self, level: PowerLevel) -> f64 {
        let m = level.multiplier;
        match self {
            PowerMeaning::Multiplier => m,
            PowerMeaning::Interval(Some(table)) => table[(level.index - 1) as usize] as f64,
            PowerMeaning::Interval(None) => level.default_interval_ms as f64,
            PowerMeaning::Percentage => ((m - 1.0) / 2.0) * 100.0,
            PowerMeaning::Inverse => 1.0 / m,
            PowerMeaning::Duration { base_ms, cap_ms } => (m * *base_ms as f64).min(*cap_ms as f64),
            PowerMeaning::Fixed => 1.0,
        }
    }
}
