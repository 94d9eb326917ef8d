//! Effect catalog
//!
//! The set of effects is closed: every effect is a variant of [`EffectId`],
//! its static definition comes from [`EffectId::definition`], and its handler
//! is picked by [`handlers::Handler::for_effect`]. Adding an effect means the
//! compiler walks you through every match that needs a new arm.

pub mod handlers;
pub mod power;
pub mod registry;

pub use handlers::{Handler, Snapshot};
pub use power::{PowerLevel, PowerMeaning};
pub use registry::{ApplyTargets, EffectRegistry};

use crate::error::ValidationError;
use shared::{Category, Target};
use std::str::FromStr;

/// Which targets an effect accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    SingleOnly,
    GlobalOnly,
    Either,
}

impl Scope {
    pub fn accepts(&self, target: Target) -> bool {
        match (self, target) {
            (Scope::Either, _) => true,
            (Scope::SingleOnly, Target::Participant(_)) => true,
            (Scope::GlobalOnly, Target::All) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EffectId {
    SpeedBoost,
    Regeneration,
    Vitality,
    IronSkin,
    Invulnerable,
    Slowness,
    Poison,
    Fragile,
    Butterfingers,
    HeavyGravity,
    FrozenFeet,
    LowGravity,
    TurboSession,
    ReversedControls,
    Jitter,
    MysteryWeapon,
    TeamSwap,
}

/// Immutable description of one effect.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectDefinition {
    pub id: EffectId,
    pub name: &'static str,
    pub description: &'static str,
    pub category: Category,
    pub scope: Scope,
    pub meaning: PowerMeaning,
    /// Represented by a single session-wide record instead of per-participant ones.
    pub is_global: bool,
    /// Not re-applied on respawn, because applying it causes a respawn.
    pub skip_reapply: bool,
}

impl EffectId {
    pub const ALL: [EffectId; 17] = [
        EffectId::SpeedBoost,
        EffectId::Regeneration,
        EffectId::Vitality,
        EffectId::IronSkin,
        EffectId::Invulnerable,
        EffectId::Slowness,
        EffectId::Poison,
        EffectId::Fragile,
        EffectId::Butterfingers,
        EffectId::HeavyGravity,
        EffectId::FrozenFeet,
        EffectId::LowGravity,
        EffectId::TurboSession,
        EffectId::ReversedControls,
        EffectId::Jitter,
        EffectId::MysteryWeapon,
        EffectId::TeamSwap,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            EffectId::SpeedBoost => "speed_boost",
            EffectId::Regeneration => "regeneration",
            EffectId::Vitality => "vitality",
            EffectId::IronSkin => "iron_skin",
            EffectId::Invulnerable => "invulnerable",
            EffectId::Slowness => "slowness",
            EffectId::Poison => "poison",
            EffectId::Fragile => "fragile",
            EffectId::Butterfingers => "butterfingers",
            EffectId::HeavyGravity => "heavy_gravity",
            EffectId::FrozenFeet => "frozen_feet",
            EffectId::LowGravity => "low_gravity",
            EffectId::TurboSession => "turbo_session",
            EffectId::ReversedControls => "reversed_controls",
            EffectId::Jitter => "jitter",
            EffectId::MysteryWeapon => "mystery_weapon",
            EffectId::TeamSwap => "team_swap",
        }
    }

    pub fn definition(&self) -> EffectDefinition {
        use Category::*;
        use Scope::*;

        let (name, description, category, scope, meaning) = match self {
            EffectId::SpeedBoost => (
                "Speed Boost",
                "Moves faster",
                Beneficial,
                Either,
                PowerMeaning::Multiplier,
            ),
            EffectId::Regeneration => (
                "Regeneration",
                "Heals a little on a timer",
                Beneficial,
                Either,
                PowerMeaning::Interval(Some([5_000, 4_000, 3_000, 2_000, 1_000])),
            ),
            EffectId::Vitality => (
                "Vitality",
                "Raises maximum health",
                Beneficial,
                Either,
                PowerMeaning::Percentage,
            ),
            EffectId::IronSkin => (
                "Iron Skin",
                "Takes less damage",
                Beneficial,
                Either,
                PowerMeaning::Inverse,
            ),
            EffectId::Invulnerable => (
                "Invulnerable",
                "Takes no damage for a short while",
                Beneficial,
                SingleOnly,
                PowerMeaning::Duration {
                    base_ms: 3_000,
                    cap_ms: 10_000,
                },
            ),
            EffectId::Slowness => (
                "Slowness",
                "Moves slower",
                Detrimental,
                Either,
                PowerMeaning::Inverse,
            ),
            EffectId::Poison => (
                "Poison",
                "Loses health on a timer",
                Detrimental,
                Either,
                PowerMeaning::Interval(Some([15_000, 12_500, 10_000, 7_500, 5_000])),
            ),
            EffectId::Fragile => (
                "Fragile",
                "Takes more damage",
                Detrimental,
                Either,
                PowerMeaning::Percentage,
            ),
            EffectId::Butterfingers => (
                "Butterfingers",
                "Keeps fumbling the equipped item",
                Detrimental,
                SingleOnly,
                PowerMeaning::Interval(None),
            ),
            EffectId::HeavyGravity => (
                "Heavy Gravity",
                "Gravity pulls harder for everyone",
                Detrimental,
                GlobalOnly,
                PowerMeaning::Multiplier,
            ),
            EffectId::FrozenFeet => (
                "Frozen Feet",
                "Cannot move",
                Detrimental,
                Either,
                PowerMeaning::Duration {
                    base_ms: 4_000,
                    cap_ms: 15_000,
                },
            ),
            EffectId::LowGravity => (
                "Low Gravity",
                "Gravity weakens for everyone",
                Chaotic,
                GlobalOnly,
                PowerMeaning::Inverse,
            ),
            EffectId::TurboSession => (
                "Turbo",
                "The whole session speeds up",
                Chaotic,
                GlobalOnly,
                PowerMeaning::Multiplier,
            ),
            EffectId::ReversedControls => (
                "Reversed Controls",
                "Left is right and right is left",
                Chaotic,
                Either,
                PowerMeaning::Fixed,
            ),
            EffectId::Jitter => (
                "Jitter",
                "Gets shoved around on a timer",
                Chaotic,
                Either,
                PowerMeaning::Interval(None),
            ),
            EffectId::MysteryWeapon => (
                "Mystery Weapon",
                "Swaps the equipped item for a surprise",
                Chaotic,
                Either,
                PowerMeaning::Fixed,
            ),
            EffectId::TeamSwap => (
                "Team Swap",
                "Changes sides",
                Chaotic,
                SingleOnly,
                PowerMeaning::Fixed,
            ),
        };

        EffectDefinition {
            id: *self,
            name,
            description,
            category,
            scope,
            meaning,
            is_global: scope == GlobalOnly,
            skip_reapply: matches!(self, EffectId::TeamSwap),
        }
    }
}

impl FromStr for EffectId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        EffectId::ALL
            .iter()
            .copied()
            .find(|id| id.key() == wanted)
            .ok_or_else(|| ValidationError::UnknownEffect(s.trim().to_string()))
    }
}

impl std::fmt::Display for EffectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_keys_roundtrip_and_unique() {
        let mut seen = HashSet::new();
        for id in EffectId::ALL {
            assert!(seen.insert(id.key()), "duplicate key {}", id.key());
            assert_eq!(id.key().parse::<EffectId>().unwrap(), id);
        }
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert_eq!(
            "moon_walk".parse::<EffectId>(),
            Err(ValidationError::UnknownEffect("moon_walk".to_string()))
        );
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("  Poison ".parse::<EffectId>().unwrap(), EffectId::Poison);
    }

    #[test]
    fn test_global_effects_are_global_only() {
        for id in EffectId::ALL {
            let def = id.definition();
            assert_eq!(def.is_global, def.scope == Scope::GlobalOnly, "{}", id);
        }
    }

    #[test]
    fn test_every_category_has_an_either_effect() {
        for category in Category::ALL {
            assert!(EffectId::ALL.iter().any(|id| {
                let def = id.definition();
                def.category == category && def.scope == Scope::Either
            }));
        }
    }

    #[test]
    fn test_scope_accepts() {
        assert!(Scope::Either.accepts(Target::All));
        assert!(Scope::Either.accepts(Target::Participant(1)));
        assert!(Scope::SingleOnly.accepts(Target::Participant(1)));
        assert!(!Scope::SingleOnly.accepts(Target::All));
        assert!(Scope::GlobalOnly.accepts(Target::All));
        assert!(!Scope::GlobalOnly.accepts(Target::Participant(1)));
    }

    #[test]
    fn test_only_team_swap_skips_reapply() {
        let skipping: Vec<EffectId> = EffectId::ALL
            .iter()
            .copied()
            .filter(|id| id.definition().skip_reapply)
            .collect();
        assert_eq!(skipping, vec![EffectId::TeamSwap]);
    }
}
