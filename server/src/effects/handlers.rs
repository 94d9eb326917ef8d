//! Effect handlers
//!
//! Each handler variant knows how to snapshot the attributes it is about to
//! change, impose its change, undo it, and (for recurring effects) perform a
//! periodic action. Imposing is always computed from the snapshot, never from
//! the live value, so it can be repeated after a respawn without compounding.

use super::EffectId;
use crate::error::ApplyError;
use crate::host::{AttrValue, Attribute, EngineState, GlobalParams, GlobalParam};
use crate::state_store::ActiveEffect;
use log::debug;
use shared::{ParticipantId, Team, Vec2};

/// Items handed out by the mystery weapon, picked by participant id.
pub const MYSTERY_ITEMS: [&str; 5] = [
    "rubber_chicken",
    "fish",
    "frying_pan",
    "umbrella",
    "bubble_wand",
];

/// Shove sequence used by the jitter effect, one entry per action.
const JITTER_OFFSETS: [(f32, f32); 4] = [(40.0, 0.0), (0.0, -40.0), (-40.0, 0.0), (0.0, 40.0)];

/// Where a scaling handler gets its factor from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScaleSource {
    PowerValue,
    /// Power value is a percentage added on top of 1.0.
    PercentIncrease,
    Constant(f32),
}

impl ScaleSource {
    fn factor(&self, power_value: f64) -> f32 {
        match self {
            ScaleSource::PowerValue => power_value as f32,
            ScaleSource::PercentIncrease => 1.0 + (power_value as f32) / 100.0,
            ScaleSource::Constant(c) => *c,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Handler {
    MovementScale(ScaleSource),
    DamageScale(ScaleSource),
    HealthOverTime { amount: f32 },
    Vitality,
    Butterfingers,
    Jitter,
    MysteryWeapon,
    TeamSwap,
    GlobalScale(GlobalParam),
}

/// Pre-apply attribute values a handler needs to undo itself.
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot {
    Nothing,
    Scalar(f32),
    Vitality { max_health: f32, bonus: f32 },
    Item(Option<String>),
    Team(Team),
}

impl Handler {
    pub fn for_effect(effect: EffectId) -> Handler {
        match effect {
            EffectId::SpeedBoost | EffectId::Slowness => {
                Handler::MovementScale(ScaleSource::PowerValue)
            }
            EffectId::FrozenFeet => Handler::MovementScale(ScaleSource::Constant(0.0)),
            EffectId::ReversedControls => Handler::MovementScale(ScaleSource::Constant(-1.0)),
            EffectId::IronSkin => Handler::DamageScale(ScaleSource::PowerValue),
            EffectId::Fragile => Handler::DamageScale(ScaleSource::PercentIncrease),
            EffectId::Invulnerable => Handler::DamageScale(ScaleSource::Constant(0.0)),
            EffectId::Regeneration => Handler::HealthOverTime { amount: 10.0 },
            EffectId::Poison => Handler::HealthOverTime { amount: -5.0 },
            EffectId::Vitality => Handler::Vitality,
            EffectId::Butterfingers => Handler::Butterfingers,
            EffectId::Jitter => Handler::Jitter,
            EffectId::MysteryWeapon => Handler::MysteryWeapon,
            EffectId::TeamSwap => Handler::TeamSwap,
            EffectId::HeavyGravity | EffectId::LowGravity => {
                Handler::GlobalScale(GlobalParam::Gravity)
            }
            EffectId::TurboSession => Handler::GlobalScale(GlobalParam::GlobalSpeed),
        }
    }

    /// The session parameter a global handler scales.
    pub fn global_param(&self) -> Option<GlobalParam> {
        match self {
            Handler::GlobalScale(param) => Some(*param),
            _ => None,
        }
    }

    pub fn has_update(&self) -> bool {
        matches!(
            self,
            Handler::HealthOverTime { .. } | Handler::Butterfingers | Handler::Jitter
        )
    }

    /// Snapshot, then impose. Nothing is written when the snapshot fails.
    pub fn apply<H: EngineState + ?Sized>(
        &self,
        host: &mut H,
        participant: ParticipantId,
        power_value: f64,
    ) -> Result<Snapshot, ApplyError> {
        let snapshot = self.capture(host, participant, power_value)?;
        self.impose(host, participant, power_value, &snapshot);
        Ok(snapshot)
    }

    pub fn capture<H: EngineState + ?Sized>(
        &self,
        host: &H,
        participant: ParticipantId,
        power_value: f64,
    ) -> Result<Snapshot, ApplyError> {
        match self {
            Handler::MovementScale(_) => {
                read_scalar(host, participant, Attribute::MovementMultiplier).map(Snapshot::Scalar)
            }
            Handler::DamageScale(_) => {
                read_scalar(host, participant, Attribute::DamageScale).map(Snapshot::Scalar)
            }
            Handler::HealthOverTime { .. } => {
                read_scalar(host, participant, Attribute::Health)?;
                Ok(Snapshot::Nothing)
            }
            Handler::Vitality => {
                let max_health = read_scalar(host, participant, Attribute::MaxHealth)?;
                let bonus = max_health * (power_value as f32) / 100.0;
                Ok(Snapshot::Vitality { max_health, bonus })
            }
            Handler::Butterfingers => match read_item(host, participant)? {
                Some(item) => Ok(Snapshot::Item(Some(item))),
                None => Err(ApplyError::NothingToAffect {
                    participant,
                    effect: EffectId::Butterfingers.key(),
                }),
            },
            Handler::Jitter => {
                host.attribute(participant, Attribute::Position)
                    .and_then(|v| v.as_vector())
                    .ok_or(ApplyError::MissingParticipant(participant))?;
                Ok(Snapshot::Nothing)
            }
            Handler::MysteryWeapon => read_item(host, participant).map(Snapshot::Item),
            Handler::TeamSwap => host
                .attribute(participant, Attribute::Team)
                .and_then(|v| v.as_team())
                .map(Snapshot::Team)
                .ok_or(ApplyError::MissingParticipant(participant)),
            Handler::GlobalScale(_) => Ok(Snapshot::Nothing),
        }
    }

    /// Writes the effect's modification, derived from the snapshot.
    pub fn impose<H: EngineState + ?Sized>(
        &self,
        host: &mut H,
        participant: ParticipantId,
        power_value: f64,
        snapshot: &Snapshot,
    ) {
        match (self, snapshot) {
            (Handler::MovementScale(source), Snapshot::Scalar(original)) => {
                host.set_attribute(
                    participant,
                    Attribute::MovementMultiplier,
                    AttrValue::Scalar(original * source.factor(power_value)),
                );
            }
            (Handler::DamageScale(source), Snapshot::Scalar(original)) => {
                host.set_attribute(
                    participant,
                    Attribute::DamageScale,
                    AttrValue::Scalar(original * source.factor(power_value)),
                );
            }
            (Handler::Vitality, Snapshot::Vitality { max_health, bonus }) => {
                let new_max = max_health + bonus;
                let health =
                    read_scalar(host, participant, Attribute::Health).unwrap_or(*max_health);
                host.set_attribute(participant, Attribute::MaxHealth, AttrValue::Scalar(new_max));
                host.set_attribute(
                    participant,
                    Attribute::Health,
                    AttrValue::Scalar((health + bonus).min(new_max)),
                );
            }
            (Handler::MysteryWeapon, Snapshot::Item(original)) => {
                let item = mystery_item_for(participant, original.as_deref());
                host.set_attribute(
                    participant,
                    Attribute::EquippedItem,
                    AttrValue::Item(Some(item.to_string())),
                );
            }
            (Handler::TeamSwap, Snapshot::Team(original)) => {
                host.set_attribute(participant, Attribute::Team, AttrValue::Team(original.other()));
            }
            // Recurring handlers change nothing up front.
            _ => {}
        }
    }

    pub fn remove<H: EngineState + ?Sized>(
        &self,
        host: &mut H,
        participant: ParticipantId,
        snapshot: &Snapshot,
    ) {
        match (self, snapshot) {
            (Handler::MovementScale(_), Snapshot::Scalar(original)) => {
                host.set_attribute(
                    participant,
                    Attribute::MovementMultiplier,
                    AttrValue::Scalar(*original),
                );
            }
            (Handler::DamageScale(_), Snapshot::Scalar(original)) => {
                host.set_attribute(
                    participant,
                    Attribute::DamageScale,
                    AttrValue::Scalar(*original),
                );
            }
            (Handler::Vitality, Snapshot::Vitality { max_health, bonus }) => {
                let health =
                    read_scalar(host, participant, Attribute::Health).unwrap_or(*max_health);
                host.set_attribute(
                    participant,
                    Attribute::MaxHealth,
                    AttrValue::Scalar(*max_health),
                );
                host.set_attribute(
                    participant,
                    Attribute::Health,
                    AttrValue::Scalar((health - bonus).clamp(1.0, *max_health)),
                );
            }
            (Handler::Butterfingers | Handler::MysteryWeapon, Snapshot::Item(original)) => {
                host.set_attribute(
                    participant,
                    Attribute::EquippedItem,
                    AttrValue::Item(original.clone()),
                );
            }
            (Handler::TeamSwap, Snapshot::Team(original)) => {
                host.set_attribute(participant, Attribute::Team, AttrValue::Team(*original));
            }
            _ => {}
        }
    }

    /// Runs the recurring action once the resolved interval has strictly
    /// elapsed since the last one. Returns true when it acted.
    pub fn update<H: EngineState + ?Sized>(
        &self,
        host: &mut H,
        active: &mut ActiveEffect,
        now: u64,
    ) -> bool {
        if !self.has_update() {
            return false;
        }

        let interval = active.power_value as u64;
        if now.saturating_sub(active.last_action_at) <= interval {
            return false;
        }

        let participant = active.participant;
        match (self, &active.snapshot) {
            (Handler::HealthOverTime { amount }, _) => {
                if let (Ok(health), Ok(max)) = (
                    read_scalar(host, participant, Attribute::Health),
                    read_scalar(host, participant, Attribute::MaxHealth),
                ) {
                    let next = (health + amount).clamp(1.0, max.max(1.0));
                    host.set_attribute(participant, Attribute::Health, AttrValue::Scalar(next));
                }
            }
            (Handler::Butterfingers, Snapshot::Item(original)) => {
                let item = if active.actions % 2 == 0 { None } else { original.clone() };
                host.set_attribute(participant, Attribute::EquippedItem, AttrValue::Item(item));
            }
            (Handler::Jitter, _) => {
                let (dx, dy) = JITTER_OFFSETS[(active.actions as usize) % JITTER_OFFSETS.len()];
                if let Some(position) = host
                    .attribute(participant, Attribute::Position)
                    .and_then(|v| v.as_vector())
                {
                    let shoved = position.add(&Vec2::new(dx, dy));
                    host.set_attribute(participant, Attribute::Position, AttrValue::Vector(shoved));
                }
            }
            _ => {}
        }

        debug!(
            "{} acted on participant {} (action {})",
            active.effect, participant, active.actions + 1
        );
        active.last_action_at = now;
        active.actions += 1;
        true
    }

    /// Scales a session parameter and returns its previous value.
    pub fn apply_global<H: GlobalParams + ?Sized>(
        &self,
        host: &mut H,
        power_value: f64,
    ) -> Option<f32> {
        match self {
            Handler::GlobalScale(param) => {
                let original = host.global(*param);
                host.set_global(*param, original * power_value as f32);
                Some(original)
            }
            _ => None,
        }
    }

    pub fn remove_global<H: GlobalParams + ?Sized>(&self, host: &mut H, original: f32) {
        if let Handler::GlobalScale(param) = self {
            host.set_global(*param, original);
        }
    }
}

fn read_scalar<H: EngineState + ?Sized>(
    host: &H,
    participant: ParticipantId,
    attribute: Attribute,
) -> Result<f32, ApplyError> {
    host.attribute(participant, attribute)
        .and_then(|v| v.as_scalar())
        .ok_or(ApplyError::MissingParticipant(participant))
}

fn read_item<H: EngineState + ?Sized>(
    host: &H,
    participant: ParticipantId,
) -> Result<Option<String>, ApplyError> {
    host.attribute(participant, Attribute::EquippedItem)
        .and_then(|v| v.as_item())
        .ok_or(ApplyError::MissingParticipant(participant))
}

fn mystery_item_for(participant: ParticipantId, current: Option<&str>) -> &'static str {
    let start = participant as usize % MYSTERY_ITEMS.len();
    let pick = MYSTERY_ITEMS[start];
    if Some(pick) == current {
        MYSTERY_ITEMS[(start + 1) % MYSTERY_ITEMS.len()]
    } else {
        pick
    }
}
