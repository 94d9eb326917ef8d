//! Effect registry: definitions, handlers and power resolution for the
//! whole catalog, built once at session start.

use super::{EffectDefinition, EffectId, Handler, PowerLevel, PowerMeaning, Snapshot};
use crate::error::{ApplyError, ValidationError};
use crate::host::{EngineState, GlobalParam, GlobalParams, Participant};
use crate::state_store::ActiveEffect;
use log::{debug, warn};
use shared::{Category, ParticipantId, Target};

#[derive(Debug, Clone, Copy)]
struct RegistryEntry {
    definition: EffectDefinition,
    handler: Handler,
}

/// Who an application actually touches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyTargets {
    /// One session-wide record.
    Global,
    Participants(Vec<ParticipantId>),
}

#[derive(Debug, Clone)]
pub struct EffectRegistry {
    /// Indexed by `EffectId as usize`.
    entries: Vec<RegistryEntry>,
}

impl Default for EffectRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectRegistry {
    pub fn new() -> Self {
        let entries: Vec<RegistryEntry> = EffectId::ALL
            .iter()
            .map(|id| RegistryEntry {
                definition: id.definition(),
                handler: Handler::for_effect(*id),
            })
            .collect();
        debug_assert!(entries
            .iter()
            .enumerate()
            .all(|(i, e)| e.definition.id as usize == i));
        Self { entries }
    }

    pub fn definition(&self, id: EffectId) -> &EffectDefinition {
        &self.entries[id as usize].definition
    }

    pub fn handler(&self, id: EffectId) -> Handler {
        self.entries[id as usize].handler
    }

    pub fn definitions(&self) -> impl Iterator<Item = &EffectDefinition> {
        self.entries.iter().map(|e| &e.definition)
    }

    pub fn lookup(&self, key: &str) -> Result<EffectId, ValidationError> {
        key.parse()
    }

    /// Effects of a category in catalog order.
    pub fn effects_in(&self, category: Category) -> Vec<EffectId> {
        self.definitions()
            .filter(|d| d.category == category)
            .map(|d| d.id)
            .collect()
    }

    /// Effects of a category that may be aimed at `target`.
    pub fn compatible(&self, category: Category, target: Target) -> Vec<EffectId> {
        self.definitions()
            .filter(|d| d.category == category && d.scope.accepts(target))
            .map(|d| d.id)
            .collect()
    }

    pub fn resolve_power(&self, id: EffectId, level: PowerLevel) -> f64 {
        self.definition(id).meaning.resolve(level)
    }

    /// How long an application lasts. Duration-meaning effects use their
    /// resolved power value, everything else the configured default.
    pub fn lifetime_ms(&self, id: EffectId, power_value: f64, default_ms: u64) -> u64 {
        match self.definition(id).meaning {
            PowerMeaning::Duration { .. } => power_value.max(0.0) as u64,
            _ => default_ms,
        }
    }

    pub fn targets_for(
        &self,
        id: EffectId,
        target: Target,
        roster: &[Participant],
    ) -> Result<ApplyTargets, ApplyError> {
        let definition = self.definition(id);
        if definition.is_global {
            return Ok(ApplyTargets::Global);
        }

        let mut ids: Vec<ParticipantId> = match target {
            Target::All => roster
                .iter()
                .filter(|p| p.is_eligible())
                .map(|p| p.id)
                .collect(),
            Target::Participant(pid) => roster
                .iter()
                .filter(|p| p.id == pid && p.is_eligible())
                .map(|p| p.id)
                .collect(),
        };
        ids.sort_unstable();

        if ids.is_empty() {
            return Err(ApplyError::NoTargets(id.key()));
        }
        Ok(ApplyTargets::Participants(ids))
    }

    pub fn apply<H: EngineState + ?Sized>(
        &self,
        host: &mut H,
        id: EffectId,
        participant: ParticipantId,
        power_value: f64,
    ) -> Result<Snapshot, ApplyError> {
        let result = self.handler(id).apply(host, participant, power_value);
        if let Err(e) = &result {
            warn!("Could not apply {} to participant {}: {}", id, participant, e);
        }
        result
    }

    /// Re-imposes an effect after a respawn reset the participant's state.
    pub fn reapply<H: EngineState + ?Sized>(&self, host: &mut H, active: &ActiveEffect) {
        self.handler(active.effect)
            .impose(host, active.participant, active.power_value, &active.snapshot);
    }

    pub fn remove<H: EngineState + ?Sized>(&self, host: &mut H, active: &ActiveEffect) {
        debug!("Removing {} from participant {}", active.effect, active.participant);
        self.handler(active.effect)
            .remove(host, active.participant, &active.snapshot);
    }

    pub fn update<H: EngineState + ?Sized>(
        &self,
        host: &mut H,
        active: &mut ActiveEffect,
        now: u64,
    ) -> bool {
        self.handler(active.effect).update(host, active, now)
    }

    pub fn global_param(&self, id: EffectId) -> Option<GlobalParam> {
        self.handler(id).global_param()
    }

    pub fn apply_global<H: GlobalParams + ?Sized>(
        &self,
        host: &mut H,
        id: EffectId,
        power_value: f64,
    ) -> Option<f32> {
        self.handler(id).apply_global(host, power_value)
    }

    pub fn remove_global<H: GlobalParams + ?Sized>(
        &self,
        host: &mut H,
        id: EffectId,
        original: f32,
    ) {
        self.handler(id).remove_global(host, original);
    }
}
