//! Active effect bookkeeping
//!
//! Holds at most one [`ActiveEffect`] per participant and at most one
//! [`GlobalActiveEffect`] per effect id. Every record leaves the store through
//! its handler's remove exactly once, whether it expires, is superseded, is
//! cleared or its participant leaves.

use crate::effects::{ApplyTargets, EffectId, EffectRegistry, PowerLevel, Snapshot};
use crate::error::ApplyError;
use crate::host::{EngineState, GlobalParams, Roster, SessionHost};
use log::{debug, info, warn};
use shared::{Category, EndReason, ParticipantId, Target};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct ActiveEffect {
    pub participant: ParticipantId,
    pub effect: EffectId,
    pub category: Category,
    pub started_at: u64,
    pub ends_at: u64,
    pub power: PowerLevel,
    pub power_value: f64,
    pub snapshot: Snapshot,
    /// Applied as part of an everyone-roll.
    pub is_all: bool,
    /// Time of the last recurring action (starts at `started_at`).
    pub last_action_at: u64,
    pub actions: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GlobalActiveEffect {
    pub effect: EffectId,
    pub ends_at: u64,
    /// Session value before the effect touched it.
    pub original: f32,
    pub triggered_by: Option<ParticipantId>,
    pub power: PowerLevel,
}

/// A fully resolved application, ready for the store.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyRequest {
    pub effect: EffectId,
    pub target: Target,
    pub power: PowerLevel,
    pub power_value: f64,
    pub started_at: u64,
    pub ends_at: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyReport {
    pub applied: Vec<ParticipantId>,
    pub global: bool,
    pub failures: Vec<ApplyError>,
}

impl ApplyReport {
    pub fn is_success(&self) -> bool {
        self.global || !self.applied.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EndedEffect {
    /// None for global effects.
    pub participant: Option<ParticipantId>,
    pub effect: EffectId,
    pub reason: EndReason,
}

#[derive(Debug, Default)]
pub struct EffectStateStore {
    active: BTreeMap<ParticipantId, ActiveEffect>,
    globals: BTreeMap<EffectId, GlobalActiveEffect>,
}

impl EffectStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty() && self.globals.is_empty()
    }

    pub fn len(&self) -> usize {
        self.active.len() + self.globals.len()
    }

    pub fn active(&self, participant: ParticipantId) -> Option<&ActiveEffect> {
        self.active.get(&participant)
    }

    pub fn global(&self, effect: EffectId) -> Option<&GlobalActiveEffect> {
        self.globals.get(&effect)
    }

    pub fn active_effects(&self) -> impl Iterator<Item = &ActiveEffect> {
        self.active.values()
    }

    pub fn global_effects(&self) -> impl Iterator<Item = &GlobalActiveEffect> {
        self.globals.values()
    }

    /// Applies a request to every target it resolves to. Failed targets are
    /// left untouched and reported; nothing is retried.
    pub fn apply<H: SessionHost + ?Sized>(
        &mut self,
        registry: &EffectRegistry,
        host: &mut H,
        request: &ApplyRequest,
    ) -> ApplyReport {
        let mut report = ApplyReport::default();
        let roster = host.participants();

        let targets = match registry.targets_for(request.effect, request.target, &roster) {
            Ok(targets) => targets,
            Err(e) => {
                warn!("Aborting {}: {}", request.effect, e);
                report.failures.push(e);
                return report;
            }
        };

        match targets {
            ApplyTargets::Global => {
                if self.globals.contains_key(&request.effect) {
                    let e = ApplyError::GlobalAlreadyActive(request.effect.key());
                    warn!("Aborting {}: {}", request.effect, e);
                    report.failures.push(e);
                    return report;
                }
                if let Some(param) = registry.global_param(request.effect) {
                    let rivals: Vec<EffectId> = self
                        .globals
                        .keys()
                        .copied()
                        .filter(|other| registry.global_param(*other) == Some(param))
                        .collect();
                    for rival in rivals {
                        if let Some(existing) = self.globals.remove(&rival) {
                            debug!(
                                "Superseding global {} with {} on {:?}",
                                rival, request.effect, param
                            );
                            registry.remove_global(host, rival, existing.original);
                        }
                    }
                }
                if let Some(original) =
                    registry.apply_global(host, request.effect, request.power_value)
                {
                    self.globals.insert(
                        request.effect,
                        GlobalActiveEffect {
                            effect: request.effect,
                            ends_at: request.ends_at,
                            original,
                            triggered_by: match request.target {
                                Target::All => None,
                                Target::Participant(id) => Some(id),
                            },
                            power: request.power,
                        },
                    );
                    report.global = true;
                    info!(
                        "Global effect {} active until {} (was {:.2})",
                        request.effect, request.ends_at, original
                    );
                }
            }
            ApplyTargets::Participants(ids) => {
                let category = registry.definition(request.effect).category;
                for participant in ids {
                    if let Some(existing) = self.active.remove(&participant) {
                        debug!(
                            "Superseding {} on participant {} with {}",
                            existing.effect, participant, request.effect
                        );
                        registry.remove(host, &existing);
                    }

                    match registry.apply(host, request.effect, participant, request.power_value) {
                        Ok(snapshot) => {
                            self.active.insert(
                                participant,
                                ActiveEffect {
                                    participant,
                                    effect: request.effect,
                                    category,
                                    started_at: request.started_at,
                                    ends_at: request.ends_at,
                                    power: request.power,
                                    power_value: request.power_value,
                                    snapshot,
                                    is_all: request.target == Target::All,
                                    last_action_at: request.started_at,
                                    actions: 0,
                                },
                            );
                            report.applied.push(participant);
                        }
                        Err(e) => report.failures.push(e),
                    }
                }
                if !report.applied.is_empty() {
                    info!(
                        "Applied {} ({}) to {:?} until {}",
                        request.effect, request.power.label, report.applied, request.ends_at
                    );
                }
            }
        }

        report
    }

    /// Expires what is due and runs recurring actions for the rest.
    pub fn update<H: Roster + EngineState + GlobalParams + ?Sized>(
        &mut self,
        registry: &EffectRegistry,
        host: &mut H,
        now: u64,
    ) -> Vec<EndedEffect> {
        let mut ended = Vec::new();

        let expired: Vec<ParticipantId> = self
            .active
            .values()
            .filter(|a| now >= a.ends_at)
            .map(|a| a.participant)
            .collect();
        for participant in expired {
            if let Some(e) =
                self.remove_participant(registry, host, participant, EndReason::Expired)
            {
                ended.push(e);
            }
        }

        let alive: Vec<ParticipantId> = host
            .participants()
            .into_iter()
            .filter(|p| p.alive)
            .map(|p| p.id)
            .collect();
        for active in self.active.values_mut() {
            // The dead keep their clock and act again once respawned.
            if alive.contains(&active.participant) {
                registry.update(host, active, now);
            }
        }

        let expired_globals: Vec<EffectId> = self
            .globals
            .values()
            .filter(|g| now >= g.ends_at)
            .map(|g| g.effect)
            .collect();
        for effect in expired_globals {
            if let Some(e) = self.remove_global(registry, host, effect, EndReason::Expired) {
                ended.push(e);
            }
        }

        ended
    }

    pub fn remove_participant<H: EngineState + ?Sized>(
        &mut self,
        registry: &EffectRegistry,
        host: &mut H,
        participant: ParticipantId,
        reason: EndReason,
    ) -> Option<EndedEffect> {
        match self.active.remove(&participant) {
            Some(active) => {
                registry.remove(host, &active);
                info!(
                    "{} ended on participant {} ({:?})",
                    active.effect, participant, reason
                );
                Some(EndedEffect {
                    participant: Some(participant),
                    effect: active.effect,
                    reason,
                })
            }
            None => {
                debug!("No active effect on participant {} to remove", participant);
                None
            }
        }
    }

    pub fn remove_global<H: GlobalParams + ?Sized>(
        &mut self,
        registry: &EffectRegistry,
        host: &mut H,
        effect: EffectId,
        reason: EndReason,
    ) -> Option<EndedEffect> {
        match self.globals.remove(&effect) {
            Some(global) => {
                registry.remove_global(host, effect, global.original);
                info!("Global effect {} ended ({:?})", effect, reason);
                Some(EndedEffect {
                    participant: None,
                    effect,
                    reason,
                })
            }
            None => {
                debug!("Global effect {} is not active", effect);
                None
            }
        }
    }

    /// Removes everything, each record through its handler once.
    pub fn clear<H: EngineState + GlobalParams + ?Sized>(
        &mut self,
        registry: &EffectRegistry,
        host: &mut H,
    ) -> Vec<EndedEffect> {
        let mut ended = Vec::new();
        let participants: Vec<ParticipantId> = self.active.keys().copied().collect();
        for participant in participants {
            if let Some(e) =
                self.remove_participant(registry, host, participant, EndReason::Cleared)
            {
                ended.push(e);
            }
        }
        let globals: Vec<EffectId> = self.globals.keys().copied().collect();
        for effect in globals {
            if let Some(e) = self.remove_global(registry, host, effect, EndReason::Cleared) {
                ended.push(e);
            }
        }
        ended
    }

    /// Restores engine-visible state after a respawn. Keeps the end time,
    /// snapshot and interval timers as they are.
    pub fn reapply<H: EngineState + ?Sized>(
        &self,
        registry: &EffectRegistry,
        host: &mut H,
        participant: ParticipantId,
    ) -> bool {
        let Some(active) = self.active.get(&participant) else {
            return false;
        };
        if registry.definition(active.effect).skip_reapply {
            debug!(
                "Not re-applying {} to respawned participant {}",
                active.effect, participant
            );
            return false;
        }
        registry.reapply(host, active);
        debug!("Re-applied {} to respawned participant {}", active.effect, participant);
        true
    }
}
