//! Deterministic roll selection
//!
//! A selection is a pure function of the seed, the roster and the recent
//! target history. All randomness comes from one `StdRng` seeded with the
//! roll seed and advanced in a fixed order: target, category, effect, power.

use crate::config::{CategoryWeights, EngineConfig};
use crate::effects::{EffectId, EffectRegistry, PowerLevel, Scope};
use crate::error::ValidationError;
use crate::host::Participant;
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{Category, ParticipantId, Target};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Selection {
    pub target: Target,
    pub effect: EffectId,
    pub category: Category,
    pub power: PowerLevel,
}

/// Fields a manual roll pins instead of drawing.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SelectionOverrides {
    pub target: Option<Target>,
    pub effect: Option<EffectId>,
    pub power: Option<PowerLevel>,
}

/// The last few single targets, most recent at the back.
#[derive(Debug, Clone, Default)]
pub struct RecentTargets {
    capacity: usize,
    ids: VecDeque<ParticipantId>,
}

impl RecentTargets {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            ids: VecDeque::with_capacity(capacity),
        }
    }

    pub fn record(&mut self, target: Target) {
        if let Target::Participant(id) = target {
            if self.capacity == 0 {
                return;
            }
            self.ids.push_back(id);
            while self.ids.len() > self.capacity {
                self.ids.pop_front();
            }
        }
    }

    pub fn contains(&self, id: ParticipantId) -> bool {
        self.ids.contains(&id)
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }
}

#[derive(Debug, Clone)]
pub struct Selector {
    all_participants_weight: f64,
    weights: CategoryWeights,
}

impl Selector {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            all_participants_weight: config.all_participants_weight,
            weights: config.weights,
        }
    }

    /// Draws a full selection. None when nobody is eligible.
    pub fn select(
        &self,
        registry: &EffectRegistry,
        seed: u64,
        roster: &[Participant],
        recent: &RecentTargets,
    ) -> Option<Selection> {
        self.select_with(registry, seed, roster, recent, &SelectionOverrides::default())
            .ok()
            .flatten()
    }

    /// Like [`Selector::select`], with some fields pinned. Pinned fields skip
    /// their draws; the remaining draws keep their order.
    pub fn select_with(
        &self,
        registry: &EffectRegistry,
        seed: u64,
        roster: &[Participant],
        recent: &RecentTargets,
        overrides: &SelectionOverrides,
    ) -> Result<Option<Selection>, ValidationError> {
        let mut eligible: Vec<&Participant> = roster.iter().filter(|p| p.is_eligible()).collect();
        if eligible.is_empty() {
            debug!("No eligible participants, nothing to select");
            return Ok(None);
        }
        eligible.sort_by_key(|p| p.id);

        let pinned_scope = overrides.effect.map(|id| registry.definition(id).scope);
        if let Some(Target::Participant(id)) = overrides.target {
            if !eligible.iter().any(|p| p.id == id) {
                return Err(ValidationError::IneligibleParticipant(id));
            }
        }
        if let (Some(target), Some(effect), Some(scope)) =
            (overrides.target, overrides.effect, pinned_scope)
        {
            if !scope.accepts(target) {
                return Err(ValidationError::ScopeMismatch {
                    effect: effect.key().to_string(),
                    target: target.to_string(),
                });
            }
        }

        let mut rng = StdRng::seed_from_u64(seed);

        let target = match (overrides.target, pinned_scope) {
            (Some(target), _) => target,
            (None, Some(Scope::GlobalOnly)) => Target::All,
            (None, Some(Scope::SingleOnly)) => self.pick_participant(&mut rng, &eligible, recent),
            (None, _) => {
                let roll: f64 = rng.gen_range(0.0..100.0);
                if self.all_participants_weight > 0.0 && roll <= self.all_participants_weight {
                    Target::All
                } else {
                    self.pick_participant(&mut rng, &eligible, recent)
                }
            }
        };

        let (effect, category) = match overrides.effect {
            Some(effect) => (effect, registry.definition(effect).category),
            None => {
                let rolled = self.pick_category(&mut rng);
                let pool = effect_pool(rolled, target, |c, t| registry.compatible(c, t));
                if pool.is_empty() {
                    return Ok(None);
                }
                let effect = pool[rng.gen_range(0..pool.len())];
                (effect, registry.definition(effect).category)
            }
        };

        let power = match overrides.power {
            Some(power) => power,
            None => PowerLevel::ALL[rng.gen_range(0..PowerLevel::ALL.len())],
        };

        Ok(Some(Selection {
            target,
            effect,
            category,
            power,
        }))
    }

    fn pick_participant(
        &self,
        rng: &mut StdRng,
        eligible: &[&Participant],
        recent: &RecentTargets,
    ) -> Target {
        let fresh: Vec<ParticipantId> = eligible
            .iter()
            .map(|p| p.id)
            .filter(|id| !recent.contains(*id))
            .collect();
        let pool: Vec<ParticipantId> = if fresh.is_empty() {
            eligible.iter().map(|p| p.id).collect()
        } else {
            fresh
        };
        Target::Participant(pool[rng.gen_range(0..pool.len())])
    }

    fn pick_category(&self, rng: &mut StdRng) -> Category {
        let total = self.weights.total();
        if total <= 0.0 {
            return Category::Beneficial;
        }
        let roll: f64 = rng.gen_range(0.0..total);
        let mut cumulative = 0.0;
        for category in Category::ALL {
            cumulative += self.weights.weight(category);
            if roll < cumulative {
                return category;
            }
        }
        Category::Chaotic
    }
}

/// Effects of the rolled category that fit the target, or Beneficial's
/// when none do.
fn effect_pool<F>(rolled: Category, target: Target, compatible: F) -> Vec<EffectId>
where
    F: Fn(Category, Target) -> Vec<EffectId>,
{
    let pool = compatible(rolled, target);
    if pool.is_empty() && rolled != Category::Beneficial {
        debug!("No {:?} effect fits {}, falling back to Beneficial", rolled, target);
        return compatible(Category::Beneficial, target);
    }
    pool
}
