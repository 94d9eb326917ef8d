//! Reveal timeline for a roll
//!
//! A roll plays over a fixed duration with four checkpoints at 25, 50, 75 and
//! 100 percent: target, effect, power and finally the result, which is when
//! the selection is actually applied. The first roll of a session uses the
//! full profile (long, freezes everyone, ambient cue); later rolls are quick.
//!
//! Ticks arrive at uneven spacing, so a checkpoint fires the first time
//! elapsed time falls inside `[at, at + window)`. A tick that lands past the
//! window marks the checkpoint as spent without revealing it. The final
//! checkpoint has no window: once elapsed reaches the total the roll applies.

use crate::config::AnimationConfig;
use crate::effects::EffectRegistry;
use crate::host::{Recipient, SessionHost};
use crate::safety::SafetyMonitor;
use crate::selector::Selection;
use crate::state_store::{ApplyReport, ApplyRequest, EffectStateStore};
use log::{debug, info, warn};
use shared::Presentation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollPhase {
    Idle,
    Rolling,
    Applying,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
    Target,
    Effect,
    Power,
    Result,
}

impl Checkpoint {
    pub const ORDER: [Checkpoint; 4] = [
        Checkpoint::Target,
        Checkpoint::Effect,
        Checkpoint::Power,
        Checkpoint::Result,
    ];

    /// Offset into the roll, in percent of its duration.
    pub fn percent(&self) -> u64 {
        match self {
            Checkpoint::Target => 25,
            Checkpoint::Effect => 50,
            Checkpoint::Power => 75,
            Checkpoint::Result => 100,
        }
    }

    pub fn offset(&self, duration_ms: u64) -> u64 {
        duration_ms * self.percent() / 100
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RollSession {
    pub seed: u64,
    pub selection: Option<Selection>,
    pub phase: RollPhase,
    pub started_at: u64,
    pub duration_ms: u64,
    pub quick: bool,
    fired: [bool; 4],
    last_countdown: Option<u32>,
}

impl RollSession {
    fn idle() -> Self {
        Self {
            seed: 0,
            selection: None,
            phase: RollPhase::Idle,
            started_at: 0,
            duration_ms: 0,
            quick: false,
            fired: [false; 4],
            last_countdown: None,
        }
    }

    pub fn ends_at(&self) -> u64 {
        self.started_at + self.duration_ms
    }

    pub fn has_fired(&self, checkpoint: Checkpoint) -> bool {
        self.fired[checkpoint as usize]
    }
}

/// What a finished roll did.
#[derive(Debug, Clone, PartialEq)]
pub struct RollOutcome {
    pub selection: Selection,
    pub report: ApplyReport,
}

#[derive(Debug, Clone)]
pub struct AnimationDirector {
    config: AnimationConfig,
    effect_duration_ms: u64,
    played_full: bool,
    session: RollSession,
    safety: SafetyMonitor,
}

impl AnimationDirector {
    pub fn new(config: AnimationConfig, effect_duration_ms: u64) -> Self {
        Self {
            config,
            effect_duration_ms,
            played_full: false,
            safety: SafetyMonitor::new(config.safety_recheck_delay_ms),
            session: RollSession::idle(),
        }
    }

    pub fn phase(&self) -> RollPhase {
        self.session.phase
    }

    pub fn session(&self) -> &RollSession {
        &self.session
    }

    pub fn safety(&self) -> &SafetyMonitor {
        &self.safety
    }

    /// Duration the next roll would play for.
    pub fn next_duration_ms(&self) -> u64 {
        if self.next_is_quick() {
            self.config.quick_duration_ms
        } else {
            self.config.full_duration_ms
        }
    }

    fn next_is_quick(&self) -> bool {
        self.played_full && !self.config.always_full
    }

    /// Back to a fresh session: idle, next roll full, nobody frozen.
    pub fn reset<H: SessionHost + ?Sized>(&mut self, host: &mut H) {
        self.session = RollSession::idle();
        self.played_full = false;
        self.safety.reset(host);
    }

    /// Starts revealing a selection. Returns the roll duration.
    pub fn start<H: SessionHost + ?Sized>(
        &mut self,
        host: &mut H,
        now: u64,
        seed: u64,
        selection: Selection,
    ) -> u64 {
        let quick = self.next_is_quick();
        let duration_ms = self.next_duration_ms();
        self.played_full = true;
        self.session = RollSession {
            seed,
            selection: Some(selection),
            phase: RollPhase::Rolling,
            started_at: now,
            duration_ms,
            quick,
            fired: [false; 4],
            last_countdown: None,
        };

        info!(
            "Roll started ({}, {} ms, seed {}): {} / {} / {}",
            if quick { "quick" } else { "full" },
            duration_ms,
            seed,
            selection.target,
            selection.effect,
            selection.power.label
        );
        host.present(
            Recipient::All,
            Presentation::RollStarted {
                full: !quick,
                duration_ms,
                ambient_cue: !quick,
            },
        );
        let freeze = !quick && self.config.freeze_on_full;
        self.safety.begin_roll(host, now + duration_ms, freeze);
        duration_ms
    }

    /// Advances the running roll. Returns the outcome on the tick it applies.
    pub fn update<H: SessionHost + ?Sized>(
        &mut self,
        registry: &EffectRegistry,
        store: &mut EffectStateStore,
        host: &mut H,
        now: u64,
    ) -> Option<RollOutcome> {
        if self.session.phase != RollPhase::Rolling {
            return None;
        }
        let Some(selection) = self.session.selection else {
            warn!("Rolling without a selection, returning to idle");
            self.finish(host, now);
            return None;
        };

        self.safety.enforce(host);

        let elapsed = now.saturating_sub(self.session.started_at);
        let duration = self.session.duration_ms;

        for checkpoint in [Checkpoint::Target, Checkpoint::Effect, Checkpoint::Power] {
            if self.session.has_fired(checkpoint) {
                continue;
            }
            let at = checkpoint.offset(duration);
            if elapsed < at {
                continue;
            }
            self.session.fired[checkpoint as usize] = true;
            if elapsed < at + self.config.checkpoint_window_ms {
                self.reveal(registry, host, checkpoint, &selection);
            } else {
                warn!(
                    "Missed the {:?} checkpoint (elapsed {} ms, due at {} ms)",
                    checkpoint, elapsed, at
                );
            }
        }

        if elapsed >= duration {
            self.session.fired[Checkpoint::Result as usize] = true;
            return Some(self.apply(registry, store, host, now, selection));
        }

        let remaining_secs = ((duration - elapsed + 999) / 1000) as u32;
        if self.session.last_countdown != Some(remaining_secs) {
            self.session.last_countdown = Some(remaining_secs);
            host.present(Recipient::All, Presentation::Countdown { remaining_secs });
        }
        None
    }

    fn reveal<H: SessionHost + ?Sized>(
        &self,
        registry: &EffectRegistry,
        host: &mut H,
        checkpoint: Checkpoint,
        selection: &Selection,
    ) {
        debug!("Reveal checkpoint {:?}", checkpoint);
        let message = match checkpoint {
            Checkpoint::Target => Presentation::TargetRevealed {
                target: selection.target,
            },
            Checkpoint::Effect => {
                let definition = registry.definition(selection.effect);
                Presentation::EffectRevealed {
                    effect: selection.effect.key().to_string(),
                    name: definition.name.to_string(),
                    category: definition.category,
                }
            }
            Checkpoint::Power => Presentation::PowerRevealed {
                level: selection.power.index,
                label: selection.power.label.to_string(),
            },
            Checkpoint::Result => return,
        };
        host.present(Recipient::All, message);
    }

    fn apply<H: SessionHost + ?Sized>(
        &mut self,
        registry: &EffectRegistry,
        store: &mut EffectStateStore,
        host: &mut H,
        now: u64,
        selection: Selection,
    ) -> RollOutcome {
        self.session.phase = RollPhase::Applying;

        let power_value = registry.resolve_power(selection.effect, selection.power);
        let lifetime = registry.lifetime_ms(selection.effect, power_value, self.effect_duration_ms);
        let request = ApplyRequest {
            effect: selection.effect,
            target: selection.target,
            power: selection.power,
            power_value,
            started_at: now,
            ends_at: now + lifetime,
        };

        // Unfreeze first; the effect lands on a free participant.
        self.safety.end_roll(host, now);
        let report = store.apply(registry, host, &request);

        if report.is_success() {
            host.present(
                Recipient::All,
                Presentation::EffectApplied {
                    target: selection.target,
                    effect: selection.effect.key().to_string(),
                    name: registry.definition(selection.effect).name.to_string(),
                    level: selection.power.index,
                    ends_at: request.ends_at,
                },
            );
        } else {
            warn!("Roll for {} applied to nobody", selection.effect);
            host.present(
                Recipient::All,
                Presentation::Notice {
                    text: format!("{} fizzled", registry.definition(selection.effect).name),
                },
            );
        }

        self.session.phase = RollPhase::Idle;
        RollOutcome { selection, report }
    }

    /// Abandons the running roll, if any. Pending checkpoints are dropped.
    pub fn cancel<H: SessionHost + ?Sized>(&mut self, host: &mut H, now: u64) {
        if self.session.phase != RollPhase::Idle {
            info!("Roll cancelled");
        }
        self.finish(host, now);
    }

    fn finish<H: SessionHost + ?Sized>(&mut self, host: &mut H, now: u64) {
        self.session = RollSession::idle();
        self.safety.end_roll(host, now);
    }

    /// Per-tick safety work outside of roll updates.
    pub fn tick_safety<H: SessionHost + ?Sized>(&mut self, host: &mut H, now: u64) {
        self.safety.tick(host, now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::{EffectId, PowerLevel};
    use crate::game::GameState;
    use shared::{Category, Target};

    fn selection(effect: EffectId, target: Target) -> Selection {
        Selection {
            target,
            effect,
            category: effect.definition().category,
            power: PowerLevel::from_index(3).unwrap(),
        }
    }

    fn setup() -> (AnimationDirector, EffectRegistry, EffectStateStore, GameState) {
        let mut game = GameState::new();
        game.add_player(1, false);
        game.add_player(2, false);
        (
            AnimationDirector::new(AnimationConfig::default(), 30_000),
            EffectRegistry::new(),
            EffectStateStore::new(),
            game,
        )
    }

    fn reveals(game: &mut GameState) -> Vec<Presentation> {
        game.take_outbox()
            .into_iter()
            .map(|(_, m)| m)
            .filter(|m| {
                matches!(
                    m,
                    Presentation::TargetRevealed { .. }
                        | Presentation::EffectRevealed { .. }
                        | Presentation::PowerRevealed { .. }
                        | Presentation::EffectApplied { .. }
                )
            })
            .collect()
    }

    #[test]
    fn test_checkpoint_offsets() {
        let offsets: Vec<u64> = Checkpoint::ORDER.iter().map(|c| c.offset(10_000)).collect();
        assert_eq!(offsets, vec![2_500, 5_000, 7_500, 10_000]);
    }

    #[test]
    fn test_first_roll_full_then_quick() {
        let (mut director, registry, mut store, mut game) = setup();
        let first = selection(EffectId::SpeedBoost, Target::Participant(1));
        let duration = director.start(&mut game, 0, 1, first);
        assert_eq!(duration, 10_000);
        assert!(!director.session().quick);

        director.update(&registry, &mut store, &mut game, 10_000);
        assert_eq!(director.phase(), RollPhase::Idle);

        let second = selection(EffectId::Slowness, Target::Participant(2));
        let duration = director.start(&mut game, 20_000, 2, second);
        assert_eq!(duration, 4_000);
        assert!(director.session().quick);
    }

    #[test]
    fn test_checkpoints_fire_once_in_order() {
        let (mut director, registry, mut store, mut game) = setup();
        director.start(&mut game, 0, 1, selection(EffectId::SpeedBoost, Target::Participant(1)));

        let mut now = 0;
        while director.phase() != RollPhase::Idle {
            now += 50;
            director.update(&registry, &mut store, &mut game, now);
        }
        assert_eq!(now, 10_000);

        let messages = reveals(&mut game);
        assert_eq!(messages.len(), 4);
        assert!(matches!(
            messages[0],
            Presentation::TargetRevealed {
                target: Target::Participant(1)
            }
        ));
        assert!(matches!(
            &messages[1],
            Presentation::EffectRevealed { category: Category::Beneficial, .. }
        ));
        assert!(matches!(messages[2], Presentation::PowerRevealed { level: 3, .. }));
        assert!(matches!(messages[3], Presentation::EffectApplied { level: 3, .. }));

        assert_eq!(store.active(1).unwrap().ends_at, 40_000);
    }

    #[test]
    fn test_stalled_tick_skips_missed_reveals_but_applies() {
        let (mut director, registry, mut store, mut game) = setup();
        director.start(&mut game, 0, 1, selection(EffectId::SpeedBoost, Target::Participant(1)));

        director.update(&registry, &mut store, &mut game, 2_600);
        let outcome = director.update(&registry, &mut store, &mut game, 12_000);

        assert!(outcome.unwrap().report.is_success());
        let messages = reveals(&mut game);
        assert_eq!(messages.len(), 2);
        assert!(matches!(messages[0], Presentation::TargetRevealed { .. }));
        assert!(matches!(messages[1], Presentation::EffectApplied { .. }));
    }

    #[test]
    fn test_countdown_once_per_second() {
        let (mut director, registry, mut store, mut game) = setup();
        director.start(&mut game, 0, 1, selection(EffectId::SpeedBoost, Target::Participant(1)));
        let mut now = 0;
        while director.phase() != RollPhase::Idle {
            now += 50;
            director.update(&registry, &mut store, &mut game, now);
        }
        let countdown: Vec<u32> = game
            .take_outbox()
            .into_iter()
            .filter_map(|(_, m)| match m {
                Presentation::Countdown { remaining_secs } => Some(remaining_secs),
                _ => None,
            })
            .collect();
        assert_eq!(countdown, vec![10, 9, 8, 7, 6, 5, 4, 3, 2, 1]);
    }

    #[test]
    fn test_full_roll_freezes_until_end() {
        let (mut director, registry, mut store, mut game) = setup();
        director.start(&mut game, 1_000, 1, selection(EffectId::SpeedBoost, Target::All));

        for now in (1_050..11_000).step_by(50) {
            director.update(&registry, &mut store, &mut game, now);
            for id in [1, 2] {
                let until = game.avatar(id).unwrap().freeze_until.unwrap();
                assert!(until >= now);
            }
        }
        director.update(&registry, &mut store, &mut game, 11_000);
        assert_eq!(game.avatar(1).unwrap().freeze_until, None);
        assert_eq!(game.avatar(2).unwrap().freeze_until, None);
    }

    #[test]
    fn test_quick_roll_never_freezes() {
        let (mut director, registry, mut store, mut game) = setup();
        director.start(&mut game, 0, 1, selection(EffectId::SpeedBoost, Target::Participant(1)));
        director.update(&registry, &mut store, &mut game, 10_000);

        let next = selection(EffectId::SpeedBoost, Target::Participant(2));
        director.start(&mut game, 20_000, 2, next);
        director.update(&registry, &mut store, &mut game, 21_000);
        assert_eq!(game.avatar(2).unwrap().freeze_until, None);
    }

    #[test]
    fn test_failed_apply_reports_and_returns_idle() {
        let (mut director, registry, mut store, mut game) = setup();
        director.start(&mut game, 0, 1, selection(EffectId::Poison, Target::Participant(2)));
        game.kill(2, 100);

        let outcome = director
            .update(&registry, &mut store, &mut game, 10_000)
            .unwrap();
        assert!(!outcome.report.is_success());
        assert!(store.is_empty());
        assert_eq!(director.phase(), RollPhase::Idle);
    }

    #[test]
    fn test_cancel_drops_pending_checkpoints() {
        let (mut director, registry, mut store, mut game) = setup();
        director.start(&mut game, 0, 1, selection(EffectId::SpeedBoost, Target::Participant(1)));
        director.update(&registry, &mut store, &mut game, 3_000);
        director.cancel(&mut game, 3_000);

        assert_eq!(director.phase(), RollPhase::Idle);
        assert_eq!(game.avatar(1).unwrap().freeze_until, None);
        assert!(director.update(&registry, &mut store, &mut game, 10_000).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_always_full_config() {
        let config = AnimationConfig {
            always_full: true,
            ..AnimationConfig::default()
        };
        let mut director = AnimationDirector::new(config, 30_000);
        let registry = EffectRegistry::new();
        let mut store = EffectStateStore::new();
        let mut game = GameState::new();
        game.add_player(1, false);

        director.start(&mut game, 0, 1, selection(EffectId::SpeedBoost, Target::Participant(1)));
        director.update(&registry, &mut store, &mut game, 10_000);
        assert_eq!(director.next_duration_ms(), 10_000);
    }
}
