//! The roulette engine
//!
//! One [`Engine`] per session. It owns the registry, the active effect store,
//! selection, scheduling, the reveal director and the command queue, and does
//! all of its work inside [`Engine::tick`]. Each tick runs the same pipeline:
//!
//! 1. drain queued commands
//! 2. watch the roster for departures and respawns
//! 3. advance a running roll (and apply it when it completes)
//! 4. let the scheduler fire a new roll
//! 5. expire and update active effects
//! 6. run the deferred freeze check

use crate::animation::{AnimationDirector, RollOutcome, RollPhase};
use crate::commands::{Command, CommandQueue, QueuedCommand};
use crate::config::EngineConfig;
use crate::effects::EffectRegistry;
use crate::error::{ConfigError, ValidationError};
use crate::host::{Recipient, SessionHost};
use crate::scheduler::Scheduler;
use crate::selector::{RecentTargets, Selection, SelectionOverrides, Selector};
use crate::state_store::{EffectStateStore, EndedEffect};
use log::{debug, info, warn};
use shared::{EndReason, ParticipantId, Presentation};
use std::collections::BTreeMap;

pub struct Engine {
    config: EngineConfig,
    registry: EffectRegistry,
    store: EffectStateStore,
    selector: Selector,
    scheduler: Scheduler,
    director: AnimationDirector,
    recent: RecentTargets,
    commands: CommandQueue,
    session_seed: u64,
    /// Spawn count per participant as of the previous tick.
    last_spawns: BTreeMap<ParticipantId, u32>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let session_seed = config.seed.unwrap_or_else(rand::random);
        info!("Roulette engine ready (session seed {})", session_seed);

        Ok(Self {
            registry: EffectRegistry::new(),
            store: EffectStateStore::new(),
            selector: Selector::new(&config),
            scheduler: Scheduler::new(&config, session_seed),
            director: AnimationDirector::new(config.animation, config.effect_duration_ms),
            recent: RecentTargets::new(config.recent_target_cooldown),
            commands: CommandQueue::new(),
            session_seed,
            last_spawns: BTreeMap::new(),
            config,
        })
    }

    /// Resets everything for a fresh session starting at `now`.
    pub fn start_session<H: SessionHost + ?Sized>(&mut self, host: &mut H, now: u64) {
        let ended = self.store.clear(&self.registry, host);
        self.announce_ended(host, &ended);
        self.director.reset(host);
        self.scheduler.start_session(now, self.session_seed);
        self.recent.clear();
        self.commands.drain();
        self.last_spawns = host.participants().iter().map(|p| (p.id, p.spawns)).collect();
        info!(
            "Session started at {}, first roll due at {}",
            now,
            self.scheduler.next_trigger_at()
        );
    }

    /// Parses a command and queues it for the next tick.
    pub fn submit(
        &mut self,
        issuer: Option<ParticipantId>,
        text: &str,
    ) -> Result<Command, ValidationError> {
        match self.commands.submit(issuer, text) {
            Ok(command) => {
                debug!("Queued {:?} from {:?}", command, issuer);
                Ok(command)
            }
            Err(e) => {
                warn!("Rejected command {:?}: {}", text, e);
                Err(e)
            }
        }
    }

    pub fn enqueue(&mut self, issuer: Option<ParticipantId>, command: Command) {
        self.commands.push(issuer, command);
    }

    pub fn tick<H: SessionHost + ?Sized>(&mut self, host: &mut H, now: u64) {
        for queued in self.commands.drain() {
            self.execute(host, now, queued);
        }

        self.watch_roster(host);

        if let Some(outcome) = self.director.update(&self.registry, &mut self.store, host, now) {
            self.log_outcome(&outcome);
        }

        if self
            .scheduler
            .check(now, self.director.phase(), !self.store.is_empty())
        {
            self.roll(host, now, &SelectionOverrides::default());
        }

        let ended = self.store.update(&self.registry, host, now);
        self.announce_ended(host, &ended);

        self.director.tick_safety(host, now);
    }

    fn execute<H: SessionHost + ?Sized>(&mut self, host: &mut H, now: u64, queued: QueuedCommand) {
        let reply_to = match queued.issuer {
            Some(id) => Recipient::Participant(id),
            None => Recipient::All,
        };
        info!("Running {:?}", queued.command);

        match queued.command {
            Command::Test { effect, power, target } => {
                if self.director.phase() != RollPhase::Idle {
                    notice(host, reply_to, "A roll is already in progress");
                    return;
                }
                let overrides = SelectionOverrides {
                    target,
                    effect: Some(effect),
                    power,
                };
                self.roll(host, now, &overrides);
            }
            Command::Force => {
                self.clear(host, now);
                if !self.roll(host, now, &SelectionOverrides::default()) {
                    notice(host, reply_to, "Nobody to roll for");
                }
            }
            Command::Clear => {
                self.clear(host, now);
                notice(host, Recipient::All, "All effects cleared");
            }
            Command::Auto(toggle) => {
                let auto = toggle.resolve(self.scheduler.auto_trigger());
                self.scheduler.set_auto_trigger(auto);
                notice(host, reply_to, &format!("Automatic rolls {}", on_off(auto)));
            }
            Command::Enable(enabled) => {
                self.scheduler.set_enabled(enabled);
                if !enabled {
                    self.clear(host, now);
                }
                notice(host, reply_to, &format!("Roulette {}", on_off(enabled)));
            }
            Command::Status => {
                let text = self.status_line(now);
                notice(host, reply_to, &text);
            }
        }
    }

    /// Selects and starts a roll. Returns false when nothing was started.
    fn roll<H: SessionHost + ?Sized>(
        &mut self,
        host: &mut H,
        now: u64,
        overrides: &SelectionOverrides,
    ) -> bool {
        let seed = self.scheduler.next_roll_seed();
        let roster = host.participants();

        match self
            .selector
            .select_with(&self.registry, seed, &roster, &self.recent, overrides)
        {
            Ok(Some(selection)) => {
                self.recent.record(selection.target);
                let duration = self.director.start(host, now, seed, selection);
                self.scheduler.reschedule_after_roll(now, duration);
                true
            }
            Ok(None) => {
                self.scheduler.reschedule_idle(now);
                false
            }
            Err(e) => {
                warn!("Roll rejected: {}", e);
                notice(host, Recipient::All, &format!("Roll rejected: {}", e));
                self.scheduler.reschedule_idle(now);
                false
            }
        }
    }

    /// Removes every effect and abandons any running roll.
    pub fn clear<H: SessionHost + ?Sized>(&mut self, host: &mut H, now: u64) {
        self.director.cancel(host, now);
        let ended = self.store.clear(&self.registry, host);
        self.announce_ended(host, &ended);
    }

    fn watch_roster<H: SessionHost + ?Sized>(&mut self, host: &mut H) {
        let roster = host.participants();

        let departed: Vec<ParticipantId> = self
            .store
            .active_effects()
            .map(|a| a.participant)
            .filter(|id| !roster.iter().any(|p| p.id == *id && p.connected))
            .collect();
        for participant in departed {
            if let Some(ended) = self
                .store
                .remove_participant(&self.registry, host, participant, EndReason::Left)
            {
                self.announce_ended(host, &[ended]);
            }
        }

        // A respawn may start and finish between two ticks, so count spawns
        // rather than watching the alive flag.
        let mut seen = BTreeMap::new();
        for participant in &roster {
            let respawned = self
                .last_spawns
                .get(&participant.id)
                .map_or(false, |&before| before != participant.spawns);
            if respawned && participant.alive {
                self.store.reapply(&self.registry, host, participant.id);
            }
            seen.insert(participant.id, participant.spawns);
        }
        self.last_spawns = seen;
    }

    fn announce_ended<H: SessionHost + ?Sized>(&self, host: &mut H, ended: &[EndedEffect]) {
        for e in ended {
            host.present(
                Recipient::All,
                Presentation::EffectEnded {
                    participant: e.participant,
                    effect: e.effect.key().to_string(),
                    reason: e.reason,
                },
            );
        }
    }

    fn log_outcome(&self, outcome: &RollOutcome) {
        let Selection { effect, target, .. } = outcome.selection;
        if outcome.report.global {
            info!("{} is now active session-wide", effect);
        } else if !outcome.report.applied.is_empty() {
            info!("{} landed on {:?} ({})", effect, outcome.report.applied, target);
        }
        for failure in &outcome.report.failures {
            warn!("{} on {}: {}", effect, target, failure);
        }
    }

    pub fn status_line(&self, now: u64) -> String {
        let active: Vec<String> = self
            .store
            .active_effects()
            .map(|a| format!("{}:{}", a.participant, a.effect))
            .collect();
        let globals: Vec<String> = self
            .store
            .global_effects()
            .map(|g| g.effect.to_string())
            .collect();
        format!(
            "enabled={} auto={} phase={:?} next_roll_in={}ms active=[{}] global=[{}]",
            on_off(self.scheduler.is_enabled()),
            on_off(self.scheduler.auto_trigger()),
            self.director.phase(),
            self.scheduler.next_trigger_at().saturating_sub(now),
            active.join(", "),
            globals.join(", ")
        )
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &EffectRegistry {
        &self.registry
    }

    pub fn store(&self) -> &EffectStateStore {
        &self.store
    }

    pub fn director(&self) -> &AnimationDirector {
        &self.director
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn phase(&self) -> RollPhase {
        self.director.phase()
    }

    pub fn session_seed(&self) -> u64 {
        self.session_seed
    }

    pub fn pending_commands(&self) -> usize {
        self.commands.len()
    }
}

fn notice<H: SessionHost + ?Sized>(host: &mut H, recipient: Recipient, text: &str) {
    host.present(
        recipient,
        Presentation::Notice {
            text: text.to_string(),
        },
    );
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "on"
    } else {
        "off"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::EffectId;
    use crate::game::GameState;

    fn engine() -> Engine {
        let config = EngineConfig {
            seed: Some(7),
            ..EngineConfig::default()
        };
        Engine::new(config).unwrap()
    }

    fn session(players: u32) -> (Engine, GameState) {
        let mut game = GameState::new();
        for id in 1..=players {
            game.add_player(id, false);
        }
        let mut engine = engine();
        engine.start_session(&mut game, 0);
        (engine, game)
    }

    fn run(engine: &mut Engine, game: &mut GameState, from: u64, to: u64) {
        let mut now = from;
        while now <= to {
            game.update(now);
            engine.tick(game, now);
            now += 50;
        }
    }

    fn notices(game: &mut GameState) -> Vec<String> {
        game.take_outbox()
            .into_iter()
            .filter_map(|(_, m)| match m {
                Presentation::Notice { text } => Some(text),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = EngineConfig::default();
        config.interval.min_ms = 90_000;
        assert!(Engine::new(config).is_err());
    }

    #[test]
    fn test_commands_wait_for_tick() {
        let (mut engine, mut game) = session(2);
        engine.submit(None, "test speed_boost 3 1").unwrap();
        assert_eq!(engine.phase(), RollPhase::Idle);
        assert_eq!(engine.pending_commands(), 1);

        engine.tick(&mut game, 50);
        assert_eq!(engine.phase(), RollPhase::Rolling);
        assert_eq!(engine.pending_commands(), 0);
    }

    #[test]
    fn test_manual_roll_applies_pinned_selection() {
        let (mut engine, mut game) = session(2);
        engine.submit(None, "test speed_boost 3 1").unwrap();
        run(&mut engine, &mut game, 50, 10_050);

        let active = engine.store().active(1).unwrap();
        assert_eq!(active.effect, EffectId::SpeedBoost);
        assert_eq!(active.power.index, 3);
        assert!(engine.store().active(2).is_none());
    }

    #[test]
    fn test_rejected_text_never_queues() {
        let (mut engine, _game) = session(1);
        assert!(engine.submit(None, "test nonsense").is_err());
        assert_eq!(engine.pending_commands(), 0);
    }

    #[test]
    fn test_clear_removes_everything_and_goes_idle() {
        let (mut engine, mut game) = session(2);
        engine.submit(None, "test slowness 2 all").unwrap();
        run(&mut engine, &mut game, 50, 10_050);
        assert_eq!(engine.store().len(), 2);

        engine.submit(None, "test jitter 1 2").unwrap();
        run(&mut engine, &mut game, 10_100, 11_000);
        assert_eq!(engine.phase(), RollPhase::Rolling);

        engine.submit(None, "clear").unwrap();
        engine.tick(&mut game, 11_050);
        assert!(engine.store().is_empty());
        assert_eq!(engine.phase(), RollPhase::Idle);
        assert!((game.avatar(1).unwrap().movement_multiplier - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_force_requires_participants() {
        let (mut engine, mut game) = session(0);
        engine.submit(Some(1), "force").unwrap();
        engine.tick(&mut game, 50);
        assert_eq!(engine.phase(), RollPhase::Idle);
        assert!(notices(&mut game).iter().any(|n| n == "Nobody to roll for"));
    }

    #[test]
    fn test_force_bypasses_active_effect_gate() {
        let (mut engine, mut game) = session(2);
        engine.submit(None, "test speed_boost 3 1").unwrap();
        run(&mut engine, &mut game, 50, 10_050);
        assert!(!engine.store().is_empty());

        engine.submit(None, "force").unwrap();
        engine.tick(&mut game, 10_100);
        assert!(engine.store().is_empty());
        assert_eq!(engine.phase(), RollPhase::Rolling);
    }

    #[test]
    fn test_auto_roll_after_warmup() {
        let (mut engine, mut game) = session(3);
        run(&mut engine, &mut game, 0, 9_950);
        assert_eq!(engine.phase(), RollPhase::Idle);

        engine.tick(&mut game, 10_000);
        assert_eq!(engine.phase(), RollPhase::Rolling);
    }

    #[test]
    fn test_disable_stops_rolls() {
        let (mut engine, mut game) = session(3);
        engine.submit(None, "enable off").unwrap();
        run(&mut engine, &mut game, 0, 20_000);
        assert_eq!(engine.phase(), RollPhase::Idle);
        assert!(notices(&mut game).iter().any(|n| n == "Roulette off"));
    }

    #[test]
    fn test_auto_toggle() {
        let (mut engine, mut game) = session(1);
        engine.submit(Some(1), "auto toggle").unwrap();
        engine.tick(&mut game, 50);
        assert!(!engine.scheduler().auto_trigger());
        engine.submit(Some(1), "auto").unwrap();
        engine.tick(&mut game, 100);
        assert!(engine.scheduler().auto_trigger());
    }

    #[test]
    fn test_status_goes_to_issuer() {
        let (mut engine, mut game) = session(1);
        engine.submit(Some(1), "status").unwrap();
        engine.tick(&mut game, 50);
        let replies: Vec<(Recipient, Presentation)> = game
            .take_outbox()
            .into_iter()
            .filter(|(_, m)| matches!(m, Presentation::Notice { .. }))
            .collect();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].0, Recipient::Participant(1));
        match &replies[0].1 {
            Presentation::Notice { text } => {
                assert!(text.starts_with("enabled=on auto=on phase=Idle"))
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_departure_removes_effect() {
        let (mut engine, mut game) = session(2);
        engine.submit(None, "test speed_boost 3 2").unwrap();
        run(&mut engine, &mut game, 50, 10_050);
        assert!(engine.store().active(2).is_some());

        game.remove_player(&2);
        engine.tick(&mut game, 10_100);
        assert!(engine.store().active(2).is_none());
        assert!(game.take_outbox().iter().any(|(_, m)| matches!(
            m,
            Presentation::EffectEnded {
                participant: Some(2),
                reason: EndReason::Left,
                ..
            }
        )));
    }

    #[test]
    fn test_respawn_reapplies_without_resetting_clock() {
        let (mut engine, mut game) = session(2);
        engine.submit(None, "test speed_boost 3 1").unwrap();
        run(&mut engine, &mut game, 50, 10_050);
        let ends_at = engine.store().active(1).unwrap().ends_at;

        game.kill(1, 10_100);
        run(&mut engine, &mut game, 10_100, 13_200);

        let avatar = game.avatar(1).unwrap();
        assert!(avatar.alive);
        assert!((avatar.movement_multiplier - 2.0).abs() < 1e-6);
        assert_eq!(engine.store().active(1).unwrap().ends_at, ends_at);
    }

    #[test]
    fn test_same_seed_replays_session() {
        let outbox = |seed: u64| {
            let mut game = GameState::new();
            for id in 1..=4 {
                game.add_player(id, false);
            }
            let config = EngineConfig {
                seed: Some(seed),
                ..EngineConfig::default()
            };
            let mut engine = Engine::new(config).unwrap();
            engine.start_session(&mut game, 0);
            run(&mut engine, &mut game, 0, 120_000);
            game.take_outbox()
        };
        assert_eq!(outbox(11), outbox(11));
    }
}
