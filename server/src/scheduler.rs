//! Roll scheduling
//!
//! Decides when the next automatic roll is due. Interval draws and roll
//! seeds both come from one session-seeded stream, so a session replays
//! exactly from its seed and the same sequence of ticks.

use crate::animation::RollPhase;
use crate::config::EngineConfig;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Debug)]
pub struct Scheduler {
    enabled: bool,
    auto_trigger: bool,
    warmup_delay_ms: u64,
    min_interval_ms: u64,
    max_interval_ms: u64,
    postpone_ms: u64,
    session_start: u64,
    next_trigger_at: u64,
    rng: StdRng,
}

impl Scheduler {
    pub fn new(config: &EngineConfig, session_seed: u64) -> Self {
        Self {
            enabled: config.enabled,
            auto_trigger: config.auto_trigger,
            warmup_delay_ms: config.warmup_delay_ms,
            min_interval_ms: config.interval.min_ms,
            max_interval_ms: config.interval.max_ms,
            postpone_ms: config.active_effect_postpone_ms,
            session_start: 0,
            next_trigger_at: config.warmup_delay_ms,
            rng: StdRng::seed_from_u64(session_seed),
        }
    }

    /// Resets the clock for a new session. The first roll is due as soon
    /// as the warmup has passed.
    pub fn start_session(&mut self, now: u64, session_seed: u64) {
        self.session_start = now;
        self.next_trigger_at = now + self.warmup_delay_ms;
        self.rng = StdRng::seed_from_u64(session_seed);
    }

    /// True when an automatic roll should fire this tick.
    pub fn check(&mut self, now: u64, phase: RollPhase, effects_active: bool) -> bool {
        if !self.enabled || !self.auto_trigger || phase != RollPhase::Idle {
            return false;
        }
        if effects_active {
            let postponed = now + self.postpone_ms;
            if self.next_trigger_at < postponed {
                self.next_trigger_at = postponed;
            }
            return false;
        }
        if now.saturating_sub(self.session_start) < self.warmup_delay_ms {
            return false;
        }
        now >= self.next_trigger_at
    }

    pub fn next_roll_seed(&mut self) -> u64 {
        self.rng.gen()
    }

    /// Schedules the next roll after one that just started.
    pub fn reschedule_after_roll(&mut self, now: u64, animation_ms: u64) {
        self.next_trigger_at = now + animation_ms + self.draw_interval();
        info!("Next roll due at {}", self.next_trigger_at);
    }

    /// Schedules a retry when a roll could not fire.
    pub fn reschedule_idle(&mut self, now: u64) {
        self.next_trigger_at = now + self.draw_interval();
        debug!("Nothing to roll for, retrying at {}", self.next_trigger_at);
    }

    fn draw_interval(&mut self) -> u64 {
        if self.max_interval_ms <= self.min_interval_ms {
            return self.min_interval_ms;
        }
        self.rng.gen_range(self.min_interval_ms..=self.max_interval_ms)
    }

    pub fn next_trigger_at(&self) -> u64 {
        self.next_trigger_at
    }

    pub fn set_next_trigger_at(&mut self, at: u64) {
        self.next_trigger_at = at;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn auto_trigger(&self) -> bool {
        self.auto_trigger
    }

    pub fn set_auto_trigger(&mut self, auto_trigger: bool) {
        self.auto_trigger = auto_trigger;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IntervalConfig;

    fn scenario_config() -> EngineConfig {
        EngineConfig {
            warmup_delay_ms: 10_000,
            interval: IntervalConfig {
                min_ms: 30_000,
                max_ms: 60_000,
            },
            ..EngineConfig::default()
        }
    }

    #[test]
    fn test_never_fires_during_warmup() {
        let mut scheduler = Scheduler::new(&scenario_config(), 1);
        scheduler.start_session(0, 1);
        scheduler.set_next_trigger_at(0);
        assert!(!scheduler.check(5_000, RollPhase::Idle, false));
        assert!(!scheduler.check(9_999, RollPhase::Idle, false));
    }

    #[test]
    fn test_fires_iff_due_after_warmup() {
        let mut scheduler = Scheduler::new(&scenario_config(), 1);
        scheduler.start_session(0, 1);

        scheduler.set_next_trigger_at(40_000);
        assert!(scheduler.check(40_000, RollPhase::Idle, false));

        scheduler.set_next_trigger_at(40_001);
        assert!(!scheduler.check(40_000, RollPhase::Idle, false));
    }

    #[test]
    fn test_first_roll_due_after_warmup() {
        let mut scheduler = Scheduler::new(&scenario_config(), 1);
        scheduler.start_session(2_000, 1);
        assert_eq!(scheduler.next_trigger_at(), 12_000);
        assert!(!scheduler.check(11_999, RollPhase::Idle, false));
        assert!(scheduler.check(12_000, RollPhase::Idle, false));
    }

    #[test]
    fn test_busy_phase_blocks() {
        let mut scheduler = Scheduler::new(&scenario_config(), 1);
        scheduler.start_session(0, 1);
        assert!(!scheduler.check(50_000, RollPhase::Rolling, false));
        assert!(!scheduler.check(50_000, RollPhase::Applying, false));
    }

    #[test]
    fn test_active_effect_postpones() {
        let mut scheduler = Scheduler::new(&scenario_config(), 1);
        scheduler.start_session(0, 1);
        assert!(!scheduler.check(50_000, RollPhase::Idle, true));
        assert_eq!(scheduler.next_trigger_at(), 55_000);

        // Repeated checks keep it at least five seconds out, never earlier.
        assert!(!scheduler.check(50_050, RollPhase::Idle, true));
        assert_eq!(scheduler.next_trigger_at(), 55_050);

        assert!(!scheduler.check(55_000, RollPhase::Idle, false));
        assert!(scheduler.check(55_050, RollPhase::Idle, false));
    }

    #[test]
    fn test_switches() {
        let mut scheduler = Scheduler::new(&scenario_config(), 1);
        scheduler.start_session(0, 1);

        scheduler.set_auto_trigger(false);
        assert!(!scheduler.check(50_000, RollPhase::Idle, false));
        scheduler.set_auto_trigger(true);

        scheduler.set_enabled(false);
        assert!(!scheduler.check(50_000, RollPhase::Idle, false));
        scheduler.set_enabled(true);

        assert!(scheduler.check(50_000, RollPhase::Idle, false));
    }

    #[test]
    fn test_reschedule_within_bounds() {
        let mut scheduler = Scheduler::new(&scenario_config(), 7);
        scheduler.start_session(0, 7);
        for i in 0..200 {
            let now = i * 1_000;
            scheduler.reschedule_after_roll(now, 4_000);
            let delay = scheduler.next_trigger_at() - now;
            assert!((34_000..=64_000).contains(&delay), "delay {}", delay);
        }
    }

    #[test]
    fn test_same_seed_same_schedule() {
        let mut a = Scheduler::new(&scenario_config(), 99);
        let mut b = Scheduler::new(&scenario_config(), 99);
        a.start_session(0, 99);
        b.start_session(0, 99);
        for _ in 0..10 {
            assert_eq!(a.next_roll_seed(), b.next_roll_seed());
            a.reschedule_idle(0);
            b.reschedule_idle(0);
            assert_eq!(a.next_trigger_at(), b.next_trigger_at());
        }
    }
}
