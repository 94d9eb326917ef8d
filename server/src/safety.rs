//! Freeze safety around rolls
//!
//! During a full reveal every eligible participant is held in place. The
//! monitor re-asserts that hold every tick, drops it when the roll ends and
//! sweeps once more a little later for anyone who slipped through. Releasing
//! is idempotent and safe to call at any point.

use crate::host::{AttrValue, Attribute, Recipient, SessionHost};
use log::{debug, info};
use shared::Presentation;

#[derive(Debug, Clone)]
pub struct SafetyMonitor {
    /// Freeze deadline while a full roll is playing.
    hold_until: Option<u64>,
    recheck_at: Option<u64>,
    recheck_delay_ms: u64,
}

impl SafetyMonitor {
    pub fn new(recheck_delay_ms: u64) -> Self {
        Self {
            hold_until: None,
            recheck_at: None,
            recheck_delay_ms,
        }
    }

    pub fn is_holding(&self) -> bool {
        self.hold_until.is_some()
    }

    pub fn recheck_at(&self) -> Option<u64> {
        self.recheck_at
    }

    /// Called whenever a roll starts. Quick rolls never freeze, but still
    /// release anything left over from before.
    pub fn begin_roll<H: SessionHost + ?Sized>(
        &mut self,
        host: &mut H,
        ends_at: u64,
        freeze: bool,
    ) {
        if !freeze {
            self.release_all(host);
            return;
        }
        self.hold_until = Some(ends_at);
        self.recheck_at = None;
        let frozen = self.enforce(host);
        info!("Froze {} participants until {}", frozen, ends_at);
        host.present(Recipient::All, Presentation::Frozen { until: ends_at });
    }

    /// Freezes any eligible participant not yet held until the deadline.
    /// Returns how many were touched.
    pub fn enforce<H: SessionHost + ?Sized>(&mut self, host: &mut H) -> usize {
        let Some(until) = self.hold_until else {
            return 0;
        };
        let mut touched = 0;
        for participant in host.eligible_participants() {
            let current = host
                .attribute(participant.id, Attribute::FreezeUntil)
                .and_then(|v| v.as_until())
                .flatten();
            if current.map_or(true, |at| at < until)
                && host.set_attribute(
                    participant.id,
                    Attribute::FreezeUntil,
                    AttrValue::Until(Some(until)),
                )
            {
                touched += 1;
            }
        }
        if touched > 0 {
            debug!("Freeze enforced on {} participants", touched);
        }
        touched
    }

    /// Called whenever a roll finishes, successfully or not.
    pub fn end_roll<H: SessionHost + ?Sized>(&mut self, host: &mut H, now: u64) {
        self.release_all(host);
        self.recheck_at = Some(now + self.recheck_delay_ms);
    }

    pub fn tick<H: SessionHost + ?Sized>(&mut self, host: &mut H, now: u64) {
        if self.hold_until.is_some() {
            self.enforce(host);
            return;
        }
        match self.recheck_at {
            Some(at) if now >= at => {
                self.recheck_at = None;
                let released = self.unfreeze_everyone(host);
                if released > 0 {
                    info!("Deferred check released {} lingering freezes", released);
                    host.present(Recipient::All, Presentation::Unfrozen);
                }
            }
            _ => {}
        }
    }

    /// Drops the hold and clears every freeze. Does nothing visible when
    /// nobody is frozen.
    pub fn release_all<H: SessionHost + ?Sized>(&mut self, host: &mut H) {
        let was_holding = self.hold_until.take().is_some();
        let released = self.unfreeze_everyone(host);
        if was_holding || released > 0 {
            debug!("Released freeze on {} participants", released);
            host.present(Recipient::All, Presentation::Unfrozen);
        }
    }

    pub fn reset<H: SessionHost + ?Sized>(&mut self, host: &mut H) {
        self.release_all(host);
        self.recheck_at = None;
    }

    fn unfreeze_everyone<H: SessionHost + ?Sized>(&self, host: &mut H) -> usize {
        let mut released = 0;
        for participant in host.participants() {
            let frozen = host
                .attribute(participant.id, Attribute::FreezeUntil)
                .and_then(|v| v.as_until())
                .flatten()
                .is_some();
            if frozen
                && host.set_attribute(
                    participant.id,
                    Attribute::FreezeUntil,
                    AttrValue::Until(None),
                )
            {
                released += 1;
            }
        }
        released
    }
}
