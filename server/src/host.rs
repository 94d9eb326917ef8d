//! Interfaces the engine consumes from the session it is embedded in
//!
//! The engine never owns participants or the simulated world. It reads the
//! roster, pokes attributes through a keyed getter/setter, adjusts session
//! globals and pushes presentation messages. All of it is fire-and-forget:
//! nothing here may block.

use shared::{ParticipantId, Presentation, Team, Vec2};

/// A roster entry as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Participant {
    pub id: ParticipantId,
    pub team: Option<Team>,
    pub alive: bool,
    pub connected: bool,
    /// Bumped by the host on every respawn.
    pub spawns: u32,
}

impl Participant {
    /// Connected, alive and on a team.
    pub fn is_eligible(&self) -> bool {
        self.connected && self.alive && self.team.is_some()
    }
}

/// Keys of the per-participant attributes effects may touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    Health,
    MaxHealth,
    Velocity,
    Position,
    EquippedItem,
    MovementMultiplier,
    DamageScale,
    Team,
    FreezeUntil,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Scalar(f32),
    Vector(Vec2),
    Item(Option<String>),
    Team(Team),
    Until(Option<u64>),
}

impl AttrValue {
    pub fn as_scalar(&self) -> Option<f32> {
        match self {
            AttrValue::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<Vec2> {
        match self {
            AttrValue::Vector(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_item(&self) -> Option<Option<String>> {
        match self {
            AttrValue::Item(item) => Some(item.clone()),
            _ => None,
        }
    }

    pub fn as_team(&self) -> Option<Team> {
        match self {
            AttrValue::Team(team) => Some(*team),
            _ => None,
        }
    }

    pub fn as_until(&self) -> Option<Option<u64>> {
        match self {
            AttrValue::Until(until) => Some(*until),
            _ => None,
        }
    }
}

/// Session-wide parameters mutated by global effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GlobalParam {
    Gravity,
    GlobalSpeed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    All,
    Participant(ParticipantId),
}

pub trait Roster {
    fn participants(&self) -> Vec<Participant>;

    fn eligible_participants(&self) -> Vec<Participant> {
        let mut eligible: Vec<Participant> = self
            .participants()
            .into_iter()
            .filter(Participant::is_eligible)
            .collect();
        eligible.sort_by_key(|p| p.id);
        eligible
    }
}

pub trait EngineState {
    fn attribute(&self, id: ParticipantId, attribute: Attribute) -> Option<AttrValue>;

    /// Returns false when the participant is unknown to the host.
    fn set_attribute(&mut self, id: ParticipantId, attribute: Attribute, value: AttrValue) -> bool;
}

pub trait GlobalParams {
    fn global(&self, param: GlobalParam) -> f32;
    fn set_global(&mut self, param: GlobalParam, value: f32);
}

/// Ordered per recipient, never acknowledged.
pub trait Presenter {
    fn present(&mut self, recipient: Recipient, message: Presentation);
}

/// Everything the engine needs from its host in one bound.
pub trait SessionHost: Roster + EngineState + GlobalParams + Presenter {}

impl<T: Roster + EngineState + GlobalParams + Presenter> SessionHost for T {}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedRoster(Vec<Participant>);

    impl Roster for FixedRoster {
        fn participants(&self) -> Vec<Participant> {
            self.0.clone()
        }
    }

    fn participant(id: u32, team: Option<Team>, alive: bool, connected: bool) -> Participant {
        Participant {
            id,
            team,
            alive,
            connected,
            spawns: 0,
        }
    }

    #[test]
    fn test_eligibility() {
        assert!(participant(1, Some(Team::Red), true, true).is_eligible());
        assert!(!participant(2, None, true, true).is_eligible());
        assert!(!participant(3, Some(Team::Blue), false, true).is_eligible());
        assert!(!participant(4, Some(Team::Blue), true, false).is_eligible());
    }

    #[test]
    fn test_eligible_participants_sorted_and_filtered() {
        let roster = FixedRoster(vec![
            participant(9, Some(Team::Red), true, true),
            participant(2, Some(Team::Blue), true, true),
            participant(5, None, true, true),
            participant(4, Some(Team::Red), false, true),
        ]);

        let ids: Vec<u32> = roster.eligible_participants().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![2, 9]);
    }

    #[test]
    fn test_attr_value_accessors() {
        assert_eq!(AttrValue::Scalar(1.5).as_scalar(), Some(1.5));
        assert_eq!(AttrValue::Scalar(1.5).as_team(), None);
        assert_eq!(
            AttrValue::Item(Some("crowbar".to_string())).as_item(),
            Some(Some("crowbar".to_string()))
        );
        assert_eq!(AttrValue::Until(None).as_until(), Some(None));
        assert_eq!(AttrValue::Team(Team::Red).as_team(), Some(Team::Red));
    }
}
