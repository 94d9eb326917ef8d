use crate::host::{
    AttrValue, Attribute, EngineState, GlobalParam, GlobalParams, Participant, Presenter,
    Recipient, Roster,
};
use log::{debug, info};
use shared::{
    ParticipantId, Presentation, Team, Vec2, FLOOR_Y, GRAVITY, MAX_HEALTH, PLAYER_SIZE,
    WORLD_WIDTH,
};
use std::collections::BTreeMap;

pub const RESPAWN_DELAY_MS: u64 = 3_000;
pub const STARTING_ITEM: &str = "pistol";

/// Simulated state of one connected participant.
#[derive(Debug, Clone, PartialEq)]
pub struct Avatar {
    pub id: ParticipantId,
    pub team: Option<Team>,
    pub alive: bool,
    pub connected: bool,
    pub health: f32,
    pub max_health: f32,
    pub position: Vec2,
    pub velocity: Vec2,
    pub equipped: Option<String>,
    pub movement_multiplier: f32,
    pub damage_scale: f32,
    pub freeze_until: Option<u64>,
    pub respawn_at: Option<u64>,
    pub spawns: u32,
}

impl Avatar {
    fn new(id: ParticipantId, team: Option<Team>) -> Self {
        Self {
            id,
            team,
            alive: team.is_some(),
            connected: true,
            health: MAX_HEALTH,
            max_health: MAX_HEALTH,
            position: spawn_point(id),
            velocity: Vec2::default(),
            equipped: Some(STARTING_ITEM.to_string()),
            movement_multiplier: 1.0,
            damage_scale: 1.0,
            freeze_until: None,
            respawn_at: None,
            spawns: 0,
        }
    }

    pub fn is_frozen(&self, now: u64) -> bool {
        self.freeze_until.map_or(false, |until| until > now)
    }

    /// Fresh body: everything effects may have touched goes back to default.
    fn reset_body(&mut self) {
        self.health = MAX_HEALTH;
        self.max_health = MAX_HEALTH;
        self.position = spawn_point(self.id);
        self.velocity = Vec2::default();
        self.equipped = Some(STARTING_ITEM.to_string());
        self.movement_multiplier = 1.0;
        self.damage_scale = 1.0;
    }
}

fn spawn_point(id: ParticipantId) -> Vec2 {
    Vec2::new(
        100.0 + (id as f32 * 60.0) % (WORLD_WIDTH - 200.0),
        FLOOR_Y - PLAYER_SIZE,
    )
}

/// The session world the engine acts on.
#[derive(Debug, Clone)]
pub struct GameState {
    pub tick: u32,
    pub now: u64,
    pub gravity: f32,
    pub global_speed: f32,
    avatars: BTreeMap<ParticipantId, Avatar>,
    outbox: Vec<(Recipient, Presentation)>,
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

impl GameState {
    pub fn new() -> Self {
        Self {
            tick: 0,
            now: 0,
            gravity: GRAVITY,
            global_speed: 1.0,
            avatars: BTreeMap::new(),
            outbox: Vec::new(),
        }
    }

    /// Adds a participant on the smaller team. Spectators get no team and
    /// are never eligible.
    pub fn add_player(&mut self, id: ParticipantId, spectator: bool) -> Option<Team> {
        let team = if spectator { None } else { Some(self.smaller_team()) };
        let avatar = Avatar::new(id, team);
        info!(
            "Added participant {} on {:?} at ({}, {})",
            id, team, avatar.position.x, avatar.position.y
        );
        self.avatars.insert(id, avatar);
        team
    }

    fn smaller_team(&self) -> Team {
        let red = self.avatars.values().filter(|a| a.team == Some(Team::Red)).count();
        let blue = self.avatars.values().filter(|a| a.team == Some(Team::Blue)).count();
        if blue < red {
            Team::Blue
        } else {
            Team::Red
        }
    }

    pub fn remove_player(&mut self, id: &ParticipantId) -> Option<Avatar> {
        let removed = self.avatars.remove(id);
        if removed.is_some() {
            info!("Removed participant {}", id);
        }
        removed
    }

    pub fn avatar(&self, id: ParticipantId) -> Option<&Avatar> {
        self.avatars.get(&id)
    }

    pub fn avatars(&self) -> impl Iterator<Item = &Avatar> {
        self.avatars.values()
    }

    pub fn player_count(&self) -> usize {
        self.avatars.len()
    }

    /// Damage after the participant's damage scale. Returns the health lost.
    pub fn apply_damage(&mut self, id: ParticipantId, amount: f32, now: u64) -> f32 {
        let Some(avatar) = self.avatars.get_mut(&id) else {
            return 0.0;
        };
        if !avatar.alive {
            return 0.0;
        }
        let dealt = (amount * avatar.damage_scale).max(0.0).min(avatar.health);
        avatar.health -= dealt;
        if avatar.health <= 0.0 {
            self.kill(id, now);
        }
        dealt
    }

    pub fn kill(&mut self, id: ParticipantId, now: u64) {
        if let Some(avatar) = self.avatars.get_mut(&id) {
            if avatar.alive {
                avatar.alive = false;
                avatar.health = 0.0;
                avatar.velocity = Vec2::default();
                avatar.respawn_at = Some(now + RESPAWN_DELAY_MS);
                info!("Participant {} died, respawning at {}", id, now + RESPAWN_DELAY_MS);
            }
        }
    }

    pub fn respawn(&mut self, id: ParticipantId) {
        if let Some(avatar) = self.avatars.get_mut(&id) {
            if avatar.team.is_none() {
                return;
            }
            avatar.reset_body();
            avatar.alive = true;
            avatar.respawn_at = None;
            avatar.spawns += 1;
            debug!("Participant {} respawned", id);
        }
    }

    /// Advances the world to `now`.
    pub fn update(&mut self, now: u64) {
        let dt = now.saturating_sub(self.now) as f32 / 1000.0;
        self.now = now;
        self.tick = self.tick.wrapping_add(1);

        let due: Vec<ParticipantId> = self
            .avatars
            .values()
            .filter(|a| !a.alive && a.respawn_at.map_or(false, |at| now >= at))
            .map(|a| a.id)
            .collect();
        for id in due {
            self.respawn(id);
        }

        self.update_physics(now, dt);
    }

    fn update_physics(&mut self, now: u64, dt: f32) {
        let gravity = self.gravity;
        let speed = self.global_speed;
        for avatar in self.avatars.values_mut() {
            if !avatar.alive || avatar.is_frozen(now) {
                continue;
            }
            let on_ground = avatar.position.y + PLAYER_SIZE >= FLOOR_Y;
            if !on_ground {
                avatar.velocity.y += gravity * dt;
            }

            let step = Vec2::new(
                avatar.velocity.x * avatar.movement_multiplier,
                avatar.velocity.y,
            );
            avatar.position = avatar.position.add(&step.scale(dt * speed));
            avatar.position.x = avatar.position.x.max(0.0).min(WORLD_WIDTH - PLAYER_SIZE);

            if avatar.position.y + PLAYER_SIZE >= FLOOR_Y {
                avatar.position.y = FLOOR_Y - PLAYER_SIZE;
                avatar.velocity.y = 0.0;
            }
        }
    }

    pub fn take_outbox(&mut self) -> Vec<(Recipient, Presentation)> {
        std::mem::take(&mut self.outbox)
    }
}

impl Roster for GameState {
    fn participants(&self) -> Vec<Participant> {
        self.avatars
            .values()
            .map(|a| Participant {
                id: a.id,
                team: a.team,
                alive: a.alive,
                connected: a.connected,
                spawns: a.spawns,
            })
            .collect()
    }
}

impl EngineState for GameState {
    fn attribute(&self, id: ParticipantId, attribute: Attribute) -> Option<AttrValue> {
        let avatar = self.avatars.get(&id)?;
        let value = match attribute {
            Attribute::Health => AttrValue::Scalar(avatar.health),
            Attribute::MaxHealth => AttrValue::Scalar(avatar.max_health),
            Attribute::Velocity => AttrValue::Vector(avatar.velocity),
            Attribute::Position => AttrValue::Vector(avatar.position),
            Attribute::EquippedItem => AttrValue::Item(avatar.equipped.clone()),
            Attribute::MovementMultiplier => AttrValue::Scalar(avatar.movement_multiplier),
            Attribute::DamageScale => AttrValue::Scalar(avatar.damage_scale),
            Attribute::Team => AttrValue::Team(avatar.team?),
            Attribute::FreezeUntil => AttrValue::Until(avatar.freeze_until),
        };
        Some(value)
    }

    fn set_attribute(&mut self, id: ParticipantId, attribute: Attribute, value: AttrValue) -> bool {
        let now = self.now;
        let Some(avatar) = self.avatars.get_mut(&id) else {
            return false;
        };
        match (attribute, value) {
            (Attribute::Health, AttrValue::Scalar(v)) => avatar.health = v.min(avatar.max_health),
            (Attribute::MaxHealth, AttrValue::Scalar(v)) => {
                avatar.max_health = v;
                avatar.health = avatar.health.min(v);
            }
            (Attribute::Velocity, AttrValue::Vector(v)) => avatar.velocity = v,
            (Attribute::Position, AttrValue::Vector(v)) => avatar.position = v,
            (Attribute::EquippedItem, AttrValue::Item(item)) => avatar.equipped = item,
            (Attribute::MovementMultiplier, AttrValue::Scalar(v)) => avatar.movement_multiplier = v,
            (Attribute::DamageScale, AttrValue::Scalar(v)) => avatar.damage_scale = v,
            (Attribute::Team, AttrValue::Team(team)) => {
                if avatar.team != Some(team) {
                    avatar.team = Some(team);
                    // Switching sides goes through a respawn.
                    if avatar.alive {
                        avatar.alive = false;
                        avatar.respawn_at = Some(now);
                    }
                    info!("Participant {} moved to {:?}", id, team);
                }
            }
            (Attribute::FreezeUntil, AttrValue::Until(until)) => avatar.freeze_until = until,
            (attribute, value) => {
                debug!("Ignoring {:?} for {:?} on participant {}", value, attribute, id);
                return false;
            }
        }
        true
    }
}

impl GlobalParams for GameState {
    fn global(&self, param: GlobalParam) -> f32 {
        match param {
            GlobalParam::Gravity => self.gravity,
            GlobalParam::GlobalSpeed => self.global_speed,
        }
    }

    fn set_global(&mut self, param: GlobalParam, value: f32) {
        match param {
            GlobalParam::Gravity => self.gravity = value,
            GlobalParam::GlobalSpeed => self.global_speed = value,
        }
    }
}

impl Presenter for GameState {
    fn present(&mut self, recipient: Recipient, message: Presentation) {
        self.outbox.push((recipient, message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_teams_are_balanced() {
        let mut game = GameState::new();
        assert_eq!(game.add_player(1, false), Some(Team::Red));
        assert_eq!(game.add_player(2, false), Some(Team::Blue));
        assert_eq!(game.add_player(3, false), Some(Team::Red));
        assert_eq!(game.add_player(4, true), None);
        assert_eq!(game.add_player(5, false), Some(Team::Blue));
    }

    #[test]
    fn test_spectators_are_not_eligible() {
        let mut game = GameState::new();
        game.add_player(1, false);
        game.add_player(2, true);
        let eligible: Vec<ParticipantId> = game
            .eligible_participants()
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(eligible, vec![1]);
    }

    #[test]
    fn test_damage_respects_scale_and_kills() {
        let mut game = GameState::new();
        game.add_player(1, false);
        game.set_attribute(1, Attribute::DamageScale, AttrValue::Scalar(0.5));

        assert_approx_eq!(game.apply_damage(1, 40.0, 0), 20.0, 1e-6);
        assert_approx_eq!(game.avatar(1).unwrap().health, 80.0, 1e-6);

        game.set_attribute(1, Attribute::DamageScale, AttrValue::Scalar(1.0));
        game.apply_damage(1, 500.0, 1_000);
        let avatar = game.avatar(1).unwrap();
        assert!(!avatar.alive);
        assert_eq!(avatar.respawn_at, Some(1_000 + RESPAWN_DELAY_MS));
    }

    #[test]
    fn test_respawn_resets_body() {
        let mut game = GameState::new();
        game.add_player(1, false);
        game.set_attribute(1, Attribute::MovementMultiplier, AttrValue::Scalar(3.0));
        game.set_attribute(1, Attribute::EquippedItem, AttrValue::Item(None));
        game.kill(1, 0);

        game.update(RESPAWN_DELAY_MS - 1);
        assert!(!game.avatar(1).unwrap().alive);
        game.update(RESPAWN_DELAY_MS);

        let avatar = game.avatar(1).unwrap();
        assert!(avatar.alive);
        assert_approx_eq!(avatar.movement_multiplier, 1.0, 1e-6);
        assert_eq!(avatar.equipped.as_deref(), Some(STARTING_ITEM));
        assert_approx_eq!(avatar.health, MAX_HEALTH, 1e-6);
    }

    #[test]
    fn test_team_change_goes_through_respawn() {
        let mut game = GameState::new();
        game.add_player(1, false);
        game.update(500);
        assert!(game.set_attribute(1, Attribute::Team, AttrValue::Team(Team::Blue)));

        let avatar = game.avatar(1).unwrap();
        assert_eq!(avatar.team, Some(Team::Blue));
        assert!(!avatar.alive);

        game.update(550);
        assert!(game.avatar(1).unwrap().alive);
    }

    #[test]
    fn test_frozen_avatars_do_not_move() {
        let mut game = GameState::new();
        game.add_player(1, false);
        game.set_attribute(1, Attribute::Velocity, AttrValue::Vector(Vec2::new(100.0, 0.0)));
        game.set_attribute(1, Attribute::FreezeUntil, AttrValue::Until(Some(2_000)));
        let start = game.avatar(1).unwrap().position;

        game.update(1_000);
        assert_approx_eq!(game.avatar(1).unwrap().position.x, start.x, 1e-6);

        // The freeze has lapsed by this tick, so it covers the whole second.
        game.update(2_000);
        assert_approx_eq!(game.avatar(1).unwrap().position.x, start.x + 100.0, 1e-3);
    }

    #[test]
    fn test_movement_multiplier_and_global_speed() {
        let mut game = GameState::new();
        game.add_player(1, false);
        game.set_attribute(1, Attribute::Velocity, AttrValue::Vector(Vec2::new(100.0, 0.0)));
        game.set_attribute(1, Attribute::MovementMultiplier, AttrValue::Scalar(2.0));
        game.set_global(GlobalParam::GlobalSpeed, 1.5);
        let start = game.avatar(1).unwrap().position;

        game.update(1_000);
        assert_approx_eq!(game.avatar(1).unwrap().position.x, start.x + 300.0, 1e-3);
    }

    #[test]
    fn test_gravity_pulls_airborne_avatars_to_floor() {
        let mut game = GameState::new();
        game.add_player(1, false);
        game.set_attribute(1, Attribute::Position, AttrValue::Vector(Vec2::new(100.0, 100.0)));
        for step in 1..=100 {
            game.update(step * 50);
        }
        assert_approx_eq!(game.avatar(1).unwrap().position.y, FLOOR_Y - PLAYER_SIZE, 1e-3);
    }

    #[test]
    fn test_mismatched_attribute_value_rejected() {
        let mut game = GameState::new();
        game.add_player(1, false);
        assert!(!game.set_attribute(1, Attribute::Health, AttrValue::Team(Team::Red)));
        assert!(!game.set_attribute(9, Attribute::Health, AttrValue::Scalar(1.0)));
        assert_eq!(game.attribute(9, Attribute::Health), None);
    }

    #[test]
    fn test_presentations_collect_in_order() {
        let mut game = GameState::new();
        game.present(Recipient::All, Presentation::Unfrozen);
        game.present(Recipient::Participant(2), Presentation::Countdown { remaining_secs: 3 });
        let outbox = game.take_outbox();
        assert_eq!(outbox.len(), 2);
        assert_eq!(outbox[0].1, Presentation::Unfrozen);
        assert!(game.take_outbox().is_empty());
    }
}
