use serde::{Deserialize, Serialize};

pub const GRAVITY: f32 = 980.0;
pub const FLOOR_Y: f32 = 550.0;
pub const WORLD_WIDTH: f32 = 800.0;
pub const PLAYER_SIZE: f32 = 32.0;
pub const MAX_HEALTH: f32 = 100.0;

/// Protocol version spoken by the host and its clients.
pub const PROTOCOL_VERSION: u32 = 1;

pub type ParticipantId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Team {
    Red,
    Blue,
}

impl Team {
    pub fn other(self) -> Team {
        match self {
            Team::Red => Team::Blue,
            Team::Blue => Team::Red,
        }
    }
}

/// Who a roll is aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Target {
    All,
    Participant(ParticipantId),
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::All => write!(f, "everyone"),
            Target::Participant(id) => write!(f, "participant {}", id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    Beneficial,
    Detrimental,
    Chaotic,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Beneficial, Category::Detrimental, Category::Chaotic];
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn scale(&self, scalar: f32) -> Vec2 {
        Vec2 {
            x: self.x * scalar,
            y: self.y * scalar,
        }
    }

    pub fn add(&self, other: &Vec2) -> Vec2 {
        Vec2 {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }
}

/// Why an active effect stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndReason {
    Expired,
    Cleared,
    Left,
}

/// One-way messages describing what the roulette is doing, for whatever
/// renderer sits on the other end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Presentation {
    RollStarted {
        full: bool,
        duration_ms: u64,
        ambient_cue: bool,
    },
    Countdown {
        remaining_secs: u32,
    },
    TargetRevealed {
        target: Target,
    },
    EffectRevealed {
        effect: String,
        name: String,
        category: Category,
    },
    PowerRevealed {
        level: u8,
        label: String,
    },
    EffectApplied {
        target: Target,
        effect: String,
        name: String,
        level: u8,
        ends_at: u64,
    },
    EffectEnded {
        participant: Option<ParticipantId>,
        effect: String,
        reason: EndReason,
    },
    Frozen {
        until: u64,
    },
    Unfrozen,
    Notice {
        text: String,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    Join {
        client_version: u32,
        spectator: bool,
    },
    Command {
        text: String,
    },
    Heartbeat,
    Leave,

    Joined {
        participant_id: ParticipantId,
        team: Option<Team>,
    },
    Rejected {
        reason: String,
    },
    Presentation(Presentation),
}
