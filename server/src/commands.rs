//! Operator commands
//!
//! Commands arrive as text from whoever is connected, get parsed right at the
//! boundary and wait in a FIFO until the next tick drains it. Nothing touches
//! engine state from the receiving side.
//!
//! Grammar:
//!
//! ```text
//! test <effect> [power 1-5] [target <id>|all]
//! force
//! clear
//! auto on|off|toggle
//! enable on|off
//! status
//! ```
//!
//! `power` and `target` keywords are optional: `test poison 3 2` and
//! `test poison power 3 target 2` mean the same thing.

use crate::effects::{EffectId, PowerLevel};
use crate::error::ValidationError;
use shared::{ParticipantId, Target};
use std::collections::VecDeque;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    On,
    Off,
    Flip,
}

impl Toggle {
    pub fn resolve(self, current: bool) -> bool {
        match self {
            Toggle::On => true,
            Toggle::Off => false,
            Toggle::Flip => !current,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Manual roll with some fields pinned.
    Test {
        effect: EffectId,
        power: Option<PowerLevel>,
        target: Option<Target>,
    },
    /// Clear everything, then roll immediately.
    Force,
    Clear,
    Auto(Toggle),
    Enable(bool),
    Status,
}

impl FromStr for Command {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        let mut words = lowered.split_whitespace();
        let malformed = || ValidationError::MalformedCommand(s.trim().to_string());

        let verb = words.next().ok_or_else(malformed)?;
        let command = match verb {
            "test" => {
                let effect: EffectId = words.next().ok_or_else(malformed)?.parse()?;
                let rest: Vec<&str> = words.by_ref().collect();
                let (power, target) = parse_test_args(&rest).ok_or_else(malformed)??;
                Command::Test { effect, power, target }
            }
            "force" => Command::Force,
            "clear" => Command::Clear,
            "status" => Command::Status,
            "auto" => match words.next() {
                Some("on") => Command::Auto(Toggle::On),
                Some("off") => Command::Auto(Toggle::Off),
                Some("toggle") | None => Command::Auto(Toggle::Flip),
                Some(_) => return Err(malformed()),
            },
            "enable" => match words.next() {
                Some("on") => Command::Enable(true),
                Some("off") => Command::Enable(false),
                _ => return Err(malformed()),
            },
            _ => return Err(malformed()),
        };

        if words.next().is_some() {
            return Err(malformed());
        }
        Ok(command)
    }
}

type TestArgs = (Option<PowerLevel>, Option<Target>);

/// None when the shape is wrong; the inner error covers a bad power value.
fn parse_test_args(args: &[&str]) -> Option<Result<TestArgs, ValidationError>> {
    let mut power = None;
    let mut target = None;
    let mut i = 0;

    while i < args.len() {
        let word = args[i];
        match word {
            "power" => {
                i += 1;
                let value = args.get(i)?;
                match parse_power(value)? {
                    Ok(level) => power = Some(level),
                    Err(e) => return Some(Err(e)),
                }
            }
            "target" => {
                i += 1;
                target = Some(parse_target(args.get(i)?)?);
            }
            _ if power.is_none() && target.is_none() && word.parse::<u8>().is_ok() => {
                match parse_power(word)? {
                    Ok(level) => power = Some(level),
                    Err(e) => return Some(Err(e)),
                }
            }
            _ if target.is_none() => target = Some(parse_target(word)?),
            _ => return None,
        }
        i += 1;
    }

    Some(Ok((power, target)))
}

fn parse_power(word: &str) -> Option<Result<PowerLevel, ValidationError>> {
    let index: u8 = word.parse().ok()?;
    Some(PowerLevel::from_index(index))
}

fn parse_target(word: &str) -> Option<Target> {
    if word == "all" {
        return Some(Target::All);
    }
    word.parse::<ParticipantId>().ok().map(Target::Participant)
}

/// A parsed command and who sent it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueuedCommand {
    pub issuer: Option<ParticipantId>,
    pub command: Command,
}

#[derive(Debug, Default)]
pub struct CommandQueue {
    pending: VecDeque<QueuedCommand>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, issuer: Option<ParticipantId>, command: Command) {
        self.pending.push_back(QueuedCommand { issuer, command });
    }

    /// Parses and enqueues. Rejected text never reaches the queue.
    pub fn submit(
        &mut self,
        issuer: Option<ParticipantId>,
        text: &str,
    ) -> Result<Command, ValidationError> {
        let command: Command = text.parse()?;
        self.push(issuer, command);
        Ok(command)
    }

    pub fn drain(&mut self) -> Vec<QueuedCommand> {
        self.pending.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
