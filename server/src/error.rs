//! Error types for the roulette engine
//!
//! Nothing in here is fatal to the host process. Every failure degrades to
//! "no effect this cycle" plus a log line.

use shared::ParticipantId;

/// Rejected input: bad effect ids, power indices, commands or targets.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("unknown effect id: {0}")]
    UnknownEffect(String),

    #[error("power level {0} is out of range (expected 1-5)")]
    PowerOutOfRange(u8),

    #[error("participant {0} is not eligible for effects")]
    IneligibleParticipant(ParticipantId),

    #[error("effect {effect} cannot target {target}")]
    ScopeMismatch { effect: String, target: String },

    #[error("malformed command: {0}")]
    MalformedCommand(String),
}

/// A handler could not apply its effect to a target.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ApplyError {
    #[error("participant {0} has no engine state")]
    MissingParticipant(ParticipantId),

    #[error("participant {participant} has nothing for {effect} to act on")]
    NothingToAffect {
        participant: ParticipantId,
        effect: &'static str,
    },

    #[error("global effect {0} is already active")]
    GlobalAlreadyActive(&'static str),

    #[error("no eligible participants for {0}")]
    NoTargets(&'static str),
}

/// Problems loading or validating the engine configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_messages() {
        let err = ValidationError::UnknownEffect("moon_walk".to_string());
        assert_eq!(err.to_string(), "unknown effect id: moon_walk");

        let err = ValidationError::PowerOutOfRange(9);
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn test_config_error_from_json() {
        let parse = serde_json::from_str::<serde_json::Value>("{ nope").unwrap_err();
        let err: ConfigError = parse.into();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
