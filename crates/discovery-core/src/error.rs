use std::fmt;
use thiserror::Error;

use crate::Phase;

/// Setup input that must be present before an action can run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredField {
    ApiKey,
    ProblemStatement,
    CustomerSegment,
    Hypothesis,
}

impl fmt::Display for RequiredField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequiredField::ApiKey => write!(f, "API key"),
            RequiredField::ProblemStatement => write!(f, "problem statement"),
            RequiredField::CustomerSegment => write!(f, "customer segment"),
            RequiredField::Hypothesis => write!(f, "hypothesis"),
        }
    }
}

fn join_fields(fields: &[RequiredField]) -> String {
    fields
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Missing required input: {}", join_fields(.missing))]
    Validation { missing: Vec<RequiredField> },

    #[error("Gateway error: {0}")]
    Gateway(#[from] discovery_gateway::GatewayError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] discovery_gateway::ConfigError),

    #[error("Cannot {operation} while in {phase} phase")]
    InvalidPhase {
        operation: &'static str,
        phase: Phase,
    },

    #[error("Interview needs at least {required} completed exchange(s), found {actual}")]
    NotEnoughExchanges { required: usize, actual: usize },

    #[error("Request was cancelled before any text arrived")]
    Cancelled,

    #[error("Transcript has no interview messages to coach")]
    EmptyTranscript,

    #[error("Failed to write export: {0}")]
    Export(#[from] std::io::Error),
}

impl From<discovery_coach::CoachError> for SessionError {
    fn from(error: discovery_coach::CoachError) -> Self {
        match error {
            discovery_coach::CoachError::EmptyTranscript => SessionError::EmptyTranscript,
            discovery_coach::CoachError::Gateway(e) => SessionError::Gateway(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_names_every_missing_field() {
        let error = SessionError::Validation {
            missing: vec![RequiredField::ApiKey, RequiredField::Hypothesis],
        };
        assert_eq!(
            error.to_string(),
            "Missing required input: API key, hypothesis"
        );
    }

    #[test]
    fn test_invalid_phase_message() {
        let error = SessionError::InvalidPhase {
            operation: "send a turn",
            phase: Phase::Setup,
        };
        assert_eq!(error.to_string(), "Cannot send a turn while in setup phase");
    }
}
