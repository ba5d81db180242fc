use chrono::{DateTime, Utc};
use discovery_coach::{completed_exchanges, fallback_persona, FeedbackReport};
use discovery_gateway::Message;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::RequiredField;

/// Where the session is in the setup → interview → analysis flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Setup,
    Interviewing,
    Analyzed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Setup => write!(f, "setup"),
            Phase::Interviewing => write!(f, "interviewing"),
            Phase::Analyzed => write!(f, "analyzed"),
        }
    }
}

/// Raw setup inputs as typed by the user
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetupForm {
    pub problem_statement: String,
    pub customer_segment: String,
    pub hypothesis: String,
}

impl SetupForm {
    pub fn new(
        problem_statement: impl Into<String>,
        customer_segment: impl Into<String>,
        hypothesis: impl Into<String>,
    ) -> Self {
        Self {
            problem_statement: problem_statement.into(),
            customer_segment: customer_segment.into(),
            hypothesis: hypothesis.into(),
        }
    }

    /// Fields that are empty or whitespace-only, in form order
    pub(crate) fn missing(&self, fields: &[RequiredField]) -> Vec<RequiredField> {
        fields
            .iter()
            .copied()
            .filter(|field| {
                let value = match field {
                    RequiredField::ProblemStatement => &self.problem_statement,
                    RequiredField::CustomerSegment => &self.customer_segment,
                    RequiredField::Hypothesis => &self.hypothesis,
                    RequiredField::ApiKey => return false,
                };
                value.trim().is_empty()
            })
            .collect()
    }
}

/// Business context frozen when the interview starts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessContext {
    pub problem_statement: String,
    pub customer_segment: String,
    pub hypothesis: String,
}

impl From<&SetupForm> for BusinessContext {
    fn from(form: &SetupForm) -> Self {
        Self {
            problem_statement: form.problem_statement.trim().to_string(),
            customer_segment: form.customer_segment.trim().to_string(),
            hypothesis: form.hypothesis.trim().to_string(),
        }
    }
}

/// The character the model plays
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum Persona {
    #[default]
    None,
    /// Backstory drafted by the model, cached for the session
    Generated(String),
    /// Built from the raw customer segment
    Fallback(String),
}

impl Persona {
    pub fn fallback(segment: &str) -> Self {
        Persona::Fallback(fallback_persona(segment))
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Persona::None => None,
            Persona::Generated(text) | Persona::Fallback(text) => Some(text),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Persona::None => "none",
            Persona::Generated(_) => "generated",
            Persona::Fallback(_) => "fallback",
        }
    }
}

/// Which persona context the user picked for the interview
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PersonaChoice {
    /// Use the generated backstory if one exists
    #[default]
    Generated,
    /// Ignore any generated backstory and use the raw segment
    RawInputs,
}

/// Everything one simulator session holds
#[derive(Debug, Clone)]
pub struct SessionState {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub phase: Phase,
    pub context: Option<BusinessContext>,
    pub persona: Persona,
    /// System prompt first, then alternating user/assistant turns
    pub transcript: Vec<Message>,
    pub feedback: Option<FeedbackReport>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            phase: Phase::Setup,
            context: None,
            persona: Persona::None,
            transcript: Vec::new(),
            feedback: None,
        }
    }

    /// Transcript without the hidden system prompt
    pub fn visible_messages(&self) -> impl Iterator<Item = &Message> {
        self.transcript.iter().filter(|m| !m.is_system())
    }

    pub fn exchanges(&self) -> usize {
        completed_exchanges(&self.transcript)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_is_setup() {
        let state = SessionState::new();
        assert_eq!(state.phase, Phase::Setup);
        assert!(state.context.is_none());
        assert_eq!(state.persona, Persona::None);
        assert!(state.transcript.is_empty());
        assert!(state.feedback.is_none());
    }

    #[test]
    fn test_whitespace_counts_as_missing() {
        let form = SetupForm::new("  ", "segment", "\n\t");
        let missing = form.missing(&[
            RequiredField::ApiKey,
            RequiredField::ProblemStatement,
            RequiredField::CustomerSegment,
            RequiredField::Hypothesis,
        ]);
        assert_eq!(
            missing,
            vec![RequiredField::ProblemStatement, RequiredField::Hypothesis]
        );
    }

    #[test]
    fn test_context_is_trimmed() {
        let context = BusinessContext::from(&SetupForm::new(" p ", "s\n", "h"));
        assert_eq!(context.problem_statement, "p");
        assert_eq!(context.customer_segment, "s");
    }

    #[test]
    fn test_persona_serializes_tagged() {
        let json = serde_json::to_value(Persona::Generated("Maya".to_string())).unwrap();
        assert_eq!(json["kind"], "generated");
        assert_eq!(json["text"], "Maya");
    }

    #[test]
    fn test_fallback_persona_contains_segment() {
        let persona = Persona::fallback("Commuting grad students");
        assert_eq!(
            persona.text(),
            Some("A member of this segment: Commuting grad students")
        );
        assert_eq!(persona.kind_name(), "fallback");
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(SessionState::new().id, SessionState::new().id);
    }
}
