use discovery_gateway::Message;

/// Result of one interview turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Blank utterance, nothing was sent
    Ignored,
    /// The persona replied in full
    Replied { reply: Message, exchanges: usize },
    /// The reply stream was cut short; the received prefix was kept
    Interrupted { reply: Message, exchanges: usize },
}

impl TurnOutcome {
    pub fn reply(&self) -> Option<&Message> {
        match self {
            TurnOutcome::Ignored => None,
            TurnOutcome::Replied { reply, .. } | TurnOutcome::Interrupted { reply, .. } => {
                Some(reply)
            }
        }
    }

    pub fn was_interrupted(&self) -> bool {
        matches!(self, TurnOutcome::Interrupted { .. })
    }
}
