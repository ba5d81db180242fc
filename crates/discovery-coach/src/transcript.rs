use discovery_gateway::{Message, Role};

/// Render the visible transcript as `ROLE: content` lines.
///
/// System messages hold the hidden persona instructions and are never
/// included.
pub fn transcript_to_text(messages: &[Message]) -> String {
    messages
        .iter()
        .filter(|m| !m.is_system())
        .map(|m| format!("{}: {}", m.role.as_str().to_uppercase(), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Count user messages that were answered by an assistant message
pub fn completed_exchanges(messages: &[Message]) -> usize {
    messages
        .windows(2)
        .filter(|pair| pair[0].role == Role::User && pair[1].role == Role::Assistant)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Message> {
        vec![
            Message::system("SECRET persona rules"),
            Message::user("Tell me about the last formal you attended."),
            Message::assistant("It was in March, I bought a dress for $80."),
            Message::user("What did you do with it after?"),
            Message::assistant("It's in my closet."),
        ]
    }

    #[test]
    fn test_transcript_excludes_system() {
        let text = transcript_to_text(&sample());
        assert!(!text.contains("SECRET"));
        assert!(!text.contains("SYSTEM:"));
    }

    #[test]
    fn test_transcript_line_format_and_order() {
        let text = transcript_to_text(&sample());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "USER: Tell me about the last formal you attended.");
        assert!(lines[1].starts_with("ASSISTANT: It was in March"));
        assert!(lines[2].starts_with("USER:"));
        assert!(lines[3].starts_with("ASSISTANT:"));
    }

    #[test]
    fn test_system_anywhere_is_dropped() {
        let messages = vec![
            Message::user("q"),
            Message::system("late system note"),
            Message::assistant("a"),
        ];
        assert_eq!(transcript_to_text(&messages), "USER: q\nASSISTANT: a");
    }

    #[test]
    fn test_empty_transcript() {
        assert_eq!(transcript_to_text(&[]), "");
        assert_eq!(transcript_to_text(&[Message::system("only")]), "");
    }

    #[test]
    fn test_completed_exchanges() {
        let messages = sample();
        assert_eq!(completed_exchanges(&messages[..1]), 0);
        assert_eq!(completed_exchanges(&messages[..2]), 0);
        assert_eq!(completed_exchanges(&messages[..3]), 1);
        assert_eq!(completed_exchanges(&messages[..4]), 1);
        assert_eq!(completed_exchanges(&messages), 2);
    }
}
