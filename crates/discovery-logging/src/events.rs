use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Which streamed response an event refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamStage {
    Interview,
    Coach,
}

impl std::fmt::Display for StreamStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamStage::Interview => write!(f, "interview"),
            StreamStage::Coach => write!(f, "coach"),
        }
    }
}

/// Structured log events for one simulator session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEvent {
    SessionStarted {
        session_id: String,
        provider: String,
        model: String,
    },
    PersonaGenerated {
        session_id: String,
        persona_len: usize,
        duration_secs: f64,
    },
    InterviewStarted {
        session_id: String,
        /// `generated` or `fallback`
        persona: String,
        hypothesis_preview: String,
    },
    TurnCompleted {
        session_id: String,
        exchange: usize,
        deltas: usize,
        reply_len: usize,
        duration_secs: f64,
    },
    StreamInterrupted {
        session_id: String,
        stage: StreamStage,
        received_len: usize,
    },
    InterviewEnded {
        session_id: String,
        exchanges: usize,
    },
    FeedbackGenerated {
        session_id: String,
        feedback_len: usize,
        score: Option<u8>,
        verdict: Option<String>,
        duration_secs: f64,
    },
    ErrorEncountered {
        session_id: String,
        operation: String,
        error: String,
    },
    SessionReset {
        previous_session_id: String,
        session_id: String,
    },
    TranscriptExported {
        session_id: String,
        path: PathBuf,
        bytes: usize,
    },
}

impl LogEvent {
    /// Whether the interactive console already reports this outcome, so the
    /// pretty renderer stays quiet about it
    pub fn shown_by_console(&self) -> bool {
        matches!(
            self,
            LogEvent::PersonaGenerated { .. }
                | LogEvent::TurnCompleted { .. }
                | LogEvent::StreamInterrupted { .. }
                | LogEvent::FeedbackGenerated { .. }
                | LogEvent::ErrorEncountered { .. }
                | LogEvent::TranscriptExported { .. }
        )
    }

    /// Add a timestamp to serialize with the event
    fn with_timestamp(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(obj) = value.as_object_mut() {
            obj.insert(
                "timestamp".to_string(),
                serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
            );
        }
        value
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format with colors and visual structure
    #[default]
    Pretty,
    /// JSON lines format for machine consumption
    Json,
    /// Compact single-line format
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

/// Logger for session events - handles both console output and file logging
pub struct Logger {
    format: LogFormat,
    console: bool,
    file_writer: Option<Mutex<File>>,
}

impl Logger {
    pub fn new(format: LogFormat) -> Self {
        Self {
            format,
            console: true,
            file_writer: None,
        }
    }

    /// Logger that drops every event
    pub fn silent() -> Self {
        Self {
            format: LogFormat::Compact,
            console: false,
            file_writer: None,
        }
    }

    /// Create a logger with file output in addition to console
    pub fn with_file(format: LogFormat, log_path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        Ok(Self {
            format,
            console: true,
            file_writer: Some(Mutex::new(file)),
        })
    }

    pub fn log(&self, event: &LogEvent) {
        // File output is always JSON
        if let Some(ref writer) = self.file_writer {
            if let Ok(mut file) = writer.lock() {
                let json = event.with_timestamp();
                let _ = writeln!(file, "{}", json);
            }
        }

        if !self.console {
            return;
        }

        match self.format {
            LogFormat::Json => self.log_json(event),
            LogFormat::Pretty if event.shown_by_console() => {}
            LogFormat::Pretty => self.log_pretty(event),
            LogFormat::Compact => self.log_compact(event),
        }
    }

    fn log_json(&self, event: &LogEvent) {
        if let Ok(json) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{}", json);
        }
    }

    fn log_pretty(&self, event: &LogEvent) {
        let mut stderr = std::io::stderr();
        match event {
            LogEvent::SessionStarted {
                provider, model, ..
            } => {
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{}",
                    "╭─────────────────────────────────────────────────────────────────────╮"
                        .bright_blue()
                );
                let _ = writeln!(
                    stderr,
                    "{}  {}{}",
                    "│".bright_blue(),
                    "discovery-sim".bold().bright_white(),
                    " ".repeat(54) + &"│".bright_blue().to_string()
                );
                let _ = writeln!(
                    stderr,
                    "{}  {} {}",
                    "│".bright_blue(),
                    "Provider:".dimmed(),
                    Self::truncate_with_padding(provider, 55, 58).dimmed()
                );
                let _ = writeln!(
                    stderr,
                    "{}  {} {}",
                    "│".bright_blue(),
                    "Model:".dimmed(),
                    Self::truncate_with_padding(model, 58, 61).dimmed()
                );
                let _ = writeln!(
                    stderr,
                    "{}",
                    "╰─────────────────────────────────────────────────────────────────────╯"
                        .bright_blue()
                );
                let _ = writeln!(stderr);
            }
            LogEvent::InterviewStarted { persona, .. } => {
                let header = format!("─ Interview ({} persona) ", persona);
                let padding = "─".repeat(67usize.saturating_sub(header.chars().count()));
                let _ = writeln!(
                    stderr,
                    "{}{}{}",
                    "┌".bright_blue(),
                    header.bright_blue().bold(),
                    padding.bright_blue()
                );
                let _ = writeln!(stderr);
            }
            LogEvent::InterviewEnded { exchanges, .. } => {
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{}",
                    "└─────────────────────────────────────────────────────────────────────┘"
                        .bright_blue()
                );
                let _ = writeln!(
                    stderr,
                    "  {} Interview ended after {} {}",
                    "■".bright_blue(),
                    exchanges,
                    if *exchanges == 1 {
                        "exchange"
                    } else {
                        "exchanges"
                    }
                );
                let _ = writeln!(stderr);
            }
            LogEvent::SessionReset { .. } => {
                let _ = writeln!(stderr, "  {} Session reset", "↺".bright_cyan());
                let _ = writeln!(stderr);
            }
            LogEvent::PersonaGenerated { .. }
            | LogEvent::TurnCompleted { .. }
            | LogEvent::StreamInterrupted { .. }
            | LogEvent::FeedbackGenerated { .. }
            | LogEvent::ErrorEncountered { .. }
            | LogEvent::TranscriptExported { .. } => {}
        }
    }

    fn log_compact(&self, event: &LogEvent) {
        let mut stderr = std::io::stderr();
        let timestamp = chrono::Utc::now().format("%H:%M:%S");
        let msg = match event {
            LogEvent::SessionStarted {
                provider, model, ..
            } => format!("[{}] session:start {} {}", timestamp, provider, model),
            LogEvent::PersonaGenerated {
                persona_len,
                duration_secs,
                ..
            } => format!(
                "[{}] persona:done {}c {:.1}s",
                timestamp, persona_len, duration_secs
            ),
            LogEvent::InterviewStarted { persona, .. } => {
                format!("[{}] interview:start {}", timestamp, persona)
            }
            LogEvent::TurnCompleted {
                exchange,
                deltas,
                duration_secs,
                ..
            } => format!(
                "[{}] turn:{} {}d {:.1}s",
                timestamp, exchange, deltas, duration_secs
            ),
            LogEvent::StreamInterrupted {
                stage,
                received_len,
                ..
            } => format!("[{}] {}:interrupted {}c", timestamp, stage, received_len),
            LogEvent::InterviewEnded { exchanges, .. } => {
                format!("[{}] interview:end {}", timestamp, exchanges)
            }
            LogEvent::FeedbackGenerated {
                score,
                duration_secs,
                ..
            } => format!(
                "[{}] coach:done score={} {:.1}s",
                timestamp,
                score.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string()),
                duration_secs
            ),
            LogEvent::ErrorEncountered {
                operation, error, ..
            } => format!("[{}] error:{}:{}", timestamp, operation, error),
            LogEvent::SessionReset { .. } => format!("[{}] session:reset", timestamp),
            LogEvent::TranscriptExported { path, .. } => {
                format!("[{}] export:{}", timestamp, path.display())
            }
        };
        let _ = writeln!(stderr, "{}", msg);
    }

    /// Truncate a string and pad to exact width
    fn truncate_with_padding(s: &str, max_len: usize, total_width: usize) -> String {
        let truncated = if s.chars().count() > max_len {
            let head: String = s.chars().take(max_len - 3).collect();
            format!("{}...", head)
        } else {
            s.to_string()
        };

        let padding_needed = total_width.saturating_sub(truncated.chars().count() + 1); // +1 for trailing │
        format!("{}{}│", truncated, " ".repeat(padding_needed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_snake_case_tag() {
        let event = LogEvent::TurnCompleted {
            session_id: "abc".to_string(),
            exchange: 2,
            deltas: 14,
            reply_len: 230,
            duration_secs: 1.5,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "turn_completed");
        assert_eq!(json["exchange"], 2);

        let stage = serde_json::to_value(LogEvent::StreamInterrupted {
            session_id: "abc".to_string(),
            stage: StreamStage::Coach,
            received_len: 10,
        })
        .unwrap();
        assert_eq!(stage["event"], "stream_interrupted");
        assert_eq!(stage["stage"], "coach");
    }

    #[test]
    fn test_event_round_trip() {
        let event = LogEvent::FeedbackGenerated {
            session_id: "abc".to_string(),
            feedback_len: 900,
            score: Some(6),
            verdict: Some("Inconclusive".to_string()),
            duration_secs: 3.0,
        };
        let text = serde_json::to_string(&event).unwrap();
        let parsed: LogEvent = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_console_outcomes_are_not_echoed_by_pretty() {
        let exported = LogEvent::TranscriptExported {
            session_id: "abc".to_string(),
            path: PathBuf::from("interview_feedback.txt"),
            bytes: 42,
        };
        let interrupted = LogEvent::StreamInterrupted {
            session_id: "abc".to_string(),
            stage: StreamStage::Interview,
            received_len: 5,
        };
        let persona = LogEvent::PersonaGenerated {
            session_id: "abc".to_string(),
            persona_len: 120,
            duration_secs: 0.8,
        };
        assert!(exported.shown_by_console());
        assert!(interrupted.shown_by_console());
        assert!(persona.shown_by_console());

        let ended = LogEvent::InterviewEnded {
            session_id: "abc".to_string(),
            exchanges: 2,
        };
        let reset = LogEvent::SessionReset {
            previous_session_id: "old".to_string(),
            session_id: "new".to_string(),
        };
        assert!(!ended.shown_by_console());
        assert!(!reset.shown_by_console());
    }

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("pretty".parse::<LogFormat>(), Ok(LogFormat::Pretty));
        assert_eq!("JSON".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!("compact".parse::<LogFormat>(), Ok(LogFormat::Compact));
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_file_logger_writes_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("events.jsonl");

        let logger = Logger::with_file(LogFormat::Compact, &path).unwrap();
        logger.log(&LogEvent::SessionReset {
            previous_session_id: "old".to_string(),
            session_id: "new".to_string(),
        });
        logger.log(&LogEvent::InterviewEnded {
            session_id: "new".to_string(),
            exchanges: 3,
        });

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "session_reset");
        assert!(lines[0]["timestamp"].is_string());
        assert_eq!(lines[1]["exchanges"], 3);
    }

    #[test]
    fn test_truncate_with_padding_is_char_safe() {
        let padded = Logger::truncate_with_padding("gemini-3-flash-preview", 40, 45);
        assert!(padded.ends_with('│'));
        assert_eq!(padded.chars().count(), 45);

        let cut = Logger::truncate_with_padding("ééééééééééé", 8, 12);
        assert!(cut.starts_with("ééééé..."));
    }
}
