//! Console rendering for the interactive session.
//!
//! Conversation text goes to stdout; status lines go to stderr.

use colored::Colorize;
use std::fmt::Display;
use std::io::Write;
use std::path::Path;

use discovery_coach::{CoachSummary, STOP_SIGNAL};
use discovery_gateway::ProviderConfig;

use crate::config::Settings;

pub fn print_welcome() {
    eprintln!();
    eprintln!("{}", "Customer discovery interview simulator".bold());
    eprintln!(
        "{}",
        "Practice asking about past behavior instead of pitching your idea.".dimmed()
    );
    eprintln!();
}

pub fn print_setup_intro() {
    eprintln!("{}", "Business context".bold());
    eprintln!(
        "  {}",
        "Describe the problem, who has it, and what you believe is true.".dimmed()
    );
}

pub fn print_persona(text: &str) {
    eprintln!();
    eprintln!("{}", "Generated persona:".bright_green().bold());
    for line in text.lines() {
        eprintln!("  {}", line);
    }
    eprintln!();
}

pub fn print_interview_intro(min_exchanges: usize) {
    eprintln!();
    eprintln!("{}", "Interview in progress".bold());
    eprintln!(
        "  {}",
        "Ask your first question. The persona stays in character until you end.".dimmed()
    );
    print_help(min_exchanges);
}

pub fn print_help(min_exchanges: usize) {
    eprintln!(
        "  {} end and analyse (after {} {})",
        "/end".bright_cyan(),
        min_exchanges,
        if min_exchanges == 1 {
            "exchange"
        } else {
            "exchanges"
        }
    );
    eprintln!("  {} save transcript so far", "/export [path]".bright_cyan());
    eprintln!("  {} start over", "/reset".bright_cyan());
    eprintln!("  {} leave", "/quit".bright_cyan());
    eprintln!(
        "  {}",
        format!(
            "Ctrl+C cuts a reply short. Typing \"{}\" is sent to the persona as text.",
            STOP_SIGNAL
        )
        .dimmed()
    );
    eprintln!();
}

/// Label printed before a streamed reply
pub fn start_reply(label: &str) {
    print!("{} ", format!("{}:", label).bright_magenta().bold());
    let _ = std::io::stdout().flush();
}

/// Print one streamed fragment immediately
pub fn print_delta(delta: &str) {
    print!("{}", delta);
    let _ = std::io::stdout().flush();
}

pub fn end_reply() {
    println!();
    println!();
}

pub fn print_end_hint() {
    eprintln!(
        "  {}",
        "You can end the interview any time with /end.".dimmed()
    );
}

pub fn print_feedback_header() {
    eprintln!();
    eprintln!("{}", "Coach feedback".bright_magenta().bold());
    eprintln!(
        "{}",
        "───────────────────────────────────────────────────────────────────────".bright_magenta()
    );
}

pub fn print_summary(summary: Option<CoachSummary>, interrupted: bool) {
    eprintln!(
        "{}",
        "───────────────────────────────────────────────────────────────────────".bright_magenta()
    );
    if let Some(summary) = summary {
        let score = summary
            .score
            .map(|s| format!("{}/10", s))
            .unwrap_or_else(|| "n/a".to_string());
        let verdict = summary
            .verdict
            .map(|v| v.to_string())
            .unwrap_or_else(|| "n/a".to_string());
        eprintln!(
            "  {} {}   {} {}",
            "Score:".dimmed(),
            score.bold(),
            "Verdict:".dimmed(),
            verdict.bold()
        );
    }
    if interrupted {
        note("Feedback was cut short; export keeps what arrived.");
    }
    eprintln!();
}

pub fn print_exported(path: &Path, bytes: usize) {
    eprintln!(
        "{} Saved {} bytes to {}",
        "✓".bright_green(),
        bytes,
        path.display()
    );
}

pub fn print_error(error: &dyn Display) {
    eprintln!("{} {}", "✗".bright_red(), error.to_string().bright_red());
}

pub fn warn(message: &str) {
    eprintln!("{} {}", "⚠".bright_yellow(), message);
}

pub fn note(message: &str) {
    eprintln!("  {}", message.dimmed());
}

pub fn print_dry_run(settings: &Settings, provider: &ProviderConfig, config_path: Option<&Path>) {
    println!("=== Dry Run ===");
    println!(
        "Config: {}",
        config_path
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none)".to_string())
    );
    println!("Provider: {}", provider.kind);
    println!("Model: {}", provider.model_name);
    println!("Endpoint: {}", provider.endpoint());
    println!(
        "API key: {}",
        if provider.has_api_key() {
            "set"
        } else {
            "missing"
        }
    );
    println!("Min exchanges: {}", settings.min_exchanges);
    println!("Max retries: {}", settings.max_retries);
    println!("Request timeout: {:?}", settings.request_timeout);
}
