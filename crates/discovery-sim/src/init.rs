//! Interactive initialization for discovery-sim.
//!
//! Writes the global config file with a user-selected provider and model.

use anyhow::Result;
use colored::Colorize;
use dialoguer::{Input, Select};
use std::fs;
use std::path::Path;

use discovery_gateway::{EnvSecrets, ProviderKind, SecretSource};

use crate::config::global_config_path;

pub fn handle_init() -> Result<()> {
    eprintln!("{}", "Setting up discovery-sim...".bold());
    eprintln!();

    // Step 1: Report which keys are already available
    eprintln!("{}", "Checking for API keys...".dimmed());
    for kind in ProviderKind::all() {
        print_key_status(kind, &EnvSecrets);
    }
    eprintln!();

    // Step 2: Pick default provider and model
    let kinds = ProviderKind::all();
    let items: Vec<String> = kinds.iter().map(|k| k.to_string()).collect();
    let selection = Select::new()
        .with_prompt("Select your default provider")
        .items(&items)
        .default(0)
        .interact()?;
    let kind = kinds[selection];

    let model: String = Input::new()
        .with_prompt("Default model")
        .default(kind.default_model().to_string())
        .interact_text()?;

    // Step 3: Write global config
    let config_path =
        global_config_path().ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

    if config_path.exists() {
        eprintln!(
            "{} Config already exists at {}",
            "⚠".bright_yellow(),
            config_path.display()
        );

        let overwrite = Select::new()
            .with_prompt("Overwrite existing config?")
            .items(&["No, keep existing", "Yes, replace it"])
            .default(0)
            .interact()?;

        if overwrite == 0 {
            eprintln!();
            eprintln!("Keeping existing config. Edit it manually if needed:");
            eprintln!("  {}", config_path.display().to_string().dimmed());
            return Ok(());
        }
    }

    write_config(&config_path, kind, model.trim())?;

    eprintln!();
    eprintln!(
        "{} Config saved to {}",
        "✓".bright_green(),
        config_path.display()
    );

    if !kind.uses_shared_key() && EnvSecrets.secret(kind.key_secret()).is_none() {
        eprintln!(
            "  {} Set {} or pass {}. Get a key at {}",
            "Note:".bright_yellow(),
            kind.key_secret().bright_cyan(),
            "--api-key".bright_cyan(),
            kind.key_help_url()
        );
    }

    // Step 4: Quick-start tips
    print_getting_started();

    Ok(())
}

fn print_key_status(kind: ProviderKind, secrets: &dyn SecretSource) {
    if secrets.secret(kind.key_secret()).is_some() {
        eprintln!(
            "  {} {} ({} is set)",
            "✓".bright_green(),
            kind,
            kind.key_secret()
        );
    } else {
        eprintln!(
            "  {} {} ({} not set)",
            "✗".dimmed(),
            kind,
            kind.key_secret()
        );
    }
}

fn render_config(kind: ProviderKind, model: &str) -> String {
    let model = if model.is_empty() {
        kind.default_model()
    } else {
        model
    };
    format!(
        r#"provider = "{}"
model = "{}"

# Optional settings:
# base_url = "https://api.openai.com/v1"
# min_exchanges = 1        # 0 lets you end at any time
# max_retries = 2
# request_timeout = "120s"
"#,
        kind.config_name(),
        model
    )
}

fn write_config(path: &Path, kind: ProviderKind, model: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, render_config(kind, model))?;
    Ok(())
}

/// Print the getting started guide
pub fn print_getting_started() {
    eprintln!();
    eprintln!("{}", "Getting started:".bold());
    eprintln!("  {} Run: {}", "1.".dimmed(), "discovery-sim".bright_cyan());
    eprintln!(
        "  {} Describe the problem, the customer segment and your hypothesis",
        "2.".dimmed()
    );
    eprintln!(
        "  {} Interview the persona, then type {} for coach feedback",
        "3.".dimmed(),
        "/end".bright_cyan()
    );
    eprintln!(
        "  {} Save everything with {}",
        "4.".dimmed(),
        "--export interview_feedback.txt".bright_cyan()
    );
}

/// Check if this appears to be first run (no global config)
pub fn is_first_run() -> bool {
    global_config_path().map_or(true, |path| !path.exists())
}
