use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::debug;

use discovery_core::SessionController;
use discovery_gateway::{create_gateway, ProviderKind};
use discovery_logging::{init_tracing, LogFormat, Logger};

mod config;
mod init;
mod interactive;
mod ui;

use config::{FileConfig, Overrides, Settings};
use interactive::{build_provider, InteractiveSession};

#[derive(Parser, Debug)]
#[command(
    name = "discovery-sim",
    about = "Rehearse customer discovery interviews against an AI persona",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// LLM provider
    #[arg(short, long, value_enum)]
    provider: Option<ProviderChoice>,

    /// API key (default: read from the provider's environment variable)
    #[arg(long)]
    api_key: Option<String>,

    /// Model to use instead of the provider default
    #[arg(short, long)]
    model: Option<String>,

    /// Base URL of an OpenAI-compatible endpoint
    #[arg(long)]
    base_url: Option<String>,

    /// Path to a config file (default: ./discovery.toml, then the global config)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Completed exchanges required before the interview can end (0 disables)
    #[arg(long)]
    min_exchanges: Option<usize>,

    /// Write transcript and feedback to this file once feedback is ready
    #[arg(long)]
    export: Option<PathBuf>,

    /// Diagnostic log level (overridden by RUST_LOG)
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value = "pretty")]
    log_format: LogFormatChoice,

    /// Append session events as JSON lines to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Append diagnostic traces as JSON lines to this file
    #[arg(long)]
    trace_file: Option<PathBuf>,

    /// Dry run: show the resolved settings without starting a session
    #[arg(long)]
    dry_run: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Pick a default provider and write the global config
    Init,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProviderChoice {
    Openai,
    Gemini,
    GeminiTest,
}

impl From<ProviderChoice> for ProviderKind {
    fn from(choice: ProviderChoice) -> Self {
        match choice {
            ProviderChoice::Openai => ProviderKind::OpenAi,
            ProviderChoice::Gemini => ProviderKind::Gemini,
            ProviderChoice::GeminiTest => ProviderKind::GeminiTest,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatChoice {
    Pretty,
    Json,
    Compact,
}

impl From<LogFormatChoice> for LogFormat {
    fn from(choice: LogFormatChoice) -> Self {
        match choice {
            LogFormatChoice::Pretty => LogFormat::Pretty,
            LogFormatChoice::Json => LogFormat::Json,
            LogFormatChoice::Compact => LogFormat::Compact,
        }
    }
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            provider: self.provider.map(ProviderKind::from),
            model: self.model.clone(),
            base_url: self.base_url.clone(),
            min_exchanges: self.min_exchanges,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_format: LogFormat = cli.log_format.into();
    let _trace_guard = init_tracing(&cli.log_level, log_format, cli.trace_file.as_deref());

    if let Some(Commands::Init) = cli.command {
        return init::handle_init();
    }

    let working_dir = std::env::current_dir().context("Failed to get current directory")?;
    let loaded = FileConfig::load(cli.config.as_deref(), &working_dir)?;
    if let Some((_, path)) = &loaded {
        debug!(path = %path.display(), "Loaded config");
    }
    let settings = Settings::resolve(cli.overrides(), loaded.as_ref().map(|(config, _)| config))?;

    let provider = build_provider(settings.provider, cli.api_key.as_deref(), &settings);

    if cli.dry_run {
        ui::print_dry_run(
            &settings,
            &provider,
            loaded.as_ref().map(|(_, path)| path.as_path()),
        );
        return Ok(());
    }

    if loaded.is_none() && init::is_first_run() {
        ui::note("Tip: run `discovery-sim init` to save a default provider.");
    }

    let logger = match &cli.log_file {
        Some(path) => Logger::with_file(log_format, path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?,
        None => Logger::new(log_format),
    };

    let gateway = create_gateway(provider.clone(), settings.client_options())
        .context("Failed to create HTTP client")?;
    let controller = SessionController::new(provider, Arc::from(gateway), Arc::new(logger))
        .with_min_exchanges(settings.min_exchanges);

    // Ctrl+C cuts the reply in flight short; otherwise it leaves
    let interrupt_handle = controller.interrupt_handle();
    let streaming = Arc::new(AtomicBool::new(false));
    let in_flight = streaming.clone();
    ctrlc::set_handler(move || {
        if in_flight.load(Ordering::SeqCst) {
            interrupt_handle.store(true, Ordering::SeqCst);
        } else {
            eprintln!();
            std::process::exit(130);
        }
    })
    .context("Failed to set Ctrl+C handler")?;

    let mut session = InteractiveSession::new(
        controller,
        settings,
        streaming,
        cli.export.clone(),
        cli.api_key.clone(),
    );
    session.run().await
}
