//! The interactive terminal loop: setup form, interview chat, feedback.

use anyhow::Result;
use dialoguer::{Input, Password, Select};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

use discovery_core::{
    Persona, PersonaChoice, Phase, RequiredField, SessionController, SessionError, SetupForm,
    TurnOutcome, DEFAULT_EXPORT_FILE,
};
use discovery_gateway::{
    create_gateway, DeltaCallback, EnvSecrets, GatewayError, ProviderConfig, ProviderKind,
};

use crate::config::Settings;
use crate::ui;

/// Resolve a provider, applying configured model and base URL overrides.
///
/// A missing shared secret is reported and yields a keyless config so the
/// session stays usable.
pub fn build_provider(kind: ProviderKind, api_key: Option<&str>, settings: &Settings) -> ProviderConfig {
    let mut provider = match ProviderConfig::resolve(kind, api_key, &EnvSecrets) {
        Ok(provider) => provider,
        Err(e) => {
            ui::warn(&format!(
                "{}. Ask your instructor for the shared key or pick another provider.",
                e
            ));
            ProviderConfig::without_key(kind)
        }
    };

    // Overrides in the config target the configured provider only
    if kind == settings.provider {
        if let Some(model) = &settings.model {
            provider = provider.with_model(model.clone());
        }
        if let Some(base_url) = &settings.base_url {
            provider = provider.with_base_url(base_url.clone());
        }
    }
    provider
}

/// Keys typed or passed on the command line, one per provider.
///
/// A key entered for one provider is never offered to another.
#[derive(Default, Clone)]
pub struct ApiKeys {
    keys: HashMap<ProviderKind, String>,
}

impl ApiKeys {
    /// Start with the command-line key, which belongs to the configured provider
    pub fn new(kind: ProviderKind, api_key: Option<String>) -> Self {
        let mut keys = Self::default();
        if let Some(key) = api_key {
            keys.set(kind, key);
        }
        keys
    }

    pub fn get(&self, kind: ProviderKind) -> Option<&str> {
        self.keys.get(&kind).map(String::as_str)
    }

    pub fn set(&mut self, kind: ProviderKind, key: String) {
        self.keys.insert(kind, key);
    }
}

/// Whether a failure means the current key was rejected
fn is_auth_failure(error: &SessionError) -> bool {
    matches!(
        error,
        SessionError::Gateway(GatewayError::AuthenticationFailed(_))
    )
}

/// A line typed during the interview
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Say(String),
    End,
    Export(Option<PathBuf>),
    Reset,
    Help,
    Quit,
}

impl ChatCommand {
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        let Some(command) = trimmed.strip_prefix('/') else {
            return ChatCommand::Say(line.to_string());
        };

        let mut parts = command.splitn(2, char::is_whitespace);
        let name = parts.next().unwrap_or_default().to_lowercase();
        let arg = parts.next().map(str::trim).filter(|a| !a.is_empty());

        match name.as_str() {
            "end" | "analyze" | "analyse" => ChatCommand::End,
            "export" | "save" => ChatCommand::Export(arg.map(PathBuf::from)),
            "reset" | "new" => ChatCommand::Reset,
            "help" | "?" => ChatCommand::Help,
            "quit" | "exit" | "q" => ChatCommand::Quit,
            _ => ChatCommand::Say(line.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

pub struct InteractiveSession {
    controller: SessionController,
    settings: Settings,
    streaming: Arc<AtomicBool>,
    export_path: Option<PathBuf>,
    api_keys: ApiKeys,
    form: SetupForm,
    end_hint_shown: bool,
    auto_exported: bool,
}

impl InteractiveSession {
    pub fn new(
        controller: SessionController,
        settings: Settings,
        streaming: Arc<AtomicBool>,
        export_path: Option<PathBuf>,
        api_key: Option<String>,
    ) -> Self {
        let api_keys = ApiKeys::new(settings.provider, api_key);
        Self {
            controller,
            settings,
            streaming,
            export_path,
            api_keys,
            form: SetupForm::default(),
            end_hint_shown: false,
            auto_exported: false,
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        ui::print_welcome();

        loop {
            let flow = match self.controller.phase() {
                Phase::Setup => self.setup_step().await?,
                Phase::Interviewing => self.interview_step().await?,
                Phase::Analyzed => self.analysis_step().await?,
            };
            if flow == Flow::Quit {
                return Ok(());
            }
        }
    }

    // -- setup ----------------------------------------------------------------

    async fn setup_step(&mut self) -> Result<Flow> {
        let provider = self.controller.provider();
        if !provider.has_api_key() && !provider.kind.uses_shared_key() {
            self.prompt_api_key()?;
        }

        ui::print_setup_intro();
        self.edit_form()?;

        loop {
            let items = [
                "Start interview",
                "Generate persona backstory",
                "Edit business context",
                "Change provider",
                "Quit",
            ];
            let choice = Select::new()
                .with_prompt("What next?")
                .items(&items)
                .default(0)
                .interact()?;

            match choice {
                0 => {
                    if self.start_interview()? {
                        return Ok(Flow::Continue);
                    }
                }
                1 => self.generate_persona().await?,
                2 => self.edit_form()?,
                3 => self.change_provider()?,
                _ => return Ok(Flow::Quit),
            }
        }
    }

    fn edit_form(&mut self) -> Result<()> {
        self.form.problem_statement = ask("Problem statement", &self.form.problem_statement)?;
        self.form.customer_segment = ask("Customer segment", &self.form.customer_segment)?;
        self.form.hypothesis = ask("Hypothesis", &self.form.hypothesis)?;
        Ok(())
    }

    fn start_interview(&mut self) -> Result<bool> {
        let choice = match &self.controller.state().persona {
            Persona::Generated(_) => {
                let items = [
                    "Use the generated persona details",
                    "Ignore it and use my raw inputs only",
                ];
                let picked = Select::new()
                    .with_prompt("Which persona context do you want to use?")
                    .items(&items)
                    .default(0)
                    .interact()?;
                if picked == 0 {
                    PersonaChoice::Generated
                } else {
                    PersonaChoice::RawInputs
                }
            }
            _ => PersonaChoice::RawInputs,
        };

        match self.controller.start(&self.form, choice) {
            Ok(()) => {
                self.end_hint_shown = false;
                ui::print_interview_intro(self.controller.min_exchanges());
                Ok(true)
            }
            Err(e) => {
                ui::print_error(&e);
                if let SessionError::Validation { missing } = &e {
                    if missing.contains(&RequiredField::ApiKey) {
                        self.prompt_api_key()?;
                    }
                }
                Ok(false)
            }
        }
    }

    async fn generate_persona(&mut self) -> Result<()> {
        ui::note("Dreaming up a customer...");
        match self.controller.generate_persona(&self.form).await {
            Ok(persona) => ui::print_persona(&persona),
            Err(e) => {
                ui::print_error(&e);
                if is_auth_failure(&e) {
                    self.prompt_api_key()?;
                }
            }
        }
        Ok(())
    }

    fn prompt_api_key(&mut self) -> Result<()> {
        let kind = self.controller.provider().kind;
        if kind.uses_shared_key() {
            ui::warn(&format!(
                "{} uses a shared key read from {}.",
                kind,
                kind.key_secret()
            ));
            return Ok(());
        }

        ui::note(&format!("Get a key at {}", kind.key_help_url()));
        let key = Password::new()
            .with_prompt(format!("{} API key", kind))
            .allow_empty_password(true)
            .interact()?;
        self.api_keys.set(kind, key);
        self.apply_provider(kind)
    }

    fn change_provider(&mut self) -> Result<()> {
        let kinds = ProviderKind::all();
        let items: Vec<String> = kinds.iter().map(|k| k.to_string()).collect();
        let current = kinds
            .iter()
            .position(|k| *k == self.controller.provider().kind)
            .unwrap_or(0);

        let picked = Select::new()
            .with_prompt("Select LLM provider")
            .items(&items)
            .default(current)
            .interact()?;

        self.apply_provider(kinds[picked])?;
        let provider = self.controller.provider();
        if !provider.has_api_key() && !provider.kind.uses_shared_key() {
            self.prompt_api_key()?;
        }
        Ok(())
    }

    fn apply_provider(&mut self, kind: ProviderKind) -> Result<()> {
        let provider = build_provider(kind, self.api_keys.get(kind), &self.settings);
        let gateway = create_gateway(provider.clone(), self.settings.client_options())?;
        self.controller.configure(provider, Arc::from(gateway));
        Ok(())
    }

    // -- interview ------------------------------------------------------------

    async fn interview_step(&mut self) -> Result<Flow> {
        let line: String = Input::new()
            .with_prompt("You")
            .allow_empty(true)
            .interact_text()?;

        match ChatCommand::parse(&line) {
            ChatCommand::Say(text) => self.send(&text).await?,
            ChatCommand::End => match self.controller.end_interview() {
                Ok(exchanges) => debug!(exchanges, "Interview ended"),
                Err(e) => ui::print_error(&e),
            },
            ChatCommand::Export(path) => self.export(path)?,
            ChatCommand::Reset => self.reset(),
            ChatCommand::Help => ui::print_help(self.controller.min_exchanges()),
            ChatCommand::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    async fn send(&mut self, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Ok(());
        }

        ui::start_reply("Customer");
        self.streaming.store(true, Ordering::SeqCst);
        let result = self.controller.send_turn(text, Some(reply_printer())).await;
        self.streaming.store(false, Ordering::SeqCst);
        ui::end_reply();

        match result {
            Ok(TurnOutcome::Interrupted { .. }) => ui::note("Reply cut short; kept what arrived."),
            Ok(_) => {}
            Err(SessionError::Cancelled) => ui::note("Cancelled; nothing was added."),
            Err(e) => {
                ui::print_error(&e);
                if is_auth_failure(&e) {
                    self.prompt_api_key()?;
                }
            }
        }

        if !self.end_hint_shown && self.controller.can_end() {
            ui::print_end_hint();
            self.end_hint_shown = true;
        }
        Ok(())
    }

    // -- analysis -------------------------------------------------------------

    async fn analysis_step(&mut self) -> Result<Flow> {
        if self.controller.state().feedback.is_none() {
            self.run_feedback().await?;
        }

        let has_feedback = self.controller.state().feedback.is_some();
        let mut items = vec!["Export transcript and feedback"];
        if !has_feedback {
            items.push("Retry feedback");
        }
        items.push("Start new simulation");
        items.push("Quit");

        let picked = Select::new()
            .with_prompt("What next?")
            .items(&items)
            .default(0)
            .interact()?;

        match items[picked] {
            "Export transcript and feedback" => self.export(None)?,
            "Retry feedback" => {}
            "Start new simulation" => self.reset(),
            _ => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    async fn run_feedback(&mut self) -> Result<()> {
        ui::print_feedback_header();
        self.streaming.store(true, Ordering::SeqCst);
        let result = self
            .controller
            .ensure_feedback(Some(reply_printer()))
            .await
            .map(|report| (report.summary, report.interrupted));
        self.streaming.store(false, Ordering::SeqCst);
        println!();

        match result {
            Ok((summary, interrupted)) => {
                ui::print_summary(summary, interrupted);
                self.auto_export();
            }
            Err(e) => {
                ui::print_error(&e);
                if is_auth_failure(&e) {
                    self.prompt_api_key()?;
                }
            }
        }
        Ok(())
    }

    fn auto_export(&mut self) {
        if self.auto_exported {
            return;
        }
        let Some(path) = self.export_path.clone() else {
            return;
        };
        self.auto_exported = true;
        match self.controller.export_to(&path) {
            Ok(bytes) => ui::print_exported(&path, bytes),
            Err(e) => ui::print_error(&e),
        }
    }

    fn export(&mut self, path: Option<PathBuf>) -> Result<()> {
        let path = match path {
            Some(path) => path,
            None => {
                let default = self
                    .export_path
                    .clone()
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_EXPORT_FILE));
                let answer: String = Input::new()
                    .with_prompt("Save to")
                    .default(default.display().to_string())
                    .interact_text()?;
                PathBuf::from(answer)
            }
        };

        match self.controller.export_to(&path) {
            Ok(bytes) => ui::print_exported(&path, bytes),
            Err(e) => ui::print_error(&e),
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.controller.reset();
        self.form = SetupForm::default();
        self.auto_exported = false;
        self.end_hint_shown = false;
        eprintln!();
    }
}

/// Streams fragments straight to the terminal
fn reply_printer() -> DeltaCallback {
    Arc::new(ui::print_delta)
}

fn ask(prompt: &str, current: &str) -> Result<String> {
    let value: String = Input::new()
        .with_prompt(prompt)
        .with_initial_text(current)
        .allow_empty(true)
        .interact_text()?;
    Ok(value)
}
