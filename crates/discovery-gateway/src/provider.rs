use std::collections::HashMap;
use thiserror::Error;

/// Base URL used when a provider has no compatibility endpoint of its own
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1/";

/// Gemini's OpenAI-compatible endpoint
pub const GEMINI_OPENAI_COMPAT_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai/";

/// Secret holding the shared classroom key
pub const TEST_KEY_SECRET: &str = "GEMINI_TEST_API_KEY";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Secret {0} is not set; the shared test key is unavailable")]
    MissingSecret(String),
}

/// Supported chat-completion providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    OpenAi,
    Gemini,
    /// Gemini with the shared classroom key read from the secret store
    GeminiTest,
}

impl ProviderKind {
    pub fn all() -> [ProviderKind; 3] {
        [
            ProviderKind::OpenAi,
            ProviderKind::Gemini,
            ProviderKind::GeminiTest,
        ]
    }

    /// `None` means the client default
    pub fn base_url(&self) -> Option<&'static str> {
        match self {
            ProviderKind::OpenAi => None,
            ProviderKind::Gemini | ProviderKind::GeminiTest => Some(GEMINI_OPENAI_COMPAT_URL),
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "gpt-5.1",
            ProviderKind::Gemini | ProviderKind::GeminiTest => "gemini-3-flash-preview",
        }
    }

    /// Name of the secret the API key is read from when not supplied by the user
    pub fn key_secret(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::Gemini => "GEMINI_API_KEY",
            ProviderKind::GeminiTest => TEST_KEY_SECRET,
        }
    }

    /// The shared key variant never takes a user-supplied key
    pub fn uses_shared_key(&self) -> bool {
        matches!(self, ProviderKind::GeminiTest)
    }

    pub fn key_help_url(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "https://platform.openai.com/docs/quickstart",
            ProviderKind::Gemini | ProviderKind::GeminiTest => {
                "https://ai.google.dev/gemini-api/docs/api-key"
            }
        }
    }

    pub fn config_name(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Gemini => "gemini",
            ProviderKind::GeminiTest => "gemini-test",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::OpenAi => write!(f, "OpenAI"),
            ProviderKind::Gemini => write!(f, "Gemini"),
            ProviderKind::GeminiTest => write!(f, "Gemini (Test)"),
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" | "open-ai" => Ok(ProviderKind::OpenAi),
            "gemini" => Ok(ProviderKind::Gemini),
            "gemini-test" | "gemini (test)" | "gemini_test" => Ok(ProviderKind::GeminiTest),
            _ => Err(format!("Unknown provider: {}", s)),
        }
    }
}

/// Read-only lookup of process-wide secrets
pub trait SecretSource {
    fn secret(&self, name: &str) -> Option<String>;
}

/// Secrets from the process environment
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvSecrets;

impl SecretSource for EnvSecrets {
    fn secret(&self, name: &str) -> Option<String> {
        std::env::var(name).ok().filter(|v| !v.trim().is_empty())
    }
}

impl SecretSource for HashMap<String, String> {
    fn secret(&self, name: &str) -> Option<String> {
        self.get(name).filter(|v| !v.trim().is_empty()).cloned()
    }
}

/// Everything needed to reach one provider for the lifetime of a session
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub api_key: String,
    pub base_url: Option<String>,
    pub model_name: String,
}

impl ProviderConfig {
    /// Resolve a provider selection into its connection settings.
    ///
    /// The shared-key variant always reads its key from `secrets` and fails
    /// with [`ConfigError::MissingSecret`] when absent. The other providers
    /// prefer the user-supplied key and fall back to their secret; an empty
    /// key is allowed here and rejected later when the interview starts.
    pub fn resolve(
        kind: ProviderKind,
        user_api_key: Option<&str>,
        secrets: &dyn SecretSource,
    ) -> Result<Self, ConfigError> {
        let api_key = if kind.uses_shared_key() {
            secrets
                .secret(kind.key_secret())
                .ok_or_else(|| ConfigError::MissingSecret(kind.key_secret().to_string()))?
        } else {
            user_api_key
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(String::from)
                .or_else(|| secrets.secret(kind.key_secret()))
                .unwrap_or_default()
        };

        Ok(Self {
            api_key,
            ..Self::without_key(kind)
        })
    }

    /// Connection settings with no API key, used when key resolution failed
    pub fn without_key(kind: ProviderKind) -> Self {
        Self {
            kind,
            api_key: String::new(),
            base_url: kind.base_url().map(String::from),
            model_name: kind.default_model().to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model_name = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    /// Full chat-completions URL
    pub fn endpoint(&self) -> String {
        let base = self.base_url.as_deref().unwrap_or(DEFAULT_OPENAI_BASE_URL);
        format!("{}/chat/completions", base.trim_end_matches('/'))
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("kind", &self.kind)
            .field("api_key", &if self.has_api_key() { "<set>" } else { "<empty>" })
            .field("base_url", &self.base_url)
            .field("model_name", &self.model_name)
            .finish()
    }
}
