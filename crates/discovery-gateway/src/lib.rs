mod message;
mod openai;
mod provider;
mod sse;
mod stream;
mod traits;

pub use message::{Message, Role};
pub use openai::{ClientOptions, OpenAiCompatClient};
pub use provider::{
    ConfigError, EnvSecrets, ProviderConfig, ProviderKind, SecretSource, DEFAULT_OPENAI_BASE_URL,
    GEMINI_OPENAI_COMPAT_URL, TEST_KEY_SECRET,
};
pub use sse::{SseDecoder, SseEvent};
pub use stream::{
    accumulate_chunks, accumulate_stream, sanitize_fragment, Accumulated, Sanitizer,
};
pub use traits::{
    error_for_status, ChatGateway, ChatRequest, DeltaCallback, DeltaStream, EffortHint,
    GatewayError,
};

/// Create the HTTP gateway for a resolved provider
pub fn create_gateway(
    config: ProviderConfig,
    options: ClientOptions,
) -> Result<Box<dyn ChatGateway>, GatewayError> {
    Ok(Box::new(OpenAiCompatClient::with_options(config, options)?))
}
