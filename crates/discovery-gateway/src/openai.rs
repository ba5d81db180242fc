use async_trait::async_trait;
use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, warn};

use crate::sse::{SseDecoder, SseEvent};
use crate::{
    error_for_status, ChatGateway, ChatRequest, DeltaStream, EffortHint, GatewayError, Message,
    ProviderConfig,
};

#[derive(Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning_effort: Option<EffortHint>,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Transport settings for the HTTP client
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Upper bound for one whole request, including a streamed body
    pub timeout: Duration,
    /// Extra attempts for retryable failures before any data was received
    pub max_retries: u32,
    /// Delay before the first retry, doubled on each further attempt
    pub retry_backoff: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            max_retries: 2,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

/// Client for any provider exposing the OpenAI chat-completions API
pub struct OpenAiCompatClient {
    client: Client,
    config: ProviderConfig,
    options: ClientOptions,
}

impl OpenAiCompatClient {
    pub fn new(config: ProviderConfig) -> Result<Self, GatewayError> {
        Self::with_options(config, ClientOptions::default())
    }

    pub fn with_options(
        config: ProviderConfig,
        options: ClientOptions,
    ) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(options.timeout)
            .build()
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        Ok(Self {
            client,
            config,
            options,
        })
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn body<'a>(request: &'a ChatRequest, stream: bool) -> CompletionBody<'a> {
        CompletionBody {
            model: &request.model,
            messages: &request.messages,
            stream,
            reasoning_effort: request.effort,
        }
    }

    fn map_transport_error(&self, error: reqwest::Error) -> GatewayError {
        if error.is_timeout() {
            GatewayError::Timeout(self.options.timeout)
        } else {
            GatewayError::Network(error.to_string())
        }
    }

    /// Send one request, retrying connection failures, 429 and 5xx
    async fn send(&self, body: &CompletionBody<'_>) -> Result<reqwest::Response, GatewayError> {
        let url = self.config.endpoint();
        let mut attempt = 0;

        loop {
            let result = self.send_once(&url, body).await;

            match result {
                Err(e) if e.is_retryable() && attempt < self.options.max_retries => {
                    let delay = self.options.retry_backoff * 2u32.pow(attempt);
                    attempt += 1;
                    warn!(
                        provider = %self.config.kind,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying chat request"
                    );
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }

    async fn send_once(
        &self,
        url: &str,
        body: &CompletionBody<'_>,
    ) -> Result<reqwest::Response, GatewayError> {
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(error_for_status(status.as_u16(), &text));
        }

        Ok(response)
    }
}

#[async_trait]
impl ChatGateway for OpenAiCompatClient {
    fn name(&self) -> &str {
        match self.config.kind {
            crate::ProviderKind::OpenAi => "OpenAI",
            crate::ProviderKind::Gemini | crate::ProviderKind::GeminiTest => "Gemini",
        }
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String, GatewayError> {
        debug!(
            provider = self.name(),
            model = %request.model,
            messages = request.messages.len(),
            prompt_len = request.prompt_len(),
            "Sending completion request"
        );

        let response = self.send(&Self::body(request, false)).await?;
        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::MalformedResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| GatewayError::MalformedResponse("Response had no content".to_string()))
    }

    async fn stream(&self, request: &ChatRequest) -> Result<DeltaStream, GatewayError> {
        debug!(
            provider = self.name(),
            model = %request.model,
            messages = request.messages.len(),
            prompt_len = request.prompt_len(),
            "Opening completion stream"
        );

        let response = self.send(&Self::body(request, true)).await?;
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
            .boxed();

        Ok(delta_stream(body))
    }
}

struct StreamState {
    body: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    finished: bool,
}

impl StreamState {
    fn absorb(&mut self, events: Vec<SseEvent>) {
        for event in events {
            match event {
                SseEvent::Delta(text) if !self.finished => self.pending.push_back(text),
                SseEvent::Delta(_) => {}
                SseEvent::Done => self.finished = true,
            }
        }
    }
}

/// Turn a raw SSE body into a stream of text deltas
fn delta_stream(body: BoxStream<'static, reqwest::Result<Vec<u8>>>) -> DeltaStream {
    let state = StreamState {
        body,
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(text) = state.pending.pop_front() {
                return Some((Ok(text), state));
            }
            if state.finished {
                return None;
            }

            let decoded = match state.body.next().await {
                Some(Ok(chunk)) => state.decoder.push(&chunk),
                Some(Err(e)) => Err(GatewayError::StreamFailed(e.to_string())),
                None => {
                    // Body closed without [DONE]; whatever is buffered is final
                    let rest = state.decoder.finish();
                    state.finished = true;
                    rest.map(|events| {
                        events
                            .into_iter()
                            .filter(|e| matches!(e, SseEvent::Delta(_)))
                            .collect()
                    })
                }
            };

            match decoded {
                Ok(events) => state.absorb(events),
                Err(e) => {
                    state.finished = true;
                    state.pending.clear();
                    return Some((Err(e), state));
                }
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProviderKind;

    fn byte_stream(chunks: Vec<&'static str>) -> BoxStream<'static, reqwest::Result<Vec<u8>>> {
        stream::iter(chunks.into_iter().map(|c| Ok(c.as_bytes().to_vec()))).boxed()
    }

    #[test]
    fn test_request_body_shape() {
        let request = ChatRequest::new(
            "gpt-5.1",
            vec![Message::system("rules"), Message::user("hello")],
        )
        .with_effort(EffortHint::Low);

        let json = serde_json::to_value(OpenAiCompatClient::body(&request, true)).unwrap();
        assert_eq!(json["model"], "gpt-5.1");
        assert_eq!(json["stream"], true);
        assert_eq!(json["reasoning_effort"], "low");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hello");
    }

    #[test]
    fn test_request_body_omits_missing_effort() {
        let request = ChatRequest::new("m", vec![Message::user("x")]);
        let json = serde_json::to_value(OpenAiCompatClient::body(&request, false)).unwrap();
        assert!(json.get("reasoning_effort").is_none());
    }

    #[test]
    fn test_gateway_name_follows_provider() {
        let client =
            OpenAiCompatClient::new(ProviderConfig::without_key(ProviderKind::GeminiTest)).unwrap();
        assert_eq!(client.name(), "Gemini");
    }

    #[tokio::test]
    async fn test_delta_stream_across_chunk_boundaries() {
        let body = byte_stream(vec![
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\ndata: {\"choi",
            "ces\":[{\"delta\":{\"content\":\" there\"}}]}\n\n",
            "data: [DONE]\n\n",
        ]);
        let deltas: Vec<String> = delta_stream(body)
            .map(|d| d.unwrap())
            .collect()
            .await;
        assert_eq!(deltas, vec!["Hi", " there"]);
    }

    #[tokio::test]
    async fn test_delta_stream_ignores_data_after_done() {
        let body = byte_stream(vec![
            "data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\ndata: [DONE]\ndata: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\n",
        ]);
        let deltas: Vec<String> = delta_stream(body).map(|d| d.unwrap()).collect().await;
        assert_eq!(deltas, vec!["a"]);
    }

    #[tokio::test]
    async fn test_delta_stream_surfaces_malformed_chunk() {
        let body = byte_stream(vec![
            "data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n",
            "data: garbage\n",
        ]);
        let items: Vec<Result<String, GatewayError>> = delta_stream(body).collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "ok");
        assert!(matches!(items[1], Err(GatewayError::MalformedResponse(_))));
    }
}
