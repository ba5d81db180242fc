use discovery_gateway::{
    accumulate_stream, ChatGateway, ChatRequest, DeltaCallback, EffortHint, GatewayError, Message,
};
use std::sync::atomic::AtomicBool;
use tracing::{debug, info};

use crate::{transcript_to_text, FeedbackReport, InterviewPrompts};

/// Inputs required to coach one interview.
#[derive(Clone, Copy)]
pub struct CoachInput<'a> {
    pub transcript: &'a [Message],
    pub problem: &'a str,
    pub hypothesis: &'a str,
    pub persona_context: &'a str,
}

/// Evaluator that asks the model to grade an interview
pub struct CoachEvaluator<'a> {
    gateway: &'a dyn ChatGateway,
}

impl<'a> CoachEvaluator<'a> {
    pub fn new(gateway: &'a dyn ChatGateway) -> Self {
        Self { gateway }
    }

    /// Grade the interview without streaming output
    pub async fn evaluate(
        &self,
        input: CoachInput<'_>,
        model: &str,
    ) -> Result<FeedbackReport, CoachError> {
        self.evaluate_with_callback(input, model, None, None).await
    }

    /// Grade the interview, streaming feedback fragments to `on_delta`
    pub async fn evaluate_with_callback(
        &self,
        input: CoachInput<'_>,
        model: &str,
        on_delta: Option<&DeltaCallback>,
        interrupt: Option<&AtomicBool>,
    ) -> Result<FeedbackReport, CoachError> {
        let transcript = transcript_to_text(input.transcript);
        if transcript.is_empty() {
            return Err(CoachError::EmptyTranscript);
        }

        let prompt = InterviewPrompts::build_coach_prompt(
            &transcript,
            input.hypothesis,
            input.problem,
            input.persona_context,
        );

        debug!(
            prompt_len = prompt.len(),
            transcript_len = transcript.len(),
            "Running coach evaluation"
        );

        let request = ChatRequest::new(model, vec![Message::user(prompt)]).with_effort(EffortHint::Low);
        let stream = self.gateway.stream(&request).await?;
        let accumulated = accumulate_stream(stream, on_delta, interrupt).await?;

        info!(
            deltas = accumulated.deltas,
            feedback_len = accumulated.text.len(),
            interrupted = accumulated.interrupted,
            "Coach completed"
        );

        Ok(FeedbackReport::new(accumulated.text, accumulated.interrupted))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CoachError {
    #[error("Transcript has no interview messages to coach")]
    EmptyTranscript,

    #[error("Coach request failed: {0}")]
    Gateway(#[from] GatewayError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use discovery_gateway::DeltaStream;
    use futures_util::stream::{self, StreamExt};
    use std::sync::{Arc, Mutex};

    struct ScriptedCoach {
        chunks: Vec<&'static str>,
        seen: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedCoach {
        fn new(chunks: Vec<&'static str>) -> Self {
            Self {
                chunks,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatGateway for ScriptedCoach {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, _request: &ChatRequest) -> Result<String, GatewayError> {
            Ok(self.chunks.concat())
        }

        async fn stream(&self, request: &ChatRequest) -> Result<DeltaStream, GatewayError> {
            self.seen.lock().unwrap().push(request.clone());
            let items: Vec<Result<String, GatewayError>> =
                self.chunks.iter().map(|c| Ok(c.to_string())).collect();
            Ok(stream::iter(items).boxed())
        }
    }

    fn transcript() -> Vec<Message> {
        vec![
            Message::system("HIDDEN persona"),
            Message::user("Would you pay $20 for this?"),
            Message::assistant("Maybe, I don't know."),
        ]
    }

    fn input(messages: &[Message]) -> CoachInput<'_> {
        CoachInput {
            transcript: messages,
            problem: "Formal wear is expensive",
            hypothesis: "Students will rent dresses",
            persona_context: "Maya, sophomore",
        }
    }

    #[tokio::test]
    async fn test_evaluate_streams_sanitized_feedback() {
        let gateway = ScriptedCoach::new(vec!["Verdict: Inconclusive\n", "Asking about $20 is hypothetical.\n", "Score: 3/10"]);
        let evaluator = CoachEvaluator::new(&gateway);

        let seen = Arc::new(Mutex::new(String::new()));
        let sink = seen.clone();
        let callback: DeltaCallback = Arc::new(move |d: &str| sink.lock().unwrap().push_str(d));

        let messages = transcript();
        let report = evaluator
            .evaluate_with_callback(input(&messages), "gpt-5.1", Some(&callback), None)
            .await
            .unwrap();

        assert!(report.text.contains(r"\$20"));
        assert_eq!(*seen.lock().unwrap(), report.text);
        let summary = report.summary.unwrap();
        assert_eq!(summary.score, Some(3));
        assert_eq!(summary.verdict, Some(crate::HypothesisVerdict::Inconclusive));
    }

    #[tokio::test]
    async fn test_coach_prompt_excludes_system_message() {
        let gateway = ScriptedCoach::new(vec!["Score: 5/10"]);
        let evaluator = CoachEvaluator::new(&gateway);

        let messages = transcript();
        evaluator.evaluate(input(&messages), "m").await.unwrap();

        let seen = gateway.seen.lock().unwrap();
        let request = &seen[0];
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.effort, Some(EffortHint::Low));
        let prompt = &request.messages[0].content;
        assert!(prompt.contains("USER: Would you pay $20 for this?"));
        assert!(prompt.contains("Students will rent dresses"));
        assert!(!prompt.contains("HIDDEN"));
    }

    #[tokio::test]
    async fn test_empty_transcript_is_rejected() {
        let gateway = ScriptedCoach::new(vec!["unused"]);
        let evaluator = CoachEvaluator::new(&gateway);

        let messages = vec![Message::system("only system")];
        let result = evaluator.evaluate(input(&messages), "m").await;
        assert!(matches!(result, Err(CoachError::EmptyTranscript)));
        assert!(gateway.seen.lock().unwrap().is_empty());
    }
}
