use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use discovery_coach::{completed_exchanges, CoachEvaluator, CoachInput, FeedbackReport, InterviewPrompts};
use discovery_gateway::{
    accumulate_stream, sanitize_fragment, Accumulated, ChatGateway, ChatRequest, DeltaCallback,
    EffortHint, GatewayError, Message, ProviderConfig,
};
use discovery_logging::{LogEvent, Logger, StreamStage};

use crate::{
    render_export, BusinessContext, Persona, PersonaChoice, Phase, RequiredField, SessionError,
    SessionState, SetupForm, TurnOutcome,
};

/// Completed exchanges required before an interview can be ended
pub const DEFAULT_MIN_EXCHANGES: usize = 1;

/// Whether a transcript has enough answered questions to be analysed
pub fn end_allowed(transcript: &[Message], min_exchanges: usize) -> bool {
    completed_exchanges(transcript) >= min_exchanges
}

/// Drives one simulator session through setup, interview and analysis
pub struct SessionController {
    provider: ProviderConfig,
    gateway: Arc<dyn ChatGateway>,
    logger: Arc<Logger>,
    interrupted: Arc<AtomicBool>,
    min_exchanges: usize,
    state: SessionState,
}

impl SessionController {
    pub fn new(provider: ProviderConfig, gateway: Arc<dyn ChatGateway>, logger: Arc<Logger>) -> Self {
        let state = SessionState::new();
        logger.log(&LogEvent::SessionStarted {
            session_id: state.id.to_string(),
            provider: provider.kind.to_string(),
            model: provider.model_name.clone(),
        });

        Self {
            provider,
            gateway,
            logger,
            interrupted: Arc::new(AtomicBool::new(false)),
            min_exchanges: DEFAULT_MIN_EXCHANGES,
            state,
        }
    }

    /// Require a different number of exchanges before ending (0 disables)
    pub fn with_min_exchanges(mut self, min_exchanges: usize) -> Self {
        self.min_exchanges = min_exchanges;
        self
    }

    /// Get a handle to cancel the stream in flight
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        self.interrupted.clone()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn provider(&self) -> &ProviderConfig {
        &self.provider
    }

    pub fn min_exchanges(&self) -> usize {
        self.min_exchanges
    }

    /// Switch provider, key or model; takes effect on the next request
    pub fn configure(&mut self, provider: ProviderConfig, gateway: Arc<dyn ChatGateway>) {
        info!(provider = %provider.kind, model = %provider.model_name, "Provider changed");
        self.provider = provider;
        self.gateway = gateway;
    }

    /// Whether `end_interview` would currently succeed
    pub fn can_end(&self) -> bool {
        self.state.phase == Phase::Interviewing
            && end_allowed(&self.state.transcript, self.min_exchanges)
    }

    /// Draft a persona backstory and cache it for this session
    pub async fn generate_persona(&mut self, form: &SetupForm) -> Result<String, SessionError> {
        self.require_phase(Phase::Setup, "generate a persona")?;
        self.validate(
            form,
            &[RequiredField::ProblemStatement, RequiredField::CustomerSegment],
        )?;

        let context = BusinessContext::from(form);
        let prompt =
            InterviewPrompts::build_persona_prompt(&context.customer_segment, &context.problem_statement);
        let request = ChatRequest::new(&self.provider.model_name, vec![Message::user(prompt)])
            .with_effort(EffortHint::Low);

        debug!(session_id = %self.state.id, "Generating persona");
        let started = Instant::now();
        let text = match self.gateway.complete(&request).await {
            Ok(text) => sanitize_fragment(text.trim()),
            Err(e) => return Err(self.gateway_failure("generate a persona", e)),
        };
        if text.is_empty() {
            let e = GatewayError::MalformedResponse("Persona response was empty".to_string());
            return Err(self.gateway_failure("generate a persona", e));
        }

        self.logger.log(&LogEvent::PersonaGenerated {
            session_id: self.state.id.to_string(),
            persona_len: text.len(),
            duration_secs: started.elapsed().as_secs_f64(),
        });

        self.state.persona = Persona::Generated(text.clone());
        Ok(text)
    }

    /// Freeze the setup inputs and open the interview
    pub fn start(&mut self, form: &SetupForm, choice: PersonaChoice) -> Result<(), SessionError> {
        self.require_phase(Phase::Setup, "start an interview")?;
        self.validate(
            form,
            &[
                RequiredField::ProblemStatement,
                RequiredField::CustomerSegment,
                RequiredField::Hypothesis,
            ],
        )?;

        let context = BusinessContext::from(form);
        let persona = match (choice, &self.state.persona) {
            (PersonaChoice::Generated, Persona::Generated(text)) => Persona::Generated(text.clone()),
            _ => Persona::fallback(&context.customer_segment),
        };
        let persona_context = persona.text().unwrap_or_default();
        let system_prompt = InterviewPrompts::build_system_prompt(
            &context.problem_statement,
            &context.hypothesis,
            persona_context,
        );

        self.logger.log(&LogEvent::InterviewStarted {
            session_id: self.state.id.to_string(),
            persona: persona.kind_name().to_string(),
            hypothesis_preview: context.hypothesis.chars().take(100).collect(),
        });

        self.state.transcript = vec![Message::system(system_prompt)];
        self.state.context = Some(context);
        self.state.persona = persona;
        self.state.feedback = None;
        self.state.phase = Phase::Interviewing;
        Ok(())
    }

    /// Send one interviewer question and stream the persona's reply.
    ///
    /// The question and reply are appended together once the stream ends;
    /// any failure leaves the transcript untouched.
    pub async fn send_turn(
        &mut self,
        utterance: &str,
        on_delta: Option<DeltaCallback>,
    ) -> Result<TurnOutcome, SessionError> {
        self.require_phase(Phase::Interviewing, "send a turn")?;

        let utterance = utterance.trim();
        if utterance.is_empty() {
            return Ok(TurnOutcome::Ignored);
        }

        let question = Message::user(utterance);
        let mut messages = self.state.transcript.clone();
        messages.push(question.clone());
        let request =
            ChatRequest::new(&self.provider.model_name, messages).with_effort(EffortHint::Low);

        let started = Instant::now();
        let accumulated = match self.stream_reply(&request, on_delta.as_ref()).await {
            Ok(accumulated) => accumulated,
            Err(e) => return Err(self.gateway_failure("send a turn", e)),
        };

        if accumulated.text.is_empty() {
            if accumulated.interrupted {
                info!(session_id = %self.state.id, "Turn cancelled before any reply");
                return Err(SessionError::Cancelled);
            }
            let e = GatewayError::MalformedResponse("Persona reply was empty".to_string());
            return Err(self.gateway_failure("send a turn", e));
        }

        let reply = Message::assistant(accumulated.text);
        self.state.transcript.push(question);
        self.state.transcript.push(reply.clone());
        let exchanges = self.state.exchanges();

        if accumulated.interrupted {
            self.logger.log(&LogEvent::StreamInterrupted {
                session_id: self.state.id.to_string(),
                stage: StreamStage::Interview,
                received_len: reply.content.len(),
            });
            return Ok(TurnOutcome::Interrupted { reply, exchanges });
        }

        self.logger.log(&LogEvent::TurnCompleted {
            session_id: self.state.id.to_string(),
            exchange: exchanges,
            deltas: accumulated.deltas,
            reply_len: reply.content.len(),
            duration_secs: started.elapsed().as_secs_f64(),
        });

        Ok(TurnOutcome::Replied { reply, exchanges })
    }

    /// Close the interview and freeze the transcript for analysis
    pub fn end_interview(&mut self) -> Result<usize, SessionError> {
        self.require_phase(Phase::Interviewing, "end the interview")?;

        let actual = self.state.exchanges();
        if !end_allowed(&self.state.transcript, self.min_exchanges) {
            return Err(SessionError::NotEnoughExchanges {
                required: self.min_exchanges,
                actual,
            });
        }

        self.logger.log(&LogEvent::InterviewEnded {
            session_id: self.state.id.to_string(),
            exchanges: actual,
        });

        self.state.phase = Phase::Analyzed;
        Ok(actual)
    }

    /// Produce the coach's feedback once; later calls return the cached report
    pub async fn ensure_feedback(
        &mut self,
        on_delta: Option<DeltaCallback>,
    ) -> Result<&FeedbackReport, SessionError> {
        self.require_phase(Phase::Analyzed, "generate feedback")?;

        if self.state.feedback.is_none() {
            let report = self.run_coach(on_delta.as_ref()).await?;
            self.state.feedback = Some(report);
        }

        self.state.feedback.as_ref().ok_or(SessionError::Cancelled)
    }

    /// Discard everything and return to setup
    pub fn reset(&mut self) {
        let previous = self.state.id;
        self.state = SessionState::new();
        self.interrupted.store(false, Ordering::SeqCst);

        self.logger.log(&LogEvent::SessionReset {
            previous_session_id: previous.to_string(),
            session_id: self.state.id.to_string(),
        });
    }

    /// Transcript and feedback as plain text
    pub fn export_text(&self) -> Result<String, SessionError> {
        if self.state.phase == Phase::Setup {
            return Err(SessionError::InvalidPhase {
                operation: "export",
                phase: self.state.phase,
            });
        }
        Ok(render_export(&self.state))
    }

    /// Write the export to `path`, returning the number of bytes written
    pub fn export_to(&self, path: &Path) -> Result<usize, SessionError> {
        let text = self.export_text()?;
        std::fs::write(path, &text)?;

        self.logger.log(&LogEvent::TranscriptExported {
            session_id: self.state.id.to_string(),
            path: path.to_path_buf(),
            bytes: text.len(),
        });
        Ok(text.len())
    }

    async fn run_coach(&self, on_delta: Option<&DeltaCallback>) -> Result<FeedbackReport, SessionError> {
        let Some(context) = self.state.context.as_ref() else {
            return Err(SessionError::InvalidPhase {
                operation: "generate feedback",
                phase: self.state.phase,
            });
        };

        let input = CoachInput {
            transcript: &self.state.transcript,
            problem: &context.problem_statement,
            hypothesis: &context.hypothesis,
            persona_context: self.state.persona.text().unwrap_or_default(),
        };

        self.interrupted.store(false, Ordering::SeqCst);
        let started = Instant::now();
        let evaluator = CoachEvaluator::new(self.gateway.as_ref());
        let result = evaluator
            .evaluate_with_callback(
                input,
                &self.provider.model_name,
                on_delta,
                Some(&self.interrupted),
            )
            .await;

        let report = match result {
            Ok(report) => report,
            Err(discovery_coach::CoachError::Gateway(e)) => {
                return Err(self.gateway_failure("generate feedback", e))
            }
            Err(e) => return Err(e.into()),
        };

        if report.text.is_empty() {
            if report.interrupted {
                return Err(SessionError::Cancelled);
            }
            let e = GatewayError::MalformedResponse("Coach feedback was empty".to_string());
            return Err(self.gateway_failure("generate feedback", e));
        }

        if report.interrupted {
            self.logger.log(&LogEvent::StreamInterrupted {
                session_id: self.state.id.to_string(),
                stage: StreamStage::Coach,
                received_len: report.text.len(),
            });
        }

        self.logger.log(&LogEvent::FeedbackGenerated {
            session_id: self.state.id.to_string(),
            feedback_len: report.text.len(),
            score: report.summary.and_then(|s| s.score),
            verdict: report
                .summary
                .and_then(|s| s.verdict)
                .map(|v| v.to_string()),
            duration_secs: started.elapsed().as_secs_f64(),
        });

        Ok(report)
    }

    async fn stream_reply(
        &self,
        request: &ChatRequest,
        on_delta: Option<&DeltaCallback>,
    ) -> Result<Accumulated, GatewayError> {
        self.interrupted.store(false, Ordering::SeqCst);
        debug!(
            session_id = %self.state.id,
            messages = request.messages.len(),
            "Streaming persona reply"
        );

        let stream = self.gateway.stream(request).await?;
        accumulate_stream(stream, on_delta, Some(&self.interrupted)).await
    }

    fn require_phase(&self, expected: Phase, operation: &'static str) -> Result<(), SessionError> {
        if self.state.phase == expected {
            Ok(())
        } else {
            Err(SessionError::InvalidPhase {
                operation,
                phase: self.state.phase,
            })
        }
    }

    fn validate(&self, form: &SetupForm, fields: &[RequiredField]) -> Result<(), SessionError> {
        let mut missing = Vec::new();
        if !self.provider.has_api_key() {
            missing.push(RequiredField::ApiKey);
        }
        missing.extend(form.missing(fields));

        if missing.is_empty() {
            Ok(())
        } else {
            debug!(?missing, "Setup validation failed");
            Err(SessionError::Validation { missing })
        }
    }

    fn gateway_failure(&self, operation: &str, error: GatewayError) -> SessionError {
        warn!(session_id = %self.state.id, operation, error = %error, "Request failed");
        self.logger.log(&LogEvent::ErrorEncountered {
            session_id: self.state.id.to_string(),
            operation: operation.to_string(),
            error: error.to_string(),
        });
        SessionError::Gateway(error)
    }
}
