pub mod evaluator;
mod prompts;
mod report;
mod transcript;

pub use evaluator::{CoachError, CoachEvaluator, CoachInput};
pub use prompts::{fallback_persona, InterviewPrompts, STOP_SIGNAL};
pub use report::{CoachSummary, FeedbackReport, HypothesisVerdict, SummaryParseError};
pub use transcript::{completed_exchanges, transcript_to_text};
