use discovery_coach::transcript_to_text;

use crate::SessionState;

pub const TRANSCRIPT_HEADER: &str = "INTERVIEW TRANSCRIPT";
pub const FEEDBACK_HEADER: &str = "AI COACH FEEDBACK";
pub const DEFAULT_EXPORT_FILE: &str = "interview_feedback.txt";

/// Render transcript and feedback as one plain-text document
pub fn render_export(state: &SessionState) -> String {
    let mut out = String::new();

    out.push_str(TRANSCRIPT_HEADER);
    out.push('\n');
    out.push_str(&"=".repeat(TRANSCRIPT_HEADER.len()));
    out.push('\n');
    out.push_str(&format!(
        "Session: {} ({})\n",
        state.id,
        state.created_at.to_rfc3339()
    ));
    if let Some(context) = &state.context {
        out.push_str(&format!("Problem: {}\n", context.problem_statement));
        out.push_str(&format!("Segment: {}\n", context.customer_segment));
        out.push_str(&format!("Hypothesis: {}\n", context.hypothesis));
    }
    out.push('\n');
    out.push_str(&transcript_to_text(&state.transcript));
    out.push_str("\n\n");

    out.push_str(FEEDBACK_HEADER);
    out.push('\n');
    out.push_str(&"=".repeat(FEEDBACK_HEADER.len()));
    out.push('\n');
    match &state.feedback {
        Some(report) => {
            out.push_str(&report.text);
            if report.interrupted {
                out.push_str("\n\n(feedback was interrupted)");
            }
        }
        None => out.push_str("(no feedback generated)"),
    }
    out.push('\n');

    out
}
