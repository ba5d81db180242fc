use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// The coach's call on the hypothesis under test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HypothesisVerdict {
    Validated,
    Invalidated,
    Inconclusive,
}

impl HypothesisVerdict {
    fn from_word(word: &str) -> Option<Self> {
        let word = word
            .trim()
            .trim_matches(|c: char| !c.is_ascii_alphabetic())
            .to_ascii_lowercase();
        match word.as_str() {
            "validated" => Some(Self::Validated),
            "invalidated" => Some(Self::Invalidated),
            "inconclusive" => Some(Self::Inconclusive),
            _ => None,
        }
    }
}

impl fmt::Display for HypothesisVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validated => write!(f, "Validated"),
            Self::Invalidated => write!(f, "Invalidated"),
            Self::Inconclusive => write!(f, "Inconclusive"),
        }
    }
}

/// Machine-readable headline pulled out of the coach's markdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoachSummary {
    /// Interviewing score out of 10
    pub score: Option<u8>,
    pub verdict: Option<HypothesisVerdict>,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SummaryParseError {
    #[error("No score or verdict found in coach output")]
    NoSummaryFound,

    #[error("Ambiguous verdict: more than one verdict marker found")]
    AmbiguousVerdict,

    #[error("Score {0} is outside 0-10")]
    InvalidScore(u32),
}

impl CoachSummary {
    /// Parse the headline from the coach's feedback.
    ///
    /// Looks for the requested marker lines first:
    /// ```text
    /// Verdict: Inconclusive
    /// Score: 4/10
    /// ```
    /// and falls back to bold verdict words and a bare `N/10`.
    pub fn parse(feedback: &str) -> Result<Self, SummaryParseError> {
        debug!(output_len = feedback.len(), "Parsing coach summary");

        let mut score = None;
        let mut verdict = None;

        for line in feedback.lines() {
            let plain = strip_markup(line);
            let lower = plain.to_ascii_lowercase();

            if score.is_none() {
                if let Some(rest) = lower.strip_prefix("score:") {
                    score = leading_number(rest);
                }
            }
            if verdict.is_none() {
                if let Some(rest) = lower.strip_prefix("verdict:") {
                    verdict = rest.split_whitespace().next().and_then(HypothesisVerdict::from_word);
                }
            }
        }

        if score.is_none() {
            score = last_out_of_ten(feedback);
        }
        if verdict.is_none() {
            verdict = Self::parse_bold_markers(feedback)?;
        }

        if let Some(value) = score {
            if value > 10 {
                return Err(SummaryParseError::InvalidScore(value));
            }
        }

        match (score, verdict) {
            (None, None) => Err(SummaryParseError::NoSummaryFound),
            (score, verdict) => Ok(Self {
                score: score.map(|s| s as u8),
                verdict,
            }),
        }
    }

    fn parse_bold_markers(feedback: &str) -> Result<Option<HypothesisVerdict>, SummaryParseError> {
        let lower = feedback.to_ascii_lowercase();
        let found: Vec<HypothesisVerdict> = [
            ("**validated**", HypothesisVerdict::Validated),
            ("**invalidated**", HypothesisVerdict::Invalidated),
            ("**inconclusive**", HypothesisVerdict::Inconclusive),
        ]
        .into_iter()
        .filter(|(marker, _)| lower.contains(marker))
        .map(|(_, verdict)| verdict)
        .collect();

        match found.as_slice() {
            [] => Ok(None),
            [one] => Ok(Some(*one)),
            _ => Err(SummaryParseError::AmbiguousVerdict),
        }
    }
}

fn strip_markup(line: &str) -> String {
    line.chars()
        .filter(|c| !matches!(c, '*' | '#' | '`' | '>'))
        .collect::<String>()
        .trim()
        .to_string()
}

fn leading_number(text: &str) -> Option<u32> {
    let digits: String = text
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Find the last `N/10` (or `N / 10`) in the text
fn last_out_of_ten(text: &str) -> Option<u32> {
    let mut result = None;
    let mut search_from = 0;

    while let Some(offset) = text[search_from..].find("/10") {
        let slash = search_from + offset;
        search_from = slash + 3;
        if text[search_from..].starts_with(|c: char| c.is_ascii_digit()) {
            continue;
        }

        let before = text[..slash].trim_end();
        let digits: String = before
            .chars()
            .rev()
            .take_while(|c| c.is_ascii_digit())
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        if let Ok(value) = digits.parse() {
            result = Some(value);
        }
    }

    result
}

/// Coaching feedback for one finished interview
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackReport {
    /// Sanitized markdown exactly as streamed
    pub text: String,
    pub summary: Option<CoachSummary>,
    /// The coach stream was cut short by the user
    pub interrupted: bool,
}

impl FeedbackReport {
    pub fn new(text: String, interrupted: bool) -> Self {
        let summary = match CoachSummary::parse(&text) {
            Ok(summary) => Some(summary),
            Err(e) => {
                debug!(error = %e, "Coach feedback has no usable summary");
                None
            }
        };

        Self {
            text,
            summary,
            interrupted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_marker_lines() {
        let feedback = r#"### 1. Question Quality
You asked "Wouldn't you love...?" which is leading.

### 2. Hypothesis Verdict
Verdict: Inconclusive

### 4. Score
Score: 4/10
Too many hypotheticals."#;

        let summary = CoachSummary::parse(feedback).unwrap();
        assert_eq!(summary.score, Some(4));
        assert_eq!(summary.verdict, Some(HypothesisVerdict::Inconclusive));
    }

    #[test]
    fn test_parse_bold_marker_lines() {
        let feedback = "**Verdict:** **Invalidated**\n\n**Score:** 7 / 10";
        let summary = CoachSummary::parse(feedback).unwrap();
        assert_eq!(summary.score, Some(7));
        assert_eq!(summary.verdict, Some(HypothesisVerdict::Invalidated));
    }

    #[test]
    fn test_parse_fallback_markers() {
        let feedback = "The hypothesis is **validated** by her story.\n\nOverall I'd give this an 8/10.";
        let summary = CoachSummary::parse(feedback).unwrap();
        assert_eq!(summary.score, Some(8));
        assert_eq!(summary.verdict, Some(HypothesisVerdict::Validated));
    }

    #[test]
    fn test_parse_score_only() {
        let summary = CoachSummary::parse("Score: 10/10").unwrap();
        assert_eq!(summary.score, Some(10));
        assert_eq!(summary.verdict, None);
    }

    #[test]
    fn test_parse_no_summary() {
        let result = CoachSummary::parse("Nice work overall.");
        assert_eq!(result, Err(SummaryParseError::NoSummaryFound));
    }

    #[test]
    fn test_parse_ambiguous_verdict() {
        let result = CoachSummary::parse("Not **validated** but not **invalidated** either.");
        assert_eq!(result, Err(SummaryParseError::AmbiguousVerdict));
    }

    #[test]
    fn test_marker_line_wins_over_bold_words() {
        let feedback = "Not **validated**, arguably **invalidated**.\nVerdict: Inconclusive";
        let summary = CoachSummary::parse(feedback).unwrap();
        assert_eq!(summary.verdict, Some(HypothesisVerdict::Inconclusive));
    }

    #[test]
    fn test_parse_score_out_of_range() {
        let result = CoachSummary::parse("Score: 12/10");
        assert_eq!(result, Err(SummaryParseError::InvalidScore(12)));
    }

    #[test]
    fn test_report_keeps_text_without_summary() {
        let report = FeedbackReport::new("Just prose".to_string(), false);
        assert_eq!(report.text, "Just prose");
        assert!(report.summary.is_none());
        assert!(!report.interrupted);
    }

    #[test]
    fn test_verdict_display() {
        assert_eq!(HypothesisVerdict::Inconclusive.to_string(), "Inconclusive");
    }
}
