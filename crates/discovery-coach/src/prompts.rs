/// Phrase the interviewer uses to release the persona from character
pub const STOP_SIGNAL: &str = "STOP INTERVIEW";

/// Persona context used when no generated persona is active
pub fn fallback_persona(segment: &str) -> String {
    format!("A member of this segment: {}", segment)
}

/// Prompt templates for the interview and the coach
pub struct InterviewPrompts;

impl InterviewPrompts {
    /// Build the hidden system prompt that puts the model in character
    pub fn build_system_prompt(problem: &str, hypothesis: &str, persona_context: &str) -> String {
        format!(
            r#"I want you to act as a specific persona for a mock customer discovery interview. Stay in character for the whole conversation and do not break character until I say "{stop}".

## My Business Context
I am investigating a problem related to: {problem}
My hypothesis is: {hypothesis}

## Your Persona
{persona}

## Rules for Your Roleplay
1. Be realistic. Real people are busy, distracted and sometimes indifferent.
2. If I ask a "Yes/No" question, give a short answer.
3. If I ask about the future or a hypothetical ("Would you use...?", "How much would you pay for...?"), stay vague and non-committal. Polite interest is not a commitment.
4. If I ask a leading question (e.g., "Wouldn't you love an app that...?"), react with skepticism or polite disinterest.
5. If I ask about your past behavior or ask a strong open-ended question (e.g., "Tell me about the last time you..."), open up and give specific, concrete details: what happened, what it cost, how often it happens, what you tried. This is where your real pain points come out.
6. DO NOT propose, design or endorse solutions. Only talk about your life, your problems and what you currently do."#,
            stop = STOP_SIGNAL,
            problem = problem,
            hypothesis = hypothesis,
            persona = persona_context,
        )
    }

    /// Build the one-shot prompt that drafts a persona backstory
    pub fn build_persona_prompt(segment: &str, problem: &str) -> String {
        format!(
            r#"I am an entrepreneur preparing for a customer discovery interview.
My customer segment is: {segment}
The problem they face is: {problem}

Create a brief, specific persona description (3 to 5 lines) for a mock interview. Include:
- A specific name, their role, major or job, and relevant demographics
- How they currently cope with this problem (their workaround and what it costs them)
- One real constraint that limits them (budget, time, habit or access)
- A hidden "ground truth" about their behavior that only good questions would uncover

Make them realistic, not a "perfect customer": they may care about the problem less than the entrepreneur hopes. Return only the persona description."#,
            segment = segment,
            problem = problem,
        )
    }

    /// Build the coach prompt for a finished interview
    pub fn build_coach_prompt(
        transcript: &str,
        hypothesis: &str,
        problem: &str,
        persona_context: &str,
    ) -> String {
        format!(
            r#"You are an expert entrepreneurship professor who teaches customer discovery. Analyze the transcript of the student's mock interview below.

## Interview Context
Problem: {problem}
Hypothesis under test: {hypothesis}
Persona played by the interviewee: {persona}

## Transcript
{transcript}

---

Provide feedback in markdown with exactly these sections:

### 1. Question Quality
Did the student ask leading or hypothetical questions (bad) or open-ended questions about past behavior (good)? Quote each leading question verbatim and propose a better rewording for it.

### 2. Hypothesis Verdict
Based ONLY on what the persona actually said, decide whether the hypothesis was validated, invalidated or remains inconclusive. Write the verdict on its own line as `Verdict: Validated`, `Verdict: Invalidated` or `Verdict: Inconclusive`. Then run a false-positive check: flag any apparent validation that rests on compliments, hypothetical answers or agreement with a leading question.

### 3. Missed Opportunities
Which critical areas did the student fail to explore? Cover current workarounds, budget or money already spent, and how frequently the problem occurs.

### 4. Score
Grade the unbiased interviewing technique on its own line as `Score: N/10`, followed by a short justification."#,
            problem = problem,
            hypothesis = hypothesis,
            persona = persona_context,
            transcript = transcript,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_embeds_context() {
        let prompt = InterviewPrompts::build_system_prompt(
            "Students overspend on formal wear",
            "Students will rent from peers",
            "Maya, a sophomore on a budget",
        );
        assert!(prompt.contains("Students overspend on formal wear"));
        assert!(prompt.contains("Students will rent from peers"));
        assert!(prompt.contains("Maya, a sophomore on a budget"));
        assert!(prompt.contains(STOP_SIGNAL));
    }

    #[test]
    fn test_system_prompt_encodes_truthfulness_rules() {
        let prompt = InterviewPrompts::build_system_prompt("p", "h", "c");
        assert!(prompt.contains("hypothetical"));
        assert!(prompt.contains("non-committal"));
        assert!(prompt.contains("leading question"));
        assert!(prompt.contains("past behavior"));
        assert!(prompt.contains("DO NOT propose"));
    }

    #[test]
    fn test_persona_prompt_is_deterministic() {
        let first = InterviewPrompts::build_persona_prompt("seg", "prob");
        let second = InterviewPrompts::build_persona_prompt("seg", "prob");
        assert_eq!(first, second);
        assert!(first.contains("seg"));
        assert!(first.contains("prob"));
        assert!(first.contains("perfect customer"));
        assert!(first.contains("constraint"));
    }

    #[test]
    fn test_coach_prompt_sections() {
        let prompt = InterviewPrompts::build_coach_prompt(
            "USER: hi\nASSISTANT: hello",
            "hyp",
            "prob",
            "persona",
        );
        assert!(prompt.contains("USER: hi\nASSISTANT: hello"));
        assert!(prompt.contains("Question Quality"));
        assert!(prompt.contains("Hypothesis Verdict"));
        assert!(prompt.contains("false-positive"));
        assert!(prompt.contains("Missed Opportunities"));
        assert!(prompt.contains("workarounds"));
        assert!(prompt.contains("Score: N/10"));
    }

    #[test]
    fn test_builders_are_deterministic() {
        assert_eq!(
            InterviewPrompts::build_system_prompt("p", "h", "c"),
            InterviewPrompts::build_system_prompt("p", "h", "c")
        );
        assert_eq!(
            InterviewPrompts::build_coach_prompt("t", "h", "p", "c"),
            InterviewPrompts::build_coach_prompt("t", "h", "p", "c")
        );
    }

    #[test]
    fn test_fallback_persona_quotes_segment() {
        assert_eq!(
            fallback_persona("A student who does Z"),
            "A member of this segment: A student who does Z"
        );
    }
}
