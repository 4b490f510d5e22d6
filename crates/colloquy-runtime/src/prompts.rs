//! Role instructions and judge prompts.
//!
//! All prompt text lives here so the orchestrator and judge stay free of
//! string literals. Templates carry `{handoff}`, `{approve}`, and
//! `{revise}` placeholders that are substituted with the configured
//! signal tokens at render time; everything else is static for cache
//! efficiency.

use colloquy_core::rubric::{rubric_text, Criterion, Perspective};
use colloquy_core::{RoleKind, SignalTokens};

/// Planner instruction template.
///
/// The plan must end with the completion marker; its absence is treated
/// as a recoverable format error by the orchestrator.
pub const PLANNER_PROMPT: &str = r#"You are a Research Planner. Your job is to break down research queries into clear, actionable steps.

When given a research query, you should:
1. Identify the key concepts and topics to investigate
2. Determine what types of sources would be most valuable (academic papers, web articles, etc.)
3. Suggest specific search queries for the Researcher
4. Outline how the findings should be synthesized

Provide your plan in a structured format with numbered steps.
Be specific about what information to gather and why it is relevant.

When your plan is complete, end your reply with the token {handoff} on its own line."#;

/// Researcher instruction template used when search tools are wired in.
pub const RESEARCHER_PROMPT: &str = r#"You are a Research Assistant. Your job is to gather high-quality information from academic papers and web sources.

You have access to two tools: web_search and paper_search. The system executes these calls for you - just request the tool you want with the required parameters.

When conducting research:
1. Use both web_search and paper_search for comprehensive coverage
2. For web_search: provide a query string to search for
3. For paper_search: provide a query string and optionally year_from to filter recent papers
4. Look for recent, high-quality sources
5. Extract key findings, quotes, and data
6. Note all source URLs and citations
7. Gather evidence that directly addresses the research query

Do NOT format tool calls as markdown links or any special syntax - the system handles tool execution automatically."#;

/// Researcher instruction template used when no search tools are available.
pub const RESEARCHER_OFFLINE_PROMPT: &str = r#"You are a Research Assistant. Your job is to provide high-quality information based on your knowledge.

Since external search tools are currently unavailable:
1. Draw on established knowledge about the topic
2. Cite well-known sources, papers, and experts in the field
3. Provide accurate, up-to-date information
4. Acknowledge any limitations in your knowledge
5. Structure your response with clear findings and citations

Focus on providing valuable, research-quality information."#;

/// Writer instruction template.
pub const WRITER_PROMPT: &str = r#"You are a Research Writer. Your job is to synthesize research findings into clear, well-organized responses.

When writing:
1. Start with an overview/introduction
2. Present findings in a logical structure
3. Use APA-style inline citations: (Author, Year) or (Organization, Year)
4. Synthesize information from multiple sources
5. Avoid copying text directly - paraphrase and synthesize
6. Include a References section at the end in APA format
7. Ensure the response directly answers the original query

APA Citation Format Examples:
- In text: "User-centered design places users at the forefront of the design process (Norman, 1988)."
- Multiple authors: "Research shows iterative testing is crucial (Nielsen & Molich, 1990)."
- Organization: "Accessibility is essential for inclusive design (W3C, 2023)."

Format your response professionally with clear headings, paragraphs, APA in-text citations, and an APA-formatted References section at the end."#;

/// Critic instruction template.
pub const CRITIC_PROMPT: &str = r#"You are a Research Critic. Your job is to evaluate the quality and accuracy of research outputs.

Evaluate the research and writing on these criteria:
1. **Relevance**: Does it answer the original query?
2. **Evidence Quality**: Are sources credible and well-cited?
3. **Completeness**: Are all aspects of the query addressed?
4. **Accuracy**: Are there any factual errors or contradictions?
5. **Clarity**: Is the writing clear and well-organized?

Provide constructive but thorough feedback.
End your evaluation with the token {approve} if the response is ready, or the token {revise} followed by the specific improvements you require."#;

/// Corrective instruction appended when a completion marker is missing.
pub const HANDOFF_REMINDER: &str = "Your previous reply was missing the required completion marker. Repeat your full answer and end it with the token {handoff} on its own line.";

/// Corrective instruction appended when the critic omits both verdict tokens.
pub const REVIEW_REMINDER: &str = "Your previous evaluation was missing a verdict token. State your verdict again, ending with {approve} to accept the response or {revise} to request changes.";

/// Suffix appended to every judge system prompt.
pub const JUDGE_JSON_SUFFIX: &str = "\n\nAlways respond with valid JSON format.";

/// Stricter formatting instruction for the single judge retry.
pub const JUDGE_STRICT_RETRY: &str = r#"Your previous reply could not be parsed. Respond again with ONLY a JSON object, no code fences and no surrounding text, in exactly this shape: {"scores": {"<criterion>": <float between 0.0 and 1.0>}, "rationale": "<string>"}."#;

/// Render the instruction for a role with the configured signal tokens.
pub fn role_instruction(role: RoleKind, tokens: &SignalTokens, tools_available: bool) -> String {
    match role {
        RoleKind::Planner => PLANNER_PROMPT.replace("{handoff}", &tokens.handoff),
        RoleKind::Researcher => {
            if tools_available {
                RESEARCHER_PROMPT.to_string()
            } else {
                RESEARCHER_OFFLINE_PROMPT.to_string()
            }
        }
        RoleKind::Writer => WRITER_PROMPT.to_string(),
        RoleKind::Critic => CRITIC_PROMPT
            .replace("{approve}", &tokens.approve)
            .replace("{revise}", &tokens.revise),
    }
}

/// Render the corrective reminder for a missing completion marker.
pub fn handoff_reminder(tokens: &SignalTokens) -> String {
    HANDOFF_REMINDER.replace("{handoff}", &tokens.handoff)
}

/// Render the corrective reminder for a missing critic verdict.
pub fn review_reminder(tokens: &SignalTokens) -> String {
    REVIEW_REMINDER
        .replace("{approve}", &tokens.approve)
        .replace("{revise}", &tokens.revise)
}

/// The opening task message that seeds every session transcript.
pub fn task_message(query: &str) -> String {
    format!(
        r#"Research Query: {}

Please work together to answer this query comprehensively:
1. Planner: Create a research plan
2. Researcher: Gather evidence from web and academic sources
3. Writer: Synthesize findings into a well-cited response
4. Critic: Evaluate the quality and provide feedback"#,
        query
    )
}

/// System prompt for one judging perspective.
pub fn judge_system_prompt(perspective: &Perspective) -> String {
    format!("{}{}", perspective.system_prompt, JUDGE_JSON_SUFFIX)
}

/// User prompt for one judge call, covering every criterion at once.
pub fn judge_user_prompt(query: &str, response: &str, criteria: &[Criterion]) -> String {
    let mut sections = String::from(
        "Evaluate the following response against each criterion listed below.\n\n\
         ## Criteria and Scoring Rubrics (0.0 to 1.0 scale)\n",
    );

    for criterion in criteria {
        sections.push_str(&format!(
            "\n### {}\n{}\n{}\n",
            criterion.name,
            criterion.description,
            rubric_text(&criterion.name)
        ));
    }

    sections.push_str(&format!(
        r#"
## Query
{}

## Response to Evaluate
{}

## Instructions
1. Carefully read the response and evaluate it against every criterion
2. Use the scoring rubrics to determine appropriate scores
3. Provide brief reasoning for your scores
4. Be consistent and fair in your evaluation

## Required Output Format (JSON)
Respond ONLY with valid JSON in this exact format:
```json
{{
    "scores": {{"<criterion name>": <float between 0.0 and 1.0>}},
    "rationale": "<explanation of your scores, referencing specific parts of the response>"
}}
```
"#,
        query, response
    ));

    sections
}

#[cfg(test)]
mod tests {
    use super::*;
    use colloquy_core::rubric::standard_criteria;

    #[test]
    fn test_planner_instruction_embeds_handoff_token() {
        let tokens = SignalTokens::default();
        let instruction = role_instruction(RoleKind::Planner, &tokens, true);
        assert!(instruction.contains("HANDOFF"));
        assert!(!instruction.contains("{handoff}"));
    }

    #[test]
    fn test_critic_instruction_embeds_verdict_tokens() {
        let tokens = SignalTokens::default();
        let instruction = role_instruction(RoleKind::Critic, &tokens, true);
        assert!(instruction.contains("APPROVED"));
        assert!(instruction.contains("REVISE"));
        assert!(!instruction.contains("{approve}"));
        assert!(!instruction.contains("{revise}"));
    }

    #[test]
    fn test_custom_tokens_are_substituted() {
        let tokens = SignalTokens {
            handoff: "<<DONE>>".to_string(),
            approve: "<<SHIP>>".to_string(),
            revise: "<<REDO>>".to_string(),
        };
        assert!(role_instruction(RoleKind::Planner, &tokens, true).contains("<<DONE>>"));
        let critic = role_instruction(RoleKind::Critic, &tokens, true);
        assert!(critic.contains("<<SHIP>>"));
        assert!(critic.contains("<<REDO>>"));
    }

    #[test]
    fn test_researcher_variants() {
        let tokens = SignalTokens::default();
        let online = role_instruction(RoleKind::Researcher, &tokens, true);
        assert!(online.contains("web_search"));
        assert!(online.contains("paper_search"));

        let offline = role_instruction(RoleKind::Researcher, &tokens, false);
        assert!(offline.contains("currently unavailable"));
        assert!(!offline.contains("web_search"));
    }

    #[test]
    fn test_writer_prompt_has_citation_examples() {
        assert!(WRITER_PROMPT.contains("(Norman, 1988)"));
        assert!(WRITER_PROMPT.contains("References section"));
    }

    #[test]
    fn test_reminders_name_tokens() {
        let tokens = SignalTokens::default();
        assert!(handoff_reminder(&tokens).contains("HANDOFF"));
        let review = review_reminder(&tokens);
        assert!(review.contains("APPROVED"));
        assert!(review.contains("REVISE"));
    }

    #[test]
    fn test_task_message_lists_pipeline() {
        let message = task_message("What is usability testing?");
        assert!(message.starts_with("Research Query: What is usability testing?"));
        assert!(message.contains("1. Planner"));
        assert!(message.contains("4. Critic"));
    }

    #[test]
    fn test_judge_system_prompt_appends_json_directive() {
        let perspective = Perspective::academic();
        let prompt = judge_system_prompt(&perspective);
        assert!(prompt.starts_with(&perspective.system_prompt));
        assert!(prompt.ends_with("Always respond with valid JSON format."));
    }

    #[test]
    fn test_judge_user_prompt_sections() {
        let prompt = judge_user_prompt(
            "What is usability testing?",
            "Usability testing observes real users (Nielsen, 1993).",
            &standard_criteria(),
        );
        assert!(prompt.contains("## Query"));
        assert!(prompt.contains("## Response to Evaluate"));
        assert!(prompt.contains("## Required Output Format (JSON)"));
        assert!(prompt.contains("### relevance"));
        assert!(prompt.contains("### clarity"));
        // Band text is carried through from the rubric
        assert!(prompt.contains("completely off-topic"));
    }

    #[test]
    fn test_strict_retry_names_expected_shape() {
        assert!(JUDGE_STRICT_RETRY.contains("\"scores\""));
        assert!(JUDGE_STRICT_RETRY.contains("\"rationale\""));
        assert!(JUDGE_STRICT_RETRY.contains("no code fences"));
    }
}
