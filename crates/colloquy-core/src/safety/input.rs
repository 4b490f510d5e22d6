//! Input-phase detectors.
//!
//! Four checks run against every incoming query: length bounds, prompt
//! injection, toxic language, and topic relevance. Each detector is a pure
//! function of the text and the static safety configuration, so concurrent
//! evaluation of independent queries is always safe.

use crate::safety::patterns;
use crate::safety::SafetyConfig;
use crate::types::{Severity, Violation, ViolationCategory};

/// Flag queries outside the configured length bounds. Too short is a
/// low-severity violation, too long is medium.
pub fn check_length(text: &str, config: &SafetyConfig) -> Vec<Violation> {
    let len = text.trim().chars().count();

    if len < config.min_query_length {
        return vec![Violation::new(
            ViolationCategory::Length,
            Severity::Low,
            format!(
                "Query is too short ({} chars, minimum {})",
                len, config.min_query_length
            ),
        )];
    }

    if len > config.max_query_length {
        return vec![Violation::new(
            ViolationCategory::Length,
            Severity::Medium,
            format!(
                "Query is too long ({} chars, maximum {})",
                len, config.max_query_length
            ),
        )];
    }

    Vec::new()
}

/// Flag prompt-manipulation attempts. Only the first matching pattern is
/// reported; one injection finding is enough to act on.
pub fn check_prompt_injection(text: &str, _config: &SafetyConfig) -> Vec<Violation> {
    for pattern in patterns::INJECTION_PATTERNS.iter() {
        if let Some(m) = pattern.find(text) {
            return vec![Violation::new(
                ViolationCategory::PromptInjection,
                Severity::High,
                "Prompt injection attempt detected",
            )
            .with_excerpt(m.as_str())];
        }
    }

    Vec::new()
}

/// Flag harmful keywords. A single keyword alongside research-context
/// vocabulary is treated as an academic mention and allowed; two or more
/// keywords escalate to high severity.
pub fn check_toxic_language(text: &str, _config: &SafetyConfig) -> Vec<Violation> {
    let matched: Vec<&str> = patterns::HARMFUL_KEYWORD_PATTERNS
        .iter()
        .filter(|(_, pattern)| pattern.is_match(text))
        .map(|(keyword, _)| *keyword)
        .collect();

    if matched.is_empty() {
        return Vec::new();
    }

    if matched.len() == 1 && patterns::has_research_context(text) {
        tracing::debug!(
            keyword = matched[0],
            "harmful keyword allowed in research context"
        );
        return Vec::new();
    }

    let severity = if matched.len() > 1 {
        Severity::High
    } else {
        Severity::Medium
    };

    vec![Violation::new(
        ViolationCategory::ToxicLanguage,
        severity,
        format!("Harmful keyword(s) detected: {}", matched.join(", ")),
    )
    .with_excerpt(matched.join(", "))]
}

/// Flag queries with no overlap with the configured topic vocabulary.
pub fn check_relevance(text: &str, config: &SafetyConfig) -> Vec<Violation> {
    let lower = text.to_lowercase();
    let hits = config
        .topic_keywords
        .iter()
        .filter(|kw| lower.contains(kw.as_str()))
        .count();

    if hits == 0 {
        return vec![Violation::new(
            ViolationCategory::Relevance,
            Severity::Low,
            format!(
                "Query appears to be off-topic for {} research assistance",
                config.research_topic
            ),
        )];
    }

    Vec::new()
}

/// Run all input detectors in order and collect their findings.
pub fn run_detectors(text: &str, config: &SafetyConfig) -> Vec<Violation> {
    let mut violations = Vec::new();
    violations.extend(check_length(text, config));
    violations.extend(check_prompt_injection(text, config));
    violations.extend(check_toxic_language(text, config));
    violations.extend(check_relevance(text, config));
    violations
}
