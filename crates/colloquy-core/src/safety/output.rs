//! Output-phase detectors.
//!
//! Three checks run against every finished draft: PII exposure, harmful
//! instructions, and biased phrasing. PII spans can be redacted in place;
//! the other two cannot be repaired mechanically.

use regex::Regex;

use crate::safety::patterns;
use crate::safety::SafetyConfig;
use crate::types::{Severity, Violation, ViolationCategory};

/// One detected PII span.
#[derive(Debug, Clone)]
struct PiiMatch {
    kind: &'static str,
    start: usize,
    end: usize,
    text: String,
}

/// PII patterns in detection order, most specific first so overlapping
/// digit runs resolve to the narrower kind.
fn pii_patterns() -> [(&'static str, &'static Regex); 5] {
    [
        ("SSN", &patterns::SSN_PATTERN),
        ("CREDIT_CARD", &patterns::CREDIT_CARD_PATTERN),
        ("EMAIL", &patterns::EMAIL_PATTERN),
        ("PHONE", &patterns::PHONE_PATTERN),
        ("IP_ADDRESS", &patterns::IP_ADDRESS_PATTERN),
    ]
}

/// Placeholder numbers that appear in documentation and examples.
fn is_placeholder_phone(matched: &str) -> bool {
    matches!(
        matched,
        "123-456-7890" | "555-555-5555" | "000-000-0000" | "111-111-1111"
    )
}

/// Loopback, unspecified, private, and broadcast addresses.
fn is_reserved_ip(matched: &str) -> bool {
    matched == "127.0.0.1"
        || matched == "0.0.0.0"
        || matched == "255.255.255.255"
        || matched.starts_with("192.168.")
        || matched.starts_with("10.")
}

fn is_false_positive(kind: &str, matched: &str) -> bool {
    match kind {
        "PHONE" => is_placeholder_phone(matched),
        "IP_ADDRESS" => is_reserved_ip(matched),
        _ => false,
    }
}

/// Find all PII spans, false positives filtered, ordered by position with
/// overlaps dropped in favor of the earlier (more specific) match.
fn find_pii(text: &str) -> Vec<PiiMatch> {
    let mut found = Vec::new();

    for (kind, pattern) in pii_patterns() {
        for m in pattern.find_iter(text) {
            if is_false_positive(kind, m.as_str()) {
                continue;
            }
            found.push(PiiMatch {
                kind,
                start: m.start(),
                end: m.end(),
                text: m.as_str().to_string(),
            });
        }
    }

    found.sort_by_key(|m| (m.start, m.end));

    let mut kept: Vec<PiiMatch> = Vec::new();
    for m in found {
        if kept.last().map_or(true, |prev| m.start >= prev.end) {
            kept.push(m);
        }
    }

    kept
}

/// Flag PII exposure. One medium-severity violation per detected span.
pub fn check_pii(text: &str, _config: &SafetyConfig) -> Vec<Violation> {
    find_pii(text)
        .into_iter()
        .map(|m| {
            Violation::new(
                ViolationCategory::Pii,
                Severity::Medium,
                format!("{} detected in output", m.kind),
            )
            .with_excerpt(m.text)
        })
        .collect()
}

/// Replace every detected PII span with its redaction marker, preserving
/// the surrounding text.
pub fn redact_pii(text: &str) -> String {
    let spans = find_pii(text);
    if spans.is_empty() {
        return text.to_string();
    }

    let mut redacted = String::with_capacity(text.len());
    let mut cursor = 0;
    for span in spans {
        redacted.push_str(&text[cursor..span.start]);
        redacted.push_str(&format!("[REDACTED {}]", span.kind));
        cursor = span.end;
    }
    redacted.push_str(&text[cursor..]);
    redacted
}

/// Flag dangerous-instruction phrasing. High severity; the output refusal
/// path handles these, never redaction.
pub fn check_harmful_content(text: &str, _config: &SafetyConfig) -> Vec<Violation> {
    let lower = text.to_lowercase();
    let matched: Vec<&str> = patterns::HARMFUL_OUTPUT_PHRASES
        .iter()
        .filter(|phrase| lower.contains(*phrase))
        .copied()
        .collect();

    if matched.is_empty() {
        return Vec::new();
    }

    vec![Violation::new(
        ViolationCategory::HarmfulContent,
        Severity::High,
        format!("Harmful instruction content detected: {}", matched.join(", ")),
    )]
}

/// Flag overgeneralizing or stereotyping phrasing. Low severity; recorded
/// but never blocking on its own.
pub fn check_bias(text: &str, _config: &SafetyConfig) -> Vec<Violation> {
    patterns::BIAS_PATTERNS
        .iter()
        .filter_map(|pattern| pattern.find(text))
        .map(|m| {
            Violation::new(
                ViolationCategory::Bias,
                Severity::Low,
                "Potentially biased generalization",
            )
            .with_excerpt(m.as_str())
        })
        .collect()
}

/// Run all output detectors in order and collect their findings.
pub fn run_detectors(text: &str, config: &SafetyConfig) -> Vec<Violation> {
    let mut violations = Vec::new();
    violations.extend(check_pii(text, config));
    violations.extend(check_harmful_content(text, config));
    violations.extend(check_bias(text, config));
    violations
}
