//! Safety gate: detector orchestration and verdict synthesis.
//!
//! The gate applies strict, non-configurable verdict rules:
//! 1. Any high-severity violation, or any violation in the phase's
//!    non-negotiable category set -> BLOCKED
//! 2. Output phase, nothing blocked, at least one violation in a
//!    redactable category -> SANITIZED (PII spans replaced with markers)
//! 3. Otherwise -> SAFE (low-risk findings are still recorded)
//!
//! Which categories are non-negotiable or redactable is configuration;
//! the rule order is not.

pub mod input;
pub mod output;
pub mod patterns;

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::types::{Phase, SafetyEvent, Severity, Verdict, Violation, ViolationCategory};

/// Configuration for the safety gate and its detectors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SafetyConfig {
    /// Research domain used in relevance checks and refusal messages.
    pub research_topic: String,

    /// Minimum accepted query length in characters.
    pub min_query_length: usize,

    /// Maximum accepted query length in characters.
    pub max_query_length: usize,

    /// Keywords that mark a query as on-topic.
    pub topic_keywords: Vec<String>,

    /// Input categories that block regardless of severity.
    pub non_negotiable_input: Vec<ViolationCategory>,

    /// Output categories that block regardless of severity.
    pub non_negotiable_output: Vec<ViolationCategory>,

    /// Output categories that can be repaired by redaction.
    pub redactable: Vec<ViolationCategory>,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            research_topic: "human-computer interaction".to_string(),
            min_query_length: 5,
            max_query_length: 2000,
            topic_keywords: patterns::TOPIC_VOCABULARY
                .iter()
                .map(|s| s.to_string())
                .collect(),
            non_negotiable_input: vec![
                ViolationCategory::PromptInjection,
                ViolationCategory::ToxicLanguage,
                ViolationCategory::Length,
                ViolationCategory::Relevance,
            ],
            non_negotiable_output: vec![ViolationCategory::HarmfulContent],
            redactable: vec![ViolationCategory::Pii],
        }
    }
}

/// Append-only destination for safety events.
///
/// Sinks must never fail the gate: implementations swallow their own
/// errors and log them.
pub trait SafetyEventSink: Send + Sync {
    fn record(&self, event: &SafetyEvent);
}

/// Sink that keeps events in memory, for tests and for stats reporting.
#[derive(Default)]
pub struct InMemorySink {
    events: Mutex<Vec<SafetyEvent>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded events, oldest first.
    pub fn events(&self) -> Vec<SafetyEvent> {
        match self.events.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        match self.events.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Aggregate statistics over everything recorded so far.
    pub fn stats(&self) -> SafetyStats {
        SafetyStats::from_events(&self.events())
    }
}

impl SafetyEventSink for InMemorySink {
    fn record(&self, event: &SafetyEvent) {
        match self.events.lock() {
            Ok(mut guard) => guard.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
    }
}

/// Sink that appends one JSON line per event to a file.
pub struct JsonlFileSink {
    file: Mutex<File>,
}

impl JsonlFileSink {
    /// Open the file for appending, creating it and any parent
    /// directories if needed.
    pub fn create(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl SafetyEventSink for JsonlFileSink {
    fn record(&self, event: &SafetyEvent) {
        let line = match serde_json::to_string(event) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize safety event");
                return;
            }
        };
        let mut file = match self.file.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = writeln!(file, "{}", line) {
            tracing::warn!(error = %e, "failed to append safety event");
        }
    }
}

/// Aggregate statistics over a slice of safety events.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SafetyStats {
    pub total_events: usize,
    pub safe: usize,
    pub blocked: usize,
    pub sanitized: usize,
    pub input_events: usize,
    pub output_events: usize,
    pub high_severity_violations: usize,
    pub violations_by_category: BTreeMap<String, usize>,
}

impl SafetyStats {
    pub fn from_events(events: &[SafetyEvent]) -> Self {
        let mut stats = Self {
            total_events: events.len(),
            ..Self::default()
        };

        for event in events {
            match event.verdict {
                Verdict::Safe => stats.safe += 1,
                Verdict::Blocked => stats.blocked += 1,
                Verdict::Sanitized => stats.sanitized += 1,
            }
            match event.phase {
                Phase::Input => stats.input_events += 1,
                Phase::Output => stats.output_events += 1,
            }
            for violation in &event.violations {
                if violation.severity == Severity::High {
                    stats.high_severity_violations += 1;
                }
                *stats
                    .violations_by_category
                    .entry(violation.category.to_string())
                    .or_insert(0) += 1;
            }
        }

        stats
    }

    /// Fraction of events that were blocked.
    pub fn block_rate(&self) -> f64 {
        if self.total_events == 0 {
            0.0
        } else {
            self.blocked as f64 / self.total_events as f64
        }
    }
}

/// Characters of raw content kept in the event record.
const PREVIEW_CHARS: usize = 100;

fn content_preview(text: &str) -> String {
    if text.chars().count() <= PREVIEW_CHARS {
        text.to_string()
    } else {
        let mut preview: String = text.chars().take(PREVIEW_CHARS).collect();
        preview.push_str("...");
        preview
    }
}

/// The SafetyGate runs phase-appropriate detectors and synthesizes
/// their findings into a verdict.
pub struct SafetyGate {
    config: SafetyConfig,
    sinks: Vec<Arc<dyn SafetyEventSink>>,
}

impl SafetyGate {
    pub fn new(config: SafetyConfig) -> Self {
        Self {
            config,
            sinks: Vec::new(),
        }
    }

    /// Attach an event sink. Every evaluation is recorded to all sinks.
    pub fn with_sink(mut self, sink: Arc<dyn SafetyEventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn config(&self) -> &SafetyConfig {
        &self.config
    }

    /// Evaluate text for one phase and return the full event record.
    ///
    /// Detection is pure; the only side effect is recording the event
    /// to the attached sinks.
    pub fn evaluate(&self, text: &str, phase: Phase) -> SafetyEvent {
        let violations = match phase {
            Phase::Input => input::run_detectors(text, &self.config),
            Phase::Output => output::run_detectors(text, &self.config),
        };

        let verdict = self.synthesize_verdict(phase, &violations);
        let sanitized_text = match verdict {
            Verdict::Sanitized => Some(output::redact_pii(text)),
            _ => None,
        };

        let event = SafetyEvent {
            timestamp: Utc::now(),
            phase,
            verdict,
            violations,
            content_preview: content_preview(text),
            sanitized_text,
        };

        match event.verdict {
            Verdict::Safe => {
                tracing::debug!(phase = %phase, "content passed safety checks");
            }
            Verdict::Blocked | Verdict::Sanitized => {
                tracing::warn!(
                    phase = %phase,
                    verdict = %event.verdict,
                    violations = event.violations.len(),
                    "safety gate intervened"
                );
            }
        }

        for sink in &self.sinks {
            sink.record(&event);
        }

        event
    }

    /// Apply the verdict rules in priority order.
    fn synthesize_verdict(&self, phase: Phase, violations: &[Violation]) -> Verdict {
        if violations.is_empty() {
            return Verdict::Safe;
        }

        let non_negotiable = match phase {
            Phase::Input => &self.config.non_negotiable_input,
            Phase::Output => &self.config.non_negotiable_output,
        };

        // Rule 1: severity or category can each force a block.
        let blocks = violations
            .iter()
            .any(|v| v.severity == Severity::High || non_negotiable.contains(&v.category));
        if blocks {
            return Verdict::Blocked;
        }

        // Rule 2: redaction can repair what remains.
        if phase == Phase::Output
            && violations
                .iter()
                .any(|v| self.config.redactable.contains(&v.category))
        {
            return Verdict::Sanitized;
        }

        Verdict::Safe
    }

    /// User-facing refusal text for a blocked event.
    ///
    /// The message is chosen from the most severe violation (first wins
    /// on ties) and never echoes the offending content.
    pub fn refusal_message(&self, event: &SafetyEvent) -> String {
        let mut primary: Option<&Violation> = None;
        for violation in &event.violations {
            if primary.map_or(true, |p| violation.severity > p.severity) {
                primary = Some(violation);
            }
        }

        let category = match primary {
            Some(violation) => violation.category,
            None => return "Request blocked for safety reasons.".to_string(),
        };

        match (event.phase, category) {
            (Phase::Input, ViolationCategory::PromptInjection) => {
                "Your request appears to contain prompt manipulation attempts. \
                 Please ask a legitimate research question."
                    .to_string()
            }
            (Phase::Input, ViolationCategory::ToxicLanguage) => {
                "I cannot help with requests involving harmful or dangerous \
                 activities. Please ask a constructive research question."
                    .to_string()
            }
            (Phase::Input, ViolationCategory::Length) => format!(
                "Your query must be between {} and {} characters. \
                 Please submit a complete research question.",
                self.config.min_query_length, self.config.max_query_length
            ),
            (Phase::Input, ViolationCategory::Relevance) => format!(
                "This assistant only answers research questions about {}. \
                 Please ask something related to that topic.",
                self.config.research_topic
            ),
            (Phase::Output, _) => {
                "The generated response was withheld by a safety review. \
                 Please rephrase your question and try again."
                    .to_string()
            }
            _ => "Request blocked for safety reasons.".to_string(),
        }
    }
}

impl Default for SafetyGate {
    fn default() -> Self {
        Self::new(SafetyConfig::default())
    }
}
