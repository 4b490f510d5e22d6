//! Core data model shared across the pipeline.
//!
//! Everything here is plain serializable data with no behavior beyond
//! small accessors. The orchestrator, safety gate, judge, and evaluator
//! all communicate through these types.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One research query, as loaded from a query set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub id: u32,
    pub text: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub expected_topics: Vec<String>,
}

fn default_category() -> String {
    "general".to_string()
}

impl Query {
    /// Convenience constructor for tests and ad-hoc CLI queries.
    pub fn new(id: u32, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            category: default_category(),
            expected_topics: Vec::new(),
        }
    }
}

/// Errors raised while loading a query set.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid query set: {0}")]
    Validation(String),
}

/// An ordered collection of queries for a batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySet {
    pub queries: Vec<Query>,
}

impl QuerySet {
    /// Parse a query set from a JSON array of query records.
    pub fn from_json(json: &str) -> Result<Self, QueryError> {
        let queries: Vec<Query> = serde_json::from_str(json)?;
        let set = Self { queries };
        set.validate()?;
        Ok(set)
    }

    /// Load a query set from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, QueryError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Validate structural requirements: non-empty set, non-empty query
    /// text, unique ids.
    pub fn validate(&self) -> Result<(), QueryError> {
        if self.queries.is_empty() {
            return Err(QueryError::Validation("query set is empty".to_string()));
        }

        let mut seen = HashSet::new();
        for query in &self.queries {
            if query.text.trim().is_empty() {
                return Err(QueryError::Validation(format!(
                    "query {} has empty text",
                    query.id
                )));
            }
            if !seen.insert(query.id) {
                return Err(QueryError::Validation(format!(
                    "duplicate query id: {}",
                    query.id
                )));
            }
        }

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }
}

/// The four agent roles in turn order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleKind {
    Planner,
    Researcher,
    Writer,
    Critic,
}

impl RoleKind {
    /// All roles in pipeline order.
    pub fn pipeline_order() -> [RoleKind; 4] {
        [
            RoleKind::Planner,
            RoleKind::Researcher,
            RoleKind::Writer,
            RoleKind::Critic,
        ]
    }
}

impl fmt::Display for RoleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RoleKind::Planner => "Planner",
            RoleKind::Researcher => "Researcher",
            RoleKind::Writer => "Writer",
            RoleKind::Critic => "Critic",
        };
        write!(f, "{}", name)
    }
}

/// One tool invocation made during a Researcher turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool_name: String,
    pub arguments: serde_json::Value,
    pub result_summary: String,
}

/// One completed agent turn. Appended by the orchestrator in strictly
/// increasing `step_index`; never mutated after append.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceStep {
    pub step_index: u32,
    pub role: RoleKind,
    pub output_text: String,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
}

/// Which side of the agent turns a safety check ran on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Input,
    Output,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Input => write!(f, "input"),
            Phase::Output => write!(f, "output"),
        }
    }
}

/// Violation severity, ordered so that `High` compares greatest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
        }
    }
}

/// What a detector flagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationCategory {
    PromptInjection,
    ToxicLanguage,
    Length,
    Relevance,
    Pii,
    HarmfulContent,
    Bias,
}

impl fmt::Display for ViolationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ViolationCategory::PromptInjection => "prompt_injection",
            ViolationCategory::ToxicLanguage => "toxic_language",
            ViolationCategory::Length => "length",
            ViolationCategory::Relevance => "relevance",
            ViolationCategory::Pii => "pii",
            ViolationCategory::HarmfulContent => "harmful_content",
            ViolationCategory::Bias => "bias",
        };
        write!(f, "{}", name)
    }
}

/// One finding from one detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub category: ViolationCategory,
    pub severity: Severity,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
}

impl Violation {
    pub fn new(
        category: ViolationCategory,
        severity: Severity,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            category,
            severity,
            reason: reason.into(),
            excerpt: None,
        }
    }

    pub fn with_excerpt(mut self, excerpt: impl Into<String>) -> Self {
        self.excerpt = Some(excerpt.into());
        self
    }
}

/// The gate's ruling on one text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Safe,
    Blocked,
    Sanitized,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Safe => write!(f, "safe"),
            Verdict::Blocked => write!(f, "blocked"),
            Verdict::Sanitized => write!(f, "sanitized"),
        }
    }
}

/// Record of one safety-gate invocation. Produced exactly once per
/// `evaluate` call and appended to the event sink; never edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyEvent {
    pub timestamp: DateTime<Utc>,
    pub phase: Phase,
    pub verdict: Verdict,
    pub violations: Vec<Violation>,
    /// First 100 characters of the checked text, for the audit log.
    pub content_preview: String,
    /// Redacted text, present only when the verdict is `sanitized`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sanitized_text: Option<String>,
}

impl SafetyEvent {
    pub fn is_blocked(&self) -> bool {
        self.verdict == Verdict::Blocked
    }

    /// Highest severity among the recorded violations, if any.
    pub fn max_severity(&self) -> Option<Severity> {
        self.violations.iter().map(|v| v.severity).max()
    }
}

/// Grouping key for failed batch results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Transport,
    Format,
    Other,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Transport => write!(f, "transport"),
            ErrorCategory::Format => write!(f, "format"),
            ErrorCategory::Other => write!(f, "other"),
        }
    }
}

/// Why a session (or its judging) failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionFailure {
    pub category: ErrorCategory,
    pub detail: String,
}

impl SessionFailure {
    pub fn transport(detail: impl Into<String>) -> Self {
        Self {
            category: ErrorCategory::Transport,
            detail: detail.into(),
        }
    }

    pub fn format(detail: impl Into<String>) -> Self {
        Self {
            category: ErrorCategory::Format,
            detail: detail.into(),
        }
    }
}

/// Terminal state of a finished session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Done,
    Blocked,
}

/// The unit of work for one query: the trace, the two safety events,
/// and the final response. Every finalized session carries a non-empty
/// `response_text`, even on failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub query: Query,
    pub steps: Vec<TraceStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_event: Option<SafetyEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_event: Option<SafetyEvent>,
    pub response_text: String,
    pub state: SessionState,
    /// The critic was still requesting changes when the revision bound hit.
    #[serde(default)]
    pub unresolved_critique: bool,
    /// The output gate blocked the draft and substituted the refusal text.
    #[serde(default)]
    pub failed_safe: bool,
    #[serde(default)]
    pub revisions_used: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<SessionFailure>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl Session {
    /// True when the session hit an unrecoverable error and carries the
    /// placeholder response instead of a real one.
    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    /// Number of Writer turns in the trace.
    pub fn writer_steps(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.role == RoleKind::Writer)
            .count()
    }

    /// Total tool calls across all steps.
    pub fn tool_call_count(&self) -> usize {
        self.steps.iter().map(|s| s.tool_calls.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
        assert_eq!(
            [Severity::Low, Severity::High, Severity::Medium]
                .iter()
                .max(),
            Some(&Severity::High)
        );
    }

    #[test]
    fn test_enums_serialize_snake_case() {
        assert_eq!(
            serde_json::to_string(&ViolationCategory::PromptInjection).unwrap(),
            "\"prompt_injection\""
        );
        assert_eq!(serde_json::to_string(&Verdict::Sanitized).unwrap(), "\"sanitized\"");
        assert_eq!(serde_json::to_string(&RoleKind::Researcher).unwrap(), "\"researcher\"");
        assert_eq!(serde_json::to_string(&Phase::Input).unwrap(), "\"input\"");
    }

    #[test]
    fn test_query_set_rejects_duplicate_ids() {
        let json = r#"[
            {"id": 1, "text": "What is usability testing?"},
            {"id": 1, "text": "What is accessibility?"}
        ]"#;
        let err = QuerySet::from_json(json).unwrap_err();
        assert!(matches!(err, QueryError::Validation(_)));
    }

    #[test]
    fn test_query_set_rejects_empty_text() {
        let json = r#"[{"id": 1, "text": "   "}]"#;
        assert!(QuerySet::from_json(json).is_err());
    }

    #[test]
    fn test_query_set_defaults() {
        let json = r#"[{"id": 7, "text": "How do users learn new interfaces?"}]"#;
        let set = QuerySet::from_json(json).unwrap();
        assert_eq!(set.queries[0].category, "general");
        assert!(set.queries[0].expected_topics.is_empty());
    }

    #[test]
    fn test_max_severity() {
        let event = SafetyEvent {
            timestamp: Utc::now(),
            phase: Phase::Output,
            verdict: Verdict::Safe,
            violations: vec![
                Violation::new(ViolationCategory::Bias, Severity::Low, "stereotype"),
                Violation::new(ViolationCategory::Pii, Severity::Medium, "email"),
            ],
            content_preview: String::new(),
            sanitized_text: None,
        };
        assert_eq!(event.max_severity(), Some(Severity::Medium));
    }

    #[test]
    fn test_session_accessors() {
        let query = Query::new(1, "test");
        let step = |i, role| TraceStep {
            step_index: i,
            role,
            output_text: "text".to_string(),
            tool_calls: vec![],
        };
        let mut research = step(1, RoleKind::Researcher);
        research.tool_calls = vec![
            ToolCall {
                tool_name: "web_search".to_string(),
                arguments: serde_json::json!({"query": "usability"}),
                result_summary: "2 results".to_string(),
            },
            ToolCall {
                tool_name: "paper_search".to_string(),
                arguments: serde_json::json!({"query": "usability"}),
                result_summary: "unavailable".to_string(),
            },
        ];
        let session = Session {
            query,
            steps: vec![
                step(0, RoleKind::Planner),
                research,
                step(2, RoleKind::Writer),
                step(3, RoleKind::Critic),
                step(4, RoleKind::Writer),
            ],
            input_event: None,
            output_event: None,
            response_text: "final".to_string(),
            state: SessionState::Done,
            unresolved_critique: false,
            failed_safe: false,
            revisions_used: 1,
            failure: None,
            started_at: Utc::now(),
            finished_at: Utc::now(),
        };
        assert_eq!(session.writer_steps(), 2);
        assert_eq!(session.tool_call_count(), 2);
        assert!(!session.is_failed());
    }
}
