//! Research-tool collaborators.
//!
//! Web and paper search are thin external services: the orchestrator only
//! depends on the [`ResearchTools`] trait, and every failure is a flag on
//! the outcome rather than an error. A search backend that is down
//! degrades the session, it never aborts it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use colloquy_core::ToolCall;

use crate::providers::{ToolCallRequest, ToolSpec};

/// Result of one tool invocation.
///
/// `failed` with empty `results` is the complete failure story; callers
/// record it and move on.
#[derive(Debug, Clone, Default)]
pub struct ToolOutcome<T> {
    pub results: Vec<T>,
    pub failed: bool,
}

impl<T> ToolOutcome<T> {
    /// A successful outcome with results.
    pub fn ok(results: Vec<T>) -> Self {
        Self {
            results,
            failed: false,
        }
    }

    /// A failed outcome. Always empty.
    pub fn failure() -> Self {
        Self {
            results: Vec::new(),
            failed: true,
        }
    }
}

/// One web search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// One academic paper hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperResult {
    pub title: String,
    pub authors: Vec<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub year: Option<u32>,
    pub citation_count: u32,
    pub url: String,
}

/// Search collaborators available to the Researcher role.
#[async_trait]
pub trait ResearchTools: Send + Sync {
    /// Search the web for articles and general information.
    async fn web_search(&self, query: &str, max_results: usize) -> ToolOutcome<WebResult>;

    /// Search academic papers, optionally filtered to recent years.
    async fn paper_search(
        &self,
        query: &str,
        year_from: Option<u32>,
        max_results: usize,
    ) -> ToolOutcome<PaperResult>;

    /// Whether any backend is wired in. Drives the offline Researcher
    /// instruction when false.
    fn available(&self) -> bool {
        true
    }
}

/// Tool set for offline runs: reports unavailable and fails every call.
#[derive(Debug, Default)]
pub struct NullTools;

#[async_trait]
impl ResearchTools for NullTools {
    async fn web_search(&self, _query: &str, _max_results: usize) -> ToolOutcome<WebResult> {
        ToolOutcome::failure()
    }

    async fn paper_search(
        &self,
        _query: &str,
        _year_from: Option<u32>,
        _max_results: usize,
    ) -> ToolOutcome<PaperResult> {
        ToolOutcome::failure()
    }

    fn available(&self) -> bool {
        false
    }
}

/// Default number of hits per search.
pub const DEFAULT_MAX_RESULTS: usize = 5;

/// Summary recorded for any failed or unknown tool call.
pub const UNAVAILABLE_SUMMARY: &str = "unavailable";

/// Specs for the tools exposed to the model during the research turn.
pub fn tool_specs() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: "web_search".to_string(),
            description: "Search the web for articles, blog posts, and general information. \
                          Returns formatted search results with titles, URLs, and snippets."
                .to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "Search query" },
                    "max_results": { "type": "integer", "minimum": 1 }
                },
                "required": ["query"]
            }),
        },
        ToolSpec {
            name: "paper_search".to_string(),
            description: "Search academic papers. Returns papers with authors, abstracts, \
                          citation counts, and URLs. Use year_from to filter recent papers."
                .to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "Search query" },
                    "year_from": { "type": "integer", "description": "Earliest publication year" },
                    "max_results": { "type": "integer", "minimum": 1 }
                },
                "required": ["query"]
            }),
        },
    ]
}

/// Execute one requested tool call and record it.
///
/// Unknown tools, malformed arguments, and backend failures all collapse
/// into the fixed `unavailable` summary.
pub async fn run_tool_call(tools: &dyn ResearchTools, call: &ToolCallRequest) -> ToolCall {
    let query = call.arguments.get("query").and_then(|v| v.as_str());
    let max_results = call
        .arguments
        .get("max_results")
        .and_then(|v| v.as_u64())
        .map(|v| v as usize)
        .unwrap_or(DEFAULT_MAX_RESULTS);

    let summary = match (call.name.as_str(), query) {
        ("web_search", Some(query)) => {
            let outcome = tools.web_search(query, max_results).await;
            if outcome.failed {
                UNAVAILABLE_SUMMARY.to_string()
            } else {
                format_web_results(query, &outcome.results)
            }
        }
        ("paper_search", Some(query)) => {
            let year_from = call
                .arguments
                .get("year_from")
                .and_then(|v| v.as_u64())
                .map(|v| v as u32);
            let outcome = tools.paper_search(query, year_from, max_results).await;
            if outcome.failed {
                UNAVAILABLE_SUMMARY.to_string()
            } else {
                format_paper_results(query, &outcome.results)
            }
        }
        _ => {
            tracing::warn!(tool = %call.name, "unknown or malformed tool call");
            UNAVAILABLE_SUMMARY.to_string()
        }
    };

    ToolCall {
        tool_name: call.name.clone(),
        arguments: call.arguments.clone(),
        result_summary: summary,
    }
}

/// Render web hits into the transcript text handed back to the model.
pub fn format_web_results(query: &str, results: &[WebResult]) -> String {
    if results.is_empty() {
        return format!("No web results found for '{}'.", query);
    }
    let mut text = format!("Web search results for '{}':\n", query);
    for (index, hit) in results.iter().enumerate() {
        text.push_str(&format!(
            "{}. {}\n   {}\n   {}\n",
            index + 1,
            hit.title,
            hit.url,
            hit.snippet
        ));
    }
    text
}

/// Render paper hits into the transcript text handed back to the model.
pub fn format_paper_results(query: &str, results: &[PaperResult]) -> String {
    if results.is_empty() {
        return format!("No papers found for '{}'.", query);
    }
    let mut text = format!("Paper search results for '{}':\n", query);
    for (index, paper) in results.iter().enumerate() {
        let year = paper
            .year
            .map(|y| y.to_string())
            .unwrap_or_else(|| "n.d.".to_string());
        text.push_str(&format!(
            "{}. {} ({}) - {}, cited {} times\n   {}\n   {}\n",
            index + 1,
            paper.title,
            year,
            paper.authors.join(", "),
            paper.citation_count,
            paper.url,
            paper.abstract_text
        ));
    }
    text
}
