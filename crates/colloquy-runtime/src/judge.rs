//! LLM-as-judge scoring engine.
//!
//! Each configured perspective scores a response with ONE completion
//! covering every criterion at once; perspectives fan out concurrently
//! and fan back in as a fixed-shape score set. The reply is expected as
//! a JSON object `{"scores": {...}, "rationale": "..."}`; parsing is
//! deliberately forgiving (fences stripped, object salvaged from
//! surrounding prose, 0-10 scales folded back to 0-1) because judge
//! models drift from the requested format in practice. A reply that
//! still fails after one stricter retry zero-fills the perspective and
//! flags it `parse_failed` so a parse failure is never mistaken for a
//! legitimately low score.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future;
use lazy_static::lazy_static;
use regex::Regex;

use colloquy_core::{Criterion, CriterionScore, JudgeConfig, Perspective, PerspectiveScore};

use crate::cache::{ScoreCache, ScoreCacheKey};
use crate::orchestrator::RuntimeError;
use crate::prompts;
use crate::providers::{
    ChatMessage, CompletionConfig, CompletionRequest, CompletionResponse, CompletionService,
    ProviderError,
};
use crate::resilience::{with_transport_retry, AdmissionGate};

lazy_static! {
    /// A JSON object inside a markdown code fence.
    static ref FENCED_JSON: Regex = Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").unwrap();

    /// The widest `{...}` span in the reply.
    static ref BARE_OBJECT: Regex = Regex::new(r"(?s)\{.*\}").unwrap();
}

/// Scores responses under every configured perspective.
pub struct JudgeEngine {
    service: Arc<dyn CompletionService>,
    config: JudgeConfig,
    completion: CompletionConfig,
    admission: AdmissionGate,
    cache: Option<ScoreCache>,
}

impl JudgeEngine {
    pub fn new(service: Arc<dyn CompletionService>, config: JudgeConfig) -> Self {
        Self {
            service,
            config,
            completion: CompletionConfig::default(),
            admission: AdmissionGate::new(4),
            cache: None,
        }
    }

    pub fn with_completion(mut self, completion: CompletionConfig) -> Self {
        self.completion = completion;
        self
    }

    /// Share an admission gate with other components calling the same
    /// provider.
    pub fn with_admission(mut self, admission: AdmissionGate) -> Self {
        self.admission = admission;
        self
    }

    pub fn with_cache(mut self, cache: ScoreCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(&self) -> &JudgeConfig {
        &self.config
    }

    /// Score a response under every configured perspective.
    pub async fn score(
        &self,
        query: &str,
        response: &str,
    ) -> Result<Vec<PerspectiveScore>, RuntimeError> {
        self.score_with(&self.config.perspectives, query, response)
            .await
    }

    /// Score a response under an explicit perspective subset.
    ///
    /// Perspectives fan out concurrently; the shared admission gate is
    /// what actually bounds in-flight provider calls. A transport
    /// failure in any perspective fails the whole scoring pass.
    pub async fn score_with(
        &self,
        perspectives: &[Perspective],
        query: &str,
        response: &str,
    ) -> Result<Vec<PerspectiveScore>, RuntimeError> {
        let futures = perspectives
            .iter()
            .map(|perspective| self.score_perspective(perspective, query, response));

        future::join_all(futures).await.into_iter().collect()
    }

    async fn score_perspective(
        &self,
        perspective: &Perspective,
        query: &str,
        response: &str,
    ) -> Result<PerspectiveScore, RuntimeError> {
        let key = ScoreCacheKey::new(&perspective.id, query, response);
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(&key).await {
                tracing::debug!(perspective = %perspective.id, "judge cache hit");
                return Ok(hit);
            }
        }

        let system = prompts::judge_system_prompt(perspective);
        let user = prompts::judge_user_prompt(query, response, &self.config.criteria);

        let reply = self
            .complete_judge(&system, vec![ChatMessage::user(user.clone())])
            .await?;

        let score = match parse_judge_reply(&reply.text, &self.config.criteria) {
            Ok(parsed) => build_score(perspective, parsed, &self.config.criteria),
            Err(first_error) => {
                tracing::debug!(
                    perspective = %perspective.id,
                    error = %first_error,
                    "judge reply unparseable, retrying with stricter instruction"
                );
                let retry_transcript = vec![
                    ChatMessage::user(user),
                    ChatMessage::assistant(reply.text.clone()),
                    ChatMessage::user(prompts::JUDGE_STRICT_RETRY.to_string()),
                ];
                let retry = self.complete_judge(&system, retry_transcript).await?;
                match parse_judge_reply(&retry.text, &self.config.criteria) {
                    Ok(parsed) => build_score(perspective, parsed, &self.config.criteria),
                    Err(second_error) => {
                        tracing::warn!(
                            perspective = %perspective.id,
                            error = %second_error,
                            "judge reply unparseable after retry, zero-filling scores"
                        );
                        PerspectiveScore::zeroed(perspective.id.as_str(), &self.config.criteria)
                    }
                }
            }
        };

        // Parse failures are placeholders, not results; caching them
        // would pin the failure for the cache lifetime.
        if let Some(cache) = &self.cache {
            if !score.parse_failed {
                cache.insert(key, score.clone()).await;
            }
        }

        Ok(score)
    }

    async fn complete_judge(
        &self,
        system: &str,
        transcript: Vec<ChatMessage>,
    ) -> Result<CompletionResponse, ProviderError> {
        let _permit = self.admission.admit().await;

        let request = CompletionRequest::new(system).with_transcript(transcript);
        with_transport_retry(|| async {
            match tokio::time::timeout(
                self.completion.timeout,
                self.service.complete(&request, &self.completion),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(self.completion.timeout)),
            }
        })
        .await
    }
}

/// A judge reply after extraction, before clamping.
struct ParsedReply {
    scores: BTreeMap<String, f64>,
    rationale: String,
}

/// Parse the judge's reply, trying the raw text, a fenced JSON block,
/// and the widest object span, in that order. A reply that names none
/// of the configured criteria counts as unparseable.
fn parse_judge_reply(text: &str, criteria: &[Criterion]) -> Result<ParsedReply, String> {
    for candidate in candidates(text) {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(candidate) {
            if let Some(reply) = extract_reply(&value) {
                if criteria.iter().any(|c| reply.scores.contains_key(&c.name)) {
                    return Ok(reply);
                }
            }
        }
    }
    Err("no parseable scores object found".to_string())
}

fn candidates(text: &str) -> Vec<&str> {
    let mut out = vec![text.trim()];
    if let Some(captures) = FENCED_JSON.captures(text) {
        if let Some(block) = captures.get(1) {
            out.push(block.as_str());
        }
    }
    if let Some(span) = BARE_OBJECT.find(text) {
        out.push(span.as_str());
    }
    out
}

fn extract_reply(value: &serde_json::Value) -> Option<ParsedReply> {
    let scores_value = value.get("scores")?.as_object()?;

    let mut scores = BTreeMap::new();
    for (name, raw) in scores_value {
        let score = match raw {
            serde_json::Value::Number(n) => n.as_f64()?,
            // Per-criterion object form: {"score": 0.8, "reasoning": ...}
            serde_json::Value::Object(map) => map.get("score")?.as_f64()?,
            serde_json::Value::String(s) => s.trim().parse().ok()?,
            _ => return None,
        };
        scores.insert(name.clone(), score);
    }

    let rationale = value
        .get("rationale")
        .or_else(|| value.get("reasoning"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    Some(ParsedReply { scores, rationale })
}

/// Fold a 0-10 scale reply back onto 0-1; `CriterionScore` clamps the
/// rest.
fn normalize_score(value: f64) -> f64 {
    if value > 1.0 {
        value / 10.0
    } else {
        value
    }
}

fn build_score(
    perspective: &Perspective,
    parsed: ParsedReply,
    criteria: &[Criterion],
) -> PerspectiveScore {
    let mut criterion_scores = BTreeMap::new();
    for criterion in criteria {
        let raw = match parsed.scores.get(&criterion.name) {
            Some(value) => *value,
            None => {
                tracing::warn!(
                    perspective = %perspective.id,
                    criterion = %criterion.name,
                    "judge reply omitted a criterion, scoring it 0.0"
                );
                0.0
            }
        };
        criterion_scores.insert(
            criterion.name.clone(),
            CriterionScore::new(normalize_score(raw), parsed.rationale.clone()),
        );
    }
    PerspectiveScore::new(perspective.id.as_str(), criterion_scores, criteria)
}
