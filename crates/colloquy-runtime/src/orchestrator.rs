//! Multi-agent research pipeline orchestration.
//!
//! The orchestrator drives one query through the role pipeline with
//! safety checks on both ends. It implements:
//! - An explicit state machine over the pipeline stages
//! - One corrective re-invocation when a signal marker is missing
//! - A bounded Researcher tool loop and a bounded revision loop
//! - Per-call admission, budget, timeout, and retry-once handling
//! - Fail-safe finalization: every session ends with a response

use std::sync::Arc;

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

use colloquy_core::{
    extract_signal, Phase, PipelineConfig, Query, RoleKind, SafetyEvent, SafetyGate, Session,
    SessionFailure, SessionState, Signal, ToolCall, TraceStep, Verdict,
};

use crate::prompts;
use crate::providers::{
    ChatMessage, CompletionConfig, CompletionRequest, CompletionResponse, CompletionService,
    ProviderError, ToolCallRequest, ToolSpec,
};
use crate::resilience::{with_transport_retry, AdmissionGate, BudgetTracker, LlmUsage};
use crate::tools::{self, NullTools, ResearchTools};

/// Errors from the runtime pipeline.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Provider not configured: {0}")]
    ProviderNotConfigured(String),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}

/// Response substituted when a session dies on an unrecoverable
/// provider failure. Deliberately content-free; the failure detail
/// lives on the session record.
pub const ERROR_PLACEHOLDER: &str =
    "An error occurred while processing your query. Please try again later.";

lazy_static! {
    /// APA-style inline citation, e.g. "(Norman, 1988)" or
    /// "(Nielsen & Molich, n.d.)".
    static ref INLINE_CITATION: Regex =
        Regex::new(r"\([A-Z][^()]{0,80},\s*(?:\d{4}[a-z]?|n\.d\.)\)").unwrap();

    /// A references section heading, plain or markdown.
    static ref REFERENCES_HEADING: Regex =
        Regex::new(r"(?im)^\s*(?:#+\s*)?references\b").unwrap();
}

fn has_citation(text: &str) -> bool {
    INLINE_CITATION.is_match(text) || REFERENCES_HEADING.is_match(text)
}

/// Pipeline stages. `Done` and `Blocked` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    InputCheck,
    Plan,
    Research,
    Write,
    Critique,
    OutputCheck,
    Done,
    Blocked,
}

/// Mutable working state for one in-flight session.
struct SessionCtx {
    query: Query,
    steps: Vec<TraceStep>,
    transcript: Vec<ChatMessage>,
    input_event: Option<SafetyEvent>,
    output_event: Option<SafetyEvent>,
    draft: String,
    response: String,
    revisions_used: u32,
    unresolved_critique: bool,
    failed_safe: bool,
    failure: Option<SessionFailure>,
    started_at: DateTime<Utc>,
}

impl SessionCtx {
    fn new(query: Query, started_at: DateTime<Utc>) -> Self {
        let transcript = vec![ChatMessage::user(prompts::task_message(&query.text))];
        Self {
            query,
            steps: Vec::new(),
            transcript,
            input_event: None,
            output_event: None,
            draft: String::new(),
            response: String::new(),
            revisions_used: 0,
            unresolved_critique: false,
            failed_safe: false,
            failure: None,
            started_at,
        }
    }

    /// Append a finished turn: one assistant message on the transcript
    /// and one trace step, in that order.
    fn push_step(&mut self, role: RoleKind, text: String, tool_calls: Vec<ToolCall>) {
        self.transcript
            .push(ChatMessage::assistant(format!("{}: {}", role, text)));
        let step_index = self.steps.len() as u32;
        self.steps.push(TraceStep {
            step_index,
            role,
            output_text: text,
            tool_calls,
        });
    }

    fn finalize(self, state: SessionState) -> Session {
        Session {
            query: self.query,
            steps: self.steps,
            input_event: self.input_event,
            output_event: self.output_event,
            response_text: self.response,
            state,
            unresolved_critique: self.unresolved_critique,
            failed_safe: self.failed_safe,
            revisions_used: self.revisions_used,
            failure: self.failure,
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}

/// Transcript for a corrective re-invocation: the failed reply plus the
/// formatting reminder, appended to the turn's view of the session.
fn corrective_transcript(
    base: &[ChatMessage],
    role: RoleKind,
    failed_reply: &str,
    reminder: String,
) -> Vec<ChatMessage> {
    let mut transcript = base.to_vec();
    transcript.push(ChatMessage::assistant(format!("{}: {}", role, failed_reply)));
    transcript.push(ChatMessage::user(reminder));
    transcript
}

/// The orchestrator runs one research session per query.
///
/// Sessions share no mutable state with one another, so a single
/// orchestrator may drive many sessions concurrently; the admission
/// gate and budget tracker are the only shared resources, and both are
/// safe under concurrent use.
pub struct AgentOrchestrator {
    service: Arc<dyn CompletionService>,
    tools: Arc<dyn ResearchTools>,
    gate: Arc<SafetyGate>,
    pipeline: PipelineConfig,
    completion: CompletionConfig,
    admission: AdmissionGate,
    budget: Arc<BudgetTracker>,
}

impl AgentOrchestrator {
    /// Create an orchestrator with default safety, pipeline, and budget
    /// settings and no research tools.
    pub fn new(service: Arc<dyn CompletionService>) -> Self {
        Self {
            service,
            tools: Arc::new(NullTools),
            gate: Arc::new(SafetyGate::default()),
            pipeline: PipelineConfig::default(),
            completion: CompletionConfig::default(),
            admission: AdmissionGate::new(4),
            budget: Arc::new(BudgetTracker::unlimited()),
        }
    }

    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    /// Run one query through the full pipeline.
    ///
    /// Never returns an error: unrecoverable failures finalize the
    /// session with the placeholder response and a recorded failure.
    pub async fn run_session(&self, query: Query) -> Session {
        let started_at = Utc::now();
        tracing::info!(query_id = query.id, category = %query.category, "research session started");

        let mut ctx = SessionCtx::new(query, started_at);
        let mut stage = Stage::InputCheck;

        loop {
            stage = match stage {
                Stage::InputCheck => {
                    let event = self.gate.evaluate(&ctx.query.text, Phase::Input);
                    let blocked = event.is_blocked();
                    ctx.input_event = Some(event);
                    if blocked {
                        Stage::Blocked
                    } else {
                        Stage::Plan
                    }
                }
                Stage::Plan => match self.plan_turn(&mut ctx).await {
                    Ok(()) => Stage::Research,
                    Err(error) => return self.finalize_failed(ctx, error),
                },
                Stage::Research => match self.research_turn(&mut ctx).await {
                    Ok(()) => Stage::Write,
                    Err(error) => return self.finalize_failed(ctx, error),
                },
                Stage::Write => match self.write_turn(&mut ctx).await {
                    Ok(()) => Stage::Critique,
                    Err(error) => return self.finalize_failed(ctx, error),
                },
                Stage::Critique => match self.critique_turn(&mut ctx).await {
                    Ok(Signal::RevisionRequested) => {
                        if ctx.revisions_used < self.pipeline.max_revisions
                            && (ctx.steps.len() as u32) < self.pipeline.max_steps
                        {
                            ctx.revisions_used += 1;
                            Stage::Write
                        } else {
                            tracing::warn!(
                                query_id = ctx.query.id,
                                revisions = ctx.revisions_used,
                                "revision bound reached with critique outstanding"
                            );
                            ctx.unresolved_critique = true;
                            Stage::OutputCheck
                        }
                    }
                    Ok(_) => Stage::OutputCheck,
                    Err(error) => return self.finalize_failed(ctx, error),
                },
                Stage::OutputCheck => {
                    let draft = if ctx.draft.trim().is_empty() {
                        tracing::warn!(query_id = ctx.query.id, "writer produced an empty draft");
                        "No response was produced for this query.".to_string()
                    } else {
                        ctx.draft.clone()
                    };

                    let event = self.gate.evaluate(&draft, Phase::Output);
                    ctx.response = match event.verdict {
                        Verdict::Blocked => {
                            ctx.failed_safe = true;
                            self.gate.refusal_message(&event)
                        }
                        Verdict::Sanitized => {
                            event.sanitized_text.clone().unwrap_or_else(|| draft.clone())
                        }
                        Verdict::Safe => draft,
                    };
                    ctx.output_event = Some(event);
                    Stage::Done
                }
                Stage::Done => {
                    tracing::info!(
                        query_id = ctx.query.id,
                        steps = ctx.steps.len(),
                        revisions = ctx.revisions_used,
                        "research session finished"
                    );
                    return ctx.finalize(SessionState::Done);
                }
                Stage::Blocked => {
                    tracing::info!(query_id = ctx.query.id, "query blocked at input");
                    ctx.response = match &ctx.input_event {
                        Some(event) => self.gate.refusal_message(event),
                        None => "Request blocked for safety reasons.".to_string(),
                    };
                    return ctx.finalize(SessionState::Blocked);
                }
            };
        }
    }

    /// One provider call with the full per-call pipeline: admission
    /// permit, budget check, timeout, one retry on transient failure,
    /// usage recording.
    async fn invoke_role(
        &self,
        role: RoleKind,
        instructions: &str,
        transcript: &[ChatMessage],
        tools: Vec<ToolSpec>,
    ) -> Result<CompletionResponse, ProviderError> {
        let _permit = self.admission.admit().await;

        let estimate = self.estimate_turn(instructions, transcript);
        if !self.budget.can_afford(role, estimate) {
            return Err(ProviderError::BudgetExhausted(format!(
                "{} turn needs ~{} tokens",
                role, estimate
            )));
        }

        let request = CompletionRequest::new(instructions)
            .with_transcript(transcript.to_vec())
            .with_tools(tools);

        let response = with_transport_retry(|| async {
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
        .await?;

        self.budget.record_usage(role, &response.usage, &response.model);
        Ok(response)
    }

    fn estimate_turn(&self, instructions: &str, transcript: &[ChatMessage]) -> u32 {
        let prompt = self.service.estimate_tokens(instructions)
            + transcript
                .iter()
                .map(|m| self.service.estimate_tokens(&m.content))
                .sum::<u32>();
        prompt + self.completion.max_tokens
    }

    async fn plan_turn(&self, ctx: &mut SessionCtx) -> Result<(), ProviderError> {
        let instructions = prompts::role_instruction(
            RoleKind::Planner,
            &self.pipeline.signals,
            self.tools.available(),
        );
        let mut response = self
            .invoke_role(RoleKind::Planner, &instructions, &ctx.transcript, Vec::new())
            .await?;

        if extract_signal(&response.text, &self.pipeline.signals) != Signal::Handoff {
            tracing::debug!(query_id = ctx.query.id, "plan missing handoff marker, re-invoking");
            let retry_transcript = corrective_transcript(
                &ctx.transcript,
                RoleKind::Planner,
                &response.text,
                prompts::handoff_reminder(&self.pipeline.signals),
            );
            response = self
                .invoke_role(RoleKind::Planner, &instructions, &retry_transcript, Vec::new())
                .await?;
            if extract_signal(&response.text, &self.pipeline.signals) != Signal::Handoff {
                tracing::warn!(
                    query_id = ctx.query.id,
                    "plan still missing handoff marker, proceeding best-effort"
                );
            }
        }

        ctx.push_step(RoleKind::Planner, response.text, Vec::new());
        Ok(())
    }

    async fn research_turn(&self, ctx: &mut SessionCtx) -> Result<(), ProviderError> {
        let instructions = prompts::role_instruction(
            RoleKind::Researcher,
            &self.pipeline.signals,
            self.tools.available(),
        );
        let specs = if self.tools.available() {
            tools::tool_specs()
        } else {
            Vec::new()
        };

        let mut response = self
            .invoke_role(RoleKind::Researcher, &instructions, &ctx.transcript, specs.clone())
            .await?;

        let mut calls = Vec::new();
        let mut rounds = 0;
        while !response.tool_calls_requested.is_empty() && rounds < self.pipeline.max_tool_rounds {
            rounds += 1;
            for requested in &response.tool_calls_requested {
                let call = self.dispatch_tool(requested).await;
                ctx.transcript.push(ChatMessage::user(format!(
                    "Tool result ({}): {}",
                    call.tool_name, call.result_summary
                )));
                calls.push(call);
            }
            response = self
                .invoke_role(RoleKind::Researcher, &instructions, &ctx.transcript, specs.clone())
                .await?;
        }

        if !response.tool_calls_requested.is_empty() {
            tracing::warn!(
                query_id = ctx.query.id,
                rounds,
                "tool round limit reached, proceeding with the last completion"
            );
        }

        ctx.push_step(RoleKind::Researcher, response.text, calls);
        Ok(())
    }

    /// Dispatch one requested tool call under the per-call timeout.
    /// Failures never propagate; they come back as "unavailable".
    async fn dispatch_tool(&self, requested: &ToolCallRequest) -> ToolCall {
        match tokio::time::timeout(
            self.completion.timeout,
            tools::run_tool_call(self.tools.as_ref(), requested),
        )
        .await
        {
            Ok(call) => call,
            Err(_) => {
                tracing::warn!(tool = %requested.name, "tool call timed out");
                ToolCall {
                    tool_name: requested.name.clone(),
                    arguments: requested.arguments.clone(),
                    result_summary: tools::UNAVAILABLE_SUMMARY.to_string(),
                }
            }
        }
    }

    async fn write_turn(&self, ctx: &mut SessionCtx) -> Result<(), ProviderError> {
        let instructions = prompts::role_instruction(
            RoleKind::Writer,
            &self.pipeline.signals,
            self.tools.available(),
        );
        let response = self
            .invoke_role(RoleKind::Writer, &instructions, &ctx.transcript, Vec::new())
            .await?;

        if !has_citation(&response.text) {
            tracing::warn!(query_id = ctx.query.id, "draft cites no sources");
        }

        ctx.draft = response.text.clone();
        ctx.push_step(RoleKind::Writer, response.text, Vec::new());
        Ok(())
    }

    /// Run the critic and normalize its output to a verdict. A reply
    /// with no verdict token after the corrective retry counts as
    /// approval.
    async fn critique_turn(&self, ctx: &mut SessionCtx) -> Result<Signal, ProviderError> {
        let instructions = prompts::role_instruction(
            RoleKind::Critic,
            &self.pipeline.signals,
            self.tools.available(),
        );
        let mut response = self
            .invoke_role(RoleKind::Critic, &instructions, &ctx.transcript, Vec::new())
            .await?;
        let mut signal = extract_signal(&response.text, &self.pipeline.signals);

        if matches!(signal, Signal::Missing | Signal::Handoff) {
            tracing::debug!(query_id = ctx.query.id, "critique missing verdict token, re-invoking");
            let retry_transcript = corrective_transcript(
                &ctx.transcript,
                RoleKind::Critic,
                &response.text,
                prompts::review_reminder(&self.pipeline.signals),
            );
            response = self
                .invoke_role(RoleKind::Critic, &instructions, &retry_transcript, Vec::new())
                .await?;
            signal = extract_signal(&response.text, &self.pipeline.signals);
        }

        let verdict = match signal {
            Signal::Approved | Signal::RevisionRequested => signal,
            Signal::Missing | Signal::Handoff => {
                tracing::warn!(
                    query_id = ctx.query.id,
                    "critique has no verdict token after retry, treating as approval"
                );
                Signal::Approved
            }
        };

        ctx.push_step(RoleKind::Critic, response.text, Vec::new());
        Ok(verdict)
    }

    fn finalize_failed(&self, mut ctx: SessionCtx, error: ProviderError) -> Session {
        tracing::error!(
            query_id = ctx.query.id,
            error = %error,
            "session failed, substituting placeholder response"
        );
        ctx.failure = Some(SessionFailure {
            category: error.category(),
            detail: error.to_string(),
        });
        ctx.response = ERROR_PLACEHOLDER.to_string();
        ctx.finalize(SessionState::Done)
    }

    /// Cumulative LLM usage across every session this orchestrator ran.
    pub fn usage(&self) -> LlmUsage {
        self.budget.get_usage()
    }

    pub fn reset_budget(&self) {
        self.budget.reset();
    }
}

/// Builder for [`AgentOrchestrator`].
pub struct OrchestratorBuilder {
    service: Option<Arc<dyn CompletionService>>,
    tools: Arc<dyn ResearchTools>,
    gate: Option<Arc<SafetyGate>>,
    pipeline: PipelineConfig,
    completion: CompletionConfig,
    admission: Option<AdmissionGate>,
    budget: Option<Arc<BudgetTracker>>,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            service: None,
            tools: Arc::new(NullTools),
            gate: None,
            pipeline: PipelineConfig::default(),
            completion: CompletionConfig::default(),
            admission: None,
            budget: None,
        }
    }

    /// Set the completion service. Required.
    pub fn service(mut self, service: Arc<dyn CompletionService>) -> Self {
        self.service = Some(service);
        self
    }

    pub fn tools(mut self, tools: Arc<dyn ResearchTools>) -> Self {
        self.tools = tools;
        self
    }

    pub fn gate(mut self, gate: Arc<SafetyGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn pipeline(mut self, pipeline: PipelineConfig) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn completion(mut self, completion: CompletionConfig) -> Self {
        self.completion = completion;
        self
    }

    /// Share an admission gate with other components calling the same
    /// provider.
    pub fn admission(mut self, admission: AdmissionGate) -> Self {
        self.admission = Some(admission);
        self
    }

    pub fn budget(mut self, budget: Arc<BudgetTracker>) -> Self {
        self.budget = Some(budget);
        self
    }

    pub fn build(self) -> Result<AgentOrchestrator, RuntimeError> {
        let service = self
            .service
            .ok_or_else(|| RuntimeError::ProviderNotConfigured("no completion service set".to_string()))?;

        Ok(AgentOrchestrator {
            service,
            tools: self.tools,
            gate: self.gate.unwrap_or_else(|| Arc::new(SafetyGate::default())),
            pipeline: self.pipeline,
            completion: self.completion,
            admission: self.admission.unwrap_or_else(|| AdmissionGate::new(4)),
            budget: self.budget.unwrap_or_else(|| Arc::new(BudgetTracker::unlimited())),
        })
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
