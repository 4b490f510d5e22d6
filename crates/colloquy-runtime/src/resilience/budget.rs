//! Token budget management for completion calls.
//!
//! Enforces optional per-role and global token budgets to control costs.
//! A role without a configured budget is unlimited.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use colloquy_core::RoleKind;

use crate::config::BudgetSettings;
use crate::providers::TokenUsage;

/// Token budget for a scope (role or global).
pub struct TokenBudget {
    /// Maximum tokens allowed
    pub max_tokens: u32,

    /// Currently used tokens
    used: AtomicU32,
}

impl TokenBudget {
    /// Create a new token budget.
    pub fn new(max_tokens: u32) -> Self {
        Self {
            max_tokens,
            used: AtomicU32::new(0),
        }
    }

    /// Check if we can afford to use tokens.
    pub fn can_afford(&self, tokens: u32) -> bool {
        self.remaining() >= tokens
    }

    /// Record token usage.
    pub fn record(&self, tokens: u32) {
        self.used.fetch_add(tokens, Ordering::SeqCst);
    }

    /// Get remaining tokens.
    pub fn remaining(&self) -> u32 {
        self.max_tokens
            .saturating_sub(self.used.load(Ordering::SeqCst))
    }

    /// Get used tokens.
    pub fn used(&self) -> u32 {
        self.used.load(Ordering::SeqCst)
    }

    /// Reset the budget.
    pub fn reset(&self) {
        self.used.store(0, Ordering::SeqCst);
    }
}

/// Accumulated completion usage for a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmUsage {
    /// Total tokens used
    pub total_tokens: u32,

    /// Prompt/input tokens
    pub prompt_tokens: u32,

    /// Completion/output tokens
    pub completion_tokens: u32,

    /// Number of completion calls made
    pub llm_calls: u32,

    /// Estimated cost in USD
    pub estimated_cost: f64,

    /// Cache hits (Anthropic)
    pub cache_hits: u32,

    /// Tokens written to cache
    pub cache_creation_tokens: u32,

    /// Tokens read from cache
    pub cache_read_tokens: u32,
}

impl LlmUsage {
    /// Add token usage from a provider response.
    pub fn add(&mut self, usage: &TokenUsage, model: &str) {
        self.prompt_tokens += usage.prompt_tokens;
        self.completion_tokens += usage.completion_tokens;
        self.total_tokens += usage.total();
        self.llm_calls += 1;
        self.cache_creation_tokens += usage.cache_creation_tokens;
        self.cache_read_tokens += usage.cache_read_tokens;

        if usage.cache_read_tokens > 0 {
            self.cache_hits += 1;
        }

        self.estimated_cost += Self::estimate_cost(usage, model);
    }

    /// Estimate cost for a usage entry.
    fn estimate_cost(usage: &TokenUsage, model: &str) -> f64 {
        // Pricing per million tokens (as of Dec 2025)
        let (input_rate, output_rate, cache_write_rate, cache_read_rate) = match model {
            m if m.contains("sonnet-4-5") => (3.0, 15.0, 3.75, 0.3),
            m if m.contains("opus-4-5") => (5.0, 25.0, 6.25, 0.5),
            m if m.contains("haiku-4-5") => (1.0, 5.0, 1.25, 0.1),
            _ => (3.0, 15.0, 3.75, 0.3), // Default to Sonnet pricing
        };

        let input_cost = (usage.prompt_tokens as f64 / 1_000_000.0) * input_rate;
        let output_cost = (usage.completion_tokens as f64 / 1_000_000.0) * output_rate;
        let cache_write_cost = (usage.cache_creation_tokens as f64 / 1_000_000.0) * cache_write_rate;
        let cache_read_cost = (usage.cache_read_tokens as f64 / 1_000_000.0) * cache_read_rate;

        input_cost + output_cost + cache_write_cost + cache_read_cost
    }
}

/// Budget tracker for one session or batch run.
pub struct BudgetTracker {
    /// Per-role budgets; roles not present are unlimited
    role_budgets: HashMap<RoleKind, TokenBudget>,

    /// Global budget across all roles, unlimited when absent
    global_budget: Option<TokenBudget>,

    /// Accumulated usage
    usage: RwLock<LlmUsage>,
}

impl BudgetTracker {
    /// Create a tracker with no limits. Usage is still accumulated.
    pub fn unlimited() -> Self {
        Self {
            role_budgets: HashMap::new(),
            global_budget: None,
            usage: RwLock::new(LlmUsage::default()),
        }
    }

    /// Create a tracker from configured budgets.
    pub fn from_settings(settings: &BudgetSettings) -> Self {
        let mut role_budgets = HashMap::new();
        for role in RoleKind::pipeline_order() {
            if let Some(limit) = settings.for_role(role) {
                role_budgets.insert(role, TokenBudget::new(limit));
            }
        }

        Self {
            role_budgets,
            global_budget: settings.global.map(TokenBudget::new),
            usage: RwLock::new(LlmUsage::default()),
        }
    }

    /// Check if we can afford a call for a role.
    pub fn can_afford(&self, role: RoleKind, estimated_tokens: u32) -> bool {
        let role_ok = self
            .role_budgets
            .get(&role)
            .map(|b| b.can_afford(estimated_tokens))
            .unwrap_or(true);

        let global_ok = self
            .global_budget
            .as_ref()
            .map(|b| b.can_afford(estimated_tokens))
            .unwrap_or(true);

        role_ok && global_ok
    }

    /// Record usage after a call.
    pub fn record_usage(&self, role: RoleKind, usage: &TokenUsage, model: &str) {
        let total = usage.total();

        if let Some(budget) = self.role_budgets.get(&role) {
            budget.record(total);
        }

        if let Some(budget) = self.global_budget.as_ref() {
            budget.record(total);
        }

        self.usage.write().add(usage, model);
    }

    /// Get current usage.
    pub fn get_usage(&self) -> LlmUsage {
        self.usage.read().clone()
    }

    /// Remaining global budget, `None` when unlimited.
    pub fn remaining_global(&self) -> Option<u32> {
        self.global_budget.as_ref().map(|b| b.remaining())
    }

    /// Remaining budget for a role, `None` when unlimited.
    pub fn remaining_role(&self, role: RoleKind) -> Option<u32> {
        self.role_budgets.get(&role).map(|b| b.remaining())
    }

    /// Reset all budgets and accumulated usage.
    pub fn reset(&self) {
        for budget in self.role_budgets.values() {
            budget.reset();
        }
        if let Some(budget) = self.global_budget.as_ref() {
            budget.reset();
        }
        *self.usage.write() = LlmUsage::default();
    }
}

impl Default for BudgetTracker {
    fn default() -> Self {
        Self::unlimited()
    }
}
