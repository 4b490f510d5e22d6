//! Deterministic scoring math.
//!
//! Everything here is pure: the judge engine produces raw criterion
//! scores, this module turns them into per-perspective and combined
//! numbers plus the cross-perspective agreement analysis.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::rubric::{Criterion, JudgeConfig};

/// A single criterion's score with the judge's stated reasoning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CriterionScore {
    pub score: f64,

    #[serde(default)]
    pub reasoning: String,
}

impl CriterionScore {
    pub fn new(score: f64, reasoning: impl Into<String>) -> Self {
        Self {
            score: clamp_score(score),
            reasoning: reasoning.into(),
        }
    }
}

/// One perspective's complete scoring pass over a response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PerspectiveScore {
    /// Perspective id, e.g. `academic`.
    pub perspective: String,

    /// Criterion name to score, ordered by name for stable output.
    pub criterion_scores: BTreeMap<String, CriterionScore>,

    /// Weighted mean over the configured criteria.
    pub overall_score: f64,

    /// Set when the judge's reply could not be parsed and the scores
    /// were zero-filled.
    #[serde(default)]
    pub parse_failed: bool,
}

impl PerspectiveScore {
    /// Build a perspective score, computing the weighted overall from
    /// the configured criteria.
    pub fn new(
        perspective: impl Into<String>,
        criterion_scores: BTreeMap<String, CriterionScore>,
        criteria: &[Criterion],
    ) -> Self {
        let overall_score = weighted_mean(&criterion_scores, criteria);
        Self {
            perspective: perspective.into(),
            criterion_scores,
            overall_score,
            parse_failed: false,
        }
    }

    /// All-zero scores for when the judge's reply never parsed.
    pub fn zeroed(perspective: impl Into<String>, criteria: &[Criterion]) -> Self {
        let criterion_scores = criteria
            .iter()
            .map(|c| {
                (
                    c.name.clone(),
                    CriterionScore::new(0.0, "Judge reply could not be parsed"),
                )
            })
            .collect();
        Self {
            perspective: perspective.into(),
            criterion_scores,
            overall_score: 0.0,
            parse_failed: true,
        }
    }

    pub fn score_for(&self, criterion: &str) -> f64 {
        self.criterion_scores
            .get(criterion)
            .map(|c| c.score)
            .unwrap_or(0.0)
    }
}

/// Side-by-side criterion scores across perspectives.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CriterionComparison {
    pub criterion: String,

    /// Perspective id to that perspective's score for the criterion.
    pub scores: BTreeMap<String, f64>,

    /// Spread between the highest and lowest perspective score.
    pub difference: f64,
}

/// How much the perspectives agreed with each other.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PerspectiveAgreement {
    pub agreements: Vec<CriterionComparison>,
    pub disagreements: Vec<CriterionComparison>,

    /// `1 - disagreements / criteria`, so 1.0 means full agreement.
    pub correlation: f64,
}

/// Clamp a raw judge score into `[0.0, 1.0]`. Non-finite input maps
/// to 0.0.
pub fn clamp_score(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

/// Weighted mean over the configured criteria. A criterion missing
/// from the map scores 0.0; zero total weight yields 0.0.
pub fn weighted_mean(scores: &BTreeMap<String, CriterionScore>, criteria: &[Criterion]) -> f64 {
    let total_weight: f64 = criteria.iter().map(|c| c.weight).sum();
    if total_weight <= 0.0 {
        return 0.0;
    }

    let weighted: f64 = criteria
        .iter()
        .map(|c| {
            let score = scores.get(&c.name).map(|s| s.score).unwrap_or(0.0);
            score * c.weight
        })
        .sum();

    weighted / total_weight
}

/// Weighted mean of the per-perspective overall scores. Perspectives
/// weigh 1.0 unless the config assigns them something else, so the
/// default is the plain arithmetic mean.
pub fn combined_score(perspectives: &[PerspectiveScore], config: &JudgeConfig) -> f64 {
    let total_weight: f64 = perspectives
        .iter()
        .map(|p| config.perspective_weight(&p.perspective))
        .sum();
    if total_weight <= 0.0 {
        return 0.0;
    }

    let weighted: f64 = perspectives
        .iter()
        .map(|p| p.overall_score * config.perspective_weight(&p.perspective))
        .sum();

    weighted / total_weight
}

/// Compare criterion scores across perspectives and split them into
/// agreements and disagreements by the configured delta.
pub fn analyze_agreement(
    perspectives: &[PerspectiveScore],
    config: &JudgeConfig,
) -> PerspectiveAgreement {
    let mut agreements = Vec::new();
    let mut disagreements = Vec::new();

    for criterion in &config.criteria {
        let scores: BTreeMap<String, f64> = perspectives
            .iter()
            .map(|p| (p.perspective.clone(), p.score_for(&criterion.name)))
            .collect();

        let max = scores.values().cloned().fold(f64::NEG_INFINITY, f64::max);
        let min = scores.values().cloned().fold(f64::INFINITY, f64::min);
        let difference = if scores.is_empty() { 0.0 } else { max - min };

        let comparison = CriterionComparison {
            criterion: criterion.name.clone(),
            scores,
            difference,
        };

        if difference >= config.agreement_delta {
            disagreements.push(comparison);
        } else {
            agreements.push(comparison);
        }
    }

    let criteria_count = config.criteria.len().max(1);
    let correlation = 1.0 - (disagreements.len() as f64 / criteria_count as f64);

    PerspectiveAgreement {
        agreements,
        disagreements,
        correlation,
    }
}
