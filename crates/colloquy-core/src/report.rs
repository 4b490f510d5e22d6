//! Evaluation report assembly.
//!
//! Takes the per-query results a batch run produced and turns them into
//! one report: score aggregates, category and topic breakdowns, a
//! human-readable interpretation, and an error analysis. Everything is
//! deterministic; failed results are counted and analyzed, never scored.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::rubric::JudgeConfig;
use crate::score::{PerspectiveAgreement, PerspectiveScore};
use crate::types::{ErrorCategory, Query, SessionFailure};

/// How many expected topics a response actually mentioned.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TopicCoverage {
    /// Fraction of expected topics found, 1.0 when none were expected.
    pub coverage_rate: f64,
    pub covered: Vec<String>,
    pub missing: Vec<String>,
    pub total_expected: usize,
}

impl TopicCoverage {
    /// Case-insensitive substring check of each expected topic against
    /// the response text.
    pub fn measure(response: &str, expected_topics: &[String]) -> Self {
        if expected_topics.is_empty() {
            return Self {
                coverage_rate: 1.0,
                covered: Vec::new(),
                missing: Vec::new(),
                total_expected: 0,
            };
        }

        let response_lower = response.to_lowercase();
        let mut covered = Vec::new();
        let mut missing = Vec::new();
        for topic in expected_topics {
            if response_lower.contains(&topic.to_lowercase()) {
                covered.push(topic.clone());
            } else {
                missing.push(topic.clone());
            }
        }

        Self {
            coverage_rate: covered.len() as f64 / expected_topics.len() as f64,
            covered,
            missing,
            total_expected: expected_topics.len(),
        }
    }
}

/// Outcome of evaluating one query end to end.
///
/// A failed result carries the failure and nothing else; a successful
/// one carries the scores even when the pipeline blocked the query and
/// the refusal text was what got judged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationResult {
    pub query: Query,
    pub success: bool,

    #[serde(default)]
    pub error: Option<SessionFailure>,

    #[serde(default)]
    pub combined_score: f64,

    #[serde(default)]
    pub perspectives: Vec<PerspectiveScore>,

    #[serde(default)]
    pub agreement: Option<PerspectiveAgreement>,

    #[serde(default)]
    pub topic_coverage: Option<TopicCoverage>,

    #[serde(default)]
    pub response_preview: Option<String>,

    /// The session ended blocked and the scored text was a refusal.
    #[serde(default)]
    pub blocked: bool,

    #[serde(default)]
    pub unresolved_critique: bool,

    #[serde(default)]
    pub revisions_used: u32,
}

impl EvaluationResult {
    /// A scored result. Session flags default to the clean case and
    /// can be set afterwards.
    pub fn scored(
        query: Query,
        combined_score: f64,
        perspectives: Vec<PerspectiveScore>,
        agreement: Option<PerspectiveAgreement>,
        topic_coverage: Option<TopicCoverage>,
    ) -> Self {
        Self {
            query,
            success: true,
            error: None,
            combined_score,
            perspectives,
            agreement,
            topic_coverage,
            response_preview: None,
            blocked: false,
            unresolved_critique: false,
            revisions_used: 0,
        }
    }

    /// A result for a query whose pipeline or judging failed outright.
    pub fn failure(query: Query, failure: SessionFailure) -> Self {
        Self {
            query,
            success: false,
            error: Some(failure),
            combined_score: 0.0,
            perspectives: Vec::new(),
            agreement: None,
            topic_coverage: None,
            response_preview: None,
            blocked: false,
            unresolved_critique: false,
            revisions_used: 0,
        }
    }
}

/// Distribution statistics over a set of scores.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScoreDistribution {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub count: usize,
}

impl ScoreDistribution {
    /// Population statistics; the even-count median averages the two
    /// middle values.
    pub fn from_scores(scores: &[f64]) -> Self {
        if scores.is_empty() {
            return Self::default();
        }

        let n = scores.len();
        let mut sorted = scores.to_vec();
        sorted.sort_by(f64::total_cmp);

        let mean = scores.iter().sum::<f64>() / n as f64;
        let variance = scores.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;
        let median = if n % 2 == 1 {
            sorted[n / 2]
        } else {
            (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
        };

        Self {
            min: sorted[0],
            max: sorted[n - 1],
            mean,
            median,
            std_dev: variance.sqrt(),
            count: n,
        }
    }
}

/// Settings echoed into the report for reproducibility.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportConfiguration {
    pub multi_perspective: bool,
    pub total_queries_available: usize,
    pub perspectives_used: Vec<String>,
    pub criteria_used: Vec<String>,

    /// The thresholds the interpretation was derived under.
    pub thresholds: InterpretationThresholds,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReportSummary {
    pub total_queries: usize,
    pub successful: usize,
    pub failed: usize,
    pub success_rate: f64,
}

/// Score aggregates over the successful results.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScoreSummary {
    pub combined_average: f64,

    /// Perspective id to average overall score.
    pub by_perspective: BTreeMap<String, f64>,

    /// Perspective id to (criterion to average score).
    pub by_criterion: BTreeMap<String, BTreeMap<String, f64>>,

    /// Distributions keyed `combined` plus one per perspective.
    pub score_distribution: BTreeMap<String, ScoreDistribution>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CategoryStats {
    pub average: f64,
    pub count: usize,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MissedTopic {
    pub topic: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TopicCoverageSummary {
    pub average_coverage: f64,

    /// Up to five topics, most frequently missed first.
    pub commonly_missed_topics: Vec<MissedTopic>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryHighlight {
    pub query: String,
    pub score: f64,
    pub category: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Interpretation {
    pub summary: String,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub recommendations: Vec<String>,

    /// Perspective averages differ by more than the configured delta.
    #[serde(default)]
    pub perspectives_disagree: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorDetail {
    pub query_id: u32,
    pub query: String,
    pub error: String,
    pub category: ErrorCategory,
}

/// Failure breakdown. Always present in a report; all lists are
/// explicitly empty when nothing failed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ErrorAnalysis {
    pub total_errors: usize,
    pub error_types: BTreeMap<String, usize>,
    pub patterns: Vec<String>,
    pub recommendations: Vec<String>,
    pub error_details: Vec<ErrorDetail>,
}

/// Score thresholds that drive the interpretation text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InterpretationThresholds {
    pub excellent: f64,
    pub good: f64,
    pub moderate: f64,

    /// Spread between perspective averages that reads as imbalance.
    pub perspective_delta: f64,

    /// Spread between best and worst category averages worth calling out.
    pub category_spread: f64,

    /// Average topic coverage below this is flagged as incomplete.
    pub coverage_floor: f64,
}

impl Default for InterpretationThresholds {
    fn default() -> Self {
        Self {
            excellent: 0.8,
            good: 0.6,
            moderate: 0.4,
            perspective_delta: 0.15,
            category_spread: 0.2,
            coverage_floor: 0.7,
        }
    }
}

/// The complete evaluation report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationReport {
    pub timestamp: DateTime<Utc>,
    pub configuration: ReportConfiguration,
    pub summary: ReportSummary,
    pub scores: ScoreSummary,
    pub category_analysis: BTreeMap<String, CategoryStats>,
    pub topic_coverage: TopicCoverageSummary,
    pub best_result: Option<QueryHighlight>,
    pub worst_result: Option<QueryHighlight>,
    pub interpretation: Interpretation,
    pub error_analysis: ErrorAnalysis,
    pub detailed_results: Vec<EvaluationResult>,
}

impl EvaluationReport {
    /// Assemble a report from per-query results.
    pub fn from_results(
        results: Vec<EvaluationResult>,
        judge_config: &JudgeConfig,
        thresholds: &InterpretationThresholds,
    ) -> Self {
        let successful: Vec<&EvaluationResult> = results.iter().filter(|r| r.success).collect();
        let total_queries = results.len();

        let summary = ReportSummary {
            total_queries,
            successful: successful.len(),
            failed: total_queries - successful.len(),
            success_rate: if total_queries > 0 {
                successful.len() as f64 / total_queries as f64
            } else {
                0.0
            },
        };

        let scores = aggregate_scores(&successful, judge_config);
        let category_analysis = analyze_by_category(&successful);
        let topic_coverage = analyze_topic_coverage(&successful);
        let (best_result, worst_result) = find_extremes(&successful);
        let interpretation = build_interpretation(
            &scores,
            &category_analysis,
            &topic_coverage,
            thresholds,
        );
        let error_analysis = analyze_errors(&results);

        Self {
            timestamp: Utc::now(),
            configuration: ReportConfiguration {
                multi_perspective: judge_config.perspectives.len() > 1,
                total_queries_available: total_queries,
                perspectives_used: judge_config
                    .perspectives
                    .iter()
                    .map(|p| p.id.clone())
                    .collect(),
                criteria_used: judge_config
                    .criteria
                    .iter()
                    .map(|c| c.name.clone())
                    .collect(),
                thresholds: thresholds.clone(),
            },
            summary,
            scores,
            category_analysis,
            topic_coverage,
            best_result,
            worst_result,
            interpretation,
            error_analysis,
            detailed_results: results,
        }
    }

    /// Render the human-readable summary text.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let banner = "=".repeat(70);
        let rule = "-".repeat(40);

        out.push_str(&banner);
        out.push_str("\nRESEARCH ASSISTANT EVALUATION REPORT\n");
        out.push_str(&banner);
        out.push_str("\n\n");

        out.push_str(&format!("Generated: {}\n", self.timestamp.to_rfc3339()));
        out.push_str(&format!(
            "Multi-perspective evaluation: {}\n\n",
            self.configuration.multi_perspective
        ));

        out.push_str("SUMMARY\n");
        out.push_str(&rule);
        out.push('\n');
        out.push_str(&format!("Total Queries: {}\n", self.summary.total_queries));
        out.push_str(&format!("Successful: {}\n", self.summary.successful));
        out.push_str(&format!("Failed: {}\n", self.summary.failed));
        out.push_str(&format!(
            "Success Rate: {:.1}%\n\n",
            self.summary.success_rate * 100.0
        ));

        out.push_str("SCORES\n");
        out.push_str(&rule);
        out.push('\n');
        out.push_str(&format!(
            "Combined Average: {:.3}\n",
            self.scores.combined_average
        ));
        for (perspective, average) in &self.scores.by_perspective {
            out.push_str(&format!("  {}: {:.3}\n", perspective, average));
        }

        out.push_str("\nScores by Criterion:\n");
        for (perspective, criteria) in &self.scores.by_criterion {
            out.push_str(&format!("  {}:\n", perspective));
            for (criterion, average) in criteria {
                out.push_str(&format!("    {}: {:.3}\n", criterion, average));
            }
        }

        out.push_str("\nINTERPRETATION\n");
        out.push_str(&rule);
        out.push('\n');
        out.push_str(&self.interpretation.summary);
        out.push_str("\n\n");

        if !self.interpretation.strengths.is_empty() {
            out.push_str("Strengths:\n");
            for strength in &self.interpretation.strengths {
                out.push_str(&format!("  + {}\n", strength));
            }
        }

        if !self.interpretation.weaknesses.is_empty() {
            out.push_str("\nWeaknesses:\n");
            for weakness in &self.interpretation.weaknesses {
                out.push_str(&format!("  - {}\n", weakness));
            }
        }

        if self.error_analysis.total_errors > 0 {
            out.push_str("\nERROR ANALYSIS\n");
            out.push_str(&rule);
            out.push('\n');
            out.push_str(&format!(
                "Total Errors: {}\n",
                self.error_analysis.total_errors
            ));
            for pattern in &self.error_analysis.patterns {
                out.push_str(&format!("  ! {}\n", pattern));
            }
        }

        out.push('\n');
        out.push_str(&banner);
        out.push('\n');
        out
    }
}

fn aggregate_scores(successful: &[&EvaluationResult], judge_config: &JudgeConfig) -> ScoreSummary {
    let combined: Vec<f64> = successful.iter().map(|r| r.combined_score).collect();

    let mut overall_by_perspective: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    let mut criterion_by_perspective: BTreeMap<String, BTreeMap<String, Vec<f64>>> =
        BTreeMap::new();

    for result in successful {
        for perspective in &result.perspectives {
            overall_by_perspective
                .entry(perspective.perspective.clone())
                .or_default()
                .push(perspective.overall_score);
            let slot = criterion_by_perspective
                .entry(perspective.perspective.clone())
                .or_default();
            for (criterion, score) in &perspective.criterion_scores {
                slot.entry(criterion.clone()).or_default().push(score.score);
            }
        }
    }

    let mean = |values: &[f64]| -> f64 {
        if values.is_empty() {
            0.0
        } else {
            values.iter().sum::<f64>() / values.len() as f64
        }
    };

    let by_perspective: BTreeMap<String, f64> = overall_by_perspective
        .iter()
        .map(|(id, scores)| (id.clone(), mean(scores)))
        .collect();

    let by_criterion: BTreeMap<String, BTreeMap<String, f64>> = criterion_by_perspective
        .iter()
        .map(|(id, criteria)| {
            let averages = criteria
                .iter()
                .map(|(criterion, scores)| (criterion.clone(), mean(scores)))
                .collect();
            (id.clone(), averages)
        })
        .collect();

    let mut score_distribution = BTreeMap::new();
    score_distribution.insert(
        "combined".to_string(),
        ScoreDistribution::from_scores(&combined),
    );
    for perspective in &judge_config.perspectives {
        let scores = overall_by_perspective
            .get(&perspective.id)
            .cloned()
            .unwrap_or_default();
        score_distribution.insert(
            perspective.id.clone(),
            ScoreDistribution::from_scores(&scores),
        );
    }

    ScoreSummary {
        combined_average: mean(&combined),
        by_perspective,
        by_criterion,
        score_distribution,
    }
}

fn analyze_by_category(successful: &[&EvaluationResult]) -> BTreeMap<String, CategoryStats> {
    let mut by_category: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for result in successful {
        by_category
            .entry(result.query.category.clone())
            .or_default()
            .push(result.combined_score);
    }

    by_category
        .into_iter()
        .map(|(category, scores)| {
            let stats = CategoryStats {
                average: scores.iter().sum::<f64>() / scores.len() as f64,
                count: scores.len(),
                min: scores.iter().cloned().fold(f64::INFINITY, f64::min),
                max: scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            };
            (category, stats)
        })
        .collect()
}

fn analyze_topic_coverage(successful: &[&EvaluationResult]) -> TopicCoverageSummary {
    let mut rates = Vec::new();
    let mut missed_counts: BTreeMap<String, usize> = BTreeMap::new();

    for result in successful {
        if let Some(coverage) = &result.topic_coverage {
            rates.push(coverage.coverage_rate);
            for topic in &coverage.missing {
                *missed_counts.entry(topic.clone()).or_insert(0) += 1;
            }
        }
    }

    let mut commonly_missed: Vec<MissedTopic> = missed_counts
        .into_iter()
        .map(|(topic, count)| MissedTopic { topic, count })
        .collect();
    // Most frequently missed first; BTreeMap gives name order on ties.
    commonly_missed.sort_by(|a, b| b.count.cmp(&a.count));
    commonly_missed.truncate(5);

    TopicCoverageSummary {
        average_coverage: if rates.is_empty() {
            0.0
        } else {
            rates.iter().sum::<f64>() / rates.len() as f64
        },
        commonly_missed_topics: commonly_missed,
    }
}

fn find_extremes(
    successful: &[&EvaluationResult],
) -> (Option<QueryHighlight>, Option<QueryHighlight>) {
    let highlight = |result: &EvaluationResult| QueryHighlight {
        query: result.query.text.clone(),
        score: result.combined_score,
        category: result.query.category.clone(),
    };

    let best = successful
        .iter()
        .max_by(|a, b| a.combined_score.total_cmp(&b.combined_score))
        .map(|r| highlight(r));
    let worst = successful
        .iter()
        .min_by(|a, b| a.combined_score.total_cmp(&b.combined_score))
        .map(|r| highlight(r));

    (best, worst)
}

fn build_interpretation(
    scores: &ScoreSummary,
    categories: &BTreeMap<String, CategoryStats>,
    coverage: &TopicCoverageSummary,
    thresholds: &InterpretationThresholds,
) -> Interpretation {
    let mut interpretations = Vec::new();
    let mut strengths = Vec::new();
    let mut weaknesses = Vec::new();
    let mut perspectives_disagree = false;

    let avg = scores.combined_average;
    if avg >= thresholds.excellent {
        interpretations.push("Overall system performance is excellent.".to_string());
        strengths.push("High quality responses across most criteria".to_string());
    } else if avg >= thresholds.good {
        interpretations
            .push("Overall system performance is good with room for improvement.".to_string());
    } else if avg >= thresholds.moderate {
        interpretations
            .push("System performance is moderate - significant improvements needed.".to_string());
        weaknesses.push("Response quality needs enhancement".to_string());
    } else {
        interpretations.push(
            "System performance is below expectations - major revisions required.".to_string(),
        );
        weaknesses.push("Overall response quality is poor".to_string());
    }

    if scores.by_perspective.len() >= 2 {
        let mut best: Option<(&String, f64)> = None;
        let mut worst: Option<(&String, f64)> = None;
        for (id, value) in &scores.by_perspective {
            if best.map_or(true, |(_, v)| *value > v) {
                best = Some((id, *value));
            }
            if worst.map_or(true, |(_, v)| *value < v) {
                worst = Some((id, *value));
            }
        }
        if let (Some((best_id, best_avg)), Some((worst_id, worst_avg))) = (best, worst) {
            if best_avg - worst_avg > thresholds.perspective_delta {
                perspectives_disagree = true;
                interpretations.push(format!(
                    "System performs better from the {} perspective than the {}.",
                    best_id, worst_id
                ));
                weaknesses.push(format!("Scores from the {} perspective", worst_id));
            } else {
                interpretations
                    .push("System performs consistently across judging perspectives.".to_string());
                strengths.push("Balanced performance across perspectives".to_string());
            }
        }
    }

    if !categories.is_empty() {
        let mut best: Option<(&String, f64)> = None;
        let mut worst: Option<(&String, f64)> = None;
        for (category, stats) in categories {
            if best.map_or(true, |(_, v)| stats.average > v) {
                best = Some((category, stats.average));
            }
            if worst.map_or(true, |(_, v)| stats.average < v) {
                worst = Some((category, stats.average));
            }
        }
        if let (Some((best_cat, best_avg)), Some((worst_cat, worst_avg))) = (best, worst) {
            if best_avg - worst_avg > thresholds.category_spread {
                interpretations.push(format!(
                    "Performance varies significantly by category: best in '{}', weakest in '{}'.",
                    best_cat, worst_cat
                ));
                weaknesses.push(format!("'{}' category queries", worst_cat));
                strengths.push(format!("'{}' category queries", best_cat));
            }
        }
    }

    if coverage.average_coverage < thresholds.coverage_floor {
        interpretations
            .push("Topic coverage is incomplete - responses often miss expected topics.".to_string());
        weaknesses.push("Comprehensive topic coverage".to_string());
    }

    let recommendations = if weaknesses.is_empty() {
        vec!["Maintain current performance levels".to_string()]
    } else {
        vec![
            "Focus on improving weakest criteria".to_string(),
            "Add more diverse training examples for weak categories".to_string(),
            "Ensure responses cover all expected topics".to_string(),
        ]
    };

    Interpretation {
        summary: interpretations.join(" "),
        strengths,
        weaknesses,
        recommendations,
        perspectives_disagree,
    }
}

fn analyze_errors(results: &[EvaluationResult]) -> ErrorAnalysis {
    let failed: Vec<&EvaluationResult> = results.iter().filter(|r| !r.success).collect();
    if failed.is_empty() {
        return ErrorAnalysis::default();
    }

    let mut error_types: BTreeMap<String, usize> = BTreeMap::new();
    let mut error_details = Vec::new();
    for result in &failed {
        let failure = match &result.error {
            Some(failure) => failure.clone(),
            None => SessionFailure {
                category: ErrorCategory::Other,
                detail: "unspecified failure".to_string(),
            },
        };
        *error_types.entry(failure.category.to_string()).or_insert(0) += 1;
        if error_details.len() < 5 {
            error_details.push(ErrorDetail {
                query_id: result.query.id,
                query: result.query.text.clone(),
                error: failure.detail,
                category: failure.category,
            });
        }
    }

    let mut patterns = Vec::new();
    if error_types.contains_key("transport") {
        patterns.push(
            "Transport errors detected - consider adding delays between queries or checking provider status"
                .to_string(),
        );
    }
    if error_types.contains_key("format") {
        patterns.push(
            "Format errors detected - model replies may not be following the expected format"
                .to_string(),
        );
    }

    let mut recommendations = Vec::new();
    if failed.len() as f64 > results.len() as f64 * 0.2 {
        recommendations.push("High error rate (>20%) - review system configuration".to_string());
    }
    let mut most_common: Option<(&String, usize)> = None;
    for (kind, count) in &error_types {
        if most_common.map_or(true, |(_, c)| *count > c) {
            most_common = Some((kind, *count));
        }
    }
    if let Some((kind, count)) = most_common {
        recommendations.push(format!(
            "Focus on fixing {} errors ({} occurrences)",
            kind, count
        ));
    }

    ErrorAnalysis {
        total_errors: failed.len(),
        error_types,
        patterns,
        recommendations,
        error_details,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rubric::standard_criteria;
    use crate::score::CriterionScore;

    fn query(id: u32, text: &str, category: &str) -> Query {
        let mut q = Query::new(id, text);
        q.category = category.to_string();
        q
    }

    fn uniform_perspectives(value: f64) -> Vec<PerspectiveScore> {
        let criteria = standard_criteria();
        let scores: BTreeMap<String, CriterionScore> = criteria
            .iter()
            .map(|c| (c.name.clone(), CriterionScore::new(value, "")))
            .collect();
        vec![
            PerspectiveScore::new("academic", scores.clone(), &criteria),
            PerspectiveScore::new("practical", scores, &criteria),
        ]
    }

    fn scored(id: u32, category: &str, value: f64) -> EvaluationResult {
        EvaluationResult::scored(
            query(id, &format!("query {}", id), category),
            value,
            uniform_perspectives(value),
            None,
            Some(TopicCoverage::measure("", &[])),
        )
    }

    #[test]
    fn test_topic_coverage_measure() {
        let coverage = TopicCoverage::measure(
            "Fitts' law predicts pointing time; usability matters.",
            &["Fitts' law".to_string(), "GOMS".to_string()],
        );
        assert!((coverage.coverage_rate - 0.5).abs() < 1e-9);
        assert_eq!(coverage.covered, vec!["Fitts' law"]);
        assert_eq!(coverage.missing, vec!["GOMS"]);
    }

    #[test]
    fn test_topic_coverage_no_expectations_is_full() {
        let coverage = TopicCoverage::measure("anything", &[]);
        assert_eq!(coverage.coverage_rate, 1.0);
        assert_eq!(coverage.total_expected, 0);
    }

    #[test]
    fn test_distribution_odd_and_even_medians() {
        let odd = ScoreDistribution::from_scores(&[0.9, 0.1, 0.5]);
        assert_eq!(odd.median, 0.5);

        let even = ScoreDistribution::from_scores(&[0.2, 0.4, 0.6, 0.8]);
        assert!((even.median - 0.5).abs() < 1e-9);
        assert!((even.mean - 0.5).abs() < 1e-9);
        assert!((even.std_dev - 0.05_f64.sqrt()).abs() < 1e-9);
        assert_eq!(even.count, 4);
        assert_eq!(even.min, 0.2);
        assert_eq!(even.max, 0.8);
    }

    #[test]
    fn test_distribution_empty_is_zeroed() {
        assert_eq!(ScoreDistribution::from_scores(&[]), ScoreDistribution::default());
    }

    #[test]
    fn test_report_accounting() {
        let results = vec![
            scored(1, "conceptual", 0.9),
            scored(2, "conceptual", 0.7),
            scored(3, "applied", 0.5),
            EvaluationResult::failure(
                query(4, "query 4", "applied"),
                SessionFailure::transport("connection reset"),
            ),
        ];
        let report =
            EvaluationReport::from_results(results, &JudgeConfig::default(), &Default::default());

        assert_eq!(report.summary.total_queries, 4);
        assert_eq!(report.summary.successful, 3);
        assert_eq!(report.summary.failed, 1);
        assert!((report.summary.success_rate - 0.75).abs() < 1e-9);
        assert_eq!(report.configuration.total_queries_available, 4);
        assert!(report.configuration.multi_perspective);
        assert_eq!(
            report.configuration.perspectives_used,
            vec!["academic", "practical"]
        );
        assert_eq!(report.configuration.thresholds, InterpretationThresholds::default());
        assert_eq!(report.detailed_results.len(), 4);
    }

    #[test]
    fn test_score_aggregates() {
        let results = vec![scored(1, "conceptual", 0.6), scored(2, "conceptual", 0.8)];
        let report =
            EvaluationReport::from_results(results, &JudgeConfig::default(), &Default::default());

        assert!((report.scores.combined_average - 0.7).abs() < 1e-9);
        assert!((report.scores.by_perspective["academic"] - 0.7).abs() < 1e-9);
        assert!((report.scores.by_criterion["practical"]["clarity"] - 0.7).abs() < 1e-9);
        assert_eq!(report.scores.score_distribution["combined"].count, 2);
        assert_eq!(report.scores.score_distribution["academic"].count, 2);
    }

    #[test]
    fn test_category_analysis() {
        let results = vec![
            scored(1, "conceptual", 0.9),
            scored(2, "conceptual", 0.5),
            scored(3, "applied", 0.6),
        ];
        let report =
            EvaluationReport::from_results(results, &JudgeConfig::default(), &Default::default());

        let conceptual = &report.category_analysis["conceptual"];
        assert!((conceptual.average - 0.7).abs() < 1e-9);
        assert_eq!(conceptual.count, 2);
        assert_eq!(conceptual.min, 0.5);
        assert_eq!(conceptual.max, 0.9);
        assert_eq!(report.category_analysis["applied"].count, 1);
    }

    #[test]
    fn test_commonly_missed_topics_ranked_and_capped() {
        let mut results = Vec::new();
        for id in 0..6 {
            let mut result = scored(id, "general", 0.8);
            let missing = if id < 4 {
                vec!["GOMS".to_string(), format!("topic-{}", id)]
            } else {
                vec![format!("topic-{}", id)]
            };
            result.topic_coverage = Some(TopicCoverage {
                coverage_rate: 0.5,
                covered: vec![],
                missing,
                total_expected: 2,
            });
            results.push(result);
        }

        let report =
            EvaluationReport::from_results(results, &JudgeConfig::default(), &Default::default());
        let missed = &report.topic_coverage.commonly_missed_topics;
        assert_eq!(missed.len(), 5);
        assert_eq!(missed[0].topic, "GOMS");
        assert_eq!(missed[0].count, 4);
    }

    #[test]
    fn test_best_and_worst_results() {
        let results = vec![
            scored(1, "conceptual", 0.4),
            scored(2, "applied", 0.9),
            scored(3, "general", 0.6),
        ];
        let report =
            EvaluationReport::from_results(results, &JudgeConfig::default(), &Default::default());

        assert_eq!(report.best_result.as_ref().unwrap().query, "query 2");
        assert_eq!(report.best_result.as_ref().unwrap().score, 0.9);
        assert_eq!(report.worst_result.as_ref().unwrap().query, "query 1");
    }

    #[test]
    fn test_interpretation_excellent() {
        let results = vec![scored(1, "general", 0.9), scored(2, "general", 0.85)];
        let report =
            EvaluationReport::from_results(results, &JudgeConfig::default(), &Default::default());

        assert!(report
            .interpretation
            .summary
            .contains("performance is excellent"));
        assert!(report
            .interpretation
            .strengths
            .iter()
            .any(|s| s.contains("High quality responses")));
        assert_eq!(
            report.interpretation.recommendations,
            vec!["Maintain current performance levels"]
        );
        assert!(!report.interpretation.perspectives_disagree);
    }

    #[test]
    fn test_interpretation_poor_scores() {
        let results = vec![scored(1, "general", 0.2)];
        let report =
            EvaluationReport::from_results(results, &JudgeConfig::default(), &Default::default());

        assert!(report
            .interpretation
            .summary
            .contains("below expectations"));
        assert!(!report.interpretation.recommendations.is_empty());
    }

    #[test]
    fn test_interpretation_perspective_imbalance() {
        let criteria = standard_criteria();
        let high: BTreeMap<String, CriterionScore> = criteria
            .iter()
            .map(|c| (c.name.clone(), CriterionScore::new(0.9, "")))
            .collect();
        let low: BTreeMap<String, CriterionScore> = criteria
            .iter()
            .map(|c| (c.name.clone(), CriterionScore::new(0.5, "")))
            .collect();

        let result = EvaluationResult::scored(
            query(1, "query 1", "general"),
            0.7,
            vec![
                PerspectiveScore::new("academic", high, &criteria),
                PerspectiveScore::new("practical", low, &criteria),
            ],
            None,
            None,
        );

        let report = EvaluationReport::from_results(
            vec![result],
            &JudgeConfig::default(),
            &Default::default(),
        );
        assert!(report
            .interpretation
            .summary
            .contains("better from the academic perspective"));
        assert!(report.interpretation.perspectives_disagree);
    }

    #[test]
    fn test_interpretation_flags_low_coverage() {
        let mut result = scored(1, "general", 0.8);
        result.topic_coverage = Some(TopicCoverage {
            coverage_rate: 0.3,
            covered: vec![],
            missing: vec!["GOMS".to_string()],
            total_expected: 3,
        });
        let report = EvaluationReport::from_results(
            vec![result],
            &JudgeConfig::default(),
            &Default::default(),
        );
        assert!(report
            .interpretation
            .summary
            .contains("Topic coverage is incomplete"));
    }

    #[test]
    fn test_error_analysis_empty_lists_are_explicit() {
        let report = EvaluationReport::from_results(
            vec![scored(1, "general", 0.8)],
            &JudgeConfig::default(),
            &Default::default(),
        );
        assert_eq!(report.error_analysis.total_errors, 0);

        let json = serde_json::to_value(&report.error_analysis).unwrap();
        assert_eq!(json["patterns"], serde_json::json!([]));
        assert_eq!(json["recommendations"], serde_json::json!([]));
    }

    #[test]
    fn test_error_analysis_counts_patterns_and_details() {
        let mut results = vec![scored(1, "general", 0.8)];
        for id in 2..=8 {
            let failure = if id % 2 == 0 {
                SessionFailure::transport("timed out")
            } else {
                SessionFailure::format("bad judge reply")
            };
            results.push(EvaluationResult::failure(
                query(id, &format!("query {}", id), "general"),
                failure,
            ));
        }

        let report =
            EvaluationReport::from_results(results, &JudgeConfig::default(), &Default::default());
        let errors = &report.error_analysis;

        assert_eq!(errors.total_errors, 7);
        assert_eq!(errors.error_types["transport"], 4);
        assert_eq!(errors.error_types["format"], 3);
        assert_eq!(errors.patterns.len(), 2);
        assert_eq!(errors.error_details.len(), 5);
        assert!(errors
            .recommendations
            .iter()
            .any(|r| r.contains("High error rate")));
        assert!(errors
            .recommendations
            .iter()
            .any(|r| r.contains("transport errors (4 occurrences)")));
    }

    #[test]
    fn test_report_serde_round_trip() {
        let results = vec![
            scored(1, "conceptual", 0.8),
            EvaluationResult::failure(
                query(2, "query 2", "applied"),
                SessionFailure::format("unparseable"),
            ),
        ];
        let report =
            EvaluationReport::from_results(results, &JudgeConfig::default(), &Default::default());

        let json = serde_json::to_string(&report).unwrap();
        let restored: EvaluationReport = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, report);
    }

    #[test]
    fn test_render_text_sections() {
        let results = vec![
            scored(1, "general", 0.8),
            EvaluationResult::failure(
                query(2, "query 2", "general"),
                SessionFailure::transport("connection reset"),
            ),
        ];
        let report =
            EvaluationReport::from_results(results, &JudgeConfig::default(), &Default::default());
        let text = report.render_text();

        assert!(text.contains("RESEARCH ASSISTANT EVALUATION REPORT"));
        assert!(text.contains("SUMMARY"));
        assert!(text.contains("Success Rate: 50.0%"));
        assert!(text.contains("SCORES"));
        assert!(text.contains("INTERPRETATION"));
        assert!(text.contains("ERROR ANALYSIS"));
        assert!(text.contains("Total Errors: 1"));
    }

    #[test]
    fn test_empty_results_report() {
        let report = EvaluationReport::from_results(
            Vec::new(),
            &JudgeConfig::default(),
            &Default::default(),
        );
        assert_eq!(report.summary.total_queries, 0);
        assert_eq!(report.summary.success_rate, 0.0);
        assert!(report.best_result.is_none());
        assert!(report.worst_result.is_none());
        assert_eq!(report.error_analysis.total_errors, 0);
    }
}
