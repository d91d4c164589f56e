//! Verdict domain models.
//!
//! A verdict is the aggregated quality decision over a task's output,
//! computed from one or more reviewer responses.

use serde::{Deserialize, Serialize};

/// Overall outcome of reviewing a task's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictKind {
    Pass,
    Fail,
    PassWithWarnings,
}

impl VerdictKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::PassWithWarnings => "pass_with_warnings",
        }
    }

    /// Whether this outcome lets the task advance.
    pub fn is_passing(&self) -> bool {
        matches!(self, Self::Pass | Self::PassWithWarnings)
    }
}

/// Severity tier parsed from a criterion's text.
///
/// Criteria are free-form strings; a leading `MUST:`, `SHOULD:` or `MAY:`
/// marker (case-insensitive) selects the tier. Untagged criteria are
/// treated as MUST so that an unlabeled requirement fails closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementTier {
    Must,
    Should,
    May,
}

impl RequirementTier {
    /// Parse the tier marker from a criterion's text.
    pub fn of(criterion: &str) -> Self {
        let head = criterion
            .trim_start()
            .split(|c: char| c == ':' || c.is_whitespace())
            .next()
            .unwrap_or("");
        match head.to_ascii_uppercase().as_str() {
            "SHOULD" => Self::Should,
            "MAY" => Self::May,
            _ => Self::Must,
        }
    }
}

/// Consensus result for a single criterion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriterionResult {
    /// Index into the task's combined criteria list
    pub index: usize,
    /// Criterion text as written in the plan
    pub criterion: String,
    /// Severity tier parsed from the text
    pub tier: RequirementTier,
    /// Unanimous-consensus outcome
    pub passed: bool,
    /// Evidence lines collected from reviewers
    pub evidence: Vec<String>,
}

/// Aggregated quality decision for one attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    pub kind: VerdictKind,
    /// Human-readable summary of the decision
    pub feedback: String,
    /// Per-criterion consensus results (empty in legacy mode)
    pub criterion_results: Vec<CriterionResult>,
    /// Alternate worker named by a reviewer, if any. Surfaced here;
    /// acted on by the retry loop, not the verdict engine.
    pub suggested_worker: Option<String>,
    /// Whether the retry loop should consider another attempt
    pub should_retry: bool,
}

impl Verdict {
    /// A failing verdict with the given feedback.
    pub fn fail(feedback: impl Into<String>) -> Self {
        Self {
            kind: VerdictKind::Fail,
            feedback: feedback.into(),
            criterion_results: Vec::new(),
            suggested_worker: None,
            should_retry: true,
        }
    }

    /// A passing verdict with the given feedback.
    pub fn pass(feedback: impl Into<String>) -> Self {
        Self {
            kind: VerdictKind::Pass,
            feedback: feedback.into(),
            criterion_results: Vec::new(),
            suggested_worker: None,
            should_retry: false,
        }
    }

    /// A non-retryable failing verdict for spawn-level errors.
    pub fn system_error(feedback: impl Into<String>) -> Self {
        Self {
            kind: VerdictKind::Fail,
            feedback: feedback.into(),
            criterion_results: Vec::new(),
            suggested_worker: None,
            should_retry: false,
        }
    }
}

/// One reviewer's judgment of a single criterion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriterionJudgment {
    pub index: usize,
    pub passed: bool,
    #[serde(default)]
    pub evidence: String,
}

/// A reviewer's structured response: one judgment per criterion plus
/// optional non-blocking concerns and a suggested alternate worker.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewerReport {
    #[serde(default)]
    pub criteria: Vec<CriterionJudgment>,
    #[serde(default)]
    pub concerns: Vec<String>,
    #[serde(default)]
    pub suggested_worker: Option<String>,
}

/// A reviewer's legacy (blob-mode) response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyReview {
    pub verdict: VerdictKind,
    #[serde(default)]
    pub feedback: String,
    #[serde(default)]
    pub concerns: Vec<String>,
    #[serde(default)]
    pub suggested_worker: Option<String>,
}

/// Outcome of parsing a reviewer's raw response text.
///
/// Parsing never panics or errors upward; an unparseable response is a
/// first-class variant so the engine can fail closed.
#[derive(Debug, Clone)]
pub enum ParsedReview {
    Structured(ReviewerReport),
    Legacy(LegacyReview),
    ParseError(String),
}

/// Raw response from one reviewer, as captured off the wire.
#[derive(Debug, Clone)]
pub struct ReviewerResponse {
    pub reviewer: String,
    pub raw: String,
}
