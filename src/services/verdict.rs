//! Verdict engine.
//!
//! Aggregates reviewer responses into a single quality decision for one
//! attempt. Two modes, selected by whether the task carries criteria:
//!
//! - **Legacy**: no criteria; the first reviewer's blob verdict is the
//!   decision.
//! - **Structured**: every criterion is judged individually by every
//!   reviewer; a criterion passes only on unanimous consensus.
//!
//! Reviewer output arrives as raw text from an external process. It is
//! parsed into a tagged variant rather than thrown as an error, so an
//! unparseable response fails closed to FAIL - never silently PASS.

use crate::domain::models::{
    CriterionResult, LegacyReview, ParsedReview, RequirementTier, ReviewerReport,
    ReviewerResponse, Task, Verdict, VerdictKind,
};

/// Parse one reviewer's raw response.
///
/// The response is JSON-ish text: the first `{` to the last `}` is
/// treated as a JSON document. Structured responses deserialize to a
/// [`ReviewerReport`]; blob responses to a [`LegacyReview`]. As a last
/// resort a bare `PASS` / `FAIL` / `PASS_WITH_WARNINGS` first line is
/// accepted in legacy mode.
pub fn parse_review(raw: &str, expects_criteria: bool) -> ParsedReview {
    if let Some(json) = extract_json(raw) {
        if expects_criteria {
            if let Ok(report) = serde_json::from_str::<ReviewerReport>(json) {
                if !report.criteria.is_empty() {
                    return ParsedReview::Structured(report);
                }
            }
        }
        if let Ok(review) = serde_json::from_str::<LegacyReview>(json) {
            return ParsedReview::Legacy(review);
        }
    }

    if !expects_criteria {
        if let Some(kind) = parse_bare_verdict(raw) {
            return ParsedReview::Legacy(LegacyReview {
                verdict: kind,
                feedback: raw.trim().to_string(),
                concerns: Vec::new(),
                suggested_worker: None,
            });
        }
    }

    ParsedReview::ParseError(truncate(raw, 200))
}

fn extract_json(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

fn parse_bare_verdict(raw: &str) -> Option<VerdictKind> {
    let first = raw.lines().find(|l| !l.trim().is_empty())?.trim();
    match first.to_ascii_uppercase().as_str() {
        "PASS" => Some(VerdictKind::Pass),
        "FAIL" => Some(VerdictKind::Fail),
        "PASS_WITH_WARNINGS" => Some(VerdictKind::PassWithWarnings),
        _ => None,
    }
}

fn truncate(s: &str, max: usize) -> String {
    let trimmed = s.trim();
    if trimmed.len() <= max {
        trimmed.to_string()
    } else {
        let mut end = max;
        while !trimmed.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &trimmed[..end])
    }
}

/// Compute the verdict for one attempt from the reviewer responses.
///
/// `responses` holds the raw text returned by each assigned reviewer.
/// In legacy mode only the first response is considered; in structured
/// mode every response participates in consensus.
pub fn review(task: &Task, responses: &[ReviewerResponse]) -> Verdict {
    let criteria = task.review_criteria();

    if responses.is_empty() {
        return Verdict::fail("no reviewer responses");
    }

    if criteria.is_empty() {
        legacy_verdict(&responses[0])
    } else {
        structured_verdict(&criteria, responses)
    }
}

fn legacy_verdict(response: &ReviewerResponse) -> Verdict {
    match parse_review(&response.raw, false) {
        ParsedReview::Legacy(review) => {
            let kind = if review.verdict == VerdictKind::Pass && !review.concerns.is_empty() {
                VerdictKind::PassWithWarnings
            } else {
                review.verdict
            };
            let mut feedback = review.feedback;
            if !review.concerns.is_empty() {
                if !feedback.is_empty() {
                    feedback.push_str("; ");
                }
                feedback.push_str(&format!("concerns: {}", review.concerns.join("; ")));
            }
            Verdict {
                kind,
                feedback,
                criterion_results: Vec::new(),
                suggested_worker: review.suggested_worker,
                should_retry: kind == VerdictKind::Fail,
            }
        }
        ParsedReview::Structured(_) | ParsedReview::ParseError(_) => {
            // Fail closed: a blob review we cannot read is never a pass.
            Verdict::fail(format!("unparseable review from {}", response.reviewer))
        }
    }
}

fn structured_verdict(criteria: &[&str], responses: &[ReviewerResponse]) -> Verdict {
    let parsed: Vec<(String, ParsedReview)> = responses
        .iter()
        .map(|r| (r.reviewer.clone(), parse_review(&r.raw, true)))
        .collect();

    let mut suggested_worker = None;
    let mut concerns: Vec<String> = Vec::new();
    for (_, review) in &parsed {
        match review {
            ParsedReview::Structured(report) => {
                if suggested_worker.is_none() {
                    suggested_worker.clone_from(&report.suggested_worker);
                }
                concerns.extend(report.concerns.iter().cloned());
            }
            ParsedReview::Legacy(review) => {
                if suggested_worker.is_none() {
                    suggested_worker.clone_from(&review.suggested_worker);
                }
            }
            ParsedReview::ParseError(_) => {}
        }
    }

    let mut results = Vec::with_capacity(criteria.len());
    for (index, criterion) in criteria.iter().enumerate() {
        let mut passed = true;
        let mut evidence = Vec::new();

        // Unanimous consensus: one dissent fails the criterion. A
        // reviewer whose response is missing a judgment, or could not
        // be parsed at all, counts as a dissent.
        for (reviewer, review) in &parsed {
            match review {
                ParsedReview::Structured(report) => {
                    match report.criteria.iter().find(|j| j.index == index) {
                        Some(judgment) => {
                            if !judgment.passed {
                                passed = false;
                            }
                            if !judgment.evidence.is_empty() {
                                evidence.push(format!("{reviewer}: {}", judgment.evidence));
                            }
                        }
                        None => {
                            passed = false;
                            evidence.push(format!("{reviewer}: criterion not judged"));
                        }
                    }
                }
                ParsedReview::Legacy(_) | ParsedReview::ParseError(_) => {
                    passed = false;
                    evidence.push(format!("{reviewer}: unparseable review"));
                }
            }
        }

        results.push(CriterionResult {
            index,
            criterion: (*criterion).to_string(),
            tier: RequirementTier::of(criterion),
            passed,
            evidence,
        });
    }

    let must_failed = results
        .iter()
        .any(|r| !r.passed && r.tier == RequirementTier::Must);
    let any_failed = results.iter().any(|r| !r.passed);

    let kind = if must_failed {
        VerdictKind::Fail
    } else if any_failed || !concerns.is_empty() {
        // SHOULD/MAY failures and non-blocking concerns downgrade
        // rather than fail, provided every MUST criterion passed.
        VerdictKind::PassWithWarnings
    } else {
        VerdictKind::Pass
    };

    let failed_list: Vec<String> = results
        .iter()
        .filter(|r| !r.passed)
        .map(|r| r.criterion.clone())
        .collect();
    let passed_count = results.len() - failed_list.len();
    let mut feedback = format!("{passed_count}/{} criteria passed", results.len());
    if !failed_list.is_empty() {
        feedback.push_str(&format!("; failed: {}", failed_list.join("; ")));
    }
    if !concerns.is_empty() {
        feedback.push_str(&format!("; concerns: {}", concerns.join("; ")));
    }

    Verdict {
        kind,
        feedback,
        criterion_results: results,
        suggested_worker,
        should_retry: kind == VerdictKind::Fail,
    }
}
