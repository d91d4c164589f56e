//! Keyword classification of failure text into patterns.
//!
//! Used when appending learning records so later worker-selection
//! queries can aggregate by failure category.

use crate::domain::models::FailurePattern;

const COMPILATION: &[&str] = &[
    "compile error",
    "compilation error",
    "error[e",
    "cannot find",
    "undefined reference",
    "syntax error",
    "type mismatch",
    "does not implement",
];

const TEST: &[&str] = &[
    "test failed",
    "tests failed",
    "assertion",
    "assert_eq",
    "failures:",
];

const DEPENDENCY: &[&str] = &[
    "could not resolve",
    "no matching version",
    "missing dependency",
    "unresolved import",
    "module not found",
    "package not found",
];

const PERMISSION: &[&str] = &[
    "permission denied",
    "access denied",
    "eacces",
    "read-only file system",
    "operation not permitted",
];

const TIMEOUT: &[&str] = &["timed out", "timeout", "deadline exceeded"];

const RUNTIME: &[&str] = &[
    "panicked at",
    "panic",
    "segmentation fault",
    "stack overflow",
    "runtime error",
    "unhandled exception",
    "killed",
];

/// Classify failure output/feedback text into zero or more patterns.
/// Matching is case-insensitive; the result is deduplicated and in a
/// stable category order.
pub fn detect(text: &str) -> Vec<FailurePattern> {
    let lower = text.to_lowercase();
    let mut patterns = Vec::new();

    let mut check = |keywords: &[&str], pattern: FailurePattern| {
        if keywords.iter().any(|k| lower.contains(k)) {
            patterns.push(pattern);
        }
    };

    check(COMPILATION, FailurePattern::Compilation);
    check(TEST, FailurePattern::Test);
    check(DEPENDENCY, FailurePattern::Dependency);
    check(PERMISSION, FailurePattern::Permission);
    check(TIMEOUT, FailurePattern::Timeout);
    check(RUNTIME, FailurePattern::Runtime);

    patterns
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compilation_errors() {
        let patterns = detect("error[E0425]: cannot find value `foo` in this scope");
        assert!(patterns.contains(&FailurePattern::Compilation));
    }

    #[test]
    fn test_timeout_text() {
        let patterns = detect("worker timed out after 600 seconds");
        assert_eq!(patterns, vec![FailurePattern::Timeout]);
    }

    #[test]
    fn test_multiple_categories() {
        let patterns = detect("test failed: thread 'main' panicked at src/lib.rs:10");
        assert!(patterns.contains(&FailurePattern::Test));
        assert!(patterns.contains(&FailurePattern::Runtime));
    }

    #[test]
    fn test_case_insensitive() {
        let patterns = detect("PERMISSION DENIED: /etc/passwd");
        assert_eq!(patterns, vec![FailurePattern::Permission]);
    }

    #[test]
    fn test_clean_text_yields_nothing() {
        assert!(detect("all good, shipped it").is_empty());
    }

    #[test]
    fn test_parser_expectation_text_is_not_a_test_failure() {
        let patterns = detect("expected identifier, found keyword `fn`");
        assert!(!patterns.contains(&FailurePattern::Test));
    }

    #[test]
    fn test_new_assertion_panic_format() {
        let patterns = detect("assertion `left == right` failed\n  left: 2\n right: 3");
        assert!(patterns.contains(&FailurePattern::Test));
    }
}
