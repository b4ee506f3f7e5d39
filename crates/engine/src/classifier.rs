// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Failing-check classification.
//!
//! Maps CI check names onto error categories so fix messages and lessons can
//! talk about "the lint failure" instead of a raw check-name dump. Patterns
//! are ordered; the first match wins.

use fleet_adapters::{CheckStatus, CiCheck};
use regex::Regex;
use std::sync::OnceLock;

/// Category of a failing check, ordered by fix priority (build breakage
/// first, unclassified noise last).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorCategory {
    Build,
    Typecheck,
    Lint,
    Format,
    Test,
    Security,
    Unknown,
}

fleet_core::simple_display! {
    ErrorCategory {
        Build => "build",
        Typecheck => "typecheck",
        Lint => "lint",
        Format => "format",
        Test => "test",
        Security => "security",
        Unknown => "unknown",
    }
}

impl ErrorCategory {
    /// Fix priority: lower fixes first.
    pub fn priority(&self) -> u8 {
        match self {
            Self::Build => 1,
            Self::Typecheck => 2,
            Self::Lint => 3,
            Self::Format => 3,
            Self::Test => 4,
            Self::Security => 5,
            Self::Unknown => 6,
        }
    }

    /// Short remediation hint included in fix messages and lessons.
    pub fn recommendation(&self) -> &'static str {
        match self {
            Self::Build => "Fix compilation/build errors first; nothing downstream matters until the build is green.",
            Self::Typecheck => "Resolve type errors; run the typechecker locally before pushing.",
            Self::Lint => "Run the linter locally and fix or justify each finding.",
            Self::Format => "Run the project formatter and commit the result.",
            Self::Test => "Reproduce the failing tests locally; fix the code, not the tests, unless the tests encode stale behavior.",
            Self::Security => "Address the security findings; do not suppress them without review.",
            Self::Unknown => "Open the check's logs and work out what it verifies before retrying.",
        }
    }

    fn all_in_priority_order() -> [Self; 7] {
        [
            Self::Build,
            Self::Typecheck,
            Self::Lint,
            Self::Format,
            Self::Test,
            Self::Security,
            Self::Unknown,
        ]
    }
}

fn patterns() -> &'static [(Regex, ErrorCategory)] {
    static PATTERNS: OnceLock<Vec<(Regex, ErrorCategory)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        // Order matters: first match wins, so the more specific
        // typecheck/format patterns come before the broad test pattern.
        [
            (r"(?i)build|compil|bundle|webpack|cargo\s*check", ErrorCategory::Build),
            (r"(?i)type-?check|\btsc\b|mypy|pyright", ErrorCategory::Typecheck),
            (r"(?i)lint|eslint|clippy|ruff|flake8", ErrorCategory::Lint),
            (r"(?i)format|\bfmt\b|prettier|black\b", ErrorCategory::Format),
            (r"(?i)test|spec|jest|pytest|e2e|integration", ErrorCategory::Test),
            (r"(?i)security|audit|codeql|snyk|trivy|dependabot", ErrorCategory::Security),
        ]
        .into_iter()
        .filter_map(|(pattern, category)| Regex::new(pattern).ok().map(|re| (re, category)))
        .collect()
    })
}

/// Classify one check name.
pub fn classify_check(name: &str) -> ErrorCategory {
    for (re, category) in patterns() {
        if re.is_match(name) {
            return *category;
        }
    }
    ErrorCategory::Unknown
}

/// The highest-frequency category among check names; ties break toward the
/// higher-priority (lower number) category.
pub fn dominant_category<'a>(names: impl IntoIterator<Item = &'a str>) -> ErrorCategory {
    let mut counts = std::collections::HashMap::new();
    for name in names {
        *counts.entry(classify_check(name)).or_insert(0usize) += 1;
    }
    let mut best = ErrorCategory::Unknown;
    let mut best_count = 0;
    for category in ErrorCategory::all_in_priority_order() {
        let count = counts.get(&category).copied().unwrap_or(0);
        if count > best_count {
            best = category;
            best_count = count;
        }
    }
    best
}

/// Render failing checks grouped by category, categories in priority order,
/// one "Action" recommendation per category. Output is stable for identical
/// input so repeated fix messages diff cleanly.
pub fn format_classified_errors(checks: &[CiCheck]) -> String {
    let failing: Vec<&CiCheck> =
        checks.iter().filter(|c| c.status == CheckStatus::Failing).collect();
    if failing.is_empty() {
        return String::new();
    }

    let mut out = String::from("## Failing checks\n");
    for category in ErrorCategory::all_in_priority_order() {
        let in_category: Vec<&&CiCheck> =
            failing.iter().filter(|c| classify_check(&c.name) == category).collect();
        if in_category.is_empty() {
            continue;
        }
        out.push_str(&format!("\n### {category}\n"));
        for check in &in_category {
            match &check.url {
                Some(url) => out.push_str(&format!("- {} ({url})\n", check.name)),
                None => out.push_str(&format!("- {}\n", check.name)),
            }
        }
        out.push_str(&format!("Action: {}\n", category.recommendation()));
    }
    out
}

#[cfg(test)]
#[path = "classifier_tests.rs"]
mod tests;
