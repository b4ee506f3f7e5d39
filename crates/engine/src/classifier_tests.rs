// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use fleet_adapters::{CheckStatus, CiCheck};

#[yare::parameterized(
    build_plain     = { "build", ErrorCategory::Build },
    build_compile   = { "Compile / linux-x64", ErrorCategory::Build },
    typecheck_tsc   = { "tsc", ErrorCategory::Typecheck },
    typecheck_named = { "type-check", ErrorCategory::Typecheck },
    mypy            = { "mypy (3.12)", ErrorCategory::Typecheck },
    lint_eslint     = { "eslint", ErrorCategory::Lint },
    lint_clippy     = { "clippy", ErrorCategory::Lint },
    format_prettier = { "prettier", ErrorCategory::Format },
    format_fmt      = { "cargo fmt", ErrorCategory::Format },
    test_unit       = { "unit tests", ErrorCategory::Test },
    test_jest       = { "jest", ErrorCategory::Test },
    test_e2e        = { "e2e-chrome", ErrorCategory::Test },
    security_audit  = { "npm audit", ErrorCategory::Security },
    security_codeql = { "CodeQL", ErrorCategory::Security },
    unknown         = { "mystery-gate", ErrorCategory::Unknown },
)]
fn classifies_check_names(name: &str, expected: ErrorCategory) {
    assert_eq!(classify_check(name), expected);
}

#[test]
fn first_pattern_wins_for_ambiguous_names() {
    // "build-tests" matches both build and test; build comes first.
    assert_eq!(classify_check("build-tests"), ErrorCategory::Build);
}

#[yare::parameterized(
    build     = { ErrorCategory::Build, 1 },
    typecheck = { ErrorCategory::Typecheck, 2 },
    lint      = { ErrorCategory::Lint, 3 },
    format    = { ErrorCategory::Format, 3 },
    test      = { ErrorCategory::Test, 4 },
    security  = { ErrorCategory::Security, 5 },
    unknown   = { ErrorCategory::Unknown, 6 },
)]
fn priorities(category: ErrorCategory, expected: u8) {
    assert_eq!(category.priority(), expected);
}

#[test]
fn dominant_category_picks_most_frequent() {
    let names = ["jest", "pytest", "eslint"];
    assert_eq!(dominant_category(names), ErrorCategory::Test);
}

#[test]
fn dominant_category_tie_breaks_by_priority() {
    let names = ["build", "jest"];
    assert_eq!(dominant_category(names), ErrorCategory::Build);
}

#[test]
fn dominant_category_of_nothing_is_unknown() {
    assert_eq!(dominant_category([]), ErrorCategory::Unknown);
}

fn check(name: &str, status: CheckStatus) -> CiCheck {
    CiCheck { name: name.to_string(), status, url: None }
}

#[test]
fn format_groups_by_category_in_priority_order() {
    let checks = vec![
        check("jest", CheckStatus::Failing),
        check("eslint", CheckStatus::Failing),
        check("build", CheckStatus::Failing),
        check("deploy-preview", CheckStatus::Passing),
    ];
    let out = format_classified_errors(&checks);

    let build_pos = out.find("### build").unwrap();
    let lint_pos = out.find("### lint").unwrap();
    let test_pos = out.find("### test").unwrap();
    assert!(build_pos < lint_pos && lint_pos < test_pos, "priority order: {out}");
    assert!(!out.contains("deploy-preview"), "passing checks excluded");
    assert!(out.contains("Action: "), "each category carries a recommendation");
}

#[test]
fn format_includes_check_urls() {
    let checks = vec![CiCheck {
        name: "clippy".to_string(),
        status: CheckStatus::Failing,
        url: Some("https://ci.example/run/1".to_string()),
    }];
    let out = format_classified_errors(&checks);
    assert!(out.contains("clippy (https://ci.example/run/1)"));
}

#[test]
fn format_of_all_passing_is_empty() {
    let checks = vec![check("build", CheckStatus::Passing)];
    assert_eq!(format_classified_errors(&checks), "");
}

#[test]
fn format_is_stable_for_identical_input() {
    let checks = vec![check("build", CheckStatus::Failing), check("jest", CheckStatus::Failing)];
    assert_eq!(format_classified_errors(&checks), format_classified_errors(&checks));
}
