// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project lessons: recurring failure patterns mined from recent outcomes,
//! rendered into prompt bundles for subsequent spawns.

use crate::classifier::{classify_check, dominant_category, ErrorCategory};
use fleet_core::{OutcomeKind, OutcomeRecord};
use std::collections::HashMap;

/// How many recent outcomes feed a lesson aggregation.
pub const DEFAULT_LESSON_WINDOW: usize = 20;

const MIN_CHECK_COUNT: usize = 2;
const RETRY_THRESHOLD: f64 = 1.5;
const FAILURE_RATE_THRESHOLD: f64 = 0.3;

/// One recurring failing check.
#[derive(Debug, Clone, PartialEq)]
pub struct FailingCheckLesson {
    pub name: String,
    pub count: usize,
    pub recommendation: &'static str,
}

/// Overall failure-rate lesson.
#[derive(Debug, Clone, PartialEq)]
pub struct FailureRateLesson {
    /// Fraction of recent outcomes that did not merge, in `0.0..=1.0`.
    pub rate: f64,
    pub dominant: ErrorCategory,
}

/// Aggregated lessons over recent outcomes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectLessons {
    /// Top three failing checks seen at least twice, most frequent first.
    pub top_failing_checks: Vec<FailingCheckLesson>,
    /// Mean CI retries, only when it crosses the nagging threshold.
    pub avg_ci_retries: Option<f64>,
    pub failure_rate: Option<FailureRateLesson>,
}

impl ProjectLessons {
    /// Aggregate over outcomes (callers pass the most recent window).
    pub fn gather(outcomes: &[OutcomeRecord]) -> Self {
        if outcomes.is_empty() {
            return Self::default();
        }

        let mut check_counts: HashMap<&str, usize> = HashMap::new();
        for outcome in outcomes {
            for name in outcome.failing_checks.iter().flatten() {
                *check_counts.entry(name.as_str()).or_insert(0) += 1;
            }
        }
        let mut ranked: Vec<(&str, usize)> =
            check_counts.into_iter().filter(|(_, count)| *count >= MIN_CHECK_COUNT).collect();
        // Count descending, name ascending for a stable order.
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        let top_failing_checks = ranked
            .into_iter()
            .take(3)
            .map(|(name, count)| FailingCheckLesson {
                name: name.to_string(),
                count,
                recommendation: classify_check(name).recommendation(),
            })
            .collect();

        let avg = outcomes.iter().map(|o| o.ci_retries as f64).sum::<f64>()
            / outcomes.len() as f64;
        let avg_ci_retries = (avg > RETRY_THRESHOLD).then_some(avg);

        let failures =
            outcomes.iter().filter(|o| o.outcome != OutcomeKind::Merged).count();
        let rate = failures as f64 / outcomes.len() as f64;
        let failure_rate = (rate > FAILURE_RATE_THRESHOLD).then(|| {
            let all_names = outcomes
                .iter()
                .flat_map(|o| o.failing_checks.iter().flatten())
                .map(String::as_str);
            FailureRateLesson { rate, dominant: dominant_category(all_names) }
        });

        Self { top_failing_checks, avg_ci_retries, failure_rate }
    }

    pub fn is_empty(&self) -> bool {
        self.top_failing_checks.is_empty()
            && self.avg_ci_retries.is_none()
            && self.failure_rate.is_none()
    }

    /// Render as a markdown block for prompt bundles; `None` when there is
    /// nothing worth saying.
    pub fn render(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        let mut out = String::from("## Project lessons\n");
        for lesson in &self.top_failing_checks {
            out.push_str(&format!(
                "- `{}` failed in {} recent sessions. {}\n",
                lesson.name, lesson.count, lesson.recommendation
            ));
        }
        if let Some(avg) = self.avg_ci_retries {
            out.push_str(&format!(
                "- Sessions here average {avg:.1} CI fix rounds; run the full check suite locally before pushing.\n"
            ));
        }
        if let Some(rate) = &self.failure_rate {
            out.push_str(&format!(
                "- {:.0}% of recent sessions did not merge, mostly on {} failures.\n",
                rate.rate * 100.0,
                rate.dominant
            ));
        }
        Some(out)
    }
}

#[cfg(test)]
#[path = "lessons_tests.rs"]
mod tests;
