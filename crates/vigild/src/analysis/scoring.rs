//! Score derivation from finding severities.
//!
//! Fixed deduction weights per severity, floored at zero. The overall
//! score deducts across all findings; the category scores deduct only
//! from findings carrying that category.

use vigil_common::{Finding, Scores, Severity};

/// Points deducted from 100 per finding of this severity.
fn deduction(severity: Severity) -> u32 {
    match severity {
        Severity::Critical => 25,
        Severity::High => 15,
        Severity::Medium => 8,
        Severity::Low => 3,
        Severity::Info => 0,
    }
}

fn apply(findings: &[Finding], filter: Option<&str>) -> u8 {
    let total: u32 = findings
        .iter()
        .filter(|f| filter.map_or(true, |c| f.category == c))
        .map(|f| deduction(f.severity))
        .sum();
    100u32.saturating_sub(total) as u8
}

pub fn score(findings: &[Finding]) -> Scores {
    Scores {
        overall: apply(findings, None),
        security: apply(findings, Some("security")),
        performance: apply(findings, Some("performance")),
        compliance: apply(findings, Some("compliance")),
    }
}
