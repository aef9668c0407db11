//! Findings surfaced by the analysis rules.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Finding severity, ordered from least to most severe.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Namespace for content-derived finding ids.
const FINDING_NAMESPACE: Uuid = Uuid::NAMESPACE_OID;

/// One detected condition. Immutable once built.
///
/// The id is derived from the finding's content, so evaluating the
/// same data twice reproduces identical findings, ids included.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub id: Uuid,
    pub title: String,
    pub severity: Severity,
    /// Scoring category: "security", "performance", or "compliance"
    pub category: String,
    pub description: String,
    pub recommendation: String,
    /// Excerpt from the collected data that triggered the rule
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
}

impl Finding {
    pub fn new(
        title: impl Into<String>,
        severity: Severity,
        category: impl Into<String>,
        description: impl Into<String>,
        recommendation: impl Into<String>,
    ) -> Self {
        let title = title.into();
        let category = category.into();
        let id = Self::derive_id(&category, &title, None);
        Self {
            id,
            title,
            severity,
            category,
            description: description.into(),
            recommendation: recommendation.into(),
            evidence: None,
        }
    }

    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        let evidence = evidence.into();
        self.id = Self::derive_id(&self.category, &self.title, Some(&evidence));
        self.evidence = Some(evidence);
        self
    }

    fn derive_id(category: &str, title: &str, evidence: Option<&str>) -> Uuid {
        let name = format!("{category}\n{title}\n{}", evidence.unwrap_or_default());
        Uuid::new_v5(&FINDING_NAMESPACE, name.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Info < Severity::Low);
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn test_severity_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Severity::Critical).unwrap(),
            "\"critical\""
        );
    }

    fn sample() -> Finding {
        Finding::new(
            "Root login over SSH is enabled",
            Severity::Critical,
            "security",
            "desc",
            "rec",
        )
    }

    #[test]
    fn test_id_is_reproducible_for_same_content() {
        let a = sample().with_evidence("PermitRootLogin yes");
        let b = sample().with_evidence("PermitRootLogin yes");
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn test_id_changes_with_evidence() {
        let bare = sample();
        let with = sample().with_evidence("PermitRootLogin yes");
        assert_ne!(bare.id, with.id);
    }
}
