//! Ollama-backed analysis service.
//!
//! The pipeline talks to the analysis collaborator through the
//! `AnalysisService` trait; production wires in this client, tests
//! inject a fake.

use crate::error::{AuditError, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::info;
use vigil_common::Finding;

/// External analysis collaborator: model discovery and free-text
/// assessment of findings.
#[async_trait]
pub trait AnalysisService: Send + Sync {
    async fn list_models(&self) -> Result<Vec<String>>;

    /// Generate a narrative assessment. Bounded by a minutes-scale
    /// timeout set at construction; a timeout is a failure like any
    /// other at this phase.
    async fn analyze(&self, findings: &[Finding], model: &str) -> Result<String>;
}

pub struct OllamaClient {
    base_url: String,
    analysis_timeout_secs: u64,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>, analysis_timeout_secs: u64) -> Self {
        Self {
            base_url: base_url.into(),
            analysis_timeout_secs,
        }
    }

    fn build_prompt(findings: &[Finding]) -> String {
        let mut prompt = String::from(
            "You are a Linux security auditor. Summarize the following findings, \
             rank the remediation order, and call out anything that needs action today.\n\n",
        );
        if findings.is_empty() {
            prompt.push_str("No findings: the host passed every configured check.\n");
        }
        for f in findings {
            prompt.push_str(&format!(
                "- [{}] {} ({}): {}\n  Recommendation: {}\n",
                f.severity, f.title, f.category, f.description, f.recommendation
            ));
        }
        prompt
    }
}

#[async_trait]
impl AnalysisService for OllamaClient {
    async fn list_models(&self) -> Result<Vec<String>> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| AuditError::Analysis(e.to_string()))?;

        let response = client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
            .map_err(|e| AuditError::Prerequisite(format!("analysis service unreachable: {e}")))?;

        if !response.status().is_success() {
            return Err(AuditError::Prerequisite(format!(
                "analysis service returned {}",
                response.status()
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AuditError::Analysis(e.to_string()))?;

        let models = json
            .get("models")
            .and_then(|m| m.as_array())
            .map(|models| {
                models
                    .iter()
                    .filter_map(|m| m.get("name").and_then(|n| n.as_str()))
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(models)
    }

    async fn analyze(&self, findings: &[Finding], model: &str) -> Result<String> {
        info!(
            "Requesting analysis of {} findings from model {}",
            findings.len(),
            model
        );

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.analysis_timeout_secs))
            .build()
            .map_err(|e| AuditError::Analysis(e.to_string()))?;

        let body = serde_json::json!({
            "model": model,
            "prompt": Self::build_prompt(findings),
            "stream": false
        });

        let response = client
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| AuditError::Analysis(format!("analysis request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AuditError::Analysis(format!(
                "analysis request failed: {}",
                response.status()
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AuditError::Analysis(e.to_string()))?;

        let text = json
            .get("response")
            .and_then(|r| r.as_str())
            .unwrap_or("")
            .to_string();

        if text.is_empty() {
            return Err(AuditError::Analysis("model returned empty analysis".into()));
        }
        Ok(text)
    }
}
