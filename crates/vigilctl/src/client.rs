//! HTTP client for talking to the vigild daemon

use anyhow::{anyhow, Context, Result};
use std::time::Duration;
use uuid::Uuid;
use vigil_common::api::{
    CancelResponse, HealthResponse, ListAuditsResponse, ListModelsResponse, ListTargetsResponse,
    RegisterTargetRequest, RegisterTargetResponse, StartAuditRequest, StartAuditResponse,
};
use vigil_common::progress::AuditStatus;
use vigil_common::target::Target;

const DEFAULT_URL: &str = "http://127.0.0.1:7710";

/// Client for the daemon's HTTP API
pub struct DaemonClient {
    base_url: String,
    http: reqwest::Client,
}

impl DaemonClient {
    /// Resolve daemon URL with fallback chain
    ///
    /// Priority:
    /// 1. Explicit --url flag
    /// 2. $VIGILD_URL environment variable
    /// 3. http://127.0.0.1:7710 (default)
    pub fn resolve_url(explicit: Option<&str>) -> String {
        if let Some(url) = explicit {
            return url.trim_end_matches('/').to_string();
        }
        if let Ok(url) = std::env::var("VIGILD_URL") {
            return url.trim_end_matches('/').to_string();
        }
        DEFAULT_URL.to_string()
    }

    pub fn new(explicit_url: Option<&str>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            base_url: Self::resolve_url(explicit_url),
            http,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if body.is_empty() {
            Err(anyhow!("daemon returned {}", status))
        } else {
            Err(anyhow!("daemon returned {}: {}", status, body))
        }
    }

    pub async fn register_target(&self, req: &RegisterTargetRequest) -> Result<Target> {
        let resp = self
            .http
            .post(self.url("/v1/targets"))
            .json(req)
            .send()
            .await
            .context("daemon unreachable")?;
        let body: RegisterTargetResponse = Self::check(resp).await?.json().await?;
        Ok(body.target)
    }

    pub async fn list_targets(&self) -> Result<Vec<Target>> {
        let resp = self
            .http
            .get(self.url("/v1/targets"))
            .send()
            .await
            .context("daemon unreachable")?;
        let body: ListTargetsResponse = Self::check(resp).await?.json().await?;
        Ok(body.targets)
    }

    pub async fn remove_target(&self, id: Uuid) -> Result<()> {
        let resp = self
            .http
            .delete(self.url(&format!("/v1/targets/{}", id)))
            .send()
            .await
            .context("daemon unreachable")?;
        Self::check(resp).await?;
        Ok(())
    }

    pub async fn start_audit(&self, target_id: Uuid, model: Option<String>) -> Result<Uuid> {
        let req = StartAuditRequest { target_id, model };
        let resp = self
            .http
            .post(self.url("/v1/audits"))
            .json(&req)
            .send()
            .await
            .context("daemon unreachable")?;
        let body: StartAuditResponse = Self::check(resp).await?.json().await?;
        Ok(body.audit_id)
    }

    pub async fn audit_status(&self, audit_id: Uuid) -> Result<AuditStatus> {
        let resp = self
            .http
            .get(self.url(&format!("/v1/audits/{}", audit_id)))
            .send()
            .await
            .context("daemon unreachable")?;
        let status: AuditStatus = Self::check(resp).await?.json().await?;
        Ok(status)
    }

    pub async fn list_audits(&self) -> Result<ListAuditsResponse> {
        let resp = self
            .http
            .get(self.url("/v1/audits"))
            .send()
            .await
            .context("daemon unreachable")?;
        let body: ListAuditsResponse = Self::check(resp).await?.json().await?;
        Ok(body)
    }

    pub async fn cancel_audit(&self, audit_id: Uuid) -> Result<CancelResponse> {
        let resp = self
            .http
            .post(self.url(&format!("/v1/audits/{}/cancel", audit_id)))
            .send()
            .await
            .context("daemon unreachable")?;
        let body: CancelResponse = Self::check(resp).await?.json().await?;
        Ok(body)
    }

    pub async fn list_models(&self) -> Result<Vec<String>> {
        let resp = self
            .http
            .get(self.url("/v1/models"))
            .send()
            .await
            .context("daemon unreachable")?;
        let body: ListModelsResponse = Self::check(resp).await?.json().await?;
        Ok(body.models)
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        let resp = self
            .http
            .get(self.url("/v1/health"))
            .send()
            .await
            .context("daemon unreachable")?;
        let body: HealthResponse = Self::check(resp).await?.json().await?;
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_url_wins_and_is_normalized() {
        let url = DaemonClient::resolve_url(Some("http://10.0.0.5:7710/"));
        assert_eq!(url, "http://10.0.0.5:7710");
    }

    #[test]
    fn default_url_used_without_override() {
        // Env may leak from the caller's shell; only assert the explicit-None
        // path when the variable is absent.
        if std::env::var("VIGILD_URL").is_err() {
            assert_eq!(DaemonClient::resolve_url(None), DEFAULT_URL);
        }
    }
}
