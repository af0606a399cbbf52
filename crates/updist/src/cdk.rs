use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum CdkError {
    #[error("validator request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("validator responded with status {0}")]
    Status(u16),

    #[error("validator reported an internal failure (code {0})")]
    Failed(i64),
}

/// Outcome of a license-key check that reached the validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CdkVerdict {
    Accepted,
    /// Business rejection, with a message meant for the client.
    Rejected(String),
}

/// Authority deciding whether a license key may download a resource.
#[async_trait]
pub trait CdkValidator: Send + Sync {
    async fn validate(
        &self,
        cdk: &str,
        resource_id: &str,
        client_ip: Option<&str>,
    ) -> Result<CdkVerdict, CdkError>;
}

#[derive(Debug, Serialize)]
struct ValidateRequest<'a> {
    cdk:         &'a str,
    resource_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_ip:   Option<&'a str>,
}

/// `code` 0 accepts, a positive code rejects with `msg`, a negative code is a
/// validator failure.
#[derive(Debug, Deserialize)]
struct ValidateResponse {
    code: i64,
    #[serde(default)]
    msg:  Option<String>,
}

/// Validator behind an HTTP endpoint taking a JSON POST.
pub struct HttpCdkValidator {
    client: reqwest::Client,
    url:    String,
}

impl HttpCdkValidator {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, CdkError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl CdkValidator for HttpCdkValidator {
    async fn validate(
        &self,
        cdk: &str,
        resource_id: &str,
        client_ip: Option<&str>,
    ) -> Result<CdkVerdict, CdkError> {
        let response = self
            .client
            .post(&self.url)
            .json(&ValidateRequest {
                cdk,
                resource_id,
                client_ip,
            })
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CdkError::Status(status.as_u16()));
        }

        let body: ValidateResponse = response.json().await?;
        debug!(resource_id, code = body.code, "license key checked");
        match body.code {
            0 => Ok(CdkVerdict::Accepted),
            code if code > 0 => Ok(CdkVerdict::Rejected(
                body.msg.unwrap_or_else(|| "license key is not valid".to_string()),
            )),
            code => Err(CdkError::Failed(code)),
        }
    }
}

/// Accepts every key. Used when no validator is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAll;

#[async_trait]
impl CdkValidator for AcceptAll {
    async fn validate(&self, _cdk: &str, _resource_id: &str, _ip: Option<&str>) -> Result<CdkVerdict, CdkError> {
        Ok(CdkVerdict::Accepted)
    }
}
