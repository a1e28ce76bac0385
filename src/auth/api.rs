//! Remote authentication API.
//!
//! The backend owns code generation, hashing and session issuance; this
//! module only speaks its JSON surface. Failures travel on two channels the
//! state machine treats differently: [`ApiError`] (transport trouble or a
//! non-success HTTP status) versus an `Ok` payload whose `success` flag is
//! false (an explicit application-level rejection).

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::future::Future;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

pub(crate) static APP_USER_AGENT: &str =
    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

const SEND_CODE_PATH: &str = "/api/auth/send_code";
const LOGIN_PATH: &str = "/api/auth/login";
const STATUS_PATH: &str = "/api/auth/status";
const LOGOUT_PATH: &str = "/api/auth/logout";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{url} - {status}, {message}")]
    Status {
        url: String,
        status: u16,
        message: String,
    },
    #[error("invalid API base URL: {0}")]
    BaseUrl(#[from] url::ParseError),
}

#[derive(Clone, Debug, Deserialize)]
pub struct SendCodeResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct VerifyCodeResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub session_token: Option<String>,
    #[serde(default)]
    pub redirect_url: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub authenticated: bool,
}

#[derive(Debug, Serialize)]
struct SendCodeRequest<'a> {
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct VerifyCodeRequest<'a> {
    email: &'a str,
    verification_code: &'a str,
}

/// The four operations the flow consumes. A seam so controller tests can
/// substitute a scripted backend for the HTTP one.
pub trait AuthBackend: Send + Sync + 'static {
    fn send_code(
        &self,
        email: &str,
    ) -> impl Future<Output = Result<SendCodeResponse, ApiError>> + Send;

    fn verify_code(
        &self,
        email: &str,
        code: &str,
    ) -> impl Future<Output = Result<VerifyCodeResponse, ApiError>> + Send;

    fn status(
        &self,
        token: &SecretString,
    ) -> impl Future<Output = Result<StatusResponse, ApiError>> + Send;

    fn logout(&self, token: &SecretString) -> impl Future<Output = Result<(), ApiError>> + Send;
}

/// Reqwest-backed implementation against the real backend.
#[derive(Clone, Debug)]
pub struct HttpBackend {
    client: reqwest::Client,
    base: Url,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let base = Url::parse(base_url)?;
        let client = reqwest::Client::builder()
            .user_agent(APP_USER_AGENT)
            .build()?;
        Ok(Self { client, base })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.base.join(path)?)
    }

    /// Map a non-success response to [`ApiError::Status`], pulling the
    /// backend's message out of the JSON body when there is one.
    async fn fail(url: &Url, response: reqwest::Response) -> ApiError {
        let status = response.status().as_u16();
        let message = response
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|body| body["message"].as_str().map(str::to_string))
            .unwrap_or_default();

        ApiError::Status {
            url: url.to_string(),
            status,
            message,
        }
    }
}

impl AuthBackend for HttpBackend {
    #[instrument(skip(self))]
    async fn send_code(&self, email: &str) -> Result<SendCodeResponse, ApiError> {
        let url = self.endpoint(SEND_CODE_PATH)?;
        let response = self
            .client
            .post(url.clone())
            .json(&SendCodeRequest { email })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::fail(&url, response).await);
        }

        Ok(response.json().await?)
    }

    // The code never reaches the logs.
    #[instrument(skip(self, code))]
    async fn verify_code(&self, email: &str, code: &str) -> Result<VerifyCodeResponse, ApiError> {
        let url = self.endpoint(LOGIN_PATH)?;
        let response = self
            .client
            .post(url.clone())
            .json(&VerifyCodeRequest {
                email,
                verification_code: code,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::fail(&url, response).await);
        }

        Ok(response.json().await?)
    }

    #[instrument(skip_all)]
    async fn status(&self, token: &SecretString) -> Result<StatusResponse, ApiError> {
        let url = self.endpoint(STATUS_PATH)?;
        let response = self
            .client
            .get(url.clone())
            .bearer_auth(token.expose_secret())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::fail(&url, response).await);
        }

        Ok(response.json().await?)
    }

    #[instrument(skip_all)]
    async fn logout(&self, token: &SecretString) -> Result<(), ApiError> {
        let url = self.endpoint(LOGOUT_PATH)?;
        let response = self
            .client
            .post(url.clone())
            .bearer_auth(token.expose_secret())
            .json(&json!({}))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::fail(&url, response).await);
        }

        debug!("session invalidated on the backend");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_join_against_the_base() {
        let backend = HttpBackend::new("http://backend.tld:8080").unwrap();
        assert_eq!(
            backend.endpoint(SEND_CODE_PATH).unwrap().as_str(),
            "http://backend.tld:8080/api/auth/send_code"
        );
        assert_eq!(
            backend.endpoint(STATUS_PATH).unwrap().as_str(),
            "http://backend.tld:8080/api/auth/status"
        );
    }

    #[test]
    fn rejects_an_unparsable_base_url() {
        assert!(matches!(
            HttpBackend::new("not a url"),
            Err(ApiError::BaseUrl(_))
        ));
    }

    #[test]
    fn responses_tolerate_missing_optional_fields() {
        let response: VerifyCodeResponse =
            serde_json::from_str(r#"{"success": false}"#).unwrap();
        assert!(!response.success);
        assert!(response.message.is_empty());
        assert!(response.session_token.is_none());

        let status: StatusResponse = serde_json::from_str("{}").unwrap();
        assert!(!status.authenticated);
    }
}
