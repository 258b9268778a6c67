//! API client for the finsight REST API.
//!
//! This module provides the `ApiClient` struct for calling the credential
//! endpoints (login, registration) and for issuing token-bearing requests on
//! behalf of the authorized request layer.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{header, Client, Method, RequestBuilder};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::config::Config;
use crate::models::{Credential, LoginGrant, Registration};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Credential endpoint, relative to the API base URL
const LOGIN_PATH: &str = "/auth/login";

/// Registration endpoint, relative to the API base URL
const REGISTER_PATH: &str = "/auth/register";

/// Maximum number of retries for rate-limited (429) requests.
/// 3 retries with exponential backoff usually succeeds without excessive delay.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Names of the two login request fields.
/// The remote contract has used both `username` and `email` for the identifier.
#[derive(Debug, Clone)]
struct LoginFields {
    identifier: String,
    secret: String,
}

/// API client for the finsight backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Arc<str>,
    fields: Arc<LoginFields>,
    initial_backoff: Duration,
}

impl ApiClient {
    /// Create a new API client from the user configuration
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: Arc::from(config.api_base()),
            fields: Arc::new(LoginFields {
                identifier: config.login_identifier_field.clone(),
                secret: config.login_secret_field.clone(),
            }),
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        })
    }

    /// Shorten the rate-limit backoff (used against local mock servers).
    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Exchange a credential for a session token and identity.
    pub async fn login(&self, credential: &Credential) -> Result<LoginGrant, ApiError> {
        let mut body = Map::new();
        body.insert(
            self.fields.identifier.clone(),
            Value::String(credential.identifier.trim().to_string()),
        );
        body.insert(
            self.fields.secret.clone(),
            Value::String(credential.secret.clone()),
        );

        let response = self
            .client
            .post(self.url(LOGIN_PATH))
            .header(header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        response
            .json::<LoginGrant>()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse login response: {}", e)))
    }

    /// Create an account. Does not sign the user in.
    pub async fn register(&self, registration: &Registration) -> Result<(), ApiError> {
        let mut body = Map::new();
        body.insert("name".to_string(), Value::String(registration.name.trim().to_string()));
        body.insert(
            self.fields.identifier.clone(),
            Value::String(registration.identifier.trim().to_string()),
        );
        body.insert(
            self.fields.secret.clone(),
            Value::String(registration.secret.clone()),
        );

        let response = self
            .client
            .post(self.url(REGISTER_PATH))
            .header(header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await?;

        Self::check_response(response).await?;
        Ok(())
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    fn request(&self, method: Method, path: &str, token: Option<&str>) -> RequestBuilder {
        let builder = self
            .client
            .request(method, self.url(path))
            .header(header::ACCEPT, "application/json");
        match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send a request with an optional bearer token, retrying on 429.
    pub async fn send_json<T, B>(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<&B>,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let mut retries = 0;
        let mut backoff = self.initial_backoff;

        loop {
            let mut builder = self.request(method.clone(), path, token);
            if let Some(body) = body {
                builder = builder.json(body);
            }
            let response = builder.send().await?;

            if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
                retries += 1;
                if retries > MAX_RATE_LIMIT_RETRIES {
                    return Err(ApiError::RateLimited);
                }
                warn!(path = path, retry = retries, backoff_ms = backoff.as_millis() as u64, "Rate limited, backing off");
                tokio::time::sleep(backoff).await;
                backoff *= 2; // Exponential backoff
                continue;
            }

            let response = Self::check_response(response).await?;
            debug!(%method, path = path, "Request succeeded");

            // Empty bodies (204, DELETE) deserialize as JSON null
            let bytes = response.bytes().await?;
            let parsed = if bytes.is_empty() {
                serde_json::from_value(Value::Null)
            } else {
                serde_json::from_slice(&bytes)
            };
            return parsed.map_err(|e| {
                ApiError::InvalidResponse(format!("Failed to parse JSON response from {}: {}", path, e))
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(url: &str) -> ApiClient {
        let config = Config {
            api_url: url.to_string(),
            ..Config::default()
        };
        ApiClient::new(&config).unwrap()
    }

    #[test]
    fn test_url_joining() {
        let api = client("http://localhost:8000/");
        assert_eq!(api.base_url(), "http://localhost:8000");
        assert_eq!(api.url("/auth/login"), "http://localhost:8000/auth/login");
        assert_eq!(api.url("movimientos/"), "http://localhost:8000/movimientos/");
    }
}
