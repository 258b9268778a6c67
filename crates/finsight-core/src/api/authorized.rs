//! Outbound request layer for authenticated calls.
//!
//! Every request reads the current session token from the `AuthSession`,
//! attaches it as a bearer credential when present, and reports an
//! authorization rejection (HTTP 401) back to the session exactly once.

use reqwest::Method;
use serde::{de::DeserializeOwned, Serialize};
use tracing::warn;

use crate::auth::AuthSession;
use crate::models::Summary;

use super::{ApiClient, ApiError};

/// Ledger summary endpoint shown on the dashboard
const SUMMARY_PATH: &str = "/movimientos/estadisticas/resumen";

/// Token-bearing API access. Clone is cheap; both halves are shared handles.
#[derive(Clone)]
pub struct AuthorizedClient {
    api: ApiClient,
    session: AuthSession,
}

impl AuthorizedClient {
    pub fn new(api: ApiClient, session: AuthSession) -> Self {
        Self { api, session }
    }

    pub fn session(&self) -> &AuthSession {
        &self.session
    }

    async fn send<T, B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        // Held only for the duration of this request
        let token = self.session.token();
        let result = self
            .api
            .send_json(method.clone(), path, token.as_deref(), body)
            .await;

        if let Err(ref e) = result {
            if e.is_authorization_rejection() {
                warn!(%method, path = path, "Authorization rejected, ending session");
                self.session.invalidate();
            }
        }
        result
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send::<T, ()>(Method::GET, path, None).await
    }

    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send(Method::POST, path, Some(body)).await
    }

    /// Fetch the ledger totals for the dashboard
    pub async fn fetch_summary(&self) -> Result<Summary, ApiError> {
        self.get(SUMMARY_PATH).await
    }
}
