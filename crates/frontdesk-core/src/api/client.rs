//! API client for the application backend.
//!
//! `ApiClient` centralizes request dispatch. Each request gets the current
//! session's bearer token at send time, and a 401 is answered with one token
//! refresh followed by one retry of the original request.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{header, Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::error::server_message;
use super::{friendly_message, ApiResponse, HttpError, PendingRequest};
use crate::auth::{AuthPayload, LoginError, LoginResult, SessionManager};
use crate::config::Config;

// ============================================================================
// Constants
// ============================================================================

/// Login endpoint, relative to the base URL
pub const LOGIN_PATH: &str = "/auth/login";

/// Token refresh endpoint, relative to the base URL
pub const REFRESH_PATH: &str = "/auth/refresh";

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    #[serde(default)]
    token: String,
}

/// API client bound to one session.
/// Clone is cheap - clones share the connection pool, the session and the
/// refresh gate.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    session: SessionManager,
    // Held while a refresh is in flight so concurrent 401s share it
    refresh_gate: Arc<Mutex<()>>,
}

impl ApiClient {
    /// Create a client from the application config
    pub fn new(config: &Config, session: SessionManager) -> Result<Self, HttpError> {
        Self::with_base_url(
            &config.api_url,
            Duration::from_secs(config.timeout_secs),
            session,
        )
    }

    pub fn with_base_url(
        base_url: &str,
        timeout: Duration,
        session: SessionManager,
    ) -> Result<Self, HttpError> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(HttpError::Configuration("base URL is required".into()));
        }

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| HttpError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            session,
            refresh_gate: Arc::new(Mutex::new(())),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }

    /// Send one attempt of a request with the given token
    async fn dispatch(
        &self,
        request: &PendingRequest,
        token: Option<&str>,
    ) -> Result<reqwest::Response, reqwest::Error> {
        let url = self.url(&request.path);
        debug!(method = %request.method, url = %url, retried = request.is_retried(), "Dispatching request");

        let mut builder = self.client.request(request.method.clone(), &url);
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }
        builder.send().await
    }

    /// Send a request through the interceptors.
    ///
    /// A 401 on a request that carried a token and has not been retried
    /// refreshes the token and re-issues the request once; that second
    /// outcome is final.
    pub async fn send(&self, mut request: PendingRequest) -> Result<ApiResponse, HttpError> {
        loop {
            let token = self.session.token();
            let response = self.dispatch(&request, token.as_deref()).await?;
            let status = response.status();

            if status.is_success() {
                return ApiResponse::read(response).await;
            }

            if status == StatusCode::UNAUTHORIZED && request.may_refresh() {
                if let Some(ref failed_token) = token {
                    request.mark_retried();
                    self.refresh(failed_token).await?;
                    continue;
                }
            }

            let err = HttpError::from_response(response).await;
            debug!(status = status.as_u16(), error = %err, "Request failed");
            return Err(err);
        }
    }

    /// Refresh the session token after `failed_token` was rejected.
    ///
    /// Only one refresh runs at a time. A caller that gets the gate after
    /// another caller already replaced `failed_token` reuses the new token,
    /// and one that finds the session gone reports it expired. A refreshed
    /// token is dropped if the session was logged out or replaced meanwhile.
    async fn refresh(&self, failed_token: &str) -> Result<(), HttpError> {
        let _gate = self.refresh_gate.lock().await;

        match self.session.token() {
            None => return Err(HttpError::AuthExpired { source: None }),
            Some(current) if current != failed_token => {
                debug!("Token already refreshed by a concurrent request");
                return Ok(());
            }
            Some(_) => {}
        }

        match self.request_refresh(failed_token).await {
            Ok(token) => {
                if self.session.update_token(failed_token, &token) {
                    info!("Token refreshed");
                    Ok(())
                } else if self.session.token().is_some() {
                    debug!("Session replaced during refresh; retrying with its token");
                    Ok(())
                } else {
                    debug!("Session ended during refresh; dropping new token");
                    Err(HttpError::AuthExpired { source: None })
                }
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed");
                self.session.expire();
                Err(HttpError::AuthExpired {
                    source: Some(Box::new(e)),
                })
            }
        }
    }

    async fn request_refresh(&self, token: &str) -> Result<String, HttpError> {
        let request = PendingRequest::post(REFRESH_PATH).without_refresh();
        let response = self.dispatch(&request, Some(token)).await?;
        if !response.status().is_success() {
            return Err(HttpError::from_response(response).await);
        }

        let body: RefreshResponse = ApiResponse::read(response).await?.json()?;
        if body.token.is_empty() {
            return Err(HttpError::Decode(
                "refresh response did not include a token".into(),
            ));
        }
        Ok(body.token)
    }

    /// Post credentials to the login endpoint. Only a 200 carrying a token
    /// counts as success; the session itself is not touched here.
    pub async fn authenticate(&self, email: &str, password: &str) -> LoginResult {
        let request = PendingRequest::post(LOGIN_PATH)
            .json(json!({ "email": email, "password": password }))
            .without_refresh();

        let token = self.session.token();
        let response = self.dispatch(&request, token.as_deref()).await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = server_message(&body)
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| friendly_message(status.as_u16(), None));
            return Err(LoginError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        if status != StatusCode::OK {
            debug!(status = status.as_u16(), "Login answered with non-200 success");
            return Err(LoginError::UnexpectedResponse);
        }

        let body = response.bytes().await?;
        let payload: AuthPayload =
            serde_json::from_slice(&body).map_err(|_| LoginError::UnexpectedResponse)?;
        if payload.token.is_empty() {
            return Err(LoginError::UnexpectedResponse);
        }
        Ok(payload)
    }

    // ===== Convenience verbs =====

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, HttpError> {
        self.send(PendingRequest::get(path)).await?.json()
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, HttpError> {
        let body = serde_json::to_value(body).map_err(|e| HttpError::Decode(e.to_string()))?;
        self.send(PendingRequest::post(path).json(body)).await?.json()
    }

    pub async fn put<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, HttpError> {
        let body = serde_json::to_value(body).map_err(|e| HttpError::Decode(e.to_string()))?;
        self.send(PendingRequest::put(path).json(body)).await?.json()
    }

    pub async fn patch<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, HttpError> {
        let body = serde_json::to_value(body).map_err(|e| HttpError::Decode(e.to_string()))?;
        self.send(PendingRequest::patch(path).json(body)).await?.json()
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, HttpError> {
        self.send(PendingRequest::delete(path)).await?.json()
    }
}
