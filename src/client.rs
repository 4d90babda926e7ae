//! HTTP client for the ERP backend.
//!
//! Attaches the session's bearer token to every call. A 401 triggers exactly
//! one refresh through `POST /auth/refresh` followed by a single replay of the
//! original request; if refreshing is impossible the session is cleared and
//! the user is sent back to the login page.

use std::sync::Arc;

use reqwest::{Method, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::config::ClientConfig;
use crate::errors::{ClientError, ClientResult};
use crate::models::user::{RefreshRequest, RefreshResponse};
use crate::navigator::{Navigator, LOGIN_PATH};
use crate::session::{keys, SessionStore};

const REFRESH_PATH: &str = "auth/refresh";

pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    session: Arc<dyn SessionStore>,
    navigator: Arc<dyn Navigator>,
    refresh_lock: Mutex<()>,
}

impl ApiClient {
    pub fn new(
        config: &ClientConfig,
        session: Arc<dyn SessionStore>,
        navigator: Arc<dyn Navigator>,
    ) -> ClientResult<Self> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            session,
            navigator,
            refresh_lock: Mutex::new(()),
        })
    }

    pub fn session(&self) -> &Arc<dyn SessionStore> {
        &self.session
    }

    pub fn navigator(&self) -> &Arc<dyn Navigator> {
        &self.navigator
    }

    fn url(&self, path: &str) -> ClientResult<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|err| ClientError::configuration(format!("invalid request path {path}: {err}")))
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let response = self.execute(Method::GET, path, None).await?;
        decode(response).await
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> ClientResult<T> {
        let body = serde_json::to_value(body)?;
        let response = self.execute(Method::POST, path, Some(body)).await?;
        decode(response).await
    }

    /// POST whose response body is irrelevant to the caller.
    pub async fn post_empty(&self, path: &str) -> ClientResult<()> {
        self.execute(Method::POST, path, None).await?;
        Ok(())
    }

    /// POST to an unauthenticated endpoint. A 401 here is a plain failure and
    /// never goes through the refresh path.
    pub async fn post_public<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> ClientResult<T> {
        let url = self.url(path)?;
        let response = self.http.post(url).json(body).send().await?;
        decode(check_status(response).await?).await
    }

    async fn execute(&self, method: Method, path: &str, body: Option<Value>) -> ClientResult<Response> {
        let url = self.url(path)?;
        let token = self.session.access_token();

        let response = self
            .send_once(method.clone(), url.clone(), body.as_ref(), token.as_deref())
            .await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return check_status(response).await;
        }

        tracing::debug!(path = %path, "access token rejected, refreshing");
        let fresh = self.refresh_access_token(token.as_deref()).await?;

        // Replayed once; a second 401 is final.
        let replayed = self.send_once(method, url, body.as_ref(), Some(&fresh)).await?;
        check_status(replayed).await
    }

    async fn send_once(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
        token: Option<&str>,
    ) -> ClientResult<Response> {
        let mut request = self.http.request(method, url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }

    async fn refresh_access_token(&self, rejected: Option<&str>) -> ClientResult<String> {
        let _guard = self.refresh_lock.lock().await;

        // Another request may have rotated the token while this one waited.
        if let Some(current) = self.session.access_token() {
            if Some(current.as_str()) != rejected {
                return Ok(current);
            }
        }

        let Some(refresh_token) = self.session.refresh_token() else {
            self.force_logout("no refresh token stored");
            return Err(ClientError::session_expired("no refresh token available"));
        };

        match self.request_refresh(refresh_token).await {
            Ok(refreshed) => {
                self.session.set(keys::ACCESS_TOKEN, refreshed.access_token.clone())?;
                if let Some(rotated) = refreshed.refresh_token {
                    self.session.set(keys::REFRESH_TOKEN, rotated)?;
                }
                tracing::debug!("access token refreshed");
                Ok(refreshed.access_token)
            }
            Err(err) => {
                tracing::warn!(error = %err, "token refresh failed");
                self.force_logout("token refresh failed");
                Err(ClientError::session_expired("token refresh failed"))
            }
        }
    }

    async fn request_refresh(&self, refresh_token: String) -> ClientResult<RefreshResponse> {
        let url = self.url(REFRESH_PATH)?;
        let response = self
            .http
            .post(url)
            .json(&RefreshRequest { refresh_token })
            .send()
            .await?;
        decode(check_status(response).await?).await
    }

    /// Clears every stored credential and sends the user to the login page.
    pub fn force_logout(&self, reason: &str) {
        tracing::info!(reason = %reason, "ending session");
        if let Err(err) = self.session.clear() {
            tracing::warn!(error = %err, "failed to clear session store");
        }
        self.navigator.replace(LOGIN_PATH);
    }
}

async fn check_status(response: Response) -> ClientResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
        .unwrap_or_else(|| {
            if body.is_empty() {
                status.canonical_reason().unwrap_or("request failed").to_string()
            } else {
                body
            }
        });

    Err(ClientError::status(status.as_u16(), message))
}

async fn decode<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
    let bytes = response.bytes().await?;
    let deserializer = &mut serde_json::Deserializer::from_slice(&bytes);
    serde_path_to_error::deserialize(deserializer)
        .map_err(|err| ClientError::decode(format!("{} (at `{}`)", err.inner(), err.path())))
}
