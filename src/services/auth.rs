use std::sync::Arc;

use crate::client::ApiClient;
use crate::errors::{ClientError, ClientResult};
use crate::models::user::{AuthResponse, LoginRequest, UserProfile};
use crate::navigator::LOGIN_PATH;
use crate::services::permissions::Invalidate;
use crate::session::keys;

const LOGIN_ENDPOINT: &str = "auth/login";
const LOGOUT_ENDPOINT: &str = "auth/logout";

pub struct AuthService {
    client: Arc<ApiClient>,
    cache: Option<Arc<dyn Invalidate>>,
}

impl AuthService {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client, cache: None }
    }

    /// Cache to drop whenever the session changes hands.
    pub fn with_cache(mut self, cache: Arc<dyn Invalidate>) -> Self {
        self.cache = Some(cache);
        self
    }

    fn invalidate(&self) {
        if let Some(cache) = &self.cache {
            cache.invalidate();
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> ClientResult<UserProfile> {
        let email = email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(ClientError::validation("a valid email is required"));
        }
        if password.is_empty() {
            return Err(ClientError::validation("password is required"));
        }

        let response: AuthResponse = self
            .client
            .post_public(
                LOGIN_ENDPOINT,
                &LoginRequest {
                    email: email.to_string(),
                    password: password.to_string(),
                },
            )
            .await?;

        let session = self.client.session();
        session.clear()?;
        session.set(keys::ACCESS_TOKEN, response.access_token)?;
        session.set(keys::REFRESH_TOKEN, response.refresh_token)?;
        session.set(keys::USER, serde_json::to_string(&response.user)?)?;
        self.invalidate();

        tracing::info!(user_id = %response.user.id, "logged in");
        Ok(response.user)
    }

    /// Ends the session locally even when the backend cannot be told about it.
    pub async fn logout(&self) -> ClientResult<()> {
        if self.client.session().access_token().is_some() {
            if let Err(err) = self.client.post_empty(LOGOUT_ENDPOINT).await {
                tracing::warn!(error = %err, "backend logout failed");
            }
        }

        self.client.session().clear()?;
        self.invalidate();
        self.client.navigator().replace(LOGIN_PATH);
        tracing::info!("logged out");
        Ok(())
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        self.client.session().user()
    }

    pub fn is_authenticated(&self) -> bool {
        self.client.session().access_token().is_some()
    }
}
