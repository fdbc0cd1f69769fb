use reqwest::{Client, StatusCode};
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::error::{TwitchError, TwitchResult};
use crate::types::{Credentials, Metrics, OAuthResponse};

/// Header material for one authenticated Helix request.
#[derive(Debug, Clone)]
pub struct Authorization {
    pub client_id: String,
    pub bearer: String,
}

struct BearerToken {
    value: String,
    must_refresh: bool,
}

/// Owns the app access token and fetches a new one lazily through the
/// client credentials grant whenever the current one has been invalidated.
pub struct AuthManager {
    http: Client,
    token_url: String,
    credentials: Credentials,
    token: Mutex<BearerToken>,
    metrics: Metrics,
}

impl AuthManager {
    pub fn new(
        http: Client,
        token_url: impl Into<String>,
        credentials: Credentials,
        metrics: Metrics,
    ) -> Self {
        debug!(
            client_id_length = credentials.client_id.len(),
            client_secret_length = credentials.client_secret.len(),
            "initialising twitch auth"
        );
        Self {
            http,
            token_url: token_url.into(),
            credentials,
            token: Mutex::new(BearerToken {
                value: String::new(),
                must_refresh: true,
            }),
            metrics,
        }
    }

    /// Returns the cached token, running a grant first if a refresh is due.
    /// The lock is held across the grant so concurrent callers share it.
    pub async fn authorization(&self) -> TwitchResult<Authorization> {
        let mut token = self.token.lock().await;
        if token.must_refresh {
            token.value = self.grant().await?;
            token.must_refresh = false;
        }
        Ok(Authorization {
            client_id: self.credentials.client_id.clone(),
            bearer: token.value.clone(),
        })
    }

    /// Flags the token so the next `authorization` call re-acquires it.
    pub async fn invalidate(&self) {
        self.token.lock().await.must_refresh = true;
    }

    async fn grant(&self) -> TwitchResult<String> {
        let result = self.request_token().await;
        let outcome = if result.is_ok() { "success" } else { "failure" };
        self.metrics
            .oauth_grants_total
            .with_label_values(&[outcome])
            .inc();
        result
    }

    async fn request_token(&self) -> TwitchResult<String> {
        let form = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("grant_type", "client_credentials"),
        ];

        let response = self
            .http
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|err| {
                error!(error = %err, "OAuth grant failed");
                TwitchError::Transport(err)
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|err| {
            error!(error = %err, "OAuth grant failed");
            TwitchError::Transport(err)
        })?;

        if status != StatusCode::OK {
            error!(status = status.as_u16(), details = %body, "OAuth grant failed");
            return Err(TwitchError::AuthGrant { status });
        }

        let parsed: OAuthResponse = serde_json::from_str(&body).map_err(|err| {
            error!(error = %err, "OAuth grant failed");
            TwitchError::Decode(err)
        })?;

        Ok(parsed.access_token)
    }
}
