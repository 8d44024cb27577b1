//! OAuth2 refresh-token exchange.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::Duration;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use syncline_core::{Clock, SystemClock};
use tracing::{debug, instrument, warn};

use crate::credential::OAuthCredential;
use crate::error::RefreshError;
use crate::http::{HttpRequest, HttpTransport};

/// Exchanges a refresh token for a new access token.
///
/// Implementations must not retry: a failed refresh ends the tenant's run.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, credential: &OAuthCredential) -> Result<OAuthCredential, RefreshError>;
}

/// Token endpoint response. Only `access_token` is required.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<i64>,
    refresh_token: Option<String>,
}

/// Client registration used for refresh requests.
pub struct OAuthClient {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: SecretString,
}

impl std::fmt::Debug for OAuthClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthClient")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

/// `grant_type=refresh_token` against a standard OAuth2 token endpoint.
///
/// The transport handed in should not retry; pass the plain transport, not a
/// [`RetryingTransport`](crate::retry::RetryingTransport).
pub struct OAuthRefresher {
    transport: Arc<dyn HttpTransport>,
    client: OAuthClient,
    clock: Arc<dyn Clock>,
    timeout: StdDuration,
}

impl OAuthRefresher {
    pub fn new(transport: Arc<dyn HttpTransport>, client: OAuthClient) -> Self {
        Self {
            transport,
            client,
            clock: Arc::new(SystemClock),
            timeout: StdDuration::from_secs(30),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: StdDuration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl TokenRefresher for OAuthRefresher {
    #[instrument(skip(self, credential), fields(connection_id = %credential.connection_id))]
    async fn refresh(&self, credential: &OAuthCredential) -> Result<OAuthCredential, RefreshError> {
        let refresh_token = credential
            .refresh_token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or(RefreshError::NoRefreshToken)?;

        let request = HttpRequest::post_form(
            self.client.token_url.clone(),
            [
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", self.client.client_id.as_str()),
                ("client_secret", self.client.client_secret.expose_secret()),
            ],
        )
        .timeout(self.timeout);

        let response = self.transport.send(request).await?;

        if response.status != 200 {
            warn!(status = response.status, "Token endpoint rejected refresh");
            return Err(RefreshError::Rejected {
                status: response.status,
                body: response.body,
            });
        }

        let parsed: Option<TokenResponse> = serde_json::from_str(&response.body).ok();
        let Some(TokenResponse {
            access_token: Some(access_token),
            expires_in,
            refresh_token: rotated,
        }) = parsed.filter(|t| t.access_token.as_deref().is_some_and(|a| !a.is_empty()))
        else {
            return Err(RefreshError::Rejected {
                status: response.status,
                body: response.body,
            });
        };

        let now = self.clock.now();
        let expires_at = match expires_in {
            None => None,
            Some(secs) => match Duration::try_seconds(secs)
                .and_then(|lifetime| now.checked_add_signed(lifetime))
            {
                Some(at) => Some(at),
                None => {
                    warn!(expires_in = secs, "Token endpoint returned an unusable expires_in");
                    return Err(RefreshError::Rejected {
                        status: response.status,
                        body: response.body,
                    });
                }
            },
        };

        debug!(
            expires_at = ?expires_at,
            rotated = rotated.is_some(),
            "Refreshed access token"
        );

        Ok(OAuthCredential {
            connection_id: credential.connection_id,
            access_token,
            refresh_token: rotated
                .filter(|t| !t.is_empty())
                .or_else(|| credential.refresh_token.clone()),
            expires_at,
            last_refreshed_at: Some(now),
        })
    }
}
