//! Bearer token session for the fleet backend
//!
//! The backend hands out short-lived bearer tokens in exchange for a
//! long-lived automation token (`POST /tokenlogin`). A [`Session`] performs
//! that exchange lazily, caches the result and tracks its expiry so callers
//! never hold a stale token for longer than the backend allows.

use std::time::{Duration, Instant};

use parking_lot::RwLock;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use url::Url;

use crate::client::endpoint_url;
use crate::error::{AuthError, ClientError, Result};

/// Tokens are refreshed this long before the backend would expire them
const EXPIRY_SKEW: Duration = Duration::from_secs(10);

/// A cached bearer token
#[derive(Clone)]
pub struct AuthToken {
    token: String,
    expires_at: Option<Instant>,
}

impl AuthToken {
    /// Build a token that expires `expires_in` after `issued_at`
    pub fn new(token: impl Into<String>, issued_at: Instant, expires_in: Option<Duration>) -> Self {
        Self {
            token: token.into(),
            expires_at: expires_in.map(|d| issued_at + d.saturating_sub(EXPIRY_SKEW)),
        }
    }

    /// The raw bearer token
    pub fn as_str(&self) -> &str {
        &self.token
    }

    /// Whether the token may still be used at `now`
    pub fn is_valid_at(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

impl std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthToken")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Serialize)]
struct TokenLoginRequest<'a> {
    token: &'a str,
}

#[derive(Deserialize)]
struct TokenLoginResponse {
    #[serde(rename = "userToken", default)]
    user_token: Option<UserToken>,
}

#[derive(Deserialize)]
struct UserToken {
    #[serde(default)]
    token: Option<String>,
    /// Lifetime in seconds
    #[serde(rename = "expiresIn", default)]
    expires_in: Option<u64>,
}

/// Authentication state for one run of the tool
pub struct Session {
    client: Client,
    login_url: Url,
    access_token: String,
    cached: RwLock<Option<AuthToken>>,
}

impl Session {
    /// Create a session that logs in against `base_url` with `access_token`
    pub fn new(client: Client, base_url: &Url, access_token: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client,
            login_url: endpoint_url(base_url, "/tokenlogin")?,
            access_token: access_token.into(),
            cached: RwLock::new(None),
        })
    }

    /// Return a valid bearer token, logging in if none is cached or the cached one expired
    #[instrument(skip(self))]
    pub async fn ensure_token(&self) -> Result<String> {
        if let Some(token) = self.cached.read().as_ref() {
            if token.is_valid_at(Instant::now()) {
                return Ok(token.as_str().to_string());
            }
            debug!("Cached bearer token expired");
        }

        let token = self.login().await?;
        let bearer = token.as_str().to_string();
        *self.cached.write() = Some(token);
        Ok(bearer)
    }

    /// Drop the cached token so the next call logs in again
    pub fn invalidate(&self) {
        self.cached.write().take();
    }

    /// Whether a token is currently cached (valid or not)
    pub fn has_token(&self) -> bool {
        self.cached.read().is_some()
    }

    async fn login(&self) -> Result<AuthToken> {
        info!("Logging in to {}", self.login_url);
        let issued_at = Instant::now();

        let response = self
            .client
            .post(self.login_url.clone())
            .json(&TokenLoginRequest {
                token: &self.access_token,
            })
            .send()
            .await
            .map_err(AuthError::Http)?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Rejected {
                status: status.as_u16(),
            }
            .into());
        }

        let body: TokenLoginResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))?;

        let user_token = body.user_token.ok_or(AuthError::MissingToken)?;
        let token = user_token
            .token
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken)?;

        Ok(AuthToken::new(
            token,
            issued_at,
            user_token.expires_in.map(Duration::from_secs),
        ))
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("login_url", &self.login_url.as_str())
            .field("cached", &self.cached.read())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_without_expiry_never_expires() {
        let now = Instant::now();
        let token = AuthToken::new("abc", now, None);
        assert!(token.is_valid_at(now + Duration::from_secs(86_400)));
    }

    #[test]
    fn test_token_expires_before_backend_deadline() {
        let now = Instant::now();
        let token = AuthToken::new("abc", now, Some(Duration::from_secs(300)));
        assert!(token.is_valid_at(now + Duration::from_secs(289)));
        assert!(!token.is_valid_at(now + Duration::from_secs(290)));
    }

    #[test]
    fn test_short_lifetime_is_immediately_stale() {
        let now = Instant::now();
        let token = AuthToken::new("abc", now, Some(Duration::from_secs(5)));
        assert!(!token.is_valid_at(now));
    }

    #[test]
    fn test_debug_redacts_token() {
        let token = AuthToken::new("very-secret", Instant::now(), None);
        assert!(!format!("{:?}", token).contains("very-secret"));
    }

    #[test]
    fn test_login_url_keeps_base_path() {
        let base = Url::parse("https://backend.example.com/api").unwrap();
        let session = Session::new(Client::new(), &base, "t").unwrap();
        assert_eq!(
            session.login_url.as_str(),
            "https://backend.example.com/api/tokenlogin"
        );
        assert!(!session.has_token());
    }
}
