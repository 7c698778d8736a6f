use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info, warn};

use crate::api::client::check_response;
use crate::api::ApiError;
use crate::config::{ClientConfig, Environment};

use super::{Credential, TokenCache};

const TOKEN_PATH: &str = "/oauth2/tokenP";

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    grant_type: &'a str,
    appkey: &'a str,
    appsecret: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(deserialize_with = "seconds_from_number_or_string")]
    expires_in: i64,
}

/// KIS documents `expires_in` as a number but older gateways sent a string.
fn seconds_from_number_or_string<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Seconds {
        Number(i64),
        Text(String),
    }

    match Seconds::deserialize(deserializer)? {
        Seconds::Number(n) => Ok(n),
        Seconds::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Owns the access token for one app key and keeps it valid.
///
/// The token is loaded from the durable cache at construction, renewed
/// through the OAuth client-credentials endpoint when missing or expired,
/// and written back to the cache after every successful renewal.
pub struct SessionManager {
    config: ClientConfig,
    client: Client,
    cache: TokenCache,
    credential: Option<Credential>,
}

impl SessionManager {
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        let cache = TokenCache::new(config.token_path.clone());

        info!(
            environment = %config.environment,
            base_url = config.base_url(),
            "Initializing KIS session"
        );

        let mut session = Self {
            config,
            client,
            cache,
            credential: None,
        };
        session.load_cached();
        Ok(session)
    }

    /// Adopt the cached credential if one exists and has not expired.
    /// Any cache problem leaves the session without a credential.
    pub fn load_cached(&mut self) {
        match self.cache.load() {
            Ok(Some(credential)) if !credential.is_expired() => {
                info!(expires_at = %credential.expires_at, "Loaded valid token from cache");
                self.credential = Some(credential);
            }
            Ok(Some(credential)) => {
                debug!(expires_at = %credential.expires_at, "Cached token has expired");
            }
            Ok(None) => {
                debug!(path = %self.cache.path().display(), "No token cache file");
            }
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable token cache");
            }
        }
    }

    /// Renew the token unless the current one is still valid.
    pub async fn ensure_valid(&mut self) -> Result<(), ApiError> {
        if self.is_valid() {
            debug!("Existing token is valid");
            return Ok(());
        }
        debug!("Token missing or expired, renewing");
        self.renew().await
    }

    /// Exchange the app key/secret for a new token. On failure the session
    /// is left without a credential and the cause is returned.
    pub async fn renew(&mut self) -> Result<(), ApiError> {
        info!(environment = %self.config.environment, "Requesting access token");

        let credential = match self.request_token().await {
            Ok(credential) => credential,
            Err(e) => {
                self.credential = None;
                warn!(error = %e, "Access token request failed");
                return Err(ApiError::renewal(e));
            }
        };

        info!(expires_at = %credential.expires_at, "Access token issued");
        if let Err(e) = self.cache.save(&credential) {
            warn!(error = %e, "Failed to persist token cache");
        }
        self.credential = Some(credential);
        Ok(())
    }

    /// Forget the current token and delete the cache file.
    pub fn clear(&mut self) -> Result<(), ApiError> {
        self.credential = None;
        self.cache.remove()
    }

    async fn request_token(&self) -> Result<Credential, ApiError> {
        let url = format!("{}{}", self.config.base_url(), TOKEN_PATH);
        let body = TokenRequest {
            grant_type: "client_credentials",
            appkey: &self.config.app_key,
            appsecret: &self.config.app_secret,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await?;
        let response = check_response(response).await?;

        let text = response.text().await?;
        let parsed: TokenResponse = serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("token response: {}", e)))?;

        Credential::issued(parsed.access_token, parsed.expires_in, Utc::now()).ok_or_else(|| {
            ApiError::InvalidResponse(format!("expires_in out of range: {}", parsed.expires_in))
        })
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    /// Get the bearer token if one is held
    pub fn token(&self) -> Option<&str> {
        self.credential.as_ref().map(|c| c.token.as_str())
    }

    /// Check if a token is held and not expired
    pub fn is_valid(&self) -> bool {
        self.credential
            .as_ref()
            .map(|c| !c.is_expired())
            .unwrap_or(false)
    }

    pub fn environment(&self) -> Environment {
        self.config.environment
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub(crate) fn http(&self) -> &Client {
        &self.client
    }

    #[cfg(test)]
    pub(crate) fn set_credential(&mut self, credential: Option<Credential>) {
        self.credential = credential;
    }
}
