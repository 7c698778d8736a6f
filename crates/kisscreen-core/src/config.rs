//! Client configuration.
//!
//! This module holds the values a KIS client needs at construction:
//! the app key/secret pair, the account and HTS identifiers, the
//! selected [`Environment`], and the location of the durable token cache.
//!
//! Values are normally read from the process environment (after a `.env`
//! file has been loaded by the frontend). The token cache lives at
//! `~/.cache/kisscreen/token-<environment>.json` unless `KIS_TOKEN_PATH`
//! says otherwise. Practice and production tokens are not interchangeable,
//! so each environment gets its own file.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// Application name used for the cache directory path
const APP_NAME: &str = "kisscreen";

/// Token cache file name prefix; the environment label is appended
const TOKEN_FILE_PREFIX: &str = "token";

/// HTTP request timeout in seconds, applied to both token and search calls.
const DEFAULT_TIMEOUT_SECS: u64 = 10;

const PRODUCTION_BASE_URL: &str = "https://openapi.koreainvestment.com:9443";
const PRACTICE_BASE_URL: &str = "https://openapivts.koreainvestment.com:29443";

/// Transaction ids for the condition search call. The practice server
/// expects its own id even though the endpoint is the same.
const PRODUCTION_SCREEN_TR_ID: &str = "HHKST03900400";
const PRACTICE_SCREEN_TR_ID: &str = "VHKST03900400";

/// Which KIS server a client talks to. Fixed for the lifetime of a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    /// Mock trading server (모의투자)
    #[default]
    Practice,
    /// Real trading server (실서버)
    Production,
}

impl Environment {
    pub fn from_is_prod(is_prod: bool) -> Self {
        if is_prod {
            Environment::Production
        } else {
            Environment::Practice
        }
    }

    pub fn base_url(&self) -> &'static str {
        match self {
            Environment::Production => PRODUCTION_BASE_URL,
            Environment::Practice => PRACTICE_BASE_URL,
        }
    }

    /// `tr_id` header value for the condition search endpoint
    pub fn screen_tr_id(&self) -> &'static str {
        match self {
            Environment::Production => PRODUCTION_SCREEN_TR_ID,
            Environment::Practice => PRACTICE_SCREEN_TR_ID,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Environment::Production => "production",
            Environment::Practice => "practice",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Parse the `KIS_IS_PROD` style flag. Accepts `true`, `1` and `t`
/// in any case; everything else means practice.
pub fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1" | "t")
}

#[derive(Clone)]
pub struct ClientConfig {
    pub app_key: String,
    pub app_secret: String,
    /// Accepted for completeness; the condition search does not use it.
    pub account_number: String,
    pub hts_user_id: String,
    pub environment: Environment,
    pub token_path: PathBuf,
    pub timeout: Duration,
    base_url: Option<String>,
    screen_tr_id: Option<String>,
}

impl ClientConfig {
    pub fn new(
        app_key: impl Into<String>,
        app_secret: impl Into<String>,
        account_number: impl Into<String>,
        hts_user_id: impl Into<String>,
        environment: Environment,
        token_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            app_key: app_key.into(),
            app_secret: app_secret.into(),
            account_number: account_number.into(),
            hts_user_id: hts_user_id.into(),
            environment,
            token_path: token_path.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            base_url: None,
            screen_tr_id: None,
        }
    }

    /// Build a config from `KIS_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let app_key = required_var("KIS_APP_KEY")?;
        let app_secret = required_var("KIS_APP_SECRET")?;
        let account_number = required_var("KIS_ACCOUNT_NUMBER")?;
        let hts_user_id = required_var("KIS_HTS_USER_ID")?;

        let is_prod = std::env::var("KIS_IS_PROD")
            .map(|v| parse_flag(&v))
            .unwrap_or(false);
        let environment = Environment::from_is_prod(is_prod);

        let token_path = match std::env::var("KIS_TOKEN_PATH") {
            Ok(path) if !path.trim().is_empty() => PathBuf::from(path),
            _ => default_token_path(environment)?,
        };

        let mut config = Self::new(
            app_key,
            app_secret,
            account_number,
            hts_user_id,
            environment,
            token_path,
        );

        if let Ok(secs) = std::env::var("KIS_TIMEOUT_SECS") {
            let secs: u64 = secs
                .trim()
                .parse()
                .with_context(|| format!("KIS_TIMEOUT_SECS is not a number: {}", secs))?;
            config.timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Point the client at a different server (e.g. a local mock).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into().trim_end_matches('/').to_string());
        self
    }

    pub fn with_token_path(mut self, token_path: impl Into<PathBuf>) -> Self {
        self.token_path = token_path.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the condition search `tr_id` for this environment.
    pub fn with_screen_tr_id(mut self, tr_id: impl Into<String>) -> Self {
        self.screen_tr_id = Some(tr_id.into());
        self
    }

    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.environment.base_url())
    }

    pub fn screen_tr_id(&self) -> &str {
        self.screen_tr_id
            .as_deref()
            .unwrap_or_else(|| self.environment.screen_tr_id())
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("app_key", &self.app_key)
            .field("app_secret", &"<redacted>")
            .field("account_number", &self.account_number)
            .field("hts_user_id", &self.hts_user_id)
            .field("environment", &self.environment)
            .field("token_path", &self.token_path)
            .field("timeout", &self.timeout)
            .field("base_url", &self.base_url())
            .finish()
    }
}

/// Default location of the token cache,
/// `<cache dir>/kisscreen/token-<environment>.json`.
pub fn default_token_path(environment: Environment) -> Result<PathBuf> {
    let cache_dir =
        dirs::cache_dir().ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
    Ok(cache_dir.join(APP_NAME).join(token_file_name(environment)))
}

fn token_file_name(environment: Environment) -> String {
    format!("{}-{}.json", TOKEN_FILE_PREFIX, environment.label())
}

fn required_var(name: &str) -> Result<String> {
    let value = std::env::var(name)
        .with_context(|| format!("Missing required environment variable {}", name))?;
    if value.trim().is_empty() {
        anyhow::bail!("Environment variable {} is empty", name);
    }
    Ok(value)
}
