use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use crate::api::ApiError;

use super::Credential;

/// On-disk shape of the cached token.
#[derive(Debug, Serialize, Deserialize)]
struct TokenRecord {
    access_token: String,
    token_expiry: DateTime<Utc>,
}

/// Durable single-record token cache at one explicit path.
#[derive(Debug, Clone)]
pub struct TokenCache {
    path: PathBuf,
}

impl TokenCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the cached credential. Returns `Ok(None)` when no file exists;
    /// an unreadable or malformed file is `CacheUnavailable`. Expiry is not
    /// checked here.
    pub fn load(&self) -> Result<Option<Credential>, ApiError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.path).map_err(|e| {
            ApiError::CacheUnavailable(format!("read {}: {}", self.path.display(), e))
        })?;
        let record: TokenRecord = serde_json::from_str(&contents).map_err(|e| {
            ApiError::CacheUnavailable(format!("parse {}: {}", self.path.display(), e))
        })?;

        Ok(Some(Credential::new(record.access_token, record.token_expiry)))
    }

    pub fn save(&self, credential: &Credential) -> Result<(), ApiError> {
        let record = TokenRecord {
            access_token: credential.token.clone(),
            token_expiry: credential.expires_at,
        };
        let contents = serde_json::to_string_pretty(&record)
            .map_err(|e| ApiError::CacheUnavailable(e.to_string()))?;

        self.write(&contents).map_err(|e| {
            ApiError::CacheUnavailable(format!("write {}: {}", self.path.display(), e))
        })?;

        debug!(path = %self.path.display(), "Saved token cache");
        Ok(())
    }

    pub fn remove(&self) -> Result<(), ApiError> {
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|e| {
                ApiError::CacheUnavailable(format!("remove {}: {}", self.path.display(), e))
            })?;
        }
        Ok(())
    }

    fn write(&self, contents: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, contents)?;

        // The token grants account access; keep it owner-only
        #[cfg(unix)]
        {
            let mut perms = fs::metadata(&self.path)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(&self.path, perms)?;
        }

        Ok(())
    }
}
