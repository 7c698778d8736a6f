use chrono::{DateTime, TimeDelta, Utc};

/// Seconds subtracted from the server-declared lifetime so a request never
/// starts on a token that expires while it is in flight.
pub const EXPIRY_MARGIN_SECS: i64 = 60;

/// An issued access token and the instant it stops being usable.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    pub fn new(token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expires_at,
        }
    }

    /// Build a credential from a token response received at `issued_at`.
    /// Returns `None` when the lifetime does not fit in a timestamp.
    pub fn issued(
        token: impl Into<String>,
        expires_in_secs: i64,
        issued_at: DateTime<Utc>,
    ) -> Option<Self> {
        let lifetime = TimeDelta::try_seconds(expires_in_secs.checked_sub(EXPIRY_MARGIN_SECS)?)?;
        let expires_at = issued_at.checked_add_signed(lifetime)?;
        Some(Self::new(token, expires_at))
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn time_until_expiry(&self) -> TimeDelta {
        self.expires_at - Utc::now()
    }

    /// First few characters of the token, for display
    pub fn masked(&self) -> String {
        let prefix: String = self.token.chars().take(10).collect();
        format!("{}...", prefix)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("token", &self.masked())
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
