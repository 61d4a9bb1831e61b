//! OAuth access-token lifecycle
//!
//! The token manager exchanges the long-lived refresh credential for a
//! short-lived access token and keeps at most one credential alive. Refresh is
//! lazy: it happens on the first request and whenever the held credential falls
//! outside the freshness margin. A failed refresh leaves the previous
//! credential untouched; retrying is the engine's job.

use chrono::{DateTime, Duration as TimeDelta, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{CollectorError, Result};

const CLIENT_ID: &str = "ownerapi";
const SCOPE: &str = "openid email offline_access";

/// Access token derived from the refresh credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessCredential {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessCredential {
    /// Freshness-margin check: stale once `expires_at` is older than `now - ttl`.
    ///
    /// This is intentionally not `now > expires_at`.
    /// A margin reaching past the representable time range never marks the credential stale.
    pub fn is_stale(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        TimeDelta::from_std(ttl)
            .ok()
            .and_then(|margin| now.checked_sub_signed(margin))
            .is_some_and(|threshold| self.expires_at < threshold)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_in: ExpiresIn,
}

/// `expires_in` arrives as a number from most servers, as a string from some
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ExpiresIn {
    Seconds(i64),
    Text(String),
}

impl ExpiresIn {
    fn seconds(&self) -> Option<i64> {
        match self {
            Self::Seconds(secs) => Some(*secs),
            Self::Text(raw) => raw.trim().parse().ok(),
        }
    }
}

/// Owns the single live credential for one collector instance
pub struct TokenManager {
    http: reqwest::Client,
    token_url: String,
    refresh_token: String,
    ttl: Duration,
    credential: Option<AccessCredential>,
}

impl TokenManager {
    /// `auth_url` must end with `/`
    pub fn new(http: reqwest::Client, auth_url: &str, refresh_token: impl Into<String>, ttl: Duration) -> Self {
        Self {
            http,
            token_url: format!("{}oauth2/v3/token", auth_url),
            refresh_token: refresh_token.into(),
            ttl,
            credential: None,
        }
    }

    /// Currently held credential, if any, without refreshing
    pub fn credential(&self) -> Option<&AccessCredential> {
        self.credential.as_ref()
    }

    /// Return a usable credential, refreshing it first when absent or stale
    pub async fn valid_access_token(&mut self) -> Result<&AccessCredential> {
        let now = Utc::now();
        let needs_refresh = self
            .credential
            .as_ref()
            .map_or(true, |credential| credential.is_stale(now, self.ttl));

        if needs_refresh {
            let fresh = self.refresh().await?;
            self.credential = Some(fresh);
        }

        self.credential
            .as_ref()
            .ok_or_else(|| CollectorError::Auth("no access credential available".to_string()))
    }

    /// One refresh exchange against the token endpoint, no retry
    async fn refresh(&self) -> Result<AccessCredential> {
        debug!("Refreshing access token");

        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", CLIENT_ID),
                ("refresh_token", self.refresh_token.as_str()),
                ("scope", SCOPE),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CollectorError::Auth(format!(
                "token endpoint returned {}",
                status.as_u16()
            )));
        }

        let body = response.text().await?;
        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| CollectorError::Auth(format!("malformed token response: {}", e)))?;
        let expires_at = token
            .expires_in
            .seconds()
            .and_then(TimeDelta::try_seconds)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            .ok_or_else(|| CollectorError::Auth("malformed token response: bad expires_in".to_string()))?;

        let credential = AccessCredential {
            access_token: token.access_token,
            refresh_token: token.refresh_token.unwrap_or_else(|| self.refresh_token.clone()),
            expires_at,
        };

        info!(expires_at = %credential.expires_at, "Access token refreshed");
        Ok(credential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential_expiring_at(expires_at: DateTime<Utc>) -> AccessCredential {
        AccessCredential {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at,
        }
    }

    #[test]
    fn test_fresh_credential_is_kept() {
        let now = Utc::now();
        let credential = credential_expiring_at(now + TimeDelta::hours(8));
        assert!(!credential.is_stale(now, Duration::from_secs(14_400)));
    }

    #[test]
    fn test_freshness_margin_is_a_lookback() {
        let now = Utc::now();
        let ttl = Duration::from_secs(3_600);

        // Nominally expired, but still inside the lookback window
        let recently_expired = credential_expiring_at(now - TimeDelta::minutes(30));
        assert!(!recently_expired.is_stale(now, ttl));

        let long_expired = credential_expiring_at(now - TimeDelta::minutes(61));
        assert!(long_expired.is_stale(now, ttl));
    }

    #[test]
    fn test_zero_ttl_degrades_to_expiry_check() {
        let now = Utc::now();
        assert!(credential_expiring_at(now - TimeDelta::seconds(1)).is_stale(now, Duration::ZERO));
        assert!(!credential_expiring_at(now + TimeDelta::seconds(1)).is_stale(now, Duration::ZERO));
    }

    #[test]
    fn test_out_of_range_ttl_keeps_credential() {
        let now = Utc::now();
        let credential = credential_expiring_at(now - TimeDelta::days(365));
        assert!(!credential.is_stale(now, Duration::from_secs(u64::MAX)));
        assert!(!credential.is_stale(now, Duration::from_secs(i64::MAX as u64 / 1_000)));
    }

    #[test]
    fn test_expires_in_accepts_number_or_string() {
        let parsed: TokenResponse =
            serde_json::from_str(r#"{"access_token":"a","refresh_token":"r","expires_in":28800}"#).unwrap();
        assert_eq!(parsed.expires_in.seconds(), Some(28_800));

        let parsed: TokenResponse = serde_json::from_str(r#"{"access_token":"a","expires_in":"300"}"#).unwrap();
        assert_eq!(parsed.expires_in.seconds(), Some(300));
        assert!(parsed.refresh_token.is_none());
    }

    #[test]
    fn test_new_manager_holds_no_credential() {
        let manager = TokenManager::new(reqwest::Client::new(), "http://auth.local/", "r", Duration::from_secs(60));
        assert!(manager.credential().is_none());
        assert_eq!(manager.token_url, "http://auth.local/oauth2/v3/token");
    }
}
