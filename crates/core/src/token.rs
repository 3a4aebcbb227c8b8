//! Session and OAuth2 token model.
//!
//! A [`Session`] is the payload of the encrypted session cookie. It carries at
//! most one [`StoredToken`], which is immutable once issued and replaced
//! wholesale on refresh.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// A bearer token as held in the session cookie.
///
/// Expiry is derived, not stored: `expires_at = created_at + expires_in`
/// (unix seconds). The authorization server reports `created_at` with its
/// grant payload; when it does not, issuance time is used.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub created_at: i64,
}

impl StoredToken {
    /// The instant this token stops being valid.
    pub fn expires_at(&self) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(self.created_at.saturating_add(self.expires_in))
            .unwrap_or(OffsetDateTime::UNIX_EPOCH)
    }

    /// Whether the token has expired as of `now`.
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires_at() <= now
    }
}

/// Raw grant payload returned by the authorization server token endpoint.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub created_at: Option<i64>,
}

impl TokenGrant {
    /// Convert a grant into a stored token.
    ///
    /// A refresh grant may omit the refresh token, in which case the previous
    /// one remains valid and is carried over.
    pub fn into_stored(self, previous_refresh: Option<&str>) -> crate::error::Result<StoredToken> {
        let refresh_token = self
            .refresh_token
            .or_else(|| previous_refresh.map(str::to_string))
            .ok_or_else(|| {
                crate::Error::InvalidGrant("grant carries no refresh token".to_string())
            })?;
        Ok(StoredToken {
            access_token: self.access_token,
            refresh_token,
            expires_in: self.expires_in.unwrap_or(0),
            created_at: self
                .created_at
                .unwrap_or_else(|| OffsetDateTime::now_utc().unix_timestamp()),
        })
    }
}

/// Per-browser session, serialized into the encrypted cookie.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    pub session_id: Uuid,
    #[serde(default)]
    pub token: Option<StoredToken>,
    /// Page to return to once the authorization flow completes.
    #[serde(default)]
    pub referrer: Option<String>,
}

impl Session {
    /// Create a fresh unauthenticated session.
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            token: None,
            referrer: None,
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_is_derived_from_creation() {
        let token = StoredToken {
            access_token: "a".into(),
            refresh_token: "r".into(),
            expires_in: 7200,
            created_at: 1_000_000,
        };
        assert_eq!(token.expires_at().unix_timestamp(), 1_007_200);

        let before = OffsetDateTime::from_unix_timestamp(1_007_199).unwrap();
        let after = OffsetDateTime::from_unix_timestamp(1_007_200).unwrap();
        assert!(!token.is_expired(before));
        assert!(token.is_expired(after));
    }

    #[test]
    fn refresh_grant_keeps_previous_refresh_token() {
        let grant = TokenGrant {
            access_token: "new".into(),
            refresh_token: None,
            expires_in: Some(3600),
            created_at: Some(42),
        };
        let token = grant.into_stored(Some("old-refresh")).unwrap();
        assert_eq!(token.refresh_token, "old-refresh");
        assert_eq!(token.created_at, 42);
    }

    #[test]
    fn grant_without_any_refresh_token_is_rejected() {
        let grant = TokenGrant {
            access_token: "new".into(),
            refresh_token: None,
            expires_in: None,
            created_at: None,
        };
        assert!(grant.into_stored(None).is_err());
    }
}
