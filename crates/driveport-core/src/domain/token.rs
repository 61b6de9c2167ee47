//! OAuthToken domain value
//!
//! An issued token never changes. Refreshing produces a new [`OAuthToken`];
//! the caller owns the active instance and its persistence.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Fraction of the declared lifespan during which a token is used as-is.
pub const DEFAULT_REFRESH_FRACTION: f64 = 0.5;

/// Longest lifespan accepted from a token endpoint or a persisted token: 90 days
pub const MAX_TOKEN_LIFESPAN_SECS: i64 = 90 * 24 * 60 * 60;

/// Converts a declared lifespan in seconds into a [`Duration`]
///
/// Returns `None` unless `0 < secs <= MAX_TOKEN_LIFESPAN_SECS`.
pub fn lifespan_from_secs(secs: i64) -> Option<Duration> {
    if secs <= 0 || secs > MAX_TOKEN_LIFESPAN_SECS {
        return None;
    }
    Duration::try_seconds(secs)
}

/// OAuth2 bearer token with the metadata needed to judge its freshness
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthToken {
    access_token: String,
    /// Empty when the provider never issued one
    refresh_token: String,
    acquired: DateTime<Utc>,
    #[serde(with = "lifespan_secs")]
    lifespan: Duration,
}

impl OAuthToken {
    /// Creates a token issued at `acquired` and valid for `lifespan`
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        acquired: DateTime<Utc>,
        lifespan: Duration,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            acquired,
            lifespan,
        }
    }

    /// Bearer credential sent in the `Authorization` header
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Credential exchanged for a new access token
    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }

    /// When the token was issued
    pub fn acquired(&self) -> DateTime<Utc> {
        self.acquired
    }

    /// Total validity declared by the server
    pub fn lifespan(&self) -> Duration {
        self.lifespan
    }

    /// Half of the declared lifespan
    pub fn halflife(&self) -> Duration {
        self.lifespan / 2
    }

    /// When the server considers the token expired
    ///
    /// `None` if the instant is out of range.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.acquired.checked_add_signed(self.lifespan)
    }

    /// Returns true if a refresh token is available
    pub fn can_refresh(&self) -> bool {
        !self.refresh_token.is_empty()
    }

    /// The instant after which the token must be refreshed before use
    ///
    /// `None` if the instant is out of range; such a token is never fresh.
    pub fn refresh_threshold(&self, fraction: f64) -> Option<DateTime<Utc>> {
        let millis = (self.lifespan.num_milliseconds() as f64 * fraction) as i64;
        self.acquired
            .checked_add_signed(Duration::try_milliseconds(millis)?)
    }

    /// Returns true while `now` is before the half-life threshold
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        self.acquired
            .checked_add_signed(self.halflife())
            .is_some_and(|threshold| now < threshold)
    }

    /// Returns true while `now` is before the given fraction of the lifespan
    pub fn is_fresh_with(&self, now: DateTime<Utc>, fraction: f64) -> bool {
        self.refresh_threshold(fraction)
            .is_some_and(|threshold| now < threshold)
    }
}

impl fmt::Debug for OAuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthToken")
            .field("access_token", &"<redacted>")
            .field("has_refresh_token", &self.can_refresh())
            .field("acquired", &self.acquired)
            .field("lifespan_secs", &self.lifespan.num_seconds())
            .finish()
    }
}

mod lifespan_secs {
    use chrono::Duration;
    use serde::{de, Deserialize, Deserializer, Serializer};

    use super::{lifespan_from_secs, MAX_TOKEN_LIFESPAN_SECS};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(value.num_seconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = i64::deserialize(deserializer)?;
        lifespan_from_secs(secs).ok_or_else(|| {
            de::Error::custom(format!(
                "lifespan {secs}s outside 1..={MAX_TOKEN_LIFESPAN_SECS}s"
            ))
        })
    }
}
