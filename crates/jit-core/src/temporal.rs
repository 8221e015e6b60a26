//! # Temporal Types: UTC-Only Timestamps
//!
//! Defines `Timestamp`, a UTC-only instant truncated to seconds precision.
//! Activation windows, token lifetimes and condition evaluation all use it.
//!
//! Activation conditions render their bounds as `timestamp("...Z")`
//! literals, so the canonical text form is ISO8601 with a `Z` suffix and no
//! sub-second component. Sub-seconds are discarded at construction, which
//! keeps windows read back from a policy equal to the ones that were
//! written.

use chrono::{DateTime, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::JitError;

/// A UTC-only timestamp, truncated to seconds precision.
///
/// # Construction
///
/// - [`Timestamp::now()`]: current UTC time, truncated.
/// - [`Timestamp::from_utc()`]: from a `DateTime<Utc>`, truncating sub-seconds.
/// - [`Timestamp::parse()`]: from an ISO8601 string with `Z` suffix.
/// - [`Timestamp::parse_lenient()`]: from any RFC 3339 offset, converted to UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create a timestamp from the current UTC time, truncated to seconds.
    pub fn now() -> Self {
        Self(truncate_to_seconds(Utc::now()))
    }

    /// Create a timestamp from a `chrono::DateTime<Utc>`, truncating sub-seconds.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(truncate_to_seconds(dt))
    }

    /// Parse a timestamp from an RFC 3339 string.
    ///
    /// Only the `Z` suffix is accepted; explicit offsets, even `+00:00`,
    /// are rejected.
    pub fn parse(s: &str) -> Result<Self, JitError> {
        if !s.ends_with('Z') {
            return Err(JitError::InvalidArgument(format!(
                "timestamp must use Z suffix (UTC only), got: {s:?}"
            )));
        }
        Self::parse_lenient(s)
    }

    /// Parse a timestamp from an RFC 3339 string, accepting any offset and
    /// converting to UTC.
    pub fn parse_lenient(s: &str) -> Result<Self, JitError> {
        let dt = DateTime::parse_from_rfc3339(s)
            .map_err(|e| JitError::InvalidArgument(format!("invalid RFC 3339 timestamp {s:?}: {e}")))?;
        Ok(Self(truncate_to_seconds(dt.with_timezone(&Utc))))
    }

    /// Create a timestamp from a Unix epoch timestamp (seconds).
    pub fn from_epoch_secs(secs: i64) -> Result<Self, JitError> {
        let dt = DateTime::from_timestamp(secs, 0)
            .ok_or_else(|| JitError::InvalidArgument(format!("invalid Unix timestamp: {secs}")))?;
        Ok(Self(dt))
    }

    /// Access the inner `DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Returns the Unix epoch timestamp in seconds.
    pub fn epoch_secs(&self) -> i64 {
        self.0.timestamp()
    }

    /// Add a duration, failing on overflow.
    pub fn checked_add(&self, duration: Duration) -> Result<Self, JitError> {
        self.0
            .checked_add_signed(duration)
            .map(Self::from_utc)
            .ok_or_else(|| JitError::InvalidArgument(format!("{self} + {duration} overflows")))
    }

    /// Signed duration from `earlier` to `self`.
    pub fn since(&self, earlier: &Timestamp) -> Duration {
        self.0.signed_duration_since(earlier.0)
    }

    /// Render as ISO8601 with Z suffix (e.g., `2026-01-15T12:00:00Z`).
    pub fn to_iso8601(&self) -> String {
        self.0.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_iso8601())
    }
}

fn truncate_to_seconds(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.with_nanosecond(0).unwrap_or(dt)
}
