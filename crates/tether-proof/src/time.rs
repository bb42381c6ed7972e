//! Issuance/expiry window validation.
//!
//! All comparisons are in whole epoch seconds. Checks run in a fixed order
//! and the first failure wins for a given object; callers validating several
//! objects accumulate the failures themselves.

use serde::{Deserialize, Serialize};
use tether_core::{ErrorCode, Timestamp};

pub const DEFAULT_MAX_CLOCK_SKEW_SECONDS: u64 = 120;
pub const DEFAULT_MAX_PROOF_AGE_SECONDS: u64 = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimePolicy {
    pub max_clock_skew_seconds: u64,
    pub max_proof_age_seconds: u64,
}

impl Default for TimePolicy {
    fn default() -> Self {
        Self {
            max_clock_skew_seconds: DEFAULT_MAX_CLOCK_SKEW_SECONDS,
            max_proof_age_seconds: DEFAULT_MAX_PROOF_AGE_SECONDS,
        }
    }
}

/// Outcome of a time-range validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeCheck {
    pub valid: bool,
    pub error_code: Option<ErrorCode>,
}

impl TimeCheck {
    const VALID: TimeCheck = TimeCheck {
        valid: true,
        error_code: None,
    };

    fn fail(code: ErrorCode) -> Self {
        Self {
            valid: false,
            error_code: Some(code),
        }
    }
}

impl TimePolicy {
    pub fn validate_time_range(&self, issued_at: Timestamp, expires_at: Timestamp) -> TimeCheck {
        self.validate_time_range_at(issued_at, expires_at, Timestamp::now())
    }

    /// 1. `expires_at` strictly after `issued_at`, else `INVALID_TIME_RANGE`
    /// 2. `issued_at <= now + skew`, else `FUTURE_ISSUED_AT`
    /// 3. `expires_at >= now - skew`, else `EXPIRED`
    /// 4. `now - issued_at <= max age`, else `PROOF_TOO_OLD`
    pub fn validate_time_range_at(
        &self,
        issued_at: Timestamp,
        expires_at: Timestamp,
        now: Timestamp,
    ) -> TimeCheck {
        let issued = issued_at.seconds_since_epoch;
        let expires = expires_at.seconds_since_epoch;
        let now = now.seconds_since_epoch;
        let skew = self.max_clock_skew_seconds;

        if expires <= issued {
            return TimeCheck::fail(ErrorCode::InvalidTimeRange);
        }
        if issued > now.saturating_add(skew) {
            return TimeCheck::fail(ErrorCode::FutureIssuedAt);
        }
        if expires < now.saturating_sub(skew) {
            return TimeCheck::fail(ErrorCode::Expired);
        }
        if now.saturating_sub(issued) > self.max_proof_age_seconds {
            return TimeCheck::fail(ErrorCode::ProofTooOld);
        }
        TimeCheck::VALID
    }

    /// Validate wire timestamps. Unparseable input is
    /// `INVALID_TIMESTAMP_FORMAT` before any window check runs.
    pub fn validate_wire_at(&self, issued_at: &str, expires_at: &str, now: Timestamp) -> TimeCheck {
        match (Timestamp::parse_wire(issued_at), Timestamp::parse_wire(expires_at)) {
            (Some(issued), Some(expires)) => self.validate_time_range_at(issued, expires, now),
            _ => TimeCheck::fail(ErrorCode::InvalidTimestampFormat),
        }
    }
}
