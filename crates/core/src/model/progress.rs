use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::model::ids::{TenseId, UserId};
use crate::model::tense::{TenseDefinition, TenseStatus};

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressValueError {
    #[error("progress must be within 0..=100, got {0}")]
    OutOfRange(i64),
}

//
// ─── PERCENT ──────────────────────────────────────────────────────────────────
//

/// Integer percentage that is always within `0..=100`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Percent(u8);

impl Percent {
    pub const ZERO: Percent = Percent(0);
    pub const FULL: Percent = Percent(100);

    /// Creates a percentage, rejecting values above 100.
    ///
    /// # Errors
    ///
    /// Returns `ProgressValueError::OutOfRange` if `value > 100`.
    pub fn new(value: u8) -> Result<Self, ProgressValueError> {
        if value > 100 {
            return Err(ProgressValueError::OutOfRange(i64::from(value)));
        }
        Ok(Self(value))
    }

    /// Clamps any integer into `0..=100`.
    #[must_use]
    pub fn saturating(value: i64) -> Self {
        // clamp guarantees the cast is lossless
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let clamped = value.clamp(0, 100) as u8;
        Self(clamped)
    }

    #[must_use]
    pub fn value(self) -> u8 {
        self.0
    }

    #[must_use]
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub fn is_full(self) -> bool {
        self.0 == 100
    }
}

impl TryFrom<i64> for Percent {
    type Error = ProgressValueError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .map_err(|_| ProgressValueError::OutOfRange(value))
            .and_then(|v| {
                Percent::new(v).map_err(|_| ProgressValueError::OutOfRange(value))
            })
    }
}

impl From<Percent> for u8 {
    fn from(value: Percent) -> Self {
        value.0
    }
}

impl fmt::Debug for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

//
// ─── LOCAL RECORD ─────────────────────────────────────────────────────────────
//

/// Progress for one tense as held in the on-device snapshot.
///
/// `updated_at` is `None` until the record is mutated locally or accepts a
/// newer remote value during a merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenseProgress {
    pub id: TenseId,
    pub progress: Percent,
    pub status: TenseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl TenseProgress {
    /// Seed record for a catalog entry, never mutated.
    #[must_use]
    pub fn seeded(def: &TenseDefinition) -> Self {
        Self {
            id: def.id.clone(),
            progress: def.seed_progress,
            status: def.seed_status,
            updated_at: None,
        }
    }

    /// Returns a copy carrying new progress values stamped at `at`.
    #[must_use]
    pub fn updated(&self, progress: Percent, status: TenseStatus, at: DateTime<Utc>) -> Self {
        Self {
            id: self.id.clone(),
            progress,
            status,
            updated_at: Some(at),
        }
    }

    /// Remote-side representation of this record for `user_id`.
    ///
    /// Records never mutated locally are stamped with `fallback_at`.
    #[must_use]
    pub fn to_remote(&self, user_id: &UserId, fallback_at: DateTime<Utc>) -> RemoteProgressRecord {
        RemoteProgressRecord {
            user_id: user_id.clone(),
            tense_id: self.id.clone(),
            progress: self.progress,
            status: self.status,
            updated_at: self.updated_at.unwrap_or(fallback_at),
        }
    }
}

//
// ─── REMOTE RECORD ────────────────────────────────────────────────────────────
//

/// One `(user_id, tense_id)` row of the remote progress table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteProgressRecord {
    pub user_id: UserId,
    pub tense_id: TenseId,
    pub progress: Percent,
    pub status: TenseStatus,
    pub updated_at: DateTime<Utc>,
}
