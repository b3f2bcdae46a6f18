use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::TenseId;
use crate::model::progress::Percent;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TenseError {
    #[error("invalid tense status: {0}")]
    InvalidStatus(String),
}

//
// ─── STATUS ───────────────────────────────────────────────────────────────────
//

/// Mastery state of a tense.
///
/// `Locked` and `Unlocked` are seed states from the catalog; `InProgress` and
/// `Mastered` are earned through practice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TenseStatus {
    Locked,
    Unlocked,
    InProgress,
    Mastered,
}

impl TenseStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TenseStatus::Locked => "LOCKED",
            TenseStatus::Unlocked => "UNLOCKED",
            TenseStatus::InProgress => "IN_PROGRESS",
            TenseStatus::Mastered => "MASTERED",
        }
    }

    /// Whether practice sessions may be started for a tense in this state.
    #[must_use]
    pub fn is_practicable(self) -> bool {
        !matches!(self, TenseStatus::Locked)
    }

    /// Status earned by reaching `progress` through practice.
    #[must_use]
    pub fn earned_for(progress: Percent) -> Self {
        if progress.is_full() {
            TenseStatus::Mastered
        } else {
            TenseStatus::InProgress
        }
    }
}

impl fmt::Display for TenseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TenseStatus {
    type Err = TenseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOCKED" => Ok(TenseStatus::Locked),
            "UNLOCKED" => Ok(TenseStatus::Unlocked),
            "IN_PROGRESS" => Ok(TenseStatus::InProgress),
            "MASTERED" => Ok(TenseStatus::Mastered),
            _ => Err(TenseError::InvalidStatus(s.to_owned())),
        }
    }
}

//
// ─── CATEGORY ─────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenseCategory {
    Present,
    Past,
    Future,
}

impl TenseCategory {
    pub const ALL: [TenseCategory; 3] = [
        TenseCategory::Present,
        TenseCategory::Past,
        TenseCategory::Future,
    ];

    /// Display label used by the product (Traditional Chinese).
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            TenseCategory::Present => "現在式",
            TenseCategory::Past => "過去式",
            TenseCategory::Future => "未來式",
        }
    }
}

//
// ─── DEFINITION ───────────────────────────────────────────────────────────────
//

/// Immutable catalog entry describing one tense and its seed progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenseDefinition {
    pub id: TenseId,
    pub name: &'static str,
    pub english_name: &'static str,
    pub category: TenseCategory,
    pub example: &'static str,
    pub seed_status: TenseStatus,
    pub seed_progress: Percent,
    pub formula: &'static str,
    pub definition: &'static str,
}
