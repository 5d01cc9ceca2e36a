//! Worker id canonicalization
//!
//! Worker ids are 13-digit national ids written as `DDDD-DDDD-DDDDD`.
//! Operators type them with or without separators, so input is stripped of
//! whitespace, dashes and dots before the digit check. Ids reported by the
//! remote API are not held to that check: older records carry legacy ids.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of digits in a worker id
pub const WORKER_ID_DIGITS: usize = 13;

/// Why a raw id was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkerIdError {
    #[error("worker id is empty")]
    Empty,

    #[error("worker id may only contain digits")]
    NonDigit,

    #[error("worker id must have 13 digits, got {0}")]
    WrongLength(usize),
}

/// Worker id, canonical (`DDDD-DDDD-DDDDD`) unless it came from the server
/// in another shape
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub struct WorkerId(String);

impl WorkerId {
    /// Canonicalize raw operator input
    pub fn parse(raw: &str) -> Result<Self, WorkerIdError> {
        let digits: String = raw
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-' && *c != '.')
            .collect();

        if digits.is_empty() {
            return Err(WorkerIdError::Empty);
        }
        if !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(WorkerIdError::NonDigit);
        }
        if digits.len() != WORKER_ID_DIGITS {
            return Err(WorkerIdError::WrongLength(digits.len()));
        }

        // ASCII digits only past this point, byte slicing is safe
        Ok(Self(format!(
            "{}-{}-{}",
            &digits[0..4],
            &digits[4..8],
            &digits[8..13]
        )))
    }

    /// Id as reported by the remote API
    ///
    /// Canonicalized when it parses, otherwise kept verbatim (trimmed).
    /// Only an empty id is rejected.
    pub fn from_wire(raw: &str) -> Result<Self, WorkerIdError> {
        match Self::parse(raw) {
            Ok(id) => Ok(id),
            Err(WorkerIdError::Empty) => Err(WorkerIdError::Empty),
            Err(_) => Ok(Self(raw.trim().to_string())),
        }
    }

    pub fn is_canonical(&self) -> bool {
        Self::parse(&self.0).is_ok_and(|id| id == *self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for WorkerId {
    type Err = WorkerIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl<'de> Deserialize<'de> for WorkerId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::from_wire(&raw).map_err(serde::de::Error::custom)
    }
}

impl From<WorkerId> for String {
    fn from(id: WorkerId) -> Self {
        id.0
    }
}
