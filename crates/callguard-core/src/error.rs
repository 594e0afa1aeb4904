// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Error types for the admission-control engine.
//!
//! The taxonomy deliberately separates *errors* from *denials*: a call that
//! is refused for quota or compliance reasons is a successful evaluation
//! whose [`Decision`](crate::types::Decision) carries `allow = false`.
//! Errors are reserved for conditions where no trustworthy decision could be
//! produced — and in that case the caller must treat the call as denied
//! (fail closed), never as allowed.

use thiserror::Error;
use uuid::Uuid;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, GateError>;

/// Failures raised by a [`Storage`](crate::storage::Storage) backend.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backing store cannot be reached. The admission path fails closed
    /// on this error — a call is never placed on an unverifiable decision.
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),

    /// The store returned data that could not be decoded.
    #[error("storage data corrupt: {0}")]
    Corrupt(String),

    /// Underlying I/O failure from a persistent backend.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors produced by the admission path.
#[derive(Error, Debug)]
pub enum GateError {
    /// The repository failed mid-evaluation. Fail closed.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// The per-destination admission lock could not be acquired within the
    /// configured timeout. Transient — retry with backoff. Never recorded
    /// as a compliance violation.
    #[error("admission lock timed out after {waited_ms}ms for '{key}'")]
    LockTimeout { key: String, waited_ms: u64 },

    /// The request named an account the repository does not hold.
    #[error("unknown account: '{0}'")]
    UnknownAccount(String),

    /// `commit` was called with a reservation id the ledger does not hold.
    #[error("unknown reservation: {0}")]
    UnknownReservation(Uuid),

    /// The caller supplied a timezone string that is not a valid IANA zone.
    /// Surfaced as an error rather than silently falling back to UTC: a
    /// wrong zone would mis-evaluate the calling-hours rule.
    #[error("invalid IANA timezone: '{0}'")]
    InvalidTimezone(String),
}
