// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Engine-level configuration.
//!
//! [`Config`] is the single entry point for tuning the admission engine at
//! construction time.  All fields have sensible defaults so that
//! `Config::default()` is always a valid starting point.

use serde::{Deserialize, Serialize};

/// Top-level configuration for [`CallGate`](crate::gate::CallGate).
///
/// # Examples
///
/// ```rust
/// use callguard_core::config::Config;
///
/// let config = Config {
///     default_frequency_max_calls: 2,
///     ..Config::default()
/// };
/// assert_eq!(config.default_calling_hours_start, 8);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Start of the permitted local calling window (inclusive hour-of-day).
    /// Defaults to `8`.
    pub default_calling_hours_start: u32,

    /// End of the permitted local calling window (exclusive hour-of-day).
    /// Defaults to `21`.
    pub default_calling_hours_end: u32,

    /// Default per-destination call cap within the trailing window.
    /// Defaults to `3`.
    pub default_frequency_max_calls: u32,

    /// Default trailing window for the frequency limit, in hours.
    /// Defaults to `24`.
    pub default_frequency_period_hours: u32,

    /// Active consent expiring within this many days produces a warning.
    /// Defaults to `30`.
    pub consent_expiry_warning_days: i64,

    /// When `true`, an account with no stored rules is evaluated against the
    /// standard rule set (DNC, consent, calling hours, frequency). When
    /// `false`, such an account has no compliance gating at all.
    /// Defaults to `true`.
    pub default_rules_when_unconfigured: bool,

    /// Maximum time to wait for the per-destination admission lock before
    /// returning a transient `LockTimeout`, in milliseconds.
    /// Defaults to `250`.
    pub admission_lock_timeout_ms: u64,

    /// Expected upper bound on call duration, in minutes. Reservations older
    /// than twice this value are treated as abandoned and auto-released by
    /// the sweep. Defaults to `15`.
    pub call_timeout_minutes: u64,
}

impl Config {
    /// The abandoned-reservation grace period: call timeout doubled.
    pub fn reservation_grace_minutes(&self) -> u64 {
        self.call_timeout_minutes * 2
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_calling_hours_start: 8,
            default_calling_hours_end: 21,
            default_frequency_max_calls: 3,
            default_frequency_period_hours: 24,
            consent_expiry_warning_days: 30,
            default_rules_when_unconfigured: true,
            admission_lock_timeout_ms: 250,
            call_timeout_minutes: 15,
        }
    }
}
