// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! Configuration loader for the admission engine.
//!
//! Supports two load strategies:
//!
//! 1. **TOML file** — [`load_config`] reads and deserialises a TOML file.
//! 2. **Environment variables** — [`load_config_from_env`] reads
//!    `CALLGUARD_`-prefixed environment variables.
//!
//! Both loaders are only available when the `config-loader` feature is
//! active.
//!
//! # File format
//!
//! ```toml
//! calling_hours_start   = 8
//! calling_hours_end     = 21
//! frequency_max_calls   = 3
//! frequency_period_hours = 24
//! consent_expiry_warning_days = 30
//! default_rules_when_unconfigured = true
//! admission_lock_timeout_ms = 250
//! call_timeout_minutes  = 15
//! ```
//!
//! # Environment variables
//!
//! | Variable                                  | Type    | Default |
//! |-------------------------------------------|---------|---------|
//! | `CALLGUARD_CALLING_HOURS_START`           | integer | 8       |
//! | `CALLGUARD_CALLING_HOURS_END`             | integer | 21      |
//! | `CALLGUARD_FREQUENCY_MAX_CALLS`           | integer | 3       |
//! | `CALLGUARD_FREQUENCY_PERIOD_HOURS`        | integer | 24      |
//! | `CALLGUARD_CONSENT_EXPIRY_WARNING_DAYS`   | integer | 30      |
//! | `CALLGUARD_DEFAULT_RULES`                 | boolean | true    |
//! | `CALLGUARD_ADMISSION_LOCK_TIMEOUT_MS`     | integer | 250     |
//! | `CALLGUARD_CALL_TIMEOUT_MINUTES`          | integer | 15      |

#![cfg(feature = "config-loader")]

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Config;

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("could not parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {field}: '{value}' ({reason})")]
    ParseField { field: String, value: String, reason: String },
}

/// Flat, serialisation-friendly settings struct.
///
/// Distinct from the engine-internal [`Config`] so that files and env vars
/// have a stable shape independent of engine internals.  Convert with
/// [`Into<Config>`] after loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    #[serde(default = "default_hours_start")]
    pub calling_hours_start: u32,
    #[serde(default = "default_hours_end")]
    pub calling_hours_end: u32,
    #[serde(default = "default_max_calls")]
    pub frequency_max_calls: u32,
    #[serde(default = "default_period_hours")]
    pub frequency_period_hours: u32,
    #[serde(default = "default_warning_days")]
    pub consent_expiry_warning_days: i64,
    #[serde(default = "default_rules_flag")]
    pub default_rules_when_unconfigured: bool,
    #[serde(default = "default_lock_timeout")]
    pub admission_lock_timeout_ms: u64,
    #[serde(default = "default_call_timeout")]
    pub call_timeout_minutes: u64,
}

fn default_hours_start() -> u32 { 8 }
fn default_hours_end() -> u32 { 21 }
fn default_max_calls() -> u32 { 3 }
fn default_period_hours() -> u32 { 24 }
fn default_warning_days() -> i64 { 30 }
fn default_rules_flag() -> bool { true }
fn default_lock_timeout() -> u64 { 250 }
fn default_call_timeout() -> u64 { 15 }

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            calling_hours_start: default_hours_start(),
            calling_hours_end: default_hours_end(),
            frequency_max_calls: default_max_calls(),
            frequency_period_hours: default_period_hours(),
            consent_expiry_warning_days: default_warning_days(),
            default_rules_when_unconfigured: default_rules_flag(),
            admission_lock_timeout_ms: default_lock_timeout(),
            call_timeout_minutes: default_call_timeout(),
        }
    }
}

impl From<EngineSettings> for Config {
    fn from(settings: EngineSettings) -> Self {
        Config {
            default_calling_hours_start: settings.calling_hours_start,
            default_calling_hours_end: settings.calling_hours_end,
            default_frequency_max_calls: settings.frequency_max_calls,
            default_frequency_period_hours: settings.frequency_period_hours,
            consent_expiry_warning_days: settings.consent_expiry_warning_days,
            default_rules_when_unconfigured: settings.default_rules_when_unconfigured,
            admission_lock_timeout_ms: settings.admission_lock_timeout_ms,
            call_timeout_minutes: settings.call_timeout_minutes,
        }
    }
}

/// Load [`EngineSettings`] from a TOML file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<EngineSettings, ConfigError> {
    let raw = fs::read_to_string(path)?;
    Ok(toml::from_str(&raw)?)
}

/// Load [`EngineSettings`] from `CALLGUARD_`-prefixed environment variables,
/// falling back to defaults for unset variables.
pub fn load_config_from_env() -> Result<EngineSettings, ConfigError> {
    let mut settings = EngineSettings::default();

    if let Some(value) = read_env("CALLGUARD_CALLING_HOURS_START") {
        settings.calling_hours_start = parse_field("calling_hours_start", &value)?;
    }
    if let Some(value) = read_env("CALLGUARD_CALLING_HOURS_END") {
        settings.calling_hours_end = parse_field("calling_hours_end", &value)?;
    }
    if let Some(value) = read_env("CALLGUARD_FREQUENCY_MAX_CALLS") {
        settings.frequency_max_calls = parse_field("frequency_max_calls", &value)?;
    }
    if let Some(value) = read_env("CALLGUARD_FREQUENCY_PERIOD_HOURS") {
        settings.frequency_period_hours = parse_field("frequency_period_hours", &value)?;
    }
    if let Some(value) = read_env("CALLGUARD_CONSENT_EXPIRY_WARNING_DAYS") {
        settings.consent_expiry_warning_days =
            parse_field("consent_expiry_warning_days", &value)?;
    }
    if let Some(value) = read_env("CALLGUARD_DEFAULT_RULES") {
        settings.default_rules_when_unconfigured = match value.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => true,
            "false" | "0" | "no" => false,
            other => {
                return Err(ConfigError::ParseField {
                    field: "default_rules_when_unconfigured".into(),
                    value: other.into(),
                    reason: "expected a boolean".into(),
                })
            }
        };
    }
    if let Some(value) = read_env("CALLGUARD_ADMISSION_LOCK_TIMEOUT_MS") {
        settings.admission_lock_timeout_ms = parse_field("admission_lock_timeout_ms", &value)?;
    }
    if let Some(value) = read_env("CALLGUARD_CALL_TIMEOUT_MINUTES") {
        settings.call_timeout_minutes = parse_field("call_timeout_minutes", &value)?;
    }

    Ok(settings)
}

fn read_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

fn parse_field<T: std::str::FromStr>(field: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|error: T::Err| ConfigError::ParseField {
        field: field.into(),
        value: value.into(),
        reason: error.to_string(),
    })
}
