// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 MuVeraAI Corporation

//! # callguard-store
//!
//! Persistent storage backends for `callguard-core`.
//!
//! This crate provides [`FileStorage`], a JSON file-backed implementation of
//! the [`Storage`](callguard_core::storage::Storage) trait suitable for CLI
//! tools, single-node deployments, and integration tests that need state to
//! survive a restart.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use callguard_store::FileStorage;
//! use callguard_core::{config::Config, events::TracingSink, gate::CallGate};
//!
//! let storage = FileStorage::open("/var/lib/callguard/engine.json")
//!     .expect("failed to open storage file");
//!
//! let gate = CallGate::new(Config::default(), storage, Arc::new(TracingSink));
//! ```

pub mod storage;

pub use storage::file::FileStorage;
