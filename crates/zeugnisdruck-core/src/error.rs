// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Zeugnisdruck.

use thiserror::Error;

/// Top-level error type for all Zeugnisdruck operations.
///
/// Per-file move and print failures are not errors: they are collected in
/// the transaction report. This enum covers the faults that stop an
/// operation as a whole.
#[derive(Debug, Error)]
pub enum ZeugnisError {
    // -- Startup --
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid owner name: {0:?}")]
    InvalidOwner(String),

    // -- Storage / persistence --
    #[error("status ledger error: {0}")]
    Ledger(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // -- Platform bridge --
    #[error("could not resolve file owner: {0}")]
    Ownership(String),

    #[error("feature not available on this platform")]
    PlatformUnavailable,
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ZeugnisError>;
