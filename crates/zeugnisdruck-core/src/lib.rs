// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Zeugnisdruck: Core types, configuration, and error definitions shared
// across all crates.

pub mod config;
pub mod error;
pub mod notices;
pub mod types;

pub use config::{AppConfig, CannedOwners};
pub use error::{Result, ZeugnisError};
pub use types::*;
