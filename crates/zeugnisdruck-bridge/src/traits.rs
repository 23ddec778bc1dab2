// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-agnostic trait definitions for native capabilities.

use std::path::Path;

use zeugnisdruck_core::error::Result;

/// Look up the account that created a file.
///
/// Implementations must be cheap enough to call once per pending file on
/// every scan.
pub trait OwnershipResolver: Send + Sync {
    /// Account name (without domain) owning `path`.
    ///
    /// Errors mean "unknown owner"; callers treat them as a reason to skip
    /// the file, never to abort a scan.
    fn file_owner(&self, path: &Path) -> Result<String>;
}

impl<T: OwnershipResolver + ?Sized> OwnershipResolver for Box<T> {
    fn file_owner(&self, path: &Path) -> Result<String> {
        (**self).file_owner(path)
    }
}

impl<T: OwnershipResolver + ?Sized> OwnershipResolver for std::sync::Arc<T> {
    fn file_owner(&self, path: &Path) -> Result<String> {
        (**self).file_owner(path)
    }
}
