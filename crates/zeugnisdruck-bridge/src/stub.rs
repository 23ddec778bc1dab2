// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stub bridge for platforms without a native ownership lookup.
//
// Every file resolves to `PlatformUnavailable`, so scans come back empty and
// nothing is ever printed under a guessed owner.

use std::path::Path;

use zeugnisdruck_core::error::{Result, ZeugnisError};

use crate::traits::OwnershipResolver;

/// Fail-closed resolver used where no native implementation exists.
pub struct StubOwnership;

impl OwnershipResolver for StubOwnership {
    fn file_owner(&self, path: &Path) -> Result<String> {
        tracing::warn!(path = %path.display(), "no native owner lookup on this platform, configure canned_owners");
        Err(ZeugnisError::PlatformUnavailable)
    }
}
