// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

//! Zeugnisdruck: platform bridge abstractions.
//!
//! Resolving who created a file is a platform security API (uid + passwd
//! on Unix, security descriptors on Windows). The rest of the workspace
//! only sees the [`traits::OwnershipResolver`] capability.

pub mod canned;
pub mod traits;

#[cfg(unix)]
pub mod unix;

#[cfg(not(unix))]
pub mod stub;

pub use canned::CannedOwnership;
pub use traits::OwnershipResolver;

use zeugnisdruck_core::AppConfig;

/// Resolver for a loaded configuration: the `canned_owners` table when one
/// is configured, the platform lookup otherwise.
pub fn resolver_for(config: &AppConfig) -> Box<dyn OwnershipResolver> {
    match &config.canned_owners {
        Some(owners) => {
            tracing::info!(
                files = owners.files.len(),
                fallback = owners.fallback.is_some(),
                "using configured owner table"
            );
            Box::new(CannedOwnership::from_owners(owners))
        }
        None => platform_resolver(),
    }
}

/// Returns the ownership resolver for the target operating system.
pub fn platform_resolver() -> Box<dyn OwnershipResolver> {
    #[cfg(unix)]
    {
        Box::new(unix::UnixOwnership)
    }
    #[cfg(not(unix))]
    {
        Box::new(stub::StubOwnership)
    }
}
