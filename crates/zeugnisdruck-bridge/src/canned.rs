// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Canned ownership: a resolver that answers from a fixed table.
//
// Used by tests and, through the `canned_owners` config section, by
// deployments where the source folder is shared through a service account or
// the platform has no native owner lookup.

use std::collections::HashMap;
use std::path::Path;

use zeugnisdruck_core::CannedOwners;
use zeugnisdruck_core::error::{Result, ZeugnisError};

use crate::traits::OwnershipResolver;

/// Resolves owners by filename, with an optional fallback owner.
#[derive(Debug, Clone, Default)]
pub struct CannedOwnership {
    by_filename: HashMap<String, String>,
    fallback: Option<String>,
}

impl CannedOwnership {
    /// Every file belongs to `owner`.
    pub fn everyone(owner: impl Into<String>) -> Self {
        Self {
            by_filename: HashMap::new(),
            fallback: Some(owner.into()),
        }
    }

    /// No file has a known owner unless added with [`Self::with`].
    pub fn nobody() -> Self {
        Self::default()
    }

    /// Resolver for the `canned_owners` config section.
    pub fn from_owners(owners: &CannedOwners) -> Self {
        Self {
            by_filename: owners.files.iter().map(|(f, o)| (f.clone(), o.clone())).collect(),
            fallback: owners.fallback.clone(),
        }
    }

    /// Assign `filename` to `owner`.
    pub fn with(mut self, filename: impl Into<String>, owner: impl Into<String>) -> Self {
        self.by_filename.insert(filename.into(), owner.into());
        self
    }
}

impl OwnershipResolver for CannedOwnership {
    fn file_owner(&self, path: &Path) -> Result<String> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.by_filename
            .get(&name)
            .or(self.fallback.as_ref())
            .cloned()
            .ok_or_else(|| ZeugnisError::Ownership(format!("no canned owner for {name}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_entry_wins_over_fallback() {
        let resolver = CannedOwnership::everyone("J.Smith").with("a_B_C.pdf", "K.Weber");
        assert_eq!(resolver.file_owner(Path::new("/in/a_B_C.pdf")).unwrap(), "K.Weber");
        assert_eq!(resolver.file_owner(Path::new("/in/x_Y_Z.pdf")).unwrap(), "J.Smith");
    }

    #[test]
    fn config_table_maps_files_then_fallback() {
        let owners = CannedOwners {
            fallback: None,
            files: [("HJ_Meier_Jan.pdf".to_string(), "J.Smith".to_string())].into(),
        };
        let resolver = CannedOwnership::from_owners(&owners);
        assert_eq!(resolver.file_owner(Path::new("/in/HJ_Meier_Jan.pdf")).unwrap(), "J.Smith");
        assert!(resolver.file_owner(Path::new("/in/HJ_Weber_Tim.pdf")).is_err());
    }

    #[test]
    fn nobody_fails_closed() {
        assert!(CannedOwnership::nobody().file_owner(Path::new("a.pdf")).is_err());
    }
}
