// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unix ownership lookup: file uid -> passwd entry.

use std::os::unix::fs::MetadataExt;
use std::path::Path;

use nix::unistd::{Uid, User};
use zeugnisdruck_core::error::{Result, ZeugnisError};

use crate::traits::OwnershipResolver;

/// Resolves owners through `stat(2)` and the passwd database.
pub struct UnixOwnership;

impl OwnershipResolver for UnixOwnership {
    fn file_owner(&self, path: &Path) -> Result<String> {
        let uid = std::fs::metadata(path)?.uid();

        // A uid without a passwd entry has no name to group by.
        match User::from_uid(Uid::from_raw(uid)) {
            Ok(Some(user)) => Ok(user.name),
            Ok(None) => Err(ZeugnisError::Ownership(format!(
                "uid {uid} of {} has no passwd entry",
                path.display()
            ))),
            Err(e) => Err(ZeugnisError::Ownership(format!("passwd lookup for uid {uid}: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn own_file_resolves_to_current_user() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("HJ_Meier_Jan.pdf");
        std::fs::write(&path, b"%PDF").expect("write");

        let expected = User::from_uid(nix::unistd::getuid()).ok().flatten();
        let resolved = UnixOwnership.file_owner(&path);
        match expected {
            Some(user) => assert_eq!(resolved.expect("owner"), user.name),
            None => assert!(resolved.is_err()),
        }
    }

    #[test]
    fn missing_file_is_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(UnixOwnership.file_owner(&dir.path().join("gone.pdf")).is_err());
    }
}
