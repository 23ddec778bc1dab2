// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Archive index: what has already been moved to `<archive_root>/<owner>/`.
//
// Like the scanner this reads the filesystem on every call. Every regular
// file is listed, not only PDFs, so the operator sees exactly what lies in
// the folder. Blacklisted students are flagged, never hidden.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, instrument};

use zeugnisdruck_core::error::{Result, ZeugnisError};
use zeugnisdruck_core::types::{ArchiveEntry, StudentName, is_valid_owner};
use zeugnisdruck_store::Blacklist;

/// Owners with an archive folder, sorted. A missing archive root is empty.
pub fn list_owners(archive_root: &Path) -> Result<Vec<String>> {
    let read = match std::fs::read_dir(archive_root) {
        Ok(read) => read,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut owners: Vec<String> = read
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| is_valid_owner(name))
        .collect();
    owners.sort();
    Ok(owners)
}

/// Archived files of one owner, sorted by filename.
///
/// An owner without an archive folder simply has no entries.
#[instrument(skip(archive_root, blacklist))]
pub fn entries_for(archive_root: &Path, owner: &str, blacklist: &Blacklist) -> Result<Vec<ArchiveEntry>> {
    if !is_valid_owner(owner) {
        return Err(ZeugnisError::InvalidOwner(owner.to_owned()));
    }

    let folder = archive_root.join(owner);
    let read = match std::fs::read_dir(&folder) {
        Ok(read) => read,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut filenames: Vec<String> = read
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect();
    filenames.sort();

    let entries: Vec<ArchiveEntry> = filenames
        .into_iter()
        .map(|filename| {
            let student = StudentName::from_filename(&filename);
            let blacklisted = blacklist.is_blacklisted(&student.last_name, &student.first_name);
            ArchiveEntry {
                owner: owner.to_owned(),
                filename,
                student,
                blacklisted,
            }
        })
        .collect();

    debug!(count = entries.len(), "archive folder listed");
    Ok(entries)
}

/// The whole archive, keyed by owner.
pub fn browse(archive_root: &Path, blacklist: &Blacklist) -> Result<BTreeMap<String, Vec<ArchiveEntry>>> {
    let mut index = BTreeMap::new();
    for owner in list_owners(archive_root)? {
        let entries = entries_for(archive_root, &owner, blacklist)?;
        index.insert(owner, entries);
    }
    Ok(index)
}
