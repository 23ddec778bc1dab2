// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// File ownership scanner.
//
// Lists the PDFs waiting in the source folder and groups them by the account
// that created them. The scan is a pure function of the filesystem: nothing
// is cached, every call sees the folder as it is right now.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, instrument};

use zeugnisdruck_bridge::OwnershipResolver;
use zeugnisdruck_core::error::Result;
use zeugnisdruck_core::types::{OwnerBatch, PendingFile, StudentName, is_valid_owner};

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

/// Sorted names of the PDF files directly inside `source_dir`.
fn pdf_filenames(source_dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(source_dir)? {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                debug!(error = %e, "skipping unreadable directory entry");
                continue;
            }
        };
        let path = entry.path();
        if !is_pdf(&path) || !path.is_file() {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) => names.push(name),
            Err(raw) => debug!(name = ?raw, "skipping non UTF-8 filename"),
        }
    }
    names.sort();
    Ok(names)
}

/// Group the pending PDFs of `source_dir` by owner.
///
/// Files whose owner cannot be resolved are left out silently; they are
/// never printed. Batches come back ordered by owner, files by filename.
#[instrument(skip(resolver), fields(source = %source_dir.display()))]
pub fn scan<R>(source_dir: &Path, archive_root: &Path, resolver: &R) -> Result<BTreeMap<String, OwnerBatch>>
where
    R: OwnershipResolver + ?Sized,
{
    let mut batches: BTreeMap<String, OwnerBatch> = BTreeMap::new();

    for filename in pdf_filenames(source_dir)? {
        let owner = match resolver.file_owner(&source_dir.join(&filename)) {
            Ok(owner) if is_valid_owner(&owner) => owner,
            Ok(owner) => {
                debug!(%filename, %owner, "owner not usable as archive folder, skipping");
                continue;
            }
            Err(e) => {
                debug!(%filename, error = %e, "owner unresolved, skipping");
                continue;
            }
        };

        let is_correction = archive_root.join(&owner).join(&filename).exists();
        let file = PendingFile {
            student: StudentName::from_filename(&filename),
            filename,
            owner: owner.clone(),
            is_correction,
        };
        batches
            .entry(owner)
            .or_insert_with_key(|o| OwnerBatch::new(o.clone()))
            .files
            .push(file);
    }

    debug!(owners = batches.len(), "scan complete");
    Ok(batches)
}

/// The live batch of a single owner, or `None` if they have nothing pending.
pub fn scan_owner<R>(
    source_dir: &Path,
    archive_root: &Path,
    resolver: &R,
    owner: &str,
) -> Result<Option<OwnerBatch>>
where
    R: OwnershipResolver + ?Sized,
{
    Ok(scan(source_dir, archive_root, resolver)?.remove(owner))
}
