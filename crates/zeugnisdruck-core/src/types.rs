// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Zeugnisdruck print queue.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for one move-and-print transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(pub Uuid);

impl TransactionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether `owner` can be used as a folder name under the archive root.
///
/// Owners come from account names; anything that could escape the archive
/// root (separators, `.`, `..`) or is empty is refused.
pub fn is_valid_owner(owner: &str) -> bool {
    !owner.trim().is_empty()
        && owner != "."
        && owner != ".."
        && !owner.contains(['/', '\\', '\0'])
}

/// Student named by a report-card file.
///
/// Both fields are empty when the filename does not follow the
/// `<prefix>_<last>_<first>.pdf` convention.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StudentName {
    pub last_name: String,
    pub first_name: String,
}

impl StudentName {
    pub fn new(last_name: impl Into<String>, first_name: impl Into<String>) -> Self {
        Self {
            last_name: last_name.into(),
            first_name: first_name.into(),
        }
    }

    /// Derive the student from a filename.
    ///
    /// The name is split on `_` and needs at least three segments: the
    /// second is the last name, the third (up to its first `.`) the first
    /// name. Anything else yields an empty name.
    pub fn from_filename(filename: &str) -> Self {
        let parts: Vec<&str> = filename.split('_').collect();
        if parts.len() < 3 {
            return Self::default();
        }
        let first = parts[2].split('.').next().unwrap_or_default();
        Self::new(parts[1].trim(), first.trim())
    }

    pub fn is_empty(&self) -> bool {
        self.last_name.is_empty() && self.first_name.is_empty()
    }
}

impl std::fmt::Display for StudentName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, {}", self.last_name, self.first_name)
    }
}

/// A PDF waiting in the source folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingFile {
    pub filename: String,
    pub owner: String,
    pub student: StudentName,
    /// A file of the same name is already archived for this owner.
    pub is_correction: bool,
}

/// All pending files of one owner, ordered by filename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerBatch {
    pub owner: String,
    pub files: Vec<PendingFile>,
}

impl OwnerBatch {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            files: Vec::new(),
        }
    }

    pub fn count(&self) -> usize {
        self.files.len()
    }

    pub fn corrections(&self) -> usize {
        self.files.iter().filter(|f| f.is_correction).count()
    }
}

/// A file already moved into `<archive_root>/<owner>/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveEntry {
    pub owner: String,
    pub filename: String,
    pub student: StudentName,
    /// Student is on the do-not-print list; the entry cannot be reprinted.
    pub blacklisted: bool,
}

/// One file picked for reprint from the archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub filename: String,
    pub student: StudentName,
}

impl Selection {
    /// Build a selection from an archived filename, parsing the student
    /// from the naming convention.
    pub fn from_filename(filename: impl Into<String>) -> Self {
        let filename = filename.into();
        let student = StudentName::from_filename(&filename);
        Self { filename, student }
    }
}

impl From<&ArchiveEntry> for Selection {
    fn from(entry: &ArchiveEntry) -> Self {
        Self {
            filename: entry.filename.clone(),
            student: entry.student.clone(),
        }
    }
}

/// A file whose student is on the do-not-print list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedFile {
    pub filename: String,
    pub student: StudentName,
}

/// A file that could not be moved into the archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveFailure {
    pub filename: String,
    pub reason: String,
}

/// Classification of a completed transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportStatus {
    /// Everything moved and printed.
    Success,
    /// Some moves or prints failed; no student was blocked.
    PartialFailure,
    /// At least one student was on the do-not-print list.
    Blocked,
}

/// Per-file results of one move-and-print transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReport {
    pub id: TransactionId,
    pub owner: String,
    pub moved: Vec<String>,
    pub printed: Vec<String>,
    pub blocked: Vec<BlockedFile>,
    pub failed_moves: Vec<MoveFailure>,
    pub failed_prints: Vec<String>,
}

impl TransactionReport {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            id: TransactionId::new(),
            owner: owner.into(),
            moved: Vec::new(),
            printed: Vec::new(),
            blocked: Vec::new(),
            failed_moves: Vec::new(),
            failed_prints: Vec::new(),
        }
    }

    /// A blocked student always wins over failures: the report is never
    /// `Success` once anything was withheld.
    pub fn status(&self) -> ReportStatus {
        if !self.blocked.is_empty() {
            ReportStatus::Blocked
        } else if !self.failed_moves.is_empty() || !self.failed_prints.is_empty() {
            ReportStatus::PartialFailure
        } else {
            ReportStatus::Success
        }
    }

    /// Filenames of every move or print failure, in processing order.
    pub fn failed_files(&self) -> Vec<&str> {
        self.failed_moves
            .iter()
            .map(|f| f.filename.as_str())
            .chain(self.failed_prints.iter().map(String::as_str))
            .collect()
    }
}

/// Result of `move_and_print` for one owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionOutcome {
    /// The owner is inside the cooldown window; nothing was touched.
    Locked {
        /// Time left until the lock expires, in whole seconds.
        remaining_secs: i64,
    },
    /// The printer did not answer; the lock was released, files untouched.
    PrinterUnreachable,
    /// The owner had nothing in the source folder; the lock was released.
    NoPendingFiles,
    /// Files were processed; see the report for per-file results.
    Completed(TransactionReport),
}

/// Result of reprinting a selection from the archive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReprintReport {
    pub owner: String,
    pub printed: Vec<String>,
    pub blocked: Vec<BlockedFile>,
    pub failed: Vec<String>,
}

/// Notifications for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// A move-and-print transaction for `owner` finished (any outcome).
    TransactionFinished { owner: String },
    /// The background sweep released these owners' expired locks.
    LocksExpired { owners: Vec<String> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn student_from_conventional_filename() {
        let name = StudentName::from_filename("Zeugnis7b_Müller_Anna.pdf");
        assert_eq!(name, StudentName::new("Müller", "Anna"));
    }

    #[test]
    fn student_segments_are_trimmed() {
        let name = StudentName::from_filename("HJ_ Meier _ Jan .pdf");
        assert_eq!(name, StudentName::new("Meier", "Jan"));
    }

    #[test]
    fn extra_segments_are_ignored() {
        let name = StudentName::from_filename("HJ_Schulz_Lena_v2.pdf");
        assert_eq!(name, StudentName::new("Schulz", "Lena"));
    }

    #[test]
    fn non_conforming_filename_yields_empty_name() {
        assert!(StudentName::from_filename("scan.pdf").is_empty());
        assert!(StudentName::from_filename("a_b.pdf").is_empty());
    }

    #[test]
    fn owner_names_that_escape_the_archive_are_invalid() {
        assert!(is_valid_owner("J.Smith"));
        assert!(is_valid_owner("schmidt.k"));
        assert!(!is_valid_owner(""));
        assert!(!is_valid_owner(".."));
        assert!(!is_valid_owner("a/b"));
        assert!(!is_valid_owner("DOMAIN\\user"));
    }

    #[test]
    fn blocked_report_is_never_success() {
        let mut report = TransactionReport::new("J.Smith");
        report.printed.push("a_B_C.pdf".into());
        report.blocked.push(BlockedFile {
            filename: "a_X_Y.pdf".into(),
            student: StudentName::new("X", "Y"),
        });
        assert_eq!(report.status(), ReportStatus::Blocked);
    }

    #[test]
    fn failures_without_blocks_are_partial() {
        let mut report = TransactionReport::new("J.Smith");
        report.failed_prints.push("a_B_C.pdf".into());
        assert_eq!(report.status(), ReportStatus::PartialFailure);
        assert_eq!(report.failed_files(), vec!["a_B_C.pdf"]);
    }

    #[test]
    fn empty_report_is_success() {
        assert_eq!(TransactionReport::new("x").status(), ReportStatus::Success);
    }
}
