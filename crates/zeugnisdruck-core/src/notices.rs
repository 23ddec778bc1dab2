// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Operator-facing messages for print outcomes and errors.
//
// Every transaction result is mapped to a short title and a plain-language
// message. The severity drives how the presentation layer shows it.

use crate::error::ZeugnisError;
use crate::types::{BlockedFile, ReportStatus, ReprintReport, TransactionOutcome};

/// How prominently a notice should be shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Everything went as requested.
    Info,
    /// Something was skipped or partly failed; the operator should look.
    Warning,
    /// Nothing happened; the operator has to act before retrying.
    Error,
}

/// A message for the operator.
#[derive(Debug, Clone)]
pub struct OperatorNotice {
    /// Short heading.
    pub title: String,
    /// Body text.
    pub message: String,
    pub severity: Severity,
}

impl OperatorNotice {
    fn new(title: &str, message: String, severity: Severity) -> Self {
        Self {
            title: title.into(),
            message,
            severity,
        }
    }
}

fn student_list(blocked: &[BlockedFile]) -> String {
    blocked
        .iter()
        .map(|b| b.student.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Describe the result of a move-and-print transaction.
pub fn notice_for_outcome(owner: &str, outcome: &TransactionOutcome) -> OperatorNotice {
    match outcome {
        TransactionOutcome::Locked { remaining_secs } => OperatorNotice::new(
            "Print job locked",
            format!(
                "The print job for {owner} is still locked. Please wait about {} minute(s) and try again.",
                (remaining_secs + 59) / 60
            ),
            Severity::Error,
        ),
        TransactionOutcome::PrinterUnreachable => OperatorNotice::new(
            "Printer unreachable",
            "The printer is currently not reachable. No files were moved.".into(),
            Severity::Error,
        ),
        TransactionOutcome::NoPendingFiles => OperatorNotice::new(
            "Nothing to print",
            format!("There are no pending files for {owner}."),
            Severity::Info,
        ),
        TransactionOutcome::Completed(report) => match report.status() {
            ReportStatus::Blocked => {
                let mut message = format!(
                    "Printing is blocked for the following students: {}. Their files were archived but not printed.",
                    student_list(&report.blocked)
                );
                let failed = report.failed_files();
                if !failed.is_empty() {
                    message.push_str(&format!(
                        " These files could not be completed: {}.",
                        failed.join(", ")
                    ));
                }
                OperatorNotice::new("Printing blocked", message, Severity::Warning)
            }
            ReportStatus::PartialFailure => OperatorNotice::new(
                "Partly failed",
                format!(
                    "The files were moved, but these jobs could not be completed: {}.",
                    report.failed_files().join(", ")
                ),
                Severity::Warning,
            ),
            ReportStatus::Success => OperatorNotice::new(
                "Done",
                format!(
                    "All {} file(s) of {owner} were moved and printed.",
                    report.printed.len()
                ),
                Severity::Info,
            ),
        },
    }
}

/// Describe the result of an archive reprint.
pub fn notice_for_reprint(report: &ReprintReport) -> OperatorNotice {
    let mut notice = if !report.failed.is_empty() {
        OperatorNotice::new(
            "Partly failed",
            format!(
                "These print jobs could not be completed: {}.",
                report.failed.join(", ")
            ),
            Severity::Warning,
        )
    } else {
        OperatorNotice::new(
            "Printing finished",
            format!("{} selected file(s) were printed.", report.printed.len()),
            Severity::Info,
        )
    };
    if !report.blocked.is_empty() {
        notice.message.push_str(&format!(
            " Printing is blocked for: {}.",
            student_list(&report.blocked)
        ));
        notice.severity = Severity::Warning;
    }
    notice
}

/// Describe an error that aborted an operation.
pub fn notice_for_error(err: &ZeugnisError) -> OperatorNotice {
    match err {
        ZeugnisError::Config(detail) => OperatorNotice::new(
            "Configuration problem",
            format!("The configuration could not be loaded. ({detail})"),
            Severity::Error,
        ),
        ZeugnisError::InvalidOwner(owner) => OperatorNotice::new(
            "Unknown teacher",
            format!("{owner:?} is not a valid account name."),
            Severity::Error,
        ),
        ZeugnisError::Ledger(_) | ZeugnisError::Serialization(_) => OperatorNotice::new(
            "Status file problem",
            "The print status could not be saved. Check that the status file is writable, then try again.".into(),
            Severity::Error,
        ),
        ZeugnisError::Database(_) => OperatorNotice::new(
            "Audit log problem",
            "The print history could not be written. Printing itself is not affected.".into(),
            Severity::Warning,
        ),
        ZeugnisError::Io(io_err) => match io_err.kind() {
            std::io::ErrorKind::NotFound => OperatorNotice::new(
                "Folder not found",
                "The input or archive folder does not exist. Check the configured paths.".into(),
                Severity::Error,
            ),
            std::io::ErrorKind::PermissionDenied => OperatorNotice::new(
                "Access denied",
                "The program is not allowed to read or write one of the folders.".into(),
                Severity::Error,
            ),
            _ => OperatorNotice::new(
                "File problem",
                format!("A file operation failed: {io_err}"),
                Severity::Error,
            ),
        },
        ZeugnisError::Ownership(_) | ZeugnisError::PlatformUnavailable => OperatorNotice::new(
            "Owner lookup unavailable",
            "File owners cannot be determined on this system.".into(),
            Severity::Error,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{StudentName, TransactionReport};

    #[test]
    fn locked_rounds_up_to_minutes() {
        let notice = notice_for_outcome("J.Smith", &TransactionOutcome::Locked { remaining_secs: 61 });
        assert_eq!(notice.severity, Severity::Error);
        assert!(notice.message.contains("2 minute(s)"));
    }

    #[test]
    fn blocked_lists_students() {
        let mut report = TransactionReport::new("J.Smith");
        report.blocked.push(BlockedFile {
            filename: "HJ_Meier_Jan.pdf".into(),
            student: StudentName::new("Meier", "Jan"),
        });
        let notice = notice_for_outcome("J.Smith", &TransactionOutcome::Completed(report));
        assert_eq!(notice.severity, Severity::Warning);
        assert!(notice.message.contains("Meier, Jan"));
    }

    #[test]
    fn reprint_with_block_is_warning() {
        let report = ReprintReport {
            owner: "J.Smith".into(),
            printed: vec!["a_B_C.pdf".into()],
            blocked: vec![BlockedFile {
                filename: "a_X_Y.pdf".into(),
                student: StudentName::new("X", "Y"),
            }],
            failed: vec![],
        };
        let notice = notice_for_reprint(&report);
        assert_eq!(notice.severity, Severity::Warning);
        assert!(notice.message.contains("X, Y"));
    }

    #[test]
    fn missing_folder_is_error() {
        let err = ZeugnisError::Io(std::io::Error::from(std::io::ErrorKind::NotFound));
        assert_eq!(notice_for_error(&err).title, "Folder not found");
    }
}
