// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Plain-text rendering of queue state for the terminal.

use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::Duration;

use zeugnisdruck_core::notices::{OperatorNotice, Severity};
use zeugnisdruck_core::types::{ArchiveEntry, OwnerBatch, StudentName};
use zeugnisdruck_store::audit::AuditEntry;

fn student(name: &StudentName) -> String {
    if name.is_empty() {
        "-".into()
    } else {
        name.to_string()
    }
}

fn minutes_left(left: Duration) -> i64 {
    (left.num_seconds() + 59) / 60
}

/// Pending batches, one block per owner. `locks` holds the time left for
/// owners that are currently locked.
pub fn pending(batches: &BTreeMap<String, OwnerBatch>, locks: &BTreeMap<String, Duration>) -> String {
    if batches.is_empty() {
        return "No pending files.\n".into();
    }

    let mut out = String::new();
    for (owner, batch) in batches {
        let status = match locks.get(owner) {
            Some(left) => format!("locked, {} min left", minutes_left(*left)),
            None => "ready".into(),
        };
        let _ = writeln!(out, "{owner}  {} file(s)  [{status}]", batch.count());
        for file in &batch.files {
            let marker = if file.is_correction { "  (correction)" } else { "" };
            let _ = writeln!(out, "    {:<40} {}{marker}", file.filename, student(&file.student));
        }
    }
    out
}

/// Archived files per owner; blacklisted students are marked and cannot be
/// selected for reprint.
pub fn archive(index: &BTreeMap<String, Vec<ArchiveEntry>>) -> String {
    if index.values().all(Vec::is_empty) {
        return "Archive is empty.\n".into();
    }

    let mut out = String::new();
    for (owner, entries) in index {
        if entries.is_empty() {
            continue;
        }
        let _ = writeln!(out, "{owner}");
        for entry in entries {
            let marker = if entry.blacklisted { "  [blocked]" } else { "" };
            let _ = writeln!(out, "    {:<40} {}{marker}", entry.filename, student(&entry.student));
        }
    }
    out
}

pub fn notice(notice: &OperatorNotice) -> String {
    let level = match notice.severity {
        Severity::Info => "info",
        Severity::Warning => "warning",
        Severity::Error => "error",
    };
    format!("[{level}] {}: {}", notice.title, notice.message)
}

pub fn audit(entries: &[AuditEntry]) -> String {
    if entries.is_empty() {
        return "No audit entries.\n".into();
    }

    let mut out = String::new();
    for e in entries {
        let outcome = if e.success { "ok" } else { "FAILED" };
        let _ = write!(out, "{}  {:<20} {:<12} {outcome}", e.timestamp, e.action, e.owner);
        if let Some(filename) = &e.filename {
            let _ = write!(out, "  {filename}");
        }
        if let Some(details) = &e.details {
            let _ = write!(out, "  ({details})");
        }
        out.push('\n');
    }
    out
}
