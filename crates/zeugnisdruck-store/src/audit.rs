// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Audit trail: append-only SQLite log of every print-queue action.
//
// Schema:
//   print_audit(
//     id        INTEGER PRIMARY KEY AUTOINCREMENT,
//     timestamp TEXT    NOT NULL,   -- RFC 3339
//     action    TEXT    NOT NULL,   -- e.g. "move", "print", "blocked"
//     owner     TEXT    NOT NULL,   -- teacher account
//     filename  TEXT,               -- absent for lock-level actions
//     success   INTEGER NOT NULL,   -- 0 = failure, 1 = success
//     details   TEXT                -- optional free-form context
//   )

use std::path::Path;

use chrono::Utc;
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use zeugnisdruck_core::error::ZeugnisError;

const CREATE_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS print_audit (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT    NOT NULL,
    action    TEXT    NOT NULL,
    owner     TEXT    NOT NULL,
    filename  TEXT,
    success   INTEGER NOT NULL,
    details   TEXT
);";

fn db_err(e: rusqlite::Error) -> ZeugnisError {
    ZeugnisError::Database(e.to_string())
}

/// Audited actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    LockAcquired,
    LockReleased,
    PrinterUnreachable,
    Move,
    Print,
    Blocked,
    Reprint,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LockAcquired => "lock_acquired",
            Self::LockReleased => "lock_released",
            Self::PrinterUnreachable => "printer_unreachable",
            Self::Move => "move",
            Self::Print => "print",
            Self::Blocked => "blocked",
            Self::Reprint => "reprint",
        }
    }
}

/// A single entry in the audit log, used for queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub timestamp: String,
    pub action: String,
    pub owner: String,
    pub filename: Option<String>,
    pub success: bool,
    pub details: Option<String>,
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<AuditEntry> {
    Ok(AuditEntry {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        action: row.get(2)?,
        owner: row.get(3)?,
        filename: row.get(4)?,
        success: row.get::<_, i32>(5)? != 0,
        details: row.get(6)?,
    })
}

/// Append-only audit log backed by a SQLite database.
pub struct AuditLog {
    conn: Connection,
}

impl AuditLog {
    /// Open (or create) the audit database at `path`.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ZeugnisError> {
        let conn = Connection::open(path).map_err(db_err)?;

        // WAL keeps readers (a second CLI instance) from blocking the writer.
        conn.execute_batch("PRAGMA journal_mode = WAL;")
            .map_err(db_err)?;
        conn.execute_batch(CREATE_TABLE_SQL).map_err(db_err)?;

        debug!("audit log opened");
        Ok(Self { conn })
    }

    /// Open an in-memory audit database (useful for tests).
    pub fn open_in_memory() -> Result<Self, ZeugnisError> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        conn.execute_batch(CREATE_TABLE_SQL).map_err(db_err)?;

        debug!("in-memory audit log opened");
        Ok(Self { conn })
    }

    /// Record a new audit entry.
    #[instrument(skip_all, fields(action = action.as_str(), %owner, success))]
    pub fn record(
        &self,
        action: AuditAction,
        owner: &str,
        filename: Option<&str>,
        success: bool,
        details: Option<&str>,
    ) -> Result<(), ZeugnisError> {
        let timestamp = Utc::now().to_rfc3339();
        let success_int: i32 = if success { 1 } else { 0 };

        self.conn
            .execute(
                "INSERT INTO print_audit (timestamp, action, owner, filename, success, details)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![timestamp, action.as_str(), owner, filename, success_int, details],
            )
            .map_err(db_err)?;

        debug!("audit entry recorded");
        Ok(())
    }

    /// All entries for one owner, oldest first.
    pub fn entries_for_owner(&self, owner: &str) -> Result<Vec<AuditEntry>, ZeugnisError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, timestamp, action, owner, filename, success, details
                 FROM print_audit
                 WHERE owner = ?1
                 ORDER BY id ASC",
            )
            .map_err(db_err)?;

        let rows = stmt.query_map(params![owner], row_to_entry).map_err(db_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
    }

    /// The most recent `limit` entries, newest first.
    pub fn recent_entries(&self, limit: u32) -> Result<Vec<AuditEntry>, ZeugnisError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, timestamp, action, owner, filename, success, details
                 FROM print_audit
                 ORDER BY id DESC
                 LIMIT ?1",
            )
            .map_err(db_err)?;

        let rows = stmt.query_map(params![limit], row_to_entry).map_err(db_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
    }

    /// Total number of entries in the audit log.
    pub fn count(&self) -> Result<u64, ZeugnisError> {
        self.conn
            .query_row("SELECT COUNT(*) FROM print_audit", [], |row| row.get(0))
            .map_err(db_err)
    }
}
