// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Zeugnisdruck Store. The persistent state around a print transaction:
// the per-owner cooldown ledger, the do-not-print list, and the audit trail.

pub mod audit;
pub mod blacklist;
pub mod ledger;

pub use audit::AuditLog;
pub use blacklist::Blacklist;
pub use ledger::{LedgerHandle, StatusLedger};
