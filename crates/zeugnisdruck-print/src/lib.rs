// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Zeugnisdruck Print: printer gateway, file ownership scanner, archive
// index, and the move-and-print transaction engine. This crate ties the
// persistent state in `zeugnisdruck-store` to the filesystem and the
// external print utility.

pub mod archive;
pub mod engine;
pub mod gateway;
pub mod scanner;
pub mod sweeper;

pub use engine::TransactionEngine;
pub use gateway::{CommandGateway, PrinterGateway};
pub use scanner::scan;
pub use sweeper::spawn_sweeper;
