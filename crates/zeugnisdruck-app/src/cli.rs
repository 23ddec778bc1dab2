// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command-line surface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use zeugnisdruck_core::config::DEFAULT_CONFIG_FILE;

#[derive(Debug, Parser)]
#[command(name = "zeugnisdruck")]
#[command(about = "Report-card print queue with per-teacher batches and cooldown", long_about = None)]
pub struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show pending files grouped by teacher, with lock status
    List,
    /// Move a teacher's pending files to the archive and print them
    Print {
        owner: String,
    },
    /// Browse files already moved to the archive
    Archive {
        /// Only this teacher's folder
        #[arg(long)]
        owner: Option<String>,
    },
    /// Print archived files again (no cooldown applies)
    Reprint {
        owner: String,
        /// Archived file names to print
        files: Vec<String>,
        /// Every archived file of the teacher that is not blacklisted
        #[arg(long, conflicts_with = "files")]
        all: bool,
    },
    /// Release a teacher's cooldown lock immediately
    Unlock {
        owner: String,
    },
    /// Show the most recent audit entries
    History {
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Keep refreshing the pending list and purge expired locks
    Watch,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn reprint_all_conflicts_with_file_list() {
        let result = Cli::try_parse_from(["zeugnisdruck", "reprint", "J.Smith", "a_B_C.pdf", "--all"]);
        assert!(result.is_err());
    }

    #[test]
    fn config_defaults_to_working_directory_file() {
        let cli = Cli::try_parse_from(["zeugnisdruck", "list"]).expect("parse");
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_FILE));
        assert!(matches!(cli.command, Some(Commands::List)));
    }
}
