// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Do-not-print list.
//
// File format: semicolon-separated, one header record, then one
// `lastName;firstName` record per student.

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use tracing::{debug, info, instrument, warn};

/// Immutable set of (last name, first name) pairs that must never print.
#[derive(Debug, Clone, Default)]
pub struct Blacklist {
    entries: HashSet<(String, String)>,
}

impl Blacklist {
    /// Load the list from `path`.
    ///
    /// A missing, unreadable, or malformed file yields an empty list: the
    /// print queue keeps working, the problem is only logged.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let file = match std::fs::File::open(path) {
            Ok(f) => f,
            Err(e) => {
                warn!(error = %e, "blacklist not readable, continuing with an empty list");
                return Self::default();
            }
        };
        match Self::from_reader(file) {
            Ok(list) => {
                info!(entries = list.len(), "blacklist loaded");
                list
            }
            Err(e) => {
                warn!(error = %e, "blacklist malformed, continuing with an empty list");
                Self::default()
            }
        }
    }

    /// Parse the list from any reader. Records that do not have exactly two
    /// fields are skipped, and so are records that are not valid UTF-8 (a
    /// legacy-encoded row costs only that row, never the whole list).
    pub fn from_reader(reader: impl Read) -> Result<Self, csv::Error> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(b';')
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let mut entries = HashSet::new();
        for record in csv_reader.byte_records() {
            let record = match csv::StringRecord::from_byte_record(record?) {
                Ok(record) => record,
                Err(e) => {
                    let field = e.utf8_error().field();
                    let line = e.into_byte_record().position().map(|p| p.line());
                    warn!(?line, field, "skipping blacklist record that is not UTF-8");
                    continue;
                }
            };
            if record.len() != 2 {
                debug!(fields = record.len(), "skipping blacklist record");
                continue;
            }
            entries.insert((record[0].trim().to_owned(), record[1].trim().to_owned()));
        }
        Ok(Self { entries })
    }

    /// Build a list directly from pairs.
    pub fn from_pairs<I, L, F>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (L, F)>,
        L: Into<String>,
        F: Into<String>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(l, f)| (l.into().trim().to_owned(), f.into().trim().to_owned()))
                .collect(),
        }
    }

    /// Exact, case-sensitive match after trimming.
    pub fn is_blacklisted(&self, last_name: &str, first_name: &str) -> bool {
        let key = (last_name.trim().to_owned(), first_name.trim().to_owned());
        self.entries.contains(&key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_is_skipped() {
        let data = "Nachname;Vorname\nMeier;Jan\nSchulz ; Lena \n";
        let list = Blacklist::from_reader(data.as_bytes()).expect("parse");
        assert_eq!(list.len(), 2);
        assert!(!list.is_blacklisted("Nachname", "Vorname"));
        assert!(list.is_blacklisted("Meier", "Jan"));
        assert!(list.is_blacklisted("Schulz", "Lena"));
    }

    #[test]
    fn match_is_case_sensitive_and_trimmed() {
        let list = Blacklist::from_pairs([("Meier", "Jan")]);
        assert!(list.is_blacklisted(" Meier ", "Jan"));
        assert!(!list.is_blacklisted("meier", "jan"));
        assert!(!list.is_blacklisted("", ""));
    }

    #[test]
    fn records_with_wrong_field_count_are_skipped() {
        let data = "Nachname;Vorname\nMeier;Jan;7b\nSchulz\nWeber;Tim\n";
        let list = Blacklist::from_reader(data.as_bytes()).expect("parse");
        assert_eq!(list.len(), 1);
        assert!(list.is_blacklisted("Weber", "Tim"));
    }

    #[test]
    fn missing_file_yields_empty_list() {
        let dir = tempfile::tempdir().expect("tempdir");
        let list = Blacklist::load(dir.path().join("missing.csv"));
        assert!(list.is_empty());
    }

    #[test]
    fn non_utf8_row_does_not_drop_the_other_entries() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("blacklist.csv");
        // "M\xfcller" is how a cp1252 export writes "Müller".
        std::fs::write(&path, b"Nachname;Vorname\nMeier;Jan\nM\xfcller;Anna\nWeber;Tim\n").expect("write");

        let list = Blacklist::load(&path);
        assert_eq!(list.len(), 2);
        assert!(list.is_blacklisted("Meier", "Jan"));
        assert!(list.is_blacklisted("Weber", "Tim"));
    }
}
