//! CSV parsing.
//!
//! First line is the header row defining field names; each subsequent line
//! is one record. Malformed rows (wrong field count, invalid UTF-8) are
//! skipped and counted rather than failing the file. A file with no valid
//! rows at all is an error: re-parsing the same bytes cannot do better.

use std::collections::BTreeMap;

use csv::ReaderBuilder;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::table::RowRecord;

/// Result type for CSV parsing.
pub type Result<T> = std::result::Result<T, ParseError>;

/// Errors that fail a whole file.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Unreadable CSV header: {0}")]
    Header(csv::Error),

    #[error("No valid rows ({skipped} malformed)")]
    NoValidRows { skipped: usize },
}

/// Outcome of parsing one CSV object.
#[derive(Debug)]
pub struct ParseOutcome {
    /// Valid rows, in file order. Duplicate identifiers are kept; the
    /// upsert sequence makes the last occurrence win.
    pub rows: Vec<RowRecord>,
    /// Number of malformed rows that were skipped.
    pub skipped: usize,
}

/// Parse CSV content into row records keyed by `id_field`.
///
/// Rows with a missing or empty identifier get a generated UUID instead of
/// failing. The UUID is derived (v5) from `source` and the row's position,
/// so re-parsing the same object yields the same identifiers and redelivered
/// messages converge to the same table state.
pub fn parse_rows(content: &[u8], id_field: &str, source: &str) -> Result<ParseOutcome> {
    let mut reader = ReaderBuilder::new().flexible(false).from_reader(content);
    let headers = reader.headers().map_err(ParseError::Header)?.clone();

    let mut rows = Vec::new();
    let mut skipped = 0usize;

    for (index, result) in reader.records().enumerate() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                // Line 1 is the header.
                warn!(line = index + 2, error = %e, "Skipping malformed CSV row");
                skipped += 1;
                continue;
            }
        };

        let mut fields = BTreeMap::new();
        for (name, value) in headers.iter().zip(record.iter()) {
            fields.insert(name.to_string(), value.to_string());
        }

        let id = match fields.get(id_field).filter(|v| !v.is_empty()) {
            Some(v) => v.clone(),
            None => generated_id(source, index),
        };

        rows.push(RowRecord { id, fields });
    }

    if rows.is_empty() {
        return Err(ParseError::NoValidRows { skipped });
    }
    Ok(ParseOutcome { rows, skipped })
}

/// Stable identifier for a row without one: a name-based UUID over the
/// object's source path and the row's position within it.
fn generated_id(source: &str, index: usize) -> String {
    let name = format!("{}#{}", source, index);
    Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_file() {
        let content = b"id,name\n1,Alice\n2,Bob\n";
        let outcome = parse_rows(content, "id", "uploads/people.csv").unwrap();

        assert_eq!(outcome.rows.len(), 2);
        assert_eq!(outcome.skipped, 0);
        assert_eq!(outcome.rows[0].id, "1");
        assert_eq!(outcome.rows[0].fields["name"], "Alice");
        assert_eq!(outcome.rows[1].id, "2");
    }

    #[test]
    fn test_empty_identifier_gets_generated_id() {
        let content = b"id,name\n1,Alice\n,Bob\n3,Carol\n";
        let outcome = parse_rows(content, "id", "uploads/people.csv").unwrap();

        assert_eq!(outcome.rows.len(), 3);
        assert_eq!(outcome.skipped, 0);

        let bob = &outcome.rows[1];
        assert_eq!(bob.fields["name"], "Bob");
        assert!(!bob.id.is_empty());
        assert_ne!(bob.id, "1");
        assert_ne!(bob.id, "3");
    }

    #[test]
    fn test_generated_ids_are_stable_across_parses() {
        let content = b"id,name\n,Bob\n,Eve\n";
        let first = parse_rows(content, "id", "uploads/people.csv").unwrap();
        let again = parse_rows(content, "id", "uploads/people.csv").unwrap();

        assert_eq!(first.rows[0].id, again.rows[0].id);
        assert_eq!(first.rows[1].id, again.rows[1].id);
        assert_ne!(first.rows[0].id, first.rows[1].id);

        // A different object yields different identifiers for the same rows.
        let other = parse_rows(content, "id", "uploads/other.csv").unwrap();
        assert_ne!(other.rows[0].id, first.rows[0].id);
    }

    #[test]
    fn test_missing_identifier_column_generates_ids() {
        let content = b"name,age\nAlice,30\n";
        let outcome = parse_rows(content, "id", "uploads/people.csv").unwrap();

        assert_eq!(outcome.rows.len(), 1);
        assert!(!outcome.rows[0].id.is_empty());
    }

    #[test]
    fn test_malformed_rows_skipped_and_counted() {
        let content = b"id,name\n1,Alice\n2,Bob,extra\n3,Carol\n";
        let outcome = parse_rows(content, "id", "uploads/people.csv").unwrap();

        assert_eq!(outcome.rows.len(), 2);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.rows[1].id, "3");
    }

    #[test]
    fn test_all_rows_malformed() {
        let content = b"id,name\n1,Alice,extra\n2,Bob,extra\n";
        let err = parse_rows(content, "id", "uploads/people.csv").unwrap_err();

        match err {
            ParseError::NoValidRows { skipped } => assert_eq!(skipped, 2),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_header_only_file() {
        let content = b"id,name\n";
        let err = parse_rows(content, "id", "uploads/people.csv").unwrap_err();
        assert!(matches!(err, ParseError::NoValidRows { skipped: 0 }));
    }

    #[test]
    fn test_empty_file() {
        let err = parse_rows(b"", "id", "uploads/people.csv").unwrap_err();
        assert!(matches!(err, ParseError::NoValidRows { skipped: 0 }));
    }

    #[test]
    fn test_duplicate_ids_kept_in_order() {
        let content = b"id,name\n1,Alice\n1,Alicia\n";
        let outcome = parse_rows(content, "id", "uploads/people.csv").unwrap();

        assert_eq!(outcome.rows.len(), 2);
        assert_eq!(outcome.rows[0].fields["name"], "Alice");
        assert_eq!(outcome.rows[1].fields["name"], "Alicia");
    }

    #[test]
    fn test_quoted_fields() {
        let content = b"id,name\n1,\"Smith, Alice\"\n";
        let outcome = parse_rows(content, "id", "uploads/people.csv").unwrap();
        assert_eq!(outcome.rows[0].fields["name"], "Smith, Alice");
    }
}
