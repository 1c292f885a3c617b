//! The remote table service's RPC client as a trait boundary. Every
//! subcommand in [`crate::commands`] bottoms out in one of these calls; the
//! embedding host supplies the implementation that actually talks to the
//! remote columnar table service.

use ebq_load::TableDescription;
use ebq_schema::EbqError;
use serde_json::{Map, Value};

pub trait TableService {
    /// Creates `table`, storing `description` as its metadata record.
    fn create_table(&mut self, table: &str, description: &TableDescription) -> Result<(), EbqError>;

    /// Replaces `table`'s stored metadata record, leaving rows untouched.
    fn update_description(&mut self, table: &str, description: &TableDescription) -> Result<(), EbqError>;

    /// Reads back `table`'s stored metadata record.
    fn fetch_description(&mut self, table: &str) -> Result<TableDescription, EbqError>;

    /// Runs server SQL (already rewritten) and returns its raw response
    /// rows, keyed by the manifest aliases the rewriter asked for.
    fn run_query(&mut self, table: &str, sql: &str) -> Result<Vec<Map<String, Value>>, EbqError>;

    /// Appends already-encrypted rows to `table`.
    fn stream_rows(&mut self, table: &str, rows: Vec<Map<String, Value>>) -> Result<(), EbqError>;
}

/// An in-memory stand-in for exercising the dispatch contract without a
/// real table service: a fake rather than a mock, since it keeps real
/// state instead of recording expectations.
#[derive(Default)]
pub struct InMemoryTableService {
    descriptions: std::collections::HashMap<String, TableDescription>,
    rows: std::collections::HashMap<String, Vec<Map<String, Value>>>,
}

impl TableService for InMemoryTableService {
    fn create_table(&mut self, table: &str, description: &TableDescription) -> Result<(), EbqError> {
        if self.descriptions.contains_key(table) {
            return Err(EbqError::Schema(format!("{table}: table already exists")));
        }
        self.descriptions.insert(table.to_string(), description.clone());
        self.rows.insert(table.to_string(), Vec::new());
        Ok(())
    }

    fn update_description(&mut self, table: &str, description: &TableDescription) -> Result<(), EbqError> {
        self.descriptions.insert(table.to_string(), description.clone());
        Ok(())
    }

    fn fetch_description(&mut self, table: &str) -> Result<TableDescription, EbqError> {
        self.descriptions.get(table).cloned().ok_or_else(|| EbqError::Schema(format!("{table}: no such table")))
    }

    fn run_query(&mut self, table: &str, _sql: &str) -> Result<Vec<Map<String, Value>>, EbqError> {
        Ok(self.rows.get(table).cloned().unwrap_or_default())
    }

    fn stream_rows(&mut self, table: &str, rows: Vec<Map<String, Value>>) -> Result<(), EbqError> {
        self.rows.entry(table.to_string()).or_default().extend(rows);
        Ok(())
    }
}
