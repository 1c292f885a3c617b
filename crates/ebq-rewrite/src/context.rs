//! Shared rewrite state: the flat top-level schema and the per-table keys
//! needed to encrypt literals for comparisons against encrypted columns.

use ebq_load::TableKeys;
use ebq_schema::{ColumnDescriptor, EbqError};

pub struct RewriteContext<'a> {
    pub schema: &'a [ColumnDescriptor],
    pub keys: &'a TableKeys,
    pub query_uuid: String,
}

impl<'a> RewriteContext<'a> {
    pub fn new(schema: &'a [ColumnDescriptor], keys: &'a TableKeys, query_uuid: impl Into<String>) -> Self {
        RewriteContext { schema, keys, query_uuid: query_uuid.into() }
    }

    /// Looks up a column by its plaintext name. Only top-level fields are
    /// addressable by a query; reaching into a `record` column's nested
    /// fields is out of scope for query rewriting (loading/reassembly
    /// still walk records recursively - only the query surface is flat).
    pub fn lookup(&self, name: &str) -> Result<&ColumnDescriptor, EbqError> {
        self.schema.iter().find(|c| c.name == name).ok_or_else(|| EbqError::invalid_query(name, "no such column"))
    }
}
