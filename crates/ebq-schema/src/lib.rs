pub mod column;
pub mod errors;
pub mod extended_schema;
pub mod master_key;
pub mod prefixes;
pub mod show;
pub mod token;

pub use column::{ColumnDescriptor, ColumnType, EncryptMode, Mode};
pub use errors::EbqError;
pub use extended_schema::ExtendedSchema;
pub use master_key::{table_id, KeyRole, MasterKey};
pub use prefixes::{rewrite_schema, PERIOD_REPLACEMENT, PREFIX_HOMOMORPHIC_FLOAT, PREFIX_HOMOMORPHIC_INT, PREFIX_PROBABILISTIC, PREFIX_PSEUDONYM, PREFIX_SEARCHWORDS};
pub use show::{show_schema, ShowField};
pub use token::{AggregationFn, BuiltinFn, Literal, Operator, Token};
