pub mod csv_load;
pub mod encode;
pub mod keys;
pub mod timestamp;

pub use csv_load::{encode_csv_data, encode_csv_row, CsvLoadOptions, CsvLoadResult};
pub use encode::encode_row;
pub use keys::{TableDescription, TableKeys};
pub use timestamp::parse_timestamp;
