//! Entry point for the `load | query | mk | update | show | version`
//! dispatch contract, parameterized over a
//! [`TableService`] the embedding host supplies.

mod commands;
mod logger;
pub mod table_service;

use std::fs;
use std::io::{BufRead, BufReader};

use clap::Parser as _;
use ebq_load::{encode_csv_data, encode_row, CsvLoadOptions, TableDescription, TableKeys};
use ebq_rewrite::RewriteContext;
use ebq_schema::{EbqError, ExtendedSchema, MasterKey};
use serde_json::Map;

use commands::{Cli, Commands, LoadArgs, LoadFormat, MkArgs, QueryArgs, ShowArgs, UpdateArgs};
pub use table_service::{InMemoryTableService, TableService};

pub fn run_with_args<I, T, S>(args: I, service: &mut S) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
    S: TableService,
{
    let _ = logger::init();
    let cli = Cli::parse_from(args);

    let result = match cli.command {
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Mk(args) => run_mk(&cli.master_key_filename, args, service),
        Commands::Update(args) => run_update(&cli.master_key_filename, args, service),
        Commands::Show(args) => run_show(args, service),
        Commands::Load(args) => run_load(&cli.master_key_filename, args, service),
        Commands::Query(args) => run_query(&cli.master_key_filename, args, service),
    };

    match result {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("{e}");
            1
        }
    }
}

fn load_schema(path: &std::path::Path) -> Result<ExtendedSchema, EbqError> {
    let text = fs::read_to_string(path)?;
    let schema: ExtendedSchema = serde_json::from_str(&text).map_err(|e| EbqError::Format(format!("{}: {e}", path.display())))?;
    schema.validate()?;
    Ok(schema)
}

fn now_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now().duration_since(UNIX_EPOCH).expect("system clock is before the epoch").as_millis() as u64
}

/// Scopes a query's manifest aliases to this one invocation so
/// two concurrent queries never collide on the same alias.
fn random_query_uuid() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn run_mk<S: TableService>(key_path: &std::path::Path, args: MkArgs, service: &mut S) -> Result<(), EbqError> {
    let master_key = MasterKey::load_or_create(key_path)?;
    let schema = load_schema(&args.schema)?;
    let description = TableDescription::new(&master_key, now_ms(), schema, args.description);
    service.create_table(&args.table, &description)?;
    log::info!("created table {}", args.table);
    Ok(())
}

fn run_update<S: TableService>(key_path: &std::path::Path, args: UpdateArgs, service: &mut S) -> Result<(), EbqError> {
    let master_key = MasterKey::load_or_create(key_path)?;
    let mut description = service.fetch_description(&args.table)?;
    description.schema.validate()?;
    if master_key.table_hash() != description.table_hash {
        return Err(EbqError::KeyMismatch);
    }
    description.description = args.description;
    service.update_description(&args.table, &description)?;
    log::info!("updated description for table {}", args.table);
    Ok(())
}

fn run_show<S: TableService>(args: ShowArgs, service: &mut S) -> Result<(), EbqError> {
    let description = service.fetch_description(&args.table)?;
    let shown = ebq_schema::show_schema(&description.schema.0);
    let pretty = serde_json::to_string_pretty(&shown).map_err(|e| EbqError::Format(e.to_string()))?;
    println!("{pretty}");
    Ok(())
}

fn run_load<S: TableService>(key_path: &std::path::Path, args: LoadArgs, service: &mut S) -> Result<(), EbqError> {
    let master_key = MasterKey::load_or_create(key_path)?;
    let schema = load_schema(&args.schema)?;
    let description = service.fetch_description(&args.table)?;
    description.verify(&master_key, &schema)?;

    let table_id = ebq_schema::table_id(&args.table, description.created_ms);
    let keys = TableKeys::derive(&master_key, &table_id);
    let mut rng = rand::thread_rng();

    let encoded_rows = match args.format {
        LoadFormat::Json => {
            let file = fs::File::open(&args.rows)?;
            let mut encoded_rows = Vec::new();
            for line in BufReader::new(file).lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let row: Map<String, serde_json::Value> =
                    serde_json::from_str(&line).map_err(|e| EbqError::Format(format!("{}: not a JSON object: {e}", args.rows.display())))?;
                encoded_rows.push(encode_row(&schema.0, &row, &keys, &mut rng)?);
            }
            encoded_rows
        }
        LoadFormat::Csv => {
            let file = fs::File::open(&args.rows)?;
            let options = CsvLoadOptions { skip_leading_rows: args.skip_leading_rows, allow_quoted_newlines: args.allow_quoted_newlines };
            let result = encode_csv_data(&schema.0, file, &keys, &mut rng, &options)?;
            result
                .rows
                .into_iter()
                .map(|cells| result.header.iter().cloned().zip(cells.into_iter().map(serde_json::Value::String)).collect::<Map<String, serde_json::Value>>())
                .collect()
        }
    };

    let count = encoded_rows.len();
    service.stream_rows(&args.table, encoded_rows)?;
    log::info!("loaded {count} rows into {}", args.table);
    Ok(())
}

fn run_query<S: TableService>(key_path: &std::path::Path, args: QueryArgs, service: &mut S) -> Result<(), EbqError> {
    let master_key = MasterKey::load_or_create(key_path)?;
    let description = service.fetch_description(&args.table)?;
    if master_key.table_hash() != description.table_hash {
        return Err(EbqError::KeyMismatch);
    }

    let table_id = ebq_schema::table_id(&args.table, description.created_ms);
    let keys = TableKeys::derive(&master_key, &table_id);
    let query_uuid = random_query_uuid();
    let ctx = RewriteContext::new(&description.schema.0, &keys, query_uuid);
    let rewritten = ebq_rewrite::rewrite_query(&args.sql, &ctx)?;

    log::debug!("rewritten SQL: {}", rewritten.sql);
    let raw_rows = service.run_query(&args.table, &rewritten.sql)?;
    let rows = ebq_reassemble::reassemble(&rewritten, &keys, &raw_rows)?;

    for row in rows {
        println!("{}", serde_json::to_string(&row).map_err(|e| EbqError::Format(e.to_string()))?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    struct TempDir(std::path::PathBuf);

    impl TempDir {
        fn new(tag: &str) -> Self {
            let dir = std::env::temp_dir().join(format!("ebq-cli-test-{tag}-{}", std::process::id()));
            let _ = fs::remove_dir_all(&dir);
            fs::create_dir_all(&dir).unwrap();
            TempDir(dir)
        }

        fn path(&self, name: &str) -> std::path::PathBuf {
            self.0.join(name)
        }
    }

    impl Drop for TempDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.0);
        }
    }

    fn write(path: &std::path::Path, contents: &str) {
        let mut f = fs::File::create(path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
    }

    #[test]
    fn mk_load_and_query_round_trip() {
        let dir = TempDir::new("roundtrip");
        let key_path = dir.path("master.key");
        let schema_path = dir.path("schema.json");
        let rows_path = dir.path("rows.ndjson");

        write(&schema_path, r#"[{"name":"Year","type":"integer"},{"name":"Make","type":"string","encrypt":"pseudonym"}]"#);
        write(&rows_path, "{\"Year\": 2019, \"Make\": \"Ford\"}\n{\"Year\": 2021, \"Make\": \"Honda\"}\n");

        let mut service = InMemoryTableService::default();

        let code = run_with_args(["ebq", "--master_key_filename", key_path.to_str().unwrap(), "mk", "cars", schema_path.to_str().unwrap()], &mut service);
        assert_eq!(code, 0);

        let code = run_with_args(
            ["ebq", "--master_key_filename", key_path.to_str().unwrap(), "load", "cars", schema_path.to_str().unwrap(), rows_path.to_str().unwrap()],
            &mut service,
        );
        assert_eq!(code, 0);

        let code = run_with_args(["ebq", "--master_key_filename", key_path.to_str().unwrap(), "query", "cars", "SELECT Year FROM cars"], &mut service);
        assert_eq!(code, 0);
    }

    #[test]
    fn load_accepts_csv_rows() {
        let dir = TempDir::new("csv-load");
        let key_path = dir.path("master.key");
        let schema_path = dir.path("schema.json");
        let rows_path = dir.path("rows.csv");

        write(&schema_path, r#"[{"name":"Year","type":"integer"},{"name":"Make","type":"string","encrypt":"pseudonym"}]"#);
        write(&rows_path, "2019,Ford\n2021,Honda\n");

        let mut service = InMemoryTableService::default();
        let code = run_with_args(["ebq", "--master_key_filename", key_path.to_str().unwrap(), "mk", "cars", schema_path.to_str().unwrap()], &mut service);
        assert_eq!(code, 0);

        let code = run_with_args(
            ["ebq", "--master_key_filename", key_path.to_str().unwrap(), "load", "cars", schema_path.to_str().unwrap(), rows_path.to_str().unwrap(), "--format", "csv"],
            &mut service,
        );
        assert_eq!(code, 0);
    }

    #[test]
    fn show_hides_encryption_mode_behind_ciphertext() {
        let dir = TempDir::new("show");
        let key_path = dir.path("master.key");
        let schema_path = dir.path("schema.json");
        write(&schema_path, r#"[{"name":"Year","type":"integer"},{"name":"Make","type":"string","encrypt":"pseudonym"}]"#);

        let mut service = InMemoryTableService::default();
        let code = run_with_args(["ebq", "--master_key_filename", key_path.to_str().unwrap(), "mk", "cars", schema_path.to_str().unwrap()], &mut service);
        assert_eq!(code, 0);

        let description = service.fetch_description("cars").unwrap();
        let shown = ebq_schema::show_schema(&description.schema.0);
        assert_eq!(shown[0].ty, "integer");
        assert_eq!(shown[1].name, "Make");
        assert_eq!(shown[1].ty, "ciphertext");
    }

    #[test]
    fn version_prints_and_exits_zero() {
        let mut service = InMemoryTableService::default();
        let code = run_with_args(["ebq", "--master_key_filename", "/tmp/unused.key", "version"], &mut service);
        assert_eq!(code, 0);
    }
}
