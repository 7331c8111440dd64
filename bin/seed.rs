use clap::{Arg, ArgAction, Command};
use csv_seeder::{CsvSeeder, SeedConfig, Sha256Hash, SqliteTable};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let matches = Command::new("seed")
        .about("Seed a SQLite table from a CSV file")
        .arg(
            Arg::new("db")
                .long("db")
                .required(true)
                .value_parser(clap::value_parser!(PathBuf))
                .help("SQLite database file"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_parser(clap::value_parser!(PathBuf))
                .help("JSON seed configuration; flags override it"),
        )
        .arg(
            Arg::new("seeder")
                .long("seeder")
                .help("Seeder name used to derive table and file, e.g. UsersTableSeeder"),
        )
        .arg(
            Arg::new("base-path")
                .long("base-path")
                .default_value(".")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(Arg::new("file").long("file").value_parser(clap::value_parser!(PathBuf)))
        .arg(Arg::new("table").long("table"))
        .arg(
            Arg::new("delimiter")
                .long("delimiter")
                .help("Single-byte field delimiter (default ;)"),
        )
        .arg(
            Arg::new("offset")
                .long("offset")
                .value_parser(clap::value_parser!(usize))
                .help("Lines to skip before the header"),
        )
        .arg(Arg::new("chunk-size").long("chunk-size").value_parser(clap::value_parser!(usize)))
        .arg(Arg::new("no-trim").long("no-trim").action(ArgAction::SetTrue))
        .arg(
            Arg::new("hashable")
                .long("hashable")
                .help("Column to hash before insert (default password)"),
        )
        .arg(
            Arg::new("no-hash")
                .long("no-hash")
                .action(ArgAction::SetTrue)
                .conflicts_with("hashable"),
        )
        .arg(
            Arg::new("map")
                .long("map")
                .action(ArgAction::Append)
                .help("Explicit INDEX=COLUMN mapping, repeatable"),
        )
        .arg(Arg::new("charset").long("charset"))
        .arg(Arg::new("salt").long("salt").default_value(""))
        .get_matches();

    let base_path = matches.get_one::<PathBuf>("base-path").cloned().unwrap_or_default();
    let config_path = matches.get_one::<PathBuf>("config");
    let mut config = match (config_path, matches.get_one::<String>("seeder")) {
        (Some(path), _) => SeedConfig::from_json_file(path)?,
        (None, Some(seeder)) => SeedConfig::for_seeder(seeder, &base_path),
        (None, None) => SeedConfig::default(),
    };

    if let Some(file) = matches.get_one::<PathBuf>("file") {
        config.file = file.clone();
    }
    if let Some(table) = matches.get_one::<String>("table") {
        config.table = table.clone();
    }
    if let Some(delimiter) = matches.get_one::<String>("delimiter") {
        config.delimiter = match delimiter.as_bytes() {
            [byte] => *byte,
            _ => anyhow::bail!("--delimiter must be a single byte, got {delimiter:?}"),
        };
    }
    if let Some(offset) = matches.get_one::<usize>("offset") {
        config.offset_rows = *offset;
    }
    if let Some(chunk_size) = matches.get_one::<usize>("chunk-size") {
        config.chunk_size = *chunk_size;
    }
    if matches.get_flag("no-trim") {
        config.trim_whitespace = false;
    }
    if let Some(hashable) = matches.get_one::<String>("hashable") {
        config.hashable = Some(hashable.clone());
    }
    if matches.get_flag("no-hash") {
        config.hashable = None;
    }
    if let Some(pairs) = matches.get_many::<String>("map") {
        config.column_mapping = Some(parse_mapping(pairs)?);
    }
    if let Some(charset) = matches.get_one::<String>("charset") {
        config.charset = charset.clone();
    }
    config.validate()?;

    let db_path = matches.get_one::<PathBuf>("db").cloned().unwrap_or_default();
    let destination = Arc::new(SqliteTable::open(&db_path)?);
    let salt = matches.get_one::<String>("salt").cloned().unwrap_or_default();

    let start = Instant::now();
    let seeder =
        CsvSeeder::new(config, destination).with_hasher(Arc::new(Sha256Hash::new(salt)));
    let summary = seeder.run().await;
    let elapsed = start.elapsed().as_secs_f64();

    println!(
        "table={} file={} rows={} mapped={} inserted={} chunks={} failed_chunks={}\nelapsed={:.1}s",
        seeder.config().table,
        seeder.config().file.display(),
        summary.rows_read,
        summary.records_mapped,
        summary.records_inserted,
        summary.chunks_flushed,
        summary.chunks_failed,
        elapsed
    );
    if summary.chunks_failed > 0 {
        std::process::exit(2);
    }
    Ok(())
}

fn parse_mapping<'a>(
    pairs: impl Iterator<Item = &'a String>,
) -> anyhow::Result<Vec<(usize, String)>> {
    pairs
        .map(|pair| -> anyhow::Result<(usize, String)> {
            let (index, column) = pair
                .split_once('=')
                .ok_or_else(|| anyhow::anyhow!("--map expects INDEX=COLUMN, got {pair:?}"))?;
            Ok((index.trim().parse::<usize>()?, column.trim().to_string()))
        })
        .collect()
}
