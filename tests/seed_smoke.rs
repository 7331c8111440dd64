use async_compression::tokio::write::GzipEncoder;
use csv_seeder::{
    CollectingReporter, CsvSeeder, MemoryTable, OneWayHash, SchemaOracle, SeedConfig, SeedSummary,
    Sha256Hash, SqliteTable,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

fn write_csv(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

async fn write_gzip(dir: &Path, name: &str, contents: &[u8]) -> anyhow::Result<PathBuf> {
    let mut encoder = GzipEncoder::new(Vec::new());
    encoder.write_all(contents).await?;
    encoder.shutdown().await?;
    let path = dir.join(name);
    std::fs::write(&path, encoder.into_inner())?;
    Ok(path)
}

fn users() -> MemoryTable {
    MemoryTable::new().with_table("users", ["id", "name", "password"])
}

fn config(path: PathBuf) -> SeedConfig {
    SeedConfig {
        table: "users".into(),
        file: path,
        ..Default::default()
    }
}

fn seeder(
    config: SeedConfig,
    table: &Arc<MemoryTable>,
    reporter: &Arc<CollectingReporter>,
) -> CsvSeeder {
    CsvSeeder::new(config, table.clone()).with_reporter(reporter.clone())
}

#[tokio::test]
async fn hashes_password_and_inserts_one_call_per_record() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_csv(dir.path(), "users.csv", "id;name;password\n1;Alice; secret \n2;Bob;\n");
    let table = Arc::new(users());
    let reporter = Arc::new(CollectingReporter::default());

    let summary = seeder(SeedConfig { chunk_size: 1, ..config(path) }, &table, &reporter)
        .run()
        .await;

    assert_eq!(summary.records_mapped, 2);
    assert_eq!(table.insert_sizes(), vec![1, 1]);

    let rows = table.rows("users");
    assert_eq!(rows[0].value("id"), Some("1"));
    assert_eq!(rows[0].value("name"), Some("Alice"));
    let hashed = Sha256Hash::default().hash("secret");
    assert_eq!(rows[0].value("password"), Some(hashed.as_str()));
    assert_ne!(rows[0].value("password"), Some(" secret "));
    assert_eq!(rows[1].value("name"), Some("Bob"));
    assert!(rows[1].contains("password"));
    assert_eq!(rows[1].value("password"), None);
    assert!(reporter.messages().is_empty());
    Ok(())
}

#[tokio::test]
async fn header_columns_missing_from_schema_are_dropped() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_csv(dir.path(), "users.csv", "id;name;extra\n1;Alice;x\n2;Bob;y\n");
    let table = Arc::new(users());
    let reporter = Arc::new(CollectingReporter::default());

    seeder(config(path), &table, &reporter).run().await;

    let rows = table.rows("users");
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|row| !row.contains("extra")));
    assert!(rows.iter().all(|row| row.columns().collect::<Vec<_>>() == ["id", "name"]));
    Ok(())
}

#[tokio::test]
async fn missing_file_yields_empty_summary_and_one_error() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let table = Arc::new(users());
    let reporter = Arc::new(CollectingReporter::default());

    let summary = seeder(config(dir.path().join("nope.csv")), &table, &reporter)
        .run()
        .await;

    assert_eq!(summary, SeedSummary::default());
    assert!(summary.is_empty());
    assert!(table.calls().is_empty());
    let messages = reporter.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("does not exist or is not readable"));
    Ok(())
}

#[tokio::test]
async fn failing_middle_chunk_is_dropped_and_run_continues() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut csv = String::from("id;name\n");
    for i in 1..=6 {
        csv.push_str(&format!("{i};user{i}\n"));
    }
    let path = write_csv(dir.path(), "users.csv", &csv);
    let table = Arc::new(users().fail_on_call(2));
    let reporter = Arc::new(CollectingReporter::default());

    let summary = seeder(SeedConfig { chunk_size: 2, ..config(path.clone()) }, &table, &reporter)
        .run()
        .await;

    assert_eq!(summary.chunks_flushed, 3);
    assert_eq!(summary.chunks_failed, 1);
    assert_eq!(summary.records_inserted, 4);

    let ids: Vec<_> = table
        .rows("users")
        .iter()
        .filter_map(|row| row.value("id").map(str::to_string))
        .collect();
    assert_eq!(ids, ["1", "2", "5", "6"]);

    let messages = reporter.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains(&format!("file: {}", path.display())));
    Ok(())
}

#[tokio::test]
async fn chunk_sizes_cover_every_record_once() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut csv = String::from("id\n");
    for i in 0..23 {
        csv.push_str(&format!("{i}\n"));
    }
    let path = write_csv(dir.path(), "users.csv", &csv);
    let table = Arc::new(users());
    let reporter = Arc::new(CollectingReporter::default());

    let summary = seeder(SeedConfig { chunk_size: 5, ..config(path) }, &table, &reporter)
        .run()
        .await;

    assert_eq!(table.insert_sizes(), vec![5, 5, 5, 5, 3]);
    assert_eq!(summary.records_inserted, 23);
    let mut ids: Vec<usize> = table
        .rows("users")
        .iter()
        .filter_map(|row| row.value("id").and_then(|id| id.parse().ok()))
        .collect();
    ids.sort_unstable();
    assert_eq!(ids, (0..23).collect::<Vec<_>>());
    Ok(())
}

#[tokio::test]
async fn explicit_mapping_treats_first_row_as_data() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_csv(dir.path(), "users.csv", "1,skip,Alice\n2,skip,Bob\n");
    let table = Arc::new(users());
    let reporter = Arc::new(CollectingReporter::default());

    let summary = seeder(
        SeedConfig {
            delimiter: b',',
            column_mapping: Some([(0, "id".to_string()), (2, "name".to_string())].into()),
            ..config(path)
        },
        &table,
        &reporter,
    )
    .run()
    .await;

    assert_eq!(summary.rows_read, 2);
    assert_eq!(summary.records_mapped, 2);
    let rows = table.rows("users");
    assert_eq!(
        rows[1].iter().collect::<Vec<_>>(),
        vec![("id", Some("2")), ("name", Some("Bob"))]
    );
    Ok(())
}

#[tokio::test]
async fn quoted_fields_keep_delimiters_and_untrimmed_whitespace() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_csv(dir.path(), "users.csv", "id;name\n1;\" Smith; John \"\n");
    let table = Arc::new(users());
    let reporter = Arc::new(CollectingReporter::default());

    seeder(SeedConfig { trim_whitespace: false, ..config(path) }, &table, &reporter)
        .run()
        .await;

    assert_eq!(table.rows("users")[0].value("name"), Some(" Smith; John "));
    Ok(())
}

#[tokio::test]
async fn gzip_with_bom_offset_and_blank_lines_into_sqlite() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut csv = Vec::new();
    csv.extend_from_slice(b"exported 2024-01-01\n");
    csv.extend_from_slice(b"\xef\xbb\xbfid;name;password;legacy\n");
    for i in 0..1_000 {
        csv.extend_from_slice(format!("{i};User {i};pw{i};x\n").as_bytes());
        if i % 100 == 0 {
            csv.extend_from_slice(b"\n");
        }
    }
    csv.extend_from_slice(b";;;\n");
    // no extension hint: detection must come from the content
    let path = write_gzip(dir.path(), "users.dat", &csv).await?;

    let db = Arc::new(SqliteTable::open_in_memory()?);
    db.execute_batch("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, password TEXT)")?;
    let reporter = Arc::new(CollectingReporter::default());

    let summary = CsvSeeder::new(SeedConfig { offset_rows: 1, ..config(path) }, db.clone())
        .with_reporter(reporter.clone())
        .run()
        .await;

    assert_eq!(summary.records_mapped, 1_000);
    assert_eq!(summary.records_inserted, 1_000);
    assert_eq!(summary.chunks_flushed, 20);
    assert_eq!(db.count_rows("users")?, 1_000);
    assert!(reporter.messages().is_empty());
    Ok(())
}

#[tokio::test]
async fn corrupt_gzip_is_reported_once() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("users.csv");
    std::fs::write(&path, [0x1f, 0x8b, 0x08, 0x00, 0xde, 0xad, 0xbe, 0xef])?;
    let table = Arc::new(users());
    let reporter = Arc::new(CollectingReporter::default());

    let summary = seeder(config(path), &table, &reporter).run().await;

    assert_eq!(summary.records_inserted, 0);
    assert!(table.calls().is_empty());
    let messages = reporter.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].starts_with("CSV read failed"));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn independent_tables_seed_concurrently() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let users_csv = write_csv(dir.path(), "users.csv", "id;name\n1;Alice\n2;Bob\n");
    let roles_csv = write_csv(dir.path(), "roles.csv", "id;label\n1;admin\n");
    let table = Arc::new(users().with_table("roles", ["id", "label"]));
    let reporter = Arc::new(CollectingReporter::default());

    let users_run = seeder(config(users_csv), &table, &reporter);
    let roles_run = seeder(
        SeedConfig {
            table: "roles".into(),
            ..config(roles_csv)
        },
        &table,
        &reporter,
    );
    let (users, roles) = tokio::join!(
        tokio::spawn(async move { users_run.run().await }),
        tokio::spawn(async move { roles_run.run().await })
    );

    assert_eq!(users?.records_inserted, 2);
    assert_eq!(roles?.records_inserted, 1);
    assert_eq!(table.rows("roles")[0].value("label"), Some("admin"));
    Ok(())
}

#[tokio::test]
async fn seeder_name_defaults_resolve_under_base_path() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let seeds = dir.path().join("database/seeds/csvs");
    std::fs::create_dir_all(&seeds)?;
    write_csv(&seeds, "user_roles.csv", "id;label\n1;admin\n");
    let table = Arc::new(MemoryTable::new().with_table("user_roles", ["id", "label"]));
    let reporter = Arc::new(CollectingReporter::default());

    let summary = seeder(
        SeedConfig::for_seeder("UserRolesTableSeeder", dir.path()),
        &table,
        &reporter,
    )
    .run()
    .await;

    assert_eq!(summary.records_inserted, 1);
    assert_eq!(table.rows("user_roles").len(), 1);
    Ok(())
}

#[tokio::test]
async fn offset_counts_blank_lines_before_header() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_csv(
        dir.path(),
        "users.csv",
        "Exported users\n\nid;name\n1;Alice\n2;Bob\n",
    );
    let table = Arc::new(users());
    let reporter = Arc::new(CollectingReporter::default());

    let summary = seeder(SeedConfig { offset_rows: 2, ..config(path) }, &table, &reporter)
        .run()
        .await;

    assert_eq!(summary.rows_read, 5);
    assert_eq!(summary.records_inserted, 2);
    let names: Vec<_> = table
        .rows("users")
        .iter()
        .filter_map(|row| row.value("name").map(str::to_string))
        .collect();
    assert_eq!(names, ["Alice", "Bob"]);
    assert!(reporter.messages().is_empty());
    Ok(())
}

#[tokio::test]
async fn mixed_case_password_header_never_reaches_sink_in_plaintext() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_csv(dir.path(), "users.csv", "id;Password\n1;secret\n");
    let table = Arc::new(users());
    let reporter = Arc::new(CollectingReporter::default());

    seeder(config(path), &table, &reporter).run().await;

    let rows = table.rows("users");
    assert_eq!(rows.len(), 1);
    let hashed = Sha256Hash::default().hash("secret");
    assert_eq!(rows[0].value("Password"), Some(hashed.as_str()));
    assert!(rows[0].iter().all(|(_, value)| value != Some("secret")));
    Ok(())
}

#[tokio::test]
async fn separate_oracle_decides_header_pruning() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_csv(dir.path(), "users.csv", "id;name;password\n1;Alice;pw\n");
    let table = Arc::new(users());
    let reporter = Arc::new(CollectingReporter::default());
    let schema = MemoryTable::new().with_table("users", ["id"]);
    assert!(!schema.has_column("users", "name").await);

    seeder(config(path), &table, &reporter)
        .with_oracle(Arc::new(schema))
        .run()
        .await;

    let rows = table.rows("users");
    assert_eq!(rows[0].columns().collect::<Vec<_>>(), ["id"]);
    assert!(table.calls().iter().all(|call| call.accepted));
    Ok(())
}
