use csv_seeder::{CsvSeeder, MemoryTable, SeedConfig};
use std::path::Path;
use std::sync::Arc;

/// Seed into memory and print what would have been inserted.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = SeedConfig::for_seeder("UsersTableSeeder", Path::new("."));
    let columns = ["id", "name", "email", "password"];
    let table = Arc::new(MemoryTable::new().with_table("users", columns));

    let summary = CsvSeeder::new(config, table.clone()).run().await;
    for call in table.calls() {
        println!("insert into {}: {} records", call.table, call.records.len());
    }
    println!("{summary:?}");
    Ok(())
}
