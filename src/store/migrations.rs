//! Idempotent schema loader
//!
//! Executes every `.sql` file in the schema directory in file-name order
//! (`00_`, `01_`, ...). Files must use `IF NOT EXISTS` so startup can rerun them.

use super::StoreError;
use rusqlite::Connection;
use std::fs;
use std::path::Path;

pub fn run_schema_migrations(conn: &mut Connection, schema_dir: impl AsRef<Path>) -> Result<(), StoreError> {
    let schema_path = schema_dir.as_ref();

    if !schema_path.is_dir() {
        return Err(StoreError::Migration(format!(
            "Schema directory not found: {}",
            schema_path.display()
        )));
    }

    let mut sql_files: Vec<_> = fs::read_dir(schema_path)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().extension().and_then(|s| s.to_str()) == Some("sql"))
        .collect();

    sql_files.sort_by_key(|entry| entry.file_name());

    if sql_files.is_empty() {
        return Err(StoreError::Migration(format!(
            "No .sql files in {}",
            schema_path.display()
        )));
    }

    log::info!("🔧 Running schema migrations from: {}", schema_path.display());

    let tx = conn.transaction()?;
    for entry in sql_files {
        let path = entry.path();
        let filename = entry.file_name().to_string_lossy().into_owned();

        log::debug!("   ├─ Executing: {}", filename);
        let sql_content = fs::read_to_string(&path)?;
        tx.execute_batch(&sql_content)
            .map_err(|e| StoreError::Migration(format!("{}: {}", filename, e)))?;
    }
    tx.commit()?;

    log::info!("✅ All schema migrations completed successfully");
    Ok(())
}
