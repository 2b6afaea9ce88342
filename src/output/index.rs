//! Tabular index backed by SQLite
//!
//! The index is one database file shared by every job; each job appends to
//! its own sheet, which is a table whose columns are the record schema. Rows
//! are only ever appended, in the order they were collected.

use crate::output::traits::{OutputError, OutputResult};
use rusqlite::{params_from_iter, Connection, TransactionBehavior};
use std::path::Path;
use std::time::Duration;

/// How long a writer waits on a lock held by another job
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// Opens (or creates) the index database
fn open_index(path: &Path) -> OutputResult<Connection> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(path)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
    ",
    )?;

    Ok(conn)
}

/// Quotes an identifier for use in SQL
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn validate_sheet(sheet: &str) -> OutputResult<()> {
    if sheet.trim().is_empty() || sheet.contains('\0') || sheet.starts_with("sqlite_") {
        return Err(OutputError::InvalidSheet(sheet.to_string()));
    }
    Ok(())
}

/// Columns of an existing sheet, or `None` if the sheet does not exist
fn sheet_columns(conn: &Connection, sheet: &str) -> OutputResult<Option<Vec<String>>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(sheet)))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;

    if columns.is_empty() {
        Ok(None)
    } else {
        Ok(Some(columns))
    }
}

/// Appends rows to a sheet, creating the index and sheet if needed
///
/// All rows go in with one transaction. If the sheet already exists its
/// columns must equal `columns`.
///
/// The write lock is taken before the column check, so parallel jobs
/// appending to one sheet wait on each other instead of failing.
///
/// # Returns
///
/// The number of rows appended
pub fn append_rows(path: &Path, sheet: &str, columns: &[String], rows: &[Vec<String>]) -> OutputResult<usize> {
    validate_sheet(sheet)?;

    for (i, row) in rows.iter().enumerate() {
        if row.len() != columns.len() {
            return Err(OutputError::RowWidth {
                row: i,
                expected: columns.len(),
                actual: row.len(),
            });
        }
    }

    let mut conn = open_index(path)?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    match sheet_columns(&tx, sheet)? {
        Some(existing) if existing != columns => {
            return Err(OutputError::ColumnMismatch {
                sheet: sheet.to_string(),
                existing,
                batch: columns.to_vec(),
            });
        }
        Some(_) => {}
        None => {
            let column_defs = columns
                .iter()
                .map(|c| format!("{} TEXT", quote_ident(c)))
                .collect::<Vec<_>>()
                .join(", ");
            tx.execute(
                &format!("CREATE TABLE IF NOT EXISTS {} ({})", quote_ident(sheet), column_defs),
                [],
            )?;
        }
    }

    let placeholders = (1..=columns.len())
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ");
    let insert = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(sheet),
        columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", "),
        placeholders
    );

    {
        let mut stmt = tx.prepare(&insert)?;
        for row in rows {
            stmt.execute(params_from_iter(row.iter()))?;
        }
    }

    tx.commit()?;

    tracing::debug!("Appended {} rows to sheet '{}' in {}", rows.len(), sheet, path.display());
    Ok(rows.len())
}

/// Reads every row of a sheet in insertion order
pub fn read_rows(path: &Path, sheet: &str) -> OutputResult<Vec<Vec<String>>> {
    validate_sheet(sheet)?;
    let conn = open_index(path)?;

    let Some(columns) = sheet_columns(&conn, sheet)? else {
        return Ok(Vec::new());
    };

    let mut stmt = conn.prepare(&format!("SELECT * FROM {} ORDER BY rowid", quote_ident(sheet)))?;
    let rows = stmt
        .query_map([], |row| {
            (0..columns.len())
                .map(|i| row.get::<_, Option<String>>(i).map(Option::unwrap_or_default))
                .collect::<Result<Vec<_>, _>>()
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Names of every sheet in the index, sorted
pub fn list_sheets(path: &Path) -> OutputResult<Vec<String>> {
    let conn = open_index(path)?;
    let mut stmt =
        conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name")?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names)
}
