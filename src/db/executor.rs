use rusqlite::types::ValueRef;
use rusqlite::{Connection, Statement};
use serde::Serialize;
use std::fmt;
use tracing::debug;

/// A single result cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl From<ValueRef<'_>> for CellValue {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => CellValue::Null,
            ValueRef::Integer(i) => CellValue::Integer(i),
            ValueRef::Real(f) => CellValue::Real(f),
            ValueRef::Text(t) => CellValue::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => CellValue::Blob(b.to_vec()),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => write!(f, "NULL"),
            CellValue::Integer(i) => write!(f, "{}", i),
            CellValue::Real(r) => write!(f, "{}", r),
            CellValue::Text(t) => write!(f, "{}", t),
            CellValue::Blob(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

/// Column names and rows of an executed statement. Every row has one cell per column.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl QueryResult {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Runs `sql` to completion inside a savepoint that is always rolled back.
///
/// The engine has to accept and fully step the statement, so both syntax errors and
/// runtime errors surface here, but whatever the statement changes is undone.
pub fn trial_run(conn: &mut Connection, sql: &str) -> rusqlite::Result<()> {
    let savepoint = conn.savepoint()?;
    {
        let mut stmt = savepoint.prepare(sql)?;
        let mut rows = stmt.query([])?;
        let mut stepped = 0usize;
        while rows.next()?.is_some() {
            stepped += 1;
        }
        debug!("Trial run stepped {} rows", stepped);
    }
    savepoint.finish()?;
    Ok(())
}

/// Executes `sql` and collects every row together with the result-set column names.
pub fn execute_query(conn: &Connection, sql: &str) -> rusqlite::Result<QueryResult> {
    let mut stmt = conn.prepare(sql)?;
    let columns = column_names(&stmt);
    let column_count = columns.len();

    let mut rows = stmt.query([])?;
    let mut collected = Vec::new();
    while let Some(row) = rows.next()? {
        let mut cells = Vec::with_capacity(column_count);
        for i in 0..column_count {
            cells.push(CellValue::from(row.get_ref(i)?));
        }
        collected.push(cells);
    }

    Ok(QueryResult {
        columns,
        rows: collected,
    })
}

fn column_names(stmt: &Statement<'_>) -> Vec<String> {
    stmt.column_names().into_iter().map(str::to_string).collect()
}
