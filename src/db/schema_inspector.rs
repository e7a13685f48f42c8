use crate::db::DbError;
use rusqlite::Connection;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

const TABLES_QUERY: &str = "SELECT name FROM sqlite_master \
     WHERE type = 'table' AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\' \
     ORDER BY name";

const COLUMNS_QUERY: &str = "SELECT name, type, \"notnull\", dflt_value, pk \
     FROM pragma_table_info(?1) \
     ORDER BY cid";

/// One column of a table as declared in the schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub declared_type: String,
    #[serde(rename = "notnull")]
    pub not_null: bool,
    pub default_value: Option<String>,
    #[serde(rename = "primary_key")]
    pub is_primary_key: bool,
}

/// Table name to column list, in declaration order, as seen at inspection time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SchemaMetadata {
    tables: BTreeMap<String, Vec<ColumnDescriptor>>,
}

impl SchemaMetadata {
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// JSON rendering used as the schema section of a prompt.
    pub fn to_prompt_json(&self) -> String {
        // Plain strings and bools only, so serialization cannot fail.
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Lists every user table and its columns. Catalog tables (`sqlite_*`) are skipped.
pub fn inspect_schema(conn: &Connection) -> Result<SchemaMetadata, DbError> {
    let mut tables_stmt = conn.prepare(TABLES_QUERY)?;
    let table_names = tables_stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    let mut columns_stmt = conn.prepare(COLUMNS_QUERY)?;
    let mut tables = BTreeMap::new();

    for table_name in table_names {
        let columns = columns_stmt
            .query_map([&table_name], |row| {
                Ok(ColumnDescriptor {
                    name: row.get(0)?,
                    declared_type: row.get(1)?,
                    not_null: row.get::<_, i64>(2)? != 0,
                    default_value: row.get(3)?,
                    // pk is the 1-based position within the primary key, 0 when not part of it
                    is_primary_key: row.get::<_, i64>(4)? != 0,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        debug!("Table {} has {} columns", table_name, columns.len());
        tables.insert(table_name, columns);
    }

    Ok(SchemaMetadata { tables })
}

#[cfg(test)]
impl SchemaMetadata {
    pub fn columns(&self, table: &str) -> Option<&[ColumnDescriptor]> {
        self.tables.get(table).map(Vec::as_slice)
    }

    pub fn with_table(mut self, name: &str, columns: Vec<ColumnDescriptor>) -> Self {
        self.tables.insert(name.to_string(), columns);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE orders (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 customer TEXT NOT NULL,
                 status TEXT DEFAULT 'open',
                 total REAL
             );
             CREATE TABLE line_items (
                 order_id INTEGER,
                 sku TEXT,
                 PRIMARY KEY (order_id, sku)
             );
             CREATE VIEW open_orders AS SELECT * FROM orders WHERE status = 'open';
             INSERT INTO orders (customer) VALUES ('Alice');",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_every_user_table_is_listed() {
        let conn = sample_db();
        let schema = inspect_schema(&conn).unwrap();

        // AUTOINCREMENT creates sqlite_sequence; views are not tables
        assert_eq!(schema.table_count(), 2);
        assert_eq!(schema.table_names().collect::<Vec<_>>(), vec!["line_items", "orders"]);
        assert_eq!(schema.columns("orders").unwrap().len(), 4);
        assert_eq!(schema.columns("line_items").unwrap().len(), 2);
        assert!(schema.columns("sqlite_sequence").is_none());
    }

    #[test]
    fn test_only_reserved_prefix_is_skipped() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE sqlite1data (a INTEGER);
             CREATE TABLE sqlitex (b TEXT);
             CREATE TABLE orders (id INTEGER PRIMARY KEY AUTOINCREMENT);
             INSERT INTO orders DEFAULT VALUES;",
        )
        .unwrap();
        let schema = inspect_schema(&conn).unwrap();

        assert_eq!(
            schema.table_names().collect::<Vec<_>>(),
            vec!["orders", "sqlite1data", "sqlitex"]
        );
        assert!(schema.columns("sqlite_sequence").is_none());
    }

    #[test]
    fn test_column_descriptors_follow_declaration() {
        let conn = sample_db();
        let schema = inspect_schema(&conn).unwrap();
        let orders = schema.columns("orders").unwrap();

        let names: Vec<_> = orders.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "customer", "status", "total"]);

        assert_eq!(
            orders[0],
            ColumnDescriptor {
                name: "id".to_string(),
                declared_type: "INTEGER".to_string(),
                not_null: false,
                default_value: None,
                is_primary_key: true,
            }
        );
        assert!(orders[1].not_null);
        assert_eq!(orders[2].default_value.as_deref(), Some("'open'"));
        assert!(!orders[3].is_primary_key);

        let line_items = schema.columns("line_items").unwrap();
        assert!(line_items.iter().all(|c| c.is_primary_key));
    }

    #[test]
    fn test_empty_database() {
        let conn = Connection::open_in_memory().unwrap();
        let schema = inspect_schema(&conn).unwrap();
        assert!(schema.is_empty());
        assert_eq!(schema.to_prompt_json(), "{}");
    }

    #[test]
    fn test_prompt_json_shape() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT NOT NULL DEFAULT 'x');")
            .unwrap();
        let schema = inspect_schema(&conn).unwrap();

        assert_eq!(
            schema.to_prompt_json(),
            r#"{"t":[{"name":"id","type":"INTEGER","notnull":false,"default_value":null,"primary_key":true},{"name":"name","type":"TEXT","notnull":true,"default_value":"'x'","primary_key":false}]}"#
        );
    }

    #[test]
    fn test_not_a_database_is_a_connection_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.db");
        std::fs::write(&path, vec![b'x'; 4096]).unwrap();

        let conn = Connection::open(&path).unwrap();
        let err = inspect_schema(&conn).unwrap_err();
        assert!(matches!(err, DbError::ConnectionError(_)));
    }
}
