use std::path::PathBuf;

use askdb_protocol::{ColumnInfo, Row, TableRef};
use askdb_sql::rewrite_top_as_limit;
use rusqlite::types::ValueRef;
use rusqlite::OpenFlags;
use serde_json::Value;
use tracing::debug;

use crate::database::{Connection, Connector, DatabaseError};

const SCHEMA_NAME: &str = "main";

/// Opens the database file read-only, once per call.
#[derive(Debug, Clone)]
pub struct SqliteConnector {
    path: PathBuf,
}

impl SqliteConnector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Connector for SqliteConnector {
    fn connect(&self) -> Result<Box<dyn Connection>, DatabaseError> {
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = rusqlite::Connection::open_with_flags(&self.path, flags).map_err(|source| {
            DatabaseError::Open {
                path: self.path.display().to_string(),
                source,
            }
        })?;
        Ok(Box::new(SqliteConnection { conn }))
    }
}

struct SqliteConnection {
    conn: rusqlite::Connection,
}

impl Connection for SqliteConnection {
    fn tables(&mut self) -> Result<Vec<TableRef>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
             ORDER BY name",
        )?;
        let names = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut tables = Vec::new();
        for name in names {
            tables.push(TableRef {
                schema: SCHEMA_NAME.to_string(),
                table: name?,
            });
        }
        Ok(tables)
    }

    fn columns(&mut self, table: &str) -> Result<Vec<ColumnInfo>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, type FROM pragma_table_info(?1) ORDER BY cid")?;
        let columns = stmt
            .query_map([table], |row| {
                Ok(ColumnInfo {
                    column: row.get(0)?,
                    data_type: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(columns)
    }

    fn query(&mut self, sql: &str) -> Result<Vec<Row>, DatabaseError> {
        let rewritten = rewrite_top_as_limit(sql);
        if let Some(rewritten) = rewritten.as_deref() {
            debug!(query = sql, rewritten, "rewrote TOP as LIMIT");
        }
        let sql = rewritten.as_deref().unwrap_or(sql);

        let mut stmt = self.conn.prepare(sql)?;
        let columns: Vec<String> = stmt
            .column_names()
            .iter()
            .map(|name| name.to_string())
            .collect();
        let mut rows_iter = stmt.query([])?;
        let mut rows = Vec::new();
        while let Some(row) = rows_iter.next()? {
            let mut record = Row::new();
            for (idx, name) in columns.iter().enumerate() {
                record.insert(name.clone(), sqlite_value_to_json(row.get_ref(idx)?));
            }
            rows.push(record);
        }
        Ok(rows)
    }
}

fn sqlite_value_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::from(v),
        ValueRef::Real(v) => serde_json::Number::from_f64(v)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(bytes.iter().map(|b| format!("{b:02x}")).collect()),
    }
}
