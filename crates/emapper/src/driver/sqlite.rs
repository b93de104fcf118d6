//! SQLite connection backed by rusqlite.
//!
//! Parameters bind by placeholder name (`@p0`); raw SQL using positional
//! `?` placeholders falls back to binding in order. Timestamps are stored
//! as text in [`DATETIME_FORMAT`].

use crate::connection::{Connection, RowSet};
use crate::error::DriverError;
use crate::param::Parameter;
use crate::value::{DATETIME_FORMAT, Value};
use rusqlite::types::{Value as SqlValue, ValueRef};
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SqliteConnection {
    conn: rusqlite::Connection,
}

impl std::fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("path", &self.conn.path())
            .finish()
    }
}

impl SqliteConnection {
    /// Open (or create) the database file at `path`.
    pub fn open(path: &str) -> Result<Self, DriverError> {
        let conn = rusqlite::Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(Self { conn })
    }

    pub fn from_connection(conn: rusqlite::Connection) -> Self {
        Self { conn }
    }

    /// Run several `;`-separated statements without parameters.
    pub fn execute_batch(&self, sql: &str) -> Result<(), DriverError> {
        Ok(self.conn.execute_batch(sql)?)
    }

    fn prepare(&self, sql: &str, params: &[Parameter]) -> Result<rusqlite::Statement<'_>, DriverError> {
        let mut stmt = self.conn.prepare(sql)?;
        for (position, param) in params.iter().enumerate() {
            let index = match stmt.parameter_index(param.placeholder())? {
                Some(index) => index,
                None if position < stmt.parameter_count() => position + 1,
                None => {
                    return Err(DriverError::new(format!(
                        "placeholder {} does not appear in the statement",
                        param.placeholder()
                    )));
                }
            };
            stmt.raw_bind_parameter(index, to_sql(param.value()))?;
        }
        Ok(stmt)
    }
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Int(v) => SqlValue::Integer(*v),
        Value::Float(v) => SqlValue::Real(*v),
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::DateTime(dt) => SqlValue::Text(dt.format(DATETIME_FORMAT).to_string()),
        Value::Uuid(u) => SqlValue::Text(u.to_string()),
        Value::List(_) => SqlValue::Text(value.to_sql_literal()),
    }
}

fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Int(v),
        ValueRef::Real(v) => Value::Float(v),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

impl Connection for SqliteConnection {
    fn query(&mut self, sql: &str, params: &[Parameter]) -> Result<RowSet, DriverError> {
        let mut stmt = self.prepare(sql, params)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let width = columns.len();
        let mut set = RowSet::new(columns);

        let mut rows = stmt.raw_query();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(width);
            for index in 0..width {
                values.push(from_sql(row.get_ref(index)?));
            }
            set.rows.push(values);
        }
        Ok(set)
    }

    fn execute(&mut self, sql: &str, params: &[Parameter]) -> Result<u64, DriverError> {
        let mut stmt = self.prepare(sql, params)?;
        Ok(stmt.raw_execute()? as u64)
    }
}
