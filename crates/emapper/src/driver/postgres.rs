//! PostgreSQL connection backed by tokio-postgres.
//!
//! The async client is driven by a private current-thread runtime so the
//! connection can sit behind the blocking [`Connection`] trait. Parameters
//! bind positionally; the dialect's `$n::type` casts fix their wire types.

use crate::connection::{Connection, RowSet};
use crate::error::DriverError;
use crate::param::Parameter;
use crate::value::Value;
use chrono::{DateTime, NaiveDateTime, Utc};
use tokio::runtime::{Builder, Runtime};
use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::{Client, NoTls, Row};
use uuid::Uuid;

type BoxedParam = Box<dyn ToSql + Sync + Send>;

pub struct PgConnection {
    runtime: Runtime,
    client: Client,
}

impl std::fmt::Debug for PgConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgConnection")
            .field("closed", &self.client.is_closed())
            .finish()
    }
}

impl PgConnection {
    /// Connect with `NoTls` using a PostgreSQL connection URL.
    pub fn connect(database_url: &str) -> Result<Self, DriverError> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| DriverError::new(format!("failed to start runtime: {e}")))?;

        let (client, connection) = runtime.block_on(tokio_postgres::connect(database_url, NoTls))?;
        runtime.spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(target: "emapper.driver", error = %e, "postgres connection closed");
            }
        });

        Ok(Self { runtime, client })
    }
}

fn to_sql(value: &Value) -> BoxedParam {
    match value {
        Value::Null => Box::new(Option::<String>::None),
        Value::Int(v) => Box::new(*v),
        Value::Float(v) => Box::new(*v),
        Value::Bool(b) => Box::new(i64::from(*b)),
        Value::Text(s) => Box::new(s.clone()),
        Value::DateTime(dt) => Box::new(*dt),
        Value::Uuid(u) => Box::new(*u),
        Value::List(_) => Box::new(value.to_sql_literal()),
    }
}

fn decode(row: &Row, index: usize) -> Result<Value, DriverError> {
    let column = &row.columns()[index];
    let ty = column.type_();
    let value = match *ty {
        Type::BOOL => row.try_get::<_, Option<bool>>(index)?.map(Value::Bool),
        Type::INT2 => row.try_get::<_, Option<i16>>(index)?.map(Value::from),
        Type::INT4 => row.try_get::<_, Option<i32>>(index)?.map(Value::from),
        Type::INT8 => row.try_get::<_, Option<i64>>(index)?.map(Value::Int),
        Type::FLOAT4 => row.try_get::<_, Option<f32>>(index)?.map(Value::from),
        Type::FLOAT8 => row.try_get::<_, Option<f64>>(index)?.map(Value::Float),
        Type::TIMESTAMPTZ => row
            .try_get::<_, Option<DateTime<Utc>>>(index)?
            .map(Value::DateTime),
        Type::TIMESTAMP => row
            .try_get::<_, Option<NaiveDateTime>>(index)?
            .map(Value::from),
        Type::UUID => row.try_get::<_, Option<Uuid>>(index)?.map(Value::Uuid),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => {
            row.try_get::<_, Option<String>>(index)?.map(Value::Text)
        }
        Type::JSON | Type::JSONB => row
            .try_get::<_, Option<serde_json::Value>>(index)?
            .map(|json| Value::Text(json.to_string())),
        _ => {
            return Err(DriverError::new(format!(
                "unsupported type {} for column {}",
                ty.name(),
                column.name()
            )));
        }
    };
    Ok(value.unwrap_or(Value::Null))
}

impl Connection for PgConnection {
    fn query(&mut self, sql: &str, params: &[Parameter]) -> Result<RowSet, DriverError> {
        let boxed: Vec<BoxedParam> = params.iter().map(|p| to_sql(p.value())).collect();
        let refs: Vec<&(dyn ToSql + Sync)> = boxed.iter().map(|p| p.as_ref() as &(dyn ToSql + Sync)).collect();

        let client = &self.client;
        let (columns, rows) = self.runtime.block_on(async {
            let stmt = client.prepare(sql).await?;
            let columns: Vec<String> = stmt.columns().iter().map(|c| c.name().to_string()).collect();
            let rows = client.query(&stmt, &refs).await?;
            Ok::<_, tokio_postgres::Error>((columns, rows))
        })?;

        let mut set = RowSet::new(columns);
        for row in &rows {
            let values = (0..row.len())
                .map(|i| decode(row, i))
                .collect::<Result<Vec<_>, _>>()?;
            set.rows.push(values);
        }
        Ok(set)
    }

    fn execute(&mut self, sql: &str, params: &[Parameter]) -> Result<u64, DriverError> {
        let boxed: Vec<BoxedParam> = params.iter().map(|p| to_sql(p.value())).collect();
        let refs: Vec<&(dyn ToSql + Sync)> = boxed.iter().map(|p| p.as_ref() as &(dyn ToSql + Sync)).collect();

        let client = &self.client;
        Ok(self.runtime.block_on(client.execute(sql, &refs))?)
    }
}
