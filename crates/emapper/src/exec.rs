//! Execution core: runs translated statements against a connection.
//!
//! Read kinds go through the context's result cache first; a hit never
//! opens a connection. Outside an ambient transaction every statement gets
//! a short-lived connection that is dropped on every exit path.

use crate::connection::{Connection, RowSet};
use crate::context::MapperContext;
use crate::dialect::Dialect;
use crate::error::{OrmError, OrmResult};
use crate::statement::ExecuteKind;
use crate::translate::TranslationResult;

/// What a statement produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Rows(RowSet),
    Affected(u64),
    Identity(i64),
}

impl Outcome {
    pub fn into_rows(self) -> OrmResult<RowSet> {
        match self {
            Outcome::Rows(rows) => Ok(rows),
            other => Err(OrmError::Other(format!("expected rows, got {other:?}"))),
        }
    }

    pub fn affected(&self) -> u64 {
        match self {
            Outcome::Rows(rows) => rows.len() as u64,
            Outcome::Affected(n) => *n,
            Outcome::Identity(_) => 1,
        }
    }
}

/// Raw statements starting with one of these return rows.
fn returns_rows(sql: &str) -> bool {
    let head = sql.trim_start();
    ["SELECT", "WITH", "PRAGMA", "SHOW", "EXPLAIN", "VALUES"]
        .iter()
        .any(|kw| {
            head.len() >= kw.len()
                && head.is_char_boundary(kw.len())
                && head[..kw.len()].eq_ignore_ascii_case(kw)
        })
}

/// Run `result` on `conn`, mapping driver failures to [`OrmError::DataAccess`].
pub(crate) fn execute_on(
    conn: &mut dyn Connection,
    dialect: &dyn Dialect,
    result: &TranslationResult,
) -> OrmResult<Outcome> {
    let params = result.params.as_slice();
    let fail = |e: crate::error::DriverError| e.into_data_access(&result.sql, result.params.snapshot());

    match result.kind {
        ExecuteKind::Select | ExecuteKind::ScalarSelect => {
            conn.query(&result.sql, params).map(Outcome::Rows).map_err(fail)
        }
        ExecuteKind::Insert => {
            let rows = conn.query(&result.sql, params).map_err(fail)?;
            rows.scalar()
                .and_then(|v| v.as_i64())
                .map(Outcome::Identity)
                .ok_or_else(|| OrmError::decode("id", "insert returned no generated key"))
        }
        ExecuteKind::Update => match dialect.affected_rows_suffix() {
            Some(_) => {
                let rows = conn.query(&result.sql, params).map_err(fail)?;
                let count = rows.scalar().and_then(|v| v.as_i64()).unwrap_or(0);
                Ok(Outcome::Affected(u64::try_from(count).unwrap_or(0)))
            }
            None => conn.execute(&result.sql, params).map(Outcome::Affected).map_err(fail),
        },
        ExecuteKind::Raw if returns_rows(&result.sql) => {
            conn.query(&result.sql, params).map(Outcome::Rows).map_err(fail)
        }
        ExecuteKind::Raw => conn.execute(&result.sql, params).map(Outcome::Affected).map_err(fail),
    }
}

/// Run a translated statement on the ambient connection, or on a fresh one.
pub(crate) fn run(
    ctx: &MapperContext,
    ambient: Option<&mut (dyn Connection + 'static)>,
    result: &TranslationResult,
) -> OrmResult<Outcome> {
    let log = ctx.log();
    // Reads inside a transaction may see uncommitted rows; keep them out
    // of the shared cache in both directions.
    let cacheable = ambient.is_none() && result.kind.is_read() && ctx.options().cache.enabled;
    let cache_key = cacheable.then(|| result.fingerprint());

    if let Some(key) = &cache_key {
        let cached = ctx.cache().get(key);
        log.cache(cached.is_some(), key);
        if let Some(rows) = cached {
            return Ok(Outcome::Rows(rows));
        }
    }

    let dialect = ctx.dialect()?;
    let outcome = match ambient {
        Some(conn) => execute_on(conn, dialect.as_ref(), result),
        None => {
            let mut conn = ctx.connect()?;
            execute_on(conn.as_mut(), dialect.as_ref(), result)
        }
    };
    let outcome = outcome.inspect_err(|err| log.failed(result.kind.as_str(), &result.sql, err))?;

    if let (Some(key), Outcome::Rows(rows)) = (cache_key, &outcome) {
        ctx.cache().set(key, rows.clone(), ctx.options().cache.ttl);
    }
    Ok(outcome)
}
