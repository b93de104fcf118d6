use super::{Dialect, IsolationLevel, PageClause, TemplateSet, join_clauses};
use crate::config::ConnectionSettings;
use crate::connection::Connection;
use crate::error::{DriverError, OrmResult};
use crate::param::Parameter;
use crate::statement::Paging;
use crate::value::Value;

/// PostgreSQL syntax.
///
/// Placeholders carry an explicit cast (`$1::int8`) so integer and text
/// parameters compare against narrower column types. The soft-delete
/// column is expected to be an integer type.
#[derive(Debug, Clone)]
pub struct PostgresDialect {
    templates: TemplateSet,
}

impl Default for PostgresDialect {
    fn default() -> Self {
        Self::new()
    }
}

impl PostgresDialect {
    pub fn new() -> Self {
        Self {
            templates: TemplateSet::ansi().with_pipe_concat_like(),
        }
    }
}

fn cast_for(value: &Value) -> &'static str {
    match value {
        Value::Int(_) | Value::Bool(_) => "int8",
        Value::Float(_) => "float8",
        Value::DateTime(_) => "timestamptz",
        Value::Uuid(_) => "uuid",
        Value::Null | Value::Text(_) | Value::List(_) => "text",
    }
}

impl Dialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn templates(&self) -> &TemplateSet {
        &self.templates
    }

    fn placeholder(&self, param: &Parameter, ordinal: usize) -> String {
        format!("${}::{}", ordinal, cast_for(param.value()))
    }

    fn paginate(&self, clause: &PageClause<'_>) -> OrmResult<String> {
        let sql = clause.filtered_sql();
        let limit = match clause.paging {
            Paging::Offset { size, .. } => format!("LIMIT {} OFFSET {}", size, clause.paging.skip()),
            Paging::Cursor { size, .. } => format!("LIMIT {size}"),
        };
        Ok(join_clauses(&[&sql, clause.order_by, &limit]))
    }

    fn identity_suffix(&self, key_column: &str) -> String {
        format!(" RETURNING {key_column}")
    }

    fn affected_rows_suffix(&self) -> Option<&'static str> {
        None
    }

    fn begin_transaction(&self, isolation: Option<IsolationLevel>) -> Vec<String> {
        match isolation {
            Some(level) => vec![format!("BEGIN ISOLATION LEVEL {}", level.as_sql())],
            None => vec!["BEGIN".to_string()],
        }
    }

    #[cfg(feature = "postgres")]
    fn connect(&self, settings: &ConnectionSettings) -> OrmResult<Box<dyn Connection>> {
        let url = settings.resolve()?;
        crate::driver::postgres::PgConnection::connect(&url)
            .map(|c| Box::new(c) as Box<dyn Connection>)
            .map_err(|e| e.into_data_access("<connect>", Vec::new()))
    }

    #[cfg(not(feature = "postgres"))]
    fn connect(&self, _settings: &ConnectionSettings) -> OrmResult<Box<dyn Connection>> {
        Err(super::no_bundled_driver("PostgreSQL"))
    }

    /// 42704: undefined object. 42P01: undefined table.
    fn is_ignorable_removal_error(&self, err: &DriverError) -> bool {
        matches!(err.code.as_deref(), Some("42704") | Some("42P01"))
    }
}
