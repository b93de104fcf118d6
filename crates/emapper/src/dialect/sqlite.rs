use super::{Dialect, IsolationLevel, PageClause, TemplateSet, join_clauses};
use crate::config::ConnectionSettings;
use crate::connection::Connection;
use crate::error::{DriverError, OrmResult};
use crate::param::Parameter;
use crate::statement::Paging;

/// SQLite syntax, backed by the bundled rusqlite driver.
#[derive(Debug, Clone)]
pub struct SqliteDialect {
    templates: TemplateSet,
}

impl Default for SqliteDialect {
    fn default() -> Self {
        Self::new()
    }
}

impl SqliteDialect {
    pub fn new() -> Self {
        Self {
            templates: TemplateSet::ansi().with_pipe_concat_like(),
        }
    }
}

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn templates(&self) -> &TemplateSet {
        &self.templates
    }

    fn placeholder(&self, param: &Parameter, _ordinal: usize) -> String {
        format!("@{}", param.name())
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

    /// SQLite transactions are serializable; the requested level is ignored.
    fn begin_transaction(&self, _isolation: Option<IsolationLevel>) -> Vec<String> {
        vec!["BEGIN".to_string()]
    }

    #[cfg(feature = "sqlite")]
    fn connect(&self, settings: &ConnectionSettings) -> OrmResult<Box<dyn Connection>> {
        let url = settings.resolve()?;
        crate::driver::sqlite::SqliteConnection::open(&url)
            .map(|c| Box::new(c) as Box<dyn Connection>)
            .map_err(|e| e.into_data_access("<connect>", Vec::new()))
    }

    #[cfg(not(feature = "sqlite"))]
    fn connect(&self, _settings: &ConnectionSettings) -> OrmResult<Box<dyn Connection>> {
        Err(super::no_bundled_driver("SQLite"))
    }

    fn is_ignorable_removal_error(&self, err: &DriverError) -> bool {
        err.message.contains("no such index") || err.message.contains("no such table")
    }
}
