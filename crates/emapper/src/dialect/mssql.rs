use super::{Dialect, IsolationLevel, PageClause, TemplateSet, join_clauses, no_bundled_driver};
use crate::config::ConnectionSettings;
use crate::connection::Connection;
use crate::error::{DriverError, OrmError, OrmResult};
use crate::expr::{MatchKind, PredicateKind};
use crate::param::Parameter;

/// SQL Server syntax (2012 and later paging).
///
/// No driver is bundled; supply a connector.
#[derive(Debug, Clone)]
pub struct MsSqlDialect {
    templates: TemplateSet,
}

impl Default for MsSqlDialect {
    fn default() -> Self {
        Self::new()
    }
}

impl MsSqlDialect {
    pub fn new() -> Self {
        Self {
            templates: TemplateSet::ansi()
                .predicate(PredicateKind::Pattern(MatchKind::Full), "{0} LIKE '%' + {1} + '%'")
                .predicate(PredicateKind::Pattern(MatchKind::Prefix), "{0} LIKE {1} + '%'")
                .predicate(PredicateKind::Pattern(MatchKind::Suffix), "{0} LIKE '%' + {1}"),
        }
    }
}

impl Dialect for MsSqlDialect {
    fn name(&self) -> &'static str {
        "mssql"
    }

    fn templates(&self) -> &TemplateSet {
        &self.templates
    }

    fn placeholder(&self, param: &Parameter, _ordinal: usize) -> String {
        format!("@{}", param.name())
    }

    /// OFFSET/FETCH is only valid after an ORDER BY.
    fn paginate(&self, clause: &PageClause<'_>) -> OrmResult<String> {
        if clause.order_by.is_empty() {
            return Err(OrmError::argument("SQL Server paging requires an ORDER BY"));
        }
        let sql = clause.filtered_sql();
        let window = format!(
            "OFFSET {} ROWS FETCH NEXT {} ROWS ONLY",
            clause.paging.skip(),
            clause.paging.size()
        );
        Ok(join_clauses(&[&sql, clause.order_by, &window]))
    }

    fn identity_suffix(&self, _key_column: &str) -> String {
        "; SELECT @@IDENTITY".to_string()
    }

    fn affected_rows_suffix(&self) -> Option<&'static str> {
        Some("; SELECT @@ROWCOUNT")
    }

    fn update_head(&self, table: &str, alias: &str, assignments: &[(&str, String)]) -> String {
        let sets: Vec<String> = assignments
            .iter()
            .map(|(col, ph)| format!("{alias}.{col} = {ph}"))
            .collect();
        format!("UPDATE {alias} SET {} FROM {table} AS {alias}", sets.join(", "))
    }

    fn begin_transaction(&self, isolation: Option<IsolationLevel>) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(level) = isolation {
            out.push(format!("SET TRANSACTION ISOLATION LEVEL {}", level.as_sql()));
        }
        out.push("BEGIN TRANSACTION".to_string());
        out
    }

    fn commit_transaction(&self) -> &'static str {
        "COMMIT TRANSACTION"
    }

    fn rollback_transaction(&self) -> &'static str {
        "ROLLBACK TRANSACTION"
    }

    fn connect(&self, _settings: &ConnectionSettings) -> OrmResult<Box<dyn Connection>> {
        Err(no_bundled_driver("SQL Server"))
    }

    /// 3701: cannot drop, object does not exist.
    fn is_ignorable_removal_error(&self, err: &DriverError) -> bool {
        err.code.as_deref() == Some("3701")
    }
}
