use super::{Dialect, IsolationLevel, PageClause, TemplateSet, join_clauses, no_bundled_driver};
use crate::config::ConnectionSettings;
use crate::connection::Connection;
use crate::error::{DriverError, OrmError, OrmResult};
use crate::expr::{MatchKind, PredicateKind};
use crate::param::Parameter;
use crate::statement::Paging;
use crate::value::Value;

/// MySQL syntax.
///
/// Membership goes through `FIND_IN_SET` and patterns through `CONCAT`.
/// No driver is bundled; supply a connector.
#[derive(Debug, Clone)]
pub struct MySqlDialect {
    templates: TemplateSet,
}

impl Default for MySqlDialect {
    fn default() -> Self {
        Self::new()
    }
}

impl MySqlDialect {
    pub fn new() -> Self {
        Self {
            templates: TemplateSet::ansi()
                .predicate(PredicateKind::Membership, "FIND_IN_SET({0},{1})")
                .predicate(
                    PredicateKind::Pattern(MatchKind::Full),
                    "{0} LIKE CONCAT('%',{1},'%')",
                )
                .predicate(PredicateKind::Pattern(MatchKind::Prefix), "{0} LIKE CONCAT({1},'%')")
                .predicate(PredicateKind::Pattern(MatchKind::Suffix), "{0} LIKE CONCAT('%',{1})"),
        }
    }
}

impl Dialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
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
            Paging::Offset { size, .. } => format!("LIMIT {},{}", clause.paging.skip(), size),
            Paging::Cursor { size, .. } => format!("LIMIT {size}"),
        };
        Ok(join_clauses(&[&sql, clause.order_by, &limit]))
    }

    fn identity_suffix(&self, _key_column: &str) -> String {
        "; SELECT CAST(@@IDENTITY AS SIGNED)".to_string()
    }

    fn affected_rows_suffix(&self) -> Option<&'static str> {
        Some("; SELECT CAST(ROW_COUNT() AS SIGNED)")
    }

    fn update_head(&self, table: &str, alias: &str, assignments: &[(&str, String)]) -> String {
        let sets: Vec<String> = assignments
            .iter()
            .map(|(col, ph)| format!("{alias}.{col} = {ph}"))
            .collect();
        format!("UPDATE {table} AS {alias} SET {}", sets.join(", "))
    }

    /// `FIND_IN_SET` takes the set as one comma-separated string, so a
    /// member containing a comma cannot be expressed.
    fn membership_list(&self, values: &[Value]) -> OrmResult<String> {
        let mut members = Vec::with_capacity(values.len());
        for value in values {
            let member = value.to_string();
            if member.contains(',') {
                return Err(OrmError::unsupported(format!(
                    "FIND_IN_SET cannot match '{member}': set members must not contain ','"
                )));
            }
            members.push(member);
        }
        Ok(Value::Text(members.join(",")).to_sql_literal())
    }

    fn begin_transaction(&self, isolation: Option<IsolationLevel>) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(level) = isolation {
            out.push(format!("SET TRANSACTION ISOLATION LEVEL {}", level.as_sql()));
        }
        out.push("START TRANSACTION".to_string());
        out
    }

    fn connect(&self, _settings: &ConnectionSettings) -> OrmResult<Box<dyn Connection>> {
        Err(no_bundled_driver("MySQL"))
    }

    /// 1091: can't drop, check that it exists. 1051: unknown table.
    fn is_ignorable_removal_error(&self, err: &DriverError) -> bool {
        matches!(err.code.as_deref(), Some("1091") | Some("1051"))
    }
}
