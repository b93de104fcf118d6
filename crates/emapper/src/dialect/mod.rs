//! Per-database syntax strategy.
//!
//! A [`Dialect`] supplies format templates for predicates, joins and
//! ordering, plus hooks for paging, identity/affected-row retrieval,
//! transaction control, parameter placeholders and connections.
//! Templates use positional slots `{0}`, `{1}`, ...

mod mssql;
mod mysql;
mod postgres;
mod sqlite;

pub use mssql::MsSqlDialect;
pub use mysql::MySqlDialect;
pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;

use crate::config::ConnectionSettings;
use crate::connection::Connection;
use crate::error::{DriverError, OrmError, OrmResult};
use crate::expr::{CompareOp, MatchKind, PredicateKind};
use crate::param::Parameter;
use crate::statement::{JoinKind, OrderDirection, Paging};
use crate::value::Value;
use std::collections::HashMap;
use std::fmt;

/// Transaction isolation requested for a unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::ReadUncommitted => "READ UNCOMMITTED",
            Self::ReadCommitted => "READ COMMITTED",
            Self::RepeatableRead => "REPEATABLE READ",
            Self::Serializable => "SERIALIZABLE",
        }
    }
}

/// Format templates keyed by predicate, join and order kind.
#[derive(Debug, Clone, Default)]
pub struct TemplateSet {
    predicates: HashMap<PredicateKind, &'static str>,
    joins: HashMap<JoinKind, &'static str>,
    orders: HashMap<OrderDirection, &'static str>,
}

impl TemplateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connectives, comparisons, joins and ordering shared by all bundled dialects.
    pub fn ansi() -> Self {
        Self::new()
            .predicate(PredicateKind::And, "{0} AND {1}")
            .predicate(PredicateKind::Or, "{0} OR {1}")
            .predicate(PredicateKind::Not, "NOT ({0})")
            .predicate(PredicateKind::Compare(CompareOp::Eq), "{0} = {1}")
            .predicate(PredicateKind::Compare(CompareOp::Ne), "{0} <> {1}")
            .predicate(PredicateKind::Compare(CompareOp::Gt), "{0} > {1}")
            .predicate(PredicateKind::Compare(CompareOp::Ge), "{0} >= {1}")
            .predicate(PredicateKind::Compare(CompareOp::Lt), "{0} < {1}")
            .predicate(PredicateKind::Compare(CompareOp::Le), "{0} <= {1}")
            .predicate(PredicateKind::Membership, "{0} IN ({1})")
            .join(JoinKind::Inner, "INNER JOIN {0} AS {1} ON {2}")
            .join(JoinKind::Left, "LEFT JOIN {0} AS {1} ON {2}")
            .join(JoinKind::Right, "RIGHT JOIN {0} AS {1} ON {2}")
            .order(OrderDirection::Asc, "ORDER BY {0} ASC")
            .order(OrderDirection::Desc, "ORDER BY {0} DESC")
    }

    /// `LIKE` templates built on the `||` concatenation operator.
    pub fn with_pipe_concat_like(self) -> Self {
        self.predicate(PredicateKind::Pattern(MatchKind::Full), "{0} LIKE '%' || {1} || '%'")
            .predicate(PredicateKind::Pattern(MatchKind::Prefix), "{0} LIKE {1} || '%'")
            .predicate(PredicateKind::Pattern(MatchKind::Suffix), "{0} LIKE '%' || {1}")
    }

    pub fn predicate(mut self, kind: PredicateKind, template: &'static str) -> Self {
        self.predicates.insert(kind, template);
        self
    }

    pub fn join(mut self, kind: JoinKind, template: &'static str) -> Self {
        self.joins.insert(kind, template);
        self
    }

    pub fn order(mut self, direction: OrderDirection, template: &'static str) -> Self {
        self.orders.insert(direction, template);
        self
    }

    pub fn without_predicate(mut self, kind: PredicateKind) -> Self {
        self.predicates.remove(&kind);
        self
    }

    pub fn without_join(mut self, kind: JoinKind) -> Self {
        self.joins.remove(&kind);
        self
    }

    pub fn predicate_template(&self, kind: PredicateKind) -> Option<&'static str> {
        self.predicates.get(&kind).copied()
    }

    pub fn join_template(&self, kind: JoinKind) -> Option<&'static str> {
        self.joins.get(&kind).copied()
    }

    pub fn order_template(&self, direction: OrderDirection) -> Option<&'static str> {
        self.orders.get(&direction).copied()
    }
}

/// Substitute `{n}` slots in a single pass, so argument text that happens
/// to contain `{n}` is never re-expanded.
pub fn fill(template: &str, args: &[&str]) -> String {
    let mut out = String::with_capacity(template.len() + args.iter().map(|a| a.len()).sum::<usize>());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('}') {
            Some(end) => match after[..end].parse::<usize>() {
                Ok(slot) if slot < args.len() => {
                    out.push_str(args[slot]);
                    rest = &after[end + 1..];
                }
                _ => {
                    out.push('{');
                    rest = after;
                }
            },
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Inputs to a dialect's paging hook.
#[derive(Debug, Clone, Copy)]
pub struct PageClause<'a> {
    /// `SELECT ... FROM ... [WHERE ...]` without ordering.
    pub sql: &'a str,
    pub has_where: bool,
    /// Rendered ORDER BY clause.
    pub order_by: &'a str,
    /// `alias.id` of the main entity.
    pub key_column: &'a str,
    pub paging: Paging,
}

impl PageClause<'_> {
    /// `sql` with the cursor predicate (`key < cursor`) attached, when in cursor mode.
    pub fn filtered_sql(&self) -> String {
        match self.paging {
            Paging::Cursor { after_key, .. } => {
                let glue = if self.has_where { "AND" } else { "WHERE" };
                format!("{} {} {} < {}", self.sql, glue, self.key_column, after_key)
            }
            Paging::Offset { .. } => self.sql.to_string(),
        }
    }
}

/// Syntax rule set for one relational database product.
pub trait Dialect: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    fn templates(&self) -> &TemplateSet;

    /// Placeholder text for the parameter at 1-based `ordinal`.
    fn placeholder(&self, param: &Parameter, ordinal: usize) -> String;

    /// Apply ORDER BY and paging to a select.
    fn paginate(&self, clause: &PageClause<'_>) -> OrmResult<String>;

    /// Appended to an INSERT so it yields the generated key.
    fn identity_suffix(&self, key_column: &str) -> String;

    /// Appended to an UPDATE so it yields the affected-row count.
    /// `None` when the driver reports the count itself.
    fn affected_rows_suffix(&self) -> Option<&'static str>;

    /// Leading `UPDATE ... SET ...` part. `assignments` pairs a column with
    /// its placeholder.
    fn update_head(&self, table: &str, alias: &str, assignments: &[(&str, String)]) -> String {
        let sets: Vec<String> = assignments
            .iter()
            .map(|(col, ph)| format!("{col} = {ph}"))
            .collect();
        format!("UPDATE {table} AS {alias} SET {}", sets.join(", "))
    }

    /// Inline rendering of a membership value set, used as slot `{1}` of
    /// the membership template.
    fn membership_list(&self, values: &[Value]) -> OrmResult<String> {
        Ok(values
            .iter()
            .map(Value::to_sql_literal)
            .collect::<Vec<_>>()
            .join(","))
    }

    /// Statements that open a transaction.
    fn begin_transaction(&self, isolation: Option<IsolationLevel>) -> Vec<String>;

    fn commit_transaction(&self) -> &'static str {
        "COMMIT"
    }

    fn rollback_transaction(&self) -> &'static str {
        "ROLLBACK"
    }

    /// Open a connection with the bundled driver.
    fn connect(&self, settings: &ConnectionSettings) -> OrmResult<Box<dyn Connection>>;

    /// Errors an idempotent removal may swallow (e.g. dropping a missing index).
    fn is_ignorable_removal_error(&self, err: &DriverError) -> bool;

    /// Parameter factory: coerce the value and assign this dialect's placeholder.
    fn create_parameter(
        &self,
        name: &str,
        value: Value,
        ordinal: usize,
    ) -> OrmResult<Parameter> {
        let mut param = Parameter::new(name, value)?;
        let placeholder = self.placeholder(&param, ordinal);
        param.set_placeholder(placeholder);
        Ok(param)
    }

    fn format_predicate(&self, kind: PredicateKind, args: &[&str]) -> OrmResult<String> {
        self.templates()
            .predicate_template(kind)
            .map(|t| fill(t, args))
            .ok_or_else(|| {
                OrmError::configuration(format!("{} has no template for {kind:?}", self.name()))
            })
    }

    fn format_join(&self, kind: JoinKind, table: &str, alias: &str, on: &str) -> OrmResult<String> {
        self.templates()
            .join_template(kind)
            .map(|t| fill(t, &[table, alias, on]))
            .ok_or_else(|| {
                OrmError::configuration(format!("{} has no template for {kind:?} join", self.name()))
            })
    }

    fn format_order(&self, direction: OrderDirection, key: &str) -> OrmResult<String> {
        self.templates()
            .order_template(direction)
            .map(|t| fill(t, &[key]))
            .ok_or_else(|| {
                OrmError::configuration(format!(
                    "{} has no template for {direction:?} ordering",
                    self.name()
                ))
            })
    }
}

/// Join non-empty clauses with single spaces.
pub(crate) fn join_clauses(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|p| !p.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Connection factory for dialects without a bundled driver.
pub(crate) fn no_bundled_driver(dialect: &str) -> OrmError {
    OrmError::configuration(format!(
        "{dialect} has no bundled driver; configure a connector with MapperOptions::connector"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_substitutes_slots_once() {
        assert_eq!(fill("{0} = {1}", &["u.id", "@p0"]), "u.id = @p0");
        assert_eq!(fill("NOT ({0})", &["'{1}'"]), "NOT ('{1}')");
        assert_eq!(fill("{0} {9}", &["a"]), "a {9}");
        assert_eq!(fill("{x", &[]), "{x");
    }

    #[test]
    fn ansi_set_covers_core_kinds() {
        let t = TemplateSet::ansi();
        assert!(t.predicate_template(PredicateKind::And).is_some());
        assert!(t.predicate_template(PredicateKind::Compare(CompareOp::Le)).is_some());
        assert!(t.join_template(JoinKind::Right).is_some());
        assert!(t.order_template(OrderDirection::Desc).is_some());
        assert!(t.predicate_template(PredicateKind::Pattern(MatchKind::Full)).is_none());
    }

    #[test]
    fn cursor_clause_attaches_key_predicate() {
        let clause = PageClause {
            sql: "SELECT u.id FROM users AS u",
            has_where: false,
            order_by: "ORDER BY u.id DESC",
            key_column: "u.id",
            paging: Paging::Cursor {
                after_key: 50,
                size: 10,
            },
        };
        assert_eq!(clause.filtered_sql(), "SELECT u.id FROM users AS u WHERE u.id < 50");
    }
}
