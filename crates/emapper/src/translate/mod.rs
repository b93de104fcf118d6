//! Lowers a [`Statement`] into SQL text plus ordered parameters.
//!
//! Predicates are reduced depth-first. Columns resolve to `alias.column`
//! through the registry; comparison values are bound as parameters, while
//! boolean/numeric literals and membership sets are inlined. Every piece of
//! syntax comes from the active [`Dialect`].


use crate::changeset::{ValidationCode, ValidationError};
use crate::dialect::{Dialect, PageClause, join_clauses};
use crate::entity::{ChangedField, EntityRef, ID, IS_DELETED};
use crate::error::{OrmError, OrmResult};
use crate::expr::{ColumnRef, Operand, Predicate, PredicateKind};
use crate::ident::{self, IdentKind};
use crate::param::ParamList;
use crate::registry::{EntityMeta, EntityRegistry};
use crate::statement::{ExecuteKind, OrderDirection, Paging, ProjectionItem, Statement};
use crate::value::Value;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;

/// SQL text and ordered parameters of one translated statement.
#[derive(Debug, Clone)]
pub struct TranslationResult {
    pub sql: String,
    pub params: ParamList,
    pub kind: ExecuteKind,
}

impl TranslationResult {
    /// SQL with each placeholder replaced by its parameter's literal value.
    ///
    /// The SQL is scanned once, left to right, so text inside a substituted
    /// literal is never mistaken for another placeholder. Where placeholders
    /// share a prefix the longest match wins (`@p10` before `@p1`).
    pub fn bound_sql(&self) -> String {
        let mut params: Vec<_> = self.params.iter().collect();
        params.sort_by(|a, b| b.placeholder().len().cmp(&a.placeholder().len()));

        let mut out = String::with_capacity(self.sql.len());
        let mut rest = self.sql.as_str();
        while let Some(ch) = rest.chars().next() {
            let hit = params
                .iter()
                .find(|p| !p.placeholder().is_empty() && rest.starts_with(p.placeholder()));
            match hit {
                Some(p) => {
                    out.push_str(&p.value().to_sql_literal());
                    rest = &rest[p.placeholder().len()..];
                }
                None => {
                    out.push(ch);
                    rest = &rest[ch.len_utf8()..];
                }
            }
        }
        out
    }

    /// Hex SHA-256 of [`bound_sql`](Self::bound_sql); the result cache key.
    pub fn fingerprint(&self) -> String {
        format!("{:x}", Sha256::digest(self.bound_sql().as_bytes()))
    }
}

impl fmt::Display for TranslationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for word in self.sql.split_whitespace() {
            if !first {
                f.write_str(" ")?;
            }
            f.write_str(word)?;
            first = false;
        }
        Ok(())
    }
}

/// Single-use translator for one statement.
pub struct Translator<'a> {
    dialect: &'a dyn Dialect,
    registry: &'a EntityRegistry,
    params: ParamList,
    scope: Vec<(EntityRef, Arc<EntityMeta>)>,
}

impl<'a> Translator<'a> {
    pub fn new(dialect: &'a dyn Dialect, registry: &'a EntityRegistry) -> Self {
        Self {
            dialect,
            registry,
            params: ParamList::new(),
            scope: Vec::new(),
        }
    }

    pub fn translate(mut self, stmt: Statement) -> OrmResult<TranslationResult> {
        if let Some(message) = stmt.build_error() {
            return Err(OrmError::argument(message));
        }
        let kind = stmt.kind;
        let sql = match kind {
            ExecuteKind::Select | ExecuteKind::ScalarSelect => self.select(&stmt)?,
            ExecuteKind::Insert => self.insert(&stmt)?,
            ExecuteKind::Update => self.update(&stmt)?,
            ExecuteKind::Raw => self.raw(stmt)?,
        };
        Ok(TranslationResult {
            sql,
            params: self.params,
            kind,
        })
    }

    fn main_entity(&mut self, stmt: &Statement) -> OrmResult<Arc<EntityMeta>> {
        let entity = stmt
            .entity
            .ok_or_else(|| OrmError::argument(format!("{} statement has no entity", stmt.kind.as_str())))?;
        let meta = self.registry.resolve(entity)?;
        self.scope.push((entity, Arc::clone(&meta)));
        Ok(meta)
    }

    fn enter_scope(&mut self, entity: EntityRef) -> OrmResult<Arc<EntityMeta>> {
        let meta = self.registry.resolve(entity)?;
        for (existing, existing_meta) in &self.scope {
            if *existing == entity {
                return Err(OrmError::argument(format!(
                    "{} is joined more than once",
                    meta.type_name
                )));
            }
            if existing_meta.alias == meta.alias {
                return Err(OrmError::argument(format!(
                    "alias '{}' is used by both {} and {}",
                    meta.alias, existing_meta.type_name, meta.type_name
                )));
            }
        }
        self.scope.push((entity, Arc::clone(&meta)));
        Ok(meta)
    }

    fn column(&self, col: &ColumnRef) -> OrmResult<String> {
        let (_, meta) = self
            .scope
            .iter()
            .find(|(entity, _)| *entity == col.entity)
            .ok_or_else(|| {
                OrmError::argument(format!(
                    "{} is not part of this statement",
                    col.entity.model().type_name
                ))
            })?;
        if meta.column_index(col.column).is_none() {
            return Err(OrmError::argument(format!(
                "{} has no column '{}'",
                meta.type_name, col.column
            )));
        }
        Ok(meta.qualify(col.column))
    }

    fn bind(&mut self, value: Value) -> OrmResult<String> {
        let name = format!("p{}", self.params.len());
        let param = self.dialect.create_parameter(&name, value, self.params.len() + 1)?;
        let placeholder = param.placeholder().to_string();
        self.params.push(param);
        Ok(placeholder)
    }

    /// Right-hand side of an INSERT or SET assignment. NULL is written
    /// inline; everything else is bound.
    fn assigned(&mut self, value: &Value) -> OrmResult<String> {
        match value {
            Value::Null => Ok("NULL".to_string()),
            other => self.bind(other.clone()),
        }
    }

    fn predicate(&mut self, p: &Predicate) -> OrmResult<String> {
        match p {
            Predicate::And(items) | Predicate::Or(items) => {
                let kind = p.kind();
                let mut acc: Option<String> = None;
                for item in items {
                    let part = self.grouped(item)?;
                    acc = Some(match acc {
                        Some(left) => self.dialect.format_predicate(kind, &[&left, &part])?,
                        None => part,
                    });
                }
                acc.ok_or_else(|| OrmError::argument(format!("empty {kind:?} group")))
            }
            Predicate::Not(inner) => {
                let inner = self.predicate(inner)?;
                self.dialect.format_predicate(PredicateKind::Not, &[&inner])
            }
            Predicate::Compare { op, left, right } => {
                let left = self.column(left)?;
                let right = match right {
                    Operand::Column(col) => self.column(col)?,
                    Operand::Literal(v) => match v {
                        Value::Int(_) | Value::Float(_) | Value::Bool(_) => v.to_sql_literal(),
                        other => {
                            return Err(OrmError::unsupported(format!(
                                "only numeric and boolean literals can be inlined, got {}",
                                other.kind().as_str()
                            )));
                        }
                    },
                    Operand::Value(v) => {
                        match v {
                            Value::Null => {
                                return Err(OrmError::argument(format!(
                                    "comparison of {left} with NULL"
                                )));
                            }
                            Value::List(_) => {
                                return Err(OrmError::unsupported(format!(
                                    "comparison of {left} against a collection; use in_list"
                                )));
                            }
                            Value::Bool(_) if op.is_ordering() => {
                                return Err(OrmError::unsupported(format!(
                                    "ordering comparison of {left} against a boolean"
                                )));
                            }
                            _ => {}
                        }
                        self.bind(v.clone())?
                    }
                };
                self.dialect.format_predicate(p.kind(), &[&left, &right])
            }
            Predicate::Membership { column, values } => {
                let column = self.column(column)?;
                if values.is_empty() {
                    return Ok("1=0".to_string());
                }
                if let Some(bad) = values.iter().find(|v| matches!(v, Value::List(_) | Value::Null)) {
                    return Err(OrmError::unsupported(format!(
                        "membership set of {column} contains a {} value",
                        bad.kind().as_str()
                    )));
                }
                let list = self.dialect.membership_list(values)?;
                self.dialect.format_predicate(p.kind(), &[&column, &list])
            }
            Predicate::Pattern { column, value, .. } => {
                let column = self.column(column)?;
                if !matches!(value, Value::Text(_)) {
                    return Err(OrmError::unsupported(format!(
                        "pattern match on {column} needs a text value, got {}",
                        value.kind().as_str()
                    )));
                }
                let placeholder = self.bind(value.clone())?;
                self.dialect.format_predicate(p.kind(), &[&column, &placeholder])
            }
        }
    }

    /// Lower a child of a connective, parenthesized when it is itself a
    /// multi-item connective.
    fn grouped(&mut self, p: &Predicate) -> OrmResult<String> {
        let sql = self.predicate(p)?;
        Ok(match p {
            Predicate::And(items) | Predicate::Or(items) if items.len() > 1 => format!("({sql})"),
            _ => sql,
        })
    }

    /// WHERE body: the filter plus the soft-delete guard of the main entity.
    fn where_body(&mut self, filter: Option<&Predicate>, main: &EntityMeta) -> OrmResult<Option<String>> {
        let filter = filter.map(|f| self.grouped(f)).transpose()?;
        let guard = main
            .soft_delete
            .then(|| format!("{} = 0", main.qualify(IS_DELETED)));
        Ok(match (filter, guard) {
            (Some(f), Some(g)) => Some(self.dialect.format_predicate(PredicateKind::And, &[&f, &g])?),
            (Some(f), None) => Some(f),
            (None, Some(g)) => Some(g),
            (None, None) => None,
        })
    }

    fn select(&mut self, stmt: &Statement) -> OrmResult<String> {
        let main = self.main_entity(stmt)?;
        for join in &stmt.joins {
            self.enter_scope(join.entity)?;
        }

        let select_list = if stmt.kind == ExecuteKind::ScalarSelect {
            "COUNT(*)".to_string()
        } else {
            match &stmt.projection {
                Some(projection) => {
                    let mut cols = Vec::with_capacity(projection.items.len());
                    for item in &projection.items {
                        cols.push(match item {
                            ProjectionItem::Column(c) => self.column(c)?,
                            ProjectionItem::Aliased(c, name) => {
                                ident::check(IdentKind::Column, name)
                                    .map_err(|_| OrmError::argument(format!("invalid projection alias '{name}'")))?;
                                format!("{} AS {}", self.column(c)?, name)
                            }
                            ProjectionItem::CountAll => "COUNT(*)".to_string(),
                        });
                    }
                    cols.join(", ")
                }
                None => main
                    .fields
                    .iter()
                    .map(|f| main.qualify(f.column))
                    .collect::<Vec<_>>()
                    .join(", "),
            }
        };

        let mut sql = format!("SELECT {} FROM {} AS {}", select_list, main.table, main.alias);

        for (position, join) in stmt.joins.iter().enumerate() {
            let meta = Arc::clone(&self.scope[position + 1].1);
            let predicate = join.predicate.as_ref().ok_or_else(|| {
                OrmError::argument(format!("join with {} has no predicate", meta.type_name))
            })?;
            if !predicate.columns().iter().any(|c| c.entity == join.entity) {
                return Err(OrmError::argument(format!(
                    "join predicate does not reference {}",
                    meta.type_name
                )));
            }
            let on = self.predicate(predicate)?;
            let clause = self.dialect.format_join(join.kind, meta.table, meta.alias, &on)?;
            sql.push(' ');
            sql.push_str(&clause);
        }

        let where_body = self.where_body(stmt.filter.as_ref(), &main)?;
        let has_where = where_body.is_some();
        if let Some(body) = where_body {
            sql.push_str(" WHERE ");
            sql.push_str(&body);
        }

        if stmt.kind == ExecuteKind::ScalarSelect {
            return Ok(sql);
        }

        let order_by = match &stmt.order {
            Some(order) => {
                let key = self.column(&order.key)?;
                self.dialect.format_order(order.direction, &key)?
            }
            None => match stmt.paging {
                Some(Paging::Cursor { .. }) => {
                    self.dialect.format_order(OrderDirection::Desc, &main.qualify(ID))?
                }
                // A page window needs a stable order; fall back to the key.
                Some(Paging::Offset { .. }) => {
                    self.dialect.format_order(OrderDirection::Asc, &main.qualify(ID))?
                }
                None => String::new(),
            },
        };

        match stmt.paging {
            Some(paging) => {
                let key_column = main.qualify(ID);
                self.dialect.paginate(&PageClause {
                    sql: &sql,
                    has_where,
                    order_by: &order_by,
                    key_column: &key_column,
                    paging,
                })
            }
            None => Ok(join_clauses(&[&sql, &order_by])),
        }
    }

    fn resolve_values<'v>(
        &self,
        meta: &EntityMeta,
        values: &'v [ChangedField],
    ) -> OrmResult<Vec<(&'static str, &'v Value)>> {
        values
            .iter()
            .filter(|change| change.name != ID)
            .map(|change| {
                meta.field(change.name)
                    .map(|f| (f.column, &change.value))
                    .ok_or_else(|| {
                        OrmError::argument(format!("{} has no field '{}'", meta.type_name, change.name))
                    })
            })
            .collect()
    }

    fn insert(&mut self, stmt: &Statement) -> OrmResult<String> {
        let main = self.main_entity(stmt)?;
        let values = self.resolve_values(&main, &stmt.values)?;
        if values.is_empty() {
            return Err(OrmError::argument(format!("nothing to insert into {}", main.table)));
        }

        let mut columns = Vec::with_capacity(values.len());
        let mut placeholders = Vec::with_capacity(values.len());
        for (column, value) in values {
            columns.push(column);
            placeholders.push(self.assigned(value)?);
        }
        Ok(format!(
            "INSERT INTO {} ({}) VALUES ({}){}",
            main.table,
            columns.join(", "),
            placeholders.join(", "),
            self.dialect.identity_suffix(ID)
        ))
    }

    fn update(&mut self, stmt: &Statement) -> OrmResult<String> {
        let main = self.main_entity(stmt)?;
        if !stmt.joins.is_empty() {
            return Err(OrmError::argument("joins are not supported in updates"));
        }
        let values = self.resolve_values(&main, &stmt.values)?;
        if values.is_empty() {
            return Err(OrmError::validation(ValidationError::new(
                main.table,
                ValidationCode::NoChanges,
                "no column to update",
            )));
        }
        let filter = stmt
            .filter
            .as_ref()
            .ok_or_else(|| OrmError::argument("update without a filter"))?;

        let mut assignments = Vec::with_capacity(values.len());
        for (column, value) in values {
            assignments.push((column, self.assigned(value)?));
        }
        let head = self.dialect.update_head(main.table, main.alias, &assignments);
        let body = self
            .where_body(Some(filter), &main)?
            .ok_or_else(|| OrmError::argument("update without a filter"))?;

        Ok(format!(
            "{head} WHERE {body}{}",
            self.dialect.affected_rows_suffix().unwrap_or_default()
        ))
    }

    fn raw(&mut self, stmt: Statement) -> OrmResult<String> {
        let raw = stmt
            .raw
            .ok_or_else(|| OrmError::argument("raw statement without SQL"))?;
        if raw.sql.trim().is_empty() {
            return Err(OrmError::argument("raw SQL is empty"));
        }
        for mut param in raw.params {
            let placeholder = self.dialect.placeholder(&param, self.params.len() + 1);
            param.set_placeholder(placeholder);
            self.params.push(param);
        }
        Ok(raw.sql)
    }
}
