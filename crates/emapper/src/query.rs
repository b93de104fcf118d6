//! Fluent query builder over one entity type.

use crate::connection::RowSet;
use crate::criteria::Criteria;
use crate::entity::{Column, Entity, EntityRef};
use crate::error::OrmResult;
use crate::exec::Outcome;
use crate::expr::Predicate;
use crate::mapper::Mapper;
use crate::statement::{ExecuteKind, JoinKind, OrderDirection, Paging, Projection, Statement};
use crate::translate::TranslationResult;
use std::marker::PhantomData;

/// A select over `T`, built fluently and consumed by one terminal call.
///
/// Builder misuse (a second ORDER BY, page index 0, ...) is reported as an
/// argument error by the terminal call.
#[must_use = "a query does nothing until a terminal method runs it"]
pub struct Query<'m, T> {
    mapper: &'m mut Mapper,
    stmt: Statement,
    _entity: PhantomData<fn() -> T>,
}

impl<'m, T: Entity> Query<'m, T> {
    pub(crate) fn new(mapper: &'m mut Mapper) -> Self {
        Self {
            mapper,
            stmt: Statement::select(EntityRef::of::<T>()),
            _entity: PhantomData,
        }
    }

    /// AND a predicate into the WHERE clause.
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.stmt.add_filter(predicate);
        self
    }

    fn join<U: Entity>(mut self, kind: JoinKind, on: Predicate) -> Self {
        self.stmt.add_join(EntityRef::of::<U>(), kind, Some(on));
        self
    }

    pub fn inner_join<U: Entity>(self, on: Predicate) -> Self {
        self.join::<U>(JoinKind::Inner, on)
    }

    pub fn left_join<U: Entity>(self, on: Predicate) -> Self {
        self.join::<U>(JoinKind::Left, on)
    }

    pub fn right_join<U: Entity>(self, on: Predicate) -> Self {
        self.join::<U>(JoinKind::Right, on)
    }

    pub fn order_by_asc<C: Entity>(mut self, key: Column<C>) -> Self {
        self.stmt.set_order(key.into(), OrderDirection::Asc);
        self
    }

    pub fn order_by_desc<C: Entity>(mut self, key: Column<C>) -> Self {
        self.stmt.set_order(key.into(), OrderDirection::Desc);
        self
    }

    /// Offset paging with a 1-based page index.
    pub fn page(mut self, index: u32, size: u32) -> Self {
        self.stmt.set_page(index, size);
        self
    }

    /// Cursor paging: up to `size` rows whose id is below `after_key`.
    pub fn after_key(mut self, after_key: i64, size: u32) -> Self {
        self.stmt.set_cursor(after_key, size);
        self
    }

    /// Explicit SELECT list. Read the result with [`to_rows`](Self::to_rows)
    /// when the columns do not map onto `T`.
    pub fn select(mut self, projection: Projection) -> Self {
        self.stmt.set_projection(projection);
        self
    }

    pub fn apply(mut self, criteria: Criteria<T>) -> Self {
        let (filter, order) = criteria.into_parts();
        if let Some(filter) = filter {
            self.stmt.add_filter(filter);
        }
        if let Some((key, direction)) = order {
            self.stmt.set_order(key, direction);
        }
        self
    }

    /// Translate without executing.
    pub fn to_sql(self) -> OrmResult<TranslationResult> {
        self.mapper.context().translate(self.stmt)
    }

    pub fn to_rows(self) -> OrmResult<RowSet> {
        self.mapper.run_statement("query", self.stmt)?.into_rows()
    }

    pub fn to_list(self) -> OrmResult<Vec<T>> {
        self.to_rows()?.to_entities()
    }

    /// First matching row, if any. Adds a one-row window unless the query is
    /// already paged.
    pub fn first_or_default(mut self) -> OrmResult<Option<T>> {
        if self.stmt.paging.is_none() {
            self.stmt.paging = Some(Paging::Offset { index: 1, size: 1 });
        }
        Ok(self.to_list()?.into_iter().next())
    }

    /// `COUNT(*)` over the same FROM/JOIN/WHERE; order and paging are ignored.
    pub fn count(mut self) -> OrmResult<i64> {
        self.stmt.kind = ExecuteKind::ScalarSelect;
        let outcome = self.mapper.run_statement("count", self.stmt)?;
        let count = match outcome {
            Outcome::Rows(rows) => rows.scalar().and_then(|v| v.as_i64()).unwrap_or(0),
            other => other.affected() as i64,
        };
        Ok(count)
    }

    pub fn exists(self) -> OrmResult<bool> {
        Ok(self.count()? > 0)
    }
}
