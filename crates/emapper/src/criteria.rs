//! Reusable filter and ordering for one entity type.

use crate::entity::{Column, Entity};
use crate::expr::{ColumnRef, Predicate, and, not, or};
use crate::statement::OrderDirection;
use std::marker::PhantomData;

/// A filter plus optional ordering that can be stored, combined and later
/// applied with [`Query::apply`](crate::query::Query::apply).
///
/// ```ignore
/// let adults = Criteria::<User>::new().filter(User::COL_AGE.ge(18));
/// let named = Criteria::<User>::new().filter(User::COL_NAME.starts_with("a"));
/// let rows = mapper.query::<User>().apply(adults.and(named)).to_list()?;
/// ```
pub struct Criteria<T> {
    filter: Option<Predicate>,
    order: Option<(ColumnRef, OrderDirection)>,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Default for Criteria<T> {
    fn default() -> Self {
        Self {
            filter: None,
            order: None,
            _entity: PhantomData,
        }
    }
}

impl<T> Clone for Criteria<T> {
    fn clone(&self) -> Self {
        Self {
            filter: self.filter.clone(),
            order: self.order,
            _entity: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for Criteria<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Criteria")
            .field("filter", &self.filter)
            .field("order", &self.order)
            .finish()
    }
}

impl<T: Entity> Criteria<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// AND a predicate into the filter.
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => and(existing, predicate),
            None => predicate,
        });
        self
    }

    pub fn order_by_asc<C: Entity>(mut self, key: Column<C>) -> Self {
        self.order = Some((key.into(), OrderDirection::Asc));
        self
    }

    pub fn order_by_desc<C: Entity>(mut self, key: Column<C>) -> Self {
        self.order = Some((key.into(), OrderDirection::Desc));
        self
    }

    /// Both filters must hold. An empty side adds no restriction. The
    /// ordering of `self` wins.
    pub fn and(self, other: Criteria<T>) -> Self {
        let filter = match (self.filter, other.filter) {
            (Some(a), Some(b)) => Some(and(a, b)),
            (a, b) => a.or(b),
        };
        Self::merged(filter, self.order, other.order)
    }

    /// Either filter may hold. An empty side matches everything, so the
    /// result is unrestricted. The ordering of `self` wins.
    pub fn or(self, other: Criteria<T>) -> Self {
        let filter = match (self.filter, other.filter) {
            (Some(a), Some(b)) => Some(or(a, b)),
            _ => None,
        };
        Self::merged(filter, self.order, other.order)
    }

    /// Negate the filter. An empty filter stays empty.
    #[allow(clippy::should_implement_trait)]
    pub fn not(mut self) -> Self {
        self.filter = self.filter.map(not);
        self
    }

    fn merged(
        filter: Option<Predicate>,
        first: Option<(ColumnRef, OrderDirection)>,
        second: Option<(ColumnRef, OrderDirection)>,
    ) -> Self {
        Self {
            filter,
            order: first.or(second),
            _entity: PhantomData,
        }
    }

    pub fn predicate(&self) -> Option<&Predicate> {
        self.filter.as_ref()
    }

    pub(crate) fn into_parts(self) -> (Option<Predicate>, Option<(ColumnRef, OrderDirection)>) {
        (self.filter, self.order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::User;

    #[test]
    fn and_merges_filters_flat() {
        let a = Criteria::<User>::new().filter(User::COL_AGE.ge(18));
        let b = Criteria::<User>::new()
            .filter(User::COL_NAME.ne("x"))
            .filter(User::COL_NAME.ne("y"));
        let merged = a.and(b);
        match merged.predicate() {
            Some(Predicate::And(items)) => assert_eq!(items.len(), 3),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn empty_side_is_unrestricted() {
        let narrow = || Criteria::<User>::new().filter(User::COL_AGE.lt(3));
        assert_eq!(Criteria::<User>::new().or(narrow()).predicate(), None);
        assert_eq!(narrow().or(Criteria::new()).predicate(), None);
        assert_eq!(
            Criteria::<User>::new().and(narrow()).predicate(),
            Some(&User::COL_AGE.lt(3))
        );
        assert!(matches!(
            narrow().or(narrow()).predicate(),
            Some(Predicate::Or(items)) if items.len() == 2
        ));
    }

    #[test]
    fn not_wraps_filter_and_first_order_wins() {
        let a = Criteria::<User>::new()
            .filter(User::COL_AGE.lt(3))
            .order_by_desc(User::COL_ID)
            .not();
        assert!(matches!(a.predicate(), Some(Predicate::Not(_))));
        let b = Criteria::<User>::new().order_by_asc(User::COL_NAME);
        let merged = a.and(b);
        assert_eq!(merged.order.map(|(_, d)| d), Some(OrderDirection::Desc));
        assert!(Criteria::<User>::new().not().predicate().is_none());
    }
}
