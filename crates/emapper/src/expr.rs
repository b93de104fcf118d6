//! Predicate AST built through typed column handles.
//!
//! ```ignore
//! use emapper::expr::{and, not};
//!
//! let p = and(
//!     User::COL_NAME.ne("wasd"),
//!     not(User::COL_AGE.lt(18)),
//! );
//! ```

use crate::entity::{Column, Entity, EntityRef};
use crate::value::Value;

/// A column of a specific entity type, type-erased.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnRef {
    pub(crate) entity: EntityRef,
    pub(crate) column: &'static str,
}

impl ColumnRef {
    pub fn entity(&self) -> EntityRef {
        self.entity
    }

    pub fn column(&self) -> &'static str {
        self.column
    }
}

impl<T: Entity> From<Column<T>> for ColumnRef {
    fn from(col: Column<T>) -> Self {
        Self {
            entity: EntityRef::of::<T>(),
            column: col.column(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOp {
    pub fn is_ordering(&self) -> bool {
        !matches!(self, Self::Eq | Self::Ne)
    }
}

/// Where the search text may sit inside the matched value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchKind {
    /// `%text%`
    Full,
    /// `text%`
    Prefix,
    /// `%text`
    Suffix,
}

/// Right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Bound as a sanitized parameter.
    Value(Value),
    /// Inlined into the SQL text. Only numbers and booleans qualify.
    Literal(Value),
    /// Another column, as in join conditions.
    Column(ColumnRef),
}

/// Lookup key into a dialect's predicate template map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PredicateKind {
    And,
    Or,
    Not,
    Compare(CompareOp),
    Membership,
    Pattern(MatchKind),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    Compare {
        op: CompareOp,
        left: ColumnRef,
        right: Operand,
    },
    Membership {
        column: ColumnRef,
        values: Vec<Value>,
    },
    Pattern {
        column: ColumnRef,
        kind: MatchKind,
        value: Value,
    },
}

/// Conjunction. Nested conjunctions are flattened.
pub fn and(left: Predicate, right: Predicate) -> Predicate {
    let mut items = Vec::new();
    for p in [left, right] {
        match p {
            Predicate::And(inner) => items.extend(inner),
            other => items.push(other),
        }
    }
    Predicate::And(items)
}

/// Disjunction. Nested disjunctions are flattened.
pub fn or(left: Predicate, right: Predicate) -> Predicate {
    let mut items = Vec::new();
    for p in [left, right] {
        match p {
            Predicate::Or(inner) => items.extend(inner),
            other => items.push(other),
        }
    }
    Predicate::Or(items)
}

pub fn not(inner: Predicate) -> Predicate {
    Predicate::Not(Box::new(inner))
}

impl Predicate {
    pub fn and(self, other: Predicate) -> Predicate {
        and(self, other)
    }

    pub fn or(self, other: Predicate) -> Predicate {
        or(self, other)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Predicate {
        not(self)
    }

    /// Conjunction of all items; `None` when empty.
    pub fn all(items: impl IntoIterator<Item = Predicate>) -> Option<Predicate> {
        items.into_iter().reduce(and)
    }

    /// Disjunction of all items; `None` when empty.
    pub fn any(items: impl IntoIterator<Item = Predicate>) -> Option<Predicate> {
        items.into_iter().reduce(or)
    }

    pub fn kind(&self) -> PredicateKind {
        match self {
            Self::And(_) => PredicateKind::And,
            Self::Or(_) => PredicateKind::Or,
            Self::Not(_) => PredicateKind::Not,
            Self::Compare { op, .. } => PredicateKind::Compare(*op),
            Self::Membership { .. } => PredicateKind::Membership,
            Self::Pattern { kind, .. } => PredicateKind::Pattern(*kind),
        }
    }

    /// Number of comparison leaves.
    pub fn comparison_count(&self) -> usize {
        match self {
            Self::And(items) | Self::Or(items) => items.iter().map(Self::comparison_count).sum(),
            Self::Not(inner) => inner.comparison_count(),
            Self::Compare { .. } => 1,
            Self::Membership { .. } | Self::Pattern { .. } => 0,
        }
    }

    /// Every column referenced anywhere in the tree.
    pub fn columns(&self) -> Vec<ColumnRef> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns(&self, out: &mut Vec<ColumnRef>) {
        match self {
            Self::And(items) | Self::Or(items) => {
                items.iter().for_each(|p| p.collect_columns(out));
            }
            Self::Not(inner) => inner.collect_columns(out),
            Self::Compare { left, right, .. } => {
                out.push(*left);
                if let Operand::Column(c) = right {
                    out.push(*c);
                }
            }
            Self::Membership { column, .. } | Self::Pattern { column, .. } => out.push(*column),
        }
    }
}

impl<T: Entity> Column<T> {
    fn compare(self, op: CompareOp, value: impl Into<Value>) -> Predicate {
        Predicate::Compare {
            op,
            left: self.into(),
            right: Operand::Value(value.into()),
        }
    }

    pub fn eq(self, value: impl Into<Value>) -> Predicate {
        self.compare(CompareOp::Eq, value)
    }

    pub fn ne(self, value: impl Into<Value>) -> Predicate {
        self.compare(CompareOp::Ne, value)
    }

    pub fn gt(self, value: impl Into<Value>) -> Predicate {
        self.compare(CompareOp::Gt, value)
    }

    pub fn ge(self, value: impl Into<Value>) -> Predicate {
        self.compare(CompareOp::Ge, value)
    }

    pub fn lt(self, value: impl Into<Value>) -> Predicate {
        self.compare(CompareOp::Lt, value)
    }

    pub fn le(self, value: impl Into<Value>) -> Predicate {
        self.compare(CompareOp::Le, value)
    }

    /// `column = 1`, inlined.
    pub fn is_true(self) -> Predicate {
        Predicate::Compare {
            op: CompareOp::Eq,
            left: self.into(),
            right: Operand::Literal(Value::Bool(true)),
        }
    }

    /// `column = 0`, inlined.
    pub fn is_false(self) -> Predicate {
        Predicate::Compare {
            op: CompareOp::Eq,
            left: self.into(),
            right: Operand::Literal(Value::Bool(false)),
        }
    }

    /// Column-to-column comparison, typically a join condition.
    pub fn eq_col<U: Entity>(self, other: Column<U>) -> Predicate {
        self.cmp_col(CompareOp::Eq, other)
    }

    pub fn cmp_col<U: Entity>(self, op: CompareOp, other: Column<U>) -> Predicate {
        Predicate::Compare {
            op,
            left: self.into(),
            right: Operand::Column(other.into()),
        }
    }

    pub fn in_list<V: Into<Value>>(self, values: impl IntoIterator<Item = V>) -> Predicate {
        Predicate::Membership {
            column: self.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    fn pattern(self, kind: MatchKind, value: impl Into<Value>) -> Predicate {
        Predicate::Pattern {
            column: self.into(),
            kind,
            value: value.into(),
        }
    }

    pub fn contains(self, value: impl Into<Value>) -> Predicate {
        self.pattern(MatchKind::Full, value)
    }

    pub fn starts_with(self, value: impl Into<Value>) -> Predicate {
        self.pattern(MatchKind::Prefix, value)
    }

    pub fn ends_with(self, value: impl Into<Value>) -> Predicate {
        self.pattern(MatchKind::Suffix, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{User, UserRole};

    #[test]
    fn connectives_flatten() {
        let p = User::COL_AGE
            .gt(1)
            .and(User::COL_AGE.lt(9))
            .and(User::COL_NAME.eq("x"));
        match &p {
            Predicate::And(items) => assert_eq!(items.len(), 3),
            other => panic!("expected And, got {other:?}"),
        }

        let q = or(p.clone(), not(p));
        assert_eq!(q.kind(), PredicateKind::Or);
        assert_eq!(q.comparison_count(), 6);
    }

    #[test]
    fn all_and_any_of_nothing() {
        assert!(Predicate::all(Vec::new()).is_none());
        let single = Predicate::any([User::COL_AGE.eq(3)]).unwrap();
        assert_eq!(single.kind(), PredicateKind::Compare(CompareOp::Eq));
    }

    #[test]
    fn columns_include_both_sides_of_joins() {
        let on = User::COL_ID.eq_col(UserRole::COL_USER_ID);
        let columns = on.columns();
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[1].column(), "user_id");
        assert_eq!(columns[1].entity(), EntityRef::of::<UserRole>());
    }

    #[test]
    fn membership_and_patterns_are_not_comparisons() {
        let p = User::COL_NAME
            .in_list(["a", "b"])
            .and(User::COL_NAME.starts_with("a"));
        assert_eq!(p.comparison_count(), 0);
        assert_eq!(p.columns().len(), 2);
    }
}
