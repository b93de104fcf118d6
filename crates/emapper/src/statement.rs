//! Statement store: the pre-SQL form of one query or command.
//!
//! A [`Statement`] is consumed by translation. Builder misuse (a second
//! ORDER BY, a zero page size, ...) is recorded and surfaced as an
//! argument error when the statement is translated.

use crate::entity::{ChangedField, Column, Entity, EntityRef};
use crate::expr::{ColumnRef, Predicate, and};
use crate::param::Parameter;

/// Execution kind tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecuteKind {
    Select,
    ScalarSelect,
    Insert,
    Update,
    Raw,
}

impl ExecuteKind {
    /// Select kinds are the only cache-eligible statements.
    pub fn is_read(&self) -> bool {
        matches!(self, Self::Select | Self::ScalarSelect)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::ScalarSelect => "scalar",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Raw => "raw",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub entity: EntityRef,
    pub predicate: Option<Predicate>,
    pub kind: JoinKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Order {
    pub key: ColumnRef,
    pub direction: OrderDirection,
}

/// Paging mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Paging {
    /// 1-based page index.
    Offset { index: u32, size: u32 },
    /// Rows whose key is below `after_key`, newest first.
    Cursor { after_key: i64, size: u32 },
}

impl Paging {
    pub fn size(&self) -> u32 {
        match self {
            Self::Offset { size, .. } | Self::Cursor { size, .. } => *size,
        }
    }

    /// Rows skipped before the window starts.
    pub fn skip(&self) -> u64 {
        match self {
            Self::Offset { index, size } => u64::from(index.saturating_sub(1)) * u64::from(*size),
            Self::Cursor { .. } => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProjectionItem {
    Column(ColumnRef),
    Aliased(ColumnRef, &'static str),
    CountAll,
}

/// Explicit SELECT list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    pub items: Vec<ProjectionItem>,
}

impl Projection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn column<T: Entity>(mut self, column: Column<T>) -> Self {
        self.items.push(ProjectionItem::Column(column.into()));
        self
    }

    pub fn column_as<T: Entity>(mut self, column: Column<T>, name: &'static str) -> Self {
        self.items.push(ProjectionItem::Aliased(column.into(), name));
        self
    }

    pub fn count_all(mut self) -> Self {
        self.items.push(ProjectionItem::CountAll);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Literal SQL plus its parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSql {
    pub sql: String,
    pub params: Vec<Parameter>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: ExecuteKind,
    pub entity: Option<EntityRef>,
    pub filter: Option<Predicate>,
    pub joins: Vec<Join>,
    pub order: Option<Order>,
    pub paging: Option<Paging>,
    pub projection: Option<Projection>,
    pub raw: Option<RawSql>,
    /// Column values written by insert and update.
    pub values: Vec<ChangedField>,
    build_error: Option<String>,
}

impl Statement {
    fn empty(kind: ExecuteKind, entity: Option<EntityRef>) -> Self {
        Self {
            kind,
            entity,
            filter: None,
            joins: Vec::new(),
            order: None,
            paging: None,
            projection: None,
            raw: None,
            values: Vec::new(),
            build_error: None,
        }
    }

    pub fn select(entity: EntityRef) -> Self {
        Self::empty(ExecuteKind::Select, Some(entity))
    }

    /// `SELECT COUNT(*)` over the same FROM/JOIN/WHERE.
    pub fn count(entity: EntityRef) -> Self {
        Self::empty(ExecuteKind::ScalarSelect, Some(entity))
    }

    pub fn insert(entity: EntityRef, values: Vec<ChangedField>) -> Self {
        let mut stmt = Self::empty(ExecuteKind::Insert, Some(entity));
        stmt.values = values;
        stmt
    }

    pub fn update(entity: EntityRef, values: Vec<ChangedField>, filter: Predicate) -> Self {
        let mut stmt = Self::empty(ExecuteKind::Update, Some(entity));
        stmt.values = values;
        stmt.filter = Some(filter);
        stmt
    }

    pub fn raw(sql: impl Into<String>, params: Vec<Parameter>) -> Self {
        let mut stmt = Self::empty(ExecuteKind::Raw, None);
        stmt.raw = Some(RawSql {
            sql: sql.into(),
            params,
        });
        stmt
    }

    fn fail(&mut self, message: impl Into<String>) {
        if self.build_error.is_none() {
            self.build_error = Some(message.into());
        }
    }

    /// First recorded builder error, if any.
    pub fn build_error(&self) -> Option<&str> {
        self.build_error.as_deref()
    }

    /// AND `predicate` into the filter.
    pub fn add_filter(&mut self, predicate: Predicate) {
        self.filter = Some(match self.filter.take() {
            Some(existing) => and(existing, predicate),
            None => predicate,
        });
    }

    pub fn add_join(&mut self, entity: EntityRef, kind: JoinKind, predicate: Option<Predicate>) {
        self.joins.push(Join {
            entity,
            predicate,
            kind,
        });
    }

    pub fn set_order(&mut self, key: ColumnRef, direction: OrderDirection) {
        if self.order.is_some() {
            self.fail("only one ORDER BY key is supported");
            return;
        }
        self.order = Some(Order { key, direction });
    }

    pub fn set_page(&mut self, index: u32, size: u32) {
        if index == 0 {
            self.fail("page index is 1-based");
        } else if size == 0 {
            self.fail("page size must be positive");
        } else {
            self.paging = Some(Paging::Offset { index, size });
        }
    }

    pub fn set_cursor(&mut self, after_key: i64, size: u32) {
        if size == 0 {
            self.fail("page size must be positive");
        } else {
            self.paging = Some(Paging::Cursor { after_key, size });
        }
    }

    pub fn set_projection(&mut self, projection: Projection) {
        if projection.is_empty() {
            self.fail("projection has no columns");
        } else {
            self.projection = Some(projection);
        }
    }
}
