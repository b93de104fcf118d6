//! Mapped entity types and their change tracking.
//!
//! Every entity embeds an [`EntityBase`] carrying the schema-convention
//! columns (`id`, `is_deleted`, `add_time`, `last_modify_time`) and the
//! [`ChangeTracker`]. Mutators generated by `#[derive(Entity)]` assign the
//! backing field and append a [`ChangedField`]; writes only touch the
//! recorded fields.

use crate::validate::{Rule, Validator};
use crate::value::{FromValue, Value};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::any::TypeId;
use std::marker::PhantomData;

/// One recorded mutation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangedField {
    pub name: &'static str,
    pub value: Value,
}

/// Ordered list of mutations since construction or the last successful write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeTracker {
    changes: Vec<ChangedField>,
}

impl ChangeTracker {
    pub fn record(&mut self, name: &'static str, value: impl Into<Value>) {
        self.changes.push(ChangedField {
            name,
            value: value.into(),
        });
    }

    pub fn changes(&self) -> &[ChangedField] {
        &self.changes
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn clear(&mut self) {
        self.changes.clear();
    }

    /// Latest value per field, in the order fields were first touched.
    pub fn pending(&self) -> Vec<ChangedField> {
        let mut out: Vec<ChangedField> = Vec::with_capacity(self.changes.len());
        for change in &self.changes {
            match out.iter_mut().find(|c| c.name == change.name) {
                Some(existing) => existing.value = change.value.clone(),
                None => out.push(change.clone()),
            }
        }
        out
    }
}

/// Column descriptor of one mapped field.
#[derive(Debug, Clone, Copy)]
pub struct FieldDef {
    /// Rust field name, as recorded in [`ChangedField::name`].
    pub name: &'static str,
    pub column: &'static str,
    pub rules: &'static [Rule],
}

impl FieldDef {
    pub const fn new(name: &'static str, column: &'static str, rules: &'static [Rule]) -> Self {
        Self {
            name,
            column,
            rules,
        }
    }
}

pub const ID: &str = "id";
pub const IS_DELETED: &str = "is_deleted";
pub const ADD_TIME: &str = "add_time";
pub const LAST_MODIFY_TIME: &str = "last_modify_time";

/// Descriptors for the [`EntityBase`] columns. They occupy indices `0..4`
/// of every entity's field table.
pub const BASE_FIELDS: [FieldDef; 4] = [
    FieldDef::new(ID, ID, &[]),
    FieldDef::new(IS_DELETED, IS_DELETED, &[]),
    FieldDef::new(ADD_TIME, ADD_TIME, &[]),
    FieldDef::new(LAST_MODIFY_TIME, LAST_MODIFY_TIME, &[]),
];

/// Static table identity and field table of an entity type.
#[derive(Debug)]
pub struct ModelDef {
    /// Fully qualified type path.
    pub type_name: &'static str,
    pub table: &'static str,
    pub alias: &'static str,
    pub soft_delete: bool,
    pub fields: &'static [FieldDef],
}

impl ModelDef {
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| f.column.eq_ignore_ascii_case(column))
    }
}

/// Schema-convention columns shared by every entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntityBase {
    id: i64,
    is_deleted: bool,
    add_time: Option<DateTime<Utc>>,
    last_modify_time: Option<DateTime<Utc>>,
    #[serde(skip)]
    tracker: ChangeTracker,
}

impl EntityBase {
    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn is_deleted(&self) -> bool {
        self.is_deleted
    }

    pub fn add_time(&self) -> Option<DateTime<Utc>> {
        self.add_time
    }

    pub fn last_modify_time(&self) -> Option<DateTime<Utc>> {
        self.last_modify_time
    }

    pub fn tracker(&self) -> &ChangeTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut ChangeTracker {
        &mut self.tracker
    }

    /// Record a mutation of a field owned by the embedding entity.
    pub fn track(&mut self, name: &'static str, value: impl Into<Value>) {
        self.tracker.record(name, value);
    }

    pub fn mark_deleted(&mut self) {
        self.is_deleted = true;
        self.tracker.record(IS_DELETED, true);
    }

    pub fn set_add_time(&mut self, at: DateTime<Utc>) {
        self.add_time = Some(at);
        self.tracker.record(ADD_TIME, at);
    }

    pub fn set_last_modify_time(&mut self, at: DateTime<Utc>) {
        self.last_modify_time = Some(at);
        self.tracker.record(LAST_MODIFY_TIME, at);
    }

    pub(crate) fn assign_id(&mut self, id: i64) {
        self.id = id;
    }

    /// Untracked read by base-field index.
    pub fn field_value(&self, index: usize) -> Value {
        match index {
            0 => Value::Int(self.id),
            1 => Value::Bool(self.is_deleted),
            2 => Value::from(self.add_time),
            3 => Value::from(self.last_modify_time),
            _ => Value::Null,
        }
    }

    /// Untracked assignment by base-field index, used when materializing rows.
    pub fn set_field_value(&mut self, index: usize, value: Value) -> Result<(), String> {
        match index {
            0 => self.id = FromValue::from_value(value)?,
            1 => self.is_deleted = FromValue::from_value(value)?,
            2 => self.add_time = FromValue::from_value(value)?,
            3 => self.last_modify_time = FromValue::from_value(value)?,
            _ => return Err(format!("no base field at index {index}")),
        }
        Ok(())
    }
}

/// A mapped persistent record type.
///
/// Usually implemented through `#[derive(Entity)]`.
pub trait Entity: Default + Send + 'static {
    fn model() -> &'static ModelDef;

    fn base(&self) -> &EntityBase;

    fn base_mut(&mut self) -> &mut EntityBase;

    /// Read the field at `index` of [`ModelDef::fields`].
    fn field_value(&self, index: usize) -> Value;

    /// Assign the field at `index` of [`ModelDef::fields`] without tracking.
    fn set_field_value(&mut self, index: usize, value: Value) -> Result<(), String>;

    /// Validators beyond the declarative rules, keyed by field name.
    fn extra_validators() -> Vec<(&'static str, Box<dyn Validator>)> {
        Vec::new()
    }

    fn id(&self) -> i64 {
        self.base().id()
    }

    fn changes(&self) -> &[ChangedField] {
        self.base().tracker().changes()
    }

    fn is_dirty(&self) -> bool {
        !self.base().tracker().is_empty()
    }

    /// Flag the row as soft-deleted. Written by the next update.
    fn mark_deleted(&mut self) {
        self.base_mut().mark_deleted();
    }

    /// Stamp `last_modify_time` with the current time.
    fn touch(&mut self) {
        self.base_mut().set_last_modify_time(Utc::now());
    }
}

/// Type-erased handle to an entity type.
#[derive(Clone, Copy)]
pub struct EntityRef {
    pub(crate) type_id: TypeId,
    pub(crate) model: fn() -> &'static ModelDef,
    pub(crate) extra_validators: fn() -> Vec<(&'static str, Box<dyn Validator>)>,
}

impl EntityRef {
    pub fn of<T: Entity>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            model: T::model,
            extra_validators: T::extra_validators,
        }
    }

    pub fn model(&self) -> &'static ModelDef {
        (self.model)()
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }
}

impl PartialEq for EntityRef {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for EntityRef {}

impl std::fmt::Debug for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("EntityRef").field(&self.model().type_name).finish()
    }
}

/// Typed handle to one column of entity `T`.
///
/// `#[derive(Entity)]` emits one `COL_<FIELD>` constant per field.
pub struct Column<T> {
    field: &'static str,
    column: &'static str,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Column<T> {
    pub const fn new(field: &'static str, column: &'static str) -> Self {
        Self {
            field,
            column,
            _entity: PhantomData,
        }
    }

    pub fn field(&self) -> &'static str {
        self.field
    }

    pub fn column(&self) -> &'static str {
        self.column
    }
}

impl<T> Clone for Column<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Column<T> {}

impl<T> std::fmt::Debug for Column<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Column").field(&self.column).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_keeps_first_touch_order_and_last_value() {
        let mut tracker = ChangeTracker::default();
        tracker.record("name", "a");
        tracker.record("age", 3);
        tracker.record("name", "b");

        let pending = tracker.pending();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].name, "name");
        assert_eq!(pending[0].value, Value::from("b"));
        assert_eq!(pending[1].name, "age");
        assert_eq!(tracker.changes().len(), 3);
    }

    #[test]
    fn base_mutators_are_tracked() {
        let mut base = EntityBase::default();
        assert!(base.tracker().is_empty());
        base.mark_deleted();
        assert!(base.is_deleted());
        assert_eq!(base.tracker().changes()[0].name, IS_DELETED);
    }

    #[test]
    fn base_materialization_is_untracked() {
        let mut base = EntityBase::default();
        base.set_field_value(0, Value::Int(9)).unwrap();
        base.set_field_value(1, Value::Int(1)).unwrap();
        assert_eq!(base.id(), 9);
        assert!(base.is_deleted());
        assert!(base.tracker().is_empty());
        assert!(base.set_field_value(7, Value::Null).is_err());
    }
}
