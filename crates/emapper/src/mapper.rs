//! The mapper facade.
//!
//! A [`Mapper`] composes statement building, translation, validation, the
//! result cache and execution. It owns at most one ambient transaction; a
//! mapper is not shared between threads, so concurrent callers each get
//! their own through [`MapperContext::create_mapper`].
//!
//! ```ignore
//! let ctx = MapperContext::new(MapperOptions::new().use_sqlite().connection_string("app.db"));
//! let mut mapper = ctx.create_mapper();
//!
//! let mut user = User::default();
//! user.set_name("ann");
//! let id = mapper.add(&mut user)?;
//!
//! let adults = mapper
//!     .query::<User>()
//!     .filter(User::COL_AGE.ge(18))
//!     .order_by_desc(User::COL_ID)
//!     .page(1, 20)
//!     .to_list()?;
//! ```

use crate::changeset::{ValidationCode, ValidationError};
use crate::connection::{Connection, RowSet};
use crate::context::MapperContext;
use crate::entity::{ChangedField, Column, Entity, EntityRef, ID, LAST_MODIFY_TIME};
use crate::error::{DriverError, OrmError, OrmResult};
use crate::exec::{self, Outcome};
use crate::expr::Predicate;
use crate::param::Parameter;
use crate::query::Query;
use crate::statement::Statement;
use crate::translate::TranslationResult;
use crate::validate;
use crate::value::{FromValue, Value};
use chrono::Utc;
use std::sync::Arc;

/// Result of [`Mapper::sql_query`].
#[derive(Debug, Clone, PartialEq)]
pub enum RawResult {
    Rows(RowSet),
    Affected(u64),
}

impl RawResult {
    /// Materialize every row as `T`.
    pub fn list<T: Entity>(&self) -> OrmResult<Vec<T>> {
        self.rows()?.to_entities()
    }

    /// First row as `T`, if any.
    pub fn one<T: Entity>(&self) -> OrmResult<Option<T>> {
        Ok(self.list::<T>()?.into_iter().next())
    }

    /// First cell of the first row.
    pub fn scalar<V: FromValue>(&self) -> OrmResult<Option<V>> {
        match self.rows()?.scalar() {
            Some(value) => V::from_value(value.clone())
                .map(Some)
                .map_err(|e| OrmError::decode("<scalar>", e)),
            None => Ok(None),
        }
    }

    /// Affected-row count, or the number of returned rows.
    pub fn affected(&self) -> u64 {
        match self {
            RawResult::Rows(rows) => rows.len() as u64,
            RawResult::Affected(n) => *n,
        }
    }

    pub fn rows(&self) -> OrmResult<&RowSet> {
        match self {
            RawResult::Rows(rows) => Ok(rows),
            RawResult::Affected(_) => Err(OrmError::argument("statement returned no rows")),
        }
    }
}

pub struct Mapper {
    ctx: Arc<MapperContext>,
    tx: Option<Box<dyn Connection>>,
}

impl std::fmt::Debug for Mapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mapper")
            .field("in_transaction", &self.tx.is_some())
            .finish_non_exhaustive()
    }
}

impl Mapper {
    pub fn new(ctx: Arc<MapperContext>) -> Self {
        Self { ctx, tx: None }
    }

    pub fn context(&self) -> &Arc<MapperContext> {
        &self.ctx
    }

    pub(crate) fn run(&mut self, result: &TranslationResult) -> OrmResult<Outcome> {
        exec::run(&self.ctx, self.tx.as_deref_mut(), result)
    }

    /// Translate, execute and time one statement.
    pub(crate) fn run_statement(&mut self, operation: &'static str, stmt: Statement) -> OrmResult<Outcome> {
        let watch = self.ctx.log().watch(operation);
        let result = self.ctx.translate(stmt)?;
        let outcome = self.run(&result);
        watch.finish();
        outcome
    }

    /// Insert a new entity and return its generated id.
    ///
    /// Both timestamps are stamped with the current time. When model
    /// validation is enabled every field with validators is checked first;
    /// a failure returns before any SQL is issued.
    pub fn add<T: Entity>(&mut self, entity: &mut T) -> OrmResult<i64> {
        let meta = self.ctx.registry().resolve(EntityRef::of::<T>())?;
        let now = Utc::now();
        entity.base_mut().set_add_time(now);
        entity.base_mut().set_last_modify_time(now);

        if self.ctx.options().enable_model_validation {
            validate::validate_entity(&meta, entity).map_err(OrmError::validation)?;
        }

        let values: Vec<ChangedField> = meta
            .fields
            .iter()
            .enumerate()
            .filter(|(_, f)| f.name != ID)
            .map(|(index, f)| ChangedField {
                name: f.name,
                value: entity.field_value(index),
            })
            .filter(|c| !c.value.is_null())
            .collect();

        let id = match self.run_statement("add", Statement::insert(EntityRef::of::<T>(), values))? {
            Outcome::Identity(id) => id,
            other => return Err(OrmError::Other(format!("insert produced {other:?}"))),
        };
        entity.base_mut().assign_id(id);
        entity.base_mut().tracker_mut().clear();
        Ok(id)
    }

    /// Write the changed fields of `entity` to every row matching `filter`.
    ///
    /// Returns whether any row was affected. Fails with a `NoChanges`
    /// validation error, before any SQL, when nothing was changed. The
    /// change list is cleared only after the write succeeds.
    pub fn update<T: Entity>(&mut self, entity: &mut T, filter: Predicate) -> OrmResult<bool> {
        let mut values = entity.base().tracker().pending();
        if values.is_empty() {
            return Err(OrmError::validation(ValidationError::new(
                T::model().table,
                ValidationCode::NoChanges,
                "no column to update",
            )));
        }

        let meta = self.ctx.registry().resolve(EntityRef::of::<T>())?;
        if self.ctx.options().enable_model_validation {
            validate::validate_changes(&meta, &values).map_err(OrmError::validation)?;
        }

        let now = Utc::now();
        let stamped = !values.iter().any(|c| c.name == LAST_MODIFY_TIME);
        if stamped {
            values.push(ChangedField {
                name: LAST_MODIFY_TIME,
                value: Value::from(now),
            });
        }

        let stmt = Statement::update(EntityRef::of::<T>(), values, filter);
        let affected = self.run_statement("update", stmt)?.affected();

        let base = entity.base_mut();
        if stamped {
            base.set_last_modify_time(now);
        }
        base.tracker_mut().clear();
        Ok(affected > 0)
    }

    /// [`update`](Self::update) keyed by the entity's primary key.
    pub fn update_by_id<T: Entity>(&mut self, entity: &mut T) -> OrmResult<bool> {
        let id = entity.id();
        if id == 0 {
            return Err(OrmError::argument(format!(
                "{} has no id; add it before updating",
                T::model().type_name
            )));
        }
        self.update(entity, Column::<T>::new(ID, ID).eq(id))
    }

    /// Soft delete: set the deleted flag and write it by id.
    pub fn remove<T: Entity>(&mut self, entity: &mut T) -> OrmResult<bool> {
        entity.mark_deleted();
        self.update_by_id(entity)
    }

    /// Start a query over `T`.
    pub fn query<T: Entity>(&mut self) -> Query<'_, T> {
        Query::new(self)
    }

    /// Run literal SQL. Statements starting with `SELECT`/`WITH` return
    /// rows; anything else returns the affected-row count. Never cached.
    pub fn sql_query(&mut self, sql: impl Into<String>, params: Vec<Parameter>) -> OrmResult<RawResult> {
        match self.run_statement("sql_query", Statement::raw(sql, params))? {
            Outcome::Rows(rows) => Ok(RawResult::Rows(rows)),
            other => Ok(RawResult::Affected(other.affected())),
        }
    }

    /// Run a removal statement (`DROP INDEX`, `DROP TABLE`, ...) whose
    /// "does not exist" failure counts as success.
    ///
    /// Returns `false` when such an error was swallowed. Every other
    /// failure propagates.
    pub fn execute_idempotent_removal(&mut self, sql: impl Into<String>) -> OrmResult<bool> {
        match self.run_statement("idempotent_removal", Statement::raw(sql, Vec::new())) {
            Ok(_) => Ok(true),
            Err(OrmError::DataAccess { message, code, sql, params }) => {
                let driver_err = DriverError { code, message };
                if self.ctx.dialect()?.is_ignorable_removal_error(&driver_err) {
                    tracing::debug!(
                        target: "emapper.sql",
                        error = %driver_err,
                        "ignored error of idempotent removal"
                    );
                    Ok(false)
                } else {
                    Err(driver_err.into_data_access(&sql, params))
                }
            }
            Err(other) => Err(other),
        }
    }

    pub fn in_transaction(&self) -> bool {
        self.tx.is_some()
    }

    /// Open the ambient transaction. Every statement of this mapper runs on
    /// its connection until [`commit`](Self::commit) or
    /// [`rollback`](Self::rollback).
    pub fn open_transaction(&mut self) -> OrmResult<()> {
        if self.tx.is_some() {
            return Err(OrmError::argument("a transaction is already open"));
        }
        let dialect = self.ctx.dialect()?;
        let mut conn = self.ctx.connect()?;
        for sql in dialect.begin_transaction(self.ctx.options().transaction_isolation) {
            conn.execute(&sql, &[])
                .map_err(|e| e.into_data_access(&sql, Vec::new()))?;
        }
        tracing::debug!(target: "emapper.sql", dialect = dialect.name(), "transaction opened");
        self.tx = Some(conn);
        Ok(())
    }

    pub fn commit(&mut self) -> OrmResult<()> {
        self.finish_transaction(true)
    }

    pub fn rollback(&mut self) -> OrmResult<()> {
        self.finish_transaction(false)
    }

    fn finish_transaction(&mut self, commit: bool) -> OrmResult<()> {
        let mut conn = self
            .tx
            .take()
            .ok_or_else(|| OrmError::argument("no open transaction"))?;
        let dialect = self.ctx.dialect()?;
        let sql = if commit {
            dialect.commit_transaction()
        } else {
            dialect.rollback_transaction()
        };
        conn.execute(sql, &[])
            .map_err(|e| e.into_data_access(sql, Vec::new()))?;
        tracing::debug!(target: "emapper.sql", committed = commit, "transaction closed");
        Ok(())
    }

    /// Run `f` inside the ambient transaction: commit on `Ok`, roll back on
    /// `Err`.
    pub fn transaction<R>(&mut self, f: impl FnOnce(&mut Mapper) -> OrmResult<R>) -> OrmResult<R> {
        self.open_transaction()?;
        match f(self) {
            Ok(value) => {
                self.commit()?;
                Ok(value)
            }
            Err(error) => match self.rollback() {
                Ok(()) => Err(error),
                Err(rollback_err) => {
                    tracing::error!(target: "emapper.sql", error = %rollback_err, "rollback failed");
                    Err(OrmError::Other(format!(
                        "{error} (rollback failed: {rollback_err})"
                    )))
                }
            },
        }
    }
}

impl Drop for Mapper {
    fn drop(&mut self) {
        if self.tx.is_some() {
            if let Err(err) = self.rollback() {
                tracing::warn!(
                    target: "emapper.sql",
                    error = %err,
                    "rollback of abandoned transaction failed"
                );
            }
        }
    }
}
