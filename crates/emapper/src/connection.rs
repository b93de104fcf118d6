//! Relational connection abstraction and tabular results.

use crate::entity::Entity;
use crate::error::{DriverError, OrmError, OrmResult};
use crate::param::Parameter;
use crate::value::{FromValue, Value};

/// A blocking database connection.
///
/// Parameters arrive with their placeholders already rendered by the
/// active dialect; drivers bind by placeholder name or by position.
/// Dropping the connection closes it.
pub trait Connection: Send {
    /// Execute SQL returning a tabular result.
    fn query(&mut self, sql: &str, params: &[Parameter]) -> Result<RowSet, DriverError>;

    /// Execute SQL returning the affected-row count.
    fn execute(&mut self, sql: &str, params: &[Parameter]) -> Result<u64, DriverError>;
}

/// Opens connections for a mapper context.
///
/// Required for dialects without a bundled driver (MySQL, SQL Server).
pub trait Connector: Send + Sync {
    fn connect(&self) -> OrmResult<Box<dyn Connection>>;
}

/// A fully buffered tabular result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// Borrowed view of one row.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    columns: &'a [String],
    values: &'a [Value],
}

impl<'a> Row<'a> {
    /// Value of the named column, compared case-insensitively.
    pub fn get(&self, column: &str) -> Option<&'a Value> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
            .and_then(|i| self.values.get(i))
    }

    pub fn get_index(&self, index: usize) -> Option<&'a Value> {
        self.values.get(index)
    }

    /// Decode the named column.
    pub fn try_get<T: FromValue>(&self, column: &str) -> OrmResult<T> {
        let value = self
            .get(column)
            .ok_or_else(|| OrmError::decode(column, "column not found"))?;
        T::from_value(value.clone()).map_err(|e| OrmError::decode(column, e))
    }

    pub fn values(&self) -> &'a [Value] {
        self.values
    }
}

impl RowSet {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(|values| Row {
            columns: &self.columns,
            values,
        })
    }

    /// First cell of the first row.
    pub fn scalar(&self) -> Option<&Value> {
        self.rows.first().and_then(|r| r.first())
    }

    /// Materialize every row into `T`, matching columns to fields by name.
    ///
    /// Columns without a matching field are ignored; fields without a
    /// column keep their default.
    pub fn to_entities<T: Entity>(&self) -> OrmResult<Vec<T>> {
        let model = T::model();
        let slots: Vec<Option<usize>> = self
            .columns
            .iter()
            .map(|c| model.column_index(c))
            .collect();

        self.rows
            .iter()
            .map(|values| {
                let mut entity = T::default();
                for ((slot, value), column) in slots.iter().zip(values).zip(&self.columns) {
                    if let Some(index) = slot {
                        entity
                            .set_field_value(*index, value.clone())
                            .map_err(|e| OrmError::decode(column, e))?;
                    }
                }
                Ok(entity)
            })
            .collect()
    }
}
