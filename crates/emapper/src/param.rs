//! Bound statement parameters.

use crate::error::{OrmError, OrmResult};
use crate::value::{Value, ValueKind};

/// A named, coerced statement parameter.
///
/// Construction coerces the value into its storage form: booleans become
/// `1`/`0`, strings are sanitized, and sequences collapse into a
/// comma-separated list. The original runtime type is kept in [`kind`](Self::kind).
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    name: String,
    value: Value,
    kind: ValueKind,
    placeholder: String,
}

impl Parameter {
    /// Create a parameter with the string sanitizer enabled.
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> OrmResult<Self> {
        Self::build(name.into(), value.into(), true)
    }

    /// Create a parameter whose text value is bound exactly as given.
    pub fn unfiltered(name: impl Into<String>, value: impl Into<Value>) -> OrmResult<Self> {
        Self::build(name.into(), value.into(), false)
    }

    fn build(name: String, value: Value, filter: bool) -> OrmResult<Self> {
        let name = name.trim_start_matches(['@', ':', '$']).to_string();
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(OrmError::argument(format!(
                "invalid parameter name '{name}'"
            )));
        }
        if value.is_null() {
            return Err(OrmError::argument(format!(
                "parameter '{name}' has no value"
            )));
        }
        let kind = value.kind();
        Ok(Self {
            placeholder: format!("@{name}"),
            value: coerce(value, filter),
            kind,
            name,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The coerced storage value.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Runtime type of the value as supplied by the caller.
    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    /// Placeholder text as it appears in the translated SQL.
    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    pub(crate) fn set_placeholder(&mut self, placeholder: String) {
        self.placeholder = placeholder;
    }

    /// `name=value` form used in error snapshots.
    pub fn snapshot(&self) -> String {
        format!("{}={}", self.name, self.value)
    }
}

fn coerce(value: Value, filter: bool) -> Value {
    match value {
        Value::Bool(b) => Value::Int(i64::from(b)),
        Value::Text(s) if filter => Value::Text(sanitize(&s)),
        Value::List(items) => Value::Text(
            items
                .into_iter()
                .map(|item| coerce(item, filter).to_sql_literal())
                .collect::<Vec<_>>()
                .join(","),
        ),
        other => other,
    }
}

/// Strip characters that have no business in a bound text value.
///
/// NUL and other control characters are removed; tabs and line breaks stay.
pub fn sanitize(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\t' | '\n' | '\r'))
        .collect()
}

/// An ordered collection of parameters for one statement.
#[derive(Clone, Debug, Default)]
pub struct ParamList {
    params: Vec<Parameter>,
}

impl ParamList {
    pub fn new() -> Self {
        Self { params: Vec::new() }
    }

    /// Add a parameter and return its 1-based ordinal.
    pub fn push(&mut self, param: Parameter) -> usize {
        self.params.push(param);
        self.params.len()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter()
    }

    pub fn as_slice(&self) -> &[Parameter] {
        &self.params
    }

    /// `name=value` snapshot of every parameter, in order.
    pub fn snapshot(&self) -> Vec<String> {
        self.params.iter().map(Parameter::snapshot).collect()
    }

    pub fn into_vec(self) -> Vec<Parameter> {
        self.params
    }
}

impl From<Vec<Parameter>> for ParamList {
    fn from(params: Vec<Parameter>) -> Self {
        Self { params }
    }
}
