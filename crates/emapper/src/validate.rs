//! Field validators and the pre-write validation pipeline.
//!
//! Declarative rules from `#[orm(...)]` are turned into [`Validator`] objects
//! once, when an entity type is registered. Each field keeps its validators
//! sorted by [`Validator::precedence`]; range and format checks run before
//! presence checks and the first failure stops the pipeline.

use crate::changeset::{ValidationCode, ValidationError};
use crate::entity::{ChangedField, Entity};
use crate::error::{OrmError, OrmResult};
use crate::registry::EntityMeta;
use crate::value::Value;

/// Precedence of length and numeric range checks.
pub const PRECEDENCE_RANGE: u8 = 1;
/// Precedence of format checks (email, url, uuid, regex, one-of).
pub const PRECEDENCE_FORMAT: u8 = 2;
/// Precedence of presence checks.
pub const PRECEDENCE_REQUIRED: u8 = 3;

/// A declarative validation rule attached to a field descriptor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rule {
    Required,
    /// Character length of the value's text form.
    Len {
        min: Option<usize>,
        max: Option<usize>,
    },
    /// Numeric value range, inclusive.
    Range { min: Option<f64>, max: Option<f64> },
    Email,
    Url,
    Uuid,
    Regex(&'static str),
    OneOf(&'static [&'static str]),
}

impl Rule {
    /// Build the validator object for this rule.
    pub fn to_validator(self) -> OrmResult<Box<dyn Validator>> {
        Ok(match self {
            Rule::Required => Box::new(Required),
            Rule::Len { min, max } => Box::new(Length { min, max }),
            Rule::Range { min, max } => Box::new(Range { min, max }),
            Rule::Uuid => Box::new(UuidFormat),
            Rule::OneOf(options) => Box::new(OneOf { options }),
            #[cfg(feature = "validate")]
            Rule::Email => Box::new(EmailFormat),
            #[cfg(feature = "validate")]
            Rule::Url => Box::new(UrlFormat),
            #[cfg(feature = "validate")]
            Rule::Regex(pattern) => Box::new(Pattern::new(pattern)?),
            #[cfg(not(feature = "validate"))]
            Rule::Email | Rule::Url | Rule::Regex(_) => {
                return Err(OrmError::configuration(
                    "email/url/regex rules require the `validate` feature",
                ));
            }
        })
    }
}

/// A single check run against a field value before a write.
pub trait Validator: Send + Sync {
    /// Lower values run first.
    fn precedence(&self) -> u8;

    fn is_valid(&self, value: &Value) -> bool;

    fn failure_message(&self, field: &str) -> String;

    fn code(&self) -> ValidationCode;
}

impl std::fmt::Debug for dyn Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator")
            .field("code", &self.code().as_str())
            .field("precedence", &self.precedence())
            .finish()
    }
}

/// Fails on NULL, numeric zero, blank text and empty lists.
#[derive(Debug, Clone, Copy)]
pub struct Required;

impl Validator for Required {
    fn precedence(&self) -> u8 {
        PRECEDENCE_REQUIRED
    }

    fn is_valid(&self, value: &Value) -> bool {
        match value {
            Value::Null => false,
            Value::Int(v) => *v != 0,
            Value::Float(v) => *v != 0.0,
            Value::Text(s) => !s.trim().is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Bool(_) | Value::DateTime(_) | Value::Uuid(_) => true,
        }
    }

    fn failure_message(&self, field: &str) -> String {
        format!("{field} is required")
    }

    fn code(&self) -> ValidationCode {
        ValidationCode::Required
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Length {
    pub min: Option<usize>,
    pub max: Option<usize>,
}

impl Validator for Length {
    fn precedence(&self) -> u8 {
        PRECEDENCE_RANGE
    }

    fn is_valid(&self, value: &Value) -> bool {
        if value.is_null() {
            return true;
        }
        let len = match value {
            Value::Text(s) => s.chars().count(),
            other => other.to_string().chars().count(),
        };
        self.min.is_none_or(|min| len >= min) && self.max.is_none_or(|max| len <= max)
    }

    fn failure_message(&self, field: &str) -> String {
        match (self.min, self.max) {
            (Some(min), Some(max)) => {
                format!("{field} length must be between {min} and {max}")
            }
            (Some(min), None) => format!("{field} length must be at least {min}"),
            (None, Some(max)) => format!("{field} length must be at most {max}"),
            (None, None) => format!("{field} has an invalid length"),
        }
    }

    fn code(&self) -> ValidationCode {
        ValidationCode::Len
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Range {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl Validator for Range {
    fn precedence(&self) -> u8 {
        PRECEDENCE_RANGE
    }

    fn is_valid(&self, value: &Value) -> bool {
        if value.is_null() {
            return true;
        }
        match value.as_f64() {
            Some(v) => self.min.is_none_or(|min| v >= min) && self.max.is_none_or(|max| v <= max),
            None => false,
        }
    }

    fn failure_message(&self, field: &str) -> String {
        match (self.min, self.max) {
            (Some(min), Some(max)) => format!("{field} must be between {min} and {max}"),
            (Some(min), None) => format!("{field} must be at least {min}"),
            (None, Some(max)) => format!("{field} must be at most {max}"),
            (None, None) => format!("{field} is out of range"),
        }
    }

    fn code(&self) -> ValidationCode {
        ValidationCode::Range
    }
}

fn text_check(value: &Value, check: impl Fn(&str) -> bool) -> bool {
    match value {
        Value::Null => true,
        Value::Text(s) => check(s),
        _ => false,
    }
}

#[cfg(feature = "validate")]
#[derive(Debug, Clone, Copy)]
pub struct EmailFormat;

#[cfg(feature = "validate")]
impl Validator for EmailFormat {
    fn precedence(&self) -> u8 {
        PRECEDENCE_FORMAT
    }

    fn is_valid(&self, value: &Value) -> bool {
        text_check(value, is_email)
    }

    fn failure_message(&self, field: &str) -> String {
        format!("{field} must be a valid email address")
    }

    fn code(&self) -> ValidationCode {
        ValidationCode::Email
    }
}

#[cfg(feature = "validate")]
#[derive(Debug, Clone, Copy)]
pub struct UrlFormat;

#[cfg(feature = "validate")]
impl Validator for UrlFormat {
    fn precedence(&self) -> u8 {
        PRECEDENCE_FORMAT
    }

    fn is_valid(&self, value: &Value) -> bool {
        text_check(value, is_url)
    }

    fn failure_message(&self, field: &str) -> String {
        format!("{field} must be a valid url")
    }

    fn code(&self) -> ValidationCode {
        ValidationCode::Url
    }
}

#[derive(Debug, Clone, Copy)]
pub struct UuidFormat;

impl Validator for UuidFormat {
    fn precedence(&self) -> u8 {
        PRECEDENCE_FORMAT
    }

    fn is_valid(&self, value: &Value) -> bool {
        match value {
            Value::Uuid(_) => true,
            other => text_check(other, is_uuid),
        }
    }

    fn failure_message(&self, field: &str) -> String {
        format!("{field} must be a valid uuid")
    }

    fn code(&self) -> ValidationCode {
        ValidationCode::Uuid
    }
}

/// Matches text against a regex compiled at registration time.
#[cfg(feature = "validate")]
#[derive(Debug, Clone)]
pub struct Pattern {
    regex: regex::Regex,
}

#[cfg(feature = "validate")]
impl Pattern {
    pub fn new(pattern: &str) -> OrmResult<Self> {
        regex::Regex::new(pattern)
            .map(|regex| Self { regex })
            .map_err(|e| OrmError::configuration(format!("invalid regex {pattern:?}: {e}")))
    }
}

#[cfg(feature = "validate")]
impl Validator for Pattern {
    fn precedence(&self) -> u8 {
        PRECEDENCE_FORMAT
    }

    fn is_valid(&self, value: &Value) -> bool {
        text_check(value, |s| self.regex.is_match(s))
    }

    fn failure_message(&self, field: &str) -> String {
        format!("{field} has an invalid format")
    }

    fn code(&self) -> ValidationCode {
        ValidationCode::Regex
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OneOf {
    pub options: &'static [&'static str],
}

impl Validator for OneOf {
    fn precedence(&self) -> u8 {
        PRECEDENCE_FORMAT
    }

    fn is_valid(&self, value: &Value) -> bool {
        match value {
            Value::Null => true,
            Value::Text(s) => self.options.contains(&s.as_str()),
            other => self.options.contains(&other.to_string().as_str()),
        }
    }

    fn failure_message(&self, field: &str) -> String {
        format!("{field} must be one of: {}", self.options.join(", "))
    }

    fn code(&self) -> ValidationCode {
        ValidationCode::OneOf
    }
}

/// Best-effort email validation.
#[cfg(feature = "validate")]
pub fn is_email(s: &str) -> bool {
    use std::sync::OnceLock;
    static EMAIL_RE: OnceLock<regex::Regex> = OnceLock::new();
    EMAIL_RE
        .get_or_init(|| {
            regex::Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("invalid built-in email regex")
        })
        .is_match(s)
}

#[cfg(feature = "validate")]
pub fn is_url(s: &str) -> bool {
    url::Url::parse(s).is_ok()
}

pub fn is_uuid(s: &str) -> bool {
    uuid::Uuid::parse_str(s).is_ok()
}

fn run_field(meta: &EntityMeta, field: &str, value: &Value) -> Result<(), ValidationError> {
    let Some(field_meta) = meta.field(field) else {
        return Ok(());
    };
    match field_meta
        .validators
        .iter()
        .find(|validator| !validator.is_valid(value))
    {
        Some(failed) => Err(ValidationError::new(
            field,
            failed.code(),
            failed.failure_message(field),
        )),
        None => Ok(()),
    }
}

/// Validate each changed field, stopping at the first failure.
pub fn validate_changes(meta: &EntityMeta, changes: &[ChangedField]) -> Result<(), ValidationError> {
    changes
        .iter()
        .try_for_each(|change| run_field(meta, change.name, &change.value))
}

/// Validate every field of a new entity, including fields never assigned.
pub fn validate_entity<T: Entity>(meta: &EntityMeta, entity: &T) -> Result<(), ValidationError> {
    meta.fields
        .iter()
        .enumerate()
        .filter(|(_, f)| !f.validators.is_empty())
        .try_for_each(|(index, f)| run_field(meta, f.name, &entity.field_value(index)))
}
