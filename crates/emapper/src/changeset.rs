//! Field validation error types.

use serde::Serialize;

/// A machine-friendly validation code.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationCode {
    Required,
    Len,
    Range,
    Email,
    Regex,
    Url,
    Uuid,
    OneOf,
    /// Nothing was changed on an entity submitted for update.
    NoChanges,
}

impl ValidationCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::Len => "len",
            Self::Range => "range",
            Self::Email => "email",
            Self::Regex => "regex",
            Self::Url => "url",
            Self::Uuid => "uuid",
            Self::OneOf => "one_of",
            Self::NoChanges => "no_changes",
        }
    }
}

impl Serialize for ValidationCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

/// A single field validation error.
///
/// The pipeline stops at the first failure, so one error is all a write reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub field: String,
    pub code: ValidationCode,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, code: ValidationCode, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            code,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_code_as_string() {
        let err = ValidationError::new("user_id", ValidationCode::Required, "user_id is required");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "required");
        assert_eq!(json["field"], "user_id");
        assert_eq!(json["message"], "user_id is required");
        assert_eq!(json.as_object().map(|o| o.len()), Some(3));
    }

    #[test]
    fn no_changes_code() {
        assert_eq!(ValidationCode::NoChanges.as_str(), "no_changes");
    }
}
