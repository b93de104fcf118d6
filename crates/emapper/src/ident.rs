//! SQL identifier checks for table names, aliases and columns.
//!
//! Mapped identifiers are spliced into SQL text, so they are restricted to
//! unquoted parts matching `[A-Za-z_][A-Za-z0-9_$]*`. Table names may carry
//! a schema prefix (`dbo.users`); aliases and columns may not.

use crate::error::{OrmError, OrmResult};

/// What an identifier names, used in error messages and to decide whether
/// dotted forms are allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentKind {
    Table,
    Alias,
    Column,
}

impl IdentKind {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Alias => "alias",
            Self::Column => "column",
        }
    }
}

fn is_valid_part(part: &str) -> bool {
    let mut chars = part.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Check that `name` is a usable identifier of the given kind.
pub fn check(kind: IdentKind, name: &str) -> OrmResult<()> {
    if name.is_empty() {
        return Err(OrmError::configuration(format!(
            "{} name cannot be empty",
            kind.as_str()
        )));
    }
    let valid = match kind {
        IdentKind::Table => name.split('.').all(is_valid_part),
        IdentKind::Alias | IdentKind::Column => is_valid_part(name),
    };
    if valid {
        Ok(())
    } else {
        Err(OrmError::configuration(format!(
            "invalid {} name '{name}'",
            kind.as_str()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_names() {
        assert!(check(IdentKind::Table, "newcrm_user_role").is_ok());
        assert!(check(IdentKind::Alias, "ur").is_ok());
        assert!(check(IdentKind::Column, "_private$1").is_ok());
    }

    #[test]
    fn table_allows_schema_prefix() {
        assert!(check(IdentKind::Table, "dbo.users").is_ok());
        assert!(check(IdentKind::Alias, "dbo.users").is_err());
        assert!(check(IdentKind::Table, "dbo.").is_err());
    }

    #[test]
    fn rejects_injection_shapes() {
        assert!(check(IdentKind::Column, "id; DROP TABLE x").is_err());
        assert!(check(IdentKind::Column, "1abc").is_err());
        assert!(check(IdentKind::Table, "").is_err());
        assert!(check(IdentKind::Alias, "a b").is_err());
    }
}
