//! Derive macros for emapper
//!
//! Provides `#[derive(Entity)]`.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod entity;

/// Derive `Entity` for a struct embedding an `EntityBase`.
///
/// # Example
///
/// ```ignore
/// use emapper::{Entity, EntityBase};
///
/// #[derive(Debug, Default, Entity)]
/// #[orm(table = "newcrm_user_role", alias = "ur")]
/// pub struct UserRole {
///     #[orm(base)]
///     base: EntityBase,
///     #[orm(required)]
///     user_id: i64,
///     #[orm(required, range = "1..=99")]
///     role_id: i64,
/// }
/// ```
///
/// # Generated
///
/// - `impl Entity` with the indexed field descriptor table
/// - `COL_*: Column<Self>` - typed column handles, base columns included
/// - `fn <field>(&self)` getters and tracked `fn set_<field>(&mut self, ..)` mutators
///
/// # Attributes
///
/// - `#[orm(table = "name")]` - Table name (required)
/// - `#[orm(alias = "a")]` - Table alias (defaults to the snake_case type name)
/// - `#[orm(soft_delete = false)]` - Skip the `is_deleted = 0` filter
/// - `#[orm(base)]` - The embedded `EntityBase` field
/// - `#[orm(column = "name")]` - Map field to a different column name
/// - `#[orm(skip)]` - Field is not mapped
/// - `#[orm(required)]`, `#[orm(len = "2..=50")]`, `#[orm(range = "1..=5")]`,
///   `#[orm(email)]`, `#[orm(url)]`, `#[orm(uuid)]`, `#[orm(regex = "...")]`,
///   `#[orm(one_of = "a,b,c")]` - Validation rules
#[proc_macro_derive(Entity, attributes(orm))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    entity::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
