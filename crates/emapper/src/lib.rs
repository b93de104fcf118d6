//! # emapper
//!
//! A small relational mapper with pluggable SQL dialects.
//!
//! ## Features
//!
//! - **Typed predicates**: filters are an explicit AST built from `COL_*`
//!   column handles and `and`/`or`/`not` combinators
//! - **Dialects**: MySQL, SQL Server, SQLite and PostgreSQL syntax from one statement
//! - **Change tracking**: updates only write the fields that were set
//! - **Validation**: declarative per-field rules, checked before any SQL is sent
//! - **Result cache**: identical reads within the TTL reuse the earlier result
//! - **Ambient transactions**: one unit of work per [`Mapper`]
//!
//! ```ignore
//! use emapper::prelude::*;
//!
//! #[derive(Debug, Default, Entity)]
//! #[orm(table = "users", alias = "u")]
//! struct User {
//!     #[orm(base)]
//!     base: EntityBase,
//!     #[orm(required, len = "2..=32")]
//!     name: String,
//!     age: i32,
//! }
//!
//! let ctx = MapperContext::new(
//!     MapperOptions::new().use_sqlite().connection_string("app.db"),
//! );
//! let mut mapper = ctx.create_mapper();
//!
//! let mut user = User::default();
//! user.set_name("ann");
//! user.set_age(30);
//! mapper.add(&mut user)?;
//!
//! let found = mapper
//!     .query::<User>()
//!     .filter(User::COL_NAME.starts_with("a").and(User::COL_AGE.ge(18)))
//!     .order_by_desc(User::COL_ID)
//!     .page(1, 10)
//!     .to_list()?;
//! ```

// Lets `#[derive(Entity)]` output (which names `::emapper`) compile inside this crate.
extern crate self as emapper;

pub mod cache;
pub mod changeset;
pub mod config;
pub mod connection;
pub mod context;
pub mod criteria;
pub(crate) mod diagnostics;
pub mod dialect;
pub mod driver;
pub mod entity;
pub mod error;
pub mod exec;
pub mod expr;
pub mod ident;
pub mod mapper;
pub mod param;
pub mod prelude;
pub mod query;
pub mod registry;
pub mod statement;
pub mod translate;
pub mod validate;
pub mod value;

#[cfg(test)]
pub(crate) mod fixtures;

pub use cache::{MemoryQueryCache, QueryCache};
pub use changeset::{ValidationCode, ValidationError};
pub use config::{CacheConfig, ConnectionSettings, MapperOptions};
pub use connection::{Connection, Connector, Row, RowSet};
pub use context::MapperContext;
pub use criteria::Criteria;
pub use dialect::{
    Dialect, IsolationLevel, MsSqlDialect, MySqlDialect, PostgresDialect, SqliteDialect,
    TemplateSet,
};
pub use entity::{
    BASE_FIELDS, ChangeTracker, ChangedField, Column, Entity, EntityBase, EntityRef, FieldDef,
    ModelDef,
};
pub use error::{DriverError, OrmError, OrmResult};
pub use expr::{CompareOp, MatchKind, Predicate, and, not, or};
pub use mapper::{Mapper, RawResult};
pub use param::Parameter;
pub use query::Query;
pub use statement::{ExecuteKind, Projection, Statement};
pub use translate::{TranslationResult, Translator};
pub use validate::{Rule, Validator};
pub use value::{FromValue, Value};

#[cfg(feature = "derive")]
pub use emapper_derive::Entity;
