//! Convenient imports for typical `emapper` usage.
//!
//! ```ignore
//! use emapper::prelude::*;
//! ```

pub use crate::{
    Criteria, Entity, EntityBase, Mapper, MapperContext, MapperOptions, OrmError, OrmResult,
    Parameter, Predicate, Projection, RawResult, Value, and, not, or,
};

pub use crate::IsolationLevel;
