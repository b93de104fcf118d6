//! Shared state of one mapping setup.
//!
//! A [`MapperContext`] owns the active dialect, the entity registry, the
//! result cache and the options. It is shared through [`Arc`]; each caller
//! or worker obtains its own [`Mapper`] with [`MapperContext::create_mapper`].

use crate::cache::{MemoryQueryCache, QueryCache};
use crate::config::MapperOptions;
use crate::connection::Connection;
use crate::diagnostics::SqlLog;
use crate::dialect::Dialect;
use crate::error::{OrmError, OrmResult};
use crate::mapper::Mapper;
use crate::registry::EntityRegistry;
use crate::statement::Statement;
use crate::translate::{TranslationResult, Translator};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

pub struct MapperContext {
    options: MapperOptions,
    dialect: RwLock<Option<Arc<dyn Dialect>>>,
    /// Set by the first translation; the dialect is frozen afterwards.
    translated: AtomicBool,
    registry: EntityRegistry,
    cache: Arc<dyn QueryCache>,
    log: SqlLog,
}

impl std::fmt::Debug for MapperContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapperContext")
            .field("options", &self.options)
            .field("translated", &self.translated.load(Ordering::Relaxed))
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl MapperContext {
    pub fn new(options: MapperOptions) -> Arc<Self> {
        Self::with_cache(options, Arc::new(MemoryQueryCache::new()))
    }

    /// Context backed by a caller-supplied cache.
    pub fn with_cache(options: MapperOptions, cache: Arc<dyn QueryCache>) -> Arc<Self> {
        Arc::new(Self {
            dialect: RwLock::new(options.dialect.clone()),
            translated: AtomicBool::new(false),
            registry: EntityRegistry::new(),
            log: SqlLog::new(&options),
            cache,
            options,
        })
    }

    pub fn options(&self) -> &MapperOptions {
        &self.options
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &Arc<dyn QueryCache> {
        &self.cache
    }

    pub(crate) fn log(&self) -> &SqlLog {
        &self.log
    }

    /// The active dialect.
    pub fn dialect(&self) -> OrmResult<Arc<dyn Dialect>> {
        self.dialect
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or_else(|| OrmError::configuration("no dialect selected"))
    }

    /// Select the dialect. Fails once any statement has been translated.
    pub fn set_dialect(&self, dialect: Arc<dyn Dialect>) -> OrmResult<()> {
        let mut slot = self.dialect.write().unwrap_or_else(|e| e.into_inner());
        if self.translated.load(Ordering::Acquire) {
            let current = slot.as_ref().map(|d| d.name()).unwrap_or("none");
            return Err(OrmError::configuration(format!(
                "cannot switch dialect from {current} to {} after statements were translated",
                dialect.name()
            )));
        }
        *slot = Some(dialect);
        Ok(())
    }

    /// Lower a statement with the active dialect.
    pub fn translate(&self, stmt: Statement) -> OrmResult<TranslationResult> {
        let slot = self.dialect.read().unwrap_or_else(|e| e.into_inner());
        let dialect = slot
            .as_deref()
            .ok_or_else(|| OrmError::configuration("no dialect selected"))?;
        self.translated.store(true, Ordering::Release);

        let result = Translator::new(dialect, &self.registry).translate(stmt)?;
        self.log.statement(&result);
        Ok(result)
    }

    /// Open a connection with the configured connector, falling back to the
    /// dialect's bundled driver.
    pub fn connect(&self) -> OrmResult<Box<dyn Connection>> {
        match &self.options.connector {
            Some(connector) => connector.connect(),
            None => self.dialect()?.connect(&self.options.connection),
        }
    }

    pub fn create_mapper(self: &Arc<Self>) -> Mapper {
        Mapper::new(Arc::clone(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{MySqlDialect, SqliteDialect};
    use crate::fixtures::User;

    #[test]
    fn dialect_is_required() {
        let ctx = MapperContext::new(MapperOptions::new());
        let err = ctx.translate(Statement::select(crate::entity::EntityRef::of::<User>())).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn dialect_freezes_after_first_translation() {
        let ctx = MapperContext::new(MapperOptions::new().use_sqlite());
        ctx.set_dialect(Arc::new(MySqlDialect::new())).unwrap();
        assert_eq!(ctx.dialect().unwrap().name(), "mysql");

        ctx.translate(Statement::select(crate::entity::EntityRef::of::<User>())).unwrap();
        let err = ctx.set_dialect(Arc::new(SqliteDialect::new())).unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(ctx.dialect().unwrap().name(), "mysql");
    }

    #[test]
    fn mysql_has_no_bundled_driver() {
        let ctx = MapperContext::new(MapperOptions::new().use_mysql().connection_string("x"));
        assert!(ctx.connect().err().unwrap().is_configuration());
    }
}
