//! Entity type registry.
//!
//! Resolves each entity type to its table, alias and validator table exactly
//! once per context. Entries are keyed by [`TypeId`], so two types sharing a
//! name in different modules never collide.

use crate::entity::EntityRef;
use crate::error::{OrmError, OrmResult};
use crate::ident::{self, IdentKind};
use crate::validate::Validator;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

/// Resolved field descriptor with its ordered validators.
#[derive(Debug)]
pub struct FieldMeta {
    pub name: &'static str,
    pub column: &'static str,
    /// Sorted by precedence, lowest first.
    pub validators: Vec<Box<dyn Validator>>,
}

/// Resolved table identity of an entity type.
#[derive(Debug)]
pub struct EntityMeta {
    pub type_name: &'static str,
    pub table: &'static str,
    pub alias: &'static str,
    pub soft_delete: bool,
    pub fields: Vec<FieldMeta>,
}

impl EntityMeta {
    fn build(entity: &EntityRef) -> OrmResult<Self> {
        let model = entity.model();
        ident::check(IdentKind::Table, model.table)?;
        ident::check(IdentKind::Alias, model.alias)?;

        let mut fields = Vec::with_capacity(model.fields.len());
        for def in model.fields {
            ident::check(IdentKind::Column, def.column)?;
            let validators = def
                .rules
                .iter()
                .map(|rule| rule.to_validator())
                .collect::<OrmResult<Vec<_>>>()?;
            fields.push(FieldMeta {
                name: def.name,
                column: def.column,
                validators,
            });
        }

        for (name, validator) in (entity.extra_validators)() {
            let field = fields.iter_mut().find(|f| f.name == name).ok_or_else(|| {
                OrmError::configuration(format!(
                    "validator registered for unknown field '{name}' on {}",
                    model.type_name
                ))
            })?;
            field.validators.push(validator);
        }
        for field in &mut fields {
            field.validators.sort_by_key(|v| v.precedence());
        }

        Ok(Self {
            type_name: model.type_name,
            table: model.table,
            alias: model.alias,
            soft_delete: model.soft_delete,
            fields,
        })
    }

    pub fn field(&self, name: &str) -> Option<&FieldMeta> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Index of the field mapped to `column`, compared case-insensitively.
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| f.column.eq_ignore_ascii_case(column))
    }

    /// `alias.column`
    pub fn qualify(&self, column: &str) -> String {
        format!("{}.{}", self.alias, column)
    }
}

/// Shared type-to-table registry.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    entries: RwLock<HashMap<TypeId, Arc<EntityMeta>>>,
    builds: AtomicUsize,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an entity type, registering it on first access.
    ///
    /// Concurrent first accesses are serialized on the write lock; only one
    /// of them builds the entry.
    pub fn resolve(&self, entity: EntityRef) -> OrmResult<Arc<EntityMeta>> {
        {
            let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
            if let Some(meta) = entries.get(&entity.type_id()) {
                return Ok(Arc::clone(meta));
            }
        }

        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if let Some(meta) = entries.get(&entity.type_id()) {
            return Ok(Arc::clone(meta));
        }
        let meta = Arc::new(EntityMeta::build(&entity)?);
        self.builds.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            target: "emapper.registry",
            entity = meta.type_name,
            table = meta.table,
            alias = meta.alias,
            "registered entity"
        );
        entries.insert(entity.type_id(), Arc::clone(&meta));
        Ok(meta)
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// How many entries were built since creation.
    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityBase;
    use crate::fixtures::{AppStar, User};
    use crate::validate::{PRECEDENCE_RANGE, PRECEDENCE_REQUIRED};

    mod archive {
        use crate::entity::EntityBase;
        use emapper_derive::Entity;

        #[derive(Debug, Default, Entity)]
        #[orm(table = "archived_user", alias = "au")]
        pub struct User {
            #[orm(base)]
            pub base: EntityBase,
            pub name: String,
        }
    }

    #[derive(Debug, Default, emapper_derive::Entity)]
    #[orm(table = "bad table")]
    struct BadTable {
        #[orm(base)]
        base: EntityBase,
    }

    #[test]
    fn resolves_table_identity() {
        let registry = EntityRegistry::new();
        let meta = registry.resolve(EntityRef::of::<User>()).unwrap();
        assert_eq!(meta.table, "newcrm_user");
        assert_eq!(meta.alias, "u");
        assert!(meta.soft_delete);
        assert_eq!(meta.qualify("name"), "u.name");
        assert_eq!(meta.field("admin").map(|f| f.column), Some("is_admin"));
        assert_eq!(meta.column_index("IS_ADMIN"), meta.field_index("admin"));
        assert!(meta.field("scratch").is_none());
    }

    #[test]
    fn validators_sorted_by_precedence() {
        let registry = EntityRegistry::new();
        let meta = registry.resolve(EntityRef::of::<User>()).unwrap();
        let name = meta.field("name").unwrap();
        let order: Vec<u8> = name.validators.iter().map(|v| v.precedence()).collect();
        assert_eq!(order, vec![PRECEDENCE_RANGE, PRECEDENCE_REQUIRED]);
    }

    #[test]
    fn same_type_name_in_different_modules_does_not_collide() {
        let registry = EntityRegistry::new();
        let ours = registry.resolve(EntityRef::of::<User>()).unwrap();
        let theirs = registry.resolve(EntityRef::of::<archive::User>()).unwrap();
        assert_eq!(ours.table, "newcrm_user");
        assert_eq!(theirs.table, "archived_user");
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn concurrent_first_access_builds_once() {
        let registry = Arc::new(EntityRegistry::new());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    registry.resolve(EntityRef::of::<AppStar>()).unwrap().table
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), "newcrm_app_star");
        }
        assert_eq!(registry.build_count(), 1);
        registry.resolve(EntityRef::of::<AppStar>()).unwrap();
        assert_eq!(registry.build_count(), 1);
    }

    #[test]
    fn invalid_table_name_is_a_configuration_error() {
        let registry = EntityRegistry::new();
        let err = registry.resolve(EntityRef::of::<BadTable>()).unwrap_err();
        assert!(err.is_configuration());
        assert!(registry.is_empty());
    }
}
