use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::field::{self, FieldKind};
use crate::manager::Manager;
use crate::model::Instance;
use crate::query::Query;
use crate::schema::{Schema, SchemaBuilder};
use crate::storage::Storage;
use crate::value::Key;

/// A reverse `_set` accessor recorded on a foreign key's target model.
#[derive(Debug, Clone)]
struct ReverseAccessor {
    /// Accessor name on the target, eg. `mydepmodel_set`.
    name: String,
    /// Model declaring the foreign key.
    source: String,
    /// Foreign-key field name on the source model.
    field: String,
}

/// The schema registry and owner of one [`Manager`] per registered model.
///
/// Registration freezes a [`SchemaBuilder`] into an `Arc<Schema>` after
/// validating the schema-definition invariants, and records the cross-model
/// plumbing: foreign-key target metadata and reverse `_set` accessors.
/// The database is also the seam for foreign-key resolution, since that is
/// the one operation spanning two managers.
#[derive(Debug)]
pub struct Database {
    root_dir: PathBuf,
    schemas: IndexMap<String, Arc<Schema>>,
    managers: IndexMap<String, Manager>,
    reverse: HashMap<String, Vec<ReverseAccessor>>,
}

impl Database {
    pub fn new() -> Self {
        Database::with_root(".")
    }

    /// `root_dir` anchors [`Database::path_for`] file naming.
    pub fn with_root(root_dir: impl Into<PathBuf>) -> Self {
        Database {
            root_dir: root_dir.into(),
            schemas: IndexMap::new(),
            managers: IndexMap::new(),
            reverse: HashMap::new(),
        }
    }

    /// Validate and freeze a schema, create its manager, and wire up
    /// foreign keys.
    ///
    /// Fails fast on definition errors: a field named `pk`, no primary-key
    /// field, auto-increment on a non-integer field, a foreign key to an
    /// unregistered or multi-field-primary-key model, or a second foreign
    /// key producing the same reverse accessor. Auto-increment counters are
    /// initialized here and never implicitly reset.
    pub fn register(&mut self, builder: SchemaBuilder) -> Result<Arc<Schema>> {
        let (name, mut fields) = builder.into_parts();

        if self.schemas.contains_key(&name) {
            return Err(Error::DuplicateModel(name));
        }
        if fields.contains_key("pk") {
            return Err(Error::ReservedFieldName { model: name });
        }
        if !fields.values().any(|field| field.is_primary_key()) {
            return Err(Error::NoPrimaryKey(name));
        }

        let accessor_name = format!("{}_set", name.to_lowercase());
        let mut accessors: Vec<(String, ReverseAccessor)> = Vec::new();

        for (field_name, descriptor) in fields.iter_mut() {
            if descriptor.is_auto_increment() && !matches!(descriptor.kind(), FieldKind::Int) {
                return Err(Error::InvalidFieldConfig {
                    model: name,
                    field: field_name.clone(),
                    reason: "auto-increment requires an integer field".to_string(),
                });
            }

            if let Some(target) = descriptor.foreign_target_mut() {
                let target_schema = self
                    .schemas
                    .get(&target.model)
                    .ok_or_else(|| Error::UnknownModel(target.model.clone()))?;

                let target_pks = target_schema.pk_fields();
                let [pk_name] = target_pks else {
                    return Err(Error::InvalidFieldConfig {
                        model: name,
                        field: field_name.clone(),
                        reason: format!(
                            "foreign key to multi-field-primary-key model `{}`",
                            target.model
                        ),
                    });
                };
                let pk_kind = target_schema
                    .field(pk_name)
                    .map(|f| f.kind().clone())
                    .ok_or_else(|| Error::UnknownField {
                        model: target.model.clone(),
                        field: pk_name.clone(),
                    })?;
                target.pk = Some((pk_name.clone(), Box::new(pk_kind)));

                let taken = accessors.iter().any(|(model, _)| *model == target.model)
                    || self
                        .reverse
                        .get(&target.model)
                        .is_some_and(|list| list.iter().any(|a| a.name == accessor_name));
                if taken {
                    return Err(Error::InvalidFieldConfig {
                        model: name,
                        field: field_name.clone(),
                        reason: format!(
                            "reverse accessor `{accessor_name}` already exists on `{}`",
                            target.model
                        ),
                    });
                }

                accessors.push((
                    target.model.clone(),
                    ReverseAccessor {
                        name: accessor_name.clone(),
                        source: name.clone(),
                        field: field_name.clone(),
                    },
                ));
            }
        }

        for (field_name, descriptor) in &fields {
            if descriptor.is_auto_increment() {
                field::init_counter(&name, field_name);
            }
        }

        let schema = Arc::new(Schema::finish(name.clone(), fields));
        for (target, accessor) in accessors {
            self.reverse.entry(target).or_default().push(accessor);
        }
        self.managers
            .insert(name.clone(), Manager::new(Arc::clone(&schema)));
        self.schemas.insert(name, Arc::clone(&schema));

        tracing::info!(model = schema.name(), "registered model schema");
        Ok(schema)
    }

    pub fn schema(&self, model: &str) -> Result<&Arc<Schema>> {
        self.schemas
            .get(model)
            .ok_or_else(|| Error::UnknownModel(model.to_string()))
    }

    pub fn manager(&self, model: &str) -> Result<&Manager> {
        self.managers
            .get(model)
            .ok_or_else(|| Error::UnknownModel(model.to_string()))
    }

    pub fn manager_mut(&mut self, model: &str) -> Result<&mut Manager> {
        self.managers
            .get_mut(model)
            .ok_or_else(|| Error::UnknownModel(model.to_string()))
    }

    /// Registered model names, in registration order.
    pub fn models(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    /// Hand `instance` to its manager and mark it saved. Returns the clean
    /// instance for chaining. Persistent saving is the manager's
    /// [`store`](Manager::store).
    pub fn save(&mut self, mut instance: Instance) -> Result<Instance> {
        instance.mark_saved();
        let manager = self.manager_mut(&instance.model().to_string())?;
        manager.save(instance.clone(), true)?;
        Ok(instance)
    }

    /// Resolve a foreign-key field to a fresh copy of the referenced
    /// instance, fetched by pk from the target's manager right now.
    ///
    /// The copy is yours: mutating it never touches the stored reference,
    /// and its changes only become visible once it is saved and the field
    /// re-resolved.
    pub fn resolve(&self, instance: &Instance, field: &str) -> Result<Instance> {
        let model = instance.model();
        let descriptor = instance
            .schema()
            .field(field)
            .ok_or_else(|| Error::UnknownField {
                model: model.to_string(),
                field: field.to_string(),
            })?;
        let target = descriptor
            .foreign_target()
            .ok_or_else(|| Error::InvalidFieldConfig {
                model: model.to_string(),
                field: field.to_string(),
                reason: "not a foreign-key field".to_string(),
            })?;
        let stored = instance.get(field).ok_or_else(|| Error::UnsetForeignKey {
            model: model.to_string(),
            field: field.to_string(),
        })?;

        self.manager(&target.model)?
            .get_pk(&Key::single(stored.clone()))
    }

    /// The reverse `_set` accessor: every instance whose foreign key
    /// points at `instance`.
    pub fn related(&self, instance: &Instance, accessor: &str) -> Result<Query> {
        let found = self
            .reverse
            .get(instance.model())
            .and_then(|list| list.iter().find(|a| a.name == accessor))
            .ok_or_else(|| Error::UnknownField {
                model: instance.model().to_string(),
                field: accessor.to_string(),
            })?;

        self.manager(&found.source)?.filter(&found.field, instance)
    }

    pub fn store(&mut self, model: &str, storage: &mut dyn Storage, force: bool) -> Result<()> {
        self.manager_mut(model)?.store(storage, force)
    }

    pub fn load(&mut self, model: &str, storage: &dyn Storage) -> Result<()> {
        self.manager_mut(model)?.load(storage)
    }

    /// `<root>/<Model>.<ext>` — file naming from the storage's extension
    /// identifier. Naming only; the storage decides everything else.
    pub fn path_for(&self, model: &str, storage: &dyn Storage) -> Result<PathBuf> {
        self.schema(model)?;
        Ok(self
            .root_dir
            .join(format!("{model}.{}", storage.extension())))
    }
}

impl Default for Database {
    fn default() -> Self {
        Database::new()
    }
}
