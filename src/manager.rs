use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::model::Instance;
use crate::query::{Order, Query};
use crate::schema::Schema;
use crate::storage::{Record, Storage};
use crate::value::{Input, Key};

/// The owning collection for every instance of one model.
///
/// Keyed by primary key, so iteration and persistence are always in
/// ascending pk order. Could rightly be called `Table`. The manager-level
/// dirty flag tracks membership changes (save/clear/delete); the aggregate
/// [`Manager::dirty`] also covers any owned instance's own flag.
#[derive(Debug)]
pub struct Manager {
    schema: Arc<Schema>,
    instances: BTreeMap<Key, Instance>,
    dirty: bool,
}

impl Manager {
    pub(crate) fn new(schema: Arc<Schema>) -> Self {
        Manager {
            schema,
            instances: BTreeMap::new(),
            dirty: false,
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Pretty name for logs, eg. `EntryManager`.
    pub fn name(&self) -> String {
        format!("{}Manager", self.schema.name())
    }

    pub fn count(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// All primary keys, ascending.
    pub fn pks(&self) -> Vec<Key> {
        self.instances.keys().cloned().collect()
    }

    /// All instances, ascending by pk.
    pub fn instances(&self) -> Vec<Instance> {
        self.instances.values().cloned().collect()
    }

    /// True if membership changed since the last store, or any owned
    /// instance has unsaved field changes.
    pub fn dirty(&self) -> bool {
        self.dirty || self.instances.values().any(Instance::dirty)
    }

    /// Take ownership of `instance`, keyed by its pk. Overwrites silently:
    /// last write for a pk wins and the previous instance is evicted.
    ///
    /// `mark_dirty` is false only during bulk load, so a freshly loaded
    /// collection does not report as dirty.
    pub fn save(&mut self, instance: Instance, mark_dirty: bool) -> Result<()> {
        let pk = instance.pk();
        if !pk.is_complete() {
            return Err(Error::MissingPrimaryKey {
                model: self.schema.name().to_string(),
            });
        }

        tracing::debug!(manager = %self.name(), pk = %pk, "saving model instance");
        self.instances.insert(pk, instance);
        if mark_dirty {
            self.dirty = true;
        }
        Ok(())
    }

    /// Drop every instance. Marks the manager dirty iff it held anything.
    /// Does not touch storage until [`Manager::store`] is called.
    pub fn clear(&mut self) {
        tracing::debug!(manager = %self.name(), "clearing all instances");
        self.dirty = !self.instances.is_empty();
        self.instances.clear();
    }

    /// Remove by primary key. Deleting an absent key is an idempotent
    /// no-op, not an error.
    pub fn delete(&mut self, pk: &Key) -> bool {
        if self.instances.remove(pk).is_some() {
            tracing::debug!(manager = %self.name(), pk = %pk, "deleted model instance");
            self.dirty = true;
            true
        } else {
            false
        }
    }

    pub fn delete_instance(&mut self, instance: &Instance) -> bool {
        self.delete(&instance.pk())
    }

    /// Push the collection through `storage` if `force` or anything is
    /// dirty; otherwise no I/O happens. A successful write marks every
    /// owned instance saved. The manager-level flag clears afterward
    /// either way.
    pub fn store(&mut self, storage: &mut dyn Storage, force: bool) -> Result<()> {
        if force || self.dirty() {
            tracing::debug!(
                manager = %self.name(),
                storage = storage.extension(),
                "has dirty records, storing"
            );
            let ordered: Vec<&Instance> = self.instances.values().collect();
            storage.write(&ordered)?;
            for instance in self.instances.values_mut() {
                instance.mark_saved();
            }
        } else {
            tracing::debug!(manager = %self.name(), "has no dirty records, not storing");
        }

        self.dirty = false;
        Ok(())
    }

    /// Replace the collection with the records `storage` produces.
    ///
    /// Raw field mappings are constructed against the model's schema and
    /// arrive clean. Fails fast on a duplicate primary key among the loaded
    /// records. A successful load leaves the manager clean.
    pub fn load(&mut self, storage: &dyn Storage) -> Result<()> {
        tracing::debug!(
            manager = %self.name(),
            storage = storage.extension(),
            "loading instances"
        );
        self.clear();

        for record in storage.read(&self.schema)? {
            let instance = match record {
                Record::Instance(instance) => instance,
                Record::Fields(map) => Instance::from_record(&self.schema, &map)?,
            };

            let pk = instance.pk();
            if self.instances.contains_key(&pk) {
                return Err(Error::DuplicateKey {
                    model: self.schema.name().to_string(),
                    pk: pk.to_string(),
                });
            }
            self.save(instance, false)?;
        }

        self.dirty = false;
        tracing::debug!(manager = %self.name(), count = self.count(), "finished loading");
        Ok(())
    }

    /// Single-instance lookup by primary key. Fails with
    /// [`Error::NotFound`] when nothing matches.
    pub fn get_pk(&self, pk: &Key) -> Result<Instance> {
        self.all().filter("pk", pk.clone())?.one()
    }

    /// Single-instance lookup by field equality. Fails on zero or more
    /// than one match.
    pub fn get(&self, field: &str, input: impl Into<Input>) -> Result<Instance> {
        self.filter(field, input)?.one()
    }

    pub fn filter(&self, field: &str, input: impl Into<Input>) -> Result<Query> {
        self.all().filter(field, input)
    }

    pub fn order_by(&self, fields: &[&str], order: Order) -> Result<Query> {
        self.all().order_by(fields, order)
    }

    /// A query over the full collection, snapshotted now.
    pub fn all(&self) -> Query {
        Query::new(self)
    }
}
