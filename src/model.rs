use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value as Json;

use crate::error::{Error, Result};
use crate::field::scalar_from_json;
use crate::schema::Schema;
use crate::signals::FieldChange;
use crate::value::{Input, Key, Value};

/// One row of a model: schema-driven attribute storage plus dirty state.
///
/// Instances are created by [`Schema::create`], never by a manager.
/// Assignments go through the field's cast, update the dirty flag, and
/// notify field-update observers. Handing an instance to
/// [`Database::save`](crate::Database::save) marks it saved.
///
/// Foreign-key attributes store the referenced primary key; reading the
/// referenced instance is an explicit
/// [`Database::resolve`](crate::Database::resolve), which returns a fresh
/// copy. Mutating that copy is local until it is saved itself.
#[derive(Debug, Clone)]
pub struct Instance {
    schema: Arc<Schema>,
    values: IndexMap<String, Value>,
    extra: IndexMap<String, Value>,
    dirty: bool,
}

impl Instance {
    /// Schema defaults only: scalars none, foreign keys absent.
    pub(crate) fn bare(schema: Arc<Schema>) -> Self {
        let mut values = IndexMap::new();
        for (name, field) in schema.fields() {
            if field.foreign_target().is_none() {
                values.insert(name.to_string(), Value::None);
            }
        }
        Instance {
            schema,
            values,
            extra: IndexMap::new(),
            dirty: false,
        }
    }

    /// Rebuild an instance from a persisted record. Arrives clean.
    pub(crate) fn from_record(
        schema: &Arc<Schema>,
        record: &serde_json::Map<String, Json>,
    ) -> Result<Self> {
        let mut instance = Instance::bare(Arc::clone(schema));
        for (name, json) in record {
            match schema.field(name) {
                Some(field) => {
                    let value = field.loads(name, json)?;
                    // a none foreign key stays absent, same as never assigned
                    if value.is_none() && field.foreign_target().is_some() {
                        continue;
                    }
                    instance.values.insert(name.clone(), value);
                }
                None => {
                    instance
                        .extra
                        .insert(name.clone(), scalar_from_json(name, json)?);
                }
            }
        }
        Ok(instance)
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// The model name this instance belongs to.
    pub fn model(&self) -> &str {
        self.schema.name()
    }

    /// The stored cast value, or the stored pk for a foreign-key field.
    /// `None` only for a never-assigned foreign key or an unknown name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name).or_else(|| self.extra.get(name))
    }

    /// Assign a field.
    ///
    /// Schema-declared names are cast, dirty-checked, checked for pk
    /// immutability, stored, then announced to observers. Other names are
    /// plain instance state with none of that.
    pub fn set(&mut self, name: &str, input: impl Into<Input>) -> Result<()> {
        let input = input.into();

        let Some(field) = self.schema.field(name) else {
            let value = match input {
                Input::Value(value) => value,
                Input::Reference(key) => match key.as_single() {
                    Some(value) => value.clone(),
                    None => {
                        return Err(Error::Cast {
                            field: name.to_string(),
                            expected: "value",
                            given: format!("reference {key}"),
                        })
                    }
                },
            };
            self.extra.insert(name.to_string(), value);
            return Ok(());
        };

        let new = field.cast(name, input)?;
        let old = self.values.get(name).cloned().unwrap_or(Value::None);

        if field.is_primary_key() && !old.is_none() && old != new {
            return Err(Error::PrimaryKeyChanged {
                model: self.schema.name().to_string(),
                from: old.to_string(),
                to: new.to_string(),
            });
        }

        if old != new {
            self.dirty = true;
        }
        self.values.insert(name.to_string(), new.clone());

        self.schema.signals().notify_field_update(&FieldChange {
            model: self.schema.name(),
            field: name,
            old: &old,
            new: &new,
        });
        Ok(())
    }

    /// The primary-key value: the sole pk field's value, or one component
    /// per pk field in declaration order. Complete once every component is
    /// non-none; a pk field cannot change after that (see [`Instance::set`]).
    pub fn pk(&self) -> Key {
        Key::composite(
            self.schema
                .pk_fields()
                .iter()
                .map(|name| self.values.get(name).cloned().unwrap_or(Value::None)),
        )
    }

    /// True if any field assignment stored a different value since the
    /// instance was last marked saved.
    pub fn dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_saved(&mut self) {
        self.dirty = false;
    }

    /// Serialize every schema field via its [`Field::dumps`](crate::Field::dumps),
    /// in schema order. Fails if a foreign-key field was never assigned —
    /// there is no pk to dump.
    pub fn to_record(&self) -> Result<serde_json::Map<String, Json>> {
        let mut record = serde_json::Map::new();
        for (name, field) in self.schema.fields() {
            let value = self.values.get(name).ok_or_else(|| Error::UnsetForeignKey {
                model: self.schema.name().to_string(),
                field: name.to_string(),
            })?;
            record.insert(name.to_string(), field.dumps(value)?);
        }
        Ok(record)
    }

    /// Field summary of the schema this instance was built against.
    pub fn describe(&self) -> String {
        self.schema.describe()
    }
}

// Shallow identity: same model, same pk. Not a full field comparison.
impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        self.schema.name() == other.schema.name() && self.pk() == other.pk()
    }
}

impl Eq for Instance {}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}: {}>", self.schema.name(), self.pk())
    }
}

impl From<&Instance> for Input {
    fn from(instance: &Instance) -> Self {
        Input::Reference(instance.pk())
    }
}
