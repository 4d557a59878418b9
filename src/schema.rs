use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::Result;
use crate::field::{self, Field};
use crate::model::Instance;
use crate::signals::SignalHub;
use crate::value::{Input, Value};

/// Collects field declarations for one model, in declaration order.
///
/// Builders carry no validation of their own; the invariants (reserved
/// names, primary-key rules, foreign-key targets) are checked when the
/// builder is handed to [`Database::register`](crate::Database::register),
/// which freezes it into an [`Arc<Schema>`].
#[derive(Debug)]
pub struct SchemaBuilder {
    name: String,
    fields: IndexMap<String, Field>,
}

impl SchemaBuilder {
    pub fn field(mut self, name: impl Into<String>, field: Field) -> Self {
        self.fields.insert(name.into(), field);
        self
    }

    pub(crate) fn into_parts(self) -> (String, IndexMap<String, Field>) {
        (self.name, self.fields)
    }
}

/// The ordered name→[`Field`] mapping defining one model.
///
/// A schema is the "table" whose rows are [`Instance`]s. One `Arc<Schema>`
/// is shared by the model's manager and every instance.
#[derive(Debug)]
pub struct Schema {
    name: String,
    fields: IndexMap<String, Field>,
    pk_fields: Vec<String>,
    signals: SignalHub,
}

impl Schema {
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            name: name.into(),
            fields: IndexMap::new(),
        }
    }

    pub(crate) fn finish(name: String, fields: IndexMap<String, Field>) -> Self {
        let pk_fields = fields
            .iter()
            .filter(|(_, field)| field.is_primary_key())
            .map(|(name, _)| name.clone())
            .collect();
        Schema {
            name,
            fields,
            pk_fields,
            signals: SignalHub::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields.iter().map(|(name, field)| (name.as_str(), field))
    }

    /// Primary-key field names, in declaration order.
    pub fn pk_fields(&self) -> &[String] {
        &self.pk_fields
    }

    pub fn signals(&self) -> &SignalHub {
        &self.signals
    }

    /// Construct an instance against this schema.
    ///
    /// Provided values are assigned through the normal cast/dirty path;
    /// unset scalar fields default to none, unset foreign keys stay absent,
    /// and unset auto-increment fields draw the next counter value.
    /// Creation observers fire once the instance is complete.
    pub fn create(self: &Arc<Self>, values: Vec<(&str, Input)>) -> Result<Instance> {
        let mut instance = Instance::bare(Arc::clone(self));
        for (name, input) in values {
            instance.set(name, input)?;
        }

        for (name, descriptor) in &self.fields {
            if descriptor.is_auto_increment()
                && instance.get(name).is_none_or(Value::is_none)
            {
                let next = field::next_counter(&self.name, name);
                instance.set(name.as_str(), Value::Int(next))?;
            }
        }

        self.signals.notify_creation(&instance);
        Ok(instance)
    }

    /// Human-readable field summary. Diagnostic only.
    pub fn describe(&self) -> String {
        let fields: Vec<String> = self
            .fields
            .iter()
            .map(|(name, field)| format!("{}:{}", name, field.kind().name()))
            .collect();
        format!("<{}: {}>", self.name, fields.join(", "))
    }
}
