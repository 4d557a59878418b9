mod json;

pub use json::JsonStorage;

use std::sync::Arc;

use crate::error::Result;
use crate::model::Instance;
use crate::schema::Schema;

/// One record produced by a storage read: an already-constructed instance,
/// or a raw field mapping the manager constructs against the schema itself.
#[derive(Debug)]
pub enum Record {
    Instance(Instance),
    Fields(serde_json::Map<String, serde_json::Value>),
}

/// The persistence collaborator consumed by [`Manager`](crate::Manager).
///
/// Implementations translate between instances and a durable
/// representation; the core never depends on the format.
pub trait Storage {
    /// File-extension identifier. Used only for naming (see
    /// [`Database::path_for`](crate::Database::path_for)), never behavior.
    fn extension(&self) -> &'static str;

    /// Persist the instances, already ordered ascending by pk. Must accept
    /// an empty sequence and report success.
    fn write(&mut self, records: &[&Instance]) -> Result<bool>;

    /// Produce every persisted record for the model.
    fn read(&self, schema: &Arc<Schema>) -> Result<Vec<Record>>;
}
