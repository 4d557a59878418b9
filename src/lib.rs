//! Embedded, in-memory typed object store.
//!
//! # Core Concepts
//!
//! - [`Field`]: shared, immutable type descriptor for one attribute —
//!   casting, (de)serialization, and role flags (primary key, indexed,
//!   auto-increment, foreign key).
//! - [`Schema`] / [`Instance`]: a schema defines a "table"; an instance
//!   holds a row, with dirty tracking and primary-key derivation.
//! - [`Manager`]: the owning collection for all instances of one model,
//!   keyed by primary key, aggregating dirty state and orchestrating
//!   load/store through a [`Storage`] collaborator.
//! - [`Query`]: chainable equality-filter/sort/materialize view over a
//!   manager snapshot.
//! - [`Database`]: the schema registry owning one manager per model and
//!   the cross-model seams (foreign-key resolution, reverse accessors).
//!
//! Everything is single-threaded and synchronous; callers serialize
//! concurrent access themselves.
//!
//! ```
//! use tabula::{Database, Field, Order, Schema};
//!
//! let mut db = Database::new();
//! let entry = db.register(
//!     Schema::builder("Entry")
//!         .field("id", Field::int().primary_key())
//!         .field("title", Field::string()),
//! )?;
//!
//! db.save(entry.create(vec![("id", 1.into()), ("title", "first".into())])?)?;
//! db.save(entry.create(vec![("id", 2.into()), ("title", "second".into())])?)?;
//!
//! let manager = db.manager("Entry")?;
//! assert_eq!(manager.get("title", "first")?.get("id"), Some(&1.into()));
//! assert_eq!(manager.order_by(&["id"], Order::Desc)?[0].get("id"), Some(&2.into()));
//! # Ok::<(), tabula::Error>(())
//! ```

mod db;
mod error;
mod field;
mod manager;
mod model;
mod query;
mod schema;
mod signals;
mod storage;
mod value;

pub use db::Database;
pub use error::{Error, Result};
pub use field::{Field, FieldKind, ForeignKeyTarget};
pub use manager::Manager;
pub use model::Instance;
pub use query::{Order, Query};
pub use schema::{Schema, SchemaBuilder};
pub use signals::{FieldChange, SignalHub};
pub use storage::{JsonStorage, Record, Storage};
pub use value::{Input, Key, Value};

#[doc(hidden)]
pub use field::reset_counters;
