use thiserror::Error;

/// Errors surfaced by the store.
///
/// Every failure is local and deterministic; nothing here is retried.
/// Deleting an absent key is deliberately *not* an error (see
/// [`Manager::delete`](crate::Manager::delete)).
#[derive(Debug, Error)]
pub enum Error {
    /// A field was declared with the reserved name `pk`.
    #[error("field name `pk` is reserved (model `{model}`)")]
    ReservedFieldName { model: String },

    /// A field declaration is semantically invalid for its model.
    #[error("invalid field `{field}` on model `{model}`: {reason}")]
    InvalidFieldConfig {
        model: String,
        field: String,
        reason: String,
    },

    /// A model was registered with no primary-key field.
    #[error("model `{0}` declares no primary-key field")]
    NoPrimaryKey(String),

    /// A model name was registered twice.
    #[error("model `{0}` is already registered")]
    DuplicateModel(String),

    /// The named model is not registered with the database.
    #[error("model `{0}` is not registered")]
    UnknownModel(String),

    /// The named field does not exist on the model's schema.
    #[error("unknown field `{field}` on model `{model}`")]
    UnknownField { model: String, field: String },

    /// A value could not be converted to the field's declared type.
    #[error("cannot cast {given} to {expected} for field `{field}`")]
    Cast {
        field: String,
        expected: &'static str,
        given: String,
    },

    /// A primary-key field already held a non-none value.
    #[error("trying to change set pk value on `{model}`: {from} to {to}")]
    PrimaryKeyChanged {
        model: String,
        from: String,
        to: String,
    },

    /// An instance without a complete primary key was handed to a manager.
    #[error("instance of `{model}` has no primary key")]
    MissingPrimaryKey { model: String },

    /// Two records with the same primary key arrived in one bulk load.
    #[error("pk collision detected during load of `{model}`: {pk}")]
    DuplicateKey { model: String, pk: String },

    /// A foreign-key field was read or dumped before it was ever assigned.
    #[error("foreign key `{field}` on model `{model}` was never assigned")]
    UnsetForeignKey { model: String, field: String },

    /// A single-result lookup matched nothing.
    #[error("got no results for model `{model}`")]
    NotFound { model: String },

    /// A single-result lookup matched more than one instance.
    #[error("got {count} results for model `{model}`, expected 1")]
    MultipleResults { model: String, count: usize },

    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage (de)serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
