use thiserror::Error;

use crate::drop_pool::PoolId;
use crate::feature::ValueKind;
use crate::modifiers::ItemId;
use crate::stat_addressing::StoreKindId;

/// Error type for the effect system
#[derive(Debug, Error)]
pub enum StatError {
    /// A class name that was never registered as a store kind
    #[error("Unknown store kind '{class_name}'")]
    UnknownStoreKind { class_name: String },

    /// A `@Class.N` / `!Class.N` token that could not be parsed
    #[error("Malformed reference '{reference}': {details}")]
    MalformedReference { reference: String, details: String },

    /// Error when compiling or evaluating an expression
    #[error("Failed to evaluate expression '{expression}': {details}")]
    ExpressionError { expression: String, details: String },

    /// An identifier in a compiled expression that no reference was bound to
    #[error("Expression '{expression}' uses unbound identifier '{symbol}'")]
    UnboundSymbol { expression: String, symbol: String },

    /// Ran out of single-letter parameter symbols
    #[error("Expression '{expression}' has more than {limit} references")]
    TooManyReferences { expression: String, limit: usize },

    /// External references used outside bullets without a `targetType` opt-in
    #[error("Effect targeting '{target}' uses external references without opting in")]
    ExternalWithoutOptIn { target: String },

    /// `effectType` discriminator that is not sa / ot / area
    #[error("Unknown effect type '{effect_type}'")]
    UnknownEffectType { effect_type: String },

    /// Two catalog entries with the same id
    #[error("Duplicate id {id} in {table} table")]
    DuplicateItem { id: ItemId, table: String },

    /// A single bad line in a feature file
    #[error("Line {line}: {details}")]
    FeatureLine { line: usize, details: String },

    /// `money` and `keys` are seeded programmatically
    #[error("Feature '{kind}' is reserved and cannot be declared in a feature file")]
    ReservedFeature { kind: String },

    /// Typed read or write against a feature of another type
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: ValueKind, found: ValueKind },

    /// An effect produced a value the target feature cannot hold
    #[error("Invalid effect result: {details}")]
    InvalidResult { details: String },

    /// A different store is already attached under this id
    #[error("Store id {store_id} is already taken by a different store")]
    StoreCollision { store_id: StoreKindId },

    /// Drop pool not found
    #[error("Drop pool {pool_id} not found")]
    UnknownPool { pool_id: PoolId },

    /// Item not found
    #[error("Item {id} not found")]
    UnknownItem { id: ItemId },

    /// Not enough persisted currency for a purchase
    #[error("Not enough {currency}: need {needed}, have {available}")]
    InsufficientFunds {
        currency: String,
        needed: i32,
        available: i32,
    },

    /// Failed to read or write a config or settings file
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Malformed JSON document
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StatError {
    pub(crate) fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        StatError::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}

// Type alias for Result with StatError
pub type StatResult<T> = Result<T, StatError>;
