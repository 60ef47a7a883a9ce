//! Registry errors

use thiserror::Error;

/// Errors raised while building a [`crate::TypeRegistry`]
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A type with the same name was already registered
    #[error("Duplicate type declaration: {name}")]
    DuplicateType {
        /// Name of the type
        name: String,
    },

    /// A method reference points outside its declaring class
    #[error("Unknown method #{index} on class {class}")]
    UnknownMethod {
        /// Declaring class name
        class: String,
        /// Method index
        index: usize,
    },

    /// A registry descriptor could not be parsed
    #[error("Invalid registry descriptor: {0}")]
    Descriptor(#[from] serde_json::Error),
}
