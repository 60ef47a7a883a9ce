//! Annotation engine errors

use strata_types::RegistryError;
use thiserror::Error;

/// Result alias for engine operations
pub type AnnotationResult<T> = Result<T, AnnotationError>;

/// Errors raised while resolving or reading merged annotations
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AnnotationError {
    /// Malformed `@AliasFor`, mirror or repeatable-container declarations
    #[error("{message}")]
    Configuration {
        /// Diagnostic naming the attributes and types involved
        message: String,
    },

    /// An attribute value references a type that cannot be loaded
    #[error("{message}")]
    IllegalState {
        /// Diagnostic naming the attribute and its annotation
        message: String,
    },

    /// The requested attribute is not declared (or is filtered out)
    #[error("No attribute named '{attribute}' present in merged annotation {annotation_type}")]
    NoSuchAttribute {
        /// Attribute name
        attribute: String,
        /// Annotation type name
        annotation_type: String,
    },

    /// The merged annotation is missing, or a required value is absent
    #[error("{message}")]
    NoSuchElement {
        /// Diagnostic
        message: String,
    },

    /// A value cannot be adapted to the requested shape
    #[error("{message}")]
    Adaptation {
        /// Diagnostic
        message: String,
    },

    /// A referenced annotation type is not registered
    #[error("Unknown annotation type: {name}")]
    UnknownType {
        /// Type name
        name: String,
    },

    /// Registry lookup failure
    #[error("Registry error: {message}")]
    Registry {
        /// Diagnostic
        message: String,
    },
}

impl AnnotationError {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        AnnotationError::Configuration {
            message: message.into(),
        }
    }

    pub(crate) fn adaptation(message: impl Into<String>) -> Self {
        AnnotationError::Adaptation {
            message: message.into(),
        }
    }

    pub(crate) fn no_such_element(message: impl Into<String>) -> Self {
        AnnotationError::NoSuchElement {
            message: message.into(),
        }
    }

    /// Whether this is a configuration error
    pub fn is_configuration(&self) -> bool {
        matches!(self, AnnotationError::Configuration { .. })
    }
}

impl From<RegistryError> for AnnotationError {
    fn from(err: RegistryError) -> Self {
        AnnotationError::Registry {
            message: err.to_string(),
        }
    }
}
