//! Recoverable introspection failures
//!
//! A hierarchy level that cannot be introspected (for example a superclass
//! that is not registered) is logged and skipped; scanning carries on with
//! the remaining levels.

use std::fmt;
#[cfg(test)]
use std::cell::Cell;

use strata_types::AnnotatedElement;

/// Why a level of a hierarchy could not be introspected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntrospectionFailure {
    /// A referenced class is not registered
    ClassNotPresent {
        /// Missing class name
        name: String,
    },
    /// A method reference does not resolve
    MethodNotPresent {
        /// Description of the reference
        method: String,
    },
    /// A meta-annotation could not be turned into a merged annotation
    MetaAnnotation {
        /// Annotation type name
        annotation_type: String,
        /// Underlying cause
        cause: String,
    },
}

impl fmt::Display for IntrospectionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntrospectionFailure::ClassNotPresent { name } => {
                write!(f, "type [{}] not present", name)
            }
            IntrospectionFailure::MethodNotPresent { method } => {
                write!(f, "method [{}] not present", method)
            }
            IntrospectionFailure::MetaAnnotation {
                annotation_type,
                cause,
            } => write!(f, "failed to introspect meta-annotation {}: {}", annotation_type, cause),
        }
    }
}

/// Severity used when reporting a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FailureLevel {
    /// Expected on partial classpaths, e.g. while scanning hierarchies
    Debug,
    /// Unexpected while building merged annotations
    Info,
}

#[cfg(test)]
thread_local! {
    /// Failures handled on this thread, observed by tests
    pub(crate) static HANDLED_FAILURES: Cell<usize> = const { Cell::new(0) };
}

/// Log an introspection failure for an element
pub(crate) fn handle_introspection_failure(element: &AnnotatedElement, failure: &IntrospectionFailure) {
    #[cfg(test)]
    HANDLED_FAILURES.with(|count| count.set(count.get() + 1));
    log_failure(FailureLevel::Debug, element, failure);
}

pub(crate) fn log_failure(level: FailureLevel, element: &AnnotatedElement, failure: &IntrospectionFailure) {
    match level {
        FailureLevel::Debug => {
            tracing::debug!(%element, %failure, "failed to introspect annotations");
        }
        FailureLevel::Info => {
            tracing::info!(%element, %failure, "failed to introspect annotations");
        }
    }
}
