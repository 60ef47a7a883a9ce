//! Strata Type Model
//!
//! Declarations and values consumed by the merged annotation engine:
//! annotation types with their attributes and meta-annotations, annotation
//! instances, classes and methods carrying annotations, and the
//! [`TypeRegistry`] that resolves them by name.

#![warn(missing_docs)]

pub mod annotation;
pub mod class;
pub mod error;
pub mod registry;
pub mod value;

pub use annotation::{AliasFor, Annotation, AnnotationType, AttributeDef};
pub use class::{AnnotatedElement, ClassType, MethodDecl, MethodRef, TypeRef, OBJECT};
pub use error::RegistryError;
pub use registry::{EnumType, RegistryId, TypeRegistry};
pub use value::{java_string_hash, TypeName, Value, ValueType};
