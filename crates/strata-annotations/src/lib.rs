//! Strata Merged Annotations
//!
//! Resolves annotations declared on classes and methods, and on the
//! annotations themselves, into merged views where attribute aliases,
//! mirrored attributes and the `value` naming convention are applied.
//!
//! The main entry points are [`MergedAnnotations`] for searching an
//! element's hierarchy and [`MergedAnnotation`] for reading one merged
//! result. [`AnnotationTypeMappings`] exposes the precomputed mapping
//! chain of an annotation type.
//!
//! All derived metadata is memoized per registry; see [`clear_cache`].

#![warn(missing_docs)]

pub mod attribute_methods;
pub mod attributes;
pub mod cache;
pub mod error;
pub mod extractor;
pub mod failure;
pub mod filter;
pub mod merged;
pub mod merged_annotations;
pub mod mirror;
pub mod repeatable;
pub mod scanner;
pub mod selector;
pub mod type_mapping;
pub mod type_mappings;

pub use attribute_methods::{AttributeMethods, AttributeRef};
pub use attributes::{Adapt, AnnotationAttributes, AttributeValue};
pub use cache::clear_cache;
pub use error::{AnnotationError, AnnotationResult};
pub use extractor::{AttributeMap, ValueExtractor, ValueSource};
pub use failure::IntrospectionFailure;
pub use filter::AnnotationFilter;
pub use merged::{MergedAnnotation, TypeMappedAnnotation};
pub use merged_annotations::{MergedAnnotationIter, MergedAnnotationPredicate, MergedAnnotations, Search};
pub use mirror::{MirrorSet, MirrorSets};
pub use repeatable::RepeatableContainers;
pub use scanner::{get_declared_annotations, scan, AnnotationsProcessor, SearchStrategy};
pub use selector::MergedAnnotationSelector;
pub use type_mapping::AnnotationTypeMapping;
pub use type_mappings::AnnotationTypeMappings;
