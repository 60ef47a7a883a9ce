//! Value extraction from annotation value sources

use std::sync::Arc;

use rustc_hash::FxHashMap;
use strata_types::{Annotation, AttributeDef, Value};

/// Explicit attribute values keyed by name
pub type AttributeMap = FxHashMap<Arc<str>, Value>;

/// Reads raw attribute values out of a concrete value source
///
/// Returning `None` means "no value here"; callers decide whether the
/// declared default applies.
pub trait ValueExtractor {
    /// Extract the value of one attribute
    fn extract(&self, attribute: &AttributeDef) -> Option<Value>;
}

/// Reflective read: the explicit value, else the declared default
pub fn reflective_value(attribute: &AttributeDef, annotation: &Annotation) -> Option<Value> {
    annotation
        .get(&attribute.name)
        .cloned()
        .or_else(|| attribute.default_value.clone())
}

impl ValueExtractor for Annotation {
    fn extract(&self, attribute: &AttributeDef) -> Option<Value> {
        reflective_value(attribute, self)
    }
}

impl ValueExtractor for AttributeMap {
    fn extract(&self, attribute: &AttributeDef) -> Option<Value> {
        self.get(&attribute.name).cloned()
    }
}

/// Root value source of a merged annotation
#[derive(Debug, Clone)]
pub enum ValueSource {
    /// An annotation instance
    Annotation(Annotation),
    /// A plain map of explicit values
    Map(Arc<AttributeMap>),
}

impl ValueSource {
    /// The annotation instance, if this source is one
    pub fn as_annotation(&self) -> Option<&Annotation> {
        match self {
            ValueSource::Annotation(annotation) => Some(annotation),
            ValueSource::Map(_) => None,
        }
    }
}

impl ValueExtractor for ValueSource {
    fn extract(&self, attribute: &AttributeDef) -> Option<Value> {
        match self {
            ValueSource::Annotation(annotation) => annotation.extract(attribute),
            ValueSource::Map(map) => map.extract(attribute),
        }
    }
}
