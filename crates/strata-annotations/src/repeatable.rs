//! Repeatable annotation containers
//!
//! Decides whether an annotation is a container holding repeated
//! annotations, and unwraps it. Explicit (repeatable, container) pairs are
//! consulted most recent first, then the standard `@Repeatable` metadata.

use std::sync::Arc;

use strata_types::{Annotation, TypeName, TypeRegistry, Value, ValueType};

use crate::attribute_methods::AttributeMethods;
use crate::error::{AnnotationError, AnnotationResult};
use crate::extractor::reflective_value;

const VALUE: &str = "value";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ExplicitContainer {
    repeatable: TypeName,
    container: TypeName,
}

/// Strategy for finding repeated annotations inside containers
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepeatableContainers {
    /// Most recently registered first
    explicit: Vec<ExplicitContainer>,
    standard: bool,
}

impl RepeatableContainers {
    /// Never treat an annotation as a container
    pub fn none() -> Self {
        Self {
            explicit: Vec::new(),
            standard: false,
        }
    }

    /// Use the `repeatable` declarations of annotation types
    pub fn standard_repeatables() -> Self {
        Self {
            explicit: Vec::new(),
            standard: true,
        }
    }

    /// Only the given pair; `container` is deduced when `None`
    pub fn of(registry: &TypeRegistry, repeatable: &str, container: Option<&str>) -> AnnotationResult<Self> {
        let pair = explicit_container(registry, repeatable, container)?;
        Ok(Self {
            explicit: vec![pair],
            standard: false,
        })
    }

    /// Add a pair that takes precedence over the existing ones
    pub fn and(mut self, registry: &TypeRegistry, container: &str, repeatable: &str) -> AnnotationResult<Self> {
        let pair = explicit_container(registry, repeatable, Some(container))?;
        self.explicit.insert(0, pair);
        Ok(self)
    }

    /// Repeated annotations held by a container, or `None` if it is not one
    pub fn find_repeated_annotations(&self, registry: &TypeRegistry, annotation: &Annotation) -> Option<Vec<Annotation>> {
        let annotation_type = annotation.annotation_type();
        if let Some(pair) = self.explicit.iter().find(|p| &p.container == annotation_type) {
            return read_repeated(registry, annotation, &pair.container);
        }
        if self.standard && is_standard_container(registry, annotation_type) {
            return read_repeated(registry, annotation, annotation_type);
        }
        None
    }
}

impl Default for RepeatableContainers {
    fn default() -> Self {
        Self::standard_repeatables()
    }
}

fn explicit_container(registry: &TypeRegistry, repeatable: &str, container: Option<&str>) -> AnnotationResult<ExplicitContainer> {
    let container: TypeName = match container {
        Some(container) => Arc::from(container),
        None => registry
            .annotation_type(repeatable)
            .and_then(|t| t.repeatable.clone())
            .ok_or_else(|| {
                AnnotationError::configuration(format!(
                    "Annotation type must be a repeatable annotation: failed to resolve container type for {}",
                    repeatable
                ))
            })?,
    };

    let methods = AttributeMethods::for_annotation_type(registry, &container).map_err(|_| {
        AnnotationError::configuration(format!(
            "Invalid declaration of container type [{}] for repeatable annotation [{}]",
            container, repeatable
        ))
    })?;
    let value_method = methods.get_by_name(VALUE).ok_or_else(|| {
        AnnotationError::configuration(format!(
            "Invalid declaration of container type [{}] for repeatable annotation [{}]: no 'value' attribute found",
            container, repeatable
        ))
    })?;
    let expected = ValueType::array_of(ValueType::Annotation(Arc::from(repeatable)));
    if value_method.value_type != expected {
        return Err(AnnotationError::configuration(format!(
            "Container type [{}] must declare a 'value' attribute for an array of type [{}]",
            container, repeatable
        )));
    }

    Ok(ExplicitContainer {
        repeatable: Arc::from(repeatable),
        container,
    })
}

/// A container's `value` is an array of a type declaring it as container
fn is_standard_container(registry: &TypeRegistry, annotation_type: &str) -> bool {
    let Ok(methods) = AttributeMethods::for_annotation_type(registry, annotation_type) else {
        return false;
    };
    let Some(ValueType::Array(component)) = methods.get_by_name(VALUE).map(|m| &m.value_type) else {
        return false;
    };
    let ValueType::Annotation(repeated) = &**component else {
        return false;
    };
    registry
        .annotation_type(repeated)
        .and_then(|t| t.repeatable.as_deref())
        .is_some_and(|container| container == annotation_type)
}

fn read_repeated(registry: &TypeRegistry, annotation: &Annotation, container: &str) -> Option<Vec<Annotation>> {
    let methods = AttributeMethods::for_annotation_type(registry, container).ok()?;
    let value = reflective_value(methods.get_by_name(VALUE)?, annotation)?;
    match value {
        Value::Array(items) => Some(
            items
                .into_iter()
                .filter_map(|item| match item {
                    Value::Annotation(repeated) => Some(repeated),
                    _ => None,
                })
                .collect(),
        ),
        _ => None,
    }
}
