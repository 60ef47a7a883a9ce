//! Attribute methods of an annotation type
//!
//! The ordered attribute list is the basis of every index table in the
//! engine, so attributes are always sorted by name.

use std::sync::{Arc, LazyLock};

use strata_types::{Annotation, AnnotationType, AttributeDef, RegistryId, TypeName, TypeRegistry, Value};

use crate::cache::ConcurrentCache;
use crate::error::{AnnotationError, AnnotationResult};
use crate::extractor::reflective_value;

/// Members every annotation has that are not attributes
const RESERVED_MEMBERS: &[&str] = &["equals", "hashCode", "toString", "annotationType"];

static ATTRIBUTE_METHODS_CACHE: LazyLock<ConcurrentCache<(RegistryId, TypeName), Arc<AttributeMethods>>> =
    LazyLock::new(ConcurrentCache::new);

/// Identity of one attribute: declaring type plus sorted index
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributeRef {
    /// Declaring annotation type
    pub annotation_type: TypeName,
    /// Index in the declaring type's [`AttributeMethods`]
    pub index: usize,
}

/// Sorted attributes of one annotation type
#[derive(Debug)]
pub struct AttributeMethods {
    annotation_type: TypeName,
    attributes: Vec<AttributeDef>,
    can_throw_type_not_present: Vec<bool>,
    has_default_value_method: bool,
    has_nested_annotation: bool,
}

impl AttributeMethods {
    /// Attribute methods for a registered annotation type, memoized
    pub fn for_type(registry: &TypeRegistry, annotation_type: &AnnotationType) -> Arc<AttributeMethods> {
        ATTRIBUTE_METHODS_CACHE.get_or_compute((registry.id(), annotation_type.name.clone()), || {
            tracing::trace!(annotation_type = %annotation_type.name, "computing attribute methods");
            Arc::new(Self::compute(annotation_type))
        })
    }

    /// Attribute methods for an annotation type looked up by name
    pub fn for_annotation_type(registry: &TypeRegistry, name: &str) -> AnnotationResult<Arc<AttributeMethods>> {
        let annotation_type = registry
            .annotation_type(name)
            .ok_or_else(|| AnnotationError::UnknownType {
                name: name.to_string(),
            })?;
        Ok(Self::for_type(registry, annotation_type))
    }

    fn compute(annotation_type: &AnnotationType) -> Self {
        let mut attributes: Vec<AttributeDef> = annotation_type
            .attributes
            .iter()
            .filter(|a| !RESERVED_MEMBERS.contains(&&*a.name))
            .cloned()
            .collect();
        attributes.sort_by(|a, b| a.name.cmp(&b.name));

        let can_throw_type_not_present = attributes
            .iter()
            .map(|a| a.value_type.may_reference_unloadable_type())
            .collect();
        let has_default_value_method = attributes.iter().any(|a| a.default_value.is_some());
        let has_nested_annotation = attributes
            .iter()
            .any(|a| a.value_type.nested_annotation_type().is_some());

        Self {
            annotation_type: annotation_type.name.clone(),
            attributes,
            can_throw_type_not_present,
            has_default_value_method,
            has_nested_annotation,
        }
    }

    /// Declaring annotation type
    pub fn annotation_type(&self) -> &TypeName {
        &self.annotation_type
    }

    /// Number of attributes
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Whether the type declares no attributes
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Attribute at a sorted index
    pub fn get(&self, index: usize) -> &AttributeDef {
        &self.attributes[index]
    }

    /// Attribute by name
    pub fn get_by_name(&self, name: &str) -> Option<&AttributeDef> {
        self.index_of(name).map(|i| &self.attributes[i])
    }

    /// Iterate attributes in sorted order
    pub fn iter(&self) -> impl Iterator<Item = &AttributeDef> {
        self.attributes.iter()
    }

    /// Sorted index of a named attribute
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.attributes
            .binary_search_by(|a| (*a.name).cmp(name))
            .ok()
    }

    /// Index of an attribute reference, if it belongs to this type
    pub fn index_of_attribute(&self, attribute: &AttributeRef) -> Option<usize> {
        (attribute.annotation_type == self.annotation_type && attribute.index < self.len())
            .then_some(attribute.index)
    }

    /// Reference to the attribute at an index
    pub fn attribute_ref(&self, index: usize) -> AttributeRef {
        AttributeRef {
            annotation_type: self.annotation_type.clone(),
            index,
        }
    }

    /// Whether reading the attribute may hit an unloadable type
    pub fn can_throw_type_not_present(&self, index: usize) -> bool {
        self.can_throw_type_not_present[index]
    }

    /// Whether any attribute declares a default
    pub fn has_default_value_method(&self) -> bool {
        self.has_default_value_method
    }

    /// Whether any attribute is an annotation or annotation array
    pub fn has_nested_annotation(&self) -> bool {
        self.has_nested_annotation
    }

    /// Check that every attribute of the instance can be read
    pub fn is_valid(&self, registry: &TypeRegistry, annotation: &Annotation) -> bool {
        self.first_unreadable(registry, annotation).is_none()
    }

    /// Like [`Self::is_valid`], but report the first unreadable attribute
    pub fn validate(&self, registry: &TypeRegistry, annotation: &Annotation) -> AnnotationResult<()> {
        match self.first_unreadable(registry, annotation) {
            None => Ok(()),
            Some((index, missing)) => Err(AnnotationError::IllegalState {
                message: format!(
                    "Could not obtain annotation attribute value for {} declared on @{}: type [{}] not present",
                    self.attributes[index].name, annotation.annotation_type(), missing
                ),
            }),
        }
    }

    fn first_unreadable(&self, registry: &TypeRegistry, annotation: &Annotation) -> Option<(usize, String)> {
        (0..self.len())
            .filter(|&i| self.can_throw_type_not_present[i])
            .find_map(|i| {
                let value = reflective_value(&self.attributes[i], annotation)?;
                unloadable_reference(registry, &value).map(|missing| (i, missing))
            })
    }

    /// Human readable description of an attribute
    pub fn describe(&self, index: usize) -> String {
        describe_attribute(&self.annotation_type, &self.attributes[index].name)
    }
}

/// `attribute 'name' in annotation [Type]`
pub fn describe_attribute(annotation_type: &str, attribute: &str) -> String {
    format!("attribute '{}' in annotation [{}]", attribute, annotation_type)
}

/// First class or enum reference in the value that does not resolve
pub(crate) fn unloadable_reference(registry: &TypeRegistry, value: &Value) -> Option<String> {
    match value {
        Value::Class(name) if !registry.is_loadable(name) => Some(name.to_string()),
        Value::Enum { enum_type, constant } if !registry.is_enum_constant(enum_type, constant) => {
            Some(format!("{}.{}", enum_type, constant))
        }
        Value::Array(items) => items.iter().find_map(|item| unloadable_reference(registry, item)),
        _ => None,
    }
}

pub(crate) fn clear_cache() {
    ATTRIBUTE_METHODS_CACHE.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_types::{EnumType, ValueType};

    fn registry() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        registry
            .register_enum(EnumType::new("demo.Mode", &["FAST", "SAFE"]))
            .unwrap();
        registry
            .register_annotation_type(
                AnnotationType::new("demo.Config")
                    .attribute(AttributeDef::new("value", ValueType::String).with_default(""))
                    .attribute(AttributeDef::new("target", ValueType::Class))
                    .attribute(
                        AttributeDef::new("mode", ValueType::Enum("demo.Mode".into()))
                            .with_default(Value::enum_constant("demo.Mode", "FAST")),
                    )
                    .attribute(AttributeDef::new("hashCode", ValueType::Int))
                    .attribute(AttributeDef::new("nested", ValueType::Annotation("demo.Inner".into()))),
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_sorted_and_reserved_excluded() {
        let registry = registry();
        let methods = AttributeMethods::for_annotation_type(&registry, "demo.Config").unwrap();
        let names: Vec<&str> = methods.iter().map(|a| &*a.name).collect();
        assert_eq!(names, vec!["mode", "nested", "target", "value"]);
        assert_eq!(methods.index_of("value"), Some(3));
        assert_eq!(methods.index_of("hashCode"), None);
    }

    #[test]
    fn test_flags() {
        let registry = registry();
        let methods = AttributeMethods::for_annotation_type(&registry, "demo.Config").unwrap();
        assert!(methods.has_default_value_method());
        assert!(methods.has_nested_annotation());
        assert!(methods.can_throw_type_not_present(methods.index_of("target").unwrap()));
        assert!(methods.can_throw_type_not_present(methods.index_of("mode").unwrap()));
        assert!(!methods.can_throw_type_not_present(methods.index_of("value").unwrap()));
    }

    #[test]
    fn test_memoized() {
        let registry = registry();
        let a = AttributeMethods::for_annotation_type(&registry, "demo.Config").unwrap();
        let b = AttributeMethods::for_annotation_type(&registry, "demo.Config").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_unknown_type() {
        let registry = registry();
        let err = AttributeMethods::for_annotation_type(&registry, "demo.Missing").unwrap_err();
        assert!(matches!(err, AnnotationError::UnknownType { .. }));
    }

    #[test]
    fn test_validate_unloadable_class() {
        let registry = registry();
        let methods = AttributeMethods::for_annotation_type(&registry, "demo.Config").unwrap();

        let good = Annotation::of("demo.Config").with("target", Value::class("java.lang.String"));
        assert!(methods.is_valid(&registry, &good));
        assert!(methods.validate(&registry, &good).is_ok());

        let bad = Annotation::of("demo.Config").with("target", Value::class("demo.NotLoaded"));
        assert!(!methods.is_valid(&registry, &bad));
        let err = methods.validate(&registry, &bad).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("target"));
        assert!(message.contains("demo.Config"));
        assert!(message.contains("demo.NotLoaded"));
    }

    #[test]
    fn test_validate_unknown_enum_constant() {
        let registry = registry();
        let methods = AttributeMethods::for_annotation_type(&registry, "demo.Config").unwrap();
        let bad = Annotation::of("demo.Config").with("mode", Value::enum_constant("demo.Mode", "SLOW"));
        assert!(!methods.is_valid(&registry, &bad));
    }

    #[test]
    fn test_describe() {
        let registry = registry();
        let methods = AttributeMethods::for_annotation_type(&registry, "demo.Config").unwrap();
        assert_eq!(
            methods.describe(methods.index_of("value").unwrap()),
            "attribute 'value' in annotation [demo.Config]"
        );
    }
}
