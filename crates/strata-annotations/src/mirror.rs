//! Mirror sets: attributes of one annotation type that alias each other
//!
//! Members of a mirror set must hold equal values. Resolution picks the
//! member whose value represents the whole set.

use strata_types::{AnnotatedElement, Annotation, AttributeDef, TypeRegistry, Value};

use crate::attribute_methods::{AttributeMethods, AttributeRef};
use crate::error::{AnnotationError, AnnotationResult};
use crate::extractor::reflective_value;

/// One group of mirrored attributes, as sorted attribute indices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorSet {
    indexes: Vec<usize>,
}

impl MirrorSet {
    /// Number of members
    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    /// Whether the set has no members
    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    /// Attribute index of the n-th member
    pub fn attribute_index(&self, n: usize) -> usize {
        self.indexes[n]
    }

    /// Member attribute indices in ascending order
    pub fn indexes(&self) -> &[usize] {
        &self.indexes
    }

    /// Index of the member whose value represents the set
    ///
    /// All-default sets resolve to the first member. Otherwise the first
    /// member with a non-default value wins, and a later member with a
    /// different non-default value is a configuration error.
    pub fn resolve(
        &self,
        registry: &TypeRegistry,
        attributes: &AttributeMethods,
        source: Option<&AnnotatedElement>,
        extract: &dyn Fn(&AttributeDef) -> Option<Value>,
    ) -> AnnotationResult<usize> {
        let mut result: Option<usize> = None;
        let mut last_value: Option<Value> = None;

        for &index in &self.indexes {
            let attribute = attributes.get(index);
            let value = extract(attribute);
            let is_default = match &value {
                None => true,
                Some(value) => is_equivalent_to_default_value(registry, attribute, value),
            };
            if is_default || (value.is_some() && value == last_value) {
                result.get_or_insert(index);
                continue;
            }
            if let (Some(last), Some(value)) = (&last_value, &value) {
                let on = source.map(|s| format!(" declared on {}", s)).unwrap_or_default();
                let first = result.map(|i| attributes.get(i).name.clone()).unwrap_or_default();
                return Err(AnnotationError::configuration(format!(
                    "Different @AliasFor mirror values for annotation [{}]{}; attribute '{}' and its alias '{}' are declared with values of [{}] and [{}].",
                    attributes.annotation_type(),
                    on,
                    first,
                    attribute.name,
                    last,
                    value
                )));
            }
            result = Some(index);
            last_value = value;
        }
        result.ok_or_else(|| AnnotationError::configuration("Empty mirror set"))
    }
}

/// Mirror sets of one mapping, with the set assigned to each attribute
#[derive(Debug, Clone)]
pub struct MirrorSets {
    /// Position in `sets` for each attribute
    assigned: Vec<Option<usize>>,
    /// Unique sets in first-assigned order
    sets: Vec<MirrorSet>,
}

impl MirrorSets {
    pub(crate) fn new(attribute_count: usize) -> Self {
        Self {
            assigned: vec![None; attribute_count],
            sets: Vec::new(),
        }
    }

    /// Number of mirror sets
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    /// Whether there are no mirror sets
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Mirror set by position
    pub fn get(&self, index: usize) -> &MirrorSet {
        &self.sets[index]
    }

    /// Mirror set containing an attribute
    pub fn assigned(&self, attribute_index: usize) -> Option<&MirrorSet> {
        self.assigned[attribute_index].map(|position| &self.sets[position])
    }

    /// Iterate the sets
    pub fn iter(&self) -> impl Iterator<Item = &MirrorSet> {
        self.sets.iter()
    }

    /// Group every attribute of this type that appears in `aliases`
    pub(crate) fn update_from(&mut self, attributes: &AttributeMethods, aliases: &[AttributeRef]) {
        let members: Vec<usize> = (0..attributes.len())
            .filter(|&i| aliases.contains(&attributes.attribute_ref(i)))
            .collect();
        if members.len() < 2 {
            return;
        }
        let fresh = self.sets.len();
        for &member in &members {
            self.assigned[member] = Some(fresh);
        }
        self.rebuild();
    }

    fn rebuild(&mut self) {
        let mut order: Vec<usize> = Vec::new();
        for id in self.assigned.iter().flatten() {
            if !order.contains(id) {
                order.push(*id);
            }
        }
        self.sets = order
            .iter()
            .map(|id| MirrorSet {
                indexes: (0..self.assigned.len())
                    .filter(|&i| self.assigned[i] == Some(*id))
                    .collect(),
            })
            .collect();
        for slot in self.assigned.iter_mut() {
            if let Some(id) = *slot {
                *slot = order.iter().position(|o| *o == id);
            }
        }
    }

    /// Representative attribute index for every attribute
    pub fn resolve(
        &self,
        registry: &TypeRegistry,
        attributes: &AttributeMethods,
        source: Option<&AnnotatedElement>,
        extract: &dyn Fn(&AttributeDef) -> Option<Value>,
    ) -> AnnotationResult<Vec<usize>> {
        let mut result: Vec<usize> = (0..attributes.len()).collect();
        for set in &self.sets {
            let resolved = set.resolve(registry, attributes, source, extract)?;
            for &index in &set.indexes {
                result[index] = resolved;
            }
        }
        Ok(result)
    }
}

/// Whether a value is equivalent to the attribute's declared default
pub fn is_equivalent_to_default_value(registry: &TypeRegistry, attribute: &AttributeDef, value: &Value) -> bool {
    match &attribute.default_value {
        Some(default) => are_equivalent(registry, default, value),
        None => false,
    }
}

/// Equality that treats class values and class-name strings alike and
/// compares nested annotations attribute by attribute
pub(crate) fn are_equivalent(registry: &TypeRegistry, value: &Value, extracted: &Value) -> bool {
    if value == extracted {
        return true;
    }
    match (value, extracted) {
        (Value::Class(class), Value::String(name)) => class == name,
        (Value::Array(left), Value::Array(right)) => {
            left.len() == right.len()
                && left
                    .iter()
                    .zip(right)
                    .all(|(l, r)| are_equivalent(registry, l, r))
        }
        (Value::Annotation(annotation), Value::Annotation(other)) => {
            annotations_equivalent(registry, annotation, other)
        }
        _ => false,
    }
}

fn annotations_equivalent(registry: &TypeRegistry, annotation: &Annotation, other: &Annotation) -> bool {
    if annotation.annotation_type() != other.annotation_type() {
        return false;
    }
    let Ok(attributes) = AttributeMethods::for_annotation_type(registry, annotation.annotation_type()) else {
        return false;
    };
    let equivalent = attributes.iter().all(|attribute| {
        match (reflective_value(attribute, annotation), reflective_value(attribute, other)) {
            (Some(left), Some(right)) => are_equivalent(registry, &left, &right),
            (None, None) => true,
            _ => false,
        }
    });
    equivalent
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_types::{AnnotationType, ValueType};

    fn registry() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        registry
            .register_annotation_type(
                AnnotationType::new("demo.Route")
                    .attribute(AttributeDef::new("name", ValueType::String).with_default(""))
                    .attribute(AttributeDef::new("path", ValueType::String).with_default(""))
                    .attribute(AttributeDef::new("value", ValueType::String).with_default(""))
                    .attribute(AttributeDef::new("target", ValueType::Class).with_default(Value::class("java.lang.Object"))),
            )
            .unwrap();
        registry
            .register_annotation_type(
                AnnotationType::new("demo.Inner")
                    .attribute(AttributeDef::new("level", ValueType::Int).with_default(1)),
            )
            .unwrap();
        registry
    }

    fn all_mirrored(attributes: &AttributeMethods) -> MirrorSets {
        let mut sets = MirrorSets::new(attributes.len());
        let aliases: Vec<AttributeRef> = ["name", "path", "value"]
            .iter()
            .map(|n| attributes.attribute_ref(attributes.index_of(n).unwrap()))
            .collect();
        sets.update_from(attributes, &aliases);
        sets
    }

    fn resolve(registry: &TypeRegistry, annotation: &Annotation) -> AnnotationResult<Vec<usize>> {
        let attributes = AttributeMethods::for_annotation_type(registry, "demo.Route").unwrap();
        let sets = all_mirrored(&attributes);
        sets.resolve(registry, &attributes, None, &|attribute| reflective_value(attribute, annotation))
    }

    #[test]
    fn test_update_from_groups_members() {
        let registry = registry();
        let attributes = AttributeMethods::for_annotation_type(&registry, "demo.Route").unwrap();
        let sets = all_mirrored(&attributes);
        assert_eq!(sets.len(), 1);
        assert_eq!(sets.get(0).indexes(), &[0, 1, 3]);
        assert!(sets.assigned(2).is_none());
        assert_eq!(sets.assigned(3), Some(sets.get(0)));
    }

    #[test]
    fn test_all_default_resolves_to_first() {
        let registry = registry();
        let resolved = resolve(&registry, &Annotation::of("demo.Route")).unwrap();
        assert_eq!(resolved, vec![0, 0, 2, 0]);
    }

    #[test]
    fn test_first_non_default_wins() {
        let registry = registry();
        let resolved = resolve(&registry, &Annotation::of("demo.Route").with("path", "/a")).unwrap();
        assert_eq!(resolved[0], 1);
        assert_eq!(resolved[3], 1);

        let same = Annotation::of("demo.Route").with("path", "/a").with("value", "/a");
        assert_eq!(resolve(&registry, &same).unwrap()[0], 1);
    }

    #[test]
    fn test_conflict_names_both_attributes_and_values() {
        let registry = registry();
        let annotation = Annotation::of("demo.Route").with("name", "/a").with("value", "/b");
        let err = resolve(&registry, &annotation).unwrap_err();
        let message = err.to_string();
        assert!(err.is_configuration());
        assert!(message.contains("attribute 'name' and its alias 'value'"));
        assert!(message.contains("[\"/a\"] and [\"/b\"]"));
        assert!(message.contains("[demo.Route]"));
    }

    #[test]
    fn test_class_and_class_name_are_equivalent() {
        let registry = registry();
        let attributes = AttributeMethods::for_annotation_type(&registry, "demo.Route").unwrap();
        let target = attributes.get_by_name("target").unwrap();
        assert!(is_equivalent_to_default_value(&registry, target, &Value::string("java.lang.Object")));
        assert!(!is_equivalent_to_default_value(&registry, target, &Value::class("java.lang.String")));
    }

    #[test]
    fn test_nested_annotation_defaults_are_equivalent() {
        let registry = registry();
        let explicit = Value::Annotation(Annotation::of("demo.Inner").with("level", 1));
        let implicit = Value::Annotation(Annotation::of("demo.Inner"));
        assert!(are_equivalent(&registry, &implicit, &explicit));
        let other = Value::Annotation(Annotation::of("demo.Inner").with("level", 2));
        assert!(!are_equivalent(&registry, &implicit, &other));
        assert!(are_equivalent(
            &registry,
            &Value::array([implicit.clone()]),
            &Value::array([explicit])
        ));
    }

    #[test]
    fn test_attribute_without_default_is_never_default() {
        let registry = registry();
        let attribute = AttributeDef::new("x", ValueType::String);
        assert!(!is_equivalent_to_default_value(&registry, &attribute, &Value::string("")));
    }
}
