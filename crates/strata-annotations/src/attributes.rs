//! Map projection of merged annotations

use std::collections::BTreeMap;

use strata_types::{TypeName, Value};

/// Adjustments applied when projecting a merged annotation to a map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Adapt {
    /// Render class values (and class arrays) as class-name strings
    ClassToString,
    /// Render nested annotations as nested attribute maps instead of
    /// synthesized instances
    AnnotationToMap,
}

impl Adapt {
    pub(crate) fn is_set(adaptations: &[Adapt], adapt: Adapt) -> bool {
        adaptations.contains(&adapt)
    }
}

/// One entry of an [`AnnotationAttributes`] map
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// Plain value (nested annotations appear synthesized)
    Value(Value),
    /// Nested annotation projected with [`Adapt::AnnotationToMap`]
    Nested(AnnotationAttributes),
    /// Nested annotation array projected with [`Adapt::AnnotationToMap`]
    NestedArray(Vec<AnnotationAttributes>),
}

impl AttributeValue {
    /// The plain value, if this entry is one
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            AttributeValue::Value(value) => Some(value),
            _ => None,
        }
    }

    /// The nested map, if this entry is one
    pub fn as_nested(&self) -> Option<&AnnotationAttributes> {
        match self {
            AttributeValue::Nested(nested) => Some(nested),
            _ => None,
        }
    }

    /// The nested maps, if this entry is an array of them
    pub fn as_nested_array(&self) -> Option<&[AnnotationAttributes]> {
        match self {
            AttributeValue::NestedArray(nested) => Some(nested),
            _ => None,
        }
    }
}

/// Attribute values of a merged annotation keyed by attribute name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationAttributes {
    annotation_type: Option<TypeName>,
    values: BTreeMap<String, AttributeValue>,
}

impl AnnotationAttributes {
    /// Empty map for the given type (`None` for a missing annotation)
    pub fn new(annotation_type: Option<TypeName>) -> Self {
        Self {
            annotation_type,
            values: BTreeMap::new(),
        }
    }

    /// Annotation type the values belong to
    pub fn annotation_type(&self) -> Option<&TypeName> {
        self.annotation_type.as_ref()
    }

    pub(crate) fn insert(&mut self, name: &str, value: AttributeValue) {
        self.values.insert(name.to_string(), value);
    }

    /// Entry for an attribute
    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.values.get(name)
    }

    /// Plain value for an attribute
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.get(name).and_then(AttributeValue::as_value)
    }

    /// Whether the attribute has an entry
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether there are no entries
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Entries ordered by attribute name
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }
}
