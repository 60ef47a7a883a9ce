//! Annotation types and annotation instances

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::value::{java_string_hash, TypeName, Value, ValueType};

/// `@AliasFor` directive attached to an attribute declaration
///
/// `attribute` and `value` are two spellings of the target attribute name;
/// declaring both is a configuration error reported by the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AliasFor {
    /// Target annotation type (`None` means the declaring type)
    #[serde(default)]
    pub annotation: Option<TypeName>,
    /// Target attribute name
    #[serde(default)]
    pub attribute: Option<Arc<str>>,
    /// Target attribute name, short form
    #[serde(default)]
    pub value: Option<Arc<str>>,
}

impl AliasFor {
    /// Alias for a sibling attribute on the same annotation type
    pub fn attribute(name: &str) -> Self {
        Self {
            attribute: Some(Arc::from(name)),
            ..Self::default()
        }
    }

    /// Alias for an attribute of a meta-annotation
    pub fn meta(annotation: &str, attribute: &str) -> Self {
        Self {
            annotation: Some(Arc::from(annotation)),
            attribute: Some(Arc::from(attribute)),
            value: None,
        }
    }

    /// Alias for the same-named attribute of a meta-annotation
    pub fn meta_same_name(annotation: &str) -> Self {
        Self {
            annotation: Some(Arc::from(annotation)),
            ..Self::default()
        }
    }
}

/// Declaration of a single annotation attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDef {
    /// Attribute name
    pub name: Arc<str>,
    /// Declared return type
    pub value_type: ValueType,
    /// Declared default value
    #[serde(default)]
    pub default_value: Option<Value>,
    /// `@AliasFor` directive, if any
    #[serde(default)]
    pub alias_for: Option<AliasFor>,
}

impl AttributeDef {
    /// Declare an attribute without a default
    pub fn new(name: &str, value_type: ValueType) -> Self {
        Self {
            name: Arc::from(name),
            value_type,
            default_value: None,
            alias_for: None,
        }
    }

    /// Set the default value
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Attach an `@AliasFor` directive
    pub fn alias_for(mut self, alias: AliasFor) -> Self {
        self.alias_for = Some(alias);
        self
    }
}

/// Declaration of an annotation type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotationType {
    /// Fully qualified name
    pub name: TypeName,
    /// Attributes in declaration order
    #[serde(default)]
    pub attributes: Vec<AttributeDef>,
    /// Meta-annotations declared on the type
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    /// Whether the type is `@Inherited`
    #[serde(default)]
    pub inherited: bool,
    /// Container type when the type is `@Repeatable`
    #[serde(default)]
    pub repeatable: Option<TypeName>,
}

impl AnnotationType {
    /// Start a new annotation type declaration
    pub fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            attributes: Vec::new(),
            annotations: Vec::new(),
            inherited: false,
            repeatable: None,
        }
    }

    /// Add an attribute
    pub fn attribute(mut self, attribute: AttributeDef) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Add a meta-annotation
    pub fn annotated_with(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    /// Mark the type `@Inherited`
    pub fn inherited(mut self) -> Self {
        self.inherited = true;
        self
    }

    /// Mark the type `@Repeatable` with the given container
    pub fn repeatable_in(mut self, container: &str) -> Self {
        self.repeatable = Some(Arc::from(container));
        self
    }
}

#[derive(Debug, Clone)]
struct AnnotationData {
    annotation_type: TypeName,
    /// Sorted by attribute name
    values: Vec<(Arc<str>, Value)>,
    synthesized: bool,
}

/// An annotation instance
///
/// Holds the explicitly supplied attribute values. Reading an attribute that
/// was not supplied falls back to the declared default, which lives on the
/// [`AnnotationType`]. Synthesized instances carry every attribute.
///
/// Equality and [`Annotation::hash_code`] cover the values the instance
/// holds. Defaults are not filled in without a registry, so `@T` and
/// `@T(v = <default>)` differ as raw instances; compare synthesized
/// instances to get the full annotation contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "AnnotationRepr", into = "AnnotationRepr")]
pub struct Annotation {
    inner: Arc<AnnotationData>,
}

impl Annotation {
    /// Create an instance of the given type with no explicit values
    pub fn of(annotation_type: &str) -> Self {
        Self::from_parts(Arc::from(annotation_type), Vec::new(), false)
    }

    /// Create a synthesized instance carrying every attribute value
    pub fn synthesized(
        annotation_type: TypeName,
        values: impl IntoIterator<Item = (Arc<str>, Value)>,
    ) -> Self {
        Self::from_parts(annotation_type, values.into_iter().collect(), true)
    }

    fn from_parts(annotation_type: TypeName, mut values: Vec<(Arc<str>, Value)>, synthesized: bool) -> Self {
        values.sort_by(|a, b| a.0.cmp(&b.0));
        values.dedup_by(|later, earlier| later.0 == earlier.0);
        Self {
            inner: Arc::new(AnnotationData {
                annotation_type,
                values,
                synthesized,
            }),
        }
    }

    /// Return a copy with an explicit attribute value set
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        let data = Arc::make_mut(&mut self.inner);
        match data.values.binary_search_by(|(n, _)| (**n).cmp(name)) {
            Ok(index) => data.values[index].1 = value,
            Err(index) => data.values.insert(index, (Arc::from(name), value)),
        }
        self
    }

    /// Annotation type name
    pub fn annotation_type(&self) -> &TypeName {
        &self.inner.annotation_type
    }

    /// Explicit value of an attribute
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.inner
            .values
            .binary_search_by(|(n, _)| (**n).cmp(name))
            .ok()
            .map(|index| &self.inner.values[index].1)
    }

    /// Explicit values, ordered by attribute name
    pub fn values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.inner.values.iter().map(|(n, v)| (&**n, v))
    }

    /// Whether the instance was produced by synthesis
    pub fn is_synthesized(&self) -> bool {
        self.inner.synthesized
    }

    /// Identity comparison
    pub fn ptr_eq(a: &Annotation, b: &Annotation) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    /// Annotation hash code: `Σ (127 * name.hashCode()) ^ value.hashCode()`
    /// over the values held
    pub fn hash_code(&self) -> i32 {
        self.inner.values.iter().fold(0i32, |acc, (name, value)| {
            let member = 127i32.wrapping_mul(java_string_hash(name)) ^ value.java_hash_code();
            acc.wrapping_add(member)
        })
    }
}

impl PartialEq for Annotation {
    fn eq(&self, other: &Self) -> bool {
        Annotation::ptr_eq(self, other)
            || (self.inner.annotation_type == other.inner.annotation_type
                && self.inner.values == other.inner.values)
    }
}

impl Eq for Annotation {}

impl Hash for Annotation {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hash_code().hash(state);
    }
}

impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}(", self.inner.annotation_type)?;
        for (i, (name, value)) in self.inner.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", name, value)?;
        }
        write!(f, ")")
    }
}

#[derive(Serialize, Deserialize)]
struct AnnotationRepr {
    #[serde(rename = "type")]
    annotation_type: TypeName,
    #[serde(default)]
    values: BTreeMap<Arc<str>, Value>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    synthesized: bool,
}

impl From<AnnotationRepr> for Annotation {
    fn from(repr: AnnotationRepr) -> Self {
        Annotation::from_parts(repr.annotation_type, repr.values.into_iter().collect(), repr.synthesized)
    }
}

impl From<Annotation> for AnnotationRepr {
    fn from(annotation: Annotation) -> Self {
        AnnotationRepr {
            annotation_type: annotation.inner.annotation_type.clone(),
            values: annotation.inner.values.iter().cloned().collect(),
            synthesized: annotation.inner.synthesized,
        }
    }
}
