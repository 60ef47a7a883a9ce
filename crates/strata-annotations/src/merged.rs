//! Merged annotation views
//!
//! A [`TypeMappedAnnotation`] binds one mapping of an
//! [`AnnotationTypeMappings`] chain to the root value source it was found
//! on. Queries follow explicit aliases and same-name conventions back to
//! the root, pick the representative member of mirror sets, and fall back
//! to meta-annotation values and declared defaults.
//!
//! [`MergedAnnotation`] is the public face: either a mapped view or a
//! missing annotation whose value accessors all fail.

use std::fmt;
use std::sync::{Arc, OnceLock};

use strata_types::{AnnotatedElement, Annotation, AttributeDef, TypeName, TypeRegistry, Value, ValueType};

use crate::attributes::{Adapt, AnnotationAttributes, AttributeValue};
use crate::error::{AnnotationError, AnnotationResult};
use crate::extractor::{reflective_value, AttributeMap, ValueExtractor, ValueSource};
use crate::failure::{log_failure, FailureLevel, IntrospectionFailure};
use crate::type_mapping::{AnnotationTypeMapping, VALUE};
use crate::type_mappings::AnnotationTypeMappings;

type AttributeFilter = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// One mapping of a chain bound to a concrete root value source
#[derive(Clone)]
pub struct TypeMappedAnnotation {
    registry: Arc<TypeRegistry>,
    mappings: Arc<AnnotationTypeMappings>,
    mapping: usize,
    source: Option<AnnotatedElement>,
    root: ValueSource,
    aggregate_index: usize,
    use_merged_values: bool,
    attribute_filter: Option<AttributeFilter>,
    resolved_root_mirrors: Arc<[usize]>,
    resolved_mirrors: Arc<[usize]>,
    synthesized: Arc<OnceLock<Annotation>>,
}

impl TypeMappedAnnotation {
    pub(crate) fn new(
        registry: &Arc<TypeRegistry>,
        mappings: Arc<AnnotationTypeMappings>,
        mapping: usize,
        source: Option<AnnotatedElement>,
        root: ValueSource,
        aggregate_index: usize,
    ) -> AnnotationResult<Self> {
        let root_mapping = mappings.root();
        let resolved_root_mirrors: Arc<[usize]> = root_mapping
            .mirror_sets()
            .resolve(registry, root_mapping.attributes(), source.as_ref(), &|attribute| {
                root.extract(attribute)
            })?
            .into();
        Self::with_root_mirrors(
            registry.clone(),
            mappings,
            mapping,
            source,
            root,
            aggregate_index,
            resolved_root_mirrors,
        )
    }

    fn with_root_mirrors(
        registry: Arc<TypeRegistry>,
        mappings: Arc<AnnotationTypeMappings>,
        mapping: usize,
        source: Option<AnnotatedElement>,
        root: ValueSource,
        aggregate_index: usize,
        resolved_root_mirrors: Arc<[usize]>,
    ) -> AnnotationResult<Self> {
        let mut annotation = Self {
            registry,
            mappings,
            mapping,
            source,
            root,
            aggregate_index,
            use_merged_values: true,
            attribute_filter: None,
            resolved_mirrors: resolved_root_mirrors.clone(),
            resolved_root_mirrors,
            synthesized: Arc::default(),
        };
        if annotation.distance() > 0 {
            let resolved = {
                let mapping = annotation.mapping();
                mapping.mirror_sets().resolve(
                    &annotation.registry,
                    mapping.attributes(),
                    annotation.source.as_ref(),
                    &|attribute| annotation.value_for_mirror_resolution(attribute),
                )?
            };
            annotation.resolved_mirrors = resolved.into();
        }
        Ok(annotation)
    }

    /// Build a view, logging and skipping non-configuration failures
    pub(crate) fn create_if_possible(
        registry: &Arc<TypeRegistry>,
        mappings: Arc<AnnotationTypeMappings>,
        mapping: usize,
        source: Option<AnnotatedElement>,
        annotation: &Annotation,
        aggregate_index: usize,
    ) -> AnnotationResult<Option<Self>> {
        let element = source
            .clone()
            .unwrap_or_else(|| AnnotatedElement::annotations([annotation.clone()]));
        let annotation_type = mappings.get(mapping).annotation_type().to_string();
        let root = ValueSource::Annotation(annotation.clone());
        match Self::new(registry, mappings, mapping, source, root, aggregate_index) {
            Ok(mapped) => Ok(Some(mapped)),
            Err(err) if err.is_configuration() => Err(err),
            Err(err) => {
                log_failure(
                    FailureLevel::Info,
                    &element,
                    &IntrospectionFailure::MetaAnnotation {
                        annotation_type,
                        cause: err.to_string(),
                    },
                );
                Ok(None)
            }
        }
    }

    /// Mapping this view reads through
    pub fn mapping(&self) -> &AnnotationTypeMapping {
        self.mappings.get(self.mapping)
    }

    /// Chain the mapping belongs to
    pub fn mappings(&self) -> &Arc<AnnotationTypeMappings> {
        &self.mappings
    }

    /// Annotation type of this view
    pub fn annotation_type(&self) -> &TypeName {
        self.mapping().annotation_type()
    }

    /// Hops from the directly declared annotation
    pub fn distance(&self) -> usize {
        self.mapping().distance()
    }

    /// Hierarchy level the root annotation was found on
    pub fn aggregate_index(&self) -> usize {
        self.aggregate_index
    }

    /// Element declaring the root annotation
    pub fn source(&self) -> Option<&AnnotatedElement> {
        self.source.as_ref()
    }

    /// Root value source
    pub fn root_source(&self) -> &ValueSource {
        &self.root
    }

    fn is_filtered(&self, name: &str) -> bool {
        self.attribute_filter.as_ref().is_some_and(|filter| !filter(name))
    }

    fn attribute_index(&self, name: &str) -> Option<usize> {
        if self.is_filtered(name) {
            return None;
        }
        self.mapping().attributes().index_of(name)
    }

    fn required_attribute_index(&self, name: &str) -> AnnotationResult<usize> {
        self.attribute_index(name).ok_or_else(|| AnnotationError::NoSuchAttribute {
            attribute: name.to_string(),
            annotation_type: self.annotation_type().to_string(),
        })
    }

    fn value_for_mirror_resolution(&self, attribute: &AttributeDef) -> Option<Value> {
        let index = self.mapping().attributes().index_of(&attribute.name)?;
        self.value_at(index, &*attribute.name != VALUE, true)
    }

    /// Raw value of an attribute with merging applied
    fn value_at(&self, attribute_index: usize, use_convention: bool, for_mirror_resolution: bool) -> Option<Value> {
        let mut mapping = self.mapping();
        let mut index = attribute_index;
        if self.use_merged_values {
            let mut mapped = mapping.alias_mapping(index);
            if mapped.is_none() && use_convention {
                mapped = mapping.convention_mapping(index);
            }
            if let Some(mapped) = mapped {
                mapping = self.mappings.root();
                index = mapped;
            }
        }
        if !for_mirror_resolution {
            index = if mapping.distance() != 0 {
                self.resolved_mirrors[index]
            } else {
                self.resolved_root_mirrors[index]
            };
        }
        if mapping.distance() == 0 {
            let attribute = mapping.attributes().get(index);
            return self
                .root
                .extract(attribute)
                .or_else(|| attribute.default_value.clone());
        }
        self.value_from_meta_annotation(index, for_mirror_resolution)
    }

    fn value_from_meta_annotation(&self, attribute_index: usize, for_mirror_resolution: bool) -> Option<Value> {
        let mut value = None;
        if self.use_merged_values || for_mirror_resolution {
            value = self
                .mappings
                .mapped_annotation_value(self.mapping, attribute_index, for_mirror_resolution);
        }
        value.or_else(|| {
            let mapping = self.mapping();
            let annotation = mapping.annotation()?;
            reflective_value(mapping.attributes().get(attribute_index), annotation)
        })
    }

    /// Merged value of a named attribute, adapted to `requested`
    ///
    /// `requested == None` keeps the attribute's own shape. With
    /// `required`, an unknown or filtered attribute is an error; otherwise
    /// it yields `Ok(None)`.
    pub(crate) fn value(
        &self,
        name: &str,
        requested: Option<&ValueType>,
        required: bool,
    ) -> AnnotationResult<Option<Value>> {
        let index = if required {
            self.required_attribute_index(name)?
        } else {
            match self.attribute_index(name) {
                Some(index) => index,
                None => return Ok(None),
            }
        };
        let attribute = self.mapping().attributes().get(index);
        let value = self
            .value_at(index, true, false)
            .or_else(|| attribute.default_value.clone());
        self.adapt(attribute, value, requested)
    }

    /// Like [`Self::value`] in the attribute's own shape, with nested
    /// annotations merged and synthesized
    pub(crate) fn merged_value(&self, name: &str) -> AnnotationResult<Option<Value>> {
        self.value(name, None, false)?
            .map(|value| self.synthesize_nested(value))
            .transpose()
    }

    pub(crate) fn default_value(&self, name: &str) -> AnnotationResult<Option<Value>> {
        let Some(index) = self.attribute_index(name) else {
            return Ok(None);
        };
        let attribute = self.mapping().attributes().get(index);
        self.adapt(attribute, attribute.default_value.clone(), None)
    }

    pub(crate) fn has_default_value(&self, name: &str) -> AnnotationResult<bool> {
        let index = self.required_attribute_index(name)?;
        Ok(match self.value_at(index, true, false) {
            None => true,
            Some(value) => self
                .mapping()
                .is_equivalent_to_default_value(&self.registry, index, &value),
        })
    }

    fn adapt(
        &self,
        attribute: &AttributeDef,
        value: Option<Value>,
        requested: Option<&ValueType>,
    ) -> AnnotationResult<Option<Value>> {
        let Some(value) = value else {
            return Ok(None);
        };
        let value = self.adapt_for_attribute(attribute, value)?;
        let Some(requested) = requested else {
            return Ok(Some(value));
        };

        let value = match value {
            Value::Array(mut items) if !requested.is_array() => match items.len() {
                0 => return Ok(None),
                1 => items.remove(0),
                len => {
                    return Err(AnnotationError::adaptation(format!(
                        "Unable to adapt array of length {} in attribute '{}' of annotation {} to {}",
                        len,
                        attribute.name,
                        self.annotation_type(),
                        requested
                    )))
                }
            },
            other => other,
        };
        let value = bridge_class_names(value, requested);
        if !requested.accepts(&value) {
            return Err(AnnotationError::adaptation(format!(
                "Unable to adapt value of type {} to {}",
                value.kind_name(),
                requested
            )));
        }
        Ok(Some(value))
    }

    fn adapt_for_attribute(&self, attribute: &AttributeDef, value: Value) -> AnnotationResult<Value> {
        let attribute_type = &attribute.value_type;
        if attribute_type.is_array() && !value.is_array() {
            return self.adapt_for_attribute(attribute, Value::Array(vec![value]));
        }
        if attribute_type.accepts(&value) || is_class_name_compatible(attribute_type, &value) {
            return Ok(value);
        }
        Err(AnnotationError::IllegalState {
            message: format!(
                "Attribute '{}' in annotation {} should be compatible with {} but a {} value was returned",
                attribute.name,
                self.annotation_type(),
                attribute_type,
                value.kind_name()
            ),
        })
    }

    /// View over a nested annotation value, sharing source and aggregate
    pub(crate) fn nested(&self, annotation: Annotation) -> AnnotationResult<Self> {
        let mappings = AnnotationTypeMappings::for_annotation_type(&self.registry, annotation.annotation_type())?;
        Self::new(
            &self.registry,
            mappings,
            0,
            self.source.clone(),
            ValueSource::Annotation(annotation),
            self.aggregate_index,
        )
    }

    pub(crate) fn filter_attributes(&self, predicate: AttributeFilter) -> Self {
        let filter = match &self.attribute_filter {
            Some(existing) => {
                let existing = existing.clone();
                Arc::new(move |name: &str| existing(name) && predicate(name)) as AttributeFilter
            }
            None => predicate,
        };
        Self {
            attribute_filter: Some(filter),
            synthesized: Arc::default(),
            ..self.clone()
        }
    }

    pub(crate) fn filter_default_values(&self) -> Self {
        let original = self.clone();
        self.filter_attributes(Arc::new(move |name: &str| {
            original.has_default_value(name).is_ok_and(|is_default| !is_default)
        }))
    }

    pub(crate) fn with_non_merged_attributes(&self) -> Self {
        Self {
            use_merged_values: false,
            synthesized: Arc::default(),
            ..self.clone()
        }
    }

    pub(crate) fn meta_source(&self) -> AnnotationResult<Option<Self>> {
        let Some(source) = self.mapping().source() else {
            return Ok(None);
        };
        Self::with_root_mirrors(
            self.registry.clone(),
            self.mappings.clone(),
            source,
            self.source.clone(),
            self.root.clone(),
            self.aggregate_index,
            self.resolved_root_mirrors.clone(),
        )
        .map(Some)
    }

    pub(crate) fn root(&self) -> Self {
        if self.distance() == 0 {
            return self.clone();
        }
        Self {
            registry: self.registry.clone(),
            mappings: self.mappings.clone(),
            mapping: 0,
            source: self.source.clone(),
            root: self.root.clone(),
            aggregate_index: self.aggregate_index,
            use_merged_values: true,
            attribute_filter: None,
            resolved_root_mirrors: self.resolved_root_mirrors.clone(),
            resolved_mirrors: self.resolved_root_mirrors.clone(),
            synthesized: Arc::default(),
        }
    }

    pub(crate) fn as_map(&self, adaptations: &[Adapt]) -> AnnotationResult<AnnotationAttributes> {
        let mut map = AnnotationAttributes::new(Some(self.annotation_type().clone()));
        let attributes = self.mapping().attributes().clone();
        for (index, attribute) in attributes.iter().enumerate() {
            if self.is_filtered(&attribute.name) {
                continue;
            }
            let requested = map_value_type(attribute, adaptations);
            let value = self
                .value_at(index, true, false)
                .or_else(|| attribute.default_value.clone());
            let Some(value) = self.adapt(attribute, value, requested.as_ref())? else {
                continue;
            };
            map.insert(&attribute.name, self.map_entry(attribute, value, adaptations)?);
        }
        Ok(map)
    }

    fn map_entry(&self, attribute: &AttributeDef, value: Value, adaptations: &[Adapt]) -> AnnotationResult<AttributeValue> {
        if !Adapt::is_set(adaptations, Adapt::AnnotationToMap) || attribute.value_type.nested_annotation_type().is_none() {
            return Ok(AttributeValue::Value(self.synthesize_nested(value)?));
        }
        match value {
            Value::Annotation(nested) => Ok(AttributeValue::Nested(self.nested(nested)?.as_map(adaptations)?)),
            Value::Array(items) => {
                let mut maps = Vec::with_capacity(items.len());
                for item in items {
                    if let Value::Annotation(nested) = item {
                        maps.push(self.nested(nested)?.as_map(adaptations)?);
                    }
                }
                Ok(AttributeValue::NestedArray(maps))
            }
            other => Ok(AttributeValue::Value(other)),
        }
    }

    pub(crate) fn synthesize(&self) -> AnnotationResult<Annotation> {
        if let Some(existing) = self.synthesized.get() {
            return Ok(existing.clone());
        }
        let created = self.create_synthesized()?;
        Ok(self.synthesized.get_or_init(|| created).clone())
    }

    fn create_synthesized(&self) -> AnnotationResult<Annotation> {
        if let Some(root) = self.root.as_annotation() {
            if self.is_target(root) && !self.is_synthesizable(root) {
                return Ok(root.clone());
            }
        }
        if let Some(meta) = self.mapping().annotation() {
            if self.is_target(meta) && !self.is_synthesizable(meta) {
                return Ok(meta.clone());
            }
        }

        let attributes = self.mapping().attributes().clone();
        let mut values = Vec::with_capacity(attributes.len());
        for attribute in attributes.iter() {
            if self.is_filtered(&attribute.name) {
                continue;
            }
            let value = self
                .value(&attribute.name, Some(&attribute.value_type), true)?
                .ok_or_else(|| {
                    AnnotationError::no_such_element(format!(
                        "No value found for attribute named '{}' in merged annotation {}",
                        attribute.name,
                        self.annotation_type()
                    ))
                })?;
            values.push((attribute.name.clone(), self.synthesize_nested(value)?));
        }
        tracing::trace!(annotation_type = %self.annotation_type(), "synthesized merged annotation");
        Ok(Annotation::synthesized(self.annotation_type().clone(), values))
    }

    fn synthesize_nested(&self, value: Value) -> AnnotationResult<Value> {
        match value {
            Value::Annotation(nested) => Ok(Value::Annotation(self.nested(nested)?.synthesize()?)),
            Value::Array(items) if items.iter().any(|item| item.as_annotation().is_some()) => items
                .into_iter()
                .map(|item| self.synthesize_nested(item))
                .collect::<AnnotationResult<Vec<_>>>()
                .map(Value::Array),
            other => Ok(other),
        }
    }

    fn is_target(&self, annotation: &Annotation) -> bool {
        annotation.annotation_type() == self.annotation_type()
    }

    fn is_synthesizable(&self, annotation: &Annotation) -> bool {
        if annotation.is_synthesized() {
            return false;
        }
        // meta levels may read values from nearer levels
        if self.distance() > 0 && !self.mapping().attributes().is_empty() {
            return true;
        }
        self.mapping().is_synthesizable()
    }
}

impl fmt::Debug for TypeMappedAnnotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeMappedAnnotation")
            .field("annotation_type", self.annotation_type())
            .field("distance", &self.distance())
            .field("aggregate_index", &self.aggregate_index)
            .field("source", &self.source)
            .field("use_merged_values", &self.use_merged_values)
            .field("filtered", &self.attribute_filter.is_some())
            .finish()
    }
}

fn is_class_name_compatible(attribute_type: &ValueType, value: &Value) -> bool {
    match (attribute_type, value) {
        (ValueType::Class, Value::String(_)) | (ValueType::String, Value::Class(_)) => true,
        (ValueType::Array(component), Value::Array(items)) => items
            .iter()
            .all(|item| component.accepts(item) || is_class_name_compatible(component, item)),
        _ => false,
    }
}

fn bridge_class_names(value: Value, requested: &ValueType) -> Value {
    match (value, requested) {
        (Value::Class(name), ValueType::String) => Value::String(name),
        (Value::String(name), ValueType::Class) => Value::Class(name),
        (Value::Array(items), ValueType::Array(component))
            if matches!(**component, ValueType::String | ValueType::Class) =>
        {
            Value::Array(items.into_iter().map(|item| bridge_class_names(item, component)).collect())
        }
        (value, _) => value,
    }
}

/// Requested shape for map projection; `None` keeps the attribute's own
fn map_value_type(attribute: &AttributeDef, adaptations: &[Adapt]) -> Option<ValueType> {
    if !Adapt::is_set(adaptations, Adapt::ClassToString) {
        return None;
    }
    match &attribute.value_type {
        ValueType::Class => Some(ValueType::String),
        ValueType::Array(component) if **component == ValueType::Class => {
            Some(ValueType::array_of(ValueType::String))
        }
        _ => None,
    }
}

/// A merged view of one annotation, or a missing annotation
#[derive(Debug, Clone)]
pub enum MergedAnnotation {
    /// An annotation found directly or through meta-annotations
    Mapped(TypeMappedAnnotation),
    /// No annotation of the requested type
    Missing,
}

macro_rules! typed_getters {
    ($($scalar:ident, $array:ident, $value_type:expr, $variant:ident, $out:ty, $name:literal;)*) => {
        $(
            #[doc = concat!("Required `", $name, "` attribute value")]
            pub fn $scalar(&self, name: &str) -> AnnotationResult<$out> {
                match self.required(name, &$value_type)? {
                    Value::$variant(value) => Ok(value),
                    other => Err(unexpected_value(name, &other)),
                }
            }

            #[doc = concat!("Required `", $name, "[]` attribute value")]
            pub fn $array(&self, name: &str) -> AnnotationResult<Vec<$out>> {
                match self.required(name, &ValueType::array_of($value_type))? {
                    Value::Array(items) => items
                        .into_iter()
                        .map(|item| match item {
                            Value::$variant(value) => Ok(value),
                            other => Err(unexpected_value(name, &other)),
                        })
                        .collect(),
                    other => Err(unexpected_value(name, &other)),
                }
            }
        )*
    };
}

impl MergedAnnotation {
    /// Merged view of an annotation declared on `source`
    pub fn from(
        registry: &Arc<TypeRegistry>,
        source: Option<AnnotatedElement>,
        annotation: Annotation,
    ) -> AnnotationResult<Self> {
        let mappings = AnnotationTypeMappings::for_annotation_type(registry, annotation.annotation_type())?;
        TypeMappedAnnotation::new(registry, mappings, 0, source, ValueSource::Annotation(annotation), 0)
            .map(MergedAnnotation::Mapped)
    }

    /// Merged view of an annotation without a declaring element
    pub fn of(registry: &Arc<TypeRegistry>, annotation: Annotation) -> AnnotationResult<Self> {
        Self::from(registry, None, annotation)
    }

    /// Merged view backed by explicit values; absent keys use defaults
    pub fn of_attributes(
        registry: &Arc<TypeRegistry>,
        annotation_type: &str,
        attributes: AttributeMap,
    ) -> AnnotationResult<Self> {
        let mappings = AnnotationTypeMappings::for_annotation_type(registry, annotation_type)?;
        TypeMappedAnnotation::new(registry, mappings, 0, None, ValueSource::Map(Arc::new(attributes)), 0)
            .map(MergedAnnotation::Mapped)
    }

    /// The missing annotation
    pub fn missing() -> Self {
        MergedAnnotation::Missing
    }

    fn mapped(&self) -> AnnotationResult<&TypeMappedAnnotation> {
        match self {
            MergedAnnotation::Mapped(mapped) => Ok(mapped),
            MergedAnnotation::Missing => Err(AnnotationError::no_such_element(
                "Unable to get attribute value for missing annotation",
            )),
        }
    }

    /// The mapped view, if present
    pub fn as_mapped(&self) -> Option<&TypeMappedAnnotation> {
        match self {
            MergedAnnotation::Mapped(mapped) => Some(mapped),
            MergedAnnotation::Missing => None,
        }
    }

    /// Whether an annotation was found
    pub fn is_present(&self) -> bool {
        matches!(self, MergedAnnotation::Mapped(_))
    }

    /// Present at distance 0
    pub fn is_directly_present(&self) -> bool {
        self.distance() == Some(0)
    }

    /// Present only as a meta-annotation
    pub fn is_meta_present(&self) -> bool {
        self.distance().is_some_and(|distance| distance > 0)
    }

    /// Hops from the directly declared annotation
    pub fn distance(&self) -> Option<usize> {
        self.as_mapped().map(TypeMappedAnnotation::distance)
    }

    /// Hierarchy level the root annotation was found on
    pub fn aggregate_index(&self) -> Option<usize> {
        self.as_mapped().map(TypeMappedAnnotation::aggregate_index)
    }

    /// Annotation type
    pub fn annotation_type(&self) -> Option<&TypeName> {
        self.as_mapped().map(TypeMappedAnnotation::annotation_type)
    }

    /// Element declaring the root annotation
    pub fn source(&self) -> Option<&AnnotatedElement> {
        self.as_mapped().and_then(TypeMappedAnnotation::source)
    }

    /// Types from the root annotation down to this one
    pub fn meta_types(&self) -> &[TypeName] {
        match self {
            MergedAnnotation::Mapped(mapped) => mapped.mapping().meta_types(),
            MergedAnnotation::Missing => &[],
        }
    }

    /// Annotation one level closer to the root (`None` at distance 0)
    pub fn meta_source(&self) -> AnnotationResult<Option<MergedAnnotation>> {
        match self {
            MergedAnnotation::Mapped(mapped) => Ok(mapped.meta_source()?.map(MergedAnnotation::Mapped)),
            MergedAnnotation::Missing => Ok(None),
        }
    }

    /// The directly declared annotation this view was reached from
    pub fn root(&self) -> MergedAnnotation {
        match self {
            MergedAnnotation::Mapped(mapped) => MergedAnnotation::Mapped(mapped.root()),
            MergedAnnotation::Missing => MergedAnnotation::Missing,
        }
    }

    /// Merged value in the attribute's own shape; `None` when the
    /// attribute is unknown or filtered
    pub fn get_value(&self, name: &str) -> AnnotationResult<Option<Value>> {
        self.mapped()?.merged_value(name)
    }

    /// Declared default of an attribute
    pub fn get_default_value(&self, name: &str) -> AnnotationResult<Option<Value>> {
        self.mapped()?.default_value(name)
    }

    /// Whether the merged value equals the declared default
    pub fn has_default_value(&self, name: &str) -> AnnotationResult<bool> {
        self.mapped()?.has_default_value(name)
    }

    /// Whether the merged value differs from the declared default
    pub fn has_non_default_value(&self, name: &str) -> AnnotationResult<bool> {
        Ok(!self.has_default_value(name)?)
    }

    fn required(&self, name: &str, requested: &ValueType) -> AnnotationResult<Value> {
        let mapped = self.mapped()?;
        mapped.value(name, Some(requested), true)?.ok_or_else(|| {
            AnnotationError::no_such_element(format!(
                "No value found for attribute named '{}' in merged annotation {}",
                name,
                mapped.annotation_type()
            ))
        })
    }

    typed_getters! {
        get_boolean, get_boolean_array, ValueType::Boolean, Boolean, bool, "boolean";
        get_byte, get_byte_array, ValueType::Byte, Byte, i8, "byte";
        get_char, get_char_array, ValueType::Char, Char, char, "char";
        get_short, get_short_array, ValueType::Short, Short, i16, "short";
        get_int, get_int_array, ValueType::Int, Int, i32, "int";
        get_long, get_long_array, ValueType::Long, Long, i64, "long";
        get_float, get_float_array, ValueType::Float, Float, f32, "float";
        get_double, get_double_array, ValueType::Double, Double, f64, "double";
        get_string, get_string_array, ValueType::String, String, Arc<str>, "String";
        get_class, get_class_array, ValueType::Class, Class, TypeName, "Class";
    }

    /// Required enum constant of the given enum type
    pub fn get_enum(&self, name: &str, enum_type: &str) -> AnnotationResult<Arc<str>> {
        match self.required(name, &ValueType::Enum(Arc::from(enum_type)))? {
            Value::Enum { constant, .. } => Ok(constant),
            other => Err(unexpected_value(name, &other)),
        }
    }

    /// Required enum constants of the given enum type
    pub fn get_enum_array(&self, name: &str, enum_type: &str) -> AnnotationResult<Vec<Arc<str>>> {
        let requested = ValueType::array_of(ValueType::Enum(Arc::from(enum_type)));
        match self.required(name, &requested)? {
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::Enum { constant, .. } => Ok(constant),
                    other => Err(unexpected_value(name, &other)),
                })
                .collect(),
            other => Err(unexpected_value(name, &other)),
        }
    }

    /// Nested annotation attribute as a merged view
    pub fn get_annotation(&self, name: &str, annotation_type: &str) -> AnnotationResult<MergedAnnotation> {
        let mapped = self.mapped()?;
        match self.required(name, &ValueType::Annotation(Arc::from(annotation_type)))? {
            Value::Annotation(nested) => Ok(MergedAnnotation::Mapped(mapped.nested(nested)?)),
            other => Err(unexpected_value(name, &other)),
        }
    }

    /// Nested annotation array attribute as merged views
    pub fn get_annotation_array(&self, name: &str, annotation_type: &str) -> AnnotationResult<Vec<MergedAnnotation>> {
        let mapped = self.mapped()?;
        let requested = ValueType::array_of(ValueType::Annotation(Arc::from(annotation_type)));
        match self.required(name, &requested)? {
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::Annotation(nested) => Ok(MergedAnnotation::Mapped(mapped.nested(nested)?)),
                    other => Err(unexpected_value(name, &other)),
                })
                .collect(),
            other => Err(unexpected_value(name, &other)),
        }
    }

    /// View hiding attributes whose merged value is the default
    pub fn filter_default_values(&self) -> MergedAnnotation {
        match self {
            MergedAnnotation::Mapped(mapped) => MergedAnnotation::Mapped(mapped.filter_default_values()),
            MergedAnnotation::Missing => MergedAnnotation::Missing,
        }
    }

    /// View exposing only attributes accepted by `predicate`
    pub fn filter_attributes(&self, predicate: impl Fn(&str) -> bool + Send + Sync + 'static) -> MergedAnnotation {
        match self {
            MergedAnnotation::Mapped(mapped) => MergedAnnotation::Mapped(mapped.filter_attributes(Arc::new(predicate))),
            MergedAnnotation::Missing => MergedAnnotation::Missing,
        }
    }

    /// View reading meta-annotation values as declared, without merging
    pub fn with_non_merged_attributes(&self) -> MergedAnnotation {
        match self {
            MergedAnnotation::Mapped(mapped) => MergedAnnotation::Mapped(mapped.with_non_merged_attributes()),
            MergedAnnotation::Missing => MergedAnnotation::Missing,
        }
    }

    /// Attribute values keyed by name
    pub fn as_map(&self, adaptations: &[Adapt]) -> AnnotationResult<AnnotationAttributes> {
        match self {
            MergedAnnotation::Mapped(mapped) => mapped.as_map(adaptations),
            MergedAnnotation::Missing => Ok(AnnotationAttributes::default()),
        }
    }

    /// Annotation instance carrying the merged values
    pub fn synthesize(&self) -> AnnotationResult<Annotation> {
        match self {
            MergedAnnotation::Mapped(mapped) => mapped.synthesize(),
            MergedAnnotation::Missing => Err(AnnotationError::no_such_element(
                "Unable to synthesize missing annotation",
            )),
        }
    }

    /// Synthesize only when `condition` accepts this view
    pub fn synthesize_if(&self, condition: impl FnOnce(&MergedAnnotation) -> bool) -> AnnotationResult<Option<Annotation>> {
        if condition(self) {
            self.synthesize().map(Some)
        } else {
            Ok(None)
        }
    }
}

fn unexpected_value(name: &str, value: &Value) -> AnnotationError {
    AnnotationError::adaptation(format!(
        "Unexpected value of type {} for attribute '{}'",
        value.kind_name(),
        name
    ))
}
