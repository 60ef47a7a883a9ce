//! Mapping of one annotation type within a meta-annotation chain
//!
//! Mappings of a chain live in one arena owned by
//! [`AnnotationTypeMappings`](crate::type_mappings::AnnotationTypeMappings).
//! Index 0 is the root; every other entry points at its source (the
//! mapping whose type declares it as a meta-annotation). Building an entry
//! updates the alias tables, mirror sets and claimed aliases of its
//! ancestors, so a chain is only complete once
//! [`AnnotationTypeMapping::after_all_mappings_set`] ran on every entry.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use strata_types::{AliasFor, Annotation, AnnotationType, TypeName, TypeRegistry, Value};

use crate::attribute_methods::{describe_attribute, AttributeMethods, AttributeRef};
use crate::error::{AnnotationError, AnnotationResult};
use crate::extractor::reflective_value;
use crate::mirror::{is_equivalent_to_default_value, MirrorSet, MirrorSets};
use crate::type_mappings::AnnotationTypeMappings;

pub(crate) const VALUE: &str = "value";

/// One annotation type reached from the root through meta-annotations
#[derive(Debug)]
pub struct AnnotationTypeMapping {
    source: Option<usize>,
    distance: usize,
    annotation_type: TypeName,
    meta_types: Vec<TypeName>,
    /// Meta-annotation instance as declared on the source type
    annotation: Option<Annotation>,
    attributes: Arc<AttributeMethods>,
    mirror_sets: MirrorSets,
    /// Root attribute index an attribute is aliased to
    alias_mappings: Vec<Option<usize>>,
    /// Same-named root attribute
    convention_mappings: Vec<Option<usize>>,
    /// Attribute index in `annotation_value_source` holding the value
    annotation_value_mappings: Vec<Option<usize>>,
    annotation_value_source: Vec<Option<usize>>,
    /// Alias target to the attributes of this type declaring it
    aliased_by: FxHashMap<AttributeRef, Vec<AttributeRef>>,
    synthesizable: bool,
    claimed_aliases: FxHashSet<AttributeRef>,
}

impl AnnotationTypeMapping {
    /// Arena index of the source mapping, `None` for the root
    pub fn source(&self) -> Option<usize> {
        self.source
    }

    /// Hops from the root
    pub fn distance(&self) -> usize {
        self.distance
    }

    /// Mapped annotation type
    pub fn annotation_type(&self) -> &TypeName {
        &self.annotation_type
    }

    /// Types from the root down to this one
    pub fn meta_types(&self) -> &[TypeName] {
        &self.meta_types
    }

    /// Meta-annotation instance (`None` for the root)
    pub fn annotation(&self) -> Option<&Annotation> {
        self.annotation.as_ref()
    }

    /// Attributes of the mapped type
    pub fn attributes(&self) -> &Arc<AttributeMethods> {
        &self.attributes
    }

    /// Mirror sets of the mapped type
    pub fn mirror_sets(&self) -> &MirrorSets {
        &self.mirror_sets
    }

    /// Root attribute an attribute is explicitly aliased to
    pub fn alias_mapping(&self, attribute_index: usize) -> Option<usize> {
        self.alias_mappings[attribute_index]
    }

    /// Same-named root attribute (never for `value`)
    pub fn convention_mapping(&self, attribute_index: usize) -> Option<usize> {
        self.convention_mappings[attribute_index]
    }

    /// Where a meta-level value is read from: (mapping, attribute index)
    pub fn annotation_value_mapping(&self, attribute_index: usize) -> Option<(usize, usize)> {
        Some((
            self.annotation_value_source[attribute_index]?,
            self.annotation_value_mappings[attribute_index]?,
        ))
    }

    /// Whether synthesis needs to build a new instance
    pub fn is_synthesizable(&self) -> bool {
        self.synthesizable
    }

    /// Whether a value equals the attribute's default (class/name aware)
    pub fn is_equivalent_to_default_value(&self, registry: &TypeRegistry, attribute_index: usize, value: &Value) -> bool {
        is_equivalent_to_default_value(registry, self.attributes.get(attribute_index), value)
    }

    /// Final validation once the whole chain exists
    pub(crate) fn after_all_mappings_set(&mut self, registry: &TypeRegistry) -> AnnotationResult<()> {
        self.validate_all_aliases_claimed(registry)?;
        for set in self.mirror_sets.iter() {
            validate_mirror_set(&self.attributes, set)?;
        }
        self.claimed_aliases.clear();
        Ok(())
    }

    fn validate_all_aliases_claimed(&self, registry: &TypeRegistry) -> AnnotationResult<()> {
        for (index, attribute) in self.attributes.iter().enumerate() {
            let Some(alias_for) = &attribute.alias_for else {
                continue;
            };
            if self.claimed_aliases.contains(&self.attributes.attribute_ref(index)) {
                continue;
            }
            let target = resolve_alias_target(registry, &self.attributes, index, alias_for, true)?;
            return Err(AnnotationError::configuration(format!(
                "@AliasFor declaration on {} declares an alias for {} which is not meta-present.",
                self.attributes.describe(index),
                describe_ref(registry, &target)
            )));
        }
        Ok(())
    }
}

/// Members must agree on their defaults; sets without any default pass
fn validate_mirror_set(attributes: &AttributeMethods, set: &MirrorSet) -> AnnotationResult<()> {
    let first_index = set.attribute_index(0);
    let first = attributes.get(first_index);
    for &mirror_index in &set.indexes()[1..] {
        let mirror = attributes.get(mirror_index);
        match (&first.default_value, &mirror.default_value) {
            (None, None) => {}
            (Some(first_default), Some(mirror_default)) => {
                if first_default != mirror_default {
                    return Err(AnnotationError::configuration(format!(
                        "Misconfigured aliases: {} and {} must declare the same default value.",
                        attributes.describe(first_index),
                        attributes.describe(mirror_index)
                    )));
                }
            }
            _ => {
                return Err(AnnotationError::configuration(format!(
                    "Misconfigured aliases: {} and {} must declare default values.",
                    attributes.describe(first_index),
                    attributes.describe(mirror_index)
                )));
            }
        }
    }
    Ok(())
}

/// Build a mapping for `annotation_type` and append it to the arena
pub(crate) fn add_mapping(
    registry: &TypeRegistry,
    arena: &mut Vec<AnnotationTypeMapping>,
    source: Option<usize>,
    annotation_type: &AnnotationType,
    annotation: Option<Annotation>,
    visited: &mut FxHashSet<TypeName>,
) -> AnnotationResult<()> {
    let attributes = AttributeMethods::for_type(registry, annotation_type);
    let count = attributes.len();
    let (distance, mut meta_types) = match source {
        Some(source) => (arena[source].distance + 1, arena[source].meta_types.clone()),
        None => (0, Vec::new()),
    };
    meta_types.push(annotation_type.name.clone());
    let aliased_by = resolve_aliased_for_targets(registry, &attributes)?;

    let index = arena.len();
    arena.push(AnnotationTypeMapping {
        source,
        distance,
        annotation_type: annotation_type.name.clone(),
        meta_types,
        annotation,
        attributes,
        mirror_sets: MirrorSets::new(count),
        alias_mappings: vec![None; count],
        convention_mappings: vec![None; count],
        annotation_value_mappings: vec![None; count],
        annotation_value_source: vec![None; count],
        aliased_by,
        synthesizable: false,
        claimed_aliases: FxHashSet::default(),
    });

    let built = process_aliases(registry, arena, index)
        .and_then(|()| {
            add_convention_mappings(arena, index);
            add_convention_annotation_values(arena, index);
            compute_synthesizable_flag(registry, &arena[index], visited)
        });
    match built {
        Ok(synthesizable) => {
            arena[index].synthesizable = synthesizable;
            Ok(())
        }
        Err(err) => {
            arena.truncate(index);
            Err(err)
        }
    }
}

fn resolve_aliased_for_targets(
    registry: &TypeRegistry,
    attributes: &AttributeMethods,
) -> AnnotationResult<FxHashMap<AttributeRef, Vec<AttributeRef>>> {
    let mut aliased_by: FxHashMap<AttributeRef, Vec<AttributeRef>> = FxHashMap::default();
    for (index, attribute) in attributes.iter().enumerate() {
        if let Some(alias_for) = &attribute.alias_for {
            let target = resolve_alias_target(registry, attributes, index, alias_for, true)?;
            aliased_by
                .entry(target)
                .or_default()
                .push(attributes.attribute_ref(index));
        }
    }
    Ok(aliased_by)
}

/// Validate an `@AliasFor` directive and find the attribute it targets
pub(crate) fn resolve_alias_target(
    registry: &TypeRegistry,
    attributes: &AttributeMethods,
    index: usize,
    alias_for: &AliasFor,
    check_alias_pair: bool,
) -> AnnotationResult<AttributeRef> {
    let attribute = attributes.get(index);
    let named_attribute = alias_for.attribute.as_deref().filter(|name| !name.is_empty());
    let named_value = alias_for.value.as_deref().filter(|name| !name.is_empty());
    if let (Some(named_attribute), Some(named_value)) = (named_attribute, named_value) {
        return Err(AnnotationError::configuration(format!(
            "In @AliasFor declared on {}, attribute 'attribute' and its alias 'value' are present with values of '{}' and '{}', but only one is permitted.",
            attributes.describe(index),
            named_attribute,
            named_value
        )));
    }

    let own_type = attributes.annotation_type();
    let target_type: &str = alias_for.annotation.as_deref().unwrap_or(own_type);
    let target_name: &str = named_attribute.or(named_value).unwrap_or(&attribute.name);

    let target_attributes = AttributeMethods::for_annotation_type(registry, target_type).ok();
    let target_index = target_attributes
        .as_ref()
        .and_then(|methods| methods.index_of(target_name));
    let (Some(target_attributes), Some(target_index)) = (target_attributes, target_index) else {
        if target_type == &**own_type {
            return Err(AnnotationError::configuration(format!(
                "@AliasFor declaration on {} declares an alias for '{}' which is not present.",
                attributes.describe(index),
                target_name
            )));
        }
        return Err(AnnotationError::configuration(format!(
            "{} is declared as an @AliasFor nonexistent {}.",
            capitalize(&attributes.describe(index)),
            describe_attribute(target_type, target_name)
        )));
    };

    let target = target_attributes.attribute_ref(target_index);
    if target == attributes.attribute_ref(index) {
        return Err(AnnotationError::configuration(format!(
            "@AliasFor declaration on {} points to itself. Specify 'annotation' to point to a same-named attribute on a meta-annotation.",
            attributes.describe(index)
        )));
    }

    let target_attribute = target_attributes.get(target_index);
    let compatible = attribute.value_type == target_attribute.value_type
        || target_attribute.value_type.component_type() == Some(&attribute.value_type);
    if !compatible {
        return Err(AnnotationError::configuration(format!(
            "Misconfigured aliases: {} and {} must declare the same return type.",
            attributes.describe(index),
            target_attributes.describe(target_index)
        )));
    }

    if check_alias_pair && target.annotation_type == *own_type {
        if let Some(target_alias_for) = &target_attribute.alias_for {
            let mirror = resolve_alias_target(registry, attributes, target_index, target_alias_for, false)?;
            if mirror != attributes.attribute_ref(index) {
                return Err(AnnotationError::configuration(format!(
                    "{} must be declared as an @AliasFor {}, not {}.",
                    capitalize(&attributes.describe(target_index)),
                    attributes.describe(index),
                    describe_ref(registry, &mirror)
                )));
            }
        }
    }
    Ok(target)
}

fn process_aliases(registry: &TypeRegistry, arena: &mut [AnnotationTypeMapping], this: usize) -> AnnotationResult<()> {
    let attributes = arena[this].attributes.clone();
    let mut aliases = Vec::new();
    for index in 0..attributes.len() {
        aliases.clear();
        aliases.push(attributes.attribute_ref(index));
        collect_aliases(arena, this, &mut aliases);
        if aliases.len() > 1 {
            process_alias_group(registry, arena, this, index, &aliases)?;
        }
    }
    Ok(())
}

/// Walk from `this` to the root adding every attribute aliasing a member
fn collect_aliases(arena: &[AnnotationTypeMapping], this: usize, aliases: &mut Vec<AttributeRef>) {
    let mut current = Some(this);
    while let Some(index) = current {
        let mapping = &arena[index];
        let size = aliases.len();
        for j in 0..size {
            if let Some(additional) = mapping.aliased_by.get(&aliases[j]) {
                aliases.extend(additional.iter().cloned());
            }
        }
        current = mapping.source;
    }
}

fn process_alias_group(
    registry: &TypeRegistry,
    arena: &mut [AnnotationTypeMapping],
    this: usize,
    attribute_index: usize,
    aliases: &[AttributeRef],
) -> AnnotationResult<()> {
    let root_attribute_index = first_root_attribute_index(&arena[0], aliases);
    let mut current = Some(this);
    while let Some(index) = current {
        let mut value_mapping = None;
        {
            let mapping = &mut arena[index];
            let attributes = mapping.attributes.clone();
            let members: Vec<usize> = (0..attributes.len())
                .filter(|&i| aliases.contains(&attributes.attribute_ref(i)))
                .collect();

            if let Some(root_index) = root_attribute_index {
                if index != 0 {
                    for &i in &members {
                        mapping.alias_mappings[i] = Some(root_index);
                    }
                }
            }
            mapping.mirror_sets.update_from(&attributes, aliases);
            mapping.claimed_aliases.extend(aliases.iter().cloned());
            if let Some(annotation) = &mapping.annotation {
                let resolved = mapping.mirror_sets.resolve(registry, &attributes, None, &|attribute| {
                    reflective_value(attribute, annotation)
                })?;
                if let Some(&last) = members.last() {
                    value_mapping = Some(resolved[last]);
                }
            }
            current = mapping.source;
        }
        if let Some(resolved) = value_mapping {
            arena[this].annotation_value_mappings[attribute_index] = Some(resolved);
            arena[this].annotation_value_source[attribute_index] = Some(index);
        }
    }
    Ok(())
}

fn first_root_attribute_index(root: &AnnotationTypeMapping, aliases: &[AttributeRef]) -> Option<usize> {
    (0..root.attributes.len()).find(|&i| aliases.contains(&root.attributes.attribute_ref(i)))
}

/// Same-named root attributes act as implicit aliases (never `value`)
fn add_convention_mappings(arena: &mut [AnnotationTypeMapping], this: usize) {
    if arena[this].distance == 0 {
        return;
    }
    let root_attributes = arena[0].attributes.clone();
    let mapping = &mut arena[this];
    let attributes = mapping.attributes.clone();
    for (index, attribute) in attributes.iter().enumerate() {
        if &*attribute.name == VALUE {
            continue;
        }
        let Some(mapped) = root_attributes.index_of(&attribute.name) else {
            continue;
        };
        mapping.convention_mappings[index] = Some(mapped);
        if let Some(mirrors) = mapping.mirror_sets.assigned(index) {
            for &mirror in mirrors.indexes() {
                mapping.convention_mappings[mirror] = Some(mapped);
            }
        }
    }
}

/// Same-named attributes of meta-annotations between this mapping and
/// the root supply meta-level values; nearer levels win except for `value`
fn add_convention_annotation_values(arena: &mut [AnnotationTypeMapping], this: usize) {
    let attributes = arena[this].attributes.clone();
    for (index, attribute) in attributes.iter().enumerate() {
        let is_value_attribute = &*attribute.name == VALUE;
        let mut current = Some(this);
        while let Some(level) = current {
            let (distance, mapped, source) = {
                let mapping = &arena[level];
                (mapping.distance, mapping.attributes.index_of(&attribute.name), mapping.source)
            };
            if distance == 0 {
                break;
            }
            if let Some(mapped) = mapped {
                if is_better_convention_annotation_value(arena, this, index, is_value_attribute, distance) {
                    arena[this].annotation_value_mappings[index] = Some(mapped);
                    arena[this].annotation_value_source[index] = Some(level);
                }
            }
            current = source;
        }
    }
}

fn is_better_convention_annotation_value(
    arena: &[AnnotationTypeMapping],
    this: usize,
    index: usize,
    is_value_attribute: bool,
    distance: usize,
) -> bool {
    let mapping = &arena[this];
    if mapping.annotation_value_mappings[index].is_none() {
        return true;
    }
    let Some(existing) = mapping.annotation_value_source[index] else {
        return true;
    };
    !is_value_attribute && arena[existing].distance > distance
}

fn compute_synthesizable_flag(
    registry: &TypeRegistry,
    mapping: &AnnotationTypeMapping,
    visited: &mut FxHashSet<TypeName>,
) -> AnnotationResult<bool> {
    visited.insert(mapping.annotation_type.clone());
    if mapping.alias_mappings.iter().any(Option::is_some)
        || !mapping.aliased_by.is_empty()
        || mapping.convention_mappings.iter().any(Option::is_some)
    {
        return Ok(true);
    }
    if mapping.attributes.has_nested_annotation() {
        for attribute in mapping.attributes.iter() {
            let Some(nested) = attribute.value_type.nested_annotation_type() else {
                continue;
            };
            if visited.contains(nested) || registry.annotation_type(nested).is_none() {
                continue;
            }
            let mappings = AnnotationTypeMappings::for_type_with_visited(registry, nested, visited)?;
            if mappings.root().is_synthesizable() {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

fn describe_ref(registry: &TypeRegistry, attribute: &AttributeRef) -> String {
    match AttributeMethods::for_annotation_type(registry, &attribute.annotation_type) {
        Ok(methods) => methods.describe(attribute.index),
        Err(_) => format!("attribute #{} in annotation [{}]", attribute.index, attribute.annotation_type),
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
