//! Meta-annotation chains
//!
//! [`AnnotationTypeMappings`] holds the mapping of a root annotation type
//! followed by every meta-annotation reachable from it, in breadth-first
//! order. Chains are cached per registry, filter and container strategy.

use std::sync::{Arc, LazyLock};

use rustc_hash::FxHashSet;
use strata_types::{AnnotatedElement, Annotation, RegistryId, TypeName, TypeRegistry, Value};

use crate::cache::ConcurrentCache;
use crate::error::{AnnotationError, AnnotationResult};
use crate::extractor::reflective_value;
use crate::failure::{log_failure, FailureLevel, IntrospectionFailure};
use crate::filter::AnnotationFilter;
use crate::repeatable::RepeatableContainers;
use crate::scanner::meta_annotations;
use crate::type_mapping::{add_mapping, AnnotationTypeMapping};

type MappingsKey = (RegistryId, RepeatableContainers, AnnotationFilter, TypeName);

static MAPPINGS_CACHE: LazyLock<ConcurrentCache<MappingsKey, Arc<AnnotationTypeMappings>>> =
    LazyLock::new(ConcurrentCache::new);

/// Mapping chain of one root annotation type
#[derive(Debug)]
pub struct AnnotationTypeMappings {
    filter: AnnotationFilter,
    repeatable_containers: RepeatableContainers,
    mappings: Vec<AnnotationTypeMapping>,
}

impl AnnotationTypeMappings {
    /// Chain using standard repeatables and the plain filter
    pub fn for_annotation_type(registry: &TypeRegistry, annotation_type: &str) -> AnnotationResult<Arc<Self>> {
        Self::for_annotation_type_with(
            registry,
            annotation_type,
            &RepeatableContainers::standard_repeatables(),
            &AnnotationFilter::Plain,
        )
    }

    /// Cached chain for the given container strategy and filter
    pub fn for_annotation_type_with(
        registry: &TypeRegistry,
        annotation_type: &str,
        repeatable_containers: &RepeatableContainers,
        filter: &AnnotationFilter,
    ) -> AnnotationResult<Arc<Self>> {
        let key = (
            registry.id(),
            repeatable_containers.clone(),
            filter.clone(),
            TypeName::from(annotation_type),
        );
        MAPPINGS_CACHE.try_get_or_compute(key, || {
            tracing::trace!(%annotation_type, "computing annotation type mappings");
            let mut visited = FxHashSet::default();
            Self::build(registry, annotation_type, repeatable_containers, filter, &mut visited).map(Arc::new)
        })
    }

    /// Uncached chain sharing a visited set with an enclosing computation
    pub(crate) fn for_type_with_visited(
        registry: &TypeRegistry,
        annotation_type: &str,
        visited: &mut FxHashSet<TypeName>,
    ) -> AnnotationResult<Self> {
        Self::build(
            registry,
            annotation_type,
            &RepeatableContainers::standard_repeatables(),
            &AnnotationFilter::Plain,
            visited,
        )
    }

    fn build(
        registry: &TypeRegistry,
        annotation_type: &str,
        repeatable_containers: &RepeatableContainers,
        filter: &AnnotationFilter,
        visited: &mut FxHashSet<TypeName>,
    ) -> AnnotationResult<Self> {
        let root_type = registry
            .annotation_type(annotation_type)
            .ok_or_else(|| AnnotationError::UnknownType {
                name: annotation_type.to_string(),
            })?;

        let mut builder = Self {
            filter: filter.clone(),
            repeatable_containers: repeatable_containers.clone(),
            mappings: Vec::new(),
        };
        add_mapping(registry, &mut builder.mappings, None, root_type, None, visited)?;

        // The arena doubles as the breadth-first queue.
        let mut next = 0;
        while next < builder.mappings.len() {
            builder.add_meta_annotations(registry, next, visited)?;
            next += 1;
        }

        for mapping in builder.mappings.iter_mut() {
            mapping.after_all_mappings_set(registry)?;
        }
        Ok(builder)
    }

    fn add_meta_annotations(
        &mut self,
        registry: &TypeRegistry,
        source: usize,
        visited: &mut FxHashSet<TypeName>,
    ) -> AnnotationResult<()> {
        let source_type = self.mappings[source].annotation_type().clone();
        let Some(declaration) = registry.annotation_type(&source_type) else {
            return Ok(());
        };
        let declared = meta_annotations(registry, declaration);

        for meta_annotation in declared.iter() {
            if !self.is_mappable(source, meta_annotation) {
                continue;
            }
            match self.repeatable_containers.find_repeated_annotations(registry, meta_annotation) {
                Some(repeated) => {
                    for annotation in repeated {
                        if self.is_mappable(source, &annotation) {
                            self.add_if_possible(registry, source, annotation, visited)?;
                        }
                    }
                }
                None => self.add_if_possible(registry, source, meta_annotation.clone(), visited)?,
            }
        }
        Ok(())
    }

    fn add_if_possible(
        &mut self,
        registry: &TypeRegistry,
        source: usize,
        annotation: Annotation,
        visited: &mut FxHashSet<TypeName>,
    ) -> AnnotationResult<()> {
        let annotation_type = annotation.annotation_type().clone();
        let Some(declaration) = registry.annotation_type(&annotation_type) else {
            return Ok(());
        };
        match add_mapping(registry, &mut self.mappings, Some(source), declaration, Some(annotation), visited) {
            Ok(()) => Ok(()),
            Err(err) if err.is_configuration() => Err(err),
            Err(err) => {
                let source_type = self.mappings[source].annotation_type().clone();
                log_failure(
                    FailureLevel::Info,
                    &AnnotatedElement::Class(source_type),
                    &IntrospectionFailure::MetaAnnotation {
                        annotation_type: annotation_type.to_string(),
                        cause: err.to_string(),
                    },
                );
                Ok(())
            }
        }
    }

    fn is_mappable(&self, source: usize, meta_annotation: &Annotation) -> bool {
        !self.filter.matches_annotation(meta_annotation)
            && !AnnotationFilter::Plain.matches(self.mappings[source].annotation_type())
            && !self.is_already_mapped(source, meta_annotation)
    }

    fn is_already_mapped(&self, source: usize, meta_annotation: &Annotation) -> bool {
        let annotation_type = meta_annotation.annotation_type();
        let mut current = Some(source);
        while let Some(index) = current {
            let mapping = &self.mappings[index];
            if mapping.annotation_type() == annotation_type {
                return true;
            }
            current = mapping.source();
        }
        false
    }

    /// Number of mappings in the chain
    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    /// Always false; a chain holds at least its root
    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Mapping at an arena index
    pub fn get(&self, index: usize) -> &AnnotationTypeMapping {
        &self.mappings[index]
    }

    /// Root mapping (distance 0)
    pub fn root(&self) -> &AnnotationTypeMapping {
        &self.mappings[0]
    }

    /// Mappings in breadth-first order
    pub fn iter(&self) -> impl Iterator<Item = &AnnotationTypeMapping> {
        self.mappings.iter()
    }

    /// Filter the chain was built with
    pub fn filter(&self) -> &AnnotationFilter {
        &self.filter
    }

    /// Meta-level value recorded for an attribute of a mapping
    ///
    /// With `meta_annotations_only`, values recorded on the mapping itself
    /// are ignored.
    pub fn mapped_annotation_value(&self, mapping: usize, attribute_index: usize, meta_annotations_only: bool) -> Option<Value> {
        let (source, mapped) = self.mappings[mapping].annotation_value_mapping(attribute_index)?;
        if source == mapping && meta_annotations_only {
            return None;
        }
        let source = &self.mappings[source];
        reflective_value(source.attributes().get(mapped), source.annotation()?)
    }
}

pub(crate) fn clear_cache() {
    MAPPINGS_CACHE.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_types::{AliasFor, AnnotationType, AttributeDef, ValueType};

    fn named(name: &str) -> AttributeDef {
        AttributeDef::new(name, ValueType::String).with_default("")
    }

    fn layered_registry() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        registry
            .register_annotation_type(AnnotationType::new("demo.B").attribute(named("value")).attribute(named("name")))
            .unwrap();
        registry
            .register_annotation_type(
                AnnotationType::new("demo.A")
                    .attribute(named("value"))
                    .attribute(named("name"))
                    .annotated_with(Annotation::of("demo.B").with("value", "b").with("name", "b")),
            )
            .unwrap();
        registry
            .register_annotation_type(
                AnnotationType::new("demo.Root")
                    .annotated_with(Annotation::of("demo.A").with("value", "a").with("name", "a")),
            )
            .unwrap();
        registry
    }

    fn value_of(mappings: &AnnotationTypeMappings, mapping: usize, attribute: &str) -> Option<Value> {
        let index = mappings.get(mapping).attributes().index_of(attribute)?;
        mappings.mapped_annotation_value(mapping, index, false)
    }

    #[test]
    fn test_breadth_first_chain() {
        let registry = layered_registry();
        let mappings = AnnotationTypeMappings::for_annotation_type(&registry, "demo.Root").unwrap();
        assert_eq!(mappings.len(), 3);
        let distances: Vec<usize> = mappings.iter().map(AnnotationTypeMapping::distance).collect();
        assert_eq!(distances, vec![0, 1, 2]);
        let meta_types: Vec<&str> = mappings.get(2).meta_types().iter().map(|t| &**t).collect();
        assert_eq!(meta_types, vec!["demo.Root", "demo.A", "demo.B"]);
        assert_eq!(mappings.get(2).source(), Some(1));
        assert!(mappings.root().annotation().is_none());
    }

    #[test]
    fn test_nearer_convention_value_wins_except_for_value() {
        let registry = layered_registry();
        let mappings = AnnotationTypeMappings::for_annotation_type(&registry, "demo.Root").unwrap();
        assert_eq!(value_of(&mappings, 2, "name"), Some(Value::string("a")));
        assert_eq!(value_of(&mappings, 2, "value"), Some(Value::string("b")));
        assert_eq!(value_of(&mappings, 1, "name"), Some(Value::string("a")));
    }

    #[test]
    fn test_chains_are_cached() {
        let registry = layered_registry();
        let first = AnnotationTypeMappings::for_annotation_type(&registry, "demo.Root").unwrap();
        let second = AnnotationTypeMappings::for_annotation_type(&registry, "demo.Root").unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let filtered = AnnotationTypeMappings::for_annotation_type_with(
            &registry,
            "demo.Root",
            &RepeatableContainers::standard_repeatables(),
            &AnnotationFilter::packages(["demo"]),
        )
        .unwrap();
        assert_eq!(filtered.len(), 1);
    }

    #[test]
    fn test_cyclic_meta_annotations_terminate() {
        let mut registry = TypeRegistry::new();
        registry
            .register_annotation_type(AnnotationType::new("demo.Ping").annotated_with(Annotation::of("demo.Pong")))
            .unwrap();
        registry
            .register_annotation_type(AnnotationType::new("demo.Pong").annotated_with(Annotation::of("demo.Ping")))
            .unwrap();
        let mappings = AnnotationTypeMappings::for_annotation_type(&registry, "demo.Ping").unwrap();
        assert_eq!(mappings.len(), 2);
    }

    #[test]
    fn test_unknown_root_type() {
        let registry = TypeRegistry::new();
        let err = AnnotationTypeMappings::for_annotation_type(&registry, "demo.Nowhere").unwrap_err();
        assert_eq!(
            err,
            AnnotationError::UnknownType {
                name: "demo.Nowhere".to_string()
            }
        );
    }

    #[test]
    fn test_alias_target_must_be_meta_present() {
        let mut registry = TypeRegistry::new();
        registry
            .register_annotation_type(AnnotationType::new("demo.Target").attribute(named("bar")))
            .unwrap();
        registry
            .register_annotation_type(
                AnnotationType::new("demo.Orphan")
                    .attribute(named("foo").alias_for(AliasFor::meta("demo.Target", "bar"))),
            )
            .unwrap();
        let err = AnnotationTypeMappings::for_annotation_type(&registry, "demo.Orphan").unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("which is not meta-present"), "{err}");
    }

    #[test]
    fn test_synthesizable_flags() {
        let mut registry = TypeRegistry::new();
        registry
            .register_annotation_type(AnnotationType::new("demo.Marker").attribute(named("value")))
            .unwrap();
        registry
            .register_annotation_type(
                AnnotationType::new("demo.Mirrored")
                    .attribute(named("path").alias_for(AliasFor::attribute("value")))
                    .attribute(named("value").alias_for(AliasFor::attribute("path"))),
            )
            .unwrap();
        let marker = AnnotationTypeMappings::for_annotation_type(&registry, "demo.Marker").unwrap();
        let mirrored = AnnotationTypeMappings::for_annotation_type(&registry, "demo.Mirrored").unwrap();
        assert!(!marker.root().is_synthesizable());
        assert!(mirrored.root().is_synthesizable());
        assert_eq!(mirrored.root().mirror_sets().len(), 1);
    }
}
