//! Integration tests for merged annotations
//!
//! Alias and mirror resolution, convention overrides, repeatable
//! containers, hierarchy search and synthesis through the public API.

use std::sync::Arc;

use strata_annotations::{
    clear_cache, get_declared_annotations, scan, Adapt, AnnotationError, AnnotationTypeMappings, AnnotationsProcessor,
    AttributeMethods, MergedAnnotation, MergedAnnotations, SearchStrategy,
};
use strata_types::{
    AliasFor, AnnotatedElement, Annotation, AnnotationType, AttributeDef, ClassType, TypeRef, TypeRegistry, Value,
    ValueType,
};

fn string_attribute(name: &str) -> AttributeDef {
    AttributeDef::new(name, ValueType::String).with_default("")
}

/// Route engine logs to the test output
fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn freeze(registry: TypeRegistry) -> Arc<TypeRegistry> {
    Arc::new(registry)
}

/// `demo.Base(value)` and `demo.Composed(name -> Base.value)`
fn composed_registry() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    registry
        .register_annotation_type(AnnotationType::new("demo.Base").attribute(string_attribute("value")))
        .unwrap();
    registry
        .register_annotation_type(
            AnnotationType::new("demo.Composed")
                .attribute(string_attribute("name").alias_for(AliasFor::meta("demo.Base", "value")))
                .annotated_with(Annotation::of("demo.Base").with("value", "x")),
        )
        .unwrap();
    registry
}

/// `demo.Route` with `path` and `value` declared as mirrors
fn route_registry() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    registry
        .register_annotation_type(
            AnnotationType::new("demo.Route")
                .attribute(string_attribute("path").alias_for(AliasFor::attribute("value")))
                .attribute(string_attribute("value").alias_for(AliasFor::attribute("path")))
                .attribute(AttributeDef::new("target", ValueType::Class).with_default(Value::class("java.lang.Object"))),
        )
        .unwrap();
    registry
}

// ============================================================================
// Attribute Methods
// ============================================================================

mod attribute_methods {
    use super::*;

    #[test]
    fn test_attributes_sorted_by_name() {
        let mut registry = TypeRegistry::new();
        registry
            .register_annotation_type(
                AnnotationType::new("demo.Unordered")
                    .attribute(string_attribute("zeta"))
                    .attribute(string_attribute("alpha"))
                    .attribute(string_attribute("mid")),
            )
            .unwrap();
        let methods = AttributeMethods::for_annotation_type(&registry, "demo.Unordered").unwrap();
        let names: Vec<&str> = methods.iter().map(|attribute| &*attribute.name).collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
        assert_eq!(methods.index_of("mid"), Some(1));
    }
}

// ============================================================================
// Aliases and Mirrors
// ============================================================================

mod aliases {
    use super::*;

    #[test]
    fn test_alias_overrides_meta_annotation_value() {
        let registry = freeze(composed_registry());
        let annotation = Annotation::of("demo.Composed").with("name", "y");
        let annotations = MergedAnnotations::from_annotations(&registry, [annotation]);

        let composed = annotations.get("demo.Composed").unwrap();
        assert_eq!(&*composed.get_string("name").unwrap(), "y");

        let base = annotations.get("demo.Base").unwrap();
        assert!(base.is_meta_present());
        assert_eq!(&*base.get_string("value").unwrap(), "y");
        let meta_types: Vec<&str> = base.meta_types().iter().map(|t| &**t).collect();
        assert_eq!(meta_types, vec!["demo.Composed", "demo.Base"]);
    }

    #[test]
    fn test_non_merged_view_reads_declared_value() {
        let registry = freeze(composed_registry());
        let annotations = MergedAnnotations::from_annotations(&registry, [Annotation::of("demo.Composed").with("name", "y")]);
        let base = annotations.get("demo.Base").unwrap().with_non_merged_attributes();
        assert_eq!(&*base.get_string("value").unwrap(), "x");
    }

    #[test]
    fn test_mirrors_read_through_either_name() {
        let registry = freeze(route_registry());
        for name in ["path", "value"] {
            let merged = MergedAnnotation::of(&registry, Annotation::of("demo.Route").with(name, "/orders")).unwrap();
            assert_eq!(&*merged.get_string("path").unwrap(), "/orders");
            assert_eq!(&*merged.get_string("value").unwrap(), "/orders");
            assert!(merged.has_non_default_value("path").unwrap());
        }
    }

    #[test]
    fn test_equal_mirror_values_are_accepted() {
        let registry = freeze(route_registry());
        let annotation = Annotation::of("demo.Route").with("path", "/a").with("value", "/a");
        let merged = MergedAnnotation::of(&registry, annotation).unwrap();
        assert_eq!(&*merged.get_string("value").unwrap(), "/a");
    }

    #[test]
    fn test_conflicting_mirror_values_fail_for_either_order() {
        let registry = freeze(route_registry());
        for (path, value) in [("/a", "/b"), ("/b", "/a")] {
            let annotation = Annotation::of("demo.Route").with("path", path).with("value", value);
            let err = MergedAnnotation::of(&registry, annotation).unwrap_err();
            assert!(err.is_configuration());
            let message = err.to_string();
            for expected in ["'path'", "'value'", path, value] {
                assert!(message.contains(expected), "{message}");
            }
        }
    }

    #[test]
    fn test_alias_without_meta_annotation_fails() {
        let mut registry = TypeRegistry::new();
        registry
            .register_annotation_type(AnnotationType::new("demo.Base").attribute(string_attribute("value")))
            .unwrap();
        registry
            .register_annotation_type(
                AnnotationType::new("demo.Detached")
                    .attribute(string_attribute("name").alias_for(AliasFor::meta("demo.Base", "value"))),
            )
            .unwrap();
        let registry = freeze(registry);
        let err = MergedAnnotation::of(&registry, Annotation::of("demo.Detached")).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("not meta-present"), "{err}");
    }

    #[test]
    fn test_alias_with_attribute_and_value_fails() {
        let mut registry = TypeRegistry::new();
        let both = AliasFor {
            annotation: None,
            attribute: Some(Arc::from("b")),
            value: Some(Arc::from("b")),
        };
        registry
            .register_annotation_type(
                AnnotationType::new("demo.Both")
                    .attribute(string_attribute("a").alias_for(both))
                    .attribute(string_attribute("b").alias_for(AliasFor::attribute("a"))),
            )
            .unwrap();
        let err = AnnotationTypeMappings::for_annotation_type(&registry, "demo.Both").unwrap_err();
        assert!(err.to_string().contains("but only one is permitted"), "{err}");
    }

    #[test]
    fn test_mirror_defaults_must_match() {
        let mut registry = TypeRegistry::new();
        registry
            .register_annotation_type(
                AnnotationType::new("demo.Skewed")
                    .attribute(
                        AttributeDef::new("a", ValueType::String)
                            .with_default("one")
                            .alias_for(AliasFor::attribute("b")),
                    )
                    .attribute(
                        AttributeDef::new("b", ValueType::String)
                            .with_default("two")
                            .alias_for(AliasFor::attribute("a")),
                    ),
            )
            .unwrap();
        let err = AnnotationTypeMappings::for_annotation_type(&registry, "demo.Skewed").unwrap_err();
        assert!(err.to_string().contains("must declare the same default value"), "{err}");
    }
}

// ============================================================================
// Convention Mappings
// ============================================================================

mod conventions {
    use super::*;

    /// Root -> A -> B, with `foo` and `value` declared on A and B
    fn layered(root_declares_foo: bool) -> Arc<TypeRegistry> {
        let mut registry = TypeRegistry::new();
        registry
            .register_annotation_type(
                AnnotationType::new("demo.B")
                    .attribute(string_attribute("foo"))
                    .attribute(string_attribute("value")),
            )
            .unwrap();
        registry
            .register_annotation_type(
                AnnotationType::new("demo.A")
                    .attribute(string_attribute("foo"))
                    .attribute(string_attribute("value"))
                    .annotated_with(Annotation::of("demo.B").with("foo", "from-b").with("value", "from-b")),
            )
            .unwrap();
        let mut root = AnnotationType::new("demo.Root")
            .annotated_with(Annotation::of("demo.A").with("foo", "from-a").with("value", "from-a"));
        if root_declares_foo {
            root = root.attribute(string_attribute("foo"));
        }
        registry.register_annotation_type(root).unwrap();
        freeze(registry)
    }

    #[test]
    fn test_nearer_level_wins_for_plain_attributes() {
        let registry = layered(false);
        let annotations = MergedAnnotations::from_annotations(&registry, [Annotation::of("demo.Root")]);
        let b = annotations.get("demo.B").unwrap();
        assert_eq!(b.distance(), Some(2));
        assert_eq!(&*b.get_string("foo").unwrap(), "from-a");
    }

    #[test]
    fn test_value_is_never_overridden_by_convention() {
        let registry = layered(false);
        let annotations = MergedAnnotations::from_annotations(&registry, [Annotation::of("demo.Root")]);
        let b = annotations.get("demo.B").unwrap();
        assert_eq!(&*b.get_string("value").unwrap(), "from-b");
    }

    #[test]
    fn test_root_attribute_overrides_by_name() {
        let registry = layered(true);
        let annotations =
            MergedAnnotations::from_annotations(&registry, [Annotation::of("demo.Root").with("foo", "from-root")]);
        assert_eq!(&*annotations.get("demo.A").unwrap().get_string("foo").unwrap(), "from-root");
        assert_eq!(&*annotations.get("demo.B").unwrap().get_string("foo").unwrap(), "from-root");
    }

    #[test]
    fn test_meta_source_walks_toward_root() {
        let registry = layered(false);
        let annotations = MergedAnnotations::from_annotations(&registry, [Annotation::of("demo.Root")]);
        let b = annotations.get("demo.B").unwrap();
        let a = b.meta_source().unwrap().unwrap();
        assert_eq!(a.annotation_type().map(|t| &**t), Some("demo.A"));
        assert_eq!(b.root().annotation_type().map(|t| &**t), Some("demo.Root"));
        assert!(b.root().meta_source().unwrap().is_none());
    }
}

// ============================================================================
// Synthesis
// ============================================================================

mod synthesis {
    use super::*;

    #[test]
    fn test_plain_annotation_synthesizes_to_itself() {
        let mut registry = TypeRegistry::new();
        registry
            .register_annotation_type(AnnotationType::new("demo.Plain").attribute(string_attribute("value")))
            .unwrap();
        let registry = freeze(registry);
        let mappings = AnnotationTypeMappings::for_annotation_type(&registry, "demo.Plain").unwrap();
        let root = mappings.root();
        assert!(!root.is_synthesizable());
        assert!((0..root.attributes().len()).all(|i| root.alias_mapping(i).is_none() && root.convention_mapping(i).is_none()));

        let annotation = Annotation::of("demo.Plain").with("value", "v");
        let synthesized = MergedAnnotation::of(&registry, annotation.clone()).unwrap().synthesize().unwrap();
        assert!(Annotation::ptr_eq(&synthesized, &annotation));
    }

    #[test]
    fn test_synthesized_values_match_merged_values() {
        let registry = freeze(composed_registry());
        let annotations = MergedAnnotations::from_annotations(&registry, [Annotation::of("demo.Composed").with("name", "y")]);
        for merged in annotations.stream_all() {
            let merged = merged.unwrap();
            let synthesized = merged.synthesize().unwrap();
            assert_eq!(synthesized.annotation_type(), merged.annotation_type().unwrap());
            for (name, value) in synthesized.values() {
                assert_eq!(merged.get_value(name).unwrap().as_ref(), Some(value));
            }
        }
    }

    #[test]
    fn test_synthesized_mirror_fills_both_names() {
        let registry = freeze(route_registry());
        let merged = MergedAnnotation::of(&registry, Annotation::of("demo.Route").with("value", "/items")).unwrap();
        let synthesized = merged.synthesize().unwrap();
        assert!(synthesized.is_synthesized());
        assert_eq!(synthesized.get("path"), Some(&Value::string("/items")));
        assert_eq!(synthesized.get("value"), Some(&Value::string("/items")));
        assert_eq!(synthesized.get("target"), Some(&Value::class("java.lang.Object")));
    }

    #[test]
    fn test_meta_level_synthesis_keeps_convention_values() {
        let mut registry = TypeRegistry::new();
        registry
            .register_annotation_type(
                AnnotationType::new("demo.B")
                    .attribute(string_attribute("name"))
                    .attribute(string_attribute("value")),
            )
            .unwrap();
        registry
            .register_annotation_type(
                AnnotationType::new("demo.A")
                    .attribute(string_attribute("name"))
                    .annotated_with(Annotation::of("demo.B").with("name", "b").with("value", "b")),
            )
            .unwrap();
        registry
            .register_annotation_type(
                AnnotationType::new("demo.Root").annotated_with(Annotation::of("demo.A").with("name", "a")),
            )
            .unwrap();
        registry
            .register_class(ClassType::new("demo.Service").annotated_with(Annotation::of("demo.Root")))
            .unwrap();
        let registry = freeze(registry);

        let b = MergedAnnotations::from(&registry, AnnotatedElement::class("demo.Service"))
            .get("demo.B")
            .unwrap();
        assert_eq!(&*b.get_string("name").unwrap(), "a");

        let synthesized = b.synthesize().unwrap();
        assert!(synthesized.is_synthesized());
        for name in ["name", "value"] {
            assert_eq!(synthesized.get(name).cloned(), b.get_value(name).unwrap(), "{name}");
        }
        assert_eq!(synthesized.get("name"), Some(&Value::string("a")));
        assert_eq!(synthesized.get("value"), Some(&Value::string("b")));
    }

    #[test]
    fn test_nested_value_is_merged() {
        let mut registry = route_registry();
        registry
            .register_annotation_type(
                AnnotationType::new("demo.Holder")
                    .attribute(AttributeDef::new("route", ValueType::Annotation("demo.Route".into()))),
            )
            .unwrap();
        let registry = freeze(registry);
        let holder = Annotation::of("demo.Holder").with("route", Annotation::of("demo.Route").with("value", "/x"));
        let merged = MergedAnnotation::of(&registry, holder).unwrap();

        let Some(Value::Annotation(route)) = merged.get_value("route").unwrap() else {
            panic!("expected a nested annotation");
        };
        assert!(route.is_synthesized());
        assert_eq!(route.get("path"), Some(&Value::string("/x")));
        assert_eq!(route.get("value"), Some(&Value::string("/x")));

        let synthesized = merged.synthesize().unwrap();
        assert_eq!(synthesized.get("route"), Some(&Value::Annotation(route)));
    }

    #[test]
    fn test_synthesized_equality_includes_defaults() {
        let registry = freeze(route_registry());
        let implicit = Annotation::of("demo.Route").with("value", "/a");
        let explicit = implicit.clone().with("target", Value::class("java.lang.Object"));
        assert_ne!(implicit, explicit);

        let implicit = MergedAnnotation::of(&registry, implicit).unwrap().synthesize().unwrap();
        let explicit = MergedAnnotation::of(&registry, explicit).unwrap().synthesize().unwrap();
        assert_eq!(implicit, explicit);
        assert_eq!(implicit.hash_code(), explicit.hash_code());
    }

    #[test]
    fn test_missing_annotation_cannot_synthesize() {
        let err = MergedAnnotation::missing().synthesize().unwrap_err();
        assert!(matches!(err, AnnotationError::NoSuchElement { .. }));
    }
}

// ============================================================================
// Repeatable Containers
// ============================================================================

mod repeatables {
    use super::*;

    fn registry() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        registry
            .register_annotation_type(
                AnnotationType::new("demo.Tag")
                    .attribute(AttributeDef::new("value", ValueType::String))
                    .repeatable_in("demo.Tags"),
            )
            .unwrap();
        registry
            .register_annotation_type(AnnotationType::new("demo.Tags").attribute(AttributeDef::new(
                "value",
                ValueType::array_of(ValueType::Annotation("demo.Tag".into())),
            )))
            .unwrap();
        registry
    }

    fn tag(value: &str) -> Annotation {
        Annotation::of("demo.Tag").with("value", value)
    }

    #[test]
    fn test_container_is_unwrapped() {
        let mut registry = registry();
        let tags = Annotation::of("demo.Tags").with(
            "value",
            Value::array(["a", "b", "c"].into_iter().map(|v| Value::Annotation(tag(v)))),
        );
        registry
            .register_class(ClassType::new("demo.Tagged").annotated_with(tags))
            .unwrap();
        let registry = freeze(registry);

        let annotations = MergedAnnotations::from(&registry, AnnotatedElement::class("demo.Tagged"));
        let found: Vec<MergedAnnotation> = annotations
            .stream("demo.Tag")
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(found.len(), 3);
        assert!(found.iter().all(|merged| merged.distance() == Some(0)));
        let values: Vec<String> = found
            .iter()
            .map(|merged| merged.get_string("value").unwrap().to_string())
            .collect();
        assert_eq!(values, vec!["a", "b", "c"]);

        assert_eq!(annotations.stream("demo.Tags").count(), 0);
        assert!(annotations.is_directly_present("demo.Tag").unwrap());
    }

    #[test]
    fn test_repeated_declarations_without_container() {
        let mut registry = registry();
        registry
            .register_class(
                ClassType::new("demo.Tagged")
                    .annotated_with(tag("a"))
                    .annotated_with(tag("b"))
                    .annotated_with(tag("c")),
            )
            .unwrap();
        let registry = freeze(registry);
        let annotations = MergedAnnotations::from(&registry, AnnotatedElement::class("demo.Tagged"));
        assert_eq!(annotations.stream("demo.Tag").count(), 3);
        assert_eq!(&*annotations.get("demo.Tag").unwrap().get_string("value").unwrap(), "a");
    }
}

// ============================================================================
// Hierarchy Search
// ============================================================================

mod search {
    use super::*;

    struct Recorder {
        seen: Vec<(usize, String)>,
    }

    impl AnnotationsProcessor<()> for Recorder {
        type Output = ();

        fn do_with_annotations(
            &mut self,
            _context: &(),
            aggregate_index: usize,
            _source: &AnnotatedElement,
            annotations: &[Annotation],
        ) -> Option<()> {
            for annotation in annotations {
                self.seen.push((aggregate_index, annotation.annotation_type().to_string()));
            }
            None
        }
    }

    fn hierarchy() -> Arc<TypeRegistry> {
        let mut registry = composed_registry();
        registry
            .register_class(ClassType::new("demo.Parent").annotated_with(Annotation::of("demo.Base").with("value", "parent")))
            .unwrap();
        registry
            .register_class(
                ClassType::new("demo.Child")
                    .extends(TypeRef::named("demo.Parent"))
                    .implements(TypeRef::named("demo.Gone")),
            )
            .unwrap();
        registry
            .register_class(ClassType::new("demo.Outer").annotated_with(Annotation::of("demo.Composed").with("name", "outer")))
            .unwrap();
        registry
            .register_class(ClassType::new("demo.Inner").enclosed_in("demo.Outer"))
            .unwrap();
        registry.register_class(ClassType::new("demo.Bare")).unwrap();
        freeze(registry)
    }

    #[test]
    fn test_element_without_annotations_is_empty() {
        let registry = hierarchy();
        for strategy in [
            SearchStrategy::Direct,
            SearchStrategy::InheritedAnnotations,
            SearchStrategy::Superclass,
            SearchStrategy::TypeHierarchy,
        ] {
            let mut recorder = Recorder { seen: Vec::new() };
            let result = scan(&*registry, &(), &AnnotatedElement::class("demo.Bare"), strategy, &|_| false, &mut recorder);
            assert!(result.is_none());
            assert!(recorder.seen.is_empty());

            let annotations = MergedAnnotations::search(strategy).from(&registry, AnnotatedElement::class("demo.Bare"));
            assert_eq!(annotations.stream_all().count(), 0);
            assert!(!annotations.get("demo.Base").unwrap().is_present());
        }
    }

    #[test]
    fn test_missing_interface_does_not_hide_superclass() {
        init_tracing();
        let registry = hierarchy();
        let annotations =
            MergedAnnotations::search(SearchStrategy::TypeHierarchy).from(&registry, AnnotatedElement::class("demo.Child"));
        let base = annotations.get("demo.Base").unwrap();
        assert!(base.is_present());
        assert_eq!(base.aggregate_index(), Some(1));
        assert_eq!(base.source(), Some(&AnnotatedElement::class("demo.Parent")));
        assert_eq!(&*base.get_string("value").unwrap(), "parent");
    }

    #[test]
    fn test_direct_search_ignores_superclass() {
        let registry = hierarchy();
        let annotations = MergedAnnotations::from(&registry, AnnotatedElement::class("demo.Child"));
        assert!(!annotations.is_present("demo.Base").unwrap());
    }

    #[test]
    fn test_enclosing_classes_follow_predicate() {
        let registry = hierarchy();
        let without = MergedAnnotations::search(SearchStrategy::TypeHierarchy)
            .from(&registry, AnnotatedElement::class("demo.Inner"));
        assert!(!without.is_present("demo.Base").unwrap());

        let with = MergedAnnotations::search(SearchStrategy::TypeHierarchy)
            .with_enclosing_classes(|_| true)
            .unwrap()
            .from(&registry, AnnotatedElement::class("demo.Inner"));
        let base = with.get("demo.Base").unwrap();
        assert!(base.is_meta_present());
        assert_eq!(&*base.get_string("value").unwrap(), "outer");
    }
}

// ============================================================================
// Registry Descriptors and Caches
// ============================================================================

mod registry {
    use super::*;

    const DESCRIPTOR: &str = r#"{
        "annotation_types": [
            {
                "name": "demo.Base",
                "attributes": [
                    { "name": "value", "value_type": "string", "default_value": { "kind": "string", "value": "" } }
                ]
            },
            {
                "name": "demo.Composed",
                "attributes": [
                    {
                        "name": "name",
                        "value_type": "string",
                        "default_value": { "kind": "string", "value": "" },
                        "alias_for": { "annotation": "demo.Base", "attribute": "value" }
                    }
                ],
                "annotations": [
                    { "type": "demo.Base", "values": { "value": { "kind": "string", "value": "x" } } }
                ]
            }
        ],
        "classes": [
            {
                "name": "demo.Service",
                "annotations": [
                    { "type": "demo.Composed", "values": { "name": { "kind": "string", "value": "y" } } }
                ]
            }
        ]
    }"#;

    fn base_value(registry: &Arc<TypeRegistry>) -> String {
        MergedAnnotations::from(registry, AnnotatedElement::class("demo.Service"))
            .get("demo.Base")
            .unwrap()
            .get_string("value")
            .unwrap()
            .to_string()
    }

    #[test]
    fn test_json_descriptor_matches_builder() {
        let from_json = freeze(TypeRegistry::from_json(DESCRIPTOR).unwrap());

        let mut built = composed_registry();
        built
            .register_class(ClassType::new("demo.Service").annotated_with(Annotation::of("demo.Composed").with("name", "y")))
            .unwrap();
        let built = freeze(built);

        assert_eq!(base_value(&from_json), "y");
        assert_eq!(base_value(&from_json), base_value(&built));
    }

    #[test]
    fn test_registration_after_lookup_is_visible() {
        let mut registry = TypeRegistry::new();
        registry
            .register_class(ClassType::new("demo.C").annotated_with(Annotation::of("demo.Late")))
            .unwrap();
        let element = AnnotatedElement::class("demo.C");
        assert!(get_declared_annotations(&registry, &element).is_empty());

        registry
            .register_annotation_type(AnnotationType::new("demo.Late"))
            .unwrap();
        assert_eq!(get_declared_annotations(&registry, &element).len(), 1);
        assert!(MergedAnnotations::from(&freeze(registry), element).is_present("demo.Late").unwrap());
    }

    #[test]
    fn test_clear_cache_recomputes_same_results() {
        init_tracing();
        let registry = freeze(TypeRegistry::from_json(DESCRIPTOR).unwrap());
        let before = AnnotationTypeMappings::for_annotation_type(&registry, "demo.Composed").unwrap();
        let value_before = base_value(&registry);

        clear_cache();

        let after = AnnotationTypeMappings::for_annotation_type(&registry, "demo.Composed").unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(before.len(), after.len());
        assert_eq!(base_value(&registry), value_before);
    }
}

// ============================================================================
// Map Projection
// ============================================================================

mod projection {
    use super::*;

    #[test]
    fn test_class_to_string() {
        let registry = freeze(route_registry());
        let annotation = Annotation::of("demo.Route")
            .with("path", "/a")
            .with("target", Value::class("demo.Service"));
        let merged = MergedAnnotation::of(&registry, annotation).unwrap();

        let plain = merged.as_map(&[]).unwrap();
        assert_eq!(plain.value("target"), Some(&Value::class("demo.Service")));

        let adapted = merged.as_map(&[Adapt::ClassToString]).unwrap();
        assert_eq!(adapted.value("target"), Some(&Value::string("demo.Service")));
        assert_eq!(adapted.value("value"), Some(&Value::string("/a")));
        assert_eq!(adapted.len(), 3);
    }

    #[test]
    fn test_missing_projects_to_empty_map() {
        let attributes = MergedAnnotation::missing().as_map(&[Adapt::AnnotationToMap]).unwrap();
        assert!(attributes.is_empty());
        assert!(attributes.annotation_type().is_none());
    }
}
