//! Integration tests for the type model
//!
//! JSON descriptors, registry lookups and the value hash/display contract.

use strata_types::{
    java_string_hash, AliasFor, Annotation, AnnotatedElement, AttributeDef, RegistryError, TypeRef, TypeRegistry,
    Value, ValueType,
};

// ============================================================================
// Descriptors
// ============================================================================

mod descriptors {
    use super::*;

    const DESCRIPTOR: &str = r#"{
        "annotation_types": [
            {
                "name": "demo.Route",
                "inherited": true,
                "attributes": [
                    {
                        "name": "path",
                        "value_type": { "array": "string" },
                        "default_value": { "kind": "array", "value": [] },
                        "alias_for": { "attribute": "value" }
                    },
                    {
                        "name": "value",
                        "value_type": { "array": "string" },
                        "default_value": { "kind": "array", "value": [] },
                        "alias_for": { "attribute": "path" }
                    },
                    { "name": "mode", "value_type": { "enum": "demo.Mode" } }
                ]
            }
        ],
        "classes": [
            {
                "name": "demo.Repository",
                "is_interface": true,
                "type_params": ["T"],
                "methods": [
                    { "name": "save", "parameter_types": [{ "kind": "variable", "name": "T" }] }
                ]
            },
            {
                "name": "demo.OrderRepository",
                "interfaces": [
                    { "kind": "named", "name": "demo.Repository", "args": [{ "kind": "named", "name": "demo.Order" }] }
                ],
                "annotations": [
                    { "type": "demo.Route", "values": { "path": { "kind": "array", "value": [{ "kind": "string", "value": "/orders" }] } } }
                ]
            }
        ],
        "enums": [
            { "name": "demo.Mode", "constants": ["FAST", "SAFE"] }
        ]
    }"#;

    #[test]
    fn test_descriptor_loads_every_kind() {
        let registry = TypeRegistry::from_json(DESCRIPTOR).unwrap();

        let route = registry.annotation_type("demo.Route").unwrap();
        assert!(route.inherited);
        assert_eq!(route.attributes.len(), 3);
        assert_eq!(route.attributes[0].alias_for, Some(AliasFor::attribute("value")));
        assert_eq!(route.attributes[2].value_type, ValueType::Enum("demo.Mode".into()));
        assert!(route.attributes[2].default_value.is_none());

        let repository = registry.class("demo.Repository").unwrap();
        assert!(repository.is_interface);
        assert_eq!(repository.methods[0].parameter_types, vec![TypeRef::variable("T")]);

        let orders = registry.class("demo.OrderRepository").unwrap();
        assert_eq!(orders.interfaces[0].erasure(), "demo.Repository");
        assert_eq!(
            orders.annotations[0].get("path"),
            Some(&Value::strings(["/orders"]))
        );

        assert!(registry.is_enum_constant("demo.Mode", "SAFE"));
        assert!(registry.method(&strata_types::MethodRef::new("demo.Repository", 0)).is_ok());
    }

    #[test]
    fn test_malformed_descriptor_is_an_error() {
        let err = TypeRegistry::from_json("{ \"classes\": 3 }").unwrap_err();
        assert!(matches!(err, RegistryError::Descriptor(_)), "{err:?}");
    }

    #[test]
    fn test_duplicate_names_across_kinds() {
        let json = r#"{
            "annotation_types": [{ "name": "demo.Thing" }],
            "enums": [{ "name": "demo.Thing", "constants": [] }]
        }"#;
        let err = TypeRegistry::from_json(json).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateType { .. }));
    }
}

// ============================================================================
// Value Contract
// ============================================================================

mod value_contract {
    use super::*;

    #[test]
    fn test_string_and_array_hashes_follow_jvm_rules() {
        assert_eq!(java_string_hash("hello"), 99162322);
        assert_eq!(Value::array([Value::Int(1), Value::Int(2)]).java_hash_code(), 994);
        assert_eq!(Value::Array(Vec::new()).java_hash_code(), 1);
        assert_eq!(Value::Boolean(true).java_hash_code(), 1231);
        assert_eq!(Value::Long(1 << 32).java_hash_code(), 1);
    }

    #[test]
    fn test_cross_kind_values_are_unequal() {
        assert_ne!(Value::string("demo.Order"), Value::class("demo.Order"));
        assert_ne!(Value::Int(1), Value::Long(1));
        assert_eq!(Value::Double(f64::NAN), Value::Double(f64::NAN));
    }

    #[test]
    fn test_display_of_nested_values() {
        let nested = Annotation::of("demo.Inner").with("value", Value::class("demo.Order"));
        let value = Value::array([Value::from(nested), Value::enum_constant("demo.Mode", "FAST")]);
        assert_eq!(value.to_string(), "{@demo.Inner(value=demo.Order.class), FAST}");
    }

    #[test]
    fn test_value_type_acceptance() {
        let strings = ValueType::array_of(ValueType::String);
        assert!(strings.accepts(&Value::strings(["a", "b"])));
        assert!(!strings.accepts(&Value::string("a")));
        assert!(ValueType::Annotation("demo.Inner".into()).accepts(&Value::from(Annotation::of("demo.Inner"))));
        assert_eq!(strings.to_string(), "java.lang.String[]");
    }
}

// ============================================================================
// Elements
// ============================================================================

mod elements {
    use super::*;

    #[test]
    fn test_element_display() {
        assert_eq!(AnnotatedElement::class("demo.Order").to_string(), "class demo.Order");
        assert_eq!(AnnotatedElement::method("demo.Order", 2).to_string(), "method #2 of demo.Order");
        let adapted = AnnotatedElement::annotations([Annotation::of("demo.Inner")]);
        assert_eq!(adapted.to_string(), "1 adapted annotations");
    }

    #[test]
    fn test_attribute_default() {
        let attribute = AttributeDef::new("value", ValueType::String).with_default("x");
        assert_eq!(attribute.default_value, Some(Value::string("x")));
    }
}
