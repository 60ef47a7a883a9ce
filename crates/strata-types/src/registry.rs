//! Type registry
//!
//! Resolves annotation types, classes and enums by name. A type that is
//! referenced but not registered behaves like a type that cannot be loaded.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::Deserialize;

use crate::annotation::AnnotationType;
use crate::class::{ClassType, MethodDecl, MethodRef, OBJECT};
use crate::error::RegistryError;
use crate::value::TypeName;

static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identity of a registry, used to key engine caches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistryId(u64);

impl RegistryId {
    fn next() -> Self {
        RegistryId(NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Declaration of an enum type
#[derive(Debug, Clone, Deserialize)]
pub struct EnumType {
    /// Fully qualified name
    pub name: TypeName,
    /// Constant names
    pub constants: Vec<Arc<str>>,
}

impl EnumType {
    /// Declare an enum
    pub fn new(name: &str, constants: &[&str]) -> Self {
        Self {
            name: Arc::from(name),
            constants: constants.iter().map(|c| Arc::from(*c)).collect(),
        }
    }
}

#[derive(Deserialize)]
struct RegistryDescriptor {
    #[serde(default)]
    annotation_types: Vec<AnnotationType>,
    #[serde(default)]
    classes: Vec<ClassType>,
    #[serde(default)]
    enums: Vec<EnumType>,
}

/// Registry of annotation types, classes and enums
#[derive(Debug)]
pub struct TypeRegistry {
    id: RegistryId,
    annotation_types: FxHashMap<TypeName, AnnotationType>,
    classes: FxHashMap<TypeName, ClassType>,
    enums: FxHashMap<TypeName, EnumType>,
}

impl TypeRegistry {
    /// Create a registry holding only `java.lang.Object` and `java.lang.String`
    pub fn new() -> Self {
        let mut classes = FxHashMap::default();
        for name in [OBJECT, "java.lang.String"] {
            let class = ClassType::new(name);
            classes.insert(class.name.clone(), class);
        }
        Self {
            id: RegistryId::next(),
            annotation_types: FxHashMap::default(),
            classes,
            enums: FxHashMap::default(),
        }
    }

    /// Load a registry from a JSON descriptor
    pub fn from_json(json: &str) -> Result<Self, RegistryError> {
        let descriptor: RegistryDescriptor = serde_json::from_str(json)?;
        let mut registry = Self::new();
        for annotation_type in descriptor.annotation_types {
            registry.register_annotation_type(annotation_type)?;
        }
        for class in descriptor.classes {
            registry.register_class(class)?;
        }
        for enum_type in descriptor.enums {
            registry.register_enum(enum_type)?;
        }
        Ok(registry)
    }

    /// Registry identity, renewed by every registration
    pub fn id(&self) -> RegistryId {
        self.id
    }

    fn ensure_unique(&self, name: &str) -> Result<(), RegistryError> {
        if self.is_loadable(name) {
            return Err(RegistryError::DuplicateType {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    /// Register an annotation type
    pub fn register_annotation_type(&mut self, annotation_type: AnnotationType) -> Result<(), RegistryError> {
        self.ensure_unique(&annotation_type.name)?;
        self.annotation_types
            .insert(annotation_type.name.clone(), annotation_type);
        self.id = RegistryId::next();
        Ok(())
    }

    /// Register a class or interface
    pub fn register_class(&mut self, class: ClassType) -> Result<(), RegistryError> {
        self.ensure_unique(&class.name)?;
        self.classes.insert(class.name.clone(), class);
        self.id = RegistryId::next();
        Ok(())
    }

    /// Register an enum
    pub fn register_enum(&mut self, enum_type: EnumType) -> Result<(), RegistryError> {
        self.ensure_unique(&enum_type.name)?;
        self.enums.insert(enum_type.name.clone(), enum_type);
        self.id = RegistryId::next();
        Ok(())
    }

    /// Get an annotation type by name
    pub fn annotation_type(&self, name: &str) -> Option<&AnnotationType> {
        self.annotation_types.get(name)
    }

    /// Get a class by name
    pub fn class(&self, name: &str) -> Option<&ClassType> {
        self.classes.get(name)
    }

    /// Get an enum by name
    pub fn enum_type(&self, name: &str) -> Option<&EnumType> {
        self.enums.get(name)
    }

    /// Resolve a method reference
    pub fn method(&self, method: &MethodRef) -> Result<&MethodDecl, RegistryError> {
        self.class(&method.declaring_class)
            .and_then(|class| class.methods.get(method.index))
            .ok_or_else(|| RegistryError::UnknownMethod {
                class: method.declaring_class.to_string(),
                index: method.index,
            })
    }

    /// Whether a name resolves to any registered type
    pub fn is_loadable(&self, name: &str) -> bool {
        self.classes.contains_key(name)
            || self.annotation_types.contains_key(name)
            || self.enums.contains_key(name)
    }

    /// Whether an enum declares the given constant
    pub fn is_enum_constant(&self, enum_type: &str, constant: &str) -> bool {
        self.enums
            .get(enum_type)
            .is_some_and(|e| e.constants.iter().any(|c| &**c == constant))
    }

    /// Number of registered annotation types
    pub fn annotation_type_count(&self) -> usize {
        self.annotation_types.len()
    }

    /// Number of registered classes (including the built-ins)
    pub fn class_count(&self) -> usize {
        self.classes.len()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
