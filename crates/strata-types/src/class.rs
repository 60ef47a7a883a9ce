//! Classes, methods and annotated elements

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::annotation::Annotation;
use crate::value::TypeName;

/// Name of the implicit root of every class hierarchy
pub const OBJECT: &str = "java.lang.Object";

/// A possibly generic type reference in a signature
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeRef {
    /// A named class, with optional type arguments
    Named {
        /// Class name
        name: TypeName,
        /// Type arguments
        #[serde(default)]
        args: Vec<TypeRef>,
    },
    /// A type variable such as `T`
    Variable {
        /// Variable name
        name: Arc<str>,
    },
    /// An array type
    Array {
        /// Component type
        component: Box<TypeRef>,
    },
}

impl TypeRef {
    /// Non-generic named type
    pub fn named(name: &str) -> Self {
        TypeRef::Named {
            name: Arc::from(name),
            args: Vec::new(),
        }
    }

    /// Parameterized named type
    pub fn generic(name: &str, args: Vec<TypeRef>) -> Self {
        TypeRef::Named {
            name: Arc::from(name),
            args,
        }
    }

    /// Type variable
    pub fn variable(name: &str) -> Self {
        TypeRef::Variable {
            name: Arc::from(name),
        }
    }

    /// Array of the component type
    pub fn array(component: TypeRef) -> Self {
        TypeRef::Array {
            component: Box::new(component),
        }
    }

    /// Erased type name (type variables erase to `java.lang.Object`)
    pub fn erasure(&self) -> String {
        match self {
            TypeRef::Named { name, .. } => name.to_string(),
            TypeRef::Variable { .. } => OBJECT.to_string(),
            TypeRef::Array { component } => format!("{}[]", component.erasure()),
        }
    }

    /// Replace bound type variables
    pub fn substitute(&self, bindings: &FxHashMap<Arc<str>, TypeRef>) -> TypeRef {
        match self {
            TypeRef::Named { name, args } => TypeRef::Named {
                name: name.clone(),
                args: args.iter().map(|arg| arg.substitute(bindings)).collect(),
            },
            TypeRef::Variable { name } => bindings.get(name).cloned().unwrap_or_else(|| self.clone()),
            TypeRef::Array { component } => TypeRef::Array {
                component: Box::new(component.substitute(bindings)),
            },
        }
    }

    /// Class name for named types
    pub fn class_name(&self) -> Option<&TypeName> {
        match self {
            TypeRef::Named { name, .. } => Some(name),
            _ => None,
        }
    }
}

/// Declaration of a method
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodDecl {
    /// Method name
    pub name: Arc<str>,
    /// Parameter types as declared
    #[serde(default)]
    pub parameter_types: Vec<TypeRef>,
    /// Annotations declared on the method
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    /// Private visibility
    #[serde(default)]
    pub is_private: bool,
    /// Compiler-generated bridge method
    #[serde(default)]
    pub is_bridge: bool,
}

impl MethodDecl {
    /// Declare a method
    pub fn new(name: &str, parameter_types: Vec<TypeRef>) -> Self {
        Self {
            name: Arc::from(name),
            parameter_types,
            annotations: Vec::new(),
            is_private: false,
            is_bridge: false,
        }
    }

    /// Add an annotation
    pub fn annotated_with(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    /// Mark the method private
    pub fn private(mut self) -> Self {
        self.is_private = true;
        self
    }

    /// Mark the method as a bridge
    pub fn bridge(mut self) -> Self {
        self.is_bridge = true;
        self
    }
}

/// Declaration of a class or interface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassType {
    /// Fully qualified name
    pub name: TypeName,
    /// Whether this is an interface
    #[serde(default)]
    pub is_interface: bool,
    /// Declared type parameters
    #[serde(default)]
    pub type_params: Vec<Arc<str>>,
    /// Superclass (`None` means `java.lang.Object`)
    #[serde(default)]
    pub superclass: Option<TypeRef>,
    /// Directly implemented (or extended, for interfaces) interfaces
    #[serde(default)]
    pub interfaces: Vec<TypeRef>,
    /// Lexically enclosing class
    #[serde(default)]
    pub enclosing_class: Option<TypeName>,
    /// Annotations declared on the class
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    /// Declared methods
    #[serde(default)]
    pub methods: Vec<MethodDecl>,
}

impl ClassType {
    /// Start a class declaration
    pub fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            is_interface: false,
            type_params: Vec::new(),
            superclass: None,
            interfaces: Vec::new(),
            enclosing_class: None,
            annotations: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Start an interface declaration
    pub fn interface(name: &str) -> Self {
        Self {
            is_interface: true,
            ..Self::new(name)
        }
    }

    /// Declare type parameters
    pub fn type_params(mut self, params: &[&str]) -> Self {
        self.type_params = params.iter().map(|p| Arc::from(*p)).collect();
        self
    }

    /// Set the superclass
    pub fn extends(mut self, superclass: TypeRef) -> Self {
        self.superclass = Some(superclass);
        self
    }

    /// Add an implemented interface
    pub fn implements(mut self, interface: TypeRef) -> Self {
        self.interfaces.push(interface);
        self
    }

    /// Set the enclosing class
    pub fn enclosed_in(mut self, enclosing: &str) -> Self {
        self.enclosing_class = Some(Arc::from(enclosing));
        self
    }

    /// Add an annotation
    pub fn annotated_with(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    /// Add a method
    pub fn method(mut self, method: MethodDecl) -> Self {
        self.methods.push(method);
        self
    }

    /// Superclass name, ignoring `java.lang.Object`
    pub fn superclass_name(&self) -> Option<&TypeName> {
        self.superclass
            .as_ref()
            .and_then(TypeRef::class_name)
            .filter(|name| &***name != OBJECT)
    }

    /// Index of the first method with the given name
    pub fn method_index(&self, name: &str) -> Option<usize> {
        self.methods.iter().position(|m| &*m.name == name)
    }
}

/// Reference to a method by declaring class and position
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodRef {
    /// Declaring class
    pub declaring_class: TypeName,
    /// Index into the class's declared methods
    pub index: usize,
}

impl MethodRef {
    /// Create a method reference
    pub fn new(declaring_class: &str, index: usize) -> Self {
        Self {
            declaring_class: Arc::from(declaring_class),
            index,
        }
    }
}

/// The root of an annotation search
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AnnotatedElement {
    /// A registered class or interface
    Class(TypeName),
    /// A method of a registered class
    Method(MethodRef),
    /// An explicit set of annotations with no hierarchy
    Annotations(Arc<[Annotation]>),
}

impl AnnotatedElement {
    /// Element for a class name
    pub fn class(name: &str) -> Self {
        AnnotatedElement::Class(Arc::from(name))
    }

    /// Element for a method
    pub fn method(declaring_class: &str, index: usize) -> Self {
        AnnotatedElement::Method(MethodRef::new(declaring_class, index))
    }

    /// Element wrapping explicit annotations
    pub fn annotations(annotations: impl IntoIterator<Item = Annotation>) -> Self {
        AnnotatedElement::Annotations(annotations.into_iter().collect())
    }
}

impl fmt::Display for AnnotatedElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnnotatedElement::Class(name) => write!(f, "class {}", name),
            AnnotatedElement::Method(method) => {
                write!(f, "method #{} of {}", method.index, method.declaring_class)
            }
            AnnotatedElement::Annotations(annotations) => {
                write!(f, "{} adapted annotations", annotations.len())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_erasure() {
        assert_eq!(TypeRef::named("java.lang.String").erasure(), "java.lang.String");
        assert_eq!(TypeRef::variable("T").erasure(), OBJECT);
        assert_eq!(TypeRef::array(TypeRef::variable("T")).erasure(), "java.lang.Object[]");
        assert_eq!(
            TypeRef::generic("java.util.List", vec![TypeRef::variable("T")]).erasure(),
            "java.util.List"
        );
    }

    #[test]
    fn test_substitute() {
        let mut bindings = FxHashMap::default();
        bindings.insert(Arc::from("T"), TypeRef::named("java.lang.String"));

        let resolved = TypeRef::array(TypeRef::variable("T")).substitute(&bindings);
        assert_eq!(resolved.erasure(), "java.lang.String[]");
        assert_eq!(TypeRef::variable("U").substitute(&bindings), TypeRef::variable("U"));
    }

    #[test]
    fn test_superclass_name_skips_object() {
        let plain = ClassType::new("demo.A").extends(TypeRef::named(OBJECT));
        assert!(plain.superclass_name().is_none());

        let child = ClassType::new("demo.B").extends(TypeRef::named("demo.A"));
        assert_eq!(child.superclass_name().map(|n| &**n), Some("demo.A"));
    }
}
