//! Attribute values and their declared types

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::annotation::Annotation;

/// Fully qualified name of a class, enum or annotation type
pub type TypeName = Arc<str>;

/// Declared type of an annotation attribute
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    /// `boolean`
    Boolean,
    /// `byte`
    Byte,
    /// `char`
    Char,
    /// `short`
    Short,
    /// `int`
    Int,
    /// `long`
    Long,
    /// `float`
    Float,
    /// `double`
    Double,
    /// `String`
    String,
    /// `Class`
    Class,
    /// An enum type
    Enum(TypeName),
    /// A nested annotation type
    Annotation(TypeName),
    /// An array of the component type
    Array(Box<ValueType>),
}

impl ValueType {
    /// Create an array type
    pub fn array_of(component: ValueType) -> Self {
        ValueType::Array(Box::new(component))
    }

    /// Whether this is an array type
    pub fn is_array(&self) -> bool {
        matches!(self, ValueType::Array(_))
    }

    /// Component type of an array type
    pub fn component_type(&self) -> Option<&ValueType> {
        match self {
            ValueType::Array(component) => Some(component),
            _ => None,
        }
    }

    /// The type itself, or its component type for arrays
    pub fn element_type(&self) -> &ValueType {
        self.component_type().unwrap_or(self)
    }

    /// Nested annotation type for scalar or array annotation attributes
    pub fn nested_annotation_type(&self) -> Option<&TypeName> {
        match self.element_type() {
            ValueType::Annotation(name) => Some(name),
            _ => None,
        }
    }

    /// Whether values of this type may reference types that fail to load
    pub fn may_reference_unloadable_type(&self) -> bool {
        match self {
            ValueType::Class | ValueType::Enum(_) => true,
            ValueType::Array(component) => matches!(**component, ValueType::Class),
            _ => false,
        }
    }

    /// Check whether a value is an instance of this type
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (ValueType::Boolean, Value::Boolean(_))
            | (ValueType::Byte, Value::Byte(_))
            | (ValueType::Char, Value::Char(_))
            | (ValueType::Short, Value::Short(_))
            | (ValueType::Int, Value::Int(_))
            | (ValueType::Long, Value::Long(_))
            | (ValueType::Float, Value::Float(_))
            | (ValueType::Double, Value::Double(_))
            | (ValueType::String, Value::String(_))
            | (ValueType::Class, Value::Class(_)) => true,
            (ValueType::Enum(expected), Value::Enum { enum_type, .. }) => expected == enum_type,
            (ValueType::Annotation(expected), Value::Annotation(annotation)) => {
                expected == annotation.annotation_type()
            }
            (ValueType::Array(component), Value::Array(items)) => {
                items.iter().all(|item| component.accepts(item))
            }
            _ => false,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Boolean => write!(f, "boolean"),
            ValueType::Byte => write!(f, "byte"),
            ValueType::Char => write!(f, "char"),
            ValueType::Short => write!(f, "short"),
            ValueType::Int => write!(f, "int"),
            ValueType::Long => write!(f, "long"),
            ValueType::Float => write!(f, "float"),
            ValueType::Double => write!(f, "double"),
            ValueType::String => write!(f, "java.lang.String"),
            ValueType::Class => write!(f, "java.lang.Class"),
            ValueType::Enum(name) | ValueType::Annotation(name) => write!(f, "{}", name),
            ValueType::Array(component) => write!(f, "{}[]", component),
        }
    }
}

/// A concrete attribute value
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// `boolean` value
    Boolean(bool),
    /// `byte` value
    Byte(i8),
    /// `char` value
    Char(char),
    /// `short` value
    Short(i16),
    /// `int` value
    Int(i32),
    /// `long` value
    Long(i64),
    /// `float` value
    Float(f32),
    /// `double` value
    Double(f64),
    /// `String` value
    String(Arc<str>),
    /// `Class` value, by name
    Class(TypeName),
    /// Enum constant
    Enum {
        /// Enum type name
        enum_type: TypeName,
        /// Constant name
        constant: Arc<str>,
    },
    /// Nested annotation
    Annotation(Annotation),
    /// Array of values
    Array(Vec<Value>),
}

impl Value {
    /// Create a string value
    pub fn string(value: &str) -> Self {
        Value::String(Arc::from(value))
    }

    /// Create a class value
    pub fn class(name: &str) -> Self {
        Value::Class(Arc::from(name))
    }

    /// Create an enum constant value
    pub fn enum_constant(enum_type: &str, constant: &str) -> Self {
        Value::Enum {
            enum_type: Arc::from(enum_type),
            constant: Arc::from(constant),
        }
    }

    /// Create an array value
    pub fn array(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Array(items.into_iter().collect())
    }

    /// Create a string array value
    pub fn strings<'a>(items: impl IntoIterator<Item = &'a str>) -> Self {
        Value::Array(items.into_iter().map(Value::string).collect())
    }

    /// String contents, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Boolean contents, if this is a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Int contents, if this is an int
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Class name, if this is a class value
    pub fn as_class(&self) -> Option<&TypeName> {
        match self {
            Value::Class(name) => Some(name),
            _ => None,
        }
    }

    /// Nested annotation, if this is one
    pub fn as_annotation(&self) -> Option<&Annotation> {
        match self {
            Value::Annotation(annotation) => Some(annotation),
            _ => None,
        }
    }

    /// Array items, if this is an array
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Whether this is an array value
    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    /// Short name of the runtime shape, used in diagnostics
    pub fn kind_name(&self) -> String {
        match self {
            Value::Boolean(_) => "boolean".to_string(),
            Value::Byte(_) => "byte".to_string(),
            Value::Char(_) => "char".to_string(),
            Value::Short(_) => "short".to_string(),
            Value::Int(_) => "int".to_string(),
            Value::Long(_) => "long".to_string(),
            Value::Float(_) => "float".to_string(),
            Value::Double(_) => "double".to_string(),
            Value::String(_) => "java.lang.String".to_string(),
            Value::Class(_) => "java.lang.Class".to_string(),
            Value::Enum { enum_type, .. } => enum_type.to_string(),
            Value::Annotation(annotation) => annotation.annotation_type().to_string(),
            Value::Array(items) => match items.first() {
                Some(first) => format!("{}[]", first.kind_name()),
                None => "java.lang.Object[]".to_string(),
            },
        }
    }

    /// Hash code following the JVM rules for boxed values and arrays
    pub fn java_hash_code(&self) -> i32 {
        match self {
            Value::Boolean(b) => {
                if *b {
                    1231
                } else {
                    1237
                }
            }
            Value::Byte(v) => *v as i32,
            Value::Char(c) => *c as u32 as i32,
            Value::Short(v) => *v as i32,
            Value::Int(v) => *v,
            Value::Long(v) => fold_long(*v as u64),
            Value::Float(v) => {
                if v.is_nan() {
                    0x7fc0_0000
                } else {
                    v.to_bits() as i32
                }
            }
            Value::Double(v) => {
                if v.is_nan() {
                    fold_long(0x7ff8_0000_0000_0000)
                } else {
                    fold_long(v.to_bits())
                }
            }
            Value::String(s) => java_string_hash(s),
            Value::Class(name) => java_string_hash(name),
            Value::Enum { constant, .. } => java_string_hash(constant),
            Value::Annotation(annotation) => annotation.hash_code(),
            Value::Array(items) => items.iter().fold(1i32, |acc, item| {
                acc.wrapping_mul(31).wrapping_add(item.java_hash_code())
            }),
        }
    }
}

fn fold_long(bits: u64) -> i32 {
    (bits ^ (bits >> 32)) as i32
}

/// `String.hashCode()` over UTF-16 code units
pub fn java_string_hash(s: &str) -> i32 {
    s.encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(unit as i32))
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Byte(a), Value::Byte(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Short(a), Value::Short(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            // Bitwise, so NaN equals NaN as boxed floats do
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Class(a), Value::Class(b)) => a == b,
            (
                Value::Enum { enum_type: t1, constant: c1 },
                Value::Enum { enum_type: t2, constant: c2 },
            ) => t1 == t2 && c1 == c2,
            (Value::Annotation(a), Value::Annotation(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.java_hash_code().hash(state);
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Byte(v) => write!(f, "(byte) 0x{:02X}", *v as u8),
            Value::Char(c) => write!(f, "'{}'", c.escape_default()),
            Value::Short(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Long(v) => write!(f, "{}L", v),
            Value::Float(v) => write!(f, "{:?}f", v),
            Value::Double(v) => write!(f, "{:?}", v),
            Value::String(s) => write!(f, "\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
            Value::Class(name) => write!(f, "{}.class", name),
            Value::Enum { constant, .. } => write!(f, "{}", constant),
            Value::Annotation(annotation) => write!(f, "{}", annotation),
            Value::Array(items) => {
                write!(f, "{{")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Long(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::string(value)
    }
}

impl From<Annotation> for Value {
    fn from(value: Annotation) -> Self {
        Value::Annotation(value)
    }
}
