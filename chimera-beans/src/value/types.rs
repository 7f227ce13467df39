//! 声明类型
//!
//! [`ValueType`] 描述属性的声明类型，包括泛型元素类型。赋值兼容性按类型擦除后的规则判断：
//! 原始类型与包装类型互通，数组协变，Bean 类型沿父类和接口链判断。

use crate::class::ClassRef;
use crate::error::{BeansError, BeansResult};
use crate::value::{ArrayValue, ListValue, MapValue, SetValue, Shared, Value};
use std::fmt;

/// 原始类型种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Bool,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    Char,
}

impl PrimitiveKind {
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Bool => "boolean",
            PrimitiveKind::Byte => "byte",
            PrimitiveKind::Short => "short",
            PrimitiveKind::Int => "int",
            PrimitiveKind::Long => "long",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Double => "double",
            PrimitiveKind::Char => "char",
        }
    }

    pub fn wrapper_name(self) -> &'static str {
        match self {
            PrimitiveKind::Bool => "Boolean",
            PrimitiveKind::Byte => "Byte",
            PrimitiveKind::Short => "Short",
            PrimitiveKind::Int => "Integer",
            PrimitiveKind::Long => "Long",
            PrimitiveKind::Float => "Float",
            PrimitiveKind::Double => "Double",
            PrimitiveKind::Char => "Character",
        }
    }

    pub fn is_numeric(self) -> bool {
        !matches!(self, PrimitiveKind::Bool | PrimitiveKind::Char)
    }

    /// 零值
    pub fn zero(self) -> Value {
        match self {
            PrimitiveKind::Bool => Value::Bool(false),
            PrimitiveKind::Byte => Value::Byte(0),
            PrimitiveKind::Short => Value::Short(0),
            PrimitiveKind::Int => Value::Int(0),
            PrimitiveKind::Long => Value::Long(0),
            PrimitiveKind::Float => Value::Float(0.0),
            PrimitiveKind::Double => Value::Double(0.0),
            PrimitiveKind::Char => Value::Char('\0'),
        }
    }

    pub const ALL: [PrimitiveKind; 8] = [
        PrimitiveKind::Bool,
        PrimitiveKind::Byte,
        PrimitiveKind::Short,
        PrimitiveKind::Int,
        PrimitiveKind::Long,
        PrimitiveKind::Float,
        PrimitiveKind::Double,
        PrimitiveKind::Char,
    ];
}

/// 不透明值类型
///
/// 由宿主定义的值类型，例如路径、URL、正则表达式。按名称区分。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpaqueType {
    name: &'static str,
}

impl OpaqueType {
    pub const PATH: OpaqueType = OpaqueType::new("std::path::PathBuf");
    pub const URL: OpaqueType = OpaqueType::new("url::Url");
    pub const LOCALE: OpaqueType = OpaqueType::new("Locale");
    pub const PATTERN: OpaqueType = OpaqueType::new("regex::Regex");
    pub const CHARSET: OpaqueType = OpaqueType::new("Charset");
    pub const UUID: OpaqueType = OpaqueType::new("uuid::Uuid");
    pub const CLASS_LOADER: OpaqueType = OpaqueType::new("ClassLoader");
    pub const PROTECTION_DOMAIN: OpaqueType = OpaqueType::new("ProtectionDomain");

    pub const fn new(name: &'static str) -> Self {
        Self { name }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// 声明类型
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// 根类型，任何值都可以赋给它
    Any,
    Primitive(PrimitiveKind),
    /// 可为 null 的包装类型
    Boxed(PrimitiveKind),
    String,
    Array(Box<ValueType>),
    List(Box<ValueType>),
    Set(Box<ValueType>),
    Map(Box<ValueType>, Box<ValueType>),
    Bean(ClassRef),
    Opaque(OpaqueType),
    /// 尚未解析的泛型类型变量
    Variable(String),
}

impl ValueType {
    pub fn array_of(element: ValueType) -> Self {
        ValueType::Array(Box::new(element))
    }

    pub fn list_of(element: ValueType) -> Self {
        ValueType::List(Box::new(element))
    }

    pub fn set_of(element: ValueType) -> Self {
        ValueType::Set(Box::new(element))
    }

    pub fn map_of(key: ValueType, value: ValueType) -> Self {
        ValueType::Map(Box::new(key), Box::new(value))
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, ValueType::Primitive(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, ValueType::Array(_))
    }

    /// List 或 Set
    pub fn is_collection(&self) -> bool {
        matches!(self, ValueType::List(_) | ValueType::Set(_))
    }

    pub fn is_map(&self) -> bool {
        matches!(self, ValueType::Map(..))
    }

    pub fn is_interface(&self) -> bool {
        match self {
            ValueType::Bean(class) => class.is_interface(),
            ValueType::List(_) | ValueType::Set(_) | ValueType::Map(..) => true,
            _ => false,
        }
    }

    /// 擦除泛型参数后的类型，用作编辑器查找的键
    ///
    /// 数组保留元素类型，集合与映射的类型参数统一擦除为 `Any`，类型变量擦除为 `Any`。
    pub fn erased(&self) -> ValueType {
        match self {
            ValueType::Array(element) => ValueType::Array(Box::new(element.erased())),
            ValueType::List(_) => ValueType::list_of(ValueType::Any),
            ValueType::Set(_) => ValueType::set_of(ValueType::Any),
            ValueType::Map(..) => ValueType::map_of(ValueType::Any, ValueType::Any),
            ValueType::Variable(_) => ValueType::Any,
            other => other.clone(),
        }
    }

    /// 元素类型：数组/集合的元素，映射的值
    pub fn element_type(&self) -> Option<&ValueType> {
        match self {
            ValueType::Array(e) | ValueType::List(e) | ValueType::Set(e) => Some(e),
            ValueType::Map(_, v) => Some(v),
            _ => None,
        }
    }

    /// 连续应用 `level` 次索引或键之后到达的类型
    pub fn nested(&self, level: usize) -> Option<ValueType> {
        let mut current = self;
        for _ in 0..level {
            current = current.element_type()?;
        }
        Some(current.clone())
    }

    /// 第 `level` 次键访问所作用的映射的键类型（`level` 从 1 开始）
    pub fn map_key_type(&self, level: usize) -> Option<ValueType> {
        match self.nested(level.saturating_sub(1))? {
            ValueType::Map(key, _) => Some(*key),
            _ => None,
        }
    }

    /// `self = other` 是否合法（擦除泛型）
    pub fn is_assignable_from(&self, other: &ValueType) -> bool {
        match (self, other) {
            (ValueType::Any, _) | (ValueType::Variable(_), _) | (_, ValueType::Variable(_)) => true,
            (ValueType::Primitive(a), ValueType::Primitive(b))
            | (ValueType::Primitive(a), ValueType::Boxed(b))
            | (ValueType::Boxed(a), ValueType::Primitive(b))
            | (ValueType::Boxed(a), ValueType::Boxed(b)) => a == b,
            (ValueType::String, ValueType::String) => true,
            (ValueType::Array(a), ValueType::Array(b)) => {
                if a.is_primitive() || b.is_primitive() {
                    a == b
                } else {
                    a.is_assignable_from(b)
                }
            }
            (ValueType::List(_), ValueType::List(_))
            | (ValueType::Set(_), ValueType::Set(_))
            | (ValueType::Map(..), ValueType::Map(..)) => true,
            (ValueType::Bean(a), ValueType::Bean(b)) => b.is_subclass_of(a),
            (ValueType::Opaque(a), ValueType::Opaque(b)) => a == b,
            _ => false,
        }
    }

    /// `value` 是否可以直接赋给该类型；null 可以赋给任何非原始类型
    pub fn is_instance(&self, value: &Value) -> bool {
        match value {
            Value::Null => !self.is_primitive(),
            Value::Managed(_) => false,
            other => match other.value_type() {
                Some(actual) => self.is_assignable_from(&actual),
                None => false,
            },
        }
    }

    /// 为自动增长合成该类型的默认实例
    pub fn new_value(&self) -> BeansResult<Value> {
        match self {
            ValueType::Array(element) => {
                let items = match element.as_ref() {
                    ValueType::Array(inner) => vec![Value::Array(Shared::new(ArrayValue::new(
                        (**inner).clone(),
                        Vec::new(),
                    )))],
                    _ => Vec::new(),
                };
                Ok(Value::Array(Shared::new(ArrayValue::new(
                    (**element).clone(),
                    items,
                ))))
            }
            ValueType::List(element) => Ok(Value::List(Shared::new(ListValue::new(
                (**element).clone(),
            )))),
            ValueType::Set(element) => Ok(Value::Set(Shared::new(SetValue::new(
                (**element).clone(),
            )))),
            ValueType::Map(key, value) => Ok(Value::Map(Shared::new(MapValue::new(
                (**key).clone(),
                (**value).clone(),
            )))),
            ValueType::String => Ok(Value::Str(String::new())),
            ValueType::Primitive(kind) => Ok(kind.zero()),
            ValueType::Bean(class) => class.instantiate().map(Value::Bean),
            other => Err(BeansError::fatal(format!(
                "Cannot instantiate type [{}]: no default constructor",
                other
            ))),
        }
    }

    /// 数组写入时填补空位使用的值
    pub fn gap_value(&self) -> Value {
        self.new_value().unwrap_or(Value::Null)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Any => write!(f, "Object"),
            ValueType::Primitive(kind) => write!(f, "{}", kind.name()),
            ValueType::Boxed(kind) => write!(f, "{}", kind.wrapper_name()),
            ValueType::String => write!(f, "String"),
            ValueType::Array(element) => write!(f, "{}[]", element),
            ValueType::List(element) => write!(f, "List<{}>", element),
            ValueType::Set(element) => write!(f, "Set<{}>", element),
            ValueType::Map(key, value) => write!(f, "Map<{}, {}>", key, value),
            ValueType::Bean(class) => write!(f, "{}", class.name()),
            ValueType::Opaque(ty) => write!(f, "{}", ty.name()),
            ValueType::Variable(name) => write!(f, "{}", name),
        }
    }
}

impl fmt::Debug for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_and_wrapper_are_interchangeable() {
        let int = ValueType::Primitive(PrimitiveKind::Int);
        let integer = ValueType::Boxed(PrimitiveKind::Int);
        assert!(int.is_assignable_from(&integer));
        assert!(integer.is_assignable_from(&int));
        assert!(!int.is_assignable_from(&ValueType::Boxed(PrimitiveKind::Long)));
    }

    #[test]
    fn test_null_is_not_a_primitive_instance() {
        assert!(!ValueType::Primitive(PrimitiveKind::Int).is_instance(&Value::Null));
        assert!(ValueType::Boxed(PrimitiveKind::Int).is_instance(&Value::Null));
        assert!(ValueType::String.is_instance(&Value::Null));
    }

    #[test]
    fn test_generics_are_erased() {
        let strings = ValueType::list_of(ValueType::String);
        let ints = ValueType::list_of(ValueType::Primitive(PrimitiveKind::Int));
        assert!(strings.is_assignable_from(&ints));
        assert_eq!(strings.erased(), ints.erased());
        assert_ne!(
            ValueType::array_of(ValueType::String).erased(),
            ValueType::array_of(ValueType::Primitive(PrimitiveKind::Int)).erased()
        );
    }

    #[test]
    fn test_nested_types() {
        let ty = ValueType::map_of(
            ValueType::String,
            ValueType::list_of(ValueType::Boxed(PrimitiveKind::Long)),
        );
        assert_eq!(
            ty.nested(1),
            Some(ValueType::list_of(ValueType::Boxed(PrimitiveKind::Long)))
        );
        assert_eq!(ty.nested(2), Some(ValueType::Boxed(PrimitiveKind::Long)));
        assert_eq!(ty.nested(3), None);
        assert_eq!(ty.map_key_type(1), Some(ValueType::String));
        assert_eq!(ty.map_key_type(2), None);
    }

    #[test]
    fn test_new_value_for_nested_array() {
        let ty = ValueType::array_of(ValueType::array_of(ValueType::String));
        match ty.new_value().unwrap() {
            Value::Array(outer) => {
                let outer = outer.read();
                assert_eq!(outer.len(), 1);
                assert!(matches!(&outer.items[0], Value::Array(inner) if inner.read().is_empty()));
            }
            other => panic!("unexpected value {:?}", other),
        }
        assert!(ValueType::Boxed(PrimitiveKind::Int).new_value().is_err());
        assert_eq!(
            ValueType::Primitive(PrimitiveKind::Long).new_value().unwrap(),
            Value::Long(0)
        );
    }
}
