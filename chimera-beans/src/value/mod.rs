//! 运行时值模型
//!
//! 属性访问引擎只认识一组固定的值形态：标量、数组、列表、集合、映射、Bean 以及宿主定义的不透明值。
//! 容器和 Bean 都是共享引用，读取出来之后可以原地修改。

pub mod managed;
pub mod types;

pub use managed::{ManagedList, ManagedMap, ManagedSet, ManagedValue, Mergeable};
pub use types::{OpaqueType, PrimitiveKind, ValueType};

use crate::class::{BeanRef, InvokeError};
use indexmap::{IndexMap, IndexSet};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// 共享可变容器
pub struct Shared<T>(Arc<RwLock<T>>);

impl<T> Shared<T> {
    pub fn new(value: T) -> Self {
        Self(Arc::new(RwLock::new(value)))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.0.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.0.write()
    }

    pub fn try_read(&self) -> Option<RwLockReadGuard<'_, T>> {
        self.0.try_read()
    }

    /// 是否指向同一个容器
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

/// 定长数组
#[derive(Clone, PartialEq, Eq)]
pub struct ArrayValue {
    pub element_type: ValueType,
    pub items: Vec<Value>,
}

impl ArrayValue {
    pub fn new(element_type: ValueType, items: Vec<Value>) -> Self {
        Self {
            element_type,
            items,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// 有序列表
#[derive(Clone, PartialEq, Eq)]
pub struct ListValue {
    pub element_type: ValueType,
    pub items: Vec<Value>,
    /// 是否接受 null 元素
    pub allows_null: bool,
}

impl ListValue {
    pub fn new(element_type: ValueType) -> Self {
        Self {
            element_type,
            items: Vec::new(),
            allows_null: true,
        }
    }

    pub fn with_items(element_type: ValueType, items: Vec<Value>) -> Self {
        Self {
            element_type,
            items,
            allows_null: true,
        }
    }

    /// 不接受 null 元素的列表
    pub fn rejecting_null(mut self) -> Self {
        self.allows_null = false;
        self
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// 无位置索引的集合，迭代顺序为插入顺序
#[derive(Clone, PartialEq, Eq)]
pub struct SetValue {
    pub element_type: ValueType,
    pub items: IndexSet<Value>,
}

impl SetValue {
    pub fn new(element_type: ValueType) -> Self {
        Self {
            element_type,
            items: IndexSet::new(),
        }
    }

    pub fn with_items(element_type: ValueType, items: impl IntoIterator<Item = Value>) -> Self {
        Self {
            element_type,
            items: items.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// 键值映射，迭代顺序为插入顺序
#[derive(Clone, PartialEq, Eq)]
pub struct MapValue {
    pub key_type: ValueType,
    pub value_type: ValueType,
    pub entries: IndexMap<Value, Value>,
}

impl MapValue {
    pub fn new(key_type: ValueType, value_type: ValueType) -> Self {
        Self {
            key_type,
            value_type,
            entries: IndexMap::new(),
        }
    }

    pub fn with_entries(
        key_type: ValueType,
        value_type: ValueType,
        entries: impl IntoIterator<Item = (Value, Value)>,
    ) -> Self {
        Self {
            key_type,
            value_type,
            entries: entries.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub type ArrayRef = Shared<ArrayValue>;
pub type ListRef = Shared<ListValue>;
pub type SetRef = Shared<SetValue>;
pub type MapRef = Shared<MapValue>;

/// 宿主定义的不透明值
#[derive(Clone)]
pub struct OpaqueValue {
    ty: OpaqueType,
    inner: Arc<dyn Any + Send + Sync>,
    text: String,
}

impl OpaqueValue {
    pub fn new<T: Any + Send + Sync>(ty: OpaqueType, value: T, text: impl Into<String>) -> Self {
        Self {
            ty,
            inner: Arc::new(value),
            text: text.into(),
        }
    }

    pub fn opaque_type(&self) -> OpaqueType {
        self.ty
    }

    /// 规范文本形式
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }
}

/// 容器形态，索引访问按形态分派
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Array,
    List,
    Set,
    Map,
    Scalar,
}

/// 运行时值
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Char(char),
    Str(String),
    Array(ArrayRef),
    List(ListRef),
    Set(SetRef),
    Map(MapRef),
    Bean(BeanRef),
    Opaque(OpaqueValue),
    /// 支持合并的托管集合，转换前会被物化为普通容器
    Managed(Arc<ManagedValue>),
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    pub fn array(element_type: ValueType, items: Vec<Value>) -> Self {
        Value::Array(Shared::new(ArrayValue::new(element_type, items)))
    }

    pub fn list(element_type: ValueType, items: Vec<Value>) -> Self {
        Value::List(Shared::new(ListValue::with_items(element_type, items)))
    }

    pub fn set(element_type: ValueType, items: impl IntoIterator<Item = Value>) -> Self {
        Value::Set(Shared::new(SetValue::with_items(element_type, items)))
    }

    pub fn map(
        key_type: ValueType,
        value_type: ValueType,
        entries: impl IntoIterator<Item = (Value, Value)>,
    ) -> Self {
        Value::Map(Shared::new(MapValue::with_entries(
            key_type, value_type, entries,
        )))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bean(&self) -> Option<&BeanRef> {
        match self {
            Value::Bean(bean) => Some(bean),
            _ => None,
        }
    }

    pub fn shape(&self) -> Shape {
        match self {
            Value::Array(_) => Shape::Array,
            Value::List(_) => Shape::List,
            Value::Set(_) => Shape::Set,
            Value::Map(_) => Shape::Map,
            _ => Shape::Scalar,
        }
    }

    /// 原始类型或其包装类型的值
    pub fn primitive_kind(&self) -> Option<PrimitiveKind> {
        match self {
            Value::Bool(_) => Some(PrimitiveKind::Bool),
            Value::Byte(_) => Some(PrimitiveKind::Byte),
            Value::Short(_) => Some(PrimitiveKind::Short),
            Value::Int(_) => Some(PrimitiveKind::Int),
            Value::Long(_) => Some(PrimitiveKind::Long),
            Value::Float(_) => Some(PrimitiveKind::Float),
            Value::Double(_) => Some(PrimitiveKind::Double),
            Value::Char(_) => Some(PrimitiveKind::Char),
            _ => None,
        }
    }

    pub fn is_number(&self) -> bool {
        self.primitive_kind().map_or(false, PrimitiveKind::is_numeric)
    }

    /// 运行时类型；null 与托管值没有运行时类型
    pub fn value_type(&self) -> Option<ValueType> {
        Some(match self {
            Value::Null | Value::Managed(_) => return None,
            Value::Str(_) => ValueType::String,
            Value::Array(a) => ValueType::array_of(a.read().element_type.clone()),
            Value::List(l) => ValueType::list_of(l.read().element_type.clone()),
            Value::Set(s) => ValueType::set_of(s.read().element_type.clone()),
            Value::Map(m) => {
                let m = m.read();
                ValueType::map_of(m.key_type.clone(), m.value_type.clone())
            }
            Value::Bean(bean) => ValueType::Bean(bean.bean_class()),
            Value::Opaque(o) => ValueType::Opaque(o.ty),
            scalar => ValueType::Boxed(scalar.primitive_kind()?),
        })
    }

    /// 用于错误信息的类型描述
    pub fn type_name(&self) -> String {
        match self.value_type() {
            Some(ty) => ty.to_string(),
            None if self.is_null() => "null".to_string(),
            None => "Managed".to_string(),
        }
    }

    /// 是否为同一个实例：引用类型比较指针，标量比较值
    pub fn same_instance(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
            (Value::List(a), Value::List(b)) => a.ptr_eq(b),
            (Value::Set(a), Value::Set(b)) => a.ptr_eq(b),
            (Value::Map(a), Value::Map(b)) => a.ptr_eq(b),
            (Value::Bean(a), Value::Bean(b)) => a.ptr_eq(b),
            (Value::Managed(a), Value::Managed(b)) => Arc::ptr_eq(a, b),
            (Value::Opaque(a), Value::Opaque(b)) => Arc::ptr_eq(&a.inner, &b.inner),
            (a, b) => a == b,
        }
    }

    /// 整数值（包括 byte/short/int/long）
    pub fn as_i128(&self) -> Option<i128> {
        match *self {
            Value::Byte(v) => Some(v as i128),
            Value::Short(v) => Some(v as i128),
            Value::Int(v) => Some(v as i128),
            Value::Long(v) => Some(v as i128),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Float(v) => Some(v as f64),
            Value::Double(v) => Some(v),
            _ => self.as_i128().map(|v| v as f64),
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Byte(a), Value::Byte(b)) => a == b,
            (Value::Short(a), Value::Short(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b) || a.read().items == b.read().items,
            (Value::List(a), Value::List(b)) => a.ptr_eq(b) || a.read().items == b.read().items,
            (Value::Set(a), Value::Set(b)) => a.ptr_eq(b) || a.read().items == b.read().items,
            (Value::Map(a), Value::Map(b)) => a.ptr_eq(b) || a.read().entries == b.read().entries,
            (Value::Bean(a), Value::Bean(b)) => a.ptr_eq(b),
            (Value::Opaque(a), Value::Opaque(b)) => a.ty == b.ty && a.text == b.text,
            (Value::Managed(a), Value::Managed(b)) => Arc::ptr_eq(a, b) || a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Bool(v) => v.hash(state),
            Value::Byte(v) => v.hash(state),
            Value::Short(v) => v.hash(state),
            Value::Int(v) => v.hash(state),
            Value::Long(v) => v.hash(state),
            Value::Float(v) => v.to_bits().hash(state),
            Value::Double(v) => v.to_bits().hash(state),
            Value::Char(v) => v.hash(state),
            Value::Str(v) => v.hash(state),
            Value::Array(a) => a.read().items.hash(state),
            Value::List(l) => l.read().items.hash(state),
            Value::Set(s) => s.read().len().hash(state),
            Value::Map(m) => m.read().len().hash(state),
            Value::Bean(b) => b.identity().hash(state),
            Value::Opaque(o) => {
                o.ty.hash(state);
                o.text.hash(state);
            }
            Value::Managed(m) => m.len().hash(state),
        }
    }
}

fn write_float(f: &mut fmt::Formatter<'_>, v: f64) -> fmt::Result {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e16 {
        write!(f, "{:.1}", v)
    } else {
        write!(f, "{}", v)
    }
}

fn write_items<'a>(
    f: &mut fmt::Formatter<'_>,
    items: impl IntoIterator<Item = &'a Value>,
) -> fmt::Result {
    write!(f, "[")?;
    for (i, item) in items.into_iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    write!(f, "]")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Byte(v) => write!(f, "{}", v),
            Value::Short(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Long(v) => write!(f, "{}", v),
            Value::Float(v) => write_float(f, *v as f64),
            Value::Double(v) => write_float(f, *v),
            Value::Char(v) => write!(f, "{}", v),
            Value::Str(v) => write!(f, "{}", v),
            Value::Array(a) => match a.try_read() {
                Some(a) => write_items(f, &a.items),
                None => write!(f, "[<locked>]"),
            },
            Value::List(l) => match l.try_read() {
                Some(l) => write_items(f, &l.items),
                None => write!(f, "[<locked>]"),
            },
            Value::Set(s) => match s.try_read() {
                Some(s) => write_items(f, &s.items),
                None => write!(f, "[<locked>]"),
            },
            Value::Map(m) => match m.try_read() {
                Some(m) => {
                    write!(f, "{{")?;
                    for (i, (k, v)) in m.entries.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}={}", k, v)?;
                    }
                    write!(f, "}}")
                }
                None => write!(f, "{{<locked>}}"),
            },
            Value::Bean(b) => write!(f, "{}@{:x}", b.bean_class().name(), b.identity()),
            Value::Opaque(o) => write!(f, "{}", o.text),
            Value::Managed(m) => write!(f, "{:?}", m),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Char(c) => write!(f, "{:?}", c),
            Value::Null => write!(f, "Null"),
            other => fmt::Display::fmt(other, f),
        }
    }
}

macro_rules! impl_value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

impl_value_from! {
    bool => Bool,
    i8 => Byte,
    i16 => Short,
    i32 => Int,
    i64 => Long,
    f32 => Float,
    f64 => Double,
    char => Char,
    String => Str,
    BeanRef => Bean,
    OpaqueValue => Opaque,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

macro_rules! impl_try_from_value {
    ($($ty:ty => $variant:ident, $expected:expr);* $(;)?) => {
        $(
            impl TryFrom<Value> for $ty {
                type Error = InvokeError;

                fn try_from(value: Value) -> Result<Self, Self::Error> {
                    match value {
                        Value::$variant(v) => Ok(v),
                        other => Err(InvokeError::class_cast($expected, &other)),
                    }
                }
            }
        )*
    };
}

impl_try_from_value! {
    bool => Bool, "Boolean";
    i8 => Byte, "Byte";
    i16 => Short, "Short";
    i32 => Int, "Integer";
    i64 => Long, "Long";
    f32 => Float, "Float";
    f64 => Double, "Double";
    char => Char, "Character";
    String => Str, "String";
    BeanRef => Bean, "Bean";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_equality_and_identity() {
        let a = Value::list(ValueType::String, vec![Value::from("x")]);
        let b = Value::list(ValueType::String, vec![Value::from("x")]);
        assert_eq!(a, b);
        assert!(!a.same_instance(&b));
        assert!(a.same_instance(&a.clone()));
        assert_ne!(Value::Int(1), Value::Long(1));
    }

    #[test]
    fn test_display_follows_java_to_string() {
        assert_eq!(Value::Double(1.0).to_string(), "1.0");
        assert_eq!(Value::Int(42).to_string(), "42");
        let map = Value::map(
            ValueType::String,
            ValueType::Boxed(PrimitiveKind::Int),
            vec![(Value::from("a"), Value::Int(1))],
        );
        assert_eq!(map.to_string(), "{a=1}");
    }

    #[test]
    fn test_runtime_type() {
        assert_eq!(
            Value::Int(3).value_type(),
            Some(ValueType::Boxed(PrimitiveKind::Int))
        );
        assert_eq!(Value::Null.value_type(), None);
        assert_eq!(Value::Int(3).shape(), Shape::Scalar);
        assert_eq!(
            Value::array(ValueType::String, Vec::new()).shape(),
            Shape::Array
        );
    }

    #[test]
    fn test_try_from_reports_class_cast() {
        assert_eq!(i32::try_from(Value::Int(7)).unwrap(), 7);
        assert!(matches!(
            String::try_from(Value::Int(7)),
            Err(InvokeError::ClassCast { .. })
        ));
    }
}
