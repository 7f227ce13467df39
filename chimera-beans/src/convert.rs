//! 类型转换
//!
//! [`TypeConverterDelegate`] 把原始值转换为属性的声明类型：先找自定义编辑器，没有时交给
//! [`ConversionService`]，再退回默认编辑器，最后对数组、集合、映射和数字做标准转换。

use crate::editor::{convert_number, EditorHandle, PropertyEditorRegistry};
use crate::error::{BeansError, BeansResult};
use crate::value::{ListValue, MapValue, SetValue, Shape, Shared, Value, ValueType};
use anyhow::anyhow;
use std::sync::Arc;

/// 类型转换服务
pub trait ConversionService: Send + Sync {
    /// 是否能把 `source` 类型的值转换为 `target`；`source` 为 None 表示 null
    fn can_convert(&self, source: Option<&ValueType>, target: &ValueType) -> bool;

    fn convert(&self, value: &Value, target: &ValueType) -> anyhow::Result<Value>;
}

type ConverterFn = dyn Fn(&Value, &ValueType) -> anyhow::Result<Value> + Send + Sync;

struct ConverterEntry {
    source: ValueType,
    target: ValueType,
    convert: Arc<ConverterFn>,
}

/// 基于闭包的转换服务，后注册的转换器优先
#[derive(Default)]
pub struct GenericConversionService {
    converters: Vec<ConverterEntry>,
}

impl GenericConversionService {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册 `source` 到 `target` 的转换器
    pub fn add_converter(
        &mut self,
        source: ValueType,
        target: ValueType,
        convert: impl Fn(&Value, &ValueType) -> anyhow::Result<Value> + Send + Sync + 'static,
    ) {
        tracing::debug!("Registering converter: {} -> {}", source, target);
        self.converters.push(ConverterEntry {
            source,
            target,
            convert: Arc::new(convert),
        });
    }

    pub fn with_converter(
        mut self,
        source: ValueType,
        target: ValueType,
        convert: impl Fn(&Value, &ValueType) -> anyhow::Result<Value> + Send + Sync + 'static,
    ) -> Self {
        self.add_converter(source, target, convert);
        self
    }

    fn find(&self, source: Option<&ValueType>, target: &ValueType) -> Option<&ConverterEntry> {
        self.converters.iter().rev().find(|entry| {
            target.is_assignable_from(&entry.target)
                && source.map_or(true, |s| entry.source.is_assignable_from(s))
        })
    }
}

impl ConversionService for GenericConversionService {
    fn can_convert(&self, source: Option<&ValueType>, target: &ValueType) -> bool {
        match source {
            None => true,
            Some(s) => target.is_assignable_from(s) || self.find(Some(s), target).is_some(),
        }
    }

    fn convert(&self, value: &Value, target: &ValueType) -> anyhow::Result<Value> {
        if target.is_instance(value) {
            return Ok(value.clone());
        }
        let source = value.value_type();
        let entry = self.find(source.as_ref(), target).ok_or_else(|| {
            anyhow!(
                "No converter found capable of converting from type [{}] to type [{}]",
                value.type_name(),
                target
            )
        })?;
        (entry.convert)(value, target)
    }
}

/// 转换失败
#[derive(Debug)]
pub struct ConversionFailure {
    pub message: String,
    /// 没有找到任何可用的编辑器或转换策略
    pub not_supported: bool,
    pub cause: Option<anyhow::Error>,
}

impl ConversionFailure {
    fn mismatch(message: impl Into<String>, cause: Option<anyhow::Error>) -> Self {
        Self {
            message: message.into(),
            not_supported: false,
            cause,
        }
    }

    fn from_cause(cause: anyhow::Error) -> Self {
        Self::mismatch(cause.to_string(), Some(cause))
    }

    /// 转换为带属性路径的类型不匹配错误
    pub fn into_type_mismatch(
        self,
        property_path: Option<&str>,
        value: Value,
        required_type: Option<&ValueType>,
    ) -> BeansError {
        let required = required_type.map(ToString::to_string).unwrap_or_default();
        let message = match property_path {
            Some(path) => format!(
                "Failed to convert property value of type '{}' to required type '{}' for property '{}'; {}",
                value.type_name(),
                required,
                path,
                self.message
            ),
            None => format!(
                "Failed to convert value of type '{}' to required type '{}'; {}",
                value.type_name(),
                required,
                self.message
            ),
        };
        BeansError::TypeMismatch {
            property_path: property_path.map(str::to_string),
            value,
            required_type: required_type.cloned(),
            message,
            not_supported: self.not_supported,
            cause: self.cause,
        }
    }
}

type ConversionResult<T> = Result<T, ConversionFailure>;

fn indexed_name(property_name: Option<&str>, index: usize) -> Option<String> {
    property_name.map(|name| format!("{}[{}]", name, index))
}

fn keyed_name(property_name: Option<&str>, key: &Value) -> Option<String> {
    property_name.map(|name| format!("{}[{}]", name, key))
}

/// 集合与映射的类型参数为 `Any` 时视为未声明
fn declared(ty: Option<&ValueType>) -> Option<&ValueType> {
    ty.filter(|t| !matches!(t, ValueType::Any | ValueType::Variable(_)))
}

/// 类型转换委托
pub struct TypeConverterDelegate<'a> {
    registry: &'a PropertyEditorRegistry,
    conversion_service: Option<&'a dyn ConversionService>,
}

impl<'a> TypeConverterDelegate<'a> {
    pub fn new(
        registry: &'a PropertyEditorRegistry,
        conversion_service: Option<&'a dyn ConversionService>,
    ) -> Self {
        Self {
            registry,
            conversion_service,
        }
    }

    /// 把值转换为所需类型
    ///
    /// `property_name` 用于查找按路径注册的编辑器；`old_value` 在文本转换前交给编辑器。
    pub fn convert_if_necessary(
        &self,
        property_name: Option<&str>,
        old_value: Option<&Value>,
        new_value: Value,
        required_type: Option<&ValueType>,
    ) -> ConversionResult<Value> {
        let new_value = match new_value {
            Value::Managed(managed) => managed.materialize(),
            other => other,
        };

        let editor = self.registry.find_custom_editor(required_type, property_name);

        let mut conversion_attempt: Option<anyhow::Error> = None;
        if let (None, Some(service), Some(required)) =
            (&editor, self.conversion_service, required_type)
        {
            if !new_value.is_null() && service.can_convert(new_value.value_type().as_ref(), required)
            {
                match service.convert(&new_value, required) {
                    Ok(converted) => return Ok(converted),
                    Err(e) => conversion_attempt = Some(e),
                }
            }
        }

        let mut converted = new_value.clone();
        let mut editor = editor;
        if editor.is_some() || required_type.map_or(false, |t| !t.is_instance(&converted)) {
            if editor.is_none() {
                editor = required_type.and_then(|t| self.registry.default_editor(t));
            }
            converted = self.do_convert_value(old_value, converted, required_type, editor.as_ref())?;
        }

        let Some(required) = required_type else {
            return Ok(converted);
        };

        let mut standard_conversion = false;
        if !converted.is_null() {
            if *required == ValueType::Any {
                return Ok(converted);
            }
            if let ValueType::Array(component) = required {
                return self.convert_to_typed_array(converted, property_name, component);
            }
            match converted.shape() {
                Shape::List | Shape::Set => {
                    converted = self.convert_to_typed_collection(converted, property_name, required)?;
                    standard_conversion = true;
                }
                Shape::Map => {
                    converted = self.convert_to_typed_map(converted, property_name, required)?;
                    standard_conversion = true;
                }
                _ => {}
            }
            if let Some(single) = single_array_element(&converted) {
                converted = single;
                standard_conversion = true;
            }
            if *required == ValueType::String && converted.primitive_kind().is_some() {
                return Ok(Value::Str(converted.to_string()));
            }
            if converted.is_number() {
                if let ValueType::Primitive(kind) | ValueType::Boxed(kind) = required {
                    if kind.is_numeric() {
                        converted = convert_number(&converted, *kind)
                            .map_err(ConversionFailure::from_cause)?;
                        standard_conversion = true;
                    }
                }
            }
        }

        if !required.is_instance(&converted) {
            if let Some(attempt) = conversion_attempt {
                return Err(ConversionFailure::from_cause(attempt));
            }
            if let Some(service) = self.conversion_service {
                if service.can_convert(new_value.value_type().as_ref(), required) {
                    return service
                        .convert(&new_value, required)
                        .map_err(ConversionFailure::from_cause);
                }
            }
            let mut message = format!(
                "Cannot convert value of type '{}' to required type '{}'",
                new_value.type_name(),
                required
            );
            if let Some(name) = property_name {
                message.push_str(&format!(" for property '{}'", name));
            }
            return Err(match editor {
                Some(editor) => ConversionFailure::mismatch(
                    format!(
                        "{}: PropertyEditor [{}] returned inappropriate value of type '{}'",
                        message,
                        editor.name(),
                        converted.type_name()
                    ),
                    None,
                ),
                None => ConversionFailure {
                    message: format!("{}: no matching editors or conversion strategy found", message),
                    not_supported: true,
                    cause: None,
                },
            });
        }

        if let Some(attempt) = conversion_attempt {
            if editor.is_none() && !standard_conversion && *required != ValueType::Any {
                return Err(ConversionFailure::from_cause(attempt));
            }
            tracing::debug!(
                "Original conversion service attempt failed - ignored since editor based conversion eventually succeeded: {}",
                attempt
            );
        }
        Ok(converted)
    }

    fn do_convert_value(
        &self,
        old_value: Option<&Value>,
        new_value: Value,
        required_type: Option<&ValueType>,
        editor: Option<&EditorHandle>,
    ) -> ConversionResult<Value> {
        let mut converted = new_value;
        let mut editor = editor;

        if let Some(handle) = editor {
            if !matches!(converted, Value::Str(_)) {
                let mut guard = handle.lock();
                match guard.set_value(converted.clone()) {
                    Ok(()) => {
                        let updated = guard.value();
                        if !updated.same_instance(&converted) {
                            converted = updated;
                            editor = None;
                        }
                    }
                    Err(e) => tracing::debug!(
                        "PropertyEditor [{}] does not support set_value call: {}",
                        guard.name(),
                        e
                    ),
                }
            }
        }

        let return_value = converted.clone();
        if required_type.map_or(false, |t| !t.is_array()) {
            if let Some(joined) = join_string_array(&converted) {
                converted = Value::Str(joined);
            }
        }

        if let Value::Str(text) = &converted {
            if let Some(handle) = editor {
                return Self::do_convert_text_value(old_value, text, handle);
            }
            if required_type == Some(&ValueType::String) {
                return Ok(converted);
            }
        }
        Ok(return_value)
    }

    fn do_convert_text_value(
        old_value: Option<&Value>,
        text: &str,
        editor: &EditorHandle,
    ) -> ConversionResult<Value> {
        let mut guard = editor.lock();
        if let Err(e) = guard.set_value(old_value.cloned().unwrap_or_default()) {
            tracing::debug!(
                "PropertyEditor [{}] does not support set_value call: {}",
                guard.name(),
                e
            );
        }
        guard
            .set_as_text(text)
            .map_err(ConversionFailure::from_cause)?;
        Ok(guard.value())
    }

    fn convert_to_typed_array(
        &self,
        input: Value,
        property_name: Option<&str>,
        component: &ValueType,
    ) -> ConversionResult<Value> {
        let items: Vec<Value> = match &input {
            Value::List(list) => list.read().items.clone(),
            Value::Set(set) => set.read().items.iter().cloned().collect(),
            Value::Array(array) => {
                let same_component = array.read().element_type == *component;
                if same_component
                    && !self
                        .registry
                        .has_custom_editor_for_element(Some(component), property_name)
                {
                    return Ok(input);
                }
                array.read().items.clone()
            }
            _ => vec![input.clone()],
        };

        let mut converted = Vec::with_capacity(items.len());
        for (i, item) in items.into_iter().enumerate() {
            let name = indexed_name(property_name, i);
            converted.push(self.convert_if_necessary(name.as_deref(), None, item, Some(component))?);
        }
        Ok(Value::array(component.clone(), converted))
    }

    fn convert_to_typed_collection(
        &self,
        original: Value,
        property_name: Option<&str>,
        required: &ValueType,
    ) -> ConversionResult<Value> {
        if !required.is_collection() {
            return Ok(original);
        }
        let element_type = declared(required.element_type());
        let mut original_allowed = required.is_instance(&original);
        if element_type.is_none()
            && original_allowed
            && !self.registry.has_custom_editor_for_element(None, property_name)
        {
            return Ok(original);
        }

        let (items, original_element, allows_null) = match &original {
            Value::List(list) => {
                let list = list.read();
                (list.items.clone(), list.element_type.clone(), list.allows_null)
            }
            Value::Set(set) => {
                let set = set.read();
                (set.items.iter().cloned().collect::<Vec<_>>(), set.element_type.clone(), true)
            }
            _ => return Ok(original),
        };

        let mut converted = Vec::with_capacity(items.len());
        for (i, element) in items.into_iter().enumerate() {
            let name = indexed_name(property_name, i);
            let item = self.convert_if_necessary(name.as_deref(), None, element.clone(), element_type)?;
            original_allowed = original_allowed && item.same_instance(&element);
            converted.push(item);
        }
        if original_allowed {
            return Ok(original);
        }

        let element_type = element_type.cloned().unwrap_or(original_element);
        Ok(match original {
            Value::Set(_) => Value::Set(Shared::new(SetValue::with_items(element_type, converted))),
            _ => {
                let list = ListValue::with_items(element_type, converted);
                Value::List(Shared::new(if allows_null { list } else { list.rejecting_null() }))
            }
        })
    }

    fn convert_to_typed_map(
        &self,
        original: Value,
        property_name: Option<&str>,
        required: &ValueType,
    ) -> ConversionResult<Value> {
        let ValueType::Map(key_type, value_type) = required else {
            return Ok(original);
        };
        let key_type = declared(Some(key_type));
        let value_type = declared(Some(value_type));
        let mut original_allowed = required.is_instance(&original);
        if key_type.is_none()
            && value_type.is_none()
            && original_allowed
            && !self.registry.has_custom_editor_for_element(None, property_name)
        {
            return Ok(original);
        }

        let (entries, original_key, original_value) = match &original {
            Value::Map(map) => {
                let map = map.read();
                let entries: Vec<(Value, Value)> =
                    map.entries.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
                (entries, map.key_type.clone(), map.value_type.clone())
            }
            _ => return Ok(original),
        };

        let mut converted = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            let name = keyed_name(property_name, &key);
            let new_key = self.convert_if_necessary(name.as_deref(), None, key.clone(), key_type)?;
            let new_value =
                self.convert_if_necessary(name.as_deref(), None, value.clone(), value_type)?;
            original_allowed =
                original_allowed && new_key.same_instance(&key) && new_value.same_instance(&value);
            converted.push((new_key, new_value));
        }
        if original_allowed {
            return Ok(original);
        }
        Ok(Value::Map(Shared::new(MapValue::with_entries(
            key_type.cloned().unwrap_or(original_key),
            value_type.cloned().unwrap_or(original_value),
            converted,
        ))))
    }
}

fn single_array_element(value: &Value) -> Option<Value> {
    match value {
        Value::Array(array) => {
            let array = array.read();
            (array.len() == 1).then(|| array.items[0].clone())
        }
        _ => None,
    }
}

/// `String[]` 拼接为逗号分隔的文本
fn join_string_array(value: &Value) -> Option<String> {
    let Value::Array(array) = value else {
        return None;
    };
    let array = array.read();
    if array.element_type != ValueType::String {
        return None;
    }
    Some(
        array
            .items
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(","),
    )
}

/// 独立使用的类型转换器，自带编辑器注册表
#[derive(Default)]
pub struct SimpleTypeConverter {
    registry: PropertyEditorRegistry,
    conversion_service: Option<Arc<dyn ConversionService>>,
}

impl SimpleTypeConverter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_conversion_service(mut self, service: Arc<dyn ConversionService>) -> Self {
        self.conversion_service = Some(service);
        self
    }

    pub fn registry(&self) -> &PropertyEditorRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut PropertyEditorRegistry {
        &mut self.registry
    }

    pub fn convert_if_necessary(&self, value: Value, required_type: &ValueType) -> BeansResult<Value> {
        TypeConverterDelegate::new(&self.registry, self.conversion_service.as_deref())
            .convert_if_necessary(None, None, value.clone(), Some(required_type))
            .map_err(|failure| failure.into_type_mismatch(None, value, Some(required_type)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::{EditorHandle, TextEditor};
    use crate::value::{ManagedList, ManagedValue, OpaqueType, OpaqueValue, PrimitiveKind};
    use pretty_assertions::assert_eq;

    fn int() -> ValueType {
        ValueType::Boxed(PrimitiveKind::Int)
    }

    fn convert(
        registry: &PropertyEditorRegistry,
        value: Value,
        required: &ValueType,
    ) -> ConversionResult<Value> {
        TypeConverterDelegate::new(registry, None).convert_if_necessary(
            Some("prop"),
            None,
            value,
            Some(required),
        )
    }

    #[test]
    fn test_text_to_number_through_default_editor() {
        let registry = PropertyEditorRegistry::new();
        let primitive = ValueType::Primitive(PrimitiveKind::Int);
        assert_eq!(convert(&registry, "42".into(), &primitive).unwrap(), Value::Int(42));

        let failure = convert(&registry, "abc".into(), &primitive).unwrap_err();
        assert!(!failure.not_supported);
        assert!(failure.cause.is_some());
    }

    #[test]
    fn test_unsupported_conversion() {
        let registry = PropertyEditorRegistry::new();
        let class = crate::class::BeanClass::dynamic("Thing").build();
        let failure = convert(&registry, "x".into(), &ValueType::Bean(class)).unwrap_err();
        assert!(failure.not_supported);
        assert!(failure
            .message
            .contains("no matching editors or conversion strategy found"));
        assert!(failure.message.contains("for property 'prop'"));
    }

    #[test]
    fn test_null_is_not_a_primitive() {
        let registry = PropertyEditorRegistry::new();
        assert!(convert(&registry, Value::Null, &ValueType::Primitive(PrimitiveKind::Long)).is_err());
        assert_eq!(convert(&registry, Value::Null, &int()).unwrap(), Value::Null);
    }

    #[test]
    fn test_number_narrowing_and_stringify() {
        let registry = PropertyEditorRegistry::new();
        assert_eq!(convert(&registry, Value::Long(7), &int()).unwrap(), Value::Int(7));
        assert!(convert(&registry, Value::Long(i64::MAX), &int()).is_err());
        assert_eq!(
            convert(&registry, Value::Double(2.0), &ValueType::String).unwrap(),
            Value::from("2.0")
        );
    }

    #[test]
    fn test_typed_collection_conversion() {
        let registry = PropertyEditorRegistry::new();
        let strings = Value::list(ValueType::String, vec!["1".into(), "2".into()]);
        let converted = convert(&registry, strings.clone(), &ValueType::list_of(int())).unwrap();
        assert_eq!(converted, Value::list(int(), vec![Value::Int(1), Value::Int(2)]));

        let untouched = convert(&registry, strings.clone(), &ValueType::list_of(ValueType::Any)).unwrap();
        assert!(untouched.same_instance(&strings));
    }

    #[test]
    fn test_typed_array_conversion() {
        let registry = PropertyEditorRegistry::new();
        let ints = ValueType::array_of(ValueType::Primitive(PrimitiveKind::Int));
        let list = Value::list(ValueType::String, vec!["3".into(), "4".into()]);
        assert_eq!(
            convert(&registry, list, &ints).unwrap(),
            Value::array(ValueType::Primitive(PrimitiveKind::Int), vec![Value::Int(3), Value::Int(4)])
        );
        assert_eq!(
            convert(&registry, Value::Int(9), &ints).unwrap(),
            Value::array(ValueType::Primitive(PrimitiveKind::Int), vec![Value::Int(9)])
        );

        let same = Value::array(ValueType::String, vec!["a".into()]);
        let result = convert(&registry, same.clone(), &ValueType::array_of(ValueType::String)).unwrap();
        assert!(result.same_instance(&same));
    }

    #[test]
    fn test_comma_separated_text_with_config_value_editors() {
        let mut registry = PropertyEditorRegistry::new();
        registry.use_config_value_editors();
        let required = ValueType::array_of(ValueType::Primitive(PrimitiveKind::Int));
        assert_eq!(
            convert(&registry, "1, 2,3".into(), &required).unwrap(),
            Value::array(
                ValueType::Primitive(PrimitiveKind::Int),
                vec![Value::Int(1), Value::Int(2), Value::Int(3)]
            )
        );
    }

    #[test]
    fn test_typed_map_conversion() {
        let registry = PropertyEditorRegistry::new();
        let required = ValueType::map_of(ValueType::String, int());
        let converted = convert(&registry, "a=1\nb=2".into(), &required).unwrap();
        assert_eq!(
            converted,
            Value::map(
                ValueType::String,
                int(),
                vec![("a".into(), Value::Int(1)), ("b".into(), Value::Int(2))]
            )
        );
    }

    #[test]
    fn test_single_element_array_is_unwrapped() {
        let registry = PropertyEditorRegistry::new();
        let array = Value::array(int(), vec![Value::Int(5)]);
        assert_eq!(convert(&registry, array, &int()).unwrap(), Value::Int(5));
        let strings = Value::array(ValueType::String, vec!["6".into()]);
        assert_eq!(convert(&registry, strings, &int()).unwrap(), Value::Int(6));
    }

    #[test]
    fn test_managed_values_are_materialized() {
        let registry = PropertyEditorRegistry::new();
        let managed = ManagedValue::from(ManagedList::new(
            ValueType::String,
            vec!["1".into()],
        ))
        .into_value();
        let converted = convert(&registry, managed, &ValueType::list_of(int())).unwrap();
        assert_eq!(converted, Value::list(int(), vec![Value::Int(1)]));
    }

    #[test]
    fn test_custom_editor_beats_conversion_service() {
        let money = ValueType::Opaque(OpaqueType::new("Money"));
        let to_money = |v: &Value, t: &ValueType| {
            let ValueType::Opaque(ty) = t else {
                anyhow::bail!("unexpected target");
            };
            Ok(Value::Opaque(OpaqueValue::new(*ty, (), format!("service:{}", v))))
        };
        let service = GenericConversionService::new().with_converter(
            ValueType::String,
            money.clone(),
            to_money,
        );

        let mut registry = PropertyEditorRegistry::new();
        let via_service = TypeConverterDelegate::new(&registry, Some(&service))
            .convert_if_necessary(None, None, "5".into(), Some(&money))
            .unwrap();
        assert_eq!(via_service.to_string(), "service:5");

        registry
            .register_custom_editor(
                Some(&money),
                None,
                EditorHandle::new(TextEditor::new("money", |t| {
                    Ok(Value::Opaque(OpaqueValue::new(
                        OpaqueType::new("Money"),
                        (),
                        format!("editor:{}", t),
                    )))
                })),
            )
            .unwrap();
        let via_editor = TypeConverterDelegate::new(&registry, Some(&service))
            .convert_if_necessary(None, None, "5".into(), Some(&money))
            .unwrap();
        assert_eq!(via_editor.to_string(), "editor:5");
    }

    #[test]
    fn test_simple_type_converter() {
        let converter = SimpleTypeConverter::new();
        assert_eq!(
            converter
                .convert_if_necessary("true".into(), &ValueType::Primitive(PrimitiveKind::Bool))
                .unwrap(),
            Value::Bool(true)
        );
        let err = converter
            .convert_if_necessary("nope".into(), &ValueType::Primitive(PrimitiveKind::Bool))
            .unwrap_err();
        assert!(matches!(err, BeansError::TypeMismatch { not_supported: false, .. }));
    }
}
