//! 属性值
//!
//! [`PropertyValue`] 是一次属性设置的载体，同时缓存路径解析、属性描述符和转换结果，
//! 同一个属性值反复应用到同类对象时可以跳过这些步骤。[`MutablePropertyValues`] 是按名称去重的
//! 有序列表，重复添加时支持与前值合并。

use crate::error::{BeansError, BeansResult};
use crate::introspection::GenericPropertyDescriptor;
use crate::path::PropertyTokens;
use crate::value::{Mergeable, Value, ValueType};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// 单个属性值
pub struct PropertyValue {
    name: String,
    value: Value,
    optional: bool,
    converted_value: Mutex<Option<Value>>,
    conversion_necessary: Mutex<Option<bool>>,
    resolved_tokens: Mutex<Option<PropertyTokens>>,
    resolved_descriptor: Mutex<Option<Arc<GenericPropertyDescriptor>>>,
    source: Option<Arc<PropertyValue>>,
}

impl PropertyValue {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            optional: false,
            converted_value: Mutex::new(None),
            conversion_necessary: Mutex::new(None),
            resolved_tokens: Mutex::new(None),
            resolved_descriptor: Mutex::new(None),
            source: None,
        }
    }

    /// 目标属性不存在时静默忽略
    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    /// 复制，包括已经缓存的解析和转换结果
    pub fn copy_of(original: &PropertyValue) -> Self {
        Self {
            name: original.name.clone(),
            value: original.value.clone(),
            optional: original.optional,
            converted_value: Mutex::new(original.converted_value.lock().clone()),
            conversion_necessary: Mutex::new(*original.conversion_necessary.lock()),
            resolved_tokens: Mutex::new(original.resolved_tokens.lock().clone()),
            resolved_descriptor: Mutex::new(original.resolved_descriptor.lock().clone()),
            source: original.source.clone(),
        }
    }

    /// 以新值派生，保留指向原始属性值的引用
    ///
    /// 路径解析结果和属性描述符沿用原始属性值的。转换结果只在值与原始属性值相同时写回。
    pub fn linked(original: &Arc<PropertyValue>, new_value: impl Into<Value>) -> Self {
        Self {
            name: original.name.clone(),
            value: new_value.into(),
            optional: original.optional,
            converted_value: Mutex::new(None),
            conversion_necessary: Mutex::new(*original.conversion_necessary.lock()),
            resolved_tokens: Mutex::new(original.resolved_tokens.lock().clone()),
            resolved_descriptor: Mutex::new(original.resolved_descriptor.lock().clone()),
            source: Some(Arc::clone(original)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn source(&self) -> Option<&Arc<PropertyValue>> {
        self.source.as_ref()
    }

    /// 沿派生链找到最初的属性值
    pub fn original_property_value(&self) -> &PropertyValue {
        let mut original = self;
        while let Some(source) = &original.source {
            original = source;
        }
        original
    }

    pub fn is_converted(&self) -> bool {
        self.converted_value.lock().is_some()
    }

    pub fn converted_value(&self) -> Option<Value> {
        self.converted_value.lock().clone()
    }

    /// 记录转换结果，之后的应用直接使用该值
    pub fn set_converted_value(&self, value: Value) {
        *self.converted_value.lock() = Some(value);
    }

    /// 上次应用时转换是否改变了值；None 表示尚未应用
    pub fn conversion_necessary(&self) -> Option<bool> {
        *self.conversion_necessary.lock()
    }

    pub fn set_conversion_necessary(&self, necessary: bool) {
        *self.conversion_necessary.lock() = Some(necessary);
    }

    /// 记录一次转换：目标描述符、转换是否改变了值以及可复用的转换结果
    ///
    /// 之前为其他描述符记录的结果被覆盖。
    pub fn record_conversion(
        &self,
        descriptor: Arc<GenericPropertyDescriptor>,
        necessary: bool,
        converted: Option<Value>,
    ) {
        *self.resolved_descriptor.lock() = Some(descriptor);
        *self.conversion_necessary.lock() = Some(necessary);
        *self.converted_value.lock() = converted;
    }

    /// 已记录的转换是否针对该属性类型
    pub fn is_conversion_recorded_for(&self, property_type: &ValueType) -> bool {
        self.conversion_necessary().is_some()
            && self
                .resolved_descriptor()
                .map_or(false, |pd| pd.property_type() == property_type)
    }

    pub fn resolved_tokens(&self) -> Option<PropertyTokens> {
        self.resolved_tokens.lock().clone()
    }

    pub fn set_resolved_tokens(&self, tokens: PropertyTokens) {
        *self.resolved_tokens.lock() = Some(tokens);
    }

    pub fn resolved_descriptor(&self) -> Option<Arc<GenericPropertyDescriptor>> {
        self.resolved_descriptor.lock().clone()
    }

    pub fn set_resolved_descriptor(&self, descriptor: Arc<GenericPropertyDescriptor>) {
        *self.resolved_descriptor.lock() = Some(descriptor);
    }
}

impl PartialEq for PropertyValue {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.value == other.value
    }
}

impl fmt::Debug for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyValue")
            .field("name", &self.name)
            .field("value", &self.value)
            .field("optional", &self.optional)
            .field("converted", &self.is_converted())
            .finish()
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bean property '{}'", self.name)
    }
}

/// 一组属性值
pub trait PropertyValues {
    fn property_values(&self) -> &[Arc<PropertyValue>];

    fn get_property_value(&self, name: &str) -> Option<Arc<PropertyValue>> {
        self.property_values()
            .iter()
            .find(|pv| pv.name() == name)
            .cloned()
    }

    /// 相对 `old` 新增或值发生变化的属性
    fn changes_since(&self, old: &dyn PropertyValues) -> MutablePropertyValues {
        let mut changes = MutablePropertyValues::new();
        for pv in self.property_values() {
            let unchanged = old
                .get_property_value(pv.name())
                .map_or(false, |previous| *previous == **pv);
            if !unchanged {
                changes.values.push(Arc::clone(pv));
            }
        }
        changes
    }

    fn contains(&self, name: &str) -> bool {
        self.get_property_value(name).is_some()
    }

    fn is_empty(&self) -> bool {
        self.property_values().is_empty()
    }
}

/// 可修改的属性值列表，按名称去重，保持添加顺序
#[derive(Debug, Clone, Default)]
pub struct MutablePropertyValues {
    values: Vec<Arc<PropertyValue>>,
    processed_properties: HashSet<String>,
    converted: bool,
}

impl MutablePropertyValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// 由 `(名称, 值)` 对构建，同名的后者生效
    pub fn from_pairs<N, V>(pairs: impl IntoIterator<Item = (N, V)>) -> BeansResult<Self>
    where
        N: Into<String>,
        V: Into<Value>,
    {
        let mut values = Self::new();
        for (name, value) in pairs {
            values.add(name, value)?;
        }
        Ok(values)
    }

    /// 由 JSON 对象构建
    ///
    /// 数字按整数（`long`）或浮点（`double`）解析，数组转换为列表，对象转换为字符串键的映射。
    pub fn from_json(json: &serde_json::Value) -> BeansResult<Self> {
        let object = json.as_object().ok_or_else(|| {
            BeansError::fatal(format!(
                "Property values must be a JSON object, got: {}",
                json
            ))
        })?;
        Self::from_pairs(object.iter().map(|(k, v)| (k.clone(), json_to_value(v))))
    }

    pub fn from_json_str(json: &str) -> BeansResult<Self> {
        let parsed: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| BeansError::fatal(format!("Invalid property values JSON: {}", e)))?;
        Self::from_json(&parsed)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<PropertyValue>> {
        self.values.iter()
    }

    /// 添加属性值；同名属性已存在时替换，或在新值允许合并时与旧值合并
    pub fn add_property_value(&mut self, pv: PropertyValue) -> BeansResult<&mut Self> {
        match self.values.iter().position(|current| current.name() == pv.name()) {
            Some(index) => {
                let merged = Self::merge_if_required(pv, &self.values[index])?;
                self.values[index] = Arc::new(merged);
            }
            None => self.values.push(Arc::new(pv)),
        }
        Ok(self)
    }

    pub fn add(&mut self, name: impl Into<String>, value: impl Into<Value>) -> BeansResult<&mut Self> {
        self.add_property_value(PropertyValue::new(name, value))
    }

    /// 逐个复制另一组属性值
    pub fn add_property_values(&mut self, other: &dyn PropertyValues) -> BeansResult<&mut Self> {
        for pv in other.property_values() {
            self.add_property_value(PropertyValue::copy_of(pv))?;
        }
        Ok(self)
    }

    /// 覆盖指定位置的属性值
    pub fn set_property_value_at(&mut self, pv: PropertyValue, index: usize) -> BeansResult<()> {
        let len = self.values.len();
        let Some(slot) = self.values.get_mut(index) else {
            return Err(BeansError::fatal(format!(
                "Cannot set property value '{}' at index {}: list has {} entries",
                pv.name(),
                index,
                len
            )));
        };
        *slot = Arc::new(pv);
        Ok(())
    }

    fn merge_if_required(new_pv: PropertyValue, current: &PropertyValue) -> BeansResult<PropertyValue> {
        let Value::Managed(managed) = new_pv.value() else {
            return Ok(new_pv);
        };
        if !managed.is_merge_enabled() {
            return Ok(new_pv);
        }
        let merged = managed
            .merge(current.value())
            .map_err(|e| BeansError::Merge {
                property_name: new_pv.name().to_string(),
                message: e.to_string(),
            })?;
        tracing::trace!("Merged property value '{}' with its previous value", new_pv.name());
        Ok(PropertyValue::linked(&Arc::new(new_pv), merged))
    }

    pub fn remove_property_value(&mut self, name: &str) -> Option<Arc<PropertyValue>> {
        let index = self.values.iter().position(|pv| pv.name() == name)?;
        Some(self.values.remove(index))
    }

    /// 属性的原始值
    pub fn get(&self, name: &str) -> Option<Value> {
        self.get_property_value(name).map(|pv| pv.value().clone())
    }

    /// 标记某个属性已经由其他途径处理，`contains` 会把它视为存在
    pub fn register_processed_property(&mut self, name: impl Into<String>) {
        self.processed_properties.insert(name.into());
    }

    pub fn clear_processed_property(&mut self, name: &str) {
        self.processed_properties.remove(name);
    }

    /// 标记整个列表只包含已经转换过的值
    pub fn set_converted(&mut self) {
        self.converted = true;
    }

    pub fn is_converted(&self) -> bool {
        self.converted
    }
}

impl PropertyValues for MutablePropertyValues {
    fn property_values(&self) -> &[Arc<PropertyValue>] {
        &self.values
    }

    fn contains(&self, name: &str) -> bool {
        self.get_property_value(name).is_some() || self.processed_properties.contains(name)
    }
}

impl<'a> IntoIterator for &'a MutablePropertyValues {
    type Item = &'a Arc<PropertyValue>;
    type IntoIter = std::slice::Iter<'a, Arc<PropertyValue>>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

fn json_to_value(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Long(i),
            None => Value::Double(n.as_f64().unwrap_or(f64::NAN)),
        },
        serde_json::Value::String(s) => Value::Str(s.clone()),
        serde_json::Value::Array(items) => {
            Value::list(ValueType::Any, items.iter().map(json_to_value).collect())
        }
        serde_json::Value::Object(map) => Value::map(
            ValueType::String,
            ValueType::Any,
            map.iter()
                .map(|(k, v)| (Value::Str(k.clone()), json_to_value(v))),
        ),
    }
}
