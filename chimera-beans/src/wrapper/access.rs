//! 单个路径段的读写
//!
//! 这里的路径都只含一个属性名和若干键，嵌套导航已经由 [`BeanWrapper`] 完成。

use super::BeanWrapper;
use crate::class::InvokeError;
use crate::error::{BeansError, BeansResult};
use crate::introspection::GenericPropertyDescriptor;
use crate::matches::PropertyMatches;
use crate::path::{PropertyTokens, PROPERTY_KEY_PREFIX, PROPERTY_KEY_SUFFIX};
use crate::property_value::PropertyValue;
use crate::value::{ArrayRef, ListRef, Shape, Value, ValueType};
use std::sync::Arc;

fn invoke_cause(e: InvokeError) -> anyhow::Error {
    match e {
        InvokeError::Failed(cause) => cause,
        other => anyhow::Error::new(other),
    }
}

/// 转换结果可以在多次应用之间复用：只缓存不可变的标量
fn is_cacheable(value: &Value) -> bool {
    value.shape() == Shape::Scalar && !matches!(value, Value::Bean(_) | Value::Managed(_))
}

impl BeanWrapper {
    // ========== 错误 ==========

    fn navigation_error(&self, property_name: &str, message: impl Into<String>) -> BeansError {
        BeansError::navigation(&self.root_class_name, self.full_path(property_name), message)
    }

    fn index_error(&self, property_name: &str, message: impl Into<String>) -> BeansError {
        BeansError::index(&self.root_class_name, self.full_path(property_name), message)
    }

    fn not_readable_error(&self, property_name: &str) -> BeansError {
        BeansError::not_readable(&self.root_class_name, self.full_path(property_name))
    }

    /// 属性不存在或不可写，附带名称相近的可写属性
    fn not_writable_error(&self, property_name: &str, exists: bool) -> BeansError {
        let matches = match self.results() {
            Ok(Some(results)) => PropertyMatches::for_property(property_name, &results),
            _ => PropertyMatches::from_candidates(property_name, Vec::new(), 0),
        };
        let bean_class = self.root_class_name.clone();
        let property_path = self.full_path(property_name);
        let message = matches.build_error_message();
        let possible_matches = matches.into_possible_matches();
        if exists {
            BeansError::NotWritable {
                bean_class,
                property_path,
                message,
                possible_matches,
            }
        } else {
            BeansError::UnknownProperty {
                bean_class,
                property_path,
                message,
                possible_matches,
            }
        }
    }

    fn parse_index(&self, key: &str, property_name: &str) -> BeansResult<usize> {
        key.trim().parse::<usize>().map_err(|_| {
            self.index_error(
                property_name,
                format!("Invalid index in property path '{}'", property_name),
            )
        })
    }

    // ========== 读取 ==========

    fn read_property(
        &self,
        pd: &GenericPropertyDescriptor,
        property_name: &str,
    ) -> BeansResult<Value> {
        let (Value::Bean(bean), Some(reader)) = (&self.wrapped, pd.read_method()) else {
            return Err(self.not_readable_error(property_name));
        };
        reader
            .invoke_read(bean)
            .map_err(|e| BeansError::Invocation {
                property_path: self.full_path(property_name),
                cause: invoke_cause(e),
            })
    }

    /// 读取属性值，并依次应用所有键
    pub(super) fn get_value_for_tokens(&mut self, tokens: &PropertyTokens) -> BeansResult<Value> {
        let property_name = tokens.canonical_name.as_str();
        let pd = match self.local_descriptor(&tokens.actual_name)? {
            Some(pd) if pd.is_readable() => pd,
            _ => return Err(self.not_readable_error(property_name)),
        };
        let mut value = self.read_property(&pd, &tokens.actual_name)?;
        if !tokens.is_keyed() {
            return Ok(value);
        }

        let null_message = || {
            format!(
                "Cannot access indexed value of property referenced in indexed property path '{}': returned null",
                property_name
            )
        };
        if value.is_null() {
            if !self.auto_grow_nested_paths {
                return Err(self.navigation_error(property_name, null_message()));
            }
            value = self.set_default_value(&PropertyTokens::plain(&tokens.actual_name))?;
        }

        let mut indexed_name = tokens.actual_name.clone();
        for (i, key) in tokens.keys.iter().enumerate() {
            if value.is_null() {
                return Err(self.navigation_error(property_name, null_message()));
            }
            value = match &value {
                Value::Array(array) => {
                    let index = self.parse_index(key, property_name)?;
                    let grown = self.grow_array_if_necessary(array, index, &indexed_name)?;
                    let array = match &grown {
                        Some(Value::Array(grown)) => grown,
                        _ => array,
                    };
                    let element = array.read().items.get(index).cloned();
                    element.ok_or_else(|| self.out_of_bounds(property_name))?
                }
                Value::List(list) => {
                    let index = self.parse_index(key, property_name)?;
                    self.grow_list_if_necessary(list, index, &indexed_name, pd.property_type(), i + 1)?;
                    let element = list.read().items.get(index).cloned();
                    element.ok_or_else(|| self.out_of_bounds(property_name))?
                }
                Value::Set(set) => {
                    let index = self.parse_index(key, property_name)?;
                    let set = set.read();
                    match set.items.get_index(index) {
                        Some(element) => element.clone(),
                        None => {
                            return Err(self.index_error(
                                property_name,
                                format!(
                                    "Cannot get element with index {} from Set of size {}, accessed using property path '{}'",
                                    index,
                                    set.len(),
                                    property_name
                                ),
                            ))
                        }
                    }
                }
                Value::Map(map) => {
                    let key_type = pd.property_type().map_key_type(i + 1);
                    let map_key = self
                        .convert_value(None, None, None, Value::str(key.as_str()), key_type.as_ref())
                        .map_err(|e| BeansError::Index {
                            bean_class: self.root_class_name.clone(),
                            property_path: self.full_path(property_name),
                            message: format!("Invalid index in property path '{}'", property_name),
                            cause: Some(Box::new(e)),
                        })?;
                    let entry = map.read().entries.get(&map_key).cloned();
                    entry.unwrap_or(Value::Null)
                }
                other => {
                    return Err(self.index_error(
                        property_name,
                        format!(
                            "Property referenced in indexed property path '{}' is neither an array nor a List nor a Set nor a Map; returned value was [{}]",
                            property_name, other
                        ),
                    ))
                }
            };
            indexed_name.push(PROPERTY_KEY_PREFIX);
            indexed_name.push_str(key);
            indexed_name.push(PROPERTY_KEY_SUFFIX);
        }
        Ok(value)
    }

    fn out_of_bounds(&self, property_name: &str) -> BeansError {
        self.index_error(
            property_name,
            format!("Index out of bounds in property path '{}'", property_name),
        )
    }

    // ========== 自动增长 ==========

    /// 创建自动增长用的默认值
    fn new_value(&self, ty: &ValueType, property_name: &str) -> BeansResult<Value> {
        ty.new_value().map_err(|e| {
            self.navigation_error(
                property_name,
                format!(
                    "Could not instantiate property type [{}] to auto-grow nested property path: {}",
                    ty, e
                ),
            )
        })
    }

    /// 路径段的声明类型，带键时取对应层级的元素类型
    fn property_type_for_tokens(&self, tokens: &PropertyTokens) -> BeansResult<Option<ValueType>> {
        let Some(pd) = self.local_descriptor(&tokens.actual_name)? else {
            return Ok(None);
        };
        if !pd.is_readable() && !pd.is_writable() {
            return Ok(None);
        }
        if tokens.is_keyed() {
            Ok(pd.property_type().nested(tokens.keys.len()))
        } else {
            Ok(Some(pd.property_type().clone()))
        }
    }

    /// 为 null 的路径段写入默认值并返回写入后的值
    pub(super) fn set_default_value(&mut self, tokens: &PropertyTokens) -> BeansResult<Value> {
        let property_name = tokens.canonical_name.as_str();
        let ty = match self.property_type_for_tokens(tokens)? {
            Some(ty) if !matches!(ty, ValueType::Any | ValueType::Variable(_)) => ty,
            _ => {
                return Err(self.navigation_error(
                    property_name,
                    "Could not determine property type for auto-growing a default value",
                ))
            }
        };
        tracing::debug!(
            "Auto-growing '{}' with a default value of type [{}]",
            self.full_path(property_name),
            ty
        );
        let default_value = self.new_value(&ty, property_name)?;
        let pv = PropertyValue::new(property_name, default_value);
        self.set_value_for_tokens(tokens, &pv)?;
        let value = self.get_value_for_tokens(tokens)?;
        if value.is_null() {
            return Err(BeansError::fatal(format!(
                "Default value for property '{}' must not be null",
                self.full_path(property_name)
            )));
        }
        Ok(value)
    }

    /// 读取时数组长度不足，分配更长的数组并通过写方法提交，返回提交后的数组
    fn grow_array_if_necessary(
        &mut self,
        array: &ArrayRef,
        index: usize,
        property_name: &str,
    ) -> BeansResult<Option<Value>> {
        if !self.auto_grow_nested_paths || index >= self.auto_grow_collection_limit {
            return Ok(None);
        }
        let (element_type, mut items) = {
            let current = array.read();
            if index < current.len() {
                return Ok(None);
            }
            (current.element_type.clone(), current.items.clone())
        };
        for _ in items.len()..=index {
            items.push(self.new_value(&element_type, property_name)?);
        }
        self.set_property_value(property_name, Value::array(element_type, items))?;
        self.get_property_value(property_name).map(Some)
    }

    /// 读取时列表长度不足，用元素类型的默认值补齐
    fn grow_list_if_necessary(
        &self,
        list: &ListRef,
        index: usize,
        property_name: &str,
        property_type: &ValueType,
        nesting_level: usize,
    ) -> BeansResult<()> {
        if !self.auto_grow_nested_paths || index >= self.auto_grow_collection_limit {
            return Ok(());
        }
        let size = list.read().len();
        if index < size {
            return Ok(());
        }
        let Some(element_type) = property_type
            .nested(nesting_level)
            .filter(|ty| !matches!(ty, ValueType::Any | ValueType::Variable(_)))
        else {
            return Ok(());
        };
        let mut grown = Vec::with_capacity(index + 1 - size);
        for _ in size..=index {
            grown.push(self.new_value(&element_type, property_name)?);
        }
        list.write().items.extend(grown);
        Ok(())
    }

    // ========== 写入 ==========

    pub(super) fn set_value_for_tokens(
        &mut self,
        tokens: &PropertyTokens,
        pv: &PropertyValue,
    ) -> BeansResult<()> {
        if tokens.is_keyed() {
            self.process_keyed_property(tokens, pv)
        } else {
            self.process_local_property(tokens, pv)
        }
    }

    fn process_local_property(&mut self, tokens: &PropertyTokens, pv: &PropertyValue) -> BeansResult<()> {
        let pd = match self.local_descriptor(&tokens.actual_name)? {
            Some(pd) if pd.is_writable() => pd,
            found => {
                if pv.is_optional() {
                    tracing::debug!(
                        "Ignoring optional value for property '{}' - property not found on bean class [{}]",
                        tokens.actual_name,
                        self.root_class_name
                    );
                    return Ok(());
                }
                return Err(self.not_writable_error(&tokens.canonical_name, found.is_some()));
            }
        };

        let full_path = self.full_path(&tokens.canonical_name);

        // 只有值与原始属性值相同的条目才读写原始属性值上的转换记录
        let original = pv.original_property_value();
        let records_on_original = pv.value().same_instance(original.value());
        let recorded = records_on_original && original.is_conversion_recorded_for(pd.property_type());

        let value_to_apply = match (recorded, original.conversion_necessary(), original.converted_value()) {
            (true, Some(false), _) => pv.value().clone(),
            (true, _, Some(converted)) => converted,
            _ => {
                let old_value = if self.extract_old_value_for_editor && pd.is_readable() {
                    match self.read_property(&pd, &tokens.actual_name) {
                        Ok(old) => Some(old),
                        Err(e) => {
                            tracing::debug!("Could not read previous value of property '{}': {}", full_path, e);
                            None
                        }
                    }
                } else {
                    None
                };
                let converted = self.convert_value(
                    Some(&tokens.canonical_name),
                    Some(&full_path),
                    old_value.as_ref(),
                    pv.value().clone(),
                    Some(pd.property_type()),
                )?;
                if records_on_original {
                    original.record_conversion(
                        Arc::clone(&pd),
                        !converted.same_instance(pv.value()),
                        is_cacheable(&converted).then(|| converted.clone()),
                    );
                }
                converted
            }
        };

        let (Value::Bean(bean), Some(writer)) = (&self.wrapped, pd.write_method()) else {
            return Err(self.not_writable_error(&tokens.canonical_name, true));
        };
        tracing::trace!("Setting property '{}' on [{}]", full_path, self.root_class_name);
        match writer.invoke_write(bean, value_to_apply) {
            Ok(_) => Ok(()),
            Err(e @ InvokeError::ClassCast { .. }) => {
                let required = pd.property_type();
                Err(BeansError::TypeMismatch {
                    message: format!(
                        "Failed to convert property value of type '{}' to required type '{}' for property '{}'; {}",
                        pv.value().type_name(),
                        required,
                        full_path,
                        e
                    ),
                    property_path: Some(full_path),
                    value: pv.value().clone(),
                    required_type: Some(required.clone()),
                    not_supported: false,
                    cause: Some(anyhow::Error::new(e)),
                })
            }
            Err(e) => Err(BeansError::Invocation {
                property_path: full_path,
                cause: invoke_cause(e),
            }),
        }
    }

    /// 取得持有最后一个键的容器，容器为 null 时按需创建
    fn property_holding_value(&mut self, tokens: &PropertyTokens) -> BeansResult<Value> {
        let property_name = tokens.canonical_name.as_str();
        let mut getter_tokens = tokens.without_last_key();
        let value = match self.get_value_for_tokens(&getter_tokens) {
            Ok(value) => value,
            Err(BeansError::NotReadable { .. }) => {
                return Err(BeansError::NotWritable {
                    bean_class: self.root_class_name.clone(),
                    property_path: self.full_path(property_name),
                    message: format!(
                        "Cannot access indexed value in property referenced in indexed property path '{}'",
                        property_name
                    ),
                    possible_matches: Vec::new(),
                })
            }
            Err(e) => return Err(e),
        };
        if !value.is_null() {
            return Ok(value);
        }
        if !self.auto_grow_nested_paths {
            return Err(self.navigation_error(
                property_name,
                format!(
                    "Cannot access indexed value in property referenced in indexed property path '{}': returned null",
                    property_name
                ),
            ));
        }
        if let Some(pos) = property_name.rfind(PROPERTY_KEY_PREFIX) {
            getter_tokens.canonical_name = property_name[..pos].to_string();
        }
        self.set_default_value(&getter_tokens)
    }

    fn process_keyed_property(&mut self, tokens: &PropertyTokens, pv: &PropertyValue) -> BeansResult<()> {
        let property_name = tokens.canonical_name.as_str();
        let holder = self.property_holding_value(tokens)?;
        let Some(pd) = self.local_descriptor(&tokens.actual_name)? else {
            return Err(self.not_writable_error(&tokens.actual_name, false));
        };
        let key_count = tokens.keys.len();
        let last_key = tokens.last_key().unwrap_or_default();
        let full_path = self.full_path(property_name);

        match &holder {
            Value::Array(array) => {
                let index = self.parse_index(last_key, property_name)?;
                let (element_type, length, old_value) = {
                    let current = array.read();
                    let old = (self.extract_old_value_for_editor)
                        .then(|| current.items.get(index).cloned())
                        .flatten();
                    (current.element_type.clone(), current.len(), old)
                };
                let converted = self.convert_value(
                    Some(property_name),
                    Some(&full_path),
                    old_value.as_ref(),
                    pv.value().clone(),
                    Some(&element_type),
                )?;
                if index < length {
                    array.write().items[index] = converted;
                    return Ok(());
                }
                if !self.auto_grow_nested_paths || index >= self.auto_grow_collection_limit {
                    return Err(self.index_error(
                        property_name,
                        format!("Invalid array index in property path '{}'", property_name),
                    ));
                }
                let mut items = array.read().items.clone();
                items.extend((length..index).map(|_| element_type.gap_value()));
                items.push(converted);
                let array_name = match property_name.rfind(PROPERTY_KEY_PREFIX) {
                    Some(pos) => &property_name[..pos],
                    None => property_name,
                };
                tracing::debug!(
                    "Growing array '{}' from {} to {} elements",
                    full_path,
                    length,
                    index + 1
                );
                self.set_property_value(array_name, Value::array(element_type, items))
            }
            Value::List(list) => {
                let required = pd.property_type().nested(key_count);
                let index = self.parse_index(last_key, property_name)?;
                let old_value = if self.extract_old_value_for_editor {
                    list.read().items.get(index).cloned()
                } else {
                    None
                };
                let converted = self.convert_value(
                    Some(property_name),
                    Some(&full_path),
                    old_value.as_ref(),
                    pv.value().clone(),
                    required.as_ref(),
                )?;
                let mut list = list.write();
                let size = list.len();
                if index < size {
                    list.items[index] = converted;
                    return Ok(());
                }
                if !self.auto_grow_nested_paths || index >= self.auto_grow_collection_limit {
                    return Err(self.index_error(
                        property_name,
                        format!("Invalid list index in property path '{}'", property_name),
                    ));
                }
                if index > size && !list.allows_null {
                    return Err(self.index_error(
                        property_name,
                        format!(
                            "Cannot set element with index {} in List of size {}, accessed using property path '{}': List does not support filling up gaps with null elements",
                            index, size, property_name
                        ),
                    ));
                }
                list.items.resize(index, Value::Null);
                list.items.push(converted);
                Ok(())
            }
            Value::Map(map) => {
                let key_type = pd.property_type().map_key_type(key_count);
                let value_type = pd.property_type().nested(key_count);
                let map_key = self.convert_value(
                    None,
                    Some(&full_path),
                    None,
                    Value::str(last_key),
                    key_type.as_ref(),
                )?;
                let old_value = if self.extract_old_value_for_editor {
                    map.read().entries.get(&map_key).cloned()
                } else {
                    None
                };
                let converted = self.convert_value(
                    Some(property_name),
                    Some(&full_path),
                    old_value.as_ref(),
                    pv.value().clone(),
                    value_type.as_ref(),
                )?;
                map.write().entries.insert(map_key, converted);
                Ok(())
            }
            other => Err(self.index_error(
                property_name,
                format!(
                    "Property referenced in indexed property path '{}' is neither an array nor a List nor a Map; returned value was [{}]",
                    property_name, other
                ),
            )),
        }
    }
}
