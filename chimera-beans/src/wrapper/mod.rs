//! Bean 包装器
//!
//! [`BeanWrapper`] 以路径表达式读写对象图中的属性：`.` 进入嵌套属性，`[...]` 访问数组、
//! 列表、集合和映射中的元素。写入前的值经过编辑器和转换服务转换为属性声明的类型。
//!
//! 每一段嵌套路径由一个子包装器负责，子包装器按规范属性名缓存，被包装的实例变化后重建。
//! 子包装器继承父包装器的设置、转换服务、默认编辑器和相关的自定义编辑器。
//!
//! 包装器不是线程安全的，需要在线程间共享时由调用方加锁。

mod access;
#[cfg(test)]
mod tests;

use crate::class::BeanRef;
use crate::config::AccessorSettings;
use crate::convert::{ConversionService, TypeConverterDelegate};
use crate::editor::{EditorHandle, PropertyEditorRegistry};
use crate::error::{BeansError, BeansResult, PropertyBatchUpdateError};
use crate::introspection::{GenericPropertyDescriptor, IntrospectionCache, IntrospectionResults};
use crate::path::{first_nested_separator, PropertyTokens};
use crate::property_value::{PropertyValue, PropertyValues};
use crate::value::{Value, ValueType};
use once_cell::unsync::OnceCell;
use std::collections::HashMap;
use std::sync::Arc;

/// 可嵌套的属性访问器
pub struct BeanWrapper {
    wrapped: Value,
    nested_path: String,
    root_class_name: String,
    registry: PropertyEditorRegistry,
    conversion_service: Option<Arc<dyn ConversionService>>,
    introspection: Arc<IntrospectionCache>,
    auto_grow_nested_paths: bool,
    auto_grow_collection_limit: usize,
    extract_old_value_for_editor: bool,
    results: OnceCell<Arc<IntrospectionResults>>,
    nested_accessors: HashMap<String, BeanWrapper>,
}

impl BeanWrapper {
    /// 包装对象，使用独立的内省缓存
    pub fn new(wrapped: impl Into<Value>) -> Self {
        Self::with_introspection(wrapped, Arc::new(IntrospectionCache::default()))
    }

    pub fn for_bean(bean: BeanRef) -> Self {
        Self::new(Value::Bean(bean))
    }

    /// 与其他包装器共享内省缓存
    pub fn with_introspection(wrapped: impl Into<Value>, introspection: Arc<IntrospectionCache>) -> Self {
        let wrapped = wrapped.into();
        let settings = AccessorSettings::default();
        Self {
            root_class_name: wrapped.type_name(),
            wrapped,
            nested_path: String::new(),
            registry: PropertyEditorRegistry::new(),
            conversion_service: None,
            introspection,
            auto_grow_nested_paths: settings.auto_grow_nested_paths,
            auto_grow_collection_limit: settings.auto_grow_collection_limit,
            extract_old_value_for_editor: settings.extract_old_value_for_editor,
            results: OnceCell::new(),
            nested_accessors: HashMap::new(),
        }
    }

    /// 按配置创建包装器，内省缓存同样按配置创建
    pub fn with_settings(wrapped: impl Into<Value>, settings: &AccessorSettings) -> Self {
        let introspection = Arc::new(IntrospectionCache::with_settings(
            crate::class::ClassLoader::system(),
            settings,
        ));
        let mut wrapper = Self::with_introspection(wrapped, introspection);
        wrapper.apply_settings(settings);
        wrapper
    }

    /// 应用访问器配置
    ///
    /// 配置值编辑器需要在第一次转换之前启用。已缓存的嵌套访问器不受影响。
    pub fn apply_settings(&mut self, settings: &AccessorSettings) {
        self.auto_grow_nested_paths = settings.auto_grow_nested_paths;
        self.auto_grow_collection_limit = settings.auto_grow_collection_limit;
        self.extract_old_value_for_editor = settings.extract_old_value_for_editor;
        self.registry
            .set_default_editors_active(settings.default_editors_active);
        if settings.config_value_editors {
            self.registry.use_config_value_editors();
        }
    }

    pub fn auto_grow_nested_paths(mut self, enabled: bool) -> Self {
        self.auto_grow_nested_paths = enabled;
        self
    }

    pub fn auto_grow_collection_limit(mut self, limit: usize) -> Self {
        self.auto_grow_collection_limit = limit;
        self
    }

    pub fn extract_old_value_for_editor(mut self, enabled: bool) -> Self {
        self.extract_old_value_for_editor = enabled;
        self
    }

    pub fn conversion_service(mut self, service: Arc<dyn ConversionService>) -> Self {
        self.conversion_service = Some(service);
        self
    }

    pub fn set_auto_grow_nested_paths(&mut self, enabled: bool) {
        self.auto_grow_nested_paths = enabled;
    }

    pub fn is_auto_grow_nested_paths(&self) -> bool {
        self.auto_grow_nested_paths
    }

    pub fn set_auto_grow_collection_limit(&mut self, limit: usize) {
        self.auto_grow_collection_limit = limit;
    }

    pub fn set_extract_old_value_for_editor(&mut self, enabled: bool) {
        self.extract_old_value_for_editor = enabled;
    }

    pub fn set_conversion_service(&mut self, service: Option<Arc<dyn ConversionService>>) {
        self.conversion_service = service;
    }

    /// 替换被包装的对象，同时丢弃内省结果和所有嵌套访问器
    pub fn set_wrapped_instance(&mut self, wrapped: impl Into<Value>) {
        self.wrapped = wrapped.into();
        self.root_class_name = self.wrapped.type_name();
        self.nested_path.clear();
        self.results = OnceCell::new();
        self.nested_accessors.clear();
    }

    pub fn wrapped_instance(&self) -> &Value {
        &self.wrapped
    }

    /// 当前访问器在对象图中的路径，根访问器为空，嵌套访问器以 `.` 结尾
    pub fn nested_path(&self) -> &str {
        &self.nested_path
    }

    pub fn root_class_name(&self) -> &str {
        &self.root_class_name
    }

    pub fn registry(&self) -> &PropertyEditorRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut PropertyEditorRegistry {
        &mut self.registry
    }

    pub fn introspection(&self) -> &Arc<IntrospectionCache> {
        &self.introspection
    }

    // ========== 读取 ==========

    /// 读取路径上的值
    pub fn get_property_value(&mut self, property_path: &str) -> BeansResult<Value> {
        self.ensure_bound()?;
        let (nested, final_path) = self.accessor_for_path(property_path)?;
        let tokens = PropertyTokens::parse(final_path);
        nested.get_value_for_tokens(&tokens)
    }

    pub fn is_readable_property(&mut self, property_path: &str) -> bool {
        match self.property_handler(property_path) {
            Ok(Some(pd)) => pd.is_readable(),
            Ok(None) => self.get_property_value(property_path).is_ok(),
            Err(_) => false,
        }
    }

    pub fn is_writable_property(&mut self, property_path: &str) -> bool {
        match self.property_handler(property_path) {
            Ok(Some(pd)) => pd.is_writable(),
            Ok(None) => self.get_property_value(property_path).is_ok(),
            Err(_) => false,
        }
    }

    /// 路径的类型
    ///
    /// 有属性描述符时返回声明类型；对索引路径返回当前值的运行时类型，值为 null 时
    /// 根据按路径注册的编辑器推断。路径无效时返回 `None`。
    pub fn get_property_type(&mut self, property_path: &str) -> BeansResult<Option<ValueType>> {
        match self.property_handler(property_path) {
            Ok(Some(pd)) => return Ok(Some(pd.property_type().clone())),
            Ok(None) => {}
            Err(e) if e.is_invalid_property() => return Ok(None),
            Err(e) => return Err(e),
        }
        match self.get_property_value(property_path) {
            Ok(value) if !value.is_null() => return Ok(value.value_type()),
            Ok(_) => {}
            Err(e) if e.is_invalid_property() => return Ok(None),
            Err(e) => return Err(e),
        }
        Ok(self.registry.guess_property_type_from_editors(property_path))
    }

    /// 路径末端属性的描述符
    pub fn get_property_descriptor(
        &mut self,
        property_path: &str,
    ) -> BeansResult<Arc<GenericPropertyDescriptor>> {
        self.ensure_bound()?;
        let full_path = self.full_path(property_path);
        let (nested, final_path) = self.accessor_for_path(property_path)?;
        match nested.local_descriptor(final_path)? {
            Some(pd) => Ok(pd),
            None => Err(BeansError::UnknownProperty {
                bean_class: nested.root_class_name.clone(),
                property_path: full_path,
                message: format!("No property '{}' found", property_path),
                possible_matches: Vec::new(),
            }),
        }
    }

    /// 被包装类的全部属性描述符
    pub fn property_descriptors(&self) -> BeansResult<Vec<Arc<GenericPropertyDescriptor>>> {
        Ok(self
            .results()?
            .map(|results| results.property_descriptors())
            .unwrap_or_default())
    }

    // ========== 写入 ==========

    /// 写入路径上的值
    pub fn set_property_value(
        &mut self,
        property_path: &str,
        value: impl Into<Value>,
    ) -> BeansResult<()> {
        self.ensure_bound()?;
        let pv = PropertyValue::new(property_path, value);
        let (nested, final_path) = self.accessor_for_path_writing(property_path)?;
        let tokens = PropertyTokens::parse(final_path);
        nested.set_value_for_tokens(&tokens, &pv)
    }

    /// 应用单个属性值
    ///
    /// 非嵌套路径的解析结果和转换结果记录在原始属性值上，供再次应用时复用。
    pub fn apply_property_value(&mut self, pv: &PropertyValue) -> BeansResult<()> {
        self.ensure_bound()?;
        if let Some(tokens) = pv.resolved_tokens() {
            return self.set_value_for_tokens(&tokens, pv);
        }
        let local = first_nested_separator(pv.name()).is_none();
        let (nested, final_path) = self.accessor_for_path_writing(pv.name())?;
        let tokens = PropertyTokens::parse(final_path);
        if local {
            pv.original_property_value()
                .set_resolved_tokens(tokens.clone());
        }
        nested.set_value_for_tokens(&tokens, pv)
    }

    /// 批量应用属性值
    ///
    /// 未知属性在 `ignore_unknown` 时跳过；无法导航、不可读写或索引无效的属性在
    /// `ignore_invalid` 时跳过。其余可恢复的错误被收集起来，全部属性处理完后一并返回，
    /// 已经成功写入的属性不会回滚。不可恢复的错误立即返回。
    pub fn set_property_values(
        &mut self,
        values: &dyn PropertyValues,
        ignore_unknown: bool,
        ignore_invalid: bool,
    ) -> BeansResult<()> {
        self.ensure_bound()?;
        let mut errors = Vec::new();
        for pv in values.property_values() {
            let Err(e) = self.apply_property_value(pv) else {
                continue;
            };
            match e {
                BeansError::UnknownProperty { .. } if ignore_unknown => {
                    tracing::debug!("Ignoring unknown property '{}'", pv.name());
                }
                BeansError::UnknownProperty { .. } => errors.push(e),
                e if e.is_invalid_property() && ignore_invalid => {
                    tracing::debug!("Ignoring invalid property '{}': {}", pv.name(), e);
                }
                e if e.is_recoverable() => errors.push(e),
                e => return Err(e),
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            tracing::debug!(
                "{} of {} property values failed on [{}]",
                errors.len(),
                values.property_values().len(),
                self.root_class_name
            );
            Err(PropertyBatchUpdateError::new(errors).into())
        }
    }

    // ========== 转换 ==========

    /// 把值转换为本地属性的类型，不写入
    pub fn convert_for_property(&self, property_name: &str, value: impl Into<Value>) -> BeansResult<Value> {
        let Some(pd) = self.local_descriptor(property_name)? else {
            return Err(BeansError::UnknownProperty {
                bean_class: self.root_class_name.clone(),
                property_path: self.full_path(property_name),
                message: format!("No property '{}' found", property_name),
                possible_matches: Vec::new(),
            });
        };
        let error_path = self.full_path(property_name);
        self.convert_value(
            Some(property_name),
            Some(&error_path),
            None,
            value.into(),
            Some(pd.property_type()),
        )
    }

    /// 不关联属性的转换，只使用按类型注册的编辑器
    pub fn convert_if_necessary(&self, value: impl Into<Value>, required_type: &ValueType) -> BeansResult<Value> {
        self.convert_value(None, None, None, value.into(), Some(required_type))
    }

    // ========== 编辑器 ==========

    pub fn register_custom_editor(
        &mut self,
        required_type: Option<&ValueType>,
        property_path: Option<&str>,
        editor: EditorHandle,
    ) -> BeansResult<()> {
        self.registry
            .register_custom_editor(required_type, property_path, editor)
    }

    /// 查找自定义编辑器
    ///
    /// 只给出路径且没有按路径注册的编辑器时，以路径的类型查找按类型注册的编辑器。
    pub fn find_custom_editor(
        &mut self,
        required_type: Option<&ValueType>,
        property_path: Option<&str>,
    ) -> Option<EditorHandle> {
        if let Some(editor) = self.registry.find_custom_editor(required_type, property_path) {
            return Some(editor);
        }
        match (required_type, property_path) {
            (None, Some(path)) => {
                let property_type = self.get_property_type(path).ok().flatten()?;
                self.registry.find_custom_editor(Some(&property_type), None)
            }
            _ => None,
        }
    }

    // ========== 内部 ==========

    fn ensure_bound(&self) -> BeansResult<()> {
        if self.wrapped.is_null() {
            return Err(BeansError::fatal(
                "BeanWrapper does not hold a wrapped instance",
            ));
        }
        Ok(())
    }

    fn full_path(&self, property_name: &str) -> String {
        format!("{}{}", self.nested_path, property_name)
    }

    fn results(&self) -> BeansResult<Option<Arc<IntrospectionResults>>> {
        let Value::Bean(bean) = &self.wrapped else {
            return Ok(None);
        };
        self.results
            .get_or_try_init(|| self.introspection.for_class(&bean.bean_class()))
            .map(|results| Some(Arc::clone(results)))
    }

    fn local_descriptor(&self, property_name: &str) -> BeansResult<Option<Arc<GenericPropertyDescriptor>>> {
        Ok(self
            .results()?
            .and_then(|results| results.property_descriptor(property_name)))
    }

    fn property_handler(
        &mut self,
        property_path: &str,
    ) -> BeansResult<Option<Arc<GenericPropertyDescriptor>>> {
        self.ensure_bound()?;
        let (nested, final_path) = self.accessor_for_path(property_path)?;
        nested.local_descriptor(final_path)
    }

    /// 沿路径找到负责最后一段的访问器，返回该访问器和最后一段路径
    fn accessor_for_path<'p>(
        &mut self,
        property_path: &'p str,
    ) -> BeansResult<(&mut BeanWrapper, &'p str)> {
        match first_nested_separator(property_path) {
            Some(pos) => {
                let nested = self.nested_accessor(&property_path[..pos])?;
                nested.accessor_for_path(&property_path[pos + 1..])
            }
            None => Ok((self, property_path)),
        }
    }

    /// 写入时的导航，中间属性不可读视为目标不可写
    fn accessor_for_path_writing<'p>(
        &mut self,
        property_path: &'p str,
    ) -> BeansResult<(&mut BeanWrapper, &'p str)> {
        let root_class_name = self.root_class_name.clone();
        let full_path = self.full_path(property_path);
        self.accessor_for_path(property_path).map_err(|e| match e {
            BeansError::NotReadable { .. } => BeansError::NotWritable {
                bean_class: root_class_name,
                property_path: full_path,
                message: format!("Nested property in path '{}' does not exist", property_path),
                possible_matches: Vec::new(),
            },
            other => other,
        })
    }

    /// 获取嵌套属性的访问器，必要时创建默认值
    fn nested_accessor(&mut self, nested_property: &str) -> BeansResult<&mut BeanWrapper> {
        let tokens = PropertyTokens::parse(nested_property);
        let canonical_name = tokens.canonical_name.clone();
        let mut value = self.get_value_for_tokens(&tokens)?;
        if value.is_null() {
            if !self.auto_grow_nested_paths {
                return Err(BeansError::navigation(
                    &self.root_class_name,
                    self.full_path(&canonical_name),
                    format!("Value of nested property '{}' is null", canonical_name),
                ));
            }
            value = self.set_default_value(&tokens)?;
        }

        let reusable = self
            .nested_accessors
            .get(&canonical_name)
            .map_or(false, |nested| nested.wrapped.same_instance(&value));
        if reusable {
            tracing::trace!(
                "Using cached nested property accessor for property '{}'",
                canonical_name
            );
        } else {
            tracing::trace!(
                "Creating new nested BeanWrapper for property '{}'",
                canonical_name
            );
            let nested = self.new_nested_accessor(value, &canonical_name);
            self.nested_accessors.insert(canonical_name.clone(), nested);
        }
        self.nested_accessors
            .get_mut(&canonical_name)
            .ok_or_else(|| BeansError::fatal(format!("Nested accessor for '{}' is missing", canonical_name)))
    }

    fn new_nested_accessor(&self, value: Value, canonical_name: &str) -> BeanWrapper {
        let mut registry = PropertyEditorRegistry::new();
        self.registry.copy_default_editors_to(&mut registry);
        self.registry
            .copy_custom_editors_to(&mut registry, Some(canonical_name));
        BeanWrapper {
            wrapped: value,
            nested_path: format!("{}{}.", self.nested_path, canonical_name),
            root_class_name: self.root_class_name.clone(),
            registry,
            conversion_service: self.conversion_service.clone(),
            introspection: Arc::clone(&self.introspection),
            auto_grow_nested_paths: self.auto_grow_nested_paths,
            auto_grow_collection_limit: self.auto_grow_collection_limit,
            extract_old_value_for_editor: self.extract_old_value_for_editor,
            results: OnceCell::new(),
            nested_accessors: HashMap::new(),
        }
    }

    /// 转换值
    ///
    /// `editor_path` 用于查找按路径注册的编辑器，`error_path` 写入错误信息。
    fn convert_value(
        &self,
        editor_path: Option<&str>,
        error_path: Option<&str>,
        old_value: Option<&Value>,
        value: Value,
        required_type: Option<&ValueType>,
    ) -> BeansResult<Value> {
        TypeConverterDelegate::new(&self.registry, self.conversion_service.as_deref())
            .convert_if_necessary(editor_path, old_value, value.clone(), required_type)
            .map_err(|failure| failure.into_type_mismatch(error_path, value, required_type))
    }
}

impl std::fmt::Debug for BeanWrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BeanWrapper")
            .field("wrapped", &self.wrapped)
            .field("nested_path", &self.nested_path)
            .field("nested_accessors", &self.nested_accessors.keys().collect::<Vec<_>>())
            .finish()
    }
}
