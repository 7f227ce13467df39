//! Bean 内省
//!
//! - [`StandardIntrospector`]：按 getter/setter 命名约定发现属性
//! - [`BeanInfoFactory`]：可插拔的 BeanInfo 来源，按优先级依次询问
//! - [`IntrospectionCache`]：按类缓存内省结果，按类加载器决定缓存强弱并支持清理

mod cache;
mod factory;
mod standard;

pub use cache::IntrospectionCache;
pub use factory::{
    load_bean_info_factories, BeanInfoFactory, BeanInfoFactorySubmission, ExtendedBeanInfoFactory,
};
pub use standard::StandardIntrospector;

use crate::class::{ClassRef, MethodDef};
use crate::error::{BeansError, BeansResult};
use crate::utils::naming::{capitalize, uncapitalize};
use crate::value::{OpaqueType, ValueType};
use indexmap::IndexMap;
use std::sync::Arc;

/// 原始属性描述符
#[derive(Debug, Clone)]
pub struct PropertyDescriptor {
    name: String,
    property_type: Option<ValueType>,
    read_method: Option<Arc<MethodDef>>,
    write_method: Option<Arc<MethodDef>>,
}

impl PropertyDescriptor {
    /// 创建属性描述符，读写方法的类型必须一致
    pub fn new(
        name: impl Into<String>,
        read_method: Option<Arc<MethodDef>>,
        write_method: Option<Arc<MethodDef>>,
    ) -> BeansResult<Self> {
        let name = name.into();
        let read_type = read_method.as_ref().and_then(|m| m.return_type().cloned());
        let write_type = write_method.as_ref().and_then(|m| m.params().first().cloned());
        if let (Some(r), Some(w)) = (&read_type, &write_type) {
            if r != w {
                return Err(BeansError::Introspection {
                    class_name: read_method
                        .as_ref()
                        .map(|m| m.declaring_class().to_string())
                        .unwrap_or_default(),
                    message: format!(
                        "type mismatch between read and write methods of property '{}': {} vs {}",
                        name, r, w
                    ),
                });
            }
        }
        Ok(Self {
            name,
            property_type: read_type.or(write_type),
            read_method,
            write_method,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn property_type(&self) -> Option<&ValueType> {
        self.property_type.as_ref()
    }

    pub fn read_method(&self) -> Option<&Arc<MethodDef>> {
        self.read_method.as_ref()
    }

    pub fn write_method(&self) -> Option<&Arc<MethodDef>> {
        self.write_method.as_ref()
    }

    pub(crate) fn set_write_method(&mut self, method: Arc<MethodDef>) {
        if self.property_type.is_none() {
            self.property_type = method.params().first().cloned();
        }
        self.write_method = Some(method);
    }
}

/// 一个类的属性描述集合
#[derive(Debug, Clone, Default)]
pub struct BeanInfo {
    descriptors: Vec<PropertyDescriptor>,
}

impl BeanInfo {
    pub fn new(descriptors: Vec<PropertyDescriptor>) -> Self {
        Self { descriptors }
    }

    pub fn property_descriptors(&self) -> &[PropertyDescriptor] {
        &self.descriptors
    }

    pub(crate) fn property_descriptors_mut(&mut self) -> &mut Vec<PropertyDescriptor> {
        &mut self.descriptors
    }
}

/// 解析了泛型类型变量的属性描述符
#[derive(Debug, Clone)]
pub struct GenericPropertyDescriptor {
    name: String,
    bean_class_name: String,
    property_type: ValueType,
    read_method: Option<Arc<MethodDef>>,
    write_method: Option<Arc<MethodDef>>,
}

impl GenericPropertyDescriptor {
    pub fn new(bean_class: &ClassRef, raw: &PropertyDescriptor) -> Self {
        let declared = raw.property_type().cloned().unwrap_or(ValueType::Any);
        Self {
            name: raw.name().to_string(),
            bean_class_name: bean_class.name().to_string(),
            property_type: resolve_variables(bean_class, &declared),
            read_method: raw.read_method().cloned(),
            write_method: raw.write_method().cloned(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bean_class_name(&self) -> &str {
        &self.bean_class_name
    }

    /// 解析后的属性类型，包含集合与映射的元素类型
    pub fn property_type(&self) -> &ValueType {
        &self.property_type
    }

    pub fn read_method(&self) -> Option<&Arc<MethodDef>> {
        self.read_method.as_ref()
    }

    pub fn write_method(&self) -> Option<&Arc<MethodDef>> {
        self.write_method.as_ref()
    }

    pub fn is_readable(&self) -> bool {
        self.read_method.is_some()
    }

    pub fn is_writable(&self) -> bool {
        self.write_method.is_some()
    }
}

fn resolve_variables(class: &ClassRef, ty: &ValueType) -> ValueType {
    match ty {
        ValueType::Variable(name) => class
            .resolve_type_variable(name)
            .map(|resolved| resolve_variables(class, &resolved))
            .unwrap_or(ValueType::Any),
        ValueType::Array(e) => ValueType::array_of(resolve_variables(class, e)),
        ValueType::List(e) => ValueType::list_of(resolve_variables(class, e)),
        ValueType::Set(e) => ValueType::set_of(resolve_variables(class, e)),
        ValueType::Map(k, v) => {
            ValueType::map_of(resolve_variables(class, k), resolve_variables(class, v))
        }
        other => other.clone(),
    }
}

fn is_unsafe_type(ty: Option<&ValueType>) -> bool {
    matches!(
        ty,
        Some(ValueType::Opaque(t)) if *t == OpaqueType::CLASS_LOADER || *t == OpaqueType::PROTECTION_DOMAIN
    )
}

/// 一个类的内省结果
#[derive(Debug)]
pub struct IntrospectionResults {
    bean_class: ClassRef,
    bean_info: BeanInfo,
    descriptors: IndexMap<String, Arc<GenericPropertyDescriptor>>,
}

impl IntrospectionResults {
    pub(crate) fn build(
        bean_class: &ClassRef,
        factories: &[Arc<dyn BeanInfoFactory>],
        introspector: &StandardIntrospector,
        ignore_bean_info_classes: bool,
    ) -> BeansResult<Self> {
        let mut bean_info = None;
        for factory in factories {
            if let Some(info) = factory.bean_info(bean_class, introspector)? {
                tracing::trace!(
                    "Using BeanInfo from factory '{}' for class [{}]",
                    factory.name(),
                    bean_class.name()
                );
                bean_info = Some(info);
                break;
            }
        }
        let bean_info = match bean_info {
            Some(info) => info,
            None => introspector.bean_info(bean_class, ignore_bean_info_classes),
        };

        // 此后以本缓存为准，不在内省器中重复保留
        for class in bean_class.hierarchy() {
            introspector.flush_from_caches(&class);
        }

        let mut descriptors = IndexMap::new();
        for pd in bean_info.property_descriptors() {
            if is_unsafe_type(pd.property_type()) {
                continue;
            }
            tracing::trace!(
                "Found bean property '{}' of type [{}] on class [{}]",
                pd.name(),
                pd.property_type().map(ToString::to_string).unwrap_or_default(),
                bean_class.name()
            );
            descriptors.insert(
                pd.name().to_string(),
                Arc::new(GenericPropertyDescriptor::new(bean_class, pd)),
            );
        }

        // 记录式访问器：与字段同名的无参读方法
        for class in bean_class.hierarchy() {
            for method in class.declared_methods() {
                let name = method.name();
                if !method.is_reader()
                    || descriptors.contains_key(name)
                    || is_unsafe_type(method.return_type())
                    || class.find_field(name).is_none()
                {
                    continue;
                }
                let raw = PropertyDescriptor::new(name, Some(Arc::clone(method)), None)?;
                descriptors.insert(
                    name.to_string(),
                    Arc::new(GenericPropertyDescriptor::new(bean_class, &raw)),
                );
            }
        }

        Ok(Self {
            bean_class: bean_class.clone(),
            bean_info,
            descriptors,
        })
    }

    pub fn bean_class(&self) -> &ClassRef {
        &self.bean_class
    }

    pub fn bean_info(&self) -> &BeanInfo {
        &self.bean_info
    }

    /// 按名称查找属性描述符
    ///
    /// 找不到时依次尝试首字母小写和首字母大写的名称。
    pub fn property_descriptor(&self, name: &str) -> Option<Arc<GenericPropertyDescriptor>> {
        if let Some(pd) = self.descriptors.get(name) {
            return Some(Arc::clone(pd));
        }
        if name.is_empty() {
            return None;
        }
        self.descriptors
            .get(&uncapitalize(name))
            .or_else(|| self.descriptors.get(&capitalize(name)))
            .cloned()
    }

    /// 所有属性描述符，保持发现顺序
    pub fn property_descriptors(&self) -> Vec<Arc<GenericPropertyDescriptor>> {
        self.descriptors.values().cloned().collect()
    }

    pub fn property_names(&self) -> Vec<&str> {
        self.descriptors.keys().map(String::as_str).collect()
    }
}
