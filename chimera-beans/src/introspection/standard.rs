use super::{BeanInfo, PropertyDescriptor};
use crate::class::{ClassRef, MethodDef};
use crate::utils::naming::decapitalize;
use crate::value::{PrimitiveKind, ValueType};
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// 按 getter/setter 命名约定发现属性的默认内省器
///
/// - 无参且有返回值的 `getXxx` 为读方法，`boolean` 属性也可以使用 `isXxx`
/// - 单参数且返回 void 的 `setXxx` 为写方法
/// - 写方法的参数类型与读方法返回类型不一致时丢弃写方法
///
/// 内省器自带一层缓存，[`IntrospectionCache`](super::IntrospectionCache) 接管结果后会清掉这里的条目。
#[derive(Default)]
pub struct StandardIntrospector {
    cache: Mutex<HashMap<ClassRef, BeanInfo>>,
}

impl StandardIntrospector {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取类的 BeanInfo
    ///
    /// 类自带显式 BeanInfo 时直接使用，除非 `ignore_explicit_bean_info` 为 true。
    pub fn bean_info(&self, class: &ClassRef, ignore_explicit_bean_info: bool) -> BeanInfo {
        if let Some(info) = self.cache.lock().get(class) {
            return info.clone();
        }

        let info = match class.explicit_bean_info() {
            Some(explicit) if !ignore_explicit_bean_info => explicit.clone(),
            _ => Self::introspect(class),
        };
        self.cache.lock().insert(class.clone(), info.clone());
        info
    }

    /// 从内部缓存中移除类
    pub fn flush_from_caches(&self, class: &ClassRef) {
        self.cache.lock().remove(class);
    }

    pub fn is_cached(&self, class: &ClassRef) -> bool {
        self.cache.lock().contains_key(class)
    }

    pub fn clear(&self) {
        self.cache.lock().clear();
    }

    /// 类及父类、接口上可见的方法，子类覆盖父类的同名同参方法
    pub(crate) fn visible_methods(class: &ClassRef) -> Vec<Arc<MethodDef>> {
        let mut methods: IndexMap<(String, Vec<ValueType>), Arc<MethodDef>> = IndexMap::new();
        for c in class.hierarchy().iter().rev() {
            for interface in c.interfaces() {
                for m in Self::visible_methods(interface) {
                    methods
                        .entry((m.name().to_string(), m.params().to_vec()))
                        .or_insert(m);
                }
            }
            for m in c.declared_methods() {
                methods.insert((m.name().to_string(), m.params().to_vec()), Arc::clone(m));
            }
        }
        methods.into_values().collect()
    }

    fn introspect(class: &ClassRef) -> BeanInfo {
        tracing::trace!("Introspecting bean class [{}]", class.name());

        let mut readers: BTreeMap<String, Arc<MethodDef>> = BTreeMap::new();
        let mut writers: BTreeMap<String, Vec<Arc<MethodDef>>> = BTreeMap::new();

        for method in Self::visible_methods(class) {
            let name = method.name();
            if method.is_reader() {
                if let Some(rest) = name.strip_prefix("get").filter(|r| !r.is_empty()) {
                    readers.entry(decapitalize(rest)).or_insert(method);
                } else if let Some(rest) = name.strip_prefix("is").filter(|r| !r.is_empty()) {
                    if method.return_type() == Some(&ValueType::Primitive(PrimitiveKind::Bool)) {
                        // isXxx 优先于 getXxx
                        readers.insert(decapitalize(rest), method);
                    }
                }
            } else if method.is_writer() && method.return_type().is_none() {
                if let Some(rest) = name.strip_prefix("set").filter(|r| !r.is_empty()) {
                    writers.entry(decapitalize(rest)).or_default().push(method);
                }
            }
        }

        let mut names: Vec<String> = readers.keys().cloned().collect();
        names.extend(writers.keys().filter(|n| !readers.contains_key(*n)).cloned());
        names.sort();

        let mut descriptors = Vec::with_capacity(names.len());
        for name in names {
            let read = readers.get(&name).cloned();
            let candidates = writers.remove(&name).unwrap_or_default();
            let write = match &read {
                Some(r) => candidates
                    .into_iter()
                    .find(|w| w.params().first() == r.return_type()),
                None => candidates.into_iter().next(),
            };
            // 读写类型已在上面对齐，这里不会失败
            if let Ok(pd) = PropertyDescriptor::new(name, read, write) {
                descriptors.push(pd);
            }
        }
        BeanInfo::new(descriptors)
    }
}
