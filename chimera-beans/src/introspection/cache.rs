use super::{load_bean_info_factories, BeanInfoFactory, IntrospectionResults, StandardIntrospector};
use crate::class::{ClassLoader, ClassRef};
use crate::config::AccessorSettings;
use crate::error::BeansResult;
use lru::LruCache;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

struct ClassCache {
    /// 缓存安全的类，只能显式清理
    strong: HashMap<ClassRef, Arc<IntrospectionResults>>,
    /// 其他类，容量满时淘汰最久未用的条目
    reclaimable: LruCache<ClassRef, Arc<IntrospectionResults>>,
}

/// 按类缓存内省结果
///
/// 类的加载器是容器加载器本身或其祖先、或者被显式接受时，结果被强引用保留，
/// 直到 [`clear_class_loader`](Self::clear_class_loader) 清理；否则放入容量有限的可回收区，
/// 被淘汰的条目在下次访问时透明地重建。
///
/// 已接受的加载器集合与类缓存各用一把锁，两把锁不会同时持有。
pub struct IntrospectionCache {
    container_loader: ClassLoader,
    ignore_bean_info_classes: bool,
    factories: Vec<Arc<dyn BeanInfoFactory>>,
    introspector: StandardIntrospector,
    accepted_loaders: Mutex<Vec<ClassLoader>>,
    classes: Mutex<ClassCache>,
}

impl IntrospectionCache {
    /// 使用默认配置和全局注册的 BeanInfo 工厂
    pub fn new(container_loader: ClassLoader) -> Self {
        Self::with_settings(container_loader, &AccessorSettings::default())
    }

    pub fn with_settings(container_loader: ClassLoader, settings: &AccessorSettings) -> Self {
        Self::with_factories(container_loader, settings, load_bean_info_factories())
    }

    /// 显式指定 BeanInfo 工厂链
    pub fn with_factories(
        container_loader: ClassLoader,
        settings: &AccessorSettings,
        mut factories: Vec<Arc<dyn BeanInfoFactory>>,
    ) -> Self {
        factories.sort_by_key(|f| f.order());
        let capacity =
            NonZeroUsize::new(settings.reclaimable_cache_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            container_loader,
            ignore_bean_info_classes: settings.ignore_bean_info_classes,
            factories,
            introspector: StandardIntrospector::new(),
            accepted_loaders: Mutex::new(Vec::new()),
            classes: Mutex::new(ClassCache {
                strong: HashMap::new(),
                reclaimable: LruCache::new(capacity),
            }),
        }
    }

    pub fn container_loader(&self) -> &ClassLoader {
        &self.container_loader
    }

    pub fn introspector(&self) -> &StandardIntrospector {
        &self.introspector
    }

    /// 获取类的内省结果，未命中时构建并缓存
    ///
    /// 构建失败的结果不会被缓存。
    pub fn for_class(&self, class: &ClassRef) -> BeansResult<Arc<IntrospectionResults>> {
        if let Some(results) = self.lookup(class) {
            tracing::trace!("Introspection cache hit for class [{}]", class.name());
            return Ok(results);
        }

        let results = Arc::new(IntrospectionResults::build(
            class,
            &self.factories,
            &self.introspector,
            self.ignore_bean_info_classes,
        )?);

        let durable = self.is_cache_safe(class) || self.is_class_loader_accepted(class.loader());
        let mut cache = self.classes.lock();
        if let Some(existing) = cache.strong.get(class) {
            return Ok(Arc::clone(existing));
        }
        if let Some(existing) = cache.reclaimable.get(class) {
            return Ok(Arc::clone(existing));
        }
        if durable {
            cache.strong.insert(class.clone(), Arc::clone(&results));
        } else {
            tracing::debug!(
                "Not strongly caching class [{}] because it is not cache-safe",
                class.name()
            );
            cache.reclaimable.put(class.clone(), Arc::clone(&results));
        }
        Ok(results)
    }

    fn lookup(&self, class: &ClassRef) -> Option<Arc<IntrospectionResults>> {
        let mut cache = self.classes.lock();
        if let Some(results) = cache.strong.get(class) {
            return Some(Arc::clone(results));
        }
        cache.reclaimable.get(class).cloned()
    }

    /// 容器加载器是否就是类的加载器或其后代
    fn is_cache_safe(&self, class: &ClassRef) -> bool {
        self.container_loader.is_same_or_descendant_of(class.loader())
    }

    /// 接受一个加载器：它及其后代加载的类都会被强缓存
    pub fn accept_class_loader(&self, loader: &ClassLoader) {
        let mut accepted = self.accepted_loaders.lock();
        if !accepted.contains(loader) {
            tracing::debug!("Accepting class loader {:?}", loader);
            accepted.push(loader.clone());
        }
    }

    pub fn is_class_loader_accepted(&self, loader: &ClassLoader) -> bool {
        self.accepted_loaders
            .lock()
            .iter()
            .any(|accepted| loader.is_same_or_descendant_of(accepted))
    }

    /// 清理加载器：移除它及其后代加载的所有类，并取消其下的接受标记
    pub fn clear_class_loader(&self, loader: &ClassLoader) {
        {
            let mut accepted = self.accepted_loaders.lock();
            accepted.retain(|a| !a.is_same_or_descendant_of(loader));
        }

        let mut cache = self.classes.lock();
        let before = cache.strong.len() + cache.reclaimable.len();
        cache
            .strong
            .retain(|class, _| !class.loader().is_same_or_descendant_of(loader));
        let doomed: Vec<ClassRef> = cache
            .reclaimable
            .iter()
            .filter(|(class, _)| class.loader().is_same_or_descendant_of(loader))
            .map(|(class, _)| class.clone())
            .collect();
        for class in doomed {
            cache.reclaimable.pop(&class);
        }
        let removed = before - (cache.strong.len() + cache.reclaimable.len());
        tracing::debug!("Cleared {} cached classes for class loader {:?}", removed, loader);
    }

    /// 类是否在缓存中
    pub fn contains(&self, class: &ClassRef) -> bool {
        let cache = self.classes.lock();
        cache.strong.contains_key(class) || cache.reclaimable.contains(class)
    }

    pub fn strong_len(&self) -> usize {
        self.classes.lock().strong.len()
    }

    pub fn reclaimable_len(&self) -> usize {
        self.classes.lock().reclaimable.len()
    }

    pub fn clear(&self) {
        let mut cache = self.classes.lock();
        cache.strong.clear();
        cache.reclaimable.clear();
    }
}

impl Default for IntrospectionCache {
    fn default() -> Self {
        Self::new(ClassLoader::system())
    }
}
