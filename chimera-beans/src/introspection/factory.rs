//! BeanInfo 工厂
//!
//! 工厂通过 `inventory` 全局注册，按 `order()` 从小到大依次询问，第一个返回 `Some` 的结果生效。

use super::{BeanInfo, PropertyDescriptor, StandardIntrospector};
use crate::class::ClassRef;
use crate::error::BeansResult;
use crate::utils::naming::decapitalize;
use std::sync::Arc;

/// 最低优先级
pub const LOWEST_PRECEDENCE: i32 = i32::MAX;

/// BeanInfo 来源
pub trait BeanInfoFactory: Send + Sync {
    /// 工厂名称
    fn name(&self) -> &str;

    /// 优先级（数字越小优先级越高）
    fn order(&self) -> i32 {
        0
    }

    /// 返回类的 BeanInfo；返回 None 表示交给下一个工厂
    fn bean_info(
        &self,
        class: &ClassRef,
        introspector: &StandardIntrospector,
    ) -> BeansResult<Option<BeanInfo>>;
}

/// 用于全局注册 BeanInfo 工厂的宏
#[macro_export]
macro_rules! submit_bean_info_factory {
    ($factory_type:ty) => {
        $crate::inventory::submit! {
            $crate::introspection::BeanInfoFactorySubmission {
                create: || ::std::sync::Arc::new(<$factory_type>::default())
            }
        }
    };
}

/// BeanInfo 工厂提交结构
pub struct BeanInfoFactorySubmission {
    pub create: fn() -> Arc<dyn BeanInfoFactory>,
}

inventory::collect!(BeanInfoFactorySubmission);

inventory::submit! {
    BeanInfoFactorySubmission {
        create: || Arc::new(ExtendedBeanInfoFactory)
    }
}

/// 加载所有已注册的工厂，按优先级排序
pub fn load_bean_info_factories() -> Vec<Arc<dyn BeanInfoFactory>> {
    let mut factories: Vec<Arc<dyn BeanInfoFactory>> = inventory::iter::<BeanInfoFactorySubmission>
        .into_iter()
        .map(|submission| (submission.create)())
        .collect();
    factories.sort_by_key(|f| f.order());
    for factory in &factories {
        tracing::debug!("Registering BeanInfo factory: {}", factory.name());
    }
    factories
}

/// 把返回非 void 的 `setXxx` 方法也识别为写方法
///
/// 只处理确实声明了这类方法的类，其他类交给默认内省。
#[derive(Debug, Default, Clone, Copy)]
pub struct ExtendedBeanInfoFactory;

impl ExtendedBeanInfoFactory {
    fn fluent_setters(class: &ClassRef) -> Vec<(String, Arc<crate::class::MethodDef>)> {
        StandardIntrospector::visible_methods(class)
            .into_iter()
            .filter(|m| m.is_writer() && m.return_type().is_some())
            .filter_map(|m| {
                let property = m
                    .name()
                    .strip_prefix("set")
                    .filter(|rest| !rest.is_empty())
                    .map(decapitalize)?;
                Some((property, m))
            })
            .collect()
    }
}

impl BeanInfoFactory for ExtendedBeanInfoFactory {
    fn name(&self) -> &str {
        "extended"
    }

    fn order(&self) -> i32 {
        LOWEST_PRECEDENCE
    }

    fn bean_info(
        &self,
        class: &ClassRef,
        introspector: &StandardIntrospector,
    ) -> BeansResult<Option<BeanInfo>> {
        let setters = Self::fluent_setters(class);
        if setters.is_empty() {
            return Ok(None);
        }

        let mut info = introspector.bean_info(class, false);
        for (property, method) in setters {
            let descriptors = info.property_descriptors_mut();
            match descriptors.iter().position(|pd| pd.name() == property) {
                Some(index) => {
                    let pd = &mut descriptors[index];
                    let compatible = pd.property_type().is_none()
                        || pd.property_type() == method.params().first();
                    if pd.write_method().is_none() && compatible {
                        pd.set_write_method(method);
                    }
                }
                None => {
                    descriptors.push(PropertyDescriptor::new(property, None, Some(method))?);
                }
            }
        }
        Ok(Some(info))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::BeanClass;
    use crate::value::ValueType;

    #[test]
    fn test_extended_factory_is_registered() {
        let factories = load_bean_info_factories();
        assert!(factories.iter().any(|f| f.name() == "extended"));
    }

    #[test]
    fn test_fluent_setters_become_writable() {
        let class = BeanClass::dynamic("Builder")
            .fluent("name", ValueType::String)
            .build();
        let introspector = StandardIntrospector::new();
        let info = ExtendedBeanInfoFactory
            .bean_info(&class, &introspector)
            .unwrap()
            .unwrap();
        let name = &info.property_descriptors()[0];
        assert!(name.read_method().is_some());
        assert!(name.write_method().is_some());
    }

    #[test]
    fn test_plain_classes_are_declined() {
        let class = BeanClass::dynamic("Plain")
            .property("name", ValueType::String)
            .build();
        let result = ExtendedBeanInfoFactory
            .bean_info(&class, &StandardIntrospector::new())
            .unwrap();
        assert!(result.is_none());
    }
}
