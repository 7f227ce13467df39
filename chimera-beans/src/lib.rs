// chimera-beans: Bean 属性访问
//
// 以路径表达式读写对象图中的属性，支持：
// - 嵌套属性与数组、列表、集合、映射的索引访问
// - 按类型或按路径注册的属性编辑器，以及可插拔的转换服务
// - 按类缓存的内省结果，可按类加载器清理
// - 嵌套路径的自动增长与批量更新的错误汇总

pub mod class;
pub mod config;
pub mod convert;
pub mod editor;
pub mod error;
pub mod introspection;
pub mod logging;
pub mod matches;
pub mod path;
pub mod property_value;
pub mod utils;
pub mod value;
pub mod wrapper;

// 重新导出常用类型
pub use class::{
    Bean, BeanClass, BeanRef, ClassLoader, ClassRef, DynamicBean, InvokeError, MethodDef,
};
pub use config::AccessorSettings;
pub use convert::{
    ConversionService, GenericConversionService, SimpleTypeConverter, TypeConverterDelegate,
};
pub use editor::{EditorHandle, PropertyEditor, PropertyEditorRegistry};
pub use error::{BeansError, BeansResult, PropertyBatchUpdateError};
pub use introspection::{
    BeanInfo, BeanInfoFactory, GenericPropertyDescriptor, IntrospectionCache,
    IntrospectionResults, PropertyDescriptor,
};
pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use matches::PropertyMatches;
pub use path::PropertyTokens;
pub use property_value::{MutablePropertyValues, PropertyValue, PropertyValues};
pub use value::{PrimitiveKind, Value, ValueType};
pub use wrapper::BeanWrapper;

// 导出 inventory，供 submit_bean_info_factory! 宏使用
pub use inventory;

/// Prelude 模块，包含常用的 traits 和类型
pub mod prelude {
    pub use crate::class::{Bean, BeanClass, BeanRef, ClassRef};
    pub use crate::config::AccessorSettings;
    pub use crate::convert::ConversionService;
    pub use crate::editor::{EditorHandle, PropertyEditor};
    pub use crate::error::{BeansError, BeansResult};
    pub use crate::property_value::{MutablePropertyValues, PropertyValue, PropertyValues};
    pub use crate::value::{Mergeable, Value, ValueType};
    pub use crate::wrapper::BeanWrapper;
}
