//! 属性访问错误
//!
//! 所有属性访问相关的失败都归入 [`BeansError`]。批量更新时可恢复的错误会被收集到
//! [`PropertyBatchUpdateError`] 中统一返回。

use crate::value::{Value, ValueType};
use std::fmt;
use thiserror::Error;

/// Bean 属性访问错误
#[derive(Debug, Error)]
pub enum BeansError {
    /// 嵌套路径中遇到 null 值且未开启自动增长，或者无法为中间属性创建默认值
    #[error("Invalid property '{property_path}' of bean class [{bean_class}]: {message}")]
    Navigation {
        bean_class: String,
        property_path: String,
        message: String,
    },

    /// 找不到对应的属性描述符
    #[error("Invalid property '{property_path}' of bean class [{bean_class}]: {message}")]
    UnknownProperty {
        bean_class: String,
        property_path: String,
        message: String,
        possible_matches: Vec<String>,
    },

    /// 属性存在但不可写
    #[error("Invalid property '{property_path}' of bean class [{bean_class}]: {message}")]
    NotWritable {
        bean_class: String,
        property_path: String,
        message: String,
        possible_matches: Vec<String>,
    },

    /// 属性存在但不可读
    #[error("Invalid property '{property_path}' of bean class [{bean_class}]: {message}")]
    NotReadable {
        bean_class: String,
        property_path: String,
        message: String,
    },

    /// 索引越界、非数字索引或不支持索引访问的容器类型
    #[error("Invalid property '{property_path}' of bean class [{bean_class}]: {message}")]
    Index {
        bean_class: String,
        property_path: String,
        message: String,
        cause: Option<Box<BeansError>>,
    },

    /// 类型转换失败
    #[error("{message}")]
    TypeMismatch {
        property_path: Option<String>,
        value: Value,
        required_type: Option<ValueType>,
        message: String,
        /// 没有找到任何可用的编辑器或转换策略
        not_supported: bool,
        cause: Option<anyhow::Error>,
    },

    /// 访问器方法调用失败
    #[error("Property '{property_path}' threw exception: {cause}")]
    Invocation {
        property_path: String,
        cause: anyhow::Error,
    },

    /// 合并属性值失败
    #[error("Cannot merge property '{property_name}': {message}")]
    Merge {
        property_name: String,
        message: String,
    },

    /// 批量更新中收集到的错误
    #[error(transparent)]
    Batch(#[from] PropertyBatchUpdateError),

    /// 无法获取类型的 BeanInfo
    #[error("Failed to obtain BeanInfo for class [{class_name}]: {message}")]
    Introspection { class_name: String, message: String },

    /// 不可恢复的错误
    #[error("{message}")]
    Fatal { message: String },
}

impl BeansError {
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal {
            message: message.into(),
        }
    }

    pub fn navigation(
        bean_class: impl Into<String>,
        property_path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Navigation {
            bean_class: bean_class.into(),
            property_path: property_path.into(),
            message: message.into(),
        }
    }

    pub fn index(
        bean_class: impl Into<String>,
        property_path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Index {
            bean_class: bean_class.into(),
            property_path: property_path.into(),
            message: message.into(),
            cause: None,
        }
    }

    pub fn not_readable(bean_class: impl Into<String>, property_path: impl Into<String>) -> Self {
        let property_path = property_path.into();
        Self::NotReadable {
            bean_class: bean_class.into(),
            message: format!(
                "Bean property '{}' is not readable or has an invalid getter method: \
                 Does the return type of the getter match the parameter type of the setter?",
                property_path
            ),
            property_path,
        }
    }

    /// 是否为批量更新中可以收集并继续的错误
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Self::Fatal { .. } | Self::Introspection { .. } | Self::Batch(_) | Self::Merge { .. }
        )
    }

    /// 属性路径本身无效：无法导航、属性不存在、不可读写或索引无效
    pub fn is_invalid_property(&self) -> bool {
        matches!(
            self,
            Self::Navigation { .. }
                | Self::UnknownProperty { .. }
                | Self::NotWritable { .. }
                | Self::NotReadable { .. }
                | Self::Index { .. }
        )
    }

    /// 出错的属性路径（如果有）
    pub fn property_path(&self) -> Option<&str> {
        match self {
            Self::Navigation { property_path, .. }
            | Self::UnknownProperty { property_path, .. }
            | Self::NotWritable { property_path, .. }
            | Self::NotReadable { property_path, .. }
            | Self::Index { property_path, .. }
            | Self::Invocation { property_path, .. } => Some(property_path),
            Self::TypeMismatch { property_path, .. } => property_path.as_deref(),
            Self::Merge { property_name, .. } => Some(property_name),
            _ => None,
        }
    }

    /// 相近的属性名（仅 UnknownProperty / NotWritable）
    pub fn possible_matches(&self) -> &[String] {
        match self {
            Self::UnknownProperty {
                possible_matches, ..
            }
            | Self::NotWritable {
                possible_matches, ..
            } => possible_matches,
            _ => &[],
        }
    }
}

/// 批量更新错误
///
/// 批量应用属性值时，每个可恢复的错误都会被记录下来，已经成功应用的属性不会回滚。
#[derive(Debug, Error)]
pub struct PropertyBatchUpdateError {
    errors: Vec<BeansError>,
}

impl PropertyBatchUpdateError {
    pub fn new(errors: Vec<BeansError>) -> Self {
        Self { errors }
    }

    pub fn errors(&self) -> &[BeansError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<BeansError> {
        self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// 指定属性路径对应的错误
    pub fn error_for(&self, property_path: &str) -> Option<&BeansError> {
        self.errors
            .iter()
            .find(|e| e.property_path() == Some(property_path))
    }
}

impl fmt::Display for PropertyBatchUpdateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Failed properties: {} error(s) during batch update",
            self.errors.len()
        )?;
        for error in &self.errors {
            write!(f, "; {}", error)?;
        }
        Ok(())
    }
}

/// 属性访问结果类型
pub type BeansResult<T> = Result<T, BeansError>;
