//! 属性访问配置
//!
//! 支持从 TOML（可选的 `[beans]` 表）和带前缀的环境变量读取。

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// 默认环境变量前缀
pub const DEFAULT_ENV_PREFIX: &str = "CHIMERA_BEANS_";

/// 属性访问器与内省缓存的配置
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AccessorSettings {
    /// 嵌套路径遇到 null 时是否自动创建默认值（默认：false）
    pub auto_grow_nested_paths: bool,

    /// 自动增长的索引上限（默认：不限）
    pub auto_grow_collection_limit: usize,

    /// 转换前是否读取旧值交给编辑器（默认：false）
    pub extract_old_value_for_editor: bool,

    /// 是否启用默认编辑器（默认：true）
    pub default_editors_active: bool,

    /// 是否注册配置值编辑器，把逗号分隔的文本转换为数组（默认：false）
    pub config_value_editors: bool,

    /// 是否忽略类上的显式 BeanInfo（默认：false）
    pub ignore_bean_info_classes: bool,

    /// 非缓存安全类的结果最多保留多少个（默认：256）
    pub reclaimable_cache_capacity: usize,
}

impl Default for AccessorSettings {
    fn default() -> Self {
        Self {
            auto_grow_nested_paths: false,
            auto_grow_collection_limit: usize::MAX,
            extract_old_value_for_editor: false,
            default_editors_active: true,
            config_value_editors: false,
            ignore_bean_info_classes: false,
            reclaimable_cache_capacity: 256,
        }
    }
}

impl AccessorSettings {
    pub fn new() -> Self {
        Self::default()
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

    pub fn config_value_editors(mut self, enabled: bool) -> Self {
        self.config_value_editors = enabled;
        self
    }

    pub fn ignore_bean_info_classes(mut self, ignore: bool) -> Self {
        self.ignore_bean_info_classes = ignore;
        self
    }

    pub fn reclaimable_cache_capacity(mut self, capacity: usize) -> Self {
        self.reclaimable_cache_capacity = capacity;
        self
    }

    /// 从 TOML 文本读取
    ///
    /// 存在 `[beans]` 表时只读取该表，否则读取顶层。
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let value: toml::Value =
            toml::from_str(content).context("Failed to parse accessor settings")?;
        let beans = value.get("beans").filter(|b| b.is_table()).cloned();
        let section = beans.unwrap_or(value);
        Self::deserialize(section).context("Invalid accessor settings")
    }

    /// 从 TOML 文件读取
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// 从默认前缀的环境变量读取
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides(DEFAULT_ENV_PREFIX)
    }

    /// 用带前缀的环境变量覆盖当前配置
    ///
    /// 变量名为前缀加上大写下划线形式的字段名，例如 `CHIMERA_BEANS_AUTO_GROW_NESTED_PATHS`。
    pub fn with_env_overrides(mut self, prefix: &str) -> Result<Self> {
        override_from_env(prefix, "AUTO_GROW_NESTED_PATHS", &mut self.auto_grow_nested_paths)?;
        override_from_env(
            prefix,
            "AUTO_GROW_COLLECTION_LIMIT",
            &mut self.auto_grow_collection_limit,
        )?;
        override_from_env(
            prefix,
            "EXTRACT_OLD_VALUE_FOR_EDITOR",
            &mut self.extract_old_value_for_editor,
        )?;
        override_from_env(prefix, "DEFAULT_EDITORS_ACTIVE", &mut self.default_editors_active)?;
        override_from_env(prefix, "CONFIG_VALUE_EDITORS", &mut self.config_value_editors)?;
        override_from_env(
            prefix,
            "IGNORE_BEAN_INFO_CLASSES",
            &mut self.ignore_bean_info_classes,
        )?;
        override_from_env(
            prefix,
            "RECLAIMABLE_CACHE_CAPACITY",
            &mut self.reclaimable_cache_capacity,
        )?;
        Ok(self)
    }
}

fn override_from_env<T>(prefix: &str, key: &str, target: &mut T) -> Result<()>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let name = format!("{}{}", prefix, key);
    if let Ok(raw) = std::env::var(&name) {
        *target = raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {}: {}", name, raw))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = AccessorSettings::default();
        assert!(!settings.auto_grow_nested_paths);
        assert_eq!(settings.auto_grow_collection_limit, usize::MAX);
        assert!(settings.default_editors_active);
        assert_eq!(settings.reclaimable_cache_capacity, 256);
    }

    #[test]
    fn test_from_toml_with_beans_table() {
        let settings = AccessorSettings::from_toml_str(
            r#"
            [server]
            port = 8080

            [beans]
            auto-grow-nested-paths = true
            auto-grow-collection-limit = 100
            "#,
        )
        .unwrap();
        assert!(settings.auto_grow_nested_paths);
        assert_eq!(settings.auto_grow_collection_limit, 100);
        assert!(!settings.extract_old_value_for_editor);
    }

    #[test]
    fn test_from_toml_top_level() {
        let settings =
            AccessorSettings::from_toml_str("config-value-editors = true\n").unwrap();
        assert!(settings.config_value_editors);
        assert!(AccessorSettings::from_toml_str("auto-grow-nested-paths = 3").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let prefix = "CHIMERA_BEANS_TEST_ENV_";
        std::env::set_var(format!("{}AUTO_GROW_NESTED_PATHS", prefix), "true");
        std::env::set_var(format!("{}RECLAIMABLE_CACHE_CAPACITY", prefix), "8");
        let settings = AccessorSettings::default().with_env_overrides(prefix).unwrap();
        assert!(settings.auto_grow_nested_paths);
        assert_eq!(settings.reclaimable_cache_capacity, 8);

        std::env::set_var(format!("{}IGNORE_BEAN_INFO_CLASSES", prefix), "maybe");
        assert!(AccessorSettings::default().with_env_overrides(prefix).is_err());
    }
}
