//! 日志初始化
//!
//! 库内部只通过 `tracing` 宏输出日志。需要查看属性访问细节（缓存命中、自动增长、
//! 被忽略的属性等）的应用可以用 [`LoggingConfig`] 安装一个 `fmt` 订阅者。

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use tracing_subscriber::{fmt as subscriber_fmt, EnvFilter};

/// 本 crate 的日志目标
pub const LOG_TARGET: &str = "chimera_beans";

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl FromStr for LogLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(anyhow!("Invalid log level: {}", other)),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// 输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// 单行紧凑格式
    Compact,
    Full,
    Json,
    /// 多行格式，适合开发时阅读
    Pretty,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "full" => Ok(Self::Full),
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            other => Err(anyhow!("Invalid log format: {}", other)),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct LoggingConfig {
    /// 本 crate 的日志级别（默认：Warn）
    pub level: LogLevel,

    /// 输出格式（默认：Compact）
    pub format: LogFormat,

    /// 是否输出模块路径（默认：true）
    pub show_target: bool,

    /// 是否输出线程 ID（默认：false）
    pub show_thread_ids: bool,

    /// 完整的过滤指令，设置后忽略 `level`
    /// 例如："chimera_beans::wrapper=trace,chimera_beans=info"
    pub filter: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Warn,
            format: LogFormat::Compact,
            show_target: true,
            show_thread_ids: false,
            filter: None,
        }
    }
}

impl LoggingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn show_target(mut self, show: bool) -> Self {
        self.show_target = show;
        self
    }

    pub fn show_thread_ids(mut self, show: bool) -> Self {
        self.show_thread_ids = show;
        self
    }

    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// 从环境变量读取配置
    ///
    /// `RUST_LOG` 作为过滤指令；`CHIMERA_BEANS_LOG_LEVEL`、`CHIMERA_BEANS_LOG_FORMAT`
    /// 覆盖级别和格式，无法解析的值返回错误。
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(filter) = std::env::var("RUST_LOG") {
            config.filter = Some(filter);
        }
        if let Ok(level) = std::env::var("CHIMERA_BEANS_LOG_LEVEL") {
            config.level = level.parse()?;
        }
        if let Ok(format) = std::env::var("CHIMERA_BEANS_LOG_FORMAT") {
            config.format = format.parse()?;
        }
        Ok(config)
    }

    /// 过滤指令
    pub fn directive(&self) -> String {
        match &self.filter {
            Some(filter) => filter.clone(),
            None => format!("{}={}", LOG_TARGET, self.level),
        }
    }

    fn env_filter(&self) -> Result<EnvFilter> {
        EnvFilter::try_new(self.directive())
            .map_err(|e| anyhow!("Invalid log filter '{}': {}", self.directive(), e))
    }

    /// 安装全局订阅者，已经安装过时返回错误
    pub fn init(self) -> Result<()> {
        let filter = self.env_filter()?;
        let builder = subscriber_fmt()
            .with_env_filter(filter)
            .with_target(self.show_target)
            .with_thread_ids(self.show_thread_ids);
        let installed = match self.format {
            LogFormat::Compact => builder.compact().try_init(),
            LogFormat::Full => builder.try_init(),
            LogFormat::Json => builder.json().try_init(),
            LogFormat::Pretty => builder.pretty().try_init(),
        };
        installed.map_err(|e| anyhow!("Failed to initialize logging: {}", e))
    }
}
