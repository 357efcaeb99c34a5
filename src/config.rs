//! 配置管理
//!
//! 从 YAML 文件加载配置，所有字段都有默认值

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::error::ErrorCategory;
use crate::route::DEFAULT_ROUTE_PREFIX;

/// 默认可重试的错误分类
pub const RETRYABLE_CATEGORIES: &[ErrorCategory] =
    &[ErrorCategory::Network, ErrorCategory::Installation];

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("读取配置文件失败 {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("配置解析失败: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("配置无效: {0}")]
    Invalid(String),
}

/// 完整配置
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FlowConfig {
    pub logging: LoggingConfig,
    pub orchestrator: OrchestratorConfig,
    pub state: StateConfig,
    pub route: RouteConfig,
}

impl FlowConfig {
    /// 从 YAML 文件加载
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    /// 从 YAML 字符串解析
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let config: FlowConfig = if content.trim().is_empty() {
            FlowConfig::default()
        } else {
            serde_yaml::from_str(content)?
        };
        config.validate()?;
        Ok(config)
    }

    /// 校验配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.route.prefix.trim_matches('/').is_empty() {
            return Err(ConfigError::Invalid("route.prefix 不能为空".to_string()));
        }
        if self.logging.max_logs == 0 {
            return Err(ConfigError::Invalid("logging.max_logs 必须大于 0".to_string()));
        }
        Ok(())
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别: trace / debug / info / warn / error
    pub level: String,
    /// 是否写入日志文件
    pub enable_file_logging: bool,
    /// 日志目录，未设置时使用 <data_dir>/featureflow/logs
    pub log_dir: Option<PathBuf>,
    /// 内存中保留的最大条目数
    pub max_logs: usize,
    /// 单个日志文件最大字节数
    pub max_file_size: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            enable_file_logging: false,
            log_dir: None,
            max_logs: 1000,
            max_file_size: 10 * 1024 * 1024,
        }
    }
}

/// 编排器配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// 加载新组件时取消其他组件的进行中任务
    pub supersede_other_features: bool,
    /// 可重试的错误分类
    pub retryable_categories: Vec<ErrorCategory>,
    /// 单个拦截器超时（毫秒），0 表示不限制
    pub interceptor_timeout_ms: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            supersede_other_features: true,
            retryable_categories: RETRYABLE_CATEGORIES.to_vec(),
            interceptor_timeout_ms: 0,
        }
    }
}

/// 状态存储配置
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StateConfig {
    /// 偏好文件路径，未设置时只保存在内存中
    pub prefs_path: Option<PathBuf>,
}

/// 路由配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RouteConfig {
    /// 深链接路径前缀
    pub prefix: String,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_ROUTE_PREFIX.to_string(),
        }
    }
}
