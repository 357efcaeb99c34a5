//! 加载错误类型
//!
//! 定义组件加载过程中向调用方暴露的分类错误

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::installer::ProviderError;
use crate::state::ErrorCode;

/// 错误分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Validation,
    Network,
    Storage,
    ApiUnavailable,
    Installation,
    ServiceDiscovery,
    PreInstallInterceptor,
    PostInstallInterceptor,
    Unknown,
}

/// 组件加载错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FlowError {
    /// 参数校验失败（空组件 ID、无重试目标等）
    #[error("校验失败: {0}")]
    Validation(String),

    /// 网络错误
    #[error("网络错误: {message}")]
    Network {
        message: String,
        code: Option<ErrorCode>,
    },

    /// 存储空间不足
    #[error("存储错误: {message}")]
    Storage {
        message: String,
        code: Option<ErrorCode>,
    },

    /// 分发服务不可用
    #[error("分发服务不可用: {message}")]
    ApiUnavailable {
        message: String,
        code: Option<ErrorCode>,
    },

    /// 安装失败
    #[error("安装失败: {message}")]
    Installation {
        message: String,
        code: Option<ErrorCode>,
    },

    /// 安装后入口发现失败
    #[error("服务发现失败: {0}")]
    ServiceDiscovery(String),

    /// 安装前拦截器失败（终止加载）
    #[error("安装前拦截器失败: {0}")]
    PreInstallInterceptor(String),

    /// 安装后拦截器失败（仅警告）
    #[error("安装后拦截器失败: {0}")]
    PostInstallInterceptor(String),

    /// 未知错误
    #[error("未知错误: {0}")]
    Unknown(String),
}

impl FlowError {
    /// 根据失败阶段的错误码构造分类错误
    pub fn from_failed_phase(feature: &str, code: ErrorCode) -> Self {
        let message = format!("组件 {} 安装失败 ({:?})", feature, code);
        match code {
            ErrorCode::NetworkError => FlowError::Network {
                message,
                code: Some(code),
            },
            ErrorCode::InsufficientStorage => FlowError::Storage {
                message,
                code: Some(code),
            },
            ErrorCode::ApiNotAvailable | ErrorCode::StoreNotFound => FlowError::ApiUnavailable {
                message,
                code: Some(code),
            },
            _ => FlowError::Installation {
                message,
                code: Some(code),
            },
        }
    }

    /// 获取错误分类
    pub fn category(&self) -> ErrorCategory {
        match self {
            FlowError::Validation(_) => ErrorCategory::Validation,
            FlowError::Network { .. } => ErrorCategory::Network,
            FlowError::Storage { .. } => ErrorCategory::Storage,
            FlowError::ApiUnavailable { .. } => ErrorCategory::ApiUnavailable,
            FlowError::Installation { .. } => ErrorCategory::Installation,
            FlowError::ServiceDiscovery(_) => ErrorCategory::ServiceDiscovery,
            FlowError::PreInstallInterceptor(_) => ErrorCategory::PreInstallInterceptor,
            FlowError::PostInstallInterceptor(_) => ErrorCategory::PostInstallInterceptor,
            FlowError::Unknown(_) => ErrorCategory::Unknown,
        }
    }

    /// 获取规范错误码（如有）
    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            FlowError::Network { code, .. }
            | FlowError::Storage { code, .. }
            | FlowError::ApiUnavailable { code, .. }
            | FlowError::Installation { code, .. } => *code,
            _ => None,
        }
    }

    /// 检查是否为可重试错误（默认策略）
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FlowError::Network { .. } | FlowError::Installation { .. }
        )
    }

    /// 检查是否终止加载
    ///
    /// 安装后拦截器与服务发现失败只作为警告，不会回退已完成的安装
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            FlowError::PostInstallInterceptor(_) | FlowError::ServiceDiscovery(_)
        )
    }

    /// 转换为 JSON 错误对象
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "error": {
                "message": self.to_string(),
                "type": self.error_type(),
                "code": self.error_code().and_then(|c| c.raw())
            }
        })
    }

    /// 获取错误类型字符串
    pub fn error_type(&self) -> &'static str {
        match self {
            FlowError::Validation(_) => "validation_error",
            FlowError::Network { .. } => "network_error",
            FlowError::Storage { .. } => "storage_error",
            FlowError::ApiUnavailable { .. } => "api_unavailable",
            FlowError::Installation { .. } => "installation_error",
            FlowError::ServiceDiscovery(_) => "service_discovery_error",
            FlowError::PreInstallInterceptor(_) => "pre_install_interceptor_error",
            FlowError::PostInstallInterceptor(_) => "post_install_interceptor_error",
            FlowError::Unknown(_) => "unknown_error",
        }
    }

    /// 记录带上下文的错误日志
    pub fn log_with_context(&self, feature: &str) {
        tracing::error!(
            feature = %feature,
            error_type = %self.error_type(),
            error_message = %self.to_string(),
            "[FLOW] 组件加载失败"
        );
    }
}

impl From<ProviderError> for FlowError {
    fn from(err: ProviderError) -> Self {
        let code = Some(err.error_code());
        let message = err.to_string();
        match err {
            ProviderError::Network(_) => FlowError::Network { message, code },
            ProviderError::Storage(_) => FlowError::Storage { message, code },
            ProviderError::ApiUnavailable(_) => FlowError::ApiUnavailable { message, code },
            ProviderError::Rejected { .. } | ProviderError::Internal(_) => {
                FlowError::Installation { message, code }
            }
        }
    }
}
