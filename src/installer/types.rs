//! 分发服务原始类型定义
//!
//! 定义分发服务（Provider）回调中携带的原始会话状态、状态码和错误类型

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::state::ErrorCode;

/// 安装会话 ID
///
/// 由分发服务在 start_install 成功后分配，对本模块不透明
pub type SessionId = i32;

/// 分发服务原始状态码
///
/// 与常见分发服务的会话状态常量保持一致
pub mod status {
    pub const UNKNOWN: i32 = 0;
    pub const PENDING: i32 = 1;
    pub const DOWNLOADING: i32 = 2;
    pub const DOWNLOADED: i32 = 3;
    pub const INSTALLING: i32 = 4;
    pub const INSTALLED: i32 = 5;
    pub const FAILED: i32 = 6;
    pub const CANCELED: i32 = 7;
    pub const REQUIRES_USER_CONFIRMATION: i32 = 8;
    pub const CANCELING: i32 = 9;
}

/// 原始会话状态
///
/// 分发服务全局监听器收到的每一条更新。`Clone` 后可作为确认流程的不透明载荷，
/// 由外部 UI 原样交还给分发服务。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSessionState {
    /// 会话 ID
    pub session_id: SessionId,
    /// 原始状态码，见 [`status`]
    pub status: i32,
    /// 原始错误码（无错误时为 0）
    #[serde(default)]
    pub error_code: i32,
    /// 已下载字节数
    #[serde(default)]
    pub bytes_downloaded: u64,
    /// 需下载的总字节数
    #[serde(default)]
    pub total_bytes: u64,
    /// 本次会话涉及的模块
    #[serde(default)]
    pub module_names: Vec<String>,
}

impl RawSessionState {
    /// 创建新的会话状态
    pub fn new(session_id: SessionId, status: i32, module: impl Into<String>) -> Self {
        Self {
            session_id,
            status,
            error_code: 0,
            bytes_downloaded: 0,
            total_bytes: 0,
            module_names: vec![module.into()],
        }
    }

    /// 设置字节进度
    pub fn with_bytes(mut self, downloaded: u64, total: u64) -> Self {
        self.bytes_downloaded = downloaded;
        self.total_bytes = total;
        self
    }

    /// 设置原始错误码
    pub fn with_error_code(mut self, error_code: i32) -> Self {
        self.error_code = error_code;
        self
    }

    /// 检查会话是否涉及指定模块
    pub fn involves(&self, feature: &str) -> bool {
        self.module_names.iter().any(|m| m == feature)
    }
}

/// 分发服务错误
///
/// start_install / get_session_state 调用失败时返回
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// 网络不可用
    #[error("网络错误: {0}")]
    Network(String),

    /// 分发服务不可用
    #[error("分发服务不可用: {0}")]
    ApiUnavailable(String),

    /// 存储空间不足
    #[error("存储空间不足: {0}")]
    Storage(String),

    /// 请求被分发服务拒绝
    #[error("请求被拒绝: {code:?}")]
    Rejected { code: ErrorCode },

    /// 内部错误
    #[error("内部错误: {0}")]
    Internal(String),
}

impl ProviderError {
    /// 获取对应的规范错误码
    pub fn error_code(&self) -> ErrorCode {
        match self {
            ProviderError::Network(_) => ErrorCode::NetworkError,
            ProviderError::ApiUnavailable(_) => ErrorCode::ApiNotAvailable,
            ProviderError::Storage(_) => ErrorCode::InsufficientStorage,
            ProviderError::Rejected { code } => *code,
            ProviderError::Internal(_) => ErrorCode::InternalError,
        }
    }
}
