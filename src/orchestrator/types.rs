//! 编排器对外状态

use std::fmt;

use crate::error::FlowError;
use crate::state::InstallPhase;

/// 面向 UI 的加载状态
#[derive(Debug, Clone, PartialEq, Default)]
pub enum UiState {
    /// 空闲
    #[default]
    Idle,
    /// 加载中
    Loading { feature: String, phase: InstallPhase },
    /// 等待用户确认（载荷通过 `pending_confirmation_payload` 获取）
    RequiresConfirmation { feature: String },
    /// 加载成功，`warnings` 为非致命错误（服务发现、安装后拦截器）
    Success {
        feature: String,
        warnings: Vec<FlowError>,
    },
    /// 加载失败
    Error {
        feature: Option<String>,
        error: FlowError,
    },
}

impl UiState {
    /// 状态关联的组件
    pub fn feature(&self) -> Option<&str> {
        match self {
            UiState::Idle => None,
            UiState::Loading { feature, .. }
            | UiState::RequiresConfirmation { feature }
            | UiState::Success { feature, .. } => Some(feature),
            UiState::Error { feature, .. } => feature.as_deref(),
        }
    }

    /// 是否为终态（成功或失败）
    pub fn is_terminal(&self) -> bool {
        matches!(self, UiState::Success { .. } | UiState::Error { .. })
    }
}

impl fmt::Display for UiState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UiState::Idle => write!(f, "空闲"),
            UiState::Loading { feature, phase } => write!(f, "{} 加载中 ({})", feature, phase),
            UiState::RequiresConfirmation { feature } => write!(f, "{} 等待用户确认", feature),
            UiState::Success { feature, warnings } if warnings.is_empty() => {
                write!(f, "{} 加载成功", feature)
            }
            UiState::Success { feature, warnings } => {
                write!(f, "{} 加载成功（{} 个警告）", feature, warnings.len())
            }
            UiState::Error { feature, error } => write!(
                f,
                "{} 加载失败: {}",
                feature.as_deref().unwrap_or("-"),
                error
            ),
        }
    }
}
