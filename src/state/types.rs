//! 安装状态类型定义
//!
//! 定义与分发服务无关的规范安装阶段、错误码、进度和拦截器状态

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::installer::RawSessionState;

/// 规范错误码
///
/// 每个原始错误码都映射到且仅映射到一个成员，未识别的错误码映射为 `Unknown`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NoError,
    /// 活跃会话数超出配额
    ActiveSessionsLimitExceeded,
    ModuleUnavailable,
    InvalidRequest,
    SessionNotFound,
    ApiNotAvailable,
    NetworkError,
    AccessDenied,
    IncompatibleWithExistingSession,
    InsufficientStorage,
    VerificationError,
    InternalError,
    EmulationError,
    StoreNotFound,
    AppNotOwned,
    Unknown,
}

impl ErrorCode {
    const TABLE: [(i32, ErrorCode); 15] = [
        (0, ErrorCode::NoError),
        (-1, ErrorCode::ActiveSessionsLimitExceeded),
        (-2, ErrorCode::ModuleUnavailable),
        (-3, ErrorCode::InvalidRequest),
        (-4, ErrorCode::SessionNotFound),
        (-5, ErrorCode::ApiNotAvailable),
        (-6, ErrorCode::NetworkError),
        (-7, ErrorCode::AccessDenied),
        (-8, ErrorCode::IncompatibleWithExistingSession),
        (-10, ErrorCode::InsufficientStorage),
        (-11, ErrorCode::VerificationError),
        (-12, ErrorCode::EmulationError),
        (-14, ErrorCode::StoreNotFound),
        (-15, ErrorCode::AppNotOwned),
        (-100, ErrorCode::InternalError),
    ];

    /// 从分发服务原始错误码映射
    pub fn from_raw(code: i32) -> Self {
        Self::TABLE
            .iter()
            .find(|(raw, _)| *raw == code)
            .map(|(_, mapped)| *mapped)
            .unwrap_or(ErrorCode::Unknown)
    }

    /// 获取原始错误码（`Unknown` 没有对应原始值）
    pub fn raw(&self) -> Option<i32> {
        Self::TABLE
            .iter()
            .find(|(_, mapped)| mapped == self)
            .map(|(raw, _)| *raw)
    }
}

/// 规范安装阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "phase", content = "value", rename_all = "snake_case")]
pub enum InstallPhase {
    #[default]
    NotInstalled,
    Pending,
    /// 下载中，百分比 0-100
    Downloading(u8),
    /// 安装中，百分比 0-100
    Installing(u8),
    /// 需要用户确认后才能继续（例如大体积下载）
    RequiresConfirmation,
    Installed,
    Failed(ErrorCode),
    Canceling,
    Canceled,
    Unknown,
}

impl InstallPhase {
    /// 是否为终止阶段（Installed / Failed / Canceled）
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            InstallPhase::Installed | InstallPhase::Failed(_) | InstallPhase::Canceled
        )
    }

    /// 进度百分比（仅下载/安装阶段有值）
    pub fn percent(&self) -> Option<u8> {
        match self {
            InstallPhase::Downloading(p) | InstallPhase::Installing(p) => Some(*p),
            _ => None,
        }
    }
}

impl fmt::Display for InstallPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallPhase::NotInstalled => write!(f, "not_installed"),
            InstallPhase::Pending => write!(f, "pending"),
            InstallPhase::Downloading(p) => write!(f, "downloading({}%)", p),
            InstallPhase::Installing(p) => write!(f, "installing({}%)", p),
            InstallPhase::RequiresConfirmation => write!(f, "requires_confirmation"),
            InstallPhase::Installed => write!(f, "installed"),
            InstallPhase::Failed(code) => write!(f, "failed({:?})", code),
            InstallPhase::Canceling => write!(f, "canceling"),
            InstallPhase::Canceled => write!(f, "canceled"),
            InstallPhase::Unknown => write!(f, "unknown"),
        }
    }
}

/// 安装进度
///
/// 每次发射一个，创建后不再修改。`confirmation` 只在 `RequiresConfirmation`
/// 阶段携带分发服务的原始会话状态，供外部确认界面使用。
#[derive(Debug, Clone, PartialEq)]
pub struct InstallProgress {
    pub phase: InstallPhase,
    confirmation: Option<RawSessionState>,
}

impl InstallProgress {
    /// 创建不带确认载荷的进度
    pub fn new(phase: InstallPhase) -> Self {
        Self {
            phase,
            confirmation: None,
        }
    }

    /// 创建需要确认的进度，携带原始会话状态
    pub fn requires_confirmation(raw: RawSessionState) -> Self {
        Self {
            phase: InstallPhase::RequiresConfirmation,
            confirmation: Some(raw),
        }
    }

    /// 确认载荷（非确认阶段始终为 None）
    pub fn confirmation(&self) -> Option<&RawSessionState> {
        self.confirmation.as_ref()
    }

    /// 取出确认载荷
    pub fn into_confirmation(self) -> Option<RawSessionState> {
        self.confirmation
    }
}

impl From<InstallPhase> for InstallProgress {
    fn from(phase: InstallPhase) -> Self {
        Self::new(phase)
    }
}

/// 拦截器状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "state", content = "reason", rename_all = "lowercase")]
pub enum InterceptorState {
    #[default]
    Inactive,
    Active,
    Completed,
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_error_code_from_raw_known() {
        assert_eq!(ErrorCode::from_raw(-6), ErrorCode::NetworkError);
        assert_eq!(ErrorCode::from_raw(-10), ErrorCode::InsufficientStorage);
        assert_eq!(ErrorCode::from_raw(0), ErrorCode::NoError);
    }

    #[test]
    fn test_error_code_from_raw_unknown() {
        assert_eq!(ErrorCode::from_raw(-9999), ErrorCode::Unknown);
        assert_eq!(ErrorCode::from_raw(42), ErrorCode::Unknown);
        assert_eq!(ErrorCode::Unknown.raw(), None);
    }

    #[test]
    fn test_install_phase_terminal() {
        assert!(InstallPhase::Installed.is_terminal());
        assert!(InstallPhase::Failed(ErrorCode::Unknown).is_terminal());
        assert!(InstallPhase::Canceled.is_terminal());
        assert!(!InstallPhase::Canceling.is_terminal());
        assert!(!InstallPhase::Downloading(100).is_terminal());
        assert!(!InstallPhase::RequiresConfirmation.is_terminal());
    }

    #[test]
    fn test_progress_confirmation_only_when_required() {
        let plain = InstallProgress::new(InstallPhase::Pending);
        assert!(plain.confirmation().is_none());

        let raw = RawSessionState::new(7, crate::installer::status::REQUIRES_USER_CONFIRMATION, "x");
        let progress = InstallProgress::requires_confirmation(raw.clone());
        assert_eq!(progress.phase, InstallPhase::RequiresConfirmation);
        assert_eq!(progress.into_confirmation(), Some(raw));
    }

    #[test]
    fn test_install_phase_serde() {
        let json = serde_json::to_value(InstallPhase::Downloading(40)).unwrap();
        assert_eq!(json["phase"], "downloading");
        assert_eq!(json["value"], 40);

        let back: InstallPhase = serde_json::from_value(json).unwrap();
        assert_eq!(back, InstallPhase::Downloading(40));
    }

    proptest! {
        /// **属性: 错误码映射是全函数**
        ///
        /// *对于任意*原始错误码，映射结果要么是 `Unknown`，要么能还原为同一原始值
        #[test]
        fn prop_error_code_total(raw in any::<i32>()) {
            let mapped = ErrorCode::from_raw(raw);
            match mapped.raw() {
                Some(back) => prop_assert_eq!(back, raw),
                None => prop_assert_eq!(mapped, ErrorCode::Unknown),
            }
        }
    }
}
