//! 安装模块
//!
//! 连接外部分发服务并提供按组件订阅的安装进度：
//! - 原始会话状态到规范安装阶段的映射
//! - 会话监听注册表（每个会话唯一监听）
//! - 可取消的冷进度流
//! - 用于测试和演示的模拟分发服务

mod bridge;
mod fake;
mod mapper;
mod provider;
mod registry;
mod types;

#[cfg(test)]
mod tests;

pub use bridge::{InstallerBridge, ProgressStream};
pub use fake::FakeProvider;
pub use mapper::{map_phase, map_session_state};
pub use provider::{same_listener, InstallProvider, SessionStateListener};
pub use registry::{RegistryStats, SessionCallback, SessionListenerRegistry};
pub use types::{status, ProviderError, RawSessionState, SessionId};
