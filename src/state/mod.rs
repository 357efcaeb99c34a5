//! 状态模块
//!
//! 提供安装流程中使用的规范状态类型和状态存储：
//! - 规范安装阶段与错误码
//! - 安装进度（含确认载荷）
//! - 拦截器状态
//! - 状态存储 trait 与默认实现

mod store;
mod types;

pub use store::{MemoryStateStore, StateStore};
pub use types::{ErrorCode, InstallPhase, InstallProgress, InterceptorState};
