//! 分发服务接口
//!
//! 分发服务负责真正的下载与安装，本模块只声明需要用到的操作。
//! 监听器是进程级的：注册后会收到所有会话的更新，与发起请求的调用方无关。

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

use super::types::{ProviderError, RawSessionState, SessionId};

/// 会话状态监听器
pub trait SessionStateListener: Send + Sync {
    /// 收到任意会话的状态更新
    fn on_state_update(&self, state: RawSessionState);
}

/// 判断两个监听器句柄是否指向同一对象
pub fn same_listener(a: &Arc<dyn SessionStateListener>, b: &Arc<dyn SessionStateListener>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

/// 分发服务 trait
#[async_trait]
pub trait InstallProvider: Send + Sync {
    /// 已安装的模块集合
    fn installed_modules(&self) -> HashSet<String>;

    /// 请求安装模块，成功时返回会话 ID
    async fn start_install(&self, feature: &str) -> Result<SessionId, ProviderError>;

    /// 注册进程级监听器
    fn register_listener(&self, listener: Arc<dyn SessionStateListener>);

    /// 注销进程级监听器
    fn unregister_listener(&self, listener: &Arc<dyn SessionStateListener>);

    /// 查询会话当前状态，会话不存在时返回 None
    async fn session_state(
        &self,
        session_id: SessionId,
    ) -> Result<Option<RawSessionState>, ProviderError>;
}
