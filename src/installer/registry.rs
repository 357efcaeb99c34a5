//! 会话监听注册表
//!
//! 进程级表，将会话 ID 关联到唯一的订阅回调：
//! - 每个会话最多一个存活条目（原子的 test-and-set 插入）
//! - 注销是幂等的，移除不存在的条目只记录日志
//! - 分发服务的全局回调通过 [`SessionListenerRegistry::dispatch`] 扇出到对应会话

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::types::{RawSessionState, SessionId};

/// 会话回调
pub type SessionCallback = Arc<dyn Fn(RawSessionState) + Send + Sync>;

/// 注册表条目
struct SessionEntry {
    feature: String,
    callback: SessionCallback,
}

/// 注册表计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// 成功注册次数
    pub registrations: u64,
    /// 实际移除次数（不含空操作）
    pub removals: u64,
}

/// 会话监听注册表
#[derive(Default)]
pub struct SessionListenerRegistry {
    sessions: DashMap<SessionId, SessionEntry>,
    registrations: AtomicU64,
    removals: AtomicU64,
}

impl SessionListenerRegistry {
    /// 创建空注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 仅当会话尚无监听时注册
    ///
    /// 返回 true 表示本次调用安装了监听。同一会话的并发调用者中恰好一个成功。
    pub fn register_if_absent(
        &self,
        session_id: SessionId,
        feature: &str,
        callback: SessionCallback,
    ) -> bool {
        match self.sessions.entry(session_id) {
            Entry::Occupied(existing) => {
                tracing::warn!(
                    session_id,
                    feature = %feature,
                    owner = %existing.get().feature,
                    "[REGISTRY] 会话已有监听，跳过注册"
                );
                false
            }
            Entry::Vacant(slot) => {
                slot.insert(SessionEntry {
                    feature: feature.to_string(),
                    callback,
                });
                self.registrations.fetch_add(1, Ordering::SeqCst);
                tracing::info!(session_id, feature = %feature, "[REGISTRY] 已注册会话监听");
                true
            }
        }
    }

    /// 注销会话监听
    ///
    /// 幂等：条目不存在时为空操作。返回 true 表示本次调用实际移除了条目。
    pub fn unregister(&self, session_id: SessionId) -> bool {
        match self.sessions.remove(&session_id) {
            Some((_, entry)) => {
                self.removals.fetch_add(1, Ordering::SeqCst);
                tracing::info!(session_id, feature = %entry.feature, "[REGISTRY] 已注销会话监听");
                true
            }
            None => {
                tracing::warn!(session_id, "[REGISTRY] 尝试注销不存在的会话监听");
                false
            }
        }
    }

    /// 将原始状态分发给对应会话的回调
    ///
    /// 不属于任何已注册会话的更新被忽略，返回 false
    pub fn dispatch(&self, state: RawSessionState) -> bool {
        // 回调在锁外执行，回调内部可以安全地调用 unregister
        let callback = match self.sessions.get(&state.session_id) {
            Some(entry) => entry.callback.clone(),
            None => {
                tracing::trace!(session_id = state.session_id, "[REGISTRY] 忽略无关会话的更新");
                return false;
            }
        };
        callback(state);
        true
    }

    /// 查询会话所属组件
    pub fn feature_of(&self, session_id: SessionId) -> Option<String> {
        self.sessions.get(&session_id).map(|e| e.feature.clone())
    }

    /// 会话是否已注册
    pub fn contains(&self, session_id: SessionId) -> bool {
        self.sessions.contains_key(&session_id)
    }

    /// 存活会话数量
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// 是否没有存活会话
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// 计数快照
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            registrations: self.registrations.load(Ordering::SeqCst),
            removals: self.removals.load(Ordering::SeqCst),
        }
    }
}
