//! 模拟分发服务
//!
//! 内存中的分发服务实现，用于测试和命令行演示：
//! - 可脚本化地推送任意会话状态
//! - 记录 start_install / 监听注册 / 监听注销的调用次数
//! - 可选自动播放一段完整的安装过程

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::provider::{same_listener, InstallProvider, SessionStateListener};
use super::types::{status, ProviderError, RawSessionState, SessionId};

/// 自动播放时每个模块的模拟大小
const AUTOPLAY_TOTAL_BYTES: u64 = 8 * 1024 * 1024;

#[derive(Default)]
struct FakeInner {
    installed: RwLock<HashSet<String>>,
    listeners: Mutex<Vec<Arc<dyn SessionStateListener>>>,
    sessions: Mutex<HashMap<SessionId, RawSessionState>>,
    next_session_id: AtomicI32,
    start_error: Mutex<Option<ProviderError>>,
    require_confirmation: RwLock<HashSet<String>>,
    autoplay: Option<Duration>,
    start_calls: AtomicUsize,
    register_calls: AtomicUsize,
    unregister_calls: AtomicUsize,
}

/// 模拟分发服务
#[derive(Clone, Default)]
pub struct FakeProvider {
    inner: Arc<FakeInner>,
}

impl FakeProvider {
    /// 创建新的模拟分发服务
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建自动播放安装过程的模拟分发服务
    ///
    /// 每次 start_install 后按 `step` 间隔推送 PENDING → DOWNLOADING → INSTALLING → INSTALLED
    pub fn with_autoplay(step: Duration) -> Self {
        Self {
            inner: Arc::new(FakeInner {
                autoplay: Some(step),
                ..Default::default()
            }),
        }
    }

    /// 标记模块为已安装
    pub fn mark_installed(&self, feature: &str) {
        self.inner.installed.write().insert(feature.to_string());
    }

    /// 下一次 start_install 返回错误
    pub fn fail_next_start(&self, error: ProviderError) {
        *self.inner.start_error.lock() = Some(error);
    }

    /// 自动播放时该模块在下载前需要用户确认
    pub fn require_confirmation(&self, feature: &str) {
        self.inner.require_confirmation.write().insert(feature.to_string());
    }

    /// 推送会话状态给所有监听器
    ///
    /// 状态为 INSTALLED 时，会话涉及的模块加入已安装集合
    pub fn emit(&self, state: RawSessionState) {
        self.inner.sessions.lock().insert(state.session_id, state.clone());
        if state.status == status::INSTALLED {
            let mut installed = self.inner.installed.write();
            installed.extend(state.module_names.iter().cloned());
        }

        let listeners = self.inner.listeners.lock().clone();
        for listener in listeners {
            listener.on_state_update(state.clone());
        }
    }

    /// 继续一个等待用户确认的会话
    pub fn confirm(&self, session_id: SessionId) -> bool {
        let waiting = self
            .inner
            .sessions
            .lock()
            .get(&session_id)
            .filter(|s| s.status == status::REQUIRES_USER_CONFIRMATION)
            .cloned();
        match waiting {
            Some(state) => {
                if let (Some(step), Some(feature)) = (self.inner.autoplay, state.module_names.first()) {
                    self.spawn_autoplay(session_id, feature.clone(), step, false);
                }
                true
            }
            None => false,
        }
    }

    /// start_install 调用次数
    pub fn start_install_calls(&self) -> usize {
        self.inner.start_calls.load(Ordering::SeqCst)
    }

    /// register_listener 调用次数
    pub fn register_listener_calls(&self) -> usize {
        self.inner.register_calls.load(Ordering::SeqCst)
    }

    /// unregister_listener 调用次数
    pub fn unregister_listener_calls(&self) -> usize {
        self.inner.unregister_calls.load(Ordering::SeqCst)
    }

    /// 当前注册的监听器数量
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }

    fn spawn_autoplay(&self, session_id: SessionId, feature: String, step: Duration, gate: bool) {
        let provider = self.clone();
        tokio::spawn(async move {
            let total = AUTOPLAY_TOTAL_BYTES;
            if gate {
                tokio::time::sleep(step).await;
                provider.emit(
                    RawSessionState::new(session_id, status::REQUIRES_USER_CONFIRMATION, &feature)
                        .with_bytes(0, total),
                );
                return;
            }

            let mut script = vec![RawSessionState::new(session_id, status::PENDING, &feature)];
            for quarter in 1..=4u64 {
                script.push(
                    RawSessionState::new(session_id, status::DOWNLOADING, &feature)
                        .with_bytes(total * quarter / 4, total),
                );
            }
            script.push(RawSessionState::new(session_id, status::DOWNLOADED, &feature).with_bytes(total, total));
            script.push(RawSessionState::new(session_id, status::INSTALLING, &feature).with_bytes(total, total));
            script.push(RawSessionState::new(session_id, status::INSTALLED, &feature).with_bytes(total, total));

            for state in script {
                tokio::time::sleep(step).await;
                provider.emit(state);
            }
        });
    }
}

#[async_trait]
impl InstallProvider for FakeProvider {
    fn installed_modules(&self) -> HashSet<String> {
        self.inner.installed.read().clone()
    }

    async fn start_install(&self, feature: &str) -> Result<SessionId, ProviderError> {
        self.inner.start_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(error) = self.inner.start_error.lock().take() {
            return Err(error);
        }

        // 同一模块已有进行中的会话时复用该会话
        let existing = self
            .inner
            .sessions
            .lock()
            .values()
            .find(|s| {
                s.involves(feature)
                    && !matches!(s.status, status::INSTALLED | status::FAILED | status::CANCELED)
            })
            .map(|s| s.session_id);
        if let Some(session_id) = existing {
            return Ok(session_id);
        }

        let session_id = self.inner.next_session_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner
            .sessions
            .lock()
            .insert(session_id, RawSessionState::new(session_id, status::PENDING, feature));

        if let Some(step) = self.inner.autoplay {
            let gate = self.inner.require_confirmation.read().contains(feature);
            self.spawn_autoplay(session_id, feature.to_string(), step, gate);
        }
        Ok(session_id)
    }

    fn register_listener(&self, listener: Arc<dyn SessionStateListener>) {
        self.inner.register_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.listeners.lock().push(listener);
    }

    fn unregister_listener(&self, listener: &Arc<dyn SessionStateListener>) {
        self.inner.unregister_calls.fetch_add(1, Ordering::SeqCst);
        self.inner
            .listeners
            .lock()
            .retain(|l| !same_listener(l, listener));
    }

    async fn session_state(&self, session_id: SessionId) -> Result<Option<RawSessionState>, ProviderError> {
        Ok(self.inner.sessions.lock().get(&session_id).cloned())
    }
}
