//! 安装桥接
//!
//! 将分发服务的一次性安装请求与进程级回调，转换为按请求订阅、可取消的冷进度流：
//! - 订阅前不发起任何请求
//! - 已安装的组件直接返回 `Installed`
//! - 每个存活会话只注册一次监听，终态或取消时恰好注销一次
//! - 不属于本桥接发起的会话的回调被忽略

use futures::Stream;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::mapper::map_session_state;
use super::provider::{InstallProvider, SessionStateListener};
use super::registry::{SessionCallback, SessionListenerRegistry};
use super::types::{ProviderError, RawSessionState, SessionId};
use crate::state::{ErrorCode, InstallPhase, InstallProgress};

/// 进度流
pub type ProgressStream = Pin<Box<dyn Stream<Item = Result<InstallProgress, ProviderError>> + Send>>;

/// 进程级分发监听器，将所有会话的更新交给注册表扇出
struct Dispatcher {
    registry: Arc<SessionListenerRegistry>,
}

impl SessionStateListener for Dispatcher {
    fn on_state_update(&self, state: RawSessionState) {
        self.registry.dispatch(state);
    }
}

struct BridgeInner {
    provider: Arc<dyn InstallProvider>,
    registry: Arc<SessionListenerRegistry>,
    dispatcher: Arc<dyn SessionStateListener>,
    /// 分发监听器是否已挂到分发服务上
    attached: Mutex<bool>,
}

impl BridgeInner {
    fn is_installed(&self, feature: &str) -> bool {
        self.provider.installed_modules().contains(feature)
    }

    /// 注册会话，必要时挂载分发监听器
    fn register_session(&self, session_id: SessionId, feature: &str, callback: SessionCallback) -> bool {
        let mut attached = self.attached.lock();
        let won = self.registry.register_if_absent(session_id, feature, callback);
        if won && !*attached {
            self.provider.register_listener(self.dispatcher.clone());
            *attached = true;
            tracing::debug!("[BRIDGE] 已挂载分发监听器");
        }
        won
    }

    /// 注销会话，注册表为空时卸载分发监听器
    fn release_session(&self, session_id: SessionId) -> bool {
        let mut attached = self.attached.lock();
        let removed = self.registry.unregister(session_id);
        if *attached && self.registry.is_empty() {
            self.provider.unregister_listener(&self.dispatcher);
            *attached = false;
            tracing::debug!("[BRIDGE] 已卸载分发监听器");
        }
        removed
    }
}

/// 会话守卫
///
/// 流在终态时显式释放；流被提前丢弃（取消）时由 Drop 释放
struct SessionGuard {
    inner: Arc<BridgeInner>,
    session_id: SessionId,
    released: bool,
}

impl SessionGuard {
    fn new(inner: Arc<BridgeInner>, session_id: SessionId) -> Self {
        Self {
            inner,
            session_id,
            released: false,
        }
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.inner.release_session(self.session_id);
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if !self.released {
            tracing::info!(session_id = self.session_id, "[BRIDGE] 进度流已取消，释放会话");
            self.release();
        }
    }
}

/// 安装桥接
#[derive(Clone)]
pub struct InstallerBridge {
    inner: Arc<BridgeInner>,
}

impl InstallerBridge {
    /// 创建新的安装桥接
    pub fn new(provider: Arc<dyn InstallProvider>) -> Self {
        let registry = Arc::new(SessionListenerRegistry::new());
        let dispatcher: Arc<dyn SessionStateListener> = Arc::new(Dispatcher {
            registry: registry.clone(),
        });
        Self {
            inner: Arc::new(BridgeInner {
                provider,
                registry,
                dispatcher,
                attached: Mutex::new(false),
            }),
        }
    }

    /// 会话注册表
    pub fn registry(&self) -> &Arc<SessionListenerRegistry> {
        &self.inner.registry
    }

    /// 组件是否已安装
    pub fn is_installed(&self, feature: &str) -> bool {
        self.inner.is_installed(feature)
    }

    /// 订阅组件的安装进度
    ///
    /// 返回冷流：只有在被轮询时才会检查安装状态并发起请求。
    /// 丢弃流即取消订阅，所属会话的监听会被注销。
    pub fn install(&self, feature: &str) -> ProgressStream {
        let inner = self.inner.clone();
        let feature = feature.to_string();

        Box::pin(async_stream::stream! {
            if inner.is_installed(&feature) {
                tracing::info!(feature = %feature, "[BRIDGE] 组件已安装，跳过安装请求");
                yield Ok(InstallProgress::new(InstallPhase::Installed));
                return;
            }

            let session_id = match inner.provider.start_install(&feature).await {
                Ok(id) => id,
                Err(e) => {
                    tracing::error!(feature = %feature, error = %e, "[BRIDGE] 发起安装失败");
                    yield Ok(InstallProgress::new(InstallPhase::Failed(ErrorCode::Unknown)));
                    yield Err(e);
                    return;
                }
            };
            tracing::info!(feature = %feature, session_id, "[BRIDGE] 已发起安装");

            let (tx, mut rx) = mpsc::unbounded_channel::<RawSessionState>();
            let callback: SessionCallback = Arc::new(move |state| {
                let _ = tx.send(state);
            });

            if !inner.register_session(session_id, &feature, callback) {
                // 会话已被其他订阅者持有：只读取一次当前状态
                let progress = match inner.provider.session_state(session_id).await {
                    Ok(Some(state)) => map_session_state(&state, &feature),
                    Ok(None) => InstallProgress::new(InstallPhase::Unknown),
                    Err(e) => {
                        tracing::warn!(session_id, error = %e, "[BRIDGE] 查询会话状态失败");
                        InstallProgress::new(InstallPhase::Unknown)
                    }
                };
                yield Ok(progress);
                return;
            }

            let mut guard = SessionGuard::new(inner.clone(), session_id);

            let snapshot = match inner.provider.session_state(session_id).await {
                Ok(Some(state)) => map_session_state(&state, &feature),
                Ok(None) => InstallProgress::new(InstallPhase::Pending),
                Err(e) => {
                    tracing::warn!(session_id, error = %e, "[BRIDGE] 查询初始会话状态失败");
                    InstallProgress::new(InstallPhase::Pending)
                }
            };
            let snapshot_phase = snapshot.phase;

            // 读取快照期间到达的回调：快照及更早的状态丢弃，之后的按顺序保留
            let mut backlog = VecDeque::new();
            while let Ok(state) = rx.try_recv() {
                backlog.push_back(state);
            }
            let covered = backlog
                .iter()
                .rposition(|state| map_session_state(state, &feature).phase == snapshot_phase);
            if let Some(last) = covered {
                tracing::debug!(session_id, dropped = last + 1, "[BRIDGE] 丢弃快照已包含的回调");
                backlog.drain(..=last);
            }

            yield Ok(snapshot);

            if snapshot_phase.is_terminal() {
                guard.release();
                return;
            }

            let mut first_live = covered.is_none() && backlog.is_empty();
            loop {
                let state = match backlog.pop_front() {
                    Some(state) => state,
                    None => match rx.recv().await {
                        Some(state) => state,
                        None => break,
                    },
                };

                if !state.involves(&feature) {
                    tracing::warn!(
                        feature = %feature,
                        session_id,
                        modules = ?state.module_names,
                        "[BRIDGE] 会话更新未包含目标组件"
                    );
                }

                let progress = map_session_state(&state, &feature);
                let phase = progress.phase;

                // 首个实时回调与初始快照相同时丢弃，避免重复
                if first_live {
                    first_live = false;
                    if phase == snapshot_phase {
                        tracing::debug!(session_id, phase = %phase, "[BRIDGE] 丢弃与快照重复的回调");
                        continue;
                    }
                }

                tracing::debug!(feature = %feature, session_id, phase = %phase, "[BRIDGE] 进度更新");
                yield Ok(progress);

                if phase.is_terminal() {
                    guard.release();
                    break;
                }
            }
        })
    }

    /// 重新订阅组件的安装进度
    ///
    /// 与 [`InstallerBridge::install`] 语义相同，重试策略由调用方负责
    pub fn retry(&self, feature: &str) -> ProgressStream {
        tracing::info!(feature = %feature, "[BRIDGE] 重试安装");
        self.install(feature)
    }
}
