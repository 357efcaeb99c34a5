//! 安装桥接测试
//!
//! 使用模拟分发服务验证进度流的顺序、监听生命周期与取消行为

use crate::installer::{
    status, FakeProvider, InstallProvider, InstallerBridge, ProviderError, RawSessionState,
    SessionId, SessionStateListener,
};
use crate::state::{ErrorCode, InstallPhase};
use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

fn bridge_with(provider: &FakeProvider) -> InstallerBridge {
    InstallerBridge::new(Arc::new(provider.clone()))
}

#[tokio::test]
async fn test_already_installed_emits_single_installed() {
    let provider = FakeProvider::new();
    provider.mark_installed("x");
    let bridge = bridge_with(&provider);

    let phases: Vec<_> = bridge
        .install("x")
        .map(|item| item.unwrap().phase)
        .collect()
        .await;

    assert_eq!(phases, vec![InstallPhase::Installed]);
    assert_eq!(provider.start_install_calls(), 0);
    assert_eq!(provider.register_listener_calls(), 0);
    assert_eq!(bridge.registry().stats().registrations, 0);
}

#[tokio::test]
async fn test_stream_is_cold() {
    let provider = FakeProvider::new();
    let bridge = bridge_with(&provider);

    let stream = bridge.install("x");
    assert_eq!(provider.start_install_calls(), 0);
    drop(stream);
    assert_eq!(provider.start_install_calls(), 0);
}

#[tokio::test]
async fn test_success_sequence() {
    let provider = FakeProvider::new();
    let bridge = bridge_with(&provider);
    let mut stream = bridge.install("x");

    // 初始快照
    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.phase, InstallPhase::Pending);
    assert_eq!(provider.start_install_calls(), 1);
    assert_eq!(provider.listener_count(), 1);

    provider.emit(RawSessionState::new(1, status::PENDING, "x"));
    provider.emit(RawSessionState::new(1, status::DOWNLOADING, "x").with_bytes(500, 1000));
    provider.emit(RawSessionState::new(1, status::INSTALLING, "x").with_bytes(1000, 1000));
    provider.emit(RawSessionState::new(1, status::INSTALLED, "x").with_bytes(1000, 1000));

    let mut phases = vec![first.phase];
    while let Some(item) = stream.next().await {
        phases.push(item.unwrap().phase);
    }

    assert_eq!(
        phases,
        vec![
            InstallPhase::Pending,
            InstallPhase::Downloading(50),
            InstallPhase::Installing(100),
            InstallPhase::Installed,
        ]
    );
    assert_eq!(bridge.registry().stats().removals, 1);
    assert!(bridge.registry().is_empty());
    assert_eq!(provider.unregister_listener_calls(), 1);
    assert_eq!(provider.listener_count(), 0);
    assert!(bridge.is_installed("x"));
}

#[tokio::test]
async fn test_failure_sequence() {
    let provider = FakeProvider::new();
    let bridge = bridge_with(&provider);
    let mut stream = bridge.install("x");

    let first = stream.next().await.unwrap().unwrap();
    provider.emit(RawSessionState::new(1, status::PENDING, "x"));
    provider.emit(RawSessionState::new(1, status::FAILED, "x").with_error_code(-6));

    let mut phases = vec![first.phase];
    while let Some(item) = stream.next().await {
        phases.push(item.unwrap().phase);
    }

    assert_eq!(
        phases,
        vec![
            InstallPhase::Pending,
            InstallPhase::Failed(ErrorCode::NetworkError),
        ]
    );
    assert_eq!(bridge.registry().stats().removals, 1);
}

#[tokio::test]
async fn test_start_install_failure() {
    let provider = FakeProvider::new();
    provider.fail_next_start(ProviderError::Network("offline".to_string()));
    let bridge = bridge_with(&provider);

    let items: Vec<_> = bridge.install("x").collect().await;

    assert_eq!(items.len(), 2);
    assert_eq!(
        items[0].as_ref().unwrap().phase,
        InstallPhase::Failed(ErrorCode::Unknown)
    );
    assert_eq!(
        items[1].as_ref().unwrap_err(),
        &ProviderError::Network("offline".to_string())
    );
    assert_eq!(provider.register_listener_calls(), 0);
}

#[tokio::test]
async fn test_confirmation_payload_is_forwarded() {
    let provider = FakeProvider::new();
    let bridge = bridge_with(&provider);
    let mut stream = bridge.install("x");
    stream.next().await.unwrap().unwrap();

    let raw = RawSessionState::new(1, status::REQUIRES_USER_CONFIRMATION, "x").with_bytes(0, 1 << 30);
    provider.emit(raw.clone());

    let progress = stream.next().await.unwrap().unwrap();
    assert_eq!(progress.phase, InstallPhase::RequiresConfirmation);
    assert_eq!(progress.confirmation(), Some(&raw));

    provider.emit(RawSessionState::new(1, status::DOWNLOADING, "x").with_bytes(1, 2));
    let progress = stream.next().await.unwrap().unwrap();
    assert_eq!(progress.phase, InstallPhase::Downloading(50));
    assert!(progress.confirmation().is_none());
}

#[tokio::test]
async fn test_foreign_session_ignored() {
    let provider = FakeProvider::new();
    let bridge = bridge_with(&provider);
    let mut stream = bridge.install("x");
    stream.next().await.unwrap().unwrap();

    // 其他应用/请求的会话
    provider.emit(RawSessionState::new(42, status::INSTALLED, "y"));
    provider.emit(RawSessionState::new(1, status::DOWNLOADING, "x").with_bytes(1, 4));

    let progress = stream.next().await.unwrap().unwrap();
    assert_eq!(progress.phase, InstallPhase::Downloading(25));
    assert!(bridge.registry().contains(1));
    assert!(!bridge.registry().contains(42));
}

#[tokio::test]
async fn test_cancel_one_stream_does_not_affect_other() {
    let provider = FakeProvider::new();
    let bridge = bridge_with(&provider);

    let mut stream_x = bridge.install("x");
    let mut stream_y = bridge.install("y");
    stream_x.next().await.unwrap().unwrap();
    stream_y.next().await.unwrap().unwrap();
    assert_eq!(bridge.registry().len(), 2);

    // 取消 x
    drop(stream_x);
    assert!(!bridge.registry().contains(1));
    assert!(bridge.registry().contains(2));
    assert_eq!(provider.listener_count(), 1);

    provider.emit(RawSessionState::new(2, status::INSTALLED, "y"));
    let progress = stream_y.next().await.unwrap().unwrap();
    assert_eq!(progress.phase, InstallPhase::Installed);
    assert!(stream_y.next().await.is_none());
    assert_eq!(bridge.registry().stats().removals, 2);
    assert_eq!(provider.listener_count(), 0);
}

#[tokio::test]
async fn test_shared_session_not_double_registered() {
    let provider = FakeProvider::new();
    let bridge = bridge_with(&provider);

    let mut owner = bridge.install("x");
    owner.next().await.unwrap().unwrap();

    // 分发服务为同一模块复用会话 1
    provider.emit(RawSessionState::new(1, status::DOWNLOADING, "x").with_bytes(3, 4));
    let observed: Vec<_> = bridge
        .install("x")
        .map(|item| item.unwrap().phase)
        .collect()
        .await;

    assert_eq!(observed, vec![InstallPhase::Downloading(75)]);
    assert_eq!(bridge.registry().stats().registrations, 1);
    assert_eq!(provider.register_listener_calls(), 1);
    assert!(bridge.registry().contains(1));

    let progress = owner.next().await.unwrap().unwrap();
    assert_eq!(progress.phase, InstallPhase::Downloading(75));
}

#[tokio::test]
async fn test_retry_issues_new_request() {
    let provider = FakeProvider::new();
    let bridge = bridge_with(&provider);

    let mut stream = bridge.install("x");
    stream.next().await.unwrap().unwrap();
    provider.emit(RawSessionState::new(1, status::FAILED, "x").with_error_code(-6));
    assert_eq!(
        stream.next().await.unwrap().unwrap().phase,
        InstallPhase::Failed(ErrorCode::NetworkError)
    );

    let mut retry = bridge.retry("x");
    let first = retry.next().await.unwrap().unwrap();
    assert_eq!(first.phase, InstallPhase::Pending);
    assert_eq!(provider.start_install_calls(), 2);
    assert!(bridge.registry().contains(2));
}

#[tokio::test]
async fn test_autoplay_with_confirmation() {
    let provider = FakeProvider::with_autoplay(Duration::from_millis(5));
    provider.require_confirmation("x");
    let bridge = bridge_with(&provider);
    let mut stream = bridge.install("x");

    assert_eq!(stream.next().await.unwrap().unwrap().phase, InstallPhase::Pending);
    let progress = stream.next().await.unwrap().unwrap();
    assert_eq!(progress.phase, InstallPhase::RequiresConfirmation);

    let session_id = progress.confirmation().unwrap().session_id;
    assert!(provider.confirm(session_id));

    let phases: Vec<_> = stream.map(|item| item.unwrap().phase).collect().await;
    assert_eq!(phases.last(), Some(&InstallPhase::Installed));
    assert!(phases.contains(&InstallPhase::Downloading(50)));
    assert!(bridge.registry().is_empty());
}

/// 查询会话状态时先推送一批更新的分发服务
struct BusyProvider {
    inner: FakeProvider,
    pending_updates: Mutex<Vec<RawSessionState>>,
}

#[async_trait]
impl InstallProvider for BusyProvider {
    fn installed_modules(&self) -> HashSet<String> {
        self.inner.installed_modules()
    }

    async fn start_install(&self, feature: &str) -> Result<SessionId, ProviderError> {
        self.inner.start_install(feature).await
    }

    fn register_listener(&self, listener: Arc<dyn SessionStateListener>) {
        self.inner.register_listener(listener)
    }

    fn unregister_listener(&self, listener: &Arc<dyn SessionStateListener>) {
        self.inner.unregister_listener(listener)
    }

    async fn session_state(&self, session_id: SessionId) -> Result<Option<RawSessionState>, ProviderError> {
        let updates: Vec<_> = self.pending_updates.lock().drain(..).collect();
        for state in updates {
            self.inner.emit(state);
        }
        self.inner.session_state(session_id).await
    }
}

#[tokio::test]
async fn test_callbacks_during_snapshot_keep_provider_order() {
    let fake = FakeProvider::new();
    let provider = Arc::new(BusyProvider {
        inner: fake.clone(),
        pending_updates: Mutex::new(vec![
            RawSessionState::new(1, status::PENDING, "x"),
            RawSessionState::new(1, status::DOWNLOADING, "x").with_bytes(500, 1000),
        ]),
    });
    let bridge = InstallerBridge::new(provider);
    let mut stream = bridge.install("x");

    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.phase, InstallPhase::Downloading(50));

    fake.emit(RawSessionState::new(1, status::INSTALLED, "x").with_bytes(1000, 1000));
    let mut phases = vec![first.phase];
    while let Some(item) = stream.next().await {
        phases.push(item.unwrap().phase);
    }

    assert_eq!(phases, vec![InstallPhase::Downloading(50), InstallPhase::Installed]);
    assert_eq!(bridge.registry().stats().removals, 1);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(30))]

    /// **属性: 已安装组件只产生一个 Installed，且不发起任何请求**
    #[test]
    fn prop_installed_feature_short_circuits(feature in "[a-z][a-z0-9_]{0,15}") {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let provider = FakeProvider::new();
        provider.mark_installed(&feature);
        let bridge = bridge_with(&provider);

        let phases: Vec<_> = rt.block_on(async {
            bridge
                .install(&feature)
                .map(|item| item.map(|p| p.phase))
                .collect()
                .await
        });

        prop_assert_eq!(phases, vec![Ok(InstallPhase::Installed)]);
        prop_assert_eq!(provider.start_install_calls(), 0);
        prop_assert_eq!(provider.register_listener_calls(), 0);
    }
}
