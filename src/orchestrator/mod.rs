//! 组件加载编排器
//!
//! 每个组件一个状态机，驱动安装桥接、拦截器链与状态持久化：
//! - 每个组件最多一个进行中的任务，加载其他组件时取消当前任务
//! - 缓存确认载荷，供外部确认界面使用
//! - 安装完成后执行一次入口发现与安装后拦截器
//! - 取消的任务不发布状态，也不写入持久化状态

mod types;


pub use types::UiState;

use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::component::{ComponentRegistry, EntryDiscovery};
use crate::config::OrchestratorConfig;
use crate::error::FlowError;
use crate::installer::{InstallerBridge, RawSessionState};
use crate::interceptor::{InterceptorPhase, InterceptorRunner};
use crate::logger::SharedLogStore;
use crate::route::RouteParser;
use crate::state::{InstallPhase, StateStore};

/// 进行中的加载任务
struct ActiveJob {
    job_id: Uuid,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

struct OrchestratorInner {
    bridge: InstallerBridge,
    store: Arc<dyn StateStore>,
    registry: Arc<dyn ComponentRegistry>,
    discovery: EntryDiscovery,
    runner: InterceptorRunner,
    config: OrchestratorConfig,
    route_parser: RouteParser,
    logs: SharedLogStore,
    ui_tx: watch::Sender<UiState>,
    jobs: Mutex<HashMap<String, ActiveJob>>,
    confirmations: Mutex<HashMap<String, RawSessionState>>,
    root_token: CancellationToken,
}

/// 组件加载编排器
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<OrchestratorInner>,
}

/// 校验组件 ID，ID 本身不透明，只拒绝空白
fn validate_feature(feature: &str) -> Result<(), FlowError> {
    if feature.trim().is_empty() {
        return Err(FlowError::Validation("组件 ID 不能为空".to_string()));
    }
    Ok(())
}

impl Orchestrator {
    pub fn new(
        bridge: InstallerBridge,
        store: Arc<dyn StateStore>,
        registry: Arc<dyn ComponentRegistry>,
        discovery: EntryDiscovery,
        config: OrchestratorConfig,
        route_parser: RouteParser,
        logs: SharedLogStore,
    ) -> Self {
        let runner = InterceptorRunner::new(store.clone()).with_timeout_ms(config.interceptor_timeout_ms);
        let (ui_tx, _) = watch::channel(UiState::Idle);
        Self {
            inner: Arc::new(OrchestratorInner {
                bridge,
                store,
                registry,
                discovery,
                runner,
                config,
                route_parser,
                logs,
                ui_tx,
                jobs: Mutex::new(HashMap::new()),
                confirmations: Mutex::new(HashMap::new()),
                root_token: CancellationToken::new(),
            }),
        }
    }

    /// 当前 UI 状态
    pub fn ui_state(&self) -> UiState {
        self.inner.ui_tx.borrow().clone()
    }

    /// 订阅 UI 状态
    pub fn subscribe(&self) -> watch::Receiver<UiState> {
        self.inner.ui_tx.subscribe()
    }

    /// 加载组件
    ///
    /// 同一组件已有进行中的任务时为空操作；加载其他组件时按配置取消其进行中的任务。
    /// 校验失败或编排器已关闭时发布 `Error` 状态并返回错误。
    pub async fn load_feature(&self, feature: &str) -> Result<(), FlowError> {
        if let Err(e) = validate_feature(feature) {
            self.inner.publish_error(None, e.clone());
            return Err(e);
        }
        if self.inner.root_token.is_cancelled() {
            let err = FlowError::Validation("编排器已关闭，不再接受加载请求".to_string());
            self.inner.publish_error(Some(feature.to_string()), err.clone());
            return Err(err);
        }

        self.inner.store.set_last_attempted_feature(feature).await;

        let mut jobs = self.inner.jobs.lock();
        if let Some(job) = jobs.get(feature) {
            if !job.handle.is_finished() {
                tracing::info!(feature = %feature, job_id = %job.job_id, "[FLOW] 组件已在加载中，忽略重复请求");
                return Ok(());
            }
        }

        if self.inner.config.supersede_other_features {
            let others: Vec<String> = jobs.keys().filter(|k| *k != feature).cloned().collect();
            for other in others {
                if let Some(job) = jobs.remove(&other) {
                    job.token.cancel();
                    self.inner.confirmations.lock().remove(&other);
                    self.inner.record("info", &other, "被其他组件的加载请求取消");
                }
            }
        }

        let job_id = Uuid::new_v4();
        let token = self.inner.root_token.child_token();
        self.inner.record("info", feature, &format!("开始加载 (job {})", job_id));
        let handle = tokio::spawn(OrchestratorInner::run_job(
            self.inner.clone(),
            feature.to_string(),
            job_id,
            token.clone(),
        ));
        jobs.insert(
            feature.to_string(),
            ActiveJob {
                job_id,
                token,
                handle,
            },
        );
        Ok(())
    }

    /// 解析深链接并加载对应组件
    pub async fn load_from_uri(&self, uri: &str) -> Result<(), FlowError> {
        let route = self.inner.route_parser.parse(uri);
        let feature = match (route.is_success(), route.route) {
            (true, Some(feature)) => feature,
            (true, None) => {
                let err = FlowError::Validation(format!(
                    "深链接只包含导航键 {:?}，无法确定组件",
                    route.navigation_key
                ));
                self.inner.publish_error(None, err.clone());
                return Err(err);
            }
            (false, _) => {
                let err = FlowError::Validation("无效的深链接".to_string());
                self.inner.publish_error(None, err.clone());
                return Err(err);
            }
        };
        self.load_feature(&feature).await
    }

    /// 重新加载最近一次尝试的组件
    pub async fn retry(&self) -> Result<(), FlowError> {
        match self.inner.store.last_attempted_feature().await {
            Some(feature) => {
                tracing::info!(feature = %feature, "[FLOW] 重试加载");
                self.load_feature(&feature).await
            }
            None => {
                let err = FlowError::Validation("没有可重试的组件".to_string());
                self.inner.publish_error(None, err.clone());
                Err(err)
            }
        }
    }

    /// 外部确认界面已完成
    ///
    /// 返回 false 表示该组件没有待确认的会话
    pub fn confirm_installation(&self, feature: &str) -> bool {
        if self.inner.confirmations.lock().remove(feature).is_none() {
            tracing::warn!(feature = %feature, "[FLOW] 没有待确认的安装");
            return false;
        }
        self.inner.record("info", feature, "用户已确认安装");
        self.inner.ui_tx.send_if_modified(|current| {
            let waiting = matches!(current, UiState::RequiresConfirmation { feature: f } if f == feature);
            if waiting {
                *current = UiState::Loading {
                    feature: feature.to_string(),
                    phase: InstallPhase::Pending,
                };
            }
            waiting
        });
        true
    }

    /// 待确认的原始会话状态
    pub fn pending_confirmation_payload(&self, feature: &str) -> Option<RawSessionState> {
        self.inner.confirmations.lock().get(feature).cloned()
    }

    /// 当前 UI 所示组件的待确认载荷
    pub fn current_confirmation_payload(&self) -> Option<RawSessionState> {
        let feature = self.ui_state().feature().map(str::to_string)?;
        self.pending_confirmation_payload(&feature)
    }

    /// 取消组件的加载任务
    ///
    /// 只影响该组件；可重复调用
    pub fn cancel(&self, feature: &str) -> bool {
        let job = self.inner.jobs.lock().remove(feature);
        if let Some(job) = &job {
            job.token.cancel();
        }
        self.inner.confirmations.lock().remove(feature);
        if job.is_none() {
            return false;
        }
        self.inner.record("info", feature, "加载已取消");
        self.inner.ui_tx.send_if_modified(|current| {
            if current.feature() == Some(feature) && !current.is_terminal() {
                *current = UiState::Idle;
                return true;
            }
            false
        });
        true
    }

    /// 取消所有任务
    ///
    /// 关闭不可恢复，之后的加载请求返回错误
    pub fn shutdown(&self) {
        self.inner.root_token.cancel();
        let jobs: Vec<_> = self.inner.jobs.lock().drain().collect();
        self.inner.confirmations.lock().clear();
        tracing::info!(jobs = jobs.len(), "[FLOW] 编排器已关闭");
        self.inner.ui_tx.send_replace(UiState::Idle);
    }

    /// 错误是否可重试
    pub fn is_retryable(&self, error: &FlowError) -> bool {
        self.inner
            .config
            .retryable_categories
            .contains(&error.category())
    }

    /// 进行中的组件
    pub fn active_features(&self) -> Vec<String> {
        let mut features: Vec<_> = self
            .inner
            .jobs
            .lock()
            .iter()
            .filter(|(_, job)| !job.handle.is_finished())
            .map(|(feature, _)| feature.clone())
            .collect();
        features.sort();
        features
    }

    /// 安装桥接
    pub fn bridge(&self) -> &InstallerBridge {
        &self.inner.bridge
    }
}

impl OrchestratorInner {
    async fn run_job(self: Arc<Self>, feature: String, job_id: Uuid, token: CancellationToken) {
        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            result = self.drive(&feature, &token) => Some(result),
        };

        let terminal = match outcome {
            None => {
                tracing::info!(feature = %feature, job_id = %job_id, "[FLOW] 任务已取消");
                None
            }
            Some(Ok(warnings)) => {
                for warning in &warnings {
                    tracing::warn!(feature = %feature, warning = %warning, "[FLOW] 加载完成但有警告");
                }
                self.record("info", &feature, &format!("加载成功（{} 个警告）", warnings.len()));
                Some(UiState::Success {
                    feature: feature.clone(),
                    warnings,
                })
            }
            Some(Err(error)) => {
                self.confirmations.lock().remove(&feature);
                error.log_with_context(&feature);
                self.record("error", &feature, &error.to_string());
                Some(UiState::Error {
                    feature: Some(feature.clone()),
                    error,
                })
            }
        };

        // 持有任务表锁时移除任务再发布终态，收到终态的调用方可以立即重新加载
        let mut jobs = self.jobs.lock();
        if jobs.get(&feature).map(|j| j.job_id) == Some(job_id) {
            jobs.remove(&feature);
        }
        if let Some(state) = terminal {
            self.publish(&token, state);
        }
    }

    async fn drive(&self, feature: &str, token: &CancellationToken) -> Result<Vec<FlowError>, FlowError> {
        self.publish(
            token,
            UiState::Loading {
                feature: feature.to_string(),
                phase: self.store.installation_state(feature),
            },
        );

        if self.bridge.is_installed(feature) {
            tracing::info!(feature = %feature, "[FLOW] 组件已安装，执行安装后流程");
            self.persist(token, feature, InstallPhase::Installed);
            return self.post_install(feature).await;
        }

        // 安装前配置可能尚未注册，此时跳过安装前拦截器
        if let Some(config) = self.registry.config(feature) {
            let report = self
                .runner
                .run(feature, &config.interceptors, InterceptorPhase::PreInstall)
                .await;
            if !report.passed {
                let failed: Vec<_> = report.failed().map(|o| o.id.as_str()).collect();
                return Err(FlowError::PreInstallInterceptor(format!(
                    "安装前拦截器失败: {}",
                    failed.join(", ")
                )));
            }
        }

        let mut stream = self.bridge.install(feature);
        let mut terminal: Option<InstallPhase> = None;
        let mut failure: Option<FlowError> = None;

        while let Some(item) = stream.next().await {
            let progress = match item {
                Ok(progress) => progress,
                Err(e) => {
                    failure = Some(e.into());
                    break;
                }
            };
            let phase = progress.phase;
            if terminal.is_some() {
                continue;
            }

            self.persist(token, feature, phase);
            match phase {
                InstallPhase::RequiresConfirmation => {
                    if let Some(raw) = progress.into_confirmation() {
                        let mut confirmations = self.confirmations.lock();
                        if !token.is_cancelled() {
                            confirmations.insert(feature.to_string(), raw);
                        }
                    }
                    self.record("info", feature, "等待用户确认");
                    self.publish(
                        token,
                        UiState::RequiresConfirmation {
                            feature: feature.to_string(),
                        },
                    );
                }
                other => {
                    if other != InstallPhase::Pending {
                        self.confirmations.lock().remove(feature);
                    }
                    // 失败与取消由任务结束时的 Error 状态表达
                    if matches!(other, InstallPhase::Failed(_) | InstallPhase::Canceled) {
                        terminal = Some(other);
                        continue;
                    }
                    self.publish(
                        token,
                        UiState::Loading {
                            feature: feature.to_string(),
                            phase: other,
                        },
                    );
                }
            }

            if phase.is_terminal() {
                terminal = Some(phase);
            }
        }

        match terminal {
            Some(InstallPhase::Installed) => self.post_install(feature).await,
            Some(InstallPhase::Failed(code)) => {
                Err(failure.unwrap_or_else(|| FlowError::from_failed_phase(feature, code)))
            }
            Some(InstallPhase::Canceled) => Err(FlowError::Installation {
                message: format!("组件 {} 的安装已被分发服务取消", feature),
                code: None,
            }),
            _ => Err(failure.unwrap_or_else(|| {
                FlowError::Unknown(format!("组件 {} 的进度流在终态前结束", feature))
            })),
        }
    }

    /// 安装后流程：入口发现一次，然后执行安装后拦截器
    async fn post_install(&self, feature: &str) -> Result<Vec<FlowError>, FlowError> {
        let mut warnings = Vec::new();

        let discovery = self.discovery.clone();
        let registry = self.registry.clone();
        let target = feature.to_string();
        let discovered = tokio::task::spawn_blocking(move || discovery.discover(&target, registry.as_ref()))
            .await
            .unwrap_or_else(|e| Err(FlowError::ServiceDiscovery(format!("入口发现任务异常: {}", e))));

        let config = match discovered {
            Ok(config) => Some(config),
            Err(e) => {
                warnings.push(e);
                None
            }
        };

        if let Some(config) = config {
            let report = self
                .runner
                .run(feature, &config.interceptors, InterceptorPhase::PostInstall)
                .await;
            for failed in report.failed() {
                warnings.push(FlowError::PostInstallInterceptor(format!(
                    "{} ({}): {}",
                    failed.id,
                    failed.name,
                    failed.error.as_deref().unwrap_or("未知原因")
                )));
            }
        }

        Ok(warnings)
    }

    /// 写入安装阶段，已取消的任务不写入
    fn persist(&self, token: &CancellationToken, feature: &str, phase: InstallPhase) {
        if token.is_cancelled() {
            return;
        }
        if self.store.installation_state(feature) != phase {
            self.record("info", feature, &format!("安装阶段: {}", phase));
        }
        self.store.set_installation_state(feature, phase);
    }

    /// 发布 UI 状态，已取消的任务不发布
    fn publish(&self, token: &CancellationToken, state: UiState) {
        self.ui_tx.send_if_modified(|current| {
            if token.is_cancelled() || *current == state {
                return false;
            }
            *current = state;
            true
        });
    }

    fn publish_error(&self, feature: Option<String>, error: FlowError) {
        tracing::warn!(feature = ?feature, error = %error, "[FLOW] 请求被拒绝");
        self.ui_tx.send_replace(UiState::Error { feature, error });
    }

    fn record(&self, level: &str, feature: &str, message: &str) {
        tracing::debug!(feature = %feature, "[FLOW] {}", message);
        self.logs.write().add(level, Some(feature), message);
    }
}
