//! 状态存储
//!
//! 提供持久化协作者的默认实现：
//! - 最近一次尝试加载的组件（可选写入 JSON 偏好文件）
//! - 每个组件的安装阶段缓存（内存）
//! - 拦截器执行状态（内存）

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::watch;

use super::types::{InstallPhase, InterceptorState};

/// 状态存储 trait
///
/// 编排器只依赖这里声明的操作，持久化机制由实现决定
#[async_trait]
pub trait StateStore: Send + Sync {
    /// 读取最近一次尝试加载的组件
    async fn last_attempted_feature(&self) -> Option<String>;

    /// 记录最近一次尝试加载的组件
    async fn set_last_attempted_feature(&self, feature: &str);

    /// 读取组件的缓存安装阶段，未记录时为 `NotInstalled`
    fn installation_state(&self, feature: &str) -> InstallPhase;

    /// 写入组件的安装阶段
    fn set_installation_state(&self, feature: &str, phase: InstallPhase);

    /// 读取拦截器状态，未记录时为 `Inactive`
    fn interceptor_state(&self, interceptor_id: &str) -> InterceptorState;

    /// 写入拦截器状态
    fn set_interceptor_state(&self, interceptor_id: &str, state: InterceptorState);

    /// 订阅组件安装阶段的变化
    fn subscribe_installation_state(&self, feature: &str) -> watch::Receiver<InstallPhase>;
}

/// 偏好文件内容
#[derive(Debug, Default, Serialize, Deserialize)]
struct Preferences {
    #[serde(default)]
    last_attempted_feature: Option<String>,
}

/// 内存状态存储
///
/// 安装阶段与拦截器状态只保存在内存中；配置了 `prefs_path` 时，
/// 最近尝试的组件会写入 JSON 文件，进程重启后仍可用于重试。
pub struct MemoryStateStore {
    /// 偏好文件路径
    prefs_path: Option<PathBuf>,
    /// 未配置偏好文件时的内存副本
    last_attempted: RwLock<Option<String>>,
    /// 安装阶段（每个组件一个 watch 通道）
    installations: RwLock<HashMap<String, watch::Sender<InstallPhase>>>,
    /// 拦截器状态
    interceptors: RwLock<HashMap<String, InterceptorState>>,
}

impl MemoryStateStore {
    /// 创建纯内存存储
    pub fn new() -> Self {
        Self {
            prefs_path: None,
            last_attempted: RwLock::new(None),
            installations: RwLock::new(HashMap::new()),
            interceptors: RwLock::new(HashMap::new()),
        }
    }

    /// 创建带偏好文件的存储
    pub fn with_prefs_path(path: impl Into<PathBuf>) -> Self {
        Self {
            prefs_path: Some(path.into()),
            ..Self::new()
        }
    }

    /// 默认偏好文件路径: <config_dir>/featureflow/prefs.json
    pub fn default_prefs_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("featureflow")
            .join("prefs.json")
    }

    /// 偏好文件路径
    pub fn prefs_path(&self) -> Option<&Path> {
        self.prefs_path.as_deref()
    }

    async fn read_prefs(path: &Path) -> Option<Preferences> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("[STATE] 读取偏好文件失败 {}: {}", path.display(), e);
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(prefs) => Some(prefs),
            Err(e) => {
                tracing::warn!("[STATE] 偏好文件格式无效 {}: {}", path.display(), e);
                None
            }
        }
    }

    async fn write_prefs(path: &Path, prefs: &Preferences) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(prefs)?;
        tokio::fs::write(path, content).await
    }
}

impl Default for MemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn last_attempted_feature(&self) -> Option<String> {
        // 本实例写入过的值优先，偏好文件写入失败时仍然可用
        let remembered = self.last_attempted.read().clone();
        if remembered.is_some() {
            return remembered;
        }
        match &self.prefs_path {
            Some(path) => Self::read_prefs(path)
                .await
                .and_then(|p| p.last_attempted_feature),
            None => None,
        }
    }

    async fn set_last_attempted_feature(&self, feature: &str) {
        *self.last_attempted.write() = Some(feature.to_string());

        if let Some(path) = &self.prefs_path {
            let mut prefs = Self::read_prefs(path).await.unwrap_or_default();
            prefs.last_attempted_feature = Some(feature.to_string());
            // 写入失败只记录日志，内存副本仍然有效
            if let Err(e) = Self::write_prefs(path, &prefs).await {
                tracing::warn!("[STATE] 写入偏好文件失败 {}: {}", path.display(), e);
            }
        }
    }

    fn installation_state(&self, feature: &str) -> InstallPhase {
        self.installations
            .read()
            .get(feature)
            .map(|tx| *tx.borrow())
            .unwrap_or_default()
    }

    fn set_installation_state(&self, feature: &str, phase: InstallPhase) {
        let mut installations = self.installations.write();
        match installations.get(feature) {
            Some(tx) => {
                tx.send_if_modified(|current| {
                    if *current == phase {
                        return false;
                    }
                    *current = phase;
                    true
                });
            }
            None => {
                let (tx, _rx) = watch::channel(phase);
                installations.insert(feature.to_string(), tx);
            }
        }
        tracing::debug!(feature = %feature, phase = %phase, "[STATE] 安装阶段已更新");
    }

    fn interceptor_state(&self, interceptor_id: &str) -> InterceptorState {
        self.interceptors
            .read()
            .get(interceptor_id)
            .cloned()
            .unwrap_or_default()
    }

    fn set_interceptor_state(&self, interceptor_id: &str, state: InterceptorState) {
        self.interceptors
            .write()
            .insert(interceptor_id.to_string(), state);
    }

    fn subscribe_installation_state(&self, feature: &str) -> watch::Receiver<InstallPhase> {
        let mut installations = self.installations.write();
        installations
            .entry(feature.to_string())
            .or_insert_with(|| watch::channel(InstallPhase::NotInstalled).0)
            .subscribe()
    }
}
