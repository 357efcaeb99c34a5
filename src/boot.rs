//! 启动装配
//!
//! 在进程启动时显式构造所有协作者并注入编排器

use parking_lot::RwLock;
use std::sync::Arc;

use crate::component::{ComponentEntry, ComponentRegistry, ComponentRegistryManager, EntryDiscovery};
use crate::config::FlowConfig;
use crate::installer::{InstallProvider, InstallerBridge};
use crate::logger::{LogStore, SharedLogStore};
use crate::orchestrator::Orchestrator;
use crate::route::RouteParser;
use crate::state::{MemoryStateStore, StateStore};

/// 装配完成的组件加载系统
#[derive(Clone)]
pub struct FeatureFlow {
    pub orchestrator: Orchestrator,
    pub bridge: InstallerBridge,
    pub store: Arc<dyn StateStore>,
    pub registry: Arc<dyn ComponentRegistry>,
    pub logs: SharedLogStore,
    pub config: FlowConfig,
}

impl FeatureFlow {
    pub fn builder(provider: Arc<dyn InstallProvider>) -> FeatureFlowBuilder {
        FeatureFlowBuilder {
            provider,
            store: None,
            registry: None,
            discovery: EntryDiscovery::new(),
            config: FlowConfig::default(),
        }
    }
}

/// 装配器
pub struct FeatureFlowBuilder {
    provider: Arc<dyn InstallProvider>,
    store: Option<Arc<dyn StateStore>>,
    registry: Option<Arc<dyn ComponentRegistry>>,
    discovery: EntryDiscovery,
    config: FlowConfig,
}

impl FeatureFlowBuilder {
    /// 使用自定义状态存储（默认按配置创建 `MemoryStateStore`）
    pub fn store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// 使用自定义配置注册表
    pub fn registry(mut self, registry: Arc<dyn ComponentRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// 添加组件入口
    pub fn entry(mut self, entry: Arc<dyn ComponentEntry>) -> Self {
        self.discovery.add(entry);
        self
    }

    pub fn config(mut self, config: FlowConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> FeatureFlow {
        let config = self.config;
        let store: Arc<dyn StateStore> = match (self.store, &config.state.prefs_path) {
            (Some(store), _) => store,
            (None, Some(path)) => Arc::new(MemoryStateStore::with_prefs_path(path)),
            (None, None) => Arc::new(MemoryStateStore::new()),
        };
        let registry: Arc<dyn ComponentRegistry> = match self.registry {
            Some(registry) => registry,
            None => Arc::new(ComponentRegistryManager::new()),
        };
        let logs: SharedLogStore = Arc::new(RwLock::new(LogStore::with_config(&config.logging)));
        let bridge = InstallerBridge::new(self.provider);

        tracing::info!(
            entries = self.discovery.len(),
            supersede = config.orchestrator.supersede_other_features,
            "[BOOT] 组件加载系统已装配"
        );

        let orchestrator = Orchestrator::new(
            bridge.clone(),
            store.clone(),
            registry.clone(),
            self.discovery,
            config.orchestrator.clone(),
            RouteParser::new(&config.route.prefix),
            logs.clone(),
        );

        FeatureFlow {
            orchestrator,
            bridge,
            store,
            registry,
            logs,
            config,
        }
    }
}
