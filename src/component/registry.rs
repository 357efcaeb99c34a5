//! 组件配置注册表

use parking_lot::RwLock;
use std::collections::HashMap;

use super::config::ComponentConfig;

/// 组件配置注册表 trait
pub trait ComponentRegistry: Send + Sync {
    /// 注册组件配置，已存在时覆盖
    fn register(&self, config: ComponentConfig);

    /// 注销组件配置
    fn unregister(&self, route: &str) -> bool;

    /// 获取组件配置
    fn config(&self, route: &str) -> Option<ComponentConfig>;

    /// 组件是否已注册
    fn is_registered(&self, route: &str) -> bool {
        self.config(route).is_some()
    }

    /// 所有已注册的路由
    fn routes(&self) -> Vec<String>;
}

/// 默认组件配置注册表
#[derive(Default)]
pub struct ComponentRegistryManager {
    configs: RwLock<HashMap<String, ComponentConfig>>,
}

impl ComponentRegistryManager {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ComponentRegistry for ComponentRegistryManager {
    fn register(&self, config: ComponentConfig) {
        tracing::info!(route = %config.route, "[COMPONENT] 注册组件配置");
        self.configs.write().insert(config.route.clone(), config);
    }

    fn unregister(&self, route: &str) -> bool {
        self.configs.write().remove(route).is_some()
    }

    fn config(&self, route: &str) -> Option<ComponentConfig> {
        self.configs.read().get(route).cloned()
    }

    fn is_registered(&self, route: &str) -> bool {
        self.configs.read().contains_key(route)
    }

    fn routes(&self) -> Vec<String> {
        let mut routes: Vec<_> = self.configs.read().keys().cloned().collect();
        routes.sort();
        routes
    }
}
