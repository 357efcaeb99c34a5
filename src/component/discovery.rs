//! 组件入口发现
//!
//! 每个组件提供一个显式的注册函数。安装完成后依次调用所有已知入口，
//! 然后检查目标组件的配置是否已注册。

use std::sync::Arc;

use super::config::ComponentConfig;
use super::registry::ComponentRegistry;
use crate::error::FlowError;

/// 组件入口
pub trait ComponentEntry: Send + Sync {
    /// 入口名称
    fn name(&self) -> &str;

    /// 向注册表注册组件配置
    fn initialize(&self, registry: &dyn ComponentRegistry) -> anyhow::Result<()>;
}

/// 闭包入口
pub struct FnEntry<F> {
    name: String,
    func: F,
}

impl<F> FnEntry<F>
where
    F: Fn(&dyn ComponentRegistry) -> anyhow::Result<()> + Send + Sync,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> ComponentEntry for FnEntry<F>
where
    F: Fn(&dyn ComponentRegistry) -> anyhow::Result<()> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&self, registry: &dyn ComponentRegistry) -> anyhow::Result<()> {
        (self.func)(registry)
    }
}

/// 入口发现器
#[derive(Clone, Default)]
pub struct EntryDiscovery {
    entries: Vec<Arc<dyn ComponentEntry>>,
}

impl EntryDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加入口
    pub fn add(&mut self, entry: Arc<dyn ComponentEntry>) {
        self.entries.push(entry);
    }

    /// 已知入口数量
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 调用所有入口并返回目标组件的配置
    ///
    /// 单个入口失败只记录日志；调用完成后目标组件仍无配置时返回 `ServiceDiscovery`
    pub fn discover(
        &self,
        feature: &str,
        registry: &dyn ComponentRegistry,
    ) -> Result<ComponentConfig, FlowError> {
        for entry in &self.entries {
            if let Err(e) = entry.initialize(registry) {
                tracing::warn!(
                    feature = %feature,
                    entry = %entry.name(),
                    error = %e,
                    "[DISCOVERY] 组件入口初始化失败"
                );
            }
        }

        registry.config(feature).ok_or_else(|| {
            FlowError::ServiceDiscovery(format!(
                "组件 {} 的入口未注册配置（已调用 {} 个入口）",
                feature,
                self.entries.len()
            ))
        })
    }
}
