//! 组件模块
//!
//! 组件配置、配置注册表与安装后的入口发现

mod config;
mod discovery;
mod registry;

pub use config::ComponentConfig;
pub use discovery::{ComponentEntry, EntryDiscovery, FnEntry};
pub use registry::{ComponentRegistry, ComponentRegistryManager};
