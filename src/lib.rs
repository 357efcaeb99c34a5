//! FeatureFlow
//!
//! 按需安装组件的编排引擎：
//! - 将分发服务的进程级回调转换为按组件订阅的可取消进度流
//! - 每个组件一个加载状态机（取代、确认握手、入口发现、重试）
//! - 安装前后拦截器链
//! - 状态持久化、配置、日志

pub mod boot;
pub mod component;
pub mod config;
pub mod error;
pub mod installer;
pub mod interceptor;
pub mod logger;
pub mod orchestrator;
pub mod route;
pub mod state;

pub use boot::{FeatureFlow, FeatureFlowBuilder};
pub use config::FlowConfig;
pub use error::{ErrorCategory, FlowError};
pub use orchestrator::{Orchestrator, UiState};
