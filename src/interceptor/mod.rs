//! 拦截器模块
//!
//! 组件安装前后执行的钩子：
//! - 安装前拦截器作为门禁，失败终止加载
//! - 安装后拦截器用于初始化，失败只产生警告
//! - 阻塞任务在 tokio 阻塞线程池中执行

mod runner;
mod types;

pub use runner::InterceptorRunner;
pub use types::{
    BlockingTask, Interceptor, InterceptorOutcome, InterceptorPhase, InterceptorReport,
    InterceptorTask,
};
