//! 拦截器类型定义

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// 拦截器阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterceptorPhase {
    /// 安装前（失败终止加载）
    PreInstall,
    /// 安装后（失败仅警告）
    PostInstall,
}

impl InterceptorPhase {
    /// 拦截器 ID 中使用的短标签
    pub fn tag(&self) -> &'static str {
        match self {
            InterceptorPhase::PreInstall => "pre",
            InterceptorPhase::PostInstall => "post",
        }
    }
}

impl fmt::Display for InterceptorPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterceptorPhase::PreInstall => write!(f, "pre_install"),
            InterceptorPhase::PostInstall => write!(f, "post_install"),
        }
    }
}

/// 拦截器任务 trait
///
/// 返回 `Ok(true)` 表示成功；`Ok(false)`、`Err` 或 panic 都视为失败。
/// 任务可能被重复执行（已安装组件重新加载时会再次运行安装后拦截器）。
#[async_trait]
pub trait InterceptorTask: Send + Sync {
    /// 执行任务
    async fn execute(&self) -> anyhow::Result<bool>;

    /// 任务名称
    fn name(&self) -> &str {
        "interceptor"
    }
}

/// 阻塞闭包任务
///
/// 闭包在 tokio 阻塞线程池中执行，不占用异步工作线程。
/// 超时或取消只会放弃等待结果，已开始执行的闭包会运行到结束。
pub struct BlockingTask<F> {
    name: String,
    func: Arc<F>,
}

impl<F> BlockingTask<F>
where
    F: Fn() -> anyhow::Result<bool> + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }
}

#[async_trait]
impl<F> InterceptorTask for BlockingTask<F>
where
    F: Fn() -> anyhow::Result<bool> + Send + Sync + 'static,
{
    async fn execute(&self) -> anyhow::Result<bool> {
        let func = self.func.clone();
        tokio::task::spawn_blocking(move || func()).await?
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// 拦截器
#[derive(Clone)]
pub struct Interceptor {
    pub phase: InterceptorPhase,
    pub task: Arc<dyn InterceptorTask>,
}

impl Interceptor {
    pub fn new(phase: InterceptorPhase, task: Arc<dyn InterceptorTask>) -> Self {
        Self { phase, task }
    }

    /// 安装前拦截器
    pub fn pre(task: impl InterceptorTask + 'static) -> Self {
        Self::new(InterceptorPhase::PreInstall, Arc::new(task))
    }

    /// 安装后拦截器
    pub fn post(task: impl InterceptorTask + 'static) -> Self {
        Self::new(InterceptorPhase::PostInstall, Arc::new(task))
    }

    /// 由阻塞闭包构造安装前拦截器
    pub fn pre_fn<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn() -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        Self::pre(BlockingTask::new(name, func))
    }

    /// 由阻塞闭包构造安装后拦截器
    pub fn post_fn<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn() -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        Self::post(BlockingTask::new(name, func))
    }

    /// 任务名称
    pub fn name(&self) -> &str {
        self.task.name()
    }
}

impl fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interceptor")
            .field("phase", &self.phase)
            .field("name", &self.task.name())
            .finish()
    }
}

/// 单个拦截器执行结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterceptorOutcome {
    /// 拦截器 ID（`{feature}-{pre|post}-{index}`）
    pub id: String,
    pub name: String,
    pub success: bool,
    /// 失败原因
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// 拦截器链执行报告
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterceptorReport {
    pub phase: InterceptorPhase,
    /// 实际执行的拦截器（按顺序）
    pub outcomes: Vec<InterceptorOutcome>,
    /// 所有执行的拦截器是否都成功
    pub passed: bool,
}

impl InterceptorReport {
    /// 失败的拦截器
    pub fn failed(&self) -> impl Iterator<Item = &InterceptorOutcome> {
        self.outcomes.iter().filter(|o| !o.success)
    }

    /// 实际执行数量
    pub fn executed(&self) -> usize {
        self.outcomes.len()
    }
}
