//! 拦截器链执行器
//!
//! 按列表顺序执行拦截器：
//! - 安装前：首个失败即停止，后续任务不执行
//! - 安装后：全部执行，失败只记录
//! - 每个任务向状态存储报告 Active → Completed | Failed(原因)

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::AbortHandle;

use super::types::{Interceptor, InterceptorOutcome, InterceptorPhase, InterceptorReport};
use crate::state::{InterceptorState, StateStore};

/// 丢弃时中止任务
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// 拦截器链执行器
#[derive(Clone)]
pub struct InterceptorRunner {
    store: Arc<dyn StateStore>,
    /// 单个任务超时（None 表示不限制）
    timeout: Option<Duration>,
}

impl InterceptorRunner {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self {
            store,
            timeout: None,
        }
    }

    /// 设置单个任务超时，0 表示不限制
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout = (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms));
        self
    }

    /// 拦截器 ID
    pub fn interceptor_id(feature: &str, phase: InterceptorPhase, index: usize) -> String {
        format!("{}-{}-{}", feature, phase.tag(), index)
    }

    /// 执行指定阶段的拦截器链
    ///
    /// 只执行 `phase` 匹配的拦截器，其他阶段的拦截器被跳过
    pub async fn run(
        &self,
        feature: &str,
        interceptors: &[Interceptor],
        phase: InterceptorPhase,
    ) -> InterceptorReport {
        let mut outcomes = Vec::new();
        let mut passed = true;

        let chain = interceptors.iter().filter(|i| i.phase == phase);
        for (index, interceptor) in chain.enumerate() {
            let outcome = self.run_one(feature, phase, index, interceptor).await;
            let success = outcome.success;
            outcomes.push(outcome);

            if !success {
                passed = false;
                if phase == InterceptorPhase::PreInstall {
                    tracing::warn!(
                        feature = %feature,
                        index,
                        "[INTERCEPTOR] 安装前拦截器失败，终止后续拦截器"
                    );
                    break;
                }
            }
        }

        tracing::info!(
            feature = %feature,
            phase = %phase,
            executed = outcomes.len(),
            passed,
            "[INTERCEPTOR] 拦截器链执行完成"
        );

        InterceptorReport {
            phase,
            outcomes,
            passed,
        }
    }

    async fn run_one(
        &self,
        feature: &str,
        phase: InterceptorPhase,
        index: usize,
        interceptor: &Interceptor,
    ) -> InterceptorOutcome {
        let id = Self::interceptor_id(feature, phase, index);
        let name = interceptor.name().to_string();
        self.store.set_interceptor_state(&id, InterceptorState::Active);

        let start = Instant::now();
        let result = self.execute(interceptor).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let (success, error) = match result {
            Ok(true) => (true, None),
            Ok(false) => (false, Some("拦截器返回失败".to_string())),
            Err(reason) => (false, Some(reason)),
        };

        match &error {
            None => {
                self.store.set_interceptor_state(&id, InterceptorState::Completed);
                tracing::debug!(id = %id, name = %name, duration_ms, "[INTERCEPTOR] 执行成功");
            }
            Some(reason) => {
                self.store
                    .set_interceptor_state(&id, InterceptorState::Failed(reason.clone()));
                tracing::warn!(id = %id, name = %name, reason = %reason, "[INTERCEPTOR] 执行失败");
            }
        }

        InterceptorOutcome {
            id,
            name,
            success,
            error,
            duration_ms,
        }
    }

    /// 在独立任务中执行，panic 与超时都转换为失败原因
    ///
    /// 超时或调用方放弃等待时任务被中止
    async fn execute(&self, interceptor: &Interceptor) -> Result<bool, String> {
        let task = interceptor.task.clone();
        let mut handle = tokio::spawn(async move { task.execute().await });
        let _abort = AbortOnDrop(handle.abort_handle());

        let joined = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut handle).await {
                Ok(joined) => joined,
                Err(_) => return Err(format!("执行超时: {}ms", limit.as_millis())),
            },
            None => (&mut handle).await,
        };

        match joined {
            Ok(Ok(ok)) => Ok(ok),
            Ok(Err(e)) => Err(e.to_string()),
            Err(e) if e.is_panic() => Err("拦截器 panic".to_string()),
            Err(e) => Err(e.to_string()),
        }
    }
}
