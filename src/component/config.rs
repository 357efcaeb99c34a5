//! 组件配置

use crate::interceptor::{Interceptor, InterceptorPhase};

/// 组件配置
///
/// 由组件自身在入口注册函数中提供，描述路由名与有序的拦截器列表
#[derive(Debug, Clone)]
pub struct ComponentConfig {
    /// 路由名（即组件 ID）
    pub route: String,
    /// 有序拦截器列表
    pub interceptors: Vec<Interceptor>,
}

impl ComponentConfig {
    pub fn new(route: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            interceptors: Vec::new(),
        }
    }

    /// 追加拦截器
    pub fn with_interceptor(mut self, interceptor: Interceptor) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    /// 追加多个拦截器
    pub fn with_interceptors(mut self, interceptors: impl IntoIterator<Item = Interceptor>) -> Self {
        self.interceptors.extend(interceptors);
        self
    }

    /// 指定阶段的拦截器数量
    pub fn interceptor_count(&self, phase: InterceptorPhase) -> usize {
        self.interceptors.iter().filter(|i| i.phase == phase).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_keeps_order() {
        let config = ComponentConfig::new("plants")
            .with_interceptor(Interceptor::pre_fn("a", || Ok(true)))
            .with_interceptors(vec![
                Interceptor::post_fn("b", || Ok(true)),
                Interceptor::pre_fn("c", || Ok(true)),
            ]);

        let names: Vec<_> = config.interceptors.iter().map(|i| i.name()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(config.interceptor_count(InterceptorPhase::PreInstall), 2);
        assert_eq!(config.interceptor_count(InterceptorPhase::PostInstall), 1);
    }
}
