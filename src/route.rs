//! 深链接路由解析
//!
//! 支持以下形式（`prefix` 默认 `/df/`）：
//! - `<prefix>route/<name>?k=v`：按路由名加载组件
//! - `<prefix>navigation/key/<key>?k=v`：导航键
//! - `<prefix><name>`：最后一段作为路由名

use serde::{Deserialize, Serialize};
use url::Url;

use crate::logger::sanitize_log_message;

/// 相对路径解析时使用的基准地址
const RELATIVE_BASE: &str = "featureflow://local/";

/// 默认路由前缀
pub const DEFAULT_ROUTE_PREFIX: &str = "/df/";

/// 路由解析状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteStatus {
    Success,
    Failed,
}

/// 组件路由
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentRoute {
    pub path: String,
    /// 路由名（组件 ID）
    pub route: Option<String>,
    pub navigation_key: Option<String>,
    /// 查询参数（保持原始顺序）
    pub params: Vec<(String, String)>,
    pub status: RouteStatus,
}

impl ComponentRoute {
    fn failed() -> Self {
        Self {
            path: String::new(),
            route: None,
            navigation_key: None,
            params: Vec::new(),
            status: RouteStatus::Failed,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RouteStatus::Success
    }

    /// 查询参数
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// 路由解析器
#[derive(Debug, Clone)]
pub struct RouteParser {
    prefix: String,
}

impl Default for RouteParser {
    fn default() -> Self {
        Self::new(DEFAULT_ROUTE_PREFIX)
    }
}

/// 写入日志前脱敏深链接中的凭证参数
fn loggable_uri(uri: &str) -> String {
    sanitize_log_message(uri)
}

impl RouteParser {
    /// 创建解析器，前缀会被规范化为 `/xxx/` 形式
    pub fn new(prefix: &str) -> Self {
        let trimmed = prefix.trim_matches('/');
        let prefix = if trimmed.is_empty() {
            "/".to_string()
        } else {
            format!("/{}/", trimmed)
        };
        Self { prefix }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// 解析深链接，无效 URI 或前缀不匹配时返回 `Failed`
    pub fn parse(&self, uri: &str) -> ComponentRoute {
        let parsed = match Url::parse(uri) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                match Url::parse(RELATIVE_BASE).and_then(|base| base.join(uri)) {
                    Ok(url) => url,
                    Err(e) => {
                        tracing::warn!("[ROUTE] 无法解析 URI {}: {}", loggable_uri(uri), e);
                        return ComponentRoute::failed();
                    }
                }
            }
            Err(e) => {
                tracing::warn!("[ROUTE] 无法解析 URI {}: {}", loggable_uri(uri), e);
                return ComponentRoute::failed();
            }
        };

        let path = parsed.path().to_string();
        let rest = match path.strip_prefix(&self.prefix) {
            Some(rest) => rest,
            None => {
                tracing::warn!("[ROUTE] 路径前缀不匹配: {} (期望 {})", path, self.prefix);
                return ComponentRoute::failed();
            }
        };

        let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
        let params: Vec<(String, String)> = parsed
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        let (route, navigation_key) = match segments.as_slice() {
            ["route", name, ..] => (Some(name.to_string()), None),
            ["navigation", "key", key, ..] => (None, Some(key.to_string())),
            [.., last] => (Some(last.to_string()), None),
            [] => (None, None),
        };

        if route.is_none() && navigation_key.is_none() {
            tracing::warn!("[ROUTE] 路径中没有路由名: {}", path);
            return ComponentRoute::failed();
        }

        ComponentRoute {
            path,
            route,
            navigation_key,
            params,
            status: RouteStatus::Success,
        }
    }
}
