//! 日志管理模块
//!
//! - `init_tracing`：安装 tracing fmt 订阅者
//! - `LogStore`：组件生命周期日志（内存环形缓冲，可选写入文件并按大小轮转）
//! - `sanitize_log_message`：写入前脱敏深链接中的敏感参数
use chrono::{Local, Utc};
use parking_lot::RwLock;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use crate::config::LoggingConfig;

/// 初始化 tracing 订阅者
///
/// 重复调用是空操作
pub fn init_tracing(config: &LoggingConfig) {
    let level = tracing::Level::from_str(&config.level).unwrap_or(tracing::Level::INFO);
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init();
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub level: String,
    pub feature: Option<String>,
    pub message: String,
}

pub struct LogStore {
    logs: VecDeque<LogEntry>,
    max_logs: usize,
    max_file_size: u64,
    log_file_path: Option<PathBuf>,
}

impl Default for LogStore {
    fn default() -> Self {
        Self::with_config(&LoggingConfig::default())
    }
}

impl LogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(logging: &LoggingConfig) -> Self {
        let log_file_path = logging.enable_file_logging.then(|| {
            // 默认日志文件路径: <data_dir>/featureflow/logs/featureflow.log
            let log_dir = logging.log_dir.clone().unwrap_or_else(|| {
                dirs::data_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("featureflow")
                    .join("logs")
            });
            let _ = fs::create_dir_all(&log_dir);
            log_dir.join("featureflow.log")
        });

        Self {
            logs: VecDeque::new(),
            max_logs: logging.max_logs.max(1),
            max_file_size: logging.max_file_size,
            log_file_path,
        }
    }

    pub fn add(&mut self, level: &str, feature: Option<&str>, message: &str) {
        let sanitized = sanitize_log_message(message);
        let entry = LogEntry {
            timestamp: Utc::now().to_rfc3339(),
            level: level.to_string(),
            feature: feature.map(str::to_string),
            message: sanitized.clone(),
        };

        if let Some(ref path) = self.log_file_path {
            self.rotate_log_file_if_needed(path);
            let local_time = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
            let log_line = match feature {
                Some(feature) => format!(
                    "{} [{}] [{}] {}\n",
                    local_time,
                    level.to_uppercase(),
                    feature,
                    sanitized
                ),
                None => format!("{} [{}] {}\n", local_time, level.to_uppercase(), sanitized),
            };
            if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
                let _ = file.write_all(log_line.as_bytes());
            }
        }

        self.logs.push_back(entry);
        // 保持日志数量在限制内
        while self.logs.len() > self.max_logs {
            self.logs.pop_front();
        }
    }

    pub fn get_logs(&self) -> Vec<LogEntry> {
        self.logs.iter().cloned().collect()
    }

    /// 指定组件的日志
    pub fn logs_for(&self, feature: &str) -> Vec<LogEntry> {
        self.logs
            .iter()
            .filter(|e| e.feature.as_deref() == Some(feature))
            .cloned()
            .collect()
    }

    pub fn clear(&mut self) {
        self.logs.clear();
    }

    pub fn log_file_path(&self) -> Option<&Path> {
        self.log_file_path.as_deref()
    }

    fn rotate_log_file_if_needed(&self, path: &Path) {
        let Ok(metadata) = fs::metadata(path) else {
            return;
        };

        if metadata.len() <= self.max_file_size {
            return;
        }

        let suffix = Local::now().format("%Y%m%d-%H%M%S%.3f");
        let rotated = path.with_file_name(format!(
            "{}.{}",
            path.file_name().unwrap_or_default().to_string_lossy(),
            suffix
        ));

        let _ = fs::rename(path, &rotated);
    }
}

pub type SharedLogStore = Arc<RwLock<LogStore>>;

/// 脱敏深链接和错误信息中的敏感字段
pub fn sanitize_log_message(message: &str) -> String {
    let patterns = [
        // Bearer token
        (r"Bearer\s+[A-Za-z0-9._-]+", "Bearer ***"),
        // 查询参数或键值对形式的凭证
        (
            r#"(?i)(access[_-]?token|refresh[_-]?token|api[_-]?key|token|secret|password)(["']?\s*[:=]\s*["']?)[^\s"'&,}]+"#,
            "$1$2***",
        ),
    ];

    let mut sanitized = message.to_string();
    for (pattern, replacement) in patterns {
        if let Ok(re) = Regex::new(pattern) {
            sanitized = re.replace_all(&sanitized, replacement).to_string();
        }
    }
    sanitized
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sanitize_deep_link_query() {
        let input = "加载 /df/route/plants?id=7&token=abc123&mode=full";
        let output = sanitize_log_message(input);
        assert!(!output.contains("abc123"));
        assert!(output.contains("token=***"));
        assert!(output.contains("id=7"));
        assert!(output.contains("mode=full"));
    }

    #[test]
    fn test_sanitize_bearer_and_password() {
        let output = sanitize_log_message(r#"Bearer abcDEF123 {"password":"p@ss"}"#);
        assert!(!output.contains("abcDEF123"));
        assert!(!output.contains("p@ss"));
    }

    #[test]
    fn test_plain_text_unchanged() {
        let input = "组件 plants 安装完成";
        assert_eq!(sanitize_log_message(input), input);
    }

    #[test]
    fn test_ring_buffer_bounded() {
        let config = LoggingConfig {
            max_logs: 3,
            ..Default::default()
        };
        let mut store = LogStore::with_config(&config);
        for i in 0..5 {
            store.add("info", Some("plants"), &format!("事件 {}", i));
        }
        let logs = store.get_logs();
        assert_eq!(logs.len(), 3);
        assert_eq!(logs[0].message, "事件 2");
        assert_eq!(store.logs_for("plants").len(), 3);
        assert!(store.logs_for("garden").is_empty());
    }

    #[test]
    fn test_file_logging_and_rotation() {
        let dir = TempDir::new().unwrap();
        let config = LoggingConfig {
            enable_file_logging: true,
            log_dir: Some(dir.path().to_path_buf()),
            max_file_size: 64,
            ..Default::default()
        };
        let mut store = LogStore::with_config(&config);
        let path = store.log_file_path().unwrap().to_path_buf();

        store.add("info", Some("plants"), "第一条日志，长度足以超过轮转阈值的一条消息");
        assert!(fs::read_to_string(&path).unwrap().contains("[INFO] [plants]"));

        store.add("warn", None, "token=secret-value");
        let rotated = fs::read_dir(dir.path())
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().starts_with("featureflow.log."))
            .count();
        assert_eq!(rotated, 1);

        let current = fs::read_to_string(&path).unwrap();
        assert!(!current.contains("secret-value"));
    }
}
