use std::path::PathBuf;
use std::time::Duration;

use crate::auth::JwtConfig;
use crate::core::error::{Result, ServerError};

/// 服务器配置
///
/// # 环境变量
///
/// 所有配置项都可以通过环境变量覆盖：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | WORK_DIR | ./data | 工作目录 (database/ 与 logs/) |
/// | HTTP_PORT | 5080 | HTTP 服务端口 |
/// | ENVIRONMENT | development | 运行环境 |
/// | LOG_LEVEL | info | 日志级别 |
/// | LOG_JSON | false | JSON 格式日志 |
/// | ESCALATION_THRESHOLD_MINUTES | 20 | 第 2 位提醒的服务时长阈值 |
/// | ESCALATION_INTERVAL_SECS | 60 | 升级检查间隔 |
/// | NOTIFY_WEBHOOK_URL | - | 设置后通过 webhook 发送通知 |
/// | NOTIFY_QUEUE_CAPACITY | 1024 | 通知队列容量 |
/// | ADMIN_PIN / ADMIN_NAME | - / Admin | 首次启动创建管理员 |
/// | CORS_ORIGINS | - (任意) | 允许的来源，逗号分隔 |
///
/// JWT 相关变量见 [`JwtConfig::from_env`]。
///
/// # 示例
///
/// ```ignore
/// WORK_DIR=/srv/queue HTTP_PORT=8080 ADMIN_PIN=4321 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// 工作目录
    pub work_dir: String,
    /// HTTP API 服务端口
    pub http_port: u16,
    /// 运行环境: development | staging | production
    pub environment: String,
    pub log_level: String,
    pub log_json: bool,
    /// JWT 认证配置
    pub jwt: JwtConfig,
    pub escalation_threshold_minutes: i64,
    pub escalation_interval_secs: u64,
    pub notify_webhook_url: Option<String>,
    pub notify_queue_capacity: usize,
    pub admin_pin: Option<String>,
    pub admin_name: String,
    /// 为空表示允许任意来源
    pub cors_origins: Vec<String>,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置，使用默认值
    pub fn from_env() -> Result<Self> {
        let jwt = JwtConfig::from_env().map_err(|e| ServerError::Config(e.to_string()))?;

        Ok(Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "./data".into()),
            http_port: env_or("HTTP_PORT", 5080),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_json: env_or("LOG_JSON", false),
            jwt,
            escalation_threshold_minutes: env_or("ESCALATION_THRESHOLD_MINUTES", 20),
            escalation_interval_secs: env_or("ESCALATION_INTERVAL_SECS", 60),
            notify_webhook_url: env_opt("NOTIFY_WEBHOOK_URL"),
            notify_queue_capacity: env_or("NOTIFY_QUEUE_CAPACITY", 1024),
            admin_pin: env_opt("ADMIN_PIN"),
            admin_name: env_opt("ADMIN_NAME").unwrap_or_else(|| "Admin".into()),
            cors_origins: env_opt("CORS_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
        })
    }

    /// 使用指定工作目录和 JWT 配置 (测试用)
    pub fn with_overrides(work_dir: impl Into<String>, http_port: u16, jwt: JwtConfig) -> Self {
        Self {
            work_dir: work_dir.into(),
            http_port,
            environment: "development".into(),
            log_level: "info".into(),
            log_json: false,
            jwt,
            escalation_threshold_minutes: 20,
            escalation_interval_secs: 60,
            notify_webhook_url: None,
            notify_queue_capacity: 1024,
            admin_pin: None,
            admin_name: "Admin".into(),
            cors_origins: Vec::new(),
        }
    }

    /// 是否生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn escalation_interval(&self) -> Duration {
        Duration::from_secs(self.escalation_interval_secs.max(1))
    }

    /// 数据库目录 `work_dir/database`
    pub fn database_dir(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("database")
    }

    /// 日志目录 `work_dir/logs`
    pub fn logs_dir(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("logs")
    }

    /// 数据库文件路径
    pub fn database_path(&self) -> PathBuf {
        self.database_dir().join("queue.redb")
    }

    /// 创建工作目录结构
    pub fn ensure_work_dir_structure(&self) -> Result<()> {
        for dir in [self.database_dir(), self.logs_dir()] {
            std::fs::create_dir_all(&dir).map_err(|e| {
                ServerError::Config(format!("Failed to create {}: {}", dir.display(), e))
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwt() -> JwtConfig {
        JwtConfig {
            secret: "test-secret-that-is-at-least-32-bytes-long".into(),
            expiration_minutes: 60,
            issuer: "queue-server".into(),
            audience: "queue-clients".into(),
        }
    }

    #[test]
    fn test_work_dir_layout() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::with_overrides(dir.path().to_string_lossy(), 0, jwt());
        config.ensure_work_dir_structure().unwrap();

        assert!(config.database_dir().is_dir());
        assert!(config.logs_dir().is_dir());
        assert!(config.database_path().ends_with("database/queue.redb"));
    }

    #[test]
    fn test_interval_never_zero() {
        let mut config = Config::with_overrides("./data", 0, jwt());
        config.escalation_interval_secs = 0;
        assert_eq!(config.escalation_interval(), Duration::from_secs(1));
    }
}
