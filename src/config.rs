// src/config.rs
use std::net::SocketAddr;

use thiserror::Error;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://tasks.db";
const DEFAULT_SECRET: &str = "dev-secret-change-me";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid BIND_ADDR `{0}`")]
    BindAddr(String),
}

/// 启动时从环境变量（以及可选的 .env 文件）读取的配置
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub session_secret: String,
    pub resend_api_key: Option<String>,
    pub reset_email_from: Option<String>,
    /// 重置链接使用的公开地址；为空时取请求的 Host 头
    pub base_url: Option<String>,
    pub invite_only: bool,
    pub debug: bool,
    pub bind_addr: SocketAddr,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_raw = non_empty("BIND_ADDR").unwrap_or_else(|| "127.0.0.1:3000".to_string());
        let bind_addr = bind_raw
            .parse()
            .map_err(|_| ConfigError::BindAddr(bind_raw.clone()))?;

        Ok(Self {
            database_url: non_empty("DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            session_secret: non_empty("APP_SECRET_KEY")
                .unwrap_or_else(|| DEFAULT_SECRET.to_string()),
            resend_api_key: non_empty("RESEND_API_KEY"),
            reset_email_from: non_empty("RESET_EMAIL_FROM"),
            base_url: non_empty("APP_BASE_URL"),
            invite_only: non_empty("INVITE_ONLY").is_some_and(|v| is_truthy(&v)),
            debug: non_empty("APP_DEBUG").is_some_and(|v| is_truthy(&v)),
            bind_addr,
        })
    }

    pub fn email_enabled(&self) -> bool {
        self.resend_api_key.is_some() && self.reset_email_from.is_some()
    }

    pub fn uses_default_secret(&self) -> bool {
        self.session_secret == DEFAULT_SECRET
    }

    /// 只有对外地址是 https 时才给 Cookie 加 Secure
    pub fn secure_cookies(&self) -> bool {
        self.base_url
            .as_deref()
            .is_some_and(|url| url.starts_with("https://"))
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
