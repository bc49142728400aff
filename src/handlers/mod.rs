// src/handlers/mod.rs
//! HTTP 处理函数：页面 (GET) 与表单提交 (POST，统一 303 跳转)。
use axum::{
    http::{header, HeaderMap},
    response::Redirect,
};

use crate::config::AppConfig;

mod account;
mod entries;
mod pages;

pub use account::*;
pub use entries::*;
pub use pages::*;

pub(crate) fn home() -> Redirect {
    Redirect::to("/")
}

/// 写操作没有命中属于当前用户的记录时只记日志，照常跳回首页
pub(crate) fn note_miss(found: bool, what: &str, id: i32) {
    if !found {
        tracing::warn!(id, "{} 不存在或不属于当前用户", what);
    }
}

/// 邮件与邀请链接使用的对外地址：优先取 APP_BASE_URL，否则用请求的 Host 头
pub(crate) fn public_base_url(config: &AppConfig, headers: &HeaderMap) -> String {
    if let Some(base) = &config.base_url {
        return base.trim_end_matches('/').to_string();
    }
    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("localhost");
    format!("http://{host}")
}
