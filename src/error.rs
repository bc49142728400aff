// src/error.rs
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use thiserror::Error;

use crate::views;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal server error")]
    Internal,

    #[error("Validation error: {0}")]
    BadRequest(String),

    #[error("Validation error: {0}")]
    ValidationError(#[from] validator::ValidationErrors),
}

// 核心逻辑：将错误转换为 HTML 响应
// 表单校验失败不报错，直接静默跳回首页
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Auth(msg) => {
                tracing::debug!("未登录: {}", msg);
                Redirect::to("/login").into_response()
            }
            AppError::BadRequest(msg) => {
                tracing::warn!("表单被拒绝: {}", msg);
                Redirect::to("/").into_response()
            }
            AppError::ValidationError(ref e) => {
                tracing::warn!("表单校验失败: {}", e);
                Redirect::to("/").into_response()
            }
            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                Html(views::error_page("Not found", &msg)),
            )
                .into_response(),
            AppError::Database(ref e) => {
                // 后台记录详细错误，对外只给通用提示
                tracing::error!("Database Error: {:?}", e);
                internal_error()
            }
            AppError::Internal => internal_error(),
        }
    }
}

fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Html(views::error_page(
            "Something went wrong",
            "The server could not complete this request. Please try again.",
        )),
    )
        .into_response()
}
