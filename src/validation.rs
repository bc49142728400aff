// src/validation.rs
use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Path, Request},
    http::request::Parts,
    Form,
};
use chrono::NaiveDate;
use validator::Validate;
use crate::AppError;

pub struct ValidatedForm<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedForm<T>
where
    S: Send + Sync,
    T: Validate + serde::de::DeserializeOwned + 'static,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        // 1. 利用 Axum 原生的 Form 提取器解析 urlencoded 表单
        let Form(value) = Form::<T>::from_request(req, state).await
            .map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;

        // 2. 执行 validator 的校验逻辑，失败时通过 AppError::ValidationError 静默跳回首页
        value.validate()?;

        Ok(ValidatedForm(value))
    }
}

/// 路由中的整数 id；不是数字时按不存在的页面处理
pub struct RowId(pub i32);

#[async_trait]
impl<S> FromRequestParts<S> for RowId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<i32>::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::NotFound(format!("No page at {}", parts.uri.path())))?;
        Ok(RowId(id))
    }
}

// --- 宽松的数字 / 日期解析：空值或非法值退回默认 ---

pub fn int_or(raw: &str, default: i32) -> i32 {
    raw.trim().parse().unwrap_or(default)
}

pub fn float_or(raw: &str, default: f64) -> f64 {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(default)
}

/// 空值取 `default`；格式不对视为非法表单
pub fn date_or(raw: &str, default: NaiveDate) -> Result<NaiveDate, AppError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(default);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| AppError::BadRequest(format!("invalid date `{raw}`")))
}

/// 消费金额必须是大于 0 的有限数字
pub fn positive_amount(raw: &str) -> Result<f64, AppError> {
    match raw.trim().parse::<f64>() {
        Ok(amount) if amount.is_finite() && amount > 0.0 => Ok(amount),
        _ => Err(AppError::BadRequest(format!("invalid amount `{raw}`"))),
    }
}
