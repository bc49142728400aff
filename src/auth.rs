// src/auth.rs
use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString
    },
    Argon2,
};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppError, AppState};

pub const SESSION_COOKIE: &str = "session";
pub const INVITE_COOKIE: &str = "invite";

const SESSION_DAYS: i64 = 30;
pub const INVITE_DAYS: i64 = 7;
pub const RESET_HOURS: i64 = 2;

// --- 1. 密码处理 (Argon2) ---

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| {
            tracing::error!("密码哈希失败: {}", e);
            AppError::Internal
        })?
        .to_string();
    Ok(password_hash)
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(password_hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default().verify_password(password.as_bytes(), &parsed_hash).is_ok()
}

// --- 2. 签名 Cookie (JWT) ---

/// 会话 Cookie 中保存的内容
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i32,         // 用户 ID
    pub username: String,
    pub exp: usize,       // 过期时间
}

/// 通过邀请链接进入、尚未完成注册时保存的邀请令牌
#[derive(Debug, Serialize, Deserialize)]
pub struct InviteClaims {
    pub invite: String,
    pub exp: usize,
}

fn expires_in(duration: Duration) -> usize {
    (Utc::now() + duration).timestamp().max(0) as usize
}

fn sign<T: Serialize>(claims: &T, secret: &str) -> Result<String, AppError> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| {
        tracing::error!("签名失败: {}", e);
        AppError::Internal
    })
}

fn verify<T: DeserializeOwned>(token: &str, secret: &str) -> Option<T> {
    decode::<T>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|e| tracing::warn!("Cookie 验证失败: {}", e))
    .ok()
    .map(|data| data.claims)
}

fn build_cookie(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}

pub fn session_cookie(user_id: i32, username: &str, state: &AppState) -> Result<Cookie<'static>, AppError> {
    let claims = Claims {
        sub: user_id,
        username: username.to_owned(),
        exp: expires_in(Duration::days(SESSION_DAYS)),
    };
    let token = sign(&claims, &state.config.session_secret)?;
    Ok(build_cookie(SESSION_COOKIE, token, state.config.secure_cookies()))
}

pub fn invite_cookie(invite: &str, state: &AppState) -> Result<Cookie<'static>, AppError> {
    let claims = InviteClaims {
        invite: invite.to_owned(),
        exp: expires_in(Duration::days(INVITE_DAYS)),
    };
    let token = sign(&claims, &state.config.session_secret)?;
    Ok(build_cookie(INVITE_COOKIE, token, state.config.secure_cookies()))
}

/// 删除 Cookie 时 path 必须与写入时一致
pub fn removal(name: &'static str) -> Cookie<'static> {
    Cookie::build(name).path("/").build()
}

pub fn pending_invite(jar: &CookieJar, secret: &str) -> Option<String> {
    let cookie = jar.get(INVITE_COOKIE)?;
    verify::<InviteClaims>(cookie.value(), secret).map(|claims| claims.invite)
}

/// 邀请和重置密码用的一次性随机令牌
pub fn generate_token() -> String {
    Uuid::new_v4().simple().to_string()
}

// --- 3. 核心：认证提取器 (AuthUser Extractor) ---
// 用于在 Handler 中通过 (user: AuthUser) 自动获取当前登录用户

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i32,
    pub username: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        // 1. 从 Cookie 中取出会话令牌
        let jar = CookieJar::from_headers(&parts.headers);
        let cookie = jar
            .get(SESSION_COOKIE)
            .ok_or_else(|| AppError::Auth("会话 Cookie 缺失".into()))?;

        // 2. 验证签名与有效期
        let claims = verify::<Claims>(cookie.value(), &state.config.session_secret)
            .ok_or_else(|| AppError::Auth("会话已过期或无效".into()))?;

        // 3. 用户可能已被删除，重新查一次
        let user = state
            .store
            .find_user(claims.sub)
            .await?
            .ok_or_else(|| AppError::Auth("用户不存在".into()))?;

        Ok(AuthUser {
            id: user.id,
            username: user.username,
        })
    }
}
