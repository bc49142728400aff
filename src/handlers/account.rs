// src/handlers/account.rs
//! 注册、登录、账户设置、找回密码与邀请。
//! 这些表单的错误需要回显在页面上，因此在处理函数内部消化。
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Duration;

use super::public_base_url;
use crate::auth::{
    generate_token, hash_password, invite_cookie, pending_invite, removal, session_cookie,
    verify_password, AuthUser, INVITE_COOKIE, INVITE_DAYS, RESET_HOURS, SESSION_COOKIE,
};
use crate::models::{
    AccountForm, LoginForm, NewUser, RegisterForm, ResetPasswordForm, ResetRequestForm,
};
use crate::storage::{db_now, is_unique_violation};
use crate::views;
use crate::{AppError, AppState};

const INVALID_INVITE: &str = "That invite link is invalid or expired.";
const INVITE_ONLY: &str = "Registration is by invite only. Ask an existing user for an invite link.";

// --- 1. 注册 ---

/// 邀请制开启且已有用户时，没有有效邀请的注册会被拒绝
async fn registration_closed(state: &AppState, has_invite: bool) -> Result<bool, AppError> {
    if !state.config.invite_only || has_invite {
        return Ok(false);
    }
    Ok(state.store.count_users().await? > 0)
}

pub async fn register_page_handler(
    user: Option<AuthUser>,
    jar: CookieJar,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    if user.is_some() {
        return Ok(Redirect::to("/").into_response());
    }

    let has_invite = pending_invite(&jar, &state.config.session_secret).is_some();
    let error = if registration_closed(&state, has_invite).await? {
        INVITE_ONLY
    } else {
        ""
    };
    Ok(Html(views::register(error, has_invite)).into_response())
}

pub async fn register_handler(
    user: Option<AuthUser>,
    jar: CookieJar,
    State(state): State<AppState>,
    Form(form): Form<RegisterForm>,
) -> Result<Response, AppError> {
    if user.is_some() {
        return Ok(Redirect::to("/").into_response());
    }

    let invite = pending_invite(&jar, &state.config.session_secret);
    let render = |jar: CookieJar, error: &str, has_invite: bool| {
        (jar, Html(views::register(error, has_invite))).into_response()
    };

    let username = form.username.to_lowercase();
    let email = form.email.to_lowercase();

    // 1. 必填与两次密码一致
    if username.is_empty() || email.is_empty() || form.password.is_empty() {
        return Ok(render(jar, "Username, email, and password are required.", invite.is_some()));
    }
    if form.password != form.confirm {
        return Ok(render(jar, "Passwords do not match.", invite.is_some()));
    }

    // 2. 邀请令牌仍然有效
    if let Some(token) = &invite {
        if state.store.find_valid_invite(token, db_now()).await?.is_none() {
            tracing::warn!("注册时邀请已失效");
            return Ok(render(jar.remove(removal(INVITE_COOKIE)), INVALID_INVITE, false));
        }
    }
    if registration_closed(&state, invite.is_some()).await? {
        return Ok(render(jar, INVITE_ONLY, false));
    }

    // 3. 邮箱唯一
    if state.store.email_taken(&email, None).await? {
        return Ok(render(jar, "That email is already registered.", invite.is_some()));
    }

    // 4. 写入用户（同一事务内接管无主数据并核销邀请）
    let new_user = NewUser {
        username: username.clone(),
        email,
        password_hash: hash_password(&form.password)?,
        invite_token: invite.clone(),
    };
    match state.store.create_user(&new_user, db_now()).await {
        Ok(user_id) => {
            tracing::info!(user_id, invited = invite.is_some(), "新用户注册");
            let jar = jar
                .add(session_cookie(user_id, &username, &state)?)
                .remove(removal(INVITE_COOKIE));
            Ok((jar, Redirect::to("/")).into_response())
        }
        Err(e) if is_unique_violation(&e) => {
            Ok(render(jar, "That username is taken.", invite.is_some()))
        }
        // 邀请在校验之后被他人抢先使用
        Err(sqlx::Error::RowNotFound) => {
            Ok(render(jar.remove(removal(INVITE_COOKIE)), INVALID_INVITE, false))
        }
        Err(e) => Err(e.into()),
    }
}

// --- 2. 登录 / 登出 ---

pub async fn login_page_handler(user: Option<AuthUser>) -> Response {
    if user.is_some() {
        return Redirect::to("/").into_response();
    }
    Html(views::login("")).into_response()
}

pub async fn login_handler(
    jar: CookieJar,
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    // 用户名或邮箱都可以登录
    let login = form.username.to_lowercase();
    let user = state.store.find_user_by_login(&login).await?;

    match user {
        Some(user) if verify_password(&form.password, &user.password_hash) => {
            tracing::info!(user_id = user.id, "用户登录");
            let jar = jar.add(session_cookie(user.id, &user.username, &state)?);
            Ok((jar, Redirect::to("/")).into_response())
        }
        _ => {
            tracing::warn!("登录失败");
            Ok(Html(views::login("Invalid username or password.")).into_response())
        }
    }
}

pub async fn logout_handler(jar: CookieJar) -> impl IntoResponse {
    (jar.remove(removal(SESSION_COOKIE)), Redirect::to("/login"))
}

// --- 3. 账户设置 ---

pub async fn account_page_handler(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Html<String>, AppError> {
    let account = state
        .store
        .find_user(user.id)
        .await?
        .ok_or_else(|| AppError::Auth("用户不存在".into()))?;
    Ok(Html(views::account(&account.username, &account.email, "", "")))
}

pub async fn account_handler(
    user: AuthUser,
    State(state): State<AppState>,
    Form(form): Form<AccountForm>,
) -> Result<Html<String>, AppError> {
    let store = state.store.as_ref();
    let account = store
        .find_user(user.id)
        .await?
        .ok_or_else(|| AppError::Auth("用户不存在".into()))?;

    let mut message = "";
    let mut error = "";

    // 1. 修改邮箱
    let email = form.email.to_lowercase();
    if !email.is_empty() && email != account.email {
        if store.email_taken(&email, Some(user.id)).await? {
            error = "That email is already registered.";
        } else {
            store.update_email(user.id, &email).await?;
            tracing::info!(user_id = user.id, "邮箱已修改");
            message = "Email updated.";
        }
    }

    // 2. 修改密码
    if !form.new_password.is_empty() {
        if form.current_password.is_empty()
            || !verify_password(&form.current_password, &account.password_hash)
        {
            error = "Current password is incorrect.";
        } else if form.new_password != form.confirm_password {
            error = "New passwords do not match.";
        } else {
            let hash = hash_password(&form.new_password)?;
            store.update_password_hash(user.id, &hash).await?;
            tracing::info!(user_id = user.id, "密码已修改");
            message = "Password updated.";
        }
    }

    let account = store
        .find_user(user.id)
        .await?
        .ok_or_else(|| AppError::Auth("用户不存在".into()))?;
    Ok(Html(views::account(&account.username, &account.email, message, error)))
}

// --- 4. 找回密码 ---

pub async fn reset_request_page_handler() -> Html<String> {
    Html(views::password_reset_request("", ""))
}

pub async fn reset_request_handler(
    headers: HeaderMap,
    State(state): State<AppState>,
    Form(form): Form<ResetRequestForm>,
) -> Result<Html<String>, AppError> {
    let email = form.email.to_lowercase();
    if email.is_empty() {
        return Ok(Html(views::password_reset_request("", "Enter your email address.")));
    }

    // 邮箱不存在时给出同样的提示，不暴露账户是否存在
    let Some(user) = state.store.find_user_by_email(&email).await? else {
        return Ok(Html(views::password_reset_request(
            "If that email exists, a reset link has been sent.",
            "",
        )));
    };

    let token = generate_token();
    let now = db_now();
    state
        .store
        .create_password_reset(user.id, &token, now, now + Duration::hours(RESET_HOURS))
        .await?;

    let base_url = public_base_url(&state.config, &headers);
    match state.mailer.send_reset_email(&user.email, &token, &base_url).await {
        Ok(()) => Ok(Html(views::password_reset_request(
            "Reset link sent. Check your email.",
            "",
        ))),
        Err(e) => {
            tracing::warn!(user_id = user.id, "重置邮件发送失败: {}", e);
            Ok(Html(views::password_reset_request(
                "",
                "Email service is not configured.",
            )))
        }
    }
}

pub async fn reset_form_handler(
    Path(token): Path<String>,
    State(state): State<AppState>,
) -> Result<Html<String>, AppError> {
    match state.store.find_valid_reset(&token, db_now()).await? {
        Some(_) => Ok(Html(views::password_reset_form(&token, ""))),
        None => Ok(Html(views::password_reset_invalid())),
    }
}

pub async fn reset_password_handler(
    Path(token): Path<String>,
    State(state): State<AppState>,
    Form(form): Form<ResetPasswordForm>,
) -> Result<Response, AppError> {
    let Some(reset) = state.store.find_valid_reset(&token, db_now()).await? else {
        return Ok(Html(views::password_reset_invalid()).into_response());
    };

    let error = if form.password.is_empty() {
        "Password is required."
    } else if form.password != form.confirm {
        "Passwords do not match."
    } else {
        let hash = hash_password(&form.password)?;
        state.store.complete_password_reset(&reset, &hash).await?;
        tracing::info!(user_id = reset.user_id, "通过重置链接修改了密码");
        return Ok(Redirect::to("/login").into_response());
    };

    Ok(Html(views::password_reset_form(&token, error)).into_response())
}

// --- 5. 邀请 ---

pub async fn accept_invite_handler(
    Path(token): Path<String>,
    jar: CookieJar,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    if state.store.find_valid_invite(&token, db_now()).await?.is_none() {
        return Ok(Html(views::invite_invalid()).into_response());
    }
    let jar = jar.add(invite_cookie(&token, &state)?);
    Ok((jar, Redirect::to("/register")).into_response())
}

pub async fn invites_handler(
    user: AuthUser,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Html<String>, AppError> {
    let active = state.store.list_active_invites(user.id, db_now()).await?;
    let used = state.store.list_used_invites(user.id).await?;
    let base_url = public_base_url(&state.config, &headers);

    Ok(Html(views::invites(&user.username, &base_url, &active, &used)))
}

pub async fn create_invite_handler(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Redirect, AppError> {
    let token = generate_token();
    let now = db_now();
    state
        .store
        .create_invite(user.id, &token, now, now + Duration::days(INVITE_DAYS))
        .await?;
    tracing::info!(user_id = user.id, "创建了邀请链接");
    Ok(Redirect::to("/invites"))
}
