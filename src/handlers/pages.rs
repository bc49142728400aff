// src/handlers/pages.rs
use axum::{
    extract::State,
    http::{header, Uri},
    response::{Html, IntoResponse},
};

use crate::auth::AuthUser;
use crate::planner::{self, load_dashboard, load_weekly_review, roll_over_plans};
use crate::views;
use crate::{AppError, AppState};

// --- 1. 首页 (GET /) ---
pub async fn index_handler(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Html<String>, AppError> {
    let today = planner::today();
    let store = state.store.as_ref();

    // 每次渲染前先把过期的 pending 计划滚动为 missed
    roll_over_plans(store, user.id, today).await?;
    let dashboard = load_dashboard(store, user.id, today).await?;

    Ok(Html(views::dashboard(&user.username, &dashboard)))
}

// --- 2. 统计页 (GET /about) ---
pub async fn about_handler(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Html<String>, AppError> {
    let store = state.store.as_ref();
    roll_over_plans(store, user.id, planner::today()).await?;
    let stats = store.overview_stats(user.id).await?;

    Ok(Html(views::about(&user.username, &stats)))
}

// --- 3. 每周回顾 (GET /review) ---
pub async fn review_handler(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Html<String>, AppError> {
    let today = planner::today();
    let store = state.store.as_ref();
    roll_over_plans(store, user.id, today).await?;
    let review = load_weekly_review(store, user.id, today).await?;

    Ok(Html(views::review(&user.username, &review)))
}

pub async fn styles_handler() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/css; charset=utf-8")], views::STYLES)
}

pub async fn not_found_handler(uri: Uri) -> AppError {
    AppError::NotFound(format!("No page at {}", uri.path()))
}
