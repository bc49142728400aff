// src/main.rs
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod auth;
mod config;
mod error;
mod handlers;
mod mailer;
mod models;
mod planner;
mod storage;
mod validation;
mod views;

pub use error::AppError;

use config::AppConfig;
use handlers::*;
use mailer::Mailer;
use storage::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Arc<AppConfig>,
    pub mailer: Mailer,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env().expect("Invalid configuration");

    let default_filter = if config.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if config.uses_default_secret() {
        tracing::warn!("APP_SECRET_KEY 未设置，使用开发用默认密钥");
    }
    if !config.email_enabled() {
        tracing::warn!("RESEND_API_KEY / RESET_EMAIL_FROM 未设置，找回密码邮件不可用");
    }

    let store = storage::connect(&config.database_url)
        .await
        .expect("Failed to open database");
    // 建表与增量迁移在开始接收请求前完成
    store.migrate().await.expect("Failed to migrate schema");
    tracing::info!("✅ 数据库已就绪!");

    let mailer = Mailer::from_config(&config).expect("Failed to build HTTP client");
    let addr = config.bind_addr;
    let state = AppState {
        store,
        config: Arc::new(config),
        mailer,
    };

    let app = app(state);

    tracing::info!("🚀 服务器运行在: {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

fn app(state: AppState) -> Router {
    Router::new()
        // 页面
        .route("/", get(index_handler))
        .route("/about", get(about_handler))
        .route("/review", get(review_handler))
        .route("/styles.css", get(styles_handler))
        // 认证
        .route("/register", get(register_page_handler).post(register_handler))
        .route("/login", get(login_page_handler).post(login_handler))
        .route("/logout", post(logout_handler))
        .route("/account", get(account_page_handler).post(account_handler))
        .route(
            "/password-reset",
            get(reset_request_page_handler).post(reset_request_handler),
        )
        .route(
            "/password-reset/:token",
            get(reset_form_handler).post(reset_password_handler),
        )
        // 邀请
        .route("/invite/:token", get(accept_invite_handler))
        .route("/invites", get(invites_handler))
        .route("/invites/create", post(create_invite_handler))
        // 计划
        .route("/plan/add", post(add_plan_handler))
        .route("/plan/complete/:id", post(complete_plan_handler))
        .route("/plan/reopen/:id", post(reopen_plan_handler))
        .route("/plan/delete/:id", post(delete_plan_handler))
        // 清单
        .route("/checklist/add", post(add_checklist_handler))
        .route("/checklist/toggle/:id", post(toggle_checklist_handler))
        .route("/checklist/delete/:id", post(delete_checklist_handler))
        // 例程
        .route("/routines/add", post(add_routine_handler))
        .route("/routines/delete/:id", post(delete_routine_handler))
        .route("/routine-items/add", post(add_routine_item_handler))
        .route("/routine-items/toggle/:id", post(toggle_routine_item_handler))
        // 习惯
        .route("/habits/add", post(add_habit_handler))
        .route("/habits/log/:id", post(log_habit_handler))
        .route("/habits/reset/:id", post(reset_habit_handler))
        .route("/habits/delete/:id", post(delete_habit_handler))
        // 消费 / 预算
        .route("/spending/add", post(add_spending_handler))
        .route("/spending/delete/:id", post(delete_spending_handler))
        .route("/budgets/add", post(add_budget_handler))
        .route("/budgets/delete/:id", post(delete_budget_handler))
        // 设置 / 复盘
        .route("/settings/spend-limit", post(spend_limit_handler))
        .route("/settings/reset-cycle", post(reset_cycle_handler))
        .route("/reflection/save", post(save_reflection_handler))
        .fallback(not_found_handler)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{hash_password, session_cookie, INVITE_COOKIE};
    use crate::models::NewUser;
    use crate::storage::{db_now, SqliteStore};
    use axum::{
        body::Body,
        http::{header, Request, Response, StatusCode},
    };
    use chrono::Duration;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    pub(crate) fn test_config() -> AppConfig {
        AppConfig {
            database_url: "sqlite::memory:".into(),
            session_secret: "test-secret".into(),
            resend_api_key: None,
            reset_email_from: None,
            base_url: None,
            invite_only: false,
            debug: false,
            bind_addr: "127.0.0.1:0".parse().unwrap(),
        }
    }

    async fn test_state(config: AppConfig) -> AppState {
        let store = SqliteStore::in_memory().await.unwrap();
        store.migrate().await.unwrap();
        AppState {
            store: Arc::new(store),
            mailer: Mailer::from_config(&config).unwrap(),
            config: Arc::new(config),
        }
    }

    async fn add_user(state: &AppState, username: &str, password: &str) -> i32 {
        let user = NewUser {
            username: username.into(),
            email: format!("{username}@example.com"),
            password_hash: hash_password(password).unwrap(),
            invite_token: None,
        };
        state.store.create_user(&user, db_now()).await.unwrap()
    }

    fn session_header(state: &AppState, user_id: i32, username: &str) -> String {
        let cookie = session_cookie(user_id, username, state).unwrap();
        format!("{}={}", cookie.name(), cookie.value())
    }

    fn form(uri: &str, cookie: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn page(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn location(response: &Response<Body>) -> &str {
        response.headers()[header::LOCATION].to_str().unwrap()
    }

    /// 取出响应里某个 Cookie 的 `name=value` 部分
    fn set_cookie(response: &Response<Body>, name: &str) -> Option<String> {
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with(&format!("{name}=")))
            .map(|v| v.split(';').next().unwrap_or_default().to_string())
    }

    async fn body_text(response: Response<Body>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn anonymous_visitors_are_sent_to_login() {
        let state = test_state(test_config()).await;
        let response = app(state).oneshot(page("/", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/login");
    }

    #[tokio::test]
    async fn dashboard_renders_for_logged_in_user() {
        let state = test_state(test_config()).await;
        let uid = add_user(&state, "alice", "pw").await;
        let cookie = session_header(&state, uid, "alice");

        let response = app(state.clone())
            .oneshot(form("/plan/add", Some(&cookie), "title=%3Cb%3EShip%3C%2Fb%3E&priority=3"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/");

        let response = app(state).oneshot(page("/", Some(&cookie))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("&lt;b&gt;Ship&lt;/b&gt;"));
        assert!(html.contains("P3"));
    }

    #[tokio::test]
    async fn non_positive_spend_is_rejected() {
        let state = test_state(test_config()).await;
        let uid = add_user(&state, "alice", "pw").await;
        let cookie = session_header(&state, uid, "alice");
        let today = planner::today();

        for amount in ["0", "-5", "abc", ""] {
            let response = app(state.clone())
                .oneshot(form("/spending/add", Some(&cookie), &format!("amount={amount}")))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::SEE_OTHER);
            assert_eq!(location(&response), "/");
        }
        let entries = state.store.list_spending(uid, today, today).await.unwrap();
        assert!(entries.is_empty());

        app(state.clone())
            .oneshot(form("/spending/add", Some(&cookie), "amount=4.5"))
            .await
            .unwrap();
        let entries = state.store.list_spending(uid, today, today).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].category, "Other");
        assert_eq!(entries[0].note, "Daily spend");
    }

    #[tokio::test]
    async fn other_users_rows_are_untouched() {
        let state = test_state(test_config()).await;
        let alice = add_user(&state, "alice", "pw").await;
        let bob = add_user(&state, "bob", "pw").await;
        let habit = state.store.create_habit(alice, "Read", 1).await.unwrap();

        let cookie = session_header(&state, bob, "bob");
        let response = app(state.clone())
            .oneshot(form(&format!("/habits/delete/{habit}"), Some(&cookie), ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(state.store.list_active_habits(alice).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn register_then_login() {
        let state = test_state(test_config()).await;

        let response = app(state.clone())
            .oneshot(form(
                "/register",
                None,
                "username=Alice&email=Alice%40Example.com&password=secret&confirm=secret",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert!(set_cookie(&response, "session").is_some());

        let user = state.store.find_user_by_login("alice").await.unwrap().unwrap();
        assert_eq!(user.id, 1);
        assert_eq!(user.email, "alice@example.com");

        let response = app(state.clone())
            .oneshot(form("/login", None, "username=alice%40example.com&password=wrong"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("Invalid username or password."));

        let response = app(state)
            .oneshot(form("/login", None, "username=ALICE&password=secret"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/");
        assert!(set_cookie(&response, "session").is_some());
    }

    #[tokio::test]
    async fn register_reports_mismatch_and_duplicates() {
        let state = test_state(test_config()).await;
        add_user(&state, "alice", "pw").await;

        let response = app(state.clone())
            .oneshot(form("/register", None, "username=bob&email=b%40x.com&password=a&confirm=b"))
            .await
            .unwrap();
        assert!(body_text(response).await.contains("Passwords do not match."));

        let response = app(state.clone())
            .oneshot(form(
                "/register",
                None,
                "username=bob&email=alice%40example.com&password=a&confirm=a",
            ))
            .await
            .unwrap();
        assert!(body_text(response).await.contains("That email is already registered."));

        let response = app(state)
            .oneshot(form("/register", None, "username=alice&email=new%40x.com&password=a&confirm=a"))
            .await
            .unwrap();
        assert!(body_text(response).await.contains("That username is taken."));
    }

    #[tokio::test]
    async fn invalid_invite_shows_invalid_page() {
        let state = test_state(test_config()).await;
        let alice = add_user(&state, "alice", "pw").await;
        let now = db_now();
        state
            .store
            .create_invite(alice, "expired", now - Duration::days(8), now - Duration::days(1))
            .await
            .unwrap();

        for token in ["expired", "missing"] {
            let response = app(state.clone())
                .oneshot(page(&format!("/invite/{token}"), None))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert!(set_cookie(&response, INVITE_COOKIE).is_none());
            assert!(body_text(response).await.contains("Invite invalid"));
        }
    }

    #[tokio::test]
    async fn invite_redemption_marks_invite_used() {
        let mut config = test_config();
        config.invite_only = true;
        let state = test_state(config).await;
        let alice = add_user(&state, "alice", "pw").await;

        // 邀请制下没有邀请不能注册
        let response = app(state.clone())
            .oneshot(form("/register", None, "username=bob&email=bob%40x.com&password=a&confirm=a"))
            .await
            .unwrap();
        assert!(body_text(response).await.contains("invite only"));
        assert!(state.store.find_user_by_login("bob").await.unwrap().is_none());

        let now = db_now();
        state
            .store
            .create_invite(alice, "tok123", now, now + Duration::days(7))
            .await
            .unwrap();

        let response = app(state.clone()).oneshot(page("/invite/tok123", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/register");
        let invite = set_cookie(&response, INVITE_COOKIE).unwrap();

        let response = app(state.clone())
            .oneshot(form(
                "/register",
                Some(&invite),
                "username=bob&email=bob%40x.com&password=a&confirm=a",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert!(set_cookie(&response, "session").is_some());
        // 邀请 Cookie 被清除
        assert_eq!(set_cookie(&response, INVITE_COOKIE).as_deref(), Some("invite="));

        let bob = state.store.find_user_by_login("bob").await.unwrap().unwrap();
        let used = state.store.list_used_invites(alice).await.unwrap();
        assert_eq!(used.len(), 1);
        assert_eq!(used[0].used_by.as_deref(), Some("bob"));
        assert!(state.store.find_valid_invite("tok123", db_now()).await.unwrap().is_none());

        // 同一个邀请不能再次使用
        let response = app(state.clone()).oneshot(page("/invite/tok123", None)).await.unwrap();
        assert!(body_text(response).await.contains("Invite invalid"));
        assert_ne!(bob.id, alice);
    }

    #[tokio::test]
    async fn password_reset_without_mail_service() {
        let state = test_state(test_config()).await;
        let uid = add_user(&state, "alice", "old").await;

        let response = app(state.clone())
            .oneshot(form("/password-reset", None, "email=nobody%40example.com"))
            .await
            .unwrap();
        assert!(body_text(response).await.contains("If that email exists"));

        let response = app(state.clone())
            .oneshot(form("/password-reset", None, "email=alice%40example.com"))
            .await
            .unwrap();
        assert!(body_text(response).await.contains("Email service is not configured."));

        let response = app(state.clone())
            .oneshot(page("/password-reset/not-a-token", None))
            .await
            .unwrap();
        assert!(body_text(response).await.contains("Reset link invalid"));

        let now = db_now();
        state
            .store
            .create_password_reset(uid, "reset-tok", now, now + Duration::hours(2))
            .await
            .unwrap();
        let response = app(state.clone())
            .oneshot(form("/password-reset/reset-tok", None, "password=new&confirm=nope"))
            .await
            .unwrap();
        assert!(body_text(response).await.contains("Passwords do not match."));

        let response = app(state.clone())
            .oneshot(form("/password-reset/reset-tok", None, "password=new&confirm=new"))
            .await
            .unwrap();
        assert_eq!(location(&response), "/login");

        let user = state.store.find_user(uid).await.unwrap().unwrap();
        assert!(auth::verify_password("new", &user.password_hash));
        assert!(state.store.find_valid_reset("reset-tok", db_now()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn settings_and_budgets_upsert() {
        let state = test_state(test_config()).await;
        let uid = add_user(&state, "alice", "pw").await;
        let cookie = session_header(&state, uid, "alice");

        for limit in ["10", "20"] {
            app(state.clone())
                .oneshot(form(
                    "/budgets/add",
                    Some(&cookie),
                    &format!("category=Food&daily_limit={limit}&weekly_limit=50"),
                ))
                .await
                .unwrap();
        }
        let budgets = state.store.list_budgets(uid).await.unwrap();
        assert_eq!(budgets.len(), 1);
        assert_eq!(budgets[0].daily_limit, 20.0);

        app(state.clone())
            .oneshot(form("/settings/reset-cycle", Some(&cookie), "reset_cycle_days=3"))
            .await
            .unwrap();
        assert_eq!(state.store.settings(uid).await.unwrap().reset_cycle_days, 7);
    }

    #[tokio::test]
    async fn viewing_pages_rolls_over_past_plans() {
        let state = test_state(test_config()).await;
        let uid = add_user(&state, "alice", "pw").await;
        let cookie = session_header(&state, uid, "alice");
        let past = chrono::NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();

        for uri in ["/", "/about", "/review"] {
            let plan = models::NewPlan {
                title: format!("overdue {uri}"),
                time_block: String::new(),
                priority: 2,
                scheduled_date: past,
            };
            let id = state.store.create_plan(uid, &plan, db_now()).await.unwrap();

            let response = app(state.clone()).oneshot(page(uri, Some(&cookie))).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);

            let plans = state.store.list_plans(uid, past, past).await.unwrap();
            let stored = plans.iter().find(|p| p.id == id).unwrap();
            assert_eq!(stored.status, models::PlanStatus::Missed, "{uri}");
        }
    }

    #[tokio::test]
    async fn weekly_review_shows_totals() {
        let state = test_state(test_config()).await;
        let uid = add_user(&state, "alice", "pw").await;
        let cookie = session_header(&state, uid, "alice");

        let habit = state.store.create_habit(uid, "Water", 2).await.unwrap();
        let routine = state.store.create_routine(uid, "Morning", "morning").await.unwrap();
        let item = state
            .store
            .create_routine_item(uid, routine, "Stretch", 0)
            .await
            .unwrap()
            .unwrap();

        let posts = [
            format!("/habits/log/{habit}"),
            format!("/habits/log/{habit}"),
            format!("/routine-items/toggle/{item}"),
        ];
        for uri in &posts {
            app(state.clone()).oneshot(form(uri, Some(&cookie), "")).await.unwrap();
        }
        app(state.clone())
            .oneshot(form("/spending/add", Some(&cookie), "amount=12.5&category=Food"))
            .await
            .unwrap();
        app(state.clone())
            .oneshot(form("/plan/add", Some(&cookie), "title=Ship"))
            .await
            .unwrap();
        let today = planner::today();
        let plan = state.store.list_plans(uid, today, today).await.unwrap()[0].id;
        app(state.clone())
            .oneshot(form(&format!("/plan/complete/{plan}"), Some(&cookie), ""))
            .await
            .unwrap();

        let response = app(state).oneshot(page("/review", Some(&cookie))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("<tr><th>Water</th><td>2</td></tr>"));
        assert!(html.contains("<tr><th>Morning</th><td>1</td></tr>"));
        assert!(html.contains("<tr><th>Food</th><td>12.50</td></tr>"));
        assert!(html.contains(&format!("<tr><th>{today}</th><td>12.50</td></tr>")));
        assert!(html.contains("Total: <strong>12.50</strong>"));
        assert!(html.contains("<strong>1</strong> done"));
    }

    #[tokio::test]
    async fn about_page_counts_own_entries() {
        let state = test_state(test_config()).await;
        let alice = add_user(&state, "alice", "pw").await;
        let bob = add_user(&state, "bob", "pw").await;
        let cookie = session_header(&state, alice, "alice");
        let today = planner::today();
        let now = db_now();

        for title in ["One", "Two"] {
            let plan = models::NewPlan {
                title: title.into(),
                time_block: String::new(),
                priority: 2,
                scheduled_date: today,
            };
            state.store.create_plan(alice, &plan, now).await.unwrap();
        }
        state.store.create_checklist_item(alice, "Milk", today, now).await.unwrap();
        state.store.create_habit(alice, "Water", 1).await.unwrap();
        state.store.create_routine(alice, "Morning", "morning").await.unwrap();
        state.store.create_habit(bob, "Run", 1).await.unwrap();
        let spend = models::NewSpendingEntry {
            amount: 3.0,
            category: "Food".into(),
            note: "Snack".into(),
            spend_date: today,
        };
        state.store.create_spending(alice, &spend, now).await.unwrap();

        let response = app(state).oneshot(page("/about", Some(&cookie))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("<tr><th>Plans</th><td>2</td></tr>"));
        assert!(html.contains("<tr><th>Checklist items</th><td>1</td></tr>"));
        assert!(html.contains("<tr><th>Habits</th><td>1</td></tr>"));
        assert!(html.contains("<tr><th>Routines</th><td>1</td></tr>"));
        assert!(html.contains("<tr><th>Spending entries</th><td>1</td></tr>"));
    }

    #[tokio::test]
    async fn non_numeric_ids_render_not_found() {
        let state = test_state(test_config()).await;
        let uid = add_user(&state, "alice", "pw").await;
        let cookie = session_header(&state, uid, "alice");

        for uri in ["/plan/delete/abc", "/habits/log/1x", "/budgets/delete/-"] {
            let response = app(state.clone()).oneshot(form(uri, Some(&cookie), "")).await.unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
            assert!(body_text(response).await.contains(&format!("No page at {uri}")));
        }
    }

    #[tokio::test]
    async fn unknown_paths_render_not_found() {
        let state = test_state(test_config()).await;
        let response = app(state).oneshot(page("/nope", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_text(response).await.contains("No page at /nope"));
    }

    #[tokio::test]
    async fn stylesheet_is_served() {
        let state = test_state(test_config()).await;
        let response = app(state).oneshot(page("/styles.css", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/css; charset=utf-8"
        );
    }
}
