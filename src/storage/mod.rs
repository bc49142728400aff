// src/storage/mod.rs
//! 持久化层：一个 `Store` trait，两种可互换的实现（PostgreSQL / 内嵌 SQLite），
//! 启动时根据 `DATABASE_URL` 选择。
use std::sync::Arc;

use axum::async_trait;
use chrono::{DateTime, NaiveDate, SubsecRound, Utc};

use crate::models::{
    CategoryTotal, ChecklistItem, DailyReflection, DayTotal, Habit, HabitLog, Invite, NamedTotal,
    NewPlan, NewSpendingEntry, NewUser, OverviewStats, PasswordReset, Plan, PlanStatus,
    ReflectionInput, Routine, RoutineItem, RoutineItemLog, Settings, SpendingBudget,
    SpendingEntry, StatusCount, UsedInvite, User,
};

#[macro_use]
mod queries;
pub mod postgres;
pub mod sqlite;

pub use postgres::PgStore;
pub use sqlite::SqliteStore;

pub type StoreResult<T> = Result<T, sqlx::Error>;

/// 所有查询都按 `user_id` 隔离；写操作返回是否命中了属于该用户的记录
#[async_trait]
pub trait Store: Send + Sync {
    /// 建表 + 增量迁移，进程启动时执行一次
    async fn migrate(&self) -> StoreResult<()>;

    // --- 用户 ---
    async fn count_users(&self) -> StoreResult<i64>;
    /// 第一个用户固定为 id 1 并接管无主数据；若带邀请令牌则同时核销
    async fn create_user(&self, user: &NewUser, now: DateTime<Utc>) -> StoreResult<i32>;
    async fn find_user(&self, id: i32) -> StoreResult<Option<User>>;
    /// 用户名或邮箱登录
    async fn find_user_by_login(&self, login: &str) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn email_taken(&self, email: &str, except_user: Option<i32>) -> StoreResult<bool>;
    async fn update_email(&self, user_id: i32, email: &str) -> StoreResult<()>;
    async fn update_password_hash(&self, user_id: i32, password_hash: &str) -> StoreResult<()>;

    // --- 邀请 ---
    async fn create_invite(
        &self,
        inviter: i32,
        token: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()>;
    async fn find_valid_invite(&self, token: &str, now: DateTime<Utc>)
        -> StoreResult<Option<Invite>>;
    async fn list_active_invites(&self, inviter: i32, now: DateTime<Utc>)
        -> StoreResult<Vec<Invite>>;
    async fn list_used_invites(&self, inviter: i32) -> StoreResult<Vec<UsedInvite>>;

    // --- 重置密码 ---
    async fn create_password_reset(
        &self,
        user_id: i32,
        token: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()>;
    async fn find_valid_reset(&self, token: &str, now: DateTime<Utc>)
        -> StoreResult<Option<PasswordReset>>;
    /// 更新密码并把令牌标记为已使用（同一事务）
    async fn complete_password_reset(&self, reset: &PasswordReset, password_hash: &str)
        -> StoreResult<()>;

    // --- 计划 ---
    /// pending 且 scheduled_date < today 的计划改为 missed，返回受影响行数
    async fn mark_missed_plans(&self, user_id: i32, today: NaiveDate) -> StoreResult<u64>;
    async fn create_plan(&self, user_id: i32, plan: &NewPlan, now: DateTime<Utc>)
        -> StoreResult<i32>;
    async fn set_plan_status(&self, user_id: i32, id: i32, status: PlanStatus)
        -> StoreResult<bool>;
    async fn delete_plan(&self, user_id: i32, id: i32) -> StoreResult<bool>;
    async fn list_plans(&self, user_id: i32, from: NaiveDate, to: NaiveDate)
        -> StoreResult<Vec<Plan>>;
    async fn plan_status_counts(&self, user_id: i32, from: NaiveDate, to: NaiveDate)
        -> StoreResult<Vec<StatusCount>>;

    // --- 清单 ---
    async fn create_checklist_item(
        &self,
        user_id: i32,
        label: &str,
        scheduled_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> StoreResult<i32>;
    async fn toggle_checklist_item(&self, user_id: i32, id: i32) -> StoreResult<bool>;
    async fn delete_checklist_item(&self, user_id: i32, id: i32) -> StoreResult<bool>;
    async fn list_checklist(&self, user_id: i32, from: NaiveDate, to: NaiveDate)
        -> StoreResult<Vec<ChecklistItem>>;

    // --- 例程 ---
    async fn create_routine(&self, user_id: i32, name: &str, time_of_day: &str)
        -> StoreResult<i32>;
    /// 例程不属于该用户时返回 None
    async fn create_routine_item(
        &self,
        user_id: i32,
        routine_id: i32,
        label: &str,
        sort_order: i32,
    ) -> StoreResult<Option<i32>>;
    /// 切换某一天的完成状态；条目不属于该用户时返回 false
    async fn toggle_routine_item(&self, user_id: i32, item_id: i32, day: NaiveDate)
        -> StoreResult<bool>;
    async fn delete_routine(&self, user_id: i32, id: i32) -> StoreResult<bool>;
    async fn list_active_routines(&self, user_id: i32) -> StoreResult<Vec<Routine>>;
    async fn list_active_routine_items(&self, user_id: i32) -> StoreResult<Vec<RoutineItem>>;
    async fn routine_logs_on(&self, user_id: i32, day: NaiveDate)
        -> StoreResult<Vec<RoutineItemLog>>;
    async fn routine_completion_totals(&self, user_id: i32, from: NaiveDate, to: NaiveDate)
        -> StoreResult<Vec<NamedTotal>>;

    // --- 习惯 ---
    async fn create_habit(&self, user_id: i32, name: &str, target_count: i32)
        -> StoreResult<i32>;
    async fn increment_habit(&self, user_id: i32, habit_id: i32, day: NaiveDate)
        -> StoreResult<bool>;
    async fn reset_habit(&self, user_id: i32, habit_id: i32, day: NaiveDate)
        -> StoreResult<bool>;
    async fn delete_habit(&self, user_id: i32, id: i32) -> StoreResult<bool>;
    async fn list_active_habits(&self, user_id: i32) -> StoreResult<Vec<Habit>>;
    async fn habit_logs_between(&self, user_id: i32, from: NaiveDate, to: NaiveDate)
        -> StoreResult<Vec<HabitLog>>;
    async fn habit_totals(&self, user_id: i32, from: NaiveDate, to: NaiveDate)
        -> StoreResult<Vec<NamedTotal>>;

    // --- 消费 / 预算 ---
    async fn create_spending(&self, user_id: i32, entry: &NewSpendingEntry, now: DateTime<Utc>)
        -> StoreResult<i32>;
    async fn delete_spending(&self, user_id: i32, id: i32) -> StoreResult<bool>;
    async fn list_spending(&self, user_id: i32, from: NaiveDate, to: NaiveDate)
        -> StoreResult<Vec<SpendingEntry>>;
    async fn spending_by_category(&self, user_id: i32, from: NaiveDate, to: NaiveDate)
        -> StoreResult<Vec<CategoryTotal>>;
    async fn spending_by_day(&self, user_id: i32, from: NaiveDate, to: NaiveDate)
        -> StoreResult<Vec<DayTotal>>;
    async fn upsert_budget(&self, user_id: i32, category: &str, daily: f64, weekly: f64)
        -> StoreResult<()>;
    async fn delete_budget(&self, user_id: i32, id: i32) -> StoreResult<bool>;
    async fn list_budgets(&self, user_id: i32) -> StoreResult<Vec<SpendingBudget>>;

    // --- 设置 / 复盘 ---
    /// 首次读取时以默认值创建
    async fn settings(&self, user_id: i32) -> StoreResult<Settings>;
    async fn set_daily_spend_limit(&self, user_id: i32, limit: f64) -> StoreResult<()>;
    async fn set_reset_cycle_days(&self, user_id: i32, days: i32) -> StoreResult<()>;
    async fn upsert_reflection(&self, user_id: i32, input: &ReflectionInput, now: DateTime<Utc>)
        -> StoreResult<()>;
    async fn reflection_on(&self, user_id: i32, day: NaiveDate)
        -> StoreResult<Option<DailyReflection>>;
    async fn list_reflections(&self, user_id: i32, from: NaiveDate, to: NaiveDate)
        -> StoreResult<Vec<DailyReflection>>;

    async fn overview_stats(&self, user_id: i32) -> StoreResult<OverviewStats>;
}

/// `postgres://` / `postgresql://` 走网络数据库，其余（包括空串）走内嵌 SQLite
pub async fn connect(database_url: &str) -> StoreResult<Arc<dyn Store>> {
    if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://") {
        tracing::info!("使用 PostgreSQL 存储");
        Ok(Arc::new(PgStore::connect(database_url).await?))
    } else {
        tracing::info!("使用 SQLite 存储: {}", database_url);
        Ok(Arc::new(SqliteStore::connect(database_url).await?))
    }
}

/// 写入数据库的时间戳统一截断到秒，SQLite 中按文本比较时格式保持一致
pub fn db_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// 单用户时代遗留的数据表，首个用户注册时接管其中无主的行
pub(crate) const OWNED_TABLES: &[&str] = &[
    "plans",
    "checklist_items",
    "routines",
    "routine_items",
    "routine_item_logs",
    "habits",
    "habit_logs",
    "spending_entries",
    "spending_budgets",
    "settings",
    "daily_reflections",
];
