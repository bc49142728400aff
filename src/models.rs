// src/models.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer};
use sqlx::FromRow;
use std::fmt;
use validator::Validate;

// --- 1. 用户 / 邀请 / 重置密码 ---
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// 注册时写入的新用户
#[derive(Debug)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    /// 本次注册要核销的邀请令牌
    pub invite_token: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct Invite {
    pub id: i32,
    pub inviter_user_id: i32,
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used_by_user_id: Option<i32>,
}

#[derive(Debug, Clone, FromRow)]
pub struct UsedInvite {
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub used_by: Option<String>, // LEFT JOIN users 得到的用户名
}

#[derive(Debug, Clone, FromRow)]
pub struct PasswordReset {
    pub id: i32,
    pub user_id: i32,
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
}

// --- 2. 计划 (Plan) ---
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanStatus {
    Pending,
    Done,
    Missed,
}

impl PlanStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PlanStatus::Pending => "pending",
            PlanStatus::Done => "done",
            PlanStatus::Missed => "missed",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown plan status: {0}")]
pub struct UnknownStatus(pub String);

impl TryFrom<String> for PlanStatus {
    type Error = UnknownStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "pending" => Ok(PlanStatus::Pending),
            "done" => Ok(PlanStatus::Done),
            "missed" => Ok(PlanStatus::Missed),
            _ => Err(UnknownStatus(value)),
        }
    }
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Plan {
    pub id: i32,
    pub user_id: i32,
    pub title: String,
    pub time_block: String,
    pub priority: i32,
    pub scheduled_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    #[sqlx(try_from = "String")]
    pub status: PlanStatus,
}

#[derive(Debug)]
pub struct NewPlan {
    pub title: String,
    pub time_block: String,
    pub priority: i32,
    pub scheduled_date: NaiveDate,
}

// --- 3. 清单 / 例程 / 习惯 ---
#[derive(Debug, Clone, FromRow)]
pub struct ChecklistItem {
    pub id: i32,
    pub user_id: i32,
    pub label: String,
    pub scheduled_date: NaiveDate,
    pub done: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct Routine {
    pub id: i32,
    pub user_id: i32,
    pub name: String,
    pub time_of_day: String,
    pub active: bool,
}

#[derive(Debug, Clone, FromRow)]
pub struct RoutineItem {
    pub id: i32,
    pub routine_id: i32,
    pub user_id: i32,
    pub label: String,
    pub sort_order: i32,
}

#[derive(Debug, Clone, FromRow)]
pub struct RoutineItemLog {
    pub routine_item_id: i32,
    pub log_date: NaiveDate,
    pub done: bool,
}

#[derive(Debug, Clone, FromRow)]
pub struct Habit {
    pub id: i32,
    pub user_id: i32,
    pub name: String,
    pub target_count: i32,
    pub active: bool,
}

#[derive(Debug, Clone, FromRow)]
pub struct HabitLog {
    pub habit_id: i32,
    pub log_date: NaiveDate,
    pub count: i32,
}

// --- 4. 消费 / 预算 / 设置 / 每日复盘 ---
#[derive(Debug, Clone, FromRow)]
pub struct SpendingEntry {
    pub id: i32,
    pub user_id: i32,
    pub amount: f64,
    pub category: String,
    pub note: String,
    pub spend_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct NewSpendingEntry {
    pub amount: f64,
    pub category: String,
    pub note: String,
    pub spend_date: NaiveDate,
}

#[derive(Debug, Clone, FromRow)]
pub struct SpendingBudget {
    pub id: i32,
    pub user_id: i32,
    pub category: String,
    pub daily_limit: f64,
    pub weekly_limit: f64,
}

#[derive(Debug, Clone, FromRow)]
pub struct Settings {
    pub user_id: i32,
    pub daily_spend_limit: f64,
    pub reset_cycle_days: i32,
}

#[derive(Debug, Clone, FromRow)]
pub struct DailyReflection {
    pub user_id: i32,
    pub log_date: NaiveDate,
    pub mood: String,
    pub wins: String,
    pub blockers: String,
    pub gratitude: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct ReflectionInput {
    pub log_date: NaiveDate,
    pub mood: String,
    pub wins: String,
    pub blockers: String,
    pub gratitude: String,
}

// --- 5. 聚合查询结果 ---
#[derive(Debug, Clone, FromRow)]
pub struct CategoryTotal {
    pub category: String,
    pub total: f64,
}

#[derive(Debug, Clone, FromRow)]
pub struct DayTotal {
    pub spend_date: NaiveDate,
    pub total: f64,
}

#[derive(Debug, Clone, FromRow)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

/// 习惯 / 例程名称 + 区间内的累计次数
#[derive(Debug, Clone, FromRow)]
pub struct NamedTotal {
    pub name: String,
    pub total: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverviewStats {
    pub plans: i64,
    pub checklist: i64,
    pub habits: i64,
    pub routines: i64,
    pub spending_entries: i64,
}

// --- 6. 表单 ---
// 文本字段统一去除首尾空白；缺失字段按空字符串处理

pub fn trimmed<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(raw.trim().to_string())
}

#[derive(Debug, Deserialize, Validate)]
pub struct PlanForm {
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(length(min = 1, max = 255, message = "title is required"))]
    pub title: String,
    #[serde(default, deserialize_with = "trimmed")]
    pub time_block: String,
    #[serde(default, deserialize_with = "trimmed")]
    pub priority: String,
    #[serde(default, deserialize_with = "trimmed")]
    pub scheduled_date: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChecklistForm {
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(length(min = 1, max = 255, message = "label is required"))]
    pub label: String,
    #[serde(default, deserialize_with = "trimmed")]
    pub scheduled_date: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RoutineForm {
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(length(min = 1, max = 100, message = "name is required"))]
    pub name: String,
    #[serde(default, deserialize_with = "trimmed")]
    pub time_of_day: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RoutineItemForm {
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(length(min = 1, message = "routine is required"))]
    pub routine_id: String,
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(length(min = 1, max = 255, message = "label is required"))]
    pub label: String,
    #[serde(default, deserialize_with = "trimmed")]
    pub sort_order: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct HabitForm {
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(length(min = 1, max = 100, message = "name is required"))]
    pub name: String,
    #[serde(default, deserialize_with = "trimmed")]
    pub target_count: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SpendingForm {
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(length(min = 1, message = "amount is required"))]
    pub amount: String,
    #[serde(default, deserialize_with = "trimmed")]
    pub category: String,
    #[serde(default, deserialize_with = "trimmed")]
    pub note: String,
    #[serde(default, deserialize_with = "trimmed")]
    pub spend_date: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct BudgetForm {
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(length(min = 1, max = 100, message = "category is required"))]
    pub category: String,
    #[serde(default, deserialize_with = "trimmed")]
    pub daily_limit: String,
    #[serde(default, deserialize_with = "trimmed")]
    pub weekly_limit: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SpendLimitForm {
    #[serde(default, deserialize_with = "trimmed")]
    pub daily_spend_limit: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResetCycleForm {
    #[serde(default, deserialize_with = "trimmed")]
    pub reset_cycle_days: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReflectionForm {
    #[serde(default, deserialize_with = "trimmed")]
    pub log_date: String,
    #[serde(default, deserialize_with = "trimmed")]
    pub mood: String,
    #[serde(default, deserialize_with = "trimmed")]
    pub wins: String,
    #[serde(default, deserialize_with = "trimmed")]
    pub blockers: String,
    #[serde(default, deserialize_with = "trimmed")]
    pub gratitude: String,
}

// 认证相关表单的错误需要回显在页面上，因此不走 ValidatedForm

#[derive(Debug, Default, Deserialize)]
pub struct RegisterForm {
    #[serde(default, deserialize_with = "trimmed")]
    pub username: String,
    #[serde(default, deserialize_with = "trimmed")]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default, deserialize_with = "trimmed")]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct AccountForm {
    #[serde(default, deserialize_with = "trimmed")]
    pub email: String,
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
    #[serde(default)]
    pub confirm_password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResetRequestForm {
    #[serde(default, deserialize_with = "trimmed")]
    pub email: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResetPasswordForm {
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm: String,
}
