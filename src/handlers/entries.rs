// src/handlers/entries.rs
//! 首页上各类条目的增删改。校验失败统一静默跳回首页。
use axum::{extract::State, response::Redirect};

use super::{home, note_miss};
use crate::auth::AuthUser;
use crate::models::{
    BudgetForm, ChecklistForm, HabitForm, NewPlan, NewSpendingEntry, PlanForm, PlanStatus,
    ReflectionForm, ReflectionInput, ResetCycleForm, RoutineForm, RoutineItemForm,
    SpendLimitForm, SpendingForm,
};
use crate::planner::{self, normalize_cycle_days};
use crate::storage::db_now;
use crate::validation::{date_or, float_or, int_or, positive_amount, RowId, ValidatedForm};
use crate::{AppError, AppState};

// --- 1. 计划 ---
pub async fn add_plan_handler(
    user: AuthUser,
    State(state): State<AppState>,
    ValidatedForm(form): ValidatedForm<PlanForm>,
) -> Result<Redirect, AppError> {
    let plan = NewPlan {
        title: form.title,
        time_block: form.time_block,
        priority: int_or(&form.priority, 2),
        scheduled_date: date_or(&form.scheduled_date, planner::today())?,
    };
    state.store.create_plan(user.id, &plan, db_now()).await?;
    Ok(home())
}

pub async fn complete_plan_handler(
    RowId(id): RowId,
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Redirect, AppError> {
    let found = state.store.set_plan_status(user.id, id, PlanStatus::Done).await?;
    note_miss(found, "计划", id);
    Ok(home())
}

pub async fn reopen_plan_handler(
    RowId(id): RowId,
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Redirect, AppError> {
    let found = state.store.set_plan_status(user.id, id, PlanStatus::Pending).await?;
    note_miss(found, "计划", id);
    Ok(home())
}

pub async fn delete_plan_handler(
    RowId(id): RowId,
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Redirect, AppError> {
    let found = state.store.delete_plan(user.id, id).await?;
    note_miss(found, "计划", id);
    Ok(home())
}

// --- 2. 清单 ---
pub async fn add_checklist_handler(
    user: AuthUser,
    State(state): State<AppState>,
    ValidatedForm(form): ValidatedForm<ChecklistForm>,
) -> Result<Redirect, AppError> {
    let date = date_or(&form.scheduled_date, planner::today())?;
    state
        .store
        .create_checklist_item(user.id, &form.label, date, db_now())
        .await?;
    Ok(home())
}

pub async fn toggle_checklist_handler(
    RowId(id): RowId,
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Redirect, AppError> {
    let found = state.store.toggle_checklist_item(user.id, id).await?;
    note_miss(found, "清单项", id);
    Ok(home())
}

pub async fn delete_checklist_handler(
    RowId(id): RowId,
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Redirect, AppError> {
    let found = state.store.delete_checklist_item(user.id, id).await?;
    note_miss(found, "清单项", id);
    Ok(home())
}

// --- 3. 例程 ---
pub async fn add_routine_handler(
    user: AuthUser,
    State(state): State<AppState>,
    ValidatedForm(form): ValidatedForm<RoutineForm>,
) -> Result<Redirect, AppError> {
    let time_of_day = if form.time_of_day.is_empty() {
        "any"
    } else {
        form.time_of_day.as_str()
    };
    state.store.create_routine(user.id, &form.name, time_of_day).await?;
    Ok(home())
}

pub async fn delete_routine_handler(
    RowId(id): RowId,
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Redirect, AppError> {
    // 条目与完成记录在同一事务中一并删除
    let found = state.store.delete_routine(user.id, id).await?;
    note_miss(found, "例程", id);
    Ok(home())
}

pub async fn add_routine_item_handler(
    user: AuthUser,
    State(state): State<AppState>,
    ValidatedForm(form): ValidatedForm<RoutineItemForm>,
) -> Result<Redirect, AppError> {
    let routine_id: i32 = form
        .routine_id
        .parse()
        .map_err(|_| AppError::BadRequest(format!("invalid routine id `{}`", form.routine_id)))?;
    let created = state
        .store
        .create_routine_item(user.id, routine_id, &form.label, int_or(&form.sort_order, 0))
        .await?;
    note_miss(created.is_some(), "例程", routine_id);
    Ok(home())
}

pub async fn toggle_routine_item_handler(
    RowId(id): RowId,
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Redirect, AppError> {
    let found = state
        .store
        .toggle_routine_item(user.id, id, planner::today())
        .await?;
    note_miss(found, "例程条目", id);
    Ok(home())
}

// --- 4. 习惯 ---
pub async fn add_habit_handler(
    user: AuthUser,
    State(state): State<AppState>,
    ValidatedForm(form): ValidatedForm<HabitForm>,
) -> Result<Redirect, AppError> {
    let target = int_or(&form.target_count, 1);
    state.store.create_habit(user.id, &form.name, target).await?;
    Ok(home())
}

pub async fn log_habit_handler(
    RowId(id): RowId,
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Redirect, AppError> {
    let found = state.store.increment_habit(user.id, id, planner::today()).await?;
    note_miss(found, "习惯", id);
    Ok(home())
}

pub async fn reset_habit_handler(
    RowId(id): RowId,
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Redirect, AppError> {
    let found = state.store.reset_habit(user.id, id, planner::today()).await?;
    note_miss(found, "习惯", id);
    Ok(home())
}

pub async fn delete_habit_handler(
    RowId(id): RowId,
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Redirect, AppError> {
    let found = state.store.delete_habit(user.id, id).await?;
    note_miss(found, "习惯", id);
    Ok(home())
}

// --- 5. 消费 / 预算 ---
pub async fn add_spending_handler(
    user: AuthUser,
    State(state): State<AppState>,
    ValidatedForm(form): ValidatedForm<SpendingForm>,
) -> Result<Redirect, AppError> {
    // 金额必须为正数，否则不写入任何记录
    let amount = positive_amount(&form.amount)?;
    let entry = NewSpendingEntry {
        amount,
        category: non_empty_or(form.category, "Other"),
        note: non_empty_or(form.note, "Daily spend"),
        spend_date: date_or(&form.spend_date, planner::today())?,
    };
    state.store.create_spending(user.id, &entry, db_now()).await?;
    Ok(home())
}

pub async fn delete_spending_handler(
    RowId(id): RowId,
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Redirect, AppError> {
    let found = state.store.delete_spending(user.id, id).await?;
    note_miss(found, "消费记录", id);
    Ok(home())
}

pub async fn add_budget_handler(
    user: AuthUser,
    State(state): State<AppState>,
    ValidatedForm(form): ValidatedForm<BudgetForm>,
) -> Result<Redirect, AppError> {
    let daily = float_or(&form.daily_limit, 0.0);
    let weekly = float_or(&form.weekly_limit, 0.0);
    state
        .store
        .upsert_budget(user.id, &form.category, daily, weekly)
        .await?;
    Ok(home())
}

pub async fn delete_budget_handler(
    RowId(id): RowId,
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Redirect, AppError> {
    let found = state.store.delete_budget(user.id, id).await?;
    note_miss(found, "预算", id);
    Ok(home())
}

// --- 6. 设置 / 复盘 ---
pub async fn spend_limit_handler(
    user: AuthUser,
    State(state): State<AppState>,
    ValidatedForm(form): ValidatedForm<SpendLimitForm>,
) -> Result<Redirect, AppError> {
    let limit = float_or(&form.daily_spend_limit, 0.0);
    state.store.set_daily_spend_limit(user.id, limit).await?;
    Ok(home())
}

pub async fn reset_cycle_handler(
    user: AuthUser,
    State(state): State<AppState>,
    ValidatedForm(form): ValidatedForm<ResetCycleForm>,
) -> Result<Redirect, AppError> {
    let days = normalize_cycle_days(&form.reset_cycle_days);
    state.store.set_reset_cycle_days(user.id, days).await?;
    Ok(home())
}

pub async fn save_reflection_handler(
    user: AuthUser,
    State(state): State<AppState>,
    ValidatedForm(form): ValidatedForm<ReflectionForm>,
) -> Result<Redirect, AppError> {
    let input = ReflectionInput {
        log_date: date_or(&form.log_date, planner::today())?,
        mood: form.mood,
        wins: form.wins,
        blockers: form.blockers,
        gratitude: form.gratitude,
    };
    state.store.upsert_reflection(user.id, &input, db_now()).await?;
    Ok(home())
}

fn non_empty_or(value: String, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        value
    }
}
