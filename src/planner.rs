// src/planner.rs
//! 页面视图模型的组装：状态滚动、习惯连续天数、每日概览与每周回顾。
use std::collections::HashMap;

use chrono::{Duration, Local, NaiveDate};

use crate::models::{
    CategoryTotal, ChecklistItem, DailyReflection, DayTotal, Habit, HabitLog, NamedTotal, Plan,
    PlanStatus, Routine, RoutineItem, RoutineItemLog, SpendingBudget, SpendingEntry, StatusCount,
};
use crate::storage::{Store, StoreResult};

pub const DEFAULT_CYCLE_DAYS: i32 = 90;
pub const MIN_CYCLE_DAYS: i32 = 7;
pub const MAX_CYCLE_DAYS: i32 = 365;

/// 本地时区的当天日期
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// 滚动窗口的起点（包含今天在内共 `days` 天）
pub fn window_start(today: NaiveDate, days: i32) -> NaiveDate {
    today - Duration::days(i64::from(days.max(1) - 1))
}

pub fn week_start(today: NaiveDate) -> NaiveDate {
    window_start(today, 7)
}

/// 无法解析时取默认值，再夹到 7..=365
pub fn normalize_cycle_days(raw: &str) -> i32 {
    raw.trim()
        .parse::<i32>()
        .unwrap_or(DEFAULT_CYCLE_DAYS)
        .clamp(MIN_CYCLE_DAYS, MAX_CYCLE_DAYS)
}

/// 把所有早于今天且仍为 pending 的计划标记为 missed
pub async fn roll_over_plans(store: &dyn Store, user_id: i32, today: NaiveDate) -> StoreResult<()> {
    let missed = store.mark_missed_plans(user_id, today).await?;
    if missed > 0 {
        tracing::debug!(user_id, missed, "计划已滚动为 missed");
    }
    Ok(())
}

/// 从今天开始往前数连续达标的天数；今天未达标则为 0。
/// 扫描最多 `max_days` 天。
pub fn compute_habit_streaks(
    habits: &[Habit],
    logs: &[HabitLog],
    today: NaiveDate,
    max_days: i32,
) -> HashMap<i32, u32> {
    let mut log_map: HashMap<i32, HashMap<NaiveDate, i32>> = HashMap::new();
    for log in logs {
        log_map
            .entry(log.habit_id)
            .or_default()
            .insert(log.log_date, log.count);
    }

    habits
        .iter()
        .map(|habit| {
            let days = log_map.get(&habit.id);
            let mut streak = 0;
            for offset in 0..i64::from(max_days.max(0)) {
                let date = today - Duration::days(offset);
                let count = days.and_then(|d| d.get(&date)).copied().unwrap_or(0);
                if habit.target_count > 0 && count >= habit.target_count {
                    streak += 1;
                } else {
                    break;
                }
            }
            (habit.id, streak)
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanCounts {
    pub done: usize,
    pub pending: usize,
    pub missed: usize,
}

impl PlanCounts {
    pub fn tally(plans: &[Plan]) -> Self {
        plans.iter().fold(Self::default(), |mut acc, plan| {
            match plan.status {
                PlanStatus::Done => acc.done += 1,
                PlanStatus::Pending => acc.pending += 1,
                PlanStatus::Missed => acc.missed += 1,
            }
            acc
        })
    }

    /// GROUP BY status 的查询结果
    pub fn from_rows(rows: &[StatusCount]) -> Self {
        let mut counts = Self::default();
        for row in rows {
            let n = usize::try_from(row.count).unwrap_or(0);
            match PlanStatus::try_from(row.status.clone()) {
                Ok(PlanStatus::Done) => counts.done += n,
                Ok(PlanStatus::Pending) => counts.pending += n,
                Ok(PlanStatus::Missed) => counts.missed += n,
                Err(e) => tracing::warn!("忽略未知状态: {}", e),
            }
        }
        counts
    }
}

#[derive(Debug, Clone)]
pub struct HabitProgress {
    pub habit: Habit,
    pub today_count: i32,
    pub streak: u32,
}

impl HabitProgress {
    pub fn hit(&self) -> bool {
        self.today_count >= self.habit.target_count
    }
}

#[derive(Debug, Clone)]
pub struct RoutineItemState {
    pub item: RoutineItem,
    pub done: bool,
}

#[derive(Debug, Clone)]
pub struct RoutineChecklist {
    pub routine: Routine,
    pub items: Vec<RoutineItemState>,
}

#[derive(Debug, Clone)]
pub struct BudgetUsage {
    pub budget: SpendingBudget,
    pub spent_today: f64,
    pub spent_week: f64,
}

impl BudgetUsage {
    pub fn over_daily(&self) -> bool {
        self.budget.daily_limit > 0.0 && self.spent_today > self.budget.daily_limit
    }

    pub fn over_weekly(&self) -> bool {
        self.budget.weekly_limit > 0.0 && self.spent_week > self.budget.weekly_limit
    }
}

/// 首页（每日概览）的视图模型
#[derive(Debug, Clone)]
pub struct Dashboard {
    pub today: NaiveDate,
    pub week_start: NaiveDate,
    pub cycle_days: i32,
    pub plans: Vec<Plan>,
    pub plan_counts: PlanCounts,
    pub checklist: Vec<ChecklistItem>,
    pub checklist_done: usize,
    pub habits: Vec<HabitProgress>,
    pub habits_hit: usize,
    pub routines: Vec<RoutineChecklist>,
    pub routine_items_done: usize,
    pub routine_items_total: usize,
    pub spending_entries: Vec<SpendingEntry>,
    pub spend_total: f64,
    pub spend_total_today: f64,
    pub spend_today_by_category: Vec<CategoryTotal>,
    pub spend_week_by_category: Vec<CategoryTotal>,
    pub budgets: Vec<BudgetUsage>,
    pub daily_spend_limit: f64,
    /// 未设置每日上限时为 None
    pub left_to_spend: Option<f64>,
    pub reflection: Option<DailyReflection>,
    pub reflections: Vec<DailyReflection>,
}

pub fn left_to_spend(limit: f64, spent_today: f64) -> Option<f64> {
    (limit > 0.0).then(|| limit - spent_today)
}

/// 按例程分组，并标出今天已完成的条目
pub fn group_routines(
    routines: Vec<Routine>,
    items: Vec<RoutineItem>,
    logs: &[RoutineItemLog],
) -> Vec<RoutineChecklist> {
    let done: HashMap<i32, bool> = logs.iter().map(|l| (l.routine_item_id, l.done)).collect();
    let mut grouped: Vec<RoutineChecklist> = routines
        .into_iter()
        .map(|routine| RoutineChecklist {
            routine,
            items: Vec::new(),
        })
        .collect();
    let index: HashMap<i32, usize> = grouped
        .iter()
        .enumerate()
        .map(|(i, r)| (r.routine.id, i))
        .collect();

    for item in items {
        if let Some(&i) = index.get(&item.routine_id) {
            let done = done.get(&item.id).copied().unwrap_or(false);
            grouped[i].items.push(RoutineItemState { item, done });
        }
    }
    grouped
}

fn category_map(rows: &[CategoryTotal]) -> HashMap<&str, f64> {
    rows.iter().map(|r| (r.category.as_str(), r.total)).collect()
}

pub async fn load_dashboard(
    store: &dyn Store,
    user_id: i32,
    today: NaiveDate,
) -> StoreResult<Dashboard> {
    let settings = store.settings(user_id).await?;
    let cycle_days = settings
        .reset_cycle_days
        .clamp(MIN_CYCLE_DAYS, MAX_CYCLE_DAYS);
    let cycle_start = window_start(today, cycle_days);
    let week_start = week_start(today);

    let plans = store.list_plans(user_id, cycle_start, today).await?;
    let checklist = store.list_checklist(user_id, cycle_start, today).await?;
    let habits = store.list_active_habits(user_id).await?;
    let habit_logs = store.habit_logs_between(user_id, cycle_start, today).await?;
    let routines = store.list_active_routines(user_id).await?;
    let routine_items = store.list_active_routine_items(user_id).await?;
    let routine_logs = store.routine_logs_on(user_id, today).await?;
    let spending_entries = store.list_spending(user_id, cycle_start, today).await?;
    let budgets = store.list_budgets(user_id).await?;
    let spend_today_by_category = store.spending_by_category(user_id, today, today).await?;
    let spend_week_by_category = store.spending_by_category(user_id, week_start, today).await?;
    let reflection = store.reflection_on(user_id, today).await?;
    let reflections = store.list_reflections(user_id, cycle_start, today).await?;

    let streaks = compute_habit_streaks(&habits, &habit_logs, today, cycle_days);
    let today_counts: HashMap<i32, i32> = habit_logs
        .iter()
        .filter(|log| log.log_date == today)
        .map(|log| (log.habit_id, log.count))
        .collect();
    let habits: Vec<HabitProgress> = habits
        .into_iter()
        .map(|habit| HabitProgress {
            today_count: today_counts.get(&habit.id).copied().unwrap_or(0),
            streak: streaks.get(&habit.id).copied().unwrap_or(0),
            habit,
        })
        .collect();
    let habits_hit = habits.iter().filter(|h| h.hit()).count();

    let routines = group_routines(routines, routine_items, &routine_logs);
    let routine_items_total: usize = routines.iter().map(|r| r.items.len()).sum();
    let routine_items_done = routines
        .iter()
        .flat_map(|r| r.items.iter())
        .filter(|i| i.done)
        .count();

    let spend_total: f64 = spending_entries.iter().map(|e| e.amount).sum();
    let spend_total_today: f64 = spending_entries
        .iter()
        .filter(|e| e.spend_date == today)
        .map(|e| e.amount)
        .sum();

    let today_map = category_map(&spend_today_by_category);
    let week_map = category_map(&spend_week_by_category);
    let budgets = budgets
        .into_iter()
        .map(|budget| BudgetUsage {
            spent_today: today_map.get(budget.category.as_str()).copied().unwrap_or(0.0),
            spent_week: week_map.get(budget.category.as_str()).copied().unwrap_or(0.0),
            budget,
        })
        .collect();

    let plan_counts = PlanCounts::tally(&plans);
    let checklist_done = checklist.iter().filter(|c| c.done).count();

    Ok(Dashboard {
        today,
        week_start,
        cycle_days,
        plan_counts,
        plans,
        checklist_done,
        checklist,
        habits,
        habits_hit,
        routines,
        routine_items_done,
        routine_items_total,
        spend_total,
        spend_total_today,
        spending_entries,
        spend_today_by_category,
        spend_week_by_category,
        budgets,
        daily_spend_limit: settings.daily_spend_limit,
        left_to_spend: left_to_spend(settings.daily_spend_limit, spend_total_today),
        reflection,
        reflections,
    })
}

/// 最近 7 天（含今天）的回顾
#[derive(Debug, Clone)]
pub struct WeeklyReview {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub plan_counts: PlanCounts,
    pub spending_by_day: Vec<DayTotal>,
    pub spending_by_category: Vec<CategoryTotal>,
    pub habit_totals: Vec<NamedTotal>,
    pub routine_totals: Vec<NamedTotal>,
}

impl WeeklyReview {
    pub fn spend_total(&self) -> f64 {
        self.spending_by_day.iter().map(|d| d.total).sum()
    }
}

pub async fn load_weekly_review(
    store: &dyn Store,
    user_id: i32,
    today: NaiveDate,
) -> StoreResult<WeeklyReview> {
    let start = week_start(today);
    let status_rows = store.plan_status_counts(user_id, start, today).await?;

    Ok(WeeklyReview {
        start,
        end: today,
        plan_counts: PlanCounts::from_rows(&status_rows),
        spending_by_day: store.spending_by_day(user_id, start, today).await?,
        spending_by_category: store.spending_by_category(user_id, start, today).await?,
        habit_totals: store.habit_totals(user_id, start, today).await?,
        routine_totals: store.routine_completion_totals(user_id, start, today).await?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewPlan, NewSpendingEntry, NewUser};
    use crate::storage::{db_now, SqliteStore};

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn habit(id: i32, target: i32) -> Habit {
        Habit {
            id,
            user_id: 1,
            name: format!("habit-{id}"),
            target_count: target,
            active: true,
        }
    }

    fn log(habit_id: i32, date: NaiveDate, count: i32) -> HabitLog {
        HabitLog {
            habit_id,
            log_date: date,
            count,
        }
    }

    #[test]
    fn streak_counts_consecutive_days_ending_today() {
        let today = day("2024-05-10");
        let logs = vec![
            log(1, today, 2),
            log(1, today - Duration::days(1), 2),
            log(1, today - Duration::days(2), 1),
            log(1, today - Duration::days(3), 2),
        ];
        let streaks = compute_habit_streaks(&[habit(1, 2)], &logs, today, 90);
        assert_eq!(streaks[&1], 2);
    }

    #[test]
    fn streak_is_zero_when_today_is_below_target() {
        let today = day("2024-05-10");
        let logs = vec![
            log(1, today - Duration::days(1), 5),
            log(1, today - Duration::days(2), 5),
        ];
        let streaks = compute_habit_streaks(&[habit(1, 1)], &logs, today, 90);
        assert_eq!(streaks[&1], 0);

        let logs = vec![log(1, today, 1)];
        let streaks = compute_habit_streaks(&[habit(1, 2)], &logs, today, 90);
        assert_eq!(streaks[&1], 0);
    }

    #[test]
    fn streak_is_bounded_by_window_and_zero_target() {
        let today = day("2024-05-10");
        let logs: Vec<HabitLog> = (0..30)
            .map(|offset| log(1, today - Duration::days(offset), 1))
            .collect();
        let streaks = compute_habit_streaks(&[habit(1, 1)], &logs, today, 7);
        assert_eq!(streaks[&1], 7);

        let streaks = compute_habit_streaks(&[habit(1, 0)], &logs, today, 7);
        assert_eq!(streaks[&1], 0);
    }

    #[test]
    fn streaks_are_per_habit() {
        let today = day("2024-05-10");
        let logs = vec![log(1, today, 1), log(2, today, 3), log(2, today - Duration::days(1), 3)];
        let streaks = compute_habit_streaks(&[habit(1, 1), habit(2, 3), habit(3, 1)], &logs, today, 90);
        assert_eq!(streaks[&1], 1);
        assert_eq!(streaks[&2], 2);
        assert_eq!(streaks[&3], 0);
    }

    #[test]
    fn cycle_days_are_clamped_with_default() {
        assert_eq!(normalize_cycle_days("30"), 30);
        assert_eq!(normalize_cycle_days("3"), 7);
        assert_eq!(normalize_cycle_days("1000"), 365);
        assert_eq!(normalize_cycle_days("abc"), 90);
        assert_eq!(normalize_cycle_days(""), 90);
    }

    #[test]
    fn window_includes_today() {
        let today = day("2024-05-10");
        assert_eq!(window_start(today, 7), day("2024-05-04"));
        assert_eq!(week_start(today), day("2024-05-04"));
        assert_eq!(window_start(today, 90), day("2024-02-11"));
    }

    #[test]
    fn left_to_spend_requires_a_limit() {
        assert_eq!(left_to_spend(0.0, 12.0), None);
        assert_eq!(left_to_spend(20.0, 12.5), Some(7.5));
    }

    #[test]
    fn plan_counts_from_grouped_rows() {
        let rows = vec![
            StatusCount { status: "done".into(), count: 3 },
            StatusCount { status: "missed".into(), count: 1 },
        ];
        let counts = PlanCounts::from_rows(&rows);
        assert_eq!(counts, PlanCounts { done: 3, pending: 0, missed: 1 });
    }

    #[tokio::test]
    async fn dashboard_assembles_today_state() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.migrate().await.unwrap();
        let uid = store
            .create_user(
                &NewUser {
                    username: "alice".into(),
                    email: "alice@example.com".into(),
                    password_hash: "hash".into(),
                    invite_token: None,
                },
                db_now(),
            )
            .await
            .unwrap();
        let today = day("2024-05-10");

        let plan = NewPlan {
            title: "Write report".into(),
            time_block: "09:00".into(),
            priority: 3,
            scheduled_date: today - Duration::days(1),
        };
        store.create_plan(uid, &plan, db_now()).await.unwrap();
        roll_over_plans(&store, uid, today).await.unwrap();

        let habit = store.create_habit(uid, "Water", 2).await.unwrap();
        store.increment_habit(uid, habit, today).await.unwrap();
        store.increment_habit(uid, habit, today).await.unwrap();

        let routine = store.create_routine(uid, "Morning", "morning").await.unwrap();
        let item = store.create_routine_item(uid, routine, "Stretch", 1).await.unwrap().unwrap();
        store.create_routine_item(uid, routine, "Journal", 2).await.unwrap();
        store.toggle_routine_item(uid, item, today).await.unwrap();

        let spend = NewSpendingEntry {
            amount: 12.5,
            category: "Food".into(),
            note: "Lunch".into(),
            spend_date: today,
        };
        store.create_spending(uid, &spend, db_now()).await.unwrap();
        store.upsert_budget(uid, "Food", 10.0, 100.0).await.unwrap();
        store.set_daily_spend_limit(uid, 20.0).await.unwrap();

        let dashboard = load_dashboard(&store, uid, today).await.unwrap();
        assert_eq!(dashboard.plan_counts.missed, 1);
        assert_eq!(dashboard.habits.len(), 1);
        assert_eq!(dashboard.habits[0].today_count, 2);
        assert_eq!(dashboard.habits[0].streak, 1);
        assert_eq!(dashboard.habits_hit, 1);
        assert_eq!(dashboard.routine_items_total, 2);
        assert_eq!(dashboard.routine_items_done, 1);
        assert_eq!(dashboard.routines[0].items[0].item.label, "Stretch");
        assert_eq!(dashboard.spend_total_today, 12.5);
        assert_eq!(dashboard.left_to_spend, Some(7.5));
        assert!(dashboard.budgets[0].over_daily());
        assert!(!dashboard.budgets[0].over_weekly());

        let review = load_weekly_review(&store, uid, today).await.unwrap();
        assert_eq!(review.plan_counts.missed, 1);
        assert_eq!(review.spend_total(), 12.5);
        assert_eq!(review.habit_totals[0].total, 2);
        assert_eq!(review.routine_totals[0].total, 1);
    }
}
