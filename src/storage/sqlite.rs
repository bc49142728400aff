// src/storage/sqlite.rs
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};

use super::{Store, StoreResult, OWNED_TABLES};
use crate::models::*;

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// 数据库文件不存在时自动创建
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    /// 单连接内存库，连接常驻，数据随进程存在
    pub async fn in_memory() -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }
}

impl_store!(SqliteStore);

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        email TEXT NOT NULL DEFAULT '',
        password_hash TEXT NOT NULL,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS invites (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        inviter_user_id INTEGER NOT NULL,
        token TEXT NOT NULL UNIQUE,
        created_at TEXT NOT NULL,
        expires_at TEXT NOT NULL,
        used_by_user_id INTEGER,
        FOREIGN KEY (inviter_user_id) REFERENCES users (id)
    )",
    "CREATE TABLE IF NOT EXISTS password_resets (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        token TEXT NOT NULL UNIQUE,
        created_at TEXT NOT NULL,
        expires_at TEXT NOT NULL,
        used INTEGER NOT NULL DEFAULT 0,
        FOREIGN KEY (user_id) REFERENCES users (id)
    )",
    "CREATE TABLE IF NOT EXISTS plans (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        title TEXT NOT NULL,
        time_block TEXT NOT NULL DEFAULT '',
        priority INTEGER NOT NULL DEFAULT 2,
        scheduled_date TEXT NOT NULL,
        created_at TEXT NOT NULL,
        status TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS checklist_items (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        label TEXT NOT NULL,
        scheduled_date TEXT NOT NULL,
        done INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS routines (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        name TEXT NOT NULL,
        time_of_day TEXT NOT NULL,
        active INTEGER NOT NULL DEFAULT 1
    )",
    "CREATE TABLE IF NOT EXISTS routine_items (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        routine_id INTEGER NOT NULL,
        user_id INTEGER NOT NULL,
        label TEXT NOT NULL,
        sort_order INTEGER NOT NULL DEFAULT 0,
        FOREIGN KEY (routine_id) REFERENCES routines (id)
    )",
    "CREATE TABLE IF NOT EXISTS routine_item_logs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        routine_item_id INTEGER NOT NULL,
        user_id INTEGER NOT NULL,
        log_date TEXT NOT NULL,
        done INTEGER NOT NULL DEFAULT 0,
        UNIQUE (routine_item_id, log_date),
        FOREIGN KEY (routine_item_id) REFERENCES routine_items (id)
    )",
    "CREATE TABLE IF NOT EXISTS habits (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        name TEXT NOT NULL,
        target_count INTEGER NOT NULL DEFAULT 1,
        active INTEGER NOT NULL DEFAULT 1
    )",
    "CREATE TABLE IF NOT EXISTS habit_logs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        habit_id INTEGER NOT NULL,
        user_id INTEGER NOT NULL,
        log_date TEXT NOT NULL,
        count INTEGER NOT NULL DEFAULT 0,
        UNIQUE (habit_id, log_date),
        FOREIGN KEY (habit_id) REFERENCES habits (id)
    )",
    "CREATE TABLE IF NOT EXISTS spending_entries (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        amount REAL NOT NULL,
        category TEXT NOT NULL,
        note TEXT NOT NULL,
        spend_date TEXT NOT NULL,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS spending_budgets (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        category TEXT NOT NULL,
        daily_limit REAL NOT NULL DEFAULT 0,
        weekly_limit REAL NOT NULL DEFAULT 0,
        UNIQUE (user_id, category)
    )",
    "CREATE TABLE IF NOT EXISTS settings (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL UNIQUE,
        daily_spend_limit REAL NOT NULL DEFAULT 0,
        reset_cycle_days INTEGER NOT NULL DEFAULT 90
    )",
    "CREATE TABLE IF NOT EXISTS daily_reflections (
        user_id INTEGER NOT NULL,
        log_date TEXT NOT NULL,
        mood TEXT NOT NULL DEFAULT '',
        wins TEXT NOT NULL DEFAULT '',
        blockers TEXT NOT NULL DEFAULT '',
        gratitude TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL,
        PRIMARY KEY (user_id, log_date)
    )",
];

// 旧版单用户表的唯一键不含 user_id，只能重建后把数据归到 1 号用户
const REBUILD_SETTINGS: &[&str] = &[
    "ALTER TABLE settings RENAME TO settings_old",
    "CREATE TABLE settings (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL UNIQUE,
        daily_spend_limit REAL NOT NULL DEFAULT 0,
        reset_cycle_days INTEGER NOT NULL DEFAULT 90
    )",
    "INSERT INTO settings (user_id, daily_spend_limit, reset_cycle_days)
     SELECT 1, daily_spend_limit, 90 FROM settings_old LIMIT 1",
    "DROP TABLE settings_old",
];

const REBUILD_REFLECTIONS: &[&str] = &[
    "ALTER TABLE daily_reflections RENAME TO daily_reflections_old",
    "CREATE TABLE daily_reflections (
        user_id INTEGER NOT NULL,
        log_date TEXT NOT NULL,
        mood TEXT NOT NULL DEFAULT '',
        wins TEXT NOT NULL DEFAULT '',
        blockers TEXT NOT NULL DEFAULT '',
        gratitude TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL,
        PRIMARY KEY (user_id, log_date)
    )",
    "INSERT INTO daily_reflections (user_id, log_date, mood, wins, blockers, gratitude, created_at)
     SELECT 1, log_date, mood, wins, blockers, gratitude, created_at FROM daily_reflections_old",
    "DROP TABLE daily_reflections_old",
];

const REBUILD_BUDGETS: &[&str] = &[
    "ALTER TABLE spending_budgets RENAME TO spending_budgets_old",
    "CREATE TABLE spending_budgets (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        category TEXT NOT NULL,
        daily_limit REAL NOT NULL DEFAULT 0,
        weekly_limit REAL NOT NULL DEFAULT 0,
        UNIQUE (user_id, category)
    )",
    "INSERT INTO spending_budgets (user_id, category, daily_limit, weekly_limit)
     SELECT 1, category, daily_limit, weekly_limit FROM spending_budgets_old",
    "DROP TABLE spending_budgets_old",
];

/// 建表 + 增量迁移（均可重复执行）
async fn migrate_schema(pool: &SqlitePool) -> StoreResult<()> {
    let mut tx = pool.begin().await?;

    for statement in SCHEMA {
        sqlx::query(statement).execute(&mut *tx).await?;
    }

    if !column_exists(&mut tx, "users", "email").await? {
        sqlx::query("ALTER TABLE users ADD COLUMN email TEXT NOT NULL DEFAULT ''")
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE users SET email = username WHERE email = '' AND username LIKE '%@%'")
            .execute(&mut *tx)
            .await?;
    }

    let rebuilds = [
        ("settings", REBUILD_SETTINGS),
        ("daily_reflections", REBUILD_REFLECTIONS),
        ("spending_budgets", REBUILD_BUDGETS),
    ];
    for (table, statements) in rebuilds {
        if !column_exists(&mut tx, table, "user_id").await? {
            tracing::info!("重建旧版数据表 {}", table);
            for statement in statements {
                sqlx::query(statement).execute(&mut *tx).await?;
            }
        }
    }

    if !column_exists(&mut tx, "settings", "reset_cycle_days").await? {
        sqlx::query("ALTER TABLE settings ADD COLUMN reset_cycle_days INTEGER NOT NULL DEFAULT 90")
            .execute(&mut *tx)
            .await?;
    }

    for table in OWNED_TABLES {
        if !column_exists(&mut tx, table, "user_id").await? {
            tracing::info!("为旧版数据表 {} 补充 user_id", table);
            let sql = format!("ALTER TABLE {table} ADD COLUMN user_id INTEGER NOT NULL DEFAULT 1");
            sqlx::query(&sql).execute(&mut *tx).await?;
        }
    }

    tx.commit().await?;
    tracing::info!("SQLite schema 已就绪");
    Ok(())
}

async fn column_exists(
    tx: &mut Transaction<'_, Sqlite>,
    table: &str,
    column: &str,
) -> StoreResult<bool> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM pragma_table_info($1) WHERE name = $2",
    )
    .bind(table)
    .bind(column)
    .fetch_one(&mut **tx)
    .await?;
    Ok(count > 0)
}

/// SQLite 的 AUTOINCREMENT 会自动越过显式写入的 id，无需处理
async fn sync_user_sequence(_tx: &mut Transaction<'_, Sqlite>) -> StoreResult<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::db_now;
    use chrono::{Duration, NaiveDate};

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    async fn store() -> SqliteStore {
        let store = SqliteStore::in_memory().await.unwrap();
        store.migrate().await.unwrap();
        store
    }

    async fn user(store: &SqliteStore, name: &str) -> i32 {
        let new_user = NewUser {
            username: name.to_string(),
            email: format!("{name}@example.com"),
            password_hash: "hash".to_string(),
            invite_token: None,
        };
        store.create_user(&new_user, db_now()).await.unwrap()
    }

    fn plan(title: &str, date: NaiveDate) -> NewPlan {
        NewPlan {
            title: title.to_string(),
            time_block: String::new(),
            priority: 2,
            scheduled_date: date,
        }
    }

    #[tokio::test]
    async fn migrate_is_idempotent() {
        let store = store().await;
        store.migrate().await.unwrap();
        assert_eq!(store.count_users().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn first_user_gets_id_one_and_next_users_follow() {
        let store = store().await;
        assert_eq!(user(&store, "alice").await, 1);
        let second = user(&store, "bob").await;
        assert!(second > 1);
        assert_eq!(store.count_users().await.unwrap(), 2);

        let found = store.find_user_by_login("bob@example.com").await.unwrap().unwrap();
        assert_eq!(found.id, second);
        let found = store.find_user_by_login("alice").await.unwrap().unwrap();
        assert_eq!(found.id, 1);
    }

    #[tokio::test]
    async fn duplicate_username_is_a_unique_violation() {
        let store = store().await;
        user(&store, "alice").await;
        user(&store, "bob").await;
        let dup = NewUser {
            username: "bob".to_string(),
            email: "other@example.com".to_string(),
            password_hash: "hash".to_string(),
            invite_token: None,
        };
        let err = store.create_user(&dup, db_now()).await.unwrap_err();
        assert!(crate::storage::is_unique_violation(&err));
    }

    #[tokio::test]
    async fn rollover_marks_only_past_pending_plans() {
        let store = store().await;
        let uid = user(&store, "alice").await;
        let today = day("2024-05-10");

        let old = store.create_plan(uid, &plan("old", day("2020-01-01")), db_now()).await.unwrap();
        let done = store.create_plan(uid, &plan("done", day("2020-01-02")), db_now()).await.unwrap();
        let current = store.create_plan(uid, &plan("today", today), db_now()).await.unwrap();
        let future = store
            .create_plan(uid, &plan("later", today + Duration::days(3)), db_now())
            .await
            .unwrap();
        assert!(store.set_plan_status(uid, done, PlanStatus::Done).await.unwrap());

        assert_eq!(store.mark_missed_plans(uid, today).await.unwrap(), 1);
        // 第二次执行不再有变化
        assert_eq!(store.mark_missed_plans(uid, today).await.unwrap(), 0);

        let plans = store
            .list_plans(uid, day("2019-01-01"), day("2030-01-01"))
            .await
            .unwrap();
        let status_of = |id: i32| plans.iter().find(|p| p.id == id).unwrap().status;
        assert_eq!(status_of(old), PlanStatus::Missed);
        assert_eq!(status_of(done), PlanStatus::Done);
        assert_eq!(status_of(current), PlanStatus::Pending);
        assert_eq!(status_of(future), PlanStatus::Pending);
    }

    #[tokio::test]
    async fn rollover_is_scoped_to_owner() {
        let store = store().await;
        let alice = user(&store, "alice").await;
        let bob = user(&store, "bob").await;
        let bobs = store.create_plan(bob, &plan("bob", day("2020-01-01")), db_now()).await.unwrap();

        store.mark_missed_plans(alice, day("2024-01-01")).await.unwrap();
        let plans = store.list_plans(bob, day("2020-01-01"), day("2020-01-01")).await.unwrap();
        assert_eq!(plans[0].id, bobs);
        assert_eq!(plans[0].status, PlanStatus::Pending);
    }

    #[tokio::test]
    async fn plans_cannot_be_changed_by_other_users() {
        let store = store().await;
        let alice = user(&store, "alice").await;
        let bob = user(&store, "bob").await;
        let id = store.create_plan(alice, &plan("mine", day("2024-01-01")), db_now()).await.unwrap();

        assert!(!store.set_plan_status(bob, id, PlanStatus::Done).await.unwrap());
        assert!(!store.delete_plan(bob, id).await.unwrap());
        assert!(store.delete_plan(alice, id).await.unwrap());
    }

    #[tokio::test]
    async fn budget_upsert_keeps_one_row_per_category() {
        let store = store().await;
        let uid = user(&store, "alice").await;

        store.upsert_budget(uid, "Food", 10.0, 50.0).await.unwrap();
        store.upsert_budget(uid, "Food", 20.0, 60.0).await.unwrap();

        let budgets = store.list_budgets(uid).await.unwrap();
        assert_eq!(budgets.len(), 1);
        assert_eq!(budgets[0].category, "Food");
        assert_eq!(budgets[0].daily_limit, 20.0);
        assert_eq!(budgets[0].weekly_limit, 60.0);
    }

    #[tokio::test]
    async fn settings_are_created_with_defaults_and_upserted() {
        let store = store().await;
        let uid = user(&store, "alice").await;

        let settings = store.settings(uid).await.unwrap();
        assert_eq!(settings.daily_spend_limit, 0.0);
        assert_eq!(settings.reset_cycle_days, 90);

        store.set_daily_spend_limit(uid, 25.0).await.unwrap();
        store.set_daily_spend_limit(uid, 25.0).await.unwrap();
        store.set_reset_cycle_days(uid, 30).await.unwrap();

        let settings = store.settings(uid).await.unwrap();
        assert_eq!(settings.daily_spend_limit, 25.0);
        assert_eq!(settings.reset_cycle_days, 30);
        let rows = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM settings")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn reflection_upsert_overwrites_same_day() {
        let store = store().await;
        let uid = user(&store, "alice").await;
        let today = day("2024-05-10");
        let input = |mood: &str| ReflectionInput {
            log_date: today,
            mood: mood.to_string(),
            wins: "shipped".to_string(),
            blockers: String::new(),
            gratitude: String::new(),
        };

        store.upsert_reflection(uid, &input("ok"), db_now()).await.unwrap();
        store.upsert_reflection(uid, &input("great"), db_now()).await.unwrap();

        let all = store.list_reflections(uid, today, today).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].mood, "great");
        assert!(store.reflection_on(uid, today).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn habit_logs_accumulate_and_reset() {
        let store = store().await;
        let uid = user(&store, "alice").await;
        let today = day("2024-05-10");
        let habit = store.create_habit(uid, "Water", 3).await.unwrap();

        assert!(store.increment_habit(uid, habit, today).await.unwrap());
        assert!(store.increment_habit(uid, habit, today).await.unwrap());
        let logs = store.habit_logs_between(uid, today, today).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].count, 2);

        assert!(store.reset_habit(uid, habit, today).await.unwrap());
        let logs = store.habit_logs_between(uid, today, today).await.unwrap();
        assert_eq!(logs[0].count, 0);

        let other = user(&store, "bob").await;
        assert!(!store.increment_habit(other, habit, today).await.unwrap());

        assert!(store.delete_habit(uid, habit).await.unwrap());
        assert!(store.habit_logs_between(uid, today, today).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn routine_items_toggle_per_day() {
        let store = store().await;
        let uid = user(&store, "alice").await;
        let today = day("2024-05-10");
        let routine = store.create_routine(uid, "Morning", "morning").await.unwrap();
        let item = store
            .create_routine_item(uid, routine, "Stretch", 0)
            .await
            .unwrap()
            .unwrap();

        assert!(store.toggle_routine_item(uid, item, today).await.unwrap());
        let logs = store.routine_logs_on(uid, today).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert!(logs[0].done);

        assert!(store.toggle_routine_item(uid, item, today).await.unwrap());
        let logs = store.routine_logs_on(uid, today).await.unwrap();
        assert!(!logs[0].done);

        // 别人的例程不能挂条目
        let other = user(&store, "bob").await;
        assert!(store.create_routine_item(other, routine, "x", 0).await.unwrap().is_none());

        assert!(store.delete_routine(uid, routine).await.unwrap());
        assert!(store.list_active_routines(uid).await.unwrap().is_empty());
        assert!(store.routine_logs_on(uid, today).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn weekly_aggregates_group_by_category_and_day() {
        let store = store().await;
        let uid = user(&store, "alice").await;
        let today = day("2024-05-10");
        let entry = |amount: f64, category: &str, spend_date: NaiveDate| NewSpendingEntry {
            amount,
            category: category.to_string(),
            note: "Daily spend".to_string(),
            spend_date,
        };
        store.create_spending(uid, &entry(5.0, "Food", today), db_now()).await.unwrap();
        store.create_spending(uid, &entry(7.5, "Food", today - Duration::days(1)), db_now()).await.unwrap();
        store.create_spending(uid, &entry(3.0, "Travel", today), db_now()).await.unwrap();
        store.create_spending(uid, &entry(100.0, "Food", today - Duration::days(30)), db_now()).await.unwrap();

        let start = today - Duration::days(6);
        let by_category = store.spending_by_category(uid, start, today).await.unwrap();
        assert_eq!(by_category.len(), 2);
        assert_eq!(by_category[0].category, "Food");
        assert_eq!(by_category[0].total, 12.5);

        let by_day = store.spending_by_day(uid, start, today).await.unwrap();
        assert_eq!(by_day.len(), 2);
        assert_eq!(by_day[0].spend_date, today);
        assert_eq!(by_day[0].total, 8.0);

        let habit = store.create_habit(uid, "Read", 1).await.unwrap();
        store.increment_habit(uid, habit, today).await.unwrap();
        store.increment_habit(uid, habit, today - Duration::days(2)).await.unwrap();
        store.create_habit(uid, "Idle", 1).await.unwrap();
        let totals = store.habit_totals(uid, start, today).await.unwrap();
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[0].name, "Read");
        assert_eq!(totals[0].total, 2);
        assert_eq!(totals[1].total, 0);
    }

    #[tokio::test]
    async fn invites_are_single_use() {
        let store = store().await;
        let alice = user(&store, "alice").await;
        let now = db_now();
        store
            .create_invite(alice, "tok", now, now + Duration::days(7))
            .await
            .unwrap();
        assert!(store.find_valid_invite("tok", now).await.unwrap().is_some());

        let invited = NewUser {
            username: "bob".to_string(),
            email: "bob@example.com".to_string(),
            password_hash: "hash".to_string(),
            invite_token: Some("tok".to_string()),
        };
        let bob = store.create_user(&invited, now).await.unwrap();

        assert!(store.find_valid_invite("tok", now).await.unwrap().is_none());
        let used = store.list_used_invites(alice).await.unwrap();
        assert_eq!(used.len(), 1);
        assert_eq!(used[0].used_by.as_deref(), Some("bob"));
        assert!(store.find_user(bob).await.unwrap().is_some());

        // 第二次使用同一令牌：注册整体回滚
        let again = NewUser {
            username: "carol".to_string(),
            email: "carol@example.com".to_string(),
            password_hash: "hash".to_string(),
            invite_token: Some("tok".to_string()),
        };
        assert!(store.create_user(&again, now).await.is_err());
        assert!(store.find_user_by_login("carol").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_invites_and_resets_are_rejected() {
        let store = store().await;
        let alice = user(&store, "alice").await;
        let now = db_now();
        let past = now - Duration::days(8);
        store.create_invite(alice, "old", past, past + Duration::days(7)).await.unwrap();
        assert!(store.find_valid_invite("old", now).await.unwrap().is_none());
        assert!(store.list_active_invites(alice, now).await.unwrap().is_empty());

        store
            .create_password_reset(alice, "reset", now, now + Duration::hours(2))
            .await
            .unwrap();
        let reset = store.find_valid_reset("reset", now).await.unwrap().unwrap();
        store.complete_password_reset(&reset, "new-hash").await.unwrap();
        assert!(store.find_valid_reset("reset", now).await.unwrap().is_none());
        let user = store.find_user(alice).await.unwrap().unwrap();
        assert_eq!(user.password_hash, "new-hash");

        assert!(store
            .find_valid_reset("reset", now + Duration::hours(3))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn legacy_single_user_tables_are_migrated() {
        let store = SqliteStore::in_memory().await.unwrap();
        for statement in [
            "CREATE TABLE plans (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                time_block TEXT NOT NULL DEFAULT '',
                priority INTEGER NOT NULL DEFAULT 2,
                scheduled_date TEXT NOT NULL,
                created_at TEXT NOT NULL,
                status TEXT NOT NULL
            )",
            "INSERT INTO plans (title, scheduled_date, created_at, status)
             VALUES ('legacy', '2020-01-01', '2020-01-01T08:00:00+00:00', 'pending')",
            "CREATE TABLE spending_budgets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                category TEXT NOT NULL UNIQUE,
                daily_limit REAL NOT NULL DEFAULT 0,
                weekly_limit REAL NOT NULL DEFAULT 0
            )",
            "INSERT INTO spending_budgets (category, daily_limit, weekly_limit) VALUES ('Food', 10.0, 50.0)",
        ] {
            sqlx::query(statement).execute(&store.pool).await.unwrap();
        }

        store.migrate().await.unwrap();
        store.migrate().await.unwrap();

        let owner = user(&store, "alice").await;
        assert_eq!(owner, 1);
        let plans = store.list_plans(owner, day("2020-01-01"), day("2020-01-01")).await.unwrap();
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].title, "legacy");
        let budgets = store.list_budgets(owner).await.unwrap();
        assert_eq!(budgets.len(), 1);
        assert_eq!(budgets[0].daily_limit, 10.0);
    }
}
