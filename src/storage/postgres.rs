// src/storage/postgres.rs
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};

use super::{Store, StoreResult, OWNED_TABLES};
use crate::models::*;

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }
}

impl_store!(PgStore);

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id SERIAL PRIMARY KEY,
        username TEXT NOT NULL UNIQUE,
        email TEXT NOT NULL DEFAULT '',
        password_hash TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS invites (
        id SERIAL PRIMARY KEY,
        inviter_user_id INTEGER NOT NULL,
        token TEXT NOT NULL UNIQUE,
        created_at TIMESTAMPTZ NOT NULL,
        expires_at TIMESTAMPTZ NOT NULL,
        used_by_user_id INTEGER
    )",
    "CREATE TABLE IF NOT EXISTS password_resets (
        id SERIAL PRIMARY KEY,
        user_id INTEGER NOT NULL,
        token TEXT NOT NULL UNIQUE,
        created_at TIMESTAMPTZ NOT NULL,
        expires_at TIMESTAMPTZ NOT NULL,
        used BOOLEAN NOT NULL DEFAULT FALSE
    )",
    "CREATE TABLE IF NOT EXISTS plans (
        id SERIAL PRIMARY KEY,
        user_id INTEGER NOT NULL,
        title TEXT NOT NULL,
        time_block TEXT NOT NULL DEFAULT '',
        priority INTEGER NOT NULL DEFAULT 2,
        scheduled_date DATE NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        status TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS checklist_items (
        id SERIAL PRIMARY KEY,
        user_id INTEGER NOT NULL,
        label TEXT NOT NULL,
        scheduled_date DATE NOT NULL,
        done BOOLEAN NOT NULL DEFAULT FALSE,
        created_at TIMESTAMPTZ NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS routines (
        id SERIAL PRIMARY KEY,
        user_id INTEGER NOT NULL,
        name TEXT NOT NULL,
        time_of_day TEXT NOT NULL,
        active BOOLEAN NOT NULL DEFAULT TRUE
    )",
    "CREATE TABLE IF NOT EXISTS routine_items (
        id SERIAL PRIMARY KEY,
        routine_id INTEGER NOT NULL REFERENCES routines (id),
        user_id INTEGER NOT NULL,
        label TEXT NOT NULL,
        sort_order INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE TABLE IF NOT EXISTS routine_item_logs (
        id SERIAL PRIMARY KEY,
        routine_item_id INTEGER NOT NULL REFERENCES routine_items (id),
        user_id INTEGER NOT NULL,
        log_date DATE NOT NULL,
        done BOOLEAN NOT NULL DEFAULT FALSE,
        UNIQUE (routine_item_id, log_date)
    )",
    "CREATE TABLE IF NOT EXISTS habits (
        id SERIAL PRIMARY KEY,
        user_id INTEGER NOT NULL,
        name TEXT NOT NULL,
        target_count INTEGER NOT NULL DEFAULT 1,
        active BOOLEAN NOT NULL DEFAULT TRUE
    )",
    "CREATE TABLE IF NOT EXISTS habit_logs (
        id SERIAL PRIMARY KEY,
        habit_id INTEGER NOT NULL REFERENCES habits (id),
        user_id INTEGER NOT NULL,
        log_date DATE NOT NULL,
        count INTEGER NOT NULL DEFAULT 0,
        UNIQUE (habit_id, log_date)
    )",
    "CREATE TABLE IF NOT EXISTS spending_entries (
        id SERIAL PRIMARY KEY,
        user_id INTEGER NOT NULL,
        amount DOUBLE PRECISION NOT NULL,
        category TEXT NOT NULL,
        note TEXT NOT NULL,
        spend_date DATE NOT NULL,
        created_at TIMESTAMPTZ NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS spending_budgets (
        id SERIAL PRIMARY KEY,
        user_id INTEGER NOT NULL,
        category TEXT NOT NULL,
        daily_limit DOUBLE PRECISION NOT NULL DEFAULT 0,
        weekly_limit DOUBLE PRECISION NOT NULL DEFAULT 0,
        UNIQUE (user_id, category)
    )",
    "CREATE TABLE IF NOT EXISTS settings (
        id SERIAL PRIMARY KEY,
        user_id INTEGER NOT NULL UNIQUE,
        daily_spend_limit DOUBLE PRECISION NOT NULL DEFAULT 0,
        reset_cycle_days INTEGER NOT NULL DEFAULT 90
    )",
    "CREATE TABLE IF NOT EXISTS daily_reflections (
        user_id INTEGER NOT NULL,
        log_date DATE NOT NULL,
        mood TEXT NOT NULL DEFAULT '',
        wins TEXT NOT NULL DEFAULT '',
        blockers TEXT NOT NULL DEFAULT '',
        gratitude TEXT NOT NULL DEFAULT '',
        created_at TIMESTAMPTZ NOT NULL,
        PRIMARY KEY (user_id, log_date)
    )",
];

/// 建表 + 增量迁移（均可重复执行）
async fn migrate_schema(pool: &PgPool) -> StoreResult<()> {
    let mut tx = pool.begin().await?;

    for statement in SCHEMA {
        sqlx::query(statement).execute(&mut *tx).await?;
    }

    sqlx::query("ALTER TABLE users ADD COLUMN IF NOT EXISTS email TEXT NOT NULL DEFAULT ''")
        .execute(&mut *tx)
        .await?;
    sqlx::query("UPDATE users SET email = username WHERE email = '' AND username LIKE '%@%'")
        .execute(&mut *tx)
        .await?;
    sqlx::query(
        "ALTER TABLE settings ADD COLUMN IF NOT EXISTS reset_cycle_days INTEGER NOT NULL DEFAULT 90",
    )
    .execute(&mut *tx)
    .await?;

    // 单用户时代的表没有 user_id 列，统一归属到 1 号用户
    for table in OWNED_TABLES {
        let sql =
            format!("ALTER TABLE {table} ADD COLUMN IF NOT EXISTS user_id INTEGER NOT NULL DEFAULT 1");
        sqlx::query(&sql).execute(&mut *tx).await?;
    }

    for column in LEGACY_COLUMNS {
        convert_column(&mut tx, column).await?;
    }

    tx.commit().await?;
    tracing::info!("PostgreSQL schema 已就绪");
    Ok(())
}

/// 旧版数据库把日期 / 时间存成 TEXT，布尔值存成 INTEGER，金额存成 REAL
#[derive(Clone, Copy)]
struct LegacyColumn {
    table: &'static str,
    column: &'static str,
    kind: ColumnKind,
}

#[derive(Clone, Copy)]
enum ColumnKind {
    Date,
    Timestamp,
    Flag { default: bool },
    Amount,
}

impl ColumnKind {
    /// information_schema.columns.data_type 中的名称
    fn data_type(self) -> &'static str {
        match self {
            ColumnKind::Date => "date",
            ColumnKind::Timestamp => "timestamp with time zone",
            ColumnKind::Flag { .. } => "boolean",
            ColumnKind::Amount => "double precision",
        }
    }

    fn using(self, column: &str) -> String {
        match self {
            ColumnKind::Date => {
                format!("COALESCE(NULLIF(btrim({column}::text), '')::date, CURRENT_DATE)")
            }
            ColumnKind::Timestamp => {
                format!("COALESCE(NULLIF(btrim({column}::text), '')::timestamptz, now())")
            }
            ColumnKind::Flag { .. } => {
                format!("lower(btrim({column}::text)) NOT IN ('0', 'f', 'false', '')")
            }
            ColumnKind::Amount => format!("{column}::double precision"),
        }
    }

    fn default(self) -> Option<&'static str> {
        match self {
            ColumnKind::Flag { default: true } => Some("TRUE"),
            ColumnKind::Flag { default: false } => Some("FALSE"),
            ColumnKind::Amount => Some("0"),
            ColumnKind::Date | ColumnKind::Timestamp => None,
        }
    }
}

const fn legacy(table: &'static str, column: &'static str, kind: ColumnKind) -> LegacyColumn {
    LegacyColumn { table, column, kind }
}

const LEGACY_COLUMNS: &[LegacyColumn] = &[
    legacy("users", "created_at", ColumnKind::Timestamp),
    legacy("invites", "created_at", ColumnKind::Timestamp),
    legacy("invites", "expires_at", ColumnKind::Timestamp),
    legacy("password_resets", "created_at", ColumnKind::Timestamp),
    legacy("password_resets", "expires_at", ColumnKind::Timestamp),
    legacy("password_resets", "used", ColumnKind::Flag { default: false }),
    legacy("plans", "scheduled_date", ColumnKind::Date),
    legacy("plans", "created_at", ColumnKind::Timestamp),
    legacy("checklist_items", "scheduled_date", ColumnKind::Date),
    legacy("checklist_items", "done", ColumnKind::Flag { default: false }),
    legacy("checklist_items", "created_at", ColumnKind::Timestamp),
    legacy("routines", "active", ColumnKind::Flag { default: true }),
    legacy("routine_item_logs", "log_date", ColumnKind::Date),
    legacy("routine_item_logs", "done", ColumnKind::Flag { default: false }),
    legacy("habits", "active", ColumnKind::Flag { default: true }),
    legacy("habit_logs", "log_date", ColumnKind::Date),
    legacy("spending_entries", "amount", ColumnKind::Amount),
    legacy("spending_entries", "spend_date", ColumnKind::Date),
    legacy("spending_entries", "created_at", ColumnKind::Timestamp),
    legacy("spending_budgets", "daily_limit", ColumnKind::Amount),
    legacy("spending_budgets", "weekly_limit", ColumnKind::Amount),
    legacy("settings", "daily_spend_limit", ColumnKind::Amount),
    legacy("daily_reflections", "log_date", ColumnKind::Date),
    legacy("daily_reflections", "created_at", ColumnKind::Timestamp),
];

/// 列类型与预期不一致时原地转换；已是目标类型则跳过
async fn convert_column(
    tx: &mut Transaction<'_, Postgres>,
    target: &LegacyColumn,
) -> StoreResult<()> {
    let LegacyColumn { table, column, kind } = *target;
    let current = sqlx::query_scalar::<_, String>(
        "SELECT data_type::text FROM information_schema.columns
         WHERE table_schema::text = current_schema()
           AND table_name::text = $1
           AND column_name::text = $2",
    )
    .bind(table)
    .bind(column)
    .fetch_optional(&mut **tx)
    .await?;

    let Some(current) = current else {
        return Ok(());
    };
    if current == kind.data_type() {
        return Ok(());
    }

    tracing::info!("转换旧版列 {}.{}: {} -> {}", table, column, current, kind.data_type());
    // 旧默认值（如 INTEGER 0）无法直接转换成新类型，先去掉再重设
    let mut statements = vec![
        format!("ALTER TABLE {table} ALTER COLUMN {column} DROP DEFAULT"),
        format!(
            "ALTER TABLE {table} ALTER COLUMN {column} TYPE {} USING {}",
            kind.data_type(),
            kind.using(column),
        ),
    ];
    if let Some(default) = kind.default() {
        statements.push(format!(
            "ALTER TABLE {table} ALTER COLUMN {column} SET DEFAULT {default}"
        ));
    }
    for sql in statements {
        sqlx::query(&sql).execute(&mut **tx).await?;
    }
    Ok(())
}

/// 显式插入 id = 1 不会推进 SERIAL 序列，这里手动对齐，避免下一个用户撞主键
async fn sync_user_sequence(tx: &mut Transaction<'_, Postgres>) -> StoreResult<()> {
    sqlx::query(
        "SELECT setval(pg_get_serial_sequence('users', 'id'), (SELECT MAX(id) FROM users))",
    )
    .execute(&mut **tx)
    .await?;
    Ok(())
}
