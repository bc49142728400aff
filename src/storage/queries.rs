// src/storage/queries.rs
//! 两个后端共用的一套 SQL。
//!
//! 语句统一使用 `$n` 编号占位符（PostgreSQL 与 SQLite 都能识别），
//! 日期 / 时间 / 布尔值交给 sqlx 按各自后端编码，因此同一段查询代码可以
//! 直接展开到 `PgStore` 和 `SqliteStore` 上。
//!
//! 调用方模块需要提供：
//! * `async fn migrate_schema(pool) -> StoreResult<()>`：建表与迁移
//! * `async fn sync_user_sequence(tx) -> StoreResult<()>`：显式写入 id 1 之后的序列修正
//! * 对 `models` 中记录类型、`Store`、`StoreResult`、`OWNED_TABLES` 以及 chrono 类型的导入

macro_rules! impl_store {
    ($store:ty) => {
        #[axum::async_trait]
        impl Store for $store {
            async fn migrate(&self) -> StoreResult<()> {
                migrate_schema(&self.pool).await
            }

            // --- 1. 用户 ---

            async fn count_users(&self) -> StoreResult<i64> {
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
                    .fetch_one(&self.pool)
                    .await
            }

            async fn create_user(&self, user: &NewUser, now: DateTime<Utc>) -> StoreResult<i32> {
                let mut tx = self.pool.begin().await?;

                let existing = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
                    .fetch_one(&mut *tx)
                    .await?;

                // 并发注册时两边都可能读到 0：id 1 已被占用则按普通用户插入
                let claimed = existing == 0
                    && sqlx::query(
                        "INSERT INTO users (id, username, email, password_hash, created_at)
                         VALUES (1, $1, $2, $3, $4)
                         ON CONFLICT (id) DO NOTHING",
                    )
                    .bind(&user.username)
                    .bind(&user.email)
                    .bind(&user.password_hash)
                    .bind(now)
                    .execute(&mut *tx)
                    .await?
                    .rows_affected()
                        == 1;

                let user_id = if claimed {
                    sync_user_sequence(&mut tx).await?;

                    // 第一个用户接管单用户时代留下的数据
                    for table in OWNED_TABLES {
                        let sql = format!("UPDATE {table} SET user_id = 1 WHERE user_id IS NULL");
                        sqlx::query(&sql).execute(&mut *tx).await?;
                    }
                    1
                } else {
                    sqlx::query_scalar::<_, i32>(
                        "INSERT INTO users (username, email, password_hash, created_at)
                         VALUES ($1, $2, $3, $4)
                         RETURNING id",
                    )
                    .bind(&user.username)
                    .bind(&user.email)
                    .bind(&user.password_hash)
                    .bind(now)
                    .fetch_one(&mut *tx)
                    .await?
                };

                if let Some(token) = &user.invite_token {
                    let redeemed = sqlx::query(
                        "UPDATE invites SET used_by_user_id = $1
                         WHERE token = $2 AND used_by_user_id IS NULL AND expires_at >= $3",
                    )
                    .bind(user_id)
                    .bind(token)
                    .bind(now)
                    .execute(&mut *tx)
                    .await?;
                    // 邀请在校验之后被别人抢先使用：整个注册回滚
                    if redeemed.rows_affected() == 0 {
                        return Err(sqlx::Error::RowNotFound);
                    }
                }

                tx.commit().await?;
                Ok(user_id)
            }

            async fn find_user(&self, id: i32) -> StoreResult<Option<User>> {
                sqlx::query_as::<_, User>(
                    "SELECT id, username, email, password_hash, created_at FROM users WHERE id = $1",
                )
                .bind(id)
                .fetch_optional(&self.pool)
                .await
            }

            async fn find_user_by_login(&self, login: &str) -> StoreResult<Option<User>> {
                sqlx::query_as::<_, User>(
                    "SELECT id, username, email, password_hash, created_at FROM users
                     WHERE username = $1 OR email = $1
                     ORDER BY id
                     LIMIT 1",
                )
                .bind(login)
                .fetch_optional(&self.pool)
                .await
            }

            async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
                sqlx::query_as::<_, User>(
                    "SELECT id, username, email, password_hash, created_at FROM users
                     WHERE email = $1
                     ORDER BY id
                     LIMIT 1",
                )
                .bind(email)
                .fetch_optional(&self.pool)
                .await
            }

            async fn email_taken(&self, email: &str, except_user: Option<i32>) -> StoreResult<bool> {
                let count = sqlx::query_scalar::<_, i64>(
                    "SELECT COUNT(*) FROM users WHERE email = $1 AND id <> $2",
                )
                .bind(email)
                .bind(except_user.unwrap_or(-1))
                .fetch_one(&self.pool)
                .await?;
                Ok(count > 0)
            }

            async fn update_email(&self, user_id: i32, email: &str) -> StoreResult<()> {
                sqlx::query("UPDATE users SET email = $1 WHERE id = $2")
                    .bind(email)
                    .bind(user_id)
                    .execute(&self.pool)
                    .await?;
                Ok(())
            }

            async fn update_password_hash(&self, user_id: i32, password_hash: &str) -> StoreResult<()> {
                sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2")
                    .bind(password_hash)
                    .bind(user_id)
                    .execute(&self.pool)
                    .await?;
                Ok(())
            }

            // --- 2. 邀请 ---

            async fn create_invite(
                &self,
                inviter: i32,
                token: &str,
                now: DateTime<Utc>,
                expires_at: DateTime<Utc>,
            ) -> StoreResult<()> {
                sqlx::query(
                    "INSERT INTO invites (inviter_user_id, token, created_at, expires_at)
                     VALUES ($1, $2, $3, $4)",
                )
                .bind(inviter)
                .bind(token)
                .bind(now)
                .bind(expires_at)
                .execute(&self.pool)
                .await?;
                Ok(())
            }

            async fn find_valid_invite(
                &self,
                token: &str,
                now: DateTime<Utc>,
            ) -> StoreResult<Option<Invite>> {
                sqlx::query_as::<_, Invite>(
                    "SELECT id, inviter_user_id, token, created_at, expires_at, used_by_user_id
                     FROM invites
                     WHERE token = $1 AND used_by_user_id IS NULL AND expires_at >= $2",
                )
                .bind(token)
                .bind(now)
                .fetch_optional(&self.pool)
                .await
            }

            async fn list_active_invites(
                &self,
                inviter: i32,
                now: DateTime<Utc>,
            ) -> StoreResult<Vec<Invite>> {
                sqlx::query_as::<_, Invite>(
                    "SELECT id, inviter_user_id, token, created_at, expires_at, used_by_user_id
                     FROM invites
                     WHERE inviter_user_id = $1 AND expires_at >= $2 AND used_by_user_id IS NULL
                     ORDER BY created_at DESC",
                )
                .bind(inviter)
                .bind(now)
                .fetch_all(&self.pool)
                .await
            }

            async fn list_used_invites(&self, inviter: i32) -> StoreResult<Vec<UsedInvite>> {
                sqlx::query_as::<_, UsedInvite>(
                    "SELECT i.token, i.created_at, u.username AS used_by
                     FROM invites i
                     LEFT JOIN users u ON u.id = i.used_by_user_id
                     WHERE i.inviter_user_id = $1 AND i.used_by_user_id IS NOT NULL
                     ORDER BY i.created_at DESC",
                )
                .bind(inviter)
                .fetch_all(&self.pool)
                .await
            }

            // --- 3. 重置密码 ---

            async fn create_password_reset(
                &self,
                user_id: i32,
                token: &str,
                now: DateTime<Utc>,
                expires_at: DateTime<Utc>,
            ) -> StoreResult<()> {
                sqlx::query(
                    "INSERT INTO password_resets (user_id, token, created_at, expires_at, used)
                     VALUES ($1, $2, $3, $4, FALSE)",
                )
                .bind(user_id)
                .bind(token)
                .bind(now)
                .bind(expires_at)
                .execute(&self.pool)
                .await?;
                Ok(())
            }

            async fn find_valid_reset(
                &self,
                token: &str,
                now: DateTime<Utc>,
            ) -> StoreResult<Option<PasswordReset>> {
                sqlx::query_as::<_, PasswordReset>(
                    "SELECT id, user_id, token, created_at, expires_at, used
                     FROM password_resets
                     WHERE token = $1 AND used = FALSE AND expires_at >= $2",
                )
                .bind(token)
                .bind(now)
                .fetch_optional(&self.pool)
                .await
            }

            async fn complete_password_reset(
                &self,
                reset: &PasswordReset,
                password_hash: &str,
            ) -> StoreResult<()> {
                let mut tx = self.pool.begin().await?;
                sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2")
                    .bind(password_hash)
                    .bind(reset.user_id)
                    .execute(&mut *tx)
                    .await?;
                sqlx::query("UPDATE password_resets SET used = TRUE WHERE id = $1")
                    .bind(reset.id)
                    .execute(&mut *tx)
                    .await?;
                tx.commit().await?;
                Ok(())
            }

            // --- 4. 计划 ---

            async fn mark_missed_plans(&self, user_id: i32, today: NaiveDate) -> StoreResult<u64> {
                let result = sqlx::query(
                    "UPDATE plans SET status = 'missed'
                     WHERE status = 'pending' AND scheduled_date < $1 AND user_id = $2",
                )
                .bind(today)
                .bind(user_id)
                .execute(&self.pool)
                .await?;
                Ok(result.rows_affected())
            }

            async fn create_plan(
                &self,
                user_id: i32,
                plan: &NewPlan,
                now: DateTime<Utc>,
            ) -> StoreResult<i32> {
                sqlx::query_scalar::<_, i32>(
                    "INSERT INTO plans (user_id, title, time_block, priority, scheduled_date, created_at, status)
                     VALUES ($1, $2, $3, $4, $5, $6, $7)
                     RETURNING id",
                )
                .bind(user_id)
                .bind(&plan.title)
                .bind(&plan.time_block)
                .bind(plan.priority)
                .bind(plan.scheduled_date)
                .bind(now)
                .bind(PlanStatus::Pending.as_str())
                .fetch_one(&self.pool)
                .await
            }

            async fn set_plan_status(
                &self,
                user_id: i32,
                id: i32,
                status: PlanStatus,
            ) -> StoreResult<bool> {
                let result = sqlx::query("UPDATE plans SET status = $1 WHERE id = $2 AND user_id = $3")
                    .bind(status.as_str())
                    .bind(id)
                    .bind(user_id)
                    .execute(&self.pool)
                    .await?;
                Ok(result.rows_affected() > 0)
            }

            async fn delete_plan(&self, user_id: i32, id: i32) -> StoreResult<bool> {
                let result = sqlx::query("DELETE FROM plans WHERE id = $1 AND user_id = $2")
                    .bind(id)
                    .bind(user_id)
                    .execute(&self.pool)
                    .await?;
                Ok(result.rows_affected() > 0)
            }

            async fn list_plans(
                &self,
                user_id: i32,
                from: NaiveDate,
                to: NaiveDate,
            ) -> StoreResult<Vec<Plan>> {
                sqlx::query_as::<_, Plan>(
                    "SELECT id, user_id, title, time_block, priority, scheduled_date, created_at, status
                     FROM plans
                     WHERE scheduled_date BETWEEN $1 AND $2 AND user_id = $3
                     ORDER BY scheduled_date DESC, priority DESC, id ASC",
                )
                .bind(from)
                .bind(to)
                .bind(user_id)
                .fetch_all(&self.pool)
                .await
            }

            async fn plan_status_counts(
                &self,
                user_id: i32,
                from: NaiveDate,
                to: NaiveDate,
            ) -> StoreResult<Vec<StatusCount>> {
                sqlx::query_as::<_, StatusCount>(
                    "SELECT status, COUNT(*) AS count
                     FROM plans
                     WHERE scheduled_date BETWEEN $1 AND $2 AND user_id = $3
                     GROUP BY status",
                )
                .bind(from)
                .bind(to)
                .bind(user_id)
                .fetch_all(&self.pool)
                .await
            }

            // --- 5. 清单 ---

            async fn create_checklist_item(
                &self,
                user_id: i32,
                label: &str,
                scheduled_date: NaiveDate,
                now: DateTime<Utc>,
            ) -> StoreResult<i32> {
                sqlx::query_scalar::<_, i32>(
                    "INSERT INTO checklist_items (user_id, label, scheduled_date, done, created_at)
                     VALUES ($1, $2, $3, FALSE, $4)
                     RETURNING id",
                )
                .bind(user_id)
                .bind(label)
                .bind(scheduled_date)
                .bind(now)
                .fetch_one(&self.pool)
                .await
            }

            async fn toggle_checklist_item(&self, user_id: i32, id: i32) -> StoreResult<bool> {
                let result = sqlx::query(
                    "UPDATE checklist_items SET done = NOT done WHERE id = $1 AND user_id = $2",
                )
                .bind(id)
                .bind(user_id)
                .execute(&self.pool)
                .await?;
                Ok(result.rows_affected() > 0)
            }

            async fn delete_checklist_item(&self, user_id: i32, id: i32) -> StoreResult<bool> {
                let result = sqlx::query("DELETE FROM checklist_items WHERE id = $1 AND user_id = $2")
                    .bind(id)
                    .bind(user_id)
                    .execute(&self.pool)
                    .await?;
                Ok(result.rows_affected() > 0)
            }

            async fn list_checklist(
                &self,
                user_id: i32,
                from: NaiveDate,
                to: NaiveDate,
            ) -> StoreResult<Vec<ChecklistItem>> {
                sqlx::query_as::<_, ChecklistItem>(
                    "SELECT id, user_id, label, scheduled_date, done, created_at
                     FROM checklist_items
                     WHERE scheduled_date BETWEEN $1 AND $2 AND user_id = $3
                     ORDER BY scheduled_date DESC, id ASC",
                )
                .bind(from)
                .bind(to)
                .bind(user_id)
                .fetch_all(&self.pool)
                .await
            }

            // --- 6. 例程 ---

            async fn create_routine(
                &self,
                user_id: i32,
                name: &str,
                time_of_day: &str,
            ) -> StoreResult<i32> {
                sqlx::query_scalar::<_, i32>(
                    "INSERT INTO routines (user_id, name, time_of_day, active)
                     VALUES ($1, $2, $3, TRUE)
                     RETURNING id",
                )
                .bind(user_id)
                .bind(name)
                .bind(time_of_day)
                .fetch_one(&self.pool)
                .await
            }

            async fn create_routine_item(
                &self,
                user_id: i32,
                routine_id: i32,
                label: &str,
                sort_order: i32,
            ) -> StoreResult<Option<i32>> {
                let owned = sqlx::query_scalar::<_, i32>(
                    "SELECT id FROM routines WHERE id = $1 AND user_id = $2",
                )
                .bind(routine_id)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
                if owned.is_none() {
                    return Ok(None);
                }

                let id = sqlx::query_scalar::<_, i32>(
                    "INSERT INTO routine_items (routine_id, user_id, label, sort_order)
                     VALUES ($1, $2, $3, $4)
                     RETURNING id",
                )
                .bind(routine_id)
                .bind(user_id)
                .bind(label)
                .bind(sort_order)
                .fetch_one(&self.pool)
                .await?;
                Ok(Some(id))
            }

            async fn toggle_routine_item(
                &self,
                user_id: i32,
                item_id: i32,
                day: NaiveDate,
            ) -> StoreResult<bool> {
                let owned = sqlx::query_scalar::<_, i32>(
                    "SELECT id FROM routine_items WHERE id = $1 AND user_id = $2",
                )
                .bind(item_id)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
                if owned.is_none() {
                    return Ok(false);
                }

                // 每个条目每天一行；首次点击即为完成
                sqlx::query(
                    "INSERT INTO routine_item_logs (routine_item_id, user_id, log_date, done)
                     VALUES ($1, $2, $3, TRUE)
                     ON CONFLICT (routine_item_id, log_date)
                     DO UPDATE SET done = NOT routine_item_logs.done",
                )
                .bind(item_id)
                .bind(user_id)
                .bind(day)
                .execute(&self.pool)
                .await?;
                Ok(true)
            }

            async fn delete_routine(&self, user_id: i32, id: i32) -> StoreResult<bool> {
                let mut tx = self.pool.begin().await?;
                sqlx::query(
                    "DELETE FROM routine_item_logs
                     WHERE user_id = $2 AND routine_item_id IN
                        (SELECT id FROM routine_items WHERE routine_id = $1 AND user_id = $2)",
                )
                .bind(id)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
                sqlx::query("DELETE FROM routine_items WHERE routine_id = $1 AND user_id = $2")
                    .bind(id)
                    .bind(user_id)
                    .execute(&mut *tx)
                    .await?;
                let result = sqlx::query("DELETE FROM routines WHERE id = $1 AND user_id = $2")
                    .bind(id)
                    .bind(user_id)
                    .execute(&mut *tx)
                    .await?;
                tx.commit().await?;
                Ok(result.rows_affected() > 0)
            }

            async fn list_active_routines(&self, user_id: i32) -> StoreResult<Vec<Routine>> {
                sqlx::query_as::<_, Routine>(
                    "SELECT id, user_id, name, time_of_day, active
                     FROM routines
                     WHERE active = TRUE AND user_id = $1
                     ORDER BY time_of_day, name",
                )
                .bind(user_id)
                .fetch_all(&self.pool)
                .await
            }

            async fn list_active_routine_items(&self, user_id: i32) -> StoreResult<Vec<RoutineItem>> {
                sqlx::query_as::<_, RoutineItem>(
                    "SELECT ri.id, ri.routine_id, ri.user_id, ri.label, ri.sort_order
                     FROM routine_items ri
                     JOIN routines r ON r.id = ri.routine_id
                     WHERE r.active = TRUE AND r.user_id = $1 AND ri.user_id = $1
                     ORDER BY ri.sort_order, ri.id",
                )
                .bind(user_id)
                .fetch_all(&self.pool)
                .await
            }

            async fn routine_logs_on(
                &self,
                user_id: i32,
                day: NaiveDate,
            ) -> StoreResult<Vec<RoutineItemLog>> {
                sqlx::query_as::<_, RoutineItemLog>(
                    "SELECT routine_item_id, log_date, done
                     FROM routine_item_logs
                     WHERE log_date = $1 AND user_id = $2",
                )
                .bind(day)
                .bind(user_id)
                .fetch_all(&self.pool)
                .await
            }

            async fn routine_completion_totals(
                &self,
                user_id: i32,
                from: NaiveDate,
                to: NaiveDate,
            ) -> StoreResult<Vec<NamedTotal>> {
                sqlx::query_as::<_, NamedTotal>(
                    "SELECT r.name AS name,
                            COALESCE(SUM(CASE WHEN ril.done THEN 1 ELSE 0 END), 0) AS total
                     FROM routines r
                     LEFT JOIN routine_items ri ON r.id = ri.routine_id
                     LEFT JOIN routine_item_logs ril ON ri.id = ril.routine_item_id
                        AND ril.log_date BETWEEN $1 AND $2 AND ril.user_id = $3
                     WHERE r.active = TRUE AND r.user_id = $3
                     GROUP BY r.id, r.name
                     ORDER BY total DESC, r.name",
                )
                .bind(from)
                .bind(to)
                .bind(user_id)
                .fetch_all(&self.pool)
                .await
            }

            // --- 7. 习惯 ---

            async fn create_habit(
                &self,
                user_id: i32,
                name: &str,
                target_count: i32,
            ) -> StoreResult<i32> {
                sqlx::query_scalar::<_, i32>(
                    "INSERT INTO habits (user_id, name, target_count, active)
                     VALUES ($1, $2, $3, TRUE)
                     RETURNING id",
                )
                .bind(user_id)
                .bind(name)
                .bind(target_count)
                .fetch_one(&self.pool)
                .await
            }

            async fn increment_habit(
                &self,
                user_id: i32,
                habit_id: i32,
                day: NaiveDate,
            ) -> StoreResult<bool> {
                let owned = sqlx::query_scalar::<_, i32>(
                    "SELECT id FROM habits WHERE id = $1 AND user_id = $2",
                )
                .bind(habit_id)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
                if owned.is_none() {
                    return Ok(false);
                }

                sqlx::query(
                    "INSERT INTO habit_logs (habit_id, user_id, log_date, count)
                     VALUES ($1, $2, $3, 1)
                     ON CONFLICT (habit_id, log_date)
                     DO UPDATE SET count = habit_logs.count + 1",
                )
                .bind(habit_id)
                .bind(user_id)
                .bind(day)
                .execute(&self.pool)
                .await?;
                Ok(true)
            }

            async fn reset_habit(
                &self,
                user_id: i32,
                habit_id: i32,
                day: NaiveDate,
            ) -> StoreResult<bool> {
                let owned = sqlx::query_scalar::<_, i32>(
                    "SELECT id FROM habits WHERE id = $1 AND user_id = $2",
                )
                .bind(habit_id)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
                if owned.is_none() {
                    return Ok(false);
                }

                sqlx::query(
                    "INSERT INTO habit_logs (habit_id, user_id, log_date, count)
                     VALUES ($1, $2, $3, 0)
                     ON CONFLICT (habit_id, log_date)
                     DO UPDATE SET count = 0",
                )
                .bind(habit_id)
                .bind(user_id)
                .bind(day)
                .execute(&self.pool)
                .await?;
                Ok(true)
            }

            async fn delete_habit(&self, user_id: i32, id: i32) -> StoreResult<bool> {
                let mut tx = self.pool.begin().await?;
                sqlx::query("DELETE FROM habit_logs WHERE habit_id = $1 AND user_id = $2")
                    .bind(id)
                    .bind(user_id)
                    .execute(&mut *tx)
                    .await?;
                let result = sqlx::query("DELETE FROM habits WHERE id = $1 AND user_id = $2")
                    .bind(id)
                    .bind(user_id)
                    .execute(&mut *tx)
                    .await?;
                tx.commit().await?;
                Ok(result.rows_affected() > 0)
            }

            async fn list_active_habits(&self, user_id: i32) -> StoreResult<Vec<Habit>> {
                sqlx::query_as::<_, Habit>(
                    "SELECT id, user_id, name, target_count, active
                     FROM habits
                     WHERE active = TRUE AND user_id = $1
                     ORDER BY id ASC",
                )
                .bind(user_id)
                .fetch_all(&self.pool)
                .await
            }

            async fn habit_logs_between(
                &self,
                user_id: i32,
                from: NaiveDate,
                to: NaiveDate,
            ) -> StoreResult<Vec<HabitLog>> {
                sqlx::query_as::<_, HabitLog>(
                    "SELECT habit_id, log_date, count
                     FROM habit_logs
                     WHERE log_date BETWEEN $1 AND $2 AND user_id = $3",
                )
                .bind(from)
                .bind(to)
                .bind(user_id)
                .fetch_all(&self.pool)
                .await
            }

            async fn habit_totals(
                &self,
                user_id: i32,
                from: NaiveDate,
                to: NaiveDate,
            ) -> StoreResult<Vec<NamedTotal>> {
                sqlx::query_as::<_, NamedTotal>(
                    "SELECT h.name AS name, COALESCE(SUM(hl.count), 0) AS total
                     FROM habits h
                     LEFT JOIN habit_logs hl ON h.id = hl.habit_id
                        AND hl.log_date BETWEEN $1 AND $2 AND hl.user_id = $3
                     WHERE h.active = TRUE AND h.user_id = $3
                     GROUP BY h.id, h.name
                     ORDER BY total DESC, h.name",
                )
                .bind(from)
                .bind(to)
                .bind(user_id)
                .fetch_all(&self.pool)
                .await
            }

            // --- 8. 消费 / 预算 ---

            async fn create_spending(
                &self,
                user_id: i32,
                entry: &NewSpendingEntry,
                now: DateTime<Utc>,
            ) -> StoreResult<i32> {
                sqlx::query_scalar::<_, i32>(
                    "INSERT INTO spending_entries (user_id, amount, category, note, spend_date, created_at)
                     VALUES ($1, $2, $3, $4, $5, $6)
                     RETURNING id",
                )
                .bind(user_id)
                .bind(entry.amount)
                .bind(&entry.category)
                .bind(&entry.note)
                .bind(entry.spend_date)
                .bind(now)
                .fetch_one(&self.pool)
                .await
            }

            async fn delete_spending(&self, user_id: i32, id: i32) -> StoreResult<bool> {
                let result = sqlx::query("DELETE FROM spending_entries WHERE id = $1 AND user_id = $2")
                    .bind(id)
                    .bind(user_id)
                    .execute(&self.pool)
                    .await?;
                Ok(result.rows_affected() > 0)
            }

            async fn list_spending(
                &self,
                user_id: i32,
                from: NaiveDate,
                to: NaiveDate,
            ) -> StoreResult<Vec<SpendingEntry>> {
                sqlx::query_as::<_, SpendingEntry>(
                    "SELECT id, user_id, amount, category, note, spend_date, created_at
                     FROM spending_entries
                     WHERE spend_date BETWEEN $1 AND $2 AND user_id = $3
                     ORDER BY spend_date DESC, created_at DESC, id DESC",
                )
                .bind(from)
                .bind(to)
                .bind(user_id)
                .fetch_all(&self.pool)
                .await
            }

            async fn spending_by_category(
                &self,
                user_id: i32,
                from: NaiveDate,
                to: NaiveDate,
            ) -> StoreResult<Vec<CategoryTotal>> {
                sqlx::query_as::<_, CategoryTotal>(
                    "SELECT category, SUM(amount) AS total
                     FROM spending_entries
                     WHERE spend_date BETWEEN $1 AND $2 AND user_id = $3
                     GROUP BY category
                     ORDER BY total DESC, category",
                )
                .bind(from)
                .bind(to)
                .bind(user_id)
                .fetch_all(&self.pool)
                .await
            }

            async fn spending_by_day(
                &self,
                user_id: i32,
                from: NaiveDate,
                to: NaiveDate,
            ) -> StoreResult<Vec<DayTotal>> {
                sqlx::query_as::<_, DayTotal>(
                    "SELECT spend_date, SUM(amount) AS total
                     FROM spending_entries
                     WHERE spend_date BETWEEN $1 AND $2 AND user_id = $3
                     GROUP BY spend_date
                     ORDER BY spend_date DESC",
                )
                .bind(from)
                .bind(to)
                .bind(user_id)
                .fetch_all(&self.pool)
                .await
            }

            async fn upsert_budget(
                &self,
                user_id: i32,
                category: &str,
                daily: f64,
                weekly: f64,
            ) -> StoreResult<()> {
                sqlx::query(
                    "INSERT INTO spending_budgets (user_id, category, daily_limit, weekly_limit)
                     VALUES ($1, $2, $3, $4)
                     ON CONFLICT (user_id, category) DO UPDATE SET
                        daily_limit = excluded.daily_limit,
                        weekly_limit = excluded.weekly_limit",
                )
                .bind(user_id)
                .bind(category)
                .bind(daily)
                .bind(weekly)
                .execute(&self.pool)
                .await?;
                Ok(())
            }

            async fn delete_budget(&self, user_id: i32, id: i32) -> StoreResult<bool> {
                let result = sqlx::query("DELETE FROM spending_budgets WHERE id = $1 AND user_id = $2")
                    .bind(id)
                    .bind(user_id)
                    .execute(&self.pool)
                    .await?;
                Ok(result.rows_affected() > 0)
            }

            async fn list_budgets(&self, user_id: i32) -> StoreResult<Vec<SpendingBudget>> {
                sqlx::query_as::<_, SpendingBudget>(
                    "SELECT id, user_id, category, daily_limit, weekly_limit
                     FROM spending_budgets
                     WHERE user_id = $1
                     ORDER BY category",
                )
                .bind(user_id)
                .fetch_all(&self.pool)
                .await
            }

            // --- 9. 设置 / 每日复盘 ---

            async fn settings(&self, user_id: i32) -> StoreResult<Settings> {
                sqlx::query(
                    "INSERT INTO settings (user_id, daily_spend_limit, reset_cycle_days)
                     VALUES ($1, $2, $3)
                     ON CONFLICT (user_id) DO NOTHING",
                )
                .bind(user_id)
                .bind(0.0_f64)
                .bind(crate::planner::DEFAULT_CYCLE_DAYS)
                .execute(&self.pool)
                .await?;

                sqlx::query_as::<_, Settings>(
                    "SELECT user_id, daily_spend_limit, reset_cycle_days
                     FROM settings
                     WHERE user_id = $1",
                )
                .bind(user_id)
                .fetch_one(&self.pool)
                .await
            }

            async fn set_daily_spend_limit(&self, user_id: i32, limit: f64) -> StoreResult<()> {
                sqlx::query(
                    "INSERT INTO settings (user_id, daily_spend_limit, reset_cycle_days)
                     VALUES ($1, $2, $3)
                     ON CONFLICT (user_id) DO UPDATE SET
                        daily_spend_limit = excluded.daily_spend_limit",
                )
                .bind(user_id)
                .bind(limit)
                .bind(crate::planner::DEFAULT_CYCLE_DAYS)
                .execute(&self.pool)
                .await?;
                Ok(())
            }

            async fn set_reset_cycle_days(&self, user_id: i32, days: i32) -> StoreResult<()> {
                sqlx::query(
                    "INSERT INTO settings (user_id, daily_spend_limit, reset_cycle_days)
                     VALUES ($1, $2, $3)
                     ON CONFLICT (user_id) DO UPDATE SET
                        reset_cycle_days = excluded.reset_cycle_days",
                )
                .bind(user_id)
                .bind(0.0_f64)
                .bind(days)
                .execute(&self.pool)
                .await?;
                Ok(())
            }

            async fn upsert_reflection(
                &self,
                user_id: i32,
                input: &ReflectionInput,
                now: DateTime<Utc>,
            ) -> StoreResult<()> {
                sqlx::query(
                    "INSERT INTO daily_reflections (user_id, log_date, mood, wins, blockers, gratitude, created_at)
                     VALUES ($1, $2, $3, $4, $5, $6, $7)
                     ON CONFLICT (user_id, log_date) DO UPDATE SET
                        mood = excluded.mood,
                        wins = excluded.wins,
                        blockers = excluded.blockers,
                        gratitude = excluded.gratitude",
                )
                .bind(user_id)
                .bind(input.log_date)
                .bind(&input.mood)
                .bind(&input.wins)
                .bind(&input.blockers)
                .bind(&input.gratitude)
                .bind(now)
                .execute(&self.pool)
                .await?;
                Ok(())
            }

            async fn reflection_on(
                &self,
                user_id: i32,
                day: NaiveDate,
            ) -> StoreResult<Option<DailyReflection>> {
                sqlx::query_as::<_, DailyReflection>(
                    "SELECT user_id, log_date, mood, wins, blockers, gratitude, created_at
                     FROM daily_reflections
                     WHERE log_date = $1 AND user_id = $2",
                )
                .bind(day)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await
            }

            async fn list_reflections(
                &self,
                user_id: i32,
                from: NaiveDate,
                to: NaiveDate,
            ) -> StoreResult<Vec<DailyReflection>> {
                sqlx::query_as::<_, DailyReflection>(
                    "SELECT user_id, log_date, mood, wins, blockers, gratitude, created_at
                     FROM daily_reflections
                     WHERE log_date BETWEEN $1 AND $2 AND user_id = $3
                     ORDER BY log_date DESC",
                )
                .bind(from)
                .bind(to)
                .bind(user_id)
                .fetch_all(&self.pool)
                .await
            }

            async fn overview_stats(&self, user_id: i32) -> StoreResult<OverviewStats> {
                let mut counts = [0_i64; 5];
                let tables = ["plans", "checklist_items", "habits", "routines", "spending_entries"];
                for (slot, table) in counts.iter_mut().zip(tables) {
                    let sql = format!("SELECT COUNT(*) FROM {table} WHERE user_id = $1");
                    *slot = sqlx::query_scalar::<_, i64>(&sql)
                        .bind(user_id)
                        .fetch_one(&self.pool)
                        .await?;
                }
                let [plans, checklist, habits, routines, spending_entries] = counts;
                Ok(OverviewStats {
                    plans,
                    checklist,
                    habits,
                    routines,
                    spending_entries,
                })
            }
        }
    };
}
