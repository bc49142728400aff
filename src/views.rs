// src/views.rs
//! 服务端渲染的 HTML 页面。所有用户输入在输出前都经过 `escape`。
use crate::models::{Invite, OverviewStats, PlanStatus, UsedInvite};
use crate::planner::{Dashboard, WeeklyReview, MAX_CYCLE_DAYS, MIN_CYCLE_DAYS};

pub const STYLES: &str = include_str!("../static/styles.css");

const APP_NAME: &str = "Daily Planner Studio";

pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(ch),
        }
    }
    out
}

fn money(amount: f64) -> String {
    format!("{amount:.2}")
}

// --- 1. 页面骨架 ---

/// `user` 为当前登录用户名；未登录时导航栏只显示登录 / 注册
fn layout(title: &str, user: Option<&str>, body: &str) -> String {
    let nav = match user {
        Some(name) => format!(
            r#"<a href="/">Today</a>
      <a href="/review">Weekly review</a>
      <a href="/about">About</a>
      <a href="/invites">Invites</a>
      <a href="/account">{name}</a>
      <form method="post" action="/logout" class="inline"><button type="submit" class="link">Log out</button></form>"#,
            name = escape(name),
        ),
        None => r#"<a href="/login">Log in</a>
      <a href="/register">Register</a>"#
            .to_string(),
    };

    format!(
        r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>{title} · {app}</title>
  <link rel="stylesheet" href="/styles.css">
</head>
<body>
  <header class="topbar">
    <span class="brand">{app}</span>
    <nav>
      {nav}
    </nav>
  </header>
  <main>
{body}
  </main>
</body>
</html>"#,
        title = escape(title),
        app = APP_NAME,
    )
}

fn alert(class: &str, text: &str) -> String {
    if text.is_empty() {
        String::new()
    } else {
        format!(r#"<p class="alert {class}">{}</p>"#, escape(text))
    }
}

fn post_button(action: &str, label: &str, class: &str) -> String {
    format!(
        r#"<form method="post" action="{action}" class="inline"><button type="submit" class="{class}">{label}</button></form>"#
    )
}

// --- 2. 首页 ---

pub fn dashboard(username: &str, d: &Dashboard) -> String {
    let mut body = String::new();

    body.push_str(&format!(
        r#"<section class="summary">
  <h1>Today · {today}</h1>
  <ul class="stats">
    <li><strong>{done}</strong> done · <strong>{pending}</strong> pending · <strong>{missed}</strong> missed plans</li>
    <li><strong>{check_done}/{check_total}</strong> checklist items</li>
    <li><strong>{hit}/{habit_total}</strong> habits on target</li>
    <li><strong>{r_done}/{r_total}</strong> routine steps</li>
    <li><strong>{spent_today}</strong> spent today · <strong>{spent_window}</strong> in the last {cycle} days</li>
  </ul>
</section>
"#,
        today = d.today,
        done = d.plan_counts.done,
        pending = d.plan_counts.pending,
        missed = d.plan_counts.missed,
        check_done = d.checklist_done,
        check_total = d.checklist.len(),
        hit = d.habits_hit,
        habit_total = d.habits.len(),
        r_done = d.routine_items_done,
        r_total = d.routine_items_total,
        spent_today = money(d.spend_total_today),
        spent_window = money(d.spend_total),
        cycle = d.cycle_days,
    ));

    body.push_str(&plans_section(d));
    body.push_str(&checklist_section(d));
    body.push_str(&routines_section(d));
    body.push_str(&habits_section(d));
    body.push_str(&spending_section(d));
    body.push_str(&settings_section(d));
    body.push_str(&reflection_section(d));

    layout("Today", Some(username), &body)
}

fn plans_section(d: &Dashboard) -> String {
    let mut rows = String::new();
    for plan in &d.plans {
        let toggle = match plan.status {
            PlanStatus::Done => post_button(&format!("/plan/reopen/{}", plan.id), "Reopen", "secondary"),
            _ => post_button(&format!("/plan/complete/{}", plan.id), "Done", "primary"),
        };
        rows.push_str(&format!(
            r#"<li class="plan {status}">
  <span class="date">{date}</span>
  <span class="block">{block}</span>
  <span class="title">{title}</span>
  <span class="priority">P{priority}</span>
  <span class="status">{status}</span>
  {toggle}
  {delete}
</li>
"#,
            status = plan.status,
            date = plan.scheduled_date,
            block = escape(&plan.time_block),
            title = escape(&plan.title),
            priority = plan.priority,
            delete = post_button(&format!("/plan/delete/{}", plan.id), "Delete", "danger"),
        ));
    }
    if rows.is_empty() {
        rows.push_str(r#"<li class="empty">No plans yet.</li>"#);
    }

    format!(
        r#"<section class="card" id="plans">
  <h2>Plans</h2>
  <form method="post" action="/plan/add" class="row">
    <input name="title" placeholder="What needs doing?" required>
    <input name="time_block" placeholder="Time block (e.g. 09:00-10:00)">
    <select name="priority">
      <option value="1">Low</option>
      <option value="2" selected>Normal</option>
      <option value="3">High</option>
    </select>
    <input type="date" name="scheduled_date" value="{today}">
    <button type="submit">Add plan</button>
  </form>
  <ul class="list">
{rows}  </ul>
</section>
"#,
        today = d.today,
    )
}

fn checklist_section(d: &Dashboard) -> String {
    let mut rows = String::new();
    for item in &d.checklist {
        rows.push_str(&format!(
            r#"<li class="{class}">
  <span class="date">{date}</span>
  <span class="label">{label}</span>
  {toggle}
  {delete}
</li>
"#,
            class = if item.done { "done" } else { "open" },
            date = item.scheduled_date,
            label = escape(&item.label),
            toggle = post_button(
                &format!("/checklist/toggle/{}", item.id),
                if item.done { "Undo" } else { "Check" },
                "secondary",
            ),
            delete = post_button(&format!("/checklist/delete/{}", item.id), "Delete", "danger"),
        ));
    }
    if rows.is_empty() {
        rows.push_str(r#"<li class="empty">Nothing on the checklist.</li>"#);
    }

    format!(
        r#"<section class="card" id="checklist">
  <h2>Checklist</h2>
  <form method="post" action="/checklist/add" class="row">
    <input name="label" placeholder="Checklist item" required>
    <input type="date" name="scheduled_date" value="{today}">
    <button type="submit">Add</button>
  </form>
  <ul class="list">
{rows}  </ul>
</section>
"#,
        today = d.today,
    )
}

fn routines_section(d: &Dashboard) -> String {
    let mut groups = String::new();
    let mut options = String::new();
    for group in &d.routines {
        let routine = &group.routine;
        options.push_str(&format!(
            r#"<option value="{}">{}</option>"#,
            routine.id,
            escape(&routine.name)
        ));

        let mut items = String::new();
        for state in &group.items {
            items.push_str(&format!(
                r#"<li class="{class}">{label} {toggle}</li>
"#,
                class = if state.done { "done" } else { "open" },
                label = escape(&state.item.label),
                toggle = post_button(
                    &format!("/routine-items/toggle/{}", state.item.id),
                    if state.done { "Undo" } else { "Done" },
                    "secondary",
                ),
            ));
        }
        groups.push_str(&format!(
            r#"<div class="routine">
  <h3>{name} <small>{tod}</small> {delete}</h3>
  <ul class="list">
{items}  </ul>
</div>
"#,
            name = escape(&routine.name),
            tod = escape(&routine.time_of_day),
            delete = post_button(&format!("/routines/delete/{}", routine.id), "Delete", "danger"),
        ));
    }
    if groups.is_empty() {
        groups.push_str(r#"<p class="empty">No routines yet.</p>"#);
    }

    format!(
        r#"<section class="card" id="routines">
  <h2>Routines</h2>
  <form method="post" action="/routines/add" class="row">
    <input name="name" placeholder="Routine name" required>
    <select name="time_of_day">
      <option value="any">Any time</option>
      <option value="morning">Morning</option>
      <option value="afternoon">Afternoon</option>
      <option value="evening">Evening</option>
    </select>
    <button type="submit">Add routine</button>
  </form>
  <form method="post" action="/routine-items/add" class="row">
    <select name="routine_id">{options}</select>
    <input name="label" placeholder="Step" required>
    <input type="number" name="sort_order" value="0">
    <button type="submit">Add step</button>
  </form>
{groups}</section>
"#
    )
}

fn habits_section(d: &Dashboard) -> String {
    let mut rows = String::new();
    for progress in &d.habits {
        let habit = &progress.habit;
        rows.push_str(&format!(
            r#"<li class="{class}">
  <span class="label">{name}</span>
  <span class="count">{count}/{target}</span>
  <span class="streak">{streak}-day streak</span>
  {log}
  {reset}
  {delete}
</li>
"#,
            class = if progress.hit() { "done" } else { "open" },
            name = escape(&habit.name),
            count = progress.today_count,
            target = habit.target_count,
            streak = progress.streak,
            log = post_button(&format!("/habits/log/{}", habit.id), "+1", "primary"),
            reset = post_button(&format!("/habits/reset/{}", habit.id), "Reset", "secondary"),
            delete = post_button(&format!("/habits/delete/{}", habit.id), "Delete", "danger"),
        ));
    }
    if rows.is_empty() {
        rows.push_str(r#"<li class="empty">No habits yet.</li>"#);
    }

    format!(
        r#"<section class="card" id="habits">
  <h2>Habits</h2>
  <form method="post" action="/habits/add" class="row">
    <input name="name" placeholder="Habit" required>
    <input type="number" name="target_count" value="1" min="1">
    <button type="submit">Add habit</button>
  </form>
  <ul class="list">
{rows}  </ul>
</section>
"#
    )
}

fn spending_section(d: &Dashboard) -> String {
    let limit_line = match d.left_to_spend {
        Some(left) if left < 0.0 => format!(
            r#"<p class="over">Over the daily limit of {} by {}</p>"#,
            money(d.daily_spend_limit),
            money(-left)
        ),
        Some(left) => format!(
            r#"<p>Left to spend today: <strong>{}</strong> of {}</p>"#,
            money(left),
            money(d.daily_spend_limit)
        ),
        None => r#"<p class="muted">No daily spend limit set.</p>"#.to_string(),
    };

    let mut entries = String::new();
    for entry in &d.spending_entries {
        entries.push_str(&format!(
            r#"<li>
  <span class="date">{date}</span>
  <span class="category">{category}</span>
  <span class="note">{note}</span>
  <span class="amount">{amount}</span>
  {delete}
</li>
"#,
            date = entry.spend_date,
            category = escape(&entry.category),
            note = escape(&entry.note),
            amount = money(entry.amount),
            delete = post_button(&format!("/spending/delete/{}", entry.id), "Delete", "danger"),
        ));
    }
    if entries.is_empty() {
        entries.push_str(r#"<li class="empty">No spending recorded.</li>"#);
    }

    let mut today_rows = String::new();
    for row in &d.spend_today_by_category {
        today_rows.push_str(&format!(
            "<li>{}: {}</li>",
            escape(&row.category),
            money(row.total)
        ));
    }
    let mut week_rows = String::new();
    for row in &d.spend_week_by_category {
        week_rows.push_str(&format!(
            "<li>{}: {}</li>",
            escape(&row.category),
            money(row.total)
        ));
    }

    let mut budgets = String::new();
    for usage in &d.budgets {
        let budget = &usage.budget;
        budgets.push_str(&format!(
            r#"<li>
  <span class="category">{category}</span>
  <span class="{day_class}">today {spent_today} / {daily}</span>
  <span class="{week_class}">week {spent_week} / {weekly}</span>
  {delete}
</li>
"#,
            category = escape(&budget.category),
            day_class = if usage.over_daily() { "over" } else { "ok" },
            week_class = if usage.over_weekly() { "over" } else { "ok" },
            spent_today = money(usage.spent_today),
            daily = money(budget.daily_limit),
            spent_week = money(usage.spent_week),
            weekly = money(budget.weekly_limit),
            delete = post_button(&format!("/budgets/delete/{}", budget.id), "Delete", "danger"),
        ));
    }
    if budgets.is_empty() {
        budgets.push_str(r#"<li class="empty">No budgets yet.</li>"#);
    }

    format!(
        r#"<section class="card" id="spending">
  <h2>Spending</h2>
  {limit_line}
  <form method="post" action="/spending/add" class="row">
    <input type="number" name="amount" step="0.01" min="0.01" placeholder="Amount" required>
    <input name="category" placeholder="Category" value="Other">
    <input name="note" placeholder="Note">
    <input type="date" name="spend_date" value="{today}">
    <button type="submit">Add spend</button>
  </form>
  <div class="columns">
    <div><h3>Today by category</h3><ul>{today_rows}</ul></div>
    <div><h3>Since {week_start}</h3><ul>{week_rows}</ul></div>
  </div>
  <ul class="list">
{entries}  </ul>
  <h3>Budgets</h3>
  <form method="post" action="/budgets/add" class="row">
    <input name="category" placeholder="Category" required>
    <input type="number" name="daily_limit" step="0.01" min="0" placeholder="Daily limit">
    <input type="number" name="weekly_limit" step="0.01" min="0" placeholder="Weekly limit">
    <button type="submit">Save budget</button>
  </form>
  <ul class="list">
{budgets}  </ul>
</section>
"#,
        today = d.today,
        week_start = d.week_start,
    )
}

fn settings_section(d: &Dashboard) -> String {
    format!(
        r#"<section class="card" id="settings">
  <h2>Settings</h2>
  <form method="post" action="/settings/spend-limit" class="row">
    <label>Daily spend limit <input type="number" name="daily_spend_limit" step="0.01" min="0" value="{limit}"></label>
    <button type="submit">Save</button>
  </form>
  <form method="post" action="/settings/reset-cycle" class="row">
    <label>Rolling window (days) <input type="number" name="reset_cycle_days" min="{min}" max="{max}" value="{cycle}"></label>
    <button type="submit">Save</button>
  </form>
</section>
"#,
        limit = money(d.daily_spend_limit),
        min = MIN_CYCLE_DAYS,
        max = MAX_CYCLE_DAYS,
        cycle = d.cycle_days,
    )
}

fn reflection_section(d: &Dashboard) -> String {
    let (mood, wins, blockers, gratitude) = match &d.reflection {
        Some(r) => (escape(&r.mood), escape(&r.wins), escape(&r.blockers), escape(&r.gratitude)),
        None => Default::default(),
    };

    let mut recent = String::new();
    for r in &d.reflections {
        recent.push_str(&format!(
            r#"<li>
  <span class="date">{date}</span> <span class="mood">{mood}</span>
  <p>Wins: {wins}</p>
  <p>Blockers: {blockers}</p>
  <p>Gratitude: {gratitude}</p>
</li>
"#,
            date = r.log_date,
            mood = escape(&r.mood),
            wins = escape(&r.wins),
            blockers = escape(&r.blockers),
            gratitude = escape(&r.gratitude),
        ));
    }

    format!(
        r#"<section class="card" id="reflection">
  <h2>Reflection</h2>
  <form method="post" action="/reflection/save" class="stack">
    <input type="date" name="log_date" value="{today}">
    <input name="mood" placeholder="Mood" value="{mood}">
    <textarea name="wins" placeholder="Wins">{wins}</textarea>
    <textarea name="blockers" placeholder="Blockers">{blockers}</textarea>
    <textarea name="gratitude" placeholder="Gratitude">{gratitude}</textarea>
    <button type="submit">Save reflection</button>
  </form>
  <ul class="list">
{recent}  </ul>
</section>
"#,
        today = d.today,
    )
}

// --- 3. 统计 / 回顾 ---

pub fn about(username: &str, stats: &OverviewStats) -> String {
    let body = format!(
        r#"<section class="card">
  <h1>About</h1>
  <p>{app} keeps your plans, checklist, routines, habits and spending in one place.</p>
  <table class="stats">
    <tr><th>Plans</th><td>{plans}</td></tr>
    <tr><th>Checklist items</th><td>{checklist}</td></tr>
    <tr><th>Habits</th><td>{habits}</td></tr>
    <tr><th>Routines</th><td>{routines}</td></tr>
    <tr><th>Spending entries</th><td>{spending}</td></tr>
  </table>
</section>
"#,
        app = APP_NAME,
        plans = stats.plans,
        checklist = stats.checklist,
        habits = stats.habits,
        routines = stats.routines,
        spending = stats.spending_entries,
    );
    layout("About", Some(username), &body)
}

pub fn review(username: &str, r: &WeeklyReview) -> String {
    let rows = |items: Vec<(String, String)>| -> String {
        if items.is_empty() {
            return r#"<tr><td colspan="2" class="empty">Nothing recorded.</td></tr>"#.to_string();
        }
        items
            .into_iter()
            .map(|(k, v)| format!("<tr><th>{k}</th><td>{v}</td></tr>"))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let by_day = rows(
        r.spending_by_day
            .iter()
            .map(|d| (d.spend_date.to_string(), money(d.total)))
            .collect(),
    );
    let by_category = rows(
        r.spending_by_category
            .iter()
            .map(|c| (escape(&c.category), money(c.total)))
            .collect(),
    );
    let habits = rows(
        r.habit_totals
            .iter()
            .map(|h| (escape(&h.name), h.total.to_string()))
            .collect(),
    );
    let routines = rows(
        r.routine_totals
            .iter()
            .map(|t| (escape(&t.name), t.total.to_string()))
            .collect(),
    );

    let body = format!(
        r#"<section class="card">
  <h1>Weekly review</h1>
  <p>{start} to {end}</p>
  <h2>Plans</h2>
  <p><strong>{done}</strong> done · <strong>{pending}</strong> pending · <strong>{missed}</strong> missed</p>
  <h2>Spending by day</h2>
  <table>{by_day}</table>
  <p>Total: <strong>{total}</strong></p>
  <h2>Spending by category</h2>
  <table>{by_category}</table>
  <h2>Habits</h2>
  <table>{habits}</table>
  <h2>Routines</h2>
  <table>{routines}</table>
</section>
"#,
        start = r.start,
        end = r.end,
        done = r.plan_counts.done,
        pending = r.plan_counts.pending,
        missed = r.plan_counts.missed,
        total = money(r.spend_total()),
    );
    layout("Weekly review", Some(username), &body)
}

// --- 4. 认证相关页面 ---

pub fn login(error: &str) -> String {
    let body = format!(
        r#"<section class="card narrow">
  <h1>Log in</h1>
  {error}
  <form method="post" action="/login" class="stack">
    <input name="username" placeholder="Username or email" autocomplete="username" required>
    <input type="password" name="password" placeholder="Password" autocomplete="current-password" required>
    <button type="submit">Log in</button>
  </form>
  <p><a href="/password-reset">Forgot your password?</a> · <a href="/register">Create an account</a></p>
</section>
"#,
        error = alert("error", error),
    );
    layout("Log in", None, &body)
}

pub fn register(error: &str, has_invite: bool) -> String {
    let invite_note = if has_invite {
        r#"<p class="alert info">You're registering with an invite link.</p>"#
    } else {
        ""
    };
    let body = format!(
        r#"<section class="card narrow">
  <h1>Create an account</h1>
  {invite_note}
  {error}
  <form method="post" action="/register" class="stack">
    <input name="username" placeholder="Username" autocomplete="username" required>
    <input type="email" name="email" placeholder="Email" autocomplete="email" required>
    <input type="password" name="password" placeholder="Password" autocomplete="new-password" required>
    <input type="password" name="confirm" placeholder="Confirm password" autocomplete="new-password" required>
    <button type="submit">Register</button>
  </form>
  <p>Already have an account? <a href="/login">Log in</a></p>
</section>
"#,
        error = alert("error", error),
    );
    layout("Register", None, &body)
}

pub fn account(username: &str, email: &str, message: &str, error: &str) -> String {
    let body = format!(
        r#"<section class="card narrow">
  <h1>Account</h1>
  {message}
  {error}
  <p>Signed in as <strong>{username}</strong></p>
  <form method="post" action="/account" class="stack">
    <label>Email <input type="email" name="email" value="{email}"></label>
    <label>Current password <input type="password" name="current_password" autocomplete="current-password"></label>
    <label>New password <input type="password" name="new_password" autocomplete="new-password"></label>
    <label>Confirm new password <input type="password" name="confirm_password" autocomplete="new-password"></label>
    <button type="submit">Save changes</button>
  </form>
</section>
"#,
        message = alert("success", message),
        error = alert("error", error),
        username = escape(username),
        email = escape(email),
    );
    layout("Account", Some(username), &body)
}

pub fn password_reset_request(message: &str, error: &str) -> String {
    let body = format!(
        r#"<section class="card narrow">
  <h1>Reset your password</h1>
  {message}
  {error}
  <form method="post" action="/password-reset" class="stack">
    <input type="email" name="email" placeholder="Email" autocomplete="email" required>
    <button type="submit">Send reset link</button>
  </form>
  <p><a href="/login">Back to log in</a></p>
</section>
"#,
        message = alert("success", message),
        error = alert("error", error),
    );
    layout("Reset password", None, &body)
}

pub fn password_reset_form(token: &str, error: &str) -> String {
    let body = format!(
        r#"<section class="card narrow">
  <h1>Choose a new password</h1>
  {error}
  <form method="post" action="/password-reset/{token}" class="stack">
    <input type="password" name="password" placeholder="New password" autocomplete="new-password" required>
    <input type="password" name="confirm" placeholder="Confirm password" autocomplete="new-password" required>
    <button type="submit">Update password</button>
  </form>
</section>
"#,
        error = alert("error", error),
        token = escape(token),
    );
    layout("Reset password", None, &body)
}

pub fn password_reset_invalid() -> String {
    let body = r#"<section class="card narrow">
  <h1>Reset link invalid</h1>
  <p>This password reset link is invalid or has expired.</p>
  <p><a href="/password-reset">Request a new link</a></p>
</section>
"#;
    layout("Reset link invalid", None, body)
}

pub fn invite_invalid() -> String {
    let body = r#"<section class="card narrow">
  <h1>Invite invalid</h1>
  <p>This invite link is invalid, already used, or expired.</p>
  <p><a href="/login">Go to log in</a></p>
</section>
"#;
    layout("Invite invalid", None, body)
}

pub fn invites(username: &str, base_url: &str, active: &[Invite], used: &[UsedInvite]) -> String {
    let base = base_url.trim_end_matches('/');

    let mut active_rows = String::new();
    for invite in active {
        let link = format!("{base}/invite/{}", invite.token);
        active_rows.push_str(&format!(
            r#"<li><code>{link}</code> <span class="muted">expires {expires}</span></li>
"#,
            link = escape(&link),
            expires = invite.expires_at.format("%Y-%m-%d %H:%M"),
        ));
    }
    if active_rows.is_empty() {
        active_rows.push_str(r#"<li class="empty">No active invites.</li>"#);
    }

    let mut used_rows = String::new();
    for invite in used {
        used_rows.push_str(&format!(
            r#"<li><code>{token}</code> used by <strong>{who}</strong> <span class="muted">created {created}</span></li>
"#,
            token = escape(&invite.token),
            who = escape(invite.used_by.as_deref().unwrap_or("unknown")),
            created = invite.created_at.format("%Y-%m-%d %H:%M"),
        ));
    }
    if used_rows.is_empty() {
        used_rows.push_str(r#"<li class="empty">No invites used yet.</li>"#);
    }

    let body = format!(
        r#"<section class="card">
  <h1>Invites</h1>
  <p>Invite links are single-use and expire after 7 days.</p>
  {create}
  <h2>Active</h2>
  <ul class="list">
{active_rows}  </ul>
  <h2>Used</h2>
  <ul class="list">
{used_rows}  </ul>
</section>
"#,
        create = post_button("/invites/create", "Create invite link", "primary"),
    );
    layout("Invites", Some(username), &body)
}

pub fn error_page(title: &str, message: &str) -> String {
    let body = format!(
        r#"<section class="card narrow">
  <h1>{title}</h1>
  <p>{message}</p>
  <p><a href="/">Back to today</a></p>
</section>
"#,
        title = escape(title),
        message = escape(message),
    );
    layout(title, None, &body)
}
