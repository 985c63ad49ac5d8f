use super::{AdminDb, Error, Result};
use casino_types::admin::{ActivityLogPage, ActivityLogQuery, ActivityLogStats};
use casino_types::api::{PageQuery, PagedResponse, Pagination, MAX_PAGE_LIMIT};
use casino_types::model::{
    ActivityLog, ActivityTypeCount, DashboardStats, GameStats, Transaction, User, UserDetails,
    UserGameStats, UserSummary, VipLevel, VipLevelStats,
};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::str::FromStr;

/// Default number of rows returned by the activity views.
pub const DEFAULT_ACTIVITY_LIMIT: u32 = 50;

/// Number of transactions shown on the user detail view.
const RECENT_TRANSACTIONS: i64 = 10;

const USER_SUMMARY_SELECT: &str = "
    SELECT u.id, u.username, u.email, u.first_name, u.last_name, u.is_verified,
           u.is_active, u.created_at, u.last_login,
           v.total_points, vl.level_name AS vip_level,
           w.balance, w.bonus_balance, w.total_deposited, w.total_withdrawn
    FROM users u
    LEFT JOIN user_vip_stats v ON u.id = v.user_id
    LEFT JOIN vip_levels vl ON v.vip_level_id = vl.id
    LEFT JOIN user_wallets w ON u.id = w.user_id";

const TRANSACTION_SELECT: &str = "
    SELECT t.id, t.user_id, t.transaction_type, t.amount, t.balance_before,
           t.balance_after, t.status, t.description, t.created_at,
           u.username, u.email
    FROM transactions t
    LEFT JOIN users u ON t.user_id = u.id";

const ACTIVITY_SELECT: &str = "
    SELECT l.id, l.user_id, l.activity_type, l.description, l.ip_address,
           l.created_at, u.username, u.email
    FROM user_activity_logs l
    LEFT JOIN users u ON l.user_id = u.id";

/// Reads a text column through `FromStr`.
fn parsed<T: FromStr<Err = &'static str>>(row: &Row<'_>, column: &str) -> rusqlite::Result<T> {
    let raw: String = row.get(column)?;
    raw.parse().map_err(|err: &'static str| {
        let index = row.as_ref().column_index(column).unwrap_or_default();
        rusqlite::Error::FromSqlConversionFailure(index, Type::Text, err.into())
    })
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get("id")?,
        username: row.get("username")?,
        email: row.get("email")?,
        first_name: row.get("first_name")?,
        last_name: row.get("last_name")?,
        is_verified: row.get("is_verified")?,
        is_active: row.get("is_active")?,
        created_at: row.get("created_at")?,
        last_login: row.get("last_login")?,
    })
}

fn user_summary_from_row(row: &Row<'_>) -> rusqlite::Result<UserSummary> {
    Ok(UserSummary {
        user: user_from_row(row)?,
        total_points: row.get("total_points")?,
        vip_level: row.get("vip_level")?,
        balance: row.get("balance")?,
        bonus_balance: row.get("bonus_balance")?,
        total_deposited: row.get("total_deposited")?,
        total_withdrawn: row.get("total_withdrawn")?,
    })
}

fn transaction_from_row(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    Ok(Transaction {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        transaction_type: parsed(row, "transaction_type")?,
        amount: row.get("amount")?,
        balance_before: row.get("balance_before")?,
        balance_after: row.get("balance_after")?,
        status: parsed(row, "status")?,
        description: row.get("description")?,
        created_at: row.get("created_at")?,
        username: row.get("username")?,
        email: row.get("email")?,
    })
}

fn activity_from_row(row: &Row<'_>) -> rusqlite::Result<ActivityLog> {
    Ok(ActivityLog {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        activity_type: row.get("activity_type")?,
        description: row.get("description")?,
        ip_address: row.get("ip_address")?,
        created_at: row.get("created_at")?,
        username: row.get("username")?,
        email: row.get("email")?,
    })
}

/// `LIMIT`/`OFFSET` values for a page request.
fn page_bounds(page: &PageQuery, default_limit: u32) -> (i64, i64) {
    let limit = page.limit_or(default_limit);
    let offset = u64::from(page.page() - 1) * u64::from(limit);
    (
        i64::from(limit),
        i64::try_from(offset).unwrap_or(i64::MAX),
    )
}

fn count(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<u64> {
    let total: i64 = conn.query_row(sql, params, |row| row.get(0))?;
    Ok(u64::try_from(total).unwrap_or_default())
}

/// Treats empty filter strings as absent.
fn filter(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

impl AdminDb {
    /// Dashboard counters.
    pub fn stats(&self) -> Result<DashboardStats> {
        self.with_conn(|conn| {
            let stats = conn.query_row(
                "SELECT
                     (SELECT COUNT(*) FROM users WHERE is_active = 1),
                     (SELECT COUNT(*) FROM user_vip_stats WHERE vip_level_id > 1),
                     (SELECT COUNT(*) FROM transactions
                          WHERE transaction_type = 'deposit' AND status = 'completed'),
                     (SELECT COALESCE(SUM(amount), 0.0) FROM transactions
                          WHERE transaction_type = 'deposit' AND status = 'completed'),
                     (SELECT COUNT(*) FROM transactions
                          WHERE transaction_type = 'withdrawal' AND status = 'completed'),
                     (SELECT COALESCE(SUM(amount), 0.0) FROM transactions
                          WHERE transaction_type = 'withdrawal' AND status = 'completed'),
                     (SELECT COUNT(*) FROM transactions WHERE status = 'pending'),
                     (SELECT COUNT(*) FROM users WHERE DATE(created_at) = DATE('now'))",
                [],
                |row| {
                    Ok(DashboardStats {
                        total_users: row.get(0)?,
                        vip_users: row.get(1)?,
                        total_deposits: row.get(2)?,
                        total_deposits_amount: row.get(3)?,
                        total_withdrawals: row.get(4)?,
                        total_withdrawals_amount: row.get(5)?,
                        pending_requests: row.get(6)?,
                        today_new_users: row.get(7)?,
                    })
                },
            )?;
            Ok(stats)
        })
    }

    /// Users with VIP and wallet fields, newest first.
    pub fn users(&self, page: &PageQuery) -> Result<PagedResponse<UserSummary>> {
        let (limit, offset) = page_bounds(page, casino_types::api::DEFAULT_PAGE_LIMIT);
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{USER_SUMMARY_SELECT} ORDER BY u.created_at DESC, u.id DESC LIMIT ?1 OFFSET ?2"
            ))?;
            let users = stmt
                .query_map(params![limit, offset], user_summary_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            let total = count(conn, "SELECT COUNT(*) FROM users", [])?;
            Ok(PagedResponse::new(
                users,
                Pagination::new(page.page(), page.limit(), total),
            ))
        })
    }

    pub fn user_details(&self, user_id: Option<i64>) -> Result<UserDetails> {
        let user_id = user_id.ok_or_else(|| Error::bad_request("User ID is required"))?;
        self.with_conn(|conn| {
            let details = conn
                .query_row(
                    "SELECT u.id, u.username, u.email, u.first_name, u.last_name, u.is_verified,
                            u.is_active, u.created_at, u.last_login,
                            v.total_points, v.lifetime_wagered, v.lifetime_won, v.lifetime_lost,
                            vl.level_name AS vip_level, vl.cashback_percentage, vl.bonus_multiplier,
                            w.balance, w.bonus_balance, w.locked_balance,
                            w.total_deposited, w.total_withdrawn
                     FROM users u
                     LEFT JOIN user_vip_stats v ON u.id = v.user_id
                     LEFT JOIN vip_levels vl ON v.vip_level_id = vl.id
                     LEFT JOIN user_wallets w ON u.id = w.user_id
                     WHERE u.id = ?1",
                    params![user_id],
                    |row| {
                        Ok(UserDetails {
                            user: user_from_row(row)?,
                            total_points: row.get("total_points")?,
                            lifetime_wagered: row.get("lifetime_wagered")?,
                            lifetime_won: row.get("lifetime_won")?,
                            lifetime_lost: row.get("lifetime_lost")?,
                            vip_level: row.get("vip_level")?,
                            cashback_percentage: row.get("cashback_percentage")?,
                            bonus_multiplier: row.get("bonus_multiplier")?,
                            balance: row.get("balance")?,
                            bonus_balance: row.get("bonus_balance")?,
                            locked_balance: row.get("locked_balance")?,
                            total_deposited: row.get("total_deposited")?,
                            total_withdrawn: row.get("total_withdrawn")?,
                            recent_transactions: Vec::new(),
                            game_stats: Vec::new(),
                        })
                    },
                )
                .optional()?;
            let Some(mut details) = details else {
                return Err(Error::not_found("User not found"));
            };

            let mut stmt = conn.prepare(&format!(
                "{TRANSACTION_SELECT} WHERE t.user_id = ?1
                 ORDER BY t.created_at DESC, t.id DESC LIMIT ?2"
            ))?;
            details.recent_transactions = stmt
                .query_map(params![user_id, RECENT_TRANSACTIONS], transaction_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let mut stmt = conn.prepare(
                "SELECT game_type,
                        COUNT(*) AS games_played,
                        COALESCE(SUM(total_wagered), 0.0) AS total_wagered,
                        COALESCE(SUM(total_won), 0.0) AS total_won,
                        COALESCE(SUM(total_lost), 0.0) AS total_lost
                 FROM game_sessions
                 WHERE user_id = ?1
                 GROUP BY game_type
                 ORDER BY game_type",
            )?;
            details.game_stats = stmt
                .query_map(params![user_id], |row| {
                    Ok(UserGameStats {
                        game_type: row.get("game_type")?,
                        games_played: row.get("games_played")?,
                        total_wagered: row.get("total_wagered")?,
                        total_won: row.get("total_won")?,
                        total_lost: row.get("total_lost")?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(details)
        })
    }

    pub fn vip_levels(&self) -> Result<Vec<VipLevel>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, level_name, min_points_required, cashback_percentage, bonus_multiplier
                 FROM vip_levels ORDER BY min_points_required",
            )?;
            let levels = stmt
                .query_map([], |row| {
                    Ok(VipLevel {
                        id: row.get("id")?,
                        level_name: row.get("level_name")?,
                        min_points_required: row.get("min_points_required")?,
                        cashback_percentage: row.get("cashback_percentage")?,
                        bonus_multiplier: row.get("bonus_multiplier")?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(levels)
        })
    }

    /// Member counts and totals per VIP level.
    pub fn vip_stats(&self) -> Result<Vec<VipLevelStats>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT vl.level_name, vl.min_points_required, vl.cashback_percentage,
                        COUNT(v.user_id) AS user_count,
                        AVG(v.total_points) AS avg_points,
                        SUM(v.lifetime_wagered) AS total_wagered
                 FROM vip_levels vl
                 LEFT JOIN user_vip_stats v ON vl.id = v.vip_level_id
                 GROUP BY vl.id
                 ORDER BY vl.min_points_required",
            )?;
            let stats = stmt
                .query_map([], |row| {
                    Ok(VipLevelStats {
                        level_name: row.get("level_name")?,
                        min_points_required: row.get("min_points_required")?,
                        cashback_percentage: row.get("cashback_percentage")?,
                        user_count: row.get("user_count")?,
                        avg_points: row.get("avg_points")?,
                        total_wagered: row.get("total_wagered")?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(stats)
        })
    }

    /// Transactions with owner details, newest first, optionally filtered.
    pub fn transactions(
        &self,
        page: &PageQuery,
        kind: Option<&str>,
        status: Option<&str>,
    ) -> Result<PagedResponse<Transaction>> {
        let (limit, offset) = page_bounds(page, casino_types::api::DEFAULT_PAGE_LIMIT);
        let kind = filter(kind);
        let status = filter(status);
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{TRANSACTION_SELECT}
                 WHERE (?1 IS NULL OR t.transaction_type = ?1)
                   AND (?2 IS NULL OR t.status = ?2)
                 ORDER BY t.created_at DESC, t.id DESC
                 LIMIT ?3 OFFSET ?4"
            ))?;
            let transactions = stmt
                .query_map(params![kind, status, limit, offset], transaction_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            let total = count(
                conn,
                "SELECT COUNT(*) FROM transactions
                 WHERE (?1 IS NULL OR transaction_type = ?1)
                   AND (?2 IS NULL OR status = ?2)",
                params![kind, status],
            )?;
            Ok(PagedResponse::new(
                transactions,
                Pagination::new(page.page(), page.limit(), total),
            ))
        })
    }

    /// Totals per game type, highest wagered first.
    pub fn game_stats(&self) -> Result<Vec<GameStats>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT game_type,
                        COUNT(*) AS total_sessions,
                        COUNT(DISTINCT user_id) AS unique_players,
                        COALESCE(SUM(total_wagered), 0.0) AS wagered,
                        COALESCE(SUM(total_won), 0.0) AS won,
                        COALESCE(SUM(total_lost), 0.0) AS lost,
                        COALESCE(AVG(total_wagered), 0.0) AS avg_wagered
                 FROM game_sessions
                 GROUP BY game_type
                 ORDER BY wagered DESC, game_type",
            )?;
            let stats = stmt
                .query_map([], |row| {
                    Ok(GameStats {
                        game_type: row.get("game_type")?,
                        total_sessions: row.get("total_sessions")?,
                        unique_players: row.get("unique_players")?,
                        total_wagered: row.get("wagered")?,
                        total_won: row.get("won")?,
                        total_lost: row.get("lost")?,
                        avg_wagered: row.get("avg_wagered")?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(stats)
        })
    }

    /// Most recent activity rows of one user.
    pub fn user_activity(&self, user_id: Option<i64>, limit: u32) -> Result<Vec<ActivityLog>> {
        let user_id = user_id.ok_or_else(|| Error::bad_request("User ID is required"))?;
        let limit = i64::from(limit.clamp(1, MAX_PAGE_LIMIT));
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{ACTIVITY_SELECT} WHERE l.user_id = ?1
                 ORDER BY l.created_at DESC, l.id DESC LIMIT ?2"
            ))?;
            let logs = stmt
                .query_map(params![user_id, limit], activity_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(logs)
        })
    }

    /// Substring match over username, email and names.
    pub fn search_users(&self, query: Option<&str>, limit: u32) -> Result<Vec<UserSummary>> {
        let query =
            filter(query).ok_or_else(|| Error::bad_request("Search query is required"))?;
        let pattern = format!("%{query}%");
        let limit = i64::from(limit.clamp(1, MAX_PAGE_LIMIT));
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{USER_SUMMARY_SELECT}
                 WHERE u.username LIKE ?1 OR u.email LIKE ?1
                    OR u.first_name LIKE ?1 OR u.last_name LIKE ?1
                 ORDER BY u.created_at DESC, u.id DESC
                 LIMIT ?2"
            ))?;
            let users = stmt
                .query_map(params![pattern, limit], user_summary_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(users)
        })
    }

    /// Filtered, paged view over every activity row.
    pub fn activity_logs(&self, query: &ActivityLogQuery) -> Result<ActivityLogPage> {
        let page = PageQuery {
            page: query.page,
            limit: query.limit,
        };
        let (limit, offset) = page_bounds(&page, DEFAULT_ACTIVITY_LIMIT);
        let activity_type = filter(query.activity_type.as_deref());
        let date_from = filter(query.date_from.as_deref());
        let date_to = filter(query.date_to.as_deref());
        let user_id = query.user_id;
        self.with_conn(|conn| {
            const FILTER: &str = "
                 WHERE (?1 IS NULL OR l.activity_type = ?1)
                   AND (?2 IS NULL OR l.user_id = ?2)
                   AND (?3 IS NULL OR DATE(l.created_at) >= ?3)
                   AND (?4 IS NULL OR DATE(l.created_at) <= ?4)";
            let mut stmt = conn.prepare(&format!(
                "{ACTIVITY_SELECT} {FILTER}
                 ORDER BY l.created_at DESC, l.id DESC
                 LIMIT ?5 OFFSET ?6"
            ))?;
            let logs = stmt
                .query_map(
                    params![activity_type, user_id, date_from, date_to, limit, offset],
                    activity_from_row,
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            let total = count(
                conn,
                &format!("SELECT COUNT(*) FROM user_activity_logs l {FILTER}"),
                params![activity_type, user_id, date_from, date_to],
            )?;

            let total_logs = count(conn, "SELECT COUNT(*) FROM user_activity_logs", [])?;
            let mut stmt = conn.prepare(
                "SELECT activity_type, COUNT(*) AS count
                 FROM user_activity_logs
                 GROUP BY activity_type
                 ORDER BY count DESC, activity_type",
            )?;
            let type_distribution = stmt
                .query_map([], |row| {
                    Ok(ActivityTypeCount {
                        activity_type: row.get("activity_type")?,
                        count: row.get("count")?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(ActivityLogPage {
                success: true,
                data: logs,
                pagination: Pagination::at_least_one_page(
                    page.page(),
                    page.limit_or(DEFAULT_ACTIVITY_LIMIT),
                    total,
                ),
                stats: ActivityLogStats {
                    total_logs,
                    type_distribution,
                },
            })
        })
    }
}
