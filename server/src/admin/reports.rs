//! Reports, exports and backups over the admin database.
//!
//! Report and export queries return loosely shaped tables that are rendered
//! as JSON or CSV; they are not mapped into typed records.

use super::{AdminDb, Error, Result};
use casino_types::admin::{BackupSummary, ExportKind, OutputFormat, ReportKind};
use chrono::{DateTime, Utc};
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, Params};
use serde_json::{json, Map, Value};
use std::path::Path;
use tracing::info;

/// Row cap of the "top N" report sections.
const TOP_ROWS: i64 = 50;

/// Rows returned by one query, in column order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    fn record(&self, row: &[Value]) -> Value {
        Value::Object(
            self.columns
                .iter()
                .cloned()
                .zip(row.iter().cloned())
                .collect(),
        )
    }

    fn to_json(&self) -> Value {
        Value::Array(self.rows.iter().map(|row| self.record(row)).collect())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Section {
    /// Any number of rows.
    Rows(&'static str, Table),
    /// A single aggregate row, rendered as an object.
    Summary(&'static str, Table),
    /// Descriptive fields. Left out of CSV output.
    Metadata(&'static str, Map<String, Value>),
}

impl Section {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Rows(name, _) | Self::Summary(name, _) | Self::Metadata(name, _) => name,
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Self::Rows(_, table) => table.to_json(),
            Self::Summary(_, table) => table
                .rows
                .first()
                .map(|row| table.record(row))
                .unwrap_or(Value::Null),
            Self::Metadata(_, fields) => Value::Object(fields.clone()),
        }
    }

    fn table(&self) -> Option<&Table> {
        match self {
            Self::Rows(_, table) | Self::Summary(_, table) => Some(table),
            Self::Metadata(..) => None,
        }
    }
}

/// What produced a dataset.
#[derive(Clone, Debug, PartialEq)]
pub enum Origin {
    Report {
        kind: ReportKind,
        date_from: Option<String>,
        date_to: Option<String>,
    },
    Export(ExportKind),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Dataset {
    pub origin: Origin,
    pub generated_at: DateTime<Utc>,
    pub sections: Vec<Section>,
}

/// A rendered report or export, ready to be sent as a download.
#[derive(Clone, Debug, PartialEq)]
pub struct Rendered {
    pub filename: String,
    pub content_type: &'static str,
    pub body: String,
}

impl Dataset {
    fn single_table(&self) -> Option<&Table> {
        match self.sections.as_slice() {
            [Section::Rows(_, table)] if matches!(self.origin, Origin::Export(_)) => Some(table),
            _ => None,
        }
    }

    pub fn total_records(&self) -> usize {
        self.sections
            .iter()
            .filter_map(Section::table)
            .map(|table| table.rows.len())
            .sum()
    }

    /// `data` payload of the JSON envelope.
    pub fn data(&self) -> Value {
        if let Some(table) = self.single_table() {
            return table.to_json();
        }
        Value::Object(
            self.sections
                .iter()
                .map(|section| (section.name().to_string(), section.to_json()))
                .collect(),
        )
    }

    pub fn to_csv(&self) -> Result<String> {
        if let Some(table) = self.single_table() {
            if table.rows.is_empty() {
                return Ok(String::new());
            }
            return write_csv(None, table);
        }
        let mut out = String::new();
        for section in &self.sections {
            let Some(table) = section.table() else {
                continue;
            };
            let heading = format!(
                "=== {} ===",
                section.name().replace('_', " ").to_uppercase()
            );
            out.push_str(&write_csv(Some(&heading), table)?);
            out.push('\n');
        }
        Ok(out)
    }

    pub fn render(&self, format: OutputFormat) -> Result<Rendered> {
        let stamp = self.generated_at.format("%Y-%m-%d_%H-%M-%S").to_string();
        let (label, kind) = match &self.origin {
            Origin::Report { kind, .. } => ("report", kind.as_str()),
            Origin::Export(kind) => ("export", kind.as_str()),
        };
        let stem = format!("casino_{label}_{kind}_{stamp}");

        match format {
            OutputFormat::Csv => Ok(Rendered {
                filename: format!("{stem}.csv"),
                content_type: "text/csv",
                body: self.to_csv()?,
            }),
            OutputFormat::Json => {
                let envelope = match &self.origin {
                    Origin::Report {
                        date_from, date_to, ..
                    } => json!({
                        "success": true,
                        "report_type": kind,
                        "format": format.as_str(),
                        "timestamp": stamp,
                        "date_range": { "from": date_from, "to": date_to },
                        "data": self.data(),
                    }),
                    Origin::Export(_) => json!({
                        "success": true,
                        "export_type": kind,
                        "format": format.as_str(),
                        "timestamp": stamp,
                        "total_records": self.total_records(),
                        "data": self.data(),
                    }),
                };
                Ok(Rendered {
                    filename: format!("{stem}.json"),
                    content_type: "application/json",
                    body: serde_json::to_string_pretty(&envelope)?,
                })
            }
        }
    }
}

fn csv_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn write_csv(heading: Option<&str>, table: &Table) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());
    if let Some(heading) = heading {
        writer.write_record([heading])?;
    }
    if !table.rows.is_empty() {
        writer.write_record(&table.columns)?;
        for row in &table.rows {
            writer.write_record(row.iter().map(csv_cell))?;
        }
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| Error::Io(err.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn json_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(number) => Value::from(number),
        ValueRef::Real(number) => serde_json::Number::from_f64(number)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(text) => Value::String(String::from_utf8_lossy(text).into_owned()),
        ValueRef::Blob(bytes) => Value::String(format!("<{} bytes>", bytes.len())),
    }
}

fn query_table<P: Params>(conn: &Connection, sql: &str, params: P) -> rusqlite::Result<Table> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(String::from)
        .collect();
    let width = columns.len();
    let rows = stmt
        .query_map(params, |row| {
            (0..width)
                .map(|index| row.get_ref(index).map(json_value))
                .collect::<rusqlite::Result<Vec<_>>>()
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(Table { columns, rows })
}

fn report_info(title: &str, generated_at: &DateTime<Utc>, range: Option<(&str, &str)>) -> Section {
    let mut fields = Map::new();
    fields.insert("type".to_string(), Value::from(title));
    fields.insert(
        "generated_at".to_string(),
        Value::from(generated_at.format("%Y-%m-%d %H:%M:%S").to_string()),
    );
    let (from, to) = range.unzip();
    fields.insert("date_from".to_string(), json!(from));
    fields.insert("date_to".to_string(), json!(to));
    Section::Metadata("report_info", fields)
}

fn user_report(conn: &Connection, from: Option<&str>, to: Option<&str>) -> rusqlite::Result<Vec<Section>> {
    Ok(vec![
        Section::Summary(
            "user_summary",
            query_table(
                conn,
                "SELECT COUNT(*) AS total_users,
                        COUNT(CASE WHEN u.is_verified = 1 THEN 1 END) AS verified_users,
                        COUNT(CASE WHEN u.is_active = 1 THEN 1 END) AS active_users,
                        COUNT(CASE WHEN u.last_login >= DATETIME('now', '-7 days') THEN 1 END) AS active_7_days,
                        COUNT(CASE WHEN u.last_login >= DATETIME('now', '-30 days') THEN 1 END) AS active_30_days,
                        AVG(w.balance) AS avg_balance,
                        SUM(w.total_deposited) AS total_deposited,
                        SUM(w.total_withdrawn) AS total_withdrawn
                 FROM users u
                 LEFT JOIN user_wallets w ON u.id = w.user_id",
                [],
            )?,
        ),
        Section::Rows(
            "registration_statistics",
            query_table(
                conn,
                "SELECT DATE(u.created_at) AS registration_date,
                        COUNT(*) AS new_users,
                        COUNT(CASE WHEN u.is_verified = 1 THEN 1 END) AS verified_users,
                        COUNT(CASE WHEN u.is_active = 1 THEN 1 END) AS active_users,
                        COUNT(CASE WHEN u.last_login IS NOT NULL THEN 1 END) AS logged_in_users
                 FROM users u
                 WHERE (?1 IS NULL OR DATE(u.created_at) BETWEEN ?1 AND ?2)
                 GROUP BY DATE(u.created_at)
                 ORDER BY registration_date DESC",
                params![from, to],
            )?,
        ),
        Section::Rows(
            "demographics",
            query_table(
                conn,
                "SELECT u.country, u.city,
                        COUNT(*) AS user_count,
                        AVG(w.balance) AS avg_balance,
                        SUM(w.total_deposited) AS total_deposited
                 FROM users u
                 LEFT JOIN user_wallets w ON u.id = w.user_id
                 WHERE (?1 IS NULL OR DATE(u.created_at) BETWEEN ?1 AND ?2)
                 GROUP BY u.country, u.city
                 ORDER BY user_count DESC
                 LIMIT 20",
                params![from, to],
            )?,
        ),
    ])
}

fn vip_report(conn: &Connection, from: Option<&str>, to: Option<&str>) -> rusqlite::Result<Vec<Section>> {
    Ok(vec![
        Section::Summary(
            "vip_summary",
            query_table(
                conn,
                "SELECT COUNT(DISTINCT v.user_id) AS total_vip_users,
                        SUM(v.lifetime_wagered) AS total_vip_wagered,
                        SUM(v.lifetime_won) AS total_vip_won,
                        SUM(v.lifetime_lost) AS total_vip_lost,
                        AVG(v.total_points) AS avg_vip_points,
                        MAX(v.total_points) AS max_vip_points
                 FROM user_vip_stats v
                 WHERE v.vip_level_id > 1",
                [],
            )?,
        ),
        Section::Rows(
            "vip_distribution",
            query_table(
                conn,
                "SELECT vl.level_name, vl.min_points_required, vl.cashback_percentage,
                        vl.bonus_multiplier,
                        COUNT(v.user_id) AS user_count,
                        AVG(v.total_points) AS avg_points,
                        SUM(v.lifetime_wagered) AS total_wagered,
                        SUM(v.lifetime_won) AS total_won,
                        SUM(v.lifetime_lost) AS total_lost,
                        AVG(v.lifetime_wagered) AS avg_wagered_per_user
                 FROM vip_levels vl
                 LEFT JOIN user_vip_stats v ON vl.id = v.vip_level_id
                      AND (?1 IS NULL OR DATE(v.created_at) BETWEEN ?1 AND ?2)
                 GROUP BY vl.id
                 ORDER BY vl.min_points_required",
                params![from, to],
            )?,
        ),
        Section::Rows(
            "top_vip_users",
            query_table(
                conn,
                "SELECT u.username, u.email, v.total_points,
                        vl.level_name AS current_level,
                        v.lifetime_wagered, v.lifetime_won, v.lifetime_lost,
                        v.created_at AS vip_start_date,
                        u.created_at AS registration_date
                 FROM users u
                 JOIN user_vip_stats v ON u.id = v.user_id
                 JOIN vip_levels vl ON v.vip_level_id = vl.id
                 WHERE (?1 IS NULL OR DATE(v.created_at) BETWEEN ?1 AND ?2)
                 ORDER BY v.total_points DESC, u.id
                 LIMIT ?3",
                params![from, to, TOP_ROWS],
            )?,
        ),
    ])
}

fn financial_report(
    conn: &Connection,
    from: Option<&str>,
    to: Option<&str>,
) -> rusqlite::Result<Vec<Section>> {
    Ok(vec![
        Section::Summary(
            "financial_summary",
            query_table(
                conn,
                "SELECT COUNT(*) AS total_transactions,
                        SUM(amount) AS total_volume,
                        SUM(CASE WHEN status = 'completed' THEN amount ELSE 0 END) AS completed_volume,
                        SUM(CASE WHEN status = 'pending' THEN amount ELSE 0 END) AS pending_volume,
                        AVG(amount) AS avg_transaction_size
                 FROM transactions",
                [],
            )?,
        ),
        Section::Rows(
            "transaction_summary",
            query_table(
                conn,
                "SELECT t.transaction_type,
                        COUNT(*) AS transaction_count,
                        SUM(t.amount) AS total_amount,
                        AVG(t.amount) AS avg_amount,
                        MIN(t.amount) AS min_amount,
                        MAX(t.amount) AS max_amount,
                        SUM(CASE WHEN t.status = 'completed' THEN t.amount ELSE 0 END) AS completed_amount,
                        SUM(CASE WHEN t.status = 'pending' THEN t.amount ELSE 0 END) AS pending_amount,
                        SUM(CASE WHEN t.status = 'failed' THEN t.amount ELSE 0 END) AS failed_amount
                 FROM transactions t
                 WHERE (?1 IS NULL OR DATE(t.created_at) BETWEEN ?1 AND ?2)
                 GROUP BY t.transaction_type
                 ORDER BY total_amount DESC",
                params![from, to],
            )?,
        ),
        Section::Rows(
            "daily_trends",
            query_table(
                conn,
                "SELECT DATE(t.created_at) AS transaction_date,
                        t.transaction_type,
                        COUNT(*) AS transaction_count,
                        SUM(t.amount) AS total_amount
                 FROM transactions t
                 WHERE (?1 IS NULL OR DATE(t.created_at) BETWEEN ?1 AND ?2)
                 GROUP BY DATE(t.created_at), t.transaction_type
                 ORDER BY transaction_date DESC, total_amount DESC",
                params![from, to],
            )?,
        ),
        Section::Rows(
            "user_financials",
            query_table(
                conn,
                "SELECT u.username, u.email, w.balance, w.total_deposited,
                        w.total_withdrawn, w.bonus_balance,
                        COUNT(t.id) AS total_transactions,
                        SUM(CASE WHEN t.transaction_type = 'deposit' THEN t.amount ELSE 0 END) AS total_deposits,
                        SUM(CASE WHEN t.transaction_type = 'withdrawal' THEN t.amount ELSE 0 END) AS total_withdrawals
                 FROM users u
                 LEFT JOIN user_wallets w ON u.id = w.user_id
                 LEFT JOIN transactions t ON u.id = t.user_id
                 WHERE (?1 IS NULL OR DATE(t.created_at) BETWEEN ?1 AND ?2)
                 GROUP BY u.id
                 ORDER BY w.total_deposited DESC, u.id
                 LIMIT ?3",
                params![from, to, TOP_ROWS],
            )?,
        ),
    ])
}

fn game_report(conn: &Connection, from: Option<&str>, to: Option<&str>) -> rusqlite::Result<Vec<Section>> {
    Ok(vec![
        Section::Summary(
            "game_summary",
            query_table(
                conn,
                "SELECT COUNT(*) AS total_sessions,
                        COUNT(DISTINCT user_id) AS unique_players,
                        SUM(total_wagered) AS total_wagered,
                        SUM(total_won) AS total_won,
                        SUM(total_lost) AS total_lost,
                        SUM(games_played) AS total_games_played,
                        AVG(total_wagered) AS avg_wagered_per_session,
                        SUM(total_won) * 100.0 / NULLIF(SUM(total_wagered), 0) AS overall_win_percentage
                 FROM game_sessions",
                [],
            )?,
        ),
        Section::Rows(
            "game_performance",
            query_table(
                conn,
                "SELECT gs.game_type,
                        COUNT(*) AS total_sessions,
                        COUNT(DISTINCT gs.user_id) AS unique_players,
                        SUM(gs.total_wagered) AS wagered,
                        SUM(gs.total_won) AS won,
                        SUM(gs.total_lost) AS lost,
                        AVG(gs.total_wagered) AS avg_wagered_per_session,
                        AVG(gs.games_played) AS avg_games_per_session,
                        SUM(gs.total_won) * 100.0 / NULLIF(SUM(gs.total_wagered), 0) AS win_percentage
                 FROM game_sessions gs
                 WHERE (?1 IS NULL OR DATE(gs.created_at) BETWEEN ?1 AND ?2)
                 GROUP BY gs.game_type
                 ORDER BY wagered DESC",
                params![from, to],
            )?,
        ),
        Section::Rows(
            "daily_game_activity",
            query_table(
                conn,
                "SELECT DATE(gs.created_at) AS game_date,
                        gs.game_type,
                        COUNT(*) AS sessions_count,
                        COUNT(DISTINCT gs.user_id) AS unique_players,
                        SUM(gs.total_wagered) AS wagered,
                        SUM(gs.total_won) AS won,
                        SUM(gs.total_lost) AS lost
                 FROM game_sessions gs
                 WHERE (?1 IS NULL OR DATE(gs.created_at) BETWEEN ?1 AND ?2)
                 GROUP BY DATE(gs.created_at), gs.game_type
                 ORDER BY game_date DESC, wagered DESC",
                params![from, to],
            )?,
        ),
        Section::Rows(
            "top_players",
            query_table(
                conn,
                "SELECT u.username, u.email,
                        SUM(gs.total_wagered) AS wagered,
                        SUM(gs.total_won) AS won,
                        SUM(gs.total_lost) AS lost,
                        COUNT(gs.id) AS total_sessions,
                        SUM(gs.games_played) AS total_games_played,
                        SUM(gs.total_won) * 100.0 / NULLIF(SUM(gs.total_wagered), 0) AS win_percentage
                 FROM users u
                 JOIN game_sessions gs ON u.id = gs.user_id
                 WHERE (?1 IS NULL OR DATE(gs.created_at) BETWEEN ?1 AND ?2)
                 GROUP BY u.id
                 ORDER BY wagered DESC, u.id
                 LIMIT ?3",
                params![from, to, TOP_ROWS],
            )?,
        ),
    ])
}

fn export_users(conn: &Connection) -> rusqlite::Result<Section> {
    Ok(Section::Rows(
        "users",
        query_table(
            conn,
            "SELECT u.id, u.username, u.email, u.first_name, u.last_name, u.is_verified,
                    u.is_active, u.created_at, u.last_login, u.country, u.city,
                    w.balance, w.bonus_balance, w.total_deposited, w.total_withdrawn,
                    v.total_points, v.lifetime_wagered, v.lifetime_won, v.lifetime_lost,
                    vl.level_name AS vip_level
             FROM users u
             LEFT JOIN user_wallets w ON u.id = w.user_id
             LEFT JOIN user_vip_stats v ON u.id = v.user_id
             LEFT JOIN vip_levels vl ON v.vip_level_id = vl.id
             ORDER BY u.created_at DESC, u.id DESC",
            [],
        )?,
    ))
}

fn export_transactions(conn: &Connection) -> rusqlite::Result<Section> {
    Ok(Section::Rows(
        "transactions",
        query_table(
            conn,
            "SELECT t.id, t.transaction_type, t.amount, t.balance_before, t.balance_after,
                    t.status, t.description, t.created_at, u.username, u.email
             FROM transactions t
             JOIN users u ON t.user_id = u.id
             ORDER BY t.created_at DESC, t.id DESC",
            [],
        )?,
    ))
}

fn export_vip_stats(conn: &Connection) -> rusqlite::Result<Section> {
    Ok(Section::Rows(
        "vip_stats",
        query_table(
            conn,
            "SELECT vl.level_name, vl.min_points_required, vl.cashback_percentage,
                    vl.bonus_multiplier,
                    COUNT(v.user_id) AS user_count,
                    AVG(v.total_points) AS avg_points,
                    SUM(v.lifetime_wagered) AS total_wagered,
                    SUM(v.lifetime_won) AS total_won,
                    SUM(v.lifetime_lost) AS total_lost
             FROM vip_levels vl
             LEFT JOIN user_vip_stats v ON vl.id = v.vip_level_id
             GROUP BY vl.id
             ORDER BY vl.min_points_required",
            [],
        )?,
    ))
}

fn export_game_sessions(conn: &Connection) -> rusqlite::Result<Section> {
    Ok(Section::Rows(
        "game_sessions",
        query_table(
            conn,
            "SELECT gs.id, gs.game_type, gs.total_wagered, gs.total_won, gs.total_lost,
                    gs.games_played, gs.created_at, u.username, u.email
             FROM game_sessions gs
             JOIN users u ON gs.user_id = u.id
             ORDER BY gs.created_at DESC, gs.id DESC",
            [],
        )?,
    ))
}

impl AdminDb {
    /// Runs a report. The date range applies only when both ends are given.
    pub fn report(
        &self,
        kind: ReportKind,
        date_from: Option<&str>,
        date_to: Option<&str>,
    ) -> Result<Dataset> {
        let range = date_from
            .filter(|from| !from.is_empty())
            .zip(date_to.filter(|to| !to.is_empty()));
        let (from, to) = range.unzip();
        let generated_at = Utc::now();
        let title = match kind {
            ReportKind::User => "User Report",
            ReportKind::Vip => "VIP Report",
            ReportKind::Financial => "Financial Report",
            ReportKind::Game => "Game Report",
        };

        let mut sections = vec![report_info(title, &generated_at, range)];
        sections.extend(self.with_conn(|conn| {
            Ok(match kind {
                ReportKind::User => user_report(conn, from, to)?,
                ReportKind::Vip => vip_report(conn, from, to)?,
                ReportKind::Financial => financial_report(conn, from, to)?,
                ReportKind::Game => game_report(conn, from, to)?,
            })
        })?);

        Ok(Dataset {
            origin: Origin::Report {
                kind,
                date_from: from.map(str::to_string),
                date_to: to.map(str::to_string),
            },
            generated_at,
            sections,
        })
    }

    pub fn export(&self, kind: ExportKind) -> Result<Dataset> {
        let generated_at = Utc::now();
        let sections = self.with_conn(|conn| {
            Ok(match kind {
                ExportKind::Users => vec![export_users(conn)?],
                ExportKind::Transactions => vec![export_transactions(conn)?],
                ExportKind::VipStats => vec![export_vip_stats(conn)?],
                ExportKind::GameSessions => vec![export_game_sessions(conn)?],
                ExportKind::All => {
                    let total_tables: i64 = conn.query_row(
                        "SELECT COUNT(*) FROM sqlite_master
                         WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
                        [],
                        |row| row.get(0),
                    )?;
                    let mut metadata = Map::new();
                    metadata.insert(
                        "exported_at".to_string(),
                        Value::from(generated_at.format("%Y-%m-%d %H:%M:%S").to_string()),
                    );
                    metadata.insert("database".to_string(), Value::from("sqlite"));
                    metadata.insert("total_tables".to_string(), Value::from(total_tables));
                    vec![
                        export_users(conn)?,
                        export_transactions(conn)?,
                        export_vip_stats(conn)?,
                        export_game_sessions(conn)?,
                        Section::Rows(
                            "vip_levels",
                            query_table(conn, "SELECT * FROM vip_levels ORDER BY id", [])?,
                        ),
                        Section::Metadata("export_metadata", metadata),
                    ]
                }
            })
        })?;
        Ok(Dataset {
            origin: Origin::Export(kind),
            generated_at,
            sections,
        })
    }

    /// Copies the database into `dir` as `casino_backup_<timestamp>.sqlite`.
    pub fn backup(&self, dir: &Path) -> Result<BackupSummary> {
        std::fs::create_dir_all(dir)?;
        let timestamp = Utc::now().format("%Y-%m-%d_%H-%M-%S").to_string();
        let mut path = dir.join(format!("casino_backup_{timestamp}.sqlite"));
        let mut attempt = 1;
        while path.exists() {
            path = dir.join(format!("casino_backup_{timestamp}_{attempt}.sqlite"));
            attempt += 1;
        }

        let target = path.to_string_lossy().into_owned();
        self.with_conn(|conn| {
            conn.execute("VACUUM INTO ?1", params![target])?;
            Ok(())
        })?;
        let size_bytes = std::fs::metadata(&path)?.len();
        info!(file = %path.display(), size_bytes, "backed up admin database");
        Ok(BackupSummary {
            file: target,
            size_bytes,
            timestamp,
        })
    }
}
