use super::{AdminDb, Error, Result};
use argon2::password_hash::{PasswordHasher, SaltString};
use argon2::Argon2;
use casino_types::admin::{
    AddBalanceRequest, RegisteredUser, RegistrationRequest, RepairSummary, SeedSummary,
};
use casino_types::model::{is_valid_email, STARTING_VIP_LEVEL, STARTING_VIP_LEVEL_ID};
use rusqlite::{params, OptionalExtension, Transaction};
use tracing::info;

/// Description recorded on admin balance additions without a reason.
pub const DEFAULT_BALANCE_REASON: &str = "Admin balance addition";

/// Minimum password length accepted at registration.
pub const MIN_PASSWORD_LEN: usize = 6;

const DEMO_ADMIN: (&str, &str, &str) = ("admin", "admin@casino.com", "admin123");
const DEMO_USER: (&str, &str, &str) = ("demo_user", "user@casino.com", "user123");

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut rand::rngs::OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| Error::Hash(err.to_string()))
}

/// Zero wallet, starting VIP row and default preferences for a new user.
fn create_user_records(tx: &Transaction<'_>, user_id: i64) -> rusqlite::Result<()> {
    tx.execute(
        "INSERT INTO user_wallets
             (user_id, balance, bonus_balance, locked_balance, total_deposited, total_withdrawn)
         VALUES (?1, 0, 0, 0, 0, 0)",
        params![user_id],
    )?;
    tx.execute(
        "INSERT INTO user_vip_stats
             (user_id, vip_level_id, total_points, current_month_points,
              lifetime_wagered, lifetime_won, lifetime_lost)
         VALUES (?1, ?2, 0, 0, 0, 0, 0)",
        params![user_id, STARTING_VIP_LEVEL_ID],
    )?;
    tx.execute(
        "INSERT INTO user_preferences (user_id, language, currency, timezone)
         VALUES (?1, 'en', 'USD', 'UTC')",
        params![user_id],
    )?;
    Ok(())
}

fn required<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| Error::bad_request(format!("Missing required field: {field}")))
}

impl AdminDb {
    pub fn update_user_status(&self, user_id: Option<i64>, active: Option<bool>) -> Result<()> {
        let (Some(user_id), Some(active)) = (user_id, active) else {
            return Err(Error::bad_request("User ID and status are required"));
        };
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET is_active = ?1 WHERE id = ?2",
                params![active, user_id],
            )?;
            if changed == 0 {
                return Err(Error::not_found("User not found or no changes made"));
            }
            info!(user_id, active, "updated user status");
            Ok(())
        })
    }

    /// Credits a wallet and records a completed bonus transaction.
    ///
    /// Returns the new balance.
    pub fn add_user_balance(&self, request: &AddBalanceRequest) -> Result<f64> {
        let (Some(user_id), Some(amount)) = (request.user_id, request.amount) else {
            return Err(Error::bad_request("User ID and amount are required"));
        };
        if !amount.is_finite() || amount <= 0.0 {
            return Err(Error::bad_request("Amount must be greater than 0"));
        }
        let reason = request
            .reason
            .as_deref()
            .map(str::trim)
            .filter(|reason| !reason.is_empty())
            .unwrap_or(DEFAULT_BALANCE_REASON);

        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let before: Option<f64> = tx
                .query_row(
                    "SELECT balance FROM user_wallets WHERE user_id = ?1",
                    params![user_id],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(before) = before else {
                return Err(Error::not_found("User wallet not found"));
            };
            let after = before + amount;
            tx.execute(
                "UPDATE user_wallets
                 SET balance = balance + ?1,
                     total_deposited = total_deposited + ?1,
                     updated_at = CURRENT_TIMESTAMP
                 WHERE user_id = ?2",
                params![amount, user_id],
            )?;
            tx.execute(
                "INSERT INTO transactions
                     (user_id, transaction_type, amount, balance_before, balance_after, status, description)
                 VALUES (?1, 'bonus', ?2, ?3, ?4, 'completed', ?5)",
                params![user_id, amount, before, after, reason],
            )?;
            tx.commit()?;
            info!(user_id, amount, balance = after, "added user balance");
            Ok(after)
        })
    }

    /// Zeroes every wallet and VIP counter. Returns the number of wallets touched.
    pub fn reset_all_balances(&self, ip_address: &str) -> Result<u64> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let affected = tx.execute(
                "UPDATE user_wallets
                 SET balance = 0, bonus_balance = 0, locked_balance = 0,
                     total_deposited = 0, total_withdrawn = 0,
                     updated_at = CURRENT_TIMESTAMP",
                [],
            )?;
            tx.execute(
                "UPDATE user_vip_stats
                 SET total_points = 0, current_month_points = 0,
                     lifetime_wagered = 0, lifetime_won = 0, lifetime_lost = 0,
                     updated_at = CURRENT_TIMESTAMP",
                [],
            )?;
            tx.execute(
                "INSERT INTO user_activity_logs (user_id, activity_type, description, ip_address)
                 VALUES (NULL, 'admin_action', 'Admin reset all user balances to zero', ?1)",
                params![ip_address],
            )?;
            tx.commit()?;
            info!(affected, "reset all balances");
            Ok(affected as u64)
        })
    }

    pub fn register_user(
        &self,
        request: &RegistrationRequest,
        ip_address: &str,
    ) -> Result<RegisteredUser> {
        let email = required(&request.email, "email")?;
        let password = request
            .password
            .as_deref()
            .filter(|password| !password.is_empty())
            .ok_or_else(|| Error::bad_request("Missing required field: password"))?;
        let username = required(&request.username, "username")?;
        let first_name = required(&request.first_name, "first_name")?;
        let last_name = required(&request.last_name, "last_name")?;

        if !is_valid_email(email) {
            return Err(Error::bad_request("Invalid email format"));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(Error::bad_request(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters long"
            )));
        }

        self.with_conn(|conn| {
            let email_taken: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)",
                params![email],
                |row| row.get(0),
            )?;
            if email_taken {
                return Err(Error::Conflict("Email already registered".to_string()));
            }
            let username_taken: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
                params![username],
                |row| row.get(0),
            )?;
            if username_taken {
                return Err(Error::Conflict("Username already taken".to_string()));
            }

            let password_hash = hash_password(password)?;
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO users
                     (email, password_hash, username, first_name, last_name, is_verified, is_active)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0, 1)",
                params![email, password_hash, username, first_name, last_name],
            )?;
            let user_id = tx.last_insert_rowid();
            create_user_records(&tx, user_id)?;
            tx.execute(
                "INSERT INTO user_activity_logs (user_id, activity_type, description, ip_address)
                 VALUES (?1, 'registration', 'User account created', ?2)",
                params![user_id, ip_address],
            )?;
            tx.commit()?;
            info!(user_id, username, "registered user");

            Ok(RegisteredUser {
                user_id,
                username: username.to_string(),
                email: email.to_string(),
                balance: 0.0,
                vip_level: STARTING_VIP_LEVEL.to_string(),
                points: 0,
            })
        })
    }

    /// Clears balances that were never funded and backfills missing wallet and
    /// VIP rows.
    pub fn repair_wallets(&self) -> Result<RepairSummary> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let balances_reset = tx.execute(
                "UPDATE user_wallets
                 SET balance = 0, bonus_balance = 0, locked_balance = 0,
                     total_withdrawn = 0, updated_at = CURRENT_TIMESTAMP
                 WHERE (balance > 0 OR bonus_balance > 0) AND total_deposited = 0",
                [],
            )?;
            let wallets_created = tx.execute(
                "INSERT INTO user_wallets
                     (user_id, balance, bonus_balance, locked_balance, total_deposited, total_withdrawn)
                 SELECT u.id, 0, 0, 0, 0, 0
                 FROM users u
                 LEFT JOIN user_wallets w ON u.id = w.user_id
                 WHERE w.id IS NULL",
                [],
            )?;
            let vip_records_created = tx.execute(
                "INSERT INTO user_vip_stats
                     (user_id, vip_level_id, total_points, current_month_points,
                      lifetime_wagered, lifetime_won, lifetime_lost)
                 SELECT u.id, ?1, 0, 0, 0, 0, 0
                 FROM users u
                 LEFT JOIN user_vip_stats v ON u.id = v.user_id
                 WHERE v.id IS NULL",
                params![STARTING_VIP_LEVEL_ID],
            )?;
            tx.commit()?;
            let summary = RepairSummary {
                balances_reset: balances_reset as u64,
                wallets_created: wallets_created as u64,
                vip_records_created: vip_records_created as u64,
            };
            info!(?summary, "repaired wallets");
            Ok(summary)
        })
    }

    /// Inserts the demo admin, the demo player and their sample history.
    ///
    /// Rows that already exist are left alone, so seeding twice is a no-op.
    pub fn seed_demo(&self) -> Result<SeedSummary> {
        self.with_conn(|conn| {
            let mut summary = SeedSummary::default();
            let tx = conn.transaction()?;

            let (admin_name, admin_email, admin_password) = DEMO_ADMIN;
            let admin_exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM admin_users WHERE username = ?1)",
                params![admin_name],
                |row| row.get(0),
            )?;
            if !admin_exists {
                tx.execute(
                    "INSERT INTO admin_users (username, email, password_hash, role)
                     VALUES (?1, ?2, ?3, 'super_admin')",
                    params![admin_name, admin_email, hash_password(admin_password)?],
                )?;
                summary.admin_created = true;
            }

            let (user_name, user_email, user_password) = DEMO_USER;
            let existing: Option<i64> = tx
                .query_row(
                    "SELECT id FROM users WHERE username = ?1",
                    params![user_name],
                    |row| row.get(0),
                )
                .optional()?;
            let user_id = match existing {
                Some(id) => id,
                None => {
                    tx.execute(
                        "INSERT INTO users
                             (email, password_hash, username, first_name, last_name, is_verified, is_active)
                         VALUES (?1, ?2, ?3, 'Demo', 'User', 1, 1)",
                        params![user_email, hash_password(user_password)?, user_name],
                    )?;
                    let id = tx.last_insert_rowid();
                    create_user_records(&tx, id)?;
                    summary.demo_user_created = true;
                    id
                }
            };

            let has_transactions: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM transactions WHERE user_id = ?1)",
                params![user_id],
                |row| row.get(0),
            )?;
            if !has_transactions {
                summary.transactions_created = tx.execute(
                    "INSERT INTO transactions
                         (user_id, transaction_type, amount, balance_before, balance_after, status, description)
                     VALUES
                         (?1, 'deposit', 500.0, 0.0, 500.0, 'completed', 'Initial deposit'),
                         (?1, 'bet', 50.0, 500.0, 450.0, 'completed', 'Game bet'),
                         (?1, 'win', 75.0, 450.0, 525.0, 'completed', 'Game win')",
                    params![user_id],
                )? as u64;
                tx.execute(
                    "UPDATE user_wallets
                     SET balance = 525.0, total_deposited = 500.0, updated_at = CURRENT_TIMESTAMP
                     WHERE user_id = ?1",
                    params![user_id],
                )?;
            }

            let has_sessions: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM game_sessions WHERE user_id = ?1)",
                params![user_id],
                |row| row.get(0),
            )?;
            if !has_sessions {
                summary.game_sessions_created = tx.execute(
                    "INSERT INTO game_sessions
                         (user_id, game_type, total_wagered, total_won, total_lost, games_played)
                     VALUES
                         (?1, 'slots', 200.0, 150.0, 50.0, 10),
                         (?1, 'blackjack', 300.0, 250.0, 50.0, 5)",
                    params![user_id],
                )? as u64;
            }

            tx.commit()?;
            info!(?summary, "seeded demo data");
            Ok(summary)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casino_types::api::PageQuery;
    use casino_types::model::{TransactionStatus, TransactionType};

    fn registration(username: &str, email: &str) -> RegistrationRequest {
        RegistrationRequest {
            email: Some(email.to_string()),
            password: Some("secret1".to_string()),
            username: Some(username.to_string()),
            first_name: Some("Test".to_string()),
            last_name: Some("Player".to_string()),
        }
    }

    #[test]
    fn registration_creates_every_record() {
        let db = AdminDb::open_in_memory().unwrap();
        let user = db
            .register_user(&registration("kim", "kim@casino.com"), "127.0.0.1")
            .unwrap();
        assert_eq!(user.vip_level, "Bronze");
        assert_eq!(user.balance, 0.0);

        let details = db.user_details(Some(user.user_id)).unwrap();
        assert_eq!(details.balance, Some(0.0));
        assert_eq!(details.vip_level.as_deref(), Some("Bronze"));
        assert!(details.user.is_active);
        assert!(!details.user.is_verified);

        let activity = db.user_activity(Some(user.user_id), 10).unwrap();
        assert_eq!(activity.len(), 1);
        assert_eq!(activity[0].activity_type, "registration");
        assert_eq!(activity[0].ip_address.as_deref(), Some("127.0.0.1"));

        let stored_hash: String = db
            .with_conn(|conn| {
                Ok(conn.query_row(
                    "SELECT password_hash FROM users WHERE id = ?1",
                    params![user.user_id],
                    |row| row.get(0),
                )?)
            })
            .unwrap();
        assert!(stored_hash.starts_with("$argon2"));
    }

    #[test]
    fn registration_validates_input() {
        let db = AdminDb::open_in_memory().unwrap();
        let mut request = registration("lee", "lee@casino.com");
        request.last_name = Some("  ".to_string());
        match db.register_user(&request, "ip") {
            Err(Error::BadRequest(message)) => {
                assert_eq!(message, "Missing required field: last_name")
            }
            other => panic!("unexpected result: {other:?}"),
        }

        let mut request = registration("lee", "lee-at-casino");
        request.email = Some("lee-at-casino".to_string());
        assert!(matches!(
            db.register_user(&request, "ip"),
            Err(Error::BadRequest(message)) if message == "Invalid email format"
        ));

        let mut request = registration("lee", "lee@casino.com");
        request.password = Some("12345".to_string());
        assert!(matches!(
            db.register_user(&request, "ip"),
            Err(Error::BadRequest(message)) if message.starts_with("Password must be")
        ));
    }

    #[test]
    fn registration_rejects_duplicates() {
        let db = AdminDb::open_in_memory().unwrap();
        db.register_user(&registration("mia", "mia@casino.com"), "ip")
            .unwrap();
        assert!(matches!(
            db.register_user(&registration("other", "mia@casino.com"), "ip"),
            Err(Error::Conflict(message)) if message == "Email already registered"
        ));
        assert!(matches!(
            db.register_user(&registration("mia", "other@casino.com"), "ip"),
            Err(Error::Conflict(message)) if message == "Username already taken"
        ));
    }

    #[test]
    fn add_balance_updates_wallet_and_records_bonus() {
        let db = AdminDb::open_in_memory().unwrap();
        let user = db
            .register_user(&registration("ned", "ned@casino.com"), "ip")
            .unwrap();
        let balance = db
            .add_user_balance(&AddBalanceRequest {
                user_id: Some(user.user_id),
                amount: Some(100.0),
                reason: None,
            })
            .unwrap();
        assert_eq!(balance, 100.0);

        let details = db.user_details(Some(user.user_id)).unwrap();
        assert_eq!(details.balance, Some(100.0));
        assert_eq!(details.total_deposited, Some(100.0));
        let tx = &details.recent_transactions[0];
        assert_eq!(tx.transaction_type, TransactionType::Bonus);
        assert_eq!(tx.status, TransactionStatus::Completed);
        assert_eq!(tx.balance_before, Some(0.0));
        assert_eq!(tx.balance_after, Some(100.0));
        assert_eq!(tx.description.as_deref(), Some(DEFAULT_BALANCE_REASON));
    }

    #[test]
    fn add_balance_rejects_bad_requests() {
        let db = AdminDb::open_in_memory().unwrap();
        for amount in [0.0, -5.0, f64::NAN] {
            assert!(matches!(
                db.add_user_balance(&AddBalanceRequest {
                    user_id: Some(1),
                    amount: Some(amount),
                    reason: None,
                }),
                Err(Error::BadRequest(message)) if message == "Amount must be greater than 0"
            ));
        }
        assert!(matches!(
            db.add_user_balance(&AddBalanceRequest::default()),
            Err(Error::BadRequest(_))
        ));
        assert!(matches!(
            db.add_user_balance(&AddBalanceRequest {
                user_id: Some(42),
                amount: Some(1.0),
                reason: None,
            }),
            Err(Error::NotFound(_))
        ));
        let transactions = db.transactions(&PageQuery::default(), None, None).unwrap();
        assert_eq!(transactions.pagination.total, 0);
    }

    #[test]
    fn status_updates_need_existing_user() {
        let db = AdminDb::open_in_memory().unwrap();
        let user = db
            .register_user(&registration("oz", "oz@casino.com"), "ip")
            .unwrap();
        db.update_user_status(Some(user.user_id), Some(false))
            .unwrap();
        assert!(!db.user_details(Some(user.user_id)).unwrap().user.is_active);
        assert!(matches!(
            db.update_user_status(Some(999), Some(true)),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            db.update_user_status(Some(user.user_id), None),
            Err(Error::BadRequest(_))
        ));
    }

    #[test]
    fn reset_zeroes_every_wallet() {
        let db = AdminDb::open_in_memory().unwrap();
        for name in ["pat", "quin"] {
            let user = db
                .register_user(&registration(name, &format!("{name}@casino.com")), "ip")
                .unwrap();
            db.add_user_balance(&AddBalanceRequest {
                user_id: Some(user.user_id),
                amount: Some(25.0),
                reason: Some("promo".to_string()),
            })
            .unwrap();
        }
        assert_eq!(db.reset_all_balances("10.0.0.1").unwrap(), 2);

        let users = db.users(&PageQuery::default()).unwrap();
        assert!(users.data.iter().all(|user| user.balance == Some(0.0)));
        assert!(users
            .data
            .iter()
            .all(|user| user.total_deposited == Some(0.0)));
        let logs = db
            .activity_logs(&casino_types::admin::ActivityLogQuery {
                activity_type: Some("admin_action".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(logs.data.len(), 1);
        assert_eq!(logs.data[0].user_id, None);
    }

    #[test]
    fn repair_backfills_missing_rows() {
        let db = AdminDb::open_in_memory().unwrap();
        db.with_conn(|conn| {
            conn.execute_batch(
                "INSERT INTO users (email, password_hash, username) VALUES ('r@c.com', 'x', 'rae');
                 INSERT INTO users (email, password_hash, username) VALUES ('s@c.com', 'x', 'sal');
                 INSERT INTO user_wallets (user_id, balance) VALUES (2, 999.0);",
            )?;
            Ok(())
        })
        .unwrap();

        let summary = db.repair_wallets().unwrap();
        assert_eq!(
            summary,
            RepairSummary {
                balances_reset: 1,
                wallets_created: 1,
                vip_records_created: 2,
            }
        );
        assert_eq!(db.repair_wallets().unwrap(), RepairSummary::default());
    }

    #[test]
    fn seeding_is_idempotent() {
        let db = AdminDb::open_in_memory().unwrap();
        let first = db.seed_demo().unwrap();
        assert!(first.admin_created);
        assert!(first.demo_user_created);
        assert_eq!(first.transactions_created, 3);
        assert_eq!(first.game_sessions_created, 2);
        assert_eq!(db.seed_demo().unwrap(), SeedSummary::default());

        let games = db.game_stats().unwrap();
        assert_eq!(games[0].game_type, "blackjack");
        assert_eq!(games[0].total_wagered, 300.0);
        let stats = db.stats().unwrap();
        assert_eq!(stats.total_deposits_amount, 500.0);
    }
}
