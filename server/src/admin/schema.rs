use rusqlite::Connection;

/// Creates every admin table and seeds the VIP ladder.
pub(super) fn init(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;

         CREATE TABLE IF NOT EXISTS users (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             email TEXT NOT NULL UNIQUE,
             password_hash TEXT NOT NULL,
             username TEXT NOT NULL UNIQUE,
             first_name TEXT,
             last_name TEXT,
             country TEXT,
             city TEXT,
             is_verified INTEGER NOT NULL DEFAULT 0,
             is_active INTEGER NOT NULL DEFAULT 1,
             created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
             last_login TEXT
         );

         CREATE TABLE IF NOT EXISTS vip_levels (
             id INTEGER PRIMARY KEY,
             level_name TEXT NOT NULL UNIQUE,
             min_points_required INTEGER NOT NULL DEFAULT 0,
             cashback_percentage REAL NOT NULL DEFAULT 0,
             bonus_multiplier REAL NOT NULL DEFAULT 1
         );

         CREATE TABLE IF NOT EXISTS user_vip_stats (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             user_id INTEGER NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
             vip_level_id INTEGER NOT NULL DEFAULT 1 REFERENCES vip_levels(id),
             total_points INTEGER NOT NULL DEFAULT 0,
             current_month_points INTEGER NOT NULL DEFAULT 0,
             lifetime_wagered REAL NOT NULL DEFAULT 0,
             lifetime_won REAL NOT NULL DEFAULT 0,
             lifetime_lost REAL NOT NULL DEFAULT 0,
             created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
             updated_at TEXT
         );

         CREATE TABLE IF NOT EXISTS user_wallets (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             user_id INTEGER NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
             balance REAL NOT NULL DEFAULT 0,
             bonus_balance REAL NOT NULL DEFAULT 0,
             locked_balance REAL NOT NULL DEFAULT 0,
             total_deposited REAL NOT NULL DEFAULT 0,
             total_withdrawn REAL NOT NULL DEFAULT 0,
             created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
             updated_at TEXT
         );

         CREATE TABLE IF NOT EXISTS transactions (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
             transaction_type TEXT NOT NULL CHECK (transaction_type IN
                 ('deposit', 'withdrawal', 'bet', 'win', 'bonus', 'refund', 'transfer')),
             amount REAL NOT NULL,
             balance_before REAL,
             balance_after REAL,
             status TEXT NOT NULL DEFAULT 'pending' CHECK (status IN
                 ('pending', 'completed', 'failed', 'cancelled')),
             description TEXT,
             created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
         );
         CREATE INDEX IF NOT EXISTS idx_transactions_user ON transactions(user_id);
         CREATE INDEX IF NOT EXISTS idx_transactions_created ON transactions(created_at);

         CREATE TABLE IF NOT EXISTS game_sessions (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
             game_type TEXT NOT NULL,
             total_wagered REAL NOT NULL DEFAULT 0,
             total_won REAL NOT NULL DEFAULT 0,
             total_lost REAL NOT NULL DEFAULT 0,
             games_played INTEGER NOT NULL DEFAULT 0,
             created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
         );
         CREATE INDEX IF NOT EXISTS idx_game_sessions_user ON game_sessions(user_id);

         CREATE TABLE IF NOT EXISTS user_activity_logs (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             user_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
             activity_type TEXT NOT NULL,
             description TEXT,
             ip_address TEXT,
             created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
         );
         CREATE INDEX IF NOT EXISTS idx_activity_user ON user_activity_logs(user_id);
         CREATE INDEX IF NOT EXISTS idx_activity_created ON user_activity_logs(created_at);

         CREATE TABLE IF NOT EXISTS user_preferences (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             user_id INTEGER NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
             language TEXT NOT NULL DEFAULT 'en',
             currency TEXT NOT NULL DEFAULT 'USD',
             timezone TEXT NOT NULL DEFAULT 'UTC',
             created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
         );

         CREATE TABLE IF NOT EXISTS admin_users (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             username TEXT NOT NULL UNIQUE,
             email TEXT NOT NULL UNIQUE,
             password_hash TEXT NOT NULL,
             role TEXT NOT NULL DEFAULT 'admin',
             is_active INTEGER NOT NULL DEFAULT 1,
             created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
             last_login TEXT
         );

         INSERT OR IGNORE INTO vip_levels
             (id, level_name, min_points_required, cashback_percentage, bonus_multiplier)
         VALUES
             (1, 'Bronze', 0, 0, 1.0),
             (2, 'Silver', 1000, 5, 1.1),
             (3, 'Gold', 5000, 10, 1.25),
             (4, 'Platinum', 20000, 15, 1.5),
             (5, 'Diamond', 50000, 20, 2.0);",
    )
}
