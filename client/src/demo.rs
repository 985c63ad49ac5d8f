//! Admin dashboard backed by the `demo_*` documents of a [`LocalStore`],
//! used when no admin server is reachable.

use crate::{now_iso, Error, LocalStore, Result};
use casino_types::api::DEFAULT_PAGE_LIMIT;
use casino_types::keys::balance_key;
use casino_types::model::{
    BalanceSync, DashboardStats, DemoTransaction, DemoUser, DemoWallet, Transaction,
    TransactionStatus, TransactionType, User, UserDetails, UserSummary, STARTING_VIP_LEVEL,
};
use casino_types::{PagedResponse, Pagination};
use std::collections::BTreeMap;
use tracing::info;

pub const USERS_KEY: &str = "demo_users";
pub const WALLETS_KEY: &str = "demo_wallets";
pub const TRANSACTIONS_KEY: &str = "demo_transactions";

/// Cross-tab notice written after a balance change.
pub const BALANCE_SYNC_KEY: &str = "balance_sync";

const RECENT_TRANSACTIONS: usize = 10;
const DEFAULT_REASON: &str = "Admin balance addition";

pub(crate) type Wallets = BTreeMap<u64, DemoWallet>;

pub(crate) fn read_users(store: &LocalStore) -> Vec<DemoUser> {
    store.read_as(USERS_KEY).unwrap_or_default()
}

pub(crate) fn read_wallets(store: &LocalStore) -> Wallets {
    store.read_as(WALLETS_KEY).unwrap_or_default()
}

/// Users for a read-modify-write; a malformed document is an error.
pub(crate) fn load_users(store: &LocalStore) -> Result<Vec<DemoUser>> {
    Ok(store.load_as(USERS_KEY)?.unwrap_or_default())
}

/// Wallets for a read-modify-write; a malformed document is an error.
pub(crate) fn load_wallets(store: &LocalStore) -> Result<Wallets> {
    Ok(store.load_as(WALLETS_KEY)?.unwrap_or_default())
}

pub(crate) fn next_user_id(users: &[DemoUser]) -> u64 {
    users.iter().map(|user| user.id).max().unwrap_or(0) + 1
}

pub(crate) fn find_by_username<'a>(users: &'a [DemoUser], username: &str) -> Option<&'a DemoUser> {
    users
        .iter()
        .find(|user| user.username.eq_ignore_ascii_case(username))
}

pub(crate) fn new_user(id: u64, username: &str, email: &str, now: &str) -> DemoUser {
    DemoUser {
        id,
        username: username.to_string(),
        email: email.to_string(),
        password: None,
        first_name: String::new(),
        last_name: String::new(),
        is_verified: false,
        is_active: true,
        created_at: now.to_string(),
        last_login: Some(now.to_string()),
    }
}

fn optional(text: &str) -> Option<String> {
    (!text.is_empty()).then(|| text.to_string())
}

fn to_user(user: &DemoUser) -> User {
    User {
        id: user.id as i64,
        username: user.username.clone(),
        email: user.email.clone(),
        first_name: optional(&user.first_name),
        last_name: optional(&user.last_name),
        is_verified: user.is_verified,
        is_active: user.is_active,
        created_at: user.created_at.clone(),
        last_login: user.last_login.clone(),
    }
}

fn to_transaction(transaction: &DemoTransaction) -> Transaction {
    Transaction {
        id: transaction.id as i64,
        user_id: transaction.user_id as i64,
        transaction_type: transaction.transaction_type,
        amount: transaction.amount,
        balance_before: Some(transaction.balance_before),
        balance_after: Some(transaction.balance_after),
        status: transaction.status,
        description: optional(&transaction.description),
        created_at: transaction.created_at.clone(),
        username: None,
        email: None,
    }
}

fn page_bounds(page: u32, limit: u32) -> (u32, u32, usize) {
    let page = page.max(1);
    let limit = limit.max(1);
    let start = (page as usize - 1) * limit as usize;
    (page, limit, start)
}

pub struct LocalAdminDatabase<'a> {
    store: &'a mut LocalStore,
}

impl<'a> LocalAdminDatabase<'a> {
    /// Wraps `store`, seeding a demo user when no user document exists.
    pub fn open(store: &'a mut LocalStore) -> Result<Self> {
        let mut db = Self { store };
        db.ensure_seed_data()?;
        Ok(db)
    }

    fn ensure_seed_data(&mut self) -> Result<()> {
        if self.store.get_item(USERS_KEY).is_some_and(|raw| !raw.is_empty()) {
            return Ok(());
        }
        let now = now_iso();
        let users = vec![DemoUser {
            id: 1,
            username: "demo_user".to_string(),
            email: "demo@example.com".to_string(),
            password: None,
            first_name: "Demo".to_string(),
            last_name: "User".to_string(),
            is_verified: true,
            is_active: true,
            created_at: now.clone(),
            last_login: Some(now.clone()),
        }];
        let wallets: Wallets = BTreeMap::from([(1, DemoWallet::empty(&now))]);
        self.store.write_json(USERS_KEY, &users)?;
        self.store.write_json(WALLETS_KEY, &wallets)?;
        self.store
            .write_json(TRANSACTIONS_KEY, &Vec::<DemoTransaction>::new())?;
        info!("seeded local admin documents");
        Ok(())
    }

    fn transactions(&self) -> Vec<DemoTransaction> {
        self.store.read_as(TRANSACTIONS_KEY).unwrap_or_default()
    }

    fn load_transactions(&self) -> Result<Vec<DemoTransaction>> {
        Ok(self.store.load_as(TRANSACTIONS_KEY)?.unwrap_or_default())
    }

    pub fn stats(&self) -> DashboardStats {
        let users = read_users(self.store);
        let transactions = self.transactions();
        let completed = |kind: TransactionType| {
            transactions
                .iter()
                .filter(move |tx| tx.transaction_type == kind && tx.status == TransactionStatus::Completed)
        };
        DashboardStats {
            total_users: users.len() as i64,
            vip_users: 0,
            total_deposits: completed(TransactionType::Deposit).count() as i64,
            total_deposits_amount: completed(TransactionType::Deposit).map(|tx| tx.amount).sum(),
            total_withdrawals: completed(TransactionType::Withdrawal).count() as i64,
            total_withdrawals_amount: completed(TransactionType::Withdrawal)
                .map(|tx| tx.amount)
                .sum(),
            pending_requests: transactions
                .iter()
                .filter(|tx| tx.status == TransactionStatus::Pending)
                .count() as i64,
            today_new_users: 0,
        }
    }

    /// Users in document order with their wallet fields.
    pub fn users(&self, page: u32, limit: u32) -> PagedResponse<UserSummary> {
        let users = read_users(self.store);
        let wallets = read_wallets(self.store);
        let (page, limit, start) = page_bounds(page, limit);
        let data = users
            .iter()
            .skip(start)
            .take(limit as usize)
            .map(|user| {
                let wallet = wallets.get(&user.id).cloned().unwrap_or_default();
                UserSummary {
                    user: to_user(user),
                    total_points: Some(0),
                    vip_level: Some(STARTING_VIP_LEVEL.to_string()),
                    balance: Some(wallet.balance),
                    bonus_balance: Some(wallet.bonus_balance),
                    total_deposited: Some(wallet.total_deposited),
                    total_withdrawn: Some(wallet.total_withdrawn),
                }
            })
            .collect();
        PagedResponse::new(
            data,
            Pagination::at_least_one_page(page, limit, users.len() as u64),
        )
    }

    /// Case-insensitive substring match on username, email and names.
    pub fn search_users(&self, query: &str, limit: Option<u32>) -> Vec<UserSummary> {
        let query = query.to_lowercase();
        let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT) as usize;
        let wallets = read_wallets(self.store);
        read_users(self.store)
            .iter()
            .filter(|user| {
                [&user.username, &user.email, &user.first_name, &user.last_name]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&query))
            })
            .take(limit)
            .map(|user| UserSummary {
                user: to_user(user),
                total_points: None,
                vip_level: None,
                balance: Some(wallets.get(&user.id).map(|w| w.balance).unwrap_or_default()),
                bonus_balance: None,
                total_deposited: None,
                total_withdrawn: None,
            })
            .collect()
    }

    /// Finds a user by name, creating one with an empty wallet when missing.
    pub fn ensure_user_by_username(&mut self, username: &str) -> Result<DemoUser> {
        let username = username.trim();
        if username.is_empty() {
            return Err(Error::UsernameRequired);
        }
        let mut users = load_users(self.store)?;
        if let Some(user) = find_by_username(&users, username) {
            return Ok(user.clone());
        }
        let mut wallets = load_wallets(self.store)?;
        let now = now_iso();
        let user = new_user(next_user_id(&users), username, "", &now);
        users.push(user.clone());
        self.store.write_json(USERS_KEY, &users)?;

        if !wallets.contains_key(&user.id) {
            wallets.insert(user.id, DemoWallet::empty(&now));
            self.store.write_json(WALLETS_KEY, &wallets)?;
        }
        info!(user_id = user.id, username, "created local user");
        Ok(user)
    }

    /// User with wallet fields and the last ten transactions, newest first.
    pub fn user_details(&self, user_id: u64) -> Result<UserDetails> {
        let users = read_users(self.store);
        let user = users
            .iter()
            .find(|user| user.id == user_id)
            .ok_or(Error::UserNotFound)?;
        let wallet = read_wallets(self.store)
            .remove(&user_id)
            .unwrap_or_default();
        let owned: Vec<DemoTransaction> = self
            .transactions()
            .into_iter()
            .filter(|tx| tx.user_id == user_id)
            .collect();
        let recent_transactions = owned
            .iter()
            .rev()
            .take(RECENT_TRANSACTIONS)
            .map(to_transaction)
            .collect();
        Ok(UserDetails {
            user: to_user(user),
            total_points: None,
            lifetime_wagered: None,
            lifetime_won: None,
            lifetime_lost: None,
            vip_level: None,
            cashback_percentage: None,
            bonus_multiplier: None,
            balance: Some(wallet.balance),
            bonus_balance: Some(wallet.bonus_balance),
            locked_balance: Some(wallet.locked_balance),
            total_deposited: Some(wallet.total_deposited),
            total_withdrawn: Some(wallet.total_withdrawn),
            recent_transactions,
            game_stats: Vec::new(),
        })
    }

    pub fn update_user_status(&mut self, user_id: u64, active: bool) -> Result<()> {
        let mut users = load_users(self.store)?;
        let user = users
            .iter_mut()
            .find(|user| user.id == user_id)
            .ok_or(Error::UserNotFound)?;
        user.is_active = active;
        self.store.write_json(USERS_KEY, &users)
    }

    /// Credits a wallet, mirrors the balance into `balance:<username>` and
    /// appends a completed bonus transaction. Returns the new balance.
    pub fn add_user_balance(&mut self, user_id: u64, amount: f64, reason: &str) -> Result<f64> {
        if user_id == 0 || !amount.is_finite() || amount <= 0.0 {
            return Err(Error::InvalidAmount);
        }
        let now = now_iso();
        let mut wallets = load_wallets(self.store)?;
        let users = load_users(self.store)?;
        let mut transactions = self.load_transactions()?;
        let wallet = wallets
            .entry(user_id)
            .or_insert_with(|| DemoWallet::empty(&now));
        let before = wallet.balance;
        wallet.balance = before + amount;
        wallet.total_deposited += amount;
        wallet.updated_at = now.clone();
        let after = wallet.balance;
        self.store.write_json(WALLETS_KEY, &wallets)?;

        if let Some(user) = users.iter().find(|user| user.id == user_id) {
            self.store
                .set_item(&balance_key(&user.username), after.to_string())?;
            let notice = BalanceSync {
                username: user.username.clone(),
                balance: after,
                ts: chrono::Utc::now().timestamp_millis().max(0) as u64,
            };
            self.store.write_json(BALANCE_SYNC_KEY, &notice)?;
        }

        let reason = reason.trim();
        transactions.push(DemoTransaction {
            id: transactions.len() as u64 + 1,
            user_id,
            transaction_type: TransactionType::Bonus,
            amount,
            balance_before: before,
            balance_after: after,
            status: TransactionStatus::Completed,
            description: if reason.is_empty() {
                DEFAULT_REASON.to_string()
            } else {
                reason.to_string()
            },
            created_at: now,
        });
        self.store.write_json(TRANSACTIONS_KEY, &transactions)?;
        info!(user_id, amount, balance = after, "added local balance");
        Ok(after)
    }

    pub fn transactions_page(&self, page: u32, limit: u32) -> PagedResponse<Transaction> {
        let transactions = self.transactions();
        let (page, limit, start) = page_bounds(page, limit);
        let data = transactions
            .iter()
            .skip(start)
            .take(limit as usize)
            .map(to_transaction)
            .collect();
        PagedResponse::new(
            data,
            Pagination::at_least_one_page(page, limit, transactions.len() as u64),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn seeds_demo_user_once() {
        let mut store = LocalStore::in_memory();
        {
            let db = LocalAdminDatabase::open(&mut store).unwrap();
            let stats = db.stats();
            assert_eq!(stats.total_users, 1);
            assert_eq!(stats.total_deposits, 0);
        }
        let users = read_users(&store);
        assert_eq!(users[0].username, "demo_user");
        assert_eq!(read_wallets(&store)[&1].balance, 0.0);

        store
            .write_json(USERS_KEY, &vec![new_user(7, "zed", "", "now")])
            .unwrap();
        LocalAdminDatabase::open(&mut store).unwrap();
        assert_eq!(read_users(&store).len(), 1);
        assert_eq!(read_users(&store)[0].id, 7);
    }

    #[test]
    fn paging_and_search() {
        let mut store = LocalStore::in_memory();
        let mut db = LocalAdminDatabase::open(&mut store).unwrap();
        for name in ["alice", "bob", "carol"] {
            db.ensure_user_by_username(name).unwrap();
        }

        let page = db.users(2, 3);
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.data[0].user.username, "carol");
        assert_eq!(page.pagination.total, 4);
        assert_eq!(page.pagination.pages, 2);
        assert_eq!(page.data[0].vip_level.as_deref(), Some("Bronze"));

        let empty = db.users(5, 20);
        assert!(empty.data.is_empty());
        assert_eq!(empty.pagination.pages, 1);

        let found = db.search_users("AL", None);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].user.username, "alice");
        assert_eq!(db.search_users("demo", Some(5))[0].user.email, "demo@example.com");
        assert_eq!(db.search_users("", Some(2)).len(), 2);
    }

    #[test]
    fn ensure_user_is_case_insensitive() {
        let mut store = LocalStore::in_memory();
        let mut db = LocalAdminDatabase::open(&mut store).unwrap();
        let created = db.ensure_user_by_username("  Erin ").unwrap();
        assert_eq!(created.id, 2);
        assert_eq!(created.username, "Erin");
        let again = db.ensure_user_by_username("erin").unwrap();
        assert_eq!(again.id, 2);
        assert!(matches!(
            db.ensure_user_by_username("   "),
            Err(Error::UsernameRequired)
        ));
        assert!(read_wallets(&store).contains_key(&2));
    }

    #[test]
    fn add_balance_updates_wallet_key_and_history() {
        let mut store = LocalStore::in_memory();
        let mut db = LocalAdminDatabase::open(&mut store).unwrap();
        assert_eq!(db.add_user_balance(1, 25.0, "").unwrap(), 25.0);
        assert_eq!(db.add_user_balance(1, 5.5, "promo").unwrap(), 30.5);
        assert!(matches!(db.add_user_balance(1, 0.0, ""), Err(Error::InvalidAmount)));
        assert!(matches!(db.add_user_balance(0, 5.0, ""), Err(Error::InvalidAmount)));
        assert!(matches!(
            db.add_user_balance(1, f64::NAN, ""),
            Err(Error::InvalidAmount)
        ));

        let details = db.user_details(1).unwrap();
        assert_eq!(details.balance, Some(30.5));
        assert_eq!(details.total_deposited, Some(30.5));
        assert_eq!(details.recent_transactions.len(), 2);
        assert_eq!(details.recent_transactions[0].description.as_deref(), Some("promo"));
        assert_eq!(
            details.recent_transactions[1].description.as_deref(),
            Some("Admin balance addition")
        );
        assert_eq!(details.recent_transactions[0].balance_before, Some(25.0));

        let page = db.transactions_page(1, 20);
        assert_eq!(page.pagination.total, 2);
        assert_eq!(page.data[0].id, 1);

        assert!(matches!(db.user_details(42), Err(Error::UserNotFound)));

        assert_eq!(store.get_item("balance:demo_user"), Some("30.5"));
        let notice: BalanceSync = store.read_as(BALANCE_SYNC_KEY).unwrap();
        assert_eq!(notice.username, "demo_user");
        assert_eq!(notice.balance, 30.5);
    }

    #[test]
    fn details_keep_last_ten_transactions() {
        let mut store = LocalStore::in_memory();
        let mut db = LocalAdminDatabase::open(&mut store).unwrap();
        for amount in 1..=12 {
            db.add_user_balance(1, f64::from(amount), "").unwrap();
        }
        let details = db.user_details(1).unwrap();
        assert_eq!(details.recent_transactions.len(), 10);
        assert_eq!(details.recent_transactions[0].amount, 12.0);
        assert_eq!(details.recent_transactions[9].amount, 3.0);
    }

    #[test]
    fn status_update_and_stats() {
        let mut store = LocalStore::in_memory();
        store
            .write_json(
                TRANSACTIONS_KEY,
                &serde_json::json!([
                    { "id": 1, "user_id": 1, "transaction_type": "deposit", "amount": 50.0,
                      "status": "completed" },
                    { "id": 2, "user_id": 1, "transaction_type": "withdrawal", "amount": 20.0,
                      "status": "completed" },
                    { "id": 3, "user_id": 1, "transaction_type": "withdrawal", "amount": 5.0,
                      "status": "pending" },
                ]),
            )
            .unwrap();
        let mut db = LocalAdminDatabase::open(&mut store).unwrap();
        let stats = db.stats();
        assert_eq!(stats.total_deposits, 1);
        assert_eq!(stats.total_deposits_amount, 50.0);
        assert_eq!(stats.total_withdrawals, 1);
        assert_eq!(stats.total_withdrawals_amount, 20.0);
        assert_eq!(stats.pending_requests, 1);

        db.update_user_status(1, false).unwrap();
        assert!(!read_users(&store)[0].is_active);
        let mut db = LocalAdminDatabase::open(&mut store).unwrap();
        assert!(matches!(db.update_user_status(9, true), Err(Error::UserNotFound)));
    }

    #[test]
    fn mutations_keep_browser_written_users() {
        let mut store = LocalStore::in_memory();
        store
            .write_json(
                USERS_KEY,
                &json!([
                    { "id": 1, "username": "alice", "email": null },
                    { "id": "2", "username": "carol", "email": "c@x.com", "phone": "555" },
                ]),
            )
            .unwrap();
        store
            .write_json(WALLETS_KEY, &json!({ "2": { "balance": 40, "bonus_balance": null } }))
            .unwrap();

        let mut db = LocalAdminDatabase::open(&mut store).unwrap();
        let bob = db.ensure_user_by_username("bob").unwrap();
        assert_eq!(bob.id, 3);
        assert_eq!(db.users(1, 20).pagination.total, 3);
        assert_eq!(db.add_user_balance(2, 10.0, "").unwrap(), 50.0);

        let users = read_users(&store);
        let names: Vec<&str> = users.iter().map(|user| user.username.as_str()).collect();
        assert_eq!(names, ["alice", "carol", "bob"]);
        assert_eq!(users[0].email, "");
        assert_eq!(users[1].id, 2);
        let wallets = read_wallets(&store);
        assert_eq!(wallets[&2].balance, 50.0);
        assert!(wallets.contains_key(&3));
    }

    #[test]
    fn malformed_documents_are_never_overwritten() {
        let mut store = LocalStore::in_memory();
        let users = r#"[{"id":"abc","username":"alice"},{"id":2,"username":"carol"}]"#;
        store.set_item(USERS_KEY, users).unwrap();

        let mut db = LocalAdminDatabase::open(&mut store).unwrap();
        assert!(db.users(1, 20).data.is_empty());
        assert!(matches!(
            db.ensure_user_by_username("bob"),
            Err(Error::MalformedDocument { ref key, .. }) if key == USERS_KEY
        ));
        assert!(db.update_user_status(2, false).is_err());
        assert_eq!(store.get_item(USERS_KEY), Some(users));

        store.write_json(USERS_KEY, &vec![new_user(1, "dave", "", "now")]).unwrap();
        let wallets = r#"{"1":{"balance":5}}"#;
        store.set_item(WALLETS_KEY, wallets).unwrap();
        let transactions = r#"[{"id":1,"user_id":1,"transaction_type":"jackpot","amount":5,"status":"completed"}]"#;
        store.set_item(TRANSACTIONS_KEY, transactions).unwrap();

        let mut db = LocalAdminDatabase::open(&mut store).unwrap();
        assert!(matches!(
            db.add_user_balance(1, 10.0, ""),
            Err(Error::MalformedDocument { ref key, .. }) if key == TRANSACTIONS_KEY
        ));
        assert_eq!(store.get_item(WALLETS_KEY), Some(wallets));
        assert_eq!(store.get_item(TRANSACTIONS_KEY), Some(transactions));
        assert!(store.get_item("balance:dave").is_none());
    }
}
