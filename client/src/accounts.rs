//! Player signup and login against the local `demo_users` document.

use crate::demo::{
    find_by_username, load_users, load_wallets, new_user, next_user_id, read_users, USERS_KEY,
    WALLETS_KEY,
};
use crate::{now_iso, Client, Error, LocalStore, Result};
use casino_types::keys::balance_key;
use casino_types::model::{is_valid_email, DemoUser, DemoWallet};
use serde_json::{json, Map};
use tracing::{info, warn};

/// Session keys of the signed-in player.
pub const USERNAME_KEY: &str = "username";
pub const EMAIL_KEY: &str = "email";
pub const PASSWORD_KEY: &str = "password";
pub const LOGGED_IN_KEY: &str = "loggedIn";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signup {
    pub username: String,
    pub email: String,
    pub password: String,
}

fn same(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// Creates an account in the local store.
///
/// With a client, the new user, wallets and `balance:<username>` are pushed
/// in one batch. A failed push is logged and does not undo the signup.
pub async fn signup(
    store: &mut LocalStore,
    client: Option<&Client>,
    request: &Signup,
) -> Result<DemoUser> {
    if !is_valid_email(&request.email) {
        return Err(Error::InvalidEmail);
    }
    let mut users = load_users(store)?;
    let mut wallets = load_wallets(store)?;
    if users.iter().any(|user| same(&user.username, &request.username)) {
        return Err(Error::UsernameTaken);
    }
    if users.iter().any(|user| same(&user.email, &request.email)) {
        return Err(Error::EmailTaken);
    }

    store.set_item(USERNAME_KEY, request.username.as_str())?;
    store.set_item(EMAIL_KEY, request.email.as_str())?;
    store.set_item(PASSWORD_KEY, request.password.as_str())?;

    let now = now_iso();
    let mut user = new_user(next_user_id(&users), &request.username, &request.email, &now);
    user.password = Some(request.password.clone());
    users.push(user.clone());
    store.write_json(USERS_KEY, &users)?;

    wallets
        .entry(user.id)
        .or_insert_with(|| DemoWallet::empty(&now));
    store.write_json(WALLETS_KEY, &wallets)?;
    info!(user_id = user.id, username = user.username.as_str(), "signed up");

    if let Some(client) = client {
        let mut items = Map::new();
        items.insert(USERS_KEY.to_string(), serde_json::to_value(&users)?);
        items.insert(WALLETS_KEY.to_string(), serde_json::to_value(&wallets)?);
        items.insert(balance_key(&user.username), json!(0));
        if let Err(err) = client.storage_set_batch(&items).await {
            warn!(?err, username = user.username.as_str(), "failed to push signup");
        }
    }
    Ok(user)
}

/// Signs in by username or email.
///
/// A matching `demo_users` record supplies the expected password and becomes
/// the session user; otherwise the session keys left by signup are used.
pub fn login(store: &mut LocalStore, identifier: &str, password: &str) -> Result<DemoUser> {
    let mut users = load_users(store)?;
    let mut wallets = load_wallets(store)?;
    let candidate = users
        .iter()
        .find(|user| same(&user.username, identifier) || same(&user.email, identifier))
        .cloned();
    if let Some(candidate) = &candidate {
        store.set_item(USERNAME_KEY, candidate.username.as_str())?;
        store.set_item(EMAIL_KEY, candidate.email.as_str())?;
        if let Some(password) = &candidate.password {
            store.set_item(PASSWORD_KEY, password.as_str())?;
        }
    }

    let stored_username = store.get_item(USERNAME_KEY).map(str::to_string);
    let stored_email = store.get_item(EMAIL_KEY).map(str::to_string);
    let stored_password = store.get_item(PASSWORD_KEY).map(str::to_string);
    let known = stored_username.as_deref() == Some(identifier)
        || stored_email.as_deref() == Some(identifier)
        || candidate.is_some();
    if !known || stored_password.as_deref() != Some(password) {
        return Err(Error::WrongCredentials);
    }

    let username = stored_username.unwrap_or_else(|| identifier.to_string());
    let email = stored_email.unwrap_or_default();
    let banned = users.iter().any(|user| {
        !user.is_active
            && (same(&user.username, &username) || (!email.is_empty() && same(&user.email, &email)))
    });
    if banned {
        return Err(Error::Banned);
    }

    let now = now_iso();
    let user = match users
        .iter_mut()
        .find(|user| same(&user.username, &username))
    {
        Some(user) => {
            user.last_login = Some(now.clone());
            user.clone()
        }
        None => {
            let user = new_user(next_user_id(&users), &username, &email, &now);
            users.push(user.clone());
            wallets
                .entry(user.id)
                .or_insert_with(|| DemoWallet::empty(&now));
            store.write_json(WALLETS_KEY, &wallets)?;
            user
        }
    };
    store.write_json(USERS_KEY, &users)?;
    store.set_item(LOGGED_IN_KEY, "true")?;
    info!(user_id = user.id, username = user.username.as_str(), "logged in");
    Ok(user)
}

/// Username of the signed-in player, if any.
pub fn current_username(store: &LocalStore) -> Option<String> {
    store.get_item(USERNAME_KEY).map(str::to_string)
}

/// Looks a player up by name without creating one.
pub fn find_user(store: &LocalStore, username: &str) -> Option<DemoUser> {
    find_by_username(&read_users(store), username).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::{read_wallets, TRANSACTIONS_KEY};
    use crate::tests::TestContext;
    use crate::LocalAdminDatabase;

    fn request(username: &str, email: &str) -> Signup {
        Signup {
            username: username.to_string(),
            email: email.to_string(),
            password: "hunter22".to_string(),
        }
    }

    #[tokio::test]
    async fn signup_validates_and_assigns_ids() {
        let mut store = LocalStore::in_memory();
        assert!(matches!(
            signup(&mut store, None, &request("alice", "not-an-email")).await,
            Err(Error::InvalidEmail)
        ));

        let alice = signup(&mut store, None, &request("alice", "alice@casino.com"))
            .await
            .unwrap();
        assert_eq!(alice.id, 1);
        let bob = signup(&mut store, None, &request("bob", "bob@casino.com"))
            .await
            .unwrap();
        assert_eq!(bob.id, 2);

        assert!(matches!(
            signup(&mut store, None, &request("ALICE", "new@casino.com")).await,
            Err(Error::UsernameTaken)
        ));
        assert!(matches!(
            signup(&mut store, None, &request("carol", "Bob@Casino.com")).await,
            Err(Error::EmailTaken)
        ));

        assert_eq!(read_wallets(&store)[&2].balance, 0.0);
        assert_eq!(current_username(&store).as_deref(), Some("bob"));
        assert_eq!(find_user(&store, "Alice").map(|user| user.id), Some(1));
    }

    #[tokio::test]
    async fn signup_pushes_batch_to_server() {
        let ctx = TestContext::new().await;
        let client = ctx.create_client();
        let mut store = LocalStore::in_memory();
        signup(&mut store, Some(&client), &request("dana", "dana@casino.com"))
            .await
            .unwrap();

        let storage = ctx.server.storage();
        assert_eq!(storage.get(Some("balance:dana")).unwrap(), json!(0));
        let users = storage.get(Some("demo_users")).unwrap();
        assert_eq!(users[0]["username"], "dana");
        assert_eq!(storage.get(Some("demo_wallets")).unwrap()["1"]["balance"], 0.0);
    }

    #[tokio::test]
    async fn login_by_username_or_email() {
        let mut store = LocalStore::in_memory();
        signup(&mut store, None, &request("alice", "alice@casino.com"))
            .await
            .unwrap();
        signup(&mut store, None, &request("bob", "bob@casino.com"))
            .await
            .unwrap();

        let user = login(&mut store, "alice@casino.com", "hunter22").unwrap();
        assert_eq!(user.username, "alice");
        assert!(user.last_login.is_some());
        assert_eq!(current_username(&store).as_deref(), Some("alice"));
        assert_eq!(store.get_item(LOGGED_IN_KEY), Some("true"));

        let user = login(&mut store, "BOB", "hunter22").unwrap();
        assert_eq!(user.id, 2);

        assert!(matches!(
            login(&mut store, "alice", "wrong"),
            Err(Error::WrongCredentials)
        ));
        assert!(matches!(
            login(&mut store, "nobody", "hunter22"),
            Err(Error::WrongCredentials)
        ));
    }

    #[tokio::test]
    async fn banned_users_cannot_login() {
        let mut store = LocalStore::in_memory();
        let user = signup(&mut store, None, &request("eve", "eve@casino.com"))
            .await
            .unwrap();
        LocalAdminDatabase::open(&mut store)
            .unwrap()
            .update_user_status(user.id, false)
            .unwrap();
        assert!(matches!(
            login(&mut store, "eve", "hunter22"),
            Err(Error::Banned)
        ));
    }

    #[test]
    fn login_creates_missing_admin_record() {
        let mut store = LocalStore::in_memory();
        store.set_item(USERNAME_KEY, "frank").unwrap();
        store.set_item(EMAIL_KEY, "frank@casino.com").unwrap();
        store.set_item(PASSWORD_KEY, "pw").unwrap();

        let user = login(&mut store, "frank", "pw").unwrap();
        assert_eq!(user.id, 1);
        assert_eq!(user.email, "frank@casino.com");
        assert!(user.password.is_none());
        assert!(read_wallets(&store).contains_key(&1));
        assert_eq!(read_users(&store).len(), 1);
    }

    #[tokio::test]
    async fn signup_and_login_keep_existing_users() {
        let mut store = LocalStore::in_memory();
        store
            .write_json(
                USERS_KEY,
                &json!([
                    { "id": "4", "username": "gina", "email": null, "password": "pw" },
                    { "id": 9, "username": "hank", "email": "hank@casino.com", "vip": true },
                ]),
            )
            .unwrap();

        let ivy = signup(&mut store, None, &request("ivy", "ivy@casino.com"))
            .await
            .unwrap();
        assert_eq!(ivy.id, 10);
        let gina = login(&mut store, "gina", "pw").unwrap();
        assert_eq!(gina.id, 4);

        let users = read_users(&store);
        assert_eq!(users.len(), 3);
        assert_eq!(users[0].last_login, gina.last_login);
        assert_eq!(users[1].email, "hank@casino.com");
        assert!(read_wallets(&store).contains_key(&10));
    }

    #[tokio::test]
    async fn malformed_users_block_signup_and_login() {
        let mut store = LocalStore::in_memory();
        let users = r#"[{"id":[1],"username":"gina"}]"#;
        store.set_item(USERS_KEY, users).unwrap();

        assert!(matches!(
            signup(&mut store, None, &request("ivy", "ivy@casino.com")).await,
            Err(Error::MalformedDocument { .. })
        ));
        assert!(current_username(&store).is_none());
        assert!(login(&mut store, "gina", "pw").is_err());
        assert_eq!(store.get_item(USERS_KEY), Some(users));

        store.write_json(USERS_KEY, &json!([])).unwrap();
        store.set_item(WALLETS_KEY, "not json").unwrap();
        assert!(signup(&mut store, None, &request("ivy", "ivy@casino.com"))
            .await
            .is_err());
        assert_eq!(store.get_item(WALLETS_KEY), Some("not json"));
        assert!(store.get_item(TRANSACTIONS_KEY).is_none());
    }
}
