//! Storage key allowlist shared by every key/value backend and the sync mirror.

use serde::{Deserialize, Serialize};

/// Exact keys accepted by the storage API.
pub const ALLOWED_KEYS: [&str; 9] = [
    "demo_users",
    "demo_wallets",
    "demo_transactions",
    "withdrawRequests",
    "depositRequests",
    "vip_requests",
    "transfer_requests",
    "notifications",
    "adminNotifications",
];

/// Key prefixes accepted by the storage API (per-user entries).
pub const ALLOWED_PREFIXES: [&str; 2] = ["balance:", "sec_code:"];

/// Prefix of the per-user balance key written by the admin tools.
pub const BALANCE_PREFIX: &str = "balance:";

/// Set of keys a storage backend will accept.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allowlist {
    exact: Vec<String>,
    prefixes: Vec<String>,
}

impl Default for Allowlist {
    fn default() -> Self {
        Self::new(ALLOWED_KEYS, ALLOWED_PREFIXES)
    }
}

impl Allowlist {
    pub fn new<E, P>(exact: E, prefixes: P) -> Self
    where
        E: IntoIterator,
        E::Item: Into<String>,
        P: IntoIterator,
        P::Item: Into<String>,
    {
        Self {
            exact: exact.into_iter().map(Into::into).collect(),
            prefixes: prefixes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn exact(&self) -> &[String] {
        &self.exact
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    /// Returns true if `key` is an exact key or starts with an allowed prefix.
    pub fn is_allowed(&self, key: &str) -> bool {
        if key.is_empty() {
            return false;
        }
        self.is_exact(key) || self.is_prefixed(key)
    }

    pub fn is_exact(&self, key: &str) -> bool {
        self.exact.iter().any(|exact| exact == key)
    }

    pub fn is_prefixed(&self, key: &str) -> bool {
        self.prefixes.iter().any(|prefix| key.starts_with(prefix.as_str()))
    }

    /// Position of an exact key in allowlist order.
    pub fn exact_position(&self, key: &str) -> Option<usize> {
        self.exact.iter().position(|exact| exact == key)
    }
}

/// Maps a storage key onto a file-system safe name.
///
/// Every character outside `[A-Za-z0-9_-]` becomes `_`, so the mapping is
/// lossy: `balance:a.b` and `balance:a_b` collide.
pub fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Per-user balance key (`balance:<username>`).
pub fn balance_key(username: &str) -> String {
    format!("{BALANCE_PREFIX}{username}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_allowlist_accepts_exact_and_prefixed() {
        let allowlist = Allowlist::default();
        assert!(allowlist.is_allowed("demo_users"));
        assert!(allowlist.is_allowed("adminNotifications"));
        assert!(allowlist.is_allowed("balance:alice"));
        assert!(allowlist.is_allowed("sec_code:bob"));
        assert!(!allowlist.is_allowed(""));
        assert!(!allowlist.is_allowed("password"));
        assert!(!allowlist.is_allowed("demo_users_backup"));
        assert!(!allowlist.is_allowed("xbalance:alice"));
    }

    #[test]
    fn prefix_alone_is_allowed() {
        let allowlist = Allowlist::default();
        assert!(allowlist.is_prefixed("balance:"));
        assert!(!allowlist.is_exact("balance:"));
    }

    #[test]
    fn exact_position_follows_declaration_order() {
        let allowlist = Allowlist::default();
        assert_eq!(allowlist.exact_position("demo_users"), Some(0));
        assert_eq!(allowlist.exact_position("notifications"), Some(7));
        assert_eq!(allowlist.exact_position("balance:x"), None);
    }

    #[test]
    fn sanitize_replaces_unsafe_characters() {
        assert_eq!(sanitize_key("balance:alice"), "balance_alice");
        assert_eq!(sanitize_key("sec_code:a.b@c"), "sec_code_a_b_c");
        assert_eq!(sanitize_key("demo-users_1"), "demo-users_1");
        assert_eq!(sanitize_key("../etc/passwd"), "___etc_passwd");
    }

    #[test]
    fn balance_key_uses_prefix() {
        assert_eq!(balance_key("carol"), "balance:carol");
    }
}
