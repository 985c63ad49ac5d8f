//! Per-player game action log kept in the local store, newest first.

use crate::accounts::current_username;
use crate::{now_iso, LocalStore, Result};
use casino_types::model::ActionRecord;
use serde_json::Value;

pub const HISTORY_KEY: &str = "action_history";

/// Entries kept after each write.
pub const HISTORY_LIMIT: usize = 100;

const DEFAULT_PLAYER: &str = "Player";

fn read_history(store: &LocalStore) -> Vec<ActionRecord> {
    store.read_as(HISTORY_KEY).unwrap_or_default()
}

/// Prepends an action by the signed-in player and trims the log.
pub fn record_action(
    store: &mut LocalStore,
    game: &str,
    action: &str,
    details: Value,
) -> Result<ActionRecord> {
    let mut history: Vec<ActionRecord> = store.load_as(HISTORY_KEY)?.unwrap_or_default();
    let record = ActionRecord {
        id: history.len() as u64 + 1,
        game: game.to_string(),
        action: action.to_string(),
        details,
        timestamp: now_iso(),
        username: current_username(store).unwrap_or_else(|| DEFAULT_PLAYER.to_string()),
    };
    history.insert(0, record.clone());
    history.truncate(HISTORY_LIMIT);
    store.write_json(HISTORY_KEY, &history)?;
    Ok(record)
}

/// Actions of the signed-in player, optionally limited to one game.
pub fn action_history(store: &LocalStore, game: Option<&str>) -> Vec<ActionRecord> {
    let player = current_username(store).unwrap_or_else(|| DEFAULT_PLAYER.to_string());
    read_history(store)
        .into_iter()
        .filter(|record| record.username.eq_ignore_ascii_case(&player))
        .filter(|record| game.map_or(true, |game| record.game == game))
        .collect()
}

pub fn clear_history(store: &mut LocalStore) -> Result<()> {
    store.write_json(HISTORY_KEY, &Vec::<ActionRecord>::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::USERNAME_KEY;
    use serde_json::json;

    #[test]
    fn records_newest_first_per_player() {
        let mut store = LocalStore::in_memory();
        let anonymous = record_action(&mut store, "slots", "spin", json!({ "bet": 1 })).unwrap();
        assert_eq!(anonymous.username, "Player");

        store.set_item(USERNAME_KEY, "Alice").unwrap();
        record_action(&mut store, "blackjack", "hit", Value::Null).unwrap();
        record_action(&mut store, "roulette", "bet", json!({ "on": "red" })).unwrap();

        store.set_item(USERNAME_KEY, "alice").unwrap();
        let history = action_history(&store, None);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].game, "roulette");
        assert_eq!(history[0].id, 3);
        assert_eq!(history[1].action, "hit");

        let blackjack = action_history(&store, Some("blackjack"));
        assert_eq!(blackjack.len(), 1);

        clear_history(&mut store).unwrap();
        assert!(action_history(&store, None).is_empty());
    }

    #[test]
    fn history_is_capped() {
        let mut store = LocalStore::in_memory();
        for round in 0..(HISTORY_LIMIT + 5) {
            record_action(&mut store, "slots", "spin", json!({ "round": round })).unwrap();
        }
        let history = action_history(&store, Some("slots"));
        assert_eq!(history.len(), HISTORY_LIMIT);
        assert_eq!(history[0].details["round"], json!(HISTORY_LIMIT + 4));
    }

    #[test]
    fn foreign_history_is_read_and_kept() {
        let mut store = LocalStore::in_memory();
        store.set_item(USERNAME_KEY, "alice").unwrap();
        store
            .write_json(
                HISTORY_KEY,
                &json!([
                    { "id": "1", "game": "slots", "action": "spin", "timestamp": "t1",
                      "username": "alice", "sessionId": "abc" },
                    { "id": 2, "game": "dice", "action": "roll", "timestamp": null,
                      "username": null },
                ]),
            )
            .unwrap();

        record_action(&mut store, "slots", "spin", Value::Null).unwrap();
        let stored: Vec<ActionRecord> = store.read_as(HISTORY_KEY).unwrap();
        assert_eq!(stored.len(), 3);
        assert_eq!(stored[0].id, 3);
        assert_eq!(stored[2].username, "");
        assert_eq!(action_history(&store, Some("slots")).len(), 2);
    }

    #[test]
    fn malformed_history_is_not_replaced() {
        let mut store = LocalStore::in_memory();
        store.set_item(HISTORY_KEY, "{\"broken\": ").unwrap();
        assert!(record_action(&mut store, "slots", "spin", Value::Null).is_err());
        assert_eq!(store.get_item(HISTORY_KEY), Some("{\"broken\": "));
        assert!(action_history(&store, None).is_empty());
    }
}
