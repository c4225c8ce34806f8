/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{Context, Result};
use mkreact_protocol::{NoteReactionsRequest, ReactionItem, ENDPOINT_NOTE_REACTIONS};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::api::{call_json, MisskeyApi};
use crate::config::InstanceConfig;
use crate::model::{Reaction, ReactionKey};
use crate::store::{Store, REACTIONLIST};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReactionSyncReport {
    pub notes: usize,
    pub skipped_notes: usize,
    pub fetched: usize,
    pub appended: usize,
}

pub struct ReactionSync<'a> {
    api: &'a dyn MisskeyApi,
    store: &'a Store,
    account: &'a InstanceConfig,
    local_domain: String,
    delay: Duration,
}

impl<'a> ReactionSync<'a> {
    pub fn new(api: &'a dyn MisskeyApi, store: &'a Store, account: &'a InstanceConfig, delay: Duration) -> Self {
        Self {
            api,
            store,
            account,
            local_domain: account.local_domain(),
            delay,
        }
    }

    /// Re-fetches reactions for the `window_size` newest stored notes and appends the
    /// `(note, user)` pairs not stored yet. The API has no cursor, so every run sees the
    /// whole window again.
    pub async fn sync(&self, window_size: u32) -> Result<ReactionSyncReport> {
        info!("start getting reactions ({}, window={window_size})", self.account.name);
        let note_ids = self.store.recent_note_ids(window_size)?;

        let mut fetched = Vec::new();
        let mut skipped_notes = 0usize;
        for (i, note_id) in note_ids.iter().enumerate() {
            if i > 0 && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let req = NoteReactionsRequest {
                note_id: note_id.clone(),
            };
            match call_json::<Vec<ReactionItem>, _>(self.api, self.account, ENDPOINT_NOTE_REACTIONS, &req).await {
                Ok(items) => {
                    debug!("note {note_id}: {} reactions", items.len());
                    fetched.extend(
                        items
                            .into_iter()
                            .map(|item| to_reaction(note_id, item, &self.local_domain)),
                    );
                }
                Err(e) if e.is_malformed_response() => {
                    error!("skip note {note_id}: {e}");
                    skipped_notes += 1;
                }
                Err(e) => return Err(e).with_context(|| format!("fetch reactions for {note_id}")),
            }
        }
        let fetched_count = fetched.len();

        let existing = self.store.stored_reaction_keys()?;
        let fresh = new_reactions(fetched, &existing);
        let rows = fresh.iter().map(Reaction::to_row).collect::<Vec<_>>();
        let appended = self.store.append(&REACTIONLIST, &rows)?;

        info!(
            "reactions: notes={} skipped={skipped_notes} fetched={fetched_count} appended={appended}",
            note_ids.len()
        );
        Ok(ReactionSyncReport {
            notes: note_ids.len(),
            skipped_notes,
            fetched: fetched_count,
            appended,
        })
    }
}

/// Local users come back without a host; they are stored under `local_domain`.
pub fn to_reaction(note_id: &str, item: ReactionItem, local_domain: &str) -> Reaction {
    let host = item
        .user
        .host
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| local_domain.to_string());
    Reaction {
        note_id: note_id.to_string(),
        user_id: item.user.id,
        username: item.user.username,
        host,
    }
}

/// `fetched` minus every key in `existing`; the first occurrence wins inside the batch.
pub fn new_reactions(fetched: Vec<Reaction>, existing: &HashSet<ReactionKey>) -> Vec<Reaction> {
    let mut batch = HashSet::new();
    fetched
        .into_iter()
        .filter(|r| {
            let key = r.key();
            !existing.contains(&key) && batch.insert(key)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use crate::model::Note;
    use crate::store::NOTELIST;
    use crate::test_support::{account, temp_store, FakeApi};
    use serde_json::json;

    fn seed_notes(store: &Store, ids: &[(&str, &str)]) {
        let rows = ids
            .iter()
            .map(|(id, ts)| {
                Note {
                    note_id: id.to_string(),
                    text: "hello".to_string(),
                    created_at: ts.to_string(),
                }
                .to_row()
            })
            .collect::<Vec<_>>();
        store.append(&NOTELIST, &rows).unwrap();
    }

    fn reaction(note_id: &str, user_id: &str) -> Reaction {
        Reaction {
            note_id: note_id.to_string(),
            user_id: user_id.to_string(),
            username: format!("name_{user_id}"),
            host: "misskey.io".to_string(),
        }
    }

    fn reactors(users: &[&str]) -> serde_json::Value {
        json!(users
            .iter()
            .map(|u| json!({"id": format!("r-{u}"), "type": "👍", "user": {"id": u, "username": format!("name_{u}"), "host": null}}))
            .collect::<Vec<_>>())
    }

    fn stored_pairs(store: &Store) -> Vec<(String, String)> {
        let mut out = store
            .stored_reaction_keys()
            .unwrap()
            .into_iter()
            .map(|k| (k.note_id, k.user_id))
            .collect::<Vec<_>>();
        out.sort();
        out
    }

    #[test]
    fn set_difference_keeps_only_new_pairs() {
        let existing = [reaction("n1", "u1"), reaction("n1", "u1"), reaction("n1", "u2")]
            .iter()
            .map(Reaction::key)
            .collect::<HashSet<_>>();
        let out = new_reactions(vec![reaction("n1", "u1"), reaction("n1", "u3")], &existing);
        assert_eq!(out, vec![reaction("n1", "u3")]);
    }

    #[test]
    fn missing_host_defaults_to_local_domain() {
        let item: ReactionItem =
            serde_json::from_value(json!({"user": {"id": "u1", "username": "alice"}})).unwrap();
        assert_eq!(to_reaction("n1", item, "misskey.io").host, "misskey.io");

        let item: ReactionItem =
            serde_json::from_value(json!({"user": {"id": "u2", "username": "bob", "host": "misskey.cloud"}}))
                .unwrap();
        assert_eq!(to_reaction("n1", item, "misskey.io").host, "misskey.cloud");
    }

    #[tokio::test]
    async fn appends_only_unstored_pairs() {
        let (_dir, store) = temp_store();
        seed_notes(&store, &[("n1", "2024-01-01 10:00:00.000+09:00")]);
        let existing = [reaction("n1", "u1"), reaction("n1", "u1"), reaction("n1", "u2")]
            .iter()
            .map(Reaction::to_row)
            .collect::<Vec<_>>();
        store.append(&REACTIONLIST, &existing).unwrap();

        let api = FakeApi::default();
        let acct = account("misskey.io");
        api.reply_json("misskey.io", ENDPOINT_NOTE_REACTIONS, "n1", reactors(&["u1", "u3"]));

        let report = ReactionSync::new(&api, &store, &acct, Duration::ZERO)
            .sync(10)
            .await
            .unwrap();
        assert_eq!(report.fetched, 2);
        assert_eq!(report.appended, 1);
        assert_eq!(store.count_rows(&REACTIONLIST).unwrap(), 4);
        assert!(stored_pairs(&store).contains(&("n1".to_string(), "u3".to_string())));
    }

    #[tokio::test]
    async fn repeated_runs_keep_pairs_unique() {
        let (_dir, store) = temp_store();
        seed_notes(
            &store,
            &[
                ("n1", "2024-01-01 10:00:00.000+09:00"),
                ("n2", "2024-01-02 10:00:00.000+09:00"),
            ],
        );
        let api = FakeApi::default();
        let acct = account("misskey.io");
        api.reply_json("misskey.io", ENDPOINT_NOTE_REACTIONS, "n1", reactors(&["u1", "u2", "u1"]));
        api.reply_json("misskey.io", ENDPOINT_NOTE_REACTIONS, "n2", reactors(&["u1"]));
        let sync = ReactionSync::new(&api, &store, &acct, Duration::ZERO);

        let first = sync.sync(10).await.unwrap();
        assert_eq!(first.appended, 3);
        let second = sync.sync(10).await.unwrap();
        assert_eq!(second.appended, 0);

        let pairs = stored_pairs(&store);
        assert_eq!(pairs.len() as u64, store.count_rows(&REACTIONLIST).unwrap());
    }

    #[tokio::test]
    async fn stores_local_domain_for_local_reactors() {
        let (_dir, store) = temp_store();
        seed_notes(&store, &[("n1", "2024-01-01 10:00:00.000+09:00")]);
        let api = FakeApi::default();
        let acct = account("misskey.io");
        api.reply_json(
            "misskey.io",
            ENDPOINT_NOTE_REACTIONS,
            "n1",
            json!([{"user": {"id": "u1", "username": "alice"}}]),
        );

        ReactionSync::new(&api, &store, &acct, Duration::ZERO)
            .sync(10)
            .await
            .unwrap();
        let res = store.query("SELECT host FROM reactionlist", []).unwrap();
        assert_eq!(res.texts("host").unwrap(), vec!["misskey.io"]);
    }

    #[tokio::test]
    async fn malformed_note_is_skipped() {
        let (_dir, store) = temp_store();
        seed_notes(
            &store,
            &[
                ("n1", "2024-01-01 10:00:00.000+09:00"),
                ("n2", "2024-01-02 10:00:00.000+09:00"),
                ("n3", "2024-01-03 10:00:00.000+09:00"),
            ],
        );
        let api = FakeApi::default();
        let acct = account("misskey.io");
        api.reply_json("misskey.io", ENDPOINT_NOTE_REACTIONS, "n1", reactors(&["u1"]));
        api.reply_raw("misskey.io", ENDPOINT_NOTE_REACTIONS, "n2", 200, "{not json");
        api.reply_json("misskey.io", ENDPOINT_NOTE_REACTIONS, "n3", reactors(&["u3"]));

        let report = ReactionSync::new(&api, &store, &acct, Duration::ZERO)
            .sync(10)
            .await
            .unwrap();
        assert_eq!(report.notes, 3);
        assert_eq!(report.skipped_notes, 1);
        assert_eq!(
            stored_pairs(&store),
            vec![("n1".to_string(), "u1".to_string()), ("n3".to_string(), "u3".to_string())]
        );
    }

    #[tokio::test]
    async fn network_error_aborts_sync() {
        let (_dir, store) = temp_store();
        seed_notes(
            &store,
            &[
                ("n1", "2024-01-01 10:00:00.000+09:00"),
                ("n2", "2024-01-02 10:00:00.000+09:00"),
            ],
        );
        let api = FakeApi::default();
        let acct = account("misskey.io");
        api.fail_network("misskey.io", ENDPOINT_NOTE_REACTIONS, "n2");
        api.reply_json("misskey.io", ENDPOINT_NOTE_REACTIONS, "n1", reactors(&["u1"]));

        let err = ReactionSync::new(&api, &store, &acct, Duration::ZERO)
            .sync(10)
            .await
            .unwrap_err();
        let api_err = err.downcast_ref::<ApiError>().expect("api error in chain");
        assert!(!api_err.is_malformed_response());
        // n2 is newest and fails first; nothing reaches the table.
        assert_eq!(api.calls_to(ENDPOINT_NOTE_REACTIONS).len(), 1);
        assert!(!store.table_exists(&REACTIONLIST).unwrap());
    }

    #[tokio::test]
    async fn only_the_newest_window_is_fetched() {
        let (_dir, store) = temp_store();
        seed_notes(
            &store,
            &[
                ("old", "2024-01-01 10:00:00.000+09:00"),
                ("mid", "2024-01-02 10:00:00.000+09:00"),
                ("new", "2024-01-03 10:00:00.000+09:00"),
            ],
        );
        let api = FakeApi::default();
        let acct = account("misskey.io");
        for id in ["old", "mid", "new"] {
            api.reply_json("misskey.io", ENDPOINT_NOTE_REACTIONS, id, json!([]));
        }

        ReactionSync::new(&api, &store, &acct, Duration::ZERO)
            .sync(2)
            .await
            .unwrap();
        let asked = api
            .calls_to(ENDPOINT_NOTE_REACTIONS)
            .into_iter()
            .map(|c| c.params["noteId"].as_str().unwrap_or_default().to_string())
            .collect::<Vec<_>>();
        assert_eq!(asked, vec!["new", "mid"]);
    }

    #[tokio::test(start_paused = true)]
    async fn requests_are_paced() {
        let (_dir, store) = temp_store();
        seed_notes(
            &store,
            &[
                ("n1", "2024-01-01 10:00:00.000+09:00"),
                ("n2", "2024-01-02 10:00:00.000+09:00"),
                ("n3", "2024-01-03 10:00:00.000+09:00"),
            ],
        );
        let api = FakeApi::default();
        let acct = account("misskey.io");
        let start = tokio::time::Instant::now();

        ReactionSync::new(&api, &store, &acct, Duration::from_secs(1))
            .sync(10)
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_secs(2));
        assert_eq!(api.calls_to(ENDPOINT_NOTE_REACTIONS).len(), 3);
    }
}
