/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset};
use mkreact_protocol::{NoteItem, UserNotesRequest, ENDPOINT_USER_NOTES, USER_NOTES_MAX_LIMIT};
use std::collections::HashSet;
use tracing::{error, info};

use crate::api::{call_json, MisskeyApi};
use crate::config::InstanceConfig;
use crate::model::Note;
use crate::store::{Store, NOTELIST};

/// Storage format of note timestamps. SQLite's `julianday()` parses it, offset included.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f%:z";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NoteSyncReport {
    pub fetched: usize,
    pub with_text: usize,
    pub appended: usize,
}

pub struct NoteSync<'a> {
    api: &'a dyn MisskeyApi,
    store: &'a Store,
    account: &'a InstanceConfig,
    tz: FixedOffset,
}

impl<'a> NoteSync<'a> {
    pub fn new(api: &'a dyn MisskeyApi, store: &'a Store, account: &'a InstanceConfig, tz: FixedOffset) -> Self {
        Self { api, store, account, tz }
    }

    /// Pulls the latest page of the account's own notes and appends the unseen ones.
    /// A malformed response aborts the sync.
    pub async fn sync(&self) -> Result<NoteSyncReport> {
        info!("start getting notes ({})", self.account.name);
        let req = UserNotesRequest {
            user_id: self.account.my_userid()?.to_string(),
            limit: USER_NOTES_MAX_LIMIT,
            include_my_renotes: false,
        };
        let items: Vec<NoteItem> = match call_json(self.api, self.account, ENDPOINT_USER_NOTES, &req).await {
            Ok(v) => v,
            Err(e) => {
                error!("{e}");
                return Err(e).context("fetch own notes");
            }
        };
        let fetched = items.len();

        let notes = collect_notes(items, &self.tz)?;
        let with_text = notes.len();

        let seen = self.store.stored_note_ids()?;
        let fresh = unseen_notes(notes, &seen);
        let rows = fresh.iter().map(Note::to_row).collect::<Vec<_>>();
        let appended = self.store.append(&NOTELIST, &rows)?;

        info!("notes: fetched={fetched} with_text={with_text} appended={appended}");
        Ok(NoteSyncReport {
            fetched,
            with_text,
            appended,
        })
    }
}

/// Drops notes without text (pure renotes, attachment-only posts) and normalizes timestamps.
pub fn collect_notes(items: Vec<NoteItem>, tz: &FixedOffset) -> Result<Vec<Note>> {
    items
        .into_iter()
        .filter_map(|item| {
            let text = item.text.filter(|t| !t.is_empty())?;
            Some((item.id, text, item.created_at))
        })
        .map(|(note_id, text, created_at)| {
            Ok(Note {
                created_at: normalize_timestamp(&created_at, tz)
                    .with_context(|| format!("note {note_id}"))?,
                note_id,
                text,
            })
        })
        .collect()
}

pub fn normalize_timestamp(raw: &str, tz: &FixedOffset) -> Result<String> {
    let parsed = DateTime::parse_from_rfc3339(raw.trim())
        .with_context(|| format!("invalid createdAt: {raw}"))?;
    Ok(parsed.with_timezone(tz).format(TIMESTAMP_FORMAT).to_string())
}

/// Keeps notes whose id is neither stored nor repeated earlier in the batch.
pub fn unseen_notes(notes: Vec<Note>, seen: &HashSet<String>) -> Vec<Note> {
    let mut batch = HashSet::new();
    notes
        .into_iter()
        .filter(|n| !seen.contains(&n.note_id) && batch.insert(n.note_id.clone()))
        .collect()
}
