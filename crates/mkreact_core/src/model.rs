/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use rusqlite::types::Value;

/// One of the account's own notes, as stored in `notelist`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub note_id: String,
    pub text: String,
    /// Creation time in the configured fixed offset, see [`crate::note_sync::normalize_timestamp`].
    pub created_at: String,
}

impl Note {
    pub fn to_row(&self) -> Vec<Value> {
        vec![
            Value::Text(self.text.clone()),
            Value::Text(self.note_id.clone()),
            Value::Text(self.created_at.clone()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reaction {
    pub note_id: String,
    pub user_id: String,
    pub username: String,
    pub host: String,
}

/// Composite identity of a stored reaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReactionKey {
    pub note_id: String,
    pub user_id: String,
}

impl Reaction {
    pub fn key(&self) -> ReactionKey {
        ReactionKey {
            note_id: self.note_id.clone(),
            user_id: self.user_id.clone(),
        }
    }

    pub fn to_row(&self) -> Vec<Value> {
        vec![
            Value::Text(self.note_id.clone()),
            Value::Text(self.user_id.clone()),
            Value::Text(self.username.clone()),
            Value::Text(self.host.clone()),
        ]
    }
}

/// Reaction total for one `(userid, username)` group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserReactionCount {
    pub user_id: String,
    pub username: String,
    pub count: u64,
}
