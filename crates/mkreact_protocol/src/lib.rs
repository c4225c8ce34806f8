/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Wire types for the subset of the Misskey API the sync service talks to.
//!
//! Request bodies never carry the access token; the client injects `i` when it
//! serializes the call.

use serde::{Deserialize, Serialize};

pub const ENDPOINT_USER_NOTES: &str = "users/notes";
pub const ENDPOINT_NOTE_REACTIONS: &str = "notes/reactions";
pub const ENDPOINT_FOLLOWING_CREATE: &str = "following/create";
pub const ENDPOINT_LIST_PUSH: &str = "users/lists/push";

/// Maximum page size accepted by `users/notes`.
pub const USER_NOTES_MAX_LIMIT: u32 = 100;

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UserNotesRequest {
    pub user_id: String,
    pub limit: u32,
    pub include_my_renotes: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NoteItem {
    pub id: String,
    #[serde(default)]
    pub text: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NoteReactionsRequest {
    pub note_id: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ReactionItem {
    pub user: ReactionUser,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ReactionUser {
    pub id: String,
    pub username: String,
    /// `None` (or missing) for users of the local instance.
    #[serde(default)]
    pub host: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct FollowCreateRequest {
    pub user_id: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ListPushRequest {
    pub user_id: String,
    pub list_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reaction_user_host_may_be_missing_or_null() {
        let items: Vec<ReactionItem> = serde_json::from_str(
            r#"[
                {"id":"r1","type":"👍","user":{"id":"u1","username":"alice"}},
                {"id":"r2","type":"👍","user":{"id":"u2","username":"bob","host":null}},
                {"id":"r3","type":"👍","user":{"id":"u3","username":"carol","host":"misskey.cloud"}}
            ]"#,
        )
        .unwrap();
        assert_eq!(items[0].user.host, None);
        assert_eq!(items[1].user.host, None);
        assert_eq!(items[2].user.host.as_deref(), Some("misskey.cloud"));
    }

    #[test]
    fn request_bodies_use_camel_case() {
        let body = serde_json::to_value(UserNotesRequest {
            user_id: "me".to_string(),
            limit: USER_NOTES_MAX_LIMIT,
            include_my_renotes: false,
        })
        .unwrap();
        assert_eq!(body["userId"], "me");
        assert_eq!(body["includeMyRenotes"], false);

        let body = serde_json::to_value(ListPushRequest {
            user_id: "u1".to_string(),
            list_id: "l1".to_string(),
        })
        .unwrap();
        assert_eq!(body["listId"], "l1");
    }

    #[test]
    fn note_text_null_is_none() {
        let note: NoteItem =
            serde_json::from_str(r#"{"id":"n1","text":null,"createdAt":"2024-01-01T00:00:00.000Z"}"#).unwrap();
        assert!(note.text.is_none());
    }
}
