/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{Context, Result};
use mkreact_protocol::{FollowCreateRequest, ListPushRequest, ENDPOINT_FOLLOWING_CREATE, ENDPOINT_LIST_PUSH};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::api::{call_with, MisskeyApi};
use crate::config::InstanceConfig;

/// Issues follow and list-add requests one at a time. Only HTTP 200 counts as a
/// success; other statuses are logged and skipped, transport failures abort the batch.
pub struct Actuator<'a> {
    api: &'a dyn MisskeyApi,
    delay: Duration,
}

impl<'a> Actuator<'a> {
    pub fn new(api: &'a dyn MisskeyApi, delay: Duration) -> Self {
        Self { api, delay }
    }

    /// Follows every user from every account. Returns the number of successful calls.
    pub async fn follow(&self, user_ids: &[String], accounts: &[&InstanceConfig]) -> Result<usize> {
        info!("start following {} users from {} accounts", user_ids.len(), accounts.len());
        let mut followed = 0usize;
        for (i, user_id) in user_ids.iter().enumerate() {
            if i > 0 {
                self.pace().await;
            }
            for account in accounts {
                let req = FollowCreateRequest {
                    user_id: user_id.clone(),
                };
                if self.attempt(account, ENDPOINT_FOLLOWING_CREATE, &req, user_id).await? {
                    followed += 1;
                }
            }
            debug!("userid={user_id} followed_num={followed}");
        }
        info!("follow done: {followed} successful calls");
        Ok(followed)
    }

    /// Pushes every user into `list_id` owned by `account`.
    pub async fn add_to_list(&self, user_ids: &[String], account: &InstanceConfig, list_id: &str) -> Result<usize> {
        info!("start adding {} users into list {list_id}", user_ids.len());
        let mut added = 0usize;
        for (i, user_id) in user_ids.iter().enumerate() {
            if i > 0 {
                self.pace().await;
            }
            let req = ListPushRequest {
                user_id: user_id.clone(),
                list_id: list_id.to_string(),
            };
            if self.attempt(account, ENDPOINT_LIST_PUSH, &req, user_id).await? {
                added += 1;
            }
        }
        info!("list push done: {added} successful calls");
        Ok(added)
    }

    async fn attempt<B: Serialize>(
        &self,
        account: &InstanceConfig,
        endpoint: &str,
        body: &B,
        user_id: &str,
    ) -> Result<bool> {
        let resp = call_with(self.api, account, endpoint, body)
            .await
            .with_context(|| format!("{endpoint} {user_id} via {}", account.name))?;
        if !resp.is_ok() {
            debug!("{endpoint} {user_id} via {}: status {}", account.name, resp.status);
        }
        Ok(resp.is_ok())
    }

    async fn pace(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}
