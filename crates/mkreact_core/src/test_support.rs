/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use crate::api::{ApiError, ApiResponse, MisskeyApi};
use crate::config::InstanceConfig;
use crate::store::Store;

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub account: String,
    pub endpoint: String,
    pub params: Value,
}

#[derive(Clone)]
enum Reply {
    Status(u16, Bytes),
    Unreachable,
}

/// Canned replies keyed by `(account, endpoint, noteId|userId)`. Unknown routes answer 404.
#[derive(Default)]
pub struct FakeApi {
    routes: Mutex<HashMap<(String, String, String), Reply>>,
    calls: Mutex<Vec<RecordedCall>>,
}

fn route_subject(params: &Value) -> String {
    params
        .get("noteId")
        .or_else(|| params.get("userId"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

impl FakeApi {
    pub fn reply_json(&self, account: &str, endpoint: &str, subject: &str, body: Value) {
        self.reply_raw(account, endpoint, subject, 200, body.to_string());
    }

    pub fn reply_raw(&self, account: &str, endpoint: &str, subject: &str, status: u16, body: impl Into<String>) {
        self.route(account, endpoint, subject, Reply::Status(status, Bytes::from(body.into())));
    }

    /// The route fails with a transport error instead of answering.
    pub fn fail_network(&self, account: &str, endpoint: &str, subject: &str) {
        self.route(account, endpoint, subject, Reply::Unreachable);
    }

    fn route(&self, account: &str, endpoint: &str, subject: &str, reply: Reply) {
        self.routes
            .lock()
            .unwrap()
            .insert((account.to_string(), endpoint.to_string(), subject.to_string()), reply);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, endpoint: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.endpoint == endpoint)
            .collect()
    }
}

#[async_trait]
impl MisskeyApi for FakeApi {
    async fn call(
        &self,
        account: &InstanceConfig,
        endpoint: &str,
        params: Value,
    ) -> Result<ApiResponse, ApiError> {
        let key = (account.name.clone(), endpoint.to_string(), route_subject(&params));
        self.calls.lock().unwrap().push(RecordedCall {
            account: account.name.clone(),
            endpoint: endpoint.to_string(),
            params,
        });
        let reply = self.routes.lock().unwrap().get(&key).cloned();
        match reply.unwrap_or(Reply::Status(404, Bytes::from_static(b"{\"error\":\"not found\"}"))) {
            Reply::Status(status, body) => Ok(ApiResponse {
                endpoint: endpoint.to_string(),
                status,
                body,
            }),
            Reply::Unreachable => Err(ApiError::Network {
                endpoint: endpoint.to_string(),
                source: transport_error().await,
            }),
        }
    }
}

/// A real `reqwest::Error`, produced without touching the network.
async fn transport_error() -> reqwest::Error {
    reqwest::Client::new()
        .post("http://")
        .send()
        .await
        .expect_err("request without a host must fail")
}

pub fn account(name: &str) -> InstanceConfig {
    InstanceConfig {
        name: name.to_string(),
        token: format!("token-{name}"),
        host: format!("https://{name}/api/"),
        header: BTreeMap::new(),
        my_userid: Some("me".to_string()),
        target_list_id: Some("list1".to_string()),
        domain: None,
        excluded_user_ids: Vec::new(),
    }
}

pub fn temp_store() -> (tempfile::TempDir, Store) {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path().join("misskey.sqlite")).unwrap();
    (dir, store)
}
