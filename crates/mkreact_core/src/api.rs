/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::InstanceConfig;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request to {endpoint} failed: {source}")]
    Network {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("malformed response from {endpoint}: {source}")]
    MalformedResponse {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("encode request for {endpoint}: {source}")]
    Encode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    pub fn is_malformed_response(&self) -> bool {
        matches!(self, ApiError::MalformedResponse { .. })
    }
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub endpoint: String,
    pub status: u16,
    pub body: Bytes,
}

impl ApiResponse {
    /// Misskey answers 200 (or 204 for some mutations); only 200 counts here.
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_slice(&self.body).map_err(|source| ApiError::MalformedResponse {
            endpoint: self.endpoint.clone(),
            source,
        })
    }
}

#[async_trait]
pub trait MisskeyApi: Send + Sync {
    /// POSTs `params` to `endpoint` on the account's host. The account token is
    /// added to the body as `i`.
    async fn call(
        &self,
        account: &InstanceConfig,
        endpoint: &str,
        params: Value,
    ) -> Result<ApiResponse, ApiError>;
}

/// Serializes `body`, performs the call and decodes the response as `T`.
pub async fn call_json<T, B>(
    api: &dyn MisskeyApi,
    account: &InstanceConfig,
    endpoint: &str,
    body: &B,
) -> Result<T, ApiError>
where
    T: DeserializeOwned,
    B: Serialize + ?Sized,
{
    let resp = call_with(api, account, endpoint, body).await?;
    resp.json()
}

pub async fn call_with<B>(
    api: &dyn MisskeyApi,
    account: &InstanceConfig,
    endpoint: &str,
    body: &B,
) -> Result<ApiResponse, ApiError>
where
    B: Serialize + ?Sized,
{
    let params = serde_json::to_value(body).map_err(|source| ApiError::Encode {
        endpoint: endpoint.to_string(),
        source,
    })?;
    api.call(account, endpoint, params).await
}

pub fn endpoint_url(host: &str, endpoint: &str) -> String {
    format!(
        "{}/{}",
        host.trim().trim_end_matches('/'),
        endpoint.trim().trim_start_matches('/')
    )
}

fn with_token(token: &str, params: Value) -> Value {
    match params {
        Value::Object(mut map) => {
            map.insert("i".to_string(), Value::String(token.to_string()));
            Value::Object(map)
        }
        Value::Null => serde_json::json!({ "i": token }),
        other => other,
    }
}

fn header_map(account: &InstanceConfig) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (k, v) in &account.header {
        match (HeaderName::from_bytes(k.as_bytes()), HeaderValue::from_str(v)) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => warn!("ignoring invalid header {k:?} for {}", account.name),
        }
    }
    headers
}

/// [`MisskeyApi`] over HTTPS.
#[derive(Clone)]
pub struct MisskeyClient {
    http: reqwest::Client,
}

impl MisskeyClient {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl MisskeyApi for MisskeyClient {
    async fn call(
        &self,
        account: &InstanceConfig,
        endpoint: &str,
        params: Value,
    ) -> Result<ApiResponse, ApiError> {
        let url = endpoint_url(&account.host, endpoint);
        let network = |source| ApiError::Network {
            endpoint: endpoint.to_string(),
            source,
        };
        let resp = self
            .http
            .post(&url)
            .headers(header_map(account))
            .header(USER_AGENT, format!("mkreact/{}", env!("CARGO_PKG_VERSION")))
            .json(&with_token(&account.token, params))
            .send()
            .await
            .map_err(network)?;
        let status = resp.status().as_u16();
        let body = resp.bytes().await.map_err(network)?;
        debug!("POST {url} -> {status} ({} bytes)", body.len());
        Ok(ApiResponse {
            endpoint: endpoint.to_string(),
            status,
            body,
        })
    }
}
