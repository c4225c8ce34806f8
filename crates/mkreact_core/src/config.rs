/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{Context, Result};
use chrono::{FixedOffset, Offset, Utc, Weekday};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::engagement::ShareThreshold;
use crate::orchestrator::WeeklySchedule;

/// One block of the config file, e.g. `"misskey.io": { ... }`.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct InstanceConfig {
    /// Key of the block in the config file. Filled in by [`AppConfig::from_json`].
    #[serde(skip)]
    pub name: String,
    pub token: String,
    /// API base, e.g. `https://misskey.io/api/`.
    pub host: String,
    #[serde(default)]
    pub header: BTreeMap<String, String>,
    #[serde(default)]
    pub my_userid: Option<String>,
    #[serde(default)]
    pub target_list_id: Option<String>,
    /// Overrides the domain derived from `host` for reactors without a host.
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub excluded_user_ids: Vec<String>,
}

impl InstanceConfig {
    /// Domain that stands in for `host = null` on reactions by local users.
    pub fn local_domain(&self) -> String {
        if let Some(d) = self.domain.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            return d.to_string();
        }
        if let Ok(url) = reqwest::Url::parse(self.host.trim()) {
            if let Some(h) = url.host_str() {
                return h.to_string();
            }
        }
        let h = self.host.trim();
        let h = h
            .strip_prefix("https://")
            .or_else(|| h.strip_prefix("http://"))
            .unwrap_or(h);
        h.split('/').next().unwrap_or(h).to_string()
    }

    pub fn my_userid(&self) -> Result<&str> {
        self.my_userid
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .with_context(|| format!("instance {} has no my_userid", self.name))
    }

    pub fn target_list_id(&self) -> Option<&str> {
        self.target_list_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    instances: BTreeMap<String, InstanceConfig>,
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config: {}", path.display()))?;
        Self::from_json(&text)
    }

    /// `Ok(None)` only when the file does not exist; unreadable or invalid files are errors.
    pub fn load_if_present(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_json(&text)
                .with_context(|| format!("config: {}", path.display()))
                .map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("read config: {}", path.display())),
        }
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let mut instances: BTreeMap<String, InstanceConfig> =
            serde_json::from_str(text).context("parse config json")?;
        for (name, inst) in instances.iter_mut() {
            inst.name = name.clone();
            if inst.token.trim().is_empty() {
                anyhow::bail!("instance {name}: empty token");
            }
            if inst.host.trim().is_empty() {
                anyhow::bail!("instance {name}: empty host");
            }
        }
        Ok(Self { instances })
    }

    pub fn instance(&self, name: &str) -> Result<&InstanceConfig> {
        self.instances
            .get(name)
            .with_context(|| format!("unknown instance: {name}"))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.instances.keys().map(String::as_str)
    }

    /// Resolves the accounts that issue follow requests. An empty selection means
    /// every configured instance, with `primary` first.
    pub fn follow_accounts(&self, primary: &str, selected: &[String]) -> Result<Vec<&InstanceConfig>> {
        if !selected.is_empty() {
            return selected.iter().map(|n| self.instance(n)).collect();
        }
        let mut out = vec![self.instance(primary)?];
        out.extend(self.instances.values().filter(|i| i.name != primary));
        Ok(out)
    }
}

/// Runtime knobs for one pipeline, assembled by the service binary.
#[derive(Debug, Clone)]
pub struct Settings {
    pub db_path: PathBuf,
    pub primary: String,
    pub follow_accounts: Vec<String>,
    pub reaction_window: u32,
    pub follow_threshold: u64,
    pub list_min_share: ShareThreshold,
    pub delay: Duration,
    pub tz: FixedOffset,
    pub schedule: WeeklySchedule,
    pub report_path: PathBuf,
}

pub const DEFAULT_TZ_OFFSET_SECS: i32 = 9 * 3600;

pub fn default_tz() -> FixedOffset {
    FixedOffset::east_opt(DEFAULT_TZ_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("misskey.sqlite"),
            primary: "misskey.io".to_string(),
            follow_accounts: Vec::new(),
            reaction_window: 100,
            follow_threshold: 5,
            list_min_share: ShareThreshold::from_fraction(0.02),
            delay: Duration::from_secs(1),
            tz: default_tz(),
            schedule: WeeklySchedule::new(Weekday::Sat, 13, 0),
            report_path: PathBuf::from("output/reaction_histogram.html"),
        }
    }
}
