/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::Result;
use chrono::{DateTime, FixedOffset, TimeDelta, Utc};
use std::collections::{HashMap, HashSet};
use tracing::info;

use crate::model::UserReactionCount;
use crate::note_sync::TIMESTAMP_FORMAT;
use crate::store::Store;

/// Administrative and bot accounts that never count towards engagement.
pub const ADMIN_USER_IDS: &[&str] = &["7rkr3b1c1c", "82qrp4qp16"];

pub const TRAILING_WINDOW_DAYS: i64 = 7;

const BASIS_POINTS: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowCandidate {
    pub user_id: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListCandidate {
    pub user_id: String,
    pub username: String,
    pub count: u64,
    pub share: f64,
}

/// Minimum share of all reactions, held in basis points so `count / total >= share`
/// is decided in integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShareThreshold {
    basis_points: u64,
}

impl ShareThreshold {
    pub fn from_fraction(fraction: f64) -> Self {
        let bp = (fraction.clamp(0.0, 1.0) * BASIS_POINTS as f64).round() as u64;
        Self { basis_points: bp }
    }

    pub fn admits(&self, count: u64, total: u64) -> bool {
        if total == 0 {
            return false;
        }
        (count as u128) * (BASIS_POINTS as u128) >= (self.basis_points as u128) * (total as u128)
    }

    pub fn as_fraction(&self) -> f64 {
        self.basis_points as f64 / BASIS_POINTS as f64
    }
}

pub fn default_exclusions() -> HashSet<String> {
    ADMIN_USER_IDS.iter().map(|s| s.to_string()).collect()
}

/// Counts reactions per user and keeps those strictly above `threshold`.
pub fn rank_follow_candidates<I>(reactor_ids: I, excluded: &HashSet<String>, threshold: u64) -> Vec<FollowCandidate>
where
    I: IntoIterator<Item = String>,
{
    let mut counts: HashMap<String, u64> = HashMap::new();
    for id in reactor_ids {
        if excluded.contains(&id) {
            continue;
        }
        *counts.entry(id).or_default() += 1;
    }
    let mut out = counts
        .into_iter()
        .filter(|(_, count)| *count > threshold)
        .map(|(user_id, count)| FollowCandidate { user_id, count })
        .collect::<Vec<_>>();
    out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.user_id.cmp(&b.user_id)));
    out
}

/// Keeps `(user, username)` groups whose share of all non-excluded reactions meets `min_share`.
pub fn rank_list_candidates(
    counts: Vec<UserReactionCount>,
    excluded: &HashSet<String>,
    min_share: ShareThreshold,
) -> Vec<ListCandidate> {
    let counts = counts
        .into_iter()
        .filter(|c| !excluded.contains(&c.user_id))
        .collect::<Vec<_>>();
    let total: u64 = counts.iter().map(|c| c.count).sum();
    let mut out = counts
        .into_iter()
        .filter(|c| min_share.admits(c.count, total))
        .map(|c| ListCandidate {
            share: c.count as f64 / total as f64,
            user_id: c.user_id,
            username: c.username,
            count: c.count,
        })
        .collect::<Vec<_>>();
    out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.user_id.cmp(&b.user_id)));
    out
}

/// Start of the trailing window, rendered like stored note timestamps.
pub fn trailing_cutoff(now: DateTime<Utc>, tz: &FixedOffset) -> String {
    (now - TimeDelta::days(TRAILING_WINDOW_DAYS))
        .with_timezone(tz)
        .format(TIMESTAMP_FORMAT)
        .to_string()
}

pub struct EngagementAggregator<'a> {
    store: &'a Store,
    excluded: HashSet<String>,
    tz: FixedOffset,
}

impl<'a> EngagementAggregator<'a> {
    pub fn new(store: &'a Store, excluded: HashSet<String>, tz: FixedOffset) -> Self {
        Self { store, excluded, tz }
    }

    /// Users with more than `threshold` reactions on notes created in the last 7 days.
    pub fn follow_candidates(&self, now: DateTime<Utc>, threshold: u64) -> Result<Vec<FollowCandidate>> {
        let cutoff = trailing_cutoff(now, &self.tz);
        let reactors = self.store.reactor_ids_since(&cutoff)?;
        let out = rank_follow_candidates(reactors, &self.excluded, threshold);
        info!("follow candidates since {cutoff}: {}", out.len());
        Ok(out)
    }

    pub fn list_candidates(&self, min_share: ShareThreshold) -> Result<Vec<ListCandidate>> {
        let counts = self.store.reaction_counts_by_user()?;
        let out = rank_list_candidates(counts, &self.excluded, min_share);
        info!("list candidates (share >= {}): {}", min_share.as_fraction(), out.len());
        Ok(out)
    }
}
