/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, FixedOffset, NaiveTime, TimeDelta, Utc, Weekday};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::actuator::Actuator;
use crate::api::MisskeyApi;
use crate::config::{AppConfig, Settings};
use crate::engagement::{default_exclusions, EngagementAggregator};
use crate::note_sync::{NoteSync, NoteSyncReport};
use crate::reaction_sync::{ReactionSync, ReactionSyncReport};
use crate::store::Store;

/// Fires once a week at a wall-clock time in the pipeline's time zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeeklySchedule {
    weekday: Weekday,
    at: NaiveTime,
}

impl WeeklySchedule {
    pub fn new(weekday: Weekday, hour: u32, minute: u32) -> Self {
        let at = NaiveTime::from_hms_opt(hour.min(23), minute.min(59), 0).unwrap_or(NaiveTime::MIN);
        Self { weekday, at }
    }

    /// Parses a day name (`sat`, `Saturday`) and an `HH:MM` time.
    pub fn parse(day: &str, at: &str) -> Result<Self> {
        let weekday: Weekday = day
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid weekday: {day}"))?;
        let at = NaiveTime::parse_from_str(at.trim(), "%H:%M").with_context(|| format!("invalid time: {at}"))?;
        Ok(Self { weekday, at })
    }

    /// First trigger strictly after `now`.
    pub fn next_after(&self, now: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
        let today = now.date_naive();
        let ahead = (self.weekday.num_days_from_monday() as i64
            - today.weekday().num_days_from_monday() as i64)
            .rem_euclid(7);
        let day = today + TimeDelta::days(ahead);
        let candidate = day
            .and_time(self.at)
            .and_local_timezone(*now.offset())
            .single()
            .unwrap_or(now);
        if candidate <= now {
            candidate + TimeDelta::days(7)
        } else {
            candidate
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    pub notes: NoteSyncReport,
    pub reactions: ReactionSyncReport,
    pub follow_candidates: usize,
    pub followed: usize,
    pub list_candidates: usize,
    pub listed: usize,
}

/// Runs note sync, reaction sync, aggregation and the follow/list actions in order.
pub struct Orchestrator {
    api: Arc<dyn MisskeyApi>,
    store: Store,
    config: AppConfig,
    settings: Settings,
    excluded: HashSet<String>,
}

impl Orchestrator {
    pub fn new(api: Arc<dyn MisskeyApi>, store: Store, config: AppConfig, settings: Settings) -> Result<Self> {
        let primary = config.instance(&settings.primary)?;
        primary.my_userid()?;
        config.follow_accounts(&settings.primary, &settings.follow_accounts)?;
        let mut excluded = default_exclusions();
        excluded.extend(primary.excluded_user_ids.iter().cloned());
        Ok(Self {
            api,
            store,
            config,
            settings,
            excluded,
        })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn excluded(&self) -> &HashSet<String> {
        &self.excluded
    }

    pub async fn run_once(&self) -> Result<PipelineReport> {
        let s = &self.settings;
        let api = self.api.as_ref();
        let primary = self.config.instance(&s.primary)?;
        info!(
            "pipeline start (instance={}, reaction_th={}, follow_th={})",
            primary.name, s.reaction_window, s.follow_threshold
        );

        let notes = NoteSync::new(api, &self.store, primary, s.tz).sync().await?;
        let reactions = ReactionSync::new(api, &self.store, primary, s.delay)
            .sync(s.reaction_window)
            .await?;

        let aggregator = EngagementAggregator::new(&self.store, self.excluded.clone(), s.tz);
        let actuator = Actuator::new(api, s.delay);

        let follow = aggregator.follow_candidates(Utc::now(), s.follow_threshold)?;
        let follow_ids = follow.iter().map(|c| c.user_id.clone()).collect::<Vec<_>>();
        let accounts = self.config.follow_accounts(&s.primary, &s.follow_accounts)?;
        let followed = actuator.follow(&follow_ids, &accounts).await?;

        let list = aggregator.list_candidates(s.list_min_share)?;
        let list_ids = list.iter().map(|c| c.user_id.clone()).collect::<Vec<_>>();
        let listed = match primary.target_list_id() {
            Some(list_id) => actuator.add_to_list(&list_ids, primary, list_id).await?,
            None => {
                warn!("{} has no target_list_id, skipping list curation", primary.name);
                0
            }
        };

        let report = PipelineReport {
            notes,
            reactions,
            follow_candidates: follow.len(),
            followed,
            list_candidates: list.len(),
            listed,
        };
        info!("pipeline done: {report:?}");
        Ok(report)
    }

    /// Runs the pipeline on every scheduled trigger until `shutdown` flips to true.
    /// A failed run is logged and the loop waits for the next trigger.
    pub async fn run_monitor(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let tz = self.settings.tz;
        let schedule = self.settings.schedule;
        let mut next = schedule.next_after(Utc::now().with_timezone(&tz));
        info!("monitoring, next run at {next}");

        let mut tick = tokio::time::interval(std::time::Duration::from_secs(1));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() { break; }
                }
                _ = tick.tick() => {}
            }
            if *shutdown.borrow() {
                break;
            }
            if Utc::now().with_timezone(&tz) < next {
                continue;
            }
            if let Err(e) = self.run_once().await {
                error!("pipeline failed: {e:#}");
            }
            next = schedule.next_after(Utc::now().with_timezone(&tz));
            info!("next run at {next}");
        }
        info!("monitor stopped");
        Ok(())
    }
}
