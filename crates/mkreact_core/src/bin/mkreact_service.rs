/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{Context, Result};
use chrono::FixedOffset;
use clap::Parser;
use mkreact_core::api::MisskeyClient;
use mkreact_core::config::{AppConfig, Settings};
use mkreact_core::engagement::{default_exclusions, ShareThreshold};
use mkreact_core::orchestrator::{Orchestrator, WeeklySchedule};
use mkreact_core::report::write_histogram;
use mkreact_core::store::Store;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;

/// Syncs notes and reactions from a Misskey account, then follows and lists the most engaged users.
#[derive(Debug, Parser)]
#[command(name = "mkreact_service", version)]
struct Args {
    /// Keep running and fire the pipeline on the weekly schedule.
    #[arg(short = 'm', long)]
    monitor: bool,

    /// Number of most recent notes whose reactions are fetched.
    #[arg(long = "reaction-th", visible_alias = "reaction_th", default_value_t = 100)]
    reaction_th: u32,

    /// Follow users with more than this many reactions in the last 7 days.
    #[arg(long = "follow-th", visible_alias = "follow_th", default_value_t = 5)]
    follow_th: u64,

    /// Minimum all-time share of reactions for list curation.
    #[arg(long, default_value_t = 0.02)]
    list_share: f64,

    #[arg(long, env = "MKREACT_CONFIG", default_value = "config.json")]
    config: PathBuf,

    #[arg(long, env = "MKREACT_DB", default_value = "misskey.sqlite")]
    db: PathBuf,

    /// Config block whose notes are tracked.
    #[arg(long, default_value = "misskey.io")]
    instance: String,

    /// Accounts that send follow requests (repeatable). Defaults to every configured instance.
    #[arg(long = "follow-account")]
    follow_accounts: Vec<String>,

    /// Pause between consecutive API calls.
    #[arg(long, default_value_t = 1000)]
    delay_ms: u64,

    #[arg(long, default_value_t = 30)]
    http_timeout_secs: u64,

    /// Fixed UTC offset used for stored timestamps and the schedule.
    #[arg(long, default_value_t = 9, allow_hyphen_values = true)]
    tz_offset_hours: i32,

    #[arg(long, default_value = "sat")]
    schedule_day: String,

    #[arg(long, default_value = "13:00")]
    schedule_at: String,

    /// Render the reaction histogram and exit.
    #[arg(long, num_args = 0..=1, default_missing_value = "output/reaction_histogram.html")]
    report: Option<PathBuf>,
}

impl Args {
    fn settings(&self) -> Result<Settings> {
        let tz = FixedOffset::east_opt(self.tz_offset_hours.saturating_mul(3600))
            .with_context(|| format!("invalid tz offset: {}", self.tz_offset_hours))?;
        if !(0.0..=1.0).contains(&self.list_share) {
            anyhow::bail!("--list-share must be within 0..=1");
        }
        Ok(Settings {
            db_path: self.db.clone(),
            primary: self.instance.clone(),
            follow_accounts: self.follow_accounts.clone(),
            reaction_window: self.reaction_th,
            follow_threshold: self.follow_th,
            list_min_share: ShareThreshold::from_fraction(self.list_share),
            delay: Duration::from_millis(self.delay_ms),
            tz,
            schedule: WeeklySchedule::parse(&self.schedule_day, &self.schedule_at)?,
            report_path: self
                .report
                .clone()
                .unwrap_or_else(|| Settings::default().report_path),
        })
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("info".parse()?),
        )
        .init();

    let args = Args::parse();
    let settings = args.settings()?;
    info!(
        "start (monitor={}, [{}, {}])",
        args.monitor, args.reaction_th, args.follow_th
    );

    if args.report.is_some() {
        let store = Store::open_existing(&settings.db_path)?;
        let mut excluded = default_exclusions();
        match AppConfig::load_if_present(&args.config)? {
            Some(cfg) => {
                if let Ok(inst) = cfg.instance(&settings.primary) {
                    excluded.extend(inst.excluded_user_ids.iter().cloned());
                }
            }
            None => info!("no config at {}, using default exclusions", args.config.display()),
        }
        write_histogram(&store, &excluded, &settings.report_path)?;
        return Ok(());
    }

    let store = Store::open(&settings.db_path)?;

    let config = AppConfig::load(&args.config)?;
    info!(
        "config: {} ({})",
        args.config.display(),
        config.names().collect::<Vec<_>>().join(", ")
    );
    let client = MisskeyClient::new(Duration::from_secs(args.http_timeout_secs))?;
    let orchestrator = Orchestrator::new(Arc::new(client), store, config, settings)?;

    if !args.monitor {
        orchestrator.run_once().await?;
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            let _ = shutdown_tx.send(true);
        }
    });
    orchestrator.run_monitor(shutdown_rx).await
}
