/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::Path;
use tracing::info;

use crate::model::UserReactionCount;
use crate::store::Store;

const CHART_HEIGHT: u32 = 700;
const PLOT_TOP: u32 = 60;
const PLOT_BOTTOM: u32 = 560;
const BAR_WIDTH: u32 = 24;
const BAR_GAP: u32 = 6;
const MARGIN_LEFT: u32 = 60;

/// Reaction totals per user id, administrative ids removed, largest first.
pub fn reaction_histogram(store: &Store, excluded: &HashSet<String>) -> Result<Vec<UserReactionCount>> {
    Ok(store
        .reaction_counts_by_userid()?
        .into_iter()
        .filter(|c| !excluded.contains(&c.user_id))
        .collect())
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Static HTML page with an SVG bar chart, one bar per user.
pub fn render_histogram_html(rows: &[UserReactionCount], title: &str) -> String {
    let max = rows.iter().map(|r| r.count).max().unwrap_or(0).max(1);
    let plot_h = (PLOT_BOTTOM - PLOT_TOP) as f64;
    let width = MARGIN_LEFT * 2 + (BAR_WIDTH + BAR_GAP) * rows.len().max(1) as u32;

    let mut svg = String::new();
    let _ = write!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{CHART_HEIGHT}" font-family="sans-serif" font-size="11">"#
    );
    let _ = write!(
        svg,
        r#"<text x="{MARGIN_LEFT}" y="30" font-size="18">{}</text>"#,
        escape(title)
    );
    let _ = write!(
        svg,
        r##"<line x1="{MARGIN_LEFT}" y1="{PLOT_BOTTOM}" x2="{}" y2="{PLOT_BOTTOM}" stroke="#444"/>"##,
        width - MARGIN_LEFT
    );
    let _ = write!(
        svg,
        r#"<text x="{}" y="{}" text-anchor="end">{max}</text>"#,
        MARGIN_LEFT - 6,
        PLOT_TOP + 4
    );
    for (i, row) in rows.iter().enumerate() {
        let x = MARGIN_LEFT + BAR_GAP + i as u32 * (BAR_WIDTH + BAR_GAP);
        let h = (row.count as f64 / max as f64 * plot_h).round() as u32;
        let y = PLOT_BOTTOM - h;
        let name = escape(&row.username);
        let _ = write!(
            svg,
            r##"<rect x="{x}" y="{y}" width="{BAR_WIDTH}" height="{h}" fill="#636efa"><title>{name}: {}</title></rect>"##,
            row.count
        );
        let lx = x + BAR_WIDTH / 2;
        let ly = PLOT_BOTTOM + 10;
        let _ = write!(
            svg,
            r#"<text x="{lx}" y="{ly}" transform="rotate(60 {lx} {ly})">{name}</text>"#
        );
    }
    svg.push_str("</svg>");

    format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{}</title></head>\n<body>\n{svg}\n</body>\n</html>\n",
        escape(title)
    )
}

/// Renders the histogram to `path`, creating parent directories. Returns the number of bars.
pub fn write_histogram(store: &Store, excluded: &HashSet<String>, path: &Path) -> Result<usize> {
    let rows = reaction_histogram(store, excluded)?;
    let html = render_histogram_html(&rows, "リアクション数");
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| format!("create dir: {}", parent.display()))?;
    }
    std::fs::write(path, html).with_context(|| format!("write report: {}", path.display()))?;
    info!("histogram of {} users written to {}", rows.len(), path.display());
    Ok(rows.len())
}
