//! `seedpin search <regex> [--from DATE] [--to DATE]` – find manifest entries.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate};
use seedpin_core::SeedEngine;

/// Unix seconds for a `YYYY-MM-DD` (UTC) or RFC 3339 date. A bare day is its
/// first second, or its last when `end_of_day` is set.
pub(crate) fn parse_date(s: &str, end_of_day: bool) -> Result<i64> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.timestamp());
    }
    let day = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("invalid date {:?} (expected YYYY-MM-DD or RFC 3339)", s))?;
    let time = if end_of_day {
        day.and_hms_opt(23, 59, 59)
    } else {
        day.and_hms_opt(0, 0, 0)
    };
    let time = time.with_context(|| format!("invalid date {:?}", s))?;
    Ok(time.and_utc().timestamp())
}

pub(crate) fn format_date(ts: i64) -> String {
    DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ts.to_string())
}

pub async fn run_search(
    engine: &SeedEngine,
    pattern: &str,
    from: Option<&str>,
    to: Option<&str>,
) -> Result<()> {
    let date_from = from.map(|s| parse_date(s, false)).transpose()?.unwrap_or(i64::MIN);
    let date_to = to.map(|s| parse_date(s, true)).transpose()?.unwrap_or(i64::MAX);
    let hits = engine.search_seeds(pattern, date_from, date_to).await?;
    if hits.is_empty() {
        println!("No matches.");
        return Ok(());
    }
    println!("{:<20} {:<6} {:<5} {}", "CREATED", "SEED", "INDEX", "NAME");
    for h in hits {
        println!(
            "{:<20} {:<6} {:<5} {}",
            format_date(h.date_created),
            h.seed_id,
            h.obj_index,
            h.name
        );
    }
    Ok(())
}
