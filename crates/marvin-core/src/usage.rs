// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Per-million-token rate for a model, in USD.
#[derive(Debug, Clone, Copy)]
struct Rate {
    input_per_million: f64,
    output_per_million: f64,
}

/// Conservative fallback for a model name the table doesn't recognize —
/// priced above every known entry so an unrecognized model never
/// under-reports cost.
const FALLBACK_RATE: Rate = Rate { input_per_million: 15.00, output_per_million: 75.00 };

/// Table lookup by substring match against the model id. Order matters:
/// more specific names (e.g. "4o-mini") must be checked before their
/// broader prefix ("4o").
fn rate_for_model(model: &str) -> Rate {
    let m = model.to_ascii_lowercase();
    let table: &[(&str, Rate)] = &[
        ("gpt-4o-mini", Rate { input_per_million: 0.15, output_per_million: 0.60 }),
        ("gpt-4o", Rate { input_per_million: 2.50, output_per_million: 10.00 }),
        ("gpt-4.1-mini", Rate { input_per_million: 0.40, output_per_million: 1.60 }),
        ("gpt-4.1", Rate { input_per_million: 2.00, output_per_million: 8.00 }),
        ("o1-mini", Rate { input_per_million: 1.10, output_per_million: 4.40 }),
        ("o1", Rate { input_per_million: 15.00, output_per_million: 60.00 }),
        ("claude-3-5-haiku", Rate { input_per_million: 0.80, output_per_million: 4.00 }),
        ("claude-3-haiku", Rate { input_per_million: 0.25, output_per_million: 1.25 }),
        ("claude-opus", Rate { input_per_million: 15.00, output_per_million: 75.00 }),
        ("claude", Rate { input_per_million: 3.00, output_per_million: 15.00 }),
        ("gemini-1.5-flash", Rate { input_per_million: 0.075, output_per_million: 0.30 }),
        ("gemini-2.0-flash", Rate { input_per_million: 0.10, output_per_million: 0.40 }),
        ("gemini-1.5-pro", Rate { input_per_million: 1.25, output_per_million: 5.00 }),
        ("gemini", Rate { input_per_million: 1.25, output_per_million: 5.00 }),
        ("llama", Rate { input_per_million: 0.05, output_per_million: 0.08 }),
        ("mixtral", Rate { input_per_million: 0.24, output_per_million: 0.24 }),
    ];
    for (needle, rate) in table {
        if m.contains(needle) {
            return *rate;
        }
    }
    FALLBACK_RATE
}

fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Lifetime totals, persisted as `usage.json` (full-file-replace).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageTotals {
    pub turns: u64,
    pub session_cost: f64,
    pub model_turns: HashMap<String, u64>,
    pub model_cost: HashMap<String, f64>,
    pub tool_calls: HashMap<String, u64>,
}

/// One line of `cost-log.jsonl` — an append-only per-turn record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostLogEntry {
    pub timestamp: DateTime<Utc>,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost: f64,
}

/// Aggregate + by-model breakdown returned by [`UsageTracker::range_query`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct RangeSummary {
    pub total_cost: f64,
    pub total_turns: u64,
    pub by_model: HashMap<String, ModelBreakdown>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ModelBreakdown {
    pub turns: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost: f64,
}

/// Tracks per-turn and per-tool-call cost for a profile, per §4.8.
pub struct UsageTracker {
    dir: PathBuf,
    totals: UsageTotals,
}

impl UsageTracker {
    fn usage_path(dir: &Path) -> PathBuf {
        dir.join("usage.json")
    }

    fn cost_log_path(dir: &Path) -> PathBuf {
        dir.join("cost-log.jsonl")
    }

    /// Tolerant of a missing or corrupt `usage.json` — lifetime totals are
    /// treated as zero rather than blocking startup.
    pub fn load(dir: &Path) -> Self {
        let path = Self::usage_path(dir);
        let totals = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "corrupt usage.json, starting from zero");
                UsageTotals::default()
            }),
            Err(_) => UsageTotals::default(),
        };
        Self { dir: dir.to_path_buf(), totals }
    }

    /// Record one model turn: computes cost from the per-million rate table,
    /// accumulates session/per-model totals, and appends a cost-log line.
    /// Returns the cost of this turn.
    pub fn record_turn(&mut self, model: &str, input_tokens: u64, output_tokens: u64) -> f64 {
        let rate = rate_for_model(model);
        let cost = (input_tokens as f64 / 1_000_000.0) * rate.input_per_million
            + (output_tokens as f64 / 1_000_000.0) * rate.output_per_million;

        self.totals.turns += 1;
        self.totals.session_cost += cost;
        *self.totals.model_turns.entry(model.to_string()).or_insert(0) += 1;
        *self.totals.model_cost.entry(model.to_string()).or_insert(0.0) += cost;

        self.append_cost_log(model, input_tokens, output_tokens, cost);
        cost
    }

    pub fn record_tool_call(&mut self, name: &str) {
        *self.totals.tool_calls.entry(name.to_string()).or_insert(0) += 1;
    }

    fn append_cost_log(&self, model: &str, input_tokens: u64, output_tokens: u64, cost: f64) {
        let entry = CostLogEntry { timestamp: now(), model: model.to_string(), input_tokens, output_tokens, cost };
        let Ok(line) = serde_json::to_string(&entry) else { return };
        let path = Self::cost_log_path(&self.dir);
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        match std::fs::OpenOptions::new().create(true).append(true).open(&path) {
            Ok(mut f) => {
                if let Err(e) = writeln!(f, "{line}") {
                    warn!(path = %path.display(), error = %e, "failed to append cost-log entry");
                }
            }
            Err(e) => warn!(path = %path.display(), error = %e, "failed to open cost-log.jsonl"),
        }
    }

    /// Full-file-replace write of lifetime totals to `usage.json`.
    pub fn save(&self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_string_pretty(&self.totals)?;
        std::fs::write(Self::usage_path(&self.dir), json)?;
        Ok(())
    }

    pub fn totals(&self) -> &UsageTotals {
        &self.totals
    }

    /// Scan `cost-log.jsonl` for entries within `[since, until]` (either bound
    /// optional) and return the aggregate + per-model breakdown.
    pub fn range_query(
        dir: &Path,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> RangeSummary {
        let path = Self::cost_log_path(dir);
        let raw = match std::fs::read_to_string(&path) {
            Ok(r) => r,
            Err(_) => return RangeSummary::default(),
        };

        let mut summary = RangeSummary::default();
        for line in raw.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let entry: CostLogEntry = match serde_json::from_str(line) {
                Ok(e) => e,
                Err(e) => {
                    warn!(error = %e, "skipping malformed cost-log line");
                    continue;
                }
            };
            if since.is_some_and(|s| entry.timestamp < s) {
                continue;
            }
            if until.is_some_and(|u| entry.timestamp > u) {
                continue;
            }
            summary.total_cost += entry.cost;
            summary.total_turns += 1;
            let model_entry = summary.by_model.entry(entry.model.clone()).or_default();
            model_entry.turns += 1;
            model_entry.input_tokens += entry.input_tokens;
            model_entry.output_tokens += entry.output_tokens;
            model_entry.cost += entry.cost;
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn load_missing_usage_file_returns_zero() {
        let dir = tempdir().unwrap();
        let tracker = UsageTracker::load(dir.path());
        assert_eq!(tracker.totals().turns, 0);
        assert_eq!(tracker.totals().session_cost, 0.0);
    }

    #[test]
    fn record_turn_accumulates_cost_and_counts() {
        let dir = tempdir().unwrap();
        let mut tracker = UsageTracker::load(dir.path());
        let cost1 = tracker.record_turn("gpt-4o", 1_000_000, 0);
        assert!((cost1 - 2.50).abs() < 1e-9);
        tracker.record_turn("gpt-4o", 0, 1_000_000);
        assert_eq!(tracker.totals().turns, 2);
        assert!((tracker.totals().session_cost - 12.50).abs() < 1e-9);
        assert_eq!(tracker.totals().model_turns["gpt-4o"], 2);
    }

    #[test]
    fn unknown_model_uses_conservative_fallback() {
        let dir = tempdir().unwrap();
        let mut tracker = UsageTracker::load(dir.path());
        let cost = tracker.record_turn("some-unlisted-model", 1_000_000, 1_000_000);
        assert!((cost - (15.00 + 75.00)).abs() < 1e-9);
    }

    #[test]
    fn record_tool_call_increments_by_name() {
        let dir = tempdir().unwrap();
        let mut tracker = UsageTracker::load(dir.path());
        tracker.record_tool_call("shell");
        tracker.record_tool_call("shell");
        tracker.record_tool_call("write");
        assert_eq!(tracker.totals().tool_calls["shell"], 2);
        assert_eq!(tracker.totals().tool_calls["write"], 1);
    }

    #[test]
    fn save_then_load_round_trips_totals() {
        let dir = tempdir().unwrap();
        let mut tracker = UsageTracker::load(dir.path());
        tracker.record_turn("gpt-4o-mini", 10_000, 2_000);
        tracker.save().unwrap();

        let reloaded = UsageTracker::load(dir.path());
        assert_eq!(reloaded.totals().turns, 1);
        assert!((reloaded.totals().session_cost - tracker.totals().session_cost).abs() < 1e-9);
    }

    #[test]
    fn corrupt_usage_file_falls_back_to_zero() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("usage.json"), "{ not json").unwrap();
        let tracker = UsageTracker::load(dir.path());
        assert_eq!(tracker.totals().turns, 0);
    }

    #[test]
    fn range_query_with_no_log_file_returns_empty_summary() {
        let dir = tempdir().unwrap();
        let summary = UsageTracker::range_query(dir.path(), None, None);
        assert_eq!(summary.total_turns, 0);
        assert_eq!(summary.total_cost, 0.0);
    }

    #[test]
    fn range_query_aggregates_across_turns_and_models() {
        let dir = tempdir().unwrap();
        let mut tracker = UsageTracker::load(dir.path());
        tracker.record_turn("gpt-4o", 1_000_000, 0);
        tracker.record_turn("gpt-4o-mini", 1_000_000, 0);

        let summary = UsageTracker::range_query(dir.path(), None, None);
        assert_eq!(summary.total_turns, 2);
        assert_eq!(summary.by_model["gpt-4o"].turns, 1);
        assert_eq!(summary.by_model["gpt-4o-mini"].turns, 1);
        assert!((summary.total_cost - (2.50 + 0.15)).abs() < 1e-6);
    }

    #[test]
    fn range_query_filters_by_since() {
        let dir = tempdir().unwrap();
        let mut tracker = UsageTracker::load(dir.path());
        tracker.record_turn("gpt-4o", 1000, 0);

        let future = now() + chrono::Duration::days(1);
        let summary = UsageTracker::range_query(dir.path(), Some(future), None);
        assert_eq!(summary.total_turns, 0);
    }
}
