use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Outcome of one extract → transform → load cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleSummary {
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub success: bool,
    pub extracted: usize,
    pub transformed: usize,
    pub loaded: usize,
    pub dropped_by_stage: BTreeMap<String, usize>,
    pub error: Option<String>,
}

impl CycleSummary {
    pub fn started(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            duration_ms: 0,
            success: false,
            extracted: 0,
            transformed: 0,
            loaded: 0,
            dropped_by_stage: BTreeMap::new(),
            error: None,
        }
    }
}

/// In-memory run statistics owned by the orchestrator.
///
/// Counters only ever grow; `last_error` keeps the most recent failure even
/// after later cycles succeed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineRunRecord {
    pub started_at: DateTime<Utc>,
    pub cycles_run: u64,
    pub cycles_succeeded: u64,
    pub cycles_failed: u64,
    pub records_processed_total: u64,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_cycle: Option<CycleSummary>,
    /// Outcomes of the most recent cycles, oldest first
    pub recent_outcomes: VecDeque<bool>,
    #[serde(skip)]
    window: usize,
}

impl PipelineRunRecord {
    pub fn new(started_at: DateTime<Utc>, window: usize) -> Self {
        Self {
            started_at,
            cycles_run: 0,
            cycles_succeeded: 0,
            cycles_failed: 0,
            records_processed_total: 0,
            last_run_at: None,
            last_success_at: None,
            last_error: None,
            last_cycle: None,
            recent_outcomes: VecDeque::with_capacity(window.max(1)),
            window: window.max(1),
        }
    }

    pub fn record_cycle(&mut self, summary: CycleSummary) {
        self.cycles_run += 1;
        self.last_run_at = Some(summary.started_at);

        if summary.success {
            self.cycles_succeeded += 1;
            self.records_processed_total += summary.loaded as u64;
            self.last_success_at = Some(summary.started_at);
        } else {
            self.cycles_failed += 1;
            self.last_error = summary.error.clone();
        }

        if self.recent_outcomes.len() == self.window {
            self.recent_outcomes.pop_front();
        }
        self.recent_outcomes.push_back(summary.success);
        self.last_cycle = Some(summary);
    }

    /// Lifetime success rate; `None` before the first cycle
    pub fn success_rate(&self) -> Option<f64> {
        (self.cycles_run > 0).then(|| self.cycles_succeeded as f64 / self.cycles_run as f64)
    }

    /// Success rate over the recent window; `None` before the first cycle
    pub fn recent_success_rate(&self) -> Option<f64> {
        if self.recent_outcomes.is_empty() {
            return None;
        }
        let succeeded = self.recent_outcomes.iter().filter(|ok| **ok).count();
        Some(succeeded as f64 / self.recent_outcomes.len() as f64)
    }

    /// Time since the last success, or since start when nothing succeeded yet
    pub fn staleness(&self, now: DateTime<Utc>) -> chrono::Duration {
        let reference = self.last_success_at.unwrap_or(self.started_at);
        (now - reference).max(chrono::Duration::zero())
    }

    pub fn window(&self) -> usize {
        self.window
    }
}
