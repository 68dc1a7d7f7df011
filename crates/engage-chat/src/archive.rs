//! Append-only log of completed sessions and the analytics built from it.

use engage_core::types::{format_duration, ChatRecord};
use serde::{Deserialize, Serialize};

/// Dashboard figures over every archived session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsReport {
    pub total_sessions: usize,
    pub conversions: usize,
    /// Mean chat length, rounded to whole seconds.
    pub average_chat_seconds: u64,
    pub average_chat_formatted: String,
    /// Conversions over total, as a rounded percentage. Zero when empty.
    pub conversion_rate_percent: u32,
    /// Newest first.
    pub records: Vec<ChatRecord>,
}

/// Completed sessions in completion order. Records are never updated or
/// removed.
#[derive(Debug, Clone, Default)]
pub struct SessionArchive {
    records: Vec<ChatRecord>,
}

impl SessionArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, record: ChatRecord) {
        tracing::info!(
            session_id = %record.id,
            outcome = %record.outcome_summary,
            seconds = record.chat_length_seconds,
            "Session archived"
        );
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[ChatRecord] {
        &self.records
    }

    pub fn newest_first(&self) -> Vec<ChatRecord> {
        self.records.iter().rev().cloned().collect()
    }

    pub fn report(&self) -> AnalyticsReport {
        let total = self.records.len();
        if total == 0 {
            return AnalyticsReport {
                average_chat_formatted: format_duration(0),
                ..AnalyticsReport::default()
            };
        }

        let conversions = self.records.iter().filter(|r| r.is_conversion()).count();
        let total_seconds: u64 = self.records.iter().map(|r| r.chat_length_seconds).sum();
        let average = (total_seconds as f64 / total as f64).round() as u64;
        let rate = ((conversions as f64 / total as f64) * 100.0).round() as u32;

        AnalyticsReport {
            total_sessions: total,
            conversions,
            average_chat_seconds: average,
            average_chat_formatted: format_duration(average),
            conversion_rate_percent: rate,
            records: self.newest_first(),
        }
    }
}
