//! Running totals over decoded samples

use chrono::{DateTime, Utc};
use loadwire_core::{HealthSnapshot, ResultSample};
use serde::Serialize;
use std::collections::BTreeMap;

/// Per-label totals
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LabelStats {
    /// Samples seen
    pub samples: u64,
    /// Samples with an error
    pub failures: u64,
    /// Sum of elapsed seconds
    pub total_elapsed: f64,
}

/// What a run produced
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Wall-clock start of the run
    pub started_at: DateTime<Utc>,
    /// Wall-clock end, set when the run finishes
    pub finished_at: Option<DateTime<Utc>>,
    /// Samples decoded
    pub samples: u64,
    /// Samples with an error
    pub failures: u64,
    /// Bytes sent and received
    pub bytes: u64,
    /// Sum of elapsed seconds
    pub total_elapsed: f64,
    /// Highest concurrency reported
    pub max_concurrency: u32,
    /// Totals per label
    pub labels: BTreeMap<String, LabelStats>,
    /// Last health snapshot
    pub health: HealthSnapshot,
}

impl Default for RunSummary {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl RunSummary {
    /// Empty summary starting at `started_at`
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            finished_at: None,
            samples: 0,
            failures: 0,
            bytes: 0,
            total_elapsed: 0.0,
            max_concurrency: 0,
            labels: BTreeMap::new(),
            health: HealthSnapshot::default(),
        }
    }

    /// Add one sample
    pub fn record(&mut self, sample: &ResultSample) {
        self.samples += 1;
        self.bytes = self.bytes.saturating_add(sample.bytes);
        self.total_elapsed += sample.elapsed;
        self.max_concurrency = self.max_concurrency.max(sample.concurrency);

        let label = self.labels.entry(sample.label.clone()).or_default();
        label.samples += 1;
        label.total_elapsed += sample.elapsed;

        if sample.is_failure() {
            self.failures += 1;
            label.failures += 1;
        }
    }

    /// Add a batch of samples
    pub fn extend<'a>(&mut self, samples: impl IntoIterator<Item = &'a ResultSample>) {
        for sample in samples {
            self.record(sample);
        }
    }

    /// Mean elapsed seconds, 0 without samples
    pub fn mean_elapsed(&self) -> f64 {
        if self.samples == 0 {
            0.0
        } else {
            self.total_elapsed / self.samples as f64
        }
    }

    /// Fraction of failed samples
    pub fn failure_rate(&self) -> f64 {
        if self.samples == 0 {
            0.0
        } else {
            self.failures as f64 / self.samples as f64
        }
    }

    /// Mark the run finished
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }
}
