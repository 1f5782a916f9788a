//! Pipeline metrics recorded through the `metrics` facade.
//!
//! Nothing is exported unless the host process installs a recorder (the API service does so
//! through its Prometheus layer); without one every call here is a no-op.

use std::time::Duration;

pub const MESSAGES_PROCESSED: &str = "scoring_messages_processed_total";
pub const MESSAGES_FAILED: &str = "scoring_messages_failed_total";
pub const PROCESSING_DURATION: &str = "scoring_processing_duration_ms";
pub const LLM_DURATION: &str = "scoring_llm_duration_ms";
pub const SCORE_DISTRIBUTION: &str = "scoring_score_distribution";
pub const ACTIVE_PROCESSINGS: &str = "scoring_active_processings";

pub(crate) fn record_processed(duration: Duration) {
    metrics::counter!(MESSAGES_PROCESSED).increment(1);
    metrics::histogram!(PROCESSING_DURATION).record(duration.as_secs_f64() * 1000.0);
}

pub(crate) fn record_failed(stage: &'static str, kind: &'static str, duration: Duration) {
    metrics::counter!(MESSAGES_FAILED, "stage" => stage, "kind" => kind).increment(1);
    metrics::histogram!(PROCESSING_DURATION).record(duration.as_secs_f64() * 1000.0);
}

pub(crate) fn record_llm_call(latency_ms: u64, score: u8) {
    metrics::histogram!(LLM_DURATION).record(latency_ms as f64);
    metrics::histogram!(SCORE_DISTRIBUTION).record(f64::from(score));
}

/// Tracks one in-flight run on the active gauge; decrements when dropped, including on
/// cancellation.
pub(crate) struct ActiveRun;

impl ActiveRun {
    pub(crate) fn start() -> Self {
        metrics::gauge!(ACTIVE_PROCESSINGS).increment(1.0);
        ActiveRun
    }
}

impl Drop for ActiveRun {
    fn drop(&mut self) {
        metrics::gauge!(ACTIVE_PROCESSINGS).decrement(1.0);
    }
}
