//! Controller lifecycle metrics.
//!
//! # Metrics
//! - `gozar_controller_starts_total` (counter): start calls by outcome
//! - `gozar_controller_rollbacks_total` (counter): failed starts by stage
//! - `gozar_controller_stops_total` (counter): stops that closed an instance
//! - `gozar_controller_running` (gauge): 1=running, 0=stopped
//!
//! # Design Decisions
//! - Uses the `metrics` facade; the embedding application picks the exporter
//! - With no recorder installed every call is a no-op

use metrics::{counter, gauge};

/// Record the result of a start call.
pub fn record_start(outcome: &'static str) {
    counter!("gozar_controller_starts_total", "outcome" => outcome).increment(1);
}

/// Record a start that failed and was rolled back.
pub fn record_rollback(stage: &'static str) {
    counter!("gozar_controller_rollbacks_total", "stage" => stage).increment(1);
}

/// Record a stop that tore down a running instance.
pub fn record_stop() {
    counter!("gozar_controller_stops_total").increment(1);
}

/// Record whether an instance is running.
pub fn record_running(running: bool) {
    gauge!("gozar_controller_running").set(if running { 1.0 } else { 0.0 });
}
