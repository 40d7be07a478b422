use once_cell::sync::Lazy;
use prometheus::{
    Encoder, Histogram, IntCounter, IntCounterVec, TextEncoder, register_histogram,
    register_int_counter, register_int_counter_vec,
};

// --- Decision Cycle Metrics ---

pub static CYCLE_DURATION: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "kraken_agent_cycle_duration_seconds",
        "Wall time of one decision cycle (aggregate -> decide -> execute -> record)",
        vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]
    )
    .expect("cycle_duration histogram")
});

pub static CYCLES_STARTED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("kraken_agent_cycles_total", "Total decision cycles started")
        .expect("cycles counter")
});

pub static CYCLES_ABORTED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "kraken_agent_cycles_aborted_total",
        "Cycles aborted before a decision because account data was unavailable"
    )
    .expect("cycles_aborted counter")
});

pub static PARSE_ERRORS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "kraken_agent_parse_errors_total",
        "Decision responses that were empty or not a parsable command"
    )
    .expect("parse_errors counter")
});

pub static EXECUTION_ERRORS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "kraken_agent_execution_errors_total",
        "Commands outside the grammar or whose exchange call failed"
    )
    .expect("execution_errors counter")
});

pub static COMMANDS_EXECUTED: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "kraken_agent_commands_executed_total",
        "Commands executed, by grammar function",
        &["function"]
    )
    .expect("commands_executed counter")
});

// --- Exchange Metrics ---

pub static EXCHANGE_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "kraken_agent_exchange_failures_total",
        "Exchange requests that failed in transport, by endpoint",
        &["endpoint"]
    )
    .expect("exchange_failures counter")
});

pub fn inc_cycles_started() {
    CYCLES_STARTED.inc();
}

pub fn inc_cycles_aborted() {
    CYCLES_ABORTED.inc();
}

pub fn inc_parse_errors() {
    PARSE_ERRORS.inc();
}

pub fn inc_execution_errors() {
    EXECUTION_ERRORS.inc();
}

pub fn inc_commands_executed(function: &str) {
    COMMANDS_EXECUTED.with_label_values(&[function]).inc();
}

pub fn inc_exchange_failures(endpoint: &str) {
    EXCHANGE_FAILURES.with_label_values(&[endpoint]).inc();
}

pub fn observe_cycle_duration(seconds: f64) {
    CYCLE_DURATION.observe(seconds);
}

/// Render the default registry in the Prometheus text format.
pub fn gather_text() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::error!("failed to encode metrics: {}", e);
    }
    String::from_utf8(buffer).unwrap_or_default()
}
