pub mod aggregator;
pub mod api;
pub mod clock;
pub mod command;
pub mod config;
pub mod decision;
pub mod engine;
pub mod exchange;
pub mod history;
pub mod metrics;
pub mod model;
pub mod orchestrator;
pub mod prompt;
pub mod rate_limiter;
