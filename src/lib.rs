// Library interface for cname-sentry
pub mod classifier;
pub mod cli;
pub mod config;
pub mod dedupe;
pub mod metrics;
pub mod notifier;
pub mod orchestrator;
pub mod output;
pub mod progress;
pub mod resolver;
pub mod scheduler;
pub mod snapshot;
pub mod state;
pub mod stats;
pub mod store;
pub mod targets;
pub mod types;
