//! Resilience helpers for upstream calls.
//!
//! # Design Decisions
//! - Every upstream call has a deadline (see `TimingConfig::upstream_budget`)
//! - Transient failures are retried by the subscription worker with jittered backoff
//! - Jitter prevents many subscriptions from hammering a recovering source in lockstep

pub mod backoff;
