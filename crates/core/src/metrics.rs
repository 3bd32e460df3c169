//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Ticket provisioning (created, quota denials, failures)
//! - The category selector (outcomes)
//! - Settings reconciliation (applies by result)
//! - Ephemeral cleanup (swallowed deletion failures)

use once_cell::sync::Lazy;
use prometheus::{IntCounter, IntCounterVec, Opts};

/// Tickets successfully provisioned.
pub static TICKETS_CREATED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("deskbot_tickets_created_total", "Total tickets created").unwrap()
});

/// Admissions denied by the quota policy.
pub static QUOTA_DENIALS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("deskbot_quota_denials_total", "Total quota denials"),
        &["reason"], // "already_has_ticket", "max_reached"
    )
    .unwrap()
});

/// Provisioning sequences that failed partway.
pub static PROVISION_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "deskbot_provision_failures_total",
            "Total failed ticket provisioning attempts",
        ),
        &["stage"], // "member_lookup", "channel_create", "record_write"
    )
    .unwrap()
});

/// Category selector terminal outcomes.
pub static SELECTOR_OUTCOMES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "deskbot_selector_outcomes_total",
            "Total category selector outcomes",
        ),
        &["outcome"], // "selected", "timed_out", "invalid"
    )
    .unwrap()
});

/// Settings document applies by result.
pub static RECONCILE_APPLIES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "deskbot_reconcile_applies_total",
            "Total settings document applies",
        ),
        &["result"], // "applied", "validation_failed", "error"
    )
    .unwrap()
});

/// Ephemeral message deletions that failed and were swallowed.
pub static CLEANUP_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "deskbot_cleanup_failures_total",
        "Total swallowed ephemeral cleanup failures",
    )
    .unwrap()
});

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(TICKETS_CREATED.clone()),
        Box::new(QUOTA_DENIALS.clone()),
        Box::new(PROVISION_FAILURES.clone()),
        Box::new(SELECTOR_OUTCOMES.clone()),
        Box::new(RECONCILE_APPLIES.clone()),
        Box::new(CLEANUP_FAILURES.clone()),
    ]
}
