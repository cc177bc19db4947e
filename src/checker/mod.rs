// src/checker/mod.rs
// =============================================================================
// This module contains the liveness check run over discovered file links.
//
// Submodules:
// - http: HEAD/GET probes, status classification, concurrent validation
//
// The crawler calls `validate_candidates` once traversal has finished; the
// CLI's `check` command calls `check_links` directly to show every result.
// =============================================================================

mod http;

pub use http::{
    check_links, probe, validate_candidates, LinkCheckResult, LinkStatus, ProbeOptions,
    ValidationMode, PROBE_CONCURRENCY, PROBE_TIMEOUT,
};
