// src/stealth/mod.rs
// =============================================================================
// Request shaping for a crawl.
//
// Every crawl runs under one of three modes (standard, stealth, residential).
// A mode decides which user agents we pretend to be, whether traffic goes
// through a proxy, and how long we pause before each page fetch.
//
// The mode never changes what gets crawled or validated, only how the
// requests look on the wire.
// =============================================================================

mod agents;
mod policy;

pub use agents::{DESKTOP_USER_AGENTS, MOBILE_USER_AGENTS};
pub use policy::{CrawlMode, DelayRange, ModePolicy, ProxyPools, RequestShaper};
