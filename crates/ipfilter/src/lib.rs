//! Scoped IP and country request filtering.
//!
//! Rule groups cover path scopes and match clients by IP range or by the
//! country their address resolves to. Per request, each group looks at its
//! most specific covering scope; across groups, the longest matched scope
//! decides whether the request is allowed or blocked.
//!
//! Feature flags:
//! - `axum`: middleware for axum routers (default)
//! - `metrics`: decision and error counters via the `metrics` facade

pub mod block;
pub mod client_ip;
pub mod config;
pub mod country;
pub mod error;
pub mod filter;
pub mod range;
pub mod rules;
pub mod scope;

#[cfg(feature = "axum")]
pub mod middleware;

pub use {
    block::{BlockPage, BlockStatus, respond_blocked},
    client_ip::{ClientRequest, FORWARDED_FOR_HEADER, client_ips},
    config::{FilterFile, RuleConfig, RuleSet, RuleSetBuilder},
    country::{CountryDatabase, CountryLookup},
    error::{Error, Result},
    filter::{Decision, IpFilter},
    range::IpRange,
    rules::{RuleAction, RuleGroup, Verdict},
};
