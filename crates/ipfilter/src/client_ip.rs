//! Client address extraction from request metadata.

use std::net::IpAddr;

use crate::{Error, Result};

/// Header carrying the proxy chain of client addresses.
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// The parts of an incoming request the filter looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientRequest<'a> {
    path: &'a str,
    remote_addr: &'a str,
    forwarded_for: Option<&'a str>,
}

impl<'a> ClientRequest<'a> {
    /// `remote_addr` is the direct connection endpoint, with or without a port.
    #[must_use]
    pub fn new(path: &'a str, remote_addr: &'a str) -> Self {
        Self {
            path,
            remote_addr,
            forwarded_for: None,
        }
    }

    #[must_use]
    pub fn with_forwarded_for(mut self, header: Option<&'a str>) -> Self {
        self.forwarded_for = header;
        self
    }

    #[must_use]
    pub fn path(&self) -> &'a str {
        self.path
    }

    #[must_use]
    pub fn remote_addr(&self) -> &'a str {
        self.remote_addr
    }

    #[must_use]
    pub fn forwarded_for(&self) -> Option<&'a str> {
        self.forwarded_for
    }
}

/// Collect the candidate client addresses of a request.
///
/// Unless `strict` is set, a non-empty forwarded-for header wins over the
/// connection address and every entry of it is a candidate, in header order.
/// Entries that fail to parse are skipped; if none parse the request fails
/// with [`Error::NoParsableAddress`].
pub fn client_ips(request: &ClientRequest<'_>, strict: bool) -> Result<Vec<IpAddr>> {
    let candidates: Vec<&str> = match request.forwarded_for.filter(|h| !h.is_empty()) {
        Some(header) if !strict => header.split(',').collect(),
        _ => vec![strip_port(request.remote_addr)],
    };

    let ips: Vec<IpAddr> = candidates
        .iter()
        .filter_map(|candidate| candidate.trim().parse().ok())
        .collect();

    if ips.is_empty() {
        return Err(Error::NoParsableAddress(candidates.join(",")));
    }
    Ok(ips)
}

/// Strip the port from `ip:port` or `[v6]:port`; bare addresses pass through.
fn strip_port(remote: &str) -> &str {
    let remote = remote.trim();
    if remote.parse::<IpAddr>().is_ok() {
        return remote;
    }
    if let Some(rest) = remote.strip_prefix('[') {
        return rest.split_once(']').map_or(rest, |(host, _)| host);
    }
    remote.rsplit_once(':').map_or(remote, |(host, _)| host)
}
