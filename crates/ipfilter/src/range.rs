//! Inclusive IPv4 ranges and the parser for human-entered range expressions.
//!
//! Three shapes are accepted, tried in this order:
//! - partial dotted form, `192.168` → `192.168.0.0`..=`192.168.255.255`
//! - dash form, `1.1.1.1-10` → `1.1.1.1`..=`1.1.1.10`
//! - a single address, `10.0.0.5` → `10.0.0.5`..=`10.0.0.5`

use std::{
    fmt,
    net::{IpAddr, Ipv4Addr},
    str::FromStr,
};

use crate::{Error, Result};

/// An inclusive `[start, end]` range of IPv4 addresses.
///
/// Bounds are not normalized: a range whose `start` exceeds its `end` is
/// accepted and simply never contains anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IpRange {
    start: Ipv4Addr,
    end: Ipv4Addr,
}

impl IpRange {
    #[must_use]
    pub const fn new(start: Ipv4Addr, end: Ipv4Addr) -> Self {
        Self { start, end }
    }

    /// Parse a range expression in any of the supported shapes.
    pub fn parse(text: &str) -> Result<Self> {
        let fields: Vec<&str> = text.split('.').collect();
        if fields.len() < 4 {
            return Self::parse_partial(text, &fields);
        }

        if let Some((start, suffix)) = text.split_once('-') {
            return Self::parse_dash(text, start, suffix);
        }

        let addr = parse_v4(text).ok_or_else(|| Error::InvalidAddress(text.to_string()))?;
        Ok(Self::new(addr, addr))
    }

    fn parse_partial(text: &str, fields: &[&str]) -> Result<Self> {
        let missing = 4 - fields.len();
        let mut start = fields.to_vec();
        let mut end = fields.to_vec();
        start.extend(std::iter::repeat_n("0", missing));
        end.extend(std::iter::repeat_n("255", missing));

        match (parse_v4(&start.join(".")), parse_v4(&end.join("."))) {
            (Some(start), Some(end)) => Ok(Self::new(start, end)),
            _ => Err(Error::InvalidAddress(text.to_string())),
        }
    }

    fn parse_dash(text: &str, start: &str, suffix: &str) -> Result<Self> {
        let start = parse_v4(start).ok_or_else(|| Error::InvalidAddress(text.to_string()))?;

        // The suffix replaces the last octet verbatim; whatever it is must
        // still produce a valid address.
        let [a, b, c, _] = start.octets();
        let end = parse_v4(&format!("{a}.{b}.{c}.{suffix}"))
            .ok_or_else(|| Error::InvalidAddress(text.to_string()))?;

        Ok(Self::new(start, end))
    }

    #[must_use]
    pub fn start(&self) -> Ipv4Addr {
        self.start
    }

    #[must_use]
    pub fn end(&self) -> Ipv4Addr {
        self.end
    }

    /// Check whether `ip` lies within the range, bounds included.
    ///
    /// IPv4-mapped IPv6 addresses are compared as their IPv4 form; any other
    /// IPv6 address is never in range.
    #[must_use]
    pub fn contains(&self, ip: &IpAddr) -> bool {
        let v4 = match ip {
            IpAddr::V4(v4) => *v4,
            IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
                Some(v4) => v4,
                None => return false,
            },
        };
        self.start <= v4 && v4 <= self.end
    }
}

impl FromStr for IpRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for IpRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// Parse an address that reduces to four bytes: plain IPv4 or IPv4-mapped IPv6.
fn parse_v4(text: &str) -> Option<Ipv4Addr> {
    match text.parse::<IpAddr>().ok()? {
        IpAddr::V4(v4) => Some(v4),
        IpAddr::V6(v6) => v6.to_ipv4_mapped(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use {super::*, rstest::rstest};

    fn v4(s: &str) -> Ipv4Addr {
        s.parse().unwrap()
    }

    #[rstest]
    #[case("192.168", "192.168.0.0", "192.168.255.255")]
    #[case("10", "10.0.0.0", "10.255.255.255")]
    #[case("172.16.5", "172.16.5.0", "172.16.5.255")]
    #[case("1.1.1.1-10", "1.1.1.1", "1.1.1.10")]
    #[case("10.0.0.5", "10.0.0.5", "10.0.0.5")]
    #[case("::ffff:1.2.3.4", "1.2.3.4", "1.2.3.4")]
    fn parses_supported_shapes(#[case] text: &str, #[case] start: &str, #[case] end: &str) {
        let range = IpRange::parse(text).unwrap();
        assert_eq!(range.start(), v4(start), "{text}");
        assert_eq!(range.end(), v4(end), "{text}");
    }

    #[rstest]
    #[case("not-an-ip")]
    #[case("")]
    #[case("300.1")]
    #[case("1.1.1.1-999")]
    #[case("1.1.1.1-1.5")]
    #[case("1.1.1.1-10-20")]
    #[case("1.1.1-10")]
    #[case("1.2.3.4.5")]
    #[case(" 8.8.8.8 ")]
    #[case("2001:db8::1")]
    #[case("::1")]
    fn rejects_invalid(#[case] text: &str) {
        let err = IpRange::parse(text).unwrap_err();
        assert!(matches!(err, Error::InvalidAddress(_)), "{text}: {err}");
    }

    #[test]
    fn reversed_dash_range_is_accepted_but_empty() {
        let range = IpRange::parse("1.1.1.10-2").unwrap();
        assert_eq!(range.start(), v4("1.1.1.10"));
        assert_eq!(range.end(), v4("1.1.1.2"));
        for last in 0..=255u8 {
            assert!(!range.contains(&IpAddr::V4(Ipv4Addr::new(1, 1, 1, last))));
        }
    }

    #[test]
    fn contains_is_inclusive() {
        let range = IpRange::new(v4("10.0.0.0"), v4("10.0.0.255"));
        assert!(range.contains(&"10.0.0.0".parse().unwrap()));
        assert!(range.contains(&"10.0.0.7".parse().unwrap()));
        assert!(range.contains(&"10.0.0.255".parse().unwrap()));
        assert!(!range.contains(&"10.0.1.0".parse().unwrap()));
        assert!(!range.contains(&"9.255.255.255".parse().unwrap()));
    }

    #[test]
    fn contains_agrees_with_bound_comparison() {
        let range = IpRange::new(v4("192.168.4.16"), v4("192.168.9.3"));
        for third in 0..=12u8 {
            for last in (0..=255u8).step_by(5) {
                let addr = Ipv4Addr::new(192, 168, third, last);
                let expected = range.start() <= addr && addr <= range.end();
                assert_eq!(range.contains(&IpAddr::V4(addr)), expected, "{addr}");
            }
        }
    }

    #[test]
    fn contains_ipv6() {
        let range = IpRange::parse("1.2.3").unwrap();
        assert!(range.contains(&"::ffff:1.2.3.9".parse().unwrap()));
        assert!(!range.contains(&"::ffff:1.2.4.9".parse().unwrap()));
        assert!(!range.contains(&"2001:db8::1".parse().unwrap()));
    }

    #[test]
    fn display() {
        assert_eq!(IpRange::parse("1.1.1.1-10").unwrap().to_string(), "1.1.1.1-1.1.1.10");
        assert_eq!(IpRange::parse("10.0.0.5").unwrap().to_string(), "10.0.0.5");
    }

    #[test]
    fn from_str() {
        let range: IpRange = "192.168".parse().unwrap();
        assert_eq!(range.end(), v4("192.168.255.255"));
    }
}
