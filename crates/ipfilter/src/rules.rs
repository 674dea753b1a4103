//! Scoped rule groups and the per-group verdict.

use std::{fmt, net::IpAddr};

use {
    serde::{Deserialize, Serialize},
    tracing::debug,
};

use crate::{
    BlockPage, ClientRequest, CountryLookup, Error, IpRange, Result, client_ip::client_ips, scope,
};

/// What a criteria match means for a rule group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    /// Allow-list: matching clients pass, everyone else is denied.
    #[default]
    Allow,
    /// Deny-list: matching clients are denied, everyone else passes.
    Block,
}

impl fmt::Display for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow => f.write_str("allow"),
            Self::Block => f.write_str("block"),
        }
    }
}

/// One configured block of scopes, criteria and polarity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleGroup {
    scopes: Vec<String>,
    action: RuleAction,
    strict: bool,
    block_page: Option<BlockPage>,
    countries: Vec<String>,
    ranges: Vec<IpRange>,
}

/// Result of evaluating one rule group against a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict<'a> {
    pub allow: bool,
    /// The scope that matched; `None` when the group abstains.
    pub scope: Option<&'a str>,
}

impl Verdict<'_> {
    /// Length of the matched scope, zero for an abstaining group.
    #[must_use]
    pub fn specificity(&self) -> usize {
        self.scope.map_or(0, str::len)
    }
}

#[derive(Debug, Default)]
struct MatchStatus {
    country: bool,
    range: bool,
}

impl MatchStatus {
    fn any(&self) -> bool {
        self.country || self.range
    }
}

impl RuleGroup {
    /// Create an allow group over `scopes`. At least one scope is required.
    pub fn new<I, S>(scopes: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let scopes = scope::canonicalize(scopes);
        if scopes.is_empty() {
            return Err(Error::config("a rule needs at least one path scope"));
        }
        Ok(Self {
            scopes,
            action: RuleAction::Allow,
            strict: false,
            block_page: None,
            countries: Vec::new(),
            ranges: Vec::new(),
        })
    }

    #[must_use]
    pub fn with_action(mut self, action: RuleAction) -> Self {
        self.action = action;
        self
    }

    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    #[must_use]
    pub fn with_block_page(mut self, page: BlockPage) -> Self {
        self.block_page = Some(page);
        self
    }

    #[must_use]
    pub fn with_countries<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.countries.extend(codes.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn with_ranges(mut self, ranges: impl IntoIterator<Item = IpRange>) -> Self {
        self.ranges.extend(ranges);
        self
    }

    /// Scopes in evaluation order.
    #[must_use]
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    #[must_use]
    pub fn action(&self) -> RuleAction {
        self.action
    }

    #[must_use]
    pub fn is_block(&self) -> bool {
        self.action == RuleAction::Block
    }

    #[must_use]
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    #[must_use]
    pub fn block_page(&self) -> Option<&BlockPage> {
        self.block_page.as_ref()
    }

    #[must_use]
    pub fn countries(&self) -> &[String] {
        &self.countries
    }

    #[must_use]
    pub fn ranges(&self) -> &[IpRange] {
        &self.ranges
    }

    /// Evaluate this group for `request`.
    ///
    /// Only the most specific scope covering the request path is considered.
    /// When none covers it the group abstains with an allow verdict.
    pub fn evaluate<'a>(
        &'a self,
        request: &ClientRequest<'_>,
        countries: Option<&dyn CountryLookup>,
    ) -> Result<Verdict<'a>> {
        let Some(matched) = self
            .scopes
            .iter()
            .find(|candidate| scope::matches(candidate, request.path()))
        else {
            return Ok(Verdict {
                allow: true,
                scope: None,
            });
        };

        let ips = client_ips(request, self.strict)?;

        let mut status = MatchStatus::default();
        if !self.countries.is_empty() {
            let lookup = countries
                .ok_or_else(|| Error::config("country rules require a country database"))?;
            status.country = self.country_matches(lookup, &ips)?;
        }
        if !self.ranges.is_empty() {
            status.range = self
                .ranges
                .iter()
                .any(|range| ips.iter().any(|ip| range.contains(ip)));
        }

        // A match denies for block groups and admits for allow groups.
        let allow = if status.any() {
            !self.is_block()
        } else {
            self.is_block()
        };

        debug!(
            scope = %matched,
            action = %self.action,
            country_match = status.country,
            range_match = status.range,
            allow,
            "rule scope matched"
        );

        Ok(Verdict {
            allow,
            scope: Some(matched.as_str()),
        })
    }

    fn country_matches(&self, lookup: &dyn CountryLookup, ips: &[IpAddr]) -> Result<bool> {
        for ip in ips {
            if let Some(code) = lookup.lookup_country(*ip)?
                && self.countries.iter().any(|c| *c == code)
            {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
