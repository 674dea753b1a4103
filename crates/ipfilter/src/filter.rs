//! The request filter: runs every rule group and keeps the most specific verdict.

use std::{path::Path, sync::Arc};

use tracing::{debug, instrument, warn};

#[cfg(feature = "metrics")]
use metrics::counter;

use crate::{BlockPage, ClientRequest, Result, RuleSet};

/// Final allow/block decision for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision<'a> {
    pub allow: bool,
    /// Scope of the group that decided; `None` if no group covered the path.
    pub scope: Option<&'a str>,
    pub block_page: Option<&'a BlockPage>,
}

impl Default for Decision<'_> {
    fn default() -> Self {
        Self {
            allow: true,
            scope: None,
            block_page: None,
        }
    }
}

impl Decision<'_> {
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        !self.allow
    }

    #[must_use]
    pub fn block_page_path(&self) -> Option<&Path> {
        self.block_page.map(BlockPage::path)
    }
}

/// Evaluates requests against an immutable [`RuleSet`].
///
/// Cheap to clone; clones share the rule set.
#[derive(Debug, Clone)]
pub struct IpFilter {
    rules: Arc<RuleSet>,
}

impl IpFilter {
    #[must_use]
    pub fn new(rules: RuleSet) -> Self {
        Self {
            rules: Arc::new(rules),
        }
    }

    #[must_use]
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Decide whether `request` may proceed.
    ///
    /// Every group is evaluated; the verdict with the longest matched scope
    /// wins and, on equal length, the later group overrides the earlier one.
    /// Any error aborts the whole evaluation.
    #[instrument(skip(self, request), fields(path = %request.path()))]
    pub fn evaluate(&self, request: &ClientRequest<'_>) -> Result<Decision<'_>> {
        let countries = self.rules.countries();
        let mut decision = Decision::default();

        for group in self.rules.groups() {
            let verdict = group.evaluate(request, countries).inspect_err(|e| {
                warn!(error = %e, "ipfilter evaluation failed");
                #[cfg(feature = "metrics")]
                counter!("ipfilter_errors_total", "kind" => e.kind()).increment(1);
            })?;

            if verdict.specificity() >= decision.scope.map_or(0, str::len) {
                decision = Decision {
                    allow: verdict.allow,
                    scope: verdict.scope,
                    block_page: group.block_page(),
                };
            }
        }

        debug!(allow = decision.allow, scope = ?decision.scope, "ipfilter decision");
        #[cfg(feature = "metrics")]
        {
            let result = if decision.allow { "allowed" } else { "blocked" };
            counter!("ipfilter_decisions_total", "result" => result).increment(1);
        }

        Ok(decision)
    }
}
