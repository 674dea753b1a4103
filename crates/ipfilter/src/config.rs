//! Building a [`RuleSet`], either programmatically or from a TOML file.
//!
//! ```toml
//! database = "GeoLite2-Country.mmdb"
//!
//! [[rule]]
//! scopes     = ["/admin", "/api"]
//! action     = "block"
//! strict     = true
//! block_page = "blocked.html"
//! countries  = ["CN", "RU"]
//! ips        = ["192.168", "10.0.0.1-10", "8.8.8.8"]
//! ```
//!
//! Relative paths resolve against the directory holding the config file.

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use {
    serde::{Deserialize, Serialize},
    tracing::info,
};

use crate::{
    BlockPage, CountryDatabase, CountryLookup, Error, IpRange, Result, RuleAction, RuleGroup,
};

const DATABASE_ALREADY_CONFIGURED: &str = "a country database is already configured";

/// The finished, immutable set of rule groups plus the country database
/// they need.
pub struct RuleSet {
    groups: Vec<RuleGroup>,
    countries: Option<Arc<dyn CountryLookup>>,
}

impl RuleSet {
    /// Rule groups in configuration order.
    #[must_use]
    pub fn groups(&self) -> &[RuleGroup] {
        &self.groups
    }

    #[must_use]
    pub fn countries(&self) -> Option<&dyn CountryLookup> {
        self.countries.as_deref()
    }

    #[must_use]
    pub fn has_country_database(&self) -> bool {
        self.countries.is_some()
    }

    /// Parse a TOML rule file's contents. Relative paths resolve against `base_dir`.
    pub fn from_toml_str(text: &str, base_dir: &Path) -> Result<Self> {
        let file: FilterFile = toml::from_str(text)?;
        file.into_rule_set(base_dir)
    }

    /// Load and validate a TOML rule file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        let rules = Self::from_toml_str(&text, base_dir)?;
        info!(
            path = %path.display(),
            groups = rules.groups.len(),
            country_database = rules.has_country_database(),
            "ipfilter rules loaded"
        );
        Ok(rules)
    }
}

impl fmt::Debug for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleSet")
            .field("groups", &self.groups)
            .field("country_database", &self.has_country_database())
            .finish()
    }
}

/// Accumulates rule groups and the country database, validating the whole
/// set on [`build`](Self::build).
#[derive(Default)]
pub struct RuleSetBuilder {
    groups: Vec<RuleGroup>,
    countries: Option<Arc<dyn CountryLookup>>,
}

impl RuleSetBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the country database. Only one may be configured.
    pub fn database(mut self, countries: Arc<dyn CountryLookup>) -> Result<Self> {
        self.ensure_no_database()?;
        self.countries = Some(countries);
        Ok(self)
    }

    /// Open a MaxMind database file and use it as the country database.
    pub fn open_database(self, path: impl AsRef<Path>) -> Result<Self> {
        self.ensure_no_database()?;
        let db = CountryDatabase::open(path)?;
        self.database(Arc::new(db))
    }

    fn ensure_no_database(&self) -> Result<()> {
        if self.countries.is_some() {
            return Err(Error::config(DATABASE_ALREADY_CONFIGURED));
        }
        Ok(())
    }

    #[must_use]
    pub fn group(mut self, group: RuleGroup) -> Self {
        self.groups.push(group);
        self
    }

    pub fn build(self) -> Result<RuleSet> {
        let has_countries = self.groups.iter().any(|g| !g.countries().is_empty());
        let has_ranges = self.groups.iter().any(|g| !g.ranges().is_empty());

        if has_countries && self.countries.is_none() {
            return Err(Error::config(
                "a country database is required to filter by country",
            ));
        }
        if !has_countries && !has_ranges {
            return Err(Error::config("no IPs or country codes have been provided"));
        }

        Ok(RuleSet {
            groups: self.groups,
            countries: self.countries,
        })
    }
}

/// Top level of a TOML rule file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,
    #[serde(default, rename = "rule")]
    pub rules: Vec<RuleConfig>,
}

/// One `[[rule]]` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub action: RuleAction,
    #[serde(default)]
    pub strict: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_page: Option<PathBuf>,
    #[serde(default)]
    pub countries: Vec<String>,
    #[serde(default)]
    pub ips: Vec<String>,
    /// Alternative place for the country database; still only one allowed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,
}

impl FilterFile {
    pub fn into_rule_set(self, base_dir: &Path) -> Result<RuleSet> {
        // All database keys are checked before any file is opened.
        let mut database = self.database;
        for (index, rule) in self.rules.iter().enumerate() {
            if let Some(db) = &rule.database
                && database.replace(db.clone()).is_some()
            {
                return Err(rule_error(index, Error::config(DATABASE_ALREADY_CONFIGURED)));
            }
        }

        let mut builder = RuleSetBuilder::new();
        if let Some(db) = database {
            builder = builder.open_database(base_dir.join(db))?;
        }

        for (index, rule) in self.rules.into_iter().enumerate() {
            let group = rule
                .into_group(base_dir)
                .map_err(|e| rule_error(index, e))?;
            builder = builder.group(group);
        }

        builder.build()
    }
}

impl RuleConfig {
    pub fn into_group(self, base_dir: &Path) -> Result<RuleGroup> {
        let ranges = self
            .ips
            .iter()
            .map(|ip| IpRange::parse(ip))
            .collect::<Result<Vec<_>>>()?;

        let mut group = RuleGroup::new(self.scopes)?
            .with_action(self.action)
            .with_strict(self.strict)
            .with_countries(self.countries)
            .with_ranges(ranges);

        if let Some(page) = self.block_page {
            group = group.with_block_page(BlockPage::new(base_dir.join(page))?);
        }
        Ok(group)
    }
}

fn rule_error(index: usize, err: Error) -> Error {
    let msg = match err {
        Error::Config(msg) => msg,
        other => other.to_string(),
    };
    Error::config(format!("rule #{}: {msg}", index + 1))
}
