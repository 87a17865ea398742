use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::Path;

use crate::error::ConfigError;

/// A recognized filter field prefix, listed in matching priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Prefix {
    Max,
    Min,
    From,
    To,
    Contains,
    List,
}

impl Prefix {
    pub const PRIORITY: [Prefix; 6] = [
        Prefix::Max,
        Prefix::Min,
        Prefix::From,
        Prefix::To,
        Prefix::Contains,
        Prefix::List,
    ];

    pub fn default_spelling(self) -> &'static str {
        match self {
            Prefix::Max => "Max",
            Prefix::Min => "Min",
            Prefix::From => "From",
            Prefix::To => "To",
            Prefix::Contains => "Contains",
            Prefix::List => "List",
        }
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.default_spelling())
    }
}

/// Filter prefix options, supplied once at startup.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterConfig {
    /// Namespace that defines the entity models. Informational for hosts that
    /// locate schemas by name.
    #[serde(default)]
    pub model_namespace: Option<String>,
    #[serde(default)]
    pub max: Option<String>,
    #[serde(default)]
    pub min: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub contains: Option<String>,
    #[serde(default)]
    pub list: Option<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        let spelled = |p: Prefix| Some(p.default_spelling().to_string());
        Self {
            model_namespace: None,
            max: spelled(Prefix::Max),
            min: spelled(Prefix::Min),
            from: spelled(Prefix::From),
            to: spelled(Prefix::To),
            contains: spelled(Prefix::Contains),
            list: spelled(Prefix::List),
        }
    }
}

impl FilterConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    fn configured(&self, prefix: Prefix) -> Option<&str> {
        let value = match prefix {
            Prefix::Max => &self.max,
            Prefix::Min => &self.min,
            Prefix::From => &self.from,
            Prefix::To => &self.to,
            Prefix::Contains => &self.contains,
            Prefix::List => &self.list,
        };
        value.as_deref().filter(|s| !s.is_empty())
    }

    /// Builds the prefix table, failing on any prefix that was never configured.
    pub fn prefixes(&self) -> Result<PrefixTable, ConfigError> {
        let mut entries = Vec::with_capacity(Prefix::PRIORITY.len());
        for prefix in Prefix::PRIORITY {
            let spelling = self
                .configured(prefix)
                .ok_or(ConfigError::MissingPrefix(prefix.default_spelling()))?;
            entries.push((prefix, spelling.to_string()));
        }
        Ok(PrefixTable { entries })
    }

    /// Builds the prefix table, using the standard spelling for unconfigured prefixes.
    pub fn prefixes_or_default(&self) -> PrefixTable {
        let entries = Prefix::PRIORITY
            .into_iter()
            .map(|prefix| {
                let spelling = self
                    .configured(prefix)
                    .unwrap_or(prefix.default_spelling());
                (prefix, spelling.to_string())
            })
            .collect();
        PrefixTable { entries }
    }
}

/// Ordered prefix spellings. Read-only once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixTable {
    entries: Vec<(Prefix, String)>,
}

impl Default for PrefixTable {
    fn default() -> Self {
        FilterConfig::default().prefixes_or_default()
    }
}

impl PrefixTable {
    pub fn spelling(&self, prefix: Prefix) -> &str {
        self.entries
            .iter()
            .find(|(p, _)| *p == prefix)
            .map(|(_, s)| s.as_str())
            .unwrap_or(prefix.default_spelling())
    }

    /// Returns the first prefix that starts `field` (case-sensitive) and the remainder.
    pub fn strip<'a>(&self, field: &'a str) -> Option<(Prefix, &'a str)> {
        self.entries
            .iter()
            .find_map(|(prefix, spelling)| field.strip_prefix(spelling.as_str()).map(|rest| (*prefix, rest)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prefixes() {
        let table = FilterConfig::default().prefixes().unwrap();
        assert_eq!(table.strip("MaxId"), Some((Prefix::Max, "Id")));
        assert_eq!(table.strip("ContainsName"), Some((Prefix::Contains, "Name")));
        assert_eq!(table.strip("Name"), None);
    }

    #[test]
    fn test_strip_is_case_sensitive() {
        let table = PrefixTable::default();
        assert_eq!(table.strip("maxId"), None);
    }

    #[test]
    fn test_priority_order() {
        let config = FilterConfig::parse("max: Lim\nmin: Limit\n").unwrap();
        let table = config.prefixes_or_default();
        assert_eq!(table.strip("LimitX"), Some((Prefix::Max, "itX")));
    }

    #[test]
    fn test_custom_spelling() {
        let config = FilterConfig::parse(
            "modelNamespace: Common.Core\nmax: Upto\nmin: Atleast\nfrom: Since\nto: Until\ncontains: Has\nlist: AnyOf\n",
        )
        .unwrap();
        assert_eq!(config.model_namespace.as_deref(), Some("Common.Core"));
        let table = config.prefixes().unwrap();
        assert_eq!(table.strip("SinceDateCreated"), Some((Prefix::From, "DateCreated")));
        assert_eq!(table.spelling(Prefix::List), "AnyOf");
    }

    #[test]
    fn test_missing_prefix() {
        let config = FilterConfig::parse("max: Max\n").unwrap();
        assert!(matches!(config.prefixes(), Err(ConfigError::MissingPrefix("Min"))));

        let table = config.prefixes_or_default();
        assert_eq!(table.strip("MinId"), Some((Prefix::Min, "Id")));
    }
}
