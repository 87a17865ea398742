use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value as YamlValue};
use tracing::debug;

use crate::error::FilterError;
use crate::pagination::PageRequest;

/// Fields every query filter carries.
///
/// `ListId` and `Disabled` bind like any other filter field. Paging and
/// sorting are read by the pipeline and never serialized, so they cannot
/// reach the binder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryFilterBase {
    #[serde(default)]
    pub list_id: Option<Vec<i64>>,
    #[serde(default)]
    pub disabled: Option<bool>,
    #[serde(default, alias = "SortBy", skip_serializing)]
    pub sorting_fields: Option<String>,
    #[serde(default, skip_serializing)]
    pub page: Option<i64>,
    #[serde(default, skip_serializing)]
    pub page_size: Option<i64>,
}

pub trait QueryFilter: Serialize {
    fn base(&self) -> &QueryFilterBase;

    /// Filter fields by name, nulls included.
    fn filter_fields(&self) -> Result<Mapping, FilterError> {
        match serde_yaml::to_value(self)? {
            YamlValue::Mapping(fields) => Ok(fields),
            _ => Err(FilterError::NotAMapping("query filter")),
        }
    }

    fn list_id(&self) -> Option<&[i64]> {
        self.base().list_id.as_deref()
    }

    fn disabled(&self) -> Option<bool> {
        self.base().disabled
    }

    fn sort_by(&self) -> Option<&str> {
        self.base().sorting_fields.as_deref()
    }

    fn page_request(&self) -> PageRequest {
        PageRequest {
            page: self.base().page,
            page_size: self.base().page_size,
        }
    }
}

impl QueryFilter for QueryFilterBase {
    fn base(&self) -> &QueryFilterBase {
        self
    }
}

/// A filter known only at runtime, such as a parsed request body.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DocumentFilter {
    #[serde(skip)]
    base: QueryFilterBase,
    #[serde(flatten)]
    fields: Mapping,
}

/// Paging keys and the base field each one fills. `SortBy` is an alias.
const PAGING_KEYS: [(&str, &str); 4] = [
    ("SortingFields", "SortingFields"),
    ("SortBy", "SortingFields"),
    ("Page", "Page"),
    ("PageSize", "PageSize"),
];

impl DocumentFilter {
    /// Splits paging and sorting keys (matched case-insensitively) out of `document`.
    pub fn from_mapping(document: Mapping) -> Result<Self, FilterError> {
        let mut fields = Mapping::new();
        let mut paging = Mapping::new();

        for (key, value) in document {
            let paging_key = key
                .as_str()
                .and_then(|k| PAGING_KEYS.iter().find(|(spelling, _)| spelling.eq_ignore_ascii_case(k)));
            match paging_key {
                Some(&(spelling, canonical)) => {
                    let target = YamlValue::String(canonical.to_string());
                    if spelling != canonical && paging.contains_key(&target) {
                        debug!(key = spelling, "Ignoring alias, {} already set", canonical);
                        continue;
                    }
                    paging.insert(target, value);
                }
                None => {
                    fields.insert(key, value);
                }
            }
        }

        let base: QueryFilterBase = serde_yaml::from_value(YamlValue::Mapping(paging))?;
        let mut filter = Self { base, fields };
        filter.sync_base();
        Ok(filter)
    }

    /// Mirrors `ListId` and `Disabled` into the base when they have the expected shape.
    fn sync_base(&mut self) {
        self.base.list_id = self
            .field("ListId")
            .and_then(|v| serde_yaml::from_value::<Vec<i64>>(v.clone()).ok());
        self.base.disabled = self.field("Disabled").and_then(YamlValue::as_bool);
    }

    fn field(&self, name: &str) -> Option<&YamlValue> {
        self.fields
            .iter()
            .find(|(k, _)| k.as_str().is_some_and(|k| k.eq_ignore_ascii_case(name)))
            .map(|(_, v)| v)
    }

    pub fn base_mut(&mut self) -> &mut QueryFilterBase {
        &mut self.base
    }

    pub fn set_field(&mut self, name: &str, value: YamlValue) {
        self.fields.insert(YamlValue::String(name.to_string()), value);
        self.sync_base();
    }

    pub fn fields(&self) -> &Mapping {
        &self.fields
    }
}

impl QueryFilter for DocumentFilter {
    fn base(&self) -> &QueryFilterBase {
        &self.base
    }

    fn filter_fields(&self) -> Result<Mapping, FilterError> {
        Ok(self.fields.clone())
    }
}
