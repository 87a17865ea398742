use serde_yaml::Mapping;
use tracing::debug;

use super::contract::QueryFilter;
use super::value::FilterValue;
use crate::config::{Prefix, PrefixTable};
use crate::error::FilterError;
use crate::schema::EntitySchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonKind {
    GreaterOrEqual,
    LessOrEqual,
    Equal,
    RangeOpenLow,
    RangeOpenHigh,
    SubstringMatch,
    Membership,
}

impl ComparisonKind {
    pub fn for_prefix(prefix: Option<Prefix>) -> Self {
        match prefix {
            Some(Prefix::Max) => ComparisonKind::LessOrEqual,
            Some(Prefix::Min) => ComparisonKind::GreaterOrEqual,
            Some(Prefix::From) => ComparisonKind::RangeOpenLow,
            Some(Prefix::To) => ComparisonKind::RangeOpenHigh,
            Some(Prefix::Contains) => ComparisonKind::SubstringMatch,
            Some(Prefix::List) => ComparisonKind::Membership,
            None => ComparisonKind::Equal,
        }
    }
}

/// One filter field bound to an entity property.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterFieldDescriptor {
    pub field: String,
    pub prefix: Option<Prefix>,
    /// Property name as spelled by the entity schema.
    pub property: String,
    pub kind: ComparisonKind,
    pub value: FilterValue,
}

/// Maps filter fields onto entity properties using the prefix convention.
#[derive(Debug, Clone, Default)]
pub struct FieldBinder {
    prefixes: PrefixTable,
}

impl FieldBinder {
    pub fn new(prefixes: PrefixTable) -> Self {
        Self { prefixes }
    }

    pub fn prefixes(&self) -> &PrefixTable {
        &self.prefixes
    }

    pub fn bind_filter<F: QueryFilter>(
        &self,
        filter: &F,
        schema: &EntitySchema,
    ) -> Result<Vec<FilterFieldDescriptor>, FilterError> {
        self.bind(&filter.filter_fields()?, schema)
    }

    /// Binds every non-null field that resolves to a property of `schema`.
    /// Fields that resolve to nothing are skipped.
    pub fn bind(&self, fields: &Mapping, schema: &EntitySchema) -> Result<Vec<FilterFieldDescriptor>, FilterError> {
        let mut descriptors = Vec::new();

        for (key, raw) in fields {
            let Some(field) = key.as_str() else {
                continue;
            };
            if raw.is_null() {
                continue;
            }

            let (prefix, candidate) = match self.prefixes.strip(field) {
                Some((prefix, rest)) => (Some(prefix), rest),
                None => (None, field),
            };

            // Unresolved fields are dropped before their value is looked at.
            let Some(property) = schema.resolve(candidate) else {
                debug!(field, candidate, entity = schema.name(), "Skipping unresolved filter field");
                continue;
            };
            let Some(value) = FilterValue::from_yaml(field, raw)? else {
                continue;
            };

            let kind = ComparisonKind::for_prefix(prefix);
            debug!(field, property, ?kind, "Bound filter field");

            descriptors.push(FilterFieldDescriptor {
                field: field.to_string(),
                prefix,
                property: property.to_string(),
                kind,
                value,
            });
        }

        Ok(descriptors)
    }
}
