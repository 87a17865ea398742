use serde::Serialize;
use serde_yaml::{Mapping, Value as YamlValue};

use crate::error::FilterError;

/// Explicit entity type descriptor: the property names a filter may bind to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySchema {
    name: String,
    properties: Vec<String>,
}

impl EntitySchema {
    pub fn new<I, S>(name: impl Into<String>, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            properties: properties.into_iter().map(Into::into).collect(),
        }
    }

    /// Builds a schema from the union of keys across records, in first-seen order.
    pub fn from_records<'a>(name: impl Into<String>, records: impl IntoIterator<Item = &'a Record>) -> Self {
        let mut properties: Vec<String> = Vec::new();
        for record in records {
            for key in record.keys() {
                if !properties.iter().any(|p| p == key) {
                    properties.push(key.to_string());
                }
            }
        }
        Self {
            name: name.into(),
            properties,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn properties(&self) -> &[String] {
        &self.properties
    }

    /// Case-insensitive lookup returning the schema's own spelling. First match wins.
    pub fn resolve(&self, candidate: &str) -> Option<&str> {
        let candidate_lower = candidate.to_lowercase();
        self.properties
            .iter()
            .find(|p| p.to_lowercase() == candidate_lower)
            .map(String::as_str)
    }
}

/// Entities with a schema known at compile time.
pub trait Entity: Serialize {
    const NAME: &'static str;
    const PROPERTIES: &'static [&'static str];

    fn schema() -> EntitySchema {
        EntitySchema::new(Self::NAME, Self::PROPERTIES.iter().copied())
    }
}

/// A serialized entity with case-insensitive property access.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record(Mapping);

impl Record {
    pub fn from_entity<T: Serialize + ?Sized>(entity: &T) -> Result<Self, FilterError> {
        match serde_yaml::to_value(entity)? {
            YamlValue::Mapping(mapping) => Ok(Record(mapping)),
            _ => Err(FilterError::NotAMapping("entity")),
        }
    }

    pub fn from_value(value: YamlValue) -> Option<Self> {
        match value {
            YamlValue::Mapping(mapping) => Some(Record(mapping)),
            _ => None,
        }
    }

    pub fn get(&self, property: &str) -> Option<&YamlValue> {
        if let Some(value) = self.0.get(property) {
            return Some(value);
        }
        let property_lower = property.to_lowercase();
        for (key, value) in &self.0 {
            if let Some(key_str) = key.as_str() {
                if key_str.to_lowercase() == property_lower {
                    return Some(value);
                }
            }
        }
        None
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().filter_map(YamlValue::as_str)
    }

    pub fn as_mapping(&self) -> &Mapping {
        &self.0
    }

    pub fn into_value(self) -> YamlValue {
        YamlValue::Mapping(self.0)
    }
}

impl Serialize for Record {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}
