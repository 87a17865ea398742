use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_yaml::Value as YamlValue;
use std::cmp::Ordering;
use std::fmt;

use crate::error::FilterError;

const DATE_TIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// A non-null filter value with its declared kind.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDateTime),
    List(Vec<FilterValue>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Bool,
    Int,
    Float,
    Text,
    Date,
    List,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Bool => "bool",
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::Text => "text",
            ValueKind::Date => "date",
            ValueKind::List => "list",
        };
        f.write_str(name)
    }
}

impl FilterValue {
    /// Converts a filter field value. `Ok(None)` means null (not filtered on).
    pub fn from_yaml(field: &str, value: &YamlValue) -> Result<Option<Self>, FilterError> {
        let converted = match value {
            YamlValue::Null => return Ok(None),
            YamlValue::Bool(b) => FilterValue::Bool(*b),
            YamlValue::Number(n) => match n.as_i64() {
                Some(i) => FilterValue::Int(i),
                None => FilterValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            YamlValue::String(s) => FilterValue::Text(s.clone()),
            YamlValue::Sequence(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    match FilterValue::from_yaml(field, item)? {
                        Some(FilterValue::List(_)) => {
                            return Err(FilterError::coercion(field, ValueKind::List, "nested list"));
                        }
                        Some(v) => values.push(v),
                        None => {}
                    }
                }
                FilterValue::List(values)
            }
            YamlValue::Tagged(tagged) => return FilterValue::from_yaml(field, &tagged.value),
            YamlValue::Mapping(_) => {
                return Err(FilterError::coercion(field, ValueKind::Text, "mapping"));
            }
        };
        Ok(Some(converted))
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            FilterValue::Bool(_) => ValueKind::Bool,
            FilterValue::Int(_) => ValueKind::Int,
            FilterValue::Float(_) => ValueKind::Float,
            FilterValue::Text(_) => ValueKind::Text,
            FilterValue::Date(_) => ValueKind::Date,
            FilterValue::List(_) => ValueKind::List,
        }
    }

    /// The value as a date, when it is one or is text written as one.
    pub fn as_date(&self) -> Option<NaiveDateTime> {
        match self {
            FilterValue::Date(date) => Some(*date),
            FilterValue::Text(s) => parse_date(s),
            _ => None,
        }
    }

    /// Text used for substring matching.
    pub fn as_text(&self) -> String {
        self.to_string()
    }

    /// Ordering between values of the same kind; `None` across kinds or for NaN.
    pub fn compare(&self, other: &FilterValue) -> Option<Ordering> {
        match (self, other) {
            (FilterValue::Bool(a), FilterValue::Bool(b)) => Some(a.cmp(b)),
            (FilterValue::Int(a), FilterValue::Int(b)) => Some(a.cmp(b)),
            (FilterValue::Float(a), FilterValue::Float(b)) => a.partial_cmp(b),
            (FilterValue::Text(a), FilterValue::Text(b)) => Some(a.cmp(b)),
            (FilterValue::Date(a), FilterValue::Date(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::Bool(b) => write!(f, "{}", b),
            FilterValue::Int(i) => write!(f, "{}", i),
            FilterValue::Float(x) => write!(f, "{}", x),
            FilterValue::Text(s) => f.write_str(s),
            FilterValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%dT%H:%M:%S")),
            FilterValue::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
        }
    }
}

/// Converts an entity property value to `kind`. `Ok(None)` means the property is null.
pub fn coerce(property: &str, value: &YamlValue, kind: ValueKind) -> Result<Option<FilterValue>, FilterError> {
    let fail = || FilterError::coercion(property, kind, describe(value));

    let coerced = match (kind, value) {
        (_, YamlValue::Null) => return Ok(None),
        (_, YamlValue::Tagged(tagged)) => return coerce(property, &tagged.value, kind),

        (ValueKind::Int, YamlValue::Number(n)) => match n.as_i64() {
            Some(i) => FilterValue::Int(i),
            None => {
                let x = n.as_f64().ok_or_else(fail)?;
                if x.fract() != 0.0 || x < i64::MIN as f64 || x > i64::MAX as f64 {
                    return Err(fail());
                }
                FilterValue::Int(x as i64)
            }
        },
        (ValueKind::Int, YamlValue::String(s)) => FilterValue::Int(s.trim().parse().map_err(|_| fail())?),

        (ValueKind::Float, YamlValue::Number(n)) => FilterValue::Float(n.as_f64().ok_or_else(fail)?),
        (ValueKind::Float, YamlValue::String(s)) => FilterValue::Float(s.trim().parse().map_err(|_| fail())?),

        (ValueKind::Bool, YamlValue::Bool(b)) => FilterValue::Bool(*b),
        (ValueKind::Bool, YamlValue::String(s)) => match s.to_lowercase().as_str() {
            "true" => FilterValue::Bool(true),
            "false" => FilterValue::Bool(false),
            _ => return Err(fail()),
        },

        (ValueKind::Text, YamlValue::String(s)) => FilterValue::Text(s.clone()),
        (ValueKind::Text, YamlValue::Number(n)) => FilterValue::Text(n.to_string()),
        (ValueKind::Text, YamlValue::Bool(b)) => FilterValue::Text(b.to_string()),

        (ValueKind::Date, YamlValue::String(s)) => FilterValue::Date(parse_date(s).ok_or_else(fail)?),

        _ => return Err(fail()),
    };
    Ok(Some(coerced))
}

pub fn parse_date(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for format in DATE_TIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn describe(value: &YamlValue) -> String {
    match value {
        YamlValue::Null => "null".to_string(),
        YamlValue::Bool(b) => format!("bool {}", b),
        YamlValue::Number(n) => format!("number {}", n),
        YamlValue::String(s) => format!("text {:?}", s),
        YamlValue::Sequence(_) => "sequence".to_string(),
        YamlValue::Mapping(_) => "mapping".to_string(),
        YamlValue::Tagged(t) => format!("tagged {}", t.tag),
    }
}
