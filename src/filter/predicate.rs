use serde::Serialize;
use serde_yaml::Value as YamlValue;
use std::cmp::Ordering;
use std::fmt;
use tracing::trace;

use super::binder::{ComparisonKind, FilterFieldDescriptor};
use super::value::{coerce, parse_date, FilterValue, ValueKind};
use crate::error::FilterError;
use crate::schema::{EntitySchema, Record};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ge,
    Le,
}

impl CompareOp {
    fn holds(self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ge => ordering != Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ge => ">=",
            CompareOp::Le => "<=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FragmentTest {
    Compare { op: CompareOp, value: FilterValue },
    Contains(String),
    /// Elements share one kind.
    In(Vec<FilterValue>),
}

/// A single-field test. Fragments only ever combine by AND.
#[derive(Debug, Clone, PartialEq)]
pub struct PredicateFragment {
    pub property: String,
    pub test: FragmentTest,
}

impl PredicateFragment {
    pub fn matches(&self, record: &Record) -> Result<bool, FilterError> {
        let property = self.property.as_str();
        let Some(raw) = record.get(property) else {
            return Ok(false);
        };

        match &self.test {
            FragmentTest::Compare { op, value } => {
                if let Some(ordering) = date_ordering(*op, value, raw) {
                    return Ok(op.holds(ordering));
                }
                let Some(actual) = coerce(property, raw, value.kind())? else {
                    return Ok(false);
                };
                Ok(actual.compare(value).is_some_and(|ord| op.holds(ord)))
            }
            FragmentTest::Contains(needle) => match coerce(property, raw, ValueKind::Text)? {
                Some(FilterValue::Text(haystack)) => Ok(haystack.contains(needle.as_str())),
                _ => Ok(false),
            },
            FragmentTest::In(values) => {
                let Some(first) = values.first() else {
                    return Ok(false);
                };
                let Some(actual) = coerce(property, raw, first.kind())? else {
                    return Ok(false);
                };
                Ok(values.iter().any(|v| actual.compare(v) == Some(Ordering::Equal)))
            }
        }
    }
}

impl fmt::Display for PredicateFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.test {
            FragmentTest::Compare { op, value } => write!(f, "{} {} {}", self.property, op.symbol(), quoted(value)),
            FragmentTest::Contains(needle) => write!(f, "{} contains {:?}", self.property, needle),
            FragmentTest::In(values) => {
                write!(f, "{} in [", self.property)?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", quoted(value))?;
                }
                f.write_str("]")
            }
        }
    }
}

/// Ordering comparisons on date text compare as dates, but only when the
/// property holds a date as well. Otherwise the text compares as text.
fn date_ordering(op: CompareOp, value: &FilterValue, raw: &YamlValue) -> Option<Ordering> {
    if op == CompareOp::Eq || !matches!(value, FilterValue::Text(_)) {
        return None;
    }
    let expected = value.as_date()?;
    let actual = raw.as_str().and_then(parse_date)?;
    Some(actual.cmp(&expected))
}

fn quoted(value: &FilterValue) -> String {
    match value {
        FilterValue::Text(s) => format!("{:?}", s),
        other => other.to_string(),
    }
}

/// Conjunction of fragments. Empty means "always true".
///
/// Fragments are plain data so a storage layer can translate them instead of
/// evaluating them here.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompiledPredicate {
    fragments: Vec<PredicateFragment>,
}

impl CompiledPredicate {
    pub fn always() -> Self {
        Self::default()
    }

    pub fn fragments(&self) -> &[PredicateFragment] {
        &self.fragments
    }

    pub fn is_always_true(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn and(mut self, fragment: PredicateFragment) -> Self {
        self.fragments.push(fragment);
        self
    }

    pub fn matches(&self, record: &Record) -> Result<bool, FilterError> {
        for fragment in &self.fragments {
            if !fragment.matches(record)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn matches_entity<T: Serialize + ?Sized>(&self, entity: &T) -> Result<bool, FilterError> {
        if self.is_always_true() {
            return Ok(true);
        }
        self.matches(&Record::from_entity(entity)?)
    }
}

impl fmt::Display for CompiledPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.fragments.is_empty() {
            return f.write_str("TRUE");
        }
        for (i, fragment) in self.fragments.iter().enumerate() {
            if i > 0 {
                f.write_str(" AND ")?;
            }
            write!(f, "{}", fragment)?;
        }
        Ok(())
    }
}

/// Builds one fragment per descriptor and conjoins them in order.
pub fn compile(descriptors: &[FilterFieldDescriptor], schema: &EntitySchema) -> Result<CompiledPredicate, FilterError> {
    let mut predicate = CompiledPredicate::always();

    for descriptor in descriptors {
        let Some(property) = schema.resolve(&descriptor.property) else {
            return Err(FilterError::coercion(
                &descriptor.property,
                descriptor.value.kind(),
                format!("no such property on '{}'", schema.name()),
            ));
        };
        let fragment = PredicateFragment {
            property: property.to_string(),
            test: build_test(descriptor)?,
        };
        trace!(%fragment, "Compiled fragment");
        predicate = predicate.and(fragment);
    }

    Ok(predicate)
}

fn build_test(descriptor: &FilterFieldDescriptor) -> Result<FragmentTest, FilterError> {
    let value = &descriptor.value;
    let op = match descriptor.kind {
        ComparisonKind::GreaterOrEqual | ComparisonKind::RangeOpenLow => CompareOp::Ge,
        ComparisonKind::LessOrEqual | ComparisonKind::RangeOpenHigh => CompareOp::Le,
        ComparisonKind::Equal => CompareOp::Eq,
        ComparisonKind::SubstringMatch => {
            return match value {
                FilterValue::List(_) => Err(scalar_expected(descriptor)),
                other => Ok(FragmentTest::Contains(other.as_text())),
            };
        }
        ComparisonKind::Membership => return membership(descriptor),
    };

    if let FilterValue::List(_) = value {
        return Err(scalar_expected(descriptor));
    }
    Ok(FragmentTest::Compare {
        op,
        value: value.clone(),
    })
}

fn membership(descriptor: &FilterFieldDescriptor) -> Result<FragmentTest, FilterError> {
    let items = match &descriptor.value {
        FilterValue::List(_) => descriptor.value.clone(),
        FilterValue::Text(s) => FilterValue::List(
            s.split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(|part| FilterValue::Text(part.to_string()))
                .collect(),
        ),
        scalar => FilterValue::List(vec![scalar.clone()]),
    };
    let FilterValue::List(items) = items else {
        return Err(scalar_expected(descriptor));
    };

    let has_float = items.iter().any(|v| v.kind() == ValueKind::Float);
    let items: Vec<FilterValue> = items
        .into_iter()
        .map(|v| match v {
            FilterValue::Int(i) if has_float => FilterValue::Float(i as f64),
            other => other,
        })
        .collect();

    if let Some(first) = items.first() {
        if let Some(odd) = items.iter().find(|v| v.kind() != first.kind()) {
            return Err(FilterError::coercion(
                &descriptor.property,
                first.kind(),
                format!("list element {} of kind {}", odd, odd.kind()),
            ));
        }
    }
    Ok(FragmentTest::In(items))
}

fn scalar_expected(descriptor: &FilterFieldDescriptor) -> FilterError {
    FilterError::coercion(
        &descriptor.property,
        ValueKind::List,
        format!("list value for {:?} filter field '{}'", descriptor.kind, descriptor.field),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::binder::FieldBinder;
    use serde_yaml::{from_str, Mapping};

    fn schema() -> EntitySchema {
        EntitySchema::new("Location", ["Id", "Name", "DateCreated", "Disabled", "Rating"])
    }

    fn compile_yaml(yaml: &str) -> Result<CompiledPredicate, FilterError> {
        let fields: Mapping = from_str(yaml).unwrap();
        let descriptors = FieldBinder::default().bind(&fields, &schema())?;
        compile(&descriptors, &schema())
    }

    fn record(yaml: &str) -> Record {
        Record::from_value(from_str(yaml).unwrap()).unwrap()
    }

    #[test]
    fn test_empty_filter_is_always_true() {
        let predicate = compile_yaml("{}").unwrap();
        assert!(predicate.is_always_true());
        assert!(predicate.matches(&record("{Id: 1}")).unwrap());
        assert_eq!(predicate.to_string(), "TRUE");
    }

    #[test]
    fn test_range() {
        let predicate = compile_yaml("MinId: 10\nMaxId: 13").unwrap();
        assert!(predicate.matches(&record("{Id: 10}")).unwrap());
        assert!(predicate.matches(&record("{Id: 13}")).unwrap());
        assert!(!predicate.matches(&record("{Id: 9}")).unwrap());
        assert!(!predicate.matches(&record("{Id: 14}")).unwrap());
        assert_eq!(predicate.to_string(), "Id >= 10 AND Id <= 13");
    }

    #[test]
    fn test_date_range() {
        let predicate = compile_yaml("FromDateCreated: 2024-01-01\nToDateCreated: 2024-01-31").unwrap();
        assert!(predicate.matches(&record("{DateCreated: '2024-01-15T09:30:00'}")).unwrap());
        assert!(!predicate.matches(&record("{DateCreated: '2024-02-01T00:00:00Z'}")).unwrap());
    }

    #[test]
    fn test_date_text_against_plain_text_compares_as_text() {
        let predicate = compile_yaml("MinName: '2024-01-01'").unwrap();
        assert!(predicate.matches(&record("{Name: zeta}")).unwrap());
        assert!(!predicate.matches(&record("{Name: '1999 archive'}")).unwrap());
        assert!(predicate.matches(&record("{Name: '2024-03-01'}")).unwrap());
    }

    #[test]
    fn test_date_range_compares_dates_not_text() {
        // as text a space sorts before 'T', so both records would pass
        let predicate = compile_yaml("ToDateCreated: '2024-01-15T09:45:00Z'").unwrap();
        assert!(predicate.matches(&record("{DateCreated: '2024-01-15 09:30:00'}")).unwrap());
        assert!(!predicate.matches(&record("{DateCreated: '2024-01-15 10:00:00'}")).unwrap());
    }

    #[test]
    fn test_equal_coerces_property_to_filter_kind() {
        let predicate = compile_yaml("Rating: 4").unwrap();
        assert!(predicate.matches(&record("{Rating: 4.0}")).unwrap());
        assert!(!predicate.matches(&record("{Rating: 5}")).unwrap());
        assert!(predicate.matches(&record("{Rating: 4.5}")).is_err());
    }

    #[test]
    fn test_equal_coercion_failure_is_an_error() {
        let predicate = compile_yaml("Id: 3").unwrap();
        let err = predicate.matches(&record("{Id: three}")).unwrap_err();
        assert!(matches!(err, FilterError::TypeCoercionFailure { ref property, .. } if property == "Id"));
    }

    #[test]
    fn test_contains_is_case_sensitive() {
        let predicate = compile_yaml("ContainsName: est_1").unwrap();
        assert!(predicate.matches(&record("{Name: test_12}")).unwrap());
        assert!(!predicate.matches(&record("{Name: TEST_12}")).unwrap());
    }

    #[test]
    fn test_contains_keeps_raw_date_text() {
        let predicate = compile_yaml("ContainsName: 2024-01").unwrap();
        assert!(predicate.matches(&record("{Name: report 2024-01-05}")).unwrap());
    }

    #[test]
    fn test_membership() {
        let predicate = compile_yaml("ListId: [4, 2]").unwrap();
        assert!(predicate.matches(&record("{Id: 2}")).unwrap());
        assert!(!predicate.matches(&record("{Id: 3}")).unwrap());

        let empty = compile_yaml("ListId: []").unwrap();
        assert!(!empty.matches(&record("{Id: 2}")).unwrap());
    }

    #[test]
    fn test_membership_from_comma_text() {
        let predicate = compile_yaml("ListName: 'north, south'").unwrap();
        assert!(predicate.matches(&record("{Name: south}")).unwrap());
        assert!(!predicate.matches(&record("{Name: east}")).unwrap());
    }

    #[test]
    fn test_membership_rejects_mixed_kinds() {
        let err = compile_yaml("ListId: [1, two]").unwrap_err();
        assert!(matches!(err, FilterError::TypeCoercionFailure { .. }));
    }

    #[test]
    fn test_list_value_for_scalar_kind() {
        assert!(compile_yaml("MaxId: [1, 2]").is_err());
        assert!(compile_yaml("ContainsName: [a]").is_err());
    }

    #[test]
    fn test_null_property_never_matches() {
        let predicate = compile_yaml("MinId: 1\nContainsName: a").unwrap();
        assert!(!predicate.matches(&record("{Id: ~, Name: abc}")).unwrap());
        assert!(!predicate.matches(&record("{Name: abc}")).unwrap());
    }
}
