//! Sorting and page slicing for filtered result sets.
//!
//! Pages are 1-indexed. Without both a page and a page size nothing is cut:
//! every match is returned and the envelope reports the defaults.

use serde::Serialize;
use serde_yaml::Value as YamlValue;
use std::cmp::Ordering;
use tracing::debug;

use crate::error::FilterError;
use crate::filter::CompiledPredicate;
use crate::schema::{EntitySchema, Record};

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_PAGE_SIZE: i64 = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub property: String,
    pub descending: bool,
}

impl SortSpec {
    pub fn ascending(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            descending: false,
        }
    }

    pub fn descending(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            descending: true,
        }
    }

    /// Parses `"<field>"`, `"<field> asc"` or `"<field> desc"`. Blank input means no sort.
    pub fn parse(text: &str) -> Result<Option<Self>, FilterError> {
        let parts: Vec<&str> = text.split_whitespace().collect();
        match parts.as_slice() {
            [] => Ok(None),
            [field] => Ok(Some(Self::ascending(*field))),
            [field, direction] if direction.eq_ignore_ascii_case("asc") => Ok(Some(Self::ascending(*field))),
            [field, direction] if direction.eq_ignore_ascii_case("desc") => Ok(Some(Self::descending(*field))),
            _ => Err(FilterError::InvalidSortSpec(text.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl PageRequest {
    pub fn new(page: i64, page_size: i64) -> Self {
        Self {
            page: Some(page),
            page_size: Some(page_size),
        }
    }

    pub fn unpaged() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<(), FilterError> {
        if let Some(page) = self.page.filter(|p| *p <= 0) {
            return Err(FilterError::InvalidPageRequest { field: "page", value: page });
        }
        if let Some(size) = self.page_size.filter(|s| *s <= 0) {
            return Err(FilterError::InvalidPageRequest {
                field: "pageSize",
                value: size,
            });
        }
        Ok(())
    }

    /// `(page, page_size)` when both are present.
    pub fn slice(&self) -> Option<(i64, i64)> {
        self.page.zip(self.page_size)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub page_size: i64,
    pub total_count: usize,
}

impl<T> PaginatedResult<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PaginatedResult<U> {
        PaginatedResult {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            page_size: self.page_size,
            total_count: self.total_count,
        }
    }
}

/// Filters, counts, sorts and slices `candidates`.
pub fn paginate<T, I>(
    candidates: I,
    predicate: &CompiledPredicate,
    schema: &EntitySchema,
    sort: Option<&SortSpec>,
    request: PageRequest,
) -> Result<PaginatedResult<T>, FilterError>
where
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    request.validate()?;

    let sort_key = match sort {
        Some(spec) => Some(resolve_sort(spec, schema)?),
        None => None,
    };

    let needs_record = sort_key.is_some() || !predicate.is_always_true();
    let mut matches: Vec<(T, Option<Record>)> = Vec::new();
    for candidate in candidates {
        if !needs_record {
            matches.push((candidate, None));
            continue;
        }
        let record = Record::from_entity(&candidate)?;
        if predicate.matches(&record)? {
            matches.push((candidate, Some(record)));
        }
    }

    let total_count = matches.len();

    if let Some((property, descending)) = sort_key {
        // sort_by is stable, so ties keep input order in both directions
        matches.sort_by(|(_, a), (_, b)| {
            let ordering = compare_property(a.as_ref(), b.as_ref(), property);
            if descending {
                ordering.reverse()
            } else {
                ordering
            }
        });
    }

    let items: Vec<T> = matches.into_iter().map(|(item, _)| item).collect();

    let result = match request.slice() {
        Some((page, page_size)) => {
            let start = usize::try_from((page - 1).saturating_mul(page_size)).unwrap_or(usize::MAX);
            let len = usize::try_from(page_size).unwrap_or(usize::MAX);
            let items = items.into_iter().skip(start).take(len).collect();
            PaginatedResult {
                items,
                page,
                page_size,
                total_count,
            }
        }
        None => PaginatedResult {
            items,
            page: DEFAULT_PAGE,
            page_size: DEFAULT_PAGE_SIZE,
            total_count,
        },
    };

    debug!(
        total_count,
        returned = result.items.len(),
        page = result.page,
        page_size = result.page_size,
        "Paginated result"
    );
    Ok(result)
}

fn resolve_sort<'a>(spec: &SortSpec, schema: &'a EntitySchema) -> Result<(&'a str, bool), FilterError> {
    schema
        .resolve(&spec.property)
        .map(|property| (property, spec.descending))
        .ok_or_else(|| FilterError::UnresolvableSortField {
            entity: schema.name().to_string(),
            field: spec.property.clone(),
        })
}

fn compare_property(a: Option<&Record>, b: Option<&Record>, property: &str) -> Ordering {
    let a = a.and_then(|r| r.get(property));
    let b = b.and_then(|r| r.get(property));
    compare_values(a, b)
}

fn rank(value: Option<&YamlValue>) -> u8 {
    match value {
        None | Some(YamlValue::Null) => 0,
        Some(YamlValue::Bool(_)) => 1,
        Some(YamlValue::Number(_)) => 2,
        Some(YamlValue::String(_)) => 3,
        Some(_) => 4,
    }
}

fn segments(s: &str) -> impl Iterator<Item = &str> {
    let mut rest = s;
    std::iter::from_fn(move || {
        let digit = rest.chars().next()?.is_ascii_digit();
        let end = rest
            .find(|c: char| c.is_ascii_digit() != digit)
            .unwrap_or(rest.len());
        let (segment, tail) = rest.split_at(end);
        rest = tail;
        Some(segment)
    })
}

/// Text order where digit runs compare by numeric value, so `test_9 < test_10`.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut xs = segments(a);
    let mut ys = segments(b);
    loop {
        let (x, y) = match (xs.next(), ys.next()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => (x, y),
        };
        let is_number = |s: &str| s.starts_with(|c: char| c.is_ascii_digit());
        let ordering = if is_number(x) && is_number(y) {
            let x = x.trim_start_matches('0');
            let y = y.trim_start_matches('0');
            x.len().cmp(&y.len()).then_with(|| x.cmp(y))
        } else {
            x.cmp(y)
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Numeric {
    Int(i128),
    Float(f64),
}

impl Numeric {
    fn of(n: &serde_yaml::Number) -> Self {
        if let Some(i) = n.as_i64() {
            Numeric::Int(i.into())
        } else if let Some(u) = n.as_u64() {
            Numeric::Int(u.into())
        } else {
            Numeric::Float(n.as_f64().unwrap_or(f64::NAN))
        }
    }
}

/// 2^127, the first float past `i128::MAX`.
const I128_LIMIT: f64 = 170_141_183_460_469_231_731_687_303_715_884_105_728.0;

/// Exact numeric order across ints and floats. NaN sorts after every number.
fn compare_numbers(a: Numeric, b: Numeric) -> Ordering {
    match (a, b) {
        (Numeric::Int(x), Numeric::Int(y)) => x.cmp(&y),
        (Numeric::Float(x), Numeric::Float(y)) => match (x.is_nan(), y.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        },
        (Numeric::Int(x), Numeric::Float(y)) => compare_int_float(x, y),
        (Numeric::Float(x), Numeric::Int(y)) => compare_int_float(y, x).reverse(),
    }
}

fn compare_int_float(int: i128, float: f64) -> Ordering {
    if float.is_nan() || float >= I128_LIMIT {
        return Ordering::Less;
    }
    if float < -I128_LIMIT {
        return Ordering::Greater;
    }
    let whole = float.trunc();
    int.cmp(&(whole as i128))
        .then_with(|| whole.partial_cmp(&float).unwrap_or(Ordering::Equal))
}

/// Total order over property values: missing/null, bools, numbers, text, then the rest.
pub fn compare_values(a: Option<&YamlValue>, b: Option<&YamlValue>) -> Ordering {
    match (a, b) {
        (Some(YamlValue::Bool(x)), Some(YamlValue::Bool(y))) => x.cmp(y),
        (Some(YamlValue::Number(x)), Some(YamlValue::Number(y))) => compare_numbers(Numeric::of(x), Numeric::of(y)),
        (Some(YamlValue::String(x)), Some(YamlValue::String(y))) => natural_cmp(x, y),
        (Some(x), Some(y)) if rank(a) == 4 && rank(b) == 4 => {
            let x = serde_yaml::to_string(x).unwrap_or_default();
            let y = serde_yaml::to_string(y).unwrap_or_default();
            x.cmp(&y)
        }
        _ => rank(a).cmp(&rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize)]
    #[serde(rename_all = "PascalCase")]
    struct Row {
        id: i64,
        group: Option<String>,
    }

    fn rows() -> Vec<Row> {
        vec![
            Row { id: 3, group: Some("b".into()) },
            Row { id: 1, group: Some("a".into()) },
            Row { id: 2, group: None },
            Row { id: 4, group: Some("a".into()) },
        ]
    }

    fn schema() -> EntitySchema {
        EntitySchema::new("Row", ["Id", "Group"])
    }

    fn ids(result: &PaginatedResult<Row>) -> Vec<i64> {
        result.items.iter().map(|r| r.id).collect()
    }

    #[test]
    fn test_parse_sort_spec() {
        assert_eq!(SortSpec::parse("Name").unwrap(), Some(SortSpec::ascending("Name")));
        assert_eq!(SortSpec::parse(" Name DESC ").unwrap(), Some(SortSpec::descending("Name")));
        assert_eq!(SortSpec::parse("Name asc").unwrap(), Some(SortSpec::ascending("Name")));
        assert_eq!(SortSpec::parse("   ").unwrap(), None);
        assert!(matches!(SortSpec::parse("Name down"), Err(FilterError::InvalidSortSpec(_))));
        assert!(SortSpec::parse("Name desc extra").is_err());
    }

    #[test]
    fn test_unpaged_returns_everything_with_default_metadata() {
        let result = paginate(rows(), &CompiledPredicate::always(), &schema(), None, PageRequest::unpaged()).unwrap();
        assert_eq!(ids(&result), vec![3, 1, 2, 4]);
        assert_eq!((result.page, result.page_size, result.total_count), (1, 50, 4));
    }

    #[test]
    fn test_only_one_of_page_and_size_is_unpaged() {
        let request = PageRequest { page: Some(2), page_size: None };
        let result = paginate(rows(), &CompiledPredicate::always(), &schema(), None, request).unwrap();
        assert_eq!(result.items.len(), 4);
        assert_eq!(result.page, DEFAULT_PAGE);
    }

    #[test]
    fn test_page_slicing() {
        let sort = SortSpec::ascending("id");
        let result = paginate(rows(), &CompiledPredicate::always(), &schema(), Some(&sort), PageRequest::new(2, 3)).unwrap();
        assert_eq!(ids(&result), vec![4]);
        assert_eq!(result.total_count, 4);

        let beyond = paginate(rows(), &CompiledPredicate::always(), &schema(), Some(&sort), PageRequest::new(9, 3)).unwrap();
        assert!(beyond.items.is_empty());
        assert_eq!(beyond.total_count, 4);
    }

    #[test]
    fn test_stable_sort_both_directions() {
        let asc = SortSpec::ascending("Group");
        let result = paginate(rows(), &CompiledPredicate::always(), &schema(), Some(&asc), PageRequest::unpaged()).unwrap();
        assert_eq!(ids(&result), vec![2, 1, 4, 3]);

        let desc = SortSpec::descending("Group");
        let result = paginate(rows(), &CompiledPredicate::always(), &schema(), Some(&desc), PageRequest::unpaged()).unwrap();
        assert_eq!(ids(&result), vec![3, 1, 4, 2]);
    }

    #[test]
    fn test_unknown_sort_field() {
        let sort = SortSpec::ascending("Colour");
        let err = paginate(rows(), &CompiledPredicate::always(), &schema(), Some(&sort), PageRequest::unpaged()).unwrap_err();
        assert!(matches!(err, FilterError::UnresolvableSortField { ref field, .. } if field == "Colour"));
    }

    #[test]
    fn test_invalid_page_request() {
        for request in [PageRequest::new(0, 10), PageRequest::new(1, 0), PageRequest { page: Some(-1), page_size: None }] {
            let err = paginate(rows(), &CompiledPredicate::always(), &schema(), None, request).unwrap_err();
            assert!(matches!(err, FilterError::InvalidPageRequest { .. }));
        }
    }

    #[test]
    fn test_natural_cmp() {
        assert_eq!(natural_cmp("test_9", "test_10"), Ordering::Less);
        assert_eq!(natural_cmp("test_60", "test_59"), Ordering::Greater);
        assert_eq!(natural_cmp("b", "a1"), Ordering::Greater);
        assert_eq!(natural_cmp("a", "a1"), Ordering::Less);
        assert_eq!(natural_cmp("A", "a"), Ordering::Less);
        assert_eq!(natural_cmp("x01", "x1"), Ordering::Less);
    }

    #[test]
    fn test_compare_values_mixed_numbers() {
        let int: YamlValue = serde_yaml::from_str("2").unwrap();
        let float: YamlValue = serde_yaml::from_str("1.5").unwrap();
        assert_eq!(compare_values(Some(&int), Some(&float)), Ordering::Greater);
        assert_eq!(compare_values(None, Some(&int)), Ordering::Less);
    }

    #[test]
    fn test_compare_values_exact_near_float_precision() {
        let above: YamlValue = serde_yaml::from_str("9007199254740993").unwrap();
        let float: YamlValue = serde_yaml::from_str("9007199254740992.0").unwrap();
        let exact: YamlValue = serde_yaml::from_str("9007199254740992").unwrap();

        assert_eq!(compare_values(Some(&above), Some(&float)), Ordering::Greater);
        assert_eq!(compare_values(Some(&float), Some(&exact)), Ordering::Equal);
        assert_eq!(compare_values(Some(&above), Some(&exact)), Ordering::Greater);

        let half: YamlValue = serde_yaml::from_str("-2.5").unwrap();
        let minus_two: YamlValue = serde_yaml::from_str("-2").unwrap();
        assert_eq!(compare_values(Some(&half), Some(&minus_two)), Ordering::Less);
        assert_eq!(compare_values(Some(&minus_two), Some(&half)), Ordering::Greater);
    }

    #[test]
    fn test_sort_mixed_numbers_is_consistent() {
        let values: Vec<YamlValue> = serde_yaml::from_str("[9007199254740993, 9007199254740992.0, 1, .nan, 9007199254740992, -0.0, 0]").unwrap();
        let mut sorted = values.clone();
        sorted.sort_by(|a, b| compare_values(Some(a), Some(b)));
        for pair in sorted.windows(2) {
            assert_ne!(compare_values(Some(&pair[0]), Some(&pair[1])), Ordering::Greater);
        }
        assert_eq!(sorted.last().and_then(YamlValue::as_f64).map(f64::is_nan), Some(true));
    }
}
