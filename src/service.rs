use serde::Serialize;
use tracing::{debug, debug_span};

use crate::config::{FilterConfig, PrefixTable};
use crate::error::FilterError;
use crate::filter::{compile, CompiledPredicate, FieldBinder, QueryFilter};
use crate::pagination::{paginate, PaginatedResult, SortSpec};
use crate::schema::EntitySchema;

/// Bind, compile, filter, sort and paginate in one call.
#[derive(Debug, Clone, Default)]
pub struct QueryService {
    binder: FieldBinder,
}

impl QueryService {
    pub fn new(config: &FilterConfig) -> Self {
        Self::with_prefixes(config.prefixes_or_default())
    }

    pub fn with_prefixes(prefixes: PrefixTable) -> Self {
        Self {
            binder: FieldBinder::new(prefixes),
        }
    }

    pub fn binder(&self) -> &FieldBinder {
        &self.binder
    }

    /// Compiles `filter` without running it, for callers that evaluate elsewhere.
    pub fn compile_filter<F: QueryFilter>(&self, filter: &F, schema: &EntitySchema) -> Result<CompiledPredicate, FilterError> {
        let descriptors = self.binder.bind_filter(filter, schema)?;
        compile(&descriptors, schema)
    }

    pub fn query<F, T, I>(&self, filter: &F, schema: &EntitySchema, candidates: I) -> Result<PaginatedResult<T>, FilterError>
    where
        F: QueryFilter,
        T: Serialize,
        I: IntoIterator<Item = T>,
    {
        let span = debug_span!("query", entity = schema.name());
        let _guard = span.enter();

        let predicate = self.compile_filter(filter, schema)?;
        let sort = match filter.sort_by() {
            Some(text) => SortSpec::parse(text)?,
            None => None,
        };
        debug!(%predicate, ?sort, "Running query");

        paginate(candidates, &predicate, schema, sort.as_ref(), filter.page_request())
    }
}

/// Response envelope handed to the transport layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub page_size: i64,
    pub total_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> QueryResponse<T> {
    pub fn from_result<E: std::fmt::Display>(result: Result<PaginatedResult<T>, E>) -> Self {
        match result {
            Ok(page) => QueryResponse {
                items: page.items,
                page: page.page,
                page_size: page.page_size,
                total_count: page.total_count,
                error: None,
            },
            Err(e) => QueryResponse {
                items: Vec::new(),
                page: 0,
                page_size: 0,
                total_count: 0,
                error: Some(e.to_string()),
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::QueryFilterBase;
    use crate::schema::Entity;
    use serde::Deserialize;

    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "PascalCase")]
    struct Client {
        id: i64,
        name: String,
        disabled: bool,
    }

    impl Entity for Client {
        const NAME: &'static str = "Client";
        const PROPERTIES: &'static [&'static str] = &["Id", "Name", "Disabled"];
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    #[serde(rename_all = "PascalCase")]
    struct ClientFilter {
        #[serde(flatten)]
        base: QueryFilterBase,
        contains_name: Option<String>,
    }

    impl QueryFilter for ClientFilter {
        fn base(&self) -> &QueryFilterBase {
            &self.base
        }
    }

    fn clients() -> Vec<Client> {
        (1..=6)
            .map(|id| Client {
                id,
                name: format!("client_{}", id),
                disabled: id % 3 == 0,
            })
            .collect()
    }

    #[test]
    fn test_query_combines_fields() {
        let filter = ClientFilter {
            base: QueryFilterBase {
                disabled: Some(false),
                sorting_fields: Some("Id desc".into()),
                ..Default::default()
            },
            contains_name: Some("client_".into()),
        };
        let result = QueryService::default().query(&filter, &Client::schema(), clients()).unwrap();
        let ids: Vec<i64> = result.items.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![5, 4, 2, 1]);
        assert_eq!(result.total_count, 4);
    }

    #[test]
    fn test_compile_filter_exposes_fragments() {
        let filter = ClientFilter {
            base: QueryFilterBase {
                list_id: Some(vec![1, 2]),
                ..Default::default()
            },
            contains_name: None,
        };
        let predicate = QueryService::default().compile_filter(&filter, &Client::schema()).unwrap();
        assert_eq!(predicate.fragments().len(), 1);
        assert_eq!(predicate.to_string(), "Id in [1, 2]");
    }

    #[test]
    fn test_response_envelope() {
        let filter = ClientFilter {
            base: QueryFilterBase {
                sorting_fields: Some("Colour".into()),
                ..Default::default()
            },
            contains_name: None,
        };
        let response = QueryResponse::from_result(QueryService::default().query(&filter, &Client::schema(), clients()));
        assert!(response.is_empty());
        assert!(response.error.as_deref().is_some_and(|e| e.contains("Colour")));

        let json = serde_json::to_value(QueryResponse::from_result::<FilterError>(Ok(PaginatedResult {
            items: vec![1],
            page: 1,
            page_size: 50,
            total_count: 1,
        })))
        .unwrap();
        assert_eq!(json["pageSize"], 50);
        assert_eq!(json["totalCount"], 1);
        assert!(json.get("error").is_none());
    }
}
