//! Compiles prefix-convention query filters (`MaxId`, `ContainsName`,
//! `ListId`, ...) into predicates over arbitrary entities, then sorts and
//! paginates the matches.

pub mod config;
pub mod error;
pub mod filter;
pub mod pagination;
pub mod schema;
pub mod service;

pub use config::{FilterConfig, Prefix, PrefixTable};
pub use error::{ConfigError, FilterError};
pub use filter::{
    compile, ComparisonKind, CompiledPredicate, DocumentFilter, FieldBinder, FilterFieldDescriptor, FilterValue,
    QueryFilter, QueryFilterBase,
};
pub use pagination::{paginate, PageRequest, PaginatedResult, SortSpec, DEFAULT_PAGE, DEFAULT_PAGE_SIZE};
pub use schema::{Entity, EntitySchema, Record};
pub use service::{QueryResponse, QueryService};
