pub mod binder;
pub mod contract;
pub mod predicate;
pub mod value;

pub use binder::{ComparisonKind, FieldBinder, FilterFieldDescriptor};
pub use contract::{DocumentFilter, QueryFilter, QueryFilterBase};
pub use predicate::{compile, CompareOp, CompiledPredicate, FragmentTest, PredicateFragment};
pub use value::{FilterValue, ValueKind};
