//! Query compilation pipeline: expressions, sorts and facets into the
//! backend's native query document, and raw aggregations back into facets.

pub mod compiler;
pub mod facet_convert;
pub mod facets;
pub mod sort;

pub use compiler::{
    CollapseOption, FieldResolverMode, InnerHitsOption, QueryCompiler, QueryDocument, QueryRequest,
};
pub use facet_convert::{
    FacetConverter, FacetConverterChain, FacetResolver, RangesFacetConverter, TermsFacetConverter,
};
pub use facets::AggregationSpec;
pub use sort::{ArrayMode, ScriptSortType, SortDirection, SortOption};
