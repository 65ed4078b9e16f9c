//! Mail side of the pipeline: listing and fetching messages, resolving their
//! labels, and turning headers into sheet-ready values.

pub mod extract;
pub mod fetch;
pub mod labels;
pub mod normalize;

pub use extract::extract;
pub use fetch::{build_query, FetchOptions, MessageFetcher};
pub use labels::{resolve_names, LabelMapping, INTERESTING_LABELS};
pub use normalize::normalize;
