//! Shared schema documents and `$ref` resolution.

mod document;
mod refs;
mod store;

pub(crate) use document::for_each_subschema;
pub use document::SchemaDocument;
pub use refs::{canonical_id, join_uri, split_ref};
pub use store::{Resolved, SchemaSet, SchemaStore};
