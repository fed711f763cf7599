//! Response declarations: status selectors and per-content-type schemas.

mod map;
mod selector;

pub use map::{
    normalize_content_type, ContentFallthrough, ContentMap, ResponseBody, ResponseEntry,
    ResponseSchemaMap, SchemaSlot, DEFAULT_CONTENT_TYPE, WILDCARD_CONTENT_TYPE,
};
pub use selector::StatusSelector;
