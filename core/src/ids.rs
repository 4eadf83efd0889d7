//! Composite row identifiers for ordered parameter collections.
//!
//! # Design
//! Table rows (headers, query pairs, route tokens, form fields, environment
//! variables) need an identity that is not their `key`, because keys repeat
//! and are edited in place. Each row gets `<requestId><divider><ordinal>`.
//! Ordinals are dense `0..n-1` after every structural mutation; `renumber`
//! throws away the old ids and keys the sequence again in order.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Ordered collection keyed by composite id. Iteration follows insertion order.
pub type Keyed<T> = IndexMap<String, T>;

/// Collection kind tag embedded in a composite id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Divider {
    Header,
    Query,
    Route,
    FormData,
    UrlEncoded,
    EnvironmentVariable,
}

impl Divider {
    pub fn tag(self) -> &'static str {
        match self {
            Divider::Header => "~hdr~",
            Divider::Query => "~qry~",
            Divider::Route => "~rte~",
            Divider::FormData => "~frm~",
            Divider::UrlEncoded => "~enc~",
            Divider::EnvironmentVariable => "~env~",
        }
    }
}

pub fn allocate(request_id: &str, divider: Divider, index: usize) -> String {
    format!("{request_id}{}{index}", divider.tag())
}

/// Key `items` as `0..n-1` in the given order. No input id survives.
pub fn renumber<T, I>(request_id: &str, divider: Divider, items: I) -> Keyed<T>
where
    I: IntoIterator<Item = T>,
{
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| (allocate(request_id, divider, index), item))
        .collect()
}

/// Renumber a collection in place, keeping its order.
pub fn rekey<T>(request_id: &str, divider: Divider, collection: Keyed<T>) -> Keyed<T> {
    renumber(request_id, divider, collection.into_values())
}

/// Id for a request the host has not persisted yet.
pub fn new_draft_id() -> String {
    format!("draft-{}", uuid::Uuid::new_v4())
}
