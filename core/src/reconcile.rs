//! Merge a freshly deconstructed URL into the request's route and query tables.
//!
//! Two policies:
//! - route: the previous row wins when its key is still present; names come
//!   from the URL, values and descriptions from the user.
//! - query: the parsed pair wins, but the description migrates by key. An
//!   empty parse returns the previous table as-is, because the URL field the
//!   user edits does not carry the query string.
//!
//! Both look rows up by key only, so a repeated query key collapses to its
//! first occurrence.

use crate::ids::{self, Divider, Keyed};
use crate::types::{Parameter, Request};
use crate::url_parts::{deconstruct, DeconstructedUrl, QueryPair};

pub fn merge_route_parameters(
    request_id: &str,
    url: &DeconstructedUrl,
    previous: &Keyed<Parameter>,
) -> Keyed<Parameter> {
    let merged = url.route_names().map(|name| {
        previous
            .values()
            .find(|p| p.key == name)
            .cloned()
            .unwrap_or_else(|| Parameter::new(name, ""))
    });
    ids::renumber(request_id, Divider::Route, merged)
}

pub fn merge_query_parameters(
    request_id: &str,
    pairs: &[QueryPair],
    previous: Keyed<Parameter>,
) -> Keyed<Parameter> {
    if pairs.is_empty() {
        return previous;
    }

    let mut merged: Vec<Parameter> = Vec::with_capacity(pairs.len());
    for pair in pairs {
        if merged.iter().any(|p| p.key == pair.key) {
            continue;
        }
        let description = previous
            .values()
            .find(|p| p.key == pair.key)
            .map(|p| p.description.clone())
            .unwrap_or_default();
        merged.push(Parameter {
            key: pair.key.clone(),
            value: pair.value.clone(),
            description,
            is_active: true,
        });
    }
    ids::renumber(request_id, Divider::Query, merged)
}

/// Apply a raw URL edit: store the canonical path and merge both tables.
pub fn apply_url(request_id: &str, request: &mut Request, raw_url: &str) {
    let parts = deconstruct(raw_url);
    request.route_parameters =
        merge_route_parameters(request_id, &parts, &request.route_parameters);
    let previous = std::mem::take(&mut request.query_parameters);
    request.query_parameters = merge_query_parameters(request_id, &parts.query_pairs, previous);
    request.url = parts.summary_path;
}
