//! Split a free-form URL into its path, route tokens and query pairs.
//!
//! The input is whatever the user typed, so this never fails: there is no
//! scheme or host validation and no percent-decoding. Query segments are kept
//! verbatim and in order, duplicates included.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static ROUTE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/:([A-Za-z0-9_]+)").expect("route token pattern"));

/// Byte span of a route token name inside `summary_path`, colon excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSpan {
    pub start: usize,
    pub length: usize,
}

impl TokenSpan {
    pub fn slice<'a>(&self, path: &'a str) -> &'a str {
        &path[self.start..self.start + self.length]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryPair {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeconstructedUrl {
    pub summary_path: String,
    pub route_tokens: Vec<TokenSpan>,
    pub query_pairs: Vec<QueryPair>,
}

impl DeconstructedUrl {
    /// Route token names, left to right.
    pub fn route_names(&self) -> impl Iterator<Item = &str> {
        self.route_tokens
            .iter()
            .map(|span| span.slice(&self.summary_path))
    }
}

pub fn deconstruct(url: &str) -> DeconstructedUrl {
    let (summary_path, query) = match url.split_once('?') {
        Some((path, query)) => (path, query),
        None => (url, ""),
    };

    let route_tokens = ROUTE_TOKEN
        .captures_iter(summary_path)
        .filter_map(|caps| caps.get(1))
        .map(|m| TokenSpan {
            start: m.start(),
            length: m.len(),
        })
        .collect();

    let query_pairs = query
        .split('&')
        .filter(|segment| !segment.is_empty())
        .map(|segment| match segment.split_once('=') {
            Some((key, value)) => QueryPair {
                key: key.to_string(),
                value: value.to_string(),
            },
            None => QueryPair {
                key: segment.to_string(),
                value: String::new(),
            },
        })
        .collect();

    DeconstructedUrl {
        summary_path: summary_path.to_string(),
        route_tokens,
        query_pairs,
    }
}
