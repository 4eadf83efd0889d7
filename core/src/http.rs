//! HTTP request and response as plain data.
//!
//! # Design
//! The core composes `HttpRequest` values and records `HttpResponse` values
//! but never opens a socket itself. Whoever implements `Transport` (usually
//! the host, via `EXECUTE_REQUEST`) does the actual I/O. Owned `String` /
//! `Vec` fields keep these values trivially serializable over the host pipe
//! and the C ABI.

use serde::{Deserialize, Serialize};

use crate::types::{FetchParams, Verb};

/// A fully composed request: environment and route values substituted, query
/// string attached, authorization folded into the headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpRequest {
    pub method: Verb,
    pub url: String,
    pub headers: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default)]
    pub fetch: FetchParams,
}

impl HttpRequest {
    /// First header named `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Whatever came back from the server, including non-2xx statuses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpResponse {
    pub status: u16,
    #[serde(default)]
    pub status_text: String,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default)]
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
