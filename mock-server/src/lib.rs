//! Echo server used as the network target for composed requests.
//!
//! Every request is answered with a JSON description of what arrived, so a
//! test can check exactly what the console put on the wire. `/status/{code}`
//! does the same but answers with the given status code.

use std::collections::BTreeMap;

use axum::{
    extract::Path,
    http::{HeaderMap, Method, StatusCode, Uri},
    routing::any,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::debug;

/// What the server saw.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Echo {
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub query: Option<String>,
    /// Header names are lowercase. Repeated headers are joined with ", ".
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl Echo {
    fn capture(method: &Method, uri: &Uri, headers: &HeaderMap, body: String) -> Self {
        let mut seen: BTreeMap<String, String> = BTreeMap::new();
        for (name, value) in headers {
            let Ok(value) = value.to_str() else {
                continue;
            };
            seen.entry(name.as_str().to_string())
                .and_modify(|joined| {
                    joined.push_str(", ");
                    joined.push_str(value);
                })
                .or_insert_with(|| value.to_string());
        }
        Self {
            method: method.as_str().to_string(),
            path: uri.path().to_string(),
            query: uri.query().map(str::to_string),
            headers: seen,
            body,
        }
    }
}

pub fn app() -> Router {
    Router::new()
        .route("/status/{code}", any(status))
        .fallback(echo)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: String) -> Json<Echo> {
    debug!(%method, %uri, "echo");
    Json(Echo::capture(&method, &uri, &headers, body))
}

async fn status(
    Path(code): Path<u16>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, Json<Echo>) {
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST);
    debug!(%method, %uri, %status, "status");
    (status, Json(Echo::capture(&method, &uri, &headers, body)))
}
