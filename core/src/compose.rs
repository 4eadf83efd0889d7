//! Turn an editable `Request` into the plain `HttpRequest` a transport sends.
//!
//! # Design
//! Composition is a pure function of the request, the active environment and
//! the authorization the request inherits. It never fails: anything that
//! cannot be resolved (an unknown `{{variable}}`, a route token without an
//! active value) is left in the output literally, so the user sees exactly
//! what went over the wire.
//!
//! Order of operations on the URL: route tokens first, then environment
//! variables, then the query string is appended. Route values may therefore
//! themselves reference environment variables.

use std::borrow::Cow;
use std::sync::LazyLock;

use base64::{engine::general_purpose::STANDARD, Engine};
use regex::{Captures, Regex};
use url::form_urlencoded;

use crate::http::HttpRequest;
use crate::ids::Keyed;
use crate::types::{Authorization, Environment, Parameter, Request, RequestBody};
use crate::url_parts;

static VARIABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([^{}]+)\}\}").expect("variable pattern"));

const CONTENT_TYPE: &str = "Content-Type";
const AUTHORIZATION: &str = "Authorization";
const URL_ENCODED: &str = "application/x-www-form-urlencoded";

/// Compose `request` for sending. `inherited` is used when the request's own
/// authorization is `Inherit`.
pub fn compose(
    request: &Request,
    environment: Option<&Environment>,
    inherited: Option<&Authorization>,
) -> HttpRequest {
    let vars = Substitution { environment };

    let mut url = vars.apply(&substitute_route(request)).into_owned();
    let query = encode_pairs(&vars, &request.query_parameters);
    if !query.is_empty() {
        url.push(if url.contains('?') { '&' } else { '?' });
        url.push_str(&query);
    }

    let mut headers: Vec<(String, String)> = active(&request.headers)
        .filter(|p| !p.key.is_empty())
        .map(|p| (vars.apply(&p.key).into_owned(), vars.apply(&p.value).into_owned()))
        .collect();

    let authorization = match &request.authorization {
        Authorization::Inherit => inherited.unwrap_or(&Authorization::None),
        own => own,
    };
    if let Some(value) = authorization_header(&vars, authorization) {
        if !has_header(&headers, AUTHORIZATION) {
            headers.push((AUTHORIZATION.to_string(), value));
        }
    }

    let body = if request.verb.allows_body() {
        compose_body(&vars, &request.body, &mut headers)
    } else {
        None
    };

    HttpRequest {
        method: request.verb,
        url,
        headers,
        body,
        fetch: request.fetch_params,
    }
}

struct Substitution<'a> {
    environment: Option<&'a Environment>,
}

impl Substitution<'_> {
    fn apply<'t>(&self, text: &'t str) -> Cow<'t, str> {
        let Some(environment) = self.environment else {
            return Cow::Borrowed(text);
        };
        VARIABLE.replace_all(text, |caps: &Captures<'_>| {
            match environment.lookup(caps[1].trim()) {
                Some(value) => value.to_string(),
                None => caps[0].to_string(),
            }
        })
    }
}

fn active(rows: &Keyed<Parameter>) -> impl Iterator<Item = &Parameter> {
    rows.values().filter(|p| p.is_active)
}

fn has_header(headers: &[(String, String)], name: &str) -> bool {
    headers.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
}

/// Replace every `:name` token that has an active route value.
fn substitute_route(request: &Request) -> String {
    let parts = url_parts::deconstruct(&request.url);
    let mut path = parts.summary_path.clone();
    // Right to left so earlier spans stay valid.
    for span in parts.route_tokens.iter().rev() {
        let name = span.slice(&parts.summary_path);
        let value = active(&request.route_parameters).find(|p| p.key == name);
        if let Some(param) = value {
            // The span excludes the leading colon.
            path.replace_range(span.start - 1..span.start + span.length, &param.value);
        }
    }
    path
}

fn encode_pairs(vars: &Substitution<'_>, rows: &Keyed<Parameter>) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for param in active(rows) {
        serializer.append_pair(&vars.apply(&param.key), &vars.apply(&param.value));
    }
    serializer.finish()
}

fn authorization_header(vars: &Substitution<'_>, authorization: &Authorization) -> Option<String> {
    match authorization {
        Authorization::Inherit | Authorization::None => None,
        Authorization::Basic { username, password } => {
            let credentials = format!("{}:{}", vars.apply(username), vars.apply(password));
            Some(format!("Basic {}", STANDARD.encode(credentials)))
        }
        Authorization::Bearer { token } => Some(format!("Bearer {}", vars.apply(token))),
    }
}

fn compose_body(
    vars: &Substitution<'_>,
    body: &RequestBody,
    headers: &mut Vec<(String, String)>,
) -> Option<String> {
    match body {
        RequestBody::None => None,
        RequestBody::UrlEncoded { items } => {
            if !has_header(headers, CONTENT_TYPE) {
                headers.push((CONTENT_TYPE.to_string(), URL_ENCODED.to_string()));
            }
            Some(encode_pairs(vars, items))
        }
        RequestBody::FormData { items } => {
            let boundary = format!("----ConsoleFormBoundary{}", uuid::Uuid::new_v4().simple());
            headers.retain(|(k, _)| !k.eq_ignore_ascii_case(CONTENT_TYPE));
            headers.push((
                CONTENT_TYPE.to_string(),
                format!("multipart/form-data; boundary={boundary}"),
            ));
            Some(multipart(vars, items, &boundary))
        }
        RequestBody::RawText { content_type, text } => {
            if !content_type.is_empty() && !has_header(headers, CONTENT_TYPE) {
                headers.push((CONTENT_TYPE.to_string(), content_type.clone()));
            }
            Some(vars.apply(text).into_owned())
        }
    }
}

fn multipart(vars: &Substitution<'_>, items: &Keyed<Parameter>, boundary: &str) -> String {
    let mut out = String::new();
    for param in active(items) {
        out.push_str(&format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
            vars.apply(&param.key),
            vars.apply(&param.value)
        ));
    }
    out.push_str(&format!("--{boundary}--\r\n"));
    out
}
