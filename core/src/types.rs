//! Editable request model.
//!
//! # Design
//! These are the in-memory shapes the store edits. Every ordered table is a
//! `Keyed<Parameter>` so rows carry a composite id separate from their key.
//! The host wire shapes live in `protocol`; conversion between the two goes
//! through `protocol::deserialize_request` / `serialize_request`, which is
//! where rows get re-keyed.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::Keyed;

/// A single editable name/value row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl Parameter {
    /// An active row with no description.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            description: String::new(),
            is_active: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verb {
    #[default]
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
    Trace,
    Connect,
}

impl Verb {
    /// Whether a composed request of this verb may carry a body.
    pub fn allows_body(self) -> bool {
        !matches!(self, Verb::Get | Verb::Head)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Head => "HEAD",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Patch => "PATCH",
            Verb::Delete => "DELETE",
            Verb::Options => "OPTIONS",
            Verb::Trace => "TRACE",
            Verb::Connect => "CONNECT",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request body, discriminated by kind.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RequestBody {
    #[default]
    None,
    FormData {
        items: Keyed<Parameter>,
    },
    UrlEncoded {
        items: Keyed<Parameter>,
    },
    #[serde(rename_all = "camelCase")]
    RawText {
        content_type: String,
        text: String,
    },
}

/// Body kind without its contents; used when switching the body selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BodyKind {
    #[default]
    None,
    FormData,
    UrlEncoded,
    RawText,
}

impl RequestBody {
    pub fn kind(&self) -> BodyKind {
        match self {
            RequestBody::None => BodyKind::None,
            RequestBody::FormData { .. } => BodyKind::FormData,
            RequestBody::UrlEncoded { .. } => BodyKind::UrlEncoded,
            RequestBody::RawText { .. } => BodyKind::RawText,
        }
    }

    pub fn empty(kind: BodyKind) -> Self {
        match kind {
            BodyKind::None => RequestBody::None,
            BodyKind::FormData => RequestBody::FormData {
                items: Keyed::new(),
            },
            BodyKind::UrlEncoded => RequestBody::UrlEncoded {
                items: Keyed::new(),
            },
            BodyKind::RawText => RequestBody::RawText {
                content_type: String::new(),
                text: String::new(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "scheme", rename_all = "lowercase")]
pub enum Authorization {
    /// Use whatever the owning collection or environment supplies.
    #[default]
    Inherit,
    None,
    Basic {
        username: String,
        password: String,
    },
    Bearer {
        token: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CorsMode {
    #[default]
    Cors,
    NoCors,
    SameOrigin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CredentialsMode {
    Omit,
    #[default]
    SameOrigin,
    Include,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheMode {
    Default,
    #[default]
    NoStore,
    Reload,
    NoCache,
    ForceCache,
    OnlyIfCached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RedirectMode {
    #[default]
    Follow,
    Error,
    Manual,
}

/// Fetch options forwarded with the composed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchParams {
    #[serde(default)]
    pub cors_mode: CorsMode,
    #[serde(default)]
    pub credentials: CredentialsMode,
    #[serde(default)]
    pub cache: CacheMode,
    #[serde(default)]
    pub redirect: RedirectMode,
}

/// The editable request. `url` is the canonical path only; the query string
/// lives in `query_parameters` and is re-attached at compose time.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub verb: Verb,
    pub url: String,
    pub name: String,
    pub description: String,
    pub headers: Keyed<Parameter>,
    pub query_parameters: Keyed<Parameter>,
    pub route_parameters: Keyed<Parameter>,
    pub body: RequestBody,
    pub authorization: Authorization,
    pub fetch_params: FetchParams,
}

/// A named set of substitution variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    pub id: String,
    pub name: String,
    pub variables: Keyed<Parameter>,
}

impl Environment {
    /// Value of the first active variable named `name`.
    pub fn lookup(&self, name: &str) -> Option<&str> {
        self.variables
            .values()
            .find(|v| v.is_active && v.key == name)
            .map(|v| v.value.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PacketDirection {
    Send,
    Receive,
}

/// One frame observed on a request's websocket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocketPacket {
    pub direction: PacketDirection,
    pub data: String,
    #[serde(default)]
    pub timestamp: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_params_defaults() {
        let params = FetchParams::default();
        assert_eq!(params.cache, CacheMode::NoStore);
        assert_eq!(params.cors_mode, CorsMode::Cors);
        assert_eq!(params.credentials, CredentialsMode::SameOrigin);
        assert_eq!(params.redirect, RedirectMode::Follow);
    }

    #[test]
    fn fetch_params_wire_names() {
        let json = serde_json::to_value(FetchParams::default()).unwrap();
        assert_eq!(json["cache"], "no-store");
        assert_eq!(json["corsMode"], "cors");
        assert_eq!(json["credentials"], "same-origin");
        assert_eq!(json["redirect"], "follow");
    }

    #[test]
    fn parameter_defaults_active_without_description() {
        let p: Parameter = serde_json::from_str(r#"{"key":"a","value":"1"}"#).unwrap();
        assert!(p.is_active);
        assert!(p.description.is_empty());
    }

    #[test]
    fn verb_body_rules() {
        assert!(!Verb::Get.allows_body());
        assert!(!Verb::Head.allows_body());
        assert!(Verb::Post.allows_body());
        assert_eq!(Verb::Patch.to_string(), "PATCH");
    }

    #[test]
    fn body_kind_matches_variant() {
        for kind in [
            BodyKind::None,
            BodyKind::FormData,
            BodyKind::UrlEncoded,
            BodyKind::RawText,
        ] {
            assert_eq!(RequestBody::empty(kind).kind(), kind);
        }
    }

    #[test]
    fn environment_lookup_skips_inactive() {
        let mut variables = Keyed::new();
        let mut off = Parameter::new("host", "old");
        off.is_active = false;
        variables.insert("e~env~0".to_string(), off);
        variables.insert("e~env~1".to_string(), Parameter::new("host", "new"));
        let env = Environment {
            id: "e".to_string(),
            name: "dev".to_string(),
            variables,
        };
        assert_eq!(env.lookup("host"), Some("new"));
        assert_eq!(env.lookup("missing"), None);
    }
}
