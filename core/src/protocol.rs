//! Frames exchanged with the host, and the wire shape of a saved request.
//!
//! # Design
//! Each frame family is a closed enum tagged by `type`, so adding a frame
//! kind forces every dispatch site to handle it:
//! - `HostCall`: core -> host, correlated by an `id` the channel assigns.
//! - `Notification`: core -> host, fire-and-forget, no `id`.
//! - `ResponseFrame`: host -> core answer to a `HostCall`.
//! - `HostEvent`: host -> core, unsolicited.
//!
//! The host stores requests with plain lists instead of keyed tables. Rows
//! are re-keyed against the target request id on the way in, and optional
//! sub-objects the host left out are defaulted.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ChannelError;
use crate::http::HttpRequest;
use crate::ids::{self, Divider, Keyed};
use crate::reconcile;
use crate::store::EnvironmentAuth;
use crate::types::{
    Authorization, BodyKind, Environment, FetchParams, Parameter, Request, RequestBody,
    SocketPacket, Verb,
};

// ---------------------------------------------------------------------------
// Core -> host
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HostCall {
    #[serde(rename_all = "camelCase")]
    ExecuteRequest {
        request_id: String,
        request: HttpRequest,
    },
    #[serde(rename_all = "camelCase")]
    SaveRequest {
        request_id: String,
        request: SerializedRequest,
    },
    #[serde(rename_all = "camelCase")]
    SaveCollectionAuthorizationParameters {
        collection_id: String,
        authorization: Authorization,
    },
    #[serde(rename_all = "camelCase")]
    SaveEnvironmentVariables {
        environment_id: String,
        variables: Vec<Parameter>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Notification {
    /// Handshake; always the first frame the core sends.
    ConsoleReady,
    OpenWebLink {
        url: String,
    },
    #[serde(rename_all = "camelCase")]
    UpdateDirtyFlag {
        request_id: String,
        is_dirty: bool,
    },
    OpenNewUnattachedRequest,
    Log {
        level: LogLevel,
        message: String,
    },
    #[serde(rename_all = "camelCase")]
    DisconnectWebsocket {
        request_id: String,
    },
    #[serde(rename_all = "camelCase")]
    WebsocketSendMessage {
        request_id: String,
        message: String,
    },
}

/// Serialize a call and stamp it with its correlation id.
pub fn encode_call(id: u64, call: &HostCall) -> Result<Value, ChannelError> {
    let mut frame = serde_json::to_value(call).map_err(ChannelError::Encode)?;
    if let Value::Object(fields) = &mut frame {
        fields.insert("id".to_string(), Value::from(id));
    }
    Ok(frame)
}

pub fn encode_notification(notification: &Notification) -> Result<Value, ChannelError> {
    serde_json::to_value(notification).map_err(ChannelError::Encode)
}

// ---------------------------------------------------------------------------
// Host -> core
// ---------------------------------------------------------------------------

/// Answer to a `HostCall`. Exactly one of `result` / `error` is expected;
/// a frame carrying `error` is treated as a failure regardless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFrame {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResponseFrame {
    pub fn into_result(self) -> Result<Value, ChannelError> {
        match self.error {
            Some(error) => Err(ChannelError::Host(error)),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HostEvent {
    #[serde(rename_all = "camelCase")]
    InitHost {
        #[serde(default)]
        theme: Option<String>,
        #[serde(default)]
        css: Option<String>,
        /// The host is about to move the conversation to a dedicated port.
        #[serde(default)]
        has_dedicated_port: bool,
        #[serde(default)]
        state: Option<Value>,
    },
    #[serde(rename_all = "camelCase")]
    InitNewEmptyRequest {
        #[serde(default)]
        request_id: Option<String>,
    },
    CssStyleUpdated {
        #[serde(default)]
        theme: Option<String>,
        css: String,
    },
    #[serde(rename_all = "camelCase")]
    LoadRequest {
        request_id: String,
        request: SerializedRequest,
        #[serde(default)]
        environment_auth: Option<EnvironmentAuth>,
    },
    SetPreferences {
        preferences: Preferences,
    },
    #[serde(rename_all = "camelCase")]
    EditCollectionAuthorizationParameters {
        collection_id: String,
        authorization: Authorization,
    },
    UpdateCollectionsTree {
        collections: Vec<CollectionNode>,
    },
    #[serde(rename_all = "camelCase")]
    EditEnvironmentVariables {
        environment_id: String,
        #[serde(default)]
        name: String,
        #[serde(default)]
        variables: Vec<Parameter>,
    },
    UpdateEnvironment {
        environment: SerializedEnvironment,
    },
    ClearEnvironment,
    #[serde(rename_all = "camelCase")]
    CloseView {
        request_id: String,
    },
    #[serde(rename_all = "camelCase")]
    ShowOpenRequest {
        request_id: String,
    },
    #[serde(rename_all = "camelCase")]
    WebsocketConnected {
        request_id: String,
    },
    #[serde(rename_all = "camelCase")]
    WebsocketDisconnected {
        request_id: String,
    },
    #[serde(rename_all = "camelCase")]
    WebsocketPacket {
        request_id: String,
        packet: SocketPacket,
    },
}

/// Host preferences, kept as an open map so new keys need no core change.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(flatten)]
    pub values: serde_json::Map<String, Value>,
}

impl Preferences {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }
}

/// One node of the host's collection tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionNode {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub children: Vec<CollectionNode>,
    #[serde(default)]
    pub requests: Vec<CollectionEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub verb: Verb,
}

/// The `result` payload of `SAVE_REQUEST`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRequestResult {
    pub request_id: String,
    pub request: SerializedRequest,
}

// ---------------------------------------------------------------------------
// Request wire shape
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedRequest {
    #[serde(default)]
    pub verb: Verb,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub headers: Vec<Parameter>,
    #[serde(default)]
    pub query_parameters: Vec<Parameter>,
    #[serde(default)]
    pub route_parameters: Vec<Parameter>,
    #[serde(default)]
    pub body: SerializedBody,
    #[serde(default)]
    pub authorization: Authorization,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch_params: Option<FetchParams>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedBody {
    #[serde(default)]
    pub body_type: BodyKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_data: Option<Vec<Parameter>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_encoded: Option<Vec<Parameter>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<RawBody>,
}


#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBody {
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedEnvironment {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub variables: Vec<Parameter>,
}

impl SerializedEnvironment {
    pub fn into_environment(self) -> Environment {
        Environment {
            variables: ids::renumber(&self.id, Divider::EnvironmentVariable, self.variables),
            id: self.id,
            name: self.name,
        }
    }
}

/// Convert a host-saved request into the editable model for `request_id`.
///
/// The URL goes through the same reconciliation as a user edit, with the
/// host's route and query lists as the previous tables, so a URL saved with
/// its query string still yields a canonical path.
pub fn deserialize_request(request_id: &str, serialized: SerializedRequest) -> Request {
    let SerializedRequest {
        verb,
        url,
        name,
        description,
        headers,
        query_parameters,
        route_parameters,
        body,
        authorization,
        fetch_params,
    } = serialized;

    let body = match body.body_type {
        BodyKind::None => RequestBody::None,
        BodyKind::FormData => RequestBody::FormData {
            items: ids::renumber(
                request_id,
                Divider::FormData,
                body.form_data.unwrap_or_default(),
            ),
        },
        BodyKind::UrlEncoded => RequestBody::UrlEncoded {
            items: ids::renumber(
                request_id,
                Divider::UrlEncoded,
                body.url_encoded.unwrap_or_default(),
            ),
        },
        BodyKind::RawText => {
            let raw = body.raw.unwrap_or_default();
            RequestBody::RawText {
                content_type: raw.content_type.unwrap_or_default(),
                text: raw.text.unwrap_or_default(),
            }
        }
    };

    let mut request = Request {
        verb,
        url: String::new(),
        name,
        description,
        headers: ids::renumber(request_id, Divider::Header, headers),
        query_parameters: ids::renumber(request_id, Divider::Query, query_parameters),
        route_parameters: ids::renumber(request_id, Divider::Route, route_parameters),
        body,
        authorization,
        fetch_params: fetch_params.unwrap_or_default(),
    };
    reconcile::apply_url(request_id, &mut request, &url);
    request
}

pub fn serialize_request(request: &Request) -> SerializedRequest {
    let rows = |keyed: &Keyed<Parameter>| keyed.values().cloned().collect::<Vec<_>>();

    let body = match &request.body {
        RequestBody::None => SerializedBody::default(),
        RequestBody::FormData { items } => SerializedBody {
            body_type: BodyKind::FormData,
            form_data: Some(rows(items)),
            ..SerializedBody::default()
        },
        RequestBody::UrlEncoded { items } => SerializedBody {
            body_type: BodyKind::UrlEncoded,
            url_encoded: Some(rows(items)),
            ..SerializedBody::default()
        },
        RequestBody::RawText { content_type, text } => SerializedBody {
            body_type: BodyKind::RawText,
            raw: Some(RawBody {
                content_type: Some(content_type.clone()),
                text: Some(text.clone()),
            }),
            ..SerializedBody::default()
        },
    };

    SerializedRequest {
        verb: request.verb,
        url: request.url.clone(),
        name: request.name.clone(),
        description: request.description.clone(),
        headers: rows(&request.headers),
        query_parameters: rows(&request.query_parameters),
        route_parameters: rows(&request.route_parameters),
        body,
        authorization: request.authorization.clone(),
        fetch_params: Some(request.fetch_params),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::types::{CacheMode, CredentialsMode};

    #[test]
    fn encode_call_adds_id_and_tag() {
        let call = HostCall::SaveEnvironmentVariables {
            environment_id: "env".to_string(),
            variables: vec![Parameter::new("a", "1")],
        };
        let frame = encode_call(7, &call).unwrap();
        assert_eq!(frame["type"], "SAVE_ENVIRONMENT_VARIABLES");
        assert_eq!(frame["id"], 7);
        assert_eq!(frame["environmentId"], "env");
        assert_eq!(frame["variables"][0]["isActive"], true);
    }

    #[test]
    fn notifications_carry_no_id() {
        let frame = encode_notification(&Notification::UpdateDirtyFlag {
            request_id: "r".to_string(),
            is_dirty: true,
        })
        .unwrap();
        assert_eq!(
            frame,
            json!({"type": "UPDATE_DIRTY_FLAG", "requestId": "r", "isDirty": true})
        );
        let ready = encode_notification(&Notification::ConsoleReady).unwrap();
        assert_eq!(ready, json!({"type": "CONSOLE_READY"}));
    }

    #[test]
    fn response_frame_error_wins() {
        let frame: ResponseFrame =
            serde_json::from_value(json!({"id": 3, "error": "disk full"})).unwrap();
        assert!(matches!(frame.into_result(), Err(ChannelError::Host(m)) if m == "disk full"));

        let frame: ResponseFrame = serde_json::from_value(json!({"id": 4})).unwrap();
        assert_eq!(frame.into_result().unwrap(), Value::Null);
    }

    #[test]
    fn events_decode_by_type() {
        let event: HostEvent = serde_json::from_value(json!({
            "type": "WEBSOCKET_PACKET",
            "requestId": "r",
            "packet": {"direction": "receive", "data": "hello"}
        }))
        .unwrap();
        assert!(matches!(event, HostEvent::WebsocketPacket { ref request_id, .. } if request_id == "r"));

        let event: HostEvent = serde_json::from_value(json!({"type": "CLEAR_ENVIRONMENT"})).unwrap();
        assert_eq!(event, HostEvent::ClearEnvironment);
    }

    #[test]
    fn unknown_event_type_fails_to_decode() {
        let result: Result<HostEvent, _> =
            serde_json::from_value(json!({"type": "SOMETHING_NEW", "x": 1}));
        assert!(result.is_err());
    }

    #[test]
    fn preferences_keep_unknown_keys() {
        let event: HostEvent = serde_json::from_value(json!({
            "type": "SET_PREFERENCES",
            "preferences": {"wrapLines": true, "fontSize": 13}
        }))
        .unwrap();
        let HostEvent::SetPreferences { preferences } = event else {
            panic!("wrong event");
        };
        assert_eq!(preferences.get("fontSize"), Some(&json!(13)));
    }

    #[test]
    fn deserialize_defaults_missing_sub_objects() {
        let serialized: SerializedRequest = serde_json::from_value(json!({
            "verb": "POST",
            "url": "https://api.x/items",
            "body": {"bodyType": "raw-text"}
        }))
        .unwrap();
        let request = deserialize_request("r", serialized);
        assert_eq!(
            request.body,
            RequestBody::RawText {
                content_type: String::new(),
                text: String::new()
            }
        );
        assert_eq!(request.fetch_params.cache, CacheMode::NoStore);
        assert_eq!(request.fetch_params.credentials, CredentialsMode::SameOrigin);
    }

    #[test]
    fn deserialize_rekeys_rows_for_target_request() {
        let serialized: SerializedRequest = serde_json::from_value(json!({
            "url": "/x",
            "headers": [{"key": "A", "value": "1"}, {"key": "B", "value": "2"}],
            "body": {"bodyType": "form-data", "formData": [{"key": "f", "value": "v"}]}
        }))
        .unwrap();
        let request = deserialize_request("saved", serialized);
        let keys: Vec<_> = request.headers.keys().cloned().collect();
        assert_eq!(keys, vec!["saved~hdr~0", "saved~hdr~1"]);
        let RequestBody::FormData { items } = &request.body else {
            panic!("expected form-data body");
        };
        assert!(items.contains_key("saved~frm~0"));
    }

    #[test]
    fn deserialize_reconciles_url_with_saved_rows() {
        let serialized: SerializedRequest = serde_json::from_value(json!({
            "url": "https://api.x/:id?limit=5",
            "routeParameters": [{"key": "id", "value": "7", "description": "pk"}],
            "queryParameters": [{"key": "limit", "value": "1", "description": "size", "isActive": false}]
        }))
        .unwrap();
        let request = deserialize_request("r", serialized);
        assert_eq!(request.url, "https://api.x/:id");
        assert_eq!(request.route_parameters["r~rte~0"].value, "7");
        let limit = &request.query_parameters["r~qry~0"];
        assert_eq!(limit.value, "5");
        assert_eq!(limit.description, "size");
        assert!(limit.is_active);
    }

    #[test]
    fn body_without_type_loads_as_none() {
        let event: HostEvent = serde_json::from_value(json!({
            "type": "LOAD_REQUEST",
            "requestId": "r",
            "request": {"url": "/a", "body": {"raw": {"text": "ignored"}}}
        }))
        .unwrap();
        let HostEvent::LoadRequest { request, .. } = event else {
            panic!("expected LOAD_REQUEST");
        };
        assert_eq!(request.body.body_type, BodyKind::None);
        assert_eq!(deserialize_request("r", request).body, RequestBody::None);
    }

    #[test]
    fn serialize_then_deserialize_preserves_request() {
        let serialized: SerializedRequest = serde_json::from_value(json!({
            "verb": "PUT",
            "url": "/items/:id",
            "name": "update",
            "routeParameters": [{"key": "id", "value": "3"}],
            "queryParameters": [{"key": "dry", "value": "1"}],
            "body": {"bodyType": "url-encoded", "urlEncoded": [{"key": "a", "value": "b"}]},
            "authorization": {"scheme": "bearer", "token": "t"}
        }))
        .unwrap();
        let request = deserialize_request("r", serialized);
        let again = deserialize_request("r", serialize_request(&request));
        assert_eq!(again, request);
    }

    #[test]
    fn environment_variables_are_scoped_to_environment() {
        let env = SerializedEnvironment {
            id: "env1".to_string(),
            name: "dev".to_string(),
            variables: vec![Parameter::new("host", "h")],
        }
        .into_environment();
        assert!(env.variables.contains_key("env1~env~0"));
    }
}
