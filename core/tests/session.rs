//! Console sessions against a simulated host over in-process pipes.
//!
//! # Design
//! The simulated host is a task that reads every frame the console sends,
//! forwards it to the test for inspection, and answers correlated calls:
//! `EXECUTE_REQUEST` echoes the URL back as the body, `SAVE_REQUEST` assigns
//! `saved-1` to drafts. Host-pushed events are posted by the test itself.

use std::sync::Arc;
use std::time::Duration;

use console_core::http::HttpRequest;
use console_core::protocol::HostEvent;
use console_core::store::{
    BasicsEdit, Edit, Modal, ModalEdit, ParameterEdit, ResponseStatus, RouteEdit,
};
use console_core::types::Verb;
use console_core::{pipe, Console, ConsoleConfig, MessagePort, Parameter, PipePort};
use serde_json::{json, Value};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;

async fn simulated_host(
    mut outbound: UnboundedReceiver<Value>,
    reply: PipePort,
    seen: UnboundedSender<Value>,
) {
    while let Some(frame) = outbound.recv().await {
        let _ = seen.send(frame.clone());
        let Some(id) = frame.get("id").cloned() else {
            continue;
        };
        let result = match frame["type"].as_str() {
            Some("EXECUTE_REQUEST") => json!({
                "status": 200,
                "statusText": "OK",
                "headers": [["content-type", "text/plain"]],
                "body": frame["request"]["url"],
            }),
            Some("SAVE_REQUEST") => {
                let request_id = frame["requestId"].as_str().unwrap_or_default();
                let saved_id = if request_id.starts_with("draft-") {
                    "saved-1"
                } else {
                    request_id
                };
                json!({"requestId": saved_id, "request": frame["request"]})
            }
            _ => Value::Null,
        };
        let _ = reply.post(json!({"id": id, "result": result}));
    }
}

struct Session {
    console: Console,
    host: PipePort,
    seen: UnboundedReceiver<Value>,
}

impl Session {
    fn start() -> Self {
        let (console_port, outbound) = pipe();
        let (host, inbound) = pipe();
        let console =
            Console::connect(ConsoleConfig::strict(), Arc::new(console_port), inbound).unwrap();
        let (seen_tx, seen) = mpsc::unbounded_channel();
        tokio::spawn(simulated_host(outbound, host.clone(), seen_tx));
        Self {
            console,
            host,
            seen,
        }
    }

    /// Post an event from the host side and apply it.
    async fn push(&mut self, event: Value) {
        self.host.post(event).unwrap();
        let event = self.console.next_event().await.unwrap();
        self.console.handle_event(event).unwrap();
    }

    /// Next frame of the given type the console sent, skipping others.
    async fn expect_frame(&mut self, frame_type: &str) -> Value {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let frame = self.seen.recv().await.expect("host task ended");
                if frame["type"] == frame_type {
                    return frame;
                }
            }
        })
        .await
        .unwrap_or_else(|_| panic!("no {frame_type} frame"))
    }
}

#[tokio::test]
async fn handshake_precedes_everything() {
    let mut session = Session::start();
    let first = session.seen.recv().await.unwrap();
    assert_eq!(first, json!({"type": "CONSOLE_READY"}));
}

#[tokio::test]
async fn route_value_survives_url_edit_then_executes() {
    let mut session = Session::start();
    session
        .push(json!({
            "type": "LOAD_REQUEST",
            "requestId": "r1",
            "request": {"verb": "GET", "url": "https://api.x/:id?limit=5"}
        }))
        .await;

    let request = session.console.store().current("r1").unwrap();
    assert_eq!(request.route_parameters["r1~rte~0"], Parameter::new("id", ""));
    assert_eq!(request.query_parameters["r1~qry~0"], Parameter::new("limit", "5"));

    session
        .console
        .edit(
            "r1",
            Edit::Route(RouteEdit {
                id: "r1~rte~0".to_string(),
                value: "42".to_string(),
                description: String::new(),
                is_active: true,
            }),
        )
        .unwrap();
    session
        .console
        .edit(
            "r1",
            Edit::Basics(BasicsEdit::Url(
                "https://api.x/:id?limit=5&offset=0".to_string(),
            )),
        )
        .unwrap();

    let request = session.console.store().current("r1").unwrap();
    assert_eq!(request.route_parameters["r1~rte~0"].value, "42");
    let query: Vec<_> = request.query_parameters.values().cloned().collect();
    assert_eq!(
        query,
        vec![Parameter::new("limit", "5"), Parameter::new("offset", "0")]
    );

    let dirty = session.expect_frame("UPDATE_DIRTY_FLAG").await;
    assert_eq!(dirty["isDirty"], true);

    session.console.execute("r1").await.unwrap();
    let state = session.console.store().response("r1").unwrap();
    assert_eq!(state.status, ResponseStatus::Complete);
    assert_eq!(
        state.response.as_ref().unwrap().body,
        "https://api.x/42?limit=5&offset=0"
    );
}

#[tokio::test]
async fn saving_a_draft_moves_it_to_the_host_id() {
    let mut session = Session::start();
    session
        .push(json!({"type": "INIT_NEW_EMPTY_REQUEST"}))
        .await;
    let draft = session
        .console
        .store()
        .views()
        .active()
        .unwrap()
        .to_string();
    assert!(draft.starts_with("draft-"));

    session
        .console
        .edit(
            &draft,
            Edit::Basics(BasicsEdit::VerbAndUrl {
                verb: Verb::Post,
                url: "https://api.x/items?dry=1".to_string(),
            }),
        )
        .unwrap();
    session.push(json!({"type": "WEBSOCKET_CONNECTED", "requestId": draft})).await;
    session.console.execute(&draft).await.unwrap();

    let saved = session.console.save(&draft).await.unwrap();
    assert_eq!(saved.as_deref(), Some("saved-1"));

    let store = session.console.store();
    assert!(store.request(&draft).is_none());
    assert!(store.response(&draft).is_none());
    assert!(store.socket_log(&draft).is_none());
    assert_eq!(store.is_dirty("saved-1"), Some(false));
    assert_eq!(
        store.response("saved-1").map(|r| r.status),
        Some(ResponseStatus::Complete)
    );
    assert!(store.socket_log("saved-1").unwrap().connected);
    assert_eq!(store.views().active(), Some("saved-1"));

    let saved_request = store.current("saved-1").unwrap();
    assert_eq!(saved_request.verb, Verb::Post);
    assert_eq!(saved_request.url, "https://api.x/items");
    assert!(saved_request.query_parameters.contains_key("saved-1~qry~0"));

    let first = session.expect_frame("UPDATE_DIRTY_FLAG").await;
    assert_eq!(first["requestId"], draft.as_str());
    assert_eq!(first["isDirty"], true);
    let call = session.expect_frame("SAVE_REQUEST").await;
    assert_eq!(call["requestId"], draft.as_str());
    let cleared = session.expect_frame("UPDATE_DIRTY_FLAG").await;
    assert_eq!(cleared, json!({"type": "UPDATE_DIRTY_FLAG", "requestId": "saved-1", "isDirty": false}));
}

#[tokio::test]
async fn concurrent_calls_answered_in_reverse_order() {
    let (console_port, mut outbound) = pipe();
    let (host, inbound) = pipe();
    let console =
        Console::connect(ConsoleConfig::strict(), Arc::new(console_port), inbound).unwrap();
    assert_eq!(outbound.recv().await.unwrap()["type"], "CONSOLE_READY");

    let api = console.host().clone();
    let request = |url: &str| HttpRequest {
        method: Verb::Get,
        url: url.to_string(),
        headers: Vec::new(),
        body: None,
        fetch: Default::default(),
    };

    let responder = async {
        let first = outbound.recv().await.unwrap();
        let second = outbound.recv().await.unwrap();
        // An id nobody issued must not disturb either call.
        host.post(json!({"id": 999, "result": {"status": 500}})).unwrap();
        for frame in [second, first] {
            host.post(json!({
                "id": frame["id"],
                "result": {"status": 200, "body": frame["request"]["url"]}
            }))
            .unwrap();
        }
    };

    let (a, b, ()) = tokio::join!(
        api.execute_request("a", request("/a"), CancellationToken::new()),
        api.execute_request("b", request("/b"), CancellationToken::new()),
        responder
    );
    assert_eq!(a.unwrap().body, "/a");
    assert_eq!(b.unwrap().body, "/b");
    assert_eq!(api.channel().pending_count(), 0);
}

#[tokio::test]
async fn host_error_rejects_save_and_keeps_request_dirty() {
    let (console_port, mut outbound) = pipe();
    let (host, inbound) = pipe();
    let mut console =
        Console::connect(ConsoleConfig::strict(), Arc::new(console_port), inbound).unwrap();

    host.post(json!({
        "type": "LOAD_REQUEST",
        "requestId": "r1",
        "request": {"url": "/x"}
    }))
    .unwrap();
    let event = console.next_event().await.unwrap();
    console.handle_event(event).unwrap();
    console
        .edit("r1", Edit::Basics(BasicsEdit::Name("n".to_string())))
        .unwrap();

    let responder = async {
        loop {
            let frame = outbound.recv().await.unwrap();
            if frame["type"] == "SAVE_REQUEST" {
                host.post(json!({"id": frame["id"], "error": "disk full"}))
                    .unwrap();
                break;
            }
        }
    };
    let (result, ()) = tokio::join!(console.save("r1"), responder);
    let err = result.unwrap_err();
    assert!(err.to_string().contains("disk full"));
    assert_eq!(console.store().is_dirty("r1"), Some(true));
}

#[tokio::test]
async fn environment_modal_save_round_trip() {
    let mut session = Session::start();
    session
        .push(json!({
            "type": "EDIT_ENVIRONMENT_VARIABLES",
            "environmentId": "env1",
            "name": "dev",
            "variables": [{"key": "host", "value": "localhost"}]
        }))
        .await;
    session
        .console
        .edit_modal(ModalEdit::Variables(ParameterEdit::Add {
            id: "env1~env~1".to_string(),
            parameter: Parameter::new("port", "8080"),
        }))
        .unwrap();

    session.console.save_environment().await.unwrap();
    assert!(session.console.store().modal().is_none());

    let call = session.expect_frame("SAVE_ENVIRONMENT_VARIABLES").await;
    assert_eq!(call["environmentId"], "env1");
    let keys: Vec<_> = call["variables"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["key"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(keys, vec!["host", "port"]);
}

#[tokio::test]
async fn collection_authorization_modal_save_round_trip() {
    let mut session = Session::start();
    session
        .push(json!({
            "type": "EDIT_COLLECTION_AUTHORIZATION_PARAMETERS",
            "collectionId": "c1",
            "authorization": {"scheme": "inherit"}
        }))
        .await;
    assert!(matches!(
        session.console.store().modal(),
        Some(Modal::CollectionAuthorization { .. })
    ));
    session
        .console
        .edit_modal(ModalEdit::Authorization(
            console_core::types::Authorization::Basic {
                username: "u".to_string(),
                password: "p".to_string(),
            },
        ))
        .unwrap();

    session.console.save_collection_authorization().await.unwrap();
    assert!(session.console.store().modal().is_none());
    let call = session
        .expect_frame("SAVE_COLLECTION_AUTHORIZATION_PARAMETERS")
        .await;
    assert_eq!(call["collectionId"], "c1");
    assert_eq!(call["authorization"]["scheme"], "basic");
}

#[tokio::test]
async fn inherited_authorization_comes_from_load_binding() {
    let mut session = Session::start();
    session
        .push(json!({
            "type": "LOAD_REQUEST",
            "requestId": "r1",
            "request": {"url": "https://api.x/me", "authorization": {"scheme": "inherit"}},
            "environmentAuth": {
                "sourceId": "c1",
                "authorization": {"scheme": "bearer", "token": "from-collection"}
            }
        }))
        .await;
    session.console.execute("r1").await.unwrap();

    let call = session.expect_frame("EXECUTE_REQUEST").await;
    let headers: Vec<(String, String)> =
        serde_json::from_value(call["request"]["headers"].clone()).unwrap();
    assert!(headers.contains(&(
        "Authorization".to_string(),
        "Bearer from-collection".to_string()
    )));
}

#[tokio::test]
async fn close_view_unloads_request() {
    let mut session = Session::start();
    for id in ["a", "b"] {
        session
            .push(json!({"type": "LOAD_REQUEST", "requestId": id, "request": {"url": "/"}}))
            .await;
    }
    session
        .push(json!({"type": "SHOW_OPEN_REQUEST", "requestId": "a"}))
        .await;
    assert_eq!(session.console.store().views().active(), Some("a"));

    session
        .push(json!({"type": "CLOSE_VIEW", "requestId": "a"}))
        .await;
    assert!(session.console.store().request("a").is_none());
    assert_eq!(session.console.store().views().active(), Some("b"));
}

#[tokio::test]
async fn websocket_packets_are_logged_in_order() {
    let mut session = Session::start();
    session
        .push(json!({"type": "WEBSOCKET_CONNECTED", "requestId": "ws"}))
        .await;
    for (direction, data) in [("send", "ping"), ("receive", "pong")] {
        session
            .push(json!({
                "type": "WEBSOCKET_PACKET",
                "requestId": "ws",
                "packet": {"direction": direction, "data": data, "timestamp": 1}
            }))
            .await;
    }
    session
        .push(json!({"type": "WEBSOCKET_DISCONNECTED", "requestId": "ws"}))
        .await;

    let log = session.console.store().socket_log("ws").unwrap();
    assert!(!log.connected);
    let data: Vec<_> = log.packets.iter().map(|p| p.data.as_str()).collect();
    assert_eq!(data, vec!["ping", "pong"]);

    session.console.send_websocket_message("ws", "again").unwrap();
    session.console.disconnect_websocket("ws").unwrap();
    let sent = session.expect_frame("WEBSOCKET_SEND_MESSAGE").await;
    assert_eq!(sent["message"], "again");
    session.expect_frame("DISCONNECT_WEBSOCKET").await;
}

#[tokio::test]
async fn unknown_frames_are_dropped() {
    let mut session = Session::start();
    session
        .host
        .post(json!({"type": "FROM_THE_FUTURE", "payload": 1}))
        .unwrap();
    session.host.post(json!({"id": 77, "result": "stray"})).unwrap();
    session
        .push(json!({"type": "CLEAR_ENVIRONMENT"}))
        .await;
    assert!(session.console.store().environment().is_none());
}

#[tokio::test]
async fn rehome_moves_traffic_to_the_new_port() {
    let mut session = Session::start();
    session
        .push(json!({
            "type": "INIT_HOST",
            "theme": "light",
            "hasDedicatedPort": true
        }))
        .await;
    assert!(session.console.host_state().has_dedicated_port);

    let (new_console_port, new_outbound) = pipe();
    let (new_host, new_inbound) = pipe();
    session
        .console
        .rehome(Arc::new(new_console_port), new_inbound);
    let (seen_tx, seen) = mpsc::unbounded_channel();
    tokio::spawn(simulated_host(new_outbound, new_host.clone(), seen_tx));
    session.host = new_host;
    session.seen = seen;

    session
        .push(json!({"type": "LOAD_REQUEST", "requestId": "r1", "request": {"url": "/moved"}}))
        .await;
    session.console.execute("r1").await.unwrap();
    let call = session.expect_frame("EXECUTE_REQUEST").await;
    assert_eq!(call["request"]["url"], "/moved");
    assert_eq!(
        session
            .console
            .store()
            .response("r1")
            .and_then(|r| r.response.as_ref())
            .map(|r| r.body.as_str()),
        Some("/moved")
    );
}

#[test]
fn host_events_are_a_closed_set() {
    let event: HostEvent = serde_json::from_value(json!({"type": "CLEAR_ENVIRONMENT"})).unwrap();
    assert_eq!(event, HostEvent::ClearEnvironment);
    assert!(serde_json::from_value::<HostEvent>(json!({"type": "clear_environment"})).is_err());
}
