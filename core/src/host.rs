//! Typed wrappers over the host channel.
//!
//! Each correlated call awaits its `PendingCall` and decodes the `result`
//! payload into the type the call promises. Notifications return as soon as
//! the frame is posted.
//!
//! Correlated calls take a `CancellationToken`. It is passed down to the
//! channel and not observed yet; cancelling it does not stop the call.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::channel::HostChannel;
use crate::error::ChannelError;
use crate::http::{HttpRequest, HttpResponse};
use crate::protocol::{HostCall, LogLevel, Notification, SaveRequestResult, SerializedRequest};
use crate::types::{Authorization, Parameter};

#[derive(Clone)]
pub struct HostApi {
    channel: Arc<HostChannel>,
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ChannelError> {
    serde_json::from_value(value).map_err(ChannelError::Decode)
}

impl HostApi {
    pub fn new(channel: Arc<HostChannel>) -> Self {
        Self { channel }
    }

    pub fn channel(&self) -> &Arc<HostChannel> {
        &self.channel
    }

    // -----------------------------------------------------------------------
    // Correlated calls
    // -----------------------------------------------------------------------

    pub async fn execute_request(
        &self,
        request_id: &str,
        request: HttpRequest,
        cancel: CancellationToken,
    ) -> Result<HttpResponse, ChannelError> {
        let value = self
            .channel
            .call(
                HostCall::ExecuteRequest {
                    request_id: request_id.to_string(),
                    request,
                },
                cancel,
            )
            .await?;
        decode(value)
    }

    /// Persist a request. The host may answer with a different id when a
    /// draft gets its permanent identity.
    pub async fn save_request(
        &self,
        request_id: &str,
        request: SerializedRequest,
        cancel: CancellationToken,
    ) -> Result<SaveRequestResult, ChannelError> {
        let value = self
            .channel
            .call(
                HostCall::SaveRequest {
                    request_id: request_id.to_string(),
                    request,
                },
                cancel,
            )
            .await?;
        decode(value)
    }

    pub async fn save_collection_authorization(
        &self,
        collection_id: &str,
        authorization: Authorization,
        cancel: CancellationToken,
    ) -> Result<(), ChannelError> {
        self.channel
            .call(
                HostCall::SaveCollectionAuthorizationParameters {
                    collection_id: collection_id.to_string(),
                    authorization,
                },
                cancel,
            )
            .await?;
        Ok(())
    }

    pub async fn save_environment(
        &self,
        environment_id: &str,
        variables: Vec<Parameter>,
        cancel: CancellationToken,
    ) -> Result<(), ChannelError> {
        self.channel
            .call(
                HostCall::SaveEnvironmentVariables {
                    environment_id: environment_id.to_string(),
                    variables,
                },
                cancel,
            )
            .await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Notifications
    // -----------------------------------------------------------------------

    pub fn disconnect_websocket(&self, request_id: &str) -> Result<(), ChannelError> {
        self.channel.notify(&Notification::DisconnectWebsocket {
            request_id: request_id.to_string(),
        })
    }

    pub fn send_websocket_message(
        &self,
        request_id: &str,
        message: &str,
    ) -> Result<(), ChannelError> {
        self.channel.notify(&Notification::WebsocketSendMessage {
            request_id: request_id.to_string(),
            message: message.to_string(),
        })
    }

    pub fn open_web_link(&self, url: &str) -> Result<(), ChannelError> {
        self.channel.notify(&Notification::OpenWebLink {
            url: url.to_string(),
        })
    }

    pub fn update_dirty_flag(&self, request_id: &str, is_dirty: bool) -> Result<(), ChannelError> {
        self.channel.notify(&Notification::UpdateDirtyFlag {
            request_id: request_id.to_string(),
            is_dirty,
        })
    }

    pub fn open_new_unattached_request(&self) -> Result<(), ChannelError> {
        self.channel.notify(&Notification::OpenNewUnattachedRequest)
    }

    pub fn log(&self, level: LogLevel, message: &str) -> Result<(), ChannelError> {
        self.channel.notify(&Notification::Log {
            level,
            message: message.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio::sync::mpsc;

    use super::*;
    use crate::channel::pipe;

    fn connect() -> (HostApi, mpsc::UnboundedReceiver<Value>) {
        let (port, mut outbound) = pipe();
        let (channel, _events) = HostChannel::open(Arc::new(port)).unwrap();
        // Discard the handshake.
        let _ = outbound.try_recv();
        (HostApi::new(channel), outbound)
    }

    #[tokio::test]
    async fn execute_request_decodes_response() {
        let (host, mut outbound) = connect();
        let channel = Arc::clone(host.channel());
        let request = HttpRequest {
            method: crate::types::Verb::Get,
            url: "https://x/".to_string(),
            headers: Vec::new(),
            body: None,
            fetch: Default::default(),
        };

        let answer = tokio::spawn(async move {
            let frame = outbound.recv().await.unwrap();
            assert_eq!(frame["type"], "EXECUTE_REQUEST");
            assert_eq!(frame["requestId"], "r1");
            channel.receive(json!({
                "id": frame["id"],
                "result": {"status": 204, "statusText": "No Content"}
            }));
        });

        let response = host.execute_request("r1", request, CancellationToken::new()).await.unwrap();
        answer.await.unwrap();
        assert_eq!(response.status, 204);
        assert_eq!(response.status_text, "No Content");
    }

    #[tokio::test]
    async fn malformed_result_is_a_decode_error() {
        let (host, mut outbound) = connect();
        let channel = Arc::clone(host.channel());
        tokio::spawn(async move {
            let frame = outbound.recv().await.unwrap();
            channel.receive(json!({"id": frame["id"], "result": {"unexpected": true}}));
        });

        let result = host
            .save_request("r1", SerializedRequest::default(), CancellationToken::new())
            .await;
        assert!(matches!(result, Err(ChannelError::Decode(_))));
    }

    #[tokio::test]
    async fn host_error_is_surfaced() {
        let (host, mut outbound) = connect();
        let channel = Arc::clone(host.channel());
        tokio::spawn(async move {
            let frame = outbound.recv().await.unwrap();
            channel.receive(json!({"id": frame["id"], "error": "collection is read-only"}));
        });

        let result = host
            .save_collection_authorization("c1", Authorization::None, CancellationToken::new())
            .await;
        assert!(matches!(result, Err(ChannelError::Host(m)) if m == "collection is read-only"));
    }

    #[tokio::test]
    async fn notifications_are_plain_frames() {
        let (host, mut outbound) = connect();
        host.update_dirty_flag("r1", true).unwrap();
        host.send_websocket_message("r1", "ping").unwrap();
        assert_eq!(
            outbound.recv().await.unwrap(),
            json!({"type": "UPDATE_DIRTY_FLAG", "requestId": "r1", "isDirty": true})
        );
        assert_eq!(
            outbound.recv().await.unwrap(),
            json!({"type": "WEBSOCKET_SEND_MESSAGE", "requestId": "r1", "message": "ping"})
        );
    }
}
