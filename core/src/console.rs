//! The assembled console: store, host channel and transport behind one value.
//!
//! # Design
//! `Console` owns the `RequestStore` and is the only thing that mutates it.
//! Host events are pulled from the channel's event queue with `next_event`
//! and applied with `handle_event`, one at a time, so store transitions never
//! interleave. Correlated host calls (`execute`, `save`, ...) are awaited
//! while holding `&mut self`; their responses are routed by the channel's
//! pump task, not by the event loop, so awaiting them cannot deadlock.
//!
//! User edits go through `edit` so the host hears about every dirty-state
//! change with an `UPDATE_DIRTY_FLAG` notification.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::channel::{HostChannel, MessagePort};
use crate::compose::compose;
use crate::config::{ConsoleConfig, ContractMode};
use crate::error::{ConsoleError, StoreError};
use crate::host::HostApi;
use crate::ids::{self, Divider};
use crate::protocol::{
    deserialize_request, serialize_request, CollectionNode, HostEvent, LogLevel, Preferences,
};
use crate::store::{Edit, ExecutionOutcome, Modal, ModalEdit, RequestStore, Transition};
use crate::transport::{HostTransport, Transport};
use crate::types::Request;

/// Host-supplied presentation state, kept for the UI layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostState {
    pub theme: Option<String>,
    pub css: Option<String>,
    /// Opaque blob the host persisted for the console.
    pub persisted: Option<Value>,
    pub preferences: Preferences,
    pub collections: Vec<CollectionNode>,
    pub has_dedicated_port: bool,
}

pub struct Console {
    config: ConsoleConfig,
    store: RequestStore,
    host: HostApi,
    transport: Arc<dyn Transport>,
    events: mpsc::UnboundedReceiver<HostEvent>,
    host_state: HostState,
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

impl Console {
    /// Open the host channel on `port`, start pumping `inbound` into it, and
    /// execute requests through the host. Must be called inside a tokio
    /// runtime.
    pub fn connect(
        config: ConsoleConfig,
        port: Arc<dyn MessagePort>,
        inbound: mpsc::UnboundedReceiver<Value>,
    ) -> Result<Self, ConsoleError> {
        let (channel, events) = HostChannel::open(port)?;
        channel.attach(inbound);
        let host = HostApi::new(channel);
        info!(mode = ?config.contract_mode, "console connected");
        Ok(Self {
            store: RequestStore::new(config.contract_mode),
            transport: Arc::new(HostTransport::new(host.clone())),
            config,
            host,
            events,
            host_state: HostState::default(),
        })
    }

    /// Execute requests through `transport` instead of the host.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    pub fn store(&self) -> &RequestStore {
        &self.store
    }

    pub fn host(&self) -> &HostApi {
        &self.host
    }

    pub fn host_state(&self) -> &HostState {
        &self.host_state
    }

    // -----------------------------------------------------------------------
    // Host events
    // -----------------------------------------------------------------------

    /// Next unsolicited host event, or `None` once the channel is gone.
    pub async fn next_event(&mut self) -> Option<HostEvent> {
        self.events.recv().await
    }

    /// Apply host events until the channel closes.
    pub async fn run(&mut self) {
        while let Some(event) = self.next_event().await {
            if let Err(err) = self.handle_event(event) {
                error!(error = %err, "host event failed");
            }
        }
        debug!("host event stream ended");
    }

    pub fn handle_event(&mut self, event: HostEvent) -> Result<(), ConsoleError> {
        match event {
            HostEvent::InitHost {
                theme,
                css,
                has_dedicated_port,
                state,
            } => {
                info!(has_dedicated_port, "host initialized");
                self.host_state.theme = theme;
                self.host_state.css = css;
                self.host_state.has_dedicated_port = has_dedicated_port;
                self.host_state.persisted = state;
            }
            HostEvent::CssStyleUpdated { theme, css } => {
                if theme.is_some() {
                    self.host_state.theme = theme;
                }
                self.host_state.css = Some(css);
            }
            HostEvent::InitNewEmptyRequest { request_id } => {
                let request_id = request_id.unwrap_or_else(ids::new_draft_id);
                self.store.load(&request_id, Request::default());
            }
            HostEvent::LoadRequest {
                request_id,
                request,
                environment_auth,
            } => {
                let request = deserialize_request(&request_id, request);
                self.store.load(&request_id, request);
                if let Some(binding) = environment_auth {
                    self.store.bind_environment_auth(&request_id, binding);
                }
            }
            HostEvent::SetPreferences { preferences } => {
                self.host_state.preferences = preferences;
            }
            HostEvent::UpdateCollectionsTree { collections } => {
                self.host_state.collections = collections;
            }
            HostEvent::EditCollectionAuthorizationParameters {
                collection_id,
                authorization,
            } => {
                self.store.open_modal(Modal::CollectionAuthorization {
                    collection_id,
                    authorization,
                });
            }
            HostEvent::EditEnvironmentVariables {
                environment_id,
                name,
                variables,
            } => {
                let variables =
                    ids::renumber(&environment_id, Divider::EnvironmentVariable, variables);
                self.store.open_modal(Modal::EnvironmentVariables {
                    environment_id,
                    name,
                    variables,
                });
            }
            HostEvent::UpdateEnvironment { environment } => {
                self.store.set_environment(Some(environment.into_environment()));
            }
            HostEvent::ClearEnvironment => self.store.set_environment(None),
            HostEvent::CloseView { request_id } => self.store.unload(&request_id),
            HostEvent::ShowOpenRequest { request_id } => {
                if !self.store.activate_view(&request_id) {
                    self.contract_violation(StoreError::RequestNotFound { request_id })?;
                }
            }
            HostEvent::WebsocketConnected { request_id } => {
                self.store.socket_connected(&request_id)
            }
            HostEvent::WebsocketDisconnected { request_id } => {
                self.store.socket_disconnected(&request_id)
            }
            HostEvent::WebsocketPacket { request_id, packet } => {
                self.store.socket_packet(&request_id, packet)
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // User edits
    // -----------------------------------------------------------------------

    /// Apply a user edit and tell the host if the dirty state changed.
    pub fn edit(&mut self, request_id: &str, edit: Edit) -> Result<Transition, ConsoleError> {
        let before = self.store.is_dirty(request_id);
        let transition = self.store.apply(request_id, edit)?;
        let after = self.store.is_dirty(request_id);
        if let Some(is_dirty) = after.filter(|&now| Some(now) != before) {
            self.host.update_dirty_flag(request_id, is_dirty)?;
        }
        Ok(transition)
    }

    pub fn edit_modal(&mut self, edit: ModalEdit) -> Result<Transition, ConsoleError> {
        Ok(self.store.edit_modal(edit)?)
    }

    /// Load a blank request under a fresh draft id and return the id.
    pub fn new_draft(&mut self) -> String {
        let request_id = ids::new_draft_id();
        self.store.load(&request_id, Request::default());
        request_id
    }

    // -----------------------------------------------------------------------
    // Host round-trips
    // -----------------------------------------------------------------------

    /// Compose and send a request, recording the outcome in its response
    /// state. Failing to get any response is recorded, not returned.
    pub async fn execute(&mut self, request_id: &str) -> Result<Transition, ConsoleError> {
        if self.store.begin_execution(request_id, now_millis())? == Transition::Ignored {
            return Ok(Transition::Ignored);
        }
        let Some(request) = self.store.current(request_id) else {
            return self.contract_violation(StoreError::RequestNotFound {
                request_id: request_id.to_string(),
            });
        };
        let inherited = self
            .store
            .environment_auth(request_id)
            .map(|binding| &binding.authorization);
        let composed = compose(request, self.store.environment(), inherited);
        debug!(request_id, method = %composed.method, url = %composed.url, "executing request");

        let transport = Arc::clone(&self.transport);
        let outcome = match transport.execute(request_id, composed).await {
            Ok(response) => ExecutionOutcome::Response(response),
            Err(err) => {
                warn!(request_id, error = %err, "request produced no response");
                ExecutionOutcome::TransportFailed
            }
        };
        Ok(self.store.end_execution(request_id, outcome, now_millis())?)
    }

    /// Persist the current request. Returns the id it is stored under
    /// afterwards, which differs from `request_id` when a draft was saved.
    pub async fn save(&mut self, request_id: &str) -> Result<Option<String>, ConsoleError> {
        let Some(request) = self.store.current(request_id) else {
            self.contract_violation(StoreError::RequestNotFound {
                request_id: request_id.to_string(),
            })?;
            return Ok(None);
        };
        let serialized = serialize_request(request);
        let result = self
            .host
            .save_request(request_id, serialized, CancellationToken::new())
            .await?;

        let saved = deserialize_request(&result.request_id, result.request);
        if self.store.save(request_id, &result.request_id, saved)? == Transition::Ignored {
            return Ok(None);
        }
        self.host.update_dirty_flag(&result.request_id, false)?;
        Ok(Some(result.request_id))
    }

    pub async fn save_collection_authorization(&mut self) -> Result<Transition, ConsoleError> {
        let (collection_id, authorization) = match self.store.modal() {
            Some(Modal::CollectionAuthorization {
                collection_id,
                authorization,
            }) => (collection_id.clone(), authorization.clone()),
            Some(_) => return self.contract_violation(StoreError::ModalMismatch),
            None => return self.contract_violation(StoreError::NoModal),
        };
        self.host
            .save_collection_authorization(&collection_id, authorization, CancellationToken::new())
            .await?;
        self.store.close_modal();
        Ok(Transition::Applied)
    }

    pub async fn save_environment(&mut self) -> Result<Transition, ConsoleError> {
        let (environment_id, variables) = match self.store.modal() {
            Some(Modal::EnvironmentVariables {
                environment_id,
                variables,
                ..
            }) => (environment_id.clone(), variables.values().cloned().collect()),
            Some(_) => return self.contract_violation(StoreError::ModalMismatch),
            None => return self.contract_violation(StoreError::NoModal),
        };
        self.host
            .save_environment(&environment_id, variables, CancellationToken::new())
            .await?;
        self.store.close_modal();
        Ok(Transition::Applied)
    }

    // -----------------------------------------------------------------------
    // Fire-and-forget
    // -----------------------------------------------------------------------

    pub fn send_websocket_message(
        &self,
        request_id: &str,
        message: &str,
    ) -> Result<(), ConsoleError> {
        Ok(self.host.send_websocket_message(request_id, message)?)
    }

    pub fn disconnect_websocket(&self, request_id: &str) -> Result<(), ConsoleError> {
        Ok(self.host.disconnect_websocket(request_id)?)
    }

    pub fn open_web_link(&self, url: &str) -> Result<(), ConsoleError> {
        Ok(self.host.open_web_link(url)?)
    }

    pub fn open_new_unattached_request(&self) -> Result<(), ConsoleError> {
        Ok(self.host.open_new_unattached_request()?)
    }

    /// Log locally and, when configured, forward the line to the host.
    pub fn log(&self, level: LogLevel, message: &str) -> Result<(), ConsoleError> {
        match level {
            LogLevel::Debug => debug!(target: "console", "{message}"),
            LogLevel::Info => info!(target: "console", "{message}"),
            LogLevel::Warn => warn!(target: "console", "{message}"),
            LogLevel::Error => error!(target: "console", "{message}"),
        }
        if self.config.forward_logs {
            self.host.log(level, message)?;
        }
        Ok(())
    }

    /// Continue the conversation on a dedicated port.
    pub fn rehome(&self, port: Arc<dyn MessagePort>, inbound: mpsc::UnboundedReceiver<Value>) {
        self.host.channel().rehome(port, inbound);
    }

    fn contract_violation(&self, err: StoreError) -> Result<Transition, ConsoleError> {
        match self.store.contract_mode() {
            ContractMode::Strict => Err(err.into()),
            ContractMode::Tolerant => {
                warn!(error = %err, "ignoring contract violation");
                Ok(Transition::Ignored)
            }
        }
    }
}
