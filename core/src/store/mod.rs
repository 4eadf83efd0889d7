//! Per-request editable state and everything keyed off the same request ids.
//!
//! # Design
//! `RequestStore` is the only mutator of request state. It is an explicit
//! value owned by the `Console` (or an FFI handle), never a global. Each edit
//! category has one transition method; all of them go through `transition`,
//! which looks the request up, applies a pure edit to a copy of `current`,
//! and stores it back marked dirty. A failed edit leaves the stored request
//! untouched.
//!
//! Contract violations are returned as `StoreError` in strict mode. In
//! tolerant mode they are logged and reported as `Transition::Ignored`.

pub mod edits;
pub mod execution;
pub mod modal;
pub mod views;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::ContractMode;
use crate::error::StoreError;
use crate::saveable::Saveable;
use crate::types::{Authorization, Environment, Request, SocketPacket};

pub use edits::{BasicsEdit, BodyEdit, Edit, FetchEdit, ParameterEdit, RouteEdit};
pub use execution::{ExecutionOutcome, ResponseState, ResponseStatus};
pub use modal::{Modal, ModalEdit};
pub use views::{SocketLog, ViewState};

/// What a transition did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied,
    /// A contract violation was tolerated; nothing changed.
    Ignored,
}

/// Authorization a request inherits from its collection or environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentAuth {
    pub source_id: String,
    pub authorization: Authorization,
}

#[derive(Debug, Clone, Default)]
pub struct RequestStore {
    mode: ContractMode,
    requests: HashMap<String, Saveable<Request>>,
    responses: HashMap<String, ResponseState>,
    views: ViewState,
    modal: Option<Modal>,
    environment: Option<Environment>,
    environment_auth: HashMap<String, EnvironmentAuth>,
    sockets: HashMap<String, SocketLog>,
}

fn violation(mode: ContractMode, err: StoreError) -> Result<Transition, StoreError> {
    match mode {
        ContractMode::Strict => Err(err),
        ContractMode::Tolerant => {
            warn!(error = %err, "ignoring contract violation");
            Ok(Transition::Ignored)
        }
    }
}

impl RequestStore {
    pub fn new(mode: ContractMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn contract_mode(&self) -> ContractMode {
        self.mode
    }

    pub fn request(&self, request_id: &str) -> Option<&Saveable<Request>> {
        self.requests.get(request_id)
    }

    pub fn current(&self, request_id: &str) -> Option<&Request> {
        self.requests.get(request_id).map(Saveable::current)
    }

    pub fn is_dirty(&self, request_id: &str) -> Option<bool> {
        self.requests.get(request_id).map(Saveable::is_dirty)
    }

    pub fn request_ids(&self) -> impl Iterator<Item = &str> {
        self.requests.keys().map(String::as_str)
    }

    pub fn response(&self, request_id: &str) -> Option<&ResponseState> {
        self.responses.get(request_id)
    }

    pub fn views(&self) -> &ViewState {
        &self.views
    }

    pub fn modal(&self) -> Option<&Modal> {
        self.modal.as_ref()
    }

    pub fn environment(&self) -> Option<&Environment> {
        self.environment.as_ref()
    }

    pub fn environment_auth(&self, request_id: &str) -> Option<&EnvironmentAuth> {
        self.environment_auth.get(request_id)
    }

    pub fn socket_log(&self, request_id: &str) -> Option<&SocketLog> {
        self.sockets.get(request_id)
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Install a request as clean, reset its response, and make it the
    /// active view.
    pub fn load(&mut self, request_id: &str, request: Request) {
        debug!(request_id, "loading request");
        self.requests
            .insert(request_id.to_string(), Saveable::new(request));
        self.responses
            .insert(request_id.to_string(), ResponseState::not_sent());
        self.views.open(request_id);
    }

    /// Record a save acknowledgment. When the host assigned a new id (a
    /// draft was persisted), every per-id binding moves with the request.
    pub fn save(
        &mut self,
        request_id: &str,
        result_id: &str,
        result: Request,
    ) -> Result<Transition, StoreError> {
        if !self.requests.contains_key(request_id) {
            return violation(
                self.mode,
                StoreError::RequestNotFound {
                    request_id: request_id.to_string(),
                },
            );
        }

        if request_id != result_id {
            info!(from = request_id, to = result_id, "request saved under new id");
            if self.requests.contains_key(result_id) {
                // Whatever was open under the target id is superseded.
                debug!(request_id = result_id, "dropping stale state for saved id");
                self.unload(result_id);
            }
            self.requests.remove(request_id);
            move_entry(&mut self.responses, request_id, result_id);
            move_entry(&mut self.environment_auth, request_id, result_id);
            move_entry(&mut self.sockets, request_id, result_id);
            self.views.rename(request_id, result_id);
        }
        self.requests
            .insert(result_id.to_string(), Saveable::new(result));
        Ok(Transition::Applied)
    }

    /// Drop every piece of state keyed by `request_id` and close its view.
    pub fn unload(&mut self, request_id: &str) {
        self.requests.remove(request_id);
        self.responses.remove(request_id);
        self.environment_auth.remove(request_id);
        self.sockets.remove(request_id);
        self.views.close(request_id);
    }

    pub fn activate_view(&mut self, request_id: &str) -> bool {
        self.views.activate(request_id)
    }

    // -----------------------------------------------------------------------
    // Field edits
    // -----------------------------------------------------------------------

    pub fn apply(&mut self, request_id: &str, edit: Edit) -> Result<Transition, StoreError> {
        self.transition(request_id, |id, request| edits::apply(id, request, edit))
    }

    pub fn edit_basics(
        &mut self,
        request_id: &str,
        edit: BasicsEdit,
    ) -> Result<Transition, StoreError> {
        self.apply(request_id, Edit::Basics(edit))
    }

    pub fn edit_headers(
        &mut self,
        request_id: &str,
        edit: ParameterEdit,
    ) -> Result<Transition, StoreError> {
        self.apply(request_id, Edit::Headers(edit))
    }

    pub fn edit_query(
        &mut self,
        request_id: &str,
        edit: ParameterEdit,
    ) -> Result<Transition, StoreError> {
        self.apply(request_id, Edit::Query(edit))
    }

    pub fn edit_route(&mut self, request_id: &str, edit: RouteEdit) -> Result<Transition, StoreError> {
        self.apply(request_id, Edit::Route(edit))
    }

    pub fn edit_body(&mut self, request_id: &str, edit: BodyEdit) -> Result<Transition, StoreError> {
        self.apply(request_id, Edit::Body(edit))
    }

    pub fn edit_authorization(
        &mut self,
        request_id: &str,
        authorization: Authorization,
    ) -> Result<Transition, StoreError> {
        self.apply(request_id, Edit::Authorization(authorization))
    }

    pub fn edit_fetch_params(
        &mut self,
        request_id: &str,
        edit: FetchEdit,
    ) -> Result<Transition, StoreError> {
        self.apply(request_id, Edit::Fetch(edit))
    }

    fn transition(
        &mut self,
        request_id: &str,
        edit: impl FnOnce(&str, &mut Request) -> Result<(), StoreError>,
    ) -> Result<Transition, StoreError> {
        let mode = self.mode;
        let Some(entry) = self.requests.get_mut(request_id) else {
            return violation(
                mode,
                StoreError::RequestNotFound {
                    request_id: request_id.to_string(),
                },
            );
        };
        let mut next = entry.current().clone();
        match edit(request_id, &mut next) {
            Ok(()) => {
                entry.replace(next);
                Ok(Transition::Applied)
            }
            Err(err) => violation(mode, err),
        }
    }

    // -----------------------------------------------------------------------
    // Execution
    // -----------------------------------------------------------------------

    pub fn begin_execution(&mut self, request_id: &str, now: u64) -> Result<Transition, StoreError> {
        if !self.requests.contains_key(request_id) {
            return violation(
                self.mode,
                StoreError::RequestNotFound {
                    request_id: request_id.to_string(),
                },
            );
        }
        self.responses
            .entry(request_id.to_string())
            .or_default()
            .begin(now);
        Ok(Transition::Applied)
    }

    pub fn end_execution(
        &mut self,
        request_id: &str,
        outcome: ExecutionOutcome,
        now: u64,
    ) -> Result<Transition, StoreError> {
        let Some(state) = self.responses.get_mut(request_id) else {
            return violation(
                self.mode,
                StoreError::RequestNotFound {
                    request_id: request_id.to_string(),
                },
            );
        };
        state.finish(outcome, now);
        Ok(Transition::Applied)
    }

    // -----------------------------------------------------------------------
    // Environment, modals, sockets
    // -----------------------------------------------------------------------

    pub fn set_environment(&mut self, environment: Option<Environment>) {
        self.environment = environment;
    }

    pub fn bind_environment_auth(&mut self, request_id: &str, binding: EnvironmentAuth) {
        self.environment_auth
            .insert(request_id.to_string(), binding);
    }

    pub fn open_modal(&mut self, modal: Modal) {
        self.modal = Some(modal);
    }

    pub fn close_modal(&mut self) -> Option<Modal> {
        self.modal.take()
    }

    pub fn edit_modal(&mut self, edit: ModalEdit) -> Result<Transition, StoreError> {
        let mode = self.mode;
        let Some(modal) = self.modal.as_mut() else {
            return violation(mode, StoreError::NoModal);
        };
        let mut next = modal.clone();
        match next.apply(edit) {
            Ok(()) => {
                *modal = next;
                Ok(Transition::Applied)
            }
            Err(err) => violation(mode, err),
        }
    }

    pub fn socket_connected(&mut self, request_id: &str) {
        self.sockets
            .entry(request_id.to_string())
            .or_default()
            .connected = true;
    }

    pub fn socket_disconnected(&mut self, request_id: &str) {
        self.sockets
            .entry(request_id.to_string())
            .or_default()
            .connected = false;
    }

    pub fn socket_packet(&mut self, request_id: &str, packet: SocketPacket) {
        self.sockets
            .entry(request_id.to_string())
            .or_default()
            .packets
            .push(packet);
    }
}

fn move_entry<V>(map: &mut HashMap<String, V>, from: &str, to: &str) {
    if let Some(value) = map.remove(from) {
        map.insert(to.to_string(), value);
    }
}
