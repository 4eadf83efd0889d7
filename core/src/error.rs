//! Error types for the console core.
//!
//! # Design
//! Contract violations (`StoreError`) are programming errors in the calling
//! UI layer: referencing a request or row that should exist, or adding one
//! that already does. Host failures (`ChannelError::Host`) are the host's
//! answer to a correlated call and are surfaced to the caller unchanged.
//! Transport failures never escape `Console::execute`; they become the
//! `ErrorBelowApplicationLayer` response status instead.

/// A store transition was asked to do something its caller should have known
/// was impossible.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("request {request_id} is not loaded")]
    RequestNotFound { request_id: String },

    #[error("request {request_id} has no row {id}")]
    ParameterNotFound { request_id: String, id: String },

    #[error("conflicting edit on request {request_id}: {reason}")]
    Conflict { request_id: String, reason: String },

    #[error("no modal dialog is open")]
    NoModal,

    #[error("the open modal does not accept this edit")]
    ModalMismatch,
}

#[derive(thiserror::Error, Debug)]
pub enum ChannelError {
    /// The host answered the call with an error frame.
    #[error("host error: {0}")]
    Host(String),

    /// The channel was torn down before the host answered.
    #[error("host channel closed")]
    Closed,

    #[error("failed to encode frame: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode host result: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("message port rejected frame: {0}")]
    Port(String),
}

/// Failure to obtain any HTTP response at all.
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),

    #[error(transparent)]
    Host(#[from] ChannelError),
}

#[derive(thiserror::Error, Debug)]
pub enum ConsoleError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
