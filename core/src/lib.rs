//! Request-state engine and host protocol for an embedded network console.
//!
//! # Overview
//! The console edits HTTP requests on behalf of a host shell (an editor
//! extension, a devtools panel, a browser tab). This crate keeps a request's
//! structured fields consistent while the user edits any one of them, and
//! talks to the host over a single duplex message pipe for execution,
//! persistence and pushed configuration.
//!
//! # Design
//! - `url_parts` / `reconcile` / `ids`: pure functions. A URL edit is
//!   deconstructed and merged into the route and query tables; rows are keyed
//!   by `<requestId><divider><n>` composite ids, renumbered densely.
//! - `store`: the only mutator of per-request state. Strict or tolerant about
//!   contract violations depending on `ConsoleConfig`.
//! - `channel` / `protocol` / `host`: correlation-id RPC over the pipe, plus
//!   unsolicited events and fire-and-forget notifications.
//! - `compose` / `transport`: the core builds plain-data `HttpRequest` values
//!   and never does network I/O itself; a `Transport` (by default the host)
//!   performs it.
//! - `console`: ties the pieces together for one UI session.

pub mod channel;
pub mod compose;
pub mod config;
pub mod console;
pub mod error;
pub mod host;
pub mod http;
pub mod ids;
pub mod protocol;
pub mod reconcile;
pub mod saveable;
pub mod store;
pub mod transport;
pub mod types;
pub mod url_parts;

pub use channel::{pipe, HostChannel, MessagePort, PendingCall, PipePort};
pub use config::{ConsoleConfig, ContractMode};
pub use console::{Console, HostState};
pub use error::{ChannelError, ConsoleError, StoreError, TransportError};
pub use http::{HttpRequest, HttpResponse};
pub use store::{RequestStore, Transition};
pub use transport::{HostTransport, Transport};
pub use types::{Parameter, Request, Verb};
