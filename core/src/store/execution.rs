//! Per-request execution state machine.
//!
//! `NotSent -> Pending -> (Complete | ErrorBelowApplicationLayer)`. Entering
//! `Pending` is always allowed and starts over. A non-2xx response is still
//! `Complete`; only the absence of any response is an error here.

use serde::{Deserialize, Serialize};

use crate::http::HttpResponse;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseStatus {
    #[default]
    NotSent,
    Pending,
    Complete,
    ErrorBelowApplicationLayer,
}

/// How an execution ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Response(HttpResponse),
    /// The transport could not produce a response at all.
    TransportFailed,
}

/// Timestamps and durations are in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseState {
    pub duration: Option<u64>,
    pub started: Option<u64>,
    pub status: ResponseStatus,
    pub response: Option<HttpResponse>,
}

impl ResponseState {
    pub fn not_sent() -> Self {
        Self::default()
    }

    pub(crate) fn begin(&mut self, now: u64) {
        *self = Self {
            duration: None,
            started: Some(now),
            status: ResponseStatus::Pending,
            response: None,
        };
    }

    pub(crate) fn finish(&mut self, outcome: ExecutionOutcome, now: u64) {
        let started = self.started.take().unwrap_or(now);
        self.duration = Some(now.saturating_sub(started));
        match outcome {
            ExecutionOutcome::Response(response) => {
                self.status = ResponseStatus::Complete;
                self.response = Some(response);
            }
            ExecutionOutcome::TransportFailed => {
                self.status = ResponseStatus::ErrorBelowApplicationLayer;
                self.response = None;
            }
        }
    }
}
