//! Open views, the active view, and per-request websocket logs.

use serde::{Deserialize, Serialize};

use crate::types::SocketPacket;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    open: Vec<String>,
    active: Option<String>,
}

impl ViewState {
    pub fn open_views(&self) -> &[String] {
        &self.open
    }

    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn is_open(&self, request_id: &str) -> bool {
        self.open.iter().any(|id| id == request_id)
    }

    /// Open (if needed) and activate.
    pub(crate) fn open(&mut self, request_id: &str) {
        if !self.is_open(request_id) {
            self.open.push(request_id.to_string());
        }
        self.active = Some(request_id.to_string());
    }

    pub(crate) fn activate(&mut self, request_id: &str) -> bool {
        if !self.is_open(request_id) {
            return false;
        }
        self.active = Some(request_id.to_string());
        true
    }

    /// Close a view. If it was active, its right neighbour (or else the new
    /// last view) becomes active.
    pub(crate) fn close(&mut self, request_id: &str) {
        let Some(index) = self.open.iter().position(|id| id == request_id) else {
            return;
        };
        self.open.remove(index);
        if self.active.as_deref() == Some(request_id) {
            self.active = self
                .open
                .get(index)
                .or_else(|| self.open.last())
                .cloned();
        }
    }

    pub(crate) fn rename(&mut self, from: &str, to: &str) {
        for id in self.open.iter_mut().filter(|id| id.as_str() == from) {
            *id = to.to_string();
        }
        if self.active.as_deref() == Some(from) {
            self.active = Some(to.to_string());
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SocketLog {
    pub connected: bool,
    pub packets: Vec<SocketPacket>,
}
