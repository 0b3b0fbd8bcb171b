//! Error types surfaced by the session layer.

use thiserror::Error;

use crate::state::TrackSource;

/// Failures reported by the real-time engine.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("not connected to a room")]
    NotConnected,

    #[error("connection failed: {0}")]
    Connection(String),

    #[error(transparent)]
    Device(#[from] DeviceError),
}

/// A device could not be enabled or disabled.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{} unavailable: {reason}", .device.display_name())]
pub struct DeviceError {
    pub device: TrackSource,
    pub reason: String,
}

impl DeviceError {
    pub fn new(device: TrackSource, reason: impl Into<String>) -> Self {
        Self {
            device,
            reason: reason.into(),
        }
    }
}

/// Why a chat message was not sent.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SendError {
    #[error("message is empty")]
    Empty,

    #[error("a message is already being sent")]
    InFlight,

    #[error("no active session")]
    NoSession,

    #[error(transparent)]
    Engine(#[from] EngineError),
}
