//! Seam to the external real-time engine.
//!
//! Media transport, track negotiation and voice activity all live behind
//! [`RtcEngine`]. The session layer only connects, toggles devices, sends chat
//! and listens to the events the engine pushes back.

pub mod simulated;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::EngineError;
use crate::state::{CallState, ChatMessage, Participant, TrackPublication, TrackSource, TranscriptionSegment};

pub use simulated::{Scenario, SimulatedEngine};

/// Everything the engine reports about the room
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    StateChanged(CallState),
    ParticipantJoined(Participant),
    ParticipantLeft(String),
    TrackPublished(TrackPublication),
    TrackMuted { source: TrackSource, participant: String, muted: bool },
    TrackUnpublished { source: TrackSource, participant: String },
    Transcription(TranscriptionSegment),
    ChatReceived(ChatMessage),
    Disconnected,
}

pub type EngineEvents = mpsc::UnboundedSender<EngineEvent>;

#[async_trait]
pub trait RtcEngine: Send + Sync {
    /// Join the room. Events flow into `events` until disconnect.
    async fn connect(&self, events: EngineEvents) -> Result<(), EngineError>;

    async fn disconnect(&self);

    /// Enable or disable a local device. Returns the resulting enabled state.
    async fn set_device_enabled(&self, source: TrackSource, enabled: bool) -> Result<bool, EngineError>;

    /// Deliver a chat message to the room and return it as published.
    async fn send_chat_message(&self, text: &str) -> Result<ChatMessage, EngineError>;

    fn remote_participants(&self) -> Vec<Participant>;

    /// Identity the local participant publishes under.
    fn local_identity(&self) -> String;
}
