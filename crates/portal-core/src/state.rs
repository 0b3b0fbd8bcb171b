//! UI-agnostic call session state types
//!
//! This module contains data structures that are shared between the session
//! controller, the engine adapters and the terminal UI, and don't depend on
//! any specific UI framework.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Readiness phase of the remote agent, as reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallState {
    #[default]
    Disconnected,
    Connecting,
    Initializing,
    Listening,
    Thinking,
    Speaking,
}

impl CallState {
    /// The agent is in the room and able to converse.
    pub fn is_ready(&self) -> bool {
        matches!(
            self,
            CallState::Listening | CallState::Thinking | CallState::Speaking
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CallState::Disconnected => "disconnected",
            CallState::Connecting => "connecting",
            CallState::Initializing => "initializing",
            CallState::Listening => "listening",
            CallState::Thinking => "thinking",
            CallState::Speaking => "speaking",
        }
    }
}

/// Who produced a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatAuthor {
    Local,
    Remote,
}

impl ChatAuthor {
    pub fn label(&self) -> &'static str {
        match self {
            ChatAuthor::Local => "User",
            ChatAuthor::Remote => "Agent",
        }
    }
}

/// Where a feed entry came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageOrigin {
    Chat,
    Transcription,
}

/// A single entry in the session transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub author: ChatAuthor,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub origin: MessageOrigin,
}

impl ChatMessage {
    /// A message typed by the local user, stamped now.
    pub fn local(text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            author: ChatAuthor::Local,
            text: text.into(),
            timestamp: Utc::now(),
            origin: MessageOrigin::Chat,
        }
    }

    pub fn is_local(&self) -> bool {
        self.author == ChatAuthor::Local
    }
}

/// A (possibly interim) transcription of speech in the room.
///
/// Segments are re-sent with the same `id` as recognition improves; the last
/// one carries `is_final`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionSegment {
    pub id: String,
    pub author: ChatAuthor,
    pub text: String,
    pub first_received: DateTime<Utc>,
    pub is_final: bool,
}

/// Capability flags for a session, read-only while it runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub supports_chat_input: bool,
    pub supports_video_input: bool,
    pub supports_screen_share: bool,
    pub pre_connect_buffer_enabled: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            supports_chat_input: true,
            supports_video_input: true,
            supports_screen_share: true,
            pre_connect_buffer_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackSource {
    Microphone,
    Camera,
    ScreenShare,
}

impl TrackSource {
    pub fn display_name(&self) -> &'static str {
        match self {
            TrackSource::Microphone => "Microphone",
            TrackSource::Camera => "Camera",
            TrackSource::ScreenShare => "Screen share",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub identity: String,
    pub is_agent: bool,
    pub is_local: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackPublication {
    pub source: TrackSource,
    pub participant: String,
    pub muted: bool,
}
