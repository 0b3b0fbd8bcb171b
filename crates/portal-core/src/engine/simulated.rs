//! In-process stand-in for a real-time engine.
//!
//! Scripts an agent joining the room, moving through its states and speaking
//! canned replies as streamed transcription. No media is involved.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::task::JoinHandle;

use super::{EngineEvent, EngineEvents, RtcEngine};
use crate::error::{DeviceError, EngineError};
use crate::state::{
    CallState, ChatAuthor, ChatMessage, Participant, TrackPublication, TrackSource,
    TranscriptionSegment,
};

pub const AGENT_IDENTITY: &str = "agent";
pub const LOCAL_IDENTITY: &str = "you";

const GREETING: &str = "Hi there! I'm your voice assistant. How can I help you today?";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// Agent joins, publishes an avatar and becomes ready.
    Healthy,
    /// Agent never joins; the room stays connecting.
    NoAgent,
    /// Agent joins but never finishes initializing.
    StalledAgent,
    /// Healthy, but the local camera cannot be opened.
    NoCamera,
}

impl Scenario {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scenario::Healthy => "healthy",
            Scenario::NoAgent => "no-agent",
            Scenario::StalledAgent => "stalled-agent",
            Scenario::NoCamera => "no-camera",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "healthy" => Some(Scenario::Healthy),
            "no-agent" => Some(Scenario::NoAgent),
            "stalled-agent" => Some(Scenario::StalledAgent),
            "no-camera" => Some(Scenario::NoCamera),
            _ => None,
        }
    }

    pub fn all() -> Vec<Scenario> {
        vec![
            Scenario::Healthy,
            Scenario::NoAgent,
            Scenario::StalledAgent,
            Scenario::NoCamera,
        ]
    }
}

#[derive(Debug, Clone, Copy)]
struct Timing {
    join: Duration,
    ready: Duration,
    think: Duration,
    word: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            join: Duration::from_millis(1500),
            ready: Duration::from_millis(600),
            think: Duration::from_millis(800),
            word: Duration::from_millis(120),
        }
    }
}

#[derive(Default)]
struct Inner {
    events: Option<EngineEvents>,
    participants: Vec<Participant>,
    devices: HashMap<TrackSource, bool>,
    tasks: Vec<JoinHandle<()>>,
    replies: u64,
}

pub struct SimulatedEngine {
    scenario: Scenario,
    timing: Timing,
    inner: Arc<Mutex<Inner>>,
}

impl SimulatedEngine {
    pub fn new(scenario: Scenario) -> Self {
        Self {
            scenario,
            timing: Timing::default(),
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    pub fn scenario(&self) -> Scenario {
        self.scenario
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn spawn(&self, task: impl std::future::Future<Output = ()> + Send + 'static) {
        let handle = tokio::spawn(task);
        self.inner().tasks.push(handle);
    }

    fn spawn_reply(&self, events: EngineEvents, text: String) {
        let id = {
            let mut inner = self.inner();
            inner.replies += 1;
            format!("agent-reply-{}", inner.replies)
        };
        let timing = self.timing;
        self.spawn(async move {
            let _ = events.send(EngineEvent::StateChanged(CallState::Thinking));
            tokio::time::sleep(timing.think).await;
            speak(&events, &id, &text, timing.word).await;
        });
    }
}

/// Stream `text` as growing interim segments, then a final one.
async fn speak(events: &EngineEvents, id: &str, text: &str, word_delay: Duration) {
    let _ = events.send(EngineEvent::StateChanged(CallState::Speaking));
    let first_received = Utc::now();
    let words: Vec<&str> = text.split_whitespace().collect();

    for n in 1..=words.len() {
        let segment = TranscriptionSegment {
            id: id.to_string(),
            author: ChatAuthor::Remote,
            text: words[..n].join(" "),
            first_received,
            is_final: n == words.len(),
        };
        if events.send(EngineEvent::Transcription(segment)).is_err() {
            return;
        }
        tokio::time::sleep(word_delay).await;
    }

    let _ = events.send(EngineEvent::StateChanged(CallState::Listening));
}

fn reply_to(text: &str) -> String {
    format!("You said \"{}\". Tell me more and I'll do my best to help.", text.trim())
}

#[async_trait]
impl RtcEngine for SimulatedEngine {
    async fn connect(&self, events: EngineEvents) -> Result<(), EngineError> {
        {
            let mut inner = self.inner();
            if inner.events.is_some() {
                return Err(EngineError::Connection("already connected".to_string()));
            }
            inner.events = Some(events.clone());
            inner.participants.clear();
            inner.devices.clear();
        }

        tracing::info!(scenario = self.scenario.as_str(), "simulated engine connecting");
        let _ = events.send(EngineEvent::StateChanged(CallState::Connecting));

        if self.scenario == Scenario::NoAgent {
            return Ok(());
        }

        let scenario = self.scenario;
        let timing = self.timing;
        let inner = self.inner.clone();
        self.spawn(async move {
            tokio::time::sleep(timing.join).await;

            let agent = Participant {
                identity: AGENT_IDENTITY.to_string(),
                is_agent: true,
                is_local: false,
            };
            inner
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .participants
                .push(agent.clone());

            let _ = events.send(EngineEvent::ParticipantJoined(agent));
            let _ = events.send(EngineEvent::StateChanged(CallState::Initializing));
            if scenario == Scenario::StalledAgent {
                return;
            }

            for source in [TrackSource::Microphone, TrackSource::Camera] {
                let _ = events.send(EngineEvent::TrackPublished(TrackPublication {
                    source,
                    participant: AGENT_IDENTITY.to_string(),
                    muted: false,
                }));
            }

            tokio::time::sleep(timing.ready).await;
            let _ = events.send(EngineEvent::StateChanged(CallState::Listening));
            speak(&events, "agent-greeting", GREETING, timing.word).await;
        });

        Ok(())
    }

    async fn disconnect(&self) {
        let events = {
            let mut inner = self.inner();
            for task in inner.tasks.drain(..) {
                task.abort();
            }
            inner.participants.clear();
            inner.devices.clear();
            inner.events.take()
        };

        if let Some(events) = events {
            tracing::info!("simulated engine disconnected");
            let _ = events.send(EngineEvent::StateChanged(CallState::Disconnected));
            let _ = events.send(EngineEvent::Disconnected);
        }
    }

    async fn set_device_enabled(&self, source: TrackSource, enabled: bool) -> Result<bool, EngineError> {
        let events = self.inner().events.clone().ok_or(EngineError::NotConnected)?;

        if enabled && source == TrackSource::Camera && self.scenario == Scenario::NoCamera {
            return Err(DeviceError::new(source, "no camera found").into());
        }

        let previously = self.inner().devices.insert(source, enabled);
        let event = match previously {
            None => EngineEvent::TrackPublished(TrackPublication {
                source,
                participant: LOCAL_IDENTITY.to_string(),
                muted: !enabled,
            }),
            Some(_) => EngineEvent::TrackMuted {
                source,
                participant: LOCAL_IDENTITY.to_string(),
                muted: !enabled,
            },
        };
        let _ = events.send(event);
        Ok(enabled)
    }

    async fn send_chat_message(&self, text: &str) -> Result<ChatMessage, EngineError> {
        let events = self.inner().events.clone().ok_or(EngineError::NotConnected)?;
        let message = ChatMessage::local(text);

        if self.scenario != Scenario::NoAgent && self.scenario != Scenario::StalledAgent {
            self.spawn_reply(events, reply_to(text));
        }
        Ok(message)
    }

    fn remote_participants(&self) -> Vec<Participant> {
        self.inner()
            .participants
            .iter()
            .filter(|p| !p.is_local)
            .cloned()
            .collect()
    }

    fn local_identity(&self) -> String {
        LOCAL_IDENTITY.to_string()
    }
}
