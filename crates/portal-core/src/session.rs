//! Call session lifecycle.
//!
//! [`SessionController`] owns one call from start to teardown: it connects
//! the engine, tracks call state, participants and publications, keeps the
//! merged chat feed and enforces the agent-readiness watchdog. It is driven
//! from a single event loop: engine events and send completions come back
//! over the channel returned by [`SessionController::start`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::engine::{EngineEvent, RtcEngine};
use crate::error::{EngineError, SendError};
use crate::feed::ChatFeed;
use crate::state::{CallState, ChatMessage, Participant, SessionConfig, TrackPublication, TrackSource};
use crate::watchdog::Watchdog;

pub const QUICKSTART_URL: &str = "https://docs.livekit.io/agents/start/voice-ai/";

#[derive(Debug)]
pub enum SessionEvent {
    Engine(EngineEvent),
    SendCompleted(Result<ChatMessage, EngineError>),
}

pub type SessionEvents = mpsc::UnboundedReceiver<SessionEvent>;

/// User-facing explanation of why a session was ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionNotice {
    pub title: String,
    pub reason: String,
    pub link_text: String,
    pub link: String,
}

impl SessionNotice {
    pub fn agent_unavailable(state: CallState) -> Self {
        let reason = if state == CallState::Connecting {
            "Agent did not join the room."
        } else {
            "Agent connected but did not complete initializing."
        };
        Self {
            title: "Session ended".to_string(),
            reason: reason.to_string(),
            link_text: "See quickstart guide".to_string(),
            link: QUICKSTART_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    Left,
    AgentUnavailable,
    RemoteDisconnect,
    ConnectFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Active,
    Ended(EndReason),
}

/// What a handled event means for the UI
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    Changed,
    SendFailed(SendError),
    Ended(EndReason),
    Ignored,
}

pub struct SessionController {
    engine: Arc<dyn RtcEngine>,
    capabilities: SessionConfig,
    phase: SessionPhase,
    call_state: CallState,
    watchdog: Watchdog,
    feed: ChatFeed,
    participants: Vec<Participant>,
    publications: Vec<TrackPublication>,
    local_identity: String,
    sending: bool,
    notice: Option<SessionNotice>,
    events: Option<mpsc::UnboundedSender<SessionEvent>>,
    forwarder: Option<JoinHandle<()>>,
}

impl SessionController {
    pub fn new(engine: Arc<dyn RtcEngine>, capabilities: SessionConfig, watchdog_delay: Duration) -> Self {
        let local_identity = engine.local_identity();
        Self {
            engine,
            capabilities,
            phase: SessionPhase::Idle,
            call_state: CallState::Disconnected,
            watchdog: Watchdog::new(watchdog_delay),
            feed: ChatFeed::new(),
            participants: Vec::new(),
            publications: Vec::new(),
            local_identity,
            sending: false,
            notice: None,
            events: None,
            forwarder: None,
        }
    }

    /// Connect and arm the watchdog.
    ///
    /// Returns the receiver the event loop must drain into
    /// [`handle_event`](Self::handle_event). Starting while a session is
    /// active tears the old one down first; its events are not delivered.
    pub async fn start(&mut self) -> Result<SessionEvents, EngineError> {
        if self.is_active() {
            self.teardown().await;
        } else {
            self.detach();
        }

        self.feed.clear();
        self.participants.clear();
        self.publications.clear();
        self.notice = None;
        self.sending = false;
        self.call_state = CallState::Connecting;

        let (session_tx, session_rx) = mpsc::unbounded_channel();
        let (engine_tx, mut engine_rx) = mpsc::unbounded_channel();

        let forward_tx = session_tx.clone();
        self.forwarder = Some(tokio::spawn(async move {
            while let Some(event) = engine_rx.recv().await {
                if forward_tx.send(SessionEvent::Engine(event)).is_err() {
                    break;
                }
            }
        }));
        self.events = Some(session_tx);

        if let Err(e) = self.engine.connect(engine_tx).await {
            tracing::error!("failed to connect: {}", e);
            self.teardown().await;
            self.phase = SessionPhase::Ended(EndReason::ConnectFailed);
            return Err(e);
        }

        self.watchdog.arm();
        self.phase = SessionPhase::Active;
        tracing::info!(
            watchdog_secs = self.watchdog.delay().as_secs(),
            "session started"
        );
        Ok(session_rx)
    }

    pub fn handle_event(&mut self, event: SessionEvent) -> SessionUpdate {
        match event {
            SessionEvent::SendCompleted(result) => {
                self.sending = false;
                match result {
                    Ok(message) => {
                        if self.is_active() {
                            self.feed.push(message);
                        }
                        SessionUpdate::Changed
                    }
                    Err(e) => {
                        tracing::warn!("chat message not sent: {}", e);
                        SessionUpdate::SendFailed(SendError::Engine(e))
                    }
                }
            }
            SessionEvent::Engine(event) => {
                if !self.is_active() {
                    return SessionUpdate::Ignored;
                }
                self.apply_engine_event(event)
            }
        }
    }

    fn apply_engine_event(&mut self, event: EngineEvent) -> SessionUpdate {
        match event {
            EngineEvent::StateChanged(state) => self.set_call_state(state),
            EngineEvent::ParticipantJoined(participant) => {
                tracing::info!(identity = %participant.identity, agent = participant.is_agent, "participant joined");
                self.participants.retain(|p| p.identity != participant.identity);
                self.participants.push(participant);
            }
            EngineEvent::ParticipantLeft(identity) => {
                tracing::info!(identity = %identity, "participant left");
                self.participants.retain(|p| p.identity != identity);
                self.publications.retain(|p| p.participant != identity);
            }
            EngineEvent::TrackPublished(publication) => {
                self.publications
                    .retain(|p| !(p.source == publication.source && p.participant == publication.participant));
                self.publications.push(publication);
            }
            EngineEvent::TrackMuted { source, participant, muted } => {
                if let Some(p) = self
                    .publications
                    .iter_mut()
                    .find(|p| p.source == source && p.participant == participant)
                {
                    p.muted = muted;
                }
            }
            EngineEvent::TrackUnpublished { source, participant } => {
                self.publications
                    .retain(|p| !(p.source == source && p.participant == participant));
            }
            EngineEvent::Transcription(segment) => self.feed.apply_segment(segment),
            EngineEvent::ChatReceived(message) => self.feed.push(message),
            EngineEvent::Disconnected => {
                tracing::info!("engine reported disconnect");
                self.phase = SessionPhase::Ended(EndReason::RemoteDisconnect);
                self.detach();
                let engine = self.engine.clone();
                tokio::spawn(async move { engine.disconnect().await });
                return SessionUpdate::Ended(EndReason::RemoteDisconnect);
            }
        }
        SessionUpdate::Changed
    }

    fn set_call_state(&mut self, state: CallState) {
        if state != self.call_state {
            tracing::debug!(from = self.call_state.as_str(), to = state.as_str(), "call state");
        }
        self.call_state = state;
        if state.is_ready() && self.watchdog.is_armed() {
            self.watchdog.disarm();
            tracing::info!("agent ready");
        }
    }

    /// Deadline for the event loop to sleep on, if the watchdog is armed.
    pub fn watchdog_deadline(&self) -> Option<Instant> {
        self.watchdog.deadline()
    }

    /// Called when the watchdog deadline passes.
    ///
    /// Ends the session and returns the notice if the agent is not ready.
    /// Returns `None` for a stale or already handled expiry.
    pub async fn on_watchdog_expired(&mut self) -> Option<SessionNotice> {
        if !self.is_active() || !self.watchdog.is_expired(Instant::now()) {
            return None;
        }
        self.watchdog.disarm();
        if self.call_state.is_ready() {
            return None;
        }

        let notice = SessionNotice::agent_unavailable(self.call_state);
        tracing::warn!(state = self.call_state.as_str(), reason = %notice.reason, "agent unavailable, ending session");
        self.phase = SessionPhase::Ended(EndReason::AgentUnavailable);
        self.teardown().await;
        self.notice = Some(notice.clone());
        Some(notice)
    }

    /// Forward a chat message to the engine.
    ///
    /// Only one send may be outstanding; the result arrives later as
    /// [`SessionEvent::SendCompleted`].
    pub fn send_message(&mut self, text: &str) -> Result<(), SendError> {
        if text.trim().is_empty() {
            return Err(SendError::Empty);
        }
        if self.sending {
            return Err(SendError::InFlight);
        }
        let events = match (&self.events, self.is_active()) {
            (Some(events), true) => events.clone(),
            _ => return Err(SendError::NoSession),
        };

        self.sending = true;
        let engine = self.engine.clone();
        let text = text.to_string();
        tokio::spawn(async move {
            let result = engine.send_chat_message(&text).await;
            let _ = events.send(SessionEvent::SendCompleted(result));
        });
        Ok(())
    }

    /// End the call at the user's request.
    pub async fn leave(&mut self) {
        if self.is_active() {
            tracing::info!("leaving session");
            self.phase = SessionPhase::Ended(EndReason::Left);
        }
        self.teardown().await;
    }

    async fn teardown(&mut self) {
        self.engine.disconnect().await;
        self.detach();
    }

    /// Drop every subscription to the engine.
    fn detach(&mut self) {
        self.watchdog.disarm();
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
        self.events = None;
        self.sending = false;
        self.call_state = CallState::Disconnected;
    }

    pub fn engine(&self) -> &dyn RtcEngine {
        self.engine.as_ref()
    }

    pub fn capabilities(&self) -> SessionConfig {
        self.capabilities
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.phase == SessionPhase::Active
    }

    pub fn call_state(&self) -> CallState {
        self.call_state
    }

    pub fn is_sending(&self) -> bool {
        self.sending
    }

    /// The merged transcript, oldest first.
    pub fn feed(&self) -> impl Iterator<Item = &ChatMessage> + '_ {
        self.feed.iter()
    }

    pub fn feed_is_empty(&self) -> bool {
        self.feed.is_empty()
    }

    pub fn notice(&self) -> Option<&SessionNotice> {
        self.notice.as_ref()
    }

    pub fn agent_present(&self) -> bool {
        self.participants.iter().any(|p| p.is_agent)
    }

    /// The agent publishes video, i.e. it is rendered as an avatar.
    pub fn agent_video_present(&self) -> bool {
        self.publications.iter().any(|p| {
            p.source == TrackSource::Camera
                && self
                    .participants
                    .iter()
                    .any(|a| a.is_agent && a.identity == p.participant)
        })
    }

    /// A local track of this kind is published and unmuted.
    pub fn local_track_enabled(&self, source: TrackSource) -> bool {
        self.publications
            .iter()
            .any(|p| p.source == source && p.participant == self.local_identity && !p.muted)
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineEvents;
    use crate::state::{ChatAuthor, TranscriptionSegment};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Engine whose events are pushed by the test.
    #[derive(Default)]
    struct ScriptedEngine {
        events: Mutex<Option<EngineEvents>>,
        sends: AtomicUsize,
        disconnects: AtomicUsize,
    }

    impl ScriptedEngine {
        fn emit(&self, event: EngineEvent) {
            if let Some(tx) = self.events.lock().unwrap().as_ref() {
                tx.send(event).unwrap();
            }
        }
    }

    #[async_trait]
    impl RtcEngine for ScriptedEngine {
        async fn connect(&self, events: EngineEvents) -> Result<(), EngineError> {
            *self.events.lock().unwrap() = Some(events);
            Ok(())
        }

        async fn disconnect(&self) {
            self.disconnects.fetch_add(1, Ordering::SeqCst);
            self.events.lock().unwrap().take();
        }

        async fn set_device_enabled(&self, _source: TrackSource, enabled: bool) -> Result<bool, EngineError> {
            Ok(enabled)
        }

        async fn send_chat_message(&self, text: &str) -> Result<ChatMessage, EngineError> {
            self.sends.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(ChatMessage::local(text))
        }

        fn remote_participants(&self) -> Vec<Participant> {
            Vec::new()
        }

        fn local_identity(&self) -> String {
            "me".to_string()
        }
    }

    fn controller(engine: Arc<ScriptedEngine>) -> SessionController {
        SessionController::new(engine, SessionConfig::default(), Duration::from_secs(20))
    }

    async fn pump(session: &mut SessionController, rx: &mut SessionEvents) {
        // let the forwarder task drain the engine channel
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
        while let Ok(event) = rx.try_recv() {
            session.handle_event(event);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_before_deadline_produces_no_notice() {
        let engine = Arc::new(ScriptedEngine::default());
        let mut session = controller(engine.clone());
        let mut rx = session.start().await.unwrap();

        tokio::time::advance(Duration::from_secs(5)).await;
        engine.emit(EngineEvent::StateChanged(CallState::Listening));
        pump(&mut session, &mut rx).await;

        assert!(session.watchdog_deadline().is_none());
        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(session.on_watchdog_expired().await, None);
        assert!(session.is_active());
        assert_eq!(engine.disconnects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_agent_never_joined() {
        let engine = Arc::new(ScriptedEngine::default());
        let mut session = controller(engine.clone());
        let mut rx = session.start().await.unwrap();
        engine.emit(EngineEvent::StateChanged(CallState::Connecting));
        pump(&mut session, &mut rx).await;

        crate::watchdog::sleep_until(session.watchdog_deadline()).await;
        let notice = session.on_watchdog_expired().await.unwrap();

        assert_eq!(notice.title, "Session ended");
        assert_eq!(notice.reason, "Agent did not join the room.");
        assert_eq!(notice.link, QUICKSTART_URL);
        assert_eq!(session.phase(), SessionPhase::Ended(EndReason::AgentUnavailable));
        assert_eq!(engine.disconnects.load(Ordering::SeqCst), 1);
        assert_eq!(session.notice(), Some(&notice));
    }

    #[tokio::test(start_paused = true)]
    async fn test_agent_joined_but_not_ready() {
        let engine = Arc::new(ScriptedEngine::default());
        let mut session = controller(engine.clone());
        let mut rx = session.start().await.unwrap();
        engine.emit(EngineEvent::StateChanged(CallState::Initializing));
        pump(&mut session, &mut rx).await;

        tokio::time::advance(Duration::from_secs(20)).await;
        let notice = session.on_watchdog_expired().await.unwrap();
        assert_eq!(notice.reason, "Agent connected but did not complete initializing.");
    }

    #[tokio::test(start_paused = true)]
    async fn test_notice_is_reported_once() {
        let engine = Arc::new(ScriptedEngine::default());
        let mut session = controller(engine.clone());
        let _rx = session.start().await.unwrap();

        tokio::time::advance(Duration::from_secs(20)).await;
        assert!(session.on_watchdog_expired().await.is_some());
        assert!(session.on_watchdog_expired().await.is_none());
        assert_eq!(engine.disconnects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_early_expiry_call_is_ignored() {
        let engine = Arc::new(ScriptedEngine::default());
        let mut session = controller(engine.clone());
        let _rx = session.start().await.unwrap();

        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(session.on_watchdog_expired().await.is_none());
        assert!(session.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_messages_never_reach_engine() {
        let engine = Arc::new(ScriptedEngine::default());
        let mut session = controller(engine.clone());
        let _rx = session.start().await.unwrap();

        assert_eq!(session.send_message(""), Err(SendError::Empty));
        assert_eq!(session.send_message("   "), Err(SendError::Empty));
        assert_eq!(session.send_message("\t\n"), Err(SendError::Empty));
        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(engine.sends.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_send_in_flight() {
        let engine = Arc::new(ScriptedEngine::default());
        let mut session = controller(engine.clone());
        let mut rx = session.start().await.unwrap();

        session.send_message("hello").unwrap();
        assert_eq!(session.send_message("again"), Err(SendError::InFlight));
        assert!(session.is_sending());

        let event = rx.recv().await.unwrap();
        assert_eq!(session.handle_event(event), SessionUpdate::Changed);
        assert!(!session.is_sending());
        assert_eq!(engine.sends.load(Ordering::SeqCst), 1);
        assert_eq!(session.feed().next().unwrap().text, "hello");

        assert!(session.send_message("again").is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_without_session() {
        let engine = Arc::new(ScriptedEngine::default());
        let mut session = controller(engine);
        assert_eq!(session.send_message("hi"), Err(SendError::NoSession));
    }

    #[tokio::test(start_paused = true)]
    async fn test_feed_merges_sends_and_transcription() {
        let engine = Arc::new(ScriptedEngine::default());
        let mut session = controller(engine.clone());
        let mut rx = session.start().await.unwrap();

        let earlier = Utc::now() - chrono::Duration::seconds(30);
        session.send_message("question").unwrap();
        let completed = rx.recv().await.unwrap();
        session.handle_event(completed);

        engine.emit(EngineEvent::Transcription(TranscriptionSegment {
            id: "seg".to_string(),
            author: ChatAuthor::Remote,
            text: "greeting".to_string(),
            first_received: earlier,
            is_final: true,
        }));
        pump(&mut session, &mut rx).await;

        let texts: Vec<_> = session.feed().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["greeting", "question"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tracks_and_participants() {
        let engine = Arc::new(ScriptedEngine::default());
        let mut session = controller(engine.clone());
        let mut rx = session.start().await.unwrap();

        engine.emit(EngineEvent::ParticipantJoined(Participant {
            identity: "agent".to_string(),
            is_agent: true,
            is_local: false,
        }));
        engine.emit(EngineEvent::TrackPublished(TrackPublication {
            source: TrackSource::Camera,
            participant: "agent".to_string(),
            muted: false,
        }));
        engine.emit(EngineEvent::TrackPublished(TrackPublication {
            source: TrackSource::Camera,
            participant: "me".to_string(),
            muted: false,
        }));
        pump(&mut session, &mut rx).await;

        assert!(session.agent_present());
        assert!(session.agent_video_present());
        assert!(session.local_track_enabled(TrackSource::Camera));

        engine.emit(EngineEvent::TrackMuted {
            source: TrackSource::Camera,
            participant: "me".to_string(),
            muted: true,
        });
        engine.emit(EngineEvent::ParticipantLeft("agent".to_string()));
        pump(&mut session, &mut rx).await;

        assert!(!session.local_track_enabled(TrackSource::Camera));
        assert!(!session.agent_present());
        assert!(!session.agent_video_present());
    }

    #[tokio::test(start_paused = true)]
    async fn test_leave_disconnects_and_ignores_late_events() {
        let engine = Arc::new(ScriptedEngine::default());
        let mut session = controller(engine.clone());
        let _rx = session.start().await.unwrap();

        session.leave().await;
        assert_eq!(session.phase(), SessionPhase::Ended(EndReason::Left));
        assert!(session.watchdog_deadline().is_none());
        assert_eq!(
            session.handle_event(SessionEvent::Engine(EngineEvent::StateChanged(CallState::Listening))),
            SessionUpdate::Ignored
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_disconnect_releases_subscriptions() {
        let engine = Arc::new(ScriptedEngine::default());
        let mut session = controller(engine.clone());
        let mut rx = session.start().await.unwrap();

        engine.emit(EngineEvent::Disconnected);
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
        let event = rx.try_recv().unwrap();
        assert_eq!(
            session.handle_event(event),
            SessionUpdate::Ended(EndReason::RemoteDisconnect)
        );

        assert!(session.forwarder.is_none());
        assert!(session.events.is_none());
        assert!(session.watchdog_deadline().is_none());
        assert_eq!(session.call_state(), CallState::Disconnected);

        // the spawned disconnect runs and the receiver sees every sender gone
        assert!(rx.recv().await.is_none());
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
        assert_eq!(engine.disconnects.load(Ordering::SeqCst), 1);
        assert!(engine.events.lock().unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_clears_previous_session() {
        let engine = Arc::new(ScriptedEngine::default());
        let mut session = controller(engine.clone());
        let mut rx = session.start().await.unwrap();
        session.send_message("first").unwrap();
        let done = rx.recv().await.unwrap();
        session.handle_event(done);
        assert!(!session.feed_is_empty());

        let _rx = session.start().await.unwrap();
        assert!(session.feed_is_empty());
        assert_eq!(session.call_state(), CallState::Connecting);
        assert!(session.watchdog_deadline().is_some());
    }
}
