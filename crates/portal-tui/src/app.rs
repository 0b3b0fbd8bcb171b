use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use portal_core::engine::RtcEngine;
use portal_core::session::{EndReason, SessionEvent, SessionEvents, SessionNotice, SessionUpdate};
use portal_core::{
    Config, ControlBar, CredentialGate, DeviceError, LoginOutcome, SendError, SessionController,
    ThemeStore, TrackSource, INVALID_CREDENTIALS,
};

use crate::landing::Landing;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Landing,
    Session,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoginField {
    #[default]
    Username,
    Password,
}

#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub show_password: bool,
    pub focus: LoginField,
    pub error: Option<String>,
    pub loading: bool,
}

impl LoginForm {
    pub fn focused_mut(&mut self) -> &mut String {
        match self.focus {
            LoginField::Username => &mut self.username,
            LoginField::Password => &mut self.password,
        }
    }

    pub fn switch_focus(&mut self) {
        self.focus = match self.focus {
            LoginField::Username => LoginField::Password,
            LoginField::Password => LoginField::Username,
        };
    }
}

/// A message floating over whatever screen is shown
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub title: String,
    pub body: String,
    pub link: Option<(String, String)>,
}

impl From<SessionNotice> for Toast {
    fn from(notice: SessionNotice) -> Self {
        Self {
            title: notice.title,
            body: notice.reason,
            link: Some((notice.link_text, notice.link)),
        }
    }
}

impl Toast {
    pub fn error(title: &str, body: impl Into<String>) -> Self {
        Self {
            title: title.to_string(),
            body: body.into(),
            link: None,
        }
    }
}

pub struct App {
    pub should_quit: bool,
    pub screen: Screen,
    pub input_mode: InputMode,

    // Landing
    pub landing: Landing,
    pub start_button_text: String,
    pub show_login: bool,
    pub login: LoginForm,
    pub login_task: Option<JoinHandle<LoginOutcome>>,
    gate: CredentialGate,

    // Session
    pub session: SessionController,
    pub session_events: Option<SessionEvents>,
    pub controls: ControlBar,
    pub chat_input: String,
    pub chat_status: Option<String>,
    device_errors: mpsc::UnboundedReceiver<DeviceError>,

    pub theme: ThemeStore,
    pub toast: Option<Toast>,
    pub animation_frame: u8,
}

impl App {
    pub fn new(config: &Config, mut theme: ThemeStore, engine: Arc<dyn RtcEngine>) -> Self {
        theme.subscribe(|mode| tracing::info!(mode = mode.as_str(), "theme changed"));

        let (device_tx, device_errors) = mpsc::unbounded_channel();
        let controls = ControlBar::new(&config.capabilities, move |error: &DeviceError| {
            let _ = device_tx.send(error.clone());
        });

        Self {
            should_quit: false,
            screen: Screen::Landing,
            input_mode: InputMode::Normal,

            landing: Landing::new(Instant::now()),
            start_button_text: config.start_button_text.clone(),
            show_login: false,
            login: LoginForm::default(),
            login_task: None,
            gate: CredentialGate::new(config.credentials.clone(), config.login_delay()),

            session: SessionController::new(engine, config.capabilities, config.watchdog_delay()),
            session_events: None,
            controls,
            chat_input: String::new(),
            chat_status: None,
            device_errors,

            theme,
            toast: None,
            animation_frame: 0,
        }
    }

    /// The landing page ignores the start button while a login is pending or
    /// a call is up.
    pub fn landing_disabled(&self) -> bool {
        self.login.loading || self.session.is_active()
    }

    pub fn open_login(&mut self) {
        if self.screen != Screen::Landing || self.landing_disabled() {
            return;
        }
        self.show_login = true;
        self.login = LoginForm::default();
    }

    pub fn close_login(&mut self) {
        if let Some(task) = self.login_task.take() {
            task.abort();
        }
        self.show_login = false;
        self.login = LoginForm::default();
    }

    pub fn submit_login(&mut self) {
        if self.login.loading {
            return;
        }
        self.login.loading = true;
        self.login.error = None;

        let gate = self.gate.clone();
        let username = self.login.username.clone();
        let password = self.login.password.clone();
        self.login_task = Some(tokio::spawn(async move {
            gate.attempt(&username, &password).await
        }));
    }

    pub async fn on_login_finished(&mut self, outcome: LoginOutcome) {
        self.login_task = None;
        self.login.loading = false;

        if outcome.is_success() {
            self.show_login = false;
            self.login = LoginForm::default();
            self.start_session().await;
        } else {
            self.login.password.clear();
            self.login.error = Some(INVALID_CREDENTIALS.to_string());
        }
    }

    pub async fn start_session(&mut self) {
        self.controls.reset();
        self.chat_input.clear();
        self.chat_status = None;
        self.input_mode = InputMode::Normal;

        match self.session.start().await {
            Ok(events) => {
                self.session_events = Some(events);
                self.screen = Screen::Session;
                self.toast = None;
            }
            Err(e) => {
                self.session_events = None;
                self.toast = Some(Toast::error("Could not start the call", e.to_string()));
            }
        }
    }

    pub async fn on_session_event(&mut self, event: Option<SessionEvent>) {
        let Some(event) = event else {
            self.session_events = None;
            return;
        };

        match self.session.handle_event(event) {
            SessionUpdate::Changed => self.sync_controls().await,
            SessionUpdate::SendFailed(e) => self.chat_status = Some(e.to_string()),
            SessionUpdate::Ended(reason) => self.on_session_ended(reason),
            SessionUpdate::Ignored => {}
        }
    }

    async fn sync_controls(&mut self) {
        let agent_present = self.session.agent_present();
        let avatar_visible = self.session.agent_video_present();
        self.controls
            .sync_room(self.session.engine(), agent_present, avatar_visible)
            .await;

        if !self.controls.chat_open() && self.input_mode == InputMode::Editing {
            self.input_mode = InputMode::Normal;
        }
    }

    pub async fn on_watchdog_expired(&mut self) {
        self.drain_session_events().await;
        if let Some(notice) = self.session.on_watchdog_expired().await {
            self.toast = Some(notice.into());
            self.on_session_ended(EndReason::AgentUnavailable);
        }
    }

    /// Apply everything already queued, so a ready state that arrived
    /// alongside the deadline is seen before the verdict.
    async fn drain_session_events(&mut self) {
        // let the forwarder hand over what the engine has sent
        tokio::task::yield_now().await;
        loop {
            let Some(rx) = self.session_events.as_mut() else {
                break;
            };
            let Ok(event) = rx.try_recv() else {
                break;
            };
            self.on_session_event(Some(event)).await;
        }
    }

    fn on_session_ended(&mut self, reason: EndReason) {
        tracing::info!(?reason, "back to landing");
        if reason == EndReason::RemoteDisconnect && self.toast.is_none() {
            self.toast = Some(Toast::error("Session ended", "The connection to the room was closed."));
        }
        self.session_events = None;
        self.input_mode = InputMode::Normal;
        self.screen = Screen::Landing;
        self.landing.restart(Instant::now());
    }

    pub async fn leave(&mut self) {
        if self.controls.leave(&mut self.session).await {
            self.on_session_ended(EndReason::Left);
        }
    }

    pub async fn toggle_device(&mut self, source: TrackSource) {
        self.controls.toggle_device(self.session.engine(), source).await;
    }

    pub fn toggle_chat(&mut self) {
        self.controls.toggle_chat();
        if !self.controls.chat_open() {
            self.input_mode = InputMode::Normal;
        }
    }

    pub fn chat_input_enabled(&self) -> bool {
        self.controls.chat_input_enabled(self.session.is_sending())
    }

    pub fn send_chat(&mut self) {
        if !self.chat_input_enabled() {
            return;
        }
        match self.session.send_message(&self.chat_input) {
            Ok(()) => {
                self.chat_input.clear();
                self.chat_status = None;
            }
            Err(SendError::Empty) => {}
            Err(e) => self.chat_status = Some(e.to_string()),
        }
    }

    pub fn toggle_theme(&mut self) {
        if let Err(e) = self.theme.toggle() {
            tracing::error!("failed to save theme: {}", e);
            self.toast = Some(Toast::error("Theme not saved", e.to_string()));
        }
    }

    pub fn tick(&mut self) {
        let now = Instant::now();
        self.landing.tick(now);
        self.animation_frame = self.animation_frame.wrapping_add(1);
        if let Err(e) = self.theme.sync() {
            tracing::warn!("could not re-read theme preference: {}", e);
        }
    }

    /// Surface device failures reported by the control bar.
    pub fn drain_device_errors(&mut self) {
        while let Ok(error) = self.device_errors.try_recv() {
            self.toast = Some(Toast::error("Device unavailable", error.to_string()));
        }
    }

    pub fn dismiss_toast(&mut self) -> bool {
        self.toast.take().is_some()
    }

    pub async fn shutdown(&mut self) {
        if let Some(task) = self.login_task.take() {
            task.abort();
        }
        if self.session.is_active() {
            self.session.leave().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_core::engine::{EngineEvent, Scenario, SimulatedEngine};
    use portal_core::theme::MemoryPreferences;
    use std::time::Duration;

    fn app(scenario: Scenario) -> App {
        let config = Config::default();
        let theme = ThemeStore::load(MemoryPreferences::new());
        App::new(&config, theme, Arc::new(SimulatedEngine::new(scenario)))
    }

    async fn finish_login(app: &mut App) {
        let task = app.login_task.take().unwrap();
        let outcome = task.await.unwrap();
        app.on_login_finished(outcome).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_wrong_password_shows_inline_error() {
        let mut app = app(Scenario::Healthy);
        app.open_login();
        app.login.username = "portal".to_string();
        app.login.password = "nope".to_string();
        app.submit_login();
        assert!(app.login.loading);
        assert!(app.landing_disabled());

        finish_login(&mut app).await;

        assert!(app.show_login);
        assert_eq!(app.login.error.as_deref(), Some(INVALID_CREDENTIALS));
        assert_eq!(app.screen, Screen::Landing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_starts_session() {
        let mut app = app(Scenario::Healthy);
        app.open_login();
        app.login.username = "portal".to_string();
        app.login.password = "portal".to_string();
        app.submit_login();
        finish_login(&mut app).await;

        assert!(!app.show_login);
        assert_eq!(app.screen, Screen::Session);
        assert!(app.session.is_active());
        assert!(app.session_events.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_watchdog_returns_to_landing_with_notice() {
        let mut app = app(Scenario::NoAgent);
        app.start_session().await;

        tokio::time::advance(Duration::from_secs(20)).await;
        app.on_watchdog_expired().await;

        assert_eq!(app.screen, Screen::Landing);
        let toast = app.toast.clone().unwrap();
        assert_eq!(toast.body, "Agent did not join the room.");
        assert!(toast.link.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_queued_ready_state_beats_deadline() {
        let mut app = app(Scenario::Healthy);
        app.start_session().await;

        // The agent gets ready early but nobody drains the queue before the deadline
        tokio::time::sleep(Duration::from_secs(3)).await;
        tokio::time::advance(Duration::from_secs(17)).await;
        app.on_watchdog_expired().await;

        assert_eq!(app.screen, Screen::Session);
        assert!(app.toast.is_none());
        assert!(app.session.is_active());
        assert!(app.session.call_state().is_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_disconnect_returns_to_landing() {
        let mut app = app(Scenario::Healthy);
        app.start_session().await;

        app.on_session_event(Some(SessionEvent::Engine(EngineEvent::Disconnected))).await;

        assert_eq!(app.screen, Screen::Landing);
        assert!(app.session_events.is_none());
        assert_eq!(app.toast.unwrap().title, "Session ended");
    }

    #[tokio::test(start_paused = true)]
    async fn test_leave_goes_back_to_landing() {
        let mut app = app(Scenario::Healthy);
        app.start_session().await;
        app.leave().await;

        assert_eq!(app.screen, Screen::Landing);
        assert!(!app.session.is_active());
        assert!(app.toast.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_camera_failure_raises_toast() {
        let mut app = app(Scenario::NoCamera);
        app.start_session().await;
        app.toggle_device(TrackSource::Camera).await;
        app.drain_device_errors();

        let toast = app.toast.unwrap();
        assert_eq!(toast.title, "Device unavailable");
        assert!(toast.body.contains("Camera"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_button_ignored_while_in_call() {
        let mut app = app(Scenario::Healthy);
        app.start_session().await;
        app.open_login();
        assert!(!app.show_login);
    }
}
