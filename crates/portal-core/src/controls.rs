//! Call control bar: microphone, camera, screen share, chat and leave.
//!
//! Device toggles go through the engine and only change local state once the
//! engine answers. The chat panel is purely local.

use crate::engine::RtcEngine;
use crate::error::{DeviceError, EngineError};
use crate::session::SessionController;
use crate::state::{SessionConfig, TrackSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceControl {
    pub enabled: bool,
    pub pending: bool,
    pub available: bool,
}

impl Default for DeviceControl {
    fn default() -> Self {
        Self {
            enabled: false,
            pending: false,
            available: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibleControls {
    pub microphone: bool,
    pub camera: bool,
    pub screen_share: bool,
    pub chat: bool,
    pub leave: bool,
}

impl VisibleControls {
    pub fn for_capabilities(capabilities: &SessionConfig) -> Self {
        Self {
            microphone: true,
            camera: capabilities.supports_video_input,
            screen_share: capabilities.supports_screen_share,
            chat: capabilities.supports_chat_input,
            leave: true,
        }
    }

    pub fn shows(&self, source: TrackSource) -> bool {
        match source {
            TrackSource::Microphone => self.microphone,
            TrackSource::Camera => self.camera,
            TrackSource::ScreenShare => self.screen_share,
        }
    }
}

type DeviceErrorHandler = Box<dyn Fn(&DeviceError) + Send>;

pub struct ControlBar {
    visible: VisibleControls,
    microphone: DeviceControl,
    camera: DeviceControl,
    screen_share: DeviceControl,
    chat_open: bool,
    agent_present: bool,
    avatar_visible: bool,
    initial_unmute_done: bool,
    on_device_error: DeviceErrorHandler,
}

impl ControlBar {
    pub fn new(capabilities: &SessionConfig, on_device_error: impl Fn(&DeviceError) + Send + 'static) -> Self {
        Self {
            visible: VisibleControls::for_capabilities(capabilities),
            microphone: DeviceControl::default(),
            camera: DeviceControl::default(),
            screen_share: DeviceControl::default(),
            chat_open: false,
            agent_present: false,
            avatar_visible: false,
            initial_unmute_done: false,
            on_device_error: Box::new(on_device_error),
        }
    }

    /// Back to the initial state for a fresh session.
    pub fn reset(&mut self) {
        self.microphone = DeviceControl::default();
        self.camera = DeviceControl::default();
        self.screen_share = DeviceControl::default();
        self.chat_open = false;
        self.agent_present = false;
        self.avatar_visible = false;
        self.initial_unmute_done = false;
    }

    pub fn visible(&self) -> VisibleControls {
        self.visible
    }

    pub fn device(&self, source: TrackSource) -> DeviceControl {
        match source {
            TrackSource::Microphone => self.microphone,
            TrackSource::Camera => self.camera,
            TrackSource::ScreenShare => self.screen_share,
        }
    }

    fn device_mut(&mut self, source: TrackSource) -> &mut DeviceControl {
        match source {
            TrackSource::Microphone => &mut self.microphone,
            TrackSource::Camera => &mut self.camera,
            TrackSource::ScreenShare => &mut self.screen_share,
        }
    }

    /// Whether the toggle for `source` accepts input right now.
    pub fn can_toggle(&self, source: TrackSource) -> bool {
        let control = self.device(source);
        let allowed = match source {
            // The microphone opens up once the agent's avatar is on screen.
            TrackSource::Microphone => self.avatar_visible,
            _ => true,
        };
        self.visible.shows(source) && !control.pending && allowed
    }

    /// Feed in what the room currently looks like.
    ///
    /// The first time the avatar shows up the microphone is switched on.
    pub async fn sync_room(&mut self, engine: &dyn RtcEngine, agent_present: bool, avatar_visible: bool) {
        self.agent_present = agent_present;
        self.avatar_visible = avatar_visible;
        if !agent_present {
            self.chat_open = false;
        }

        if avatar_visible && !self.initial_unmute_done {
            self.initial_unmute_done = true;
            self.set_device(engine, TrackSource::Microphone, true).await;
        }
    }

    /// Flip a device. Returns false if the toggle was not accepted.
    pub async fn toggle_device(&mut self, engine: &dyn RtcEngine, source: TrackSource) -> bool {
        if !self.can_toggle(source) {
            return false;
        }
        let want = !self.device(source).enabled;
        self.set_device(engine, source, want).await;
        true
    }

    async fn set_device(&mut self, engine: &dyn RtcEngine, source: TrackSource, enabled: bool) {
        self.device_mut(source).pending = true;
        let result = engine.set_device_enabled(source, enabled).await;

        let control = self.device_mut(source);
        control.pending = false;
        match result {
            Ok(now_enabled) => {
                control.enabled = now_enabled;
                control.available = true;
                tracing::debug!(device = source.display_name(), enabled = now_enabled, "device toggled");
            }
            Err(e) => {
                control.available = false;
                let error = match e {
                    EngineError::Device(device_error) => device_error,
                    other => DeviceError::new(source, other.to_string()),
                };
                tracing::warn!("{}", error);
                (self.on_device_error)(&error);
            }
        }
    }

    /// Open or close the chat panel. Needs an agent in the room.
    pub fn toggle_chat(&mut self) -> bool {
        if !self.visible.chat || !self.agent_present {
            return false;
        }
        self.chat_open = !self.chat_open;
        true
    }

    pub fn chat_open(&self) -> bool {
        self.chat_open
    }

    /// Typing is possible only with the panel open, an agent to talk to and
    /// no send outstanding.
    pub fn chat_input_enabled(&self, sending: bool) -> bool {
        self.chat_open && self.agent_present && !sending
    }

    /// End the call. Nothing else runs on the event loop until the engine
    /// has disconnected.
    pub async fn leave(&mut self, session: &mut SessionController) -> bool {
        if !self.visible.leave {
            return false;
        }
        session.leave().await;
        self.chat_open = false;
        true
    }
}
