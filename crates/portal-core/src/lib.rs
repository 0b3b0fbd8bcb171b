pub mod config;
pub mod controls;
pub mod credentials;
pub mod engine;
pub mod error;
pub mod feed;
pub mod session;
pub mod state;
pub mod theme;
pub mod tiles;
pub mod watchdog;

// Re-export main types for convenience
pub use config::{Config, Credentials};
pub use controls::{ControlBar, DeviceControl, VisibleControls};
pub use credentials::{CredentialGate, LoginOutcome, INVALID_CREDENTIALS};
pub use engine::{EngineEvent, RtcEngine, Scenario, SimulatedEngine};
pub use error::{DeviceError, EngineError, SendError};
pub use feed::ChatFeed;
pub use session::{SessionController, SessionEvent, SessionEvents, SessionNotice, SessionUpdate};
pub use state::{CallState, ChatAuthor, ChatMessage, SessionConfig, TrackSource};
pub use theme::{FilePreferences, ThemeMode, ThemeStore};
