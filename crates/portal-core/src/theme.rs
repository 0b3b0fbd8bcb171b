//! Persisted light/dark theme with change notification.
//!
//! The store is the single writer of the `theme-mode` preference. Observers
//! register a callback and get an id back to unsubscribe with. Another
//! process sharing the preference file is picked up by [`ThemeStore::sync`].

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

pub const THEME_STORAGE_KEY: &str = "theme-mode";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    #[default]
    Light,
    Dark,
    System,
}

impl ThemeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThemeMode::Light => "light",
            ThemeMode::Dark => "dark",
            ThemeMode::System => "system",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "light" => Some(ThemeMode::Light),
            "dark" => Some(ThemeMode::Dark),
            "system" => Some(ThemeMode::System),
            _ => None,
        }
    }
}

/// Key-value storage for user preferences
pub trait PreferenceStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

/// Preferences kept in a JSON object on disk.
///
/// Every read goes to the file so writes from other processes are visible.
pub struct FilePreferences {
    path: PathBuf,
}

impl FilePreferences {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_all(&self) -> Result<HashMap<String, String>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(HashMap::new());
        }
        serde_json::from_str(&content)
            .map_err(|e| anyhow!("Invalid preferences file {}: {}", self.path.display(), e))
    }
}

impl PreferenceStore for FilePreferences {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        // A file we cannot parse is left alone rather than overwritten
        let mut all = self.read_all()?;
        all.insert(key.to_string(), value.to_string());

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&all)?)?;
        Ok(())
    }
}

/// In-memory preferences. Clones share the same map.
#[derive(Clone, Default)]
pub struct MemoryPreferences {
    values: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferences {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self.values.lock().map_err(|_| anyhow!("preferences lock poisoned"))?;
        Ok(values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.lock().map_err(|_| anyhow!("preferences lock poisoned"))?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Observer = Box<dyn Fn(ThemeMode) + Send>;

pub struct ThemeStore {
    prefs: Box<dyn PreferenceStore>,
    current: ThemeMode,
    system_dark: bool,
    observers: Vec<(SubscriptionId, Observer)>,
    next_id: u64,
}

impl ThemeStore {
    /// Load the persisted mode, falling back to light.
    pub fn load(prefs: impl PreferenceStore + 'static) -> Self {
        let current = match prefs.get(THEME_STORAGE_KEY) {
            Ok(Some(raw)) => ThemeMode::from_str(&raw).unwrap_or_else(|| {
                tracing::warn!(value = %raw, "unknown stored theme, using light");
                ThemeMode::Light
            }),
            Ok(None) => ThemeMode::Light,
            Err(e) => {
                tracing::warn!("could not read theme preference: {}", e);
                ThemeMode::Light
            }
        };

        Self {
            prefs: Box::new(prefs),
            current,
            system_dark: detect_system_dark(),
            observers: Vec::new(),
            next_id: 0,
        }
    }

    /// Override what `System` resolves to.
    pub fn with_system_dark(mut self, dark: bool) -> Self {
        self.system_dark = dark;
        self
    }

    pub fn get(&self) -> ThemeMode {
        self.current
    }

    /// The theme actually drawn: `System` resolved to light or dark.
    pub fn effective(&self) -> ThemeMode {
        match self.current {
            ThemeMode::System if self.system_dark => ThemeMode::Dark,
            ThemeMode::System => ThemeMode::Light,
            mode => mode,
        }
    }

    pub fn is_dark(&self) -> bool {
        self.effective() == ThemeMode::Dark
    }

    /// Persist `mode`, then notify observers if it changed.
    pub fn set(&mut self, mode: ThemeMode) -> Result<()> {
        self.prefs.set(THEME_STORAGE_KEY, mode.as_str())?;
        if mode != self.current {
            tracing::debug!(from = self.current.as_str(), to = mode.as_str(), "theme changed");
            self.current = mode;
            self.notify();
        }
        Ok(())
    }

    /// Flip between light and dark based on what is currently shown.
    pub fn toggle(&mut self) -> Result<()> {
        let next = match self.effective() {
            ThemeMode::Light => ThemeMode::Dark,
            _ => ThemeMode::Light,
        };
        self.set(next)
    }

    /// Pick up a value written by another process. Returns true on change.
    pub fn sync(&mut self) -> Result<bool> {
        let stored = self
            .prefs
            .get(THEME_STORAGE_KEY)?
            .and_then(|raw| ThemeMode::from_str(&raw));

        match stored {
            Some(mode) if mode != self.current => {
                self.current = mode;
                self.notify();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    pub fn subscribe(&mut self, observer: impl Fn(ThemeMode) + Send + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(sid, _)| *sid != id);
        self.observers.len() != before
    }

    fn notify(&self) {
        for (_, observer) in &self.observers {
            observer(self.current);
        }
    }
}

/// Guess the terminal background from `COLORFGBG` ("fg;bg").
fn detect_system_dark() -> bool {
    std::env::var("COLORFGBG")
        .ok()
        .and_then(|v| v.rsplit(';').next().and_then(|bg| bg.parse::<u8>().ok()))
        .map(|bg| !matches!(bg, 7 | 15))
        .unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn recorder(store: &mut ThemeStore) -> (SubscriptionId, Arc<Mutex<Vec<ThemeMode>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let id = store.subscribe(move |mode| sink.lock().unwrap().push(mode));
        (id, seen)
    }

    #[test]
    fn test_defaults_to_light() {
        let store = ThemeStore::load(MemoryPreferences::new());
        assert_eq!(store.get(), ThemeMode::Light);
    }

    #[test]
    fn test_round_trip_restores_storage_and_subscribers() {
        let prefs = MemoryPreferences::new();
        let mut store = ThemeStore::load(prefs.clone());
        store.set(ThemeMode::Light).unwrap();
        let (_, seen) = recorder(&mut store);

        store.set(ThemeMode::Dark).unwrap();
        store.set(ThemeMode::Light).unwrap();

        assert_eq!(prefs.get(THEME_STORAGE_KEY).unwrap().as_deref(), Some("light"));
        assert_eq!(store.get(), ThemeMode::Light);
        assert_eq!(*seen.lock().unwrap(), vec![ThemeMode::Dark, ThemeMode::Light]);
        assert_eq!(seen.lock().unwrap().last(), Some(&ThemeMode::Light));
    }

    #[test]
    fn test_setting_same_value_does_not_notify() {
        let prefs = MemoryPreferences::new();
        let mut store = ThemeStore::load(prefs.clone());
        let (_, seen) = recorder(&mut store);

        store.set(ThemeMode::Light).unwrap();
        store.set(ThemeMode::Light).unwrap();

        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(prefs.get(THEME_STORAGE_KEY).unwrap().as_deref(), Some("light"));
    }

    #[test]
    fn test_unsubscribed_observer_is_not_called() {
        let mut store = ThemeStore::load(MemoryPreferences::new());
        let (id, seen) = recorder(&mut store);

        assert!(store.unsubscribe(id));
        assert!(!store.unsubscribe(id));
        store.set(ThemeMode::Dark).unwrap();

        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_toggle_resolves_system() {
        let mut store = ThemeStore::load(MemoryPreferences::new()).with_system_dark(true);
        store.set(ThemeMode::System).unwrap();
        assert!(store.is_dark());

        store.toggle().unwrap();
        assert_eq!(store.get(), ThemeMode::Light);
    }

    #[test]
    fn test_sync_picks_up_external_write() {
        let mut other = MemoryPreferences::new();
        let mut store = ThemeStore::load(other.clone());
        let (_, seen) = recorder(&mut store);

        assert!(!store.sync().unwrap());
        other.set(THEME_STORAGE_KEY, "dark").unwrap();
        assert!(store.sync().unwrap());
        assert!(!store.sync().unwrap());

        assert_eq!(store.get(), ThemeMode::Dark);
        assert_eq!(*seen.lock().unwrap(), vec![ThemeMode::Dark]);
    }

    #[test]
    fn test_file_preferences_shared_between_stores() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("preferences.json");

        let mut first = ThemeStore::load(FilePreferences::new(&path));
        let mut second = ThemeStore::load(FilePreferences::new(&path));

        first.set(ThemeMode::Dark).unwrap();
        assert!(second.sync().unwrap());
        assert_eq!(second.get(), ThemeMode::Dark);

        let reloaded = ThemeStore::load(FilePreferences::new(&path));
        assert_eq!(reloaded.get(), ThemeMode::Dark);
    }

    #[test]
    fn test_corrupt_file_is_not_overwritten() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("preferences.json");
        let corrupt = r#"{ "other-key": "keep", broken"#;
        fs::write(&path, corrupt).unwrap();

        let mut prefs = FilePreferences::new(&path);
        assert!(prefs.set(THEME_STORAGE_KEY, "dark").is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), corrupt);

        let mut store = ThemeStore::load(FilePreferences::new(&path));
        assert!(store.set(ThemeMode::Dark).is_err());
        assert_eq!(store.get(), ThemeMode::Light);
        assert_eq!(fs::read_to_string(&path).unwrap(), corrupt);
    }

    #[test]
    fn test_other_keys_survive_theme_writes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("preferences.json");
        fs::write(&path, r#"{"other-key": "keep"}"#).unwrap();

        let mut prefs = FilePreferences::new(&path);
        prefs.set(THEME_STORAGE_KEY, "dark").unwrap();

        assert_eq!(prefs.get("other-key").unwrap().as_deref(), Some("keep"));
        assert_eq!(prefs.get(THEME_STORAGE_KEY).unwrap().as_deref(), Some("dark"));
    }

    #[test]
    fn test_garbage_value_falls_back_to_light() {
        let mut prefs = MemoryPreferences::new();
        prefs.set(THEME_STORAGE_KEY, "purple").unwrap();
        let store = ThemeStore::load(prefs);
        assert_eq!(store.get(), ThemeMode::Light);
    }
}
