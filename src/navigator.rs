use std::sync::Mutex;

/// Replace-style navigation: the current location is swapped, not pushed.
pub trait Navigator: Send + Sync {
    fn replace(&self, location: &str);
}

pub const LOGIN_PATH: &str = "/login";
/// Unprotected landing page.
pub const HOME_PATH: &str = "/";

/// Keeps every requested location in order; the CLI reads the last one back.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    history: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> Vec<String> {
        self.history.lock().map(|h| h.clone()).unwrap_or_default()
    }

    pub fn last(&self) -> Option<String> {
        self.history.lock().ok().and_then(|h| h.last().cloned())
    }
}

impl Navigator for RecordingNavigator {
    fn replace(&self, location: &str) {
        tracing::debug!(location = %location, "navigation requested");
        if let Ok(mut history) = self.history.lock() {
            history.push(location.to_string());
        }
    }
}
