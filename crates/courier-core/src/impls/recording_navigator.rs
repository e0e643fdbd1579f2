use std::sync::{Mutex, PoisonError};

use crate::ports::{NavigationError, Navigator};

/// Navigator that records every location instead of changing pages.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    visited: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visited(&self) -> Vec<String> {
        self.visited
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, location: &str) -> Result<(), NavigationError> {
        if !location.starts_with('/') {
            return Err(NavigationError::Rejected(location.to_string()));
        }
        tracing::debug!(location, "navigate");
        self.visited
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(location.to_string());
        Ok(())
    }
}
