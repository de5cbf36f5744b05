//! Single-use collapsed-marker store and the input expander that consumes it.

use std::collections::HashMap;
use std::sync::Mutex;

/// Process-wide mapping from a collapsed marker string to its expansion.
///
/// At most one handoff's markers are active at a time; the store is
/// cleared the first time an `input` event's text is scanned and a match
/// is found, regardless of how many markers that text contained.
#[derive(Default)]
pub struct MarkerStore {
    markers: Mutex<HashMap<String, String>>,
}

impl MarkerStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn activate(&self, markers: HashMap<String, String>) {
        *self.markers.lock().expect("marker store lock poisoned") = markers;
    }

    fn clear(&self) {
        self.markers.lock().expect("marker store lock poisoned").clear();
    }

    /// Expand every stored marker found in `text`, then clear the store.
    /// Returns `None` if the store was empty or no marker matched.
    #[must_use]
    pub fn expand(&self, text: &str) -> Option<String> {
        let markers = self.markers.lock().expect("marker store lock poisoned");
        if markers.is_empty() {
            return None;
        }
        let mut found = false;
        let mut result = text.to_string();
        for (marker, expansion) in markers.iter() {
            if result.contains(marker.as_str()) {
                found = true;
                result = result.replace(marker.as_str(), expansion);
            }
        }
        drop(markers);
        if found {
            self.clear();
            Some(result)
        } else {
            None
        }
    }
}
