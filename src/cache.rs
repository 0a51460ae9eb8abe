use std::collections::HashMap;
use std::sync::Mutex;
use crate::models::DashboardResponse;

/// Process wide cache for dashboard results over historical windows.
///
/// Entries are derived from immutable historical data, so last-write-wins
/// without further coordination is sufficient and entries live for the
/// process lifetime. Windows touching the current day are never stored.
pub struct ResultCache {
    entries: Mutex<HashMap<String, DashboardResponse>>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self { entries: Mutex::new(HashMap::new()) }
    }

    pub fn get(&self, key: &str) -> Option<DashboardResponse> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    pub fn put(&self, key: String, response: DashboardResponse) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key, response);
        }
    }
}
