use std::collections::HashMap;

use serde::Deserialize;

use crate::catalog::SlotCatalog;
use crate::grades::StagedImport;
use crate::schedule::ScheduleEditor;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Everything the daemon knows lives here, owned by the request loop.
/// Nothing is persisted; a restart starts from a clean slate.
pub struct AppState {
    pub sessions: HashMap<String, ScheduleEditor>,
    /// Keyed by single-use preview token.
    pub pending_imports: HashMap<String, StagedImport>,
    pub catalog: SlotCatalog,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            pending_imports: HashMap::new(),
            catalog: SlotCatalog::new(),
        }
    }
}
