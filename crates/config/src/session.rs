use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

/// One column's persisted filter selection.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ColumnFilterState {
    pub column: String,
    /// Selected keys as display strings; "(Blanks)" names the blank key.
    pub selected: Vec<String>,
}

/// Per-grid view state, restored when the host reopens a view.
///
/// Views are identified by a host-supplied id and stored separately, one
/// file per view.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ViewSession {
    pub version: u32,
    pub view_id: String,
    pub scroll_offset: f32,
    pub filters: Vec<ColumnFilterState>,
    /// Whether the auto-fill confirmation banner was showing.
    pub confirmation_banner: bool,
}

impl ViewSession {
    pub fn new(view_id: impl Into<String>) -> Self {
        Self {
            version: 1,
            view_id: view_id.into(),
            ..Self::default()
        }
    }

    /// Get the views directory
    fn views_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gridflux")
            .join("views")
    }

    /// Hash a view id to create a unique filename
    fn hash_id(view_id: &str) -> String {
        let mut hasher = DefaultHasher::new();
        view_id.hash(&mut hasher);
        format!("{:016x}", hasher.finish())
    }

    /// Get session file path for a view
    fn view_path(view_id: &str) -> PathBuf {
        Self::views_dir().join(format!("{}.json", Self::hash_id(view_id)))
    }

    /// Load the saved session for a view
    pub fn load(view_id: &str) -> Option<Self> {
        Self::load_from(&Self::view_path(view_id))
    }

    /// Load a session from an explicit path
    pub fn load_from(path: &Path) -> Option<Self> {
        fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
    }

    /// Save this view's session
    pub fn save(&self) -> Result<(), String> {
        self.save_to(&Self::view_path(&self.view_id))
    }

    /// Save this session to an explicit path
    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| e.to_string())?;
        fs::write(path, json).map_err(|e| e.to_string())
    }

    /// List all saved view sessions by view id
    pub fn list_all() -> Vec<String> {
        let dir = Self::views_dir();
        let mut result = Vec::new();

        if let Ok(entries) = fs::read_dir(&dir) {
            for entry in entries.flatten() {
                if let Ok(contents) = fs::read_to_string(entry.path()) {
                    if let Ok(session) = serde_json::from_str::<ViewSession>(&contents) {
                        result.push(session.view_id);
                    }
                }
            }
        }

        result
    }
}
