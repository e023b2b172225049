/// User settings, stored as a partial object merged over defaults
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What the popup does with the browser tabs it just saved
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum CloseAfterSave {
    #[default]
    Always,
    Never,
    Ask,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub archive_enabled: bool,
    pub archive_days: u32,
    pub close_after_save: CloseAfterSave,
    pub show_duplicate_warnings: bool,
    pub show_item_urls: bool,
    pub use_contextual_auto_titles: bool,
    /// Collection id -> expanded in the full-page view
    pub accordion_state: HashMap<String, bool>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            archive_enabled: true,
            archive_days: 30,
            close_after_save: CloseAfterSave::Always,
            show_duplicate_warnings: true,
            show_item_urls: false,
            use_contextual_auto_titles: true,
            accordion_state: HashMap::new(),
        }
    }
}

/// Partial settings change from the settings page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct SettingsUpdate {
    pub archive_enabled: Option<bool>,
    pub archive_days: Option<u32>,
    pub close_after_save: Option<CloseAfterSave>,
    pub show_duplicate_warnings: Option<bool>,
    pub show_item_urls: Option<bool>,
    pub use_contextual_auto_titles: Option<bool>,
    pub accordion_state: Option<HashMap<String, bool>>,
}

impl Settings {
    /// Apply the provided fields; returns whether anything changed
    pub fn apply(&mut self, update: SettingsUpdate) -> bool {
        let before = self.clone();

        if let Some(v) = update.archive_enabled {
            self.archive_enabled = v;
        }
        if let Some(v) = update.archive_days {
            self.archive_days = v.max(1);
        }
        if let Some(v) = update.close_after_save {
            self.close_after_save = v;
        }
        if let Some(v) = update.show_duplicate_warnings {
            self.show_duplicate_warnings = v;
        }
        if let Some(v) = update.show_item_urls {
            self.show_item_urls = v;
        }
        if let Some(v) = update.use_contextual_auto_titles {
            self.use_contextual_auto_titles = v;
        }
        if let Some(v) = update.accordion_state {
            self.accordion_state = v;
        }

        *self != before
    }
}
