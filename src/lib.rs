/// Tab Stash - saved tab collections for the browser
/// Built with Rust + WASM

pub mod activity;
pub mod auto_title;
pub mod domain;
pub mod error;
pub mod operations;
pub mod search;
pub mod settings;
pub mod storage;
pub mod store;
pub mod tab_data;
pub mod transfer;
pub mod url_index;

#[cfg(target_arch = "wasm32")]
pub mod bridge;
#[cfg(target_arch = "wasm32")]
mod chrome;

pub use error::{ImportError, StoreError, StoreResult};
pub use search::{SearchFilters, SearchHit};
pub use settings::{Settings, SettingsUpdate};
pub use storage::StorageData;
pub use store::{Clock, CollectionStore, MemoryStorage, StorageBackend, StoreState, SystemClock};
pub use tab_data::{AutoTitleType, Collection, CollectionOptions, NewTab, Tab, Timestamp};
pub use transfer::ImportStrategy;
pub use url_index::UrlIndex;

use wasm_bindgen::prelude::*;

// Set up panic hook for better error messages in the browser console
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());
}

// Re-export domain extraction for the pages' grouping headers
#[wasm_bindgen]
pub fn extract_domain(url: &str) -> String {
    domain::extract_domain(url).unwrap_or_else(|| "invalid".to_string())
}
