/// chrome.storage.local backend for the collection store
use crate::error::{StoreError, StoreResult};
use crate::storage::StorageData;
use crate::store::StorageBackend;
use serde::Serialize;
use wasm_bindgen::prelude::*;

// Import JS bridge functions
#[wasm_bindgen(module = "/storage.js")]
extern "C" {
    #[wasm_bindgen(catch)]
    async fn loadState() -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn saveState(value: JsValue) -> Result<(), JsValue>;
}

/// Every top-level field of `StorageData` is one key in chrome.storage.local
#[derive(Debug, Default, Clone, Copy)]
pub struct ChromeStorage;

impl StorageBackend for ChromeStorage {
    async fn load(&self) -> StoreResult<Option<StorageData>> {
        let value = loadState()
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to get storage: {:?}", e)))?;

        if value.is_null() || value.is_undefined() {
            return Ok(None);
        }
        serde_wasm_bindgen::from_value(value)
            .map(Some)
            .map_err(|e| StoreError::Storage(format!("Failed to parse storage: {}", e)))
    }

    async fn save(&self, data: &StorageData) -> StoreResult<()> {
        // json_compatible so maps land as plain objects, not JS Maps
        let value = data
            .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
            .map_err(|e| StoreError::Storage(format!("Failed to serialize storage: {}", e)))?;

        saveState(value)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to save storage: {:?}", e)))
    }
}
