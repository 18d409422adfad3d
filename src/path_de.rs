//! Contract-file decoding with the JSON path of the first bad field in errors.
use std::path::Path;

use anyhow::{Context, anyhow};
use serde::de::DeserializeOwned;

use crate::api::ApiConfig;

/// Deserialize with JSON-path context in error messages.
pub fn from_str_with_path<T: DeserializeOwned>(src: &str) -> anyhow::Result<T> {
    let de = &mut serde_json::Deserializer::from_str(src);
    serde_path_to_error::deserialize::<_, T>(de).map_err(|err| {
        let path = err.path().to_string();
        anyhow!("at JSON path {path} → {}", err.into_inner())
    })
}

pub fn from_slice_with_path<T: DeserializeOwned>(bytes: &[u8]) -> anyhow::Result<T> {
    let de = &mut serde_json::Deserializer::from_slice(bytes);
    serde_path_to_error::deserialize::<_, T>(de).map_err(|err| {
        let path = err.path().to_string();
        anyhow!("at JSON path {path} → {}", err.into_inner())
    })
}

/// Reads and decodes one contract file.
pub fn load_api_config(path: &Path) -> anyhow::Result<ApiConfig> {
    let bytes = std::fs::read(path).with_context(|| format!("failed to read contract {}", path.display()))?;
    from_slice_with_path(&bytes).with_context(|| format!("failed to decode contract {}", path.display()))
}
