//! Capabilities the embedding platform provides to the NVR provider and its cameras

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;

pub const MIME_JPEG: &str = "image/jpeg";
pub const MIME_MEDIA_STREAM_URL: &str = "x-media/x-media-stream-url";

/// Key-value settings storage, persisted by the host
pub trait Storage: Send + Sync {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&self, key: &str, value: &str);
}

/// Storage kept in process memory
#[derive(Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        MemoryStorage::default()
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        let items = self.items.lock().unwrap_or_else(|e| e.into_inner());
        items.get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) {
        let mut items = self.items.lock().unwrap_or_else(|e| e.into_inner());
        items.insert(key.to_string(), value.to_string());
    }
}

/// Opaque payload handed back to the host, tagged by MIME type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaObject {
    pub mime_type: String,
    pub data: Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeviceType {
    Camera,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeviceInterface {
    Camera,
    VideoCamera,
    MotionSensor,
    Settings,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[rustfmt::skip]
pub struct DeviceInfo {
    pub manufacturer:    String,
    pub model:           String,
    pub serial_number:   String,
}

/// A device published to the host registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[rustfmt::skip]
pub struct DeviceManifest {
    pub provider_native_id:   Option<String>,
    pub native_id:            String,
    pub name:                 String,
    pub info:                 DeviceInfo,
    pub interfaces:           Vec<DeviceInterface>,
    pub device_type:          DeviceType,
}

/// A user-editable setting as shown by the host
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Setting {
    pub key: String,
    pub title: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub setting_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    pub value: Option<String>,
}

#[async_trait]
pub trait Host: Send + Sync {
    /// Raises a persistent, user-facing alert
    fn alert(&self, message: &str);

    fn clear_alerts(&self);

    async fn on_device_discovered(&self, device: DeviceManifest);

    fn create_media_object(&self, data: Bytes, mime_type: &str) -> MediaObject {
        MediaObject {
            mime_type: mime_type.to_string(),
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get_item("url"), None);

        storage.set_item("url", "https://nvr.local");
        storage.set_item("url", "https://nvr2.local");
        assert_eq!(storage.get_item("url").as_deref(), Some("https://nvr2.local"));
    }
}
