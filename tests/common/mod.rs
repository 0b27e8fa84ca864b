#![allow(dead_code)]

use async_trait::async_trait;
use qvr_cam_rs::host::{DeviceManifest, Host, MemoryStorage, Storage};
use qvr_cam_rs::provider::{SETTING_PASSWORD, SETTING_URL, SETTING_USERNAME};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const API_KEY: &str = "test-api-key";
pub const USERNAME: &str = "admin";
pub const PASSWORD: &str = "secret";
pub const SID: &str = "p7i2xqkl";

#[derive(Default)]
pub struct RecordingHost {
    pub alerts: Mutex<Vec<String>>,
    pub discovered: Mutex<Vec<DeviceManifest>>,
}

impl RecordingHost {
    pub fn alerts(&self) -> Vec<String> {
        self.alerts.lock().unwrap().clone()
    }

    pub fn discovered(&self) -> Vec<DeviceManifest> {
        self.discovered.lock().unwrap().clone()
    }
}

#[async_trait]
impl Host for RecordingHost {
    fn alert(&self, message: &str) {
        self.alerts.lock().unwrap().push(message.to_string());
    }

    fn clear_alerts(&self) {
        self.alerts.lock().unwrap().clear();
    }

    async fn on_device_discovered(&self, device: DeviceManifest) {
        self.discovered.lock().unwrap().push(device);
    }
}

pub fn storage_for(url: &str) -> Arc<MemoryStorage> {
    let storage = Arc::new(MemoryStorage::new());
    storage.set_item(SETTING_URL, url);
    storage.set_item(SETTING_USERNAME, USERNAME);
    storage.set_item(SETTING_PASSWORD, PASSWORD);
    storage
}

pub fn login_xml(passed: &str, sid: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" ?>
<QDocRoot version="1.0">
    <doQuick><![CDATA[]]></doQuick>
    <authPassed><![CDATA[{passed}]]></authPassed>
    <authSid><![CDATA[{sid}]]></authSid>
</QDocRoot>"#
    )
}

pub async fn mount_login(server: &MockServer, passed: &str) {
    Mock::given(method("GET"))
        .and(path("/cgi-bin/authLogin.cgi"))
        .and(query_param("user", USERNAME))
        // base64("secret")
        .and(query_param("pwd", "c2VjcmV0"))
        .and(query_param("service", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(login_xml(passed, SID)))
        .mount(server)
        .await;
}

pub fn camera(guid: &str, name: &str, shared: i64) -> Value {
    json!({
        "id": "1",
        "channel_index": 0,
        "name": name,
        "guid": guid,
        "brand": "Axis",
        "model": "M3045",
        "rtsp_sharelink_enabled": shared,
        "stream_state": [
            { "stream": "1", "video_resolution_setting": "1920x1080", "frame_rate": 30, "bit_rate": 4096 },
            { "stream": "2", "video_resolution_setting": "640x360", "frame_rate": 15, "bit_rate": 512 },
            { "stream": "3", "video_resolution_setting": "320x240" }
        ]
    })
}

pub async fn mount_cameras(server: &MockServer, body: Value) {
    Mock::given(method("GET"))
        .and(path("/qvrpro/apis/camera_status.cgi"))
        .and(query_param("act", "get_all_status"))
        .and(query_param("sid", SID))
        .and(query_param("x-apima-key", API_KEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

pub async fn mount_share_info(server: &MockServer, guid: &str) {
    Mock::given(method("GET"))
        .and(path("/qvrpro/apis/rtsp_sharelink_settings.cgi"))
        .and(query_param("act", "show_share_status"))
        .and(query_param("guid", guid))
        .and(query_param("sid", SID))
        .and(query_param("x-apima-key", API_KEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "path": format!("/live/{guid}"),
            "stream_id": 1,
            "network_domains": { "host_ip": "10.0.0.5", "port": 554 }
        })))
        .mount(server)
        .await;
}

/// Number of requests the mock NVR received for `endpoint`
pub async fn requests_to(server: &MockServer, endpoint: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == endpoint)
        .count()
}
