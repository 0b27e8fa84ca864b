pub mod camera;

use crate::utils::{
    deserialize_null_default, deserialize_port, deserialize_string_lenient, deserialize_truthy,
    is_truthy, value_as_f64,
};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A camera as reported by `camera_status.cgi`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
#[rustfmt::skip]
pub struct CameraRecord {
    #[serde(deserialize_with = "deserialize_string_lenient")]
    pub id:                       String,
    pub channel_index:            Option<Value>,
    #[serde(deserialize_with = "deserialize_string_lenient")]
    pub name:                     String,
    #[serde(deserialize_with = "deserialize_string_lenient")]
    pub umsid:                    String,
    #[serde(deserialize_with = "deserialize_string_lenient")]
    pub guid:                     String,
    #[serde(deserialize_with = "deserialize_string_lenient")]
    pub brand:                    String,
    #[serde(deserialize_with = "deserialize_string_lenient")]
    pub model:                    String,
    #[serde(deserialize_with = "deserialize_null_default")]
    pub stream_state:             Vec<Option<StreamDescriptor>>,
    pub video_codec_setting:      Option<Value>,
    pub frame_rate_setting:       Option<Value>,
    #[serde(deserialize_with = "deserialize_truthy")]
    pub rtsp_sharelink_enabled:   bool,
}

/// Per-stream vendor settings, one per slot of `stream_state`. Unused slots may be null.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
#[rustfmt::skip]
pub struct StreamDescriptor {
    pub stream:                     Option<Value>,
    pub frame_rate:                 Option<Value>,
    #[serde(deserialize_with = "deserialize_string_lenient")]
    pub video_resolution_setting:   String,
    pub bit_rate:                   Option<Value>,
    pub video_quality_setting:      Option<Value>,
}

impl StreamDescriptor {
    /// Only streams reporting a bit rate are configured on the NVR.
    pub fn has_bit_rate(&self) -> bool {
        self.bit_rate.as_ref().map_or(false, is_truthy)
    }

    pub fn fps(&self) -> Option<f64> {
        self.frame_rate.as_ref().and_then(value_as_f64)
    }
}

/// Reply of `rtsp_sharelink_settings.cgi` for one camera
#[derive(Debug, Clone, Deserialize, Serialize)]
#[rustfmt::skip]
pub struct RtspShareInfo {
    pub path:              String,
    #[serde(default)]
    pub stream_id:         Option<Value>,
    pub network_domains:   NetworkDomains,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[rustfmt::skip]
pub struct NetworkDomains {
    pub host_ip:   String,
    #[serde(deserialize_with = "deserialize_port")]
    pub port:      u16,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_camera_record_lenient() {
        let record: CameraRecord = serde_json::from_value(json!({
            "guid": 1234,
            "name": "Front Door",
            "rtsp_sharelink_enabled": 1,
            "stream_state": [{ "video_resolution_setting": "1920x1080", "bit_rate": 4096 }]
        }))
        .unwrap();

        assert_eq!(record.guid, "1234");
        assert_eq!(record.name, "Front Door");
        assert!(record.rtsp_sharelink_enabled);
        assert!(record.stream_state[0].as_ref().unwrap().has_bit_rate());
        assert_eq!(record.brand, "");

        let record: CameraRecord =
            serde_json::from_value(json!({ "guid": "abc", "rtsp_sharelink_enabled": 0 })).unwrap();
        assert!(!record.rtsp_sharelink_enabled);
        assert!(record.stream_state.is_empty());
    }

    #[test]
    fn test_null_stream_slots() {
        let record: CameraRecord = serde_json::from_value(json!({
            "guid": "g-1",
            "stream_state": [{ "video_resolution_setting": "1920x1080", "bit_rate": 4096 }, null, null]
        }))
        .unwrap();

        assert_eq!(record.stream_state.len(), 3);
        assert!(record.stream_state[0].is_some());
        assert!(record.stream_state[1].is_none());

        let record: CameraRecord =
            serde_json::from_value(json!({ "guid": "g-2", "stream_state": null })).unwrap();
        assert!(record.stream_state.is_empty());
    }

    #[test]
    fn test_stream_descriptor_bit_rate() {
        let stream: StreamDescriptor =
            serde_json::from_value(json!({ "bit_rate": 0, "frame_rate": "25" })).unwrap();

        assert!(!stream.has_bit_rate());
        assert_eq!(stream.fps(), Some(25.0));
        assert!(!StreamDescriptor::default().has_bit_rate());
    }

    #[test]
    fn test_share_info_port_as_string() {
        let info: RtspShareInfo = serde_json::from_value(json!({
            "success": true,
            "path": "/live/abc",
            "stream_id": 1,
            "network_domains": { "host_ip": "10.0.0.5", "port": "554" }
        }))
        .unwrap();

        assert_eq!(info.network_domains.port, 554);
        assert_eq!(info.network_domains.host_ip, "10.0.0.5");
    }
}
