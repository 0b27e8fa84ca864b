use crate::device::{CameraRecord, RtspShareInfo};
use crate::error::{QvrError, Result};
use crate::utils::{is_truthy, is_xml_truthy, parse_xml_fields};

use base64::{engine::general_purpose::STANDARD, Engine};
use bytes::Bytes;
use log::{debug, info};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const API_KEY_PARAM: &str = "x-apima-key";
const XML_ROOT: &str = "QDocRoot";

/// How the NVR encodes the body of a given endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Xml,
    Json,
    Binary,
}

/// All of the QVR Pro endpoints this client talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    AuthLogin,
    CameraStatus,
    LiveImage,
    RtspShareLink,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::AuthLogin => "/cgi-bin/authLogin.cgi",
            Endpoint::CameraStatus => "/qvrpro/apis/camera_status.cgi",
            Endpoint::LiveImage => "/qvrpro/apis/getliveimage.cgi",
            Endpoint::RtspShareLink => "/qvrpro/apis/rtsp_sharelink_settings.cgi",
        }
    }

    pub fn format(&self) -> ResponseFormat {
        match self {
            Endpoint::AuthLogin => ResponseFormat::Xml,
            Endpoint::CameraStatus | Endpoint::RtspShareLink => ResponseFormat::Json,
            Endpoint::LiveImage => ResponseFormat::Binary,
        }
    }

    fn requires_session(&self) -> bool {
        !matches!(self, Endpoint::AuthLogin)
    }
}

/// Decoded reply, shaped by the endpoint's declared format
#[derive(Debug)]
pub enum ResponseBody {
    Xml(HashMap<String, String>),
    Json(Value),
    Binary(Bytes),
}

/// An authenticated session. Replaced as a whole on every successful login.
#[derive(Debug, PartialEq, Eq)]
pub struct Session {
    pub sid: String,
    pub generation: u64,
}

#[derive(Deserialize)]
struct CameraStatusReply {
    #[serde(default)]
    success: Value,
    #[serde(default)]
    datas: Option<Vec<CameraRecord>>,
}

/// Client for one QVR Pro endpoint
pub struct QvrClient {
    url: Url,
    api_key: String,
    http: reqwest::Client,
    session: RwLock<Option<Arc<Session>>>,
    generation: AtomicU64,
}

impl QvrClient {
    /// Builds a client for `url`. NVRs ship with self-signed certificates,
    /// so certificate verification is disabled.
    ///
    /// # Examples
    ///
    /// ```
    /// use qvr_cam_rs::client::QvrClient;
    ///
    /// let client = QvrClient::new("https://192.168.48.55:8080", "@APIMA_KEY@").unwrap();
    /// assert_eq!(client.url().as_str(), "https://192.168.48.55:8080/");
    /// ```
    pub fn new(url: &str, api_key: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .danger_accept_invalid_certs(true)
            .build()?;

        Ok(QvrClient {
            url: Url::parse(url)?,
            api_key: api_key.into(),
            http,
            session: RwLock::new(None),
            generation: AtomicU64::new(0),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Current session, if a login has succeeded
    pub async fn session(&self) -> Option<Arc<Session>> {
        self.session.read().await.clone()
    }

    /// Authenticates against `authLogin.cgi` and stores the returned sid.
    ///
    /// The password is only Base64 encoded, as the NVR expects.
    pub async fn login(&self, username: &str, password: &str) -> Result<Arc<Session>> {
        let params = vec![
            ("user", username.to_string()),
            ("pwd", STANDARD.encode(password.as_bytes())),
            ("service", "1".to_string()),
        ];

        let fields = match self.send_request(Endpoint::AuthLogin, params, None).await? {
            ResponseBody::Xml(fields) => fields,
            other => return Err(unexpected_body(Endpoint::AuthLogin, &other)),
        };

        if !is_xml_truthy(fields.get("authPassed").map(String::as_str)) {
            return Err(QvrError::AuthenticationFailed(format!(
                "authPassed={}",
                fields.get("authPassed").map_or("<missing>", String::as_str)
            )));
        }

        let sid = fields.get("authSid").cloned().unwrap_or_default();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let session = Arc::new(Session { sid, generation });

        *self.session.write().await = Some(Arc::clone(&session));
        info!("[QvrClient][login] Logged in to {} (session {generation})", self.url);

        Ok(session)
    }

    /// Returns the `datas` array of `camera_status.cgi` as reported.
    /// `None` means the NVR answered successfully without a camera list.
    pub async fn list_cameras(&self) -> Result<Option<Vec<CameraRecord>>> {
        let session = self.require_session().await?;
        let params = vec![("act", "get_all_status".to_string())];

        let body = self
            .send_request(Endpoint::CameraStatus, params, Some(&*session))
            .await?;
        let reply: CameraStatusReply = serde_json::from_value(expect_json(Endpoint::CameraStatus, body)?)?;

        if !is_truthy(&reply.success) {
            return Err(QvrError::ApiCallFailed("failed to get cameras.".to_string()));
        }

        Ok(reply.datas)
    }

    /// Fetches the live image for `guid`, bypassing NVR side caching.
    pub async fn get_camera_snapshot(&self, guid: &str) -> Result<Bytes> {
        let session = self.require_session().await?;
        let params = vec![
            ("qsauth_type", "0".to_string()),
            ("qsauth_token", session.sid.clone()),
            ("cache_img", "no".to_string()),
            ("default_img", "no".to_string()),
            ("guid", guid.to_string()),
        ];

        match self
            .send_request(Endpoint::LiveImage, params, Some(&*session))
            .await?
        {
            ResponseBody::Binary(bytes) => Ok(bytes),
            other => Err(unexpected_body(Endpoint::LiveImage, &other)),
        }
    }

    pub async fn get_rtsp_share_info(&self, guid: &str) -> Result<RtspShareInfo> {
        let session = self.require_session().await?;
        let params = vec![
            ("act", "show_share_status".to_string()),
            ("guid", guid.to_string()),
        ];

        let body = self
            .send_request(Endpoint::RtspShareLink, params, Some(&*session))
            .await?;
        let reply = expect_json(Endpoint::RtspShareLink, body)?;

        if !reply.get("success").map_or(false, is_truthy) {
            return Err(QvrError::ApiCallFailed("get rtsp info failed.".to_string()));
        }

        Ok(serde_json::from_value(reply)?)
    }

    async fn require_session(&self) -> Result<Arc<Session>> {
        self.session()
            .await
            .ok_or_else(|| QvrError::AuthenticationFailed("no active session".to_string()))
    }

    /// Sends a GET to `endpoint` and decodes the body by the endpoint's format.
    /// Every request carries the API key; authenticated ones also carry the sid.
    async fn send_request(
        &self,
        endpoint: Endpoint,
        mut params: Vec<(&'static str, String)>,
        session: Option<&Session>,
    ) -> Result<ResponseBody> {
        params.push((API_KEY_PARAM, self.api_key.clone()));

        if endpoint.requires_session() {
            if let Some(session) = session {
                params.push(("sid", session.sid.clone()));
            }
        }

        let url = Url::parse(&format!(
            "{}{}",
            self.url.as_str().trim_end_matches('/'),
            endpoint.path()
        ))?;
        debug!("[QvrClient][send_request] GET {url} ({endpoint:?})");

        let response = self
            .http
            .get(url)
            .query(&params)
            .send()
            .await?
            .error_for_status()?;
        let bytes = response.bytes().await?;

        if let Some(session) = session {
            if session.generation != self.generation.load(Ordering::SeqCst) {
                debug!(
                    "[QvrClient][send_request] Session {} was replaced while {endpoint:?} was in flight",
                    session.generation
                );
            }
        }

        match endpoint.format() {
            ResponseFormat::Xml => Ok(ResponseBody::Xml(parse_xml_fields(&bytes, XML_ROOT))),
            ResponseFormat::Json => Ok(ResponseBody::Json(serde_json::from_slice(&bytes)?)),
            ResponseFormat::Binary => Ok(ResponseBody::Binary(bytes)),
        }
    }
}

fn expect_json(endpoint: Endpoint, body: ResponseBody) -> Result<Value> {
    match body {
        ResponseBody::Json(value) => Ok(value),
        other => Err(unexpected_body(endpoint, &other)),
    }
}

fn unexpected_body(endpoint: Endpoint, body: &ResponseBody) -> QvrError {
    let kind = match body {
        ResponseBody::Xml(_) => "XML",
        ResponseBody::Json(_) => "JSON",
        ResponseBody::Binary(_) => "binary",
    };

    QvrError::Parse(format!("{endpoint:?} returned an unexpected {kind} body"))
}
