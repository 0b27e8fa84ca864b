use crate::client::QvrClient;
use crate::device::camera::CameraDevice;
use crate::device::CameraRecord;
use crate::error::{QvrError, Result};
use crate::host::{
    DeviceInfo, DeviceInterface, DeviceManifest, DeviceType, Host, Setting, Storage,
};

use log::{debug, error, info};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;

pub const SETTING_URL: &str = "url";
pub const SETTING_USERNAME: &str = "username";
pub const SETTING_PASSWORD: &str = "password";

/// Delay before re-running discovery when the NVR returns no camera list
pub const LIST_RETRY_DELAY: Duration = Duration::from_secs(100);

const URL_PLACEHOLDER: &str = "http://192.168.48.55:8080";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub url: String,
    pub username: String,
    pub password: String,
}

/// How a discovery run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryOutcome {
    ConfigurationMissing(&'static str),
    LoginFailed,
    ListFailed,
    RetryScheduled,
    GaveUp,
    Published(usize),
}

/// State shared by the provider and the camera devices it hands out
pub struct NvrContext<H: Host> {
    pub host: Arc<H>,
    pub storage: Arc<dyn Storage>,
    api_key: String,
    api: RwLock<Option<Arc<QvrClient>>>,
}

impl<H: Host> NvrContext<H> {
    /// A stored setting; empty values count as missing.
    pub fn setting(&self, key: &str) -> Option<String> {
        self.storage.get_item(key).filter(|value| !value.is_empty())
    }

    /// Connection settings, or the name of the first one missing
    pub fn credentials(&self) -> std::result::Result<Credentials, &'static str> {
        Ok(Credentials {
            url: self.setting(SETTING_URL).ok_or("URL")?,
            username: self.setting(SETTING_USERNAME).ok_or("username")?,
            password: self.setting(SETTING_PASSWORD).ok_or("password")?,
        })
    }

    /// The client of the last discovery run
    pub async fn api(&self) -> Result<Arc<QvrClient>> {
        self.api
            .read()
            .await
            .clone()
            .ok_or_else(|| QvrError::AuthenticationFailed("no active session".to_string()))
    }

    /// Reuses the current client while the URL is unchanged, otherwise starts over
    /// with a fresh client and session.
    async fn client_for(&self, url: &str) -> Result<Arc<QvrClient>> {
        let mut api = self.api.write().await;

        if let Some(client) = api.as_ref() {
            if client.url().as_str() == url::Url::parse(url)?.as_str() {
                return Ok(Arc::clone(client));
            }
        }

        info!("[QvrNvr][client_for] Creating client for {url}");
        let client = Arc::new(QvrClient::new(url, self.api_key.clone())?);
        *api = Some(Arc::clone(&client));

        Ok(client)
    }
}

/// A QVR Pro NVR exposed to the host as a provider of camera devices
pub struct QvrNvr<H: Host> {
    native_id: Option<String>,
    context: Arc<NvrContext<H>>,
    cameras: RwLock<Vec<CameraRecord>>,
    devices: Mutex<HashMap<String, Arc<CameraDevice<H>>>>,
    startup: watch::Sender<bool>,
    retry_delay: Duration,
}

impl<H: Host + 'static> QvrNvr<H> {
    /// Builds an idle provider. Nothing talks to the NVR until `start` or
    /// `discover_devices` runs, and `get_device` waits until one of them has
    /// finished. Use `started` to build and start in one step.
    pub fn new(host: Arc<H>, storage: Arc<dyn Storage>, api_key: impl Into<String>) -> Self {
        let (startup, _) = watch::channel(false);

        QvrNvr {
            native_id: None,
            context: Arc::new(NvrContext {
                host,
                storage,
                api_key: api_key.into(),
                api: RwLock::new(None),
            }),
            cameras: RwLock::new(Vec::new()),
            devices: Mutex::new(HashMap::new()),
            startup,
            retry_delay: LIST_RETRY_DELAY,
        }
    }

    pub fn with_native_id(mut self, native_id: impl Into<String>) -> Self {
        self.native_id = Some(native_id.into());
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn context(&self) -> &Arc<NvrContext<H>> {
        &self.context
    }

    /// Runs the startup discovery in the background. `get_device` waits for it.
    pub fn start(self: &Arc<Self>) -> JoinHandle<DiscoveryOutcome> {
        let provider = Arc::clone(self);
        tokio::spawn(async move { provider.discover_devices().await })
    }

    /// Wraps the provider in an `Arc` and starts the startup discovery.
    pub fn started(self) -> Arc<Self> {
        let provider = Arc::new(self);
        provider.start();
        provider
    }

    pub async fn discover_devices(self: &Arc<Self>) -> DiscoveryOutcome {
        self.run_discovery(true).await
    }

    async fn run_discovery(self: &Arc<Self>, allow_retry: bool) -> DiscoveryOutcome {
        let outcome = self.discover_once(allow_retry).await;
        debug!("[QvrNvr][discover_devices] {outcome:?}");

        self.startup.send_replace(true);
        outcome
    }

    async fn discover_once(self: &Arc<Self>, allow_retry: bool) -> DiscoveryOutcome {
        let host = &self.context.host;
        host.clear_alerts();

        let credentials = match self.context.credentials() {
            Ok(credentials) => credentials,
            Err(what) => {
                host.alert(&QvrError::ConfigurationMissing(what).to_string());
                return DiscoveryOutcome::ConfigurationMissing(what);
            }
        };

        let login = match self.context.client_for(&credentials.url).await {
            Ok(api) => api
                .login(&credentials.username, &credentials.password)
                .await
                .map(|_| api),
            Err(e) => Err(e),
        };
        let api = match login {
            Ok(api) => api,
            Err(e) => {
                host.alert(&format!("login error: {e}"));
                error!("[QvrNvr][discover_devices] login error: {e}");
                return DiscoveryOutcome::LoginFailed;
            }
        };

        let cameras = match api.list_cameras().await {
            Ok(Some(cameras)) => cameras,
            Ok(None) if allow_retry => {
                error!(
                    "[QvrNvr][discover_devices] Cameras failed to load. Retrying in {} seconds.",
                    self.retry_delay.as_secs()
                );
                self.schedule_retry();
                return DiscoveryOutcome::RetryScheduled;
            }
            Ok(None) => {
                error!("[QvrNvr][discover_devices] Cameras failed to load again, giving up.");
                return DiscoveryOutcome::GaveUp;
            }
            Err(e) => {
                host.alert(&format!("device discovery error: {e}"));
                error!("[QvrNvr][discover_devices] device discovery error: {e}");
                return DiscoveryOutcome::ListFailed;
            }
        };

        info!("[QvrNvr][discover_devices] Discovered {} camera(s)", cameras.len());

        // only cameras with RTSP sharing enabled are devices
        let shared: Vec<CameraRecord> = cameras
            .into_iter()
            .filter(|camera| camera.rtsp_sharelink_enabled)
            .collect();
        let manifests: Vec<DeviceManifest> =
            shared.iter().map(|camera| self.manifest(camera)).collect();

        self.devices
            .lock()
            .await
            .retain(|guid, _| shared.iter().any(|camera| &camera.guid == guid));
        *self.cameras.write().await = shared;

        for manifest in &manifests {
            host.on_device_discovered(manifest.clone()).await;
        }

        for manifest in &manifests {
            if let Err(e) = self.device_for(&manifest.native_id).await {
                error!("[QvrNvr][discover_devices] {e}");
            }
        }

        DiscoveryOutcome::Published(manifests.len())
    }

    /// Re-runs discovery once after `retry_delay`. The retried run does not reschedule.
    fn schedule_retry(self: &Arc<Self>) {
        let provider = Arc::clone(self);
        let delay = self.retry_delay;

        let retry: Pin<Box<dyn Future<Output = ()> + Send>> = Box::pin(async move {
            tokio::time::sleep(delay).await;
            provider.run_discovery(false).await;
        });
        tokio::spawn(retry);
    }

    fn manifest(&self, camera: &CameraRecord) -> DeviceManifest {
        DeviceManifest {
            provider_native_id: self.native_id.clone(),
            native_id: camera.guid.clone(),
            name: camera.name.clone(),
            info: DeviceInfo {
                manufacturer: camera.brand.clone(),
                model: camera.model.clone(),
                serial_number: format!("Camera-{}", camera.guid),
            },
            interfaces: vec![
                DeviceInterface::Camera,
                DeviceInterface::VideoCamera,
                DeviceInterface::MotionSensor,
                DeviceInterface::Settings,
            ],
            device_type: DeviceType::Camera,
        }
    }

    /// Camera device for `native_id` (the camera guid), once startup discovery is done.
    ///
    /// Pends until a discovery run has finished, so a provider that was never
    /// started (see `started`) never resolves this.
    pub async fn get_device(&self, native_id: &str) -> Result<Arc<CameraDevice<H>>> {
        let mut startup = self.startup.subscribe();
        // the sender lives as long as self, so this only returns once started
        let _ = startup.wait_for(|started| *started).await;

        self.device_for(native_id).await
    }

    async fn device_for(&self, native_id: &str) -> Result<Arc<CameraDevice<H>>> {
        let mut devices = self.devices.lock().await;
        if let Some(device) = devices.get(native_id) {
            return Ok(Arc::clone(device));
        }

        let cameras = self.cameras.read().await;
        let camera = cameras
            .iter()
            .find(|camera| camera.guid == native_id)
            .ok_or_else(|| QvrError::CameraNotFound(native_id.to_string()))?;

        let device = Arc::new(CameraDevice::new(Arc::clone(&self.context), camera));
        devices.insert(native_id.to_string(), Arc::clone(&device));

        Ok(device)
    }

    pub fn settings(&self) -> Vec<Setting> {
        vec![
            Setting {
                key: SETTING_USERNAME.to_string(),
                title: "Username".to_string(),
                value: self.context.storage.get_item(SETTING_USERNAME),
                ..Default::default()
            },
            Setting {
                key: SETTING_PASSWORD.to_string(),
                title: "Password".to_string(),
                setting_type: Some("password".to_string()),
                value: self.context.storage.get_item(SETTING_PASSWORD),
                ..Default::default()
            },
            Setting {
                key: SETTING_URL.to_string(),
                title: "QNAP QVR Pro URL".to_string(),
                placeholder: Some(URL_PLACEHOLDER.to_string()),
                value: self.context.storage.get_item(SETTING_URL),
                ..Default::default()
            },
        ]
    }

    /// Stores a setting and runs discovery again with it
    pub async fn put_setting(self: &Arc<Self>, key: &str, value: &str) -> DiscoveryOutcome {
        self.context.storage.set_item(key, value);
        self.discover_devices().await
    }
}
