use anyhow::Result;
use async_trait::async_trait;
use clap::{Arg, Command};
use log::{info, warn};
use qvr_cam_rs::host::{DeviceManifest, Host, MemoryStorage, Storage};
use qvr_cam_rs::provider::{SETTING_PASSWORD, SETTING_URL, SETTING_USERNAME};
use qvr_cam_rs::{DiscoveryOutcome, QvrNvr};
use std::sync::{Arc, Mutex};

/// Host that logs alerts and remembers what was discovered
#[derive(Default)]
struct ConsoleHost {
    discovered: Mutex<Vec<DeviceManifest>>,
}

#[async_trait]
impl Host for ConsoleHost {
    fn alert(&self, message: &str) {
        warn!("[Alert] {message}");
    }

    fn clear_alerts(&self) {}

    async fn on_device_discovered(&self, device: DeviceManifest) {
        info!("[Discovered] {} ({})", device.name, device.native_id);
        if let Ok(mut discovered) = self.discovered.lock() {
            discovered.push(device);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let matches = Command::new("qvr-cam")
        .about("Lists the cameras a QNAP QVR Pro NVR shares over RTSP.")
        .arg(
            Arg::new("url")
                .long("url")
                .required(true)
                .help("QVR Pro URL, e.g. https://192.168.48.55:8080"),
        )
        .arg(Arg::new("username").short('u').long("username").required(true))
        .arg(Arg::new("password").short('p').long("password").required(true))
        .arg(
            Arg::new("api-key")
                .long("api-key")
                .default_value("@APIMA_KEY@")
                .help("Value sent as x-apima-key"),
        )
        .arg(
            Arg::new("stream")
                .short('s')
                .long("stream")
                .help("Stream id to resolve (1, 2 or 3); defaults to the first configured"),
        )
        .get_matches();

    let arg = |name: &str| matches.get_one::<String>(name).cloned().unwrap_or_default();

    let storage = Arc::new(MemoryStorage::new());
    storage.set_item(SETTING_URL, &arg("url"));
    storage.set_item(SETTING_USERNAME, &arg("username"));
    storage.set_item(SETTING_PASSWORD, &arg("password"));

    let host = Arc::new(ConsoleHost::default());
    let nvr = Arc::new(QvrNvr::new(Arc::clone(&host), storage, arg("api-key")));

    println!("----------------------- DEVICE DISCOVERY ----------------------");

    match nvr.discover_devices().await {
        DiscoveryOutcome::Published(count) => println!("[Main] {count} camera(s) shared over RTSP"),
        outcome => anyhow::bail!("discovery did not complete: {outcome:?}"),
    }

    let stream = matches.get_one::<String>("stream").map(String::as_str);
    let devices = host
        .discovered
        .lock()
        .map(|discovered| discovered.clone())
        .unwrap_or_default();

    for manifest in devices {
        let camera = nvr.get_device(&manifest.native_id).await?;

        match camera.resolve_stream_url(stream).await {
            Ok(descriptor) => println!("[Main] {}: {}", manifest.name, descriptor.url),
            Err(e) => eprintln!("[Main] {}: {e}", manifest.name),
        }
    }

    Ok(())
}
