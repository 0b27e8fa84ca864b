pub mod client;
pub mod device;
pub mod error;
pub mod host;
pub mod provider;
pub mod utils;

pub use client::QvrClient;
pub use device::camera::CameraDevice;
pub use error::{QvrError, Result};
pub use provider::{DiscoveryOutcome, QvrNvr};
