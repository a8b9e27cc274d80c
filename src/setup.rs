//! Setting up the `enigma` integration on a hub
use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info};

use crate::{
    config::{HubConfig, DOMAIN},
    devices::EnigmaDevice,
    hub::{Hub, Platform},
};

/// Platforms loaded once at least one box is configured.
pub const SUPPORTED_PLATFORMS: &[Platform] = &[Platform::MediaPlayer];

/// Configured boxes, in configuration order.
pub type Registry = Vec<Arc<EnigmaDevice>>;

/// The registry stored on `hub`, empty when setup has not run.
pub fn registry(hub: &Hub) -> Arc<Registry> {
    hub.data().get::<Registry>(DOMAIN).unwrap_or_default()
}

/// Build a device for every configured box, publish them on the hub and
/// schedule the dependent platforms.
///
/// Returns `false` when no box is configured. Platform loading runs in the
/// background; use [`Hub::block_till_done`] to wait for it.
pub async fn async_setup(hub: &Hub, config: Arc<HubConfig>) -> bool {
    hub.data().get_or_insert_with(DOMAIN, Registry::new);

    info!("Initializing enigma devices");

    let devices: Registry = config
        .devices()
        .iter()
        .cloned()
        .map(|device_config| {
            let device = EnigmaDevice::new(device_config);
            debug!("Enigma device {} configured", device.host());
            Arc::new(device)
        })
        .collect();

    let count = devices.len();
    hub.data().insert(DOMAIN, devices);

    if count == 0 {
        info!("No enigma devices configured");
        return false;
    }

    debug!("Configured {} enigmas", count);

    for platform in SUPPORTED_PLATFORMS {
        hub.load_platform(*platform, DOMAIN, json!({}), config.clone());
    }

    true
}
