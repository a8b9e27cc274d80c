use std::{env, process, sync::Arc};

use async_trait::async_trait;
use tracing::info;
use tracing_subscriber::EnvFilter;

use enigma2::{
    async_setup,
    config::HubConfig,
    hub::{Hub, Platform, PlatformLoader},
    setup::registry,
};

/// Stands in for the media player platform and only reports what it was given.
struct LogLoader;

#[async_trait]
impl PlatformLoader for LogLoader {
    async fn load_platform(
        &self,
        hub: Hub,
        platform: Platform,
        domain: &'static str,
        discovery_info: serde_json::Value,
        _config: Arc<HubConfig>,
    ) {
        info!(
            "Loading {} platform for {} ({} devices, discovery info {})",
            platform,
            domain,
            registry(&hub).len(),
            discovery_info
        );
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .init();

    let path = match env::args().nth(1) {
        Some(path) => path,
        None => {
            eprintln!("usage: async <configuration>");
            process::exit(2);
        }
    };
    let config = match HubConfig::from_file(&path) {
        Ok(config) => Arc::new(config),
        Err(err) => {
            eprintln!("{}", err);
            process::exit(1);
        }
    };

    let hub = Hub::new(Arc::new(LogLoader));
    if !async_setup(&hub, config).await {
        process::exit(1);
    }
    hub.block_till_done().await;

    registry(&hub).iter().for_each(|device| {
        println!("{}\t{}", device.base_url(), device.name());
    });
}
