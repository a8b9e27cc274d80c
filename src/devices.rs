use std::{
    collections::HashMap,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

use crate::{
    config::DeviceConfig,
    opener::{BasicAuth, Opener, Transport},
};

/// What the media player platform last observed on the box.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceState {
    pub power: bool,
    /// Volume level between 0 and 1
    pub volume: f32,
    pub muted: bool,
    pub selected_source: String,
    pub picon_url: Option<String>,
    /// Service reference to channel name
    pub source_names: HashMap<String, String>,
    /// Channel name to service reference
    pub sources: HashMap<String, String>,
}

impl Default for DeviceState {
    fn default() -> Self {
        DeviceState {
            power: true,
            volume: 0.0,
            muted: false,
            selected_source: String::new(),
            picon_url: None,
            source_names: HashMap::new(),
            sources: HashMap::new(),
        }
    }
}

/// A configured Enigma2 box.
///
/// Construction only prepares the opener, nothing is sent to the box until the
/// media player platform starts issuing requests.
#[derive(Debug)]
pub struct EnigmaDevice {
    config: DeviceConfig,
    opener: Opener,
    state: RwLock<DeviceState>,
}

impl EnigmaDevice {
    pub fn new(config: DeviceConfig) -> EnigmaDevice {
        let opener = Opener::new(&config.host, config.port, config.timeout, Self::auth(&config));
        Self::from_parts(config, opener)
    }

    /// Build a device whose requests go through `transport`.
    pub fn with_transport(config: DeviceConfig, transport: Box<dyn Transport>) -> EnigmaDevice {
        let opener = Opener::with_transport(&config.host, config.port, Self::auth(&config), transport);
        Self::from_parts(config, opener)
    }

    fn from_parts(config: DeviceConfig, opener: Opener) -> EnigmaDevice {
        EnigmaDevice {
            config,
            opener,
            state: RwLock::new(DeviceState::default()),
        }
    }

    fn auth(config: &DeviceConfig) -> Option<BasicAuth> {
        if config.password.is_empty() {
            None
        } else {
            Some(BasicAuth::new(
                &config.host,
                config.port,
                &config.username,
                &config.password,
            ))
        }
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn host(&self) -> &str {
        &self.config.host
    }

    pub fn port(&self) -> u16 {
        self.config.port
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn username(&self) -> &str {
        &self.config.username
    }

    pub fn password(&self) -> &str {
        &self.config.password
    }

    pub fn timeout(&self) -> Duration {
        self.config.timeout
    }

    pub fn bouquet(&self) -> &str {
        &self.config.bouquet
    }

    pub fn picon(&self) -> &str {
        &self.config.picon
    }

    pub fn opener(&self) -> &Opener {
        &self.opener
    }

    pub fn base_url(&self) -> &str {
        self.opener.base_url()
    }

    /// URL of the channel logo for a service reference.
    ///
    /// Enigma2 names picons after the service reference with `:` replaced by
    /// `_` and the trailing separators dropped, e.g. `1:0:19:283D:3FB:1:C00000:0:0:0:`
    /// becomes `1_0_19_283D_3FB_1_C00000_0_0_0.png`.
    pub fn picon_url(&self, service_ref: &str) -> String {
        let file = service_ref.trim().trim_end_matches(':').replace(':', "_");
        let folder = self.config.picon.trim_matches('/');
        self.opener.url(&format!("{}/{}.png", folder, file))
    }

    pub fn state(&self) -> DeviceState {
        self.read_state().clone()
    }

    pub fn update_state<F, R>(&self, update: F) -> R
    where
        F: FnOnce(&mut DeviceState) -> R,
    {
        update(&mut self.write_state())
    }

    fn read_state(&self) -> RwLockReadGuard<'_, DeviceState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, DeviceState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opener::{HttpResponse, TransportMock};

    fn device(config: DeviceConfig) -> (EnigmaDevice, TransportMock) {
        let transport = TransportMock::new();
        let device = EnigmaDevice::with_transport(config, Box::new(transport.clone()));
        (device, transport)
    }

    #[test]
    fn empty_password_builds_plain_opener() {
        let device = EnigmaDevice::new(DeviceConfig::new("box.lan"));

        assert!(device.opener().auth().is_none());
        assert_eq!("http://box.lan:80", device.base_url());
    }

    #[test]
    fn password_builds_scoped_basic_auth() {
        let mut config = DeviceConfig::new("box.lan");
        config.port = 8080;
        config.password = String::from("secret");
        let device = EnigmaDevice::new(config);

        let auth = device.opener().auth().unwrap();
        assert_eq!("box.lan:8080", auth.scope());
        assert_eq!(("box.lan", 8080), (auth.host(), auth.port()));
        assert_eq!("root", auth.username());
    }

    #[test]
    fn fields_come_from_config() {
        let mut config = DeviceConfig::new("10.0.0.5");
        config.name = String::from("Kitchen");
        config.username = String::from("admin");
        config.timeout = Duration::from_secs(4);
        config.bouquet = String::from("Favourites");
        let device = EnigmaDevice::new(config.clone());

        assert_eq!("10.0.0.5", device.host());
        assert_eq!(80, device.port());
        assert_eq!("Kitchen", device.name());
        assert_eq!("admin", device.username());
        assert_eq!("", device.password());
        assert_eq!(Duration::from_secs(4), device.timeout());
        assert_eq!("Favourites", device.bouquet());
        assert_eq!("picon", device.picon());
        assert_eq!(&config, device.config());
    }

    #[test]
    fn state_starts_inert() {
        let device = EnigmaDevice::new(DeviceConfig::new("box.lan"));

        let state = device.state();
        assert!(state.power);
        assert_eq!(0.0, state.volume);
        assert!(!state.muted);
        assert_eq!("", state.selected_source);
        assert_eq!(None, state.picon_url);
        assert!(state.source_names.is_empty());
        assert!(state.sources.is_empty());
    }

    #[test]
    fn state_updates_are_visible() {
        let device = EnigmaDevice::new(DeviceConfig::new("box.lan"));

        let muted = device.update_state(|state| {
            state.muted = true;
            state.sources.insert(String::from("Das Erste"), String::from("1:0:1:283D:3FB:1:C00000:0:0:0:"));
            state.muted
        });

        assert!(muted);
        let state = device.state();
        assert!(state.muted);
        assert_eq!(1, state.sources.len());
    }

    #[test]
    fn picon_urls_follow_enigma_naming() {
        let mut config = DeviceConfig::new("box.lan");
        config.picon = String::from("/picons/");
        let device = EnigmaDevice::new(config);

        assert_eq!(
            "http://box.lan:80/picons/1_0_19_283D_3FB_1_C00000_0_0_0.png",
            device.picon_url("1:0:19:283D:3FB:1:C00000:0:0:0:")
        );
    }

    #[test]
    fn requests_carry_device_credentials() {
        let mut config = DeviceConfig::new("box.lan");
        config.password = String::from("secret");
        let (device, transport) = device(config);
        transport.set_send_return_value(Ok(HttpResponse {
            status: 200,
            body: String::from("<e2powerstate/>"),
        }));

        let body = device.opener().get("/web/powerstate").unwrap();

        assert_eq!("<e2powerstate/>", body);
        let requests = transport.requests();
        assert_eq!("http://box.lan:80/web/powerstate", requests[0].url);
        assert_eq!(Some("Basic cm9vdDpzZWNyZXQ="), requests[0].header("Authorization"));
    }
}
