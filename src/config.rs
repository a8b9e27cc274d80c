//! Configuration schema for the `enigma` integration
//!
//! The hub hands the integration its whole configuration document. Only the
//! `enigma` section is validated here; every other top-level key is kept as-is
//! in [`HubConfig::raw`] for other integrations and platforms.
//!
//! ```yaml
//! enigma:
//!   devices:
//!     - host: 192.168.1.20
//!       password: secret
//!     - host: bedroom.lan
//!       port: 8080
//!       timeout: 10
//! ```
use std::{fmt, fs, path::Path, result, time::Duration};

use serde::{de, Deserialize, Deserializer, Serializer};
use serde_yaml::{Mapping, Value};

use crate::error::{Result, ValidationError};

/// Domain identifier of the integration, also its configuration key.
pub const DOMAIN: &str = "enigma";

pub const CONF_DEVICES: &str = "devices";

pub const DEFAULT_PORT: u16 = 80;
pub const DEFAULT_NAME: &str = "Enigma2 Satelite";
pub const DEFAULT_USERNAME: &str = "root";
pub const DEFAULT_PASSWORD: &str = "";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_BOUQUET: &str = "bouquet";
pub const DEFAULT_PICON: &str = "picon";

/// A single validated device descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceConfig {
    #[serde(deserialize_with = "coerce::string")]
    pub host: String,
    #[serde(default = "default_port", deserialize_with = "coerce::port")]
    pub port: u16,
    #[serde(default = "default_name", deserialize_with = "coerce::string")]
    pub name: String,
    #[serde(default = "default_username", deserialize_with = "coerce::string")]
    pub username: String,
    #[serde(default = "default_password", deserialize_with = "coerce::string")]
    pub password: String,
    #[serde(
        default = "default_timeout",
        deserialize_with = "coerce::timeout",
        serialize_with = "serialize_timeout"
    )]
    pub timeout: Duration,
    #[serde(default = "default_bouquet", deserialize_with = "coerce::string")]
    pub bouquet: String,
    #[serde(default = "default_picon", deserialize_with = "coerce::string")]
    pub picon: String,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_name() -> String {
    DEFAULT_NAME.to_string()
}

fn default_username() -> String {
    DEFAULT_USERNAME.to_string()
}

fn default_password() -> String {
    DEFAULT_PASSWORD.to_string()
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

fn default_bouquet() -> String {
    DEFAULT_BOUQUET.to_string()
}

fn default_picon() -> String {
    DEFAULT_PICON.to_string()
}

fn serialize_timeout<S: Serializer>(timeout: &Duration, serializer: S) -> result::Result<S::Ok, S::Error> {
    serializer.serialize_f64(timeout.as_secs_f64())
}

impl DeviceConfig {
    /// A descriptor for `host` with every optional field defaulted.
    pub fn new(host: &str) -> Self {
        Self {
            host: host.to_string(),
            port: DEFAULT_PORT,
            name: default_name(),
            username: default_username(),
            password: default_password(),
            timeout: DEFAULT_TIMEOUT,
            bouquet: default_bouquet(),
            picon: default_picon(),
        }
    }

    /// Validate one raw descriptor. `path` is used to locate errors.
    pub fn from_value(path: &str, value: &Value) -> result::Result<Self, ValidationError> {
        if !value.is_mapping() {
            return Err(ValidationError::new(path, "expected a dictionary"));
        }
        let config = DeviceConfig::deserialize(value.clone())
            .map_err(|err| ValidationError::new(path, err.to_string()))?;
        if config.host.trim().is_empty() {
            return Err(ValidationError::new(
                format!("{}.host", path),
                "host must not be empty",
            ));
        }
        Ok(config)
    }

    /// `host:port`, the authority every request to the device goes to.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// The validated `enigma` section.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EnigmaConfig {
    pub devices: Vec<DeviceConfig>,
}

impl EnigmaConfig {
    pub fn from_value(value: &Value) -> result::Result<Self, ValidationError> {
        let section = value
            .as_mapping()
            .ok_or_else(|| ValidationError::new(DOMAIN, "expected a dictionary"))?;

        for key in section.keys() {
            if key.as_str() != Some(CONF_DEVICES) {
                return Err(ValidationError::new(
                    format!("{}.{}", DOMAIN, key_name(key)),
                    "extra keys not allowed",
                ));
            }
        }

        // A lone descriptor is accepted in place of a list, null means no devices.
        let entries: Vec<&Value> = match section.get(CONF_DEVICES) {
            None => {
                return Err(ValidationError::new(
                    format!("{}.{}", DOMAIN, CONF_DEVICES),
                    "required key not provided",
                ))
            }
            Some(Value::Null) => Vec::new(),
            Some(Value::Sequence(entries)) => entries.iter().collect(),
            Some(entry) => vec![entry],
        };

        let devices = entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| {
                DeviceConfig::from_value(&format!("{}.{}[{}]", DOMAIN, CONF_DEVICES, index), entry)
            })
            .collect::<result::Result<Vec<_>, _>>()?;

        Ok(Self { devices })
    }
}

fn key_name(key: &Value) -> String {
    match key.as_str() {
        Some(name) => name.to_string(),
        None => format!("{:?}", key),
    }
}

/// The full hub configuration with its validated `enigma` section.
#[derive(Debug, Clone)]
pub struct HubConfig {
    raw: Value,
    enigma: EnigmaConfig,
}

impl HubConfig {
    /// Build a configuration programmatically from already typed devices.
    pub fn new(devices: Vec<DeviceConfig>) -> Result<Self> {
        let mut section = Mapping::new();
        section.insert(Value::from(CONF_DEVICES), serde_yaml::to_value(&devices)?);
        let mut raw = Mapping::new();
        raw.insert(Value::from(DOMAIN), Value::Mapping(section));

        Ok(Self {
            raw: Value::Mapping(raw),
            enigma: EnigmaConfig { devices },
        })
    }

    pub fn from_value(raw: Value) -> result::Result<Self, ValidationError> {
        let document = raw
            .as_mapping()
            .ok_or_else(|| ValidationError::new("", "expected a dictionary"))?;
        let section = document
            .get(DOMAIN)
            .ok_or_else(|| ValidationError::new(DOMAIN, "required key not provided"))?;
        let enigma = EnigmaConfig::from_value(section)?;

        Ok(Self { raw, enigma })
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let raw: Value = serde_yaml::from_str(content)?;
        Ok(Self::from_value(raw)?)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let json: serde_json::Value = serde_json::from_str(content)?;
        Ok(Self::from_value(serde_yaml::to_value(json)?)?)
    }

    /// Load a configuration file, JSON when the extension says so, YAML otherwise.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&content),
            _ => Self::from_yaml_str(&content),
        }
    }

    pub fn enigma(&self) -> &EnigmaConfig {
        &self.enigma
    }

    pub fn devices(&self) -> &[DeviceConfig] {
        &self.enigma.devices
    }

    /// The document exactly as the hub loaded it, unknown keys included.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn section(&self, key: &str) -> Option<&Value> {
        self.raw.get(key)
    }
}

mod coerce {
    use super::*;

    struct StringVisitor;

    impl<'de> de::Visitor<'de> for StringVisitor {
        type Value = String;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a string")
        }

        fn visit_str<E: de::Error>(self, value: &str) -> result::Result<String, E> {
            Ok(value.to_string())
        }

        fn visit_string<E: de::Error>(self, value: String) -> result::Result<String, E> {
            Ok(value)
        }

        fn visit_bool<E: de::Error>(self, value: bool) -> result::Result<String, E> {
            Ok(value.to_string())
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> result::Result<String, E> {
            Ok(value.to_string())
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> result::Result<String, E> {
            Ok(value.to_string())
        }

        // Keep the fractional part, `12.0` stays "12.0".
        fn visit_f64<E: de::Error>(self, value: f64) -> result::Result<String, E> {
            Ok(format!("{:?}", value))
        }
    }

    /// Strings, plus scalars rendered as text.
    pub fn string<'de, D: Deserializer<'de>>(deserializer: D) -> result::Result<String, D::Error> {
        deserializer.deserialize_any(StringVisitor)
    }

    struct PortVisitor;

    impl PortVisitor {
        fn check<E: de::Error>(value: i128) -> result::Result<u16, E> {
            if (1..=65535).contains(&value) {
                Ok(value as u16)
            } else {
                Err(E::custom(format!(
                    "invalid port {}, expected a port number between 1 and 65535",
                    value
                )))
            }
        }
    }

    impl<'de> de::Visitor<'de> for PortVisitor {
        type Value = u16;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a port number between 1 and 65535")
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> result::Result<u16, E> {
            Self::check(i128::from(value))
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> result::Result<u16, E> {
            Self::check(i128::from(value))
        }

        fn visit_f64<E: de::Error>(self, value: f64) -> result::Result<u16, E> {
            if value.fract() != 0.0 || !value.is_finite() {
                return Err(E::invalid_value(de::Unexpected::Float(value), &self));
            }
            Self::check(value as i128)
        }

        fn visit_str<E: de::Error>(self, value: &str) -> result::Result<u16, E> {
            let port = value
                .trim()
                .parse::<i64>()
                .map_err(|_| E::invalid_value(de::Unexpected::Str(value), &self))?;
            Self::check(i128::from(port))
        }
    }

    pub fn port<'de, D: Deserializer<'de>>(deserializer: D) -> result::Result<u16, D::Error> {
        deserializer.deserialize_any(PortVisitor)
    }

    struct TimeoutVisitor;

    impl TimeoutVisitor {
        fn check<E: de::Error>(seconds: f64) -> result::Result<Duration, E> {
            match Duration::try_from_secs_f64(seconds) {
                Ok(timeout) if seconds > 0.0 => Ok(timeout),
                _ => Err(E::custom(format!(
                    "invalid timeout {}, expected a positive number of seconds",
                    seconds
                ))),
            }
        }
    }

    impl<'de> de::Visitor<'de> for TimeoutVisitor {
        type Value = Duration;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a positive number of seconds")
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> result::Result<Duration, E> {
            Self::check(value as f64)
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> result::Result<Duration, E> {
            Self::check(value as f64)
        }

        fn visit_f64<E: de::Error>(self, value: f64) -> result::Result<Duration, E> {
            Self::check(value)
        }

        // An explicit null falls back to the default timeout.
        fn visit_unit<E: de::Error>(self) -> result::Result<Duration, E> {
            Ok(DEFAULT_TIMEOUT)
        }

        fn visit_none<E: de::Error>(self) -> result::Result<Duration, E> {
            Ok(DEFAULT_TIMEOUT)
        }

        fn visit_str<E: de::Error>(self, value: &str) -> result::Result<Duration, E> {
            let seconds = value
                .trim()
                .parse::<f64>()
                .map_err(|_| E::invalid_value(de::Unexpected::Str(value), &self))?;
            Self::check(seconds)
        }
    }

    pub fn timeout<'de, D: Deserializer<'de>>(deserializer: D) -> result::Result<Duration, D::Error> {
        deserializer.deserialize_any(TimeoutVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn validation_error(yaml: &str) -> ValidationError {
        match HubConfig::from_yaml_str(yaml) {
            Err(Error::Validation(err)) => err,
            other => panic!("expected a validation error, got {:?}", other),
        }
    }

    #[test]
    fn host_only_gets_every_default() {
        let config = HubConfig::from_yaml_str("enigma:\n  devices:\n    - host: x\n").unwrap();

        assert_eq!(1, config.devices().len());
        let device = &config.devices()[0];
        assert_eq!("x", device.host);
        assert_eq!(80, device.port);
        assert_eq!("Enigma2 Satelite", device.name);
        assert_eq!("root", device.username);
        assert_eq!("", device.password);
        assert_eq!(Duration::from_secs(30), device.timeout);
        assert_eq!("bouquet", device.bouquet);
        assert_eq!("picon", device.picon);
        assert_eq!(&DeviceConfig::new("x"), device);
    }

    #[test]
    fn explicit_values_are_kept() {
        let config = HubConfig::from_yaml_str(
            r#"
enigma:
  devices:
    - host: 10.0.0.2
      port: 8080
      name: Living room
      username: admin
      password: secret
      timeout: 2.5
      bouquet: Favourites (TV)
      picon: picons
"#,
        )
        .unwrap();

        let device = &config.devices()[0];
        assert_eq!("10.0.0.2", device.host);
        assert_eq!(8080, device.port);
        assert_eq!("Living room", device.name);
        assert_eq!("admin", device.username);
        assert_eq!("secret", device.password);
        assert_eq!(Duration::from_millis(2500), device.timeout);
        assert_eq!("Favourites (TV)", device.bouquet);
        assert_eq!("picons", device.picon);
        assert_eq!("10.0.0.2:8080", device.authority());
    }

    #[test]
    fn scalars_are_coerced() {
        let config = HubConfig::from_yaml_str(
            "enigma:\n  devices:\n    - host: box\n      port: \"8001\"\n      password: 1234\n      timeout: \"5\"\n    - host: box2\n      password: 12.0\n      username: 0.5\n",
        )
        .unwrap();

        let device = &config.devices()[0];
        assert_eq!(8001, device.port);
        assert_eq!("1234", device.password);
        assert_eq!(Duration::from_secs(5), device.timeout);

        let device = &config.devices()[1];
        assert_eq!("12.0", device.password);
        assert_eq!("0.5", device.username);
    }

    #[test]
    fn null_timeout_uses_the_default() {
        let config = HubConfig::from_yaml_str("enigma:\n  devices:\n    - host: a\n      timeout:\n").unwrap();

        assert_eq!(DEFAULT_TIMEOUT, config.devices()[0].timeout);
    }

    #[test]
    fn missing_host_is_rejected() {
        let err = validation_error("enigma:\n  devices:\n    - port: 80\n");

        assert_eq!("enigma.devices[0]", err.path);
        assert!(err.message.contains("host"), "{}", err.message);
    }

    #[test]
    fn blank_host_is_rejected() {
        let err = validation_error("enigma:\n  devices:\n    - host: '  '\n");

        assert_eq!("enigma.devices[0].host", err.path);
    }

    #[test]
    fn out_of_range_port_is_rejected() {
        for port in &["0", "65536", "-1", "http"] {
            let err = validation_error(&format!(
                "enigma:\n  devices:\n    - host: a\n    - host: b\n      port: {}\n",
                port
            ));
            assert_eq!("enigma.devices[1]", err.path);
        }
    }

    #[test]
    fn malformed_timeout_is_rejected() {
        for timeout in &["0", "-3", "soon", "[1]"] {
            let err = validation_error(&format!(
                "enigma:\n  devices:\n    - host: a\n      timeout: {}\n",
                timeout
            ));
            assert_eq!("enigma.devices[0]", err.path);
        }
    }

    #[test]
    fn unknown_device_key_is_rejected() {
        let err = validation_error("enigma:\n  devices:\n    - host: a\n      colour: red\n");

        assert_eq!("enigma.devices[0]", err.path);
        assert!(err.message.contains("colour"), "{}", err.message);
    }

    #[test]
    fn unknown_section_key_is_rejected() {
        let err = validation_error("enigma:\n  devices: []\n  scan_interval: 10\n");

        assert_eq!("enigma.scan_interval", err.path);
    }

    #[test]
    fn missing_devices_key_is_rejected() {
        let err = validation_error("enigma: {}\n");

        assert_eq!("enigma.devices", err.path);
    }

    #[test]
    fn missing_section_is_rejected() {
        let err = validation_error("media_player:\n  - platform: enigma\n");

        assert_eq!("enigma", err.path);
    }

    #[test]
    fn unknown_top_level_keys_are_ignored() {
        let config = HubConfig::from_yaml_str(
            "homeassistant:\n  name: Home\nenigma:\n  devices:\n    - host: a\n",
        )
        .unwrap();

        assert_eq!(1, config.devices().len());
        assert!(config.section("homeassistant").is_some());
    }

    #[test]
    fn single_descriptor_becomes_a_list() {
        let config = HubConfig::from_yaml_str("enigma:\n  devices:\n    host: a\n").unwrap();

        assert_eq!(vec![DeviceConfig::new("a")], config.enigma().devices);
    }

    #[test]
    fn null_devices_is_an_empty_list() {
        let config = HubConfig::from_yaml_str("enigma:\n  devices:\n").unwrap();

        assert!(config.devices().is_empty());
    }

    #[test]
    fn json_documents_are_accepted() {
        let config = HubConfig::from_json_str(
            r#"{"enigma": {"devices": [{"host": "a", "port": 81}, {"host": "b"}]}, "other": 1}"#,
        )
        .unwrap();

        let hosts: Vec<_> = config.devices().iter().map(|d| d.host.as_str()).collect();
        assert_eq!(vec!["a", "b"], hosts);
        assert_eq!(81, config.devices()[0].port);
    }

    #[test]
    fn example_file_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("configuration.example.yaml");
        let config = HubConfig::from_file(path).unwrap();

        assert_eq!(2, config.devices().len());
        assert_eq!("secret", config.devices()[0].password);
        assert_eq!("bedroom.lan:8080", config.devices()[1].authority());
        assert_eq!(Duration::from_secs(10), config.devices()[1].timeout);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        match HubConfig::from_file("/nonexistent/configuration.yaml") {
            Err(Error::IO(_)) => (),
            other => panic!("expected an IO error, got {:?}", other),
        }
    }

    #[test]
    fn programmatic_config_round_trips_through_raw() {
        let mut device = DeviceConfig::new("a");
        device.timeout = Duration::from_secs(12);
        let config = HubConfig::new(vec![device.clone()]).unwrap();

        let reparsed = HubConfig::from_value(config.raw().clone()).unwrap();
        assert_eq!(vec![device], reparsed.enigma().devices);
    }
}
