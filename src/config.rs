//! Shared configuration for the controller and the MQTT bridge.
//!
//! Uses `heapless::String` for `no_std` compatibility while remaining
//! ergonomic to use on desktop with `std`.
//!
//! # Example
//!
//! ```rust
//! use garage_cover::config::{Config, DoorConfig, GarageConfig, MqttConfig};
//!
//! // The two-door reference installation
//! let config = Config::default();
//! assert_eq!(config.garage.doors.len(), 2);
//!
//! // Or customize
//! let config = Config::default()
//!     .with_mqtt(MqttConfig::default().with_host("192.168.1.100"))
//!     .with_garage(GarageConfig::empty().with_door(DoorConfig::new("left", "Left Door", 5, 6, 13)));
//! assert!(config.validate().is_ok());
//! ```

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use heapless::String as HString;

use crate::hal::gpio::{Polarity, DEFAULT_PULSE_MS};

/// Maximum length for short config strings (hostnames, client IDs, door ids)
pub const MAX_SHORT_STRING: usize = 64;

/// Maximum length for longer config strings (topics)
pub const MAX_LONG_STRING: usize = 128;

/// Type alias for short config strings
pub type ShortString = HString<MAX_SHORT_STRING>;

/// Type alias for longer config strings
pub type LongString = HString<MAX_LONG_STRING>;

// ============================================================================
// Helper for creating heapless strings
// ============================================================================

fn truncated<const N: usize>(s: &str) -> HString<N> {
    let mut hs = HString::new();
    // Cut on a char boundary that fits
    let valid_end = s
        .char_indices()
        .map(|(i, c)| i + c.len_utf8())
        .take_while(|end| *end <= N)
        .last()
        .unwrap_or(0);
    let _ = hs.push_str(&s[..valid_end]);
    hs
}

/// Create a ShortString from a &str, truncating if too long
pub fn short_string(s: &str) -> ShortString {
    truncated(s)
}

// ============================================================================
// Errors
// ============================================================================

/// Invalid garage configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// No doors configured.
    #[error("no doors configured")]
    NoDoors,

    /// A door id is empty or contains MQTT topic separators or wildcards.
    #[error("invalid door id {0:?}")]
    InvalidDoorId(String),

    /// Two doors share an id.
    #[error("duplicate door id {0}")]
    DuplicateDoorId(String),

    /// A topic for this door would not fit in a [`LongString`].
    #[error("topics for door {0} exceed {max} bytes", max = MAX_LONG_STRING)]
    TopicTooLong(String),
}

// ============================================================================
// Main Config
// ============================================================================

/// Complete application configuration
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Config {
    /// MQTT client configuration
    pub mqtt: MqttConfig,
    /// Topic layout
    pub topics: TopicConfig,
    /// Door layout
    pub garage: GarageConfig,
}

impl Config {
    /// Set MQTT configuration
    pub fn with_mqtt(mut self, mqtt: MqttConfig) -> Self {
        self.mqtt = mqtt;
        self
    }

    /// Set topic configuration
    pub fn with_topics(mut self, topics: TopicConfig) -> Self {
        self.topics = topics;
        self
    }

    /// Set door layout
    pub fn with_garage(mut self, garage: GarageConfig) -> Self {
        self.garage = garage;
        self
    }

    /// Validate the door layout and check that every door's topics fit the
    /// topic layout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.garage.validate()?;
        self.garage
            .doors
            .iter()
            .try_for_each(|door| self.topics.check_door_id(door.id.as_str()))
    }
}

// ============================================================================
// MQTT Config
// ============================================================================

/// MQTT client configuration
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MqttConfig {
    /// Broker hostname or IP
    pub host: ShortString,
    /// Broker port
    pub port: u16,
    /// Client ID (should be unique per device)
    pub client_id: ShortString,
    /// Username for authentication (empty = no auth)
    pub username: ShortString,
    /// Password for authentication
    pub password: ShortString,
    /// Keep-alive interval in seconds
    pub keep_alive_secs: u16,
    /// Sensor polling / change publishing interval in milliseconds
    pub poll_interval_ms: u32,
    /// Delay before retrying after a connection error, in milliseconds
    pub reconnect_delay_ms: u32,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: short_string("localhost"),
            port: 1883,
            client_id: short_string("garage_pi"),
            username: ShortString::new(),
            password: ShortString::new(),
            keep_alive_secs: 60,
            poll_interval_ms: 5000,
            reconnect_delay_ms: 5000,
        }
    }
}

impl MqttConfig {
    /// Set the broker host
    pub fn with_host(mut self, host: &str) -> Self {
        self.host = short_string(host);
        self
    }

    /// Set the broker port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the client ID
    pub fn with_client_id(mut self, id: &str) -> Self {
        self.client_id = short_string(id);
        self
    }

    /// Set authentication credentials
    pub fn with_auth(mut self, username: &str, password: &str) -> Self {
        self.username = short_string(username);
        self.password = short_string(password);
        self
    }

    /// Set the keep-alive interval
    pub fn with_keep_alive_secs(mut self, secs: u16) -> Self {
        self.keep_alive_secs = secs;
        self
    }

    /// Set the polling interval
    pub fn with_poll_interval_ms(mut self, ms: u32) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Set the reconnect back-off
    pub fn with_reconnect_delay_ms(mut self, ms: u32) -> Self {
        self.reconnect_delay_ms = ms;
        self
    }

    /// Check if authentication is configured
    pub fn has_auth(&self) -> bool {
        !self.username.is_empty()
    }
}

// ============================================================================
// Topic Config
// ============================================================================

/// Topic layout for commands, state and Home Assistant discovery.
///
/// ```text
/// garage/<id>/set                     <- command
/// garage/<id>/state                   -> state (retained)
/// homeassistant/cover/<id>/config     -> discovery (retained)
/// ```
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TopicConfig {
    /// Prefix for command and state topics
    pub base: ShortString,
    /// Home Assistant discovery prefix
    pub discovery_prefix: ShortString,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            base: short_string("garage"),
            discovery_prefix: short_string("homeassistant"),
        }
    }
}

impl TopicConfig {
    /// Set the command/state prefix
    pub fn with_base(mut self, base: &str) -> Self {
        self.base = short_string(base);
        self
    }

    /// Set the discovery prefix
    pub fn with_discovery_prefix(mut self, prefix: &str) -> Self {
        self.discovery_prefix = short_string(prefix);
        self
    }

    fn join(parts: &[&str]) -> LongString {
        let mut topic = LongString::new();
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                let _ = topic.push('/');
            }
            let _ = topic.push_str(part);
        }
        topic
    }

    /// Reject ids whose command, state or discovery topic would be cut short.
    pub fn check_door_id(&self, door_id: &str) -> Result<(), ConfigError> {
        let state = self.base.len() + door_id.len() + "//state".len();
        let discovery = self.discovery_prefix.len() + door_id.len() + "/cover//config".len();
        if state.max(discovery) > MAX_LONG_STRING {
            return Err(ConfigError::TopicTooLong(door_id.to_string()));
        }
        Ok(())
    }

    /// `<base>/<id>/set`
    pub fn command_topic(&self, door_id: &str) -> LongString {
        Self::join(&[self.base.as_str(), door_id, "set"])
    }

    /// `<base>/<id>/state`
    pub fn state_topic(&self, door_id: &str) -> LongString {
        Self::join(&[self.base.as_str(), door_id, "state"])
    }

    /// `<discovery_prefix>/cover/<id>/config`
    pub fn discovery_topic(&self, door_id: &str) -> LongString {
        Self::join(&[self.discovery_prefix.as_str(), "cover", door_id, "config"])
    }

    /// Extract the door id from a command topic.
    ///
    /// ```
    /// use garage_cover::config::TopicConfig;
    ///
    /// let topics = TopicConfig::default();
    /// assert_eq!(topics.parse_command_topic("garage/tor_mitte/set"), Some("tor_mitte"));
    /// assert_eq!(topics.parse_command_topic("garage/tor_mitte/state"), None);
    /// assert_eq!(topics.parse_command_topic("garage//set"), None);
    /// ```
    pub fn parse_command_topic<'a>(&self, topic: &'a str) -> Option<&'a str> {
        let id = topic
            .strip_prefix(self.base.as_str())?
            .strip_prefix('/')?
            .strip_suffix("/set")?;
        if id.is_empty() || id.contains('/') {
            None
        } else {
            Some(id)
        }
    }
}

// ============================================================================
// Door Config
// ============================================================================

/// Static wiring and identity of one door.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DoorConfig {
    /// Identifier used in topics, unique across the installation
    pub id: ShortString,
    /// Human-readable name shown in Home Assistant
    pub name: ShortString,
    /// BCM pin number of the opener relay
    pub relay_pin: u8,
    /// BCM pin number of the open limit switch
    pub open_pin: u8,
    /// BCM pin number of the closed limit switch
    pub closed_pin: u8,
    /// Relay pulse length in milliseconds
    #[cfg_attr(feature = "serde", serde(default = "default_pulse_ms"))]
    pub pulse_ms: u32,
    /// Limit switch polarity
    #[cfg_attr(feature = "serde", serde(default))]
    pub sensor_polarity: Polarity,
    /// Relay polarity
    #[cfg_attr(feature = "serde", serde(default))]
    pub relay_polarity: Polarity,
}

#[cfg(feature = "serde")]
fn default_pulse_ms() -> u32 {
    DEFAULT_PULSE_MS
}

impl DoorConfig {
    /// Create a door with the default 500 ms pulse and active-low wiring.
    pub fn new(id: &str, name: &str, relay_pin: u8, open_pin: u8, closed_pin: u8) -> Self {
        Self {
            id: short_string(id),
            name: short_string(name),
            relay_pin,
            open_pin,
            closed_pin,
            pulse_ms: DEFAULT_PULSE_MS,
            sensor_polarity: Polarity::ActiveLow,
            relay_polarity: Polarity::ActiveLow,
        }
    }

    /// Set the pulse length
    pub fn with_pulse_ms(mut self, ms: u32) -> Self {
        self.pulse_ms = ms;
        self
    }

    /// Set the limit switch polarity
    pub fn with_sensor_polarity(mut self, polarity: Polarity) -> Self {
        self.sensor_polarity = polarity;
        self
    }

    /// Set the relay polarity
    pub fn with_relay_polarity(mut self, polarity: Polarity) -> Self {
        self.relay_polarity = polarity;
        self
    }

    /// Stable identifier for Home Assistant (`garage_<id>`)
    pub fn unique_id(&self) -> LongString {
        let mut uid = LongString::new();
        let _ = uid.push_str("garage_");
        let _ = uid.push_str(self.id.as_str());
        uid
    }
}

// ============================================================================
// Garage Config
// ============================================================================

/// The set of configured doors.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GarageConfig {
    /// Configured doors, in publish order
    #[cfg_attr(feature = "serde", serde(rename = "door"))]
    pub doors: Vec<DoorConfig>,
}

impl Default for GarageConfig {
    /// The reference two-door installation.
    fn default() -> Self {
        Self {
            doors: alloc::vec![
                DoorConfig::new("tor_mitte", "Tor Mitte", 16, 27, 22),
                DoorConfig::new("tor_rechts", "Tor Rechts", 26, 24, 23),
            ],
        }
    }
}

impl GarageConfig {
    /// A garage with no doors, to be filled with [`with_door`](Self::with_door).
    pub fn empty() -> Self {
        Self { doors: Vec::new() }
    }

    /// Add a door
    pub fn with_door(mut self, door: DoorConfig) -> Self {
        self.doors.push(door);
        self
    }

    /// Look up a door by id
    pub fn door(&self, id: &str) -> Option<&DoorConfig> {
        self.doors.iter().find(|d| d.id.as_str() == id)
    }

    /// Check that there is at least one door and that ids are unique and
    /// usable as a single topic level.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.doors.is_empty() {
            return Err(ConfigError::NoDoors);
        }
        for (i, door) in self.doors.iter().enumerate() {
            let id = door.id.as_str();
            if id.is_empty() || id.contains(['/', '+', '#']) {
                return Err(ConfigError::InvalidDoorId(id.to_string()));
            }
            if self.doors[..i].iter().any(|d| d.id == door.id) {
                return Err(ConfigError::DuplicateDoorId(id.to_string()));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.mqtt.client_id.as_str(), "garage_pi");
        assert_eq!(config.mqtt.keep_alive_secs, 60);
        assert_eq!(config.mqtt.poll_interval_ms, 5000);
        assert_eq!(config.topics.base.as_str(), "garage");
    }

    #[test]
    fn default_garage_matches_reference_wiring() {
        let garage = GarageConfig::default();
        let mitte = garage.door("tor_mitte").unwrap();
        assert_eq!((mitte.relay_pin, mitte.open_pin, mitte.closed_pin), (16, 27, 22));
        let rechts = garage.door("tor_rechts").unwrap();
        assert_eq!((rechts.relay_pin, rechts.open_pin, rechts.closed_pin), (26, 24, 23));
        assert_eq!(rechts.name.as_str(), "Tor Rechts");
        assert_eq!(rechts.pulse_ms, 500);
        assert!(garage.validate().is_ok());
    }

    #[test]
    fn topic_building() {
        let topics = TopicConfig::default();
        assert_eq!(topics.command_topic("tor_mitte").as_str(), "garage/tor_mitte/set");
        assert_eq!(topics.state_topic("tor_mitte").as_str(), "garage/tor_mitte/state");
        assert_eq!(
            topics.discovery_topic("tor_mitte").as_str(),
            "homeassistant/cover/tor_mitte/config"
        );
    }

    #[test]
    fn topic_building_custom_prefixes() {
        let topics = TopicConfig::default()
            .with_base("home/garage")
            .with_discovery_prefix("ha");
        assert_eq!(topics.command_topic("a").as_str(), "home/garage/a/set");
        assert_eq!(topics.discovery_topic("a").as_str(), "ha/cover/a/config");
        assert_eq!(topics.parse_command_topic("home/garage/a/set"), Some("a"));
    }

    #[test]
    fn parse_command_topic_rejects_foreign_topics() {
        let topics = TopicConfig::default();
        assert_eq!(topics.parse_command_topic("garagex/a/set"), None);
        assert_eq!(topics.parse_command_topic("garage/a/b/set"), None);
        assert_eq!(topics.parse_command_topic("other/a/set"), None);
        assert_eq!(topics.parse_command_topic("garage/a/set/x"), None);
    }

    #[test]
    fn unique_id() {
        let door = DoorConfig::new("tor_rechts", "Tor Rechts", 26, 24, 23);
        assert_eq!(door.unique_id().as_str(), "garage_tor_rechts");
    }

    #[test]
    fn mqtt_auth_detection() {
        assert!(!MqttConfig::default().has_auth());
        assert!(MqttConfig::default().with_auth("pi", "secret").has_auth());
    }

    #[test]
    fn short_string_truncation() {
        let long_input = "a".repeat(100);
        let s = short_string(&long_input);
        assert_eq!(s.len(), MAX_SHORT_STRING);
    }

    #[test]
    fn short_string_truncates_on_char_boundary() {
        // 'ä' is two bytes; 32 of them fill exactly 64 bytes, the 33rd must be dropped
        let input = "ä".repeat(33);
        let s = short_string(&input);
        assert_eq!(s.len(), 64);
        assert_eq!(s.chars().count(), 32);
    }

    #[test]
    fn validate_rejects_empty_garage() {
        assert_eq!(GarageConfig::empty().validate(), Err(ConfigError::NoDoors));
    }

    #[test]
    fn validate_rejects_duplicate_ids() {
        let garage = GarageConfig::empty()
            .with_door(DoorConfig::new("a", "A", 1, 2, 3))
            .with_door(DoorConfig::new("a", "A again", 4, 5, 6));
        assert_eq!(
            garage.validate(),
            Err(ConfigError::DuplicateDoorId("a".into()))
        );
    }

    #[test]
    fn validate_rejects_wildcard_ids() {
        let garage = GarageConfig::empty().with_door(DoorConfig::new("a/+", "A", 1, 2, 3));
        assert_eq!(
            garage.validate(),
            Err(ConfigError::InvalidDoorId("a/+".into()))
        );
    }

    #[test]
    fn validate_rejects_ids_that_overflow_topics() {
        let long_base = "b".repeat(MAX_SHORT_STRING);
        let long_id = "d".repeat(MAX_SHORT_STRING);
        let config = Config::default()
            .with_topics(TopicConfig::default().with_base(&long_base))
            .with_garage(GarageConfig::empty().with_door(DoorConfig::new(&long_id, "D", 1, 2, 3)));

        assert_eq!(config.validate(), Err(ConfigError::TopicTooLong(long_id.clone())));
        // The layout alone is fine
        assert!(config.garage.validate().is_ok());
    }

    #[test]
    fn validate_accepts_longest_id_with_default_topics() {
        let long_id = "d".repeat(MAX_SHORT_STRING);
        let config = Config::default()
            .with_garage(GarageConfig::empty().with_door(DoorConfig::new(&long_id, "D", 1, 2, 3)));
        assert!(config.validate().is_ok());

        let topics = &config.topics;
        assert!(topics.command_topic(&long_id).ends_with("/set"));
        assert!(topics.state_topic(&long_id).ends_with("/state"));
        assert!(topics.discovery_topic(&long_id).ends_with("/config"));
    }

    #[test]
    fn builder_pattern() {
        let config = Config::default()
            .with_mqtt(
                MqttConfig::default()
                    .with_host("broker.local")
                    .with_port(8883)
                    .with_poll_interval_ms(1000),
            )
            .with_topics(TopicConfig::default().with_base("garage2"));

        assert_eq!(config.mqtt.host.as_str(), "broker.local");
        assert_eq!(config.mqtt.port, 8883);
        assert_eq!(config.mqtt.poll_interval_ms, 1000);
        assert_eq!(config.topics.base.as_str(), "garage2");
    }

    #[test]
    fn door_builder() {
        let door = DoorConfig::new("a", "A", 1, 2, 3)
            .with_pulse_ms(300)
            .with_sensor_polarity(Polarity::ActiveHigh)
            .with_relay_polarity(Polarity::ActiveHigh);
        assert_eq!(door.pulse_ms, 300);
        assert_eq!(door.sensor_polarity, Polarity::ActiveHigh);
        assert_eq!(door.relay_polarity, Polarity::ActiveHigh);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn doors_from_toml() {
        let garage: GarageConfig = toml::from_str(
            r#"
            [[door]]
            id = "links"
            name = "Links"
            relay_pin = 5
            open_pin = 6
            closed_pin = 13

            [[door]]
            id = "rechts"
            name = "Rechts"
            relay_pin = 19
            open_pin = 20
            closed_pin = 21
            pulse_ms = 750
            sensor_polarity = "active_high"
            "#,
        )
        .unwrap();

        assert_eq!(garage.doors.len(), 2);
        let links = garage.door("links").unwrap();
        assert_eq!(links.pulse_ms, DEFAULT_PULSE_MS);
        assert_eq!(links.sensor_polarity, Polarity::ActiveLow);
        assert_eq!(links.relay_polarity, Polarity::ActiveLow);
        let rechts = garage.door("rechts").unwrap();
        assert_eq!(rechts.pulse_ms, 750);
        assert_eq!(rechts.sensor_polarity, Polarity::ActiveHigh);
        assert!(garage.validate().is_ok());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn partial_config_from_toml() {
        let config: Config = toml::from_str(
            r#"
            [mqtt]
            host = "192.168.1.10"

            [topics]
            base = "haus/garage"
            "#,
        )
        .unwrap();

        assert_eq!(config.mqtt.host.as_str(), "192.168.1.10");
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.topics.base.as_str(), "haus/garage");
        assert_eq!(config.topics.discovery_prefix.as_str(), "homeassistant");
        assert_eq!(config.garage, GarageConfig::default());
    }
}
