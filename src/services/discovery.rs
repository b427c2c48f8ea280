//! Home Assistant MQTT discovery for garage doors.
//!
//! Each door is announced as a `cover` with device class `garage` on
//! `<discovery_prefix>/cover/<id>/config`. The payload is retained so the hub
//! picks it up after its own restarts.

use serde::Serialize;

use crate::config::{DoorConfig, LongString, TopicConfig};
use crate::{DoorCommand, DoorState};

/// Home Assistant device class for garage doors.
pub const DEVICE_CLASS_GARAGE: &str = "garage";

/// Discovery payload for one `cover` entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HaCoverDiscovery<'a> {
    /// Display name
    pub name: &'a str,
    /// Topic the hub publishes commands to
    pub command_topic: LongString,
    /// Topic the hub reads state from
    pub state_topic: LongString,
    /// Command token for opening
    pub payload_open: &'static str,
    /// Command token for closing
    pub payload_close: &'static str,
    /// Command token for stopping
    pub payload_stop: &'static str,
    /// State token for `open`
    pub state_open: &'static str,
    /// State token for `closed`
    pub state_closed: &'static str,
    /// State token for `opening`
    pub state_opening: &'static str,
    /// State token for `closing`
    pub state_closing: &'static str,
    /// Always `garage`
    pub device_class: &'static str,
    /// Stable entity id (`garage_<id>`)
    pub unique_id: LongString,
}

impl<'a> HaCoverDiscovery<'a> {
    /// Build the descriptor for one door.
    pub fn new(door: &'a DoorConfig, topics: &TopicConfig) -> Self {
        let id = door.id.as_str();
        Self {
            name: door.name.as_str(),
            command_topic: topics.command_topic(id),
            state_topic: topics.state_topic(id),
            payload_open: DoorCommand::Open.as_str(),
            payload_close: DoorCommand::Close.as_str(),
            payload_stop: DoorCommand::Stop.as_str(),
            state_open: DoorState::Open.as_str(),
            state_closed: DoorState::Closed.as_str(),
            state_opening: DoorState::Opening.as_str(),
            state_closing: DoorState::Closing.as_str(),
            device_class: DEVICE_CLASS_GARAGE,
            unique_id: door.unique_id(),
        }
    }

    /// Serialize to the JSON published on the discovery topic.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn mitte() -> DoorConfig {
        DoorConfig::new("tor_mitte", "Tor Mitte", 16, 27, 22)
    }

    #[test]
    fn test_describe_garage_cover() {
        let door = mitte();
        let discovery = HaCoverDiscovery::new(&door, &TopicConfig::default());
        let json: Value = serde_json::from_str(&discovery.to_json().unwrap()).unwrap();

        assert_eq!(json["name"], "Tor Mitte");
        assert_eq!(json["command_topic"], "garage/tor_mitte/set");
        assert_eq!(json["state_topic"], "garage/tor_mitte/state");
        assert_eq!(json["payload_open"], "open");
        assert_eq!(json["payload_close"], "close");
        assert_eq!(json["payload_stop"], "stop");
        assert_eq!(json["state_open"], "open");
        assert_eq!(json["state_closed"], "closed");
        assert_eq!(json["state_opening"], "opening");
        assert_eq!(json["state_closing"], "closing");
        assert_eq!(json["device_class"], "garage");
        assert_eq!(json["unique_id"], "garage_tor_mitte");
    }

    #[test]
    fn test_custom_prefixes() {
        let door = mitte();
        let topics = TopicConfig::default().with_base("home/garage");
        let discovery = HaCoverDiscovery::new(&door, &topics);
        assert_eq!(discovery.command_topic.as_str(), "home/garage/tor_mitte/set");
        assert_eq!(discovery.state_topic.as_str(), "home/garage/tor_mitte/state");
    }

    #[test]
    fn test_exactly_the_advertised_fields() {
        let door = mitte();
        let json: Value =
            serde_json::to_value(HaCoverDiscovery::new(&door, &TopicConfig::default())).unwrap();
        assert_eq!(json.as_object().unwrap().len(), 12);
    }
}
