//! Wire protocol message definitions
//! Shared by the WebSocket station transport and the TCP panel transport

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::sim::object::ObjectKind;
use crate::util::math::{Quaternion, Vector3};

/// Message types carried in the envelope `type` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    // Station (WebSocket) message types
    StateUpdate,
    InputEvent,
    StationConnect,
    Heartbeat,
    Error,
    MissionLoad,
    MissionControl,
    GamemasterCommand,

    // Panel (TCP) message types
    PanelConfig,
    PanelInput,
    PanelOutput,
    PanelHeartbeat,
    PanelStatus,
}

impl MessageType {
    /// Every defined message type, used by the round-trip tests
    pub const ALL: [MessageType; 13] = [
        MessageType::StateUpdate,
        MessageType::InputEvent,
        MessageType::StationConnect,
        MessageType::Heartbeat,
        MessageType::Error,
        MessageType::MissionLoad,
        MessageType::MissionControl,
        MessageType::GamemasterCommand,
        MessageType::PanelConfig,
        MessageType::PanelInput,
        MessageType::PanelOutput,
        MessageType::PanelHeartbeat,
        MessageType::PanelStatus,
    ];
}

/// Crew station identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StationType {
    Helm,
    Tactical,
    Communication,
    Logistics,
    Captain,
    Gamemaster,
}

impl StationType {
    pub const ALL: [StationType; 6] = [
        StationType::Helm,
        StationType::Tactical,
        StationType::Communication,
        StationType::Logistics,
        StationType::Captain,
        StationType::Gamemaster,
    ];
}

/// JSON envelope: `{type, timestamp, data}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub msg_type: MessageType,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Message {
    pub fn new<T: Serialize>(msg_type: MessageType, data: &T) -> Result<Message, ProtocolError> {
        Ok(Message {
            msg_type,
            timestamp: Utc::now(),
            data: Some(serde_json::to_value(data)?),
        })
    }

    /// Decode the payload into a typed structure
    pub fn parse_data<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        match &self.data {
            Some(value) => Ok(serde_json::from_value(value.clone())?),
            None => Err(ProtocolError::MissingData),
        }
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Message, ProtocolError> {
        Ok(serde_json::from_str(raw)?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Message has no data payload")]
    MissingData,
}

// ============================================================================
// Station payloads
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationConnectData {
    pub station: StationType,
    pub client_id: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatData {
    pub client_id: String,
    pub ping: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorData {
    pub code: u16,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Snapshot of one object as seen on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireObject {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ObjectKind,
    pub name: String,
    pub position: Vector3,
    pub velocity: Vector3,
    pub rotation: Quaternion,
    pub scale: Vector3,
    pub health: f64,
    pub max_health: f64,
    pub shield: f64,
    pub max_shield: f64,
    pub power: f64,
    pub max_power: f64,
    pub mass: f64,
    pub radius: f64,
    pub is_player_ship: bool,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub properties: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireEffect {
    pub id: String,
    #[serde(rename = "type")]
    pub effect_type: String,
    pub position: Vector3,
    pub direction: Vector3,
    pub color: [f64; 3],
    pub intensity: f64,
    pub duration: f64,
    pub time_left: f64,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub properties: Map<String, Value>,
}

/// Full universe snapshot handed to the per-station filters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniverseStateData {
    pub objects: Vec<WireObject>,
    pub effects: Vec<WireEffect>,
    pub player_ship_id: String,
    pub time_acceleration: f64,
    pub alert_level: u8,
    pub timestamp: DateTime<Utc>,
}

/// Role-filtered state frame
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateUpdateData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full: Option<UniverseStateData>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub objects: Vec<WireObject>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub effects: Vec<WireEffect>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub removed: Vec<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub meta: Map<String, Value>,
}

impl StateUpdateData {
    /// Frames with nothing to show are dropped by the broadcaster
    pub fn is_empty(&self) -> bool {
        self.full.is_none() && self.objects.is_empty() && self.effects.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputEventData {
    pub station: StationType,
    pub action: String,
    #[serde(default)]
    pub value: Value,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub context: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelmInputData {
    #[serde(default)]
    pub throttle: f64,
    #[serde(default)]
    pub rudder: f64,
    #[serde(default)]
    pub pitch: f64,
    #[serde(default)]
    pub roll: f64,
    #[serde(default)]
    pub thrust: Vector3,
    #[serde(default)]
    pub desired_heading: f64,
    #[serde(default)]
    pub autopilot_mode: String,
    #[serde(default)]
    pub warp_factor: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TacticalInputData {
    #[serde(default)]
    pub weapon_type: String,
    #[serde(default)]
    pub target_id: String,
    #[serde(default)]
    pub target_position: Vector3,
    #[serde(default)]
    pub fire_command: bool,
    #[serde(default)]
    pub shield_power: f64,
    #[serde(default)]
    pub weapon_power: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunicationInputData {
    #[serde(default)]
    pub frequency: f64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub target_ship_id: String,
    #[serde(default)]
    pub broadcast_type: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub auto_response: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogisticsInputData {
    #[serde(default)]
    pub power_allocation: std::collections::HashMap<String, f64>,
    #[serde(default)]
    pub repair_priority: Vec<String>,
    #[serde(default)]
    pub crew_assignment: std::collections::HashMap<String, String>,
    #[serde(default)]
    pub system_priority: std::collections::HashMap<String, i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameMasterCommand {
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Vector3>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_def: Option<WireObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub context: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissionLoadData {
    pub mission_file: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub parameters: Map<String, Value>,
}

// ============================================================================
// Panel payloads
// ============================================================================

/// Peripheral types a panel can declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    Button,
    Potentiometer,
    Slider,
    Encoder,
    Led,
    #[serde(rename = "7segment")]
    SevenSegment,
    RgbStrip,
    LedBar,
    LedArray,
    RotarySwitch,
    Buzzer,
    Switch,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelDevice {
    pub id: String,
    #[serde(rename = "type")]
    pub device_type: DeviceType,
    pub pin: u32,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub config: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelConfiguration {
    pub panel_id: String,
    pub station: StationType,
    pub name: String,
    pub devices: Vec<PanelDevice>,
    pub network: PanelNetworkConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PanelNetworkConfig {
    pub server_host: String,
    pub server_port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelInputData {
    #[serde(default)]
    pub panel_id: String,
    pub device_id: String,
    pub value: Value,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub context: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelOutputData {
    pub panel_id: String,
    pub device_id: String,
    pub command: String,
    pub value: Value,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub context: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelStatusData {
    pub panel_id: String,
    #[serde(default)]
    pub status: String,
    pub last_seen: DateTime<Utc>,
    #[serde(default)]
    pub device_count: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_payload(msg_type: MessageType) -> Value {
        match msg_type {
            MessageType::StationConnect => serde_json::json!({
                "station": "helm",
                "client_id": "console-1",
                "version": "1.0.0",
            }),
            MessageType::InputEvent => serde_json::json!({
                "station": "helm",
                "action": "throttle",
                "value": 0.5,
                "timestamp": "2024-03-01T12:00:00Z",
            }),
            MessageType::Heartbeat | MessageType::PanelHeartbeat => serde_json::json!({
                "client_id": "console-1",
                "ping": "2024-03-01T12:00:00Z",
            }),
            MessageType::Error => serde_json::json!({
                "code": 400,
                "message": "Input rejected",
            }),
            MessageType::PanelInput => serde_json::json!({
                "panel_id": "helm_main",
                "device_id": "throttle",
                "value": 512,
                "timestamp": "2024-03-01T12:00:00Z",
            }),
            _ => serde_json::json!({"key": "value", "nested": {"n": 1.25}}),
        }
    }

    #[test]
    fn every_message_type_round_trips() {
        for msg_type in MessageType::ALL {
            let payload = sample_payload(msg_type);
            let msg = Message {
                msg_type,
                timestamp: Utc::now(),
                data: Some(payload.clone()),
            };

            let encoded = msg.to_json().unwrap();
            let decoded = Message::from_json(&encoded).unwrap();

            assert_eq!(decoded.msg_type, msg.msg_type);
            assert_eq!(decoded.timestamp, msg.timestamp);
            assert_eq!(decoded.data, Some(payload));
        }
    }

    #[test]
    fn message_type_wire_names_are_snake_case() {
        let json = serde_json::to_string(&MessageType::GamemasterCommand).unwrap();
        assert_eq!(json, "\"gamemaster_command\"");
        let json = serde_json::to_string(&MessageType::PanelConfig).unwrap();
        assert_eq!(json, "\"panel_config\"");
    }

    #[test]
    fn seven_segment_keeps_numeric_wire_name() {
        let json = serde_json::to_string(&DeviceType::SevenSegment).unwrap();
        assert_eq!(json, "\"7segment\"");
        let parsed: DeviceType = serde_json::from_str("\"7segment\"").unwrap();
        assert_eq!(parsed, DeviceType::SevenSegment);
    }

    #[test]
    fn empty_state_update_is_detected() {
        let update = StateUpdateData::default();
        assert!(update.is_empty());

        let update = StateUpdateData {
            meta: {
                let mut m = Map::new();
                m.insert("alert_level".to_string(), Value::from(2));
                m
            },
            ..Default::default()
        };
        // Meta alone does not make a frame worth sending
        assert!(update.is_empty());
    }

    #[test]
    fn input_event_parses_from_envelope() {
        let raw = r#"{
            "type": "input_event",
            "timestamp": "2024-03-01T12:00:00Z",
            "data": {
                "station": "tactical",
                "action": "fire_weapon",
                "value": true,
                "timestamp": "2024-03-01T12:00:00Z",
                "context": {"tactical_data": {"weapon_type": "torpedo"}}
            }
        }"#;

        let msg = Message::from_json(raw).unwrap();
        assert_eq!(msg.msg_type, MessageType::InputEvent);

        let input: InputEventData = msg.parse_data().unwrap();
        assert_eq!(input.station, StationType::Tactical);
        assert_eq!(input.action, "fire_weapon");
        assert!(input.context.contains_key("tactical_data"));
    }

    #[test]
    fn missing_data_is_an_error() {
        let msg = Message {
            msg_type: MessageType::Heartbeat,
            timestamp: Utc::now(),
            data: None,
        };
        assert!(msg.parse_data::<HeartbeatData>().is_err());
    }
}
