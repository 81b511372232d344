//! Role router: station table, input permissions and validation

mod handlers;

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::net::protocol::{InputEventData, StateUpdateData, StationType, UniverseStateData};
use crate::sim::SharedUniverse;

/// Static description of one crew station
#[derive(Debug, Clone, Serialize)]
pub struct StationInfo {
    #[serde(rename = "type")]
    pub station: StationType,
    pub name: String,
    pub description: String,
    pub permissions: Vec<String>,
    pub input_mapping: HashMap<String, String>,
    pub last_update: Option<DateTime<Utc>>,
    pub is_active: bool,
}

/// Routes station input to the universe and projects state per role
pub struct StationManager {
    universe: SharedUniverse,
    stations: RwLock<HashMap<StationType, StationInfo>>,
}

fn mapping(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(from, to)| (from.to_string(), to.to_string()))
        .collect()
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl StationManager {
    pub fn new(universe: SharedUniverse) -> StationManager {
        let manager = StationManager {
            universe,
            stations: RwLock::new(HashMap::new()),
        };
        manager.initialize_stations();
        manager
    }

    fn initialize_stations(&self) {
        let stations = [
            StationInfo {
                station: StationType::Helm,
                name: "Helm Control".to_string(),
                description: "Ship navigation, movement, and autopilot systems".to_string(),
                permissions: strings(&["navigation", "autopilot", "engines", "time_acceleration"]),
                input_mapping: mapping(&[
                    ("throttle", "engine_throttle"),
                    ("rudder", "ship_rudder"),
                    ("pitch", "ship_pitch"),
                    ("roll", "ship_roll"),
                    ("thrust_vector", "engine_thrust_vector"),
                    ("autopilot_mode", "autopilot_control"),
                    ("warp_factor", "time_acceleration"),
                    ("desired_heading", "navigation_heading"),
                    ("navigation_plot", "navigation_waypoints"),
                ]),
                last_update: None,
                is_active: true,
            },
            StationInfo {
                station: StationType::Tactical,
                name: "Tactical Systems".to_string(),
                description: "Weapons, shields, and combat operations".to_string(),
                permissions: strings(&["weapons", "shields", "targeting", "tactical_sensors"]),
                input_mapping: mapping(&[
                    ("weapon_type", "weapon_selection"),
                    ("target_lock", "target_lock"),
                    ("fire_weapon", "weapon_fire"),
                    ("shield_power", "shield_allocation"),
                    ("weapon_power", "weapon_allocation"),
                    ("raise_shields", "shield_control"),
                    ("tactical_scan", "sensor_sweep"),
                ]),
                last_update: None,
                is_active: true,
            },
            StationInfo {
                station: StationType::Communication,
                name: "Communications".to_string(),
                description: "Ship-to-ship communications and message handling".to_string(),
                permissions: strings(&["communications", "messages", "alerts", "broadcasts"]),
                input_mapping: mapping(&[
                    ("set_frequency", "comm_frequency"),
                    ("send_message", "comm_message"),
                    ("emergency_broadcast", "comm_emergency"),
                    ("comm_auto_response", "comm_auto_response"),
                    ("comm_log_clear", "comm_log"),
                ]),
                last_update: None,
                is_active: true,
            },
            StationInfo {
                station: StationType::Logistics,
                name: "Engineering & Logistics".to_string(),
                description: "Power management, repairs, and resource allocation".to_string(),
                permissions: strings(&["power_management", "repairs", "crew_management", "systems"]),
                input_mapping: mapping(&[
                    ("power_allocation", "power_grid"),
                    ("repair_system", "repair_queue"),
                    ("crew_assignment", "crew_stations"),
                    ("system_priority", "system_priorities"),
                    ("damage_control", "damage_control"),
                ]),
                last_update: None,
                is_active: true,
            },
            StationInfo {
                station: StationType::Captain,
                name: "Captain's Chair".to_string(),
                description: "Emergency controls and ship-wide systems".to_string(),
                permissions: strings(&["emergency", "startup_sequence", "cameras", "ship_wide_controls"]),
                input_mapping: mapping(&[
                    ("alert_level", "ship_alert"),
                    ("emergency_power", "emergency_systems"),
                    ("ship_startup", "ship_startup"),
                    ("camera_control", "viewscreen_camera"),
                    ("general_quarters", "battle_stations"),
                    ("ship_lockdown", "security_lockdown"),
                ]),
                last_update: None,
                is_active: true,
            },
            StationInfo {
                station: StationType::Gamemaster,
                name: "Game Master Console".to_string(),
                description: "Mission control and universe administration".to_string(),
                permissions: strings(&["admin", "spawn_objects", "mission_control", "override_all"]),
                input_mapping: mapping(&[
                    ("spawn_object", "gm_spawn"),
                    ("modify_object", "gm_modify"),
                    ("delete_object", "gm_delete"),
                    ("universe_control", "gm_universe"),
                    ("mission_intervention", "gm_assist"),
                ]),
                last_update: None,
                is_active: true,
            },
        ];

        let mut table = self.stations.write().unwrap();
        for info in stations {
            table.insert(info.station, info);
        }
    }

    /// Validate, permission-check and dispatch one input event.
    /// Returns false when the event was rejected.
    pub fn handle_input(&self, station: StationType, input: &InputEventData) -> bool {
        {
            let table = self.stations.read().unwrap();
            let Some(info) = table.get(&station) else {
                return false;
            };
            if !info.is_active {
                return false;
            }
            if !Self::permits(info, &input.action) {
                debug!(station = ?station, action = %input.action, "Input lacks permission");
                return false;
            }
        }

        if !self.validate_input(station, &input.action, &input.value) {
            debug!(station = ?station, action = %input.action, "Input failed validation");
            return false;
        }

        match station {
            StationType::Helm => self.handle_helm_input(input),
            StationType::Tactical => self.handle_tactical_input(input),
            StationType::Communication => self.handle_communication_input(input),
            StationType::Logistics => self.handle_logistics_input(input),
            StationType::Captain => self.handle_captain_input(input),
            StationType::Gamemaster => self.handle_gamemaster_input(input),
        }

        if let Some(info) = self.stations.write().unwrap().get_mut(&station) {
            info.last_update = Some(Utc::now());
        }
        true
    }

    /// An action is permitted when the station owns it (input mapping), a
    /// permission tag names it, or the station carries override_all.
    fn permits(info: &StationInfo, action: &str) -> bool {
        info.permissions
            .iter()
            .any(|p| p == action || p == "override_all")
            || info.input_mapping.contains_key(action)
    }

    pub fn station_data(&self, station: StationType) -> Option<StationInfo> {
        self.stations.read().unwrap().get(&station).cloned()
    }

    pub fn all_stations(&self) -> Vec<StationInfo> {
        let table = self.stations.read().unwrap();
        StationType::ALL
            .iter()
            .filter_map(|station| table.get(station).cloned())
            .collect()
    }

    pub fn set_station_active(&self, station: StationType, active: bool) {
        if let Some(info) = self.stations.write().unwrap().get_mut(&station) {
            info.is_active = active;
        }
    }

    /// Build the role-filtered projection of the full state
    pub fn filter_update(&self, station: StationType, state: &UniverseStateData) -> StateUpdateData {
        match station {
            StationType::Helm => handlers::filter_helm(state),
            StationType::Tactical => handlers::filter_tactical(state),
            StationType::Communication => handlers::filter_communication(state),
            StationType::Logistics => handlers::filter_logistics(state),
            StationType::Captain => handlers::filter_captain(state),
            StationType::Gamemaster => handlers::filter_gamemaster(state),
        }
    }

    /// Range checks for value-carrying actions. Actions without a listed
    /// rule pass through; structured payloads are checked by their handler.
    pub fn validate_input(&self, station: StationType, action: &str, value: &Value) -> bool {
        match station {
            StationType::Helm => Self::validate_helm(action, value),
            StationType::Tactical => Self::validate_tactical(action, value),
            StationType::Communication => Self::validate_communication(action, value),
            StationType::Logistics => Self::validate_logistics(action, value),
            StationType::Captain => Self::validate_captain(action, value),
            StationType::Gamemaster => true,
        }
    }

    fn validate_helm(action: &str, value: &Value) -> bool {
        match action {
            "throttle" | "rudder" | "pitch" | "roll" => {
                matches!(value.as_f64(), Some(v) if (-1.0..=1.0).contains(&v))
            }
            "warp_factor" => matches!(value.as_f64(), Some(v) if (0.1..=10.0).contains(&v)),
            "desired_heading" | "desired_pitch" => {
                matches!(value.as_f64(), Some(v) if (-180.0..=180.0).contains(&v))
            }
            "autopilot_mode" => matches!(
                value.as_str(),
                Some("manual" | "position" | "heading" | "follow" | "station_keeping")
            ),
            _ => true,
        }
    }

    fn validate_tactical(action: &str, value: &Value) -> bool {
        match action {
            "weapon_type" => matches!(value.as_str(), Some("phaser" | "torpedo" | "mine")),
            "shield_power" | "weapon_power" => {
                matches!(value.as_f64(), Some(v) if (0.0..=1.0).contains(&v))
            }
            "fire_command" | "raise_shields" => value.is_boolean(),
            "target_lock" | "tactical_scan" => value.is_string(),
            _ => true,
        }
    }

    fn validate_communication(action: &str, value: &Value) -> bool {
        match action {
            "set_frequency" => matches!(value.as_f64(), Some(v) if (1.0..=999.9).contains(&v)),
            "priority" => matches!(value.as_i64(), Some(v) if (1..=5).contains(&v)),
            "comm_auto_response" | "comm_log_clear" | "emergency_broadcast" => value.is_boolean(),
            _ => true,
        }
    }

    fn validate_logistics(action: &str, value: &Value) -> bool {
        match action {
            "power_allocation" => match value {
                Value::Object(allocations) => {
                    let mut total = 0.0;
                    for allocation in allocations.values() {
                        let Some(v) = allocation.as_f64() else {
                            return false;
                        };
                        if !(0.0..=1.0).contains(&v) {
                            return false;
                        }
                        total += v;
                    }
                    total <= 1.0
                }
                Value::Number(n) => matches!(n.as_f64(), Some(v) if (0.0..=1.0).contains(&v)),
                Value::Null => true,
                _ => false,
            },
            "system_priority" => match value {
                Value::Object(priorities) => priorities
                    .values()
                    .all(|p| matches!(p.as_i64(), Some(v) if (1..=10).contains(&v))),
                Value::Null => true,
                _ => false,
            },
            "repair_priority" => match value {
                Value::Array(queue) => queue.len() <= 10,
                _ => true,
            },
            "repair_system" => value.is_string(),
            _ => true,
        }
    }

    fn validate_captain(action: &str, value: &Value) -> bool {
        match action {
            "alert_level" => matches!(value.as_i64(), Some(v) if (0..=3).contains(&v)),
            "emergency_power" | "ship_startup" | "general_quarters" | "ship_lockdown" => {
                value.is_boolean()
            }
            "camera_control" => value.is_string(),
            _ => true,
        }
    }

    pub(crate) fn universe(&self) -> &SharedUniverse {
        &self.universe
    }
}
