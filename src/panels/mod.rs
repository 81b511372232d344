//! Panel manager: physical console registry, device mapping and output fan-out

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::net::protocol::{
    DeviceType, InputEventData, PanelConfiguration, PanelDevice, PanelInputData,
    PanelNetworkConfig, PanelOutputData, PanelStatusData, StationType,
};
use crate::stations::StationManager;
use crate::util::math::clamp;

/// Runtime state of one physical panel
#[derive(Debug, Clone, Serialize)]
pub struct PanelState {
    pub id: String,
    pub name: String,
    pub station: StationType,
    pub is_online: bool,
    pub last_seen: DateTime<Utc>,
    pub configuration: PanelConfiguration,
    pub device_states: HashMap<String, Value>,
    pub error_count: usize,
    pub last_errors: Vec<String>,
}

type OutputCallback = Box<dyn Fn(&str, &PanelOutputData) + Send + Sync>;

/// Owns the panel registry and translates device events into station input
pub struct PanelManager {
    stations: Arc<StationManager>,
    panels: RwLock<HashMap<String, PanelState>>,
    output_callbacks: RwLock<Vec<OutputCallback>>,
}

fn device(id: &str, device_type: DeviceType, pin: u32, config: Value) -> PanelDevice {
    let config = match config {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    PanelDevice {
        id: id.to_string(),
        device_type,
        pin,
        config,
    }
}

fn panel_config(
    panel_id: &str,
    station: StationType,
    name: &str,
    devices: Vec<PanelDevice>,
) -> PanelConfiguration {
    PanelConfiguration {
        panel_id: panel_id.to_string(),
        station,
        name: name.to_string(),
        devices,
        network: PanelNetworkConfig {
            server_host: "0.0.0.0".to_string(),
            server_port: 8081,
        },
    }
}

impl PanelManager {
    pub fn new(stations: Arc<StationManager>) -> PanelManager {
        let manager = PanelManager {
            stations,
            panels: RwLock::new(HashMap::new()),
            output_callbacks: RwLock::new(Vec::new()),
        };
        manager.initialize_default_configurations();
        manager
    }

    fn initialize_default_configurations(&self) {
        use DeviceType::*;

        let configs = vec![
            panel_config(
                "helm_main",
                StationType::Helm,
                "Helm Control Panel",
                vec![
                    device("throttle", Potentiometer, 34, json!({"min": 0, "max": 1023})),
                    device("rudder", Potentiometer, 35, json!({"min": 0, "max": 1023})),
                    device("pitch", Potentiometer, 32, json!({"min": 0, "max": 1023})),
                    device("roll", Potentiometer, 33, json!({"min": 0, "max": 1023})),
                    device("autopilot_btn", Button, 18, json!({"pullup": true})),
                    device("warp_dial", Encoder, 19, json!({"steps": 100})),
                    device("engine_led", Led, 2, json!({"pwm": true})),
                    device("nav_display", SevenSegment, 4, json!({"digits": 4})),
                ],
            ),
            panel_config(
                "tactical_weapons",
                StationType::Tactical,
                "Weapons Control Panel",
                vec![
                    device("phaser_btn", Button, 18, json!({"pullup": true})),
                    device("torpedo_btn", Button, 19, json!({"pullup": true})),
                    device("target_lock", Button, 21, json!({"pullup": true})),
                    device("shield_power", Potentiometer, 34, json!({"min": 0, "max": 1023})),
                    device("weapon_power", Potentiometer, 35, json!({"min": 0, "max": 1023})),
                    device("alert_lights", RgbStrip, 5, json!({"pixels": 12})),
                    device("weapon_status", Led, 2, json!({"pwm": false})),
                    device("ammo_display", SevenSegment, 4, json!({"digits": 2})),
                ],
            ),
            panel_config(
                "comm_main",
                StationType::Communication,
                "Communications Panel",
                vec![
                    device("freq_dial", Encoder, 18, json!({"steps": 999})),
                    device("transmit_btn", Button, 19, json!({"pullup": true})),
                    device("emergency_btn", Button, 21, json!({"pullup": true})),
                    device("channel_sel", RotarySwitch, 22, json!({"positions": 8})),
                    device("signal_strength", LedBar, 23, json!({"leds": 10})),
                    device("freq_display", SevenSegment, 4, json!({"digits": 4})),
                    device("status_led", Led, 2, json!({"pwm": false})),
                ],
            ),
            panel_config(
                "engineering_power",
                StationType::Logistics,
                "Power Management Panel",
                vec![
                    device("engines_power", Slider, 34, json!({"min": 0, "max": 1023})),
                    device("shields_power", Slider, 35, json!({"min": 0, "max": 1023})),
                    device("weapons_power", Slider, 32, json!({"min": 0, "max": 1023})),
                    device("life_support_power", Slider, 33, json!({"min": 0, "max": 1023})),
                    device("repair_btn", Button, 18, json!({"pullup": true})),
                    device("emergency_power", Button, 19, json!({"pullup": true})),
                    device("power_display", SevenSegment, 4, json!({"digits": 3})),
                    device("system_leds", LedArray, 5, json!({"count": 8})),
                ],
            ),
            panel_config(
                "captain_console",
                StationType::Captain,
                "Captain's Console",
                vec![
                    device("red_alert", Button, 18, json!({"pullup": true})),
                    device("yellow_alert", Button, 19, json!({"pullup": true})),
                    device("all_stop", Button, 21, json!({"pullup": true})),
                    device("general_quarters", Button, 22, json!({"pullup": true})),
                    device("camera_select", RotarySwitch, 23, json!({"positions": 6})),
                    device("bridge_lights", RgbStrip, 5, json!({"pixels": 20})),
                    device("alert_klaxon", Buzzer, 25, json!({"frequency": 440})),
                ],
            ),
        ];

        let mut panels = self.panels.write().unwrap();
        for config in configs {
            panels.insert(
                config.panel_id.clone(),
                PanelState {
                    id: config.panel_id.clone(),
                    name: config.name.clone(),
                    station: config.station,
                    is_online: false,
                    last_seen: Utc::now(),
                    configuration: config,
                    device_states: HashMap::new(),
                    error_count: 0,
                    last_errors: Vec::new(),
                },
            );
        }
    }

    pub fn configuration(&self, panel_id: &str) -> Option<PanelConfiguration> {
        self.panels
            .read()
            .unwrap()
            .get(panel_id)
            .map(|panel| panel.configuration.clone())
    }

    pub fn set_panel_online(&self, panel_id: &str) {
        if let Some(panel) = self.panels.write().unwrap().get_mut(panel_id) {
            panel.is_online = true;
            panel.last_seen = Utc::now();
        }
    }

    pub fn set_panel_offline(&self, panel_id: &str) {
        if let Some(panel) = self.panels.write().unwrap().get_mut(panel_id) {
            panel.is_online = false;
        }
    }

    pub fn update_panel_status(&self, panel_id: &str, status: &PanelStatusData) {
        if let Some(panel) = self.panels.write().unwrap().get_mut(panel_id) {
            panel.last_seen = status.last_seen;
            panel.error_count = status.errors.len();
            panel.last_errors = status.errors.clone();
        }
    }

    /// Translate one raw device event into a station input and dispatch it.
    /// Input from unknown or offline panels is dropped.
    pub fn process_input(&self, input: &PanelInputData) {
        let (station, action, value) = {
            let mut panels = self.panels.write().unwrap();
            let Some(panel) = panels.get_mut(&input.panel_id) else {
                debug!(panel_id = %input.panel_id, "Input from unknown panel dropped");
                return;
            };
            if !panel.is_online {
                debug!(panel_id = %input.panel_id, "Input from offline panel dropped");
                return;
            }

            panel
                .device_states
                .insert(input.device_id.clone(), input.value.clone());
            panel.last_seen = Utc::now();

            let action = map_device_to_action(panel.station, &input.device_id);
            let value = normalize_value(&panel.configuration, &input.device_id, &input.value);
            (panel.station, action, value)
        };

        let event = InputEventData {
            station,
            action,
            value,
            timestamp: input.timestamp,
            context: input.context.clone(),
        };

        if !self.stations.handle_input(station, &event) {
            debug!(
                panel_id = %input.panel_id,
                device = %input.device_id,
                action = %event.action,
                "Panel input rejected by station router"
            );
        }
    }

    // ------------------------------------------------------------------
    // Output path
    // ------------------------------------------------------------------

    pub fn send_output(&self, panel_id: &str, device_id: &str, command: &str, value: Value) {
        let output = PanelOutputData {
            panel_id: panel_id.to_string(),
            device_id: device_id.to_string(),
            command: command.to_string(),
            value,
            context: Map::new(),
        };

        for callback in self.output_callbacks.read().unwrap().iter() {
            callback(panel_id, &output);
        }
    }

    pub fn set_led(&self, panel_id: &str, device_id: &str, brightness: f64) {
        self.send_output(panel_id, device_id, "set_brightness", Value::from(brightness));
    }

    pub fn set_rgb_strip(&self, panel_id: &str, device_id: &str, colors: &[[f64; 3]]) {
        self.send_output(
            panel_id,
            device_id,
            "set_colors",
            serde_json::to_value(colors).unwrap_or(Value::Null),
        );
    }

    pub fn set_display(&self, panel_id: &str, device_id: &str, text: &str) {
        self.send_output(panel_id, device_id, "set_text", Value::from(text));
    }

    pub fn set_buzzer(&self, panel_id: &str, device_id: &str, frequency: f64, duration: f64) {
        self.send_output(
            panel_id,
            device_id,
            "set_buzzer",
            json!({"frequency": frequency, "duration": duration}),
        );
    }

    pub fn add_output_callback(&self, callback: OutputCallback) {
        self.output_callbacks.write().unwrap().push(callback);
    }

    // ------------------------------------------------------------------
    // Bridge lighting reactions
    // ------------------------------------------------------------------

    /// Repaint alert lighting across the bridge; klaxon from level 2 up
    pub fn apply_alert_level(&self, level: u8) {
        let color = match level {
            0 => [0.0, 0.5, 1.0],
            1 => [1.0, 1.0, 0.0],
            2 => [1.0, 0.5, 0.0],
            _ => [1.0, 0.0, 0.0],
        };

        self.set_rgb_strip("tactical_weapons", "alert_lights", &[color]);
        self.set_rgb_strip("captain_console", "bridge_lights", &[color]);

        if level >= 2 {
            self.set_buzzer("captain_console", "alert_klaxon", 440.0, 2.0);
        }

        info!(level, "Alert lighting applied");
    }

    /// Collision flash on the captain's console
    pub fn flash_bridge_red(&self) {
        self.set_rgb_strip("captain_console", "bridge_lights", &[[1.0, 0.0, 0.0]]);
    }

    pub fn restore_bridge_lights(&self) {
        self.set_rgb_strip("captain_console", "bridge_lights", &[[0.0, 0.5, 1.0]]);
    }

    // ------------------------------------------------------------------
    // Registry access
    // ------------------------------------------------------------------

    pub fn panel(&self, panel_id: &str) -> Option<PanelState> {
        self.panels.read().unwrap().get(panel_id).cloned()
    }

    pub fn all_panels(&self) -> Vec<PanelState> {
        let mut panels: Vec<PanelState> = self.panels.read().unwrap().values().cloned().collect();
        panels.sort_by(|a, b| a.id.cmp(&b.id));
        panels
    }

    pub fn online_panels(&self) -> Vec<String> {
        self.panels
            .read()
            .unwrap()
            .values()
            .filter(|panel| panel.is_online)
            .map(|panel| panel.id.clone())
            .collect()
    }

    pub fn update_configuration(&self, panel_id: &str, config: PanelConfiguration) {
        let mut panels = self.panels.write().unwrap();
        match panels.get_mut(panel_id) {
            Some(panel) => {
                panel.name = config.name.clone();
                panel.station = config.station;
                panel.configuration = config;
            }
            None => {
                panels.insert(
                    panel_id.to_string(),
                    PanelState {
                        id: panel_id.to_string(),
                        name: config.name.clone(),
                        station: config.station,
                        is_online: false,
                        last_seen: Utc::now(),
                        configuration: config,
                        device_states: HashMap::new(),
                        error_count: 0,
                        last_errors: Vec::new(),
                    },
                );
            }
        }
    }

    pub fn remove_panel(&self, panel_id: &str) {
        self.panels.write().unwrap().remove(panel_id);
    }
}

/// Device → semantic action tables, one per station
fn map_device_to_action(station: StationType, device_id: &str) -> String {
    let mapped = match station {
        StationType::Helm => match device_id {
            "throttle" => "throttle",
            "rudder" => "rudder",
            "pitch" => "pitch",
            "roll" => "roll",
            "autopilot_btn" => "autopilot_mode",
            "warp_dial" => "warp_factor",
            _ => device_id,
        },
        StationType::Tactical => match device_id {
            "phaser_btn" | "torpedo_btn" => "fire_weapon",
            "target_lock" => "target_lock",
            "shield_power" => "shield_power",
            "weapon_power" => "weapon_power",
            _ => device_id,
        },
        StationType::Communication => match device_id {
            "freq_dial" => "set_frequency",
            "transmit_btn" => "send_message",
            "emergency_btn" => "emergency_broadcast",
            "channel_sel" => "comm_channel",
            _ => device_id,
        },
        StationType::Logistics => match device_id {
            "engines_power" | "shields_power" | "weapons_power" | "life_support_power" => {
                "power_allocation"
            }
            "repair_btn" => "repair_system",
            "emergency_power" => "emergency_power",
            _ => device_id,
        },
        StationType::Captain => match device_id {
            "red_alert" | "yellow_alert" => "alert_level",
            "all_stop" => "emergency_stop",
            "general_quarters" => "general_quarters",
            "camera_select" => "camera_control",
            _ => device_id,
        },
        StationType::Gamemaster => device_id,
    };
    mapped.to_string()
}

/// Normalize a raw device reading by its declared type
fn normalize_value(config: &PanelConfiguration, device_id: &str, value: &Value) -> Value {
    let Some(device) = config.devices.iter().find(|d| d.id == device_id) else {
        return value.clone();
    };

    match device.device_type {
        DeviceType::Potentiometer | DeviceType::Slider => {
            let raw = value.as_f64().unwrap_or(0.0);
            let min = device.config.get("min").and_then(Value::as_f64).unwrap_or(0.0);
            let max = device.config.get("max").and_then(Value::as_f64).unwrap_or(0.0);
            if max > min {
                Value::from(clamp((raw - min) / (max - min), 0.0, 1.0))
            } else {
                Value::from(0.0)
            }
        }
        DeviceType::Encoder => {
            let raw = value.as_f64().unwrap_or(0.0);
            let steps = device.config.get("steps").and_then(Value::as_f64).unwrap_or(0.0);
            if steps != 0.0 {
                Value::from(raw / steps)
            } else {
                Value::from(0.0)
            }
        }
        _ => value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::config::UniverseConfig;
    use crate::sim::Universe;

    fn manager() -> PanelManager {
        let universe = Arc::new(RwLock::new(Universe::new(&UniverseConfig::default())));
        let stations = Arc::new(StationManager::new(universe));
        PanelManager::new(stations)
    }

    fn panel_input(panel_id: &str, device_id: &str, value: Value) -> PanelInputData {
        PanelInputData {
            panel_id: panel_id.to_string(),
            device_id: device_id.to_string(),
            value,
            timestamp: Utc::now(),
            context: Map::new(),
        }
    }

    #[test]
    fn five_default_panels_are_configured() {
        let manager = manager();
        let panels = manager.all_panels();
        assert_eq!(panels.len(), 5);
        assert!(panels.iter().all(|p| !p.is_online));
        assert!(manager.configuration("helm_main").is_some());
        assert!(manager.configuration("unknown").is_none());
    }

    #[test]
    fn potentiometer_midpoint_reaches_helm_throttle() {
        let manager = manager();
        manager.set_panel_online("helm_main");

        manager.process_input(&panel_input("helm_main", "throttle", Value::from(512)));

        let universe = manager.stations.universe().read().unwrap();
        let ship = universe.ship("player_ship").unwrap();
        let fraction = ship.engine_thrust / ship.max_thrust;
        assert!((fraction - 0.5).abs() < 0.001, "fraction = {fraction}");
    }

    #[test]
    fn offline_panel_input_is_dropped() {
        let manager = manager();
        manager.process_input(&panel_input("helm_main", "throttle", Value::from(1023)));

        let universe = manager.stations.universe().read().unwrap();
        assert_eq!(universe.ship("player_ship").unwrap().engine_thrust, 0.0);
    }

    #[test]
    fn unknown_panel_input_is_dropped() {
        let manager = manager();
        manager.process_input(&panel_input("ghost_panel", "throttle", Value::from(512)));
        // No panic, no effect
        let universe = manager.stations.universe().read().unwrap();
        assert_eq!(universe.ship("player_ship").unwrap().engine_thrust, 0.0);
    }

    #[test]
    fn normalization_clamps_and_scales() {
        let config = manager().configuration("helm_main").unwrap();

        let half = normalize_value(&config, "throttle", &Value::from(512));
        assert!((half.as_f64().unwrap() - 0.5).abs() < 0.001);

        let over = normalize_value(&config, "throttle", &Value::from(2000));
        assert_eq!(over.as_f64().unwrap(), 1.0);

        let encoder = normalize_value(&config, "warp_dial", &Value::from(50));
        assert!((encoder.as_f64().unwrap() - 0.5).abs() < 1e-9);

        // Buttons pass through untouched
        let button = normalize_value(&config, "autopilot_btn", &Value::from("manual"));
        assert_eq!(button, Value::from("manual"));
    }

    #[test]
    fn device_mapping_tables() {
        assert_eq!(map_device_to_action(StationType::Helm, "warp_dial"), "warp_factor");
        assert_eq!(
            map_device_to_action(StationType::Tactical, "phaser_btn"),
            "fire_weapon"
        );
        assert_eq!(
            map_device_to_action(StationType::Captain, "red_alert"),
            "alert_level"
        );
        assert_eq!(
            map_device_to_action(StationType::Logistics, "engines_power"),
            "power_allocation"
        );
        // Unknown devices map to themselves
        assert_eq!(map_device_to_action(StationType::Helm, "custom"), "custom");
    }

    #[test]
    fn captain_alert_button_raises_alert() {
        let manager = manager();
        manager.set_panel_online("captain_console");

        manager.process_input(&panel_input("captain_console", "red_alert", Value::from(3)));

        let universe = manager.stations.universe().read().unwrap();
        assert_eq!(universe.alert_level(), 3);
    }

    #[test]
    fn outputs_fan_out_through_callbacks() {
        let manager = manager();
        let received: Arc<Mutex<Vec<PanelOutputData>>> = Arc::new(Mutex::new(Vec::new()));

        let sink = received.clone();
        manager.add_output_callback(Box::new(move |_, output| {
            sink.lock().unwrap().push(output.clone());
        }));

        manager.set_led("helm_main", "engine_led", 0.8);
        manager.set_display("helm_main", "nav_display", "1701");

        let outputs = received.lock().unwrap();
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].command, "set_brightness");
        assert_eq!(outputs[0].value, Value::from(0.8));
        assert_eq!(outputs[1].command, "set_text");
    }

    #[test]
    fn alert_lighting_repaints_and_sounds_klaxon() {
        let manager = manager();
        let received: Arc<Mutex<Vec<PanelOutputData>>> = Arc::new(Mutex::new(Vec::new()));

        let sink = received.clone();
        manager.add_output_callback(Box::new(move |_, output| {
            sink.lock().unwrap().push(output.clone());
        }));

        manager.apply_alert_level(3);

        let outputs = received.lock().unwrap();
        let strips: Vec<&PanelOutputData> =
            outputs.iter().filter(|o| o.command == "set_colors").collect();
        assert_eq!(strips.len(), 2);
        let buzzers: Vec<&PanelOutputData> =
            outputs.iter().filter(|o| o.command == "set_buzzer").collect();
        assert_eq!(buzzers.len(), 1);
        assert_eq!(buzzers[0].panel_id, "captain_console");
    }

    #[test]
    fn low_alert_skips_the_klaxon() {
        let manager = manager();
        let received: Arc<Mutex<Vec<PanelOutputData>>> = Arc::new(Mutex::new(Vec::new()));

        let sink = received.clone();
        manager.add_output_callback(Box::new(move |_, output| {
            sink.lock().unwrap().push(output.clone());
        }));

        manager.apply_alert_level(1);

        let outputs = received.lock().unwrap();
        assert!(outputs.iter().all(|o| o.command != "set_buzzer"));
    }

    #[test]
    fn status_update_records_errors() {
        let manager = manager();
        let status = PanelStatusData {
            panel_id: "helm_main".to_string(),
            status: "degraded".to_string(),
            last_seen: Utc::now(),
            device_count: 8,
            errors: vec!["adc drift".to_string()],
        };
        manager.update_panel_status("helm_main", &status);

        let panel = manager.panel("helm_main").unwrap();
        assert_eq!(panel.error_count, 1);
        assert_eq!(panel.last_errors, vec!["adc drift".to_string()]);
    }
}
