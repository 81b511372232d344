//! Per-station input handlers and state projections

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::net::protocol::{
    CommunicationInputData, GameMasterCommand, HelmInputData, InputEventData, LogisticsInputData,
    StateUpdateData, TacticalInputData, UniverseStateData,
};
use crate::sim::object::Object;
use crate::sim::ObjectKind as WireKind;
use crate::util::math::Vector3;

use super::StationManager;

/// Deserialize a typed payload from an input event's context map
fn context_payload<T: serde::de::DeserializeOwned>(input: &InputEventData, key: &str) -> Option<T> {
    let value = input.context.get(key)?.clone();
    serde_json::from_value(value).ok()
}

impl StationManager {
    pub(super) fn handle_helm_input(&self, input: &InputEventData) {
        let mut universe = self.universe().write().unwrap();
        let ship_id = universe.player_ship_id().to_string();
        if universe.ship(&ship_id).is_none() {
            return;
        }

        match input.action.as_str() {
            "throttle" => {
                if let Some(throttle) = input.value.as_f64() {
                    if let Some(ship) = universe.ship_mut(&ship_id) {
                        ship.engine_thrust = throttle * ship.max_thrust;
                    }
                }
            }

            "thrust_vector" => {
                if let Some(helm_data) = context_payload::<HelmInputData>(input, "helm_data") {
                    let thrust = universe
                        .ship(&ship_id)
                        .map(|ship| helm_data.thrust.normalize() * ship.engine_thrust)
                        .unwrap_or(Vector3::ZERO);
                    if let Some(obj) = universe.object_mut(&ship_id) {
                        obj.apply_force(thrust);
                    }
                }
            }

            "desired_heading" => {
                if let Some(heading) = input.value.as_f64() {
                    if let Some(ship) = universe.ship_mut(&ship_id) {
                        ship.set_autopilot_heading(heading);
                    }
                }
            }

            "autopilot_mode" => {
                if let Some(mode) = input.value.as_str() {
                    match mode {
                        "manual" => {
                            if let Some(ship) = universe.ship_mut(&ship_id) {
                                ship.disable_autopilot();
                            }
                        }
                        "station_keeping" => {
                            if let Some(ship) = universe.ship_mut(&ship_id) {
                                ship.set_autopilot_station_keeping();
                            }
                        }
                        "position" => {
                            if let Some(target) = input
                                .context
                                .get("target_position")
                                .and_then(|v| serde_json::from_value::<Vector3>(v.clone()).ok())
                            {
                                if let Some(ship) = universe.ship_mut(&ship_id) {
                                    ship.set_autopilot_position(target);
                                }
                            }
                        }
                        "follow" => {
                            if let Some(target_id) = input
                                .context
                                .get("follow_target_id")
                                .and_then(Value::as_str)
                            {
                                let target_id = target_id.to_string();
                                if let Some(ship) = universe.ship_mut(&ship_id) {
                                    ship.set_autopilot_follow(target_id);
                                }
                            }
                        }
                        _ => {}
                    }
                }
            }

            "warp_factor" => {
                if let Some(factor) = input.value.as_f64() {
                    universe.set_time_acceleration(factor);
                }
            }

            "navigation_plot" => {
                if let Ok(waypoints) =
                    serde_json::from_value::<Vec<Vector3>>(input.value.clone())
                {
                    if let Some(first) = waypoints.first().copied() {
                        if let Some(ship) = universe.ship_mut(&ship_id) {
                            ship.set_autopilot_position(first);
                        }
                    }
                }
            }

            _ => debug!(action = %input.action, "Unhandled helm action"),
        }
    }

    pub(super) fn handle_tactical_input(&self, input: &InputEventData) {
        let mut universe = self.universe().write().unwrap();
        let ship_id = universe.player_ship_id().to_string();
        if universe.ship(&ship_id).is_none() {
            return;
        }

        match input.action.as_str() {
            "fire_weapon" => {
                let Some(tactical) = context_payload::<TacticalInputData>(input, "tactical_data")
                else {
                    return;
                };

                let weapon_id = if tactical.weapon_type == "torpedo" {
                    "torpedo_launcher_1"
                } else {
                    "phaser_array_1"
                };

                let target_position = (tactical.target_position.length() > 0.0)
                    .then_some(tactical.target_position);
                let target_id =
                    (!tactical.target_id.is_empty()).then_some(tactical.target_id.as_str());

                if !universe.fire_weapon(&ship_id, weapon_id, target_id, target_position) {
                    debug!(weapon = weapon_id, "Weapon fire rejected");
                }
            }

            "target_lock" => {
                if let Some(target_id) = input.value.as_str() {
                    let target_id = Value::from(target_id);
                    if let Some(obj) = universe.object_mut(&ship_id) {
                        obj.extra.insert("current_target".to_string(), target_id);
                    }
                }
            }

            "shield_power" => {
                if let Some(power) = input.value.as_f64() {
                    if let Some(ship) = universe.ship_mut(&ship_id) {
                        if let Some(sys) = ship.systems.get_mut("shields") {
                            sys.efficiency = power;
                        }
                    }
                }
            }

            "weapon_power" => {
                if let Some(power) = input.value.as_f64() {
                    if let Some(ship) = universe.ship_mut(&ship_id) {
                        if let Some(sys) = ship.systems.get_mut("weapons") {
                            sys.efficiency = power;
                        }
                    }
                }
            }

            "raise_shields" => {
                if let Some(raise) = input.value.as_bool() {
                    if let Some(ship) = universe.ship_mut(&ship_id) {
                        if let Some(sys) = ship.systems.get_mut("shields") {
                            sys.is_online = raise;
                        }
                    }
                }
            }

            "tactical_scan" => {
                if let Some(target_id) = input.value.as_str() {
                    let scan = universe.object(target_id).and_then(|target| {
                        let ship_obj = universe.object(&ship_id)?;
                        let in_range = universe
                            .ship(&ship_id)
                            .map(|ship| ship.sensor_range >= ship_obj.distance_to(target))
                            .unwrap_or(false);
                        in_range.then(|| serde_json::to_value(target.to_wire()).ok())?
                    });

                    if let Some(result) = scan {
                        if let Some(obj) = universe.object_mut(&ship_id) {
                            obj.extra.insert("scan_result".to_string(), result);
                        }
                    }
                }
            }

            _ => debug!(action = %input.action, "Unhandled tactical action"),
        }
    }

    pub(super) fn handle_communication_input(&self, input: &InputEventData) {
        let mut universe = self.universe().write().unwrap();
        let ship_id = universe.player_ship_id().to_string();

        match input.action.as_str() {
            "send_message" => {
                let Some(comm) = context_payload::<CommunicationInputData>(input, "comm_data")
                else {
                    return;
                };

                let message = serde_json::json!({
                    "from": ship_id,
                    "to": comm.target_ship_id,
                    "message": comm.message,
                    "frequency": comm.frequency,
                    "priority": comm.priority,
                    "timestamp": input.timestamp,
                });

                if let Some(obj) = universe.object_mut(&ship_id) {
                    if comm.target_ship_id == "broadcast" {
                        obj.extra.insert("last_broadcast".to_string(), message);
                    } else {
                        let queue = obj
                            .extra
                            .entry("outgoing_messages".to_string())
                            .or_insert_with(|| Value::Array(Vec::new()));
                        if let Value::Array(list) = queue {
                            list.push(message);
                        }
                    }
                }
            }

            "set_frequency" => {
                if let Some(frequency) = input.value.as_f64() {
                    if let Some(obj) = universe.object_mut(&ship_id) {
                        obj.extra
                            .insert("comm_frequency".to_string(), Value::from(frequency));
                    }
                }
            }

            "emergency_broadcast" => {
                if input.value.as_bool() == Some(true) {
                    let name = universe
                        .object(&ship_id)
                        .map(|obj| obj.name.clone())
                        .unwrap_or_default();
                    let message = serde_json::json!({
                        "from": ship_id,
                        "type": "emergency",
                        "message": format!(
                            "Mayday! Mayday! This is {name} requesting immediate assistance!"
                        ),
                        "priority": 1,
                        "timestamp": input.timestamp,
                    });
                    if let Some(obj) = universe.object_mut(&ship_id) {
                        obj.extra.insert("emergency_broadcast".to_string(), message);
                    }
                }
            }

            "comm_auto_response" => {
                if let Some(enabled) = input.value.as_bool() {
                    if let Some(obj) = universe.object_mut(&ship_id) {
                        obj.extra
                            .insert("auto_response_enabled".to_string(), Value::from(enabled));
                    }
                }
            }

            "comm_log_clear" => {
                if input.value.as_bool() == Some(true) {
                    if let Some(obj) = universe.object_mut(&ship_id) {
                        obj.extra
                            .insert("comm_log".to_string(), Value::Array(Vec::new()));
                    }
                }
            }

            _ => debug!(action = %input.action, "Unhandled communication action"),
        }
    }

    pub(super) fn handle_logistics_input(&self, input: &InputEventData) {
        let mut universe = self.universe().write().unwrap();
        let ship_id = universe.player_ship_id().to_string();
        if universe.ship(&ship_id).is_none() {
            return;
        }

        match input.action.as_str() {
            "power_allocation" => {
                let allocations = context_payload::<LogisticsInputData>(input, "logistics_data")
                    .map(|data| data.power_allocation)
                    .or_else(|| serde_json::from_value(input.value.clone()).ok());

                if let Some(allocations) = allocations {
                    if let Some(ship) = universe.ship_mut(&ship_id) {
                        for (name, allocation) in allocations {
                            if let Some(sys) = ship.systems.get_mut(&name) {
                                sys.efficiency = allocation;
                            }
                        }
                    }
                }
            }

            "repair_system" => {
                const REPAIR_AMOUNT: f64 = 10.0;
                if let Some(name) = input.value.as_str() {
                    let name = name.to_string();
                    if let Some(ship) = universe.ship_mut(&ship_id) {
                        ship.repair_system(&name, REPAIR_AMOUNT);
                    }
                }
            }

            "system_priority" => {
                if let Some(data) = context_payload::<LogisticsInputData>(input, "logistics_data")
                {
                    if let Some(ship) = universe.ship_mut(&ship_id) {
                        for (name, priority) in data.system_priority {
                            if let Some(sys) = ship.systems.get_mut(&name) {
                                sys.priority = priority;
                            }
                        }
                    }
                }
            }

            "crew_assignment" => {
                if let Some(data) = context_payload::<LogisticsInputData>(input, "logistics_data")
                {
                    let assignments =
                        serde_json::to_value(data.crew_assignment).unwrap_or(Value::Null);
                    if let Some(obj) = universe.object_mut(&ship_id) {
                        obj.extra.insert("crew_assignments".to_string(), assignments);
                    }
                }
            }

            "damage_control" => {
                if let Some(enabled) = input.value.as_bool() {
                    if let Some(obj) = universe.object_mut(&ship_id) {
                        obj.extra
                            .insert("damage_control_active".to_string(), Value::from(enabled));
                    }
                }
            }

            "resource_transfer" => {
                if let Some(transfer) = input.context.get("transfer").cloned() {
                    if let Some(obj) = universe.object_mut(&ship_id) {
                        obj.extra.insert("last_transfer".to_string(), transfer);
                    }
                }
            }

            _ => debug!(action = %input.action, "Unhandled logistics action"),
        }
    }

    pub(super) fn handle_captain_input(&self, input: &InputEventData) {
        let mut universe = self.universe().write().unwrap();
        let ship_id = universe.player_ship_id().to_string();

        match input.action.as_str() {
            "alert_level" => {
                if let Some(level) = input.value.as_i64() {
                    universe.set_alert_level(level);
                    if let Some(obj) = universe.object_mut(&ship_id) {
                        obj.extra
                            .insert("alert_condition".to_string(), Value::from(level));
                    }
                }
            }

            "general_quarters" => {
                if input.value.as_bool() == Some(true) {
                    universe.set_alert_level(3);
                    if let Some(obj) = universe.object_mut(&ship_id) {
                        obj.extra
                            .insert("battle_stations".to_string(), Value::from(true));
                    }
                }
            }

            "emergency_power" => {
                if let Some(emergency) = input.value.as_bool() {
                    if let Some(ship) = universe.ship_mut(&ship_id) {
                        for sys in ship.systems.values_mut() {
                            if sys.is_critical {
                                sys.efficiency = 1.2;
                            }
                        }
                    }
                    if let Some(obj) = universe.object_mut(&ship_id) {
                        obj.extra
                            .insert("emergency_power".to_string(), Value::from(emergency));
                    }
                }
            }

            "ship_startup" => {
                if input.value.as_bool() == Some(true) {
                    if let Some(ship) = universe.ship_mut(&ship_id) {
                        for sys in ship.systems.values_mut() {
                            sys.is_online = true;
                            sys.health = sys.max_health;
                        }
                    }
                    if let Some(obj) = universe.object_mut(&ship_id) {
                        obj.power = obj.max_power;
                        obj.shield = obj.max_shield;
                    }
                    info!("Ship startup sequence complete");
                }
            }

            "camera_control" => {
                if let Some(camera) = input.value.as_str() {
                    let camera = Value::from(camera);
                    if let Some(obj) = universe.object_mut(&ship_id) {
                        obj.extra.insert("viewscreen_camera".to_string(), camera);
                    }
                }
            }

            "ship_lockdown" => {
                if let Some(lockdown) = input.value.as_bool() {
                    if let Some(obj) = universe.object_mut(&ship_id) {
                        obj.extra
                            .insert("lockdown_active".to_string(), Value::from(lockdown));
                    }
                }
            }

            _ => debug!(action = %input.action, "Unhandled captain action"),
        }
    }

    pub(super) fn handle_gamemaster_input(&self, input: &InputEventData) {
        let command: Option<GameMasterCommand> = context_payload(input, "gm_command")
            .or_else(|| serde_json::from_value(input.value.clone()).ok());

        match input.action.as_str() {
            "gamemaster_command" => {
                if let Some(cmd) = command {
                    self.apply_gm_command(&cmd);
                }
            }

            "spawn_object" => {
                if let Some(cmd) = command {
                    self.gm_spawn(&cmd);
                }
            }

            "modify_object" => {
                if let Some(cmd) = command {
                    self.gm_modify(&cmd);
                }
            }

            "delete_object" => {
                if let Some(object_id) = input.value.as_str() {
                    let mut universe = self.universe().write().unwrap();
                    universe.remove_object(object_id);
                }
            }

            "universe_control" => {
                if let Some(cmd) = command {
                    self.apply_gm_command(&cmd);
                }
            }

            "mission_intervention" => {
                if let Some(cmd) = command {
                    let mut universe = self.universe().write().unwrap();
                    let ship_id = universe.player_ship_id().to_string();
                    let intervention = serde_json::to_value(&cmd).unwrap_or(Value::Null);
                    if let Some(obj) = universe.object_mut(&ship_id) {
                        obj.extra.insert("gm_intervention".to_string(), intervention);
                    }
                }
            }

            _ => debug!(action = %input.action, "Unhandled gamemaster action"),
        }
    }

    /// Dispatch a structured gamemaster command by its command verb
    pub(crate) fn apply_gm_command(&self, cmd: &GameMasterCommand) {
        match cmd.command.as_str() {
            "spawn_object" => self.gm_spawn(cmd),
            "modify_object" => self.gm_modify(cmd),
            "delete_object" => {
                if let Some(target) = &cmd.target {
                    let mut universe = self.universe().write().unwrap();
                    universe.remove_object(target);
                }
            }
            "time_acceleration" => {
                if let Some(factor) = cmd.value.as_ref().and_then(Value::as_f64) {
                    let mut universe = self.universe().write().unwrap();
                    universe.set_time_acceleration(factor);
                }
            }
            "alert_level" => {
                if let Some(level) = cmd.value.as_ref().and_then(Value::as_f64) {
                    let mut universe = self.universe().write().unwrap();
                    universe.set_alert_level(level as i64);
                }
            }
            "reset_universe" => {
                let mut universe = self.universe().write().unwrap();
                universe.reset();
            }
            other => warn!(command = other, "Unknown gamemaster command"),
        }
    }

    fn gm_spawn(&self, cmd: &GameMasterCommand) {
        let Some(def) = &cmd.object_def else {
            return;
        };

        let obj = Object::from_wire(def);
        let mut universe = self.universe().write().unwrap();
        info!(id = %obj.id, kind = ?obj.kind, "Gamemaster spawned object");
        universe.add_object(obj);
    }

    fn gm_modify(&self, cmd: &GameMasterCommand) {
        let Some(target) = &cmd.target else {
            return;
        };

        let mut universe = self.universe().write().unwrap();
        let Some(obj) = universe.object_mut(target) else {
            return;
        };

        if let Some(position) = cmd.position {
            obj.position = position;
        }
        if let Some(Value::Object(values)) = &cmd.value {
            for (key, value) in values {
                obj.extra.insert(key.clone(), value.clone());
            }
        }
    }
}

// ============================================================================
// Per-station state projections
// ============================================================================

fn meta(pairs: &[(&str, Value)]) -> Map<String, Value> {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect()
}

/// Helm sees only what it can navigate by
pub(super) fn filter_helm(state: &UniverseStateData) -> StateUpdateData {
    let objects = state
        .objects
        .iter()
        .filter(|obj| {
            obj.is_player_ship
                || obj.kind == WireKind::Planet
                || obj.kind == WireKind::Station
        })
        .cloned()
        .collect();

    StateUpdateData {
        objects,
        meta: meta(&[
            ("time_acceleration", Value::from(state.time_acceleration)),
            ("navigation_data", Value::from(true)),
        ]),
        ..Default::default()
    }
}

pub(super) fn filter_tactical(state: &UniverseStateData) -> StateUpdateData {
    let objects = state
        .objects
        .iter()
        .filter(|obj| {
            matches!(
                obj.kind,
                WireKind::Ship | WireKind::Torpedo | WireKind::Mine
            )
        })
        .cloned()
        .collect();

    let effects = state
        .effects
        .iter()
        .filter(|effect| {
            matches!(
                effect.effect_type.as_str(),
                "phaser_beam" | "torpedo_trail" | "explosion"
            )
        })
        .cloned()
        .collect();

    StateUpdateData {
        objects,
        effects,
        meta: meta(&[
            ("alert_level", Value::from(state.alert_level)),
            ("tactical_data", Value::from(true)),
        ]),
        ..Default::default()
    }
}

/// Identity-only view: who is out there, not how healthy or fast they are.
/// The stored objects are never touched, only these copies.
pub(super) fn filter_communication(state: &UniverseStateData) -> StateUpdateData {
    let objects = state
        .objects
        .iter()
        .filter(|obj| matches!(obj.kind, WireKind::Ship | WireKind::Station))
        .map(|obj| {
            let mut copy = obj.clone();
            copy.velocity = Vector3::ZERO;
            copy.health = 0.0;
            copy.max_health = 0.0;
            copy.shield = 0.0;
            copy.max_shield = 0.0;
            copy
        })
        .collect();

    StateUpdateData {
        objects,
        meta: meta(&[
            ("communication_data", Value::from(true)),
            ("alert_level", Value::from(state.alert_level)),
        ]),
        ..Default::default()
    }
}

pub(super) fn filter_logistics(state: &UniverseStateData) -> StateUpdateData {
    let objects = state
        .objects
        .iter()
        .filter(|obj| obj.is_player_ship)
        .take(1)
        .cloned()
        .collect();

    StateUpdateData {
        objects,
        meta: meta(&[
            ("logistics_data", Value::from(true)),
            ("power_grid", Value::from(true)),
            ("damage_report", Value::from(true)),
        ]),
        ..Default::default()
    }
}

pub(super) fn filter_captain(state: &UniverseStateData) -> StateUpdateData {
    StateUpdateData {
        full: Some(state.clone()),
        meta: meta(&[
            ("captain_view", Value::from(true)),
            ("alert_level", Value::from(state.alert_level)),
            ("ship_status", Value::from(true)),
        ]),
        ..Default::default()
    }
}

pub(super) fn filter_gamemaster(state: &UniverseStateData) -> StateUpdateData {
    StateUpdateData {
        full: Some(state.clone()),
        meta: meta(&[
            ("gamemaster_view", Value::from(true)),
            ("admin_data", Value::from(true)),
            ("debug_info", Value::from(true)),
        ]),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, RwLock};

    use chrono::Utc;

    use crate::config::UniverseConfig;
    use crate::net::protocol::StationType;
    use crate::sim::{ObjectKind, Universe};

    fn manager() -> StationManager {
        let universe = Arc::new(RwLock::new(Universe::new(&UniverseConfig::default())));
        StationManager::new(universe)
    }

    fn event(station: StationType, action: &str, value: Value) -> InputEventData {
        InputEventData {
            station,
            action: action.to_string(),
            value,
            timestamp: Utc::now(),
            context: Map::new(),
        }
    }

    fn event_with_context(
        station: StationType,
        action: &str,
        value: Value,
        context: Map<String, Value>,
    ) -> InputEventData {
        InputEventData {
            station,
            action: action.to_string(),
            value,
            timestamp: Utc::now(),
            context,
        }
    }

    #[test]
    fn throttle_sets_engine_thrust() {
        let manager = manager();
        let input = event(StationType::Helm, "throttle", Value::from(0.5));
        assert!(manager.handle_input(StationType::Helm, &input));

        let universe = manager.universe().read().unwrap();
        let ship = universe.ship("player_ship").unwrap();
        assert_eq!(ship.engine_thrust, 0.5 * ship.max_thrust);
    }

    #[test]
    fn warp_factor_drives_time_acceleration() {
        let manager = manager();
        let input = event(StationType::Helm, "warp_factor", Value::from(4.0));
        assert!(manager.handle_input(StationType::Helm, &input));

        let universe = manager.universe().read().unwrap();
        assert_eq!(universe.time_acceleration(), 4.0);
    }

    #[test]
    fn desired_heading_engages_heading_autopilot() {
        let manager = manager();
        let input = event(StationType::Helm, "desired_heading", Value::from(90.0));
        assert!(manager.handle_input(StationType::Helm, &input));

        let universe = manager.universe().read().unwrap();
        let autopilot = &universe.ship("player_ship").unwrap().autopilot;
        assert!(autopilot.enabled);
        assert_eq!(autopilot.target_heading, 90.0);
    }

    #[test]
    fn autopilot_mode_manual_disengages() {
        let manager = manager();
        manager.handle_input(
            StationType::Helm,
            &event(StationType::Helm, "desired_heading", Value::from(45.0)),
        );
        manager.handle_input(
            StationType::Helm,
            &event(StationType::Helm, "autopilot_mode", Value::from("manual")),
        );

        let universe = manager.universe().read().unwrap();
        assert!(!universe.ship("player_ship").unwrap().autopilot.enabled);
    }

    #[test]
    fn tactical_fire_weapon_launches_torpedo() {
        let manager = manager();

        let mut context = Map::new();
        context.insert(
            "tactical_data".to_string(),
            serde_json::json!({"weapon_type": "torpedo", "target_id": "starbase_1"}),
        );
        let input = event_with_context(StationType::Tactical, "fire_weapon", Value::Null, context);
        assert!(manager.handle_input(StationType::Tactical, &input));

        let universe = manager.universe().read().unwrap();
        let torpedo = universe
            .objects()
            .iter()
            .find(|obj| obj.kind == ObjectKind::Torpedo)
            .expect("torpedo in flight");
        assert_eq!(
            torpedo.props.as_torpedo().unwrap().target_id.as_deref(),
            Some("starbase_1")
        );
    }

    #[test]
    fn shield_power_reshapes_system_efficiency() {
        let manager = manager();
        let input = event(StationType::Tactical, "shield_power", Value::from(0.7));
        assert!(manager.handle_input(StationType::Tactical, &input));

        let universe = manager.universe().read().unwrap();
        let ship = universe.ship("player_ship").unwrap();
        assert_eq!(ship.systems["shields"].efficiency, 0.7);
    }

    #[test]
    fn communication_message_queues_on_ship() {
        let manager = manager();

        let mut context = Map::new();
        context.insert(
            "comm_data".to_string(),
            serde_json::json!({
                "frequency": 121.5,
                "message": "Requesting docking clearance",
                "target_ship_id": "starbase_1",
                "priority": 2,
            }),
        );
        let input =
            event_with_context(StationType::Communication, "send_message", Value::Null, context);
        assert!(manager.handle_input(StationType::Communication, &input));

        let universe = manager.universe().read().unwrap();
        let obj = universe.object("player_ship").unwrap();
        let queue = obj.extra.get("outgoing_messages").unwrap();
        assert_eq!(queue.as_array().unwrap().len(), 1);
    }

    #[test]
    fn logistics_repair_restores_and_reactivates() {
        let manager = manager();
        {
            let mut universe = manager.universe().write().unwrap();
            let ship = universe.ship_mut("player_ship").unwrap();
            ship.damage_system("sensors", 100.0);
            assert!(!ship.systems["sensors"].is_online);
        }

        // Six +10 repairs cross the 50-health reactivation threshold
        for _ in 0..6 {
            let input = event(StationType::Logistics, "repair_system", Value::from("sensors"));
            assert!(manager.handle_input(StationType::Logistics, &input));
        }

        let universe = manager.universe().read().unwrap();
        let sensors = &universe.ship("player_ship").unwrap().systems["sensors"];
        assert_eq!(sensors.health, 60.0);
        assert!(sensors.is_online);
    }

    #[test]
    fn captain_alert_level_and_startup() {
        let manager = manager();
        {
            let mut universe = manager.universe().write().unwrap();
            let obj = universe.object_mut("player_ship").unwrap();
            obj.power = 100.0;
            obj.shield = 0.0;
            universe.ship_mut("player_ship").unwrap().damage_system("weapons", 100.0);
        }

        let input = event(StationType::Captain, "alert_level", Value::from(2));
        assert!(manager.handle_input(StationType::Captain, &input));

        let input = event(StationType::Captain, "ship_startup", Value::Bool(true));
        assert!(manager.handle_input(StationType::Captain, &input));

        let universe = manager.universe().read().unwrap();
        assert_eq!(universe.alert_level(), 2);

        let obj = universe.object("player_ship").unwrap();
        assert_eq!(obj.power, obj.max_power);
        assert_eq!(obj.shield, obj.max_shield);

        let ship = universe.ship("player_ship").unwrap();
        assert!(ship.systems.values().all(|sys| sys.is_online));
        assert!(ship
            .systems
            .values()
            .all(|sys| sys.health == sys.max_health));
    }

    #[test]
    fn captain_emergency_power_boosts_critical_systems() {
        let manager = manager();
        let input = event(StationType::Captain, "emergency_power", Value::Bool(true));
        assert!(manager.handle_input(StationType::Captain, &input));

        let universe = manager.universe().read().unwrap();
        let ship = universe.ship("player_ship").unwrap();
        assert_eq!(ship.systems["engines"].efficiency, 1.2);
        assert_eq!(ship.systems["shields"].efficiency, 1.0);
    }

    #[test]
    fn gamemaster_spawns_and_deletes_objects() {
        let manager = manager();

        let def = serde_json::json!({
            "command": "spawn_object",
            "object_def": {
                "id": "gm_rock",
                "type": "asteroid",
                "name": "GM Rock",
                "position": {"x": 100.0, "y": 0.0, "z": 0.0},
                "velocity": {"x": 0.0, "y": 0.0, "z": 0.0},
                "rotation": {"x": 0.0, "y": 0.0, "z": 0.0, "w": 1.0},
                "scale": {"x": 1.0, "y": 1.0, "z": 1.0},
                "health": 50.0, "max_health": 50.0,
                "shield": 0.0, "max_shield": 0.0,
                "power": 0.0, "max_power": 0.0,
                "mass": 1000.0, "radius": 10.0,
                "is_player_ship": false,
            }
        });
        let input = event(StationType::Gamemaster, "spawn_object", def);
        assert!(manager.handle_input(StationType::Gamemaster, &input));
        {
            let universe = manager.universe().read().unwrap();
            assert!(universe.object("gm_rock").is_some());
        }

        let input = event(StationType::Gamemaster, "delete_object", Value::from("gm_rock"));
        assert!(manager.handle_input(StationType::Gamemaster, &input));
        let universe = manager.universe().read().unwrap();
        assert!(universe.object("gm_rock").is_none());
    }

    #[test]
    fn gamemaster_universe_control_resets() {
        let manager = manager();
        {
            let mut universe = manager.universe().write().unwrap();
            universe.set_alert_level(3);
            universe.object_mut("player_ship").unwrap().position =
                Vector3::new(123.0, 0.0, 0.0);
        }

        let cmd = serde_json::json!({"command": "reset_universe"});
        let input = event(StationType::Gamemaster, "universe_control", cmd);
        assert!(manager.handle_input(StationType::Gamemaster, &input));

        let universe = manager.universe().read().unwrap();
        assert_eq!(universe.alert_level(), 0);
        assert_eq!(universe.player_ship().unwrap().position.x, 123.0);
    }

    // ------------------------------------------------------------------
    // Projection tests
    // ------------------------------------------------------------------

    fn projection_state() -> UniverseStateData {
        let mut universe = Universe::unseeded(&UniverseConfig::default());

        let (mut obj, ship) = crate::sim::ship::Ship::crewed("player_ship", "USS Astra", Vector3::ZERO);
        obj.is_player_ship = true;
        universe.add_ship(obj, ship);
        universe.add_object(Object::asteroid("rock_1", Vector3::new(100.0, 0.0, 0.0)));
        universe.add_object(Object::planet(
            "planet_1",
            "Kepler",
            Vector3::new(-500.0, 0.0, 0.0),
            100.0,
        ));
        universe.state()
    }

    #[test]
    fn helm_sees_player_ship_and_planet_but_not_asteroid() {
        let state = projection_state();
        let update = filter_helm(&state);

        let ids: Vec<&str> = update.objects.iter().map(|o| o.id.as_str()).collect();
        assert!(ids.contains(&"player_ship"));
        assert!(ids.contains(&"planet_1"));
        assert!(!ids.contains(&"rock_1"));
        assert!(update.meta.contains_key("time_acceleration"));
    }

    #[test]
    fn tactical_sees_ships_but_not_planets() {
        let state = projection_state();
        let update = filter_tactical(&state);

        let ids: Vec<&str> = update.objects.iter().map(|o| o.id.as_str()).collect();
        assert!(ids.contains(&"player_ship"));
        assert!(!ids.contains(&"planet_1"));
        assert!(!ids.contains(&"rock_1"));
        assert!(update.meta.contains_key("alert_level"));
    }

    #[test]
    fn logistics_sees_only_the_player_ship() {
        let state = projection_state();
        let update = filter_logistics(&state);

        assert_eq!(update.objects.len(), 1);
        assert_eq!(update.objects[0].id, "player_ship");
    }

    #[test]
    fn communication_view_strips_kinematics_and_health() {
        let mut state = projection_state();
        // Give the ship some motion and damage to strip
        state.objects[0].velocity = Vector3::new(50.0, 0.0, 0.0);
        state.objects[0].health = 75.0;

        let update = filter_communication(&state);
        let ship = update
            .objects
            .iter()
            .find(|o| o.id == "player_ship")
            .unwrap();
        assert_eq!(ship.velocity, Vector3::ZERO);
        assert_eq!(ship.health, 0.0);
        assert_eq!(ship.max_health, 0.0);
        assert_eq!(ship.shield, 0.0);

        // Projections never mutate the source state
        assert_eq!(state.objects[0].velocity.x, 50.0);
        assert_eq!(state.objects[0].health, 75.0);
    }

    #[test]
    fn captain_and_gamemaster_get_full_state() {
        let state = projection_state();

        let update = filter_captain(&state);
        assert!(update.full.is_some());
        assert!(update.meta.contains_key("captain_view"));

        let update = filter_gamemaster(&state);
        assert!(update.full.is_some());
        assert!(update.meta.contains_key("debug_info"));
    }

    #[test]
    fn empty_projection_is_flagged_for_dropping() {
        let mut universe = Universe::unseeded(&UniverseConfig::default());
        universe.add_object(Object::asteroid("rock_1", Vector3::ZERO));
        let state = universe.state();

        // No player ship, no planets, no stations: helm frame is empty
        let update = filter_helm(&state);
        assert!(update.is_empty());

        // Captain always gets a full frame
        let update = filter_captain(&state);
        assert!(!update.is_empty());
    }
}
