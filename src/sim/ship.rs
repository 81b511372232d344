//! Ship subsystems, weapons and autopilot state

use std::collections::HashMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::sim::object::Object;
use crate::util::math::{clamp, Vector3};

/// A named ship subsystem with its own health and power budget
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct System {
    pub name: String,
    pub health: f64,
    pub max_health: f64,
    pub power_draw: f64,
    pub efficiency: f64,
    pub priority: i32,
    pub is_online: bool,
    pub is_critical: bool,
    pub repair_time: f64,
    pub repair_cost: f64,
}

impl System {
    fn new(name: &str, power_draw: f64, priority: i32, is_critical: bool) -> System {
        System {
            name: name.to_string(),
            health: 100.0,
            max_health: 100.0,
            power_draw,
            efficiency: 1.0,
            priority,
            is_online: true,
            is_critical,
            repair_time: 0.0,
            repair_cost: 0.0,
        }
    }

    /// Effective contribution: (health/max_health) · efficiency when online
    pub fn effectiveness(&self) -> f64 {
        if !self.is_online {
            return 0.0;
        }
        (self.health / self.max_health) * self.efficiency
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaponKind {
    Phaser,
    Torpedo,
}

#[derive(Debug, Clone)]
pub struct Weapon {
    pub id: String,
    pub kind: WeaponKind,
    pub name: String,
    pub damage: f64,
    pub range: f64,
    pub cooldown_secs: f64,
    pub last_fired: Option<Instant>,
    pub power_cost: f64,
    /// Mount point in ship-local space
    pub position: Vector3,
    /// Firing direction in ship-local space
    pub direction: Vector3,
    /// -1 means infinite
    pub ammunition: i32,
    pub max_ammo: i32,
}

impl Weapon {
    pub fn off_cooldown(&self) -> bool {
        match self.last_fired {
            Some(at) => at.elapsed().as_secs_f64() >= self.cooldown_secs,
            None => true,
        }
    }

    pub fn has_ammo(&self) -> bool {
        self.ammunition == -1 || self.ammunition > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoPilotMode {
    Manual,
    Position,
    Heading,
    Follow,
    StationKeeping,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoPilot {
    pub enabled: bool,
    pub mode: AutoPilotMode,
    pub target_position: Vector3,
    pub target_heading: f64,
    pub target_speed: f64,
    pub follow_target_id: String,
    pub collision_avoid: bool,
}

impl Default for AutoPilot {
    fn default() -> Self {
        AutoPilot {
            enabled: false,
            mode: AutoPilotMode::Manual,
            target_position: Vector3::ZERO,
            target_heading: 0.0,
            target_speed: 0.0,
            follow_target_id: String::new(),
            collision_avoid: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DamageEntry {
    pub system: String,
    pub severity: f64,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub repairable: bool,
}

/// Crew-facing ship state, stored beside the physical [`Object`] under the
/// same ID.
#[derive(Debug, Clone)]
pub struct Ship {
    pub engine_thrust: f64,
    pub max_thrust: f64,
    /// Degrees per second
    pub turn_rate: f64,
    pub shield_regen: f64,
    pub power_regen: f64,
    pub crew: u32,
    pub sensor_range: f64,
    pub transponder: String,
    pub faction: String,
    pub systems: HashMap<String, System>,
    pub weapons: Vec<Weapon>,
    pub autopilot: AutoPilot,
    pub damage_report: Vec<DamageEntry>,
}

impl Ship {
    /// Build a crewed ship and its physical object
    pub fn crewed(id: impl Into<String>, name: impl Into<String>, position: Vector3) -> (Object, Ship) {
        let mut obj = Object::new(id, crate::sim::object::ObjectKind::Ship, name);
        obj.position = position;
        obj.mass = 50_000.0;
        obj.radius = 50.0;
        obj.max_shield = 1000.0;
        obj.shield = 1000.0;
        obj.max_power = 2000.0;
        obj.power = 2000.0;

        let ship = Ship {
            engine_thrust: 0.0,
            max_thrust: 10_000.0,
            turn_rate: 30.0,
            shield_regen: 10.0,
            power_regen: 50.0,
            crew: 200,
            sensor_range: 50_000.0,
            transponder: obj.name.clone(),
            faction: "Federation".to_string(),
            systems: Ship::standard_systems(),
            weapons: Ship::standard_weapons(),
            autopilot: AutoPilot::default(),
            damage_report: Vec::new(),
        };

        (obj, ship)
    }

    fn standard_systems() -> HashMap<String, System> {
        let systems = [
            System::new("engines", 200.0, 1, true),
            System::new("shields", 150.0, 2, false),
            System::new("weapons", 300.0, 3, false),
            System::new("sensors", 100.0, 4, false),
            System::new("communications", 50.0, 5, false),
            System::new("life_support", 75.0, 1, true),
            System::new("computer", 125.0, 2, true),
        ];

        systems
            .into_iter()
            .map(|sys| (sys.name.clone(), sys))
            .collect()
    }

    fn standard_weapons() -> Vec<Weapon> {
        vec![
            Weapon {
                id: "phaser_array_1".to_string(),
                kind: WeaponKind::Phaser,
                name: "Forward Phaser Array".to_string(),
                damage: 150.0,
                range: 25_000.0,
                cooldown_secs: 2.0,
                last_fired: None,
                power_cost: 100.0,
                position: Vector3::new(0.0, 0.0, 25.0),
                direction: Vector3::new(0.0, 0.0, 1.0),
                ammunition: -1,
                max_ammo: -1,
            },
            Weapon {
                id: "torpedo_launcher_1".to_string(),
                kind: WeaponKind::Torpedo,
                name: "Forward Torpedo Launcher".to_string(),
                damage: 500.0,
                range: 50_000.0,
                cooldown_secs: 5.0,
                last_fired: None,
                power_cost: 50.0,
                position: Vector3::new(0.0, -5.0, 30.0),
                direction: Vector3::new(0.0, 0.0, 1.0),
                ammunition: 20,
                max_ammo: 20,
            },
        ]
    }

    /// Per-tick power budget and shield regeneration
    pub fn update_systems(&mut self, obj: &mut Object, dt: f64) {
        let total_draw: f64 = self
            .systems
            .values()
            .filter(|sys| sys.is_online)
            .map(|sys| sys.power_draw * sys.efficiency)
            .sum();

        if total_draw > obj.power {
            self.shutdown_one_non_critical();
        }

        obj.power = (obj.power - total_draw * dt).max(0.0);
        obj.power = (obj.power + self.power_regen * dt).min(obj.max_power);

        if obj.shield < obj.max_shield {
            if let Some(shields) = self.systems.get("shields") {
                if shields.is_online && shields.health > shields.max_health * 0.5 {
                    let rate =
                        self.shield_regen * (shields.health / shields.max_health) * shields.efficiency;
                    obj.shield = (obj.shield + rate * dt).min(obj.max_shield);
                }
            }
        }
    }

    /// Shed one non-critical system per tick until the budget balances
    fn shutdown_one_non_critical(&mut self) {
        let mut names: Vec<&String> = self
            .systems
            .iter()
            .filter(|(_, sys)| !sys.is_critical && sys.is_online)
            .map(|(name, _)| name)
            .collect();
        names.sort();

        if let Some(name) = names.first().map(|n| (*n).clone()) {
            if let Some(sys) = self.systems.get_mut(&name) {
                sys.is_online = false;
            }
        }
    }

    pub fn system_effectiveness(&self, name: &str) -> f64 {
        self.systems
            .get(name)
            .map(System::effectiveness)
            .unwrap_or(0.0)
    }

    pub fn repair_system(&mut self, name: &str, amount: f64) {
        if let Some(sys) = self.systems.get_mut(name) {
            sys.health = clamp(sys.health + amount, 0.0, sys.max_health);
            if sys.health > 50.0 && !sys.is_online {
                sys.is_online = true;
            }
        }
    }

    pub fn damage_system(&mut self, name: &str, damage: f64) {
        if let Some(sys) = self.systems.get_mut(name) {
            sys.health = (sys.health - damage).max(0.0);
            if sys.health <= 0.0 && sys.is_online {
                sys.is_online = false;
            }
            let repairable = sys.health > 0.0;

            self.damage_report.push(DamageEntry {
                system: name.to_string(),
                severity: damage,
                description: format!("{name} damaged: {damage:.1} points"),
                timestamp: Utc::now(),
                repairable,
            });
        }
    }

    pub fn weapon(&self, weapon_id: &str) -> Option<&Weapon> {
        self.weapons.iter().find(|w| w.id == weapon_id)
    }

    /// Cooldown, ammunition, power and weapons-system gating
    pub fn can_fire(&self, weapon_id: &str, available_power: f64) -> bool {
        let weapons_online = self
            .systems
            .get("weapons")
            .map(|sys| sys.is_online)
            .unwrap_or(false);

        match self.weapon(weapon_id) {
            Some(weapon) => {
                weapon.off_cooldown()
                    && weapon.has_ammo()
                    && available_power >= weapon.power_cost
                    && weapons_online
            }
            None => false,
        }
    }

    /// Stamp the cooldown and spend ammunition; returns the fired weapon
    pub fn commit_fire(&mut self, weapon_id: &str) -> Option<Weapon> {
        let weapon = self.weapons.iter_mut().find(|w| w.id == weapon_id)?;
        weapon.last_fired = Some(Instant::now());
        if weapon.ammunition > 0 {
            weapon.ammunition -= 1;
        }
        Some(weapon.clone())
    }

    pub fn set_autopilot_position(&mut self, target: Vector3) {
        self.autopilot.enabled = true;
        self.autopilot.mode = AutoPilotMode::Position;
        self.autopilot.target_position = target;
    }

    pub fn set_autopilot_heading(&mut self, heading: f64) {
        self.autopilot.enabled = true;
        self.autopilot.mode = AutoPilotMode::Heading;
        self.autopilot.target_heading = heading;
    }

    pub fn set_autopilot_follow(&mut self, target_id: impl Into<String>) {
        self.autopilot.enabled = true;
        self.autopilot.mode = AutoPilotMode::Follow;
        self.autopilot.follow_target_id = target_id.into();
    }

    pub fn set_autopilot_station_keeping(&mut self) {
        self.autopilot.enabled = true;
        self.autopilot.mode = AutoPilotMode::StationKeeping;
    }

    pub fn disable_autopilot(&mut self) {
        self.autopilot.enabled = false;
        self.autopilot.mode = AutoPilotMode::Manual;
        self.autopilot.target_position = Vector3::ZERO;
        self.autopilot.target_heading = 0.0;
        self.autopilot.follow_target_id.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crewed_ship_has_standard_loadout() {
        let (obj, ship) = Ship::crewed("player_ship", "USS Astra", Vector3::ZERO);
        assert_eq!(obj.mass, 50_000.0);
        assert_eq!(ship.systems.len(), 7);
        assert_eq!(ship.weapons.len(), 2);
        assert!(ship.systems["engines"].is_critical);
        assert!(!ship.systems["shields"].is_critical);
    }

    #[test]
    fn power_deficit_sheds_non_critical_systems() {
        let (mut obj, mut ship) = Ship::crewed("s", "Test", Vector3::ZERO);
        obj.power = 100.0; // Total draw is 1000 at full efficiency

        ship.update_systems(&mut obj, 0.1);

        let offline: Vec<&str> = ship
            .systems
            .values()
            .filter(|sys| !sys.is_online)
            .map(|sys| sys.name.as_str())
            .collect();
        assert_eq!(offline.len(), 1);
        assert!(!ship.systems[offline[0]].is_critical);
    }

    #[test]
    fn critical_systems_never_shed() {
        let (mut obj, mut ship) = Ship::crewed("s", "Test", Vector3::ZERO);
        obj.power = 0.0;

        for _ in 0..20 {
            ship.update_systems(&mut obj, 0.1);
        }

        assert!(ship.systems["engines"].is_online);
        assert!(ship.systems["life_support"].is_online);
        assert!(ship.systems["computer"].is_online);
        assert!(!ship.systems["shields"].is_online);
        assert!(!ship.systems["weapons"].is_online);
    }

    #[test]
    fn shields_regen_only_when_system_healthy() {
        let (mut obj, mut ship) = Ship::crewed("s", "Test", Vector3::ZERO);
        obj.shield = 500.0;

        ship.update_systems(&mut obj, 1.0);
        assert!(obj.shield > 500.0);

        obj.shield = 500.0;
        ship.systems.get_mut("shields").unwrap().health = 40.0;
        ship.update_systems(&mut obj, 1.0);
        assert_eq!(obj.shield, 500.0);
    }

    #[test]
    fn power_clamps_to_range() {
        let (mut obj, mut ship) = Ship::crewed("s", "Test", Vector3::ZERO);
        for _ in 0..100 {
            ship.update_systems(&mut obj, 1.0);
            assert!(obj.power >= 0.0);
            assert!(obj.power <= obj.max_power);
        }
    }

    #[test]
    fn fire_gating_checks_ammo_power_and_system() {
        let (obj, mut ship) = Ship::crewed("s", "Test", Vector3::ZERO);
        assert!(ship.can_fire("phaser_array_1", obj.power));
        assert!(!ship.can_fire("phaser_array_1", 10.0)); // Costs 100
        assert!(!ship.can_fire("missing_weapon", obj.power));

        ship.systems.get_mut("weapons").unwrap().is_online = false;
        assert!(!ship.can_fire("phaser_array_1", obj.power));
        ship.systems.get_mut("weapons").unwrap().is_online = true;

        // Cooldown blocks an immediate second shot
        ship.commit_fire("phaser_array_1");
        assert!(!ship.can_fire("phaser_array_1", obj.power));
    }

    #[test]
    fn torpedo_ammo_depletes() {
        let (_, mut ship) = Ship::crewed("s", "Test", Vector3::ZERO);
        let fired = ship.commit_fire("torpedo_launcher_1").unwrap();
        assert_eq!(fired.ammunition, 19);

        // Phasers are infinite
        let fired = ship.commit_fire("phaser_array_1").unwrap();
        assert_eq!(fired.ammunition, -1);
    }

    #[test]
    fn repair_brings_system_back_online_above_half() {
        let (_, mut ship) = Ship::crewed("s", "Test", Vector3::ZERO);
        ship.damage_system("shields", 100.0);
        assert!(!ship.systems["shields"].is_online);
        assert_eq!(ship.damage_report.len(), 1);
        assert!(!ship.damage_report[0].repairable);

        for _ in 0..5 {
            ship.repair_system("shields", 10.0);
        }
        assert!(!ship.systems["shields"].is_online); // Exactly 50, not above

        ship.repair_system("shields", 10.0);
        assert!(ship.systems["shields"].is_online);
    }

    #[test]
    fn disable_autopilot_resets_state() {
        let (_, mut ship) = Ship::crewed("s", "Test", Vector3::ZERO);
        ship.set_autopilot_heading(90.0);
        assert!(ship.autopilot.enabled);
        assert_eq!(ship.autopilot.mode, AutoPilotMode::Heading);

        ship.disable_autopilot();
        assert!(!ship.autopilot.enabled);
        assert_eq!(ship.autopilot.mode, AutoPilotMode::Manual);
        assert_eq!(ship.autopilot.target_heading, 0.0);
    }
}
