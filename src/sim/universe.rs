//! The authoritative universe: entity registries, the tick driver, autopilot
//! controllers, weapon firing and visual effects

use std::collections::HashMap;
use std::time::Instant;

use chrono::Utc;
use rand::Rng;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::config::UniverseConfig;
use crate::net::protocol::{UniverseStateData, WireEffect};
use crate::sim::object::{MineProps, Object, ObjectKind};
use crate::sim::physics::{self, Collision, Physics};
use crate::sim::ship::{AutoPilotMode, Ship, WeaponKind};
use crate::util::math::{clamp, wrap_degrees, Vector3};

/// A time-bounded display cue; no physical coupling
#[derive(Debug, Clone)]
pub struct VisualEffect {
    pub id: String,
    pub effect_type: String,
    pub position: Vector3,
    pub direction: Vector3,
    pub color: [f64; 3],
    pub intensity: f64,
    pub duration: f64,
    pub time_left: f64,
    pub properties: Map<String, Value>,
}

impl VisualEffect {
    pub fn to_wire(&self) -> WireEffect {
        WireEffect {
            id: self.id.clone(),
            effect_type: self.effect_type.clone(),
            position: self.position,
            direction: self.direction,
            color: self.color,
            intensity: self.intensity,
            duration: self.duration,
            time_left: self.time_left,
            properties: self.properties.clone(),
        }
    }
}

/// Events observed by the server loop. They are queued while the universe
/// lock is held and drained outside it, so observers are free to call back
/// into the universe.
#[derive(Debug, Clone)]
pub enum UniverseEvent {
    ObjectAdded { id: String, kind: ObjectKind },
    ShipAdded { id: String },
    ObjectRemoved { id: String },
    Collision(Collision),
    AlertLevelChanged { level: u8 },
}

pub struct Universe {
    objects: Vec<Object>,
    ships: HashMap<String, Ship>,
    effects: HashMap<String, VisualEffect>,
    physics: Physics,
    player_ship_id: String,
    time_acceleration: f64,
    alert_level: u8,
    last_update: Instant,
    total_time: f64,
    events: Vec<UniverseEvent>,
    id_counter: u64,
    max_objects: usize,
}

impl Universe {
    /// An empty universe; used by mission loaders and tests
    pub fn unseeded(cfg: &UniverseConfig) -> Universe {
        Universe {
            objects: Vec::new(),
            ships: HashMap::new(),
            effects: HashMap::new(),
            physics: Physics::from_config(cfg),
            player_ship_id: String::new(),
            time_acceleration: 1.0,
            alert_level: 0,
            last_update: Instant::now(),
            total_time: 0.0,
            events: Vec::new(),
            id_counter: 1,
            max_objects: cfg.max_objects,
        }
    }

    /// A universe seeded with the default scenario
    pub fn new(cfg: &UniverseConfig) -> Universe {
        let mut universe = Universe::unseeded(cfg);
        universe.seed_default_scenario(Vector3::ZERO);
        universe
    }

    fn seed_default_scenario(&mut self, player_position: Vector3) {
        let (obj, ship) = Ship::crewed("player_ship", "USS Astra", player_position);
        let mut obj = obj;
        obj.is_player_ship = true;
        self.player_ship_id = obj.id.clone();
        self.add_ship(obj, ship);

        self.add_object(Object::station(
            "starbase_1",
            "Deep Space Station Alpha",
            Vector3::new(5000.0, 0.0, 0.0),
        ));

        self.add_object(Object::planet(
            "planet_1",
            "Kepler-442b",
            Vector3::new(-10_000.0, 0.0, 5000.0),
            2000.0,
        ));

        let mut rng = rand::thread_rng();
        for _ in 0..20 {
            let position = Vector3::new(
                (rng.gen::<f64>() - 0.5) * 50_000.0,
                (rng.gen::<f64>() - 0.5) * 10_000.0,
                (rng.gen::<f64>() - 0.5) * 50_000.0,
            );
            let id = self.generate_id("asteroid");
            self.add_object(Object::asteroid(id, position));
        }

        info!(objects = self.objects.len(), "Default scenario seeded");
    }

    pub fn generate_id(&mut self, prefix: &str) -> String {
        self.id_counter += 1;
        format!("{prefix}_{}", self.id_counter)
    }

    // ------------------------------------------------------------------
    // Registry operations
    // ------------------------------------------------------------------

    pub fn add_object(&mut self, obj: Object) {
        if self.objects.len() >= self.max_objects {
            warn!(id = %obj.id, "Object limit reached, dropping spawn");
            return;
        }

        self.events.push(UniverseEvent::ObjectAdded {
            id: obj.id.clone(),
            kind: obj.kind,
        });
        self.objects.push(obj);
    }

    pub fn add_ship(&mut self, obj: Object, ship: Ship) {
        let id = obj.id.clone();
        self.ships.insert(id.clone(), ship);
        self.add_object(obj);
        self.events.push(UniverseEvent::ShipAdded { id });
    }

    pub fn remove_object(&mut self, id: &str) {
        let before = self.objects.len();
        self.objects.retain(|obj| obj.id != id);
        self.ships.remove(id);

        if self.objects.len() != before {
            self.events.push(UniverseEvent::ObjectRemoved { id: id.to_string() });
        }
    }

    pub fn object(&self, id: &str) -> Option<&Object> {
        self.objects.iter().find(|obj| obj.id == id)
    }

    pub fn object_mut(&mut self, id: &str) -> Option<&mut Object> {
        self.objects.iter_mut().find(|obj| obj.id == id)
    }

    pub fn ship(&self, id: &str) -> Option<&Ship> {
        self.ships.get(id)
    }

    pub fn ship_mut(&mut self, id: &str) -> Option<&mut Ship> {
        self.ships.get_mut(id)
    }

    pub fn player_ship_id(&self) -> &str {
        &self.player_ship_id
    }

    pub fn player_ship(&self) -> Option<&Object> {
        self.objects.iter().find(|obj| obj.id == self.player_ship_id)
    }

    pub fn objects(&self) -> &[Object] {
        &self.objects
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn effects(&self) -> impl Iterator<Item = &VisualEffect> {
        self.effects.values()
    }

    pub fn add_effect(&mut self, effect: VisualEffect) {
        self.effects.insert(effect.id.clone(), effect);
    }

    pub fn time_acceleration(&self) -> f64 {
        self.time_acceleration
    }

    /// Clamped to [0.1, 10]
    pub fn set_time_acceleration(&mut self, factor: f64) {
        self.time_acceleration = clamp(factor, 0.1, 10.0);
    }

    pub fn alert_level(&self) -> u8 {
        self.alert_level
    }

    /// Clamped to {0..3}
    pub fn set_alert_level(&mut self, level: i64) {
        self.alert_level = clamp(level as f64, 0.0, 3.0) as u8;
        self.events.push(UniverseEvent::AlertLevelChanged {
            level: self.alert_level,
        });
    }

    pub fn total_time(&self) -> f64 {
        self.total_time
    }

    pub fn kinetic_energy(&self) -> f64 {
        physics::total_kinetic_energy(&self.objects)
    }

    pub fn distance_between(&self, first: &str, second: &str) -> Option<f64> {
        let a = self.object(first)?;
        let b = self.object(second)?;
        Some(a.distance_to(b))
    }

    pub fn ids_in_range(&self, center: Vector3, radius: f64) -> Vec<String> {
        physics::objects_in_range(&self.objects, center, radius)
            .into_iter()
            .map(|obj| obj.id.clone())
            .collect()
    }

    /// Drain the queued events; called outside the universe lock
    pub fn take_events(&mut self) -> Vec<UniverseEvent> {
        std::mem::take(&mut self.events)
    }

    /// Rebuild the default scenario, keeping the player ship where it was
    pub fn reset(&mut self) {
        let player_position = self
            .player_ship()
            .map(|obj| obj.position)
            .unwrap_or(Vector3::ZERO);

        self.objects.clear();
        self.ships.clear();
        self.effects.clear();
        self.alert_level = 0;
        self.time_acceleration = 1.0;

        self.seed_default_scenario(player_position);
        info!("Universe reset");
    }

    // ------------------------------------------------------------------
    // Tick driver
    // ------------------------------------------------------------------

    /// Scheduler entry point: advance by scaled wall-clock time
    pub fn update(&mut self) {
        let now = Instant::now();
        let dt = now.duration_since(self.last_update).as_secs_f64() * self.time_acceleration;
        self.last_update = now;
        self.advance(dt);
    }

    /// Advance the simulation by `dt` seconds
    pub fn advance(&mut self, dt: f64) {
        self.total_time += dt;

        let ship_ids: Vec<String> = self.ships.keys().cloned().collect();
        for id in &ship_ids {
            self.update_ship(id, dt);
        }

        let collisions = self.physics.step(&mut self.objects, dt);
        for collision in collisions {
            self.handle_collision(collision);
        }

        self.update_effects(dt);
        self.cull_objects();
        self.sweep_mines();
    }

    fn update_ship(&mut self, id: &str, dt: f64) {
        let Some(obj_idx) = self.objects.iter().position(|obj| obj.id == id) else {
            return;
        };

        if let Some(ship) = self.ships.get_mut(id) {
            ship.update_systems(&mut self.objects[obj_idx], dt);
        }

        self.update_autopilot(id, obj_idx, dt);
    }

    fn update_autopilot(&mut self, id: &str, obj_idx: usize, dt: f64) {
        let Some(ship) = self.ships.get(id) else { return };
        let autopilot = ship.autopilot.clone();
        let max_thrust = ship.max_thrust;
        let engine_eff = ship.system_effectiveness("engines");
        let turn_rate = ship.turn_rate;

        if autopilot.enabled {
            match autopilot.mode {
                AutoPilotMode::Manual => {}
                AutoPilotMode::Position => {
                    self.autopilot_to_position(
                        id,
                        obj_idx,
                        autopilot.target_position,
                        autopilot.target_speed,
                        max_thrust * engine_eff,
                    );
                }
                AutoPilotMode::Heading => {
                    self.autopilot_to_heading(
                        id,
                        obj_idx,
                        autopilot.target_heading,
                        turn_rate * engine_eff,
                        dt,
                    );
                }
                AutoPilotMode::Follow => {
                    self.autopilot_follow(
                        id,
                        obj_idx,
                        &autopilot.follow_target_id,
                        autopilot.target_speed,
                        max_thrust * engine_eff,
                    );
                }
                AutoPilotMode::StationKeeping => {
                    let obj = &mut self.objects[obj_idx];
                    if obj.velocity.length() > 10.0 {
                        let damping = obj.velocity * (-obj.mass * 0.1);
                        obj.apply_force(damping);
                    }
                }
            }
        }

        if autopilot.collision_avoid {
            self.autopilot_collision_avoidance(obj_idx, max_thrust);
        }
    }

    fn autopilot_to_position(
        &mut self,
        id: &str,
        obj_idx: usize,
        target: Vector3,
        target_speed: f64,
        max_thrust: f64,
    ) {
        let obj = &self.objects[obj_idx];
        let to_target = target - obj.position;
        let distance = to_target.length();

        if distance < 100.0 {
            if let Some(ship) = self.ships.get_mut(id) {
                ship.disable_autopilot();
            }
            return;
        }

        let desired = to_target.normalize() * target_speed;
        let mut thrust = (desired - obj.velocity) * (obj.mass * 0.1);
        if thrust.length() > max_thrust {
            thrust = thrust.normalize() * max_thrust;
        }

        self.objects[obj_idx].apply_force(thrust);
    }

    fn autopilot_to_heading(
        &mut self,
        id: &str,
        obj_idx: usize,
        target_heading: f64,
        turn_rate: f64,
        dt: f64,
    ) {
        let heading = self.objects[obj_idx].heading();
        let diff = wrap_degrees(target_heading - heading);

        if diff.abs() < 1.0 {
            if let Some(ship) = self.ships.get_mut(id) {
                ship.disable_autopilot();
            }
            return;
        }

        let direction = if diff < 0.0 { -1.0 } else { 1.0 };
        let torque = Vector3::new(0.0, direction * turn_rate * dt, 0.0);
        self.objects[obj_idx].apply_torque(torque);
    }

    fn autopilot_follow(
        &mut self,
        id: &str,
        obj_idx: usize,
        target_id: &str,
        target_speed: f64,
        max_thrust: f64,
    ) {
        const FOLLOW_DISTANCE: f64 = 500.0;

        let Some(target) = self.object(target_id) else {
            if let Some(ship) = self.ships.get_mut(id) {
                ship.disable_autopilot();
            }
            return;
        };

        let target_position = target.position;
        let to_target = target_position - self.objects[obj_idx].position;

        if to_target.length() > FOLLOW_DISTANCE {
            let hold_point = target_position - to_target.normalize() * FOLLOW_DISTANCE;
            if let Some(ship) = self.ships.get_mut(id) {
                ship.autopilot.target_position = hold_point;
            }
            self.autopilot_to_position(id, obj_idx, hold_point, target_speed, max_thrust);
        }
    }

    fn autopilot_collision_avoidance(&mut self, obj_idx: usize, max_thrust: f64) {
        const AVOIDANCE_RANGE: f64 = 1000.0;

        let ship_position = self.objects[obj_idx].position;
        let ship_id = self.objects[obj_idx].id.clone();

        let mut total = Vector3::ZERO;
        for obj in &self.objects {
            if obj.id == ship_id || obj.is_static {
                continue;
            }

            let to_obj = obj.position - ship_position;
            let distance = to_obj.length();
            if distance > 0.0 && distance < AVOIDANCE_RANGE {
                let strength = (AVOIDANCE_RANGE - distance) / AVOIDANCE_RANGE;
                total += -to_obj.normalize() * (max_thrust * strength * 0.5);
            }
        }

        if total.length() > 0.0 {
            self.objects[obj_idx].apply_force(total);
        }
    }

    // ------------------------------------------------------------------
    // Collision and lifecycle handling
    // ------------------------------------------------------------------

    fn handle_collision(&mut self, collision: Collision) {
        if collision.first.kind == ObjectKind::Torpedo {
            self.create_explosion(collision.first.position, 200.0, [1.0, 0.5, 0.0]);
        } else if collision.second.kind == ObjectKind::Torpedo {
            self.create_explosion(collision.second.position, 200.0, [1.0, 0.5, 0.0]);
        }

        if collision.first.kind == ObjectKind::Mine {
            self.create_explosion(collision.first.position, 500.0, [1.0, 0.2, 0.0]);
        } else if collision.second.kind == ObjectKind::Mine {
            self.create_explosion(collision.second.position, 500.0, [1.0, 0.2, 0.0]);
        }

        self.events.push(UniverseEvent::Collision(collision));
    }

    fn update_effects(&mut self, dt: f64) {
        self.effects.retain(|_, effect| {
            effect.time_left -= dt;
            effect.time_left > 0.0
        });
    }

    /// Invariant: nothing survives a tick destroyed or past its TTL
    fn cull_objects(&mut self) {
        let doomed: Vec<(String, bool, Vector3)> = self
            .objects
            .iter()
            .filter(|obj| obj.is_expired() || obj.is_destroyed())
            .map(|obj| (obj.id.clone(), obj.is_destroyed(), obj.position))
            .collect();

        for (id, destroyed, position) in doomed {
            if destroyed {
                self.create_explosion(position, 300.0, [1.0, 0.3, 0.0]);
                debug!(id = %id, "Object destroyed");
            }
            self.remove_object(&id);
        }
    }

    fn sweep_mines(&mut self) {
        let mines: Vec<(String, MineProps, Vector3)> = self
            .objects
            .iter()
            .filter(|obj| obj.kind == ObjectKind::Mine)
            .filter_map(|obj| {
                let props = obj.props.as_mine()?;
                if !props.armed {
                    return None;
                }
                Some((obj.id.clone(), props.clone(), obj.position))
            })
            .collect();

        for (mine_id, props, mine_position) in mines {
            let victim = physics::objects_in_range_filtered(
                &self.objects,
                mine_position,
                props.trigger_range,
                |obj| obj.id != mine_id && obj.kind == ObjectKind::Ship,
            )
            .first()
            .map(|obj| obj.id.clone());

            if let Some(victim_id) = victim {
                if let Some(target) = self.object_mut(&victim_id) {
                    target.take_damage(props.damage);
                }
                self.create_explosion(mine_position, 500.0, [1.0, 0.2, 0.0]);
                if let Some(mine) = self.object_mut(&mine_id) {
                    mine.health = 0.0;
                }
                info!(mine = %mine_id, target = %victim_id, "Mine triggered");
            }
        }
    }

    // ------------------------------------------------------------------
    // Weapons and effects
    // ------------------------------------------------------------------

    /// Fire a mounted weapon. Returns false when gating (cooldown, ammo,
    /// power, weapons system) rejects the shot or the ship is unknown.
    pub fn fire_weapon(
        &mut self,
        ship_id: &str,
        weapon_id: &str,
        target_id: Option<&str>,
        target_position: Option<Vector3>,
    ) -> bool {
        let Some(obj_idx) = self.objects.iter().position(|obj| obj.id == ship_id) else {
            return false;
        };

        let available_power = self.objects[obj_idx].power;
        let can_fire = self
            .ships
            .get(ship_id)
            .map(|ship| ship.can_fire(weapon_id, available_power))
            .unwrap_or(false);
        if !can_fire {
            return false;
        }

        let Some(weapon) = self
            .ships
            .get_mut(ship_id)
            .and_then(|ship| ship.commit_fire(weapon_id))
        else {
            return false;
        };

        self.objects[obj_idx].power -= weapon.power_cost;

        let (position, rotation) = {
            let obj = &self.objects[obj_idx];
            (obj.position, obj.rotation)
        };
        let world_position = position + rotation.rotate(weapon.position);
        let world_direction = rotation.rotate(weapon.direction);

        match weapon.kind {
            WeaponKind::Phaser => {
                self.create_phaser_beam(world_position, world_direction, weapon.damage, weapon.range, target_position);
            }
            WeaponKind::Torpedo => {
                self.create_torpedo(world_position, world_direction, weapon.damage, target_id, target_position);
            }
        }

        true
    }

    fn create_phaser_beam(
        &mut self,
        position: Vector3,
        direction: Vector3,
        damage: f64,
        range: f64,
        target_position: Option<Vector3>,
    ) {
        let end_position = match target_position {
            Some(target) => target,
            None => match physics::raycast(&self.objects, position, direction, range) {
                Some(hit_idx) => {
                    let hit_position = self.objects[hit_idx].position;
                    self.objects[hit_idx].take_damage(damage);
                    hit_position
                }
                None => position + direction * range,
            },
        };

        let id = self.generate_id("phaser");
        let mut properties = Map::new();
        properties.insert(
            "end_position".to_string(),
            serde_json::to_value(end_position).unwrap_or(Value::Null),
        );
        properties.insert("width".to_string(), Value::from(2.0));

        self.add_effect(VisualEffect {
            id,
            effect_type: "phaser_beam".to_string(),
            position,
            direction: (end_position - position).normalize(),
            color: [1.0, 0.2, 0.2],
            intensity: 1.0,
            duration: 0.5,
            time_left: 0.5,
            properties,
        });
    }

    fn create_torpedo(
        &mut self,
        position: Vector3,
        direction: Vector3,
        damage: f64,
        target_id: Option<&str>,
        target_position: Option<Vector3>,
    ) {
        let velocity = match target_position {
            Some(target) => (target - position).normalize() * 1000.0,
            None => direction * 1000.0,
        };

        let torpedo_id = self.generate_id("torpedo");
        let torpedo = Object::torpedo(
            torpedo_id.clone(),
            position,
            velocity,
            target_id.map(str::to_string),
            damage,
        );
        self.add_object(torpedo);

        let trail_id = self.generate_id("torpedo_trail");
        let mut properties = Map::new();
        properties.insert("torpedo_id".to_string(), Value::from(torpedo_id));

        self.add_effect(VisualEffect {
            id: trail_id,
            effect_type: "torpedo_trail".to_string(),
            position,
            direction,
            color: [0.2, 0.5, 1.0],
            intensity: 0.8,
            duration: 2.0,
            time_left: 2.0,
            properties,
        });
    }

    /// Physics impulse plus a 3-second explosion visual
    pub fn create_explosion(&mut self, position: Vector3, force: f64, color: [f64; 3]) {
        const EXPLOSION_RADIUS: f64 = 200.0;
        physics::apply_explosion(&mut self.objects, position, force, EXPLOSION_RADIUS);

        let id = self.generate_id("explosion");
        let mut properties = Map::new();
        properties.insert("force".to_string(), Value::from(force));
        properties.insert("radius".to_string(), Value::from(EXPLOSION_RADIUS));

        self.add_effect(VisualEffect {
            id,
            effect_type: "explosion".to_string(),
            position,
            direction: Vector3::ZERO,
            color,
            intensity: 1.0,
            duration: 3.0,
            time_left: 3.0,
            properties,
        });
    }

    // ------------------------------------------------------------------
    // State snapshot
    // ------------------------------------------------------------------

    pub fn state(&self) -> UniverseStateData {
        UniverseStateData {
            objects: self.objects.iter().map(Object::to_wire).collect(),
            effects: self.effects.values().map(VisualEffect::to_wire).collect(),
            player_ship_id: self.player_ship_id.clone(),
            time_acceleration: self.time_acceleration,
            alert_level: self.alert_level,
            timestamp: Utc::now(),
        }
    }
}
