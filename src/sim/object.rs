//! The universal physical entity and its typed behavior extras

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::net::protocol::WireObject;
use crate::util::math::{Quaternion, Vector3};

/// Kind tag for every entity in the universe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Ship,
    Planet,
    Station,
    Asteroid,
    BlackHole,
    Mine,
    Nebula,
    Torpedo,
    Beam,
    Explosion,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Ship => "ship",
            ObjectKind::Planet => "planet",
            ObjectKind::Station => "station",
            ObjectKind::Asteroid => "asteroid",
            ObjectKind::BlackHole => "black_hole",
            ObjectKind::Mine => "mine",
            ObjectKind::Nebula => "nebula",
            ObjectKind::Torpedo => "torpedo",
            ObjectKind::Beam => "beam",
            ObjectKind::Explosion => "explosion",
        }
    }
}

/// Guidance and warhead data carried by a torpedo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TorpedoProps {
    pub target_id: Option<String>,
    pub damage: f64,
    pub proximity_trigger: f64,
    pub guidance: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MineProps {
    pub damage: f64,
    pub trigger_range: f64,
    pub armed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NebulaProps {
    pub interference: f64,
    pub visibility: f64,
    pub sensor_dampening: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlackHoleProps {
    pub event_horizon: f64,
    pub accretion_disk: f64,
    pub gravitational_range: f64,
}

/// Typed per-kind behavior extras; the open `extra` map on [`Object`] covers
/// everything scripts and the communications console bolt on at runtime.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Props {
    #[default]
    None,
    Torpedo(TorpedoProps),
    Mine(MineProps),
    Nebula(NebulaProps),
    BlackHole(BlackHoleProps),
}

impl Props {
    pub fn as_torpedo(&self) -> Option<&TorpedoProps> {
        match self {
            Props::Torpedo(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_mine(&self) -> Option<&MineProps> {
        match self {
            Props::Mine(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_mine_mut(&mut self) -> Option<&mut MineProps> {
        match self {
            Props::Mine(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_nebula(&self) -> Option<&NebulaProps> {
        match self {
            Props::Nebula(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_black_hole(&self) -> Option<&BlackHoleProps> {
        match self {
            Props::BlackHole(p) => Some(p),
            _ => None,
        }
    }
}

/// A physical entity in the universe. Ships store their crew-facing state in
/// a parallel registry under the same ID; everything the physics engine
/// touches lives here.
#[derive(Debug, Clone)]
pub struct Object {
    pub id: String,
    pub kind: ObjectKind,
    pub name: String,
    pub position: Vector3,
    pub velocity: Vector3,
    pub acceleration: Vector3,
    pub rotation: Quaternion,
    pub angular_velocity: Vector3,
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
    pub is_static: bool,
    pub created_at: DateTime<Utc>,
    /// Remaining lifetime in seconds; `None` means immortal
    pub ttl: Option<f64>,
    pub props: Props,
    pub extra: Map<String, Value>,
}

impl Object {
    pub fn new(id: impl Into<String>, kind: ObjectKind, name: impl Into<String>) -> Object {
        Object {
            id: id.into(),
            kind,
            name: name.into(),
            position: Vector3::ZERO,
            velocity: Vector3::ZERO,
            acceleration: Vector3::ZERO,
            rotation: Quaternion::IDENTITY,
            angular_velocity: Vector3::ZERO,
            scale: Vector3::ONE,
            health: 100.0,
            max_health: 100.0,
            shield: 0.0,
            max_shield: 0.0,
            power: 100.0,
            max_power: 100.0,
            mass: 1000.0,
            radius: 10.0,
            is_player_ship: false,
            is_static: false,
            created_at: Utc::now(),
            ttl: None,
            props: Props::None,
            extra: Map::new(),
        }
    }

    pub fn planet(id: impl Into<String>, name: impl Into<String>, position: Vector3, radius: f64) -> Object {
        let mut obj = Object::new(id, ObjectKind::Planet, name);
        obj.position = position;
        obj.radius = radius;
        obj.mass = radius * radius * radius * 1000.0;
        obj.is_static = true;
        obj.scale = Vector3::new(radius / 100.0, radius / 100.0, radius / 100.0);
        obj
    }

    pub fn station(id: impl Into<String>, name: impl Into<String>, position: Vector3) -> Object {
        let mut obj = Object::new(id, ObjectKind::Station, name);
        obj.position = position;
        obj.radius = 200.0;
        obj.mass = 100_000.0;
        obj.is_static = true;
        obj.max_shield = 5000.0;
        obj.shield = 5000.0;
        obj.health = 2000.0;
        obj.max_health = 2000.0;
        obj
    }

    pub fn asteroid(id: impl Into<String>, position: Vector3) -> Object {
        let id = id.into();
        let short = id.chars().take(8).collect::<String>();
        let mut obj = Object::new(id, ObjectKind::Asteroid, format!("Asteroid-{short}"));
        let mut rng = rand::thread_rng();

        obj.position = position;
        obj.radius = 5.0 + rng.gen::<f64>() * 20.0;
        obj.mass = obj.radius * obj.radius * 100.0;
        obj.velocity = Vector3::new(
            (rng.gen::<f64>() - 0.5) * 100.0,
            (rng.gen::<f64>() - 0.5) * 100.0,
            (rng.gen::<f64>() - 0.5) * 100.0,
        );
        obj.angular_velocity = Vector3::new(
            (rng.gen::<f64>() - 0.5) * 2.0,
            (rng.gen::<f64>() - 0.5) * 2.0,
            (rng.gen::<f64>() - 0.5) * 2.0,
        );
        obj.health = obj.radius * 10.0;
        obj.max_health = obj.health;
        obj
    }

    pub fn black_hole(
        id: impl Into<String>,
        name: impl Into<String>,
        position: Vector3,
        mass: f64,
    ) -> Object {
        let mut obj = Object::new(id, ObjectKind::BlackHole, name);
        obj.position = position;
        obj.mass = mass;
        obj.radius = mass / 1_000_000.0;
        obj.is_static = true;
        obj.props = Props::BlackHole(BlackHoleProps {
            event_horizon: obj.radius * 2.5,
            accretion_disk: obj.radius * 10.0,
            gravitational_range: obj.radius * 100.0,
        });
        obj
    }

    pub fn torpedo(
        id: impl Into<String>,
        position: Vector3,
        velocity: Vector3,
        target_id: Option<String>,
        damage: f64,
    ) -> Object {
        let mut obj = Object::new(id, ObjectKind::Torpedo, "Torpedo");
        obj.position = position;
        obj.velocity = velocity;
        obj.radius = 2.0;
        obj.mass = 100.0;
        obj.ttl = Some(30.0);
        obj.props = Props::Torpedo(TorpedoProps {
            target_id,
            damage,
            proximity_trigger: 10.0,
            guidance: true,
        });
        obj
    }

    pub fn mine(id: impl Into<String>, position: Vector3, damage: f64) -> Object {
        let mut obj = Object::new(id, ObjectKind::Mine, "Space Mine");
        obj.position = position;
        obj.radius = 5.0;
        obj.mass = 500.0;
        obj.is_static = true;
        obj.props = Props::Mine(MineProps {
            damage,
            trigger_range: 50.0,
            armed: true,
        });
        obj
    }

    pub fn nebula(id: impl Into<String>, name: impl Into<String>, position: Vector3, radius: f64) -> Object {
        let mut obj = Object::new(id, ObjectKind::Nebula, name);
        obj.position = position;
        obj.radius = radius;
        obj.mass = 0.0;
        obj.is_static = true;
        obj.props = Props::Nebula(NebulaProps {
            interference: 0.7,
            visibility: 0.3,
            sensor_dampening: 0.8,
        });
        obj
    }

    /// Accumulate a force for the next integration step. Massless objects
    /// ignore forces.
    pub fn apply_force(&mut self, force: Vector3) {
        if self.mass > 0.0 {
            self.acceleration += force / self.mass;
        }
    }

    pub fn apply_torque(&mut self, torque: Vector3) {
        self.angular_velocity += torque * 0.01;
    }

    /// Advance velocity, position and orientation by one explicit Euler step
    pub fn integrate(&mut self, dt: f64) {
        self.velocity += self.acceleration * dt;
        self.position += self.velocity * dt;

        let omega = self.angular_velocity.length();
        if omega > 0.0 {
            let angle = omega * dt;
            if angle > 0.0 {
                let axis = self.angular_velocity.normalize();
                let spin = Quaternion::from_axis_angle(axis, angle);
                self.rotation = (self.rotation * spin).normalize();
            }
        }

        self.acceleration = Vector3::ZERO;
    }

    pub fn distance_to(&self, other: &Object) -> f64 {
        self.position.distance(other.position)
    }

    /// True once a finite TTL has decayed to zero
    pub fn is_expired(&self) -> bool {
        matches!(self.ttl, Some(t) if t <= 0.0)
    }

    /// Shields absorb damage before the hull
    pub fn take_damage(&mut self, damage: f64) {
        let mut damage = damage;
        if self.shield > 0.0 {
            let absorbed = damage.min(self.shield);
            self.shield -= absorbed;
            damage -= absorbed;
        }

        if damage > 0.0 {
            self.health = (self.health - damage).max(0.0);
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.health <= 0.0
    }

    /// Yaw of the forward vector in the XZ plane, in degrees
    pub fn heading(&self) -> f64 {
        let forward = self.rotation.rotate(Vector3::FORWARD);
        crate::util::math::radians_to_degrees(forward.x.atan2(forward.z))
    }

    /// Merge the typed props and the open extension map into the wire shape
    pub fn properties_map(&self) -> Map<String, Value> {
        let mut map = Map::new();

        match &self.props {
            Props::None => {}
            Props::Torpedo(p) => {
                if let Some(target) = &p.target_id {
                    map.insert("target_id".to_string(), Value::from(target.clone()));
                }
                map.insert("damage".to_string(), Value::from(p.damage));
                map.insert("proximity_trigger".to_string(), Value::from(p.proximity_trigger));
                map.insert("guidance".to_string(), Value::from(p.guidance));
            }
            Props::Mine(p) => {
                map.insert("damage".to_string(), Value::from(p.damage));
                map.insert("trigger_range".to_string(), Value::from(p.trigger_range));
                map.insert("armed".to_string(), Value::from(p.armed));
            }
            Props::Nebula(p) => {
                map.insert("interference".to_string(), Value::from(p.interference));
                map.insert("visibility".to_string(), Value::from(p.visibility));
                map.insert("sensor_dampening".to_string(), Value::from(p.sensor_dampening));
            }
            Props::BlackHole(p) => {
                map.insert("event_horizon".to_string(), Value::from(p.event_horizon));
                map.insert("accretion_disk".to_string(), Value::from(p.accretion_disk));
                map.insert("gravitational_range".to_string(), Value::from(p.gravitational_range));
            }
        }

        for (key, value) in &self.extra {
            map.insert(key.clone(), value.clone());
        }

        map
    }

    pub fn to_wire(&self) -> WireObject {
        WireObject {
            id: self.id.clone(),
            kind: self.kind,
            name: self.name.clone(),
            position: self.position,
            velocity: self.velocity,
            rotation: self.rotation,
            scale: self.scale,
            health: self.health,
            max_health: self.max_health,
            shield: self.shield,
            max_shield: self.max_shield,
            power: self.power,
            max_power: self.max_power,
            mass: self.mass,
            radius: self.radius,
            is_player_ship: self.is_player_ship,
            properties: self.properties_map(),
        }
    }

    /// Reconstruct an object from a gamemaster-provided definition
    pub fn from_wire(wire: &WireObject) -> Object {
        let props = props_from_map(wire.kind, &wire.properties);
        let extra = match &props {
            Props::None => wire.properties.clone(),
            _ => Map::new(),
        };

        Object {
            id: wire.id.clone(),
            kind: wire.kind,
            name: wire.name.clone(),
            position: wire.position,
            velocity: wire.velocity,
            acceleration: Vector3::ZERO,
            rotation: wire.rotation,
            angular_velocity: Vector3::ZERO,
            scale: wire.scale,
            health: wire.health,
            max_health: wire.max_health,
            shield: wire.shield,
            max_shield: wire.max_shield,
            power: wire.power,
            max_power: wire.max_power,
            mass: wire.mass,
            radius: wire.radius,
            is_player_ship: wire.is_player_ship,
            is_static: matches!(
                wire.kind,
                ObjectKind::Planet | ObjectKind::Station | ObjectKind::BlackHole | ObjectKind::Mine | ObjectKind::Nebula
            ),
            created_at: Utc::now(),
            ttl: None,
            props,
            extra,
        }
    }
}

fn get_f64(map: &Map<String, Value>, key: &str, default: f64) -> f64 {
    map.get(key).and_then(Value::as_f64).unwrap_or(default)
}

fn get_bool(map: &Map<String, Value>, key: &str, default: bool) -> bool {
    map.get(key).and_then(Value::as_bool).unwrap_or(default)
}

fn props_from_map(kind: ObjectKind, map: &Map<String, Value>) -> Props {
    match kind {
        ObjectKind::Torpedo => Props::Torpedo(TorpedoProps {
            target_id: map
                .get("target_id")
                .and_then(Value::as_str)
                .map(str::to_string),
            damage: get_f64(map, "damage", 500.0),
            proximity_trigger: get_f64(map, "proximity_trigger", 10.0),
            guidance: get_bool(map, "guidance", true),
        }),
        ObjectKind::Mine => Props::Mine(MineProps {
            damage: get_f64(map, "damage", 500.0),
            trigger_range: get_f64(map, "trigger_range", 50.0),
            armed: get_bool(map, "armed", true),
        }),
        ObjectKind::Nebula => Props::Nebula(NebulaProps {
            interference: get_f64(map, "interference", 0.7),
            visibility: get_f64(map, "visibility", 0.3),
            sensor_dampening: get_f64(map, "sensor_dampening", 0.8),
        }),
        ObjectKind::BlackHole => Props::BlackHole(BlackHoleProps {
            event_horizon: get_f64(map, "event_horizon", 0.0),
            accretion_disk: get_f64(map, "accretion_disk", 0.0),
            gravitational_range: get_f64(map, "gravitational_range", 0.0),
        }),
        _ => Props::None,
    }
}
