//! Mission script host: a sandboxed Lua state with a fixed API surface and a
//! per-tick trigger sweep
//!
//! Scripts never see live universe structures; reads hand out plain tables
//! and IDs, and every mutation goes through a named host function.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use mlua::{Function, Lua, LuaOptions, RegistryKey, StdLib, Table, Value as LuaValue};
use rand::Rng;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::config::MissionsConfig;
use crate::sim::object::Object;
use crate::sim::ship::Ship;
use crate::sim::universe::VisualEffect;
use crate::sim::SharedUniverse;
use crate::util::math::Vector3;

/// A (condition, action) pair evaluated once per tick
struct ScriptTrigger {
    kind: String,
    condition: Arc<RegistryKey>,
    action: Arc<RegistryKey>,
    active: bool,
}

type TriggerMap = Arc<Mutex<HashMap<String, ScriptTrigger>>>;

/// Mission bookkeeping visible to the admin API
#[derive(Debug, Clone, Serialize)]
pub struct Mission {
    pub name: String,
    pub description: String,
    pub objectives: Vec<String>,
    pub state: Map<String, Value>,
    pub is_active: bool,
    pub is_complete: bool,
    pub started_at: DateTime<Utc>,
}

type MissionMap = Arc<Mutex<HashMap<String, Mission>>>;

pub struct ScriptHost {
    lua: Lua,
    universe: SharedUniverse,
    triggers: TriggerMap,
    missions: MissionMap,
    scripts_path: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("Script error: {0}")]
    Lua(#[from] mlua::Error),

    #[error("Failed to read script file: {0}")]
    Io(#[from] std::io::Error),
}

fn stdlib_from_names(names: &[String]) -> StdLib {
    let mut libs = StdLib::NONE;
    for name in names {
        libs = libs
            | match name.as_str() {
                "math" => StdLib::MATH,
                "string" => StdLib::STRING,
                "table" => StdLib::TABLE,
                "os" => StdLib::OS,
                "io" => StdLib::IO,
                _ => StdLib::NONE,
            };
    }
    libs
}

fn vector_table(lua: &Lua, v: Vector3) -> mlua::Result<Table> {
    let table = lua.create_table()?;
    table.set("x", v.x)?;
    table.set("y", v.y)?;
    table.set("z", v.z)?;
    Ok(table)
}

/// Accepts both `{x=..., y=..., z=...}` and `{x, y, z}` array style
fn table_to_vector(table: &Table) -> mlua::Result<Vector3> {
    let x: Option<f64> = table.get("x")?;
    match x {
        Some(x) => Ok(Vector3::new(x, table.get("y")?, table.get("z")?)),
        None => Ok(Vector3::new(table.get(1)?, table.get(2)?, table.get(3)?)),
    }
}

/// Copy-on-read snapshot of one object as a plain Lua table
fn object_table<'a>(lua: &'a Lua, obj: &Object) -> mlua::Result<Table<'a>> {
    let table = lua.create_table()?;
    table.set("id", obj.id.clone())?;
    table.set("type", obj.kind.as_str())?;
    table.set("name", obj.name.clone())?;
    table.set("position", vector_table(lua, obj.position)?)?;
    table.set("velocity", vector_table(lua, obj.velocity)?)?;
    table.set("health", obj.health)?;
    table.set("max_health", obj.max_health)?;
    table.set("shield", obj.shield)?;
    table.set("max_shield", obj.max_shield)?;
    table.set("power", obj.power)?;
    table.set("max_power", obj.max_power)?;
    table.set("mass", obj.mass)?;
    table.set("radius", obj.radius)?;
    table.set("is_player_ship", obj.is_player_ship)?;
    table.set("is_static", obj.is_static)?;
    Ok(table)
}

fn lua_truthy(value: &LuaValue) -> bool {
    !matches!(value, LuaValue::Nil | LuaValue::Boolean(false))
}

impl ScriptHost {
    pub fn new(universe: SharedUniverse, cfg: &MissionsConfig) -> Result<ScriptHost, ScriptError> {
        let libs = stdlib_from_names(&cfg.allowed_libraries);
        let lua = Lua::new_with(libs, LuaOptions::default())?;

        let host = ScriptHost {
            lua,
            universe,
            triggers: Arc::new(Mutex::new(HashMap::new())),
            missions: Arc::new(Mutex::new(HashMap::new())),
            scripts_path: PathBuf::from(&cfg.scripts_path),
        };

        host.register_api()?;
        Ok(host)
    }

    fn register_api(&self) -> mlua::Result<()> {
        let globals = self.lua.globals();

        // --- object lifecycle -------------------------------------------

        let universe = self.universe.clone();
        globals.set(
            "createObject",
            self.lua.create_function(
                move |_,
                      (obj_type, name, x, y, z, extra): (
                    String,
                    String,
                    f64,
                    f64,
                    f64,
                    Option<f64>,
                )| {
                    let position = Vector3::new(x, y, z);
                    let mut universe = universe.write().unwrap();
                    let id = universe.generate_id(&format!("script_{obj_type}"));

                    match obj_type.as_str() {
                        "ship" => {
                            let (obj, ship) = Ship::crewed(id.clone(), &name, position);
                            universe.add_ship(obj, ship);
                        }
                        "planet" => {
                            let radius = extra.unwrap_or(1000.0);
                            universe.add_object(Object::planet(id.clone(), &name, position, radius));
                        }
                        "station" => {
                            universe.add_object(Object::station(id.clone(), &name, position));
                        }
                        "asteroid" => {
                            universe.add_object(Object::asteroid(id.clone(), position));
                        }
                        "mine" => {
                            let damage = extra.unwrap_or(500.0);
                            universe.add_object(Object::mine(id.clone(), position, damage));
                        }
                        _ => return Ok(None),
                    }

                    Ok(Some(id))
                },
            )?,
        )?;

        let universe = self.universe.clone();
        globals.set(
            "destroyObject",
            self.lua.create_function(move |_, id: String| {
                universe.write().unwrap().remove_object(&id);
                Ok(())
            })?,
        )?;

        let universe = self.universe.clone();
        globals.set(
            "getObject",
            self.lua.create_function(move |lua, id: String| {
                let universe = universe.read().unwrap();
                match universe.object(&id) {
                    Some(obj) => Ok(Some(object_table(lua, obj)?)),
                    None => Ok(None),
                }
            })?,
        )?;

        let universe = self.universe.clone();
        globals.set(
            "modifyObject",
            self.lua.create_function(
                move |_, (id, property, value): (String, String, LuaValue)| {
                    let mut universe = universe.write().unwrap();
                    let Some(obj) = universe.object_mut(&id) else {
                        return Ok(());
                    };

                    match (property.as_str(), &value) {
                        ("position", LuaValue::Table(table)) => {
                            obj.position = table_to_vector(table)?;
                        }
                        ("velocity", LuaValue::Table(table)) => {
                            obj.velocity = table_to_vector(table)?;
                        }
                        ("health", LuaValue::Number(n)) => obj.health = *n,
                        ("health", LuaValue::Integer(n)) => obj.health = *n as f64,
                        ("shield", LuaValue::Number(n)) => obj.shield = *n,
                        ("shield", LuaValue::Integer(n)) => obj.shield = *n as f64,
                        _ => {}
                    }
                    Ok(())
                },
            )?,
        )?;

        let universe = self.universe.clone();
        globals.set(
            "moveObject",
            self.lua
                .create_function(move |_, (id, x, y, z): (String, f64, f64, f64)| {
                    let mut universe = universe.write().unwrap();
                    if let Some(obj) = universe.object_mut(&id) {
                        obj.position = Vector3::new(x, y, z);
                    }
                    Ok(())
                })?,
        )?;

        // --- triggers ----------------------------------------------------

        let triggers = self.triggers.clone();
        globals.set(
            "createTrigger",
            self.lua.create_function(
                move |lua, (id, kind, condition, action): (String, String, Function, Function)| {
                    let condition = lua.create_registry_value(condition)?;
                    let action = lua.create_registry_value(action)?;
                    triggers.lock().unwrap().insert(
                        id,
                        ScriptTrigger {
                            kind,
                            condition: Arc::new(condition),
                            action: Arc::new(action),
                            active: true,
                        },
                    );
                    Ok(())
                },
            )?,
        )?;

        let triggers = self.triggers.clone();
        globals.set(
            "removeTrigger",
            self.lua.create_function(move |_, id: String| {
                triggers.lock().unwrap().remove(&id);
                Ok(())
            })?,
        )?;

        let triggers = self.triggers.clone();
        globals.set(
            "checkTrigger",
            self.lua.create_function(move |_, id: String| {
                let active = triggers
                    .lock()
                    .unwrap()
                    .get(&id)
                    .map(|t| t.active)
                    .unwrap_or(false);
                Ok(active)
            })?,
        )?;

        // --- mission communications -------------------------------------

        let universe = self.universe.clone();
        globals.set(
            "sendMessage",
            self.lua.create_function(
                move |_, (target, message, priority): (String, String, Option<i64>)| {
                    let mut universe = universe.write().unwrap();
                    let ship_id = universe.player_ship_id().to_string();
                    let entry = serde_json::json!({
                        "from": "mission_control",
                        "to": target,
                        "message": message,
                        "priority": priority.unwrap_or(3),
                        "timestamp": Utc::now(),
                    });
                    if let Some(obj) = universe.object_mut(&ship_id) {
                        let queue = obj
                            .extra
                            .entry("incoming_messages".to_string())
                            .or_insert_with(|| Value::Array(Vec::new()));
                        if let Value::Array(list) = queue {
                            list.push(entry);
                        }
                    }
                    Ok(())
                },
            )?,
        )?;

        let universe = self.universe.clone();
        globals.set(
            "broadcastMessage",
            self.lua
                .create_function(move |_, (message, priority): (String, Option<i64>)| {
                    let mut universe = universe.write().unwrap();
                    let ship_id = universe.player_ship_id().to_string();
                    let entry = serde_json::json!({
                        "type": "broadcast",
                        "message": message,
                        "priority": priority.unwrap_or(3),
                        "timestamp": Utc::now(),
                    });
                    if let Some(obj) = universe.object_mut(&ship_id) {
                        obj.extra.insert("mission_broadcast".to_string(), entry);
                    }
                    Ok(())
                })?,
        )?;

        let universe = self.universe.clone();
        globals.set(
            "setAlertLevel",
            self.lua.create_function(move |_, level: i64| {
                universe.write().unwrap().set_alert_level(level);
                Ok(())
            })?,
        )?;

        let universe = self.universe.clone();
        globals.set(
            "setTimeAcceleration",
            self.lua.create_function(move |_, factor: f64| {
                universe.write().unwrap().set_time_acceleration(factor);
                Ok(())
            })?,
        )?;

        // --- spawn helpers ----------------------------------------------

        let universe = self.universe.clone();
        globals.set(
            "spawnShip",
            self.lua
                .create_function(move |_, (name, x, y, z): (String, f64, f64, f64)| {
                    let mut universe = universe.write().unwrap();
                    let id = universe.generate_id("script_ship");
                    let (obj, ship) = Ship::crewed(id.clone(), &name, Vector3::new(x, y, z));
                    universe.add_ship(obj, ship);
                    Ok(id)
                })?,
        )?;

        let universe = self.universe.clone();
        globals.set(
            "spawnPlanet",
            self.lua.create_function(
                move |_, (name, x, y, z, radius): (String, f64, f64, f64, f64)| {
                    let mut universe = universe.write().unwrap();
                    let id = universe.generate_id("script_planet");
                    universe.add_object(Object::planet(id.clone(), &name, Vector3::new(x, y, z), radius));
                    Ok(id)
                },
            )?,
        )?;

        let universe = self.universe.clone();
        globals.set(
            "spawnStation",
            self.lua
                .create_function(move |_, (name, x, y, z): (String, f64, f64, f64)| {
                    let mut universe = universe.write().unwrap();
                    let id = universe.generate_id("script_station");
                    universe.add_object(Object::station(id.clone(), &name, Vector3::new(x, y, z)));
                    Ok(id)
                })?,
        )?;

        let universe = self.universe.clone();
        globals.set(
            "spawnAsteroid",
            self.lua
                .create_function(move |_, (x, y, z): (f64, f64, f64)| {
                    let mut universe = universe.write().unwrap();
                    let id = universe.generate_id("script_asteroid");
                    universe.add_object(Object::asteroid(id.clone(), Vector3::new(x, y, z)));
                    Ok(id)
                })?,
        )?;

        let universe = self.universe.clone();
        globals.set(
            "spawnMine",
            self.lua
                .create_function(move |_, (x, y, z, damage): (f64, f64, f64, f64)| {
                    let mut universe = universe.write().unwrap();
                    let id = universe.generate_id("script_mine");
                    universe.add_object(Object::mine(id.clone(), Vector3::new(x, y, z), damage));
                    Ok(id)
                })?,
        )?;

        // --- queries -----------------------------------------------------

        let universe = self.universe.clone();
        globals.set(
            "getPlayerShip",
            self.lua.create_function(move |lua, ()| {
                let universe = universe.read().unwrap();
                match universe.player_ship() {
                    Some(obj) => Ok(Some(object_table(lua, obj)?)),
                    None => Ok(None),
                }
            })?,
        )?;

        let universe = self.universe.clone();
        globals.set(
            "getDistance",
            self.lua
                .create_function(move |_, (first, second): (String, String)| {
                    let universe = universe.read().unwrap();
                    Ok(universe.distance_between(&first, &second).unwrap_or(-1.0))
                })?,
        )?;

        let universe = self.universe.clone();
        globals.set(
            "getObjectsInRange",
            self.lua.create_function(
                move |lua, (x, y, z, radius): (f64, f64, f64, f64)| {
                    let universe = universe.read().unwrap();
                    let ids = universe.ids_in_range(Vector3::new(x, y, z), radius);
                    lua.create_sequence_from(ids)
                },
            )?,
        )?;

        // --- effects -----------------------------------------------------

        let universe = self.universe.clone();
        globals.set(
            "createExplosion",
            self.lua
                .create_function(move |_, (x, y, z, force): (f64, f64, f64, f64)| {
                    let mut universe = universe.write().unwrap();
                    universe.create_explosion(Vector3::new(x, y, z), force, [1.0, 0.5, 0.0]);
                    Ok(())
                })?,
        )?;

        let universe = self.universe.clone();
        globals.set(
            "createEffect",
            self.lua.create_function(
                move |_, (effect_type, x, y, z, duration): (String, f64, f64, f64, f64)| {
                    let mut universe = universe.write().unwrap();
                    let id = universe.generate_id("script_effect");
                    universe.add_effect(VisualEffect {
                        id: id.clone(),
                        effect_type,
                        position: Vector3::new(x, y, z),
                        direction: Vector3::ZERO,
                        color: [1.0, 1.0, 1.0],
                        intensity: 1.0,
                        duration,
                        time_left: duration,
                        properties: Map::new(),
                    });
                    Ok(id)
                },
            )?,
        )?;

        // --- mission bookkeeping ----------------------------------------

        let missions = self.missions.clone();
        let universe = self.universe.clone();
        globals.set(
            "startMission",
            self.lua
                .create_function(move |_, (name, description): (String, String)| {
                    let mission = Mission {
                        name: name.clone(),
                        description,
                        objectives: Vec::new(),
                        state: Map::new(),
                        is_active: true,
                        is_complete: false,
                        started_at: Utc::now(),
                    };
                    missions.lock().unwrap().insert(name.clone(), mission);

                    let mut universe = universe.write().unwrap();
                    let ship_id = universe.player_ship_id().to_string();
                    if let Some(obj) = universe.object_mut(&ship_id) {
                        obj.extra
                            .insert("current_mission".to_string(), Value::from(name.clone()));
                    }

                    info!(mission = %name, "Mission started");
                    Ok(())
                })?,
        )?;

        let missions = self.missions.clone();
        globals.set(
            "completeMission",
            self.lua.create_function(move |_, name: String| {
                if let Some(mission) = missions.lock().unwrap().get_mut(&name) {
                    mission.is_complete = true;
                    mission.is_active = false;
                    info!(mission = %name, "Mission complete");
                }
                Ok(())
            })?,
        )?;

        let missions = self.missions.clone();
        globals.set(
            "setObjective",
            self.lua
                .create_function(move |_, (mission, objective): (String, String)| {
                    if let Some(mission) = missions.lock().unwrap().get_mut(&mission) {
                        mission.objectives.push(objective);
                    }
                    Ok(())
                })?,
        )?;

        let missions = self.missions.clone();
        globals.set(
            "completeObjective",
            self.lua
                .create_function(move |_, (mission, index): (String, usize)| {
                    if let Some(mission) = missions.lock().unwrap().get_mut(&mission) {
                        if let Some(objective) = mission.objectives.get_mut(index) {
                            *objective = format!("[COMPLETE] {objective}");
                        }
                    }
                    Ok(())
                })?,
        )?;

        // --- utilities ---------------------------------------------------

        globals.set(
            "log",
            self.lua.create_function(|_, message: String| {
                info!(target: "mission_script", "{message}");
                Ok(())
            })?,
        )?;

        // Blocks the calling thread; never call from a trigger
        globals.set(
            "wait",
            self.lua.create_function(|_, seconds: f64| {
                std::thread::sleep(std::time::Duration::from_secs_f64(seconds.max(0.0)));
                Ok(())
            })?,
        )?;

        globals.set(
            "random",
            self.lua.create_function(|_, (min, max): (f64, f64)| {
                if max > min {
                    Ok(rand::thread_rng().gen_range(min..max))
                } else {
                    Ok(min)
                }
            })?,
        )?;

        globals.set(
            "Vector3",
            self.lua
                .create_function(|lua, (x, y, z): (f64, f64, f64)| vector_table(lua, Vector3::new(x, y, z)))?,
        )?;

        Ok(())
    }

    /// Load and run a mission file. Relative paths resolve against the
    /// configured scripts directory.
    pub fn load_mission_file(&self, path: &str) -> Result<(), ScriptError> {
        let resolved = if Path::new(path).is_absolute() || Path::new(path).exists() {
            PathBuf::from(path)
        } else {
            self.scripts_path.join(path)
        };

        let source = std::fs::read_to_string(&resolved)?;
        self.lua
            .load(&source)
            .set_name(resolved.to_string_lossy())
            .exec()?;

        info!(path = %resolved.display(), "Mission script loaded");
        Ok(())
    }

    /// Run an inline script (gamemaster console)
    pub fn execute(&self, script: &str) -> Result<(), ScriptError> {
        self.lua.load(script).exec()?;
        Ok(())
    }

    /// Sweep the trigger registry once; errors are logged and the trigger
    /// stays active
    pub fn update(&self) {
        let snapshot: Vec<(String, Arc<RegistryKey>, Arc<RegistryKey>)> = {
            let triggers = self.triggers.lock().unwrap();
            triggers
                .iter()
                .filter(|(_, trigger)| trigger.active)
                .map(|(id, trigger)| {
                    (id.clone(), trigger.condition.clone(), trigger.action.clone())
                })
                .collect()
        };

        for (id, condition, action) in snapshot {
            let fired = match self.lua.registry_value::<Function>(&condition) {
                Ok(f) => match f.call::<_, LuaValue>(()) {
                    Ok(result) => lua_truthy(&result),
                    Err(err) => {
                        warn!(trigger = %id, error = %err, "Trigger condition error");
                        continue;
                    }
                },
                Err(err) => {
                    warn!(trigger = %id, error = %err, "Trigger condition missing");
                    continue;
                }
            };

            if fired {
                if let Ok(f) = self.lua.registry_value::<Function>(&action) {
                    if let Err(err) = f.call::<_, ()>(()) {
                        warn!(trigger = %id, error = %err, "Trigger action error");
                    }
                }
            }
        }

        self.lua.expire_registry_values();
    }

    pub fn remove_trigger(&self, id: &str) {
        self.triggers.lock().unwrap().remove(id);
    }

    pub fn trigger_count(&self) -> usize {
        self.triggers.lock().unwrap().len()
    }

    pub fn missions(&self) -> Vec<Mission> {
        let mut missions: Vec<Mission> = self.missions.lock().unwrap().values().cloned().collect();
        missions.sort_by(|a, b| a.name.cmp(&b.name));
        missions
    }

    pub fn active_mission(&self) -> Option<Mission> {
        self.missions
            .lock()
            .unwrap()
            .values()
            .find(|mission| mission.is_active)
            .cloned()
    }

    /// Kind of each registered trigger, for the status endpoint
    pub fn trigger_kinds(&self) -> Vec<(String, String)> {
        self.triggers
            .lock()
            .unwrap()
            .iter()
            .map(|(id, trigger)| (id.clone(), trigger.kind.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::RwLock;

    use crate::config::UniverseConfig;
    use crate::sim::Universe;

    fn host() -> (ScriptHost, SharedUniverse) {
        let universe: SharedUniverse =
            Arc::new(RwLock::new(Universe::new(&UniverseConfig::default())));
        let host = ScriptHost::new(universe.clone(), &MissionsConfig::default()).unwrap();
        (host, universe)
    }

    #[test]
    fn scripts_spawn_objects_through_host_api() {
        let (host, universe) = host();

        host.execute(r#"ship_id = spawnShip("Rival", 1000, 0, 0)"#).unwrap();
        host.execute(r#"planet_id = spawnPlanet("Vulcan", -5000, 0, 0, 1500)"#)
            .unwrap();

        let universe = universe.read().unwrap();
        let ships: Vec<_> = universe
            .objects()
            .iter()
            .filter(|o| o.name == "Rival")
            .collect();
        assert_eq!(ships.len(), 1);
        assert!(universe.ship(&ships[0].id).is_some());
        assert!(universe.objects().iter().any(|o| o.name == "Vulcan"));
    }

    #[test]
    fn get_object_returns_a_copy_as_table() {
        let (host, universe) = host();

        host.execute(
            r#"
            local ship = getPlayerShip()
            assert(ship ~= nil)
            assert(ship.id == "player_ship")
            assert(ship.is_player_ship == true)
            -- Mutating the copy must not touch the universe
            ship.health = 1
            "#,
        )
        .unwrap();

        let universe = universe.read().unwrap();
        assert_eq!(universe.object("player_ship").unwrap().health, 100.0);
    }

    #[test]
    fn modify_object_moves_through_named_mutators() {
        let (host, universe) = host();

        host.execute(r#"moveObject("player_ship", 500, 100, -200)"#).unwrap();
        host.execute(r#"modifyObject("player_ship", "health", 42)"#).unwrap();
        host.execute(r#"modifyObject("player_ship", "velocity", {x=10, y=0, z=0})"#)
            .unwrap();

        let universe = universe.read().unwrap();
        let obj = universe.object("player_ship").unwrap();
        assert_eq!(obj.position, Vector3::new(500.0, 100.0, -200.0));
        assert_eq!(obj.health, 42.0);
        assert_eq!(obj.velocity.x, 10.0);
    }

    #[test]
    fn triggers_fire_when_condition_is_truthy() {
        let (host, universe) = host();

        host.execute(
            r#"
            fired = 0
            createTrigger("near_station", "proximity",
                function()
                    return getDistance("player_ship", "starbase_1") < 10000
                end,
                function()
                    fired = fired + 1
                end)
            "#,
        )
        .unwrap();

        assert_eq!(host.trigger_count(), 1);

        // 5000 away: fires every sweep until removed
        host.update();
        host.update();

        host.execute(r#"assert(fired == 2)"#).unwrap();

        // Move out of range: condition goes false
        universe.write().unwrap().object_mut("player_ship").unwrap().position =
            Vector3::new(100_000.0, 0.0, 0.0);
        host.update();
        host.execute(r#"assert(fired == 2)"#).unwrap();
    }

    #[test]
    fn trigger_errors_are_contained_and_trigger_survives() {
        let (host, _) = host();

        host.execute(
            r#"
            createTrigger("broken", "test",
                function() error("boom") end,
                function() end)
            "#,
        )
        .unwrap();

        // Both sweeps survive the failing condition
        host.update();
        host.update();
        assert_eq!(host.trigger_count(), 1);
    }

    #[test]
    fn remove_trigger_stops_the_sweep() {
        let (host, _) = host();

        host.execute(
            r#"
            count = 0
            createTrigger("once", "test",
                function() return true end,
                function()
                    count = count + 1
                    removeTrigger("once")
                end)
            "#,
        )
        .unwrap();

        host.update();
        host.update();
        host.execute(r#"assert(count == 1)"#).unwrap();
        assert_eq!(host.trigger_count(), 0);
    }

    #[test]
    fn mission_lifecycle_tracks_objectives() {
        let (host, _) = host();

        host.execute(
            r#"
            startMission("patrol", "Patrol the sector")
            setObjective("patrol", "Reach starbase")
            setObjective("patrol", "Scan the nebula")
            completeObjective("patrol", 0)
            "#,
        )
        .unwrap();

        let mission = host.active_mission().unwrap();
        assert_eq!(mission.name, "patrol");
        assert!(mission.is_active);
        assert_eq!(mission.objectives.len(), 2);
        assert!(mission.objectives[0].starts_with("[COMPLETE]"));

        host.execute(r#"completeMission("patrol")"#).unwrap();
        assert!(host.active_mission().is_none());
        assert!(host.missions()[0].is_complete);
    }

    #[test]
    fn mission_messages_queue_on_player_ship() {
        let (host, universe) = host();

        host.execute(r#"sendMessage("player_ship", "Proceed to waypoint", 1)"#).unwrap();
        host.execute(r#"sendMessage("player_ship", "Hold position", 2)"#).unwrap();

        let universe = universe.read().unwrap();
        let obj = universe.object("player_ship").unwrap();
        let queue = obj.extra.get("incoming_messages").unwrap().as_array().unwrap();
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn alert_and_time_acceleration_setters_clamp() {
        let (host, universe) = host();

        host.execute(r#"setAlertLevel(9)"#).unwrap();
        host.execute(r#"setTimeAcceleration(100)"#).unwrap();

        let universe = universe.read().unwrap();
        assert_eq!(universe.alert_level(), 3);
        assert_eq!(universe.time_acceleration(), 10.0);
    }

    #[test]
    fn range_query_and_effects() {
        let (host, universe) = host();

        host.execute(
            r#"
            spawnMine(100, 0, 0, 250)
            local nearby = getObjectsInRange(0, 0, 0, 500)
            assert(#nearby >= 2) -- player ship and the mine at least
            effect_id = createEffect("warp_flash", 0, 0, 0, 1.5)
            assert(effect_id ~= nil)
            "#,
        )
        .unwrap();

        let universe = universe.read().unwrap();
        assert!(universe.effects().any(|e| e.effect_type == "warp_flash"));
    }

    #[test]
    fn random_stays_in_range() {
        let (host, _) = host();
        host.execute(
            r#"
            for i = 1, 50 do
                local v = random(5, 10)
                assert(v >= 5 and v < 10)
            end
            "#,
        )
        .unwrap();
    }

    #[test]
    fn sandbox_excludes_unlisted_libraries() {
        let (host, _) = host();
        // io is not in the default allowed list
        host.execute(r#"assert(io == nil)"#).unwrap();
        // math is
        host.execute(r#"assert(math.floor(1.5) == 1)"#).unwrap();
    }
}
