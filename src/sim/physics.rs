//! Rigid-body physics: integration, gravity, drag, collisions, guidance and
//! field effects
//!
//! The step order is a contract: gravity, drag, integration, collision
//! detection/resolution, torpedo guidance, black hole effects, nebula
//! effects. Damage recorded during collision resolution is visible to the
//! guidance proximity test in the same step.

use serde_json::Value;

use crate::config::UniverseConfig;
use crate::sim::object::{Object, ObjectKind};
use crate::util::math::Vector3;

/// Identity snapshot of one collision participant
#[derive(Debug, Clone)]
pub struct CollisionBody {
    pub id: String,
    pub kind: ObjectKind,
    pub position: Vector3,
    pub is_player_ship: bool,
}

impl CollisionBody {
    fn of(obj: &Object) -> CollisionBody {
        CollisionBody {
            id: obj.id.clone(),
            kind: obj.kind,
            position: obj.position,
            is_player_ship: obj.is_player_ship,
        }
    }
}

/// One resolved collision pair
#[derive(Debug, Clone)]
pub struct Collision {
    pub first: CollisionBody,
    pub second: CollisionBody,
    pub point: Vector3,
    pub normal: Vector3,
    pub penetration: f64,
    pub impulse: f64,
}

/// Stateless physics stepper; the universe owns the object storage
#[derive(Debug, Clone)]
pub struct Physics {
    pub gravitational_const: f64,
    pub collision_enabled: bool,
    pub drag_coefficient: f64,
    pub minimum_distance: f64,
    pub max_gravity_distance: f64,
    pub restitution: f64,
}

impl Default for Physics {
    fn default() -> Self {
        Physics {
            gravitational_const: 6.6743e-11,
            collision_enabled: true,
            drag_coefficient: 0.01,
            minimum_distance: 1.0,
            max_gravity_distance: 100_000.0,
            restitution: 0.8,
        }
    }
}

/// Disjoint mutable access to two slice elements, in either index order
fn two_mut(objects: &mut [Object], i: usize, j: usize) -> (&mut Object, &mut Object) {
    debug_assert!(i != j);
    if i < j {
        let (left, right) = objects.split_at_mut(j);
        (&mut left[i], &mut right[0])
    } else {
        let (left, right) = objects.split_at_mut(i);
        (&mut right[0], &mut left[j])
    }
}

impl Physics {
    pub fn from_config(cfg: &UniverseConfig) -> Physics {
        Physics {
            gravitational_const: cfg.gravity_constant,
            collision_enabled: cfg.collision_enabled,
            drag_coefficient: cfg.drag_coefficient,
            max_gravity_distance: cfg.max_gravity_distance,
            ..Physics::default()
        }
    }

    /// Advance the world by `dt` seconds and report the collisions that
    /// occurred
    pub fn step(&self, objects: &mut [Object], dt: f64) -> Vec<Collision> {
        self.apply_gravity(objects);
        self.apply_drag(objects);

        for obj in objects.iter_mut() {
            // TTL burns down even for static objects
            if let Some(ttl) = &mut obj.ttl {
                *ttl -= dt;
            }
            if obj.is_static {
                continue;
            }
            obj.integrate(dt);
        }

        let collisions = if self.collision_enabled {
            self.detect_and_resolve(objects)
        } else {
            Vec::new()
        };

        self.guide_torpedoes(objects, dt);
        self.apply_black_hole_effects(objects);
        self.apply_nebula_effects(objects);

        collisions
    }

    fn apply_gravity(&self, objects: &mut [Object]) {
        let count = objects.len();
        for i in 0..count {
            if objects[i].is_static || objects[i].kind == ObjectKind::Torpedo {
                continue;
            }

            for j in (i + 1)..count {
                if objects[j].kind == ObjectKind::Torpedo {
                    continue;
                }

                let distance = objects[i].position.distance(objects[j].position);
                if distance > self.max_gravity_distance || distance < self.minimum_distance {
                    continue;
                }

                let force = self.gravitational_force(&objects[i], &objects[j], distance);
                let (a, b) = two_mut(objects, i, j);
                let direction = (b.position - a.position).normalize();

                if !a.is_static {
                    a.apply_force(direction * force);
                }
                if !b.is_static {
                    b.apply_force(direction * -force);
                }
            }
        }
    }

    /// Scaled Newtonian attraction; planets and black holes pull harder
    fn gravitational_force(&self, a: &Object, b: &Object, distance: f64) -> f64 {
        let multiplier = match b.kind {
            ObjectKind::BlackHole => 1000.0,
            ObjectKind::Planet => 100.0,
            _ => 1.0,
        };
        self.gravitational_const * a.mass * b.mass * multiplier / (distance * distance)
    }

    fn apply_drag(&self, objects: &mut [Object]) {
        for obj in objects.iter_mut() {
            if obj.is_static || obj.velocity.length() == 0.0 {
                continue;
            }

            let drag =
                obj.velocity.normalize() * (-self.drag_coefficient * obj.velocity.length_squared());
            obj.apply_force(drag);
        }
    }

    fn detect_and_resolve(&self, objects: &mut [Object]) -> Vec<Collision> {
        let mut collisions = Vec::new();
        let count = objects.len();

        for i in 0..count {
            for j in (i + 1)..count {
                let distance = objects[i].position.distance(objects[j].position);
                if distance < objects[i].radius + objects[j].radius {
                    let (a, b) = two_mut(objects, i, j);
                    collisions.push(self.resolve_pair(a, b));
                }
            }
        }

        collisions
    }

    fn resolve_pair(&self, a: &mut Object, b: &mut Object) -> Collision {
        let offset = b.position - a.position;
        let distance = offset.length();

        let normal = if distance == 0.0 {
            Vector3::new(1.0, 0.0, 0.0)
        } else {
            offset / distance
        };

        let penetration = (a.radius + b.radius) - distance;
        let point = a.position + normal * a.radius;

        let relative_velocity = b.velocity - a.velocity;
        let velocity_along_normal = relative_velocity.dot(normal);

        if velocity_along_normal > 0.0 {
            // Already separating: report the contact, move nothing
            return Collision {
                first: CollisionBody::of(a),
                second: CollisionBody::of(b),
                point,
                normal,
                penetration,
                impulse: 0.0,
            };
        }

        let mut impulse = -(1.0 + self.restitution) * velocity_along_normal;
        let total_mass = a.mass + b.mass;
        if total_mass > 0.0 {
            impulse /= total_mass;
        }

        if !a.is_static {
            a.velocity -= normal * (impulse * b.mass);
        }
        if !b.is_static {
            b.velocity += normal * (impulse * a.mass);
        }

        // Static bodies never move; a lone dynamic body takes the full
        // correction so the pair ends fully separated
        match (a.is_static, b.is_static) {
            (false, false) => {
                a.position -= normal * (penetration * 0.5);
                b.position += normal * (penetration * 0.5);
            }
            (false, true) => a.position -= normal * penetration,
            (true, false) => b.position += normal * penetration,
            (true, true) => {}
        }

        self.apply_collision_damage(a, b, impulse);

        Collision {
            first: CollisionBody::of(a),
            second: CollisionBody::of(b),
            point,
            normal,
            penetration,
            impulse,
        }
    }

    /// Warhead rules preempt generic impact damage
    fn apply_collision_damage(&self, a: &mut Object, b: &mut Object, impulse: f64) {
        if a.kind == ObjectKind::Torpedo {
            if let Some(props) = a.props.as_torpedo() {
                b.take_damage(props.damage);
            }
            a.health = 0.0;
        } else if b.kind == ObjectKind::Torpedo {
            if let Some(props) = b.props.as_torpedo() {
                a.take_damage(props.damage);
            }
            b.health = 0.0;
        } else if a.kind == ObjectKind::Mine {
            if let Some(props) = a.props.as_mine() {
                b.take_damage(props.damage);
            }
            a.health = 0.0;
        } else if b.kind == ObjectKind::Mine {
            if let Some(props) = b.props.as_mine() {
                a.take_damage(props.damage);
            }
            b.health = 0.0;
        } else {
            let damage = impulse.abs() * 0.1;
            a.take_damage(damage);
            b.take_damage(damage);
        }
    }

    fn guide_torpedoes(&self, objects: &mut [Object], dt: f64) {
        let count = objects.len();
        for i in 0..count {
            if objects[i].kind != ObjectKind::Torpedo || objects[i].health <= 0.0 {
                continue;
            }

            let Some(props) = objects[i].props.as_torpedo() else {
                continue;
            };
            if !props.guidance {
                continue;
            }
            let Some(target_id) = props.target_id.clone() else {
                continue;
            };
            let (damage, proximity_trigger) = (props.damage, props.proximity_trigger);

            let Some(target_idx) = objects.iter().position(|o| o.id == target_id) else {
                continue;
            };
            if target_idx == i {
                continue;
            }

            let (torpedo, target) = two_mut(objects, i, target_idx);
            let to_target = target.position - torpedo.position;
            let distance = to_target.length();

            // Too close to steer, but the warhead still arms below
            if distance >= 10.0 {
                let desired = to_target.normalize();
                let current = torpedo.velocity.normalize();
                let turn = (5.0 * dt).min(1.0);
                let direction = current.lerp(desired, turn).normalize();

                let speed = torpedo.velocity.length();
                torpedo.velocity = direction * speed;
            }

            if distance <= proximity_trigger {
                target.take_damage(damage);
                torpedo.health = 0.0;
            }
        }
    }

    fn apply_black_hole_effects(&self, objects: &mut [Object]) {
        let count = objects.len();
        for hole_idx in 0..count {
            if objects[hole_idx].kind != ObjectKind::BlackHole {
                continue;
            }

            let Some(props) = objects[hole_idx].props.as_black_hole() else {
                continue;
            };
            let (event_horizon, range) = (props.event_horizon, props.gravitational_range);
            let (hole_pos, hole_mass) = (objects[hole_idx].position, objects[hole_idx].mass);

            for idx in 0..count {
                if idx == hole_idx || objects[idx].is_static {
                    continue;
                }

                let obj = &mut objects[idx];
                let distance = obj.position.distance(hole_pos);

                if distance <= event_horizon {
                    obj.health = 0.0;
                    continue;
                }

                if distance <= range {
                    let strength = 1.0 - distance / range;
                    let direction = (hole_pos - obj.position).normalize();
                    obj.apply_force(direction * (strength * hole_mass * 0.001));
                }
            }
        }
    }

    fn apply_nebula_effects(&self, objects: &mut [Object]) {
        let count = objects.len();
        for nebula_idx in 0..count {
            if objects[nebula_idx].kind != ObjectKind::Nebula {
                continue;
            }

            let Some(props) = objects[nebula_idx].props.as_nebula() else {
                continue;
            };
            let interference = props.interference;
            let (nebula_pos, nebula_radius) =
                (objects[nebula_idx].position, objects[nebula_idx].radius);

            for idx in 0..count {
                if idx == nebula_idx {
                    continue;
                }

                let obj = &mut objects[idx];
                if obj.position.distance(nebula_pos) > nebula_radius {
                    continue;
                }

                let drag_multiplier = 1.0 + interference;
                let drag = obj.velocity.normalize()
                    * (-self.drag_coefficient * drag_multiplier * obj.velocity.length_squared());
                obj.apply_force(drag);

                obj.extra
                    .insert("sensor_interference".to_string(), Value::from(interference));
            }
        }
    }
}

/// Nearest object intersected by a ray, by projection distance
pub fn raycast(
    objects: &[Object],
    origin: Vector3,
    direction: Vector3,
    max_distance: f64,
) -> Option<usize> {
    let dir = direction.normalize();
    let mut closest: Option<usize> = None;
    let mut closest_distance = max_distance;

    for (idx, obj) in objects.iter().enumerate() {
        let to_obj = obj.position - origin;
        let projection = to_obj.dot(dir);
        if projection < 0.0 || projection > max_distance {
            continue;
        }

        let nearest_point = origin + dir * projection;
        if nearest_point.distance(obj.position) <= obj.radius && projection < closest_distance {
            closest = Some(idx);
            closest_distance = projection;
        }
    }

    closest
}

/// Linear scan for objects with centers within `radius`
pub fn objects_in_range(objects: &[Object], center: Vector3, radius: f64) -> Vec<&Object> {
    objects
        .iter()
        .filter(|obj| center.distance(obj.position) <= radius)
        .collect()
}

/// Filtered variant of [`objects_in_range`]
pub fn objects_in_range_filtered<'a, F>(
    objects: &'a [Object],
    center: Vector3,
    radius: f64,
    filter: F,
) -> Vec<&'a Object>
where
    F: Fn(&Object) -> bool,
{
    objects
        .iter()
        .filter(|obj| center.distance(obj.position) <= radius && filter(obj))
        .collect()
}

/// Radial impulse with linear falloff; static bodies are unaffected
pub fn apply_explosion(objects: &mut [Object], center: Vector3, force: f64, radius: f64) {
    for obj in objects.iter_mut() {
        if obj.is_static {
            continue;
        }

        let distance = center.distance(obj.position);
        if distance > radius {
            continue;
        }

        let falloff = 1.0 - distance / radius;
        let direction = (obj.position - center).normalize();
        obj.apply_force(direction * (force * falloff));
    }
}

pub fn total_kinetic_energy(objects: &[Object]) -> f64 {
    objects
        .iter()
        .filter(|obj| !obj.is_static)
        .map(|obj| 0.5 * obj.mass * obj.velocity.length_squared())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::object::Props;

    fn body(id: &str, kind: ObjectKind, position: Vector3) -> Object {
        let mut obj = Object::new(id, kind, id);
        obj.position = position;
        obj
    }

    #[test]
    fn head_on_equal_mass_collision_resolves_with_restitution() {
        let mut a = body("a", ObjectKind::Ship, Vector3::new(-15.0, 0.0, 0.0));
        a.mass = 1000.0;
        a.radius = 10.0;
        a.velocity = Vector3::new(10.0, 0.0, 0.0);
        a.max_health = 1000.0;
        a.health = 1000.0;

        let mut b = body("b", ObjectKind::Ship, Vector3::new(15.0, 0.0, 0.0));
        b.mass = 1000.0;
        b.radius = 10.0;
        b.velocity = Vector3::new(-10.0, 0.0, 0.0);
        b.max_health = 1000.0;
        b.health = 1000.0;

        let physics = Physics::default();
        let mut objects = vec![a, b];
        let collisions = physics.step(&mut objects, 1.0);

        assert_eq!(collisions.len(), 1);
        // e = 0.8 head-on swap: v1 -> -8, v2 -> +8 (drag shaves a little
        // speed during the approach)
        assert!((objects[0].velocity.x + 8.0).abs() < 0.1, "v1 = {}", objects[0].velocity.x);
        assert!((objects[1].velocity.x - 8.0).abs() < 0.1, "v2 = {}", objects[1].velocity.x);

        let distance = objects[0].position.distance(objects[1].position);
        assert!(distance >= 20.0 - 1e-6, "distance = {distance}");
    }

    #[test]
    fn static_planet_pulls_ship_inward() {
        let mut ship = body("ship", ObjectKind::Ship, Vector3::new(500.0, 0.0, 0.0));
        ship.mass = 50_000.0;

        // Radius 100 gives the planet a 1e9 mass
        let planet = Object::planet("planet", "Kepler", Vector3::ZERO, 100.0);

        // Ship first: gravity pairs skip a static outer body
        let mut objects = vec![ship, planet];
        let physics = Physics::default();
        physics.step(&mut objects, 1.0);

        assert!(objects[0].velocity.x < 0.0);
        let distance = objects[0].position.distance(objects[1].position);
        assert!(distance < 500.0);
        // The planet itself never moves
        assert_eq!(objects[1].position, Vector3::ZERO);
    }

    #[test]
    fn separating_pair_reports_zero_impulse_without_displacement() {
        let mut a = body("a", ObjectKind::Asteroid, Vector3::new(-5.0, 0.0, 0.0));
        a.radius = 10.0;
        a.velocity = Vector3::new(-1.0, 0.0, 0.0);
        let mut b = body("b", ObjectKind::Asteroid, Vector3::new(5.0, 0.0, 0.0));
        b.radius = 10.0;
        b.velocity = Vector3::new(1.0, 0.0, 0.0);

        let physics = Physics::default();
        let mut objects = vec![a, b];
        let collisions = physics.detect_and_resolve(&mut objects);

        assert_eq!(collisions.len(), 1);
        assert_eq!(collisions[0].impulse, 0.0);
        assert_eq!(objects[0].position.x, -5.0);
        assert_eq!(objects[1].position.x, 5.0);
    }

    #[test]
    fn dynamic_body_fully_separates_from_static_partner() {
        let station = Object::station("station", "Base", Vector3::ZERO);
        let mut ship = body("ship", ObjectKind::Ship, Vector3::new(210.0, 0.0, 0.0));
        ship.radius = 50.0;
        ship.velocity = Vector3::new(-5.0, 0.0, 0.0);
        ship.max_health = 10_000.0;
        ship.health = 10_000.0;

        let physics = Physics::default();
        let mut objects = vec![station, ship];
        physics.detect_and_resolve(&mut objects);

        assert_eq!(objects[0].position, Vector3::ZERO);
        let distance = objects[0].position.distance(objects[1].position);
        assert!(distance >= 250.0 - 1e-6, "distance = {distance}");
    }

    #[test]
    fn coincident_centers_fall_back_to_x_axis_normal() {
        let mut a = body("a", ObjectKind::Asteroid, Vector3::ZERO);
        a.radius = 5.0;
        a.velocity = Vector3::new(1.0, 0.0, 0.0);
        let mut b = body("b", ObjectKind::Asteroid, Vector3::ZERO);
        b.radius = 5.0;
        b.velocity = Vector3::new(-1.0, 0.0, 0.0);

        let physics = Physics::default();
        let mut objects = vec![a, b];
        let collisions = physics.detect_and_resolve(&mut objects);

        assert_eq!(collisions.len(), 1);
        assert_eq!(collisions[0].normal, Vector3::new(1.0, 0.0, 0.0));
        assert!(objects[0].position.distance(objects[1].position) > 0.0);
    }

    #[test]
    fn torpedoes_are_exempt_from_gravity() {
        let mut torpedo = Object::torpedo("t", Vector3::new(200.0, 0.0, 0.0), Vector3::ZERO, None, 500.0);
        torpedo.props = Props::Torpedo(crate::sim::object::TorpedoProps {
            target_id: None,
            damage: 500.0,
            proximity_trigger: 10.0,
            guidance: false,
        });

        let mut planet = Object::planet("p", "Heavy", Vector3::ZERO, 100.0);
        planet.mass = 1e12;

        let physics = Physics::default();
        let mut objects = vec![torpedo, planet];
        physics.apply_gravity(&mut objects);

        assert_eq!(objects[0].acceleration, Vector3::ZERO);
    }

    #[test]
    fn quadratic_drag_slows_motion() {
        let mut obj = body("a", ObjectKind::Ship, Vector3::ZERO);
        obj.mass = 1000.0;
        obj.velocity = Vector3::new(100.0, 0.0, 0.0);

        let physics = Physics::default();
        let mut objects = vec![obj];
        physics.step(&mut objects, 1.0);

        assert!(objects[0].velocity.x < 100.0);
        assert!(objects[0].velocity.x > 0.0);
    }

    #[test]
    fn torpedo_homes_toward_offset_target() {
        let torpedo = Object::torpedo(
            "t",
            Vector3::ZERO,
            Vector3::new(100.0, 0.0, 0.0),
            Some("target".to_string()),
            500.0,
        );

        let mut target = body("target", ObjectKind::Ship, Vector3::new(500.0, 500.0, 0.0));
        target.is_static = true;

        let physics = Physics::default();
        let mut objects = vec![torpedo, target];
        physics.guide_torpedoes(&mut objects, 0.1);

        // Velocity bends toward the target while keeping its speed
        assert!(objects[0].velocity.y > 0.0);
        assert!((objects[0].velocity.length() - 100.0).abs() < 1e-6);
    }

    #[test]
    fn proximity_trigger_detonates_close_torpedo() {
        let torpedo = Object::torpedo(
            "t",
            Vector3::ZERO,
            Vector3::new(100.0, 0.0, 0.0),
            Some("target".to_string()),
            500.0,
        );

        let mut target = body("target", ObjectKind::Ship, Vector3::new(8.0, 0.0, 0.0));
        target.is_static = true;
        target.max_health = 1000.0;
        target.health = 1000.0;

        let physics = Physics::default();
        let mut objects = vec![torpedo, target];
        physics.guide_torpedoes(&mut objects, 1.0 / 60.0);

        assert_eq!(objects[1].health, 500.0);
        assert_eq!(objects[0].health, 0.0);
    }

    #[test]
    fn torpedo_collision_applies_warhead_damage_once() {
        let torpedo = Object::torpedo(
            "t",
            Vector3::new(-3.0, 0.0, 0.0),
            Vector3::new(50.0, 0.0, 0.0),
            None,
            500.0,
        );

        let mut target = body("target", ObjectKind::Ship, Vector3::new(5.0, 0.0, 0.0));
        target.radius = 10.0;
        target.max_health = 2000.0;
        target.health = 2000.0;

        let physics = Physics::default();
        let mut objects = vec![torpedo, target];
        physics.detect_and_resolve(&mut objects);

        // Warhead damage only, no generic impulse damage on top
        assert_eq!(objects[1].health, 1500.0);
        assert_eq!(objects[0].health, 0.0);
    }

    #[test]
    fn event_horizon_destroys_and_range_attracts() {
        let hole = Object::black_hole("bh", "Maw", Vector3::ZERO, 1e9);
        let horizon = hole.props.as_black_hole().unwrap().event_horizon;

        let mut doomed = body("doomed", ObjectKind::Ship, Vector3::new(horizon * 0.9, 0.0, 0.0));
        doomed.mass = 1000.0;
        let mut pulled = body("pulled", ObjectKind::Ship, Vector3::new(horizon * 20.0, 0.0, 0.0));
        pulled.mass = 1000.0;

        let physics = Physics::default();
        let mut objects = vec![hole, doomed, pulled];
        physics.apply_black_hole_effects(&mut objects);

        assert_eq!(objects[1].health, 0.0);
        assert!(objects[2].acceleration.x < 0.0);
    }

    #[test]
    fn nebula_adds_drag_and_stamps_interference() {
        let nebula = Object::nebula("n", "Cloud", Vector3::ZERO, 1000.0);
        let mut inside = body("inside", ObjectKind::Ship, Vector3::new(100.0, 0.0, 0.0));
        inside.mass = 1000.0;
        inside.velocity = Vector3::new(50.0, 0.0, 0.0);
        let mut outside = body("outside", ObjectKind::Ship, Vector3::new(5000.0, 0.0, 0.0));
        outside.velocity = Vector3::new(50.0, 0.0, 0.0);

        let physics = Physics::default();
        let mut objects = vec![nebula, inside, outside];
        physics.apply_nebula_effects(&mut objects);

        assert!(objects[1].acceleration.x < 0.0);
        assert_eq!(
            objects[1].extra.get("sensor_interference").and_then(Value::as_f64),
            Some(0.7)
        );
        assert!(objects[2].extra.get("sensor_interference").is_none());
    }

    #[test]
    fn raycast_finds_nearest_hit_along_ray() {
        let mut near = body("near", ObjectKind::Asteroid, Vector3::new(0.0, 0.0, 100.0));
        near.radius = 10.0;
        let mut far = body("far", ObjectKind::Asteroid, Vector3::new(0.0, 0.0, 300.0));
        far.radius = 10.0;
        let mut off_axis = body("off", ObjectKind::Asteroid, Vector3::new(500.0, 0.0, 100.0));
        off_axis.radius = 10.0;

        let objects = vec![far, off_axis, near];
        let hit = raycast(&objects, Vector3::ZERO, Vector3::FORWARD, 1000.0);
        assert_eq!(hit.map(|i| objects[i].id.as_str()), Some("near"));

        let miss = raycast(&objects, Vector3::ZERO, Vector3::new(0.0, 1.0, 0.0), 1000.0);
        assert!(miss.is_none());

        // Out of range
        let miss = raycast(&objects, Vector3::ZERO, Vector3::FORWARD, 50.0);
        assert!(miss.is_none());
    }

    #[test]
    fn explosion_pushes_radially_with_falloff() {
        let mut close = body("close", ObjectKind::Ship, Vector3::new(50.0, 0.0, 0.0));
        close.mass = 1000.0;
        let mut distant = body("distant", ObjectKind::Ship, Vector3::new(150.0, 0.0, 0.0));
        distant.mass = 1000.0;
        let station = Object::station("station", "Base", Vector3::new(50.0, 0.0, 0.0));

        let mut objects = vec![close, distant, station];
        apply_explosion(&mut objects, Vector3::ZERO, 1000.0, 200.0);

        assert!(objects[0].acceleration.x > objects[1].acceleration.x);
        assert!(objects[1].acceleration.x > 0.0);
        assert_eq!(objects[2].acceleration, Vector3::ZERO);
    }

    #[test]
    fn range_query_is_inclusive_of_radius() {
        let a = body("a", ObjectKind::Asteroid, Vector3::new(100.0, 0.0, 0.0));
        let b = body("b", ObjectKind::Asteroid, Vector3::new(300.0, 0.0, 0.0));
        let objects = vec![a, b];

        let hits = objects_in_range(&objects, Vector3::ZERO, 100.0);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "a");

        let ships = objects_in_range_filtered(&objects, Vector3::ZERO, 1000.0, |o| {
            o.kind == ObjectKind::Ship
        });
        assert!(ships.is_empty());
    }
}
