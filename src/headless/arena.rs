//! In-memory battlefield
//!
//! A flat arena holding combatant records and spherical obstacles. Answers
//! radius queries (one hit per contact volume) and segment raycasts against
//! obstacles and sight-blocking combatants.

use bevy::prelude::*;
use smallvec::SmallVec;

use crate::combat::combatant::Combatant;
use crate::combat::constants::BODY_RADIUS;
use crate::combat::world::{Battlefield, ContactHit, Layers, RayHit};

/// A sight-blocking pillar or rock.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Obstacle {
    pub center: Vec3,
    pub radius: f32,
}

#[derive(Resource, Default)]
pub struct Arena {
    /// Stable spawn order
    combatants: Vec<Combatant>,
    obstacles: Vec<Obstacle>,
    next_id: u32,
}

impl Arena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a fresh entity id for a combatant about to be inserted.
    pub fn allocate(&mut self) -> Entity {
        let id = Entity::from_raw(self.next_id);
        self.next_id += 1;
        id
    }

    /// Add a combatant; replaces any record with the same id.
    pub fn insert(&mut self, combatant: Combatant) -> Entity {
        let id = combatant.id;
        self.next_id = self.next_id.max(id.index() + 1);
        if let Some(existing) = self.combatants.iter_mut().find(|c| c.id == id) {
            *existing = combatant;
        } else {
            self.combatants.push(combatant);
        }
        id
    }

    pub fn remove(&mut self, id: Entity) -> Option<Combatant> {
        let index = self.combatants.iter().position(|c| c.id == id)?;
        Some(self.combatants.remove(index))
    }

    pub fn add_obstacle(&mut self, center: Vec3, radius: f32) {
        self.obstacles.push(Obstacle { center, radius });
    }

    pub fn combatants(&self) -> impl Iterator<Item = &Combatant> {
        self.combatants.iter()
    }

    /// Center of one contact volume. Volumes are stacked upward from the feet.
    pub fn volume_center(combatant: &Combatant, volume: u8) -> Vec3 {
        combatant.position + Vec3::Y * BODY_RADIUS * (1.0 + 2.0 * volume as f32)
    }

    /// Step `id` toward `goal` at `speed`, stopping `stop_distance` short.
    pub fn approach(&mut self, id: Entity, goal: Vec3, stop_distance: f32, speed: f32, dt: f32) {
        let Some(combatant) = self.combatant_mut(id) else {
            return;
        };
        let offset = goal - combatant.position;
        let remaining = offset.length() - stop_distance;
        if remaining <= 0.0 {
            return;
        }
        let step = (speed * dt).min(remaining);
        combatant.position += offset.normalize_or_zero() * step;
    }
}

/// Entry parameter along `from -> to` where the segment enters a sphere.
fn segment_sphere(from: Vec3, to: Vec3, center: Vec3, radius: f32) -> Option<f32> {
    let direction = to - from;
    let offset = from - center;
    let c = offset.length_squared() - radius * radius;
    if c <= 0.0 {
        // Starts inside
        return Some(0.0);
    }
    let a = direction.length_squared();
    if a <= f32::EPSILON {
        return None;
    }
    let b = 2.0 * offset.dot(direction);
    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 {
        return None;
    }
    let t = (-b - discriminant.sqrt()) / (2.0 * a);
    (0.0..=1.0).contains(&t).then_some(t)
}

impl Battlefield for Arena {
    fn combatant(&self, id: Entity) -> Option<&Combatant> {
        self.combatants.iter().find(|c| c.id == id)
    }

    fn combatant_mut(&mut self, id: Entity) -> Option<&mut Combatant> {
        self.combatants.iter_mut().find(|c| c.id == id)
    }

    fn combatant_ids(&self) -> Vec<Entity> {
        self.combatants.iter().map(|c| c.id).collect()
    }

    fn contacts_within(&self, center: Vec3, radius: f32, layers: Layers) -> SmallVec<[ContactHit; 16]> {
        let mut hits = SmallVec::new();
        if !layers.contains(Layers::COMBATANTS) {
            return hits;
        }
        for combatant in &self.combatants {
            for volume in 0..combatant.volumes.max(1) {
                let distance = (Self::volume_center(combatant, volume).distance(center) - BODY_RADIUS).max(0.0);
                if distance <= radius {
                    hits.push(ContactHit {
                        entity: combatant.id,
                        volume,
                        distance,
                    });
                }
            }
        }
        hits
    }

    fn raycast(&self, from: Vec3, to: Vec3, layers: Layers, ignore: Option<Entity>) -> Option<RayHit> {
        let mut nearest: Option<(f32, Option<Entity>)> = None;
        let mut consider = |t: f32, owner: Option<Entity>| {
            if nearest.map_or(true, |(best, _)| t < best) {
                nearest = Some((t, owner));
            }
        };

        if layers.contains(Layers::TERRAIN) {
            for obstacle in &self.obstacles {
                if let Some(t) = segment_sphere(from, to, obstacle.center, obstacle.radius) {
                    consider(t, None);
                }
            }
        }

        if layers.contains(Layers::COMBATANTS) {
            for combatant in self.combatants.iter().filter(|c| c.blocks_sight) {
                if Some(combatant.id) == ignore {
                    continue;
                }
                for volume in 0..combatant.volumes.max(1) {
                    let center = Self::volume_center(combatant, volume);
                    if let Some(t) = segment_sphere(from, to, center, BODY_RADIUS * 2.0) {
                        consider(t, Some(combatant.id));
                    }
                }
            }
        }

        nearest.map(|(t, owner)| RayHit {
            owner,
            point: from.lerp(to, t),
        })
    }
}
