//! Host collaborator interface.
//!
//! The core never performs raw physics. The host answers entity lookups,
//! radius queries and line-of-sight raycasts through `Battlefield`.

use bevy::prelude::*;
use smallvec::SmallVec;

use super::combatant::Combatant;

/// Layer set for spatial queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Layers(pub u32);

impl Layers {
    /// Combatant contact volumes
    pub const COMBATANTS: Layers = Layers(1);
    /// Static level geometry and sight-blocking structures
    pub const TERRAIN: Layers = Layers(1 << 1);

    pub fn contains(self, other: Layers) -> bool {
        self.0 & other.0 != 0
    }
}

impl std::ops::BitOr for Layers {
    type Output = Layers;

    fn bitor(self, rhs: Layers) -> Layers {
        Layers(self.0 | rhs.0)
    }
}

/// One contact volume overlapping a query. An entity with several colliders
/// shows up once per collider.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContactHit {
    pub entity: Entity,
    /// Collider index within the entity
    pub volume: u8,
    pub distance: f32,
}

/// First obstruction along a ray.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayHit {
    /// Root entity owning the hit collider; None for level geometry
    pub owner: Option<Entity>,
    pub point: Vec3,
}

/// Spatial and entity-record collaborator supplied by the host.
pub trait Battlefield {
    fn combatant(&self, id: Entity) -> Option<&Combatant>;

    fn combatant_mut(&mut self, id: Entity) -> Option<&mut Combatant>;

    /// Every tracked combatant in a stable order.
    fn combatant_ids(&self) -> Vec<Entity>;

    /// All contact volumes within `radius` of `center` on the given layers,
    /// in a stable order.
    fn contacts_within(&self, center: Vec3, radius: f32, layers: Layers) -> SmallVec<[ContactHit; 16]>;

    /// First hit on the segment `from -> to`, skipping colliders owned by `ignore`.
    fn raycast(&self, from: Vec3, to: Vec3, layers: Layers, ignore: Option<Entity>) -> Option<RayHit>;

    fn position_of(&self, id: Entity) -> Option<Vec3> {
        self.combatant(id).map(|c| c.position)
    }

    fn is_alive(&self, id: Entity) -> bool {
        self.combatant(id).map(|c| c.is_alive()).unwrap_or(false)
    }
}
