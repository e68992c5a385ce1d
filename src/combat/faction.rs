//! Faction resolution.
//!
//! Every combatant carries a faction tag; two combatants are allies exactly
//! when their tags match.

use serde::{Deserialize, Serialize};

/// Faction tag carried by every combatant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Faction(pub u8);

impl Faction {
    /// The player's party and its companions.
    pub const PARTY: Faction = Faction(1);
    /// Hostile creatures.
    pub const HORDE: Faction = Faction(2);
}

/// Returns true when `a` and `b` fight on the same side.
pub fn is_ally(a: Faction, b: Faction) -> bool {
    a == b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_ally_reflexive_and_symmetric() {
        let factions = [Faction::PARTY, Faction::HORDE, Faction(7)];
        for a in factions {
            assert!(is_ally(a, a));
            for b in factions {
                assert_eq!(is_ally(a, b), is_ally(b, a));
            }
        }
    }

    #[test]
    fn test_party_and_horde_are_hostile() {
        assert!(!is_ally(Faction::PARTY, Faction::HORDE));
    }
}
