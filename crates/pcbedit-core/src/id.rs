//! Stable ID newtypes for board entities, plus identity generation.
//!
//! All IDs are distinct newtype wrappers over [`Uuid`], providing type safety
//! so that a `NodeId` cannot be accidentally used where a `ViaId` is expected.
//! Fresh identities are handed out by an [`IdGenerator`], which is injected
//! into every edit so that identity assignment can be made deterministic.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                $name(uuid)
            }
        }

        // Display just prints the inner UUID.
        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Free junction (net point) identifier.
    NodeId
);
uuid_id!(
    /// Via identifier. Vias keep their identity across a split.
    ViaId
);
uuid_id!(
    /// Trace (net line) identifier. Traces keep their identity across a split.
    TraceId
);
uuid_id!(
    /// Net segment identifier.
    NetSegmentId
);
uuid_id!(
    /// Net label identifier.
    NetLabelId
);
uuid_id!(
    /// Component instance identifier in the circuit. Devices on the board are
    /// keyed by the component they realize.
    ComponentId
);
uuid_id!(
    /// Pad identifier within a library package.
    PadId
);
uuid_id!(
    /// Library device identifier.
    LibDeviceId
);
uuid_id!(
    /// Library package identifier.
    PackageId
);
uuid_id!(PolygonId);
uuid_id!(HoleId);
uuid_id!(StrokeTextId);
uuid_id!(
    /// Copper plane (filled zone) identifier.
    PlaneId
);

/// Source of collision-free identities for newly created entities.
pub trait IdGenerator {
    /// Returns a UUID never handed out before by this generator.
    fn next_uuid(&mut self) -> Uuid;

    /// Convenience: a fresh typed identity.
    fn fresh<T: From<Uuid>>(&mut self) -> T {
        T::from(self.next_uuid())
    }
}

/// Random (UUIDv4) identities. The default for interactive use.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn next_uuid(&mut self) -> Uuid {
        Uuid::new_v4()
    }
}

/// Deterministic identities counting upwards from a start value.
///
/// Two runs seeded with the same start value produce the same identities,
/// which makes edit results reproducible in tests. The counter wraps from
/// `u128::MAX` back to zero, so any seed is valid; uniqueness holds for the
/// first 2^128 identities.
#[derive(Debug, Clone)]
pub struct SequentialIds {
    next: u128,
}

impl SequentialIds {
    pub fn starting_at(start: u128) -> Self {
        SequentialIds { next: start }
    }
}

impl Default for SequentialIds {
    fn default() -> Self {
        // Leave room below for hand-written fixture IDs.
        SequentialIds::starting_at(1 << 64)
    }
}

impl IdGenerator for SequentialIds {
    fn next_uuid(&mut self) -> Uuid {
        let uuid = Uuid::from_u128(self.next);
        self.next = self.next.wrapping_add(1);
        uuid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_display() {
        let id = NodeId(Uuid::from_u128(7));
        assert_eq!(format!("{}", id), "00000000-0000-0000-0000-000000000007");
    }

    #[test]
    fn sequential_ids_are_deterministic() {
        let mut a = SequentialIds::starting_at(10);
        let mut b = SequentialIds::starting_at(10);
        let first: NodeId = a.fresh();
        let second: ViaId = a.fresh();
        assert_eq!(first, NodeId(Uuid::from_u128(10)));
        assert_eq!(second, ViaId(Uuid::from_u128(11)));
        assert_eq!(b.fresh::<NodeId>(), first);
    }

    #[test]
    fn sequential_ids_wrap_at_the_top_of_the_range() {
        let mut ids = SequentialIds::starting_at(u128::MAX);
        assert_eq!(ids.fresh::<NodeId>(), NodeId(Uuid::from_u128(u128::MAX)));
        assert_eq!(ids.fresh::<NodeId>(), NodeId(Uuid::from_u128(0)));
    }

    #[test]
    fn random_ids_do_not_repeat() {
        let mut ids = RandomIds;
        let a: TraceId = ids.fresh();
        let b: TraceId = ids.fresh();
        assert_ne!(a, b);
    }

    #[test]
    fn serde_is_transparent() {
        let id = ComponentId(Uuid::from_u128(42));
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"00000000-0000-0000-0000-00000000002a\"");
        let back: ComponentId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
