//! Anchor resolution across a split or a paste.
//!
//! When net items are rebuilt in a new segment, every trace endpoint has to
//! be translated from the identity it had in the source context to the
//! identity of the item created for it in the target context. The
//! [`AnchorResolver`] holds those old-to-new mappings. An endpoint whose
//! via or pad is not available in the target context is replaced by a
//! placeholder junction at the endpoint's position; placeholders are
//! memoized per missing anchor in a [`PlaceholderTable`], so one missing
//! anchor never yields two placeholders.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use tracing::debug;

use pcbedit_core::{
    ComponentId, IdGenerator, Junction, NodeId, Point, TraceAnchor, TraceId, ViaId,
};

use crate::error::EditError;

/// Placeholder junctions keyed by the anchor they stand in for.
#[derive(Debug, Clone, Default)]
pub struct PlaceholderTable {
    by_anchor: IndexMap<TraceAnchor, Junction>,
}

impl PlaceholderTable {
    pub fn new() -> Self {
        PlaceholderTable::default()
    }

    /// Returns the placeholder for `anchor`, creating it at `position` on
    /// first use. The flag is `true` if the junction was just created.
    pub fn get_or_create<I: IdGenerator>(
        &mut self,
        anchor: TraceAnchor,
        position: Point,
        ids: &mut I,
    ) -> (Junction, bool) {
        if let Some(existing) = self.by_anchor.get(&anchor) {
            return (existing.clone(), false);
        }
        let junction = Junction::new(ids.fresh(), position);
        debug!(%anchor, placeholder = %junction.id, "placeholder junction synthesized");
        self.by_anchor.insert(anchor, junction.clone());
        (junction, true)
    }

    pub fn get(&self, anchor: &TraceAnchor) -> Option<&Junction> {
        self.by_anchor.get(anchor)
    }

    pub fn len(&self) -> usize {
        self.by_anchor.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_anchor.is_empty()
    }

    /// Placeholders in creation order, with the anchor each replaces.
    pub fn iter(&self) -> impl Iterator<Item = (&TraceAnchor, &Junction)> {
        self.by_anchor.iter()
    }
}

/// What to do with a via or pad anchor that has no counterpart in the
/// target context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingAnchorPolicy {
    /// Substitute a placeholder junction.
    Placeholder,
    /// Fail with [`EditError::UnresolvedAnchor`].
    Fail,
}

/// A resolved endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub anchor: TraceAnchor,
    /// The placeholder junction created by this resolution, which the
    /// caller must insert before the trace.
    pub created: Option<Junction>,
}

/// Old-to-new identity mappings for one target segment.
#[derive(Debug, Clone)]
pub struct AnchorResolver {
    junctions: HashMap<NodeId, NodeId>,
    vias: HashMap<ViaId, ViaId>,
    devices: HashSet<ComponentId>,
    policy: MissingAnchorPolicy,
    placeholders: PlaceholderTable,
}

impl AnchorResolver {
    pub fn new(policy: MissingAnchorPolicy) -> Self {
        AnchorResolver {
            junctions: HashMap::new(),
            vias: HashMap::new(),
            devices: HashSet::new(),
            policy,
            placeholders: PlaceholderTable::new(),
        }
    }

    /// Makes the pads of the given devices available as anchors.
    pub fn with_devices(mut self, devices: impl IntoIterator<Item = ComponentId>) -> Self {
        self.devices.extend(devices);
        self
    }

    pub fn map_junction(&mut self, old: NodeId, new: NodeId) {
        self.junctions.insert(old, new);
    }

    pub fn map_via(&mut self, old: ViaId, new: ViaId) {
        self.vias.insert(old, new);
    }

    pub fn placeholders(&self) -> &PlaceholderTable {
        &self.placeholders
    }

    /// Looks up the target anchor for `anchor` without creating anything.
    pub fn lookup(&self, anchor: &TraceAnchor) -> Option<TraceAnchor> {
        match *anchor {
            TraceAnchor::Junction { id } => self.junctions.get(&id).map(|n| TraceAnchor::junction(*n)),
            TraceAnchor::Via { id } => self.vias.get(&id).map(|v| TraceAnchor::via(*v)),
            TraceAnchor::Pad { component, .. } => {
                self.devices.contains(&component).then_some(*anchor)
            }
        }
    }

    /// Resolves one endpoint of `trace`.
    ///
    /// `position` is the endpoint's position in the target context; it is
    /// used for a placeholder junction if one has to be synthesized. An
    /// unmapped junction is never replaced: it means the source data was
    /// not closed and is reported as [`EditError::UnresolvedAnchor`].
    pub fn resolve<I: IdGenerator>(
        &mut self,
        trace: TraceId,
        anchor: TraceAnchor,
        position: Point,
        ids: &mut I,
    ) -> Result<Resolution, EditError> {
        if let Some(resolved) = self.lookup(&anchor) {
            return Ok(Resolution {
                anchor: resolved,
                created: None,
            });
        }
        match (anchor, self.policy) {
            (TraceAnchor::Junction { .. }, _) | (_, MissingAnchorPolicy::Fail) => {
                Err(EditError::UnresolvedAnchor { trace, anchor })
            }
            (_, MissingAnchorPolicy::Placeholder) => {
                let (junction, created) = self.placeholders.get_or_create(anchor, position, ids);
                Ok(Resolution {
                    anchor: TraceAnchor::junction(junction.id),
                    created: created.then_some(junction),
                })
            }
        }
    }
}
