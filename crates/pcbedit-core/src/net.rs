//! Net items: junctions, vias, traces and labels, and the [`NetSegment`]
//! that owns them.
//!
//! A net segment is a connected group of net items sharing one net signal.
//! Traces reference their endpoints symbolically through a [`TraceAnchor`];
//! junction and via anchors must live in the same segment as the trace,
//! pad anchors point at a device on the board.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::geometry::{Length, Point};
use crate::id::{ComponentId, NetLabelId, NetSegmentId, NodeId, PadId, TraceId, ViaId};

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

/// A free junction (net point). Also used as placeholder for an excluded
/// via or pad.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Junction {
    pub id: NodeId,
    pub position: Point,
}

impl Junction {
    pub fn new(id: NodeId, position: Point) -> Self {
        Junction { id, position }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViaShape {
    Round,
    Square,
    Octagon,
}

/// A plated via.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Via {
    pub id: ViaId,
    pub position: Point,
    pub shape: ViaShape,
    /// Outer diameter of the copper ring.
    pub size: Length,
    pub drill: Length,
}

impl Via {
    /// Returns a copy with another identity and a translated position.
    pub fn copied(&self, id: ViaId, offset: Point) -> Via {
        Via {
            id,
            position: self.position + offset,
            ..self.clone()
        }
    }
}

// ---------------------------------------------------------------------------
// Traces
// ---------------------------------------------------------------------------

/// Symbolic endpoint of a trace.
///
/// A closed set of anchor kinds; resolving an anchor is an exhaustive match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TraceAnchor {
    Junction { id: NodeId },
    Via { id: ViaId },
    Pad { component: ComponentId, pad: PadId },
}

impl TraceAnchor {
    pub fn junction(id: NodeId) -> Self {
        TraceAnchor::Junction { id }
    }

    pub fn via(id: ViaId) -> Self {
        TraceAnchor::Via { id }
    }

    pub fn pad(component: ComponentId, pad: PadId) -> Self {
        TraceAnchor::Pad { component, pad }
    }

    /// Returns `true` for anchors that live inside a net segment
    /// (junctions and vias), as opposed to device pads.
    pub fn is_segment_local(&self) -> bool {
        !matches!(self, TraceAnchor::Pad { .. })
    }
}

impl fmt::Display for TraceAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceAnchor::Junction { id } => write!(f, "junction {}", id),
            TraceAnchor::Via { id } => write!(f, "via {}", id),
            TraceAnchor::Pad { component, pad } => write!(f, "pad {} of {}", pad, component),
        }
    }
}

/// A copper trace between two anchors. Logically undirected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trace {
    pub id: TraceId,
    pub layer: String,
    pub width: Length,
    pub start: TraceAnchor,
    pub end: TraceAnchor,
}

impl Trace {
    /// Returns `true` if either endpoint is `anchor`.
    pub fn touches(&self, anchor: &TraceAnchor) -> bool {
        self.start == *anchor || self.end == *anchor
    }

    pub fn anchors(&self) -> [TraceAnchor; 2] {
        [self.start, self.end]
    }
}

/// A trace together with the absolute positions of its endpoints.
///
/// Positions are carried along so that a placeholder junction can be
/// synthesized for an endpoint whose anchor is not available in the
/// target context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchoredTrace {
    pub trace: Trace,
    pub start_position: Point,
    pub end_position: Point,
}

impl AnchoredTrace {
    pub fn id(&self) -> TraceId {
        self.trace.id
    }

    /// Position of the endpoint referencing `anchor`, if any.
    pub fn position_of(&self, anchor: &TraceAnchor) -> Option<Point> {
        if self.trace.start == *anchor {
            Some(self.start_position)
        } else if self.trace.end == *anchor {
            Some(self.end_position)
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Labels
// ---------------------------------------------------------------------------

/// A net name annotation placed near a net segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetLabel {
    pub id: NetLabelId,
    pub position: Point,
}

// ---------------------------------------------------------------------------
// Net segments
// ---------------------------------------------------------------------------

/// A connected group of junctions, vias, traces and labels of one net.
///
/// Items are stored in ordered maps keyed by identity so that two segments
/// with equal content compare equal independent of insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetSegment {
    pub id: NetSegmentId,
    /// Name of the net signal this segment belongs to.
    pub net_name: String,
    #[serde(default)]
    pub junctions: BTreeMap<NodeId, Junction>,
    #[serde(default)]
    pub vias: BTreeMap<ViaId, Via>,
    #[serde(default)]
    pub traces: BTreeMap<TraceId, Trace>,
    #[serde(default)]
    pub labels: BTreeMap<NetLabelId, NetLabel>,
}

impl NetSegment {
    /// Creates an empty segment.
    pub fn new(id: NetSegmentId, net_name: impl Into<String>) -> Self {
        NetSegment {
            id,
            net_name: net_name.into(),
            junctions: BTreeMap::new(),
            vias: BTreeMap::new(),
            traces: BTreeMap::new(),
            labels: BTreeMap::new(),
        }
    }

    /// Returns `true` if the segment holds no items at all.
    pub fn is_empty(&self) -> bool {
        self.junctions.is_empty()
            && self.vias.is_empty()
            && self.traces.is_empty()
            && self.labels.is_empty()
    }

    /// Returns `true` if `anchor` is a junction or via of this segment.
    pub fn contains_anchor(&self, anchor: &TraceAnchor) -> bool {
        match anchor {
            TraceAnchor::Junction { id } => self.junctions.contains_key(id),
            TraceAnchor::Via { id } => self.vias.contains_key(id),
            TraceAnchor::Pad { .. } => false,
        }
    }

    /// IDs of all traces with an endpoint at `anchor`.
    pub fn traces_at(&self, anchor: &TraceAnchor) -> SmallVec<[TraceId; 4]> {
        self.traces
            .values()
            .filter(|t| t.touches(anchor))
            .map(|t| t.id)
            .collect()
    }

    /// Segment-local anchors referenced by a trace but missing from the
    /// segment. Empty for a segment satisfying the closure invariant.
    pub fn dangling_anchors(&self) -> Vec<(TraceId, TraceAnchor)> {
        self.traces
            .values()
            .flat_map(|t| t.anchors().into_iter().map(move |a| (t.id, a)))
            .filter(|(_, a)| a.is_segment_local() && !self.contains_anchor(a))
            .collect()
    }
}
