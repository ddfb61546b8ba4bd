//! Core error types for pcbedit-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering the
//! failure modes of the document primitives.

use thiserror::Error;

use crate::id::{
    ComponentId, HoleId, LibDeviceId, NetLabelId, NetSegmentId, NodeId, PackageId, PlaneId,
    PolygonId, StrokeTextId, TraceId, ViaId,
};
use crate::net::TraceAnchor;

/// Errors produced by [`BoardDocument`](crate::document::BoardDocument)
/// primitives.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    #[error("net segment not found: {id}")]
    NetSegmentNotFound { id: NetSegmentId },

    #[error("junction not found: {id}")]
    JunctionNotFound { id: NodeId },

    #[error("via not found: {id}")]
    ViaNotFound { id: ViaId },

    #[error("trace not found: {id}")]
    TraceNotFound { id: TraceId },

    #[error("net label not found: {id}")]
    NetLabelNotFound { id: NetLabelId },

    #[error("component not found in circuit: {id}")]
    ComponentNotFound { id: ComponentId },

    #[error("no device for component {component} on the board")]
    DeviceNotFound { component: ComponentId },

    #[error("library device not found: {id}")]
    LibDeviceNotFound { id: LibDeviceId },

    #[error("library package not found: {id}")]
    PackageNotFound { id: PackageId },

    #[error("polygon not found: {id}")]
    PolygonNotFound { id: PolygonId },

    #[error("hole not found: {id}")]
    HoleNotFound { id: HoleId },

    #[error("stroke text not found: {id}")]
    StrokeTextNotFound { id: StrokeTextId },

    #[error("plane not found: {id}")]
    PlaneNotFound { id: PlaneId },

    #[error("net signal not found: '{name}'")]
    NetSignalNotFound { name: String },

    #[error("net class not found: '{name}'")]
    NetClassNotFound { name: String },

    /// A layer name does not exist in the board's layer stack.
    #[error("layer not found: '{name}'")]
    LayerNotFound { name: String },

    /// An item with the same identity already exists.
    #[error("duplicate {kind}: {id}")]
    DuplicateId { kind: &'static str, id: String },

    /// A trace endpoint does not resolve to an item the trace may attach to.
    #[error("unresolved anchor {anchor} of trace {trace}")]
    UnresolvedAnchor { trace: TraceId, anchor: TraceAnchor },

    /// Removing the item would leave a dangling reference.
    #[error("{kind} {id} is still in use")]
    ItemInUse { kind: &'static str, id: String },

    /// A document-wide invariant was violated.
    #[error("graph inconsistency: {reason}")]
    GraphInconsistency { reason: String },
}

impl CoreError {
    pub(crate) fn duplicate(kind: &'static str, id: impl ToString) -> Self {
        CoreError::DuplicateId {
            kind,
            id: id.to_string(),
        }
    }

    pub(crate) fn in_use(kind: &'static str, id: impl ToString) -> Self {
        CoreError::ItemInUse {
            kind,
            id: id.to_string(),
        }
    }
}
