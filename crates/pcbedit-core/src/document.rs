//! The [`BoardDocument`] trait: the mutation/query contract edits run against.
//!
//! Two-layer API design, as for any document backend:
//! - **Insert/remove primitives**, one per item kind. Each primitive is the
//!   natural compensation of its counterpart: every `remove_*` returns the
//!   removed value so that it can be handed back to the matching `insert_*`.
//! - **Lookups** by identity. Back-references (which segment owns an item)
//!   are plain identity lookups, never ownership.
//!
//! Insert primitives validate referential integrity and remove primitives
//! refuse to leave a dangling reference behind, so a document only ever
//! moves between consistent states.

use crate::error::CoreError;
use crate::geometry::Point;
use crate::id::{
    ComponentId, HoleId, LibDeviceId, NetLabelId, NetSegmentId, NodeId, PackageId, PlaneId,
    PolygonId, StrokeTextId, TraceId, ViaId,
};
use crate::library::{
    ComponentInstance, Device, Hole, Layer, LibDevice, LibPackage, NetClass, NetSignal, Plane,
    Polygon, StrokeText,
};
use crate::net::{AnchoredTrace, Junction, NetLabel, NetSegment, Trace, TraceAnchor, Via};

/// The document contract consumed by splitting, removal and paste.
///
/// The trait is synchronous; a caller holds exclusive access for the
/// duration of one transaction.
pub trait BoardDocument {
    // -------------------------------------------------------------------
    // Lookups
    // -------------------------------------------------------------------

    fn layer(&self, name: &str) -> Option<&Layer>;

    /// Looks up a component instance of the circuit.
    fn component(&self, id: ComponentId) -> Option<&ComponentInstance>;

    /// Looks up the device realizing `component` on this board, if placed.
    fn device(&self, component: ComponentId) -> Option<&Device>;

    /// Components of all devices placed on the board.
    fn device_components(&self) -> Vec<ComponentId>;

    fn net_class(&self, name: &str) -> Option<&NetClass>;

    fn net_signal(&self, name: &str) -> Option<&NetSignal>;

    fn library_device(&self, id: LibDeviceId) -> Option<&LibDevice>;

    fn library_device_ids(&self) -> Vec<LibDeviceId>;

    fn library_package(&self, id: PackageId) -> Option<&LibPackage>;

    fn library_package_ids(&self) -> Vec<PackageId>;

    fn net_segment(&self, id: NetSegmentId) -> Option<&NetSegment>;

    fn net_segment_ids(&self) -> Vec<NetSegmentId>;

    fn segment_of_junction(&self, id: NodeId) -> Option<NetSegmentId>;

    fn segment_of_via(&self, id: ViaId) -> Option<NetSegmentId>;

    fn segment_of_trace(&self, id: TraceId) -> Option<NetSegmentId>;

    fn segment_of_label(&self, id: NetLabelId) -> Option<NetSegmentId>;

    fn polygon(&self, id: PolygonId) -> Option<&Polygon>;

    fn hole(&self, id: HoleId) -> Option<&Hole>;

    fn stroke_text(&self, id: StrokeTextId) -> Option<&StrokeText>;

    fn plane(&self, id: PlaneId) -> Option<&Plane>;

    /// Checks the document-wide closure invariants: every trace anchor
    /// resolves inside its own segment or to a pad on the board, and no net
    /// item is referenced from outside its owning segment.
    fn check_invariants(&self) -> Result<(), CoreError>;

    /// Absolute position of a trace anchor, if the anchored item exists.
    fn anchor_position(&self, anchor: &TraceAnchor) -> Option<Point> {
        match *anchor {
            TraceAnchor::Junction { id } => {
                let segment = self.net_segment(self.segment_of_junction(id)?)?;
                segment.junctions.get(&id).map(|j| j.position)
            }
            TraceAnchor::Via { id } => {
                let segment = self.net_segment(self.segment_of_via(id)?)?;
                segment.vias.get(&id).map(|v| v.position)
            }
            TraceAnchor::Pad { component, pad } => {
                let device = self.device(component)?;
                let lib_device = self.library_device(device.lib_device)?;
                let package = self.library_package(lib_device.package)?;
                package.pad(pad).map(|p| device.map_to_board(p.offset))
            }
        }
    }

    /// A trace of the board with the positions of both endpoints.
    fn anchored_trace(&self, id: TraceId) -> Result<AnchoredTrace, CoreError> {
        let segment = self
            .segment_of_trace(id)
            .and_then(|s| self.net_segment(s))
            .ok_or(CoreError::TraceNotFound { id })?;
        let trace = segment
            .traces
            .get(&id)
            .ok_or(CoreError::TraceNotFound { id })?;
        let position = |anchor: TraceAnchor| {
            self.anchor_position(&anchor)
                .ok_or(CoreError::UnresolvedAnchor { trace: id, anchor })
        };
        Ok(AnchoredTrace {
            start_position: position(trace.start)?,
            end_position: position(trace.end)?,
            trace: trace.clone(),
        })
    }

    // -------------------------------------------------------------------
    // Net items
    // -------------------------------------------------------------------

    /// Inserts a whole net segment, including any items it already holds.
    fn insert_net_segment(&mut self, segment: NetSegment) -> Result<(), CoreError>;

    /// Removes a net segment with everything it owns.
    fn remove_net_segment(&mut self, id: NetSegmentId) -> Result<NetSegment, CoreError>;

    fn insert_junction(
        &mut self,
        segment: NetSegmentId,
        junction: Junction,
    ) -> Result<(), CoreError>;

    fn remove_junction(&mut self, id: NodeId) -> Result<(NetSegmentId, Junction), CoreError>;

    fn insert_via(&mut self, segment: NetSegmentId, via: Via) -> Result<(), CoreError>;

    fn remove_via(&mut self, id: ViaId) -> Result<(NetSegmentId, Via), CoreError>;

    /// Inserts a trace. Fails with `LayerNotFound` for an unknown layer and
    /// with `UnresolvedAnchor` if an endpoint is neither an item of the same
    /// segment nor an existing pad.
    fn insert_trace(&mut self, segment: NetSegmentId, trace: Trace) -> Result<(), CoreError>;

    fn remove_trace(&mut self, id: TraceId) -> Result<(NetSegmentId, Trace), CoreError>;

    fn insert_net_label(
        &mut self,
        segment: NetSegmentId,
        label: NetLabel,
    ) -> Result<(), CoreError>;

    fn remove_net_label(&mut self, id: NetLabelId) -> Result<(NetSegmentId, NetLabel), CoreError>;

    // -------------------------------------------------------------------
    // Devices and board graphics
    // -------------------------------------------------------------------

    fn insert_device(&mut self, device: Device) -> Result<(), CoreError>;

    fn remove_device(&mut self, component: ComponentId) -> Result<Device, CoreError>;

    fn insert_polygon(&mut self, polygon: Polygon) -> Result<(), CoreError>;

    fn remove_polygon(&mut self, id: PolygonId) -> Result<Polygon, CoreError>;

    fn insert_hole(&mut self, hole: Hole) -> Result<(), CoreError>;

    fn remove_hole(&mut self, id: HoleId) -> Result<Hole, CoreError>;

    fn insert_stroke_text(&mut self, text: StrokeText) -> Result<(), CoreError>;

    fn remove_stroke_text(&mut self, id: StrokeTextId) -> Result<StrokeText, CoreError>;

    /// Fails with [`CoreError::NetSignalNotFound`] if the plane's net does
    /// not exist.
    fn insert_plane(&mut self, plane: Plane) -> Result<(), CoreError>;

    fn remove_plane(&mut self, id: PlaneId) -> Result<Plane, CoreError>;

    // -------------------------------------------------------------------
    // Circuit and library
    // -------------------------------------------------------------------

    fn insert_net_class(&mut self, class: NetClass) -> Result<(), CoreError>;

    fn remove_net_class(&mut self, name: &str) -> Result<NetClass, CoreError>;

    fn insert_net_signal(&mut self, signal: NetSignal) -> Result<(), CoreError>;

    fn remove_net_signal(&mut self, name: &str) -> Result<NetSignal, CoreError>;

    fn insert_library_device(&mut self, device: LibDevice) -> Result<(), CoreError>;

    fn remove_library_device(&mut self, id: LibDeviceId) -> Result<LibDevice, CoreError>;

    fn insert_library_package(&mut self, package: LibPackage) -> Result<(), CoreError>;

    fn remove_library_package(&mut self, id: PackageId) -> Result<LibPackage, CoreError>;
}
