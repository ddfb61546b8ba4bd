//! Board: the in-memory arena document.
//!
//! [`Board`] stores every entity in an ordered map keyed by its identity.
//! Net items are owned by their [`NetSegment`]; the item-to-segment
//! back-references are kept in separate identity maps ([`Owners`]) which are
//! derived data, rebuilt whenever a board is deserialized.
//!
//! Because all storage is keyed and ordered, two boards holding the same
//! items compare equal no matter in which order the items were inserted.
//! Edits rely on this: a rolled-back transaction must leave a board equal to
//! its snapshot taken before the transaction started.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::document::BoardDocument;
use crate::error::CoreError;
use crate::id::{
    ComponentId, HoleId, LibDeviceId, NetLabelId, NetSegmentId, NodeId, PackageId, PlaneId,
    PolygonId, StrokeTextId, TraceId, ViaId,
};
use crate::library::{
    ComponentInstance, Device, Hole, Layer, LibDevice, LibPackage, NetClass, NetSignal, Plane,
    Polygon, StrokeText,
};
use crate::net::{Junction, NetLabel, NetSegment, Trace, TraceAnchor, Via};

/// Item-to-segment back-references.
#[derive(Debug, Clone, Default, PartialEq)]
struct Owners {
    junctions: HashMap<NodeId, NetSegmentId>,
    vias: HashMap<ViaId, NetSegmentId>,
    traces: HashMap<TraceId, NetSegmentId>,
    labels: HashMap<NetLabelId, NetSegmentId>,
}

impl Owners {
    fn index(&mut self, segment: &NetSegment) {
        for id in segment.junctions.keys() {
            self.junctions.insert(*id, segment.id);
        }
        for id in segment.vias.keys() {
            self.vias.insert(*id, segment.id);
        }
        for id in segment.traces.keys() {
            self.traces.insert(*id, segment.id);
        }
        for id in segment.labels.keys() {
            self.labels.insert(*id, segment.id);
        }
    }

    fn unindex(&mut self, segment: &NetSegment) {
        for id in segment.junctions.keys() {
            self.junctions.remove(id);
        }
        for id in segment.vias.keys() {
            self.vias.remove(id);
        }
        for id in segment.traces.keys() {
            self.traces.remove(id);
        }
        for id in segment.labels.keys() {
            self.labels.remove(id);
        }
    }
}

/// Serialized form of a [`Board`], without derived indexes.
#[derive(Serialize, Deserialize)]
struct BoardRepr {
    name: String,
    #[serde(default)]
    layers: BTreeMap<String, Layer>,
    #[serde(default)]
    components: BTreeMap<ComponentId, ComponentInstance>,
    #[serde(default)]
    net_classes: BTreeMap<String, NetClass>,
    #[serde(default)]
    net_signals: BTreeMap<String, NetSignal>,
    #[serde(default)]
    library_devices: BTreeMap<LibDeviceId, LibDevice>,
    #[serde(default)]
    library_packages: BTreeMap<PackageId, LibPackage>,
    #[serde(default)]
    devices: BTreeMap<ComponentId, Device>,
    #[serde(default)]
    net_segments: BTreeMap<NetSegmentId, NetSegment>,
    #[serde(default)]
    polygons: BTreeMap<PolygonId, Polygon>,
    #[serde(default)]
    holes: BTreeMap<HoleId, Hole>,
    #[serde(default)]
    stroke_texts: BTreeMap<StrokeTextId, StrokeText>,
    #[serde(default)]
    planes: BTreeMap<PlaneId, Plane>,
}

/// The in-memory board document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "BoardRepr", into = "BoardRepr")]
pub struct Board {
    name: String,
    layers: BTreeMap<String, Layer>,
    components: BTreeMap<ComponentId, ComponentInstance>,
    net_classes: BTreeMap<String, NetClass>,
    net_signals: BTreeMap<String, NetSignal>,
    library_devices: BTreeMap<LibDeviceId, LibDevice>,
    library_packages: BTreeMap<PackageId, LibPackage>,
    devices: BTreeMap<ComponentId, Device>,
    net_segments: BTreeMap<NetSegmentId, NetSegment>,
    polygons: BTreeMap<PolygonId, Polygon>,
    holes: BTreeMap<HoleId, Hole>,
    stroke_texts: BTreeMap<StrokeTextId, StrokeText>,
    planes: BTreeMap<PlaneId, Plane>,
    owners: Owners,
}

impl From<BoardRepr> for Board {
    fn from(repr: BoardRepr) -> Self {
        let mut owners = Owners::default();
        for segment in repr.net_segments.values() {
            owners.index(segment);
        }
        Board {
            name: repr.name,
            layers: repr.layers,
            components: repr.components,
            net_classes: repr.net_classes,
            net_signals: repr.net_signals,
            library_devices: repr.library_devices,
            library_packages: repr.library_packages,
            devices: repr.devices,
            net_segments: repr.net_segments,
            polygons: repr.polygons,
            holes: repr.holes,
            stroke_texts: repr.stroke_texts,
            planes: repr.planes,
            owners,
        }
    }
}

impl From<Board> for BoardRepr {
    fn from(board: Board) -> Self {
        BoardRepr {
            name: board.name,
            layers: board.layers,
            components: board.components,
            net_classes: board.net_classes,
            net_signals: board.net_signals,
            library_devices: board.library_devices,
            library_packages: board.library_packages,
            devices: board.devices,
            net_segments: board.net_segments,
            polygons: board.polygons,
            holes: board.holes,
            stroke_texts: board.stroke_texts,
            planes: board.planes,
        }
    }
}

impl Board {
    /// Creates an empty board with no layers and an empty circuit.
    pub fn new(name: impl Into<String>) -> Self {
        Board::from(BoardRepr {
            name: name.into(),
            layers: BTreeMap::new(),
            components: BTreeMap::new(),
            net_classes: BTreeMap::new(),
            net_signals: BTreeMap::new(),
            library_devices: BTreeMap::new(),
            library_packages: BTreeMap::new(),
            devices: BTreeMap::new(),
            net_segments: BTreeMap::new(),
            polygons: BTreeMap::new(),
            holes: BTreeMap::new(),
            stroke_texts: BTreeMap::new(),
            planes: BTreeMap::new(),
        })
    }

    /// Parses a board from JSON and rebuilds its indexes.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // -----------------------------------------------------------------------
    // Setup methods (layer stack and circuit are not edited transactionally)
    // -----------------------------------------------------------------------

    pub fn add_layer(&mut self, layer: Layer) {
        self.layers.insert(layer.name.clone(), layer);
    }

    pub fn add_component(&mut self, component: ComponentInstance) {
        self.components.insert(component.id, component);
    }

    // -----------------------------------------------------------------------
    // Read-only accessors
    // -----------------------------------------------------------------------

    pub fn net_segments(&self) -> impl Iterator<Item = &NetSegment> {
        self.net_segments.values()
    }

    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    pub fn polygons(&self) -> impl Iterator<Item = &Polygon> {
        self.polygons.values()
    }

    pub fn holes(&self) -> impl Iterator<Item = &Hole> {
        self.holes.values()
    }

    pub fn stroke_texts(&self) -> impl Iterator<Item = &StrokeText> {
        self.stroke_texts.values()
    }

    pub fn planes(&self) -> impl Iterator<Item = &Plane> {
        self.planes.values()
    }

    pub fn net_signals(&self) -> impl Iterator<Item = &NetSignal> {
        self.net_signals.values()
    }

    pub fn junction_count(&self) -> usize {
        self.owners.junctions.len()
    }

    pub fn via_count(&self) -> usize {
        self.owners.vias.len()
    }

    pub fn trace_count(&self) -> usize {
        self.owners.traces.len()
    }

    // -----------------------------------------------------------------------
    // Integrity
    // -----------------------------------------------------------------------

    /// Verifies that `trace` may be inserted into `segment`.
    fn check_trace(&self, segment: &NetSegment, trace: &Trace) -> Result<(), CoreError> {
        if !self.layers.contains_key(&trace.layer) {
            return Err(CoreError::LayerNotFound {
                name: trace.layer.clone(),
            });
        }
        for anchor in trace.anchors() {
            let resolved = match anchor {
                TraceAnchor::Junction { .. } | TraceAnchor::Via { .. } => {
                    segment.contains_anchor(&anchor)
                }
                TraceAnchor::Pad { .. } => self.anchor_position(&anchor).is_some(),
            };
            if !resolved {
                return Err(CoreError::UnresolvedAnchor {
                    trace: trace.id,
                    anchor,
                });
            }
        }
        Ok(())
    }

    fn pad_in_use(&self, component: ComponentId) -> bool {
        self.net_segments.values().any(|s| {
            s.traces.values().any(|t| {
                t.anchors()
                    .iter()
                    .any(|a| matches!(a, TraceAnchor::Pad { component: c, .. } if *c == component))
            })
        })
    }

    fn segment_mut(&mut self, id: NetSegmentId) -> Result<&mut NetSegment, CoreError> {
        self.net_segments
            .get_mut(&id)
            .ok_or(CoreError::NetSegmentNotFound { id })
    }

    /// Verifies that the derived indexes agree with segment content.
    ///
    /// Only called in debug builds (via `cfg(debug_assertions)`).
    #[cfg(debug_assertions)]
    fn assert_consistency(&self) {
        let mut expected = Owners::default();
        for segment in self.net_segments.values() {
            expected.index(segment);
        }
        assert_eq!(
            expected, self.owners,
            "board owner index out of sync with segment content"
        );
    }
}

impl BoardDocument for Board {
    fn layer(&self, name: &str) -> Option<&Layer> {
        self.layers.get(name)
    }

    fn component(&self, id: ComponentId) -> Option<&ComponentInstance> {
        self.components.get(&id)
    }

    fn device(&self, component: ComponentId) -> Option<&Device> {
        self.devices.get(&component)
    }

    fn device_components(&self) -> Vec<ComponentId> {
        self.devices.keys().copied().collect()
    }

    fn net_class(&self, name: &str) -> Option<&NetClass> {
        self.net_classes.get(name)
    }

    fn net_signal(&self, name: &str) -> Option<&NetSignal> {
        self.net_signals.get(name)
    }

    fn library_device(&self, id: LibDeviceId) -> Option<&LibDevice> {
        self.library_devices.get(&id)
    }

    fn library_device_ids(&self) -> Vec<LibDeviceId> {
        self.library_devices.keys().copied().collect()
    }

    fn library_package(&self, id: PackageId) -> Option<&LibPackage> {
        self.library_packages.get(&id)
    }

    fn library_package_ids(&self) -> Vec<PackageId> {
        self.library_packages.keys().copied().collect()
    }

    fn net_segment(&self, id: NetSegmentId) -> Option<&NetSegment> {
        self.net_segments.get(&id)
    }

    fn net_segment_ids(&self) -> Vec<NetSegmentId> {
        self.net_segments.keys().copied().collect()
    }

    fn segment_of_junction(&self, id: NodeId) -> Option<NetSegmentId> {
        self.owners.junctions.get(&id).copied()
    }

    fn segment_of_via(&self, id: ViaId) -> Option<NetSegmentId> {
        self.owners.vias.get(&id).copied()
    }

    fn segment_of_trace(&self, id: TraceId) -> Option<NetSegmentId> {
        self.owners.traces.get(&id).copied()
    }

    fn segment_of_label(&self, id: NetLabelId) -> Option<NetSegmentId> {
        self.owners.labels.get(&id).copied()
    }

    fn polygon(&self, id: PolygonId) -> Option<&Polygon> {
        self.polygons.get(&id)
    }

    fn hole(&self, id: HoleId) -> Option<&Hole> {
        self.holes.get(&id)
    }

    fn stroke_text(&self, id: StrokeTextId) -> Option<&StrokeText> {
        self.stroke_texts.get(&id)
    }

    fn plane(&self, id: PlaneId) -> Option<&Plane> {
        self.planes.get(&id)
    }

    /// Checks the closure invariants of the whole board: every trace anchor
    /// resolves inside its own segment (or to a pad on the board), every
    /// layer reference exists, and every segment's or plane's net signal
    /// exists.
    fn check_invariants(&self) -> Result<(), CoreError> {
        for segment in self.net_segments.values() {
            if !self.net_signals.contains_key(&segment.net_name) {
                return Err(CoreError::GraphInconsistency {
                    reason: format!(
                        "segment {} references unknown net '{}'",
                        segment.id, segment.net_name
                    ),
                });
            }
            for trace in segment.traces.values() {
                self.check_trace(segment, trace)
                    .map_err(|e| CoreError::GraphInconsistency {
                        reason: format!("segment {}: {}", segment.id, e),
                    })?;
            }
        }
        for plane in self.planes.values() {
            if !self.net_signals.contains_key(&plane.net_name) {
                return Err(CoreError::GraphInconsistency {
                    reason: format!(
                        "plane {} references unknown net '{}'",
                        plane.id, plane.net_name
                    ),
                });
            }
            if !self.layers.contains_key(&plane.layer) {
                return Err(CoreError::GraphInconsistency {
                    reason: format!("plane {} on unknown layer '{}'", plane.id, plane.layer),
                });
            }
        }
        for device in self.devices.values() {
            if !self.components.contains_key(&device.component) {
                return Err(CoreError::GraphInconsistency {
                    reason: format!("device of unknown component {}", device.component),
                });
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Net items
    // -----------------------------------------------------------------------

    fn insert_net_segment(&mut self, segment: NetSegment) -> Result<(), CoreError> {
        if self.net_segments.contains_key(&segment.id) {
            return Err(CoreError::duplicate("net segment", segment.id));
        }
        if !self.net_signals.contains_key(&segment.net_name) {
            return Err(CoreError::NetSignalNotFound {
                name: segment.net_name.clone(),
            });
        }
        if let Some(id) = segment
            .junctions
            .keys()
            .find(|id| self.owners.junctions.contains_key(id))
        {
            return Err(CoreError::duplicate("junction", id));
        }
        if let Some(id) = segment.vias.keys().find(|id| self.owners.vias.contains_key(id)) {
            return Err(CoreError::duplicate("via", id));
        }
        if let Some(id) = segment
            .traces
            .keys()
            .find(|id| self.owners.traces.contains_key(id))
        {
            return Err(CoreError::duplicate("trace", id));
        }
        if let Some(id) = segment
            .labels
            .keys()
            .find(|id| self.owners.labels.contains_key(id))
        {
            return Err(CoreError::duplicate("net label", id));
        }
        for trace in segment.traces.values() {
            self.check_trace(&segment, trace)?;
        }

        self.owners.index(&segment);
        self.net_segments.insert(segment.id, segment);

        #[cfg(debug_assertions)]
        self.assert_consistency();

        Ok(())
    }

    fn remove_net_segment(&mut self, id: NetSegmentId) -> Result<NetSegment, CoreError> {
        let segment = self
            .net_segments
            .remove(&id)
            .ok_or(CoreError::NetSegmentNotFound { id })?;
        self.owners.unindex(&segment);
        Ok(segment)
    }

    fn insert_junction(
        &mut self,
        segment: NetSegmentId,
        junction: Junction,
    ) -> Result<(), CoreError> {
        if self.owners.junctions.contains_key(&junction.id) {
            return Err(CoreError::duplicate("junction", junction.id));
        }
        let id = junction.id;
        self.segment_mut(segment)?.junctions.insert(id, junction);
        self.owners.junctions.insert(id, segment);
        Ok(())
    }

    fn remove_junction(&mut self, id: NodeId) -> Result<(NetSegmentId, Junction), CoreError> {
        let segment_id = self
            .segment_of_junction(id)
            .ok_or(CoreError::JunctionNotFound { id })?;
        let segment = self.segment_mut(segment_id)?;
        if !segment.traces_at(&TraceAnchor::junction(id)).is_empty() {
            return Err(CoreError::in_use("junction", id));
        }
        let junction = segment
            .junctions
            .remove(&id)
            .ok_or(CoreError::JunctionNotFound { id })?;
        self.owners.junctions.remove(&id);
        Ok((segment_id, junction))
    }

    fn insert_via(&mut self, segment: NetSegmentId, via: Via) -> Result<(), CoreError> {
        if self.owners.vias.contains_key(&via.id) {
            return Err(CoreError::duplicate("via", via.id));
        }
        let id = via.id;
        self.segment_mut(segment)?.vias.insert(id, via);
        self.owners.vias.insert(id, segment);
        Ok(())
    }

    fn remove_via(&mut self, id: ViaId) -> Result<(NetSegmentId, Via), CoreError> {
        let segment_id = self
            .segment_of_via(id)
            .ok_or(CoreError::ViaNotFound { id })?;
        let segment = self.segment_mut(segment_id)?;
        if !segment.traces_at(&TraceAnchor::via(id)).is_empty() {
            return Err(CoreError::in_use("via", id));
        }
        let via = segment
            .vias
            .remove(&id)
            .ok_or(CoreError::ViaNotFound { id })?;
        self.owners.vias.remove(&id);
        Ok((segment_id, via))
    }

    fn insert_trace(&mut self, segment: NetSegmentId, trace: Trace) -> Result<(), CoreError> {
        if self.owners.traces.contains_key(&trace.id) {
            return Err(CoreError::duplicate("trace", trace.id));
        }
        let owner = self
            .net_segments
            .get(&segment)
            .ok_or(CoreError::NetSegmentNotFound { id: segment })?;
        self.check_trace(owner, &trace)?;
        let id = trace.id;
        self.segment_mut(segment)?.traces.insert(id, trace);
        self.owners.traces.insert(id, segment);
        Ok(())
    }

    fn remove_trace(&mut self, id: TraceId) -> Result<(NetSegmentId, Trace), CoreError> {
        let segment_id = self
            .segment_of_trace(id)
            .ok_or(CoreError::TraceNotFound { id })?;
        let trace = self
            .segment_mut(segment_id)?
            .traces
            .remove(&id)
            .ok_or(CoreError::TraceNotFound { id })?;
        self.owners.traces.remove(&id);
        Ok((segment_id, trace))
    }

    fn insert_net_label(
        &mut self,
        segment: NetSegmentId,
        label: NetLabel,
    ) -> Result<(), CoreError> {
        if self.owners.labels.contains_key(&label.id) {
            return Err(CoreError::duplicate("net label", label.id));
        }
        let id = label.id;
        self.segment_mut(segment)?.labels.insert(id, label);
        self.owners.labels.insert(id, segment);
        Ok(())
    }

    fn remove_net_label(&mut self, id: NetLabelId) -> Result<(NetSegmentId, NetLabel), CoreError> {
        let segment_id = self
            .segment_of_label(id)
            .ok_or(CoreError::NetLabelNotFound { id })?;
        let label = self
            .segment_mut(segment_id)?
            .labels
            .remove(&id)
            .ok_or(CoreError::NetLabelNotFound { id })?;
        self.owners.labels.remove(&id);
        Ok((segment_id, label))
    }

    // -----------------------------------------------------------------------
    // Devices and board graphics
    // -----------------------------------------------------------------------

    fn insert_device(&mut self, device: Device) -> Result<(), CoreError> {
        if !self.components.contains_key(&device.component) {
            return Err(CoreError::ComponentNotFound {
                id: device.component,
            });
        }
        if self.devices.contains_key(&device.component) {
            return Err(CoreError::duplicate("device", device.component));
        }
        if !self.library_devices.contains_key(&device.lib_device) {
            return Err(CoreError::LibDeviceNotFound {
                id: device.lib_device,
            });
        }
        self.devices.insert(device.component, device);
        Ok(())
    }

    fn remove_device(&mut self, component: ComponentId) -> Result<Device, CoreError> {
        if !self.devices.contains_key(&component) {
            return Err(CoreError::DeviceNotFound { component });
        }
        if self.pad_in_use(component) {
            return Err(CoreError::in_use("device", component));
        }
        self.devices
            .remove(&component)
            .ok_or(CoreError::DeviceNotFound { component })
    }

    fn insert_polygon(&mut self, polygon: Polygon) -> Result<(), CoreError> {
        if self.polygons.contains_key(&polygon.id) {
            return Err(CoreError::duplicate("polygon", polygon.id));
        }
        if !self.layers.contains_key(&polygon.layer) {
            return Err(CoreError::LayerNotFound {
                name: polygon.layer.clone(),
            });
        }
        self.polygons.insert(polygon.id, polygon);
        Ok(())
    }

    fn remove_polygon(&mut self, id: PolygonId) -> Result<Polygon, CoreError> {
        self.polygons
            .remove(&id)
            .ok_or(CoreError::PolygonNotFound { id })
    }

    fn insert_hole(&mut self, hole: Hole) -> Result<(), CoreError> {
        if self.holes.contains_key(&hole.id) {
            return Err(CoreError::duplicate("hole", hole.id));
        }
        self.holes.insert(hole.id, hole);
        Ok(())
    }

    fn remove_hole(&mut self, id: HoleId) -> Result<Hole, CoreError> {
        self.holes.remove(&id).ok_or(CoreError::HoleNotFound { id })
    }

    fn insert_stroke_text(&mut self, text: StrokeText) -> Result<(), CoreError> {
        if self.stroke_texts.contains_key(&text.id) {
            return Err(CoreError::duplicate("stroke text", text.id));
        }
        if !self.layers.contains_key(&text.layer) {
            return Err(CoreError::LayerNotFound {
                name: text.layer.clone(),
            });
        }
        self.stroke_texts.insert(text.id, text);
        Ok(())
    }

    fn remove_stroke_text(&mut self, id: StrokeTextId) -> Result<StrokeText, CoreError> {
        self.stroke_texts
            .remove(&id)
            .ok_or(CoreError::StrokeTextNotFound { id })
    }

    fn insert_plane(&mut self, plane: Plane) -> Result<(), CoreError> {
        if self.planes.contains_key(&plane.id) {
            return Err(CoreError::duplicate("plane", plane.id));
        }
        if !self.layers.contains_key(&plane.layer) {
            return Err(CoreError::LayerNotFound {
                name: plane.layer.clone(),
            });
        }
        if !self.net_signals.contains_key(&plane.net_name) {
            return Err(CoreError::NetSignalNotFound {
                name: plane.net_name.clone(),
            });
        }
        self.planes.insert(plane.id, plane);
        Ok(())
    }

    fn remove_plane(&mut self, id: PlaneId) -> Result<Plane, CoreError> {
        self.planes.remove(&id).ok_or(CoreError::PlaneNotFound { id })
    }

    // -----------------------------------------------------------------------
    // Circuit and library
    // -----------------------------------------------------------------------

    fn insert_net_class(&mut self, class: NetClass) -> Result<(), CoreError> {
        if self.net_classes.contains_key(&class.name) {
            return Err(CoreError::duplicate("net class", &class.name));
        }
        self.net_classes.insert(class.name.clone(), class);
        Ok(())
    }

    fn remove_net_class(&mut self, name: &str) -> Result<NetClass, CoreError> {
        if self.net_signals.values().any(|s| s.net_class == name) {
            return Err(CoreError::in_use("net class", name));
        }
        self.net_classes
            .remove(name)
            .ok_or_else(|| CoreError::NetClassNotFound {
                name: name.to_string(),
            })
    }

    fn insert_net_signal(&mut self, signal: NetSignal) -> Result<(), CoreError> {
        if self.net_signals.contains_key(&signal.name) {
            return Err(CoreError::duplicate("net signal", &signal.name));
        }
        if !self.net_classes.contains_key(&signal.net_class) {
            return Err(CoreError::NetClassNotFound {
                name: signal.net_class.clone(),
            });
        }
        self.net_signals.insert(signal.name.clone(), signal);
        Ok(())
    }

    fn remove_net_signal(&mut self, name: &str) -> Result<NetSignal, CoreError> {
        if self.net_segments.values().any(|s| s.net_name == name)
            || self.planes.values().any(|p| p.net_name == name)
        {
            return Err(CoreError::in_use("net signal", name));
        }
        self.net_signals
            .remove(name)
            .ok_or_else(|| CoreError::NetSignalNotFound {
                name: name.to_string(),
            })
    }

    fn insert_library_device(&mut self, device: LibDevice) -> Result<(), CoreError> {
        if self.library_devices.contains_key(&device.id) {
            return Err(CoreError::duplicate("library device", device.id));
        }
        if !self.library_packages.contains_key(&device.package) {
            return Err(CoreError::PackageNotFound { id: device.package });
        }
        self.library_devices.insert(device.id, device);
        Ok(())
    }

    fn remove_library_device(&mut self, id: LibDeviceId) -> Result<LibDevice, CoreError> {
        if self.devices.values().any(|d| d.lib_device == id) {
            return Err(CoreError::in_use("library device", id));
        }
        self.library_devices
            .remove(&id)
            .ok_or(CoreError::LibDeviceNotFound { id })
    }

    fn insert_library_package(&mut self, package: LibPackage) -> Result<(), CoreError> {
        if self.library_packages.contains_key(&package.id) {
            return Err(CoreError::duplicate("library package", package.id));
        }
        self.library_packages.insert(package.id, package);
        Ok(())
    }

    fn remove_library_package(&mut self, id: PackageId) -> Result<LibPackage, CoreError> {
        if self.library_devices.values().any(|d| d.package == id) {
            return Err(CoreError::in_use("library package", id));
        }
        self.library_packages
            .remove(&id)
            .ok_or(CoreError::PackageNotFound { id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Angle, Length, Point};
    use crate::id::PadId;
    use crate::library::{ConnectStyle, PadDef};
    use uuid::Uuid;

    fn uuid(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    /// A board with one layer, one net, one placed device with a single pad
    /// at (10, 0) relative to the device origin (100, 100).
    fn fixture() -> Board {
        let mut board = Board::new("test");
        board.add_layer(Layer::new("top_cu"));
        board.add_component(ComponentInstance {
            id: ComponentId(uuid(500)),
            name: "R1".into(),
        });
        board
            .insert_net_class(NetClass {
                name: "default".into(),
            })
            .unwrap();
        board
            .insert_net_signal(NetSignal {
                name: "GND".into(),
                net_class: "default".into(),
            })
            .unwrap();
        board
            .insert_library_package(LibPackage {
                id: PackageId(uuid(600)),
                name: "R0603".into(),
                pads: vec![PadDef {
                    id: PadId(uuid(601)),
                    offset: Point::new(10, 0),
                }],
            })
            .unwrap();
        board
            .insert_library_device(LibDevice {
                id: LibDeviceId(uuid(700)),
                name: "resistor".into(),
                package: PackageId(uuid(600)),
            })
            .unwrap();
        board
            .insert_device(Device::new(
                ComponentId(uuid(500)),
                LibDeviceId(uuid(700)),
                Point::new(100, 100),
            ))
            .unwrap();
        board
            .insert_net_segment(NetSegment::new(NetSegmentId(uuid(1)), "GND"))
            .unwrap();
        board
    }

    fn trace(n: u128, start: TraceAnchor, end: TraceAnchor, layer: &str) -> Trace {
        Trace {
            id: TraceId(uuid(n)),
            layer: layer.into(),
            width: Length::from_um(200),
            start,
            end,
        }
    }

    #[test]
    fn pad_anchor_position_follows_device() {
        let board = fixture();
        let pad = TraceAnchor::pad(ComponentId(uuid(500)), PadId(uuid(601)));
        assert_eq!(board.anchor_position(&pad), Some(Point::new(110, 100)));
    }

    #[test]
    fn pad_anchor_position_follows_device_rotation() {
        let mut board = fixture();
        let mut device = board.remove_device(ComponentId(uuid(500))).unwrap();
        device.rotation = Angle::from_deg(90);
        board.insert_device(device.clone()).unwrap();
        let pad = TraceAnchor::pad(ComponentId(uuid(500)), PadId(uuid(601)));
        assert_eq!(board.anchor_position(&pad), Some(Point::new(100, 110)));

        board.remove_device(ComponentId(uuid(500))).unwrap();
        device.mirrored = true;
        board.insert_device(device).unwrap();
        assert_eq!(board.anchor_position(&pad), Some(Point::new(100, 90)));
    }

    fn plane(n: u128, net: &str, layer: &str) -> Plane {
        Plane {
            id: PlaneId(uuid(n)),
            layer: layer.into(),
            net_name: net.into(),
            outline: vec![Point::ORIGIN, Point::new(100, 0), Point::new(100, 100)],
            min_width: Length::from_um(200),
            min_clearance: Length::from_um(300),
            keep_orphans: false,
            priority: 0,
            connect_style: ConnectStyle::Solid,
        }
    }

    #[test]
    fn planes_need_their_net_and_hold_it() {
        let mut board = fixture();
        assert_eq!(
            board.insert_plane(plane(30, "VCC", "top_cu")),
            Err(CoreError::NetSignalNotFound { name: "VCC".into() })
        );
        assert_eq!(
            board.insert_plane(plane(30, "GND", "inner")),
            Err(CoreError::LayerNotFound { name: "inner".into() })
        );

        board
            .insert_net_signal(NetSignal {
                name: "VCC".into(),
                net_class: "default".into(),
            })
            .unwrap();
        board.insert_plane(plane(30, "VCC", "top_cu")).unwrap();
        assert!(matches!(
            board.insert_plane(plane(30, "VCC", "top_cu")),
            Err(CoreError::DuplicateId { .. })
        ));
        assert!(matches!(
            board.remove_net_signal("VCC"),
            Err(CoreError::ItemInUse { .. })
        ));
        assert!(board.check_invariants().is_ok());

        let removed = board.remove_plane(PlaneId(uuid(30))).unwrap();
        assert_eq!(removed.net_name, "VCC");
        board.remove_net_signal("VCC").unwrap();
    }

    #[test]
    fn insert_trace_validates_layer_and_anchors() {
        let mut board = fixture();
        let seg = NetSegmentId(uuid(1));
        let j = Junction::new(NodeId(uuid(10)), Point::ORIGIN);
        board.insert_junction(seg, j).unwrap();

        let pad = TraceAnchor::pad(ComponentId(uuid(500)), PadId(uuid(601)));
        let bad_layer = trace(20, TraceAnchor::junction(NodeId(uuid(10))), pad, "nope");
        assert_eq!(
            board.insert_trace(seg, bad_layer),
            Err(CoreError::LayerNotFound {
                name: "nope".into()
            })
        );

        let missing = TraceAnchor::via(ViaId(uuid(99)));
        let dangling = trace(21, TraceAnchor::junction(NodeId(uuid(10))), missing, "top_cu");
        assert!(matches!(
            board.insert_trace(seg, dangling),
            Err(CoreError::UnresolvedAnchor { anchor, .. }) if anchor == missing
        ));

        let ok = trace(22, TraceAnchor::junction(NodeId(uuid(10))), pad, "top_cu");
        board.insert_trace(seg, ok).unwrap();
        assert_eq!(board.segment_of_trace(TraceId(uuid(22))), Some(seg));
        assert!(board.check_invariants().is_ok());
    }

    #[test]
    fn referenced_items_cannot_be_removed() {
        let mut board = fixture();
        let seg = NetSegmentId(uuid(1));
        board
            .insert_junction(seg, Junction::new(NodeId(uuid(10)), Point::ORIGIN))
            .unwrap();
        let pad = TraceAnchor::pad(ComponentId(uuid(500)), PadId(uuid(601)));
        board
            .insert_trace(
                seg,
                trace(22, TraceAnchor::junction(NodeId(uuid(10))), pad, "top_cu"),
            )
            .unwrap();

        assert!(matches!(
            board.remove_junction(NodeId(uuid(10))),
            Err(CoreError::ItemInUse { .. })
        ));
        assert!(matches!(
            board.remove_device(ComponentId(uuid(500))),
            Err(CoreError::ItemInUse { .. })
        ));
        assert!(matches!(
            board.remove_net_signal("GND"),
            Err(CoreError::ItemInUse { .. })
        ));

        board.remove_trace(TraceId(uuid(22))).unwrap();
        board.remove_junction(NodeId(uuid(10))).unwrap();
        board.remove_device(ComponentId(uuid(500))).unwrap();
    }

    #[test]
    fn remove_and_reinsert_segment_restores_equal_board() {
        let mut board = fixture();
        let seg = NetSegmentId(uuid(1));
        board
            .insert_junction(seg, Junction::new(NodeId(uuid(10)), Point::ORIGIN))
            .unwrap();
        board
            .insert_junction(seg, Junction::new(NodeId(uuid(11)), Point::new(5, 5)))
            .unwrap();
        board
            .insert_trace(
                seg,
                trace(
                    20,
                    TraceAnchor::junction(NodeId(uuid(10))),
                    TraceAnchor::junction(NodeId(uuid(11))),
                    "top_cu",
                ),
            )
            .unwrap();
        let snapshot = board.clone();

        let removed = board.remove_net_segment(seg).unwrap();
        assert_eq!(board.trace_count(), 0);
        assert_eq!(board.segment_of_junction(NodeId(uuid(10))), None);

        board.insert_net_segment(removed).unwrap();
        assert_eq!(board, snapshot);
    }

    #[test]
    fn serde_roundtrip_rebuilds_owner_index() {
        let mut board = fixture();
        let seg = NetSegmentId(uuid(1));
        board
            .insert_junction(seg, Junction::new(NodeId(uuid(10)), Point::ORIGIN))
            .unwrap();
        board.insert_plane(plane(30, "GND", "top_cu")).unwrap();

        let json = board.to_json().unwrap();
        let back = Board::from_json(&json).unwrap();
        assert_eq!(back.segment_of_junction(NodeId(uuid(10))), Some(seg));
        assert_eq!(back, board);
    }
}
