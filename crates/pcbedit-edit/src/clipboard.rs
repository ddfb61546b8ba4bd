//! Clipboard content for copy and paste.
//!
//! [`ClipboardDataBuilder`] extracts a self-contained copy of the selected
//! board items. Selected traces are regrouped per source segment into
//! connected [`ClipboardSegment`]s; the junctions they end on are copied
//! implicitly, while endpoints on unselected vias or on pads of unselected
//! devices are replaced by placeholder junctions. A label selected without
//! any trace or via of its segment travels with the junction nearest to it,
//! or alone if the segment has no junction. Placed devices carry
//! their library device and package along so that paste can register them
//! in a destination library that lacks them.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use pcbedit_core::{
    AnchoredTrace, BoardDocument, ComponentId, CoreError, Device, Hole, HoleId, IdGenerator,
    Junction, LibDevice, LibDeviceId, LibPackage, NetLabel, NetLabelId, NetSegment, NodeId,
    PackageId, Plane, PlaneId, Point, Polygon, PolygonId, StrokeText, StrokeTextId, TraceAnchor,
    TraceId, Via, ViaId,
};

use crate::error::EditError;
use crate::splitter::NetSegmentSplitter;

/// One connected group of copied net items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipboardSegment {
    pub net_name: String,
    #[serde(default)]
    pub junctions: Vec<Junction>,
    #[serde(default)]
    pub vias: Vec<Via>,
    #[serde(default)]
    pub traces: Vec<AnchoredTrace>,
    #[serde(default)]
    pub labels: Vec<NetLabel>,
}

/// Copied board items. Identities are those of the source board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipboardData {
    /// Position the copy was taken relative to.
    pub reference: Point,
    #[serde(default)]
    pub devices: Vec<Device>,
    #[serde(default)]
    pub library_devices: Vec<LibDevice>,
    #[serde(default)]
    pub library_packages: Vec<LibPackage>,
    #[serde(default)]
    pub segments: Vec<ClipboardSegment>,
    #[serde(default)]
    pub planes: Vec<Plane>,
    #[serde(default)]
    pub polygons: Vec<Polygon>,
    #[serde(default)]
    pub holes: Vec<Hole>,
    #[serde(default)]
    pub stroke_texts: Vec<StrokeText>,
}

impl ClipboardData {
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
            && self.segments.is_empty()
            && self.planes.is_empty()
            && self.polygons.is_empty()
            && self.holes.is_empty()
            && self.stroke_texts.is_empty()
    }

    pub fn library_device(&self, id: LibDeviceId) -> Option<&LibDevice> {
        self.library_devices.iter().find(|d| d.id == id)
    }

    pub fn library_package(&self, id: PackageId) -> Option<&LibPackage> {
        self.library_packages.iter().find(|p| p.id == id)
    }
}

/// Collects a selection and produces [`ClipboardData`].
pub struct ClipboardDataBuilder<'d, D: BoardDocument + ?Sized> {
    doc: &'d D,
    devices: BTreeSet<ComponentId>,
    vias: BTreeSet<ViaId>,
    traces: BTreeSet<TraceId>,
    labels: BTreeSet<NetLabelId>,
    planes: BTreeSet<PlaneId>,
    polygons: BTreeSet<PolygonId>,
    holes: BTreeSet<HoleId>,
    stroke_texts: BTreeSet<StrokeTextId>,
}

impl<'d, D: BoardDocument + ?Sized> ClipboardDataBuilder<'d, D> {
    pub fn new(doc: &'d D) -> Self {
        ClipboardDataBuilder {
            doc,
            devices: BTreeSet::new(),
            vias: BTreeSet::new(),
            traces: BTreeSet::new(),
            labels: BTreeSet::new(),
            planes: BTreeSet::new(),
            polygons: BTreeSet::new(),
            holes: BTreeSet::new(),
            stroke_texts: BTreeSet::new(),
        }
    }

    pub fn device(mut self, component: ComponentId) -> Self {
        self.devices.insert(component);
        self
    }

    pub fn via(mut self, id: ViaId) -> Self {
        self.vias.insert(id);
        self
    }

    pub fn trace(mut self, id: TraceId) -> Self {
        self.traces.insert(id);
        self
    }

    pub fn label(mut self, id: NetLabelId) -> Self {
        self.labels.insert(id);
        self
    }

    pub fn plane(mut self, id: PlaneId) -> Self {
        self.planes.insert(id);
        self
    }

    pub fn polygon(mut self, id: PolygonId) -> Self {
        self.polygons.insert(id);
        self
    }

    pub fn hole(mut self, id: HoleId) -> Self {
        self.holes.insert(id);
        self
    }

    pub fn stroke_text(mut self, id: StrokeTextId) -> Self {
        self.stroke_texts.insert(id);
        self
    }

    /// Builds the clipboard content. `ids` supplies placeholder identities.
    pub fn build<I: IdGenerator>(
        &self,
        reference: Point,
        ids: &mut I,
    ) -> Result<ClipboardData, EditError> {
        let doc = self.doc;
        let mut data = ClipboardData {
            reference,
            devices: Vec::new(),
            library_devices: Vec::new(),
            library_packages: Vec::new(),
            segments: Vec::new(),
            planes: Vec::new(),
            polygons: Vec::new(),
            holes: Vec::new(),
            stroke_texts: Vec::new(),
        };

        for component in &self.devices {
            let device = doc
                .device(*component)
                .ok_or(CoreError::DeviceNotFound {
                    component: *component,
                })?;
            let lib_device = doc
                .library_device(device.lib_device)
                .ok_or(CoreError::LibDeviceNotFound {
                    id: device.lib_device,
                })?;
            let package = doc
                .library_package(lib_device.package)
                .ok_or(CoreError::PackageNotFound {
                    id: lib_device.package,
                })?;
            if data.library_device(lib_device.id).is_none() {
                data.library_devices.push(lib_device.clone());
            }
            if data.library_package(package.id).is_none() {
                data.library_packages.push(package.clone());
            }
            data.devices.push(device.clone());
        }

        for segment_id in doc.net_segment_ids() {
            let Some(segment) = doc.net_segment(segment_id) else {
                continue;
            };
            let selected_traces: Vec<TraceId> = segment
                .traces
                .keys()
                .filter(|id| self.traces.contains(id))
                .copied()
                .collect();
            let selected_vias: Vec<&Via> = segment
                .vias
                .values()
                .filter(|v| self.vias.contains(&v.id))
                .collect();
            let selected_labels: Vec<&NetLabel> = segment
                .labels
                .values()
                .filter(|l| self.labels.contains(&l.id))
                .collect();
            let labels_only = selected_traces.is_empty() && selected_vias.is_empty();
            if labels_only {
                if selected_labels.is_empty() {
                    continue;
                }
                if segment.junctions.is_empty() {
                    debug!(net = %segment.net_name, "no junction in segment, labels copied alone");
                    data.segments.push(ClipboardSegment {
                        net_name: segment.net_name.clone(),
                        junctions: Vec::new(),
                        vias: Vec::new(),
                        traces: Vec::new(),
                        labels: selected_labels.into_iter().cloned().collect(),
                    });
                    continue;
                }
            }

            let mut splitter = NetSegmentSplitter::new();
            for via in selected_vias {
                splitter.add_via(via.clone());
            }
            let mut endpoints = BTreeSet::new();
            for id in &selected_traces {
                let anchored = doc.anchored_trace(*id)?;
                for anchor in anchored.trace.anchors() {
                    if let TraceAnchor::Junction { id } = anchor {
                        endpoints.insert(id);
                    }
                }
                splitter.add_trace(anchored);
            }
            if labels_only {
                endpoints.extend(
                    selected_labels
                        .iter()
                        .filter_map(|label| nearest_junction(segment, label.position)),
                );
            }
            for id in endpoints {
                if let Some(junction) = segment.junctions.get(&id) {
                    splitter.add_junction(junction.clone());
                }
            }
            for label in selected_labels {
                splitter.add_label(label.clone());
            }
            for component in &self.devices {
                splitter.add_device(*component);
            }

            for part in splitter.split(ids)? {
                debug!(
                    net = %segment.net_name,
                    traces = part.traces.len(),
                    placeholders = part.placeholders.len(),
                    "segment copied"
                );
                data.segments.push(ClipboardSegment {
                    net_name: segment.net_name.clone(),
                    junctions: part.junctions,
                    vias: part.vias,
                    traces: part.traces,
                    labels: part.labels,
                });
            }
        }

        for id in &self.planes {
            let plane = doc.plane(*id).ok_or(CoreError::PlaneNotFound { id: *id })?;
            data.planes.push(plane.clone());
        }
        for id in &self.polygons {
            let polygon = doc.polygon(*id).ok_or(CoreError::PolygonNotFound { id: *id })?;
            data.polygons.push(polygon.clone());
        }
        for id in &self.holes {
            let hole = doc.hole(*id).ok_or(CoreError::HoleNotFound { id: *id })?;
            data.holes.push(hole.clone());
        }
        for id in &self.stroke_texts {
            let text = doc
                .stroke_text(*id)
                .ok_or(CoreError::StrokeTextNotFound { id: *id })?;
            data.stroke_texts.push(text.clone());
        }

        Ok(data)
    }
}

/// The junction of `segment` closest to `position`; ties go to the lowest
/// identity.
fn nearest_junction(segment: &NetSegment, position: Point) -> Option<NodeId> {
    segment
        .junctions
        .values()
        .min_by(|a, b| {
            a.position
                .distance_to(position)
                .total_cmp(&b.position.distance_to(position))
                .then(a.id.cmp(&b.id))
        })
        .map(|j| j.id)
}
