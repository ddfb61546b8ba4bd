//! Removal of board items with re-splitting of the affected net segments.
//!
//! Removal is one transaction:
//! 1. The selection is closed: a device takes the traces on its pads with
//!    it, a junction takes its incident traces with it.
//! 2. Every affected net segment is either removed whole (all of its
//!    junctions, vias and traces are selected) or split: its surviving items
//!    are partitioned and each part is rebuilt as a new segment. Rebuilt
//!    junctions get new identities; vias and traces keep theirs. Traces that
//!    ended on a removed via end on a placeholder junction instead.
//! 3. Devices, planes, polygons, holes and stroke texts are removed.
//! 4. Library devices and packages no longer used on the board are removed.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info};

use pcbedit_core::{
    BoardDocument, ComponentId, CoreError, HoleId, IdGenerator, NetLabelId, NetSegment, NetSegmentId,
    NodeId, PlaneId, PolygonId, StrokeTextId, TraceAnchor, TraceId, ViaId,
};

use crate::anchor::{AnchorResolver, MissingAnchorPolicy};
use crate::command::Mutation;
use crate::config::EditConfig;
use crate::error::EditError;
use crate::splitter::{NetSegmentSplitter, SplitSegment};
use crate::transaction::{EditOutcome, Transaction};

/// Items selected for removal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub junctions: BTreeSet<NodeId>,
    pub vias: BTreeSet<ViaId>,
    pub traces: BTreeSet<TraceId>,
    pub labels: BTreeSet<NetLabelId>,
    pub devices: BTreeSet<ComponentId>,
    pub planes: BTreeSet<PlaneId>,
    pub polygons: BTreeSet<PolygonId>,
    pub holes: BTreeSet<HoleId>,
    pub stroke_texts: BTreeSet<StrokeTextId>,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.junctions.is_empty()
            && self.vias.is_empty()
            && self.traces.is_empty()
            && self.labels.is_empty()
            && self.devices.is_empty()
            && self.planes.is_empty()
            && self.polygons.is_empty()
            && self.holes.is_empty()
            && self.stroke_texts.is_empty()
    }
}

/// Selected net items of one segment.
#[derive(Debug, Default)]
struct SegmentRemoval {
    junctions: BTreeSet<NodeId>,
    vias: BTreeSet<ViaId>,
    traces: BTreeSet<TraceId>,
    labels: BTreeSet<NetLabelId>,
}

impl SegmentRemoval {
    fn is_structural(&self) -> bool {
        !(self.junctions.is_empty() && self.vias.is_empty() && self.traces.is_empty())
    }

    fn covers(&self, segment: &NetSegment) -> bool {
        segment.junctions.keys().all(|id| self.junctions.contains(id))
            && segment.vias.keys().all(|id| self.vias.contains(id))
            && segment.traces.keys().all(|id| self.traces.contains(id))
    }
}

/// Removes the selected items from `doc` as one undoable edit.
///
/// Returns [`EditOutcome::NoOp`] if nothing was removed.
pub fn remove_board_items<D, I>(
    doc: &mut D,
    ids: &mut I,
    selection: &Selection,
    config: &EditConfig,
) -> Result<EditOutcome, EditError>
where
    D: BoardDocument + ?Sized,
    I: IdGenerator,
{
    let per_segment = collect_segment_removals(&*doc, selection)?;
    let mut tx = Transaction::begin(doc, ids, "remove board items");

    for (segment_id, removal) in &per_segment {
        let segment = tx
            .doc()
            .net_segment(*segment_id)
            .ok_or(CoreError::NetSegmentNotFound { id: *segment_id })?
            .clone();
        if !removal.is_structural() {
            for label in &removal.labels {
                tx.apply(Mutation::RemoveNetLabel { id: *label })?;
            }
        } else if removal.covers(&segment) {
            debug!(segment = %segment.id, "all items selected, removing whole segment");
            tx.apply(Mutation::RemoveNetSegment { id: segment.id })?;
        } else {
            let excluded = &selection.devices;
            tx.group("split net segment", |tx| {
                split_up_segment(tx, &segment, removal, excluded, config)
            })?;
        }
    }

    for component in &selection.devices {
        tx.apply(Mutation::RemoveDevice {
            component: *component,
        })?;
    }
    for id in &selection.planes {
        tx.apply(Mutation::RemovePlane { id: *id })?;
    }
    for id in &selection.polygons {
        tx.apply(Mutation::RemovePolygon { id: *id })?;
    }
    for id in &selection.stroke_texts {
        tx.apply(Mutation::RemoveStrokeText { id: *id })?;
    }
    for id in &selection.holes {
        tx.apply(Mutation::RemoveHole { id: *id })?;
    }

    if !tx.is_empty() && config.remove_unused_library_elements {
        tx.group("remove unused library elements", |tx| {
            remove_unused_library_elements(tx)
        })?;
    }

    if config.verify_invariants {
        tx.doc().check_invariants()?;
    }

    let outcome = tx.commit()?;
    if let EditOutcome::Applied(edit) = &outcome {
        info!(edits = edit.command().primitive_count(), "board items removed");
    }
    Ok(outcome)
}

/// Groups the selected net items by owning segment, closing the selection
/// over traces attached to selected devices and junctions.
fn collect_segment_removals<D>(
    doc: &D,
    selection: &Selection,
) -> Result<BTreeMap<NetSegmentId, SegmentRemoval>, EditError>
where
    D: BoardDocument + ?Sized,
{
    let mut per_segment: BTreeMap<NetSegmentId, SegmentRemoval> = BTreeMap::new();

    for id in &selection.junctions {
        let owner = doc
            .segment_of_junction(*id)
            .ok_or(CoreError::JunctionNotFound { id: *id })?;
        per_segment.entry(owner).or_default().junctions.insert(*id);
    }
    for id in &selection.vias {
        let owner = doc
            .segment_of_via(*id)
            .ok_or(CoreError::ViaNotFound { id: *id })?;
        per_segment.entry(owner).or_default().vias.insert(*id);
    }
    for id in &selection.traces {
        let owner = doc
            .segment_of_trace(*id)
            .ok_or(CoreError::TraceNotFound { id: *id })?;
        per_segment.entry(owner).or_default().traces.insert(*id);
    }
    for id in &selection.labels {
        let owner = doc
            .segment_of_label(*id)
            .ok_or(CoreError::NetLabelNotFound { id: *id })?;
        per_segment.entry(owner).or_default().labels.insert(*id);
    }

    for segment_id in doc.net_segment_ids() {
        let Some(segment) = doc.net_segment(segment_id) else {
            continue;
        };
        let selected_junctions = per_segment
            .get(&segment_id)
            .map(|r| r.junctions.clone())
            .unwrap_or_default();
        let attached: Vec<TraceId> = segment
            .traces
            .values()
            .filter(|trace| {
                trace.anchors().iter().any(|anchor| match anchor {
                    TraceAnchor::Junction { id } => selected_junctions.contains(id),
                    TraceAnchor::Pad { component, .. } => selection.devices.contains(component),
                    TraceAnchor::Via { .. } => false,
                })
            })
            .map(|trace| trace.id)
            .collect();
        if !attached.is_empty() {
            per_segment
                .entry(segment_id)
                .or_default()
                .traces
                .extend(attached);
        }
    }

    Ok(per_segment)
}

/// Replaces `segment` by the connected parts of its surviving items.
fn split_up_segment<D, I>(
    tx: &mut Transaction<'_, D, I>,
    segment: &NetSegment,
    removal: &SegmentRemoval,
    removed_devices: &BTreeSet<ComponentId>,
    config: &EditConfig,
) -> Result<(), EditError>
where
    D: BoardDocument + ?Sized,
    I: IdGenerator,
{
    let mut splitter = NetSegmentSplitter::new();
    for junction in segment.junctions.values() {
        if !removal.junctions.contains(&junction.id) {
            splitter.add_junction(junction.clone());
        }
    }
    for via in segment.vias.values() {
        if !removal.vias.contains(&via.id) {
            splitter.add_via(via.clone());
        }
    }
    for trace in segment.traces.values() {
        if !removal.traces.contains(&trace.id) {
            splitter.add_trace(tx.doc().anchored_trace(trace.id)?);
        }
    }
    for label in segment.labels.values() {
        if !removal.labels.contains(&label.id) {
            splitter.add_label(label.clone());
        }
    }
    for component in tx.doc().device_components() {
        if !removed_devices.contains(&component) {
            splitter.add_device(component);
        }
    }

    let parts = splitter.split(tx.ids())?;
    if config.verify_invariants {
        for part in &parts {
            part.check_closure()?;
        }
    }
    debug!(segment = %segment.id, parts = parts.len(), "net segment split up");

    tx.apply(Mutation::RemoveNetSegment { id: segment.id })?;
    for part in parts {
        rebuild_segment(tx, &segment.net_name, part)?;
    }
    Ok(())
}

/// Creates a new net segment holding the items of one split part.
fn rebuild_segment<D, I>(
    tx: &mut Transaction<'_, D, I>,
    net_name: &str,
    part: SplitSegment,
) -> Result<(), EditError>
where
    D: BoardDocument + ?Sized,
    I: IdGenerator,
{
    let segment_id: NetSegmentId = tx.fresh();
    tx.apply(Mutation::InsertNetSegment {
        segment: NetSegment::new(segment_id, net_name),
    })?;

    let devices = tx.doc().device_components();
    let mut resolver = AnchorResolver::new(MissingAnchorPolicy::Fail).with_devices(devices);

    for mut junction in part.junctions {
        let new_id: NodeId = tx.fresh();
        resolver.map_junction(junction.id, new_id);
        junction.id = new_id;
        tx.apply(Mutation::InsertJunction {
            segment: segment_id,
            junction,
        })?;
    }
    for via in part.vias {
        resolver.map_via(via.id, via.id);
        tx.apply(Mutation::InsertVia {
            segment: segment_id,
            via,
        })?;
    }
    for anchored in part.traces {
        let mut trace = anchored.trace;
        trace.start = resolver
            .resolve(trace.id, trace.start, anchored.start_position, tx.ids())?
            .anchor;
        trace.end = resolver
            .resolve(trace.id, trace.end, anchored.end_position, tx.ids())?
            .anchor;
        tx.apply(Mutation::InsertTrace {
            segment: segment_id,
            trace,
        })?;
    }
    for label in part.labels {
        tx.apply(Mutation::InsertNetLabel {
            segment: segment_id,
            label,
        })?;
    }
    Ok(())
}

/// Removes library devices not used by any device, then packages not used
/// by any library device.
fn remove_unused_library_elements<D, I>(tx: &mut Transaction<'_, D, I>) -> Result<(), EditError>
where
    D: BoardDocument + ?Sized,
    I: IdGenerator,
{
    let used_devices: BTreeSet<_> = tx
        .doc()
        .device_components()
        .into_iter()
        .filter_map(|c| tx.doc().device(c).map(|d| d.lib_device))
        .collect();
    for id in tx.doc().library_device_ids() {
        if !used_devices.contains(&id) {
            debug!(lib_device = %id, "removing unused library device");
            tx.apply(Mutation::RemoveLibraryDevice { id })?;
        }
    }

    let used_packages: BTreeSet<_> = tx
        .doc()
        .library_device_ids()
        .into_iter()
        .filter_map(|id| tx.doc().library_device(id).map(|d| d.package))
        .collect();
    for id in tx.doc().library_package_ids() {
        if !used_packages.contains(&id) {
            debug!(package = %id, "removing unused library package");
            tx.apply(Mutation::RemoveLibraryPackage { id })?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcbedit_core::{
        Board, ComponentInstance, ConnectStyle, Device, Junction, Layer, Length, LibDevice,
        LibDeviceId, LibPackage, NetClass, NetSignal, PackageId, PadDef, PadId, Plane, Point,
        SequentialIds, Trace, Via, ViaShape,
    };
    use uuid::Uuid;

    const SEG: NetSegmentId = NetSegmentId(Uuid::from_u128(1));
    const R1: ComponentId = ComponentId(Uuid::from_u128(500));
    const PAD: PadId = PadId(Uuid::from_u128(601));
    const VIA: ViaId = ViaId(Uuid::from_u128(40));

    fn node(n: u128) -> NodeId {
        NodeId(Uuid::from_u128(n))
    }

    fn trace(n: u128, start: TraceAnchor, end: TraceAnchor) -> Trace {
        Trace {
            id: TraceId(Uuid::from_u128(n)),
            layer: "top_cu".into(),
            width: Length::from_um(250),
            start,
            end,
        }
    }

    /// N1 -- via -- N2 -- pad of R1
    fn fixture() -> Board {
        let mut board = Board::new("remove");
        board.add_layer(Layer::new("top_cu"));
        board.add_component(ComponentInstance {
            id: R1,
            name: "R1".into(),
        });
        board
            .insert_net_class(NetClass {
                name: "default".into(),
            })
            .unwrap();
        board
            .insert_net_signal(NetSignal {
                name: "SIG".into(),
                net_class: "default".into(),
            })
            .unwrap();
        board
            .insert_library_package(LibPackage {
                id: PackageId(Uuid::from_u128(600)),
                name: "R0402".into(),
                pads: vec![PadDef {
                    id: PAD,
                    offset: Point::new(0, 0),
                }],
            })
            .unwrap();
        board
            .insert_library_device(LibDevice {
                id: LibDeviceId(Uuid::from_u128(700)),
                name: "R".into(),
                package: PackageId(Uuid::from_u128(600)),
            })
            .unwrap();
        board
            .insert_device(Device::new(
                R1,
                LibDeviceId(Uuid::from_u128(700)),
                Point::new(300, 0),
            ))
            .unwrap();

        let mut seg = NetSegment::new(SEG, "SIG");
        seg.junctions
            .insert(node(1), Junction::new(node(1), Point::new(0, 0)));
        seg.junctions
            .insert(node(2), Junction::new(node(2), Point::new(200, 0)));
        seg.vias.insert(
            VIA,
            Via {
                id: VIA,
                position: Point::new(100, 0),
                shape: ViaShape::Round,
                size: Length::from_um(600),
                drill: Length::from_um(300),
            },
        );
        for t in [
            trace(10, TraceAnchor::junction(node(1)), TraceAnchor::via(VIA)),
            trace(11, TraceAnchor::via(VIA), TraceAnchor::junction(node(2))),
            trace(12, TraceAnchor::junction(node(2)), TraceAnchor::pad(R1, PAD)),
        ] {
            seg.traces.insert(t.id, t);
        }
        board.insert_net_segment(seg).unwrap();
        board
    }

    #[test]
    fn empty_selection_is_noop() {
        let mut board = fixture();
        let mut ids = SequentialIds::default();
        let outcome =
            remove_board_items(&mut board, &mut ids, &Selection::default(), &EditConfig::default())
                .unwrap();
        assert!(outcome.is_noop());
    }

    #[test]
    fn removing_device_removes_pad_traces_and_library() {
        let mut board = fixture();
        let mut ids = SequentialIds::default();
        let snapshot = board.clone();
        let selection = Selection {
            devices: [R1].into(),
            ..Selection::default()
        };

        let edit = remove_board_items(&mut board, &mut ids, &selection, &EditConfig::default())
            .unwrap()
            .into_edit()
            .unwrap();

        assert!(board.device(R1).is_none());
        assert!(board.segment_of_trace(TraceId(Uuid::from_u128(12))).is_none());
        assert_eq!(board.trace_count(), 2);
        assert!(board.library_device_ids().is_empty());
        assert!(board.library_package_ids().is_empty());
        assert!(board.check_invariants().is_ok());

        edit.undo(&mut board).unwrap();
        assert_eq!(board, snapshot);
    }

    #[test]
    fn removing_via_leaves_placeholder() {
        let mut board = fixture();
        let mut ids = SequentialIds::default();
        let selection = Selection {
            vias: [VIA].into(),
            ..Selection::default()
        };

        remove_board_items(&mut board, &mut ids, &selection, &EditConfig::default()).unwrap();

        assert_eq!(board.via_count(), 0);
        assert_eq!(board.trace_count(), 3);
        let segments: Vec<_> = board.net_segments().collect();
        assert_eq!(segments.len(), 1);
        let placeholder = segments[0]
            .junctions
            .values()
            .find(|j| j.position == Point::new(100, 0))
            .unwrap();
        assert_eq!(
            segments[0]
                .traces_at(&TraceAnchor::junction(placeholder.id))
                .len(),
            2
        );
        // traces keep their identity
        assert!(board.segment_of_trace(TraceId(Uuid::from_u128(10))).is_some());
    }

    #[test]
    fn removing_everything_removes_segment() {
        let mut board = fixture();
        let mut ids = SequentialIds::default();
        let selection = Selection {
            junctions: [node(1), node(2)].into(),
            vias: [VIA].into(),
            ..Selection::default()
        };
        remove_board_items(&mut board, &mut ids, &selection, &EditConfig::default()).unwrap();
        assert_eq!(board.net_segments().count(), 0);
    }

    #[test]
    fn removing_plane_keeps_its_net_signal() {
        let mut board = fixture();
        let mut ids = SequentialIds::default();
        let plane = PlaneId(Uuid::from_u128(80));
        board
            .insert_plane(Plane {
                id: plane,
                layer: "top_cu".into(),
                net_name: "SIG".into(),
                outline: vec![Point::new(0, 0), Point::new(300, 0), Point::new(300, 300)],
                min_width: Length::from_um(200),
                min_clearance: Length::from_um(300),
                keep_orphans: false,
                priority: 0,
                connect_style: ConnectStyle::ThermalRelief,
            })
            .unwrap();
        let snapshot = board.clone();
        let selection = Selection {
            planes: [plane].into(),
            ..Selection::default()
        };

        let edit = remove_board_items(&mut board, &mut ids, &selection, &EditConfig::default())
            .unwrap()
            .into_edit()
            .unwrap();
        assert!(board.plane(plane).is_none());
        assert!(board.net_signal("SIG").is_some());
        assert_eq!(board.trace_count(), 3);

        edit.undo(&mut board).unwrap();
        assert_eq!(board, snapshot);
    }

    #[test]
    fn failing_removal_leaves_board_unchanged() {
        let mut board = fixture();
        let mut ids = SequentialIds::default();
        let snapshot = board.clone();
        let selection = Selection {
            traces: [TraceId(Uuid::from_u128(11))].into(),
            polygons: [PolygonId(Uuid::from_u128(9999))].into(),
            ..Selection::default()
        };

        let err = remove_board_items(&mut board, &mut ids, &selection, &EditConfig::default())
            .unwrap_err();
        assert!(matches!(err, EditError::Document(_)));
        assert_eq!(board, snapshot);
    }
}
