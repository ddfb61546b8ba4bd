//! Pasting clipboard content into a board.
//!
//! Every pasted item gets a fresh identity and is translated by the paste
//! offset. A device is pasted only if its component exists in the
//! destination circuit and no device realizes that component yet; otherwise
//! it is skipped, and traces that ended on one of its pads end on a
//! placeholder junction at the pad position instead. Library elements and
//! net signals missing from the destination are created on the way, both
//! for net segments and for planes.
//!
//! The offset is checked against every clipboard coordinate before anything
//! is applied, so an out-of-range paste fails without touching the board.

use std::collections::BTreeSet;

use tracing::{debug, info};

use pcbedit_core::{
    BoardDocument, ComponentId, Device, IdGenerator, Junction, LibDeviceId, NetClass, NetLabel,
    NetSegment, NetSegmentId, NetSignal, NodeId, Point, TraceId, ViaId,
};

use crate::anchor::{AnchorResolver, MissingAnchorPolicy};
use crate::clipboard::{ClipboardData, ClipboardSegment};
use crate::command::Mutation;
use crate::config::EditConfig;
use crate::error::EditError;
use crate::transaction::{EditOutcome, Transaction};

/// What a paste did beyond the committed edit itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PasteReport {
    pub pasted_devices: Vec<ComponentId>,
    pub skipped_devices: Vec<ComponentId>,
    pub created_segments: Vec<NetSegmentId>,
    /// Placeholder junctions created for pads of devices not pasted.
    pub placeholders: Vec<NodeId>,
}

/// Pastes `data` into `doc`, translated by `offset`, as one undoable edit.
pub fn paste_board_items<D, I>(
    doc: &mut D,
    ids: &mut I,
    data: &ClipboardData,
    offset: Point,
    config: &EditConfig,
) -> Result<(EditOutcome, PasteReport), EditError>
where
    D: BoardDocument + ?Sized,
    I: IdGenerator,
{
    check_offset(data, offset)?;
    let mut report = PasteReport::default();
    let mut tx = Transaction::begin(doc, ids, "paste board items");

    for device in &data.devices {
        if tx.doc().component(device.component).is_none() {
            debug!(component = %device.component, "component not in circuit, device skipped");
            report.skipped_devices.push(device.component);
            continue;
        }
        if tx.doc().device(device.component).is_some() {
            debug!(component = %device.component, "device already on board, skipped");
            report.skipped_devices.push(device.component);
            continue;
        }
        ensure_library_device(&mut tx, data, device.lib_device)?;
        tx.apply(Mutation::InsertDevice {
            device: Device {
                position: device.position.translated(offset),
                ..device.clone()
            },
        })?;
        report.pasted_devices.push(device.component);
    }

    let pasted: BTreeSet<ComponentId> = report.pasted_devices.iter().copied().collect();
    for segment in &data.segments {
        let (segment_id, placeholders) = tx.group("paste net segment", |tx| {
            paste_segment(tx, segment, &pasted, offset, config)
        })?;
        report.created_segments.push(segment_id);
        report.placeholders.extend(placeholders);
    }

    for plane in &data.planes {
        ensure_net_signal(&mut tx, &plane.net_name, config)?;
        let id = tx.fresh();
        tx.apply(Mutation::InsertPlane {
            plane: plane.copied(id, offset),
        })?;
    }
    for polygon in &data.polygons {
        let id = tx.fresh();
        tx.apply(Mutation::InsertPolygon {
            polygon: polygon.copied(id, offset),
        })?;
    }
    for hole in &data.holes {
        let mut hole = hole.clone();
        hole.id = tx.fresh();
        hole.position = hole.position.translated(offset);
        tx.apply(Mutation::InsertHole { hole })?;
    }
    for text in &data.stroke_texts {
        let mut text = text.clone();
        text.id = tx.fresh();
        text.position = text.position.translated(offset);
        tx.apply(Mutation::InsertStrokeText { text })?;
    }

    if config.verify_invariants {
        tx.doc().check_invariants()?;
    }

    let outcome = tx.commit()?;
    if !outcome.is_noop() {
        info!(
            devices = report.pasted_devices.len(),
            segments = report.created_segments.len(),
            placeholders = report.placeholders.len(),
            "board items pasted"
        );
    }
    Ok((outcome, report))
}

/// Fails with [`EditError::CoordinateOverflow`] if any clipboard coordinate
/// would leave the `i64` range when moved by `offset`.
fn check_offset(data: &ClipboardData, offset: Point) -> Result<(), EditError> {
    let segment_points = data.segments.iter().flat_map(|segment| {
        segment
            .junctions
            .iter()
            .map(|j| j.position)
            .chain(segment.vias.iter().map(|v| v.position))
            .chain(
                segment
                    .traces
                    .iter()
                    .flat_map(|t| [t.start_position, t.end_position]),
            )
            .chain(segment.labels.iter().map(|l| l.position))
    });
    let mut points = data
        .devices
        .iter()
        .map(|d| d.position)
        .chain(segment_points)
        .chain(data.planes.iter().flat_map(|p| p.outline.iter().copied()))
        .chain(data.polygons.iter().flat_map(|p| p.path.iter().copied()))
        .chain(data.holes.iter().map(|h| h.position))
        .chain(data.stroke_texts.iter().map(|t| t.position));
    match points.find(|p| p.checked_translated(offset).is_none()) {
        Some(position) => Err(EditError::CoordinateOverflow { position, offset }),
        None => Ok(()),
    }
}

/// Registers a library device (and its package) from the clipboard bundle
/// unless the destination library already has it.
fn ensure_library_device<D, I>(
    tx: &mut Transaction<'_, D, I>,
    data: &ClipboardData,
    id: LibDeviceId,
) -> Result<(), EditError>
where
    D: BoardDocument + ?Sized,
    I: IdGenerator,
{
    if tx.doc().library_device(id).is_some() {
        return Ok(());
    }
    let lib_device = data
        .library_device(id)
        .ok_or_else(|| EditError::MissingLibraryElement {
            what: format!("library device {}", id),
        })?
        .clone();
    if tx.doc().library_package(lib_device.package).is_none() {
        let package = data
            .library_package(lib_device.package)
            .ok_or_else(|| EditError::MissingLibraryElement {
                what: format!("library package {}", lib_device.package),
            })?
            .clone();
        tx.apply(Mutation::InsertLibraryPackage { package })?;
    }
    tx.apply(Mutation::InsertLibraryDevice { device: lib_device })
}

/// Ensures the net signal `name` exists, creating it (and the default net
/// class) if the circuit lacks it.
fn ensure_net_signal<D, I>(
    tx: &mut Transaction<'_, D, I>,
    name: &str,
    config: &EditConfig,
) -> Result<(), EditError>
where
    D: BoardDocument + ?Sized,
    I: IdGenerator,
{
    if tx.doc().net_signal(name).is_some() {
        return Ok(());
    }
    if tx.doc().net_class(&config.default_net_class).is_none() {
        tx.apply(Mutation::InsertNetClass {
            class: NetClass {
                name: config.default_net_class.clone(),
            },
        })?;
    }
    debug!(net = name, "net signal created");
    tx.apply(Mutation::InsertNetSignal {
        signal: NetSignal {
            name: name.to_string(),
            net_class: config.default_net_class.clone(),
        },
    })
}

fn paste_segment<D, I>(
    tx: &mut Transaction<'_, D, I>,
    segment: &ClipboardSegment,
    pasted_devices: &BTreeSet<ComponentId>,
    offset: Point,
    config: &EditConfig,
) -> Result<(NetSegmentId, Vec<NodeId>), EditError>
where
    D: BoardDocument + ?Sized,
    I: IdGenerator,
{
    ensure_net_signal(tx, &segment.net_name, config)?;
    let segment_id: NetSegmentId = tx.fresh();
    tx.apply(Mutation::InsertNetSegment {
        segment: NetSegment::new(segment_id, segment.net_name.clone()),
    })?;

    let mut resolver = AnchorResolver::new(MissingAnchorPolicy::Placeholder)
        .with_devices(pasted_devices.iter().copied());

    for via in &segment.vias {
        let id: ViaId = tx.fresh();
        resolver.map_via(via.id, id);
        tx.apply(Mutation::InsertVia {
            segment: segment_id,
            via: via.copied(id, offset),
        })?;
    }
    for junction in &segment.junctions {
        let id: NodeId = tx.fresh();
        resolver.map_junction(junction.id, id);
        tx.apply(Mutation::InsertJunction {
            segment: segment_id,
            junction: Junction::new(id, junction.position.translated(offset)),
        })?;
    }

    let mut placeholders = Vec::new();
    for anchored in &segment.traces {
        let mut trace = anchored.trace.clone();
        let source = trace.id;
        let endpoints = [
            (trace.start, anchored.start_position),
            (trace.end, anchored.end_position),
        ];
        let mut resolved = Vec::with_capacity(2);
        for (anchor, position) in endpoints {
            let position = position.translated(offset);
            let resolution = resolver.resolve(source, anchor, position, tx.ids())?;
            if let Some(junction) = resolution.created {
                placeholders.push(junction.id);
                tx.apply(Mutation::InsertJunction {
                    segment: segment_id,
                    junction,
                })?;
            }
            resolved.push(resolution.anchor);
        }
        trace.id = tx.fresh::<TraceId>();
        trace.start = resolved[0];
        trace.end = resolved[1];
        if tx.doc().layer(&trace.layer).is_none() {
            return Err(EditError::MissingLayer { name: trace.layer });
        }
        tx.apply(Mutation::InsertTrace {
            segment: segment_id,
            trace,
        })?;
    }

    for label in &segment.labels {
        let id = tx.fresh();
        tx.apply(Mutation::InsertNetLabel {
            segment: segment_id,
            label: NetLabel {
                id,
                position: label.position.translated(offset),
            },
        })?;
    }

    Ok((segment_id, placeholders))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcbedit_core::{
        AnchoredTrace, Angle, Board, ComponentInstance, ConnectStyle, Hole, HoleId, Layer, Length,
        LibDevice, LibPackage, PackageId, PadDef, PadId, Plane, PlaneId, SequentialIds, Trace,
        TraceAnchor,
    };
    use uuid::Uuid;

    const R1: ComponentId = ComponentId(Uuid::from_u128(500));
    const PAD: PadId = PadId(Uuid::from_u128(601));
    const LIB_DEVICE: LibDeviceId = LibDeviceId(Uuid::from_u128(700));
    const PACKAGE: PackageId = PackageId(Uuid::from_u128(600));

    fn target() -> Board {
        let mut board = Board::new("target");
        board.add_layer(Layer::new("top_cu"));
        board.add_component(ComponentInstance {
            id: R1,
            name: "R1".into(),
        });
        board
    }

    /// One device R1 and one trace from its pad to a junction.
    fn clipboard() -> ClipboardData {
        let j = Junction::new(NodeId(Uuid::from_u128(1)), Point::new(100, 0));
        ClipboardData {
            reference: Point::ORIGIN,
            devices: vec![Device::new(R1, LIB_DEVICE, Point::new(0, 0))],
            library_devices: vec![LibDevice {
                id: LIB_DEVICE,
                name: "R".into(),
                package: PACKAGE,
            }],
            library_packages: vec![LibPackage {
                id: PACKAGE,
                name: "R0402".into(),
                pads: vec![PadDef {
                    id: PAD,
                    offset: Point::new(-50, 0),
                }],
            }],
            segments: vec![ClipboardSegment {
                net_name: "SIG".into(),
                junctions: vec![j.clone()],
                vias: vec![],
                traces: vec![AnchoredTrace {
                    trace: Trace {
                        id: TraceId(Uuid::from_u128(10)),
                        layer: "top_cu".into(),
                        width: Length::from_um(200),
                        start: TraceAnchor::pad(R1, PAD),
                        end: TraceAnchor::junction(j.id),
                    },
                    start_position: Point::new(-50, 0),
                    end_position: j.position,
                }],
                labels: vec![],
            }],
            planes: vec![],
            polygons: vec![],
            holes: vec![Hole {
                id: HoleId(Uuid::from_u128(30)),
                position: Point::new(5, 5),
                diameter: Length::from_um(1000),
            }],
            stroke_texts: vec![],
        }
    }

    #[test]
    fn paste_registers_library_and_net_signal() {
        let mut board = target();
        let mut ids = SequentialIds::default();
        let offset = Point::new(1000, 0);

        let (outcome, report) =
            paste_board_items(&mut board, &mut ids, &clipboard(), offset, &EditConfig::default())
                .unwrap();

        assert!(!outcome.is_noop());
        assert_eq!(report.pasted_devices, vec![R1]);
        assert!(report.placeholders.is_empty());
        assert_eq!(board.device(R1).unwrap().position, Point::new(1000, 0));
        assert!(board.library_device(LIB_DEVICE).is_some());
        assert_eq!(board.net_signal("SIG").unwrap().net_class, "default");

        let segment = board.net_segment(report.created_segments[0]).unwrap();
        let trace = segment.traces.values().next().unwrap();
        assert_ne!(trace.id, TraceId(Uuid::from_u128(10)));
        assert_eq!(trace.start, TraceAnchor::pad(R1, PAD));
        let junction = segment.junctions.values().next().unwrap();
        assert_eq!(junction.position, Point::new(1100, 0));
        assert_ne!(junction.id, NodeId(Uuid::from_u128(1)));

        let hole = board.holes().next().unwrap();
        assert_eq!(hole.position, Point::new(1005, 5));
        assert_ne!(hole.id, HoleId(Uuid::from_u128(30)));
    }

    #[test]
    fn occupied_component_slot_yields_placeholder() {
        let mut board = target();
        let mut ids = SequentialIds::default();
        let config = EditConfig::default();
        paste_board_items(&mut board, &mut ids, &clipboard(), Point::ORIGIN, &config).unwrap();

        let offset = Point::new(0, 500);
        let (_, report) =
            paste_board_items(&mut board, &mut ids, &clipboard(), offset, &config).unwrap();

        assert_eq!(report.skipped_devices, vec![R1]);
        assert_eq!(report.placeholders.len(), 1);
        let segment = board.net_segment(report.created_segments[0]).unwrap();
        let placeholder = &segment.junctions[&report.placeholders[0]];
        assert_eq!(placeholder.position, Point::new(-50, 500));
        assert!(board.check_invariants().is_ok());
    }

    #[test]
    fn unknown_layer_rolls_back_paste() {
        let mut board = target();
        let mut ids = SequentialIds::default();
        let snapshot = board.clone();
        let mut data = clipboard();
        data.segments[0].traces[0].trace.layer = "inner7".into();

        let config = EditConfig::default();
        let err =
            paste_board_items(&mut board, &mut ids, &data, Point::ORIGIN, &config).unwrap_err();
        assert_eq!(
            err,
            EditError::MissingLayer {
                name: "inner7".into()
            }
        );
        assert_eq!(board, snapshot);
    }

    #[test]
    fn missing_library_element_is_reported() {
        let mut board = target();
        let mut ids = SequentialIds::default();
        let mut data = clipboard();
        data.library_packages.clear();

        let config = EditConfig::default();
        let err =
            paste_board_items(&mut board, &mut ids, &data, Point::ORIGIN, &config).unwrap_err();
        assert!(matches!(err, EditError::MissingLibraryElement { .. }));
        assert!(board.library_device_ids().is_empty());
    }

    fn ground_plane() -> Plane {
        Plane {
            id: PlaneId(Uuid::from_u128(80)),
            layer: "top_cu".into(),
            net_name: "GND".into(),
            outline: vec![Point::new(0, 0), Point::new(400, 0), Point::new(400, 400)],
            min_width: Length::from_um(200),
            min_clearance: Length::from_um(300),
            keep_orphans: false,
            priority: 1,
            connect_style: ConnectStyle::ThermalRelief,
        }
    }

    #[test]
    fn pasted_plane_creates_its_net_signal() {
        let mut board = target();
        let mut ids = SequentialIds::default();
        let data = ClipboardData {
            reference: Point::ORIGIN,
            devices: vec![],
            library_devices: vec![],
            library_packages: vec![],
            segments: vec![],
            planes: vec![ground_plane()],
            polygons: vec![],
            holes: vec![],
            stroke_texts: vec![],
        };

        let offset = Point::new(10, 20);
        let config = EditConfig::default();
        let (outcome, _) =
            paste_board_items(&mut board, &mut ids, &data, offset, &config).unwrap();
        let edit = outcome.into_edit().unwrap();

        assert_eq!(board.net_signal("GND").unwrap().net_class, "default");
        let plane = board.planes().next().unwrap();
        assert_ne!(plane.id, PlaneId(Uuid::from_u128(80)));
        assert_eq!(plane.net_name, "GND");
        assert_eq!(plane.outline[1], Point::new(410, 20));
        assert_eq!(plane.connect_style, ConnectStyle::ThermalRelief);

        edit.undo(&mut board).unwrap();
        assert!(board.net_signal("GND").is_none());
        assert_eq!(board.planes().count(), 0);
    }

    #[test]
    fn rotated_device_keeps_its_placement() {
        let mut board = target();
        let mut ids = SequentialIds::default();
        let mut data = clipboard();
        data.devices[0].rotation = Angle::from_deg(180);
        data.devices[0].mirrored = true;

        let config = EditConfig::default();
        paste_board_items(&mut board, &mut ids, &data, Point::new(1000, 0), &config).unwrap();
        let device = board.device(R1).unwrap();
        assert_eq!(device.rotation, Angle::from_deg(180));
        assert!(device.mirrored);
        // pad (-50, 0) mirrored to (50, 0), turned to (-50, 0)
        let pad = TraceAnchor::pad(R1, PAD);
        assert_eq!(board.anchor_position(&pad), Some(Point::new(950, 0)));
    }

    #[test]
    fn out_of_range_offset_is_rejected_before_any_change() {
        let mut board = target();
        let mut ids = SequentialIds::default();
        let snapshot = board.clone();
        let mut data = clipboard();
        data.planes.push(ground_plane());

        let offset = Point::new(i64::MAX, 0);
        let err = paste_board_items(&mut board, &mut ids, &data, offset, &EditConfig::default())
            .unwrap_err();
        assert_eq!(
            err,
            EditError::CoordinateOverflow {
                position: Point::new(100, 0),
                offset,
            }
        );
        assert!(!err.is_bug());
        assert_eq!(board, snapshot);
    }
}
