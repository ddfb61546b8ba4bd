//! Sub-edit requests and reversible edit records.
//!
//! A [`Mutation`] is what a caller asks for: removals only name the item.
//! Applying it with [`apply_mutation`] yields an [`EditCommand`], the fully
//! captured record of what happened. Records can be replayed with
//! [`apply_command`] and undone by applying their [`EditCommand::inverse`].

use serde::{Deserialize, Serialize};

use pcbedit_core::{
    BoardDocument, ComponentId, CoreError, Device, Hole, HoleId, Junction, LibDevice, LibDeviceId,
    LibPackage, NetClass, NetLabel, NetLabelId, NetSegment, NetSegmentId, NetSignal, NodeId,
    PackageId, Plane, PlaneId, Polygon, PolygonId, StrokeText, StrokeTextId, Trace, TraceId, Via,
    ViaId,
};

/// A single requested document edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Mutation {
    InsertNetSegment { segment: NetSegment },
    RemoveNetSegment { id: NetSegmentId },
    InsertJunction { segment: NetSegmentId, junction: Junction },
    RemoveJunction { id: NodeId },
    InsertVia { segment: NetSegmentId, via: Via },
    RemoveVia { id: ViaId },
    InsertTrace { segment: NetSegmentId, trace: Trace },
    RemoveTrace { id: TraceId },
    InsertNetLabel { segment: NetSegmentId, label: NetLabel },
    RemoveNetLabel { id: NetLabelId },
    InsertDevice { device: Device },
    RemoveDevice { component: ComponentId },
    InsertPolygon { polygon: Polygon },
    RemovePolygon { id: PolygonId },
    InsertHole { hole: Hole },
    RemoveHole { id: HoleId },
    InsertStrokeText { text: StrokeText },
    RemoveStrokeText { id: StrokeTextId },
    InsertPlane { plane: Plane },
    RemovePlane { id: PlaneId },
    InsertNetClass { class: NetClass },
    RemoveNetClass { name: String },
    InsertNetSignal { signal: NetSignal },
    RemoveNetSignal { name: String },
    InsertLibraryDevice { device: LibDevice },
    RemoveLibraryDevice { id: LibDeviceId },
    InsertLibraryPackage { package: LibPackage },
    RemoveLibraryPackage { id: PackageId },
}

/// A reversible, applied document edit.
///
/// Every variant captures enough to re-apply the edit and to compute its
/// inverse: removals carry the removed value (and its owning segment).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EditCommand {
    InsertNetSegment { segment: NetSegment },
    RemoveNetSegment { segment: NetSegment },
    InsertJunction { segment: NetSegmentId, junction: Junction },
    RemoveJunction { segment: NetSegmentId, junction: Junction },
    InsertVia { segment: NetSegmentId, via: Via },
    RemoveVia { segment: NetSegmentId, via: Via },
    InsertTrace { segment: NetSegmentId, trace: Trace },
    RemoveTrace { segment: NetSegmentId, trace: Trace },
    InsertNetLabel { segment: NetSegmentId, label: NetLabel },
    RemoveNetLabel { segment: NetSegmentId, label: NetLabel },
    InsertDevice { device: Device },
    RemoveDevice { device: Device },
    InsertPolygon { polygon: Polygon },
    RemovePolygon { polygon: Polygon },
    InsertHole { hole: Hole },
    RemoveHole { hole: Hole },
    InsertStrokeText { text: StrokeText },
    RemoveStrokeText { text: StrokeText },
    InsertPlane { plane: Plane },
    RemovePlane { plane: Plane },
    InsertNetClass { class: NetClass },
    RemoveNetClass { class: NetClass },
    InsertNetSignal { signal: NetSignal },
    RemoveNetSignal { signal: NetSignal },
    InsertLibraryDevice { device: LibDevice },
    RemoveLibraryDevice { device: LibDevice },
    InsertLibraryPackage { package: LibPackage },
    RemoveLibraryPackage { package: LibPackage },
    /// A nested group of commands applied atomically (all-or-nothing).
    Group {
        description: String,
        commands: Vec<EditCommand>,
    },
}

impl EditCommand {
    /// Returns the command that undoes this one.
    ///
    /// For groups, the children are reversed and each is inverted, so a
    /// group is undone in LIFO order.
    pub fn inverse(&self) -> EditCommand {
        use EditCommand::*;
        match self.clone() {
            InsertNetSegment { segment } => RemoveNetSegment { segment },
            RemoveNetSegment { segment } => InsertNetSegment { segment },
            InsertJunction { segment, junction } => RemoveJunction { segment, junction },
            RemoveJunction { segment, junction } => InsertJunction { segment, junction },
            InsertVia { segment, via } => RemoveVia { segment, via },
            RemoveVia { segment, via } => InsertVia { segment, via },
            InsertTrace { segment, trace } => RemoveTrace { segment, trace },
            RemoveTrace { segment, trace } => InsertTrace { segment, trace },
            InsertNetLabel { segment, label } => RemoveNetLabel { segment, label },
            RemoveNetLabel { segment, label } => InsertNetLabel { segment, label },
            InsertDevice { device } => RemoveDevice { device },
            RemoveDevice { device } => InsertDevice { device },
            InsertPolygon { polygon } => RemovePolygon { polygon },
            RemovePolygon { polygon } => InsertPolygon { polygon },
            InsertHole { hole } => RemoveHole { hole },
            RemoveHole { hole } => InsertHole { hole },
            InsertStrokeText { text } => RemoveStrokeText { text },
            RemoveStrokeText { text } => InsertStrokeText { text },
            InsertPlane { plane } => RemovePlane { plane },
            RemovePlane { plane } => InsertPlane { plane },
            InsertNetClass { class } => RemoveNetClass { class },
            RemoveNetClass { class } => InsertNetClass { class },
            InsertNetSignal { signal } => RemoveNetSignal { signal },
            RemoveNetSignal { signal } => InsertNetSignal { signal },
            InsertLibraryDevice { device } => RemoveLibraryDevice { device },
            RemoveLibraryDevice { device } => InsertLibraryDevice { device },
            InsertLibraryPackage { package } => RemoveLibraryPackage { package },
            RemoveLibraryPackage { package } => InsertLibraryPackage { package },
            Group {
                description,
                commands,
            } => Group {
                description: format!("undo {}", description),
                commands: commands.iter().rev().map(EditCommand::inverse).collect(),
            },
        }
    }

    /// Number of primitive edits in this command, counting through groups.
    pub fn primitive_count(&self) -> usize {
        match self {
            EditCommand::Group { commands, .. } => {
                commands.iter().map(EditCommand::primitive_count).sum()
            }
            _ => 1,
        }
    }
}

/// Applies a mutation and returns the record of what was done.
pub fn apply_mutation<D>(doc: &mut D, mutation: Mutation) -> Result<EditCommand, CoreError>
where
    D: BoardDocument + ?Sized,
{
    let command = match mutation {
        Mutation::InsertNetSegment { segment } => {
            doc.insert_net_segment(segment.clone())?;
            EditCommand::InsertNetSegment { segment }
        }
        Mutation::RemoveNetSegment { id } => EditCommand::RemoveNetSegment {
            segment: doc.remove_net_segment(id)?,
        },
        Mutation::InsertJunction { segment, junction } => {
            doc.insert_junction(segment, junction.clone())?;
            EditCommand::InsertJunction { segment, junction }
        }
        Mutation::RemoveJunction { id } => {
            let (segment, junction) = doc.remove_junction(id)?;
            EditCommand::RemoveJunction { segment, junction }
        }
        Mutation::InsertVia { segment, via } => {
            doc.insert_via(segment, via.clone())?;
            EditCommand::InsertVia { segment, via }
        }
        Mutation::RemoveVia { id } => {
            let (segment, via) = doc.remove_via(id)?;
            EditCommand::RemoveVia { segment, via }
        }
        Mutation::InsertTrace { segment, trace } => {
            doc.insert_trace(segment, trace.clone())?;
            EditCommand::InsertTrace { segment, trace }
        }
        Mutation::RemoveTrace { id } => {
            let (segment, trace) = doc.remove_trace(id)?;
            EditCommand::RemoveTrace { segment, trace }
        }
        Mutation::InsertNetLabel { segment, label } => {
            doc.insert_net_label(segment, label.clone())?;
            EditCommand::InsertNetLabel { segment, label }
        }
        Mutation::RemoveNetLabel { id } => {
            let (segment, label) = doc.remove_net_label(id)?;
            EditCommand::RemoveNetLabel { segment, label }
        }
        Mutation::InsertDevice { device } => {
            doc.insert_device(device.clone())?;
            EditCommand::InsertDevice { device }
        }
        Mutation::RemoveDevice { component } => EditCommand::RemoveDevice {
            device: doc.remove_device(component)?,
        },
        Mutation::InsertPolygon { polygon } => {
            doc.insert_polygon(polygon.clone())?;
            EditCommand::InsertPolygon { polygon }
        }
        Mutation::RemovePolygon { id } => EditCommand::RemovePolygon {
            polygon: doc.remove_polygon(id)?,
        },
        Mutation::InsertHole { hole } => {
            doc.insert_hole(hole.clone())?;
            EditCommand::InsertHole { hole }
        }
        Mutation::RemoveHole { id } => EditCommand::RemoveHole {
            hole: doc.remove_hole(id)?,
        },
        Mutation::InsertStrokeText { text } => {
            doc.insert_stroke_text(text.clone())?;
            EditCommand::InsertStrokeText { text }
        }
        Mutation::RemoveStrokeText { id } => EditCommand::RemoveStrokeText {
            text: doc.remove_stroke_text(id)?,
        },
        Mutation::InsertPlane { plane } => {
            doc.insert_plane(plane.clone())?;
            EditCommand::InsertPlane { plane }
        }
        Mutation::RemovePlane { id } => EditCommand::RemovePlane {
            plane: doc.remove_plane(id)?,
        },
        Mutation::InsertNetClass { class } => {
            doc.insert_net_class(class.clone())?;
            EditCommand::InsertNetClass { class }
        }
        Mutation::RemoveNetClass { name } => EditCommand::RemoveNetClass {
            class: doc.remove_net_class(&name)?,
        },
        Mutation::InsertNetSignal { signal } => {
            doc.insert_net_signal(signal.clone())?;
            EditCommand::InsertNetSignal { signal }
        }
        Mutation::RemoveNetSignal { name } => EditCommand::RemoveNetSignal {
            signal: doc.remove_net_signal(&name)?,
        },
        Mutation::InsertLibraryDevice { device } => {
            doc.insert_library_device(device.clone())?;
            EditCommand::InsertLibraryDevice { device }
        }
        Mutation::RemoveLibraryDevice { id } => EditCommand::RemoveLibraryDevice {
            device: doc.remove_library_device(id)?,
        },
        Mutation::InsertLibraryPackage { package } => {
            doc.insert_library_package(package.clone())?;
            EditCommand::InsertLibraryPackage { package }
        }
        Mutation::RemoveLibraryPackage { id } => EditCommand::RemoveLibraryPackage {
            package: doc.remove_library_package(id)?,
        },
    };
    Ok(command)
}

/// Re-applies a recorded command.
///
/// Groups are applied atomically: if a child fails, the children applied
/// so far are undone in reverse order before the error is returned.
pub fn apply_command<D>(doc: &mut D, command: &EditCommand) -> Result<(), CoreError>
where
    D: BoardDocument + ?Sized,
{
    use EditCommand::*;
    match command {
        InsertNetSegment { segment } => doc.insert_net_segment(segment.clone()),
        RemoveNetSegment { segment } => doc.remove_net_segment(segment.id).map(drop),
        InsertJunction { segment, junction } => doc.insert_junction(*segment, junction.clone()),
        RemoveJunction { junction, .. } => doc.remove_junction(junction.id).map(drop),
        InsertVia { segment, via } => doc.insert_via(*segment, via.clone()),
        RemoveVia { via, .. } => doc.remove_via(via.id).map(drop),
        InsertTrace { segment, trace } => doc.insert_trace(*segment, trace.clone()),
        RemoveTrace { trace, .. } => doc.remove_trace(trace.id).map(drop),
        InsertNetLabel { segment, label } => doc.insert_net_label(*segment, label.clone()),
        RemoveNetLabel { label, .. } => doc.remove_net_label(label.id).map(drop),
        InsertDevice { device } => doc.insert_device(device.clone()),
        RemoveDevice { device } => doc.remove_device(device.component).map(drop),
        InsertPolygon { polygon } => doc.insert_polygon(polygon.clone()),
        RemovePolygon { polygon } => doc.remove_polygon(polygon.id).map(drop),
        InsertHole { hole } => doc.insert_hole(hole.clone()),
        RemoveHole { hole } => doc.remove_hole(hole.id).map(drop),
        InsertStrokeText { text } => doc.insert_stroke_text(text.clone()),
        RemoveStrokeText { text } => doc.remove_stroke_text(text.id).map(drop),
        InsertPlane { plane } => doc.insert_plane(plane.clone()),
        RemovePlane { plane } => doc.remove_plane(plane.id).map(drop),
        InsertNetClass { class } => doc.insert_net_class(class.clone()),
        RemoveNetClass { class } => doc.remove_net_class(&class.name).map(drop),
        InsertNetSignal { signal } => doc.insert_net_signal(signal.clone()),
        RemoveNetSignal { signal } => doc.remove_net_signal(&signal.name).map(drop),
        InsertLibraryDevice { device } => doc.insert_library_device(device.clone()),
        RemoveLibraryDevice { device } => doc.remove_library_device(device.id).map(drop),
        InsertLibraryPackage { package } => doc.insert_library_package(package.clone()),
        RemoveLibraryPackage { package } => doc.remove_library_package(package.id).map(drop),
        Group { commands, .. } => {
            for (index, child) in commands.iter().enumerate() {
                if let Err(err) = apply_command(doc, child) {
                    for done in commands[..index].iter().rev() {
                        if let Err(undo_err) = apply_command(doc, &done.inverse()) {
                            tracing::error!(%undo_err, "failed to undo partially applied group");
                        }
                    }
                    return Err(err);
                }
            }
            Ok(())
        }
    }
}
