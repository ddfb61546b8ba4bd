//! Circuit, project library and board-level items other than nets.

use serde::{Deserialize, Serialize};

use crate::geometry::{Angle, Length, Point};
use crate::id::{
    ComponentId, HoleId, LibDeviceId, PackageId, PadId, PlaneId, PolygonId, StrokeTextId,
};

// ---------------------------------------------------------------------------
// Circuit
// ---------------------------------------------------------------------------

/// A logical component of the circuit. At most one device on the board
/// realizes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentInstance {
    pub id: ComponentId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetClass {
    pub name: String,
}

/// A named electrical net. Net segments reference it by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetSignal {
    pub name: String,
    pub net_class: String,
}

// ---------------------------------------------------------------------------
// Project library
// ---------------------------------------------------------------------------

/// A pad of a package footprint, relative to the device origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PadDef {
    pub id: PadId,
    pub offset: Point,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibPackage {
    pub id: PackageId,
    pub name: String,
    pub pads: Vec<PadDef>,
}

impl LibPackage {
    pub fn pad(&self, id: PadId) -> Option<&PadDef> {
        self.pads.iter().find(|p| p.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibDevice {
    pub id: LibDeviceId,
    pub name: String,
    pub package: PackageId,
}

// ---------------------------------------------------------------------------
// Board items
// ---------------------------------------------------------------------------

/// A placed device realizing one circuit component.
///
/// Footprint coordinates are mirrored first (bottom side), then rotated,
/// then moved to `position`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub component: ComponentId,
    pub lib_device: LibDeviceId,
    pub position: Point,
    #[serde(default)]
    pub rotation: Angle,
    #[serde(default)]
    pub mirrored: bool,
}

impl Device {
    /// An unrotated, top-side placement.
    pub fn new(component: ComponentId, lib_device: LibDeviceId, position: Point) -> Self {
        Device {
            component,
            lib_device,
            position,
            rotation: Angle::ZERO,
            mirrored: false,
        }
    }

    /// Board position of a footprint point such as a pad offset.
    pub fn map_to_board(&self, local: Point) -> Point {
        let local = if self.mirrored { local.mirrored() } else { local };
        self.position + local.rotated(self.rotation)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layer {
    pub name: String,
}

impl Layer {
    pub fn new(name: impl Into<String>) -> Self {
        Layer { name: name.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Polygon {
    pub id: PolygonId,
    pub layer: String,
    pub width: Length,
    pub filled: bool,
    pub path: Vec<Point>,
}

impl Polygon {
    pub fn copied(&self, id: PolygonId, offset: Point) -> Polygon {
        Polygon {
            id,
            path: self.path.iter().map(|p| p.translated(offset)).collect(),
            ..self.clone()
        }
    }
}

/// How a plane attaches to pads of its own net.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectStyle {
    None,
    ThermalRelief,
    #[default]
    Solid,
}

/// A copper fill bound to a net signal. Only the outline is stored; the
/// filled area is derived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plane {
    pub id: PlaneId,
    pub layer: String,
    pub net_name: String,
    pub outline: Vec<Point>,
    pub min_width: Length,
    pub min_clearance: Length,
    #[serde(default)]
    pub keep_orphans: bool,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub connect_style: ConnectStyle,
}

impl Plane {
    pub fn copied(&self, id: PlaneId, offset: Point) -> Plane {
        Plane {
            id,
            outline: self.outline.iter().map(|p| p.translated(offset)).collect(),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hole {
    pub id: HoleId,
    pub position: Point,
    pub diameter: Length,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrokeText {
    pub id: StrokeTextId,
    pub layer: String,
    pub text: String,
    pub position: Point,
    pub height: Length,
}
