pub mod board;
pub mod document;
pub mod error;
pub mod geometry;
pub mod id;
pub mod library;
pub mod net;

// Re-export commonly used types
pub use board::Board;
pub use document::BoardDocument;
pub use error::CoreError;
pub use geometry::{Angle, Length, Point};
pub use id::{
    ComponentId, HoleId, IdGenerator, LibDeviceId, NetLabelId, NetSegmentId, NodeId, PackageId,
    PadId, PlaneId, PolygonId, RandomIds, SequentialIds, StrokeTextId, TraceId, ViaId,
};
pub use library::{
    ComponentInstance, ConnectStyle, Device, Hole, Layer, LibDevice, LibPackage, NetClass,
    NetSignal, PadDef, Plane, Polygon, StrokeText,
};
pub use net::{AnchoredTrace, Junction, NetLabel, NetSegment, Trace, TraceAnchor, Via, ViaShape};
