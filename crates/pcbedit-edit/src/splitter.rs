//! Connectivity splitting of net items.
//!
//! [`NetSegmentSplitter`] takes an unordered set of junctions, vias, traces
//! and labels and partitions it into maximal connected [`SplitSegment`]s.
//!
//! Steps:
//! 1. Missing anchors: every trace endpoint whose via is not part of the
//!    input, or whose pad belongs to a device not available to the output,
//!    is replaced by a placeholder junction at that endpoint's position.
//!    One placeholder is created per missing anchor, so traces that met at
//!    a missing via still meet at its placeholder.
//! 2. Components: a union-find over the anchor set, merging the two
//!    anchors of each trace. A pad anchor connects traces like any other
//!    anchor.
//! 3. Labels: every label joins the segment owning the nearest anchor;
//!    equal distances resolve to the segment with the lower index.
//!
//! Segments are ordered by the first appearance of one of their anchors in
//! input order (junctions, then vias, then pads in trace order), so the
//! same input always produces the same output.

use std::collections::HashSet;

use indexmap::IndexMap;
use petgraph::unionfind::UnionFind;
use tracing::debug;

use pcbedit_core::{
    AnchoredTrace, ComponentId, IdGenerator, Junction, NetLabel, NetLabelId, NodeId, Point,
    TraceAnchor, TraceId, Via, ViaId,
};

use crate::anchor::PlaceholderTable;
use crate::error::EditError;

/// One maximal connected group of net items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitSegment {
    pub junctions: Vec<Junction>,
    pub vias: Vec<Via>,
    pub traces: Vec<AnchoredTrace>,
    pub labels: Vec<NetLabel>,
    /// Junctions of this segment that are placeholders for missing anchors.
    pub placeholders: Vec<NodeId>,
}

impl SplitSegment {
    fn empty() -> Self {
        SplitSegment {
            junctions: Vec::new(),
            vias: Vec::new(),
            traces: Vec::new(),
            labels: Vec::new(),
            placeholders: Vec::new(),
        }
    }

    /// Verifies that every junction and via anchor of every trace is part
    /// of this segment.
    pub fn check_closure(&self) -> Result<(), EditError> {
        for anchored in &self.traces {
            for anchor in anchored.trace.anchors() {
                let present = match anchor {
                    TraceAnchor::Junction { id } => self.junctions.iter().any(|j| j.id == id),
                    TraceAnchor::Via { id } => self.vias.iter().any(|v| v.id == id),
                    TraceAnchor::Pad { .. } => true,
                };
                if !present {
                    return Err(EditError::StructuralInvariantViolation {
                        reason: format!(
                            "trace {} references {} outside its split segment",
                            anchored.id(),
                            anchor
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Partitions net items into maximal connected segments.
#[derive(Debug, Clone, Default)]
pub struct NetSegmentSplitter {
    junctions: IndexMap<NodeId, Junction>,
    vias: IndexMap<ViaId, Via>,
    traces: IndexMap<TraceId, AnchoredTrace>,
    labels: IndexMap<NetLabelId, NetLabel>,
    devices: HashSet<ComponentId>,
}

impl NetSegmentSplitter {
    pub fn new() -> Self {
        NetSegmentSplitter::default()
    }

    pub fn add_junction(&mut self, junction: Junction) {
        self.junctions.insert(junction.id, junction);
    }

    pub fn add_via(&mut self, via: Via) {
        self.vias.insert(via.id, via);
    }

    pub fn add_trace(&mut self, trace: AnchoredTrace) {
        self.traces.insert(trace.id(), trace);
    }

    pub fn add_label(&mut self, label: NetLabel) {
        self.labels.insert(label.id, label);
    }

    /// Keeps pads of `component` as anchors instead of replacing them.
    pub fn add_device(&mut self, component: ComponentId) {
        self.devices.insert(component);
    }

    /// Replaces every missing via or pad anchor by a placeholder junction.
    ///
    /// Fails if a trace references a junction that is not part of the input.
    fn insert_missing_anchors<I: IdGenerator>(
        &mut self,
        ids: &mut I,
    ) -> Result<HashSet<NodeId>, EditError> {
        let mut table = PlaceholderTable::new();
        for anchored in self.traces.values_mut() {
            let endpoints = [
                (anchored.trace.start, anchored.start_position),
                (anchored.trace.end, anchored.end_position),
            ];
            for (index, (anchor, position)) in endpoints.into_iter().enumerate() {
                let present = match anchor {
                    TraceAnchor::Junction { id } => {
                        if !self.junctions.contains_key(&id) {
                            return Err(EditError::UnresolvedAnchor {
                                trace: anchored.trace.id,
                                anchor,
                            });
                        }
                        true
                    }
                    TraceAnchor::Via { id } => self.vias.contains_key(&id),
                    TraceAnchor::Pad { component, .. } => self.devices.contains(&component),
                };
                if present {
                    continue;
                }
                let (junction, _) = table.get_or_create(anchor, position, ids);
                let replacement = TraceAnchor::junction(junction.id);
                if index == 0 {
                    anchored.trace.start = replacement;
                } else {
                    anchored.trace.end = replacement;
                }
            }
        }

        let mut placeholders = HashSet::new();
        for (_, junction) in table.iter() {
            placeholders.insert(junction.id);
            self.junctions.insert(junction.id, junction.clone());
        }
        Ok(placeholders)
    }

    /// Computes the partition. Consumes the splitter.
    pub fn split<I: IdGenerator>(mut self, ids: &mut I) -> Result<Vec<SplitSegment>, EditError> {
        let placeholders = self.insert_missing_anchors(ids)?;

        // Anchor index: junctions, vias, then pads in trace order.
        let mut anchors: IndexMap<TraceAnchor, Point> = IndexMap::new();
        for junction in self.junctions.values() {
            anchors.insert(TraceAnchor::junction(junction.id), junction.position);
        }
        for via in self.vias.values() {
            anchors.insert(TraceAnchor::via(via.id), via.position);
        }
        for anchored in self.traces.values() {
            for anchor in anchored.trace.anchors() {
                if !anchor.is_segment_local() && !anchors.contains_key(&anchor) {
                    let position = anchored.position_of(&anchor).unwrap_or(Point::ORIGIN);
                    anchors.insert(anchor, position);
                }
            }
        }

        let mut components = UnionFind::<usize>::new(anchors.len());
        for anchored in self.traces.values() {
            let (Some(a), Some(b)) = (
                anchors.get_index_of(&anchored.trace.start),
                anchors.get_index_of(&anchored.trace.end),
            ) else {
                return Err(EditError::StructuralInvariantViolation {
                    reason: format!("trace {} lost an anchor while splitting", anchored.id()),
                });
            };
            components.union(a, b);
        }

        // Number segments by first appearance of their root.
        let mut segment_of_root: IndexMap<usize, usize> = IndexMap::new();
        let mut segment_of_anchor = Vec::with_capacity(anchors.len());
        for index in 0..anchors.len() {
            let root = components.find(index);
            let next = segment_of_root.len();
            let segment = *segment_of_root.entry(root).or_insert(next);
            segment_of_anchor.push(segment);
        }

        let mut segments = vec![SplitSegment::empty(); segment_of_root.len()];
        for (index, junction) in self.junctions.values().enumerate() {
            let segment = &mut segments[segment_of_anchor[index]];
            if placeholders.contains(&junction.id) {
                segment.placeholders.push(junction.id);
            }
            segment.junctions.push(junction.clone());
        }
        let via_base = self.junctions.len();
        for (offset, via) in self.vias.values().enumerate() {
            segments[segment_of_anchor[via_base + offset]]
                .vias
                .push(via.clone());
        }
        for anchored in self.traces.values() {
            if let Some(index) = anchors.get_index_of(&anchored.trace.start) {
                segments[segment_of_anchor[index]].traces.push(anchored.clone());
            }
        }

        if !segments.is_empty() {
            for label in self.labels.values() {
                let segment = nearest_segment(&anchors, &segment_of_anchor, label.position);
                segments[segment].labels.push(label.clone());
            }
        } else if !self.labels.is_empty() {
            debug!(labels = self.labels.len(), "no segment left, labels dropped");
        }

        debug!(
            segments = segments.len(),
            placeholders = placeholders.len(),
            "net items split"
        );
        Ok(segments)
    }
}

/// Index of the segment owning the anchor nearest to `position`.
///
/// Ties resolve to the lowest segment index.
fn nearest_segment(
    anchors: &IndexMap<TraceAnchor, Point>,
    segment_of_anchor: &[usize],
    position: Point,
) -> usize {
    let mut best: Option<(f64, usize)> = None;
    for (index, anchor_position) in anchors.values().enumerate() {
        let distance = position.distance_to(*anchor_position);
        let segment = segment_of_anchor[index];
        let better = match best {
            None => true,
            Some((d, s)) => distance < d || (distance == d && segment < s),
        };
        if better {
            best = Some((distance, segment));
        }
    }
    best.map(|(_, segment)| segment).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcbedit_core::{Length, PadId, SequentialIds, Trace, ViaShape};
    use uuid::Uuid;

    fn junction(n: u128, x: i64) -> Junction {
        Junction::new(NodeId(Uuid::from_u128(n)), Point::new(x, 0))
    }

    fn trace(n: u128, start: TraceAnchor, a: Point, end: TraceAnchor, b: Point) -> AnchoredTrace {
        AnchoredTrace {
            trace: Trace {
                id: TraceId(Uuid::from_u128(n)),
                layer: "top_cu".into(),
                width: Length::from_um(200),
                start,
                end,
            },
            start_position: a,
            end_position: b,
        }
    }

    fn link(n: u128, a: &Junction, b: &Junction) -> AnchoredTrace {
        trace(
            n,
            TraceAnchor::junction(a.id),
            a.position,
            TraceAnchor::junction(b.id),
            b.position,
        )
    }

    #[test]
    fn isolated_junction_forms_own_segment() {
        let (n1, n3, n4) = (junction(1, 0), junction(3, 20), junction(4, 30));
        let mut splitter = NetSegmentSplitter::new();
        splitter.add_junction(n1.clone());
        splitter.add_junction(n3.clone());
        splitter.add_junction(n4.clone());
        splitter.add_trace(link(34, &n3, &n4));

        let segments = splitter.split(&mut SequentialIds::default()).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].junctions, vec![n1]);
        assert!(segments[0].traces.is_empty());
        assert_eq!(segments[1].junctions, vec![n3, n4]);
        assert_eq!(segments[1].traces.len(), 1);
    }

    #[test]
    fn missing_via_becomes_shared_placeholder() {
        let (a, b) = (junction(1, 0), junction(2, 20));
        let via = TraceAnchor::via(ViaId(Uuid::from_u128(50)));
        let at = Point::new(10, 0);
        let mut splitter = NetSegmentSplitter::new();
        splitter.add_junction(a.clone());
        splitter.add_junction(b.clone());
        splitter.add_trace(trace(10, TraceAnchor::junction(a.id), a.position, via, at));
        splitter.add_trace(trace(11, via, at, TraceAnchor::junction(b.id), b.position));

        let segments = splitter.split(&mut SequentialIds::starting_at(500)).unwrap();
        assert_eq!(segments.len(), 1);
        let segment = &segments[0];
        assert_eq!(segment.placeholders.len(), 1);
        let placeholder = segment
            .junctions
            .iter()
            .find(|j| j.id == segment.placeholders[0])
            .unwrap();
        assert_eq!(placeholder.position, at);
        assert!(segment.check_closure().is_ok());
    }

    #[test]
    fn pads_connect_traces_when_device_available() {
        let component = ComponentId(Uuid::from_u128(7));
        let pad = TraceAnchor::pad(component, PadId(Uuid::from_u128(8)));
        let at = Point::new(5, 5);
        let (a, b) = (junction(1, 0), junction(2, 10));

        let build = |with_device: bool| {
            let mut splitter = NetSegmentSplitter::new();
            splitter.add_junction(a.clone());
            splitter.add_junction(b.clone());
            splitter.add_trace(trace(10, TraceAnchor::junction(a.id), a.position, pad, at));
            splitter.add_trace(trace(11, pad, at, TraceAnchor::junction(b.id), b.position));
            if with_device {
                splitter.add_device(component);
            }
            splitter.split(&mut SequentialIds::default()).unwrap()
        };

        let kept = build(true);
        assert_eq!(kept.len(), 1);
        assert!(kept[0].placeholders.is_empty());
        assert_eq!(kept[0].traces[0].trace.end, pad);

        let replaced = build(false);
        assert_eq!(replaced.len(), 1);
        assert_eq!(replaced[0].placeholders.len(), 1);
    }

    #[test]
    fn unknown_junction_is_rejected() {
        let a = junction(1, 0);
        let ghost = junction(2, 10);
        let mut splitter = NetSegmentSplitter::new();
        splitter.add_junction(a.clone());
        splitter.add_trace(link(10, &a, &ghost));
        let err = splitter.split(&mut SequentialIds::default()).unwrap_err();
        assert!(matches!(err, EditError::UnresolvedAnchor { .. }));
    }

    #[test]
    fn labels_go_to_nearest_segment_lowest_index_on_tie() {
        let (left, right) = (junction(1, 0), junction(2, 100));
        let mut splitter = NetSegmentSplitter::new();
        splitter.add_junction(left);
        splitter.add_junction(right);
        splitter.add_via(Via {
            id: ViaId(Uuid::from_u128(3)),
            position: Point::new(200, 0),
            shape: ViaShape::Round,
            size: Length::from_um(600),
            drill: Length::from_um(300),
        });
        let label = |n: u128, x: i64| NetLabel {
            id: NetLabelId(Uuid::from_u128(n)),
            position: Point::new(x, 10),
        };
        splitter.add_label(label(90, 90));
        splitter.add_label(label(91, 50));

        let segments = splitter.split(&mut SequentialIds::default()).unwrap();
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[1].labels.len(), 1);
        assert_eq!(segments[1].labels[0].id, NetLabelId(Uuid::from_u128(90)));
        assert_eq!(segments[0].labels[0].id, NetLabelId(Uuid::from_u128(91)));
        assert!(segments[2].labels.is_empty());
    }
}
