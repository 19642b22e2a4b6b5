//! Closed event vocabulary
//!
//! Every event is a variant of [`Event`]; the variant name doubles as the
//! topic. Serialized form is `{"topic": "selection-changed", "payload": {...}}`
//! and every payload carries the `source` of the view that produced it.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::filter::{FilterState, NumericRange};
use crate::ids::{Point, SelectionId, SelectionType, SourceId};
use crate::selection::ClearScope;

/// Topics understood by the event bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Topic {
    SelectionChanged,
    SelectionCleared,
    HoverStart,
    HoverEnd,
    FilterChanged,
    FilterReset,
    BrushPreview,
    ViewDestroyed,
}

impl Topic {
    pub const ALL: [Topic; 8] = [
        Topic::SelectionChanged,
        Topic::SelectionCleared,
        Topic::HoverStart,
        Topic::HoverEnd,
        Topic::FilterChanged,
        Topic::FilterReset,
        Topic::BrushPreview,
        Topic::ViewDestroyed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::SelectionChanged => "selection-changed",
            Topic::SelectionCleared => "selection-cleared",
            Topic::HoverStart => "hover-start",
            Topic::HoverEnd => "hover-end",
            Topic::FilterChanged => "filter-changed",
            Topic::FilterReset => "filter-reset",
            Topic::BrushPreview => "brush-preview",
            Topic::ViewDestroyed => "view-destroyed",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A selection type's full id list after a mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionChanged {
    #[serde(rename = "type")]
    pub selection_type: SelectionType,
    pub ids: Vec<SelectionId>,
    pub source: SourceId,
}

/// One selection type, or all of them, was emptied
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionCleared {
    #[serde(rename = "type")]
    pub scope: ClearScope,
    pub source: SourceId,
}

/// Pointer entered or left a data element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hover {
    pub id: SelectionId,
    #[serde(rename = "type")]
    pub selection_type: SelectionType,
    pub source: SourceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Point>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterChanged {
    pub filters: FilterState,
    pub source: SourceId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterReset {
    pub source: SourceId,
}

/// Axis along which a one-dimensional brush extends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
}

/// Region covered by a brush gesture, in the brushing view's data space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum BrushBounds {
    Rect { x: NumericRange, y: NumericRange },
    Interval { axis: Axis, range: NumericRange },
}

impl BrushBounds {
    /// Rectangle spanned by two corners, in any order
    pub fn from_corners(a: Point, b: Point) -> Self {
        BrushBounds::Rect {
            x: NumericRange::new(a.x, b.x),
            y: NumericRange::new(a.y, b.y),
        }
    }

    pub fn contains(&self, point: Point) -> bool {
        match self {
            BrushBounds::Rect { x, y } => x.contains(point.x) && y.contains(point.y),
            BrushBounds::Interval { axis: Axis::X, range } => range.contains(point.x),
            BrushBounds::Interval { axis: Axis::Y, range } => range.contains(point.y),
        }
    }
}

/// Non-committing highlight emitted while a brush is being dragged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrushPreview {
    pub bounds: BrushBounds,
    pub ids: Vec<SelectionId>,
    pub source: SourceId,
    pub preview: bool,
}

impl BrushPreview {
    pub fn new(bounds: BrushBounds, ids: Vec<SelectionId>, source: SourceId) -> Self {
        Self {
            bounds,
            ids,
            source,
            preview: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewDestroyed {
    pub source: SourceId,
}

/// Every event that can travel on the bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "topic", content = "payload", rename_all = "kebab-case")]
pub enum Event {
    SelectionChanged(SelectionChanged),
    SelectionCleared(SelectionCleared),
    HoverStart(Hover),
    HoverEnd(Hover),
    FilterChanged(FilterChanged),
    FilterReset(FilterReset),
    BrushPreview(BrushPreview),
    ViewDestroyed(ViewDestroyed),
}

impl Event {
    pub fn topic(&self) -> Topic {
        match self {
            Event::SelectionChanged(_) => Topic::SelectionChanged,
            Event::SelectionCleared(_) => Topic::SelectionCleared,
            Event::HoverStart(_) => Topic::HoverStart,
            Event::HoverEnd(_) => Topic::HoverEnd,
            Event::FilterChanged(_) => Topic::FilterChanged,
            Event::FilterReset(_) => Topic::FilterReset,
            Event::BrushPreview(_) => Topic::BrushPreview,
            Event::ViewDestroyed(_) => Topic::ViewDestroyed,
        }
    }

    /// Originator of the event
    pub fn source(&self) -> &SourceId {
        match self {
            Event::SelectionChanged(e) => &e.source,
            Event::SelectionCleared(e) => &e.source,
            Event::HoverStart(e) | Event::HoverEnd(e) => &e.source,
            Event::FilterChanged(e) => &e.source,
            Event::FilterReset(e) => &e.source,
            Event::BrushPreview(e) => &e.source,
            Event::ViewDestroyed(e) => &e.source,
        }
    }

    /// Whether `view` produced this event. Subscribers return early on their own echoes.
    pub fn is_from(&self, view: &SourceId) -> bool {
        self.source() == view
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_is_serde_tag() {
        let event = Event::SelectionChanged(SelectionChanged {
            selection_type: "sample".into(),
            ids: vec!["s1".into(), "s2".into()],
            source: "A".into(),
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["topic"], "selection-changed");
        assert_eq!(json["payload"]["type"], "sample");
        assert_eq!(json["payload"]["source"], "A");

        let back: Event = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_topic_strings_match_serde_names() {
        for topic in Topic::ALL {
            let json = serde_json::to_value(topic).unwrap();
            assert_eq!(json, topic.as_str());
        }
    }

    #[test]
    fn test_brush_preview_always_marked_preview() {
        let preview = BrushPreview::new(
            BrushBounds::from_corners(Point::new(1.0, 1.0), Point::new(0.0, 0.0)),
            vec![],
            "plot".into(),
        );
        assert!(preview.preview);
        assert!(preview.bounds.contains(Point::new(0.5, 0.5)));
        assert!(!preview.bounds.contains(Point::new(1.5, 0.5)));
    }

    #[test]
    fn test_cleared_all_serializes_as_all() {
        let event = Event::SelectionCleared(SelectionCleared {
            scope: ClearScope::All,
            source: "table".into(),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["payload"]["type"], "all");
    }
}
