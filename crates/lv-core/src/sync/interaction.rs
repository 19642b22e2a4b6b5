//! Per-view pointer interaction state machine
//!
//! ```text
//! Idle ──enter──▶ Hovering ──leave──▶ Idle
//!  │                 │
//!  └──drag start─────┴──▶ Brushing ──end / abort──▶ Idle
//! ```
//!
//! Transitions are pure: they report what happened and leave emission to
//! [`super::ViewLink`].

use crate::events::BrushBounds;
use crate::ids::{Point, SelectionId, SelectionType};

/// Element under the pointer
#[derive(Debug, Clone, PartialEq)]
pub struct HoverTarget {
    pub id: SelectionId,
    pub selection_type: SelectionType,
    pub position: Option<Point>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum InteractionState {
    #[default]
    Idle,
    Hovering(HoverTarget),
    Brushing {
        origin: Point,
        bounds: Option<BrushBounds>,
    },
}

#[derive(Debug, Clone, Default)]
pub struct Interaction {
    state: InteractionState,
}

impl Interaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &InteractionState {
        &self.state
    }

    pub fn is_brushing(&self) -> bool {
        matches!(self.state, InteractionState::Brushing { .. })
    }

    pub fn hovered(&self) -> Option<&HoverTarget> {
        match &self.state {
            InteractionState::Hovering(target) => Some(target),
            _ => None,
        }
    }

    /// Pointer entered `target`. Returns the target that was left, if the
    /// pointer moved directly from one element to another.
    ///
    /// Ignored while brushing: the target comes back as `Err` and the state
    /// is unchanged.
    pub fn enter(&mut self, target: HoverTarget) -> Result<Option<HoverTarget>, HoverTarget> {
        match std::mem::take(&mut self.state) {
            InteractionState::Idle => {
                self.state = InteractionState::Hovering(target);
                Ok(None)
            }
            InteractionState::Hovering(previous) => {
                self.state = InteractionState::Hovering(target);
                Ok(Some(previous))
            }
            brushing @ InteractionState::Brushing { .. } => {
                self.state = brushing;
                Err(target)
            }
        }
    }

    /// Pointer left the hovered element
    pub fn leave(&mut self) -> Option<HoverTarget> {
        match std::mem::take(&mut self.state) {
            InteractionState::Hovering(previous) => Some(previous),
            other => {
                self.state = other;
                None
            }
        }
    }

    /// Begin a brush. Returns the hover that the gesture ended, if any.
    /// Starting while already brushing restarts the gesture at `origin`.
    pub fn drag_start(&mut self, origin: Point) -> Option<HoverTarget> {
        let previous = std::mem::replace(
            &mut self.state,
            InteractionState::Brushing {
                origin,
                bounds: None,
            },
        );
        match previous {
            InteractionState::Hovering(target) => Some(target),
            _ => None,
        }
    }

    /// Record the latest brush region. False if no brush is active.
    pub fn drag_move(&mut self, next: BrushBounds) -> bool {
        match &mut self.state {
            InteractionState::Brushing { bounds, .. } => {
                *bounds = Some(next);
                true
            }
            _ => false,
        }
    }

    /// Finish the brush, returning its origin and last region
    pub fn drag_end(&mut self) -> Option<(Point, Option<BrushBounds>)> {
        match std::mem::take(&mut self.state) {
            InteractionState::Brushing { origin, bounds } => Some((origin, bounds)),
            other => {
                self.state = other;
                None
            }
        }
    }

    /// Abandon the brush. True if one was active.
    pub fn drag_abort(&mut self) -> bool {
        self.drag_end().is_some()
    }

    /// Where the active brush started
    pub fn brush_origin(&self) -> Option<Point> {
        match &self.state {
            InteractionState::Brushing { origin, .. } => Some(*origin),
            _ => None,
        }
    }

    /// Current brush region, if brushing and moved at least once
    pub fn brush_bounds(&self) -> Option<&BrushBounds> {
        match &self.state {
            InteractionState::Brushing { bounds, .. } => bounds.as_ref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(id: &str) -> HoverTarget {
        HoverTarget {
            id: id.into(),
            selection_type: "sample".into(),
            position: None,
        }
    }

    #[test]
    fn test_hover_cycle() {
        let mut interaction = Interaction::new();
        assert_eq!(interaction.enter(target("s1")), Ok(None));
        assert_eq!(interaction.hovered(), Some(&target("s1")));

        assert_eq!(interaction.enter(target("s2")), Ok(Some(target("s1"))));
        assert_eq!(interaction.leave(), Some(target("s2")));
        assert_eq!(interaction.state(), &InteractionState::Idle);
        assert_eq!(interaction.leave(), None);
    }

    #[test]
    fn test_drag_from_hover_ends_hover() {
        let mut interaction = Interaction::new();
        interaction.enter(target("s1")).unwrap();
        assert_eq!(interaction.drag_start(Point::new(0.0, 0.0)), Some(target("s1")));
        assert!(interaction.is_brushing());
    }

    #[test]
    fn test_hover_ignored_while_brushing() {
        let mut interaction = Interaction::new();
        interaction.drag_start(Point::new(0.0, 0.0));
        assert_eq!(interaction.enter(target("s1")), Err(target("s1")));
        assert!(interaction.is_brushing());
        assert_eq!(interaction.leave(), None);
    }

    #[test]
    fn test_drag_end_returns_last_bounds() {
        let mut interaction = Interaction::new();
        let origin = Point::new(1.0, 1.0);
        interaction.drag_start(origin);
        let first = BrushBounds::from_corners(origin, Point::new(2.0, 2.0));
        let last = BrushBounds::from_corners(origin, Point::new(3.0, 3.0));
        assert!(interaction.drag_move(first));
        assert!(interaction.drag_move(last));
        assert_eq!(interaction.brush_bounds(), Some(&last));

        assert_eq!(interaction.drag_end(), Some((origin, Some(last))));
        assert_eq!(interaction.state(), &InteractionState::Idle);
    }

    #[test]
    fn test_move_and_end_without_brush_are_ignored() {
        let mut interaction = Interaction::new();
        interaction.enter(target("s1")).unwrap();
        let bounds = BrushBounds::from_corners(Point::new(0.0, 0.0), Point::new(1.0, 1.0));

        assert!(!interaction.drag_move(bounds));
        assert_eq!(interaction.drag_end(), None);
        assert!(!interaction.drag_abort());
        assert_eq!(interaction.hovered(), Some(&target("s1")));
    }
}
