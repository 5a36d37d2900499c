//! Pointer interaction reducer
//!
//! At most one field is active at a time, and it is either being dragged or
//! being resized, never both. Pointer-up and pointer-leave always return to
//! [`Interaction::Idle`].

use shared_types::Point;

#[derive(Debug, Clone, Default, PartialEq)]
pub enum Interaction {
    #[default]
    Idle,
    Dragging { field_id: String, last: Point },
    Resizing { field_id: String, last: Point },
}

impl Interaction {
    /// Id of the field receiving pointer deltas
    pub fn active_field(&self) -> Option<&str> {
        match self {
            Interaction::Idle => None,
            Interaction::Dragging { field_id, .. } | Interaction::Resizing { field_id, .. } => {
                Some(field_id)
            }
        }
    }
}

/// Pointer input in display coordinates
#[derive(Debug, Clone, PartialEq)]
pub enum PointerEvent {
    /// Pointer down on a field body
    DragStart { field_id: String, at: Point },
    /// Pointer down on a field's resize handle
    ResizeStart { field_id: String, at: Point },
    Move(Point),
    Up,
    Leave,
}

/// A geometry change in page pixels
#[derive(Debug, Clone, PartialEq)]
pub enum FieldEdit {
    Move { field_id: String, dx: f64, dy: f64 },
    Resize { field_id: String, dw: f64, dh: f64 },
}

/// Advance the interaction state by one pointer event.
///
/// `scale` is the current display scale; display deltas are divided by it to
/// get page deltas. A start event while another interaction is active is
/// ignored.
pub fn reduce(
    state: Interaction,
    event: PointerEvent,
    scale: f64,
) -> (Interaction, Option<FieldEdit>) {
    let scale = if scale.is_finite() && scale > 0.0 {
        scale
    } else {
        1.0
    };

    match (state, event) {
        (Interaction::Idle, PointerEvent::DragStart { field_id, at }) => {
            (Interaction::Dragging { field_id, last: at }, None)
        }
        (Interaction::Idle, PointerEvent::ResizeStart { field_id, at }) => {
            (Interaction::Resizing { field_id, last: at }, None)
        }
        (Interaction::Dragging { field_id, last }, PointerEvent::Move(at)) => {
            let edit = FieldEdit::Move {
                field_id: field_id.clone(),
                dx: (at.x - last.x) / scale,
                dy: (at.y - last.y) / scale,
            };
            (Interaction::Dragging { field_id, last: at }, Some(edit))
        }
        (Interaction::Resizing { field_id, last }, PointerEvent::Move(at)) => {
            let edit = FieldEdit::Resize {
                field_id: field_id.clone(),
                dw: (at.x - last.x) / scale,
                dh: (at.y - last.y) / scale,
            };
            (Interaction::Resizing { field_id, last: at }, Some(edit))
        }
        (_, PointerEvent::Up | PointerEvent::Leave) => (Interaction::Idle, None),
        (state, _) => (state, None),
    }
}
