//! Touch state machine and object routing
//!
//! Raw samples from a controller become press, move and release events.
//! A press is hit-tested against the bound display and the object under the
//! finger stays bound to that contact until it lifts, even if the finger
//! drags outside the object's bounds.

use log::trace;
use tessera_hal::touch::TouchPoint;

use crate::arena::handle_type;
use crate::display::DisplayState;
use crate::object::ObjectId;

handle_type! {
    /// Handle to a touch device within a graphics context
    TouchId
}

/// Default poll period when sampling on a timer
pub const POLL_MS_DEFAULT: u32 = 15;

/// Default poll period when an interrupt gates the reads
pub const POLL_MS_IRQ_DEFAULT: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TouchEventKind {
    Press,
    Move,
    Release,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TouchEvent {
    pub kind: TouchEventKind,
    pub x: u16,
    pub y: u16,
    pub strength: u16,
    pub track_id: u8,
    pub timestamp_ms: u32,
}

/// Press state plus the object the current contact is bound to
#[derive(Debug, Clone, Default)]
pub struct TouchTracker {
    pressed: bool,
    last: TouchPoint,
    bound: Option<(ObjectId, u8)>,
}

impl TouchTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    pub fn last_point(&self) -> TouchPoint {
        self.last
    }

    /// Object bound by the current press, if any
    pub fn pressed_object(&self) -> Option<ObjectId> {
        self.bound.map(|(id, _)| id)
    }

    /// Turn one sample into an event
    ///
    /// `None` means no finger is down. A held, motionless finger produces no
    /// event.
    pub fn process(&mut self, sample: Option<TouchPoint>, now_ms: u32) -> Option<TouchEvent> {
        let kind = match (sample, self.pressed) {
            (Some(_), false) => TouchEventKind::Press,
            (Some(p), true) if (p.x, p.y) != (self.last.x, self.last.y) => TouchEventKind::Move,
            (None, true) => TouchEventKind::Release,
            _ => {
                if let Some(p) = sample {
                    self.last = p;
                }
                return None;
            }
        };

        if let Some(p) = sample {
            self.last = p;
        }
        self.pressed = kind != TouchEventKind::Release;

        let p = self.last;
        trace!("touch {:?} at {},{} track {}", kind, p.x, p.y, p.track_id);
        Some(TouchEvent {
            kind,
            x: p.x,
            y: p.y,
            strength: p.strength,
            track_id: p.track_id,
            timestamp_ms: now_ms,
        })
    }

    /// Object that should receive `event`
    ///
    /// A press binds the topmost visible object under the point. Moves and
    /// the release go to that object only while the track id matches; the
    /// release ends the binding.
    pub fn route(&mut self, display: &DisplayState, event: &TouchEvent) -> Option<ObjectId> {
        match event.kind {
            TouchEventKind::Press => {
                self.bound = display
                    .hit_test(event.x as i32, event.y as i32)
                    .map(|id| (id, event.track_id));
                self.pressed_object()
            }
            TouchEventKind::Move => self.matching(event.track_id),
            TouchEventKind::Release => {
                let target = self.matching(event.track_id);
                self.bound = None;
                target
            }
        }
    }

    /// Forget the bound object, e.g. after it was deleted or the display changed
    pub fn unbind(&mut self) {
        self.bound = None;
    }

    fn matching(&self, track_id: u8) -> Option<ObjectId> {
        self.bound.and_then(|(id, t)| (t == track_id).then_some(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Key;
    use crate::buffer::FrameBufferSet;
    use crate::display::{DisplayFlags, DisplayId};
    use crate::timer::TimerManager;
    use crate::widget::{Label, Widget};

    fn display_with_box() -> (DisplayState, ObjectId) {
        let buffers = FrameBufferSet::allocate(400, false).unwrap();
        let mut d = DisplayState::new(
            DisplayId(Key {
                index: 0,
                generation: 0,
            }),
            100,
            100,
            DisplayFlags::default(),
            buffers,
        )
        .unwrap();
        let mut t = TimerManager::new(30);
        let id = d.create_object(Widget::Label(Label::new()), &mut t, 0).unwrap();
        d.set_pos(id, 10, 10).unwrap();
        d.set_size(id, 20, 20).unwrap();
        (d, id)
    }

    #[test]
    fn test_press_move_release() {
        let mut t = TouchTracker::new();
        let e = t.process(Some(TouchPoint::new(5, 5)), 1).unwrap();
        assert_eq!(e.kind, TouchEventKind::Press);
        assert!(t.is_pressed());

        // Same spot: nothing to report
        assert_eq!(t.process(Some(TouchPoint::new(5, 5)), 2), None);

        let e = t.process(Some(TouchPoint::new(6, 5)), 3).unwrap();
        assert_eq!(e.kind, TouchEventKind::Move);

        let e = t.process(None, 4).unwrap();
        assert_eq!(e.kind, TouchEventKind::Release);
        assert_eq!((e.x, e.y, e.timestamp_ms), (6, 5, 4));
        assert!(!t.is_pressed());

        assert_eq!(t.process(None, 5), None);
    }

    #[test]
    fn test_drag_stays_bound_outside_bounds() {
        let (d, id) = display_with_box();
        let mut t = TouchTracker::new();

        let press = t.process(Some(TouchPoint::new(15, 15)), 0).unwrap();
        assert_eq!(t.route(&d, &press), Some(id));

        let drag = t.process(Some(TouchPoint::new(80, 80)), 1).unwrap();
        assert_eq!(t.route(&d, &drag), Some(id));

        let release = t.process(None, 2).unwrap();
        assert_eq!(t.route(&d, &release), Some(id));
        assert_eq!(t.pressed_object(), None);
    }

    #[test]
    fn test_other_track_is_not_routed() {
        let (d, id) = display_with_box();
        let mut t = TouchTracker::new();

        let press = t.process(Some(TouchPoint::new(15, 15).with_track(1)), 0).unwrap();
        assert_eq!(t.route(&d, &press), Some(id));

        let other = t.process(Some(TouchPoint::new(16, 15).with_track(2)), 1).unwrap();
        assert_eq!(t.route(&d, &other), None);

        // Release on the wrong track still drops the binding
        let release = t.process(None, 2).unwrap();
        assert_eq!(t.route(&d, &release), None);
        assert_eq!(t.pressed_object(), None);
    }

    #[test]
    fn test_press_on_empty_space() {
        let (d, _) = display_with_box();
        let mut t = TouchTracker::new();
        let press = t.process(Some(TouchPoint::new(50, 50)), 0).unwrap();
        assert_eq!(t.route(&d, &press), None);
        // Right edge is exclusive
        let mut t = TouchTracker::new();
        let press = t.process(Some(TouchPoint::new(30, 15)), 0).unwrap();
        assert_eq!(t.route(&d, &press), None);
    }
}
