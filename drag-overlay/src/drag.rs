use std::path::PathBuf;
use tracing::{debug, info, warn};
use wayland_client::protocol::wl_data_device_manager::DndAction;

use crate::payload::{uri_list_payload, ContentProvider};

/// Pointer travel (logical units) before a press turns into a drag.
pub const DRAG_THRESHOLD: f64 = 8.0;

/// Callbacks bound to a drag source. Both run on the event loop thread.
pub trait DragListener {
    /// Called once the drag gesture is recognised, with the press position.
    /// Returning `None` cancels the drag.
    fn on_prepare(&mut self, x: f64, y: f64) -> Option<ContentProvider>;

    /// Called after the compositor has been asked to start the drag.
    fn on_begin(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragPhase {
    Idle,
    Preparing,
    Dragging,
}

#[derive(Debug, Clone, Copy)]
struct Press {
    x: f64,
    y: f64,
    serial: u32,
}

/// A prepared drag waiting to be handed to the compositor.
#[derive(Debug)]
pub struct PendingDrag {
    pub provider: ContentProvider,
    /// Serial of the button press that started the gesture.
    pub serial: u32,
}

/// Recognises the drag gesture on one widget and drives the
/// Idle -> Preparing -> Dragging -> Idle cycle.
pub struct DragSourceController<L> {
    actions: DndAction,
    listener: L,
    phase: DragPhase,
    press: Option<Press>,
}

impl<L: DragListener> DragSourceController<L> {
    pub fn new(listener: L) -> Self {
        Self {
            actions: DndAction::Copy,
            listener,
            phase: DragPhase::Idle,
            press: None,
        }
    }

    pub fn actions(&self) -> DndAction {
        self.actions
    }

    /// Whether `action` is within the advertised action set.
    pub fn permits(&self, action: DndAction) -> bool {
        !action.is_empty() && self.actions.contains(action)
    }

    pub fn phase(&self) -> DragPhase {
        self.phase
    }

    pub fn listener(&self) -> &L {
        &self.listener
    }

    pub fn pointer_pressed(&mut self, x: f64, y: f64, serial: u32) {
        if self.phase == DragPhase::Idle {
            self.press = Some(Press { x, y, serial });
        }
    }

    /// Button release seen on our own surface. While a drag holds the
    /// pointer grab releases go to the drag, so one arriving here in
    /// `Dragging` means the compositor refused the drag. Returns `true`
    /// when such a stale drag was dropped.
    pub fn pointer_released(&mut self) -> bool {
        let stale = self.phase == DragPhase::Dragging;
        if stale {
            debug!("Release reached the source surface, compositor never took the drag");
        }
        self.reset();
        stale
    }

    /// Pointer left the surface; a pending press can no longer start a drag.
    pub fn pointer_left(&mut self) {
        self.press = None;
    }

    /// Feeds pointer motion. Once the press has moved past
    /// [`DRAG_THRESHOLD`] the prepare callback runs and, if it produced
    /// content, the drag is returned for the caller to start.
    pub fn pointer_motion(&mut self, x: f64, y: f64) -> Option<PendingDrag> {
        if self.phase != DragPhase::Idle {
            return None;
        }
        let press = self.press?;
        if (x - press.x).hypot(y - press.y) < DRAG_THRESHOLD {
            return None;
        }

        self.press = None;
        self.phase = DragPhase::Preparing;

        match self.listener.on_prepare(press.x, press.y) {
            Some(provider) => Some(PendingDrag {
                provider,
                serial: press.serial,
            }),
            None => {
                debug!("No content for drag, cancelling");
                self.phase = DragPhase::Idle;
                None
            }
        }
    }

    pub fn begin(&mut self) {
        if self.phase == DragPhase::Preparing {
            self.phase = DragPhase::Dragging;
            self.listener.on_begin();
        }
    }

    /// The drag could not be handed to the compositor.
    pub fn abort(&mut self) {
        if self.phase == DragPhase::Preparing {
            self.phase = DragPhase::Idle;
        }
    }

    /// The compositor finished or cancelled the drag.
    pub fn end(&mut self) {
        self.reset();
    }

    /// Back to `Idle` with no armed press, whatever the current phase.
    pub fn reset(&mut self) {
        self.phase = DragPhase::Idle;
        self.press = None;
    }
}

/// Offers one fixed file as a `text/uri-list` entry.
#[derive(Debug, Clone)]
pub struct FileDragListener {
    source: PathBuf,
}

impl FileDragListener {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

impl DragListener for FileDragListener {
    fn on_prepare(&mut self, _x: f64, _y: f64) -> Option<ContentProvider> {
        match uri_list_payload(&self.source) {
            Ok(provider) => {
                let uri = String::from_utf8_lossy(provider.bytes());
                info!("Drag prepare! uri={}", uri.trim_end());
                Some(provider)
            }
            Err(e) => {
                warn!("Drag prepare failed for {}: {:#}", self.source.display(), e);
                None
            }
        }
    }

    fn on_begin(&mut self) {
        info!("Drag begin!");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::URI_LIST_MIME;

    #[derive(Default)]
    struct Recorder {
        prepares: Vec<(f64, f64)>,
        begins: usize,
        refuse: bool,
    }

    impl DragListener for Recorder {
        fn on_prepare(&mut self, x: f64, y: f64) -> Option<ContentProvider> {
            self.prepares.push((x, y));
            (!self.refuse).then(|| ContentProvider::for_bytes(URI_LIST_MIME, "file:///x\r\n"))
        }

        fn on_begin(&mut self) {
            self.begins += 1;
        }
    }

    #[test]
    fn test_only_copy_is_permitted() {
        let controller = DragSourceController::new(Recorder::default());
        assert_eq!(controller.actions(), DndAction::Copy);
        assert!(controller.permits(DndAction::Copy));
        assert!(!controller.permits(DndAction::Move));
        assert!(!controller.permits(DndAction::Ask));
        assert!(!controller.permits(DndAction::Copy | DndAction::Move));
        assert!(!controller.permits(DndAction::empty()));
    }

    #[test]
    fn test_motion_below_threshold_does_not_prepare() {
        let mut controller = DragSourceController::new(Recorder::default());
        controller.pointer_pressed(10.0, 10.0, 7);

        assert!(controller.pointer_motion(13.0, 14.0).is_none());
        assert_eq!(controller.phase(), DragPhase::Idle);
        assert!(controller.listener().prepares.is_empty());
    }

    #[test]
    fn test_full_cycle() {
        let mut controller = DragSourceController::new(Recorder::default());
        controller.pointer_pressed(10.0, 10.0, 42);

        let pending = controller.pointer_motion(30.0, 10.0).unwrap();
        assert_eq!(pending.serial, 42);
        assert_eq!(controller.phase(), DragPhase::Preparing);
        assert_eq!(controller.listener().prepares, vec![(10.0, 10.0)]);

        controller.begin();
        assert_eq!(controller.phase(), DragPhase::Dragging);
        assert_eq!(controller.listener().begins, 1);

        // Further motion belongs to the compositor's drag, not a new gesture.
        assert!(controller.pointer_motion(100.0, 100.0).is_none());

        controller.end();
        assert_eq!(controller.phase(), DragPhase::Idle);
    }

    #[test]
    fn test_refused_prepare_cancels() {
        let mut controller = DragSourceController::new(Recorder {
            refuse: true,
            ..Default::default()
        });
        controller.pointer_pressed(0.0, 0.0, 1);

        assert!(controller.pointer_motion(20.0, 0.0).is_none());
        assert_eq!(controller.phase(), DragPhase::Idle);

        controller.begin();
        assert_eq!(controller.listener().begins, 0);
    }

    #[test]
    fn test_release_disarms_gesture() {
        let mut controller = DragSourceController::new(Recorder::default());
        controller.pointer_pressed(0.0, 0.0, 1);
        controller.pointer_released();

        assert!(controller.pointer_motion(50.0, 50.0).is_none());
        assert!(controller.listener().prepares.is_empty());
    }

    #[test]
    fn test_release_on_source_surface_drops_refused_drag() {
        let mut controller = DragSourceController::new(Recorder::default());
        controller.pointer_pressed(0.0, 0.0, 1);
        controller.pointer_motion(20.0, 0.0).unwrap();
        controller.begin();
        assert_eq!(controller.phase(), DragPhase::Dragging);

        assert!(controller.pointer_released());
        assert_eq!(controller.phase(), DragPhase::Idle);

        controller.pointer_pressed(0.0, 0.0, 2);
        let pending = controller.pointer_motion(20.0, 0.0).unwrap();
        assert_eq!(pending.serial, 2);
        assert_eq!(controller.listener().prepares.len(), 2);
    }

    #[test]
    fn test_plain_release_reports_no_stale_drag() {
        let mut controller = DragSourceController::new(Recorder::default());
        controller.pointer_pressed(0.0, 0.0, 1);
        assert!(!controller.pointer_released());
        assert_eq!(controller.phase(), DragPhase::Idle);
    }

    #[test]
    fn test_leave_disarms_press() {
        let mut controller = DragSourceController::new(Recorder::default());
        controller.pointer_pressed(0.0, 0.0, 1);
        controller.pointer_left();

        assert!(controller.pointer_motion(40.0, 0.0).is_none());
        assert_eq!(controller.phase(), DragPhase::Idle);
        assert!(controller.listener().prepares.is_empty());
    }

    #[test]
    fn test_leave_during_drag_keeps_dragging() {
        let mut controller = DragSourceController::new(Recorder::default());
        controller.pointer_pressed(0.0, 0.0, 1);
        controller.pointer_motion(20.0, 0.0).unwrap();
        controller.begin();

        controller.pointer_left();
        assert_eq!(controller.phase(), DragPhase::Dragging);
    }

    #[test]
    fn test_motion_without_press_is_ignored() {
        let mut controller = DragSourceController::new(Recorder::default());
        assert!(controller.pointer_motion(50.0, 50.0).is_none());
        assert_eq!(controller.phase(), DragPhase::Idle);
    }

    #[test]
    fn test_abort_returns_to_idle_without_begin() {
        let mut controller = DragSourceController::new(Recorder::default());
        controller.pointer_pressed(0.0, 0.0, 1);
        controller.pointer_motion(0.0, 20.0).unwrap();

        controller.abort();
        assert_eq!(controller.phase(), DragPhase::Idle);
        assert_eq!(controller.listener().begins, 0);
    }
}
