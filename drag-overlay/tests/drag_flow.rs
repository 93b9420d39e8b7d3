use drag_overlay::drag::{DragPhase, DragSourceController, FileDragListener};
use drag_overlay::payload::{file_uri, URI_LIST_MIME};
use std::path::Path;

fn drag_once(controller: &mut DragSourceController<FileDragListener>) -> Vec<u8> {
    controller.pointer_pressed(5.0, 5.0, 1);
    let pending = controller
        .pointer_motion(40.0, 5.0)
        .expect("gesture past threshold should prepare a drag");
    controller.begin();
    assert_eq!(controller.phase(), DragPhase::Dragging);

    let mut served = Vec::new();
    assert!(pending.provider.write_to(URI_LIST_MIME, &mut served).unwrap());
    controller.end();
    served
}

#[test]
fn test_payload_is_uri_of_configured_file() {
    let dir = tempfile::tempdir().unwrap();
    let shot = dir.path().join("20260213_193932.png");
    std::fs::write(&shot, b"png").unwrap();

    let mut controller = DragSourceController::new(FileDragListener::new(&shot));
    let served = drag_once(&mut controller);

    let expected = format!("{}\r\n", file_uri(&shot).unwrap());
    assert_eq!(served, expected.as_bytes());
    assert!(served.ends_with(b"\r\n"));
    assert_eq!(served.iter().filter(|&&b| b == b'\n').count(), 1);
}

#[test]
fn test_repeated_drags_offer_same_payload() {
    let mut controller =
        DragSourceController::new(FileDragListener::new("/home/user/Pictures/a b.png"));

    let first = drag_once(&mut controller);
    let second = drag_once(&mut controller);
    let third = drag_once(&mut controller);

    assert_eq!(first, b"file:///home/user/Pictures/a%20b.png\r\n");
    assert_eq!(first, second);
    assert_eq!(second, third);
    assert_eq!(controller.phase(), DragPhase::Idle);
}

#[test]
fn test_missing_file_still_produces_payload() {
    let missing = Path::new("/nonexistent/dir/shot.png");
    let mut controller = DragSourceController::new(FileDragListener::new(missing));

    let served = drag_once(&mut controller);
    assert_eq!(served, b"file:///nonexistent/dir/shot.png\r\n");
}

#[test]
fn test_other_mime_types_are_refused() {
    let mut controller = DragSourceController::new(FileDragListener::new("/tmp/x.png"));
    controller.pointer_pressed(0.0, 0.0, 9);
    let pending = controller.pointer_motion(0.0, 30.0).unwrap();

    let mut served = Vec::new();
    assert!(!pending.provider.write_to("text/plain", &mut served).unwrap());
    assert!(served.is_empty());
}
