use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use common_hooks::modal_state::ModalState;

#[test]
fn test_all_modals_start_closed() {
    let modals = ModalState::new(["confirm", "details"]);

    let list = modals.list();
    assert_eq!(list.len(), 2);
    assert!(list.values().all(|open| !open));
}

#[test]
fn test_open_and_close() {
    let modals = ModalState::new(["confirm", "details"]);

    modals.open("confirm");
    assert!(modals.is_open("confirm"));
    assert!(!modals.is_open("details"));

    modals.open("details");
    modals.close("confirm");
    assert!(!modals.is_open("confirm"));
    assert!(modals.is_open("details"));
}

#[test]
fn test_callback_runs_before_flag_flips() {
    let modals = ModalState::new(["details"]);
    let observer = modals.clone();

    let mut open_during_callback = None;
    modals.open_with("details", || open_during_callback = Some(observer.is_open("details")));
    assert_eq!(open_during_callback, Some(false));

    let mut closed_during_callback = None;
    modals.close_with("details", || closed_during_callback = Some(!observer.is_open("details")));
    assert_eq!(closed_during_callback, Some(false));
}

#[test]
fn test_unknown_names_are_ignored() {
    let modals = ModalState::new(["confirm"]);

    modals.open("missing");

    assert!(!modals.is_open("missing"));
    assert_eq!(modals.list().len(), 1);
}

#[test]
fn test_close_all() {
    let modals = ModalState::new(["a", "b", "c"]);
    modals.open("a");
    modals.set("c", true);

    modals.close_all();

    assert!(modals.list().values().all(|open| !open));
}

#[test]
fn test_subscribe_observes_changes() {
    let modals = ModalState::new(["a"]);
    let calls = Arc::new(AtomicUsize::new(0));
    let sink = Arc::clone(&calls);
    let _effect = modals.subscribe(move || {
        sink.fetch_add(1, Ordering::SeqCst);
    });

    modals.open("a");
    modals.open("missing");

    assert_eq!(calls.load(Ordering::SeqCst), 2);
}
