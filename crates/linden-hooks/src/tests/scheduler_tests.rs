use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use super::support::{ManualHost, TestBed};
use crate::{use_effect_with, Cleanup, Instance, FRAME_FALLBACK_TIMEOUT};

fn counting_effect(runs: &Rc<Cell<usize>>) -> impl FnOnce() {
    let runs = Rc::clone(runs);
    move || {
        use_effect_with((), move || {
            runs.set(runs.get() + 1);
            Cleanup::none()
        });
    }
}

fn named_effect(log: &Rc<RefCell<Vec<String>>>, name: &'static str) -> impl FnOnce() {
    let log = Rc::clone(log);
    move || {
        use_effect_with((), move || {
            log.borrow_mut().push(name.into());
            Cleanup::none()
        });
    }
}

#[test]
fn batch_flushes_deepest_instances_first() {
    let bed = TestBed::new();
    let root = Instance::root();
    let middle = Instance::child_of(&root);
    let leaf = Instance::child_of(&middle);
    let log = Rc::new(RefCell::new(Vec::<String>::new()));

    // The engine renders top-down; the flush must visit bottom-up.
    bed.render(&root, named_effect(&log, "root"));
    bed.render(&middle, named_effect(&log, "middle"));
    bed.render(&leaf, named_effect(&log, "leaf"));

    // One armed callback serves the whole batch.
    assert_eq!(bed.host.pending_frames(), 1);
    assert_eq!(bed.host.pending_timers(), 1);

    bed.flush_paint();
    assert_eq!(*log.borrow(), ["leaf", "middle", "root"]);
}

#[test]
fn frame_beats_the_fallback_timer() {
    let bed = TestBed::new();
    let root = Instance::root();
    let runs = Rc::new(Cell::new(0));

    bed.render(&root, counting_effect(&runs));
    assert_eq!(bed.host.pending_timers(), 1);

    assert!(bed.host.fire_next_frame());
    assert_eq!(runs.get(), 1);
    assert_eq!(bed.host.cancelled_timers(), 1);
    assert_eq!(bed.host.pending_timers(), 0);
    assert!(!bed.host.fire_next_timer());
}

#[test]
fn timer_rescues_a_stalled_frame_source() {
    let bed = TestBed::new();
    let root = Instance::root();
    let runs = Rc::new(Cell::new(0));

    bed.render(&root, counting_effect(&runs));
    assert_eq!(bed.host.pending_frames(), 1);

    // The frame never arrives; the timer fires first.
    assert!(bed.host.fire_next_timer());
    assert_eq!(runs.get(), 1);
    assert_eq!(bed.host.cancelled_frames(), 1);
    assert!(!bed.host.fire_next_frame());
}

#[test]
fn hosts_without_frames_use_the_timer_alone() {
    let bed = TestBed::with_host(ManualHost::without_frames());
    let root = Instance::root();
    let runs = Rc::new(Cell::new(0));

    bed.render(&root, counting_effect(&runs));
    assert_eq!(bed.host.pending_frames(), 0);
    assert_eq!(bed.host.pending_timers(), 1);
    assert_eq!(bed.host.last_timer_delay(), Some(FRAME_FALLBACK_TIMEOUT));
    assert_eq!(FRAME_FALLBACK_TIMEOUT, Duration::from_millis(100));

    assert!(bed.host.fire_next_timer());
    assert_eq!(runs.get(), 1);
    assert_eq!(bed.host.cancelled_frames(), 0);
}

#[test]
fn injected_frame_scheduler_takes_precedence() {
    let bed = TestBed::new();
    let root = Instance::root();
    let runs = Rc::new(Cell::new(0));
    let queued: Rc<RefCell<Vec<Box<dyn FnOnce()>>>> = Rc::new(RefCell::new(Vec::new()));

    {
        let queued = Rc::clone(&queued);
        bed.runtime
            .set_frame_scheduler(Some(Rc::new(move |callback| {
                queued.borrow_mut().push(callback);
            })));
    }

    bed.render(&root, counting_effect(&runs));
    assert_eq!(bed.host.pending_frames() + bed.host.pending_timers(), 0);
    assert_eq!(queued.borrow().len(), 1);

    let callback = queued.borrow_mut().remove(0);
    callback();
    assert_eq!(runs.get(), 1);
}

#[test]
fn replacing_the_scheduler_rearms_a_pending_batch() {
    let bed = TestBed::new();
    let root = Instance::root();
    let child = Instance::child_of(&root);
    let log = Rc::new(RefCell::new(Vec::<String>::new()));
    let queued: Rc<RefCell<Vec<Box<dyn FnOnce()>>>> = Rc::new(RefCell::new(Vec::new()));

    bed.render(&root, named_effect(&log, "root"));
    assert_eq!(bed.host.pending_frames(), 1);

    {
        let queued = Rc::clone(&queued);
        bed.runtime
            .set_frame_scheduler(Some(Rc::new(move |callback| {
                queued.borrow_mut().push(callback);
            })));
    }

    // Queue length is now 2, but the primitive changed identity, so
    // the batch re-arms under the injected scheduler.
    bed.render(&child, named_effect(&log, "child"));
    assert_eq!(queued.borrow().len(), 1);

    let callback = queued.borrow_mut().remove(0);
    callback();
    assert_eq!(*log.borrow(), ["child", "root"]);

    // The superseded frame/timer race still fires into an empty queue.
    bed.flush_paint();
    assert_eq!(*log.borrow(), ["child", "root"]);
}

#[test]
fn unmounting_instances_are_skipped_by_the_flush() {
    let bed = TestBed::new();
    let root = Instance::root();
    let child = Instance::child_of(&root);
    let log = Rc::new(RefCell::new(Vec::<String>::new()));

    bed.render(&root, named_effect(&log, "root"));
    bed.render(&child, named_effect(&log, "child"));
    bed.runtime.unmount(&child);

    bed.flush_paint();
    assert_eq!(*log.borrow(), ["root"]);
}
