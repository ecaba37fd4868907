//! Paint-deferred effect scheduling.
//!
//! Instances with pending passive effects collect in a runtime-owned
//! queue; one scheduled callback flushes the whole batch after the
//! host has had a chance to paint. Scheduling prefers an injected
//! frame primitive and otherwise races a host frame callback against a
//! one-shot timer, so hosts that stop producing frames (an occluded
//! window, a headless run) still flush promptly.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use crate::instance::Instance;
use crate::platform::{CallbackId, FrameSchedulerFn, HostScheduler};
use crate::runtime::RuntimeInner;

/// Upper bound on how long a flush waits for a frame.
pub const FRAME_FALLBACK_TIMEOUT: Duration = Duration::from_millis(100);

/// Queue `instance` for the after-paint flush and arm the flush
/// callback when needed.
///
/// Arming happens when the push made the queue non-empty, or when the
/// injected frame primitive changed identity since the last arm. The
/// second condition re-arms a pending batch under the host's new
/// primitive instead of leaving it parked on the old one.
pub(crate) fn enqueue_after_paint(runtime: &Rc<RuntimeInner>, instance: &Instance) {
    let queued = runtime.push_after_paint(instance);
    let scheduler = runtime.frame_scheduler();
    if queued != 1 && same_scheduler(&scheduler, &runtime.armed_scheduler()) {
        return;
    }
    log::trace!("arming paint flush ({queued} queued)");
    runtime.set_armed_scheduler(scheduler.clone());
    let callback = flush_callback(runtime);
    match scheduler {
        Some(schedule) => schedule(callback),
        None => after_next_frame(runtime.host(), callback),
    }
}

fn flush_callback(runtime: &Rc<RuntimeInner>) -> Box<dyn FnOnce()> {
    let weak = Rc::downgrade(runtime);
    Box::new(move || {
        if let Some(runtime) = weak.upgrade() {
            flush_after_paint(&runtime);
        }
    })
}

fn same_scheduler(a: &Option<FrameSchedulerFn>, b: &Option<FrameSchedulerFn>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Rc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

/// Drain the after-paint queue, deepest instances first.
///
/// One instance at a time: effects may re-render and queue further
/// instances mid-flush, and those must join this drain rather than
/// strand until the next arm. Unmounting instances drop their records
/// unrun. A panic inside one instance's records routes through the
/// error bridge and the drain continues.
pub(crate) fn flush_after_paint(runtime: &Rc<RuntimeInner>) {
    log::trace!("flushing paint effects");
    while let Some(instance) = runtime.pop_deepest_pending() {
        let records = instance.take_pending_effects();
        if records.is_empty() || instance.is_unmounting() {
            continue;
        }
        if let Err(error) = runtime.run_effect_batch(&instance, &records) {
            runtime.dispatch_error(error, &instance);
        }
    }
}

/// Race a host frame callback against the fallback timer; whichever
/// fires first cancels the other and runs `callback` once. Hosts
/// without a frame source degrade to the timer alone.
fn after_next_frame(host: Rc<dyn HostScheduler>, callback: Box<dyn FnOnce()>) {
    let race = Rc::new(FrameRace {
        host,
        callback: RefCell::new(Some(callback)),
        frame: Cell::new(None),
        timer: Cell::new(None),
    });

    let on_timer = Rc::clone(&race);
    let timer = race
        .host
        .set_timeout(FRAME_FALLBACK_TIMEOUT, Box::new(move || on_timer.settle_from_timer()));
    race.timer.set(Some(timer));

    let on_frame = Rc::clone(&race);
    if let Some(frame) = race
        .host
        .request_frame(Box::new(move || on_frame.settle_from_frame()))
    {
        race.frame.set(Some(frame));
    }
}

struct FrameRace {
    host: Rc<dyn HostScheduler>,
    callback: RefCell<Option<Box<dyn FnOnce()>>>,
    frame: Cell<Option<CallbackId>>,
    timer: Cell<Option<CallbackId>>,
}

impl FrameRace {
    fn settle_from_frame(&self) {
        if let Some(timer) = self.timer.take() {
            self.host.clear_timeout(timer);
        }
        self.finish();
    }

    fn settle_from_timer(&self) {
        if let Some(frame) = self.frame.take() {
            self.host.cancel_frame(frame);
        }
        self.finish();
    }

    fn finish(&self) {
        let callback = self.callback.borrow_mut().take();
        if let Some(callback) = callback {
            callback();
        }
    }
}
