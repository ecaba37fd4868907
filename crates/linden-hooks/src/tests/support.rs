//! Manual collaborator implementations for driving the runtime by hand.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use crate::error::CaughtError;
use crate::instance::{Instance, InstanceId};
use crate::platform::{CallbackId, DevtoolsHooks, ErrorReporter, HostScheduler, RenderScheduler};
use crate::runtime::Runtime;
use crate::HookKind;

type QueuedFrame = (CallbackId, Box<dyn FnOnce()>);
type QueuedTimer = (CallbackId, Duration, Box<dyn FnOnce()>);

/// Host whose frame and timer queues only advance when a test cranks
/// them.
pub struct ManualHost {
    frames_supported: Cell<bool>,
    next_id: Cell<CallbackId>,
    frames: RefCell<Vec<QueuedFrame>>,
    timers: RefCell<Vec<QueuedTimer>>,
    cancelled_frames: Cell<usize>,
    cancelled_timers: Cell<usize>,
}

impl ManualHost {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            frames_supported: Cell::new(true),
            next_id: Cell::new(1),
            frames: RefCell::new(Vec::new()),
            timers: RefCell::new(Vec::new()),
            cancelled_frames: Cell::new(0),
            cancelled_timers: Cell::new(0),
        })
    }

    /// Host with no frame source; `request_frame` returns `None`.
    pub fn without_frames() -> Rc<Self> {
        let host = Self::new();
        host.frames_supported.set(false);
        host
    }

    fn allocate_id(&self) -> CallbackId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    pub fn pending_frames(&self) -> usize {
        self.frames.borrow().len()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.borrow().len()
    }

    pub fn cancelled_frames(&self) -> usize {
        self.cancelled_frames.get()
    }

    pub fn cancelled_timers(&self) -> usize {
        self.cancelled_timers.get()
    }

    pub fn last_timer_delay(&self) -> Option<Duration> {
        self.timers.borrow().last().map(|(_, delay, _)| *delay)
    }

    /// Run the oldest queued frame callback, if any. The queue borrow
    /// is released first: callbacks may schedule again.
    pub fn fire_next_frame(&self) -> bool {
        let entry = {
            let mut frames = self.frames.borrow_mut();
            if frames.is_empty() {
                None
            } else {
                Some(frames.remove(0))
            }
        };
        match entry {
            Some((_, callback)) => {
                callback();
                true
            }
            None => false,
        }
    }

    /// Run the oldest queued timer callback, if any.
    pub fn fire_next_timer(&self) -> bool {
        let entry = {
            let mut timers = self.timers.borrow_mut();
            if timers.is_empty() {
                None
            } else {
                Some(timers.remove(0))
            }
        };
        match entry {
            Some((_, _, callback)) => {
                callback();
                true
            }
            None => false,
        }
    }
}

impl HostScheduler for ManualHost {
    fn request_frame(&self, callback: Box<dyn FnOnce()>) -> Option<CallbackId> {
        if !self.frames_supported.get() {
            return None;
        }
        let id = self.allocate_id();
        self.frames.borrow_mut().push((id, callback));
        Some(id)
    }

    fn cancel_frame(&self, id: CallbackId) {
        let mut frames = self.frames.borrow_mut();
        let before = frames.len();
        frames.retain(|(frame, _)| *frame != id);
        if frames.len() != before {
            self.cancelled_frames.set(self.cancelled_frames.get() + 1);
        }
    }

    fn set_timeout(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> CallbackId {
        let id = self.allocate_id();
        self.timers.borrow_mut().push((id, delay, callback));
        id
    }

    fn clear_timeout(&self, id: CallbackId) {
        let mut timers = self.timers.borrow_mut();
        let before = timers.len();
        timers.retain(|(timer, _, _)| *timer != id);
        if timers.len() != before {
            self.cancelled_timers.set(self.cancelled_timers.get() + 1);
        }
    }
}

/// Records which instances asked to re-render, in order.
#[derive(Default)]
pub struct RecordingRenderer {
    requests: RefCell<Vec<InstanceId>>,
}

impl RecordingRenderer {
    pub fn request_count(&self) -> usize {
        self.requests.borrow().len()
    }

    pub fn take_requests(&self) -> Vec<InstanceId> {
        self.requests.borrow_mut().drain(..).collect()
    }
}

impl RenderScheduler for RecordingRenderer {
    fn request_render(&self, instance: &Instance) {
        self.requests.borrow_mut().push(instance.id());
    }
}

/// Captures everything the bridge failed to hand to a boundary.
#[derive(Default)]
pub struct CapturingReporter {
    reports: RefCell<Vec<(String, Option<InstanceId>)>>,
}

impl CapturingReporter {
    pub fn count(&self) -> usize {
        self.reports.borrow().len()
    }

    pub fn messages(&self) -> Vec<String> {
        self.reports
            .borrow()
            .iter()
            .map(|(message, _)| message.clone())
            .collect()
    }

    pub fn origins(&self) -> Vec<Option<InstanceId>> {
        self.reports
            .borrow()
            .iter()
            .map(|(_, origin)| *origin)
            .collect()
    }
}

impl ErrorReporter for CapturingReporter {
    fn report(&self, error: &CaughtError, origin: Option<&Instance>) {
        self.reports
            .borrow_mut()
            .push((error.message().to_string(), origin.map(Instance::id)));
    }
}

/// Records hook notifications and debug values.
#[derive(Default)]
pub struct RecordingDevtools {
    hooks: RefCell<Vec<(InstanceId, usize, HookKind)>>,
    values: RefCell<Vec<String>>,
}

impl RecordingDevtools {
    pub fn kinds_for(&self, instance: &Instance) -> Vec<HookKind> {
        self.hooks
            .borrow()
            .iter()
            .filter(|(id, _, _)| *id == instance.id())
            .map(|(_, _, kind)| *kind)
            .collect()
    }

    pub fn values(&self) -> Vec<String> {
        self.values.borrow().clone()
    }
}

impl DevtoolsHooks for RecordingDevtools {
    fn hook_invoked(&self, instance: &Instance, index: usize, kind: HookKind) {
        self.hooks.borrow_mut().push((instance.id(), index, kind));
    }

    fn debug_value(&self, value: String) {
        self.values.borrow_mut().push(value);
    }
}

/// Runtime wired to recording collaborators, plus the render helpers a
/// minimal engine would provide.
pub struct TestBed {
    pub runtime: Runtime,
    pub host: Rc<ManualHost>,
    pub renderer: Rc<RecordingRenderer>,
    pub reporter: Rc<CapturingReporter>,
}

impl TestBed {
    pub fn new() -> Self {
        Self::with_host(ManualHost::new())
    }

    pub fn with_host(host: Rc<ManualHost>) -> Self {
        let renderer = Rc::new(RecordingRenderer::default());
        let reporter = Rc::new(CapturingReporter::default());
        let runtime = Runtime::new(host.clone(), renderer.clone());
        runtime.set_error_reporter(reporter.clone());
        Self {
            runtime,
            host,
            renderer,
            reporter,
        }
    }

    /// One full render of `instance`: `before_render`, the component
    /// body, `after_diff`.
    pub fn render<R>(&self, instance: &Instance, body: impl FnOnce() -> R) -> R {
        self.runtime.before_render(instance);
        let output = body();
        self.runtime.after_diff(instance);
        output
    }

    /// Render, then commit this instance's layout effects.
    pub fn render_and_commit<R>(&self, instance: &Instance, body: impl FnOnce() -> R) -> R {
        let output = self.render(instance, body);
        self.runtime.commit(std::slice::from_ref(instance));
        output
    }

    /// Run whatever flush callback is armed: a frame when the host has
    /// one queued, the fallback timer otherwise.
    pub fn flush_paint(&self) {
        if !self.host.fire_next_frame() {
            self.host.fire_next_timer();
        }
    }
}
