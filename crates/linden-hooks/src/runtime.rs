//! Runtime state machine: render cursor, lifecycle entry points and
//! error routing.
//!
//! The engine drives a `Runtime` through four entry points
//! (`before_render`, `after_diff`, `commit`, `unmount`); everything
//! else in the crate reaches the runtime through the thread-local
//! handle set by `before_render`.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::effects::EffectSlot;
use crate::error::{catch, CaughtError};
use crate::instance::Instance;
use crate::platform::{
    DevtoolsHooks, ErrorReporter, FrameSchedulerFn, HostScheduler, LogReporter, RenderScheduler,
};
use crate::scheduler;
use crate::HookKind;

thread_local! {
    static LAST_RUNTIME: RefCell<Option<RuntimeHandle>> = RefCell::new(None);
}

/// Runtime the free hook functions resolve to on this thread.
///
/// Panics when no runtime has rendered here yet; hooks outside a
/// render are a caller bug and get the clearer per-instance panic in
/// `current_instance` instead.
pub(crate) fn active_runtime() -> Rc<RuntimeInner> {
    LAST_RUNTIME
        .with(|slot| slot.borrow().as_ref().and_then(RuntimeHandle::upgrade))
        .expect("no hook runtime is active on this thread")
}

/// Owning handle to the hook runtime.
///
/// Clones share one runtime. The engine constructs it with its two
/// required collaborators and keeps it alive for as long as the tree
/// it serves.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

/// Weak runtime handle for dispatchers, providers and anything else
/// that outlives a render but must not keep the runtime alive. Every
/// method is a no-op once the runtime is gone.
#[derive(Clone)]
pub struct RuntimeHandle(pub(crate) Weak<RuntimeInner>);

pub(crate) struct RuntimeInner {
    renderer: Rc<dyn RenderScheduler>,
    host: Rc<dyn HostScheduler>,
    reporter: RefCell<Rc<dyn ErrorReporter>>,
    devtools: RefCell<Option<Rc<dyn DevtoolsHooks>>>,
    frame_scheduler: RefCell<Option<FrameSchedulerFn>>,
    armed_scheduler: RefCell<Option<FrameSchedulerFn>>,
    current: RefCell<Option<Instance>>,
    slot_cursor: Cell<usize>,
    id_counter: Cell<u64>,
    pending_kind: Cell<Option<HookKind>>,
    after_paint: RefCell<Vec<Instance>>,
    skip_effects: Cell<bool>,
}

impl Runtime {
    pub fn new(host: Rc<dyn HostScheduler>, renderer: Rc<dyn RenderScheduler>) -> Self {
        let runtime = Self {
            inner: Rc::new(RuntimeInner {
                renderer,
                host,
                reporter: RefCell::new(Rc::new(LogReporter)),
                devtools: RefCell::new(None),
                frame_scheduler: RefCell::new(None),
                armed_scheduler: RefCell::new(None),
                current: RefCell::new(None),
                slot_cursor: Cell::new(0),
                id_counter: Cell::new(0),
                pending_kind: Cell::new(None),
                after_paint: RefCell::new(Vec::new()),
                skip_effects: Cell::new(false),
            }),
        };
        runtime.make_active();
        runtime
    }

    /// Weak handle for out-of-band callers.
    pub fn handle(&self) -> RuntimeHandle {
        RuntimeHandle(Rc::downgrade(&self.inner))
    }

    /// Make this the runtime free hook functions resolve to on the
    /// current thread. `new` and `before_render` call this; it only
    /// matters to hosts juggling several runtimes on one thread.
    pub fn make_active(&self) {
        LAST_RUNTIME.with(|slot| *slot.borrow_mut() = Some(self.handle()));
    }

    /// Entry point: `instance` is about to render.
    ///
    /// Resets the slot cursor, starts a new id pass when `instance` is
    /// a root, and runs any deferred effects still pending from the
    /// previous render before the component function observes their
    /// state.
    pub fn before_render(&self, instance: &Instance) {
        self.make_active();
        self.inner.begin_render(instance);
    }

    /// Entry point: `instance` finished rendering and diffing.
    ///
    /// Queues the instance for the paint-deferred flush when the
    /// render registered passive effects.
    pub fn after_diff(&self, instance: &Instance) {
        self.inner.leave_render();
        if instance.has_pending_effects() {
            scheduler::enqueue_after_paint(&self.inner, instance);
        }
    }

    /// Entry point: the engine committed `batch` to the host tree.
    ///
    /// Runs each instance's layout effects, cleanups first, then
    /// bodies. A panic abandons that instance's remaining records and
    /// routes through the error bridge; the rest of the batch still
    /// runs.
    pub fn commit(&self, batch: &[Instance]) {
        for instance in batch {
            let records = instance.take_commit_callbacks();
            if records.is_empty() {
                continue;
            }
            if let Err(error) = self.inner.run_effect_batch(instance, &records) {
                self.inner.dispatch_error(error, instance);
            }
        }
    }

    /// Entry point: `instance` is being removed from the tree.
    ///
    /// Every slot's active cleanup is attempted even when an earlier
    /// one panics; the first captured error goes to the bridge after
    /// the walk. Pending deferred effects never run, the paint flush
    /// skips unmounting instances.
    pub fn unmount(&self, instance: &Instance) {
        instance.set_unmounting();
        let mut first_error = None;
        for slot in instance.slots_snapshot() {
            if let Some(record) = slot.downcast_ref::<EffectSlot>() {
                if let Err(error) = self.inner.invoke_cleanup(instance, record) {
                    if first_error.is_none() {
                        first_error = Some(error);
                    }
                }
            }
        }
        if let Some(error) = first_error {
            self.inner.dispatch_error(error, instance);
        }
    }

    /// Route an error the engine caught during render.
    pub fn dispatch_error(&self, error: CaughtError, origin: &Instance) {
        self.inner.dispatch_error(error, origin);
    }

    /// Install or remove the preferred frame-scheduling primitive.
    /// Replacing it re-arms the paint flush even while a batch is
    /// already queued.
    pub fn set_frame_scheduler(&self, scheduler: Option<FrameSchedulerFn>) {
        *self.inner.frame_scheduler.borrow_mut() = scheduler;
    }

    /// Replace the reporter that receives unhandled errors.
    pub fn set_error_reporter(&self, reporter: Rc<dyn ErrorReporter>) {
        *self.inner.reporter.borrow_mut() = reporter;
    }

    pub fn set_devtools(&self, devtools: Option<Rc<dyn DevtoolsHooks>>) {
        *self.inner.devtools.borrow_mut() = devtools;
    }

    /// While set, effect constructors register nothing. Hosts use this
    /// for prerender passes whose output is thrown away.
    pub fn set_skip_effects(&self, skip: bool) {
        self.inner.skip_effects.set(skip);
    }
}

impl RuntimeHandle {
    /// Ask the engine to re-render `instance`. No-op after the runtime
    /// is dropped.
    pub fn request_render(&self, instance: &Instance) {
        if let Some(inner) = self.0.upgrade() {
            inner.request_render(instance);
        }
    }

    pub(crate) fn upgrade(&self) -> Option<Rc<RuntimeInner>> {
        self.0.upgrade()
    }
}

impl RuntimeInner {
    fn begin_render(&self, instance: &Instance) {
        *self.current.borrow_mut() = Some(instance.clone());
        self.slot_cursor.set(0);
        self.pending_kind.set(None);
        if instance.depth() == 0 {
            self.id_counter.set(0);
        }
        if instance.has_pending_effects() {
            // The paint flush has not reached this instance yet; run
            // its leftover records now so the render sees their world.
            let records = instance.take_pending_effects();
            if let Err(error) = self.run_effect_batch(instance, &records) {
                self.dispatch_error(error, instance);
            }
        }
    }

    fn leave_render(&self) {
        *self.current.borrow_mut() = None;
    }

    pub(crate) fn request_render(&self, instance: &Instance) {
        self.renderer.request_render(instance);
    }

    /// Instance whose render is executing right now.
    pub(crate) fn current_instance(&self) -> Instance {
        self.current
            .borrow()
            .clone()
            .expect("hooks may only be called while a component is rendering")
    }

    /// Claim the next call-order slot index.
    pub(crate) fn advance_cursor(&self) -> usize {
        let index = self.slot_cursor.get();
        self.slot_cursor.set(index + 1);
        index
    }

    /// Tag the next slot access with a composite hook's own kind.
    pub(crate) fn set_pending_kind(&self, kind: HookKind) {
        self.pending_kind.set(Some(kind));
    }

    pub(crate) fn notify_devtools(&self, instance: &Instance, index: usize, kind: HookKind) {
        let kind = self.pending_kind.take().unwrap_or(kind);
        let devtools = self.devtools.borrow().clone();
        if let Some(devtools) = devtools {
            devtools.hook_invoked(instance, index, kind);
        }
    }

    /// Hand a debug value to devtools; `render` only runs when a
    /// devtools collaborator is installed.
    pub(crate) fn report_debug_value(&self, render: impl FnOnce() -> String) {
        let devtools = self.devtools.borrow().clone();
        if let Some(devtools) = devtools {
            devtools.debug_value(render());
        }
    }

    pub(crate) fn next_id_number(&self) -> u64 {
        let value = self.id_counter.get();
        self.id_counter.set(value + 1);
        value
    }

    pub(crate) fn effects_suppressed(&self) -> bool {
        self.skip_effects.get()
    }

    pub(crate) fn host(&self) -> Rc<dyn HostScheduler> {
        Rc::clone(&self.host)
    }

    pub(crate) fn frame_scheduler(&self) -> Option<FrameSchedulerFn> {
        self.frame_scheduler.borrow().clone()
    }

    pub(crate) fn armed_scheduler(&self) -> Option<FrameSchedulerFn> {
        self.armed_scheduler.borrow().clone()
    }

    pub(crate) fn set_armed_scheduler(&self, scheduler: Option<FrameSchedulerFn>) {
        *self.armed_scheduler.borrow_mut() = scheduler;
    }

    pub(crate) fn push_after_paint(&self, instance: &Instance) -> usize {
        let mut queue = self.after_paint.borrow_mut();
        queue.push(instance.clone());
        queue.len()
    }

    /// Next flush victim: the queue is kept depth-sorted so popping
    /// from the back yields deepest first.
    pub(crate) fn pop_deepest_pending(&self) -> Option<Instance> {
        let mut queue = self.after_paint.borrow_mut();
        queue.sort_by_key(Instance::depth);
        queue.pop()
    }

    /// Run one instance's effect records: all cleanups, then all
    /// bodies. The first panic aborts the remaining records.
    pub(crate) fn run_effect_batch(
        &self,
        owner: &Instance,
        records: &[Rc<EffectSlot>],
    ) -> Result<(), CaughtError> {
        for record in records {
            self.invoke_cleanup(owner, record)?;
        }
        for record in records {
            self.invoke_effect(owner, record)?;
        }
        Ok(())
    }

    pub(crate) fn invoke_cleanup(
        &self,
        owner: &Instance,
        record: &EffectSlot,
    ) -> Result<(), CaughtError> {
        if let Some(cleanup) = record.take_cleanup() {
            let _guard = CursorGuard::install(self, owner);
            catch(cleanup)?;
        }
        Ok(())
    }

    pub(crate) fn invoke_effect(
        &self,
        owner: &Instance,
        record: &EffectSlot,
    ) -> Result<(), CaughtError> {
        if let Some(effect) = record.take_effect() {
            let _guard = CursorGuard::install(self, owner);
            let cleanup = catch(effect)?;
            record.set_cleanup(cleanup.into_inner());
        }
        Ok(())
    }

    /// Walk ancestors from `origin`'s parent to the nearest registered
    /// error handler. A panicking handler is fatal: its error goes
    /// straight to the reporter and the walk stops. With no handler in
    /// the chain the reporter receives the original error.
    pub(crate) fn dispatch_error(&self, error: CaughtError, origin: &Instance) {
        let mut ancestor = origin.parent();
        while let Some(instance) = ancestor {
            if let Some(handler) = instance.error_handler() {
                match catch(|| handler(&error)) {
                    Ok(()) => {}
                    Err(handler_error) => self.report_error(&handler_error, Some(&instance)),
                }
                return;
            }
            ancestor = instance.parent();
        }
        self.report_error(&error, Some(origin));
    }

    fn report_error(&self, error: &CaughtError, origin: Option<&Instance>) {
        let reporter = self.reporter.borrow().clone();
        reporter.report(error, origin);
    }
}

/// Saves the current-instance pointer, installs an effect's owner and
/// restores the saved value on drop, panics included. Keeps re-entrant
/// renders triggered from effects from corrupting the cursor.
struct CursorGuard<'a> {
    runtime: &'a RuntimeInner,
    saved: Option<Instance>,
}

impl<'a> CursorGuard<'a> {
    fn install(runtime: &'a RuntimeInner, owner: &Instance) -> Self {
        let saved = runtime.current.borrow_mut().replace(owner.clone());
        Self { runtime, saved }
    }
}

impl Drop for CursorGuard<'_> {
    fn drop(&mut self) {
        *self.runtime.current.borrow_mut() = self.saved.take();
    }
}
