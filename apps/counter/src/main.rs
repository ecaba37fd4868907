//! Terminal counter driven by the linden-hooks runtime.
//!
//! A miniature engine: a queue-backed host scheduler, a dirty-instance
//! renderer, and a manual loop standing in for a real frame source.
//! Run with `RUST_LOG=trace` to watch the paint flush arm and fire.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use linden_hooks::{
    create_context, use_callback, use_context, use_effect_with, use_id, use_state, CallbackId,
    Cleanup, Context, HostScheduler, Instance, ProviderState, RenderScheduler, Runtime,
};

// === Host scheduler backed by plain queues ===

/// Frame and timer callbacks land in queues that the main loop drains,
/// so "after the next paint" becomes an ordinary function call here.
struct LoopHost {
    next_id: Cell<CallbackId>,
    frames: RefCell<VecDeque<(CallbackId, Box<dyn FnOnce()>)>>,
    timers: RefCell<VecDeque<(CallbackId, Box<dyn FnOnce()>)>>,
}

impl LoopHost {
    fn new() -> Rc<Self> {
        Rc::new(LoopHost {
            next_id: Cell::new(1),
            frames: RefCell::new(VecDeque::new()),
            timers: RefCell::new(VecDeque::new()),
        })
    }

    fn allocate(&self) -> CallbackId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    /// One loop turn: deliver queued frames, then whatever timers the
    /// frame callbacks did not cancel.
    fn run_pending(&self) {
        loop {
            let next = self.frames.borrow_mut().pop_front();
            let Some((_, callback)) = next else { break };
            callback();
        }
        loop {
            let next = self.timers.borrow_mut().pop_front();
            let Some((_, callback)) = next else { break };
            callback();
        }
    }
}

impl HostScheduler for LoopHost {
    fn request_frame(&self, callback: Box<dyn FnOnce()>) -> Option<CallbackId> {
        let id = self.allocate();
        self.frames.borrow_mut().push_back((id, callback));
        Some(id)
    }

    fn cancel_frame(&self, id: CallbackId) {
        self.frames.borrow_mut().retain(|(queued, _)| *queued != id);
    }

    fn set_timeout(&self, _delay: Duration, callback: Box<dyn FnOnce()>) -> CallbackId {
        let id = self.allocate();
        self.timers.borrow_mut().push_back((id, callback));
        id
    }

    fn clear_timeout(&self, id: CallbackId) {
        self.timers.borrow_mut().retain(|(queued, _)| *queued != id);
    }
}

// === Renderer: a dirty queue the loop drains ===

#[derive(Default)]
struct QueueRenderer {
    dirty: RefCell<VecDeque<Instance>>,
}

impl QueueRenderer {
    fn take_dirty(&self) -> Option<Instance> {
        self.dirty.borrow_mut().pop_front()
    }
}

impl RenderScheduler for QueueRenderer {
    fn request_render(&self, instance: &Instance) {
        let mut dirty = self.dirty.borrow_mut();
        if dirty.iter().all(|queued| queued != instance) {
            dirty.push_back(instance.clone());
        }
    }
}

// === Counter component ===

type ClickHandler = Rc<dyn Fn()>;

/// Hook-driven counter body. Returns the rendered line and publishes
/// the current click handler through `clicks`.
fn counter(step: &Context<i32>, clicks: &RefCell<Option<ClickHandler>>) -> String {
    let step = use_context(step);
    let (count, set_count) = use_state(|| 0);
    let widget = use_id();

    let on_click = use_callback((step, set_count.clone()), {
        let set_count = set_count.clone();
        move || set_count.update(move |count| count + step)
    });
    let handler: ClickHandler = on_click;
    *clicks.borrow_mut() = Some(handler);

    let line = format!("[{widget}] count = {count} (step {step})");
    {
        let line = line.clone();
        use_effect_with(count, move || {
            println!("  [mounted] {line}");
            Cleanup::new(move || println!("  [cleanup] {line}"))
        });
    }
    line
}

fn click(clicks: &RefCell<Option<ClickHandler>>) {
    let handler = clicks.borrow().clone();
    if let Some(handler) = handler {
        handler();
    }
}

// === Engine loop ===

fn render(runtime: &Runtime, instance: &Instance, body: impl FnOnce() -> String) -> String {
    runtime.before_render(instance);
    let view = body();
    runtime.after_diff(instance);
    runtime.commit(std::slice::from_ref(instance));
    view
}

fn main() {
    env_logger::init();
    log::info!("counter demo starting");

    let host = LoopHost::new();
    let renderer = Rc::new(QueueRenderer::default());
    let runtime = Runtime::new(host.clone(), renderer.clone());

    let step = create_context(|| 1);
    let root = Instance::root();
    let counter_instance = Instance::child_of(&root);

    let step_provider = ProviderState::new(runtime.handle(), 2);
    root.attach_provider(step.id(), step_provider.clone());

    let clicks: RefCell<Option<ClickHandler>> = RefCell::new(None);
    let draw = |instance: &Instance| {
        let view = render(&runtime, instance, || counter(&step, &clicks));
        println!("render: {view}");
    };
    let drain = |label: &str| {
        println!("-- {label} --");
        while let Some(instance) = renderer.take_dirty() {
            draw(&instance);
        }
        host.run_pending();
    };

    println!("-- mount --");
    draw(&counter_instance);
    host.run_pending();

    click(&clicks);
    click(&clicks);
    drain("two clicks");

    step_provider.set_value(10);
    drain("provider pushes step = 10");

    click(&clicks);
    drain("one click at the new step");

    println!("-- unmount --");
    runtime.unmount(&counter_instance);
}
