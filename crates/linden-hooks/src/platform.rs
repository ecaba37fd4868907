//! Host service traits the hook runtime is constructed with.
//!
//! The runtime never talks to an event loop, a frame source, or a
//! renderer directly; the embedding engine hands in these collaborators
//! and tests swap them for manual implementations.

use std::rc::Rc;
use std::time::Duration;

use crate::error::CaughtError;
use crate::instance::Instance;
use crate::HookKind;

/// Identifier for a scheduled frame or timer callback.
pub type CallbackId = u64;

/// Replaceable "schedule for next frame" primitive.
///
/// When installed via `Runtime::set_frame_scheduler` it takes
/// precedence over the built-in frame/timer race.
pub type FrameSchedulerFn = Rc<dyn Fn(Box<dyn FnOnce()>)>;

/// Requests component re-renders on behalf of the runtime.
///
/// State dispatched out of band (timers, IO callbacks, effects) lands
/// here; the engine owns the timing and batching of the actual render.
pub trait RenderScheduler {
    /// Ask the engine to re-render `instance` at its next opportunity.
    fn request_render(&self, instance: &Instance);
}

/// Frame and timer services supplied by the embedding host.
///
/// The runtime assumes a single-threaded cooperative host: callbacks
/// run on the thread that drives the runtime, after the current unit
/// of work has returned to the event loop.
pub trait HostScheduler {
    /// Schedule `callback` to run once the next frame has been
    /// presented. Hosts without a frame source return `None` and the
    /// runtime falls back to timers alone.
    fn request_frame(&self, callback: Box<dyn FnOnce()>) -> Option<CallbackId>;

    /// Cancel a previously requested frame callback.
    fn cancel_frame(&self, id: CallbackId);

    /// Schedule `callback` to run once after `delay`.
    fn set_timeout(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> CallbackId;

    /// Cancel a pending timer.
    fn clear_timeout(&self, id: CallbackId);
}

/// Receives errors no boundary in the tree handled.
pub trait ErrorReporter {
    fn report(&self, error: &CaughtError, origin: Option<&Instance>);
}

/// Default reporter: forwards uncaught errors to the log.
#[derive(Default)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, error: &CaughtError, origin: Option<&Instance>) {
        match origin {
            Some(instance) => log::error!(
                "uncaught error from component instance {:?}: {}",
                instance.id(),
                error
            ),
            None => log::error!("uncaught error: {}", error),
        }
    }
}

/// Inspection points for devtools integrations.
pub trait DevtoolsHooks {
    /// Called on every hook slot access with the hook's call-order
    /// index and kind.
    fn hook_invoked(&self, instance: &Instance, index: usize, kind: HookKind);

    /// Receives values surfaced through `use_debug_value`.
    fn debug_value(&self, value: String) {
        let _ = value;
    }
}
