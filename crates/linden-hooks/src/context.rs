//! Tree-scoped value sharing between distant instances.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;

use crate::instance::{Instance, InstanceId, WeakInstance};
use crate::runtime::RuntimeHandle;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Identity shared by every handle cloned from one `create_context`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

/// Handle consumers pass to `use_context`.
///
/// The default value is produced lazily whenever no provider is in
/// scope above the consuming instance.
pub struct Context<T> {
    id: ContextId,
    default: Rc<dyn Fn() -> T>,
}

impl<T> Clone for Context<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            default: Rc::clone(&self.default),
        }
    }
}

impl<T> Context<T> {
    pub fn id(&self) -> ContextId {
        self.id
    }

    pub(crate) fn default_value(&self) -> T {
        (self.default)()
    }
}

/// Create a context with a lazily evaluated default.
pub fn create_context<T>(default: impl Fn() -> T + 'static) -> Context<T> {
    Context {
        id: ContextId(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed)),
        default: Rc::new(default),
    }
}

/// Engine-facing surface of a mounted provider.
///
/// The runtime only ever reads the current value and registers
/// subscribers; pushing updates back out stays with the provider.
pub trait ContextSite {
    /// Current provided value, type-erased for the slot store.
    fn value(&self) -> Rc<dyn Any>;

    /// Register `instance` for re-render when the value changes.
    /// Registering the same instance twice keeps one entry.
    fn subscribe(&self, instance: &Instance);
}

/// Reference provider implementation for engines and tests.
///
/// Holds the provided value and the live subscriber set; `set_value`
/// requests a re-render for every subscriber still alive.
pub struct ProviderState<T> {
    runtime: RuntimeHandle,
    value: RefCell<Rc<T>>,
    subscribers: RefCell<IndexMap<InstanceId, WeakInstance>>,
}

impl<T: 'static> ProviderState<T> {
    pub fn new(runtime: RuntimeHandle, value: T) -> Rc<Self> {
        Rc::new(Self {
            runtime,
            value: RefCell::new(Rc::new(value)),
            subscribers: RefCell::new(IndexMap::new()),
        })
    }

    /// Replace the provided value and re-render live subscribers.
    pub fn set_value(&self, value: T) {
        *self.value.borrow_mut() = Rc::new(value);
        let targets: Vec<Instance> = {
            let mut subscribers = self.subscribers.borrow_mut();
            subscribers.retain(|_, weak| weak.upgrade().is_some());
            subscribers
                .values()
                .filter_map(WeakInstance::upgrade)
                .collect()
        };
        for instance in targets {
            self.runtime.request_render(&instance);
        }
    }

    /// Current value without going through a hook.
    pub fn current(&self) -> Rc<T> {
        self.value.borrow().clone()
    }

    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.subscribers.borrow_mut();
        subscribers.retain(|_, weak| weak.upgrade().is_some());
        subscribers.len()
    }
}

impl<T: 'static> ContextSite for ProviderState<T> {
    fn value(&self) -> Rc<dyn Any> {
        let value: Rc<T> = self.value.borrow().clone();
        value
    }

    fn subscribe(&self, instance: &Instance) {
        self.subscribers
            .borrow_mut()
            .entry(instance.id())
            .or_insert_with(|| instance.downgrade());
    }
}
