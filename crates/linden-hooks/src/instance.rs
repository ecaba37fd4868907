//! Component instance handles and their hook slot storage.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::context::{ContextId, ContextSite};
use crate::effects::EffectSlot;
use crate::error::CaughtError;
use crate::Map;

static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier assigned to every instance at creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InstanceId(u64);

impl InstanceId {
    fn next() -> Self {
        InstanceId(NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

pub(crate) type ErrorHandler = Rc<dyn Fn(&CaughtError)>;

/// Handle to a mounted component instance.
///
/// The rendering engine creates instances and owns their lifetime; the
/// runtime reaches everything it needs (slots, effect queues, ancestry)
/// through this handle. Clones share the instance.
#[derive(Clone)]
pub struct Instance {
    inner: Rc<InstanceInner>,
}

/// Non-owning instance handle used by dispatchers and subscriber sets.
#[derive(Clone)]
pub struct WeakInstance(Weak<InstanceInner>);

struct InstanceInner {
    id: InstanceId,
    depth: usize,
    parent: Option<WeakInstance>,
    slots: RefCell<Vec<Rc<dyn Any>>>,
    pending_effects: RefCell<Vec<Rc<EffectSlot>>>,
    commit_callbacks: RefCell<Vec<Rc<EffectSlot>>>,
    error_handler: RefCell<Option<ErrorHandler>>,
    providers: RefCell<Map<ContextId, Rc<dyn ContextSite>>>,
    unmounting: Cell<bool>,
}

impl Instance {
    fn new(parent: Option<&Instance>) -> Self {
        Self {
            inner: Rc::new(InstanceInner {
                id: InstanceId::next(),
                depth: parent.map_or(0, |p| p.depth() + 1),
                parent: parent.map(Instance::downgrade),
                slots: RefCell::new(Vec::new()),
                pending_effects: RefCell::new(Vec::new()),
                commit_callbacks: RefCell::new(Vec::new()),
                error_handler: RefCell::new(None),
                providers: RefCell::new(Map::default()),
                unmounting: Cell::new(false),
            }),
        }
    }

    /// Create a root instance at depth 0.
    pub fn root() -> Self {
        Self::new(None)
    }

    /// Create a child of `parent`, one level deeper.
    pub fn child_of(parent: &Instance) -> Self {
        Self::new(Some(parent))
    }

    pub fn id(&self) -> InstanceId {
        self.inner.id
    }

    /// Distance from the root of the tree this instance belongs to.
    pub fn depth(&self) -> usize {
        self.inner.depth
    }

    /// Logical parent, if it is still alive.
    pub fn parent(&self) -> Option<Instance> {
        self.inner.parent.as_ref().and_then(WeakInstance::upgrade)
    }

    pub fn downgrade(&self) -> WeakInstance {
        WeakInstance(Rc::downgrade(&self.inner))
    }

    /// True once unmount processing has started for this instance.
    pub fn is_unmounting(&self) -> bool {
        self.inner.unmounting.get()
    }

    pub(crate) fn set_unmounting(&self) {
        self.inner.unmounting.set(true);
    }

    /// Attach a context provider covering this instance's subtree.
    ///
    /// Consumers strictly below this instance resolve `id` to `site`;
    /// the instance's own renders keep seeing the outer scope.
    pub fn attach_provider(&self, id: ContextId, site: Rc<dyn ContextSite>) {
        self.inner.providers.borrow_mut().insert(id, site);
    }

    fn provider(&self, id: ContextId) -> Option<Rc<dyn ContextSite>> {
        self.inner.providers.borrow().get(&id).cloned()
    }

    /// Nearest provider registered above this instance.
    pub(crate) fn find_provider(&self, id: ContextId) -> Option<Rc<dyn ContextSite>> {
        let mut ancestor = self.parent();
        while let Some(instance) = ancestor {
            if let Some(site) = instance.provider(id) {
                return Some(site);
            }
            ancestor = instance.parent();
        }
        None
    }

    /// Slot at `index`, creating it with `init` when the list is one
    /// short. A stored slot of a different type is replaced: that is
    /// the conditional-hook hazard, and the state it held is gone.
    pub(crate) fn slot_at<T: 'static>(&self, index: usize, init: impl FnOnce() -> T) -> Rc<T> {
        let mut slots = self.inner.slots.borrow_mut();
        if index < slots.len() {
            match Rc::clone(&slots[index]).downcast::<T>() {
                Ok(slot) => slot,
                Err(_) => {
                    log::warn!(
                        "hook slot {} of instance {:?} changed type between renders; \
                         resetting it (unstable hook call order?)",
                        index,
                        self.inner.id
                    );
                    let slot = Rc::new(init());
                    slots[index] = slot.clone() as Rc<dyn Any>;
                    slot
                }
            }
        } else {
            debug_assert_eq!(index, slots.len());
            let slot = Rc::new(init());
            slots.push(slot.clone() as Rc<dyn Any>);
            slot
        }
    }

    /// Every slot in call order, for the unmount cleanup walk.
    pub(crate) fn slots_snapshot(&self) -> Vec<Rc<dyn Any>> {
        self.inner.slots.borrow().clone()
    }

    pub(crate) fn enqueue_pending_effect(&self, slot: Rc<EffectSlot>) {
        self.inner.pending_effects.borrow_mut().push(slot);
    }

    pub(crate) fn has_pending_effects(&self) -> bool {
        !self.inner.pending_effects.borrow().is_empty()
    }

    pub(crate) fn take_pending_effects(&self) -> Vec<Rc<EffectSlot>> {
        self.inner.pending_effects.borrow_mut().drain(..).collect()
    }

    pub(crate) fn enqueue_commit_callback(&self, slot: Rc<EffectSlot>) {
        self.inner.commit_callbacks.borrow_mut().push(slot);
    }

    pub(crate) fn take_commit_callbacks(&self) -> Vec<Rc<EffectSlot>> {
        self.inner.commit_callbacks.borrow_mut().drain(..).collect()
    }

    pub(crate) fn has_error_handler(&self) -> bool {
        self.inner.error_handler.borrow().is_some()
    }

    pub(crate) fn set_error_handler(&self, handler: ErrorHandler) {
        *self.inner.error_handler.borrow_mut() = Some(handler);
    }

    pub(crate) fn error_handler(&self) -> Option<ErrorHandler> {
        self.inner.error_handler.borrow().clone()
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Instance {}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("id", &self.inner.id)
            .field("depth", &self.inner.depth)
            .finish()
    }
}

impl WeakInstance {
    pub fn upgrade(&self) -> Option<Instance> {
        self.0.upgrade().map(|inner| Instance { inner })
    }
}
