//! Effect records shared by layout and paint-deferred execution.

use std::any::Any;
use std::cell::RefCell;

pub(crate) type EffectFn = Box<dyn FnOnce() -> Cleanup>;
pub(crate) type CleanupFn = Box<dyn FnOnce()>;

/// Teardown returned by an effect body.
///
/// `Cleanup::none()` when there is nothing to undo; `Cleanup::new`
/// wraps the closure that runs before the effect's next invocation and
/// at unmount.
#[derive(Default)]
pub struct Cleanup(Option<CleanupFn>);

impl Cleanup {
    pub fn new(f: impl FnOnce() + 'static) -> Self {
        Self(Some(Box::new(f)))
    }

    pub fn none() -> Self {
        Self(None)
    }

    pub(crate) fn into_inner(self) -> Option<CleanupFn> {
        self.0
    }
}

/// One hook slot's effect record.
///
/// Layout and deferred effects share this shape; only the queue the
/// record lands on differs. The callback and cleanup cells use take
/// semantics, so each stored closure runs at most once.
#[derive(Default)]
pub(crate) struct EffectSlot {
    effect: RefCell<Option<EffectFn>>,
    deps: RefCell<Option<Box<dyn Any>>>,
    cleanup: RefCell<Option<CleanupFn>>,
}

impl EffectSlot {
    pub(crate) fn store(&self, effect: EffectFn, deps: Option<Box<dyn Any>>) {
        *self.effect.borrow_mut() = Some(effect);
        *self.deps.borrow_mut() = deps;
    }

    /// Dependency gate: run iff nothing is stored, the stored value is
    /// not a `D`, or the stored value compares unequal.
    pub(crate) fn should_run<D: PartialEq + 'static>(&self, deps: &D) -> bool {
        deps_changed(&self.deps.borrow(), deps)
    }

    pub(crate) fn take_effect(&self) -> Option<EffectFn> {
        self.effect.borrow_mut().take()
    }

    pub(crate) fn take_cleanup(&self) -> Option<CleanupFn> {
        self.cleanup.borrow_mut().take()
    }

    pub(crate) fn set_cleanup(&self, cleanup: Option<CleanupFn>) {
        *self.cleanup.borrow_mut() = cleanup;
    }
}

/// The single definition of the dependency rule.
///
/// `None` means no previous value (first run, or an always-run
/// constructor), a failed downcast means the list changed shape, and
/// everything else is a pairwise value comparison.
pub(crate) fn deps_changed<D: PartialEq + 'static>(
    stored: &Option<Box<dyn Any>>,
    deps: &D,
) -> bool {
    match stored {
        Some(stored) => match stored.downcast_ref::<D>() {
            Some(previous) => previous != deps,
            None => true,
        },
        None => true,
    }
}
