//! The hook constructors.
//!
//! Free functions, callable only while an instance is rendering. Each
//! call claims the next slot by call order, so the set and order of
//! hook calls must be identical on every render of a component.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::context::Context;
use crate::effects::{deps_changed, Cleanup, EffectSlot};
use crate::error::CaughtError;
use crate::instance::Instance;
use crate::ref_box::RefBox;
use crate::runtime::{active_runtime, RuntimeHandle, RuntimeInner};
use crate::HookKind;

/// Claim the next slot index on the rendering instance, notify
/// devtools and hand back the slot plus the cursor owners.
fn hook_slot<T: 'static>(
    kind: HookKind,
    init: impl FnOnce() -> T,
) -> (Rc<T>, Instance, Rc<RuntimeInner>) {
    let runtime = active_runtime();
    let instance = runtime.current_instance();
    let index = runtime.advance_cursor();
    runtime.notify_devtools(&instance, index, kind);
    let slot = instance.slot_at(index, init);
    (slot, instance, runtime)
}

struct ReducerSlot<S, A> {
    value: RefCell<S>,
    reducer: RefCell<Option<Rc<dyn Fn(&S, A) -> S>>>,
    dispatch: RefCell<Option<Dispatch<A>>>,
}

/// Stable handle that folds actions into a reducer slot.
///
/// Cloneable and usable from anywhere on the runtime thread, including
/// outside renders. Equality is handle identity: the dispatch for a
/// slot never changes for the life of that slot.
pub struct Dispatch<A> {
    send: Rc<dyn Fn(A)>,
}

impl<A> Clone for Dispatch<A> {
    fn clone(&self) -> Self {
        Self {
            send: Rc::clone(&self.send),
        }
    }
}

impl<A> PartialEq for Dispatch<A> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.send, &other.send)
    }
}

impl<A> Eq for Dispatch<A> {}

impl<A> Dispatch<A> {
    pub fn dispatch(&self, action: A) {
        (self.send)(action);
    }
}

/// Reducer-backed state.
///
/// `init` runs once, on the slot's first render. Every render stores
/// the latest `reducer`, so a dispatch always folds with the newest
/// one even when it captured fresher environment. Dispatching an
/// action whose result compares equal to the current state is a
/// complete no-op; otherwise the slot is updated and a re-render of
/// the owning instance is requested.
pub fn use_reducer<S, A>(
    reducer: impl Fn(&S, A) -> S + 'static,
    init: impl FnOnce() -> S,
) -> (S, Dispatch<A>)
where
    S: Clone + PartialEq + 'static,
    A: 'static,
{
    let (slot, instance, runtime) = hook_slot(HookKind::Reducer, || ReducerSlot::<S, A> {
        value: RefCell::new(init()),
        reducer: RefCell::new(None),
        dispatch: RefCell::new(None),
    });
    *slot.reducer.borrow_mut() = Some(Rc::new(reducer));
    let dispatch = {
        let existing = slot.dispatch.borrow().clone();
        match existing {
            Some(dispatch) => dispatch,
            None => {
                let dispatch = make_dispatch(&slot, &instance, &runtime);
                *slot.dispatch.borrow_mut() = Some(dispatch.clone());
                dispatch
            }
        }
    };
    let value = slot.value.borrow().clone();
    (value, dispatch)
}

fn make_dispatch<S, A>(
    slot: &Rc<ReducerSlot<S, A>>,
    owner: &Instance,
    runtime: &Rc<RuntimeInner>,
) -> Dispatch<A>
where
    S: Clone + PartialEq + 'static,
    A: 'static,
{
    let slot = Rc::downgrade(slot);
    let owner = owner.downgrade();
    let runtime = RuntimeHandle(Rc::downgrade(runtime));
    Dispatch {
        send: Rc::new(move |action: A| {
            let Some(slot) = slot.upgrade() else {
                return;
            };
            let Some(reducer) = slot.reducer.borrow().clone() else {
                return;
            };
            let current = slot.value.borrow().clone();
            let next = reducer(&current, action);
            if next != current {
                *slot.value.borrow_mut() = next;
                if let Some(owner) = owner.upgrade() {
                    runtime.request_render(&owner);
                }
            }
        }),
    }
}

enum StateUpdate<T> {
    Set(T),
    Map(Box<dyn FnOnce(&T) -> T>),
}

impl<T> StateUpdate<T> {
    fn apply(self, current: &T) -> T {
        match self {
            StateUpdate::Set(value) => value,
            StateUpdate::Map(f) => f(current),
        }
    }
}

/// Setter half of `use_state`. Clones share the slot; equality is
/// handle identity, stable across renders.
pub struct StateSetter<T> {
    dispatch: Dispatch<StateUpdate<T>>,
}

impl<T> Clone for StateSetter<T> {
    fn clone(&self) -> Self {
        Self {
            dispatch: self.dispatch.clone(),
        }
    }
}

impl<T> PartialEq for StateSetter<T> {
    fn eq(&self, other: &Self) -> bool {
        self.dispatch == other.dispatch
    }
}

impl<T> Eq for StateSetter<T> {}

impl<T: 'static> StateSetter<T> {
    /// Replace the state with `value`.
    pub fn set(&self, value: T) {
        self.dispatch.dispatch(StateUpdate::Set(value));
    }

    /// Replace the state with `f` applied to the current value.
    pub fn update(&self, f: impl FnOnce(&T) -> T + 'static) {
        self.dispatch.dispatch(StateUpdate::Map(Box::new(f)));
    }
}

/// Plain local state: `use_reducer` with a pass-through reducer.
pub fn use_state<T>(init: impl FnOnce() -> T) -> (T, StateSetter<T>)
where
    T: Clone + PartialEq + 'static,
{
    active_runtime().set_pending_kind(HookKind::State);
    let (value, dispatch) =
        use_reducer(|current: &T, update: StateUpdate<T>| update.apply(current), init);
    (value, StateSetter { dispatch })
}

struct MemoSlot<T> {
    value: RefCell<Option<Rc<T>>>,
    deps: RefCell<Option<Box<dyn Any>>>,
}

/// Cache `factory`'s result until `deps` changes.
///
/// `deps` follows the dependency rule: recompute on the first render,
/// when the stored dependency value has a different type, or when it
/// compares unequal. `()` means compute once.
pub fn use_memo<T, D>(deps: D, factory: impl FnOnce() -> T) -> Rc<T>
where
    T: 'static,
    D: PartialEq + 'static,
{
    let (slot, _instance, _runtime) = hook_slot(HookKind::Memo, || MemoSlot::<T> {
        value: RefCell::new(None),
        deps: RefCell::new(None),
    });
    let stale = deps_changed(&slot.deps.borrow(), &deps);
    if stale {
        let value = Rc::new(factory());
        *slot.value.borrow_mut() = Some(Rc::clone(&value));
        *slot.deps.borrow_mut() = Some(Box::new(deps));
        return value;
    }
    let value = slot.value.borrow().clone();
    value.expect("memoized value exists whenever stored deps match")
}

/// Memoize a closure itself; the returned `Rc` keeps its identity
/// while `deps` stays unchanged, which is what child memoization
/// wants to compare.
pub fn use_callback<F, D>(deps: D, callback: F) -> Rc<F>
where
    F: 'static,
    D: PartialEq + 'static,
{
    active_runtime().set_pending_kind(HookKind::Callback);
    use_memo(deps, move || callback)
}

/// Mutable box created once and stable for the instance's lifetime.
/// Writing to it does not trigger renders.
pub fn use_ref<T: 'static>(init: impl FnOnce() -> T) -> RefBox<T> {
    active_runtime().set_pending_kind(HookKind::Ref);
    let slot = use_memo((), move || RefBox::new(init()));
    (*slot).clone()
}

fn effect_impl<D>(
    kind: HookKind,
    deps: Option<D>,
    effect: impl FnOnce() -> Cleanup + 'static,
    layout: bool,
) where
    D: PartialEq + 'static,
{
    // The slot index is consumed and devtools notified even when the
    // effect ends up skipped; call order must stay stable.
    let (slot, instance, runtime) = hook_slot(kind, EffectSlot::default);
    let changed = match &deps {
        Some(deps) => slot.should_run(deps),
        None => true,
    };
    if runtime.effects_suppressed() || !changed {
        return;
    }
    slot.store(
        Box::new(effect),
        deps.map(|deps| Box::new(deps) as Box<dyn Any>),
    );
    if layout {
        instance.enqueue_commit_callback(slot);
    } else {
        instance.enqueue_pending_effect(slot);
    }
}

/// Deferred effect that runs after every render, once the host has
/// had a chance to paint.
pub fn use_effect(effect: impl FnOnce() -> Cleanup + 'static) {
    effect_impl(HookKind::Effect, None::<()>, effect, false);
}

/// Deferred effect gated by the dependency rule.
pub fn use_effect_with<D>(deps: D, effect: impl FnOnce() -> Cleanup + 'static)
where
    D: PartialEq + 'static,
{
    effect_impl(HookKind::Effect, Some(deps), effect, false);
}

/// Layout effect that runs synchronously at commit, before paint.
pub fn use_layout_effect(effect: impl FnOnce() -> Cleanup + 'static) {
    effect_impl(HookKind::LayoutEffect, None::<()>, effect, true);
}

/// Layout effect gated by the dependency rule.
pub fn use_layout_effect_with<D>(deps: D, effect: impl FnOnce() -> Cleanup + 'static)
where
    D: PartialEq + 'static,
{
    effect_impl(HookKind::LayoutEffect, Some(deps), effect, true);
}

#[derive(Default)]
struct ContextSlot {
    subscribed: Cell<bool>,
}

/// Read the nearest ancestor provider's value, or the context default
/// when none is in scope.
///
/// The first read that finds a provider subscribes the instance to it;
/// later renders reuse that subscription. Providers push updates by
/// requesting re-renders, and the re-render reads the new value here.
pub fn use_context<T>(context: &Context<T>) -> T
where
    T: Clone + 'static,
{
    let (slot, instance, _runtime) = hook_slot(HookKind::Context, ContextSlot::default);
    match instance.find_provider(context.id()) {
        Some(site) => {
            if !slot.subscribed.get() {
                slot.subscribed.set(true);
                site.subscribe(&instance);
            }
            let value = site
                .value()
                .downcast::<T>()
                .ok()
                .expect("context value type does not match the context handle");
            (*value).clone()
        }
        None => context.default_value(),
    }
}

#[derive(Default)]
struct BoundarySlot {
    on_error: RefCell<Option<Rc<dyn Fn(&CaughtError)>>>,
}

/// Clears a boundary's stored error. Equality is handle identity.
#[derive(Clone, PartialEq, Eq)]
pub struct BoundaryReset {
    setter: StateSetter<Option<CaughtError>>,
}

impl BoundaryReset {
    pub fn reset(&self) {
        self.setter.set(None);
    }
}

/// Make this instance an error boundary for its descendants.
///
/// Returns the currently caught error, if any, and a reset handle.
/// The handler is registered once per instance lifetime but reads the
/// slot when invoked, so it always forwards to the `on_error` passed
/// to the latest render. Storing the error goes through state, which
/// re-renders the boundary; storing the same error again is the usual
/// equal-state no-op.
pub fn use_error_boundary(
    on_error: impl Fn(&CaughtError) + 'static,
) -> (Option<CaughtError>, BoundaryReset) {
    let (slot, instance, _runtime) = hook_slot(HookKind::ErrorBoundary, BoundarySlot::default);
    *slot.on_error.borrow_mut() = Some(Rc::new(on_error));
    let (error, setter) = use_state(|| None::<CaughtError>);
    if !instance.has_error_handler() {
        let slot = Rc::downgrade(&slot);
        let store = setter.clone();
        instance.set_error_handler(Rc::new(move |error: &CaughtError| {
            if let Some(slot) = slot.upgrade() {
                let callback = slot.on_error.borrow().clone();
                if let Some(callback) = callback {
                    callback(error);
                }
            }
            store.set(Some(error.clone()));
        }));
    }
    (error, BoundaryReset { setter })
}

#[derive(Default)]
struct IdSlot {
    id: RefCell<Option<String>>,
}

/// Identifier unique within the render pass and stable across
/// re-renders of this instance.
pub fn use_id() -> String {
    let (slot, instance, runtime) = hook_slot(HookKind::Id, IdSlot::default);
    let mut id = slot.id.borrow_mut();
    match &*id {
        Some(id) => id.clone(),
        None => {
            let fresh = format!("{}-{}", instance.depth(), runtime.next_id_number());
            *id = Some(fresh.clone());
            fresh
        }
    }
}

/// Surface a value to devtools. Consumes no slot; without a devtools
/// collaborator this does nothing.
pub fn use_debug_value<T: fmt::Debug>(value: &T) {
    active_runtime().report_debug_value(|| format!("{value:?}"));
}

/// Like `use_debug_value` with a custom formatter, which only runs
/// when devtools is installed.
pub fn use_debug_value_with<T>(value: &T, format: impl FnOnce(&T) -> String) {
    active_runtime().report_debug_value(|| format(value));
}

/// Publish a handle for this instance into `target` at commit and
/// clear it on teardown.
///
/// Rebuilds when `deps` changes or when `target` is a different box.
pub fn use_imperative_handle<H, D>(
    target: &RefBox<Option<H>>,
    deps: D,
    create: impl FnOnce() -> H + 'static,
) where
    H: 'static,
    D: PartialEq + 'static,
{
    active_runtime().set_pending_kind(HookKind::ImperativeHandle);
    let publish = target.clone();
    let clear = target.clone();
    use_layout_effect_with((deps, target.clone()), move || {
        publish.set(Some(create()));
        Cleanup::new(move || clear.set(None))
    });
}
