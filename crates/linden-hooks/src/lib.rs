#![doc = r"Hook state and effect scheduling runtime for Linden component trees.

Gives stateless component functions persistent local state (`use_state`,
`use_reducer`, `use_ref`, `use_memo`), managed side effects in two
phases (`use_layout_effect` at commit, `use_effect` after paint),
tree-scoped values (`use_context`) and error containment
(`use_error_boundary`). State is addressed by hook call order within
the instance being rendered, so a component must call the same hooks in
the same order on every render.

The crate renders nothing itself. A host engine owns the component
tree, creates `Instance` handles and drives a `Runtime` through its
four lifecycle entry points; everything host-specific (re-render
requests, frames, timers) comes in through the traits in `platform`."]

pub mod context;
pub mod effects;
pub mod error;
pub mod hooks;
pub mod instance;
pub mod platform;
pub mod ref_box;
pub mod runtime;
mod scheduler;

pub use context::{create_context, Context, ContextId, ContextSite, ProviderState};
pub use effects::Cleanup;
pub use error::CaughtError;
pub use hooks::{
    use_callback, use_context, use_debug_value, use_debug_value_with, use_effect,
    use_effect_with, use_error_boundary, use_id, use_imperative_handle, use_layout_effect,
    use_layout_effect_with, use_memo, use_reducer, use_ref, use_state, BoundaryReset, Dispatch,
    StateSetter,
};
pub use instance::{Instance, InstanceId, WeakInstance};
pub use platform::{
    CallbackId, DevtoolsHooks, ErrorReporter, FrameSchedulerFn, HostScheduler, LogReporter,
    RenderScheduler,
};
pub use ref_box::RefBox;
pub use runtime::{Runtime, RuntimeHandle};
pub use scheduler::FRAME_FALLBACK_TIMEOUT;

/// Hook kind reported to devtools on every slot access. Composite
/// hooks report themselves, not the slot they build on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HookKind {
    State,
    Reducer,
    Effect,
    LayoutEffect,
    Ref,
    ImperativeHandle,
    Memo,
    Callback,
    Context,
    ErrorBoundary,
    Id,
}

pub(crate) type Map<K, V> = hashbrown::HashMap<K, V, ahash::RandomState>;

#[cfg(test)]
mod tests;
