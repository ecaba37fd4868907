use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

/// Error captured from a panicking effect, cleanup, or render.
///
/// Clones share one capsule and equality compares capsule identity: a
/// boundary re-rendering with the error it already stored must see it
/// as unchanged.
#[derive(Clone)]
pub struct CaughtError {
    inner: Rc<ErrorInner>,
}

struct ErrorInner {
    message: String,
}

impl CaughtError {
    /// Wrap a message produced by the engine or a test.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            inner: Rc::new(ErrorInner {
                message: message.into(),
            }),
        }
    }

    /// Extract a readable message from a panic payload.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(text) = payload.downcast_ref::<&'static str>() {
            (*text).to_string()
        } else if let Some(text) = payload.downcast_ref::<String>() {
            text.clone()
        } else {
            String::from("opaque panic payload")
        };
        Self::new(message)
    }

    pub fn message(&self) -> &str {
        &self.inner.message
    }
}

impl fmt::Display for CaughtError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner.message)
    }
}

impl fmt::Debug for CaughtError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CaughtError")
            .field(&self.inner.message)
            .finish()
    }
}

impl PartialEq for CaughtError {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for CaughtError {}

/// Run `f`, converting a panic into a `CaughtError`.
pub(crate) fn catch<R>(f: impl FnOnce() -> R) -> Result<R, CaughtError> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(CaughtError::from_panic)
}
