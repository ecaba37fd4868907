use std::cell::RefCell;
use std::rc::Rc;

/// Single-threaded mutable box with identity stable across renders.
///
/// `use_ref` hands these out: the handle clones cheaply while the value
/// itself stays owned by the slot that created it. Equality compares
/// handle identity, which is what dependency lists want from a ref.
pub struct RefBox<T> {
    inner: Rc<RefCell<T>>,
}

impl<T> Clone for RefBox<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> RefBox<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(value)),
        }
    }

    /// Run `f` with an immutable reference to the stored value.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let borrow = self.inner.borrow();
        f(&*borrow)
    }

    /// Run `f` with a mutable reference to the stored value.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut borrow = self.inner.borrow_mut();
        f(&mut *borrow)
    }

    /// Store a new value, dropping the old one.
    pub fn set(&self, value: T) {
        *self.inner.borrow_mut() = value;
    }

    /// Store a new value and return the old one.
    pub fn replace(&self, value: T) -> T {
        self.inner.replace(value)
    }
}

impl<T: Clone> RefBox<T> {
    /// Clone the stored value out of the box.
    pub fn get(&self) -> T {
        self.inner.borrow().clone()
    }
}

impl<T> PartialEq for RefBox<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> Eq for RefBox<T> {}
