//! Indirect read/write access to a value owned elsewhere.
//!
//! An [`AccessDelegate`] is a getter/setter closure pair. Widgets get one
//! instead of a reference to the storage, so the owner decides what a write
//! means (e.g. updating a node attribute and notifying listeners).

use serde_json::Value;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

type Getter<T> = Arc<dyn Fn() -> T + Send + Sync>;
type Setter<T> = Arc<dyn Fn(T) + Send + Sync>;

/// Getter/setter pair bound to some storage location.
///
/// Values are untyped JSON unless a type is given.
///
/// # Example
///
/// ```
/// use nrs_libs::AccessDelegate;
/// use serde_json::json;
///
/// let delegate = AccessDelegate::with_initial(json!(0.5));
/// delegate.set(json!(0.75));
/// assert_eq!(delegate.get(), json!(0.75));
/// ```
pub struct AccessDelegate<T = Value> {
    getter: Getter<T>,
    setter: Setter<T>,
}

impl<T> Clone for AccessDelegate<T> {
    fn clone(&self) -> Self {
        Self {
            getter: Arc::clone(&self.getter),
            setter: Arc::clone(&self.setter),
        }
    }
}

impl<T> fmt::Debug for AccessDelegate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessDelegate").finish_non_exhaustive()
    }
}

impl<T: 'static> AccessDelegate<T> {
    pub fn new<G, S>(get: G, set: S) -> Self
    where
        G: Fn() -> T + Send + Sync + 'static,
        S: Fn(T) + Send + Sync + 'static,
    {
        Self {
            getter: Arc::new(get),
            setter: Arc::new(set),
        }
    }

    /// Current value at the target
    pub fn get(&self) -> T {
        (self.getter)()
    }

    /// Store `value` at the target
    pub fn set(&self, value: T) {
        (self.setter)(value)
    }

    /// View this delegate through a pair of conversions.
    ///
    /// `to` converts values read from the target, `from` converts values
    /// before they are written back.
    pub fn map<U, To, From>(self, to: To, from: From) -> AccessDelegate<U>
    where
        U: 'static,
        To: Fn(T) -> U + Send + Sync + 'static,
        From: Fn(U) -> T + Send + Sync + 'static,
    {
        let getter = self.getter;
        let setter = self.setter;
        AccessDelegate::new(move || to(getter()), move |value| setter(from(value)))
    }
}

impl<T: Clone + Send + Sync + 'static> AccessDelegate<T> {
    /// Bind to a shared cell
    pub fn shared(cell: Arc<RwLock<T>>) -> Self {
        let read = Arc::clone(&cell);
        Self::new(
            move || read.read().unwrap_or_else(PoisonError::into_inner).clone(),
            move |value| *cell.write().unwrap_or_else(PoisonError::into_inner) = value,
        )
    }

    /// Bind to a fresh cell holding `initial`
    pub fn with_initial(initial: T) -> Self {
        Self::shared(Arc::new(RwLock::new(initial)))
    }
}
