//! Double-checked locking written out explicitly.
//!
//! A [`CheckedCell`] keeps a three-state flag next to a value slot and a mutex.
//! Readers first load the flag with `Acquire` ordering and return immediately
//! when it says [`InitState::Initialized`]. Only callers that race the first
//! initialization take the mutex, re-check the flag and, if they won, construct
//! the value and publish it with a `Release` store.
use std::cell::UnsafeCell;
use std::fmt;
use std::mem::{self, MaybeUninit};
use std::ops::Deref;
use std::sync::atomic::Ordering;
use std::sync::{Mutex, PoisonError};

use crate::state::{AtomicState, InitState};
use crate::Accessor;

/// A cell that is written at most once, guarded by a check-lock-check protocol
///
/// # Example
///
/// ```
/// use lazy_singleton::CheckedCell;
///
/// static GREETING: CheckedCell<String> = CheckedCell::new();
///
/// assert!(GREETING.get().is_none());
/// let first = GREETING.get_or_init(|| "hello".to_owned());
/// let second = GREETING.get_or_init(|| unreachable!());
/// assert!(std::ptr::eq(first, second));
/// ```
pub struct CheckedCell<T> {
    state: AtomicState,
    lock: Mutex<()>,
    value: UnsafeCell<MaybeUninit<T>>,
}

// SAFETY: the slot is only written by the thread holding `lock` while the
// state is `Initializing`, and only read after an `Acquire` load observed
// `Initialized`, which synchronizes with the `Release` store made after the
// write. Sharing `&T` across threads needs `T: Sync`, and the value may be
// dropped on another thread than the one that built it, hence `T: Send`.
unsafe impl<T: Send + Sync> Sync for CheckedCell<T> {}

impl<T> CheckedCell<T> {
    /// Creates an empty cell
    pub const fn new() -> Self {
        Self {
            state: AtomicState::new(InitState::Uninitialized),
            lock: Mutex::new(()),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    /// Returns the current initialization state
    pub fn state(&self) -> InitState {
        self.state.load(Ordering::Acquire)
    }

    /// Returns `true` once a value has been published
    pub fn is_initialized(&self) -> bool {
        self.state().is_initialized()
    }

    /// Returns the value if it has already been published, without blocking
    #[inline]
    pub fn get(&self) -> Option<&T> {
        if self.is_initialized() {
            // SAFETY: the `Acquire` load above observed `Initialized`.
            Some(unsafe { self.get_unchecked() })
        } else {
            None
        }
    }

    /// Returns the value, constructing it with `init` if no value is published yet
    ///
    /// Concurrent callers block until the winning thread has published its value.
    /// Calling this from inside `init` on the same cell deadlocks.
    #[inline]
    pub fn get_or_init(&self, init: impl FnOnce() -> T) -> &T {
        match self.get_or_try_init(|| Ok::<T, std::convert::Infallible>(init())) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Same as [`CheckedCell::get_or_init`] but `init` may fail
    ///
    /// When `init` returns an error (or panics), the cell goes back to
    /// [`InitState::Uninitialized`] and a later call can try again.
    ///
    /// # Example
    ///
    /// ```
    /// use lazy_singleton::{CheckedCell, InitState};
    ///
    /// let cell = CheckedCell::new();
    /// assert_eq!(cell.get_or_try_init(|| "nope".parse::<u32>()).ok(), None);
    /// assert_eq!(cell.state(), InitState::Uninitialized);
    ///
    /// assert_eq!(cell.get_or_try_init(|| "42".parse::<u32>()), Ok(&42));
    /// ```
    pub fn get_or_try_init<E>(&self, init: impl FnOnce() -> Result<T, E>) -> Result<&T, E> {
        if let Some(value) = self.get() {
            return Ok(value);
        }

        self.initialize(init)?;

        // SAFETY: `initialize` only returns `Ok` once the state is `Initialized`.
        Ok(unsafe { self.get_unchecked() })
    }

    /// Publishes `value` unless the cell is already initialized, in which case
    /// `value` is handed back
    pub fn set(&self, value: T) -> Result<(), T> {
        let mut value = Some(value);
        self.get_or_init(|| value.take().unwrap_or_else(|| unreachable!()));

        match value {
            None => Ok(()),
            Some(value) => Err(value),
        }
    }

    /// Moves the value out and resets the cell to [`InitState::Uninitialized`]
    ///
    /// Requires exclusive access, so a cell stored in a `static` can never be reset.
    pub fn take(&mut self) -> Option<T> {
        if !self.state.get_mut().is_initialized() {
            return None;
        }

        self.state.set_mut(InitState::Uninitialized);
        // SAFETY: the state was `Initialized`, and it has just been reset so the
        // value will not be read or dropped a second time.
        Some(unsafe { self.value.get_mut().assume_init_read() })
    }

    /// Consumes the cell and returns the value, if any
    pub fn into_inner(mut self) -> Option<T> {
        self.take()
    }

    #[cold]
    fn initialize<E>(&self, init: impl FnOnce() -> Result<T, E>) -> Result<(), E> {
        log::trace!(
            "taking the slow path for `{}`",
            std::any::type_name::<T>()
        );

        // A poisoned lock only means a previous initializer panicked, and the
        // reset guard already rolled the state back in that case.
        let _lock = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        if self.state.load(Ordering::Acquire).is_initialized() {
            return Ok(());
        }

        self.state.store(InitState::Initializing, Ordering::Relaxed);
        let reset = ResetOnDrop(&self.state);

        let value = init()?;

        // SAFETY: we hold the lock and the state is `Initializing`, so no other
        // thread reads or writes the slot.
        unsafe { (*self.value.get()).write(value) };

        mem::forget(reset);
        self.state.store(InitState::Initialized, Ordering::Release);

        log::debug!("published instance of `{}`", std::any::type_name::<T>());

        Ok(())
    }

    /// # Safety
    ///
    /// The state must have been observed as `Initialized` with `Acquire` ordering.
    #[inline]
    unsafe fn get_unchecked(&self) -> &T {
        (*self.value.get()).assume_init_ref()
    }
}

impl<T> Default for CheckedCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for CheckedCell<T> {
    fn drop(&mut self) {
        if self.state.get_mut().is_initialized() {
            // SAFETY: the value was published and `&mut self` guarantees nobody
            // else holds a reference to it.
            unsafe { self.value.get_mut().assume_init_drop() };
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for CheckedCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_tuple("CheckedCell");
        match self.get() {
            Some(value) => d.field(value),
            None => d.field(&format_args!("<{:?}>", self.state())),
        };
        d.finish()
    }
}

/// Rolls the state back to `Uninitialized` if initialization does not complete
struct ResetOnDrop<'a>(&'a AtomicState);

impl Drop for ResetOnDrop<'_> {
    fn drop(&mut self) {
        self.0.store(InitState::Uninitialized, Ordering::Release);
    }
}

/// A value built on first access through a [`CheckedCell`]
///
/// # Example
///
/// ```
/// use lazy_singleton::CheckedLazy;
///
/// static PRIMES: CheckedLazy<Vec<u32>> = CheckedLazy::new(|| vec![2, 3, 5, 7]);
///
/// assert_eq!(PRIMES.len(), 4);
/// assert!(std::ptr::eq(CheckedLazy::force(&PRIMES), &*PRIMES));
/// ```
pub struct CheckedLazy<T, F = fn() -> T> {
    cell: CheckedCell<T>,
    init: F,
}

impl<T, F> CheckedLazy<T, F> {
    pub const fn new(init: F) -> Self {
        Self {
            cell: CheckedCell::new(),
            init,
        }
    }

    /// Returns the value if it has already been built
    pub fn get(this: &Self) -> Option<&T> {
        this.cell.get()
    }

    pub fn state(this: &Self) -> InitState {
        this.cell.state()
    }
}

impl<T, F: Fn() -> T> CheckedLazy<T, F> {
    /// Builds the value if needed and returns it
    #[inline]
    pub fn force(this: &Self) -> &T {
        this.cell.get_or_init(&this.init)
    }
}

impl<T, F: Fn() -> T> Deref for CheckedLazy<T, F> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &'_ T {
        Self::force(self)
    }
}

impl<T, F: Fn() -> T> Accessor for CheckedLazy<T, F> {
    type Target = T;

    fn instance(&self) -> &T {
        Self::force(self)
    }
}

impl<T: fmt::Debug, F> fmt::Debug for CheckedLazy<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckedLazy")
            .field("cell", &self.cell)
            .finish_non_exhaustive()
    }
}
