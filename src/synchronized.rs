use std::fmt;
use std::ops::Deref;
use std::ptr;
use std::sync::{Mutex, PoisonError};

use crate::Accessor;

/// A lazily built value where every access goes through a mutex
///
/// This is correct under any amount of concurrency, but unlike
/// [`CheckedLazy`](crate::CheckedLazy) it pays for the lock on every call,
/// not just while the value is being built.
///
/// # Example
///
/// ```
/// use lazy_singleton::Synchronized;
///
/// static ID: Synchronized<String> = Synchronized::new(|| "node-1".to_owned());
///
/// assert!(!ID.is_initialized());
/// assert!(std::ptr::eq(ID.get(), ID.get()));
/// assert!(ID.is_initialized());
/// ```
pub struct Synchronized<T, F = fn() -> T> {
    // Points into a leaked `Box`, reclaimed in `Drop`. Null until built.
    slot: Mutex<*const T>,
    init: F,
}

// SAFETY: the pointer is only read or written while holding the mutex, and it
// is never replaced once non-null, so the pointee lives as long as `self`.
unsafe impl<T: Send + Sync, F: Sync> Sync for Synchronized<T, F> {}
// SAFETY: owning a `Synchronized` means owning the boxed `T`.
unsafe impl<T: Send, F: Send> Send for Synchronized<T, F> {}

impl<T, F> Synchronized<T, F> {
    pub const fn new(init: F) -> Self {
        Self {
            slot: Mutex::new(ptr::null()),
            init,
        }
    }

    /// Returns `true` once the value has been built
    pub fn is_initialized(&self) -> bool {
        !self.lock().is_null()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, *const T> {
        // A panicking initializer leaves the slot null, so the data is still valid.
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T, F: Fn() -> T> Synchronized<T, F> {
    pub fn get(&self) -> &T {
        let mut slot = self.lock();
        if slot.is_null() {
            log::trace!("building `{}` under lock", std::any::type_name::<T>());
            *slot = Box::into_raw(Box::new((self.init)()));
        }
        let value = *slot;
        drop(slot);

        // SAFETY: `value` is non-null and comes from `Box::into_raw`. It is
        // only freed in `Drop`, which cannot run while `&self` is borrowed.
        unsafe { &*value }
    }
}

impl<T, F> Drop for Synchronized<T, F> {
    fn drop(&mut self) {
        let slot = *self.slot.get_mut().unwrap_or_else(PoisonError::into_inner);
        if !slot.is_null() {
            // SAFETY: the pointer came from `Box::into_raw` and is dropped once.
            drop(unsafe { Box::from_raw(slot.cast_mut()) });
        }
    }
}

impl<T, F: Fn() -> T> Deref for Synchronized<T, F> {
    type Target = T;

    fn deref(&self) -> &T {
        self.get()
    }
}

impl<T, F: Fn() -> T> Accessor for Synchronized<T, F> {
    type Target = T;

    fn instance(&self) -> &T {
        self.get()
    }
}

impl<T, F> fmt::Debug for Synchronized<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Synchronized")
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    use crate::probe::Widget;

    use super::Synchronized;

    #[test]
    fn constructs_once_under_contention() {
        const THREADS: usize = 8;

        let constructions = AtomicUsize::new(0);
        let barrier = Barrier::new(THREADS);
        let sync = Synchronized::new(|| {
            thread::sleep(Duration::from_millis(20));
            let serial = constructions.fetch_add(1, Ordering::SeqCst);
            Widget::assemble(serial as u64 + 1)
        });

        let addresses: Vec<usize> = thread::scope(|s| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        let widget = sync.get();
                        assert!(widget.is_consistent());
                        widget as *const Widget as usize
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(constructions.load(Ordering::SeqCst), 1);
        assert!(addresses.iter().all(|&address| address == addresses[0]));
    }

    #[test]
    fn retries_after_panic() {
        let attempts = AtomicUsize::new(0);
        let sync = Synchronized::new(|| {
            if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("first attempt fails");
            }
            "ok"
        });

        panic::catch_unwind(AssertUnwindSafe(|| *sync.get())).unwrap_err();
        assert!(!sync.is_initialized());
        assert_eq!(*sync.get(), "ok");
    }

    #[test]
    fn drops_boxed_value() {
        let drops = AtomicUsize::new(0);

        struct Tracked<'a>(&'a AtomicUsize);

        impl Drop for Tracked<'_> {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let sync = Synchronized::new(|| Tracked(&drops));
        sync.get();
        sync.get();
        drop(sync);

        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }
}
