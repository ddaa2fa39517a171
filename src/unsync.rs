use std::cell::OnceCell;
use std::fmt;
use std::ops::Deref;

use crate::Accessor;

/// A lazily built value for single-threaded use
///
/// There is no locking at all. The type is `!Sync`, so the compiler rejects any
/// attempt to share it between threads. Use it inside a `thread_local!` or in
/// code that never leaves one thread. Each thread then gets its own instance.
///
/// ```compile_fail
/// use lazy_singleton::UnsyncLazy;
///
/// static SHARED: UnsyncLazy<u32> = UnsyncLazy::new(|| 1);
/// ```
///
/// # Example
///
/// ```
/// use lazy_singleton::UnsyncLazy;
///
/// thread_local! {
///     static SCRATCH: UnsyncLazy<Vec<u8>> = UnsyncLazy::new(|| vec![0; 16]);
/// }
///
/// SCRATCH.with(|scratch| {
///     assert_eq!(scratch.len(), 16);
///     assert!(std::ptr::eq(UnsyncLazy::force(scratch), &**scratch));
/// });
/// ```
pub struct UnsyncLazy<T, F = fn() -> T> {
    cell: OnceCell<T>,
    init: F,
}

impl<T, F> UnsyncLazy<T, F> {
    pub const fn new(init: F) -> Self {
        Self {
            cell: OnceCell::new(),
            init,
        }
    }

    pub fn get(this: &Self) -> Option<&T> {
        this.cell.get()
    }
}

impl<T, F: Fn() -> T> UnsyncLazy<T, F> {
    #[inline]
    pub fn force(this: &Self) -> &T {
        this.cell.get_or_init(|| (this.init)())
    }
}

impl<T, F: Fn() -> T> Deref for UnsyncLazy<T, F> {
    type Target = T;

    fn deref(&self) -> &T {
        Self::force(self)
    }
}

impl<T, F: Fn() -> T> Accessor for UnsyncLazy<T, F> {
    type Target = T;

    fn instance(&self) -> &T {
        Self::force(self)
    }
}

impl<T: fmt::Debug, F> fmt::Debug for UnsyncLazy<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnsyncLazy")
            .field("cell", &self.cell)
            .finish_non_exhaustive()
    }
}
