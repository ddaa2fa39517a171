use std::fmt;
use std::ops::Deref;
use std::sync::OnceLock;

use crate::Accessor;

/// A value built on first access by the standard library's one-time initialization
///
/// This is the holder idiom: [`OnceLock`] already guarantees that the
/// initializer runs once and that the result is safely published, so no
/// explicit locking is needed here.
///
/// # Example
///
/// ```
/// use lazy_singleton::LazyLock;
///
/// static NAMES: LazyLock<Vec<&str>> = LazyLock::new(|| vec!["a", "b"]);
///
/// assert_eq!(NAMES.len(), 2);
/// assert!(std::ptr::eq(&*NAMES, LazyLock::force(&NAMES)));
/// ```
pub struct LazyLock<T, F = fn() -> T> {
    cell: OnceLock<T>,
    init: F,
}

impl<T, F> LazyLock<T, F> {
    pub const fn new(init: F) -> Self {
        Self {
            cell: OnceLock::new(),
            init,
        }
    }

    /// Returns the value if it has already been built
    pub fn get(this: &Self) -> Option<&T> {
        this.cell.get()
    }
}

impl<T, F: Fn() -> T> LazyLock<T, F> {
    #[inline]
    pub fn force(this: &Self) -> &T {
        this.cell.get_or_init(|| (this.init)())
    }
}

impl<T, F: Fn() -> T> Deref for LazyLock<T, F> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &'_ T {
        Self::force(self)
    }
}

impl<T, F: Fn() -> T> Accessor for LazyLock<T, F> {
    type Target = T;

    fn instance(&self) -> &T {
        Self::force(self)
    }
}

impl<T: fmt::Debug, F> fmt::Debug for LazyLock<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyLock")
            .field("cell", &self.cell)
            .finish_non_exhaustive()
    }
}
