use std::ops::Deref;

use crate::{Accessor, InitState};

/// A value constructed before anything can read it
///
/// Placed in a `static`, the value is built at compile time, so every access
/// from every thread sees the same fully constructed instance without any
/// synchronization. The construction cost is paid whether or not the value is
/// ever used.
///
/// # Example
///
/// ```
/// use lazy_singleton::Eager;
///
/// static LIMITS: Eager<[u32; 3]> = Eager::new([8, 16, 32]);
///
/// assert_eq!(LIMITS.get()[1], 16);
/// assert!(std::ptr::eq(LIMITS.get(), &*LIMITS));
/// ```
#[derive(Debug)]
pub struct Eager<T>(T);

impl<T> Eager<T> {
    pub const fn new(value: T) -> Self {
        Self(value)
    }

    #[inline]
    pub const fn get(&self) -> &T {
        &self.0
    }

    /// Always [`InitState::Initialized`]
    pub const fn state(&self) -> InitState {
        InitState::Initialized
    }
}

impl<T> Deref for Eager<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> Accessor for Eager<T> {
    type Target = T;

    fn instance(&self) -> &T {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use crate::probe::Widget;
    use crate::InitState;

    use super::Eager;

    static PRESET: Eager<Widget> = Eager::new(Widget::PRESET);

    #[test]
    fn ready_before_any_start_step() {
        assert_eq!(PRESET.state(), InitState::Initialized);
        assert!(PRESET.get().is_consistent());
        assert_eq!(PRESET.serial, Widget::PRESET.serial);
    }

    #[test]
    fn same_instance_across_threads() {
        let here = PRESET.get() as *const Widget as usize;
        let there = thread::spawn(|| PRESET.get() as *const Widget as usize)
            .join()
            .unwrap();
        assert_eq!(here, there);
    }
}
