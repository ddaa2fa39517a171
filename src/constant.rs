use crate::Accessor;

static INSTANCE: Singleton = Singleton::Instance;

/// A closed type with exactly one value
///
/// There is nothing to initialize and nothing to lock: the only value of the
/// type exists from the start, and no other value can ever be made.
///
/// # Example
///
/// ```
/// use lazy_singleton::Singleton;
///
/// assert!(std::ptr::eq(Singleton::get(), Singleton::get()));
/// assert_eq!(*Singleton::get(), Singleton::Instance);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Singleton {
    Instance,
}

impl Singleton {
    /// Returns the process-wide instance
    #[inline]
    pub fn get() -> &'static Self {
        &INSTANCE
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Instance => "instance",
        }
    }
}

impl Accessor for Singleton {
    type Target = Self;

    fn instance(&self) -> &Self {
        Self::get()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use crate::Accessor;

    use super::Singleton;

    #[test]
    fn every_path_leads_to_the_static() {
        let from_value = Singleton::Instance.instance() as *const Singleton as usize;
        let from_thread = thread::spawn(|| Singleton::get() as *const Singleton as usize)
            .join()
            .unwrap();

        assert_eq!(from_value, Singleton::get() as *const Singleton as usize);
        assert_eq!(from_value, from_thread);
        assert_eq!(Singleton::get().name(), "instance");
    }
}
