use std::sync::atomic::{AtomicU8, Ordering};

/// Initialization state of an accessor
///
/// `Initialized` is terminal: once an accessor reports it, every later
/// observation through a shared reference reports it too.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InitState {
    /// No instance has been constructed yet
    Uninitialized = 0,
    /// A thread holds the lock and is constructing the instance
    Initializing = 1,
    /// The instance is constructed and published
    Initialized = 2,
}

impl InitState {
    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Uninitialized,
            1 => Self::Initializing,
            _ => Self::Initialized,
        }
    }

    /// Returns `true` if the instance can be read without locking
    pub const fn is_initialized(self) -> bool {
        matches!(self, Self::Initialized)
    }
}

/// Three-state flag stored in a single byte
#[derive(Debug)]
pub(crate) struct AtomicState(AtomicU8);

impl AtomicState {
    pub(crate) const fn new(state: InitState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    #[inline]
    pub(crate) fn load(&self, order: Ordering) -> InitState {
        InitState::from_u8(self.0.load(order))
    }

    #[inline]
    pub(crate) fn store(&self, state: InitState, order: Ordering) {
        self.0.store(state as u8, order);
    }

    pub(crate) fn get_mut(&mut self) -> InitState {
        InitState::from_u8(*self.0.get_mut())
    }

    pub(crate) fn set_mut(&mut self, state: InitState) {
        *self.0.get_mut() = state as u8;
    }
}
