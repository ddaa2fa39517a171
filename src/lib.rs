//! Accessors that hand out a single instance of a value for the whole life of
//! the process.
//!
//! Every accessor in this crate promises the same thing: the value is built at
//! most once, and every access returns a reference to that one value. They
//! differ in when the value is built and in how they stay correct when several
//! threads ask for it at the same time.
//!
//! | Type                 | Built           | Shared between threads |
//! |----------------------|-----------------|------------------------|
//! | [`Eager`]            | at compile time | yes, no locking        |
//! | [`Singleton`]        | at compile time | yes, no locking        |
//! | [`UnsyncLazy`]       | on first access | no, rejected by the compiler |
//! | [`Synchronized`]     | on first access | yes, locks on every access |
//! | [`LazyLock`]         | on first access | yes, through [`std::sync::OnceLock`] |
//! | [`CheckedLazy`]      | on first access | yes, double-checked locking |
//!
//! The [`probe`] module checks these guarantees at runtime and backs the
//! `lazy-singleton` binary.
pub mod checked;
pub mod config;
pub mod constant;
pub mod eager;
pub mod lock;
pub mod probe;
mod state;
pub mod synchronized;
pub mod unsync;
mod variant;

pub use crate::checked::{CheckedCell, CheckedLazy};
pub use crate::constant::Singleton;
pub use crate::eager::Eager;
pub use crate::lock::LazyLock;
pub use crate::state::InitState;
pub use crate::synchronized::Synchronized;
pub use crate::unsync::UnsyncLazy;
pub use crate::variant::Variant;

/// Type that gives access to a single shared instance
pub trait Accessor {
    /// Type of the instance
    type Target;

    /// Returns the instance, building it first if needed
    ///
    /// Every call on the same accessor returns a reference to the same value.
    fn instance(&self) -> &Self::Target;
}
