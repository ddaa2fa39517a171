//! Checks that every accessor keeps its promises.
//!
//! For each [`Variant`] the probe compares two consecutive accesses to a
//! process-wide accessor, then races a fresh accessor from several threads
//! released at the same instant by a barrier. The constructor used in the race
//! sleeps so that the threads pile up on the slow path.
use std::collections::HashSet;
use std::fmt;
use std::panic;
use std::ptr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Barrier;
use std::thread;
use std::time::Duration;

use miette::Diagnostic;

use rayon::prelude::*;

use thiserror::Error;

use crate::{
    Accessor, CheckedLazy, Eager, LazyLock, Singleton, Synchronized, UnsyncLazy, Variant,
};

const SEAL: u64 = 0x5eed_cafe_f00d_d00d;

/// Value handed out by the probed accessors
///
/// Its fields are written one after the other and are related to each other,
/// so a reader that observes a half-built widget notices it through
/// [`Widget::is_consistent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Widget {
    pub serial: u64,
    pub square: u64,
    pub checksum: u64,
}

impl Widget {
    /// Widget built at compile time
    pub const PRESET: Self = Self::assemble(0);

    /// Builds a widget with a serial number unique within the process
    pub fn numbered() -> Self {
        static NEXT_SERIAL: AtomicU64 = AtomicU64::new(1);

        Self::assemble(NEXT_SERIAL.fetch_add(1, Ordering::Relaxed))
    }

    pub const fn assemble(serial: u64) -> Self {
        let square = serial.wrapping_mul(serial);
        Self {
            serial,
            square,
            checksum: serial ^ square ^ SEAL,
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.square == self.serial.wrapping_mul(self.serial)
            && self.checksum == self.serial ^ self.square ^ SEAL
    }
}

static EAGER: Eager<Widget> = Eager::new(Widget::PRESET);
static SYNCHRONIZED: Synchronized<Widget> = Synchronized::new(Widget::numbered);
static LAZY_LOCK: LazyLock<Widget> = LazyLock::new(Widget::numbered);
static CHECKED: CheckedLazy<Widget> = CheckedLazy::new(Widget::numbered);

thread_local! {
    static UNSYNC: UnsyncLazy<Widget> = UnsyncLazy::new(Widget::numbered);
}

/// How the probe runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Number of threads racing on a fresh accessor
    pub threads: usize,
    /// Time spent inside the constructor during the race
    pub construction_delay: Duration,
    /// Whether to race at all
    pub contention: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            threads: 8,
            construction_delay: Duration::from_millis(20),
            contention: true,
        }
    }
}

/// Outcome of racing threads on one accessor
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Contention {
    pub threads: usize,
    /// Number of times the constructor ran
    pub constructions: usize,
    /// Number of different instance addresses the threads saw
    pub distinct_instances: usize,
    /// Number of threads that saw an inconsistent instance
    pub torn: usize,
}

/// Outcome of probing one variant
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Report {
    pub variant: Variant,
    /// Whether two consecutive accesses returned the same instance
    pub identical: bool,
    /// `None` when the race was disabled or the variant cannot be shared
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contention: Option<Contention>,
}

impl Report {
    /// Broken guarantees found in this report
    pub fn failures(&self) -> Vec<ProbeFailure> {
        let variant = self.variant;
        let mut failures = vec![];

        if !self.identical {
            failures.push(ProbeFailure::NotIdentical { variant });
        }

        if let Some(contention) = &self.contention {
            let threads = contention.threads;
            if contention.constructions > 1 {
                failures.push(ProbeFailure::MultipleConstructions {
                    variant,
                    count: contention.constructions,
                    threads,
                });
            }
            if contention.distinct_instances > 1 {
                failures.push(ProbeFailure::DistinctInstances {
                    variant,
                    distinct: contention.distinct_instances,
                    threads,
                });
            }
            if contention.torn > 0 {
                failures.push(ProbeFailure::TornInstance {
                    variant,
                    torn: contention.torn,
                    threads,
                });
            }
        }

        failures
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<12} identical={}", self.variant, self.identical)?;
        if let Some(contention) = &self.contention {
            write!(
                f,
                " threads={} constructions={} distinct={} torn={}",
                contention.threads,
                contention.constructions,
                contention.distinct_instances,
                contention.torn
            )?;
        }

        Ok(())
    }
}

/// A guarantee that an accessor failed to keep
#[derive(Error, Debug, Diagnostic, PartialEq, Eq)]
pub enum ProbeFailure {
    #[error("`{variant}` returned two different instances on consecutive calls")]
    #[diagnostic(code(lazy_singleton::not_identical))]
    NotIdentical { variant: Variant },

    #[error("`{variant}` ran its constructor {count} times while {threads} threads raced")]
    #[diagnostic(
        code(lazy_singleton::multiple_constructions),
        help("only the thread that wins the lock may construct the instance")
    )]
    MultipleConstructions {
        variant: Variant,
        count: usize,
        threads: usize,
    },

    #[error("`{variant}` handed out {distinct} different instances to {threads} threads")]
    #[diagnostic(code(lazy_singleton::distinct_instances))]
    DistinctInstances {
        variant: Variant,
        distinct: usize,
        threads: usize,
    },

    #[error("`{variant}` exposed a partially constructed instance to {torn} of {threads} threads")]
    #[diagnostic(
        code(lazy_singleton::torn_instance),
        help("publish the instance with a release store and check for it with an acquire load")
    )]
    TornInstance {
        variant: Variant,
        torn: usize,
        threads: usize,
    },
}

/// Probes every variant of `variants` in parallel, keeping their order
pub fn run_all(variants: &[Variant], settings: &Settings) -> Vec<Report> {
    variants
        .par_iter()
        .map(|&variant| run(variant, settings))
        .collect()
}

/// Probes a single variant
pub fn run(variant: Variant, settings: &Settings) -> Report {
    log::debug!("probing `{variant}`");

    let identical = identity(variant);
    let contention = if settings.contention && variant.is_thread_safe() {
        contend(variant, settings)
    } else {
        None
    };

    log::debug!("finished probing `{variant}`");

    Report {
        variant,
        identical,
        contention,
    }
}

/// Returns `true` if two consecutive accesses to the process-wide accessor of
/// `variant` return the same instance
pub fn identity(variant: Variant) -> bool {
    fn identical<A: Accessor>(accessor: &A) -> bool {
        ptr::eq(accessor.instance(), accessor.instance())
    }

    match variant {
        Variant::Eager => identical(&EAGER),
        Variant::Unsync => UNSYNC.with(|lazy| identical(lazy)),
        Variant::Synchronized => identical(&SYNCHRONIZED),
        Variant::LazyLock => identical(&LAZY_LOCK),
        Variant::Constant => identical(&Singleton::Instance),
        Variant::Checked => identical(&CHECKED),
    }
}

/// Races `settings.threads` threads on a fresh accessor of `variant`
///
/// Returns `None` for variants that cannot be shared between threads.
pub fn contend(variant: Variant, settings: &Settings) -> Option<Contention> {
    let constructions = AtomicUsize::new(0);
    let delay = settings.construction_delay;
    let threads = settings.threads;
    let build = || {
        thread::sleep(delay);
        let serial = constructions.fetch_add(1, Ordering::SeqCst) as u64 + 1;
        Widget::assemble(serial)
    };

    log::debug!("racing {threads} threads on `{variant}`");

    let contention = match variant {
        Variant::Unsync => return None,
        Variant::Eager => {
            let eager = Eager::new(build());
            race(&eager, threads, &constructions, Widget::is_consistent)
        }
        Variant::Synchronized => race(
            &Synchronized::new(build),
            threads,
            &constructions,
            Widget::is_consistent,
        ),
        Variant::LazyLock => race(
            &LazyLock::new(build),
            threads,
            &constructions,
            Widget::is_consistent,
        ),
        Variant::Constant => race(&Singleton::Instance, threads, &constructions, |_| true),
        Variant::Checked => race(
            &CheckedLazy::new(build),
            threads,
            &constructions,
            Widget::is_consistent,
        ),
    };

    Some(contention)
}

fn race<A>(
    accessor: &A,
    threads: usize,
    constructions: &AtomicUsize,
    consistent: fn(&A::Target) -> bool,
) -> Contention
where
    A: Accessor + Sync,
{
    let barrier = Barrier::new(threads);

    let observations: Vec<(usize, bool)> = thread::scope(|s| {
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    let instance = accessor.instance();
                    (
                        instance as *const A::Target as usize,
                        consistent(instance),
                    )
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|payload| panic::resume_unwind(payload))
            })
            .collect()
    });

    let distinct_instances = observations
        .iter()
        .map(|(address, _)| address)
        .collect::<HashSet<_>>()
        .len();
    let torn = observations
        .iter()
        .filter(|(_, consistent)| !consistent)
        .count();

    Contention {
        threads,
        constructions: constructions.load(Ordering::SeqCst),
        distinct_instances,
        torn,
    }
}
