// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Timer backends for the timed region.
//!
//! Two interchangeable strategies:
//! - wall clock: `Instant` before and after, microsecond delta
//! - cycles: free-running hardware counter, minus the cost of two
//!   back-to-back reads
//!
//! Both put a `compiler_fence(SeqCst)` on each side of the region and route
//! the callable's return value through `black_box`, so the optimizer can
//! neither hoist the call out of the clock reads nor delete it.

use std::hint::black_box;
use std::sync::atomic::{compiler_fence, Ordering};
use std::time::Instant;

use crate::types::{ClockSource, TimingUnit};

/// Calibration rounds used to estimate the cycle-read overhead.
const OVERHEAD_ROUNDS: usize = 64;

/// Raw cycle counter access.
///
/// - x86_64: `lfence; rdtsc`
/// - aarch64: `isb; mrs cntvct_el0`
/// - anything else: unsupported, [`cycles::read`] returns monotonic nanoseconds
pub mod cycles {
    use std::sync::atomic::{compiler_fence, Ordering};

    /// Whether this target has a real hardware cycle counter.
    pub const fn is_supported() -> bool {
        cfg!(any(target_arch = "x86_64", target_arch = "aarch64"))
    }

    /// Read the counter with instruction serialization on both sides.
    #[inline(always)]
    pub fn read() -> u64 {
        compiler_fence(Ordering::SeqCst);
        let value = read_raw();
        compiler_fence(Ordering::SeqCst);
        value
    }

    #[cfg(target_arch = "x86_64")]
    #[inline(always)]
    fn read_raw() -> u64 {
        let cycles: u64;
        // SAFETY: lfence and rdtsc have no memory side effects and only write rax/rdx.
        unsafe {
            std::arch::asm!(
                "lfence",
                "rdtsc",
                "shl rdx, 32",
                "or rax, rdx",
                out("rax") cycles,
                out("rdx") _,
                options(nostack, nomem),
            );
        }
        cycles
    }

    #[cfg(target_arch = "aarch64")]
    #[inline(always)]
    fn read_raw() -> u64 {
        let cycles: u64;
        // SAFETY: isb and a read of the EL0-accessible virtual counter touch no memory.
        unsafe {
            std::arch::asm!(
                "isb",
                "mrs {}, cntvct_el0",
                "isb",
                out(reg) cycles,
                options(nostack, nomem),
            );
        }
        cycles
    }

    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    #[inline(always)]
    fn read_raw() -> u64 {
        use std::sync::OnceLock;
        use std::time::Instant;

        static ORIGIN: OnceLock<Instant> = OnceLock::new();
        ORIGIN.get_or_init(Instant::now).elapsed().as_nanos() as u64
    }
}

/// Cost of reading the counter twice with nothing in between.
///
/// Minimum over a few rounds so a single preempted read cannot inflate it.
pub fn cycle_read_overhead() -> u64 {
    (0..OVERHEAD_ROUNDS)
        .map(|_| {
            let start = cycles::read();
            let end = cycles::read();
            end.wrapping_sub(start)
        })
        .min()
        .unwrap_or(0)
}

/// Selected timing strategy for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerBackend {
    WallClock,
    Cycles { overhead: u64 },
}

impl TimerBackend {
    /// Build the backend for `clock`, falling back to the wall clock when the
    /// target has no cycle counter.
    pub fn new(clock: ClockSource) -> Self {
        match clock {
            ClockSource::Wallclock => Self::WallClock,
            ClockSource::Cycles if cycles::is_supported() => {
                let overhead = cycle_read_overhead();
                tracing::debug!(overhead_cycles = overhead, "Calibrated cycle-read overhead");
                Self::Cycles { overhead }
            }
            ClockSource::Cycles => {
                tracing::warn!(
                    "No hardware cycle counter on this target, falling back to wall-clock timing"
                );
                Self::WallClock
            }
        }
    }

    /// Unit of the values returned by [`TimerBackend::measure`].
    pub fn unit(&self) -> TimingUnit {
        match self {
            Self::WallClock => TimingUnit::Microseconds,
            Self::Cycles { .. } => TimingUnit::Cycles,
        }
    }

    /// Time one invocation of `f`.
    #[inline(always)]
    pub fn measure<F, T>(&self, f: F) -> u64
    where
        F: FnOnce() -> T,
    {
        match *self {
            Self::WallClock => {
                compiler_fence(Ordering::SeqCst);
                let start = Instant::now();
                black_box(f());
                let end = Instant::now();
                compiler_fence(Ordering::SeqCst);
                end.duration_since(start).as_micros() as u64
            }
            Self::Cycles { overhead } => {
                compiler_fence(Ordering::SeqCst);
                let start = cycles::read();
                black_box(f());
                let end = cycles::read();
                compiler_fence(Ordering::SeqCst);
                end.wrapping_sub(start).saturating_sub(overhead)
            }
        }
    }
}
