// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! L1 data-cache read counters around one iteration.
//!
//! On Linux the probe opens a pair of thread-scoped perf events (L1D read
//! access, L1D read miss; user space only) per iteration. Both are owned
//! handles, so the file descriptors close on every exit path. Elsewhere, or
//! when the kernel refuses, the probe reports `ResourceError` and the runner
//! marks the miss-rate column as unmeasured.

use crate::error::ResourceError;

/// Raw counter values for one iteration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheReading {
    pub accesses: u64,
    pub misses: u64,
}

impl CacheReading {
    /// Miss rate in percent: `100 * misses / accesses`, clamped to [0, 100].
    ///
    /// Zero accesses yields exactly `0.0`.
    pub fn miss_rate(&self) -> f64 {
        if self.accesses == 0 {
            return 0.0;
        }
        (100.0 * self.misses as f64 / self.accesses as f64).clamp(0.0, 100.0)
    }
}

/// Capability interface over the PMU.
///
/// `begin` is called right before the timed call and `end` right after; the
/// implementation must keep its own setup and teardown outside that window.
pub trait CacheProbe {
    /// Open (if needed), reset and enable the counters.
    fn begin(&mut self) -> Result<(), ResourceError>;

    /// Disable and read the counters, then release them.
    fn end(&mut self) -> Result<CacheReading, ResourceError>;
}

/// Probe for targets without perf events.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedCacheProbe;

impl CacheProbe for UnsupportedCacheProbe {
    fn begin(&mut self) -> Result<(), ResourceError> {
        Err(ResourceError::Unsupported {
            feature: "hardware cache counters",
        })
    }

    fn end(&mut self) -> Result<CacheReading, ResourceError> {
        Err(ResourceError::Unsupported {
            feature: "hardware cache counters",
        })
    }
}

#[cfg(target_os = "linux")]
pub use linux::PerfCacheProbe;

#[cfg(target_os = "linux")]
mod linux {
    use perf_event2::events::{Cache, CacheId, CacheOp, CacheResult};
    use perf_event2::{Builder, Counter};

    use super::{CacheProbe, CacheReading};
    use crate::error::ResourceError;

    struct CounterPair {
        accesses: Counter,
        misses: Counter,
    }

    impl CounterPair {
        fn open() -> Result<Self, ResourceError> {
            Ok(Self {
                accesses: open_counter(CacheResult::ACCESS)?,
                misses: open_counter(CacheResult::MISS)?,
            })
        }

        fn start(&mut self) -> std::io::Result<()> {
            self.accesses.reset()?;
            self.misses.reset()?;
            self.accesses.enable()?;
            self.misses.enable()
        }

        fn stop(&mut self) -> std::io::Result<CacheReading> {
            self.misses.disable()?;
            self.accesses.disable()?;
            Ok(CacheReading {
                accesses: self.accesses.read()?,
                misses: self.misses.read()?,
            })
        }
    }

    fn open_counter(result: CacheResult) -> Result<Counter, ResourceError> {
        let event = Cache {
            which: CacheId::L1D,
            operation: CacheOp::READ,
            result,
        };

        Builder::new(event)
            .exclude_kernel(true)
            .exclude_hv(true)
            .build()
            .map_err(|e| ResourceError::from_io("perf_event_open", &e))
    }

    /// perf-event backed L1D probe for the calling thread.
    #[derive(Default)]
    pub struct PerfCacheProbe {
        active: Option<CounterPair>,
    }

    impl PerfCacheProbe {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl std::fmt::Debug for PerfCacheProbe {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("PerfCacheProbe")
                .field("active", &self.active.is_some())
                .finish()
        }
    }

    impl CacheProbe for PerfCacheProbe {
        fn begin(&mut self) -> Result<(), ResourceError> {
            // A pair left over from an iteration that never reached `end` is dropped here.
            self.active = None;

            let mut pair = CounterPair::open()?;
            pair.start()
                .map_err(|e| ResourceError::from_io("perf counter enable", &e))?;
            self.active = Some(pair);
            Ok(())
        }

        fn end(&mut self) -> Result<CacheReading, ResourceError> {
            let mut pair = self.active.take().ok_or(ResourceError::Syscall {
                operation: "perf counter read",
                message: "counters were not started".to_string(),
            })?;
            pair.stop()
                .map_err(|e| ResourceError::from_io("perf counter read", &e))
        }
    }
}

/// Best probe available on this platform.
pub fn platform_probe() -> Box<dyn CacheProbe> {
    #[cfg(target_os = "linux")]
    {
        Box::new(PerfCacheProbe::new())
    }
    #[cfg(not(target_os = "linux"))]
    {
        Box::new(UnsupportedCacheProbe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_accesses_is_zero_rate() {
        let reading = CacheReading {
            accesses: 0,
            misses: 5,
        };
        assert_eq!(reading.miss_rate(), 0.0);
    }

    #[test]
    fn test_miss_rate_percentage() {
        let reading = CacheReading {
            accesses: 200,
            misses: 50,
        };
        assert_eq!(reading.miss_rate(), 25.0);
    }

    #[test]
    fn test_miss_rate_clamped() {
        // Multiplexed counters can report more misses than accesses.
        let reading = CacheReading {
            accesses: 10,
            misses: 30,
        };
        assert_eq!(reading.miss_rate(), 100.0);
    }

    #[test]
    fn test_unsupported_probe() {
        let mut probe = UnsupportedCacheProbe;
        assert!(matches!(
            probe.begin(),
            Err(ResourceError::Unsupported { .. })
        ));
        assert!(probe.end().is_err());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_perf_probe_end_without_begin() {
        let mut probe = PerfCacheProbe::new();
        assert!(matches!(probe.end(), Err(ResourceError::Syscall { .. })));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_perf_probe_best_effort() {
        // Counters may be denied (containers, perf_event_paranoid); either outcome is fine
        // as long as a successful reading is a sane percentage.
        let mut probe = platform_probe();
        if probe.begin().is_ok() {
            let data: Vec<u64> = (0..1024).collect();
            std::hint::black_box(data.iter().sum::<u64>());
            if let Ok(reading) = probe.end() {
                let rate = reading.miss_rate();
                assert!((0.0..=100.0).contains(&rate));
            }
        }
    }
}
