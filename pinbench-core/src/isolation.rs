// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Low-noise execution context for one run.
//!
//! [`IsolationController::acquire`] applies, in order:
//! 1. `performance` governor on the target core, then a short settle spin
//! 2. thread affinity pinned to the target core
//! 3. `SCHED_FIFO` at the maximum priority
//! 4. every signal blocked on the calling thread
//! 5. optionally a `/dev/cpu_dma_latency` hold of 0us
//!
//! Each step is best effort: a failure is logged with `warn!` and the run
//! continues with weaker isolation. Without a target core only signal
//! blocking applies. The returned [`IsolationGuard`] undoes everything in
//! reverse order when dropped, including during a panic unwind.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use nix::sys::signal::{pthread_sigmask, SigSet, SigmaskHow, Signal};

use crate::error::ResourceError;
use crate::types::CoreId;

/// Default sysfs root holding `cpuN/cpufreq/scaling_governor`.
pub const DEFAULT_CPU_ROOT: &str = "/sys/devices/system/cpu";
/// PM QoS device used for the DMA-latency hold.
pub const DEFAULT_DMA_LATENCY_PATH: &str = "/dev/cpu_dma_latency";
/// Default settle spin after switching governors.
pub const DEFAULT_SETTLE_SPINS: u64 = 32_768;

/// Tunables for isolation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsolationSettings {
    /// Governor written to the target core for the run
    pub performance_governor: String,
    /// Governor restored when the prior one could not be read
    pub restore_governor: String,
    /// Busy-wait iterations after the governor switch
    pub settle_spins: u64,
    /// Keep the CPU out of deep idle states during the run
    pub hold_dma_latency: bool,
    pub cpu_root: PathBuf,
    pub dma_latency_path: PathBuf,
}

impl Default for IsolationSettings {
    fn default() -> Self {
        Self {
            performance_governor: "performance".to_string(),
            restore_governor: "ondemand".to_string(),
            settle_spins: DEFAULT_SETTLE_SPINS,
            hold_dma_latency: false,
            cpu_root: PathBuf::from(DEFAULT_CPU_ROOT),
            dma_latency_path: PathBuf::from(DEFAULT_DMA_LATENCY_PATH),
        }
    }
}

/// Which isolation steps actually took effect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IsolationReport {
    pub core: Option<CoreId>,
    pub governor_set: bool,
    pub pinned: bool,
    pub realtime: bool,
    pub signals_blocked: bool,
    pub dma_latency_held: bool,
}

impl IsolationReport {
    /// True when every step requested for this run succeeded.
    pub fn fully_isolated(&self) -> bool {
        match self.core {
            Some(_) => self.governor_set && self.pinned && self.realtime && self.signals_blocked,
            None => self.signals_blocked,
        }
    }
}

/// Prior state captured right before each mutation, consumed at release.
#[derive(Debug, Default)]
pub struct IsolationSnapshot {
    governor: Option<GovernorSnapshot>,
    affinity: Option<sys::Affinity>,
    scheduler: Option<sys::Scheduler>,
    signal_mask: Option<SigSet>,
}

#[derive(Debug)]
struct GovernorSnapshot {
    path: PathBuf,
    /// `None` when the prior value was unreadable; the fallback is restored.
    prior: Option<String>,
}

/// Applies isolation for runs.
#[derive(Debug, Clone, Default)]
pub struct IsolationController {
    settings: IsolationSettings,
}

impl IsolationController {
    pub fn new(settings: IsolationSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &IsolationSettings {
        &self.settings
    }

    /// Isolate the calling thread, optionally on `core`.
    ///
    /// Never fails: each step degrades to a warning.
    pub fn acquire(&self, core: Option<CoreId>) -> IsolationGuard {
        let mut snapshot = IsolationSnapshot::default();
        let mut report = IsolationReport {
            core,
            ..IsolationReport::default()
        };
        let mut dma_hold = None;

        if let Some(core) = core {
            match self.set_governor(core) {
                Ok(governor) => {
                    report.governor_set = true;
                    snapshot.governor = Some(governor);
                }
                Err(e) => warn_degraded("frequency governor", core, &e),
            }

            for _ in 0..self.settings.settle_spins {
                std::hint::spin_loop();
            }

            match sys::pin(core) {
                Ok(prior) => {
                    report.pinned = true;
                    snapshot.affinity = Some(prior);
                }
                Err(e) => warn_degraded("CPU affinity", core, &e),
            }

            match sys::escalate() {
                Ok(prior) => {
                    report.realtime = true;
                    snapshot.scheduler = Some(prior);
                }
                Err(e) => warn_degraded("real-time priority", core, &e),
            }
        }

        let mut old_mask = SigSet::empty();
        match pthread_sigmask(SigmaskHow::SIG_BLOCK, Some(&SigSet::all()), Some(&mut old_mask)) {
            Ok(()) => {
                report.signals_blocked = true;
                snapshot.signal_mask = Some(old_mask);
            }
            Err(errno) => {
                let e = ResourceError::from_errno("pthread_sigmask", errno);
                tracing::warn!(error = %e, "Could not block signals, run continues unshielded");
            }
        }

        if core.is_some() && self.settings.hold_dma_latency {
            match hold_dma_latency(&self.settings.dma_latency_path) {
                Ok(file) => {
                    report.dma_latency_held = true;
                    dma_hold = Some(file);
                }
                Err(e) => tracing::warn!(error = %e, "Could not hold CPU DMA latency"),
            }
        }

        tracing::debug!(?report, "Isolation acquired");

        IsolationGuard {
            snapshot,
            report,
            dma_hold,
            restore_governor: self.settings.restore_governor.clone(),
            _thread_bound: PhantomData,
        }
    }

    fn set_governor(&self, core: CoreId) -> Result<GovernorSnapshot, ResourceError> {
        let path = governor_path(&self.settings.cpu_root, core);
        let prior = match read_governor(&path) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!(core = %core, error = %e, "Prior governor unreadable");
                None
            }
        };

        write_governor(&path, &self.settings.performance_governor)?;
        tracing::debug!(
            core = %core,
            governor = %self.settings.performance_governor,
            prior = ?prior,
            "Frequency governor switched"
        );

        Ok(GovernorSnapshot { path, prior })
    }
}

fn warn_degraded(step: &'static str, core: CoreId, err: &ResourceError) {
    tracing::warn!(core = %core, error = %err, "Could not apply {}, isolation degraded", step);
}

/// RAII handle for an isolated run. Dropping it restores the prior state.
///
/// Thread-scoped state (affinity, scheduler, signal mask) belongs to the
/// acquiring thread, so the guard is neither `Send` nor `Sync`.
#[derive(Debug)]
pub struct IsolationGuard {
    snapshot: IsolationSnapshot,
    report: IsolationReport,
    dma_hold: Option<File>,
    restore_governor: String,
    _thread_bound: PhantomData<*const ()>,
}

impl IsolationGuard {
    pub fn report(&self) -> IsolationReport {
        self.report
    }

    /// Restore now instead of at scope end.
    pub fn release(self) {}

    fn restore(&mut self) {
        drop(self.dma_hold.take());

        if let Some(mask) = self.snapshot.signal_mask.take() {
            if let Err(errno) = pthread_sigmask(SigmaskHow::SIG_SETMASK, Some(&mask), None) {
                tracing::warn!(
                    error = %ResourceError::from_errno("pthread_sigmask", errno),
                    "Could not restore signal mask"
                );
            }
        }

        if let Some(scheduler) = self.snapshot.scheduler.take() {
            if let Err(e) = sys::restore_scheduler(&scheduler) {
                tracing::warn!(error = %e, "Could not restore scheduler policy");
            }
        }

        if let Some(affinity) = self.snapshot.affinity.take() {
            if let Err(e) = sys::restore_affinity(&affinity) {
                tracing::warn!(error = %e, "Could not restore CPU affinity");
            }
        }

        if let Some(governor) = self.snapshot.governor.take() {
            let value = governor.prior.as_deref().unwrap_or(&self.restore_governor);
            if let Err(e) = write_governor(&governor.path, value) {
                tracing::warn!(
                    path = %governor.path.display(),
                    error = %e,
                    "Could not restore frequency governor"
                );
            }
        }

        tracing::debug!("Isolation released");
    }
}

impl Drop for IsolationGuard {
    fn drop(&mut self) {
        self.restore();
    }
}

fn governor_path(cpu_root: &Path, core: CoreId) -> PathBuf {
    cpu_root
        .join(format!("cpu{}", core.index()))
        .join("cpufreq")
        .join("scaling_governor")
}

fn read_governor(path: &Path) -> Result<String, ResourceError> {
    std::fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .map_err(|e| ResourceError::from_io("read scaling_governor", &e))
}

fn write_governor(path: &Path, governor: &str) -> Result<(), ResourceError> {
    // sysfs attributes reject O_CREAT on missing nodes, so open for write only.
    let mut file = OpenOptions::new()
        .write(true)
        .truncate(true)
        .open(path)
        .map_err(|e| ResourceError::from_io("write scaling_governor", &e))?;
    file.write_all(governor.as_bytes())
        .map_err(|e| ResourceError::from_io("write scaling_governor", &e))
}

fn hold_dma_latency(path: &Path) -> Result<File, ResourceError> {
    let mut file = OpenOptions::new()
        .write(true)
        .open(path)
        .map_err(|e| ResourceError::from_io("open cpu_dma_latency", &e))?;
    file.write_all(&0i32.to_ne_bytes())
        .map_err(|e| ResourceError::from_io("write cpu_dma_latency", &e))?;
    Ok(file)
}

/// Thread-scoped state that isolation must leave untouched after a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadState {
    /// CPUs in the calling thread's affinity mask
    pub affinity: Vec<usize>,
    /// Scheduler policy and priority, where the platform exposes them
    pub scheduler: Option<(i32, i32)>,
    /// Signals blocked on the calling thread
    pub blocked_signals: Vec<Signal>,
}

impl ThreadState {
    /// Capture the calling thread's current state.
    pub fn capture() -> Result<Self, ResourceError> {
        let mask =
            SigSet::thread_get_mask().map_err(|e| ResourceError::from_errno("pthread_sigmask", e))?;

        Ok(Self {
            affinity: sys::affinity_list()?,
            scheduler: sys::current_scheduler().ok().map(|s| (s.policy, s.priority)),
            blocked_signals: Signal::iterator().filter(|s| mask.contains(*s)).collect(),
        })
    }
}

/// CPUs the calling thread may currently run on.
pub fn allowed_cores() -> Result<Vec<usize>, ResourceError> {
    sys::affinity_list()
}

#[cfg(target_os = "linux")]
mod sys {
    use nix::sched::{sched_getaffinity, sched_setaffinity, CpuSet};
    use nix::unistd::Pid;

    use crate::error::ResourceError;
    use crate::types::CoreId;

    #[derive(Debug, Clone, Copy)]
    pub(super) struct Affinity(CpuSet);

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(super) struct Scheduler {
        pub policy: i32,
        pub priority: i32,
    }

    fn current_affinity() -> Result<CpuSet, ResourceError> {
        sched_getaffinity(Pid::from_raw(0))
            .map_err(|e| ResourceError::from_errno("sched_getaffinity", e))
    }

    pub(super) fn affinity_list() -> Result<Vec<usize>, ResourceError> {
        let set = current_affinity()?;
        Ok((0..CpuSet::count())
            .filter(|&cpu| set.is_set(cpu).unwrap_or(false))
            .collect())
    }

    pub(super) fn pin(core: CoreId) -> Result<Affinity, ResourceError> {
        let prior = current_affinity()?;

        let mut target = CpuSet::new();
        target
            .set(core.index())
            .map_err(|e| ResourceError::from_errno("sched_setaffinity", e))?;
        sched_setaffinity(Pid::from_raw(0), &target)
            .map_err(|e| ResourceError::from_errno("sched_setaffinity", e))?;

        tracing::debug!(core = %core, "Thread pinned to CPU");
        Ok(Affinity(prior))
    }

    pub(super) fn restore_affinity(affinity: &Affinity) -> Result<(), ResourceError> {
        sched_setaffinity(Pid::from_raw(0), &affinity.0)
            .map_err(|e| ResourceError::from_errno("sched_setaffinity", e))
    }

    fn last_error(operation: &'static str) -> ResourceError {
        ResourceError::from_io(operation, &std::io::Error::last_os_error())
    }

    pub(super) fn current_scheduler() -> Result<Scheduler, ResourceError> {
        // SAFETY: pid 0 targets the calling thread; no pointers involved.
        let policy = unsafe { libc::sched_getscheduler(0) };
        if policy < 0 {
            return Err(last_error("sched_getscheduler"));
        }

        // SAFETY: sched_param is plain data; zeroed is a valid value on every libc.
        let mut param: libc::sched_param = unsafe { std::mem::zeroed() };
        // SAFETY: `param` is a valid, writable sched_param.
        if unsafe { libc::sched_getparam(0, &mut param) } != 0 {
            return Err(last_error("sched_getparam"));
        }

        Ok(Scheduler {
            policy,
            priority: param.sched_priority,
        })
    }

    fn set_scheduler(policy: i32, priority: i32) -> Result<(), ResourceError> {
        // SAFETY: as above.
        let mut param: libc::sched_param = unsafe { std::mem::zeroed() };
        param.sched_priority = priority;
        // SAFETY: `param` outlives the call and pid 0 is the calling thread.
        if unsafe { libc::sched_setscheduler(0, policy, &param) } != 0 {
            return Err(last_error("sched_setscheduler"));
        }
        Ok(())
    }

    pub(super) fn escalate() -> Result<Scheduler, ResourceError> {
        let prior = current_scheduler()?;

        // SAFETY: pure query.
        let max = unsafe { libc::sched_get_priority_max(libc::SCHED_FIFO) };
        if max < 0 {
            return Err(last_error("sched_get_priority_max"));
        }

        set_scheduler(libc::SCHED_FIFO, max)?;
        tracing::debug!(priority = max, "Thread escalated to SCHED_FIFO");
        Ok(prior)
    }

    pub(super) fn restore_scheduler(prior: &Scheduler) -> Result<(), ResourceError> {
        set_scheduler(prior.policy, prior.priority)
    }
}

#[cfg(not(target_os = "linux"))]
mod sys {
    use crate::error::ResourceError;
    use crate::types::CoreId;

    #[derive(Debug, Clone, Copy)]
    pub(super) struct Affinity;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(super) struct Scheduler {
        pub policy: i32,
        pub priority: i32,
    }

    pub(super) fn affinity_list() -> Result<Vec<usize>, ResourceError> {
        Ok(Vec::new())
    }

    pub(super) fn pin(_core: CoreId) -> Result<Affinity, ResourceError> {
        Err(ResourceError::Unsupported {
            feature: "thread CPU affinity",
        })
    }

    pub(super) fn restore_affinity(_affinity: &Affinity) -> Result<(), ResourceError> {
        Ok(())
    }

    pub(super) fn current_scheduler() -> Result<Scheduler, ResourceError> {
        Err(ResourceError::Unsupported {
            feature: "SCHED_FIFO",
        })
    }

    pub(super) fn escalate() -> Result<Scheduler, ResourceError> {
        current_scheduler()
    }

    pub(super) fn restore_scheduler(_prior: &Scheduler) -> Result<(), ResourceError> {
        Ok(())
    }
}
