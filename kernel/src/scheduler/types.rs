/*
 * Scheduler Value Types
 *
 * CpuId, Priority and the block-reason/flags vocabulary shared by the
 * run-queue, entity and context-switch modules.
 */

/// Number of logical CPUs the run-queue tables are sized for.
///
/// Only CPU 0 (the BSP) is ever brought up by `_start` (AP bring-up is out
/// of scope for this kernel), so CPUs 1..NR_CPUS exist only as inert rows
/// in the per-CPU tables: `active_cpu_mask()` never sets their bit and
/// `select_task_rq` never picks them. That keeps the run-queue and mask
/// code genuinely multi-CPU shaped without requiring a real SIPI sequence.
pub const NR_CPUS: usize = 4;

/// Affinity bitmask with every active-possible CPU set (bit i = CPU i);
/// the default for kernel processes that never call `set_affinity`.
pub const ALL_CPUS_MASK: u8 = (1u8 << NR_CPUS) - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CpuId(pub u8);

impl CpuId {
    pub const BSP: CpuId = CpuId(0);

    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// CPU this code is running on. Only the BSP is ever brought up, so this
/// is a constant rather than reading APIC ID; generalizing it is the
/// only change needed to run this same logic on real APs.
#[inline]
pub fn this_cpu() -> CpuId {
    CpuId::BSP
}

impl core::fmt::Display for CpuId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "cpu{}", self.0)
    }
}

/// Scheduling priority: a 6-bit major level plus a 2-bit minor tie-break.
///
/// Lower major numbers run first (major 0 is reserved, see
/// `EXIT_MAJOR_PRIORITY`; major 63 is the idle class). Within a major,
/// minor selects one of four FIFO sub-queues, used as a coarse round-robin
/// knob so a class can spread load across sub-queues without a full
/// O(n) sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Priority {
    pub major: u8,
    pub minor: u8,
}

impl Priority {
    /// Reserved, never armed: see Open Question 4 in DESIGN.md.
    pub const EXIT_MAJOR_PRIORITY: u8 = 0;

    pub const FIFO_MIN_MAJOR: u8 = 1;
    pub const FIFO_MAX_MAJOR: u8 = 62;
    pub const IDLE_MAJOR: u8 = 63;

    pub const NORMAL: Priority = Priority { major: 32, minor: 0 };
    pub const SYSTEM: Priority = Priority { major: 8, minor: 0 };
    pub const IDLE: Priority = Priority { major: Self::IDLE_MAJOR, minor: 0 };

    pub const fn new(major: u8, minor: u8) -> Self {
        Priority { major, minor }
    }

    /// Pack into a single ready-mask index: `major` directly, `minor`
    /// selects the FIFO sub-queue at that major, not the mask bit.
    pub fn mask_index(self) -> u8 {
        self.major
    }
}

/// Why a process is off the run queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    Sleeping { until_tick: u64 },
    WaitingOnChan { chan: usize },
    WaitingForChild { pid: usize },
    Stopped,
    Other,
}

/// Differentiates which wake sources may cut a sleep short. `BlockReason`
/// says what a process is waiting for; `SleepClass` says what is allowed
/// to interrupt that wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepClass {
    /// Woken by a signal, a matching wakeup, or an explicit wake.
    Interruptible,
    /// Woken only by SIGKILL or an explicit wake.
    Killable,
    /// Woken only by timer expiration or an explicit wake.
    Timer,
    /// Woken by either SIGKILL or timer expiration, or an explicit wake.
    KillableTimer,
    /// Woken only by an explicit wake; signals and timers never cut it.
    Uninterruptible,
}

impl SleepClass {
    pub fn wakes_on_signal(self) -> bool {
        matches!(self, SleepClass::Interruptible)
    }

    pub fn wakes_on_kill(self) -> bool {
        matches!(self, SleepClass::Killable | SleepClass::KillableTimer)
    }

    pub fn wakes_on_timer(self) -> bool {
        matches!(self, SleepClass::Timer | SleepClass::KillableTimer)
    }
}

/// Which scheduling class a process belongs to, as a plain tag for
/// diagnostics; dispatch itself goes through the `SchedClass` vtable
/// (`scheduler::class`), not a match on this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedClassKind {
    Fifo,
    Idle,
}
