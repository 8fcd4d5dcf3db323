/*
 * Signal Delivery & Process Lifecycle Glue
 *
 * sigacts (shared, refcounted disposition table), ksiginfo (queued signal
 * records, capacity 8 per signal per pending set, oldest dropped on
 * overflow), the pending bitmask, and the delivery loop that
 * `scheduler::context_switch` consults on the return-to-user path.
 *
 * Ordering the delivery loop honors, highest priority first:
 *   1. SIGKILL / SIGTERM-class ("sigterm" mask): unconditional, ignores
 *      the process's own handler table.
 *   2. SIGCONT: clears a pending SIGSTOP-class stop and resumes.
 *   3. SIGSTOP-class ("sigstop" mask): transitions the process to Stopped
 *      without running a handler.
 *   4. Lowest-numbered pending-and-unmasked signal with a registered
 *      handler or default action.
 */

pub mod delivery;
pub mod frame;
pub mod sigacts;

use alloc::sync::Arc;
use core::sync::atomic::{AtomicU64, Ordering};
use spin::Mutex;

pub use sigacts::{SigAction, SigActions, SigDisposition};

/// Signal numbers this kernel recognizes. Not a full POSIX set (exact
/// si_code fidelity is an explicit Non-goal); just enough to drive
/// fork/exit/wait/stop/continue semantics and the testable scenarios.
pub mod signum {
    pub const SIGHUP: u32 = 1;
    pub const SIGINT: u32 = 2;
    pub const SIGQUIT: u32 = 3;
    pub const SIGILL: u32 = 4;
    pub const SIGKILL: u32 = 9;
    pub const SIGSEGV: u32 = 11;
    pub const SIGPIPE: u32 = 13;
    pub const SIGALRM: u32 = 14;
    pub const SIGTERM: u32 = 15;
    pub const SIGCHLD: u32 = 17;
    pub const SIGCONT: u32 = 18;
    pub const SIGSTOP: u32 = 19;
    pub const SIGTSTP: u32 = 20;
    pub const MAX_SIGNUM: u32 = 32;
}

fn bit(signum: u32) -> u64 {
    1u64 << (signum - 1)
}

/// Signals that terminate regardless of handler (SIGKILL always; SIGTERM
/// only if not caught/ignored — the handler check happens in delivery.rs,
/// this mask just flags "default action is fatal").
pub fn sigterm_mask() -> u64 {
    bit(signum::SIGKILL) | bit(signum::SIGTERM) | bit(signum::SIGSEGV) | bit(signum::SIGILL)
}

pub fn sigstop_mask() -> u64 {
    bit(signum::SIGSTOP) | bit(signum::SIGTSTP)
}

pub fn sigcont_mask() -> u64 {
    bit(signum::SIGCONT)
}

pub fn sigignore_default_mask() -> u64 {
    bit(signum::SIGCHLD)
}

/// One queued signal record. `si_code`/`si_value` are deliberately sparse
/// (no full POSIX siginfo_t): exact si_code fidelity is out of scope.
#[derive(Debug, Clone, Copy)]
pub struct KSigInfo {
    pub signum: u32,
    pub sender_pid: usize,
    pub value: isize,
}

pub const MAX_QUEUED: usize = 8;

/// Per-process pending state: a fast bitmask for "is signum pending at
/// all" plus a bounded per-signal queue of the actual records (needed
/// because two sends of the same real-time-ish signal must both be
/// observable; once a signal's queue is full the oldest record is
/// dropped and the bit stays set so the recipient still sees *a*
/// delivery).
pub struct PendingSet {
    mask: AtomicU64,
    /// One queue per signal number, each independently capped at
    /// `MAX_QUEUED`: a flood of one signal can never evict another
    /// signal's records.
    queues: [Mutex<heapless::Deque<KSigInfo, MAX_QUEUED>>; signum::MAX_SIGNUM as usize],
}

impl PendingSet {
    pub fn new() -> Self {
        PendingSet {
            mask: AtomicU64::new(0),
            queues: core::array::from_fn(|_| Mutex::new(heapless::Deque::new())),
        }
    }

    pub fn mask(&self) -> u64 {
        self.mask.load(Ordering::Acquire)
    }

    /// Queue a signal. Returns true if a record was actually stored
    /// (false means that signal's own queue was full and its oldest
    /// entry was dropped — the bit is still set either way, per the
    /// "local recovery" overflow policy).
    pub fn push(&self, info: KSigInfo) -> bool {
        self.mask.fetch_or(bit(info.signum), Ordering::AcqRel);
        let mut q = self.queues[(info.signum - 1) as usize].lock();
        if q.is_full() {
            q.pop_front();
            let _ = q.push_back(info);
            false
        } else {
            let _ = q.push_back(info);
            true
        }
    }

    /// Pop the next record matching the lowest-numbered bit in `blocked`
    /// that is not masked, recomputing SIGPENDING as it goes.
    pub fn take_next(&self, blocked: u64) -> Option<KSigInfo> {
        let deliverable = self.mask.load(Ordering::Acquire) & !blocked;
        if deliverable == 0 {
            return None;
        }
        let signum = deliverable.trailing_zeros() + 1;
        let mut q = self.queues[(signum - 1) as usize].lock();
        let found = q.pop_front();
        if q.is_empty() {
            self.mask.fetch_and(!bit(signum), Ordering::AcqRel);
        }
        found
    }

    pub fn clear(&self, signum: u32) {
        self.mask.fetch_and(!bit(signum), Ordering::AcqRel);
        let mut q = self.queues[(signum - 1) as usize].lock();
        while q.pop_front().is_some() {}
    }
}

/// Optional thread-group-shared pending set. A PCB either has its own
/// `PendingSet` (the common case: each `fork()` makes a new thread group
/// of size one) or points at a shared one when created with signals
/// shared (see Open Question 3 in DESIGN.md).
pub type SharedPending = Arc<PendingSet>;
