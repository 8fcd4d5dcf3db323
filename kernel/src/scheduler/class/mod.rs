/*
 * Scheduling-Class Vtable
 *
 * `SchedClass` is the mechanism/policy seam: the run-queue and
 * context-switch code (mechanism) never special-cases a priority range,
 * it calls through `Arc<dyn SchedClass>` (policy). Two implementors ship
 * with this kernel: `FifoClass` for majors 1..=62 and `IdleClass` for the
 * per-CPU idle process at major 63. Adding a new class (e.g. a future
 * round-robin-with-timeslice class) means implementing this trait, not
 * touching `rq.rs` or `context_switch.rs`.
 */

pub mod fifo;
pub mod idle;

use alloc::sync::Arc;
use lazy_static::lazy_static;

use super::process::Pid;
use super::types::{CpuId, Priority};

/// Picked by `select_task_rq`/`enqueue` to tell the mechanism which
/// run-queue slot (major, minor) a process occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueSlot {
    pub major: u8,
    pub minor: u8,
}

pub trait SchedClass: Send + Sync {
    fn name(&self) -> &'static str;

    /// Called once when a process is first admitted to this class.
    fn enqueue(&self, pid: Pid, cpu: CpuId, slot: QueueSlot);

    /// Called when a process leaves this class's run queue (blocks,
    /// exits, or migrates to another class).
    fn dequeue(&self, pid: Pid, cpu: CpuId, slot: QueueSlot);

    /// Choose the next process to run on `cpu` without removing it from
    /// the queue, if this class has one ready. The mechanism tries
    /// classes in priority order and stops at the first `Some`; the pick
    /// is only committed by a following `set_next` call.
    fn pick_next(&self, cpu: CpuId) -> Option<Pid>;

    /// Commit to running the process `pick_next` just chose: remove it
    /// from this class's queue and mark it current.
    fn set_next(&self, pid: Pid, cpu: CpuId, slot: QueueSlot);

    /// Re-insert the process that was running before this switch-out,
    /// if it is still runnable. The counterpart to `set_next` on the
    /// outgoing side of the protocol.
    fn put_prev(&self, pid: Pid, cpu: CpuId, slot: QueueSlot);

    /// Which CPU a newly-woken or newly-created process of this class
    /// should run on, given its priority and affinity mask. Takes these
    /// explicitly rather than a pid: callers that create or wake a
    /// process need an answer before (fork/create) or independently of
    /// (wake) that process's table entry reflecting the new placement.
    fn select_task_rq(&self, priority: Priority, affinity: u8) -> CpuId;

    /// Timer-tick hook: decide whether `pid` should be preempted.
    fn task_tick(&self, pid: Pid, cpu: CpuId) -> bool;
}

lazy_static! {
    static ref FIFO: Arc<fifo::FifoClass> = Arc::new(fifo::FifoClass::new());
    static ref IDLE: Arc<idle::IdleClass> = Arc::new(idle::IdleClass::new());
}

/// Shared singleton: every FIFO-class process holds a clone of the same
/// `Arc`, since the class carries no per-process state of its own.
pub fn fifo() -> Arc<dyn SchedClass> {
    FIFO.clone()
}

/// Shared singleton, unlike `fifo()`'s stateless equivalent: `IdleClass`
/// remembers which pid is "the idle process" per CPU, so every caller
/// must see the same instance.
pub fn idle() -> Arc<dyn SchedClass> {
    IDLE.clone()
}

/// Access the idle-class singleton concretely, for registering a CPU's
/// idle process at boot (`SchedClass` alone can't express `register`).
pub fn idle_concrete() -> Arc<idle::IdleClass> {
    IDLE.clone()
}
