/*
 * Context Switch / Sleep / Wake Protocol
 *
 * Lock hierarchy (outer to inner; never acquire in the reverse order):
 *   1. sleep-queue lock   (chan.rs's per-channel wait-queue Mutex)
 *   2. PCB state lock     (Process::state)
 *   3. pi_lock            (SchedEntity::pi_lock)
 *   4. run-queue spinlock (RunQueue, behind rq::table())
 *
 * `pi_lock` is what makes the wake-vs-switch-out race safe: a wakeup
 * (try_to_wake_up) and a voluntary switch-out (schedule_from_interrupt's
 * handling of the outgoing process) both take the outgoing process's
 * `pi_lock` before deciding whether to re-enqueue it, so the two can never
 * race to both leave it off every run queue or to queue it twice. This is
 * the "race-fix" path referenced below.
 */

use core::sync::atomic::{AtomicBool, Ordering};

use crate::utils::system::timer;

use super::class;
use super::process::{Pid, Process, ProcessState, PROCESSES};
use super::rq;
use super::types::{this_cpu, BlockReason, CpuId, SleepClass};

pub static SCHEDULER_ENABLED: AtomicBool = AtomicBool::new(false);
pub static PREEMPTION_DISABLED: AtomicBool = AtomicBool::new(false);

pub fn enable() {
    SCHEDULER_ENABLED.store(true, Ordering::SeqCst);
}

pub struct PreemptGuard;

impl PreemptGuard {
    pub fn new() -> Self {
        PREEMPTION_DISABLED.store(true, Ordering::SeqCst);
        PreemptGuard
    }
}

impl Drop for PreemptGuard {
    fn drop(&mut self) {
        PREEMPTION_DISABLED.store(false, Ordering::SeqCst);
    }
}

/// Matches the CPU-pushed interrupt frame exactly: RIP/CS/RFLAGS/RSP/SS,
/// in that order, as iretq expects them.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct InterruptFrame {
    pub rip: u64,
    pub cs: u64,
    pub rflags: u64,
    pub rsp: u64,
    pub ss: u64,
}

impl Default for InterruptFrame {
    fn default() -> Self {
        InterruptFrame { rip: 0, cs: 0x08, rflags: 0x202, rsp: 0, ss: 0x10 }
    }
}

/// Full saved register state for a process that isn't currently running.
/// Field order must match the push/pop sequence in the naked handlers
/// below: RSP after the pushes points at `r15`, the first field.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct InterruptContext {
    pub r15: u64,
    pub r14: u64,
    pub r13: u64,
    pub r12: u64,
    pub r11: u64,
    pub r10: u64,
    pub r9: u64,
    pub r8: u64,
    pub rbp: u64,
    pub rdi: u64,
    pub rsi: u64,
    pub rdx: u64,
    pub rcx: u64,
    pub rbx: u64,
    pub rax: u64,
    pub iret_frame: InterruptFrame,
}

/// Carve out an `InterruptContext` at the top of a freshly allocated
/// kernel stack so the first switch into this process lands at
/// `entry` with interrupts enabled (rflags = 0x202) and kernel segment
/// selectors loaded.
pub fn init_kernel_stack(kstack: &mut [u8], entry: extern "C" fn() -> !) -> usize {
    let top = kstack.as_ptr() as usize + kstack.len();
    let ctx_addr = (top - core::mem::size_of::<InterruptContext>()) & !0xf;
    let ctx = ctx_addr as *mut InterruptContext;
    unsafe {
        core::ptr::write(
            ctx,
            InterruptContext {
                iret_frame: InterruptFrame { rip: entry as u64, rsp: ctx_addr as u64, ..Default::default() },
                ..Default::default()
            },
        );
    }
    ctx_addr
}

/// Pick the highest-priority runnable process for `cpu`, falling back to
/// the registered idle process, and commit to it via `set_next`: the
/// chosen pid is removed from its class's queue and becomes the one
/// marked current by the caller. Tries the FIFO class first since it is
/// the only class with real priority ordering; the idle class always has
/// an answer.
fn pick_and_commit_next(cpu: CpuId) -> Option<Pid> {
    let pid = class::fifo().pick_next(cpu).or_else(|| class::idle().pick_next(cpu))?;
    if let Some(p) = PROCESSES.get(pid) {
        let prio = p.se.priority();
        let slot = class::QueueSlot { major: prio.major, minor: prio.minor };
        p.se.class.lock().clone().set_next(pid, cpu, slot);
    }
    Some(pid)
}

/// Called from the naked interrupt trampolines with a pointer to the
/// outgoing process's just-saved `InterruptContext`. Returns the pointer
/// to load into RSP to resume the next process. Runs with interrupts
/// disabled and must not block.
#[unsafe(no_mangle)]
pub extern "C" fn schedule_from_interrupt(current_ctx_ptr: *const InterruptContext) -> *const InterruptContext {
    if !SCHEDULER_ENABLED.load(Ordering::SeqCst) {
        return current_ctx_ptr;
    }
    if PREEMPTION_DISABLED.load(Ordering::SeqCst) {
        timer::on_timer_interrupt();
        return current_ctx_ptr;
    }
    timer::on_timer_interrupt();

    let cpu = this_cpu();
    let prev_pid = rq::table().with(cpu, |q| q.current);

    if let Some(prev_pid) = prev_pid {
        if let Some(prev) = PROCESSES.get(prev_pid) {
            prev.kstack_sp.store(current_ctx_ptr as usize, Ordering::Release);
            requeue_outgoing(&prev, cpu);
        }
    }

    let next_pid = pick_and_commit_next(cpu).unwrap_or(prev_pid.unwrap_or(0));
    rq::table().with(cpu, |q| q.current = Some(next_pid));

    let Some(next) = PROCESSES.get(next_pid) else {
        return current_ctx_ptr;
    };
    next.se.on_cpu.store(true, Ordering::Release);
    next.se.on_rq.store(false, Ordering::Release);
    next.kstack_sp.load(Ordering::Acquire) as *const InterruptContext
}

/// Decide whether the process we just switched away from belongs back on
/// a run queue. Holds `pi_lock` for the whole decision, which is what
/// prevents a concurrent `try_to_wake_up` from either missing this
/// process or double-enqueuing it (see the module doc comment).
fn requeue_outgoing(prev: &Process, cpu: CpuId) {
    let _guard = prev.se.pi_lock.lock();
    prev.se.on_cpu.store(false, Ordering::Release);
    match prev.state() {
        ProcessState::Running | ProcessState::Runnable => {
            prev.set_state(ProcessState::Runnable);
            put_prev_outgoing(prev, cpu);
        }
        ProcessState::Blocked(_, _) | ProcessState::Stopped | ProcessState::Zombie => {
            // Already off the run queue; nothing to do. A wakeup arriving
            // concurrently would block on pi_lock above and re-enqueue
            // after we release it here.
        }
    }
}

/// Re-insert the process that just switched out, via its class's
/// `put_prev` rather than the first-admission `enqueue` path: the two
/// are conceptually distinct steps of the context-switch protocol even
/// though FIFO implements them identically.
fn put_prev_outgoing(p: &Process, cpu: CpuId) {
    let prio = p.se.priority();
    let class = p.se.class.lock().clone();
    class.put_prev(p.pid, cpu, super::class::QueueSlot { major: prio.major, minor: prio.minor });
    p.se.on_rq.store(true, Ordering::Release);
}

/// First admission of a process to a run queue: a fresh fork, a
/// newly-created kernel process, or a wake-up. Distinct from
/// `put_prev_outgoing`, which re-inserts a process the mechanism had
/// just switched away from.
fn enqueue(p: &Process, cpu: CpuId) {
    let prio = p.se.priority();
    let class = p.se.class.lock().clone();
    class.enqueue(p.pid, cpu, super::class::QueueSlot { major: prio.major, minor: prio.minor });
    p.se.on_rq.store(true, Ordering::Release);
}

/// Voluntarily give up the CPU without changing state; the process stays
/// runnable and will be re-enqueued by `requeue_outgoing`.
pub fn yield_now() {
    unsafe { core::arch::asm!("int 0x81", options(nostack)) };
}

/// Block the current process on `reason` and switch away. Must be called
/// with the caller already confident no wakeup can fire before the state
/// change is visible (sleeping protocols take the sleep-queue lock first,
/// per the lock hierarchy above, then set Blocked here, then call this).
pub fn sleep(current: &Process, class: SleepClass, reason: BlockReason) {
    current.set_state(ProcessState::Blocked(class, reason));
    yield_now();
}

/// Shared core of every wake entry point: wakes `pid` if it is currently
/// `Blocked` with a `SleepClass` the caller's `allow` predicate accepts.
/// Returns true if it was actually transitioned and re-enqueued (false if
/// it was already runnable/running, blocked in a class that doesn't
/// accept this wake source, or didn't exist).
fn try_wake_with(pid: Pid, allow: impl FnOnce(SleepClass) -> bool) -> bool {
    let Some(p) = PROCESSES.get(pid) else { return false };
    let _guard = p.se.pi_lock.lock();
    match p.state() {
        ProcessState::Blocked(class, _) if allow(class) => {
            p.set_state(ProcessState::Runnable);
            if !p.se.is_on_cpu() {
                let cpu = p.se.class.lock().select_task_rq(p.se.priority(), p.se.affinity());
                *p.se.cpu.lock() = cpu;
                enqueue(&p, cpu);
                rq::table().with(cpu, |q| q.request_reschedule());
            }
            true
        }
        _ => false,
    }
}

/// Unconditional wake: transitions `pid` out of `Blocked` regardless of
/// its `SleepClass`. Matches `try_to_wake_up`'s idempotence contract —
/// a second call on an already-runnable pid is a no-op.
pub fn try_to_wake_up(pid: Pid) -> bool {
    try_wake_with(pid, |_| true)
}

/// Wake only if the process is sleeping in a class that honors signals.
pub fn wake_interruptible(pid: Pid) -> bool {
    try_wake_with(pid, SleepClass::wakes_on_signal)
}

/// Wake only if the process is sleeping in a class that honors SIGKILL.
pub fn wake_killable(pid: Pid) -> bool {
    try_wake_with(pid, SleepClass::wakes_on_kill)
}

/// Wake only if the process is sleeping in a class that honors timer
/// expiration.
pub fn wake_timeout(pid: Pid) -> bool {
    try_wake_with(pid, SleepClass::wakes_on_timer)
}

/// Continue protocol: resume a `Stopped` process, re-enqueuing it onto a
/// run queue. Idempotent, matching `scheduler_stop`'s contract — a
/// process that isn't currently `Stopped` is left untouched.
pub fn continue_process(p: &Process) -> bool {
    let _guard = p.se.pi_lock.lock();
    if p.state() != ProcessState::Stopped {
        return false;
    }
    p.set_state(ProcessState::Runnable);
    if !p.se.is_on_cpu() {
        let cpu = p.se.class.lock().select_task_rq(p.se.priority(), p.se.affinity());
        *p.se.cpu.lock() = cpu;
        enqueue(p, cpu);
        rq::table().with(cpu, |q| q.request_reschedule());
    }
    true
}

/// Software interrupt handler for voluntary yielding (INT 0x81). Same
/// register-save/restore shape as the timer handler; no EOI since
/// software interrupts never touch the PIC.
#[unsafe(naked)]
pub unsafe extern "C" fn yield_interrupt_handler() {
    core::arch::naked_asm!(
        "push rax",
        "push rbx",
        "push rcx",
        "push rdx",
        "push rsi",
        "push rdi",
        "push rbp",
        "push r8",
        "push r9",
        "push r10",
        "push r11",
        "push r12",
        "push r13",
        "push r14",
        "push r15",
        "mov rdi, rsp",
        "call {schedule_fn}",
        "mov rsp, rax",
        "pop r15",
        "pop r14",
        "pop r13",
        "pop r12",
        "pop r11",
        "pop r10",
        "pop r9",
        "pop r8",
        "pop rbp",
        "pop rdi",
        "pop rsi",
        "pop rdx",
        "pop rcx",
        "pop rbx",
        "pop rax",
        "iretq",
        schedule_fn = sym schedule_from_interrupt,
    )
}

/// Preemptive timer interrupt handler. Identical register dance, plus a
/// master-PIC EOI before the `iretq`.
#[unsafe(naked)]
pub unsafe extern "C" fn preemptive_timer_interrupt_handler() {
    core::arch::naked_asm!(
        "push rax",
        "push rbx",
        "push rcx",
        "push rdx",
        "push rsi",
        "push rdi",
        "push rbp",
        "push r8",
        "push r9",
        "push r10",
        "push r11",
        "push r12",
        "push r13",
        "push r14",
        "push r15",
        "mov rdi, rsp",
        "call {schedule_fn}",
        "mov rsp, rax",
        "pop r15",
        "pop r14",
        "pop r13",
        "pop r12",
        "pop r11",
        "pop r10",
        "pop r9",
        "pop r8",
        "pop rbp",
        "pop rdi",
        "pop rsi",
        "pop rdx",
        "pop rcx",
        "pop rbx",
        "pop rax",
        "push rax",
        "mov al, 0x20",
        "out 0x20, al",
        "pop rax",
        "iretq",
        schedule_fn = sym schedule_from_interrupt,
    )
}
