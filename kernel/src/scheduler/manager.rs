/*
 * SchedulerManager
 *
 * Public facade over the scheduler submodules, in the spirit of the
 * teacher's zero-sized "Manager" types (ProcessManager/ThreadManager):
 * a unit struct whose methods are the only thing the rest of the kernel
 * is expected to call directly.
 */

use alloc::sync::Arc;

use crate::collab::KernelError;

use super::chan;
use super::context_switch;
use super::lifecycle::{self, ForkFlags};
use super::process::{Pid, Process, PROCESSES};
use super::rq;
use super::types::{CpuId, Priority};

pub struct SchedulerManager;

impl SchedulerManager {
    /// One-time boot setup: register CPU 0 as active and create its idle
    /// process. Must run before `enable()`.
    pub fn init() {
        rq::mark_cpu_active(CpuId::BSP);
        lifecycle::kernel_proc_create("idle0", Priority::IDLE, idle_loop);
    }

    /// Flip on preemption. Before this, `schedule_from_interrupt` is a
    /// no-op so boot code can run on the bootstrap stack undisturbed.
    pub fn enable() {
        context_switch::enable();
    }

    pub fn spawn_kernel(name: &str, priority: Priority, entry: extern "C" fn() -> !) -> Arc<Process> {
        lifecycle::kernel_proc_create(name, priority, entry)
    }

    pub fn fork(parent: &Arc<Process>, flags: ForkFlags, entry: extern "C" fn() -> !) -> Result<Pid, KernelError> {
        lifecycle::fork(parent, flags, entry)
    }

    pub fn exit(current: &Arc<Process>, code: i32) -> ! {
        lifecycle::exit(current, code)
    }

    pub fn wait(parent: &Arc<Process>) -> Result<(Pid, i32), KernelError> {
        lifecycle::wait(parent)
    }

    pub fn yield_now() {
        context_switch::yield_now();
    }

    pub fn wake(pid: Pid) -> bool {
        context_switch::try_to_wake_up(pid)
    }

    pub fn wake_interruptible(pid: Pid) -> bool {
        context_switch::wake_interruptible(pid)
    }

    pub fn wake_killable(pid: Pid) -> bool {
        context_switch::wake_killable(pid)
    }

    pub fn wake_timeout(pid: Pid) -> bool {
        context_switch::wake_timeout(pid)
    }

    pub fn sleep_on_chan(current: &Process, class: super::types::SleepClass, chan_id: usize) {
        chan::sleep_on_chan(current, class, chan_id);
    }

    pub fn wakeup_on_chan(chan_id: usize) -> usize {
        chan::wakeup_on_chan(chan_id)
    }

    pub fn current(cpu: CpuId) -> Option<Arc<Process>> {
        let pid = rq::table().with(cpu, |q| q.current)?;
        PROCESSES.get(pid)
    }

    pub fn process(pid: Pid) -> Option<Arc<Process>> {
        PROCESSES.get(pid)
    }

    pub fn process_count() -> usize {
        PROCESSES.len()
    }

    /// Stop a process (SIGSTOP-class): parked off the run queue without
    /// becoming a zombie, resumed only by `SIGCONT` via `continue_process`.
    pub fn stop(p: &Process) {
        p.set_state(super::process::ProcessState::Stopped);
        context_switch::yield_now();
    }

    /// Continue protocol: resume a `Stopped` process and re-enqueue it.
    /// Idempotent, same as `stop`: calling it twice or on a process that
    /// was never stopped is a no-op.
    pub fn continue_process(p: &Process) -> bool {
        context_switch::continue_process(p)
    }
}

extern "C" fn idle_loop() -> ! {
    loop {
        super::rcu::quiescent_state(CpuId::BSP.as_usize());
        crate::arch::x86_64::interrupts::enable();
        x86_64::instructions::hlt();
    }
}
