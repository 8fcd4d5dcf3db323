/*
 * Process Lifecycle: fork / exit / wait / kernel_proc_create
 */

use alloc::sync::Arc;
use core::sync::atomic::Ordering;

use crate::collab::KernelError;
use crate::io::fd::FileDescriptorTable;
use crate::memory::address_space::AddressSpace;
use crate::signal::{PendingSet, SigActions};

use super::chan;
use super::class::{self, QueueSlot};
use super::context_switch;
use super::process::{Pid, Process, ProcessFlags, ProcessState, PROCESSES};
use super::rcu;
use super::rq;
use super::types::{Priority, SleepClass};

/// Options controlling how much state `fork()` shares with the child
/// rather than duplicating, per the thread-group signal-sharing Open
/// Question.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForkFlags {
    pub share_sigacts: bool,
    pub share_pending: bool,
}

/// Duplicate `parent` into a new runnable child. The child starts life
/// with a cloned address space is NOT performed here (copy-on-write page
/// tables are out of scope); instead it gets a fresh user address space,
/// matching the "VmOps only promises setup, not COW" limit documented in
/// collab.rs.
///
/// Real fork-returns-twice semantics need a saved trapframe to duplicate
/// (the classic approach: copy the syscall trapframe, zero its return
/// register in the copy); this kernel has no syscall trap path (out of
/// scope), so `fork()` is only reachable as a direct call and there is no
/// register snapshot of "the parent, right now" to clone. Instead the
/// child is handed its own fresh kernel stack and starts at `entry`,
/// matching `kernel_proc_create`'s shape. `parent.pid`/`0` return-value
/// semantics degenerate to: the caller observes `fork()`'s `Ok(child_pid)`
/// in its own control flow, and `entry` is whatever the child should run.
pub fn fork(parent: &Arc<Process>, flags: ForkFlags, entry: extern "C" fn() -> !) -> Result<Pid, KernelError> {
    let vm = if parent.is_kernel() {
        AddressSpace::new_kernel()
    } else {
        AddressSpace::new_user().map_err(|_| KernelError::OutOfMemory)?
    };

    let fd_table = parent.fd_table.lock().duplicate();

    let sigacts = if flags.share_sigacts {
        parent.sigacts.clone()
    } else {
        Arc::new(parent.sigacts.duplicate())
    };

    let pending = if flags.share_pending {
        parent.pending.clone()
    } else {
        Arc::new(PendingSet::new())
    };

    let class = parent.se.class.lock().clone();
    let priority = parent.se.priority();
    let affinity = parent.se.affinity();
    let pid = super::process::alloc_pid_for_fork();
    let cpu = class.select_task_rq(priority, affinity);

    let child = Arc::new(Process {
        pid,
        parent: spin::Mutex::new(Some(parent.pid)),
        children: spin::Mutex::new(alloc::vec::Vec::new()),
        state: spin::Mutex::new(ProcessState::Runnable),
        flags: parent.flags,
        name: parent.name.clone(),
        se: super::entity::SchedEntity::new(class.clone(), priority, cpu, affinity),
        kstack: spin::Mutex::new(alloc::vec![0u8; super::process::KSTACK_SIZE].into_boxed_slice()),
        kstack_sp: core::sync::atomic::AtomicUsize::new(0),
        vm: Arc::new(spin::Mutex::new(vm)),
        fd_table: Arc::new(spin::Mutex::new(fd_table)),
        sigacts,
        pending,
        blocked_signals: core::sync::atomic::AtomicU64::new(parent.blocked_signals.load(Ordering::Acquire)),
        signal_frame: spin::Mutex::new(None),
        exit_code: core::sync::atomic::AtomicI32::new(0),
        wait_chan: spin::Mutex::new(None),
    });

    {
        let mut kstack = child.kstack.lock();
        let sp = context_switch::init_kernel_stack(&mut kstack, entry);
        child.kstack_sp.store(sp, Ordering::Release);
    }

    parent.children.lock().push(pid);
    PROCESSES.insert(child.clone());

    let slot = QueueSlot { major: priority.major, minor: priority.minor };
    class.enqueue(pid, cpu, slot);
    child.se.on_rq.store(true, Ordering::Release);
    rq::table().with(cpu, |q| q.request_reschedule());

    Ok(pid)
}

/// Conventional pid of the first kernel process created at boot; orphans
/// are reparented to it so `wait()` always has somewhere to land.
pub const INIT_PID: Pid = 1;

/// Terminate the current process. Reparents children to `INIT_PID`,
/// wakes any parent blocked in `wait()` on this pid's channel, and
/// switches away for good: a Zombie is never picked by `pick_next` again
/// since it's off every run queue and `requeue_outgoing` only
/// re-enqueues Runnable.
pub fn exit(current: &Arc<Process>, code: i32) -> ! {
    current.exit_code.store(code, Ordering::Release);
    current.set_state(ProcessState::Zombie);

    let children: alloc::vec::Vec<Pid> = current.children.lock().drain(..).collect();
    for child_pid in children {
        if let Some(child) = PROCESSES.get(child_pid) {
            *child.parent.lock() = Some(INIT_PID);
        }
    }

    if let Some(parent_pid) = *current.parent.lock() {
        chan::wakeup_on_chan(wait_chan_for(parent_pid));
    }

    context_switch::yield_now();
    unreachable!("a zombie process was rescheduled")
}

/// Channel a parent sleeps on while waiting for any of its children to
/// exit: keyed by the parent's own pid so each parent has a distinct
/// channel number.
pub fn wait_chan_for(parent_pid: Pid) -> usize {
    0xFFFF_0000_0000_0000usize | parent_pid
}

/// Block until a child of `parent` becomes a zombie, then reap it and
/// return its (pid, exit_code). Returns `Err(NoSuchProcess)` if the
/// process currently has no children at all.
pub fn wait(parent: &Arc<Process>) -> Result<(Pid, i32), KernelError> {
    loop {
        let zombie_pid = {
            let children = parent.children.lock();
            if children.is_empty() {
                return Err(KernelError::NoSuchProcess);
            }
            children
                .iter()
                .copied()
                .find(|&pid| PROCESSES.get(pid).map(|p| p.state() == ProcessState::Zombie).unwrap_or(false))
        };

        if let Some(pid) = zombie_pid {
            let zombie = PROCESSES.remove(pid).expect("zombie vanished under wait()");
            parent.children.lock().retain(|&c| c != pid);
            let exit_code = zombie.exit_code.load(Ordering::Acquire);
            // The PCB (and its kernel stack) is freed only after every
            // active CPU has passed through a quiescent state, not
            // synchronously here.
            rcu::call_rcu(move || drop(zombie));
            return Ok((pid, exit_code));
        }

        chan::sleep_on_chan(parent, SleepClass::Interruptible, wait_chan_for(parent.pid));
    }
}

/// Spawn a purely kernel-side process running `entry` to completion,
/// used for both the per-CPU idle loops and test scenarios.
pub fn kernel_proc_create(name: &str, priority: Priority, entry: extern "C" fn() -> !) -> Arc<Process> {
    let class = if priority.major == Priority::IDLE_MAJOR { class::idle() } else { class::fifo() };
    let p = super::process::create_kernel_process(name, priority, class.clone(), ProcessFlags::empty());

    {
        let mut kstack = p.kstack.lock();
        let sp = context_switch::init_kernel_stack(&mut kstack, entry);
        p.kstack_sp.store(sp, Ordering::Release);
    }

    if priority.major == Priority::IDLE_MAJOR {
        class::idle_concrete().register(*p.se.cpu.lock(), p.pid);
    } else {
        let prio = p.se.priority();
        let cpu = *p.se.cpu.lock();
        class.enqueue(p.pid, cpu, QueueSlot { major: prio.major, minor: prio.minor });
        p.se.on_rq.store(true, Ordering::Release);
    }

    p
}
