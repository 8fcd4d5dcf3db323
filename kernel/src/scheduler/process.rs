/*
 * Process Control Block
 *
 * A `Process` IS the schedulable unit: it owns exactly one `SchedEntity`
 * inline rather than pointing at a separate thread. Thread-group-shared
 * signal state (the POSIX notion of several threads sharing one pending
 * set) is modeled with an optional `SharedPending`/shared `SigActions`
 * instead of a second type — see DESIGN.md's Open Questions.
 */

use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use core::sync::atomic::{AtomicI32, AtomicU64, AtomicUsize, Ordering};
use spin::{Mutex, RwLock};

use crate::io::fd::FileDescriptorTable;
use crate::memory::address_space::AddressSpace;
use crate::signal::frame::SignalFrame;
use crate::signal::{PendingSet, SigActions, SharedPending};

use super::class::SchedClass;
use super::entity::SchedEntity;
use super::types::{BlockReason, CpuId, Priority, SleepClass, ALL_CPUS_MASK};

pub type Pid = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Runnable,
    Running,
    Blocked(SleepClass, BlockReason),
    Stopped,
    Zombie,
}

bitflags::bitflags! {
    pub struct ProcessFlags: u32 {
        const KERNEL   = 1 << 0;
        const IDLE     = 1 << 1;
        const SIG_TRACED = 1 << 2;
    }
}

/// Fixed-size kernel stack, owned by the PCB for its whole lifetime. The
/// stack carries the saved `InterruptContext` while the process is not
/// running; `context_switch.rs` reads/writes through `kstack_top`.
pub const KSTACK_SIZE: usize = 16 * 1024;

pub struct Process {
    pub pid: Pid,
    /// Mutable (not fixed at fork time): `exit()` reparents a dying
    /// process's children to the init process, which flips their
    /// `parent` rather than leaving it stale.
    pub parent: Mutex<Option<Pid>>,
    pub children: Mutex<alloc::vec::Vec<Pid>>,

    pub state: Mutex<ProcessState>,
    pub flags: ProcessFlags,
    pub name: alloc::string::String,

    pub se: SchedEntity,

    pub kstack: Mutex<alloc::boxed::Box<[u8]>>,
    /// Saved stack pointer into `kstack` where the last `InterruptContext`
    /// lives. `None` means the process has never been switched out (its
    /// entry trampoline is still to run).
    pub kstack_sp: AtomicUsize,

    pub vm: Arc<Mutex<AddressSpace>>,
    pub fd_table: Arc<Mutex<FileDescriptorTable>>,

    pub sigacts: Arc<SigActions>,
    pub pending: SharedPending,
    pub blocked_signals: AtomicU64,
    /// The frame a dispatched handler needs to resume into once it
    /// returns; `None` whenever no handler is currently active.
    pub signal_frame: Mutex<Option<SignalFrame>>,

    pub exit_code: AtomicI32,

    /// Channel this process is parked on while `Blocked(WaitingOnChan)`;
    /// read by `chan.rs`'s wakeup_on_chan to find matching sleepers.
    pub wait_chan: Mutex<Option<usize>>,
}

impl Process {
    pub fn state(&self) -> ProcessState {
        *self.state.lock()
    }

    pub fn set_state(&self, s: ProcessState) {
        *self.state.lock() = s;
    }

    pub fn is_kernel(&self) -> bool {
        self.flags.contains(ProcessFlags::KERNEL)
    }
}

struct ProcessBuilder {
    pid: Pid,
    parent: Option<Pid>,
    name: alloc::string::String,
    flags: ProcessFlags,
    priority: Priority,
    class: Arc<dyn SchedClass>,
    cpu: CpuId,
    vm: AddressSpace,
    fd_table: FileDescriptorTable,
    sigacts: Arc<SigActions>,
    pending: SharedPending,
    affinity: u8,
}

fn build(b: ProcessBuilder) -> Arc<Process> {
    let kstack = alloc::vec![0u8; KSTACK_SIZE].into_boxed_slice();
    Arc::new(Process {
        pid: b.pid,
        parent: Mutex::new(b.parent),
        children: Mutex::new(alloc::vec::Vec::new()),
        state: Mutex::new(ProcessState::Runnable),
        flags: b.flags,
        name: b.name,
        se: SchedEntity::new(b.class, b.priority, b.cpu, b.affinity),
        kstack: Mutex::new(kstack),
        kstack_sp: AtomicUsize::new(0),
        vm: Arc::new(Mutex::new(b.vm)),
        fd_table: Arc::new(Mutex::new(b.fd_table)),
        sigacts: b.sigacts,
        pending: b.pending,
        blocked_signals: AtomicU64::new(0),
        signal_frame: Mutex::new(None),
        exit_code: AtomicI32::new(0),
        wait_chan: Mutex::new(None),
    })
}

static NEXT_PID: AtomicUsize = AtomicUsize::new(1);

fn alloc_pid() -> Pid {
    NEXT_PID.fetch_add(1, Ordering::Relaxed)
}

/// Public alias used by `lifecycle::fork`; kept distinct from
/// `alloc_pid` so pid allocation stays internal to this module except
/// for the one external caller that needs it before building a
/// `Process` by hand.
pub fn alloc_pid_for_fork() -> Pid {
    alloc_pid()
}

/// Global process table. A `RwLock<BTreeMap<..>>` rather than the
/// teacher's dedicated manager type: lookups are the hot path
/// (`wakeup_on_chan` scans it), inserts/removes are rare (fork/exit).
pub struct ProcessTable {
    procs: RwLock<BTreeMap<Pid, Arc<Process>>>,
}

impl ProcessTable {
    const fn new() -> Self {
        ProcessTable { procs: RwLock::new(BTreeMap::new()) }
    }

    pub fn insert(&self, p: Arc<Process>) {
        self.procs.write().insert(p.pid, p);
    }

    pub fn get(&self, pid: Pid) -> Option<Arc<Process>> {
        self.procs.read().get(&pid).cloned()
    }

    pub fn remove(&self, pid: Pid) -> Option<Arc<Process>> {
        self.procs.write().remove(&pid)
    }

    pub fn for_each<F: FnMut(&Arc<Process>)>(&self, mut f: F) {
        for p in self.procs.read().values() {
            f(p);
        }
    }

    pub fn len(&self) -> usize {
        self.procs.read().len()
    }
}

pub static PROCESSES: ProcessTable = ProcessTable::new();

/// Create a kernel-only process (no user address space): used for the
/// per-CPU idle loops and for kernel-thread test scenarios.
pub fn create_kernel_process(
    name: &str,
    priority: Priority,
    class: Arc<dyn SchedClass>,
    flags: ProcessFlags,
) -> Arc<Process> {
    let pid = alloc_pid();
    let affinity = ALL_CPUS_MASK;
    let cpu = class.select_task_rq(priority, affinity);
    let p = build(ProcessBuilder {
        pid,
        parent: None,
        name: alloc::string::String::from(name),
        flags: flags | ProcessFlags::KERNEL,
        priority,
        class,
        cpu,
        vm: AddressSpace::new_kernel(),
        fd_table: FileDescriptorTable::new(),
        sigacts: Arc::new(SigActions::new()),
        pending: Arc::new(PendingSet::new()),
        affinity,
    });
    PROCESSES.insert(p.clone());
    p
}
