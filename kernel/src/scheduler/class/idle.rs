use super::{QueueSlot, SchedClass};
use crate::scheduler::process::Pid;
use crate::scheduler::types::{CpuId, Priority};
use spin::Mutex;

/// One idle process per CPU, picked only when the FIFO class has nothing
/// runnable. Never enqueued/dequeued through a run queue: it is always
/// "ready", so `pick_next` just hands back whichever idle pid was
/// registered for that CPU.
pub struct IdleClass {
    idle_pids: Mutex<[Option<Pid>; crate::scheduler::types::NR_CPUS]>,
}

impl IdleClass {
    pub fn new() -> Self {
        IdleClass {
            idle_pids: Mutex::new([None; crate::scheduler::types::NR_CPUS]),
        }
    }

    pub fn register(&self, cpu: CpuId, pid: Pid) {
        self.idle_pids.lock()[cpu.as_usize()] = Some(pid);
    }
}

impl SchedClass for IdleClass {
    fn name(&self) -> &'static str {
        "idle"
    }

    fn enqueue(&self, _pid: Pid, _cpu: CpuId, _slot: QueueSlot) {}
    fn dequeue(&self, _pid: Pid, _cpu: CpuId, _slot: QueueSlot) {}

    fn pick_next(&self, cpu: CpuId) -> Option<Pid> {
        self.idle_pids.lock()[cpu.as_usize()]
    }

    fn set_next(&self, _pid: Pid, _cpu: CpuId, _slot: QueueSlot) {}
    fn put_prev(&self, _pid: Pid, _cpu: CpuId, _slot: QueueSlot) {}

    fn select_task_rq(&self, _priority: Priority, _affinity: u8) -> CpuId {
        CpuId::BSP
    }

    fn task_tick(&self, _pid: Pid, _cpu: CpuId) -> bool {
        false
    }
}
