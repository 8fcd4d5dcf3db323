use super::{QueueSlot, SchedClass};
use crate::scheduler::process::Pid;
use crate::scheduler::rq;
use crate::scheduler::types::{CpuId, Priority};

/// Priority-ordered, run-to-completion-or-blocked class. No timeslice:
/// a FIFO-class process keeps the CPU until it blocks, yields, exits, or
/// a higher (numerically lower) major becomes ready.
pub struct FifoClass;

impl FifoClass {
    pub fn new() -> Self {
        FifoClass
    }
}

impl SchedClass for FifoClass {
    fn name(&self) -> &'static str {
        "fifo"
    }

    fn enqueue(&self, pid: Pid, cpu: CpuId, slot: QueueSlot) {
        rq::table().with(cpu, |q| q.enqueue(pid, slot.major, slot.minor));
    }

    fn dequeue(&self, pid: Pid, cpu: CpuId, slot: QueueSlot) {
        rq::table().with(cpu, |q| {
            q.dequeue(pid, slot.major);
        });
    }

    fn pick_next(&self, cpu: CpuId) -> Option<Pid> {
        rq::table().with(cpu, |q| q.peek_highest())
    }

    fn set_next(&self, pid: Pid, cpu: CpuId, slot: QueueSlot) {
        rq::table().with(cpu, |q| {
            q.dequeue(pid, slot.major);
        });
    }

    fn put_prev(&self, pid: Pid, cpu: CpuId, slot: QueueSlot) {
        rq::table().with(cpu, |q| q.enqueue(pid, slot.major, slot.minor));
    }

    fn select_task_rq(&self, priority: Priority, affinity: u8) -> CpuId {
        rq::table().select_for_affinity(priority.major, affinity)
    }

    fn task_tick(&self, _pid: Pid, cpu: CpuId) -> bool {
        // A higher-priority FIFO process becoming ready already sets
        // need_resched via RunQueue::request_reschedule at wake time;
        // the tick handler only needs to surface it.
        rq::table().with(cpu, |q| q.take_reschedule())
    }
}
