/*
 * Scheduling Entity (SE)
 *
 * The part of a PCB the run-queue mechanism touches directly: the
 * on_rq/on_cpu flags that make the wake protocol SMP-safe, the class
 * pointer, and the priority. Every `Process` owns exactly one `SchedEntity`
 * inline; there is no separate thread type sharing one.
 *
 * Invariants (checked by the context-switch protocol in context_switch.rs):
 *   - `on_rq` is true iff the entity is linked into some CPU's run queue.
 *   - `on_cpu` is true iff the entity is the one currently executing on
 *     some CPU's `RunQueue::current`.
 *   - A wake-up (`try_to_wake_up`) must observe `on_rq == false` before it
 *     is allowed to set it back to true; this is what `pi_lock` protects.
 */

use alloc::sync::Arc;
use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use spin::Mutex;

use super::class::SchedClass;
use super::types::{CpuId, Priority};

pub struct SchedEntity {
    pub on_rq: AtomicBool,
    pub on_cpu: AtomicBool,
    pub cpu: Mutex<CpuId>,
    pub class: Mutex<Arc<dyn SchedClass>>,
    priority_major: AtomicU8,
    priority_minor: AtomicU8,
    /// CPU affinity bitmask (bit i = CPU i). `select_task_rq` never
    /// places this entity on a CPU outside this mask.
    affinity: AtomicU8,
    /// Protects wake-vs-schedule races; acquired by `try_to_wake_up` and
    /// by `context_switch_finish`'s race-fix path. Never nested under the
    /// run-queue spinlock (see the lock hierarchy note in
    /// context_switch.rs).
    pub pi_lock: Mutex<()>,
}

impl SchedEntity {
    pub fn new(class: Arc<dyn SchedClass>, priority: Priority, cpu: CpuId, affinity: u8) -> Self {
        SchedEntity {
            on_rq: AtomicBool::new(false),
            on_cpu: AtomicBool::new(false),
            cpu: Mutex::new(cpu),
            class: Mutex::new(class),
            priority_major: AtomicU8::new(priority.major),
            priority_minor: AtomicU8::new(priority.minor),
            affinity: AtomicU8::new(affinity),
            pi_lock: Mutex::new(()),
        }
    }

    pub fn priority(&self) -> Priority {
        Priority {
            major: self.priority_major.load(Ordering::Acquire),
            minor: self.priority_minor.load(Ordering::Acquire),
        }
    }

    pub fn set_priority(&self, p: Priority) {
        self.priority_major.store(p.major, Ordering::Release);
        self.priority_minor.store(p.minor, Ordering::Release);
    }

    pub fn is_on_rq(&self) -> bool {
        self.on_rq.load(Ordering::Acquire)
    }

    pub fn is_on_cpu(&self) -> bool {
        self.on_cpu.load(Ordering::Acquire)
    }

    pub fn affinity(&self) -> u8 {
        self.affinity.load(Ordering::Acquire)
    }

    pub fn set_affinity(&self, mask: u8) {
        self.affinity.store(mask, Ordering::Release);
    }
}
