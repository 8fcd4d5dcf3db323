/*
 * RCU-Style Deferred Free
 *
 * Freeing a PCB's kernel stack is dangerous while that same stack might
 * still be the one the CPU is executing on (a process frees itself via
 * `exit()` -> `lifecycle::exit` -> eventual reap in `wait()`, but the
 * *reaper* runs on a different stack, so the risk is really about a
 * racing reader: another CPU walking `PROCESSES` while a pid is being
 * torn down). Each CPU tracks a nesting counter; a grace period is
 * "every CPU has been observed at nesting depth 0 at least once since
 * the free was queued." With only the BSP ever active this degenerates
 * to "the BSP passed through a quiescent state once", but the API is
 * written for the general SMP case.
 *
 * Open Question 2's resolution: the free callback captures (by value)
 * whatever fields of the `Process` it needs *before* being queued, since
 * the `Process` (and the `Box<[u8]>` kernel stack inside it) may already
 * be the last `Arc` reference by the time the grace period ends and nothing
 * else still needs the live struct. In practice this kernel's `Process`
 * is already reference-counted via `Arc`, so the deferred callback just
 * holds the last `Arc<Process>` clone and drops it — no separate
 * snapshot struct is needed, but the discipline is: never read out of a
 * `Process` from inside a queued callback in a way that assumes it was
 * still linked into `PROCESSES`.
 */

use alloc::boxed::Box;
use alloc::collections::VecDeque;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicUsize, Ordering};
use spin::Mutex;

use super::types::NR_CPUS;

static NESTING: [AtomicUsize; NR_CPUS] = [
    AtomicUsize::new(0), AtomicUsize::new(0), AtomicUsize::new(0), AtomicUsize::new(0),
];

/// Enter an RCU read-side critical section on `cpu` (nestable).
pub fn read_lock(cpu: usize) {
    NESTING[cpu].fetch_add(1, Ordering::AcqRel);
}

pub fn read_unlock(cpu: usize) {
    NESTING[cpu].fetch_sub(1, Ordering::AcqRel);
}

fn cpu_quiescent(cpu: usize) -> bool {
    NESTING[cpu].load(Ordering::Acquire) == 0
}

type Callback = Box<dyn FnOnce() + Send>;

struct Pending {
    cb: Callback,
    /// CPUs that still need to pass through a quiescent state before
    /// this callback is allowed to run.
    awaiting: Vec<usize>,
}

static QUEUE: Mutex<VecDeque<Pending>> = Mutex::new(VecDeque::new());

/// Queue `cb` to run once every active CPU has passed through a
/// quiescent state. `cb` must not touch anything that assumes the
/// to-be-freed object is still reachable through a shared table.
pub fn call_rcu(cb: impl FnOnce() + Send + 'static) {
    let awaiting = (0..NR_CPUS).filter(|&cpu| super::rq::is_cpu_active(super::types::CpuId(cpu as u8))).collect();
    QUEUE.lock().push_back(Pending { cb: Box::new(cb), awaiting });
}

/// Called by the idle loop (or any quiescent point) on `cpu`: marks this
/// CPU as having passed through a grace period for every pending
/// callback, and runs any callback whose `awaiting` list is now empty.
pub fn quiescent_state(cpu: usize) {
    if !cpu_quiescent(cpu) {
        return;
    }
    let mut ready = Vec::new();
    {
        let mut queue = QUEUE.lock();
        let mut i = 0;
        while i < queue.len() {
            queue[i].awaiting.retain(|&c| c != cpu);
            if queue[i].awaiting.is_empty() {
                ready.push(queue.remove(i).unwrap());
            } else {
                i += 1;
            }
        }
    }
    for pending in ready {
        (pending.cb)();
    }
}
