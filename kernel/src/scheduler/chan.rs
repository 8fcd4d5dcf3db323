/*
 * Wait Channels
 *
 * Generic `sleep_on_chan`/`wakeup_on_chan`, the successor to the
 * deleted `io_wait.rs` IoChannel/WaitQueue pair. A channel is just a
 * `usize` (conventionally the address of whatever the caller is really
 * waiting on — a buffer, a pipe slot, a child pid); this module doesn't
 * know or care what it means, it only tracks which pids are parked on
 * which channel numbers.
 *
 * Matches the sleep-queue-lock-first ordering from context_switch.rs's
 * lock hierarchy: the `Mutex<BTreeMap<..>>` below is acquired, the
 * waiter's state is flipped to Blocked while still holding it, and only
 * then is it dropped before the actual switch-away.
 */

use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use spin::Mutex;

use super::context_switch;
use super::process::{Pid, Process, ProcessState, PROCESSES};
use super::types::{BlockReason, SleepClass};

struct WaitQueues {
    parked: Mutex<BTreeMap<usize, Vec<Pid>>>,
}

static QUEUES: WaitQueues = WaitQueues { parked: Mutex::new(BTreeMap::new()) };

/// Park the current process on `chan` and switch away. The caller holds
/// no locks of its own across this call; any invariant it needs held
/// must be re-checked after `sleep_on_chan` returns, since the process
/// may have been woken for a reason unrelated to what it was waiting for
/// (spurious wakeups are allowed, matching the teacher's old IoChannel
/// contract).
pub fn sleep_on_chan(current: &Process, class: SleepClass, chan: usize) {
    {
        let mut parked = QUEUES.parked.lock();
        parked.entry(chan).or_default().push(current.pid);
        *current.wait_chan.lock() = Some(chan);
    }
    context_switch::sleep(current, class, BlockReason::WaitingOnChan { chan });
}

/// Wake every process parked on `chan`. Returns how many were actually
/// transitioned (a process removed from the parked list by a concurrent
/// signal-driven wake is simply skipped, not double-counted).
pub fn wakeup_on_chan(chan: usize) -> usize {
    let pids: Vec<Pid> = {
        let mut parked = QUEUES.parked.lock();
        parked.remove(&chan).unwrap_or_default()
    };
    let mut woken = 0;
    for pid in pids {
        if let Some(p) = PROCESSES.get(pid) {
            *p.wait_chan.lock() = None;
            if matches!(p.state(), ProcessState::Blocked(_, BlockReason::WaitingOnChan { chan: c }) if c == chan) {
                if context_switch::try_to_wake_up(pid) {
                    woken += 1;
                }
            }
        }
    }
    woken
}

/// Remove `pid` from whatever channel it's parked on, if any, without
/// waking it. Used when a process is killed out from under a sleep.
pub fn remove_from_chan(pid: Pid) {
    let chan = PROCESSES.get(pid).and_then(|p| p.wait_chan.lock().take());
    if let Some(chan) = chan {
        let mut parked = QUEUES.parked.lock();
        if let Some(v) = parked.get_mut(&chan) {
            v.retain(|&p| p != pid);
        }
    }
}
