/*
 * Test Suite for the Scheduler/Signal Core
 *
 * This module contains self-contained test functions validating the
 * run-queue bitmap, the signal pending set/disposition table, RCU
 * quiescent-state tracking, and the process lifecycle glue (fork/exit/
 * wait, wake, stop/continue). Most exercise the data structures directly
 * (no interrupts involved, safe to call from anywhere); a few spawn real
 * kernel threads through `SchedulerManager` and rely on the scheduler
 * actually being enabled, matching how `comprehensive::run_comprehensive_test_suite`
 * drives them.
 *
 * ## Public Test Functions
 *
 * - `test_runqueue_priority_ordering()` - lower major always wins, FIFO within a major
 * - `test_runqueue_dequeue_clears_mask()` - ReadyMask bit drops once a major empties
 * - `test_pending_set_priority_and_masking()` - lowest pending-unmasked signum wins
 * - `test_sigactions_duplicate_and_exec_reset()` - disposition table semantics
 * - `test_rcu_quiescent_callback()` - deferred callback fires after a quiescent state
 * - `spawn_fork_wait_test()` - fork a child, reap it via wait()
 * - `spawn_sigterm_test()` - SIGKILL/SIGTERM via the delivery loop terminates
 * - `spawn_sigstop_sigcont_test()` - SIGSTOP parks, SIGCONT resumes
 * - `spawn_double_wake_test()` - a second try_to_wake_up on an already-runnable pid is a no-op
 */

pub mod comprehensive;

use alloc::sync::Arc;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::scheduler::chan;
use crate::scheduler::context_switch::{self, InterruptContext};
use crate::scheduler::lifecycle::ForkFlags;
use crate::scheduler::manager::SchedulerManager;
use crate::scheduler::process::{Process, ProcessState};
use crate::scheduler::rcu;
use crate::scheduler::rq::{self, RunQueue};
use crate::scheduler::types::{CpuId, Priority, SleepClass};
use crate::signal::sigacts::{SigAction, SigActions, SigDisposition};
use crate::signal::{self, delivery, signum, KSigInfo};

/// ===============================
///  RUN QUEUE / READY MASK
/// ===============================

/// Lower major numbers must always come out first, and within the same
/// major FIFO order (enqueue order) is preserved.
pub fn test_runqueue_priority_ordering() {
    log::info!("[RunQueue Test] Priority ordering...");
    let mut rq = RunQueue::new(CpuId::BSP);

    rq.enqueue(100, 10, 0);
    rq.enqueue(200, 10, 0);
    rq.enqueue(300, 3, 0);

    match rq.pop_highest() {
        Some(300) => log::info!("[RunQueue Test] ✓ major 3 preempts major 10"),
        other => log::error!("[RunQueue Test] ✗ expected pid 300 first, got {:?}", other),
    }
    match rq.pop_highest() {
        Some(100) => log::info!("[RunQueue Test] ✓ FIFO order within major 10 (100 before 200)"),
        other => log::error!("[RunQueue Test] ✗ expected pid 100 next, got {:?}", other),
    }
    match rq.pop_highest() {
        Some(200) => log::info!("[RunQueue Test] ✓ major 10 drained in enqueue order"),
        other => log::error!("[RunQueue Test] ✗ expected pid 200 last, got {:?}", other),
    }
    if rq.pop_highest().is_none() {
        log::info!("[RunQueue Test] ✓ queue empty after draining");
    } else {
        log::error!("[RunQueue Test] ✗ queue should be empty");
    }
}

/// The two-layer ready bitmap must clear a major's `top` bit once its
/// last process is dequeued, so `highest_ready` skips it.
pub fn test_runqueue_dequeue_clears_mask() {
    log::info!("[RunQueue Test] Mask clears on empty major...");
    let mut rq = RunQueue::new(CpuId::BSP);
    rq.enqueue(1, 5, 0);
    rq.enqueue(2, 20, 0);

    if !rq.dequeue(1, 5) {
        log::error!("[RunQueue Test] ✗ dequeue(1, 5) should have removed it");
    }

    match rq.pop_highest() {
        Some(2) => log::info!("[RunQueue Test] ✓ major 5 no longer ready, major 20 picked"),
        other => log::error!("[RunQueue Test] ✗ expected pid 2, got {:?}", other),
    }
}

/// ===============================
///  SIGNAL PENDING SET / SIGACTIONS
/// ===============================

pub fn test_pending_set_priority_and_masking() {
    log::info!("[Signal Test] Pending set ordering and masking...");
    let pending = signal::PendingSet::new();
    pending.push(KSigInfo { signum: signum::SIGTERM, sender_pid: 1, value: 0 });
    pending.push(KSigInfo { signum: signum::SIGHUP, sender_pid: 1, value: 0 });

    // SIGHUP (1) is numerically lower than SIGTERM (15); with nothing
    // blocked it must come out first.
    match pending.take_next(0) {
        Some(info) if info.signum == signum::SIGHUP => {
            log::info!("[Signal Test] ✓ lowest-numbered pending signal wins");
        }
        other => log::error!("[Signal Test] ✗ expected SIGHUP first, got {:?}", other.map(|i| i.signum)),
    }

    // Block SIGTERM; it must no longer be deliverable even though it is
    // still pending.
    let blocked = 1u64 << (signum::SIGTERM - 1);
    if pending.take_next(blocked).is_none() {
        log::info!("[Signal Test] ✓ blocked signal is not delivered");
    } else {
        log::error!("[Signal Test] ✗ blocked SIGTERM should not have been returned");
    }

    if pending.take_next(0).is_some() {
        log::error!("[Signal Test] ✗ SIGTERM should only surface once unblocked");
    }
}

pub fn test_sigactions_duplicate_and_exec_reset() {
    log::info!("[Signal Test] SigActions duplicate / exec reset...");
    let acts = SigActions::new();
    acts.set(signum::SIGINT, SigAction { disposition: SigDisposition::Handler(0xdead_beef), mask: 0 });
    acts.set(signum::SIGCHLD, SigAction { disposition: SigDisposition::Ignore, mask: 0 });

    let dup = acts.duplicate();
    match dup.get(signum::SIGINT).disposition {
        SigDisposition::Handler(addr) if addr == 0xdead_beef => {
            log::info!("[Signal Test] ✓ duplicate() copies handler dispositions by value");
        }
        other => log::error!("[Signal Test] ✗ unexpected disposition after duplicate: {:?}", other),
    }

    dup.reset_for_exec();
    match dup.get(signum::SIGINT).disposition {
        SigDisposition::Default => log::info!("[Signal Test] ✓ caught handler reverts to Default on exec"),
        other => log::error!("[Signal Test] ✗ handler should reset to Default, got {:?}", other),
    }
    match dup.get(signum::SIGCHLD).disposition {
        SigDisposition::Ignore => log::info!("[Signal Test] ✓ Ignore survives exec reset"),
        other => log::error!("[Signal Test] ✗ Ignore should survive exec reset, got {:?}", other),
    }
}

/// ===============================
///  RCU
/// ===============================

pub fn test_rcu_quiescent_callback() {
    log::info!("[RCU Test] Deferred callback fires after quiescent state...");
    rq::mark_cpu_active(CpuId::BSP);

    let fired = Arc::new(AtomicBool::new(false));
    let fired_cb = fired.clone();
    rcu::call_rcu(move || fired_cb.store(true, Ordering::Release));

    if fired.load(Ordering::Acquire) {
        log::error!("[RCU Test] ✗ callback fired before any quiescent state was observed");
        return;
    }

    rcu::quiescent_state(CpuId::BSP.as_usize());

    if fired.load(Ordering::Acquire) {
        log::info!("[RCU Test] ✓ callback ran once the BSP passed through quiescent_state");
    } else {
        log::error!("[RCU Test] ✗ callback should have fired after quiescent_state");
    }
}

/// ===============================
///  LIFECYCLE / WAKE SCENARIOS
/// ===============================
///
/// These spawn real kernel processes through `SchedulerManager` and must
/// be invoked after the scheduler is enabled and interrupts are on (see
/// `comprehensive::run_comprehensive_test_suite`), since `yield_now`/
/// `sleep` switch away via a real `int 0x81`.

static FORK_TEST_CHILD_RAN: AtomicBool = AtomicBool::new(false);

extern "C" fn fork_test_child() -> ! {
    FORK_TEST_CHILD_RAN.store(true, Ordering::Release);
    SchedulerManager::exit(&current_or_panic(), 7);
}

fn current_or_panic() -> Arc<Process> {
    SchedulerManager::current(CpuId::BSP).expect("no current process on BSP")
}

extern "C" fn fork_wait_test_entry() -> ! {
    log::info!("[Fork/Wait Test] Parent starting...");
    let parent = current_or_panic();

    let child_pid = match SchedulerManager::fork(&parent, ForkFlags::default(), fork_test_child) {
        Ok(pid) => pid,
        Err(e) => {
            log::error!("[Fork/Wait Test] ✗ fork failed: {}", e);
            SchedulerManager::exit(&parent, 1);
        }
    };
    log::info!("[Fork/Wait Test] Forked child pid {}", child_pid);

    match SchedulerManager::wait(&parent) {
        Ok((pid, code)) if pid == child_pid && code == 7 => {
            log::info!("[Fork/Wait Test] ✓ reaped child {} with exit code {}", pid, code);
        }
        other => log::error!("[Fork/Wait Test] ✗ unexpected wait() result: {:?}", other),
    }

    SchedulerManager::exit(&parent, 0);
}

pub fn spawn_fork_wait_test() {
    log::info!("=== Starting Fork/Wait Test ===");
    SchedulerManager::spawn_kernel("fork-wait-parent", Priority::NORMAL, fork_wait_test_entry);
}

extern "C" fn sigterm_test_entry() -> ! {
    log::info!("[SIGTERM Test] Target process starting, sending itself SIGTERM...");
    let current = current_or_panic();
    delivery::send_signal(&current, KSigInfo { signum: signum::SIGTERM, sender_pid: current.pid, value: 0 });

    // deliver_pending never returns on a sigterm-mask signal: it calls
    // SchedulerManager::exit internally. Reaching the line after it
    // would itself be a test failure.
    let mut ctx = InterruptContext::default();
    delivery::deliver_pending(&current, &mut ctx);
    log::error!("[SIGTERM Test] ✗ process survived SIGTERM delivery");
    SchedulerManager::exit(&current, 1);
}

pub fn spawn_sigterm_test() {
    log::info!("=== Starting SIGTERM Delivery Test ===");
    SchedulerManager::spawn_kernel("sigterm-target", Priority::NORMAL, sigterm_test_entry);
}

extern "C" fn sigstop_sigcont_test_entry() -> ! {
    let current = current_or_panic();
    log::info!("[SIGSTOP/SIGCONT Test] pid {} parking on SIGSTOP...", current.pid);

    let mut ctx = InterruptContext::default();
    delivery::send_signal(&current, KSigInfo { signum: signum::SIGSTOP, sender_pid: current.pid, value: 0 });
    match delivery::deliver_pending(&current, &mut ctx) {
        delivery::DeliveryOutcome::Stopped(sig) if sig == signum::SIGSTOP => {
            log::info!("[SIGSTOP/SIGCONT Test] ✓ SIGSTOP transitioned process to Stopped");
        }
        other => log::error!("[SIGSTOP/SIGCONT Test] ✗ expected Stopped(SIGSTOP), got {:?}", other),
    }

    delivery::send_signal(&current, KSigInfo { signum: signum::SIGCONT, sender_pid: current.pid, value: 0 });
    match delivery::deliver_pending(&current, &mut ctx) {
        delivery::DeliveryOutcome::Continued => {
            if current.state() != ProcessState::Stopped {
                log::info!("[SIGSTOP/SIGCONT Test] ✓ SIGCONT cleared Stopped state");
            } else {
                log::error!("[SIGSTOP/SIGCONT Test] ✗ state still Stopped after SIGCONT");
            }
        }
        other => log::error!("[SIGSTOP/SIGCONT Test] ✗ expected Continued, got {:?}", other),
    }

    SchedulerManager::exit(&current, 0);
}

pub fn spawn_sigstop_sigcont_test() {
    log::info!("=== Starting SIGSTOP/SIGCONT Test ===");
    SchedulerManager::spawn_kernel("sigstop-sigcont", Priority::NORMAL, sigstop_sigcont_test_entry);
}

static DOUBLE_WAKE_SLEEPER_PID: AtomicUsize = AtomicUsize::new(0);

extern "C" fn double_wake_sleeper_entry() -> ! {
    let current = current_or_panic();
    DOUBLE_WAKE_SLEEPER_PID.store(current.pid, Ordering::Release);
    log::info!("[Double Wake Test] Sleeper pid {} parking on a channel...", current.pid);
    chan::sleep_on_chan(&current, SleepClass::Interruptible, 0xC0FFEE);
    log::info!("[Double Wake Test] Sleeper woke up, exiting");
    SchedulerManager::exit(&current, 0);
}

extern "C" fn double_wake_waker_entry() -> ! {
    let current = current_or_panic();

    // Give the sleeper a chance to actually park before waking it.
    for _ in 0..1000 {
        context_switch::yield_now();
        if DOUBLE_WAKE_SLEEPER_PID.load(Ordering::Acquire) != 0 {
            break;
        }
    }

    let pid = DOUBLE_WAKE_SLEEPER_PID.load(Ordering::Acquire);
    let first = context_switch::try_to_wake_up(pid);
    let second = context_switch::try_to_wake_up(pid);

    match (first, second) {
        (true, false) => log::info!("[Double Wake Test] ✓ second wake-up on an already-runnable pid is a no-op"),
        other => log::error!("[Double Wake Test] ✗ expected (true, false), got {:?}", other),
    }

    SchedulerManager::exit(&current, 0);
}

pub fn spawn_double_wake_test() {
    log::info!("=== Starting Double Wake-Up Test ===");
    DOUBLE_WAKE_SLEEPER_PID.store(0, Ordering::Release);
    SchedulerManager::spawn_kernel("double-wake-sleeper", Priority::NORMAL, double_wake_sleeper_entry);
    SchedulerManager::spawn_kernel("double-wake-waker", Priority::NORMAL, double_wake_waker_entry);
}

/// ===============================
///  SIGNAL FRAME ROUND-TRIP
/// ===============================

pub fn test_signal_frame_round_trip() {
    log::info!("[Signal Frame Test] build / divert / restore round-trip...");
    let mut ctx = InterruptContext::default();
    ctx.iret_frame.rip = 0x1000;
    ctx.rax = 42;

    let frame = signal::frame::build(&ctx, 0, signum::SIGHUP);
    signal::frame::divert_to_handler(&mut ctx, 0x2000);

    if ctx.iret_frame.rip != 0x2000 {
        log::error!("[Signal Frame Test] ✗ divert_to_handler did not redirect rip");
        return;
    }

    let blocked = core::sync::atomic::AtomicU64::new(0xFF);
    signal::frame::restore(&frame, &mut ctx, &blocked);
    if ctx.iret_frame.rip == 0x1000 && ctx.rax == 42 {
        log::info!("[Signal Frame Test] ✓ restore() recovers the interrupted context exactly");
    } else {
        log::error!("[Signal Frame Test] ✗ restore() did not recover the original context");
    }
    if blocked.load(Ordering::Acquire) == 0 {
        log::info!("[Signal Frame Test] ✓ restore() writes back the saved blocked-signal mask");
    } else {
        log::error!("[Signal Frame Test] ✗ restore() did not restore the blocked-signal mask");
    }
}
