/*
 * Signal Delivery Loop
 *
 * Consulted by `scheduler::context_switch` on the return-to-user path
 * (and, for kernel-thread test scenarios, anywhere a process checks its
 * own pending set directly). Ordering, highest priority first:
 *
 *   1. sigterm-mask (SIGKILL/SIGTERM/SIGSEGV/SIGILL): unconditionally
 *      fatal, ignores the handler table.
 *   2. SIGCONT: clears a Stopped state and resumes.
 *   3. sigstop-mask (SIGSTOP/SIGTSTP): transitions to Stopped, no
 *      handler runs.
 *   4. Lowest-numbered pending-and-unmasked signal with a registered
 *      handler or default action.
 */

use alloc::sync::Arc;
use core::sync::atomic::Ordering;

use crate::scheduler::context_switch::{self, InterruptContext};
use crate::scheduler::manager::SchedulerManager;
use crate::scheduler::process::{Process, ProcessState};

use super::sigacts::SigDisposition;
use super::{signum, sigcont_mask, sigstop_mask, sigterm_mask, KSigInfo};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Nothing pending, or everything pending is masked.
    NoSignal,
    /// Process was terminated (sigterm-mask signal with default/fatal
    /// action). Caller should not resume it.
    Terminated(u32),
    /// Process was stopped (sigstop-mask signal).
    Stopped(u32),
    /// Process was resumed from Stopped by SIGCONT.
    Continued,
    /// A handler was dispatched; `frame` has the context to resume into
    /// once the handler returns.
    HandlerDispatched(u32, usize),
    /// Default action for a caught-but-unhandled signal was "ignore".
    Ignored(u32),
}

/// Run one pass of the delivery loop for `current`. Does not loop to
/// drain every pending signal in one call: callers invoke this once per
/// return-to-user point, matching how the scheduler already revisits the
/// process on its next quantum.
pub fn deliver_pending(current: &Arc<Process>, ctx: &mut InterruptContext) -> DeliveryOutcome {
    let blocked = current.blocked_signals.load(Ordering::Acquire);
    let mask = current.pending.mask();

    let term_pending = mask & sigterm_mask() & !blocked;
    if term_pending != 0 {
        let signum = term_pending.trailing_zeros() + 1;
        let _ = current.pending.take_next(!sigterm_mask());
        SchedulerManager::exit(current, 128 + signum as i32);
    }

    let cont_pending = mask & sigcont_mask() & !blocked;
    if cont_pending != 0 {
        current.pending.take_next(!sigcont_mask());
        if current.state() == ProcessState::Stopped {
            current.set_state(ProcessState::Runnable);
        }
        return DeliveryOutcome::Continued;
    }

    let stop_pending = mask & sigstop_mask() & !blocked;
    if stop_pending != 0 {
        let signum = stop_pending.trailing_zeros() + 1;
        current.pending.take_next(!sigstop_mask());
        SchedulerManager::stop(current);
        return DeliveryOutcome::Stopped(signum);
    }

    match current.pending.take_next(blocked) {
        None => DeliveryOutcome::NoSignal,
        Some(KSigInfo { signum, .. }) => dispatch(current, signum, ctx),
    }
}

fn dispatch(current: &Arc<Process>, signum: u32, ctx: &mut InterruptContext) -> DeliveryOutcome {
    let action = current.sigacts.get(signum);
    match action.disposition {
        SigDisposition::Ignore => DeliveryOutcome::Ignored(signum),
        SigDisposition::Default => {
            if super::sigignore_default_mask() & (1u64 << (signum - 1)) != 0 {
                DeliveryOutcome::Ignored(signum)
            } else {
                SchedulerManager::exit(current, 128 + signum as i32);
            }
        }
        SigDisposition::Handler(addr) => {
            let blocked_before = current.blocked_signals.load(Ordering::Acquire);
            *current.signal_frame.lock() = Some(super::frame::build(ctx, blocked_before, signum));

            // No SA_NODEFER: the signal being delivered always blocks
            // itself for the duration of its own handler, on top of
            // whatever sa_mask adds.
            let to_block = blocked_before | (1u64 << (signum - 1)) | action.mask;
            current.blocked_signals.store(to_block, Ordering::Release);

            super::frame::divert_to_handler(ctx, addr as u64);
            DeliveryOutcome::HandlerDispatched(signum, addr)
        }
    }
}

/// Restore the context and blocked-signal mask a dispatched handler
/// interrupted, consuming the frame `dispatch` built. Returns false if
/// `current` has no frame to return from.
pub fn sigreturn(current: &Arc<Process>, ctx: &mut InterruptContext) -> bool {
    let Some(frame) = current.signal_frame.lock().take() else { return false };
    super::frame::restore(&frame, ctx, &current.blocked_signals);
    true
}

/// Queue `info` on `target`'s pending set and, if it can act on it
/// immediately, do so: a SIGCONT to a `Stopped` target runs the continue
/// protocol directly (a stopped process is parked off-CPU and can never
/// run its own delivery loop to notice SIGCONT), and anything else wakes
/// the target if it's blocked so the delivery loop gets a chance to run.
pub fn send_signal(target: &Arc<Process>, info: KSigInfo) {
    target.pending.push(info);
    if info.signum == signum::SIGCONT && target.state() == ProcessState::Stopped {
        context_switch::continue_process(target);
        return;
    }
    if matches!(target.state(), ProcessState::Blocked(_, _)) {
        SchedulerManager::wake(target.pid);
    }
}

/// Convenience wrapper for raising a signal from kernel code rather than
/// from another process: builds a minimal `KSigInfo` with no sender and
/// delegates to `send_signal`.
pub fn kill_proc(target: &Arc<Process>, signo: u32) {
    send_signal(target, KSigInfo { signum: signo, sender_pid: 0, value: 0 });
}
