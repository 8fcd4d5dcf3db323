/*
 * Signal Delivery Frame
 *
 * What gets pushed onto a process's kernel stack to divert it into a
 * handler and back. Built on top of `scheduler::context_switch`'s
 * `InterruptContext`/`InterruptFrame`: a signal frame is just a saved
 * copy of the interrupted context plus the blocked-signal mask that was
 * in effect, so `sigreturn` can restore both exactly.
 */

use core::sync::atomic::{AtomicU64, Ordering};

use crate::scheduler::context_switch::InterruptContext;

#[derive(Debug, Clone, Copy)]
pub struct SignalFrame {
    pub saved_ctx: InterruptContext,
    pub saved_blocked: u64,
    pub signum: u32,
}

/// Build the frame a handler invocation needs: a snapshot of the
/// interrupted register state plus whatever mask was blocked at the
/// time, so returning from the handler can restore both.
pub fn build(interrupted: &InterruptContext, blocked_before: u64, signum: u32) -> SignalFrame {
    SignalFrame { saved_ctx: *interrupted, saved_blocked: blocked_before, signum }
}

/// Redirect `ctx` to start executing `handler_addr` with the current
/// stack, leaving the rest of the register file untouched (this kernel
/// has no user-mode ABI to marshal signum/siginfo into argument
/// registers per a real sigaction(2) contract — exact POSIX signal
/// semantics are out of scope).
pub fn divert_to_handler(ctx: &mut InterruptContext, handler_addr: u64) {
    ctx.iret_frame.rip = handler_addr;
}

/// Restore the interrupted context and blocked-signal mask from a
/// previously built frame. Called by the `sigreturn` path once a handler
/// finishes; restoring `saved_blocked` is what undoes the mask
/// `dispatch` installed before diverting into the handler.
pub fn restore(frame: &SignalFrame, ctx: &mut InterruptContext, blocked_signals: &AtomicU64) {
    *ctx = frame.saved_ctx;
    blocked_signals.store(frame.saved_blocked, Ordering::Release);
}
