/*
 * Atomic Primitives and Memory Barriers
 *
 * Small CAS-loop helpers built directly on core::sync::atomic, used by the
 * run-queue and context-switch code to avoid re-deriving the same
 * fetch_update pattern at every call site. Nothing here is specific to the
 * scheduler; it's the vocabulary the rest of the module is written in.
 */

use core::sync::atomic::{AtomicU32, AtomicU8, Ordering};

/// Full memory barrier. Used at the handful of places in the wake/sleep
/// protocol where an `Ordering::SeqCst` load/store pair isn't expressive
/// enough on its own (see context_switch::context_switch_finish).
#[inline]
pub fn barrier() {
    core::sync::atomic::fence(Ordering::SeqCst);
}

/// Hint to the CPU that this is a busy-wait spin, not useful work.
#[inline]
pub fn relax() {
    core::hint::spin_loop();
}

/// Atomically increment `counter` unless it is already zero.
///
/// Returns the previous value on success. Used for refcounts that must
/// never resurrect from zero (sigacts, address-space sharing).
pub fn inc_if_not_zero(counter: &AtomicU32) -> Option<u32> {
    counter
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| {
            if v == 0 { None } else { Some(v + 1) }
        })
        .ok()
}

/// Atomically increment `counter` as long as the result stays `<= max`.
pub fn inc_in_range(counter: &AtomicU32, max: u32) -> Option<u32> {
    counter
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| {
            if v >= max { None } else { Some(v + 1) }
        })
        .ok()
}

/// Atomically decrement `counter` unless it is already zero, returning the
/// new value. A decrement to zero is reported as `Some(0)` so the caller
/// can detect the "last reference" transition without a second load.
pub fn dec_unless_zero(counter: &AtomicU32) -> Option<u32> {
    counter
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| {
            if v == 0 { None } else { Some(v - 1) }
        })
        .ok()
        .map(|old| old - 1)
}

/// CAS loop that sets `flag` to `true` only if it currently reads `false`.
/// Returns whether the caller won the race.
pub fn try_set(flag: &core::sync::atomic::AtomicBool) -> bool {
    flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_ok()
}

/// CAS loop over an 8-bit state word: only transition `from -> to`.
/// Returns `Ok(())` on success, `Err(actual)` with the observed value
/// otherwise.
pub fn cas_u8(word: &AtomicU8, from: u8, to: u8) -> Result<(), u8> {
    word.compare_exchange(from, to, Ordering::AcqRel, Ordering::Acquire)
        .map(|_| ())
}
