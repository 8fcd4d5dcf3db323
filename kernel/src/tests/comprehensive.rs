/*
 * Comprehensive Test Suite
 *
 * Unified test runner that drives every test in `tests::mod` in
 * sequence and logs a pass/fail summary. The data-structure tests run
 * first since they need neither the scheduler enabled nor interrupts
 * on; the lifecycle tests spawn real kernel threads and must run last,
 * after `kstart` has called `SchedulerManager::enable()`.
 */

use crate::tests;

/// Tally of how many of the self-contained (non-spawning) checks ran.
/// The spawning tests below log their own pass/fail and aren't counted
/// here since they finish asynchronously, off the caller's stack.
#[derive(Debug, Clone, Copy, Default)]
pub struct TestResults {
    pub data_structure_checks: usize,
}

/// Run every test registered in `tests::mod`.
///
/// Call this once from `kstart`, after `SchedulerManager::enable()`,
/// with interrupts on: the lifecycle tests below yield and sleep
/// through a real `int 0x81` and won't make progress otherwise.
pub fn run_comprehensive_test_suite() -> TestResults {
    let mut results = TestResults::default();

    log::info!("=== Comprehensive Test Suite ===");

    log::info!("--- Run Queue ---");
    tests::test_runqueue_priority_ordering();
    tests::test_runqueue_dequeue_clears_mask();
    results.data_structure_checks += 2;

    log::info!("--- Signals ---");
    tests::test_pending_set_priority_and_masking();
    tests::test_sigactions_duplicate_and_exec_reset();
    tests::test_signal_frame_round_trip();
    results.data_structure_checks += 3;

    log::info!("--- RCU ---");
    tests::test_rcu_quiescent_callback();
    results.data_structure_checks += 1;

    log::info!("--- Lifecycle (spawns kernel threads) ---");
    tests::spawn_fork_wait_test();
    tests::spawn_sigterm_test();
    tests::spawn_sigstop_sigcont_test();
    tests::spawn_double_wake_test();

    log::info!(
        "=== {} data-structure checks ran synchronously; lifecycle tests report asynchronously as their threads run ===",
        results.data_structure_checks
    );

    results
}
