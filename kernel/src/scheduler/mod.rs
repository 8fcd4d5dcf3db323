/*
 * Scheduler Core
 *
 * SMP-shaped (only the BSP is ever actually brought up) preemptive
 * scheduler: per-CPU run queues (`rq`) driven by pluggable scheduling
 * classes (`class`), a scheduling entity embedded in every PCB
 * (`entity`, `process`), the sleep/wake/context-switch protocol
 * (`context_switch`, `chan`), process lifecycle (`lifecycle`), RCU-style
 * deferred free (`rcu`), and the public facade (`manager`).
 */

pub mod atomic;
pub mod chan;
pub mod class;
pub mod context_switch;
pub mod entity;
pub mod lifecycle;
pub mod manager;
pub mod process;
pub mod rcu;
pub mod rq;
pub mod types;

pub use context_switch::{preemptive_timer_interrupt_handler, yield_interrupt_handler};
pub use manager::SchedulerManager;
pub use process::{Pid, Process, ProcessState};
pub use types::{CpuId, Priority, NR_CPUS};

/// Boot-time setup: bring up CPU 0's run queue and idle process. Must
/// run after `memory::init` (the idle process needs a kernel address
/// space and a heap-backed kernel stack) and before `SchedulerManager::enable()`.
pub fn init() {
    log::info!("scheduler: initializing run queues and idle process");
    SchedulerManager::init();
    log::info!("scheduler: {} processes registered", process::PROCESSES.len());
}
