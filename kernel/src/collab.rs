/*
 * Collaborator Contracts
 *
 * Thin trait seams standing in for subsystems this kernel treats as out
 * of scope for the scheduler/signal core: physical page allocation, the
 * virtual-memory layer, the filesystem/FD surface, the boot-time timer,
 * inter-processor interrupts, and the saved register frame a trap
 * handler hands to the scheduler. Each trait is backed by a real,
 * already-implemented subsystem in this tree (named on each impl) so the
 * scheduler core never has to special-case "collaborator not present".
 */

use core::fmt;

use crate::memory::address_space::AddressSpace;
use crate::memory::phys;
use crate::memory::PhysFrame;
use crate::scheduler::context_switch::InterruptContext;
use crate::scheduler::types::CpuId;
use crate::utils::system::timer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    OutOfMemory,
    InvalidArgument,
    NoSuchProcess,
    Interrupted,
    PermissionDenied,
    Busy,
    AlreadyRegistered,
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            KernelError::OutOfMemory => "out of memory",
            KernelError::InvalidArgument => "invalid argument",
            KernelError::NoSuchProcess => "no such process",
            KernelError::Interrupted => "interrupted",
            KernelError::PermissionDenied => "permission denied",
            KernelError::Busy => "resource busy",
            KernelError::AlreadyRegistered => "already registered",
        };
        f.write_str(s)
    }
}

/// Physical frame allocation. Backed by `memory::phys`'s bitmap
/// allocator; out of scope for this crate is anything past
/// frame-granularity bookkeeping (no buddy allocator, no slab cache).
pub trait PageAllocator: Send + Sync {
    fn alloc_frame(&self) -> Option<PhysFrame>;
    fn free_frame(&self, frame: PhysFrame);
}

pub struct PhysPageAllocator;

impl PageAllocator for PhysPageAllocator {
    fn alloc_frame(&self) -> Option<PhysFrame> {
        phys::alloc_frame()
    }

    fn free_frame(&self, frame: PhysFrame) {
        phys::free_frame(frame);
    }
}

/// Per-process virtual memory operations. Backed by
/// `memory::address_space::AddressSpace`; page-fault-time demand paging
/// and a full page-table teardown on process exit are explicitly out of
/// scope (see `AddressSpace::Drop`'s own documented limits).
pub trait VmOps: Send + Sync {
    fn new_user_space(&self) -> Result<AddressSpace, KernelError>;
    fn switch_to(&self, space: &AddressSpace);
}

pub struct DefaultVmOps;

impl VmOps for DefaultVmOps {
    fn new_user_space(&self) -> Result<AddressSpace, KernelError> {
        AddressSpace::new_user().map_err(|_| KernelError::OutOfMemory)
    }

    fn switch_to(&self, space: &AddressSpace) {
        space.switch_to();
    }
}

/// Filesystem-facing state a process needs without this kernel owning a
/// VFS: just enough to back `FdTable`'s device-table contract. A real
/// filesystem is out of scope; `crate::io::tty_device`/`device` already
/// provide the `Device` trait objects FDs point at.
pub trait FsState: Send + Sync {
    fn root_device_name(&self) -> &'static str;
}

pub struct NullFsState;

impl FsState for NullFsState {
    fn root_device_name(&self) -> &'static str {
        "none"
    }
}

pub use crate::io::fd::FileDescriptorTable as FdTable;

/// Wall-clock/tick source. Backed by `utils::system::timer`; anything
/// beyond millisecond uptime and a scheduler tick counter (APIC-timer
/// microsecond precision, wall-clock RTC sync) is out of scope.
pub trait Timer: Send + Sync {
    fn uptime_ms(&self) -> u64;
    fn ticks(&self) -> u64;
}

pub struct SystemTimer;

impl Timer for SystemTimer {
    fn uptime_ms(&self) -> u64 {
        timer::uptime_ms()
    }

    fn ticks(&self) -> u64 {
        timer::scheduler_ticks()
    }
}

/// Inter-processor interrupt dispatch. IDT vector 0x82 is reserved for
/// this; since only the BSP is ever brought up, sending to any other CPU
/// is a documented no-op rather than a real SIPI-triggered wakeup.
pub trait Ipi: Send + Sync {
    fn send(&self, target: CpuId);
}

pub struct DefaultIpi;

impl Ipi for DefaultIpi {
    fn send(&self, target: CpuId) {
        if target == CpuId::BSP {
            unsafe { core::arch::asm!("int 0x82", options(nostack)) };
        }
        // Other CPUs were never brought up; nothing to send to.
    }
}

/// The register/frame state a trap handler captures and the scheduler
/// resumes into. Re-exported here as the collaborator-facing name for
/// `context_switch::InterruptContext` so `signal::frame` doesn't need to
/// reach into `scheduler::context_switch` directly.
pub type Trapframe = InterruptContext;
